use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tracing::debug;

use crate::block::{Block, BlockId, BlockType};

mod caret;
mod clipboard;
mod reorder;
mod selection;
mod slash;
mod store;
pub mod text;

pub use caret::{
    CaretController, CaretPosition, CaretRequest, PlacementOutcome, RenderSurface, TextPosition,
    resolve_text_position,
};
pub use clipboard::{parse_clipboard, parse_html, parse_plain_text, to_plain_text};
pub use reorder::{drop_block, move_block};
pub use selection::SelectionController;
pub use slash::{
    MenuAnchor, SlashCommandController, SlashMenuState, slash_trigger_at, strip_trigger_slash,
};
pub use store::{BlockStore, ChangeListener};

use text::split_at_char;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerticalDirection {
    Up,
    Down,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavigateDirection {
    Up,
    Down,
    SelectUp,
    SelectDown,
}

/// Tunables of the editing engine.
#[derive(Clone, Debug)]
pub struct EditorConfig {
    /// Extra render passes a caret placement may wait for its target.
    pub caret_retry_budget: usize,
    /// How long Enter stays swallowed after a slash menu selection.
    pub enter_suppression: Duration,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            caret_retry_budget: caret::MIN_RETRY_BUDGET,
            enter_suppression: Duration::from_millis(150),
        }
    }
}

/// Input events the rendering layer feeds into the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum EditorEvent {
    ContentChanged { block: BlockId, text: String },
    Enter { block: BlockId },
    Split { block: BlockId, offset: usize },
    Backspace { block: BlockId },
    MergeBackward { block: BlockId },
    Navigate { block: BlockId, direction: NavigateDirection },
    Paste {
        block: BlockId,
        plain_text: String,
        html: Option<String>,
    },
    SlashTrigger { block: BlockId, x: u16, y: u16 },
    SlashMove { delta: i32 },
    SlashSelect { block_type: BlockType },
    SlashConfirm,
    SlashClose,
    DragDrop { from: usize, to: usize },
    MoveBlock { block: BlockId, direction: VerticalDirection },
    SelectionToggle { block: BlockId },
    SelectionClear,
    DeleteSelected,
    ToggleChecked { block: BlockId },
    Focus { block: BlockId },
    Blur,
}

pub struct BlockEditor {
    store: BlockStore,
    caret: CaretController,
    slash: SlashCommandController,
    selection: SelectionController,
    config: EditorConfig,
}

impl BlockEditor {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self::with_config(blocks, EditorConfig::default())
    }

    pub fn with_config(blocks: Vec<Block>, config: EditorConfig) -> Self {
        Self {
            store: BlockStore::from_blocks(blocks),
            caret: CaretController::new(config.caret_retry_budget),
            slash: SlashCommandController::new(config.enter_suppression),
            selection: SelectionController::new(),
            config,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub fn blocks(&self) -> &[Block] {
        self.store.blocks()
    }

    pub fn caret(&self) -> &CaretController {
        &self.caret
    }

    pub fn slash_menu(&self) -> &SlashCommandController {
        &self.slash
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn focused_block(&self) -> Option<BlockId> {
        self.caret.focused_block()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&[Block]) + 'static) {
        self.store.subscribe(listener);
    }

    /// Replaces the document and puts the caret at the start of the first block.
    pub fn load(&mut self, blocks: Vec<Block>) {
        self.slash.close();
        self.selection.clear();
        self.store.load(blocks);
        if let Some(first) = self.store.first().map(|block| block.id) {
            self.caret.schedule(first, CaretPosition::Start);
        }
    }

    /// Lets a pending caret placement run against the freshly rendered surface.
    pub fn on_render(&mut self, surface: &mut dyn RenderSurface) -> PlacementOutcome {
        self.caret.on_render(&self.store, surface)
    }

    pub fn place_caret(&mut self, block: BlockId, position: CaretPosition) {
        self.caret.schedule(block, position);
    }

    pub fn handle(&mut self, event: EditorEvent) -> bool {
        self.handle_at(event, Instant::now())
    }

    /// Same as [`BlockEditor::handle`] with an explicit timestamp.
    pub fn handle_at(&mut self, event: EditorEvent, now: Instant) -> bool {
        match event {
            EditorEvent::ContentChanged { block, text } => self.store.update(&block, text),
            EditorEvent::Enter { block } => self.enter(&block, now),
            EditorEvent::Split { block, offset } => self.split(&block, offset, now),
            EditorEvent::Backspace { block } => self.backspace(&block),
            EditorEvent::MergeBackward { block } => self.merge_backward(&block),
            EditorEvent::Navigate { block, direction } => self.navigate(&block, direction),
            EditorEvent::Paste {
                block,
                plain_text,
                html,
            } => self.paste(&block, &plain_text, html.as_deref()),
            EditorEvent::SlashTrigger { block, x, y } => {
                self.slash.open(&self.store, block, MenuAnchor { x, y })
            }
            EditorEvent::SlashMove { delta } => self.slash.move_highlight(delta),
            EditorEvent::SlashSelect { block_type } => {
                self.slash
                    .select(&mut self.store, &mut self.caret, block_type, now)
            }
            EditorEvent::SlashConfirm => {
                self.slash
                    .select_highlighted(&mut self.store, &mut self.caret, now)
            }
            EditorEvent::SlashClose => self.slash.close(),
            EditorEvent::DragDrop { from, to } => drop_block(&mut self.store, from, to),
            EditorEvent::MoveBlock { block, direction } => {
                move_block(&mut self.store, &mut self.caret, &block, direction)
            }
            EditorEvent::SelectionToggle { block } => self.selection.toggle(&self.store, block),
            EditorEvent::SelectionClear => self.selection.clear(),
            EditorEvent::DeleteSelected => self
                .selection
                .delete_selected(&mut self.store, &mut self.caret),
            EditorEvent::ToggleChecked { block } => self.toggle_checked(&block),
            EditorEvent::Focus { block } => {
                if !self.store.contains(&block) {
                    return false;
                }
                self.caret.focus(block);
                true
            }
            EditorEvent::Blur => {
                self.caret.blur();
                true
            }
        }
    }

    /// Starts a new block after `id`. Lists continue their type.
    pub fn enter(&mut self, id: &BlockId, now: Instant) -> bool {
        let Some(len) = self.store.get(id).map(Block::char_len) else {
            return false;
        };
        self.split(id, len, now)
    }

    /// Moves the text after `offset` into a new block following `id`.
    pub fn split(&mut self, id: &BlockId, offset: usize, now: Instant) -> bool {
        if self.slash.suppresses_enter(now) {
            debug!(%id, "enter suppressed after slash selection");
            return false;
        }
        let Some(block) = self.store.get(id).cloned() else {
            return false;
        };
        let kind = if block.kind.is_list() {
            block.kind
        } else {
            BlockType::Paragraph
        };
        let (head, tail) = if block.kind.is_textual() {
            split_at_char(&block.content, offset)
        } else {
            (block.content.clone(), String::new())
        };

        let created = self.store.batch(|store| {
            store.update(id, head);
            let mut created = Block::new(kind, tail);
            if kind == BlockType::Checklist {
                created = created.with_properties(json!({ "checked": false }));
            }
            store.insert_block_after(Some(id), created)
        });
        self.caret.schedule(created.id, CaretPosition::Start);
        true
    }

    /// Removes an empty block that has a predecessor.
    pub fn backspace(&mut self, id: &BlockId) -> bool {
        let Some(index) = self.store.index_of(id) else {
            return false;
        };
        let is_empty = self.store.block_at(index).is_some_and(Block::is_empty);
        if !is_empty || index == 0 {
            return false;
        }
        let Some(previous) = self.store.block_at(index - 1).map(|block| block.id) else {
            return false;
        };
        self.store.remove(id);
        self.selection.retain_existing(&self.store);
        self.caret.schedule(previous, CaretPosition::End);
        true
    }

    /// Joins a block onto the end of its predecessor.
    pub fn merge_backward(&mut self, id: &BlockId) -> bool {
        let Some(block) = self.store.get(id).cloned() else {
            return false;
        };
        if block.is_empty() {
            return self.backspace(id);
        }
        let Some(previous) = self.store.previous(id).cloned() else {
            return false;
        };
        if !previous.kind.is_textual() || !block.kind.is_textual() {
            return false;
        }
        let join_offset = previous.char_len();
        self.store.batch(|store| {
            store.update(&previous.id, format!("{}{}", previous.content, block.content));
            store.remove(id);
        });
        self.selection.retain_existing(&self.store);
        self.caret
            .schedule(previous.id, CaretPosition::Offset(join_offset));
        true
    }

    pub fn navigate(&mut self, id: &BlockId, direction: NavigateDirection) -> bool {
        match direction {
            NavigateDirection::Up => {
                let Some(target) = self.store.previous(id).map(|block| block.id) else {
                    return false;
                };
                self.caret.schedule(target, CaretPosition::End);
                true
            }
            NavigateDirection::Down => {
                let Some(target) = self.store.next(id).map(|block| block.id) else {
                    return false;
                };
                self.caret.schedule(target, CaretPosition::Start);
                true
            }
            NavigateDirection::SelectUp => {
                self.selection
                    .expand(&self.store, &mut self.caret, *id, VerticalDirection::Up)
            }
            NavigateDirection::SelectDown => {
                self.selection
                    .expand(&self.store, &mut self.caret, *id, VerticalDirection::Down)
            }
        }
    }

    pub fn paste(&mut self, id: &BlockId, plain_text: &str, html: Option<&str>) -> bool {
        if !self.store.contains(id) {
            return false;
        }
        let parsed = parse_clipboard(plain_text, html);
        clipboard::inject(&mut self.store, &mut self.caret, id, parsed)
    }

    pub fn toggle_checked(&mut self, id: &BlockId) -> bool {
        let Some(block) = self.store.get(id) else {
            return false;
        };
        if block.kind != BlockType::Checklist {
            return false;
        }
        let checked = !block.is_checked();
        let mut properties = match block.properties.clone() {
            Some(Value::Object(map)) => map,
            _ => Default::default(),
        };
        properties.insert("checked".to_string(), Value::Bool(checked));
        self.store.set_properties(id, Some(Value::Object(properties)))
    }
}

#[cfg(test)]
#[path = "editor_tests.rs"]
mod editor_tests;



#[cfg(test)]
#[path = "editor/slash_tests.rs"]
mod slash_tests;
