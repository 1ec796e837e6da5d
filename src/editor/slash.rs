use std::time::{Duration, Instant};

use tracing::debug;

use super::caret::{CaretController, CaretPosition};
use super::store::BlockStore;
use crate::block::{BlockId, BlockType};

/// Screen position the menu pops up at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct MenuAnchor {
    pub x: u16,
    pub y: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlashMenuState {
    Idle,
    Open {
        anchor: MenuAnchor,
        active_block: BlockId,
        highlighted: usize,
    },
    /// A type was just picked. Enter presses belonging to the same
    /// keystroke must not create a block until `until` has passed.
    Settling { block: BlockId, until: Instant },
}

pub struct SlashCommandController {
    state: SlashMenuState,
    items: Vec<BlockType>,
    grace: Duration,
}

impl SlashCommandController {
    pub fn new(grace: Duration) -> Self {
        Self {
            state: SlashMenuState::Idle,
            items: BlockType::ALL.to_vec(),
            grace,
        }
    }

    pub fn state(&self) -> SlashMenuState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, SlashMenuState::Open { .. })
    }

    pub fn items(&self) -> &[BlockType] {
        &self.items
    }

    pub fn highlighted(&self) -> Option<usize> {
        match self.state {
            SlashMenuState::Open { highlighted, .. } => Some(highlighted),
            _ => None,
        }
    }

    pub fn anchor(&self) -> Option<MenuAnchor> {
        match self.state {
            SlashMenuState::Open { anchor, .. } => Some(anchor),
            _ => None,
        }
    }

    pub fn active_block(&self) -> Option<BlockId> {
        match self.state {
            SlashMenuState::Open { active_block, .. } => Some(active_block),
            _ => None,
        }
    }

    pub fn open(&mut self, store: &BlockStore, block: BlockId, anchor: MenuAnchor) -> bool {
        if !store.contains(&block) {
            return false;
        }
        debug!(%block, ?anchor, "slash menu opened");
        self.state = SlashMenuState::Open {
            anchor,
            active_block: block,
            highlighted: 0,
        };
        true
    }

    /// Moves the highlight by `delta`, wrapping at both ends.
    pub fn move_highlight(&mut self, delta: i32) -> bool {
        let len = self.items.len() as i32;
        let SlashMenuState::Open { highlighted, .. } = &mut self.state else {
            return false;
        };
        if len == 0 {
            return false;
        }
        *highlighted = (*highlighted as i32 + delta).rem_euclid(len) as usize;
        true
    }

    /// Abandons the menu without touching the document.
    pub fn close(&mut self) -> bool {
        if !self.is_open() {
            return false;
        }
        debug!("slash menu closed");
        self.state = SlashMenuState::Idle;
        true
    }

    pub fn select_highlighted(
        &mut self,
        store: &mut BlockStore,
        caret: &mut CaretController,
        now: Instant,
    ) -> bool {
        let Some(kind) = self
            .highlighted()
            .and_then(|index| self.items.get(index).copied())
        else {
            return false;
        };
        self.select(store, caret, kind, now)
    }

    /// Converts the active block to `kind`, dropping the slash that opened the menu.
    pub fn select(
        &mut self,
        store: &mut BlockStore,
        caret: &mut CaretController,
        kind: BlockType,
        now: Instant,
    ) -> bool {
        let SlashMenuState::Open { active_block, .. } = self.state else {
            return false;
        };
        let Some(block) = store.get(&active_block) else {
            self.state = SlashMenuState::Idle;
            return false;
        };
        let stripped = strip_trigger_slash(&block.content);
        if !store.replace_type(&active_block, kind, stripped.clone()) {
            self.state = SlashMenuState::Idle;
            return false;
        }
        self.state = SlashMenuState::Settling {
            block: active_block,
            until: now + self.grace,
        };
        let position = if stripped.is_empty() {
            CaretPosition::Start
        } else {
            CaretPosition::End
        };
        caret.schedule(active_block, position);
        true
    }

    /// Whether an Enter press arriving at `now` must be swallowed.
    pub fn suppresses_enter(&mut self, now: Instant) -> bool {
        match self.state {
            SlashMenuState::Open { .. } => true,
            SlashMenuState::Settling { until, .. } if now < until => true,
            SlashMenuState::Settling { .. } => {
                self.state = SlashMenuState::Idle;
                false
            }
            SlashMenuState::Idle => false,
        }
    }
}

impl Default for SlashCommandController {
    fn default() -> Self {
        Self::new(Duration::from_millis(150))
    }
}

/// True when the character right before `caret_offset` is a slash.
pub fn slash_trigger_at(text: &str, caret_offset: usize) -> bool {
    caret_offset > 0 && text.chars().nth(caret_offset - 1) == Some('/')
}

/// Removes the trailing slash, or the last slash anywhere if the text no
/// longer ends with one.
pub fn strip_trigger_slash(content: &str) -> String {
    if let Some(stripped) = content.strip_suffix('/') {
        return stripped.to_string();
    }
    match content.rfind('/') {
        Some(index) => {
            let mut stripped = String::with_capacity(content.len() - 1);
            stripped.push_str(&content[..index]);
            stripped.push_str(&content[index + 1..]);
            stripped
        }
        None => content.to_string(),
    }
}
