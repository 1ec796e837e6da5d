use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use ratatui::layout::Rect;
use tracing::trace;

use crate::block::{Block, BlockId};
use crate::editor::text::{
    insert_char_at, next_word_boundary, previous_word_boundary, remove_char_at,
};
use crate::editor::{
    BlockEditor, CaretPosition, EditorEvent, NavigateDirection, PlacementOutcome, RenderSurface,
    TextPosition, VerticalDirection, slash_trigger_at,
};
use crate::render::{
    BlockRows, CaretLocation, CursorVisualPosition, RenderOptions, RenderResult, render_blocks,
};
use crate::theme::Theme;

/// A caret location together with where it was drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorDisplay {
    pub location: CaretLocation,
    pub position: CursorVisualPosition,
}

/// What the terminal has drawn, as seen by the caret controller.
#[derive(Debug, Default)]
struct CaretSurface {
    rendered: HashMap<BlockId, Vec<usize>>,
    caret: Option<CaretLocation>,
    block_highlight: Option<BlockId>,
}

impl CaretSurface {
    fn sync(&mut self, blocks: &[Block]) {
        self.rendered.clear();
        for block in blocks {
            let runs = if block.kind.is_textual() {
                vec![block.char_len()]
            } else {
                Vec::new()
            };
            self.rendered.insert(block.id, runs);
        }
    }
}

impl RenderSurface for CaretSurface {
    fn text_runs(&self, block: &BlockId) -> Option<Vec<usize>> {
        self.rendered.get(block).cloned()
    }

    fn focus(&mut self, block: &BlockId, position: TextPosition) {
        let preceding: usize = self
            .rendered
            .get(block)
            .map(|runs| runs.iter().take(position.run).sum())
            .unwrap_or(0);
        self.caret = Some(CaretLocation {
            block: *block,
            offset: preceding + position.offset,
        });
        self.block_highlight = None;
    }

    fn select_block(&mut self, block: &BlockId, collapse_to: CaretPosition) {
        let offset = match collapse_to {
            CaretPosition::Start => 0,
            CaretPosition::End => usize::MAX,
            CaretPosition::Offset(offset) => offset,
        };
        self.caret = Some(CaretLocation {
            block: *block,
            offset,
        });
        self.block_highlight = Some(*block);
    }
}

/// EditorDisplay wraps a BlockEditor and owns everything visual: the caret
/// as drawn, wrapping-aware movement and mouse hit testing.
pub struct EditorDisplay {
    editor: BlockEditor,
    surface: CaretSurface,
    visual_positions: Vec<CursorDisplay>,
    block_rows: Vec<BlockRows>,
    last_cursor_visual: Option<CursorVisualPosition>,
    preferred_column: Option<u16>,
    cursor_following: bool,
    last_view_height: usize,
    last_total_lines: usize,
    last_text_area: Rect,
    left_padding: usize,
}

impl EditorDisplay {
    pub fn new(editor: BlockEditor) -> Self {
        Self {
            editor,
            surface: CaretSurface::default(),
            visual_positions: Vec::new(),
            block_rows: Vec::new(),
            last_cursor_visual: None,
            preferred_column: None,
            cursor_following: true,
            last_view_height: 1,
            last_total_lines: 0,
            last_text_area: Rect::default(),
            left_padding: 0,
        }
    }

    pub fn last_cursor_visual(&self) -> Option<CursorVisualPosition> {
        self.last_cursor_visual
    }

    pub fn cursor_following(&self) -> bool {
        self.cursor_following
    }

    pub fn set_cursor_following(&mut self, following: bool) {
        self.cursor_following = following;
    }

    pub fn last_view_height(&self) -> usize {
        self.last_view_height
    }

    pub fn last_total_lines(&self) -> usize {
        self.last_total_lines
    }

    /// The caret clamped to the current content of its block.
    pub fn caret_location(&self) -> Option<CaretLocation> {
        let caret = self.surface.caret?;
        let block = self.editor.store().get(&caret.block)?;
        Some(CaretLocation {
            block: caret.block,
            offset: caret.offset.min(block.char_len()),
        })
    }

    pub fn current_block(&self) -> Option<&Block> {
        let id = self
            .surface
            .caret
            .map(|caret| caret.block)
            .or_else(|| self.editor.focused_block())?;
        self.editor.store().get(&id)
    }

    pub fn word_count(&self) -> usize {
        self.editor
            .blocks()
            .iter()
            .map(|block| block.content.split_whitespace().count())
            .sum()
    }

    /// Render the blocks at the given width and update internal state
    pub fn render_document(
        &mut self,
        wrap_width: usize,
        left_padding: usize,
        theme: &Theme,
    ) -> RenderResult {
        self.surface.sync(self.editor.blocks());
        self.left_padding = left_padding;

        let caret_lost = self
            .surface
            .caret
            .is_none_or(|caret| !self.editor.store().contains(&caret.block));
        if caret_lost && self.editor.caret().pending().is_none() {
            self.surface.caret = None;
            self.surface.block_highlight = None;
            if let Some(first) = self.editor.blocks().first().map(|block| block.id) {
                self.editor.place_caret(first, CaretPosition::Start);
            }
        }

        let caret = self.caret_location();
        let result = render_blocks(
            self.editor.blocks(),
            &RenderOptions {
                wrap_width,
                left_padding,
                caret,
                selection: self.editor.selection().ids(),
                focused_block: self.surface.block_highlight,
                theme,
            },
        );

        self.visual_positions = result
            .cursor_map
            .iter()
            .map(|(location, position)| CursorDisplay {
                location: *location,
                position: *position,
            })
            .collect();
        self.block_rows = result.block_rows.clone();
        self.last_cursor_visual = result.cursor;
        if self.preferred_column.is_none() {
            self.preferred_column = result.cursor.map(|position| position.column);
        }

        result
    }

    /// Hands the pending caret placement to the engine now that a frame is drawn.
    pub fn place_pending_caret(&mut self) -> PlacementOutcome {
        let outcome = self.editor.on_render(&mut self.surface);
        if matches!(
            outcome,
            PlacementOutcome::Placed | PlacementOutcome::FellBack
        ) {
            trace!(?outcome, caret = ?self.surface.caret, "caret placed");
            self.preferred_column = None;
            self.cursor_following = true;
        }
        outcome
    }

    /// Update tracking state after rendering (called from draw)
    pub fn update_after_render(&mut self, text_area: Rect, total_lines: usize) {
        self.last_text_area = text_area;
        self.last_total_lines = total_lines;
        self.last_view_height = (text_area.height as usize).max(1);
    }

    fn textual_caret(&self) -> Option<(CaretLocation, String)> {
        let caret = self.caret_location()?;
        let block = self.editor.store().get(&caret.block)?;
        block
            .kind
            .is_textual()
            .then(|| (caret, block.content.clone()))
    }

    fn set_content(&mut self, block: BlockId, text: String, offset: usize) -> bool {
        if !self
            .editor
            .handle(EditorEvent::ContentChanged { block, text })
        {
            return false;
        }
        self.surface.caret = Some(CaretLocation { block, offset });
        self.preferred_column = None;
        self.cursor_following = true;
        true
    }

    pub fn insert_char(&mut self, ch: char) -> bool {
        let Some((caret, content)) = self.textual_caret() else {
            return false;
        };
        let text = insert_char_at(&content, caret.offset, ch);
        self.set_content(caret.block, text, caret.offset + 1)
    }

    /// Soft line break inside the current block.
    pub fn insert_newline(&mut self) -> bool {
        self.insert_char('\n')
    }

    /// Whether the character just typed opens the slash menu.
    pub fn at_slash_trigger(&self) -> bool {
        self.textual_caret()
            .is_some_and(|(caret, content)| slash_trigger_at(&content, caret.offset))
    }

    pub fn open_slash_menu(&mut self, x: u16, y: u16) -> bool {
        let Some(caret) = self.caret_location() else {
            return false;
        };
        self.editor.handle(EditorEvent::SlashTrigger {
            block: caret.block,
            x,
            y,
        })
    }

    pub fn backspace(&mut self) -> bool {
        let Some(caret) = self.caret_location() else {
            return false;
        };
        let Some(block) = self.editor.store().get(&caret.block).cloned() else {
            return false;
        };
        if !block.kind.is_textual() {
            return self.delete_block(block.id);
        }
        if caret.offset > 0 {
            let Some(text) = remove_char_at(&block.content, caret.offset - 1) else {
                return false;
            };
            return self.set_content(block.id, text, caret.offset - 1);
        }
        let event = if block.is_empty() {
            EditorEvent::Backspace { block: block.id }
        } else {
            EditorEvent::MergeBackward { block: block.id }
        };
        self.editor.handle(event)
    }

    pub fn delete(&mut self) -> bool {
        let Some(caret) = self.caret_location() else {
            return false;
        };
        let Some(block) = self.editor.store().get(&caret.block).cloned() else {
            return false;
        };
        if !block.kind.is_textual() {
            return self.delete_block(block.id);
        }
        if let Some(text) = remove_char_at(&block.content, caret.offset) {
            return self.set_content(block.id, text, caret.offset);
        }
        let Some(next) = self.editor.store().next(&block.id).map(|next| next.id) else {
            return false;
        };
        self.editor
            .handle(EditorEvent::MergeBackward { block: next })
    }

    fn delete_block(&mut self, id: BlockId) -> bool {
        if !self.editor.selection().contains(&id) {
            self.editor
                .handle(EditorEvent::SelectionToggle { block: id });
        }
        self.editor.handle(EditorEvent::DeleteSelected)
    }

    /// Splits the current block at the caret.
    pub fn enter(&mut self) -> bool {
        let Some(caret) = self.caret_location() else {
            return false;
        };
        self.editor.handle(EditorEvent::Split {
            block: caret.block,
            offset: caret.offset,
        })
    }

    pub fn paste(&mut self, plain_text: String, html: Option<String>) -> bool {
        let Some(caret) = self.caret_location() else {
            return false;
        };
        self.editor.handle(EditorEvent::Paste {
            block: caret.block,
            plain_text,
            html,
        })
    }

    pub fn toggle_checked(&mut self) -> bool {
        let Some(block) = self.current_block().map(|block| block.id) else {
            return false;
        };
        self.editor.handle(EditorEvent::ToggleChecked { block })
    }

    pub fn toggle_selection(&mut self) -> bool {
        let Some(block) = self.current_block().map(|block| block.id) else {
            return false;
        };
        self.editor.handle(EditorEvent::SelectionToggle { block })
    }

    pub fn extend_selection(&mut self, direction: VerticalDirection) -> bool {
        let Some(block) = self.current_block().map(|block| block.id) else {
            return false;
        };
        let direction = match direction {
            VerticalDirection::Up => NavigateDirection::SelectUp,
            VerticalDirection::Down => NavigateDirection::SelectDown,
        };
        self.editor
            .handle(EditorEvent::Navigate { block, direction })
    }

    pub fn move_current_block(&mut self, direction: VerticalDirection) -> bool {
        let Some(block) = self.current_block().map(|block| block.id) else {
            return false;
        };
        self.editor
            .handle(EditorEvent::MoveBlock { block, direction })
    }

    fn navigate(&mut self, block: BlockId, delta: i32) -> bool {
        let direction = if delta < 0 {
            NavigateDirection::Up
        } else {
            NavigateDirection::Down
        };
        self.editor
            .handle(EditorEvent::Navigate { block, direction })
    }

    fn set_offset(&mut self, caret: CaretLocation, offset: usize) -> bool {
        self.surface.caret = Some(CaretLocation { offset, ..caret });
        self.cursor_following = true;
        true
    }

    pub fn move_left(&mut self) -> bool {
        self.preferred_column = None;
        let Some(caret) = self.caret_location() else {
            return false;
        };
        if caret.offset > 0 {
            return self.set_offset(caret, caret.offset - 1);
        }
        self.navigate(caret.block, -1)
    }

    pub fn move_right(&mut self) -> bool {
        self.preferred_column = None;
        let Some(caret) = self.caret_location() else {
            return false;
        };
        let len = self
            .editor
            .store()
            .get(&caret.block)
            .filter(|block| block.kind.is_textual())
            .map(Block::char_len)
            .unwrap_or(0);
        if caret.offset < len {
            return self.set_offset(caret, caret.offset + 1);
        }
        self.navigate(caret.block, 1)
    }

    pub fn move_word_left(&mut self) -> bool {
        let Some((caret, content)) = self.textual_caret() else {
            return self.move_left();
        };
        if caret.offset == 0 {
            return self.move_left();
        }
        self.preferred_column = None;
        self.set_offset(caret, previous_word_boundary(&content, caret.offset))
    }

    pub fn move_word_right(&mut self) -> bool {
        let Some((caret, content)) = self.textual_caret() else {
            return self.move_right();
        };
        if caret.offset >= content.chars().count() {
            return self.move_right();
        }
        self.preferred_column = None;
        self.set_offset(caret, next_word_boundary(&content, caret.offset))
    }

    /// Move cursor vertically by delta lines
    pub fn move_cursor_vertical(&mut self, delta: i32) {
        let Some(location) = self.caret_location() else {
            return;
        };
        if delta == 0 {
            return;
        }

        let current = self
            .visual_positions
            .iter()
            .find(|entry| entry.location == location)
            .map(|entry| entry.position)
            .or(self.last_cursor_visual);
        let Some(current) = current else {
            self.preferred_column = None;
            self.navigate(location.block, delta);
            return;
        };

        let desired_column = self.preferred_column.unwrap_or(current.column);
        let max_line = self.max_line();
        let target_line = (current.line as i64 + delta as i64).clamp(0, max_line as i64) as usize;

        let destination = if target_line == current.line {
            None
        } else {
            self.closest_on_line(target_line, desired_column)
                .or_else(|| self.search_nearest_line(target_line, delta, desired_column))
        };

        match destination {
            Some(dest) if dest.location != location => {
                self.focus_display(&dest);
                self.preferred_column = Some(desired_column);
            }
            _ => {
                // Nothing drawn in that direction; let the engine decide.
                self.preferred_column = None;
                self.navigate(location.block, delta);
            }
        }
    }

    /// Calculate the page jump distance based on viewport height
    pub fn page_jump_distance(&self) -> i32 {
        let viewport = self.last_view_height.max(1);
        let approx = ((viewport as f32) * 0.9).round() as usize;
        approx.max(1) as i32
    }

    pub fn move_page(&mut self, direction: i32) {
        if direction == 0 {
            return;
        }
        let distance = self.page_jump_distance();
        self.move_cursor_vertical(distance * direction);
    }

    pub fn move_to_visual_line_start(&mut self) {
        self.preferred_column = None;
        if let Some((start, _)) = self.current_line_boundaries() {
            self.focus_display(&start);
        }
    }

    pub fn move_to_visual_line_end(&mut self) {
        self.preferred_column = None;
        if let Some((_, end)) = self.current_line_boundaries() {
            self.focus_display(&end);
        }
    }

    fn current_line_boundaries(&self) -> Option<(CursorDisplay, CursorDisplay)> {
        let location = self.caret_location()?;
        let line = self
            .visual_positions
            .iter()
            .find(|entry| entry.location == location)
            .map(|entry| entry.position.line)
            .or(self.last_cursor_visual.map(|position| position.line))?;
        self.visual_line_boundaries(line, location.block)
    }

    /// First and last caret stop of `block` on a visual line.
    pub fn visual_line_boundaries(
        &self,
        line: usize,
        block: BlockId,
    ) -> Option<(CursorDisplay, CursorDisplay)> {
        let on_line = || {
            self.visual_positions
                .iter()
                .filter(move |entry| entry.position.line == line && entry.location.block == block)
        };
        let start = on_line().min_by_key(|entry| entry.location.offset)?;
        let end = on_line().max_by_key(|entry| entry.location.offset)?;
        Some((*start, *end))
    }

    fn max_line(&self) -> usize {
        self.visual_positions
            .iter()
            .map(|entry| entry.position.line)
            .max()
            .unwrap_or(0)
    }

    fn closest_on_line(&self, line: usize, column: u16) -> Option<CursorDisplay> {
        self.visual_positions
            .iter()
            .filter(|entry| entry.position.line == line)
            .min_by_key(|entry| entry.position.column.abs_diff(column))
            .copied()
    }

    fn search_nearest_line(&self, start_line: usize, delta: i32, column: u16) -> Option<CursorDisplay> {
        let max_line = self.max_line();
        let mut line = start_line;
        loop {
            if delta < 0 {
                line = line.checked_sub(1)?;
            } else {
                line += 1;
                if line > max_line {
                    return None;
                }
            }
            if let Some(found) = self.closest_on_line(line, column) {
                return Some(found);
            }
        }
    }

    fn closest_near_line(&self, line: usize, column: u16) -> Option<CursorDisplay> {
        if let Some(hit) = self.closest_on_line(line, column) {
            return Some(hit);
        }
        let max_line = self.max_line();
        let mut distance = 1usize;
        while distance <= max_line.max(line) {
            if let Some(previous) = line.checked_sub(distance)
                && let Some(hit) = self.closest_on_line(previous, column)
            {
                return Some(hit);
            }
            if let Some(hit) = self.closest_on_line(line + distance, column) {
                return Some(hit);
            }
            distance += 1;
        }
        None
    }

    /// Convert mouse coordinates to a caret stop
    pub fn pointer_from_mouse(&self, column: u16, row: u16, scroll_top: usize) -> Option<CursorDisplay> {
        if self.visual_positions.is_empty() {
            return None;
        }
        let line = self.line_at_row(row, scroll_top)?;
        let area = self.last_text_area;
        if column < area.x || column >= area.x.saturating_add(area.width) {
            return None;
        }
        self.closest_near_line(line, column - area.x)
    }

    fn line_at_row(&self, row: u16, scroll_top: usize) -> Option<usize> {
        let area = self.last_text_area;
        if area.width == 0 || area.height == 0 {
            return None;
        }
        if row < area.y || row >= area.y.saturating_add(area.height) {
            return None;
        }
        Some(scroll_top.saturating_add((row - area.y) as usize))
    }

    /// Index of the block drawn at a screen row. Separator rows belong to the block below.
    pub fn block_index_at_row(&self, row: u16, scroll_top: usize) -> Option<usize> {
        let line = self.line_at_row(row, scroll_top)?;
        self.block_rows
            .iter()
            .position(|rows| line < rows.end)
            .or_else(|| self.block_rows.len().checked_sub(1))
    }

    /// Whether a screen column falls into the drag handle gutter.
    pub fn in_gutter(&self, column: u16) -> bool {
        let area = self.last_text_area;
        column >= area.x && ((column - area.x) as usize) < self.left_padding
    }

    pub fn focus_display(&mut self, display: &CursorDisplay) {
        if self.focus_location(display.location) {
            self.last_cursor_visual = Some(display.position);
            self.preferred_column = Some(display.position.column);
            self.cursor_following = true;
        }
    }

    pub fn focus_location(&mut self, location: CaretLocation) -> bool {
        let Some(textual) = self
            .editor
            .store()
            .get(&location.block)
            .map(|block| block.kind.is_textual())
        else {
            return false;
        };
        self.editor.handle(EditorEvent::Focus {
            block: location.block,
        });
        self.surface.caret = Some(location);
        self.surface.block_highlight = (!textual).then_some(location.block);
        self.preferred_column = None;
        true
    }
}

impl Deref for EditorDisplay {
    type Target = BlockEditor;

    fn deref(&self) -> &Self::Target {
        &self.editor
    }
}

impl DerefMut for EditorDisplay {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.editor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockType;

    fn settle(display: &mut EditorDisplay, width: usize) {
        let theme = Theme::default();
        for _ in 0..4 {
            display.render_document(width, 0, &theme);
            if display.place_pending_caret() == PlacementOutcome::Idle {
                break;
            }
        }
        display.render_document(width, 0, &theme);
    }

    fn display_with(blocks: Vec<Block>) -> EditorDisplay {
        let mut editor = BlockEditor::new(Vec::new());
        editor.load(blocks);
        let mut display = EditorDisplay::new(editor);
        settle(&mut display, 40);
        display
    }

    fn texts(display: &EditorDisplay) -> Vec<String> {
        display
            .blocks()
            .iter()
            .map(|block| block.content.clone())
            .collect()
    }

    fn at(block: BlockId, offset: usize) -> CaretLocation {
        CaretLocation { block, offset }
    }

    #[test]
    fn load_places_caret_at_start_of_first_block() {
        let first = Block::new(BlockType::Paragraph, "hello");
        let id = first.id;
        let display = display_with(vec![first]);
        assert_eq!(display.caret_location(), Some(at(id, 0)));
        assert_eq!(
            display.last_cursor_visual(),
            Some(CursorVisualPosition { line: 0, column: 0 })
        );
    }

    #[test]
    fn typing_inserts_at_caret() {
        let block = Block::new(BlockType::Paragraph, "xy");
        let id = block.id;
        let mut display = display_with(vec![block]);
        display.focus_location(at(id, 1));
        assert!(display.insert_char('a'));
        assert!(display.insert_char('é'));
        assert_eq!(texts(&display), vec!["xaéy"]);
        assert_eq!(display.caret_location(), Some(at(id, 3)));
    }

    #[test]
    fn enter_splits_at_caret() {
        let block = Block::new(BlockType::Paragraph, "hello world");
        let id = block.id;
        let mut display = display_with(vec![block]);
        display.focus_location(at(id, 5));
        assert!(display.enter());
        settle(&mut display, 40);
        assert_eq!(texts(&display), vec!["hello", " world"]);
        let second = display.blocks()[1].id;
        assert_eq!(display.caret_location(), Some(at(second, 0)));
    }

    #[test]
    fn backspace_at_block_start_merges_into_previous() {
        let first = Block::new(BlockType::Paragraph, "ab");
        let second = Block::new(BlockType::Paragraph, "cd");
        let (first_id, second_id) = (first.id, second.id);
        let mut display = display_with(vec![first, second]);
        display.focus_location(at(second_id, 0));
        assert!(display.backspace());
        settle(&mut display, 40);
        assert_eq!(texts(&display), vec!["abcd"]);
        assert_eq!(display.caret_location(), Some(at(first_id, 2)));
    }

    #[test]
    fn delete_at_block_end_pulls_in_next_block() {
        let first = Block::new(BlockType::Paragraph, "ab");
        let second = Block::new(BlockType::Paragraph, "cd");
        let first_id = first.id;
        let mut display = display_with(vec![first, second]);
        display.focus_location(at(first_id, 2));
        assert!(display.delete());
        settle(&mut display, 40);
        assert_eq!(texts(&display), vec!["abcd"]);
        assert_eq!(display.caret_location(), Some(at(first_id, 2)));
    }

    #[test]
    fn horizontal_moves_cross_block_edges() {
        let first = Block::new(BlockType::Paragraph, "ab");
        let second = Block::new(BlockType::Paragraph, "cd");
        let (first_id, second_id) = (first.id, second.id);
        let mut display = display_with(vec![first, second]);
        display.focus_location(at(first_id, 2));

        assert!(display.move_right());
        settle(&mut display, 40);
        assert_eq!(display.caret_location(), Some(at(second_id, 0)));

        assert!(display.move_left());
        settle(&mut display, 40);
        assert_eq!(display.caret_location(), Some(at(first_id, 2)));
    }

    #[test]
    fn vertical_moves_keep_column_and_skip_separators() {
        let first = Block::new(BlockType::Paragraph, "abcdef");
        let second = Block::new(BlockType::Paragraph, "xyz");
        let (first_id, second_id) = (first.id, second.id);
        let mut display = display_with(vec![first, second]);
        display.focus_location(at(first_id, 2));
        settle(&mut display, 40);

        display.move_cursor_vertical(1);
        assert_eq!(display.caret_location(), Some(at(second_id, 2)));

        display.move_cursor_vertical(1);
        settle(&mut display, 40);
        assert_eq!(display.caret_location(), Some(at(second_id, 2)));
    }

    #[test]
    fn slash_menu_converts_current_block() {
        let block = Block::new(BlockType::Paragraph, "hi");
        let id = block.id;
        let mut display = display_with(vec![block]);
        display.focus_location(at(id, 2));
        display.insert_char('/');
        assert!(display.at_slash_trigger());
        assert!(display.open_slash_menu(3, 1));
        assert!(display.handle(EditorEvent::SlashSelect {
            block_type: BlockType::Heading1,
        }));
        settle(&mut display, 40);
        let block = &display.blocks()[0];
        assert_eq!(block.kind, BlockType::Heading1);
        assert_eq!(block.content, "hi");
        assert_eq!(display.caret_location(), Some(at(id, 2)));
    }

    #[test]
    fn backspace_on_divider_removes_it() {
        let text = Block::new(BlockType::Paragraph, "above");
        let divider = Block::new(BlockType::Divider, "");
        let (text_id, divider_id) = (text.id, divider.id);
        let mut display = display_with(vec![text, divider]);
        display.focus_location(at(divider_id, 0));
        assert!(display.backspace());
        settle(&mut display, 40);
        assert_eq!(display.blocks().len(), 1);
        assert_eq!(display.caret_location(), Some(at(text_id, 5)));
    }

    #[test]
    fn rows_map_to_blocks_and_separators_belong_below() {
        let mut display = display_with(vec![
            Block::new(BlockType::Paragraph, "a"),
            Block::new(BlockType::Paragraph, "b"),
        ]);
        display.update_after_render(Rect::new(0, 0, 40, 10), 3);
        assert_eq!(display.block_index_at_row(0, 0), Some(0));
        assert_eq!(display.block_index_at_row(1, 0), Some(1));
        assert_eq!(display.block_index_at_row(2, 0), Some(1));
        assert_eq!(display.block_index_at_row(9, 0), Some(1));
        assert_eq!(display.block_index_at_row(10, 0), None);
    }

    #[test]
    fn mouse_click_maps_to_nearest_caret_stop() {
        let first = Block::new(BlockType::Paragraph, "abc");
        let second = Block::new(BlockType::Paragraph, "defgh");
        let second_id = second.id;
        let mut display = display_with(vec![first, second]);
        display.update_after_render(Rect::new(0, 1, 40, 10), 3);
        let hit = display.pointer_from_mouse(4, 3, 0);
        assert_eq!(hit.map(|hit| hit.location), Some(at(second_id, 4)));
    }

    #[test]
    fn word_moves_stop_at_boundaries() {
        let block = Block::new(BlockType::Paragraph, "one two");
        let id = block.id;
        let mut display = display_with(vec![block]);
        assert!(display.move_word_right());
        assert_eq!(display.caret_location(), Some(at(id, 4)));
        assert!(display.move_word_left());
        assert_eq!(display.caret_location(), Some(at(id, 0)));
    }
}
