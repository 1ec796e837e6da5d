use std::collections::HashSet;

use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};
use unicode_width::UnicodeWidthChar;

use crate::block::{Block, BlockId, BlockType};
use crate::theme::Theme;

const DRAG_HANDLE: &str = "⠿ ";
const EMPTY_HINT: &str = "Type '/' for commands";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorVisualPosition {
    pub line: usize,
    pub column: u16,
}

/// A caret inside a block, as a character offset into its content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaretLocation {
    pub block: BlockId,
    pub offset: usize,
}

/// Lines `start..end` of the output belong to block `id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockRows {
    pub id: BlockId,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug)]
pub struct RenderResult {
    pub lines: Vec<Line<'static>>,
    pub cursor: Option<CursorVisualPosition>,
    pub total_lines: usize,
    pub block_rows: Vec<BlockRows>,
    pub cursor_map: Vec<(CaretLocation, CursorVisualPosition)>,
}

pub struct RenderOptions<'a> {
    pub wrap_width: usize,
    pub left_padding: usize,
    pub caret: Option<CaretLocation>,
    pub selection: &'a HashSet<BlockId>,
    /// Block focused as a whole, without a text caret.
    pub focused_block: Option<BlockId>,
    pub theme: &'a Theme,
}

pub fn render_blocks(blocks: &[Block], options: &RenderOptions<'_>) -> RenderResult {
    let mut renderer = Renderer {
        wrap_width: options.wrap_width.max(1),
        left_padding: options.left_padding,
        caret: options.caret,
        selection: options.selection,
        focused_block: options.focused_block,
        theme: options.theme,
        lines: Vec::new(),
        cursor: None,
        block_rows: Vec::with_capacity(blocks.len()),
        cursor_map: Vec::new(),
    };
    renderer.render_blocks(blocks);
    renderer.finish()
}

struct Renderer<'a> {
    wrap_width: usize,
    left_padding: usize,
    caret: Option<CaretLocation>,
    selection: &'a HashSet<BlockId>,
    focused_block: Option<BlockId>,
    theme: &'a Theme,
    lines: Vec<Line<'static>>,
    cursor: Option<CursorVisualPosition>,
    block_rows: Vec<BlockRows>,
    cursor_map: Vec<(CaretLocation, CursorVisualPosition)>,
}

impl Renderer<'_> {
    fn render_blocks(&mut self, blocks: &[Block]) {
        let mut ordinal = 0;
        let mut previous: Option<BlockType> = None;
        for block in blocks {
            ordinal = if block.kind == BlockType::OrderedList {
                ordinal + 1
            } else {
                0
            };
            if let Some(previous) = previous
                && !(previous == block.kind && block.kind.is_list())
            {
                self.lines.push(Line::from(""));
            }
            let start = self.lines.len();
            self.render_block(block, ordinal);
            self.block_rows.push(BlockRows {
                id: block.id,
                start,
                end: self.lines.len(),
            });
            previous = Some(block.kind);
        }
    }

    fn render_block(&mut self, block: &Block, ordinal: usize) {
        let theme = self.theme;
        let highlight = if self.focused_block == Some(block.id) {
            Some(theme.focused_block_style())
        } else if self.selection.contains(&block.id) {
            Some(theme.selection_style())
        } else {
            None
        };
        let mut context = BlockContext {
            id: block.id,
            highlight,
            first_line: true,
        };

        match block.kind {
            BlockType::Divider => {
                let rule = "─".repeat(self.wrap_width);
                let output = LineOutput::single(rule, theme.divider_style());
                self.consume_lines(&mut context, vec![output]);
            }
            BlockType::Image => {
                let src = block
                    .properties
                    .as_ref()
                    .and_then(|props| props.get("src"))
                    .and_then(|src| src.as_str())
                    .unwrap_or_default();
                let label = if src.is_empty() {
                    format!("[image] {}", block.content)
                } else {
                    format!("[image] {} <{src}>", block.content)
                };
                let output = LineOutput::single(label, theme.image_style());
                self.consume_lines(&mut context, vec![output]);
            }
            BlockType::Code => {
                let fence = self.code_block_fence();
                self.push_plain(&mut context, fence.clone(), theme.divider_style());
                let outputs = wrap_text(
                    &block.content,
                    ("", ""),
                    usize::MAX / 4,
                    theme.code_style(),
                    Style::default(),
                );
                self.consume_lines(&mut context, outputs);
                self.push_plain(&mut context, fence, theme.divider_style());
            }
            _ => {
                let (first_prefix, continuation_prefix) = list_prefixes(block, ordinal);
                let text_style = match block.kind {
                    BlockType::Heading1 | BlockType::Heading2 | BlockType::Heading3 => {
                        theme.heading_style()
                    }
                    BlockType::Quote => theme.quote_style(),
                    BlockType::Checklist if block.is_checked() => theme.checked_style(),
                    _ => Style::default(),
                };
                let prefix_style = match block.kind {
                    BlockType::Quote => theme.quote_style(),
                    _ => theme.list_marker_style(),
                };
                let mut outputs = wrap_text(
                    &block.content,
                    (first_prefix.as_str(), continuation_prefix.as_str()),
                    self.wrap_width,
                    text_style,
                    prefix_style,
                );
                let underline_width = outputs.iter().map(|output| output.width).max();

                if block.content.is_empty()
                    && block.kind == BlockType::Paragraph
                    && self.caret.is_some_and(|caret| caret.block == block.id)
                    && let Some(output) = outputs.first_mut()
                {
                    output.spans.push(LineSegment {
                        text: EMPTY_HINT.to_string(),
                        style: Style::default().add_modifier(Modifier::DIM),
                    });
                }
                self.consume_lines(&mut context, outputs);

                let underline = match block.kind {
                    BlockType::Heading1 => Some('='),
                    BlockType::Heading2 => Some('-'),
                    _ => None,
                };
                if let Some(ch) = underline {
                    let rule = underline_string(underline_width.unwrap_or(0), ch);
                    self.push_plain(&mut context, rule, theme.heading_style());
                }
            }
        }
    }

    fn code_block_fence(&self) -> String {
        const MIN_FENCE_WIDTH: usize = 4;
        "-".repeat(self.wrap_width.max(MIN_FENCE_WIDTH))
    }

    fn push_plain(&mut self, context: &mut BlockContext, text: String, style: Style) {
        let mut output = LineOutput::single(text, style);
        output.positions.clear();
        self.consume_lines(context, vec![output]);
    }

    fn consume_lines(&mut self, context: &mut BlockContext, outputs: Vec<LineOutput>) {
        let caret_offset = self
            .caret
            .filter(|caret| caret.block == context.id)
            .map(|caret| caret.offset);

        for output in outputs {
            let line_index = self.lines.len();
            let mut spans: Vec<Span<'static>> = Vec::with_capacity(output.spans.len() + 1);
            if self.left_padding > 0 {
                spans.push(self.gutter(context.first_line));
            }
            for segment in output.spans {
                let style = match context.highlight {
                    Some(highlight) => segment.style.patch(highlight),
                    None => segment.style,
                };
                spans.push(Span::styled(segment.text, style));
            }

            for (offset, column) in output.positions {
                let position = CursorVisualPosition {
                    line: line_index,
                    column: (self.left_padding + column).min(u16::MAX as usize) as u16,
                };
                self.cursor_map.push((
                    CaretLocation {
                        block: context.id,
                        offset,
                    },
                    position,
                ));
                if caret_offset == Some(offset) {
                    self.cursor = Some(position);
                }
            }

            self.lines.push(Line::from(spans));
            context.first_line = false;
        }
    }

    fn gutter(&self, first_line: bool) -> Span<'static> {
        let handle_width = visible_width(DRAG_HANDLE);
        if first_line && self.left_padding >= handle_width {
            let text = format!(
                "{}{}",
                " ".repeat(self.left_padding - handle_width),
                DRAG_HANDLE
            );
            Span::styled(text, self.theme.handle_style())
        } else {
            Span::raw(" ".repeat(self.left_padding))
        }
    }

    fn finish(mut self) -> RenderResult {
        if self.lines.is_empty() {
            self.lines.push(Line::from(""));
        }
        // Offsets past the end (stale carets) snap to the block end.
        if self.cursor.is_none()
            && let Some(caret) = self.caret
        {
            self.cursor = self
                .cursor_map
                .iter()
                .filter(|(location, _)| location.block == caret.block)
                .map(|(_, position)| *position)
                .next_back();
        }
        let total_lines = self.lines.len();
        RenderResult {
            lines: self.lines,
            cursor: self.cursor,
            total_lines,
            block_rows: self.block_rows,
            cursor_map: self.cursor_map,
        }
    }
}

struct BlockContext {
    id: BlockId,
    highlight: Option<Style>,
    first_line: bool,
}

fn list_prefixes(block: &Block, ordinal: usize) -> (String, String) {
    let marker = match block.kind {
        BlockType::Bullet => "• ".to_string(),
        BlockType::OrderedList => format!("{ordinal}. "),
        BlockType::Checklist if block.is_checked() => "[✓] ".to_string(),
        BlockType::Checklist => "[ ] ".to_string(),
        BlockType::Quote => return ("| ".to_string(), "| ".to_string()),
        _ => String::new(),
    };
    let continuation = " ".repeat(visible_width(&marker));
    (marker, continuation)
}

struct LineSegment {
    text: String,
    style: Style,
}

/// One wrapped line plus the column of every caret offset that lands on it.
struct LineOutput {
    spans: Vec<LineSegment>,
    positions: Vec<(usize, usize)>,
    width: usize,
}

impl LineOutput {
    /// A line without text of its own; offset 0 of the block maps to its start.
    fn single(text: String, style: Style) -> Self {
        let width = visible_width(&text);
        Self {
            spans: vec![LineSegment { text, style }],
            positions: vec![(0, 0)],
            width,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FragmentKind {
    Word,
    Whitespace,
}

#[derive(Clone, Debug)]
struct Fragment {
    text: String,
    width: usize,
    start: usize,
    kind: FragmentKind,
}

impl Fragment {
    /// Splits off the longest prefix that fits in `available` columns, at least one char.
    fn split_to_width(&self, available: usize) -> Option<(Fragment, Fragment)> {
        let mut head = String::new();
        let mut head_width = 0;
        let mut head_chars = 0;
        for ch in self.text.chars() {
            let ch_width = char_width(ch);
            if head_chars > 0 && head_width + ch_width > available {
                break;
            }
            head.push(ch);
            head_width += ch_width;
            head_chars += 1;
        }
        let tail = self.text[head.len()..].to_string();
        if tail.is_empty() {
            return None;
        }
        let tail_width = visible_width(&tail);
        Some((
            Fragment {
                text: head,
                width: head_width,
                start: self.start,
                kind: self.kind,
            },
            Fragment {
                text: tail,
                width: tail_width,
                start: self.start + head_chars,
                kind: self.kind,
            },
        ))
    }
}

enum FragmentItem {
    Token(Fragment),
    LineBreak { offset: usize },
}

fn tokenize_text(text: &str) -> Vec<FragmentItem> {
    let mut items = Vec::new();
    let mut current: Option<Fragment> = None;

    for (offset, ch) in text.chars().enumerate() {
        if ch == '\n' {
            if let Some(fragment) = current.take() {
                items.push(FragmentItem::Token(fragment));
            }
            items.push(FragmentItem::LineBreak { offset });
            continue;
        }
        let kind = if ch.is_whitespace() {
            FragmentKind::Whitespace
        } else {
            FragmentKind::Word
        };
        match current.as_mut() {
            Some(fragment) if fragment.kind == kind => {
                fragment.text.push(ch);
                fragment.width += char_width(ch);
            }
            _ => {
                if let Some(fragment) = current.take() {
                    items.push(FragmentItem::Token(fragment));
                }
                current = Some(Fragment {
                    text: ch.to_string(),
                    width: char_width(ch),
                    start: offset,
                    kind,
                });
            }
        }
    }
    if let Some(fragment) = current {
        items.push(FragmentItem::Token(fragment));
    }
    items
}

fn wrap_text(
    text: &str,
    (first_prefix, continuation_prefix): (&str, &str),
    width: usize,
    text_style: Style,
    prefix_style: Style,
) -> Vec<LineOutput> {
    let mut outputs = Vec::new();
    let mut builder = LineBuilder::new(first_prefix, prefix_style);
    let mut pending_whitespace: Vec<Fragment> = Vec::new();

    for item in tokenize_text(text) {
        match item {
            FragmentItem::LineBreak { offset } => {
                builder.consume_pending(&mut pending_whitespace, text_style);
                builder.positions.push((offset, builder.width));
                outputs.push(builder.build_line());
                builder = LineBuilder::new(continuation_prefix, prefix_style);
            }
            FragmentItem::Token(token) => match token.kind {
                FragmentKind::Whitespace => pending_whitespace.push(token),
                FragmentKind::Word => {
                    let whitespace_width: usize =
                        pending_whitespace.iter().map(|item| item.width).sum();
                    if builder.width > builder.prefix_width
                        && builder.width + whitespace_width + token.width > width
                    {
                        builder.consume_pending(&mut pending_whitespace, text_style);
                        outputs.push(builder.build_line());
                        builder = LineBuilder::new(continuation_prefix, prefix_style);
                    }
                    builder.consume_pending(&mut pending_whitespace, text_style);

                    let mut token = token;
                    while builder.width + token.width > width {
                        let available = width.saturating_sub(builder.width);
                        let Some((head, tail)) = token.split_to_width(available) else {
                            break;
                        };
                        builder.append(head, text_style);
                        outputs.push(builder.build_line());
                        builder = LineBuilder::new(continuation_prefix, prefix_style);
                        token = tail;
                    }
                    builder.append(token, text_style);
                }
            },
        }
    }

    builder.consume_pending(&mut pending_whitespace, text_style);
    builder.positions.push((text.chars().count(), builder.width));
    outputs.push(builder.build_line());
    outputs
}

struct LineBuilder {
    segments: Vec<LineSegment>,
    positions: Vec<(usize, usize)>,
    width: usize,
    prefix_width: usize,
}

impl LineBuilder {
    fn new(prefix: &str, prefix_style: Style) -> Self {
        let prefix_width = visible_width(prefix);
        let mut segments = Vec::new();
        if !prefix.is_empty() {
            segments.push(LineSegment {
                text: prefix.to_string(),
                style: prefix_style,
            });
        }
        Self {
            segments,
            positions: Vec::new(),
            width: prefix_width,
            prefix_width,
        }
    }

    fn consume_pending(&mut self, pending_whitespace: &mut Vec<Fragment>, style: Style) {
        for fragment in pending_whitespace.drain(..) {
            self.append(fragment, style);
        }
    }

    fn append(&mut self, fragment: Fragment, style: Style) {
        let mut column = self.width;
        for (idx, ch) in fragment.text.chars().enumerate() {
            self.positions.push((fragment.start + idx, column));
            column += char_width(ch);
        }
        self.width += fragment.width;
        self.segments.push(LineSegment {
            text: fragment.text,
            style,
        });
    }

    fn build_line(mut self) -> LineOutput {
        if self.segments.is_empty() {
            self.segments.push(LineSegment {
                text: String::new(),
                style: Style::default(),
            });
        }
        LineOutput {
            spans: self.segments,
            positions: self.positions,
            width: self.width.saturating_sub(self.prefix_width),
        }
    }
}

fn char_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

fn visible_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}

fn underline_string(width: usize, ch: char) -> String {
    std::iter::repeat_n(ch, width.max(1)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(blocks: &[Block], width: usize, caret: Option<CaretLocation>) -> RenderResult {
        let theme = Theme::default();
        let selection = HashSet::new();
        render_blocks(
            blocks,
            &RenderOptions {
                wrap_width: width,
                left_padding: 0,
                caret,
                selection: &selection,
                focused_block: None,
                theme: &theme,
            },
        )
    }

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn list_items_share_a_run_and_number_in_order() {
        let blocks = vec![
            Block::new(BlockType::OrderedList, "one"),
            Block::new(BlockType::OrderedList, "two"),
            Block::new(BlockType::Bullet, "dot"),
            Block::new(BlockType::Checklist, "done").with_properties(json!({ "checked": true })),
        ];
        let result = render(&blocks, 40, None);
        let texts: Vec<String> = result.lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["1. one", "2. two", "", "• dot", "", "[✓] done"]);
    }

    #[test]
    fn paragraphs_are_separated_by_blank_lines() {
        let blocks = vec![
            Block::new(BlockType::Paragraph, "a"),
            Block::new(BlockType::Paragraph, "b"),
        ];
        let result = render(&blocks, 40, None);
        assert_eq!(result.total_lines, 3);
        assert_eq!(result.block_rows[1].start, 2);
        assert_eq!(result.block_rows[1].end, 3);
    }

    #[test]
    fn long_text_wraps_at_word_boundaries() {
        let blocks = vec![Block::new(BlockType::Bullet, "alpha beta gamma")];
        let result = render(&blocks, 12, None);
        let texts: Vec<String> = result.lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["• alpha beta ", "  gamma"]);
    }

    #[test]
    fn overlong_words_are_split() {
        let blocks = vec![Block::new(BlockType::Paragraph, "abcdefghij")];
        let result = render(&blocks, 4, None);
        let texts: Vec<String> = result.lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn caret_maps_to_wrapped_line_and_column() {
        let block = Block::new(BlockType::Paragraph, "alpha beta gamma");
        let id = block.id;
        let result = render(
            &[block],
            11,
            Some(CaretLocation {
                block: id,
                offset: 12,
            }),
        );
        assert_eq!(
            result.cursor,
            Some(CursorVisualPosition { line: 1, column: 1 })
        );
    }

    #[test]
    fn every_offset_has_exactly_one_position() {
        let block = Block::new(BlockType::Quote, "one two\nthree");
        let len = block.char_len();
        let result = render(&[block], 6, None);
        let mut offsets: Vec<usize> = result
            .cursor_map
            .iter()
            .map(|(location, _)| location.offset)
            .collect();
        offsets.sort_unstable();
        assert_eq!(offsets, (0..=len).collect::<Vec<_>>());
    }

    #[test]
    fn code_blocks_keep_lines_and_are_fenced() {
        let blocks = vec![Block::new(BlockType::Code, "let a = 1;\nlet b = 2;")];
        let result = render(&blocks, 8, None);
        let texts: Vec<String> = result.lines.iter().map(line_text).collect();
        assert_eq!(
            texts,
            vec!["--------", "let a = 1;", "let b = 2;", "--------"]
        );
    }

    #[test]
    fn headings_are_underlined() {
        let blocks = vec![Block::new(BlockType::Heading1, "Title")];
        let result = render(&blocks, 40, None);
        assert_eq!(line_text(&result.lines[1]), "=====");
        assert!(result.lines[0].spans[0].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn stale_caret_offset_snaps_to_block_end() {
        let block = Block::new(BlockType::Paragraph, "abc");
        let id = block.id;
        let result = render(
            &[block],
            40,
            Some(CaretLocation {
                block: id,
                offset: 99,
            }),
        );
        assert_eq!(
            result.cursor,
            Some(CursorVisualPosition { line: 0, column: 3 })
        );
    }

    #[test]
    fn gutter_shows_drag_handle_on_first_line() {
        let theme = Theme::default();
        let selection = HashSet::new();
        let blocks = vec![Block::new(BlockType::Paragraph, "alpha beta")];
        let result = render_blocks(
            &blocks,
            &RenderOptions {
                wrap_width: 6,
                left_padding: 3,
                caret: None,
                selection: &selection,
                focused_block: None,
                theme: &theme,
            },
        );
        assert_eq!(line_text(&result.lines[0]), " ⠿ alpha ");
        assert_eq!(line_text(&result.lines[1]), "   beta");
    }
}
