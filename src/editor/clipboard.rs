use std::io::Cursor;

use serde_json::json;
use tdoc::html::gockl::{Token, Tokenizer};
use tracing::debug;

use super::caret::{CaretController, CaretPosition};
use super::store::BlockStore;
use crate::block::{Block, BlockId, BlockType};
use crate::exchange::blocks_from_markup_document;

const MIN_FENCE_WIDTH: usize = 3;
const DIVIDER_MARKER: &str = "---";

/// Deeper markup is read as plain text; tdoc's HTML reader recurses per level.
const MAX_MARKUP_DEPTH: usize = 256;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose contents tdoc skips, plus `pre`, where nothing is split out.
const OPAQUE_ELEMENTS: &[&str] = &["nav", "pre", "script", "style", "title"];

/// Turns clipboard content into blocks. HTML wins when it yields anything;
/// otherwise, or when the markup is broken, the plain text is used.
pub fn parse_clipboard(plain_text: &str, html: Option<&str>) -> Vec<Block> {
    if let Some(html) = html.filter(|html| !html.trim().is_empty()) {
        match parse_html(html) {
            Some(blocks) if !blocks.is_empty() => return blocks,
            Some(_) => debug!("html paste produced no blocks, using plain text"),
            None => debug!("unreadable html paste, using plain text"),
        }
    }
    parse_plain_text(plain_text)
}

/// Returns `None` when the markup is unterminated, nested too deeply, or
/// rejected by tdoc.
pub fn parse_html(html: &str) -> Option<Vec<Block>> {
    let mut blocks = Vec::new();
    for piece in split_markup(html)? {
        match piece {
            MarkupPiece::Markup(markup) => {
                let document = match tdoc::html::parse(Cursor::new(markup)) {
                    Ok(document) => document,
                    Err(err) => {
                        debug!(%err, "tdoc rejected html paste");
                        return None;
                    }
                };
                blocks.extend(
                    blocks_from_markup_document(&document)
                        .into_iter()
                        .filter_map(settle_markup_block),
                );
            }
            MarkupPiece::Block(block) => blocks.push(block),
        }
    }
    Some(blocks)
}

enum MarkupPiece {
    Markup(String),
    Block(Block),
}

/// Walks the tokens once before tdoc sees them. Dividers and images are cut
/// out as blocks of their own, void elements are closed, and checkboxes become
/// task markers.
fn split_markup(html: &str) -> Option<Vec<MarkupPiece>> {
    let mut tokenizer = Tokenizer::new(html);
    let mut pieces = Vec::new();
    let mut markup = String::new();
    let mut open: Vec<String> = Vec::new();

    while let Ok(token) = tokenizer.next_token() {
        let element = match &token {
            Token::StartElement(start) => Some((start.name().to_ascii_lowercase(), true)),
            Token::EmptyElement(empty) => Some((empty.name().to_ascii_lowercase(), false)),
            Token::EndElement(end) => {
                if !token.raw().ends_with('>') {
                    return None;
                }
                let name = end.name().to_ascii_lowercase();
                if let Some(pos) = open.iter().rposition(|item| *item == name) {
                    open.truncate(pos);
                }
                None
            }
            _ => None,
        };
        let Some((name, starts)) = element else {
            markup.push_str(token.raw());
            continue;
        };
        if !token.raw().ends_with('>') {
            return None;
        }

        if VOID_ELEMENTS.contains(&name.as_str()) || !starts {
            let opaque = open.iter().any(|item| OPAQUE_ELEMENTS.contains(&item.as_str()));
            let attribute = |key: &str| match &token {
                Token::StartElement(start) => start.attribute(key),
                Token::EmptyElement(empty) => empty.attribute(key),
                _ => None,
            };
            match name.as_str() {
                "hr" if !opaque => {
                    flush_markup(&mut markup, &mut pieces);
                    pieces.push(MarkupPiece::Block(Block::new(BlockType::Divider, "")));
                }
                "img" if !opaque => {
                    flush_markup(&mut markup, &mut pieces);
                    pieces.push(MarkupPiece::Block(image_block(
                        &attribute("alt").unwrap_or_default(),
                        &attribute("src").unwrap_or_default(),
                    )));
                }
                "input" if !opaque => {
                    if attribute("type").is_some_and(|kind| kind.eq_ignore_ascii_case("checkbox")) {
                        let mark = if attribute("checked").is_some() { 'x' } else { ' ' };
                        markup.push_str(&format!("[{mark}] "));
                    }
                }
                _ => markup.push_str(&self_closing(token.raw())),
            }
            continue;
        }

        if name == "li" && open.last().is_some_and(|last| last == "li") {
            open.pop();
        }
        open.push(name);
        if open.len() > MAX_MARKUP_DEPTH {
            debug!(depth = open.len(), "html paste nested too deeply");
            return None;
        }
        markup.push_str(token.raw());
    }

    flush_markup(&mut markup, &mut pieces);
    Some(pieces)
}

fn flush_markup(markup: &mut String, pieces: &mut Vec<MarkupPiece>) {
    if !markup.trim().is_empty() {
        pieces.push(MarkupPiece::Markup(std::mem::take(markup)));
    }
    markup.clear();
}

fn self_closing(raw: &str) -> String {
    match raw.strip_suffix('>') {
        Some(body) if !body.ends_with('/') => format!("{}/>", body.trim_end()),
        _ => raw.to_string(),
    }
}

fn image_block(alt: &str, src: &str) -> Block {
    let block = Block::new(BlockType::Image, alt);
    if src.is_empty() {
        block
    } else {
        block.with_properties(json!({ "src": src }))
    }
}

/// Final touches on a block read from markup. Blank text blocks are dropped.
fn settle_markup_block(mut block: Block) -> Option<Block> {
    match block.kind {
        BlockType::Code => {
            let content = block.content.strip_prefix('\n').unwrap_or(&block.content);
            block.content = content.trim_end_matches('\n').to_string();
        }
        BlockType::Bullet | BlockType::OrderedList => {
            if let Some((checked, rest)) = strip_task_marker(&block.content) {
                return Some(checklist_block(rest, checked));
            }
        }
        _ => {}
    }
    let blank = block.kind.is_textual()
        && block.kind != BlockType::Checklist
        && block.content.trim().is_empty();
    (!blank).then_some(block)
}

fn strip_task_marker(content: &str) -> Option<(bool, &str)> {
    for (marker, checked) in [("[ ]", false), ("[x]", true), ("[X]", true)] {
        if let Some(rest) = content.strip_prefix(marker)
            && (rest.is_empty() || rest.starts_with(' '))
        {
            return Some((checked, rest.trim_start()));
        }
    }
    None
}

fn checklist_block(content: &str, checked: bool) -> Block {
    Block::new(BlockType::Checklist, content).with_properties(json!({ "checked": checked }))
}

/// Splits plain text into blocks, one per line, recognising simple markers.
///
/// A single final line break ends the last line; any further blank lines are
/// empty paragraphs. A line ending in an odd run of backslashes continues the
/// same block on the next line, and each trailing pair of backslashes stands
/// for one. A leading backslash in front of something that reads as a marker
/// keeps the line a paragraph.
pub fn parse_plain_text(text: &str) -> Vec<Block> {
    if text.is_empty() {
        return Vec::new();
    }
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let body = normalized.strip_suffix('\n').unwrap_or(&normalized);

    let mut blocks = Vec::new();
    let mut lines = body.split('\n');
    while let Some(line) = lines.next() {
        if let Some(width) = opening_fence(line) {
            let mut code = Vec::new();
            for inner in lines.by_ref() {
                if closes_fence(inner, width) {
                    break;
                }
                code.push(inner);
            }
            blocks.push(Block::new(BlockType::Code, code.join("\n")));
            continue;
        }

        let (mut content, mut continues) = unescape_line_end(line);
        while continues {
            let Some(next) = lines.next() else {
                break;
            };
            let (more, more_continues) = unescape_line_end(next);
            content.push('\n');
            content.push_str(&more);
            continues = more_continues;
        }
        blocks.push(parse_line(&content));
    }
    blocks
}

fn unescape_line_end(line: &str) -> (String, bool) {
    let stem = line.trim_end_matches('\\');
    let run = line.len() - stem.len();
    let mut text = String::with_capacity(line.len());
    text.push_str(stem);
    text.extend(std::iter::repeat_n('\\', run / 2));
    (text, run % 2 == 1)
}

fn opening_fence(line: &str) -> Option<usize> {
    let width = line.trim_start().chars().take_while(|ch| *ch == '`').count();
    (width >= MIN_FENCE_WIDTH).then_some(width)
}

fn closes_fence(line: &str, width: usize) -> bool {
    let line = line.trim();
    line.len() >= width && line.chars().all(|ch| ch == '`')
}

/// Whether a paragraph line would be read back as something else.
fn needs_escape(line: &str) -> bool {
    let bare = line.trim_start_matches('\\');
    opening_fence(bare).is_some() || parse_marked_line(bare).kind != BlockType::Paragraph
}

fn parse_line(content: &str) -> Block {
    if let Some(rest) = content.strip_prefix('\\') {
        let first_line = rest.split('\n').next().unwrap_or_default();
        if needs_escape(first_line) {
            return Block::new(BlockType::Paragraph, rest);
        }
    }
    parse_marked_line(content)
}

fn parse_marked_line(line: &str) -> Block {
    const PREFIXES: &[(&str, BlockType)] = &[
        ("### ", BlockType::Heading3),
        ("## ", BlockType::Heading2),
        ("# ", BlockType::Heading1),
        ("- ", BlockType::Bullet),
        ("* ", BlockType::Bullet),
        ("• ", BlockType::Bullet),
        ("> ", BlockType::Quote),
    ];

    for (marker, checked) in [("- [ ] ", false), ("- [x] ", true), ("- [X] ", true)] {
        if let Some(rest) = line.strip_prefix(marker) {
            return checklist_block(rest, checked);
        }
    }
    for (marker, kind) in PREFIXES {
        if let Some(rest) = line.strip_prefix(marker) {
            return Block::new(*kind, rest);
        }
    }
    if let Some(rest) = strip_ordered_marker(line) {
        return Block::new(BlockType::OrderedList, rest);
    }
    if !line.contains('\n') {
        if line.trim() == DIVIDER_MARKER {
            return Block::new(BlockType::Divider, "");
        }
        if let Some(image) = parse_image_marker(line) {
            return image;
        }
    }
    Block::new(BlockType::Paragraph, line)
}

fn strip_ordered_marker(line: &str) -> Option<&str> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    line[digits..].strip_prefix(". ")
}

fn parse_image_marker(line: &str) -> Option<Block> {
    let rest = line.trim().strip_prefix("![")?;
    let (alt, rest) = rest.split_once("](")?;
    let src = rest.strip_suffix(')')?;
    Some(image_block(alt, src))
}

/// Renders blocks with the same markers [`parse_plain_text`] understands.
/// Every block ends with a line break, so empty trailing blocks survive.
pub fn to_plain_text(blocks: &[Block]) -> String {
    let mut text = String::new();
    let mut ordinal = 0;
    for block in blocks {
        if block.kind == BlockType::OrderedList {
            ordinal += 1;
        } else {
            ordinal = 0;
        }
        let content = escape_lines(&block.content);
        match block.kind {
            BlockType::Paragraph => {
                let first_line = block.content.split('\n').next().unwrap_or_default();
                if needs_escape(first_line) {
                    text.push('\\');
                }
                text.push_str(&content);
            }
            BlockType::Heading1 => text.push_str(&format!("# {content}")),
            BlockType::Heading2 => text.push_str(&format!("## {content}")),
            BlockType::Heading3 => text.push_str(&format!("### {content}")),
            BlockType::Bullet if strip_task_marker(&block.content).is_some() => {
                text.push_str(&format!("* {content}"))
            }
            BlockType::Bullet => text.push_str(&format!("- {content}")),
            BlockType::OrderedList => text.push_str(&format!("{ordinal}. {content}")),
            BlockType::Checklist => {
                let mark = if block.is_checked() { 'x' } else { ' ' };
                text.push_str(&format!("- [{mark}] {content}"));
            }
            BlockType::Quote => text.push_str(&format!("> {content}")),
            BlockType::Code => {
                let fence = code_fence(&block.content);
                text.push_str(&format!("{fence}\n{}\n{fence}", block.content));
            }
            BlockType::Divider => text.push_str(DIVIDER_MARKER),
            BlockType::Image => {
                let src = block
                    .properties
                    .as_ref()
                    .and_then(|props| props.get("src"))
                    .and_then(|src| src.as_str())
                    .unwrap_or_default();
                text.push_str(&format!("![{}]({src})", block.content));
            }
        }
        text.push('\n');
    }
    text
}

/// Soft line breaks become continuation backslashes; trailing backslashes
/// are doubled.
fn escape_lines(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for (index, line) in content.split('\n').enumerate() {
        if index > 0 {
            out.push_str("\\\n");
        }
        out.push_str(line);
        let run = line.len() - line.trim_end_matches('\\').len();
        out.extend(std::iter::repeat_n('\\', run));
    }
    out
}

/// A fence longer than any backtick run inside the code.
fn code_fence(content: &str) -> String {
    let longest = content
        .split(|ch: char| ch != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat((longest + 1).max(MIN_FENCE_WIDTH))
}

/// Injects parsed blocks at `target`. Returns false when nothing changed.
pub(crate) fn inject(
    store: &mut BlockStore,
    caret: &mut CaretController,
    target: &BlockId,
    parsed: Vec<Block>,
) -> bool {
    let Some(existing) = store.get(target).cloned() else {
        return false;
    };
    let mut parsed = parsed.into_iter();
    let Some(first) = parsed.next() else {
        return false;
    };
    let rest: Vec<Block> = parsed.collect();
    debug!(%target, count = rest.len() + 1, "paste blocks");

    let last = store.batch(|store| {
        let content = if existing.content.is_empty() {
            first.content
        } else {
            format!("{} {}", existing.content, first.content)
        };
        store.replace_type(target, first.kind, content);
        if first.properties.is_some() || existing.kind != first.kind {
            store.set_properties(target, first.properties);
        }

        let mut last = *target;
        for block in rest {
            last = store.insert_block_after(Some(&last), block).id;
        }
        last
    });
    caret.schedule(last, CaretPosition::End);
    true
}
