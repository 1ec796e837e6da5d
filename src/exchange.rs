//! Conversions between blocks and the formats documents are stored in.
//!
//! JSON is the lossless exchange format. FTML and Markdown go through
//! `tdoc`; dividers and images have no counterpart there and are written as
//! text paragraphs.

use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tdoc::{
    ChecklistItem, Document, InlineStyle, Paragraph, ParagraphType, Span, markdown,
    writer::Writer,
};
use tracing::debug;

use crate::block::{Block, BlockType};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Markdown,
    Ftml,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("json") => DocumentFormat::Json,
            Some("md") | Some("markdown") | Some("mkd") | Some("mdown") | Some("mdtxt") => {
                DocumentFormat::Markdown
            }
            _ => DocumentFormat::Ftml,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DocumentFormat::Json => "JSON",
            DocumentFormat::Markdown => "Markdown",
            DocumentFormat::Ftml => "FTML",
        }
    }
}

pub fn to_json(blocks: &[Block]) -> Result<String> {
    serde_json::to_string_pretty(blocks).context("failed to serialize blocks")
}

pub fn from_json(text: &str) -> Result<Vec<Block>> {
    serde_json::from_str(text).context("failed to parse block JSON")
}

pub fn read_blocks(content: &str, format: DocumentFormat) -> Result<Vec<Block>> {
    let blocks = match format {
        DocumentFormat::Json => from_json(content)?,
        DocumentFormat::Ftml => {
            let document = tdoc::parse(Cursor::new(content))
                .map_err(|err| anyhow!("{err}"))
                .context("failed to parse FTML")?;
            blocks_from_document(&document)
        }
        DocumentFormat::Markdown => {
            let document = markdown::parse(Cursor::new(content))
                .map_err(|err| anyhow!("{err}"))
                .context("failed to parse Markdown")?;
            blocks_from_document(&document)
        }
    };
    debug!(count = blocks.len(), format = format.label(), "read blocks");
    Ok(blocks)
}

pub fn write_blocks(blocks: &[Block], format: DocumentFormat) -> Result<String> {
    match format {
        DocumentFormat::Json => to_json(blocks),
        DocumentFormat::Ftml => Writer::new()
            .write_to_string(&document_from_blocks(blocks))
            .context("failed to render FTML"),
        DocumentFormat::Markdown => {
            let mut contents = Vec::new();
            markdown::write(&mut contents, &document_from_blocks(blocks))
                .context("failed to render Markdown")?;
            String::from_utf8(contents).context("Markdown output is not UTF-8")
        }
    }
}

/// Flattens a tdoc document into blocks. Nested structure is linearised in
/// reading order; inline styles are dropped.
pub fn blocks_from_document(document: &Document) -> Vec<Block> {
    Flattener::default().flatten(document)
}

/// Flattens a document built from pasted markup. A paragraph made only of
/// inline code becomes a code block, the way a bare `<code>` element is read.
pub fn blocks_from_markup_document(document: &Document) -> Vec<Block> {
    Flattener {
        inline_code_blocks: true,
    }
    .flatten(document)
}

#[derive(Default)]
struct Flattener {
    inline_code_blocks: bool,
}

impl Flattener {
    fn flatten(&self, document: &Document) -> Vec<Block> {
        let mut blocks = Vec::new();
        for paragraph in &document.paragraphs {
            self.collect_paragraph(paragraph, &mut blocks);
        }
        blocks
    }

    fn collect_paragraph(&self, paragraph: &Paragraph, out: &mut Vec<Block>) {
        match paragraph.paragraph_type() {
            ParagraphType::Header1 => out.push(text_block(BlockType::Heading1, paragraph)),
            ParagraphType::Header2 => out.push(text_block(BlockType::Heading2, paragraph)),
            ParagraphType::Header3 => out.push(text_block(BlockType::Heading3, paragraph)),
            ParagraphType::CodeBlock => out.push(text_block(BlockType::Code, paragraph)),
            ParagraphType::Quote => {
                for child in paragraph.children() {
                    let mut nested = Vec::new();
                    self.collect_paragraph(child, &mut nested);
                    out.extend(nested.into_iter().map(|mut block| {
                        if block.kind == BlockType::Paragraph {
                            block.kind = BlockType::Quote;
                        }
                        block
                    }));
                }
            }
            ParagraphType::UnorderedList => self.collect_entries(paragraph, BlockType::Bullet, out),
            ParagraphType::OrderedList => {
                self.collect_entries(paragraph, BlockType::OrderedList, out)
            }
            ParagraphType::Checklist => {
                for item in paragraph.checklist_items() {
                    collect_checklist_item(item, out);
                }
            }
            _ if self.inline_code_blocks && is_inline_code(paragraph.content()) => {
                out.push(text_block(BlockType::Code, paragraph))
            }
            _ => out.push(text_block(BlockType::Paragraph, paragraph)),
        }
    }

    fn collect_entries(&self, paragraph: &Paragraph, kind: BlockType, out: &mut Vec<Block>) {
        for entry in paragraph.entries() {
            let mut rest = entry.iter();
            if let Some(first) = rest.next() {
                match first.paragraph_type() {
                    ParagraphType::UnorderedList
                    | ParagraphType::OrderedList
                    | ParagraphType::Checklist => self.collect_paragraph(first, out),
                    _ => out.push(text_block(kind, first)),
                }
            }
            for nested in rest {
                self.collect_paragraph(nested, out);
            }
        }
    }
}

fn collect_checklist_item(item: &ChecklistItem, out: &mut Vec<Block>) {
    out.push(checklist_block(spans_text(&item.content), item.checked));
    for child in &item.children {
        collect_checklist_item(child, out);
    }
}

/// Every visible span is styled as code.
fn is_inline_code(spans: &[Span]) -> bool {
    let mut visible = spans
        .iter()
        .filter(|span| {
            !(span.style == InlineStyle::None
                && span.children.is_empty()
                && span.text.trim().is_empty())
        })
        .peekable();
    visible.peek().is_some() && visible.all(|span| span.style == InlineStyle::Code)
}

fn text_block(kind: BlockType, paragraph: &Paragraph) -> Block {
    let mut text = spans_text(paragraph.content());
    if text.is_empty() && !paragraph.children().is_empty() {
        let lines: Vec<String> = paragraph
            .children()
            .iter()
            .map(|child| spans_text(child.content()))
            .collect();
        text = lines.join("\n");
    }
    Block::new(kind, text)
}

fn checklist_block(content: String, checked: bool) -> Block {
    Block::new(BlockType::Checklist, content).with_properties(serde_json::json!({
        "checked": checked
    }))
}

fn spans_text(spans: &[Span]) -> String {
    let mut text = String::new();
    push_spans(spans, &mut text);
    text
}

fn push_spans(spans: &[Span], out: &mut String) {
    for span in spans {
        out.push_str(&span.text);
        push_spans(&span.children, out);
    }
}

/// Builds a tdoc document. Runs of adjacent list items of the same kind form
/// one list, adjacent quotes form one quote.
pub fn document_from_blocks(blocks: &[Block]) -> Document {
    let mut paragraphs = Vec::new();
    let mut index = 0;
    while index < blocks.len() {
        let kind = blocks[index].kind;
        let run_len = if matches!(
            kind,
            BlockType::Bullet | BlockType::OrderedList | BlockType::Checklist | BlockType::Quote
        ) {
            blocks[index..]
                .iter()
                .take_while(|block| block.kind == kind)
                .count()
        } else {
            1
        };
        let run = &blocks[index..index + run_len];
        paragraphs.push(paragraph_for_run(kind, run));
        index += run_len;
    }
    Document::new().with_paragraphs(paragraphs)
}

fn paragraph_for_run(kind: BlockType, run: &[Block]) -> Paragraph {
    match kind {
        BlockType::Bullet => Paragraph::new_unordered_list().with_entries(
            run.iter()
                .map(|block| vec![text_paragraph(&block.content)])
                .collect(),
        ),
        BlockType::OrderedList => Paragraph::new_ordered_list().with_entries(
            run.iter()
                .map(|block| vec![text_paragraph(&block.content)])
                .collect(),
        ),
        BlockType::Checklist => Paragraph::new_checklist().with_checklist_items(
            run.iter()
                .map(|block| {
                    ChecklistItem::new(block.is_checked()).with_content(spans(&block.content))
                })
                .collect(),
        ),
        BlockType::Quote => Paragraph::new_quote().with_children(
            run.iter()
                .map(|block| text_paragraph(&block.content))
                .collect(),
        ),
        BlockType::Heading1 => typed_paragraph(ParagraphType::Header1, &run[0].content),
        BlockType::Heading2 => typed_paragraph(ParagraphType::Header2, &run[0].content),
        BlockType::Heading3 => typed_paragraph(ParagraphType::Header3, &run[0].content),
        BlockType::Code => typed_paragraph(ParagraphType::CodeBlock, &run[0].content),
        BlockType::Divider => text_paragraph("---"),
        BlockType::Image => {
            let block = &run[0];
            let src = block
                .properties
                .as_ref()
                .and_then(|props| props.get("src"))
                .and_then(|src| src.as_str())
                .unwrap_or_default();
            text_paragraph(&format!("![{}]({src})", block.content))
        }
        BlockType::Paragraph => text_paragraph(&run[0].content),
    }
}

fn text_paragraph(text: &str) -> Paragraph {
    Paragraph::new_text().with_content(spans(text))
}

fn typed_paragraph(paragraph_type: ParagraphType, text: &str) -> Paragraph {
    Paragraph::new(paragraph_type).with_content(spans(text))
}

fn spans(text: &str) -> Vec<Span> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Span::new_text(text)]
    }
}
