use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Stable identifier of a block. Generated once and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(Uuid);

impl BlockId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockType {
    Paragraph,
    Heading1,
    Heading2,
    Heading3,
    Bullet,
    OrderedList,
    Checklist,
    Quote,
    Code,
    Divider,
    Image,
}

impl BlockType {
    pub const ALL: [BlockType; 11] = [
        BlockType::Paragraph,
        BlockType::Heading1,
        BlockType::Heading2,
        BlockType::Heading3,
        BlockType::Bullet,
        BlockType::OrderedList,
        BlockType::Checklist,
        BlockType::Quote,
        BlockType::Code,
        BlockType::Divider,
        BlockType::Image,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BlockType::Paragraph => "Text",
            BlockType::Heading1 => "Heading 1",
            BlockType::Heading2 => "Heading 2",
            BlockType::Heading3 => "Heading 3",
            BlockType::Bullet => "Bulleted List",
            BlockType::OrderedList => "Numbered List",
            BlockType::Checklist => "Checklist",
            BlockType::Quote => "Quote",
            BlockType::Code => "Code",
            BlockType::Divider => "Divider",
            BlockType::Image => "Image",
        }
    }

    /// Pressing Enter at the end of one of these continues the same type.
    pub fn is_list(self) -> bool {
        matches!(
            self,
            BlockType::Bullet | BlockType::OrderedList | BlockType::Checklist
        )
    }

    /// Whether the block carries editable text the caret can enter.
    pub fn is_textual(self) -> bool {
        !matches!(self, BlockType::Divider | BlockType::Image)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub kind: BlockType,
    pub content: String,
    /// `None` when the key is absent. An explicit `null` is kept as
    /// `Some(Value::Null)` so it is written back.
    #[serde(
        default,
        deserialize_with = "present_properties",
        skip_serializing_if = "Option::is_none"
    )]
    pub properties: Option<Value>,
}

fn present_properties<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Block {
    pub fn new(kind: BlockType, content: impl Into<String>) -> Self {
        Self {
            id: BlockId::new(),
            kind,
            content: content.into(),
            properties: None,
        }
    }

    pub fn empty_paragraph() -> Self {
        Self::new(BlockType::Paragraph, "")
    }

    pub fn with_properties(mut self, properties: Value) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn is_checked(&self) -> bool {
        self.properties
            .as_ref()
            .and_then(|props| props.get("checked"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
