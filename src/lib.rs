pub mod block;
pub mod editor;
pub mod editor_display;
pub mod exchange;
pub mod render;
pub mod theme;

pub use block::{Block, BlockId, BlockType};
pub use editor::{BlockEditor, EditorConfig, EditorEvent};
