use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::block::{Block, BlockId, BlockType};

pub type ChangeListener = Box<dyn FnMut(&[Block])>;

/// Ordered list of blocks. The single source of truth for document content.
///
/// Every committed mutation notifies the subscribers with the full block list,
/// once per logical operation. Mutations grouped with [`BlockStore::batch`]
/// notify once when the outermost batch finishes.
pub struct BlockStore {
    blocks: Vec<Block>,
    listeners: Vec<ChangeListener>,
    batch_depth: usize,
    pending_emit: bool,
}

impl BlockStore {
    pub fn new() -> Self {
        Self::from_blocks(Vec::new())
    }

    /// Builds a store without notifying anyone. Duplicate ids are re-keyed.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        let mut store = Self {
            blocks: Vec::new(),
            listeners: Vec::new(),
            batch_depth: 0,
            pending_emit: false,
        };
        store.blocks = dedupe_ids(blocks);
        store.ensure_not_empty();
        store
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&[Block]) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Replaces the whole document.
    pub fn load(&mut self, blocks: Vec<Block>) {
        self.blocks = dedupe_ids(blocks);
        self.ensure_not_empty();
        debug!(count = self.blocks.len(), "loaded blocks");
        self.commit();
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|block| block.id == *id)
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn index_of(&self, id: &BlockId) -> Option<usize> {
        self.blocks.iter().position(|block| block.id == *id)
    }

    pub fn block_at(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn first(&self) -> Option<&Block> {
        self.blocks.first()
    }

    pub fn previous(&self, id: &BlockId) -> Option<&Block> {
        let index = self.index_of(id)?;
        index.checked_sub(1).and_then(|idx| self.blocks.get(idx))
    }

    pub fn next(&self, id: &BlockId) -> Option<&Block> {
        let index = self.index_of(id)?;
        self.blocks.get(index + 1)
    }

    pub fn insert_after(
        &mut self,
        after: Option<&BlockId>,
        kind: BlockType,
        content: impl Into<String>,
    ) -> Block {
        self.insert_block_after(after, Block::new(kind, content))
    }

    /// Inserts a prepared block. A block whose id is already taken gets a fresh one.
    pub fn insert_block_after(&mut self, after: Option<&BlockId>, mut block: Block) -> Block {
        if self.contains(&block.id) {
            block.id = BlockId::new();
        }
        let index = after
            .and_then(|id| self.index_of(id))
            .map(|idx| idx + 1)
            .unwrap_or(self.blocks.len());
        debug!(id = %block.id, kind = ?block.kind, index, "insert block");
        self.blocks.insert(index, block.clone());
        self.commit();
        block
    }

    pub fn update(&mut self, id: &BlockId, content: impl Into<String>) -> bool {
        let Some(block) = self.blocks.iter_mut().find(|block| block.id == *id) else {
            return false;
        };
        let content = content.into();
        if block.content == content {
            return true;
        }
        block.content = content;
        self.commit();
        true
    }

    pub fn set_properties(&mut self, id: &BlockId, properties: Option<Value>) -> bool {
        let Some(block) = self.blocks.iter_mut().find(|block| block.id == *id) else {
            return false;
        };
        block.properties = properties;
        self.commit();
        true
    }

    /// Swaps type and content in one step. The id survives.
    pub fn replace_type(
        &mut self,
        id: &BlockId,
        kind: BlockType,
        content: impl Into<String>,
    ) -> bool {
        let Some(block) = self.blocks.iter_mut().find(|block| block.id == *id) else {
            return false;
        };
        debug!(%id, from = ?block.kind, to = ?kind, "replace block type");
        block.kind = kind;
        block.content = content.into();
        self.commit();
        true
    }

    pub fn remove(&mut self, id: &BlockId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.blocks.remove(index);
        debug!(%id, index, "remove block");
        self.ensure_not_empty();
        self.commit();
        true
    }

    /// Removes every listed block and returns how many were present.
    pub fn remove_many(&mut self, ids: &HashSet<BlockId>) -> usize {
        let before = self.blocks.len();
        self.blocks.retain(|block| !ids.contains(&block.id));
        let removed = before - self.blocks.len();
        if removed == 0 {
            return 0;
        }
        debug!(removed, "remove blocks");
        self.ensure_not_empty();
        self.commit();
        removed
    }

    pub fn reorder(&mut self, from_index: usize, to_index: usize) -> bool {
        let len = self.blocks.len();
        if from_index >= len || to_index >= len || from_index == to_index {
            return false;
        }
        let block = self.blocks.remove(from_index);
        debug!(id = %block.id, from_index, to_index, "reorder block");
        self.blocks.insert(to_index, block);
        self.commit();
        true
    }

    /// Runs `f` as one logical operation: subscribers see a single snapshot.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.batch_depth += 1;
        let result = f(self);
        self.batch_depth -= 1;
        if self.batch_depth == 0 && self.pending_emit {
            self.pending_emit = false;
            self.emit();
        }
        result
    }

    fn ensure_not_empty(&mut self) {
        if self.blocks.is_empty() {
            let block = Block::empty_paragraph();
            debug!(id = %block.id, "document emptied, adding default paragraph");
            self.blocks.push(block);
        }
    }

    fn commit(&mut self) {
        debug_assert!(ids_are_unique(&self.blocks), "duplicate block ids");
        if self.batch_depth > 0 {
            self.pending_emit = true;
        } else {
            self.emit();
        }
    }

    fn emit(&mut self) {
        trace!(count = self.blocks.len(), listeners = self.listeners.len(), "emit change");
        for listener in self.listeners.iter_mut() {
            listener(&self.blocks);
        }
    }
}

impl Default for BlockStore {
    fn default() -> Self {
        Self::new()
    }
}

fn dedupe_ids(blocks: Vec<Block>) -> Vec<Block> {
    let mut seen = HashSet::with_capacity(blocks.len());
    blocks
        .into_iter()
        .map(|mut block| {
            if !seen.insert(block.id) {
                let fresh = BlockId::new();
                warn!(duplicate = %block.id, %fresh, "duplicate block id on load");
                block.id = fresh;
                seen.insert(fresh);
            }
            block
        })
        .collect()
}

fn ids_are_unique(blocks: &[Block]) -> bool {
    let mut seen = HashSet::with_capacity(blocks.len());
    blocks.iter().all(|block| seen.insert(block.id))
}
