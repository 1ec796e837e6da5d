use std::collections::HashSet;

use tracing::debug;

use super::VerticalDirection;
use super::caret::{CaretController, CaretPosition};
use super::store::BlockStore;
use crate::block::BlockId;

/// Blocks marked for bulk operations. Independent of the caret.
#[derive(Debug, Default)]
pub struct SelectionController {
    selected: HashSet<BlockId>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &HashSet<BlockId> {
        &self.selected
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn clear(&mut self) -> bool {
        let had_selection = !self.selected.is_empty();
        self.selected.clear();
        had_selection
    }

    /// Selects only `id`, or deselects it when it already is the sole member.
    pub fn toggle(&mut self, store: &BlockStore, id: BlockId) -> bool {
        if !store.contains(&id) {
            return false;
        }
        if self.selected.len() == 1 && self.selected.contains(&id) {
            self.selected.clear();
        } else {
            self.selected.clear();
            self.selected.insert(id);
        }
        true
    }

    /// Adds `from` and its neighbour in `direction`, moving the caret onto the neighbour.
    pub fn expand(
        &mut self,
        store: &BlockStore,
        caret: &mut CaretController,
        from: BlockId,
        direction: VerticalDirection,
    ) -> bool {
        let neighbour = match direction {
            VerticalDirection::Up => store.previous(&from),
            VerticalDirection::Down => store.next(&from),
        };
        let Some(neighbour) = neighbour.map(|block| block.id) else {
            return false;
        };
        self.selected.insert(from);
        self.selected.insert(neighbour);
        let position = match direction {
            VerticalDirection::Up => CaretPosition::End,
            VerticalDirection::Down => CaretPosition::Start,
        };
        caret.schedule(neighbour, position);
        true
    }

    /// Removes every selected block and focuses the closest block before them.
    pub fn delete_selected(&mut self, store: &mut BlockStore, caret: &mut CaretController) -> bool {
        let Some(earliest) = store
            .blocks()
            .iter()
            .position(|block| self.selected.contains(&block.id))
        else {
            self.selected.clear();
            return false;
        };
        let predecessor = earliest
            .checked_sub(1)
            .and_then(|index| store.block_at(index))
            .map(|block| block.id);

        let removed = store.remove_many(&self.selected);
        debug!(removed, "deleted selected blocks");
        self.selected.clear();

        let target = predecessor.or_else(|| store.first().map(|block| block.id));
        if let Some(target) = target {
            caret.schedule(target, CaretPosition::End);
        }
        true
    }

    /// Forgets ids that no longer exist in the store.
    pub fn retain_existing(&mut self, store: &BlockStore) {
        self.selected.retain(|id| store.contains(id));
    }
}
