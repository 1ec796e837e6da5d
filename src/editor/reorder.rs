use super::VerticalDirection;
use super::caret::{CaretController, CaretPosition};
use super::store::BlockStore;
use crate::block::BlockId;

/// Applies a drag-drop gesture within the document.
pub fn drop_block(store: &mut BlockStore, from_index: usize, to_index: usize) -> bool {
    store.reorder(from_index, to_index)
}

/// Moves a block one position up or down, keeping the caret on it.
pub fn move_block(
    store: &mut BlockStore,
    caret: &mut CaretController,
    id: &BlockId,
    direction: VerticalDirection,
) -> bool {
    let Some(from) = store.index_of(id) else {
        return false;
    };
    let to = match direction {
        VerticalDirection::Up => match from.checked_sub(1) {
            Some(to) => to,
            None => return false,
        },
        VerticalDirection::Down => from + 1,
    };
    if !store.reorder(from, to) {
        return false;
    }
    caret.schedule(*id, CaretPosition::End);
    true
}
