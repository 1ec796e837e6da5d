use tracing::{debug, warn};

use super::store::BlockStore;
use crate::block::BlockId;

pub const MIN_RETRY_BUDGET: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaretPosition {
    Start,
    End,
    /// Character offset into the block content, clamped to its end.
    Offset(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaretRequest {
    pub block_id: BlockId,
    pub position: CaretPosition,
}

/// A position inside the rendered text of a block: a run index and a
/// character offset inside that run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextPosition {
    pub run: usize,
    pub offset: usize,
}

/// Implemented by the rendering layer. Maps block ids to whatever it has
/// drawn for them and performs the actual focus change.
pub trait RenderSurface {
    /// Character length of each text run of a rendered block, or `None`
    /// if the block has not been rendered yet.
    fn text_runs(&self, block: &BlockId) -> Option<Vec<usize>>;

    fn focus(&mut self, block: &BlockId, position: TextPosition);

    /// Selects the block's whole content and collapses to `collapse_to`.
    fn select_block(&mut self, block: &BlockId, collapse_to: CaretPosition);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementOutcome {
    Idle,
    Placed,
    Retrying,
    FellBack,
    Dropped,
}

#[derive(Clone, Copy, Debug)]
struct PendingPlacement {
    request: CaretRequest,
    attempts_left: usize,
}

/// Resolves a position hint against the runs of a rendered block.
pub fn resolve_text_position(runs: &[usize], position: CaretPosition) -> Option<TextPosition> {
    let last = runs.len().checked_sub(1)?;
    let position = match position {
        CaretPosition::Start => TextPosition { run: 0, offset: 0 },
        CaretPosition::End => TextPosition {
            run: last,
            offset: runs[last],
        },
        CaretPosition::Offset(offset) => {
            let mut remaining = offset;
            for (run, len) in runs.iter().enumerate() {
                if remaining <= *len {
                    return Some(TextPosition {
                        run,
                        offset: remaining,
                    });
                }
                remaining -= len;
            }
            TextPosition {
                run: last,
                offset: runs[last],
            }
        }
    };
    Some(position)
}

/// Defers caret placement until the rendered surface has caught up with the
/// block list. Only the most recently scheduled placement is kept.
#[derive(Debug)]
pub struct CaretController {
    pending: Option<PendingPlacement>,
    focused: Option<BlockId>,
    retry_budget: usize,
}

impl CaretController {
    pub fn new(retry_budget: usize) -> Self {
        Self {
            pending: None,
            focused: None,
            retry_budget: retry_budget.max(MIN_RETRY_BUDGET),
        }
    }

    pub fn focused_block(&self) -> Option<BlockId> {
        self.focused
    }

    pub fn focus(&mut self, block: BlockId) {
        self.focused = Some(block);
    }

    pub fn blur(&mut self) {
        self.focused = None;
    }

    pub fn pending(&self) -> Option<CaretRequest> {
        self.pending.map(|pending| pending.request)
    }

    pub fn schedule(&mut self, block_id: BlockId, position: CaretPosition) {
        self.schedule_after_render(CaretRequest { block_id, position }, self.retry_budget);
    }

    /// Queues `request` for the next render pass. If the target is still not
    /// rendered, it is retried on up to `max_retries` further passes.
    pub fn schedule_after_render(&mut self, request: CaretRequest, max_retries: usize) {
        if let Some(previous) = self.pending {
            debug!(superseded = %previous.request.block_id, "caret placement superseded");
        }
        self.pending = Some(PendingPlacement {
            request,
            attempts_left: max_retries + 1,
        });
    }

    /// Called by the rendering layer after each render pass.
    pub fn on_render(
        &mut self,
        store: &BlockStore,
        surface: &mut dyn RenderSurface,
    ) -> PlacementOutcome {
        let Some(mut pending) = self.pending.take() else {
            return PlacementOutcome::Idle;
        };
        let CaretRequest { block_id, position } = pending.request;

        if !store.contains(&block_id) {
            debug!(%block_id, "caret target vanished before placement");
            return PlacementOutcome::Dropped;
        }

        match surface.text_runs(&block_id) {
            Some(runs) => {
                self.focused = Some(block_id);
                match resolve_text_position(&runs, position) {
                    Some(text_position) => {
                        surface.focus(&block_id, text_position);
                        PlacementOutcome::Placed
                    }
                    None => {
                        surface.select_block(&block_id, position);
                        PlacementOutcome::FellBack
                    }
                }
            }
            None => {
                pending.attempts_left = pending.attempts_left.saturating_sub(1);
                if pending.attempts_left > 0 {
                    self.pending = Some(pending);
                    return PlacementOutcome::Retrying;
                }
                warn!(%block_id, "caret target never rendered, selecting whole block");
                self.focused = Some(block_id);
                surface.select_block(&block_id, position);
                PlacementOutcome::FellBack
            }
        }
    }
}

impl Default for CaretController {
    fn default() -> Self {
        Self::new(MIN_RETRY_BUDGET)
    }
}
