use super::{assemble, walk_order, ClassifiedViewpoint, StepMapping, StepViewpointMapper};
use crate::artifacts::Step;

/// Even-distribution mapper: each viewpoint in walk order consumes up to
/// `ceil(steps / viewpoints)` steps from the front of the queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionalMapper;

impl StepViewpointMapper for PositionalMapper {
    fn map(&self, viewpoints: &[ClassifiedViewpoint], steps: &[Step]) -> StepMapping {
        let ordered = walk_order(viewpoints);
        let owners = positional_owners(ordered.len(), steps.len());
        assemble(&ordered, &owners)
    }
}

/// Owner slot per step; `None` for leftovers.
pub(crate) fn positional_owners(viewpoint_count: usize, step_count: usize) -> Vec<Option<usize>> {
    if viewpoint_count == 0 {
        return vec![None; step_count];
    }
    let per_viewpoint = step_count.div_ceil(viewpoint_count);
    (0..step_count)
        .map(|step| {
            let slot = step / per_viewpoint.max(1);
            (slot < viewpoint_count).then_some(slot)
        })
        .collect()
}
