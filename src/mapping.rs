//! Step-to-viewpoint mapping.
//!
//! Executed steps carry no link back to the viewpoint that produced them, so
//! mapping is heuristic. Callers depend on [`StepViewpointMapper`] only; the
//! positional mapper is the default and keyword refinement is opt-in.
mod positional;
mod refine;
mod trace_id;

pub use positional::PositionalMapper;
pub use refine::KeywordRefinedMapper;
pub use trace_id::{mapped_id, resolve_user_story, unmapped_id, UserStory};

use crate::artifacts::{Step, Viewpoint};
use crate::functions::{FunctionClassifier, FunctionRegistry, FunctionalCategory};
use std::collections::HashMap;

/// A viewpoint with its functional category and function id resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedViewpoint {
    pub viewpoint: Viewpoint,
    pub category: FunctionalCategory,
    pub function_id: String,
    /// Walk order of the category (function id order).
    pub order: usize,
    /// 1-based position of the viewpoint within its function.
    pub position: usize,
}

/// Classify every viewpoint and register its category.
pub fn classify_viewpoints(
    viewpoints: &[Viewpoint],
    classifier: &FunctionClassifier,
    registry: &mut FunctionRegistry,
) -> Vec<ClassifiedViewpoint> {
    let mut classified: Vec<ClassifiedViewpoint> = viewpoints
        .iter()
        .map(|viewpoint| {
            let category = classifier.classify(&viewpoint.text, viewpoint.category.as_deref());
            let function_id = registry.register(&category);
            let order = registry.order(&category);
            ClassifiedViewpoint {
                viewpoint: viewpoint.clone(),
                category,
                function_id,
                order,
                position: 0,
            }
        })
        .collect();
    let mut per_function: HashMap<String, usize> = HashMap::new();
    for viewpoint in &mut classified {
        let counter = per_function.entry(viewpoint.function_id.clone()).or_default();
        *counter += 1;
        viewpoint.position = *counter;
    }
    classified
}

/// Where a mapped step landed.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedStep {
    pub function_id: String,
    pub function_name: String,
    /// 1-based position of the viewpoint within its function.
    pub viewpoint_in_function: usize,
    /// 1-based position of the step within its viewpoint.
    pub step_in_viewpoint: usize,
    /// Viewpoint number as written in the viewpoint file.
    pub viewpoint_no: usize,
    pub viewpoint_text: String,
}

/// Assignment of one executed step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAssignment {
    Mapped(MappedStep),
    /// 0-based ordinal among the unmapped steps of this mapping.
    Unmapped { ordinal: usize },
}

/// One assignment per executed step, in step order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepMapping {
    pub assignments: Vec<StepAssignment>,
}

impl StepMapping {
    pub fn mapped_count(&self) -> usize {
        self.assignments
            .iter()
            .filter(|assignment| matches!(assignment, StepAssignment::Mapped(_)))
            .count()
    }

    pub fn unmapped_count(&self) -> usize {
        self.assignments.len() - self.mapped_count()
    }
}

/// Strategy seam for attributing executed steps to viewpoints.
pub trait StepViewpointMapper {
    fn map(&self, viewpoints: &[ClassifiedViewpoint], steps: &[Step]) -> StepMapping;
}

/// Viewpoints in walk order: by function order, original order within a
/// function.
pub(crate) fn walk_order(viewpoints: &[ClassifiedViewpoint]) -> Vec<&ClassifiedViewpoint> {
    let mut ordered: Vec<&ClassifiedViewpoint> = viewpoints.iter().collect();
    ordered.sort_by_key(|viewpoint| viewpoint.order);
    ordered
}

/// Turn per-step owners (indices into the walk order) into a mapping.
///
/// Owners must be non-decreasing; a step's position within its viewpoint is
/// its rank among the steps sharing that owner.
pub(crate) fn assemble(ordered: &[&ClassifiedViewpoint], owners: &[Option<usize>]) -> StepMapping {
    let mut steps_taken = vec![0usize; ordered.len()];
    let mut unmapped = 0;
    let assignments = owners
        .iter()
        .map(|owner| match owner.and_then(|slot| ordered.get(slot).map(|vp| (slot, vp))) {
            Some((slot, viewpoint)) => {
                steps_taken[slot] += 1;
                StepAssignment::Mapped(MappedStep {
                    function_id: viewpoint.function_id.clone(),
                    function_name: viewpoint.category.display_name().to_string(),
                    viewpoint_in_function: viewpoint.position,
                    step_in_viewpoint: steps_taken[slot],
                    viewpoint_no: viewpoint.viewpoint.index,
                    viewpoint_text: viewpoint.viewpoint.text.clone(),
                })
            }
            None => {
                let ordinal = unmapped;
                unmapped += 1;
                StepAssignment::Unmapped { ordinal }
            }
        })
        .collect();
    StepMapping { assignments }
}
