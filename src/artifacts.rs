//! Generation and execution artifacts consumed by the report engine.
//!
//! Artifacts are produced by external collaborators (viewpoint and route
//! generators, the browser driver) and are read-only here.
mod discover;
mod load;
mod types;

pub use discover::{discover_artifacts, DiscoveredArtifacts};
pub use load::{load_artifacts, ArtifactSet, LoadedRoute};
#[cfg(test)]
pub use load::ViewpointFile;
pub use types::{
    ActionKind, ExecutionResult, Route, Step, StepStatus, TestCase, Viewpoint, UNKNOWN_KEY,
};
