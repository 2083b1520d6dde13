//! Workflow artifacts on disk
//!
//! Generated workflows live at `<root>/<workflow_id>/<file>.<ext>`. The
//! [`ArtifactResolver`] turns a loose reference (id, file name or path) into
//! one concrete file and explains failures in terms of the upstream
//! generation status.

pub mod error;
pub mod generation;
pub mod listing;
pub mod resolver;

pub use error::ArtifactError;
pub use generation::{FileGenerationLookup, GenerationLookup, GenerationRecord, GenerationStatus};
pub use listing::{ArtifactDetails, ArtifactEntry, WorkflowStatusReport, read_details};
pub use resolver::{ArtifactQuery, ArtifactResolver, ResolvedArtifact};
