//! The flowsmith pipeline: LLM requests with conversation history, and
//! code-improvement rounds that rewrite a workflow artifact and hand it to
//! deployment.

pub mod context;
pub mod error;
pub mod improvement;
pub mod lifecycle;
mod locks;

pub use context::build_context;
pub use error::EngineError;
pub use improvement::{CodeImprovementRound, ImproveRequest, build_improvement_prompt, strip_code_fences};
pub use lifecycle::{NewRequest, RequestLifecycle};
pub use locks::PathLocks;
