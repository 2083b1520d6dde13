//! Record persistence for flowsmith
//!
//! Every record lives in its own JSON file at `<root>/<collection>/<id>.json`,
//! written atomically. Collections are small and listed by scanning the
//! directory, which keeps the store inspectable with ordinary tools.

mod connections;
pub mod error;
pub mod records;
mod store;

pub use error::StoreError;
pub use records::{
    AnalysisRecord, CallResult, ConnectionDescriptor, Conversation, ConversationMessage,
    DeployStrategyKind, DeploymentNote, DeploymentRecord, DeploymentStatus, LlmRequestRecord,
    RequestStatus, relative_path,
};
pub use store::{Record, RecordStore};
