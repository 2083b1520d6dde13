mod analysis;
mod connection;
mod deployment;
mod request;

pub use analysis::{AnalysisRecord, DeploymentNote};
pub use connection::ConnectionDescriptor;
pub use deployment::{DeployStrategyKind, DeploymentRecord, DeploymentStatus, relative_path};
pub use request::{CallResult, Conversation, ConversationMessage, LlmRequestRecord, RequestStatus};
