pub mod orchestrator;
pub mod pending;

mod handlers;

pub use orchestrator::{ChatRequest, ChatResponse, Orchestrator, ReplyStatus, ANONYMOUS_USER};
pub use pending::PendingStore;
