pub mod config;
pub mod db;
pub mod llm;
pub mod models;
pub mod queue;
pub mod stream;
pub mod telemetry;
pub mod test_environment;
pub mod traits;
pub mod utils;

#[cfg(feature = "testing")]
pub mod testing;

pub use config::{DatabaseConfig, OpenAiConfig, StreamConfig};
pub use db::error::DatabaseError;
pub use db::pool::DatabasePool;
pub use llm::{ChatMessage, ChatRole, LanguageModel, OpenAiClient};
pub use queue::JobQueue;
pub use stream::StreamClient;
pub use traits::{AgentStore, DispatchOutcome, JobDispatcher, MeetingStore, StepJournal, UserStore};
