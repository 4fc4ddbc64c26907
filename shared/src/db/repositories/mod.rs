pub mod agent;
pub mod meeting;
pub mod user;

pub use agent::AgentRepository;
pub use meeting::MeetingRepository;
pub use user::UserRepository;
