pub mod gate;
pub mod history;
pub mod service;

pub use gate::on_session_event;
pub use history::{MemorySessionLog, SessionHistory};
pub use service::ReferralService;
