pub mod code;
pub mod error;
pub mod session;
pub mod tier;
pub mod user;

pub use code::{CODE_ALPHABET, CODE_LEN, ReferralCode, is_valid_format};
pub use error::{LedgerError, RejectReason};
pub use session::{Session, SessionId, SessionStatus};
pub use tier::{cumulative_bonus, incremental_bonus};
pub use user::{User, UserId};
