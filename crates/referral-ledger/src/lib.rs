pub mod directory;
pub mod engine;
pub mod pending;
pub mod store;

pub use directory::{MAX_GENERATE_ATTEMPTS, allocate_code, allocate_code_with, create_user, find_owner};
pub use engine::{ReferralOutcome, ReferralReceipt, apply_referral};
pub use pending::process_pending_referral;
pub use store::{MAX_COMMIT_ATTEMPTS, MemoryStore, UserStore, UserTx};
