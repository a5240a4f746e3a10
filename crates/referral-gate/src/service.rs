use crate::gate;
use crate::history::{MemorySessionLog, SessionHistory};
use referral_ledger::{
    MemoryStore, ReferralOutcome, UserStore, allocate_code, apply_referral, create_user,
    process_pending_referral,
};
use referral_types::{LedgerError, ReferralCode, SessionStatus, User, UserId, is_valid_format};

/// Facade bundling the store and the session collaborator behind the
/// operations exposed to the identity and session systems. Pure delegation;
/// all semantics live in `referral-ledger` and [`gate`].
pub struct ReferralService<S: UserStore, H: SessionHistory> {
    store: S,
    history: H,
}

impl ReferralService<MemoryStore, MemorySessionLog> {
    /// Fully in-memory wiring, for tests and local runs.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new(), MemorySessionLog::new())
    }
}

impl<S: UserStore, H: SessionHistory> ReferralService<S, H> {
    pub fn new(store: S, history: H) -> Self {
        Self { store, history }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn generate_referral_code(&self) -> ReferralCode {
        allocate_code(&self.store)
    }

    pub fn is_valid_referral_code_format(&self, code: &str) -> bool {
        is_valid_format(code)
    }

    pub fn create_user_with_optional_pending_code(
        &self,
        id: &UserId,
        baseline_credits: u32,
        pending_code: Option<&str>,
    ) -> Result<User, LedgerError> {
        create_user(&self.store, id, baseline_credits, pending_code)
    }

    pub fn apply_referral(
        &self,
        code: &str,
        referred_user_id: &UserId,
    ) -> Result<ReferralOutcome, LedgerError> {
        apply_referral(&self.store, code, referred_user_id)
    }

    pub fn process_pending_referral(
        &self,
        user_id: &UserId,
    ) -> Result<ReferralOutcome, LedgerError> {
        process_pending_referral(&self.store, user_id)
    }

    pub fn on_session_event(
        &self,
        user_id: &UserId,
        status: SessionStatus,
    ) -> Result<Option<ReferralOutcome>, LedgerError> {
        gate::on_session_event(&self.store, &self.history, user_id, status)
    }
}
