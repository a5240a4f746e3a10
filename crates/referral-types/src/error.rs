/// Why a referral attempt was rejected.
///
/// Every variant is terminal: the attempt performed no mutation and retrying
/// it cannot succeed. Transient failures are not reasons — they surface as
/// [`LedgerError::Conflict`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// The claimed code is not 8 symbols of the canonical alphabet.
    InvalidCodeFormat,
    /// The code is well-formed but no user owns it.
    CodeNotFound,
    /// A user tried to redeem their own code.
    SelfReferral,
    /// The referred user's attribution is already set — first write wins,
    /// permanently, regardless of which referrer won.
    AlreadyReferred,
    /// Pending processing was requested but no pending code exists
    /// (never attached, or already consumed by a prior attempt).
    NoPendingCode,
    /// The code's owner disappeared between lookup and the transaction.
    ReferrerMissing,
    /// The referred user is not in the store.
    UserMissing,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCodeFormat => write!(f, "referral code has invalid format"),
            Self::CodeNotFound => write!(f, "referral code has no owner"),
            Self::SelfReferral => write!(f, "users cannot redeem their own code"),
            Self::AlreadyReferred => write!(f, "user already has a referrer"),
            Self::NoPendingCode => write!(f, "no pending referral code to process"),
            Self::ReferrerMissing => write!(f, "referrer no longer exists"),
            Self::UserMissing => write!(f, "referred user no longer exists"),
        }
    }
}

/// Errors produced by ledger operations.
///
/// `Rejected` is terminal (no mutation happened; do not retry). `Conflict`
/// is transient: the store's internal retry budget was exhausted by
/// concurrent writers, and the caller may safely re-invoke.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("referral rejected: {0}")]
    Rejected(RejectReason),
    #[error("transaction conflict persisted across {attempts} attempts")]
    Conflict { attempts: u32 },
}

impl LedgerError {
    /// True for failures the caller may safely retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<RejectReason> for LedgerError {
    fn from(reason: RejectReason) -> Self {
        Self::Rejected(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflict_is_transient() {
        assert!(LedgerError::Conflict { attempts: 5 }.is_transient());
        assert!(!LedgerError::Rejected(RejectReason::SelfReferral).is_transient());
    }

    #[test]
    fn display_names_the_problem() {
        let err = LedgerError::from(RejectReason::AlreadyReferred);
        assert_eq!(
            err.to_string(),
            "referral rejected: user already has a referrer"
        );
    }
}
