use crate::code::ReferralCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque stable user identifier, owned by the identity collaborator.
///
/// The ledger never inspects its contents; it only compares and maps by it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The user aggregate as persisted by the backing store.
///
/// Field discipline enforced by the ledger transaction engine:
/// - `referral_code` is unique and immutable once assigned.
/// - `referred_by` is set exactly once, never overwritten.
/// - `referral_count` and `credits` only ever increase via this subsystem.
/// - `pending_referral_code` exists only between signup and the first
///   processing attempt; it is stored verbatim as claimed (not
///   canonicalized) because validation happens at processing time.
///
/// `created_at` is wall-clock for debugging only — never used in decisions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub referral_code: ReferralCode,
    pub referred_by: Option<UserId>,
    pub referral_count: u32,
    pub credits: u32,
    pub pending_referral_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Fresh record at signup. Baseline `credits` come from the identity
    /// collaborator's welcome grant, not from this subsystem.
    pub fn new(
        id: UserId,
        referral_code: ReferralCode,
        credits: u32,
        pending_referral_code: Option<String>,
    ) -> Self {
        Self {
            id,
            referral_code,
            referred_by: None,
            referral_count: 0,
            credits,
            pending_referral_code,
            created_at: Utc::now(),
        }
    }
}
