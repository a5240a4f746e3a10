//! The ledger transaction engine: atomically validates and applies one
//! referral's effects.
//!
//! This is the only place the aggregate invariants are enforced:
//! `referred_by` is written exactly once, and the referrer's
//! `(referral_count, credits)` pair only ever moves together, inside the
//! store transaction. Rejections are no-ops — never partial writes.
//!
//! Rejection precedence is fixed: format → code not found → self-referral →
//! missing documents → already referred. Format is checked before any store
//! access; the rest run against the transaction's snapshot, so a stale
//! concurrent attempt that loses the commit race re-runs and rejects
//! against fresh state.

use crate::directory::find_owner;
use crate::store::{UserStore, UserTx};
use referral_types::{LedgerError, ReferralCode, RejectReason, User, UserId, incremental_bonus};
use tracing::{debug, info};

/// What an accepted referral did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferralReceipt {
    pub referrer: UserId,
    pub credits_awarded: u32,
    pub new_referral_count: u32,
}

/// Structured result returned to collaborators.
///
/// `accepted: false` carries the terminal reason and guarantees nothing was
/// mutated. Transient failures never appear here; they surface as
/// [`LedgerError::Conflict`] so callers know retrying makes sense.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferralOutcome {
    pub accepted: bool,
    pub credits_awarded: u32,
    pub referrer: Option<UserId>,
    pub rejection: Option<RejectReason>,
}

impl ReferralOutcome {
    pub fn accepted(receipt: &ReferralReceipt) -> Self {
        Self {
            accepted: true,
            credits_awarded: receipt.credits_awarded,
            referrer: Some(receipt.referrer.clone()),
            rejection: None,
        }
    }

    pub fn rejected(reason: RejectReason) -> Self {
        Self {
            accepted: false,
            credits_awarded: 0,
            referrer: None,
            rejection: Some(reason),
        }
    }
}

/// Self-referral is never permitted, regardless of format validity.
fn check_not_self(referrer: &UserId, referred: &UserId) -> Result<(), RejectReason> {
    if referrer == referred {
        return Err(RejectReason::SelfReferral);
    }
    Ok(())
}

/// The first successful attribution is permanent. Any existing value,
/// even a different referrer from a stale concurrent attempt, rejects.
fn check_not_already_referred(referred: &User) -> Result<(), RejectReason> {
    if referred.referred_by.is_some() {
        return Err(RejectReason::AlreadyReferred);
    }
    Ok(())
}

/// Steps 2–6 of the referral algorithm, against one transaction.
///
/// Format validation (step 1) happens in [`apply_referral`] before any
/// store access. The owner id comes from the code index, then the referrer
/// document is re-read by id — a hit on the index with a miss on the
/// document means the referrer was deleted out from under the code
/// (`ReferrerMissing`).
pub(crate) fn apply_in_tx(
    tx: &mut dyn UserTx,
    code: &ReferralCode,
    referred_user_id: &UserId,
) -> Result<ReferralReceipt, RejectReason> {
    let referrer_id = find_owner(tx, code).ok_or(RejectReason::CodeNotFound)?;
    check_not_self(&referrer_id, referred_user_id)?;

    let mut referrer = tx.get(&referrer_id).ok_or(RejectReason::ReferrerMissing)?;
    let mut referred = tx.get(referred_user_id).ok_or(RejectReason::UserMissing)?;
    check_not_already_referred(&referred)?;

    let old_count = referrer.referral_count;
    let new_count = old_count.saturating_add(1);
    let awarded = incremental_bonus(i64::from(old_count), i64::from(new_count));

    referrer.referral_count = new_count;
    referrer.credits = referrer.credits.saturating_add(awarded);
    referred.referred_by = Some(referrer_id.clone());

    let receipt = ReferralReceipt {
        referrer: referrer_id,
        credits_awarded: awarded,
        new_referral_count: new_count,
    };
    tx.put(referrer);
    tx.put(referred);
    Ok(receipt)
}

/// Atomically validate and apply one referral.
///
/// Terminal rejections come back as `Ok` with `accepted: false` and no
/// mutation; only the transient retry-budget exhaustion is an `Err`.
pub fn apply_referral<S: UserStore>(
    store: &S,
    raw_code: &str,
    referred_user_id: &UserId,
) -> Result<ReferralOutcome, LedgerError> {
    // no store access for malformed input
    let code = match ReferralCode::parse(raw_code) {
        Ok(code) => code,
        Err(reason) => return Ok(ReferralOutcome::rejected(reason)),
    };

    match store.run_transaction(|tx| apply_in_tx(tx, &code, referred_user_id)) {
        Ok(receipt) => {
            info!(
                referrer = %receipt.referrer,
                referred = %referred_user_id,
                awarded = receipt.credits_awarded,
                count = receipt.new_referral_count,
                "referral applied"
            );
            Ok(ReferralOutcome::accepted(&receipt))
        }
        Err(LedgerError::Rejected(reason)) => {
            debug!(referred = %referred_user_id, %reason, "referral rejected");
            Ok(ReferralOutcome::rejected(reason))
        }
        Err(conflict) => Err(conflict),
    }
}
