//! Pending-referral consumption: the deferred half of the flow.
//!
//! A code claimed at signup sits on the user record until the first
//! qualifying event, then is consumed and processed in one transaction.
//! Consumption is one-chance: a terminal rejection still commits the clear,
//! so the code is never retried automatically. There is no window where the
//! code is consumed but unprocessed, or processed but not cleared — both
//! happen in the same atomic unit.

use crate::engine::{self, ReferralOutcome, ReferralReceipt};
use crate::store::UserStore;
use referral_types::{LedgerError, ReferralCode, RejectReason, UserId};
use tracing::{debug, info};

/// Consume and process a user's pending referral code.
///
/// One transaction: read the user, take the pending code (none →
/// `NoPendingCode`), stage the clear, then run the referral algorithm
/// against the same snapshot. A terminal rejection keeps only the clear;
/// success commits the clear and the referral writes together. Only the
/// transient retry-budget exhaustion is an `Err`.
pub fn process_pending_referral<S: UserStore>(
    store: &S,
    user_id: &UserId,
) -> Result<ReferralOutcome, LedgerError> {
    // the closure's Ok carries accept-or-reject so a rejection can still
    // commit the staged pending-clear; closure-level Err means full abort
    let processed: Result<Result<ReferralReceipt, RejectReason>, LedgerError> = store
        .run_transaction(|tx| {
            let mut user = tx.get(user_id).ok_or(RejectReason::NoPendingCode)?;
            let claimed = user
                .pending_referral_code
                .take()
                .ok_or(RejectReason::NoPendingCode)?;
            tx.put(user);

            let code = match ReferralCode::parse(&claimed) {
                Ok(code) => code,
                Err(reason) => return Ok(Err(reason)),
            };
            Ok(engine::apply_in_tx(tx, &code, user_id))
        });

    match processed {
        Ok(Ok(receipt)) => {
            info!(
                user = %user_id,
                referrer = %receipt.referrer,
                awarded = receipt.credits_awarded,
                "pending referral credited"
            );
            Ok(ReferralOutcome::accepted(&receipt))
        }
        Ok(Err(reason)) => {
            // code consumed regardless — one chance
            debug!(user = %user_id, %reason, "pending referral rejected and consumed");
            Ok(ReferralOutcome::rejected(reason))
        }
        Err(LedgerError::Rejected(reason)) => Ok(ReferralOutcome::rejected(reason)),
        Err(conflict) => Err(conflict),
    }
}
