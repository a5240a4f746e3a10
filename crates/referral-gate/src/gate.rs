//! The session completion gate: the trigger that turns a pending referral
//! into credits.
//!
//! Fired by the session-tracking collaborator on every status transition;
//! only a user's *first* completed session processes the pending code.
//! Because processing consumes the code regardless of outcome, a terminal
//! rejection is one-chance — later completed sessions never re-trigger it.

use crate::history::SessionHistory;
use referral_ledger::{ReferralOutcome, UserStore, process_pending_referral};
use referral_types::{LedgerError, SessionStatus, UserId};
use tracing::{debug, info};

/// Feed one session status event through the gate.
///
/// Returns `Ok(None)` when the event is not a trigger (not a completion, or
/// not the first one). Terminal rejections are swallowed into the returned
/// outcome — a failed referral never blocks the user's session. Transient
/// conflicts propagate so the event dispatcher can redeliver.
pub fn on_session_event<S: UserStore, H: SessionHistory>(
    store: &S,
    history: &H,
    user_id: &UserId,
    status: SessionStatus,
) -> Result<Option<ReferralOutcome>, LedgerError> {
    if status != SessionStatus::Completed {
        return Ok(None);
    }
    if history.completed_session_count(user_id) != 1 {
        debug!(user = %user_id, "completed session is not the first, gate closed");
        return Ok(None);
    }

    let outcome = process_pending_referral(store, user_id)?;
    if outcome.accepted {
        info!(
            user = %user_id,
            awarded = outcome.credits_awarded,
            "first completed session credited a pending referral"
        );
    } else {
        debug!(
            user = %user_id,
            rejection = ?outcome.rejection,
            "pending referral not credited"
        );
    }
    Ok(Some(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemorySessionLog;
    use referral_ledger::{MemoryStore, create_user};
    use referral_types::RejectReason;

    fn complete_once(log: &MemorySessionLog, user: &UserId) {
        let id = log.start(user);
        log.transition(id, SessionStatus::Completed);
    }

    #[test]
    fn non_completion_events_never_trigger() {
        let store = MemoryStore::new();
        let log = MemorySessionLog::new();
        let referrer = create_user(&store, &UserId::from("ref"), 0, None).unwrap();
        let referred = create_user(
            &store,
            &UserId::from("new"),
            0,
            Some(referrer.referral_code.as_str()),
        )
        .unwrap();

        for status in [SessionStatus::InProgress, SessionStatus::Failed] {
            let result = on_session_event(&store, &log, &referred.id, status).unwrap();
            assert_eq!(result, None);
        }
        // pending claim still intact
        assert!(
            store
                .get_user(&referred.id)
                .unwrap()
                .pending_referral_code
                .is_some()
        );
    }

    #[test_log::test]
    fn first_completed_session_awards_credits() {
        let store = MemoryStore::new();
        let log = MemorySessionLog::new();
        let referrer = create_user(&store, &UserId::from("ref"), 0, None).unwrap();
        let referred = create_user(
            &store,
            &UserId::from("new"),
            0,
            Some(referrer.referral_code.as_str()),
        )
        .unwrap();

        complete_once(&log, &referred.id);
        let outcome = on_session_event(&store, &log, &referred.id, SessionStatus::Completed)
            .unwrap()
            .unwrap();

        assert!(outcome.accepted);
        assert_eq!(outcome.credits_awarded, 3);
        assert_eq!(store.get_user(&referrer.id).unwrap().credits, 3);
    }

    #[test]
    fn second_completed_session_does_not_retrigger() {
        let store = MemoryStore::new();
        let log = MemorySessionLog::new();
        let referrer = create_user(&store, &UserId::from("ref"), 0, None).unwrap();
        let referred = create_user(
            &store,
            &UserId::from("new"),
            0,
            Some(referrer.referral_code.as_str()),
        )
        .unwrap();

        complete_once(&log, &referred.id);
        on_session_event(&store, &log, &referred.id, SessionStatus::Completed).unwrap();
        complete_once(&log, &referred.id);
        let second =
            on_session_event(&store, &log, &referred.id, SessionStatus::Completed).unwrap();

        assert_eq!(second, None);
        assert_eq!(store.get_user(&referrer.id).unwrap().referral_count, 1);
    }

    #[test_log::test]
    fn terminal_rejection_still_closes_the_gate_for_good() {
        let store = MemoryStore::new();
        let log = MemorySessionLog::new();
        // pending code that has no owner
        let referred = create_user(&store, &UserId::from("new"), 0, Some("ZZZZ9999")).unwrap();

        complete_once(&log, &referred.id);
        let first = on_session_event(&store, &log, &referred.id, SessionStatus::Completed)
            .unwrap()
            .unwrap();
        assert_eq!(first.rejection, Some(RejectReason::CodeNotFound));

        // one chance: even a direct re-process finds nothing pending
        complete_once(&log, &referred.id);
        let second =
            on_session_event(&store, &log, &referred.id, SessionStatus::Completed).unwrap();
        assert_eq!(second, None);
        assert_eq!(
            store.get_user(&referred.id).unwrap().pending_referral_code,
            None
        );
    }

    #[test]
    fn user_without_pending_code_completes_sessions_undisturbed() {
        let store = MemoryStore::new();
        let log = MemorySessionLog::new();
        let user = create_user(&store, &UserId::from("solo"), 2, None).unwrap();

        complete_once(&log, &user.id);
        let outcome = on_session_event(&store, &log, &user.id, SessionStatus::Completed)
            .unwrap()
            .unwrap();

        assert!(!outcome.accepted);
        assert_eq!(outcome.rejection, Some(RejectReason::NoPendingCode));
        // normal product use is unaffected
        assert_eq!(store.get_user(&user.id).unwrap().credits, 2);
    }
}
