//! The narrow storage capability the ledger needs: atomic multi-document
//! read-modify-write with conflict detection.
//!
//! [`UserStore::run_transaction`] is the only mutation path for shared
//! counters. Reads inside a transaction record the version they observed;
//! commit re-validates every recorded version under one lock and applies the
//! staged writes atomically. A conflicting commit re-runs the whole closure
//! against fresh reads, bounded by [`MAX_COMMIT_ATTEMPTS`], then surfaces as
//! the transient [`LedgerError::Conflict`].

use referral_types::{LedgerError, ReferralCode, RejectReason, User, UserId};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Commit attempts before a transaction is surfaced as a transient failure.
pub const MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Buffered read/write view over one atomic unit of work.
///
/// Reads see this transaction's own staged writes. Staged writes are
/// invisible to other readers until commit.
pub trait UserTx {
    /// Point read by user id.
    fn get(&mut self, id: &UserId) -> Option<User>;

    /// Unique-constraint index lookup: resolve a canonical code to its
    /// owner's id. Same snapshot and visibility rules as [`get`](Self::get);
    /// the owning document itself is read separately by id.
    fn find_by_code(&mut self, code: &ReferralCode) -> Option<UserId>;

    /// Stage a write, applied atomically at commit.
    fn put(&mut self, user: User);
}

/// Abstract transactional user-record store.
///
/// Implementations must give `run_transaction` serializable (or at least
/// conflict-detecting optimistic) semantics over every document the closure
/// touches. [`MemoryStore`] is the in-memory reference implementation the
/// test suite runs against.
pub trait UserStore {
    /// Run `f` as one atomic transaction.
    ///
    /// - `Ok(value)` from `f` commits the staged writes; on commit conflict
    ///   the closure re-runs against fresh reads, up to
    ///   [`MAX_COMMIT_ATTEMPTS`], then [`LedgerError::Conflict`].
    /// - `Err(reason)` from `f` aborts: staged writes are discarded and the
    ///   rejection is returned as [`LedgerError::Rejected`]. A closure that
    ///   must persist writes despite a logical rejection returns the
    ///   rejection inside its `Ok` value instead.
    fn run_transaction<T>(
        &self,
        f: impl FnMut(&mut dyn UserTx) -> Result<T, RejectReason>,
    ) -> Result<T, LedgerError>;

    /// Weakly consistent existence check for a canonical code. Only for
    /// generation-time uniqueness probing; authoritative lookups go through
    /// a transaction.
    fn code_exists(&self, code: &ReferralCode) -> bool;

    /// Weakly consistent point read for collaborators and assertions.
    fn get_user(&self, id: &UserId) -> Option<User>;
}

#[derive(Clone, Debug)]
struct Versioned {
    version: u64,
    user: User,
}

/// In-memory [`UserStore`] with optimistic concurrency control.
///
/// Documents carry a version starting at 1; absence is observed as
/// version 0. Each read records the first version it observed for a
/// document, and commit fails if any recorded version has moved.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<UserId, Versioned>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, Versioned>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write a document outside any transaction, bumping its version.
    ///
    /// Collaborator/maintenance surface (and test seeding); ledger code
    /// never mutates through this.
    pub fn upsert(&self, user: User) {
        let mut map = self.lock();
        let version = map.get(&user.id).map(|doc| doc.version + 1).unwrap_or(1);
        map.insert(user.id.clone(), Versioned { version, user });
    }

    /// Remove a document, as the identity collaborator does when deleting an
    /// account. Returns whether anything was removed.
    pub fn remove_user(&self, id: &UserId) -> bool {
        self.lock().remove(id).is_some()
    }
}

impl UserStore for MemoryStore {
    fn run_transaction<T>(
        &self,
        mut f: impl FnMut(&mut dyn UserTx) -> Result<T, RejectReason>,
    ) -> Result<T, LedgerError> {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let mut tx = MemoryTx {
                store: self,
                reads: HashMap::new(),
                writes: HashMap::new(),
            };
            let value = f(&mut tx)?;
            if tx.commit() {
                return Ok(value);
            }
            debug!(attempt, "commit conflict, re-running transaction on fresh reads");
        }
        warn!(
            attempts = MAX_COMMIT_ATTEMPTS,
            "transaction retry budget exhausted"
        );
        Err(LedgerError::Conflict {
            attempts: MAX_COMMIT_ATTEMPTS,
        })
    }

    fn code_exists(&self, code: &ReferralCode) -> bool {
        self.lock()
            .values()
            .any(|doc| doc.user.referral_code == *code)
    }

    fn get_user(&self, id: &UserId) -> Option<User> {
        self.lock().get(id).map(|doc| doc.user.clone())
    }
}

struct MemoryTx<'a> {
    store: &'a MemoryStore,
    /// First version observed per document; 0 means observed absent.
    reads: HashMap<UserId, u64>,
    writes: HashMap<UserId, User>,
}

impl MemoryTx<'_> {
    fn record_read(&mut self, id: &UserId, version: u64) {
        self.reads.entry(id.clone()).or_insert(version);
    }

    /// Validate every recorded read and apply staged writes under one lock.
    /// Returns false on version conflict; nothing is applied in that case.
    fn commit(self) -> bool {
        let mut map = self.store.lock();
        for (id, observed) in &self.reads {
            let current = map.get(id).map(|doc| doc.version).unwrap_or(0);
            if current != *observed {
                return false;
            }
        }
        for (id, user) in self.writes {
            let version = map.get(&id).map(|doc| doc.version + 1).unwrap_or(1);
            map.insert(id, Versioned { version, user });
        }
        true
    }
}

impl UserTx for MemoryTx<'_> {
    fn get(&mut self, id: &UserId) -> Option<User> {
        if let Some(staged) = self.writes.get(id) {
            return Some(staged.clone());
        }
        let map = self.store.lock();
        let observed = map.get(id);
        let version = observed.map(|doc| doc.version).unwrap_or(0);
        let user = observed.map(|doc| doc.user.clone());
        drop(map);
        self.record_read(id, version);
        user
    }

    fn find_by_code(&mut self, code: &ReferralCode) -> Option<UserId> {
        if let Some(staged) = self
            .writes
            .values()
            .find(|user| user.referral_code == *code)
        {
            return Some(staged.id.clone());
        }
        let map = self.store.lock();
        let found = map
            .values()
            .find(|doc| doc.user.referral_code == *code)
            .map(|doc| (doc.version, doc.user.id.clone()));
        drop(map);
        let (version, id) = found?;
        self.record_read(&id, version);
        Some(id)
    }

    fn put(&mut self, user: User) {
        self.writes.insert(user.id.clone(), user);
    }
}
