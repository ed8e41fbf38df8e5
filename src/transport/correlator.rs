//! Command correlation.
//!
//! The [`Correlator`] owns the pending-command table: it allocates command
//! IDs, registers a one-shot completion per command, and hands the entry to
//! whoever resolves it first (the reader loop, a timeout, a detach or the
//! connection closing). Every entry is removed exactly once.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::{CommandId, SessionId, TargetId};

// ============================================================================
// Types
// ============================================================================

/// Receiving half of a command completion.
pub(crate) type CompletionRx = oneshot::Receiver<Result<Value>>;

/// What the reader loop must do besides completing the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PendingKind {
    /// Plain command.
    Plain,
    /// `Target.attachToTarget`: register the returned session first.
    Attach {
        /// Target being attached to.
        target_id: TargetId,
    },
}

/// A command waiting for its reply.
#[derive(Debug)]
pub(crate) struct PendingCommand {
    /// Method, kept for error context.
    pub method: String,
    /// Session the command was sent on.
    pub session_id: Option<SessionId>,
    /// Extra reader-side handling.
    pub kind: PendingKind,
    /// One-shot handle to the waiting caller.
    completion: oneshot::Sender<Result<Value>>,
}

impl PendingCommand {
    /// Completes the waiting caller. A caller that gave up is ignored.
    pub fn complete(self, result: Result<Value>) {
        let _ = self.completion.send(result);
    }
}

/// Removes a pending entry when the waiting caller goes away.
///
/// Dropping the guard after the entry was resolved is a no-op.
pub(crate) struct PendingGuard<'a> {
    correlator: &'a Correlator,
    id: CommandId,
}

impl<'a> PendingGuard<'a> {
    pub fn new(correlator: &'a Correlator, id: CommandId) -> Self {
        Self { correlator, id }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.correlator.remove(self.id) {
            debug!(id = %self.id, "Abandoned command removed");
        }
    }
}

/// Pending entries plus the closed flag, guarded together.
#[derive(Debug, Default)]
struct PendingTable {
    entries: FxHashMap<CommandId, PendingCommand>,
    closed: bool,
}

// ============================================================================
// Correlator
// ============================================================================

/// Pending-command table and ID allocator for one connection.
#[derive(Debug)]
pub struct Correlator {
    /// Next command ID to hand out.
    next_id: AtomicU64,
    /// Maximum number of commands in flight.
    max_pending: usize,
    /// Pending commands by ID.
    table: Mutex<PendingTable>,
}

impl Correlator {
    /// Creates an empty correlator. IDs start at 1.
    #[must_use]
    pub fn new(max_pending: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            max_pending,
            table: Mutex::new(PendingTable::default()),
        }
    }

    /// Registers a new pending command and returns its ID and completion.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection already closed
    /// - [`Error::TooManyPending`] if `max_pending` commands are in flight
    /// - [`Error::IdSpaceExhausted`] if no IDs are left
    pub(crate) fn register(
        &self,
        method: &str,
        session_id: Option<SessionId>,
        kind: PendingKind,
    ) -> Result<(CommandId, CompletionRx)> {
        let mut table = self.table.lock();

        if table.closed {
            return Err(Error::ConnectionClosed);
        }

        if table.entries.len() >= self.max_pending {
            return Err(Error::TooManyPending {
                pending: table.entries.len(),
                max: self.max_pending,
            });
        }

        let id = self.allocate_id()?;
        let (completion, rx) = oneshot::channel();
        table.entries.insert(
            id,
            PendingCommand {
                method: method.to_string(),
                session_id,
                kind,
                completion,
            },
        );

        Ok((id, rx))
    }

    /// Allocates the next ID, refusing to wrap around.
    fn allocate_id(&self) -> Result<CommandId> {
        self.next_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| id.checked_add(1))
            .map(CommandId::new)
            .map_err(|_| Error::IdSpaceExhausted)
    }

    /// Claims a pending command for resolution.
    ///
    /// Returns `None` if the ID is unknown or was already resolved.
    pub(crate) fn take(&self, id: CommandId) -> Option<PendingCommand> {
        self.table.lock().entries.remove(&id)
    }

    /// Abandons a pending command without completing it.
    ///
    /// Returns `true` if the entry was still pending, `false` if someone
    /// else already claimed it.
    pub fn remove(&self, id: CommandId) -> bool {
        self.table.lock().entries.remove(&id).is_some()
    }

    /// Completes one pending command with an error, if still pending.
    pub fn fail(&self, id: CommandId, error: Error) {
        if let Some(pending) = self.take(id) {
            pending.complete(Err(error));
        }
    }

    /// Fails every command pending on `session_id` with `SessionDetached`.
    ///
    /// Returns the number of failed commands.
    pub fn fail_session(&self, session_id: &SessionId) -> usize {
        let failed: Vec<PendingCommand> = {
            let mut table = self.table.lock();
            let ids: Vec<CommandId> = table
                .entries
                .iter()
                .filter(|(_, pending)| pending.session_id.as_ref() == Some(session_id))
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| table.entries.remove(&id))
                .collect()
        };

        let count = failed.len();
        for pending in failed {
            pending.complete(Err(Error::session_detached(session_id.clone())));
        }

        if count > 0 {
            debug!(session_id = %session_id, count, "Failed pending commands of detached session");
        }
        count
    }

    /// Closes the table: fails everything pending with `ConnectionClosed`
    /// and rejects further registrations.
    ///
    /// Returns the number of failed commands.
    pub fn close(&self) -> usize {
        let pending: Vec<PendingCommand> = {
            let mut table = self.table.lock();
            table.closed = true;
            table.entries.drain().map(|(_, pending)| pending).collect()
        };

        let count = pending.len();
        for entry in pending {
            entry.complete(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending commands on shutdown");
        }
        count
    }

    /// Returns the number of commands in flight.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.table.lock().entries.len()
    }

    /// Returns `true` once [`Correlator::close`] ran.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.table.lock().closed
    }

    #[cfg(test)]
    fn with_next_id(max_pending: usize, next_id: u64) -> Self {
        Self {
            next_id: AtomicU64::new(next_id),
            max_pending,
            table: Mutex::new(PendingTable::default()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
