//! Process-wide registry of active conversion sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::transport::{MessageRef, UserId};

/// State kept for one active session.
#[derive(Debug)]
struct ActiveSession {
    ticket: u64,
    cancel: CancellationToken,
    status: Option<MessageRef>,
}

/// Data handed back when a session is evicted by [`SessionRegistry::cancel`].
#[derive(Debug, Clone, Copy)]
pub struct ReleasedSession {
    /// Status display of the evicted session, when one was attached.
    pub status: Option<MessageRef>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    sessions: Mutex<HashMap<UserId, ActiveSession>>,
    next_ticket: AtomicU64,
}

/// Mapping from user identity to active session, enforcing at most one
/// session per user.
///
/// The registry owns each session's cancellation token: admitting a user
/// mints the token, and evicting the entry through [`cancel`](Self::cancel)
/// fires it. Admission hands the slot back as a [`SessionGuard`], so a
/// session task that unwinds cannot leave its user stuck as active. All
/// operations share one registry-wide lock and none of them blocks.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, ActiveSession>> {
        self.inner
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically admits `user`, handing back a guard over the new session's
    /// slot, or `None` if a session is already active for that user.
    ///
    /// The guard carries the session's cancellation token and releases the
    /// slot when dropped.
    #[must_use]
    pub fn try_acquire(&self, user: UserId) -> Option<SessionGuard> {
        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        {
            let mut sessions = self.lock();
            if sessions.contains_key(&user) {
                return None;
            }
            sessions.insert(
                user,
                ActiveSession {
                    ticket,
                    cancel: cancel.clone(),
                    status: None,
                },
            );
        }
        Some(SessionGuard {
            registry: self.clone(),
            user,
            ticket,
            cancel,
        })
    }

    /// Attaches the user-visible status display to an active session.
    ///
    /// Does nothing if the session was released in the meantime.
    pub fn set_status(&self, user: UserId, status: MessageRef) {
        if let Some(session) = self.lock().get_mut(&user) {
            session.status = Some(status);
        }
    }

    /// Whether a session is currently active for `user`.
    #[must_use]
    pub fn is_active(&self, user: UserId) -> bool {
        self.lock().contains_key(&user)
    }

    /// Removes the entry for `user` unconditionally. Idempotent.
    pub fn release(&self, user: UserId) {
        self.lock().remove(&user);
    }

    /// Removes the entry for `user` only while it still belongs to the
    /// admission that minted `ticket`, so a stale guard cannot evict a
    /// successor session.
    fn release_ticket(&self, user: UserId, ticket: u64) {
        let mut sessions = self.lock();
        if sessions
            .get(&user)
            .is_some_and(|session| session.ticket == ticket)
        {
            sessions.remove(&user);
        }
    }

    /// Evicts the session for `user` and fires its cancellation token.
    ///
    /// Returns `None` when no session was active, so a repeated cancel is a
    /// no-op the caller can report as such.
    pub fn cancel(&self, user: UserId) -> Option<ReleasedSession> {
        let session = self.lock().remove(&user)?;
        session.cancel.cancel();
        Some(ReleasedSession {
            status: session.status,
        })
    }

    /// Number of currently active sessions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }
}

/// Owns one admitted session's registry slot.
///
/// Dropping the guard releases the slot, so it comes free even when the
/// session task panics or is aborted mid-flight. The release is keyed by an
/// admission ticket: once [`SessionRegistry::cancel`] has evicted the entry
/// and a new session has taken the user's slot, a stale guard's drop leaves
/// the new entry alone.
#[must_use]
#[derive(Debug)]
pub struct SessionGuard {
    registry: SessionRegistry,
    user: UserId,
    ticket: u64,
    cancel: CancellationToken,
}

impl SessionGuard {
    /// The session's cancellation token.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.release_ticket(self.user, self.ticket);
    }
}
