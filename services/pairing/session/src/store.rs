//! Concurrent per-device session store.
//!
//! The map shard lock is held only to look up or insert a handle. All
//! multi-step work on a session runs under that session's own mutex, which
//! queues waiters in arrival order.

use crate::session::{DeviceSession, HandshakeState, SessionSnapshot};
use dashmap::DashMap;
use pairing_wire::DeviceId;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Shared handle to one session
pub type SessionHandle = Arc<Mutex<DeviceSession>>;

/// Default idle time before a session is evicted
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Default interval between eviction sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Exclusive access to a live session
#[derive(Debug)]
pub struct LockedSession {
    handle: SessionHandle,
    guard: OwnedMutexGuard<DeviceSession>,
}

impl Deref for LockedSession {
    type Target = DeviceSession;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for LockedSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

/// In-memory session store keyed by device identifier
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<DeviceId, SessionHandle>,
    max_value_bytes: usize,
    keys_generated: AtomicU64,
}

impl SessionStore {
    /// Create a store whose sessions cap accumulated values at `max_value_bytes`
    pub fn new(max_value_bytes: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_value_bytes,
            keys_generated: AtomicU64::new(0),
        }
    }

    /// Get the session for `id`, creating one in
    /// [`HandshakeState::CollectingPublicKey`] if none exists
    pub fn get_or_create(&self, id: &DeviceId) -> SessionHandle {
        self.sessions
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(device = id.as_str(), "Creating session");
                Arc::new(Mutex::new(DeviceSession::new(id.clone(), self.max_value_bytes)))
            })
            .value()
            .clone()
    }

    /// Lock the live session for `id`, creating it if needed.
    ///
    /// A session retired while this call waited is skipped and the lookup
    /// repeated.
    pub async fn lock(&self, id: &DeviceId) -> LockedSession {
        loop {
            let handle = self.get_or_create(id);
            let guard = handle.clone().lock_owned().await;
            if !guard.is_retired() {
                return LockedSession { handle, guard };
            }
        }
    }

    /// Atomically move the session for `id` from one of `from` to `to`.
    ///
    /// Returns false without mutating anything when there is no session or
    /// its state is not in `from`.
    pub async fn try_transition(
        &self,
        id: &DeviceId,
        from: &[HandshakeState],
        to: HandshakeState,
    ) -> bool {
        let Some(handle) = self.sessions.get(id).map(|e| e.value().clone()) else {
            return false;
        };
        let mut session = handle.lock().await;
        !session.is_retired() && session.transition(from, to)
    }

    /// Tear down the session for `id`, zeroizing its key material
    pub async fn remove(&self, id: &DeviceId) -> bool {
        let Some((_, handle)) = self.sessions.remove(id) else {
            return false;
        };
        handle.lock().await.retire();
        debug!(device = id.as_str(), "Removed session");
        true
    }

    /// Remove a session the caller holds locked
    pub fn discard(&self, session: &mut LockedSession) {
        let id = session.device_id().clone();
        self.sessions
            .remove_if(&id, |_, handle| Arc::ptr_eq(handle, &session.handle));
        session.retire();
        debug!(device = id.as_str(), "Discarded session");
    }

    /// Evict sessions idle for at least `max_idle`.
    ///
    /// Sessions currently locked by a writer are busy and kept.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut evicted = 0;

        self.sessions.retain(|id, handle| match handle.try_lock() {
            Ok(mut session) if now.duration_since(session.last_activity()) >= max_idle => {
                debug!(device = id.as_str(), state = %session.state(), "Evicting idle session");
                session.retire();
                evicted += 1;
                false
            }
            _ => true,
        });

        evicted
    }

    /// Read-only view of the session for `id`
    pub async fn snapshot(&self, id: &DeviceId) -> Option<SessionSnapshot> {
        let handle = self.sessions.get(id).map(|e| e.value().clone())?;
        let session = handle.lock().await;
        Some(session.snapshot())
    }

    /// Number of times session keys have been generated
    pub fn keys_generated(&self) -> u64 {
        self.keys_generated.load(Ordering::Relaxed)
    }

    pub(crate) fn record_keys_generated(&self) {
        self.keys_generated.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store holds no sessions
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Periodically evict idle sessions. Runs until the task is dropped.
pub async fn run_eviction(store: Arc<SessionStore>, sweep_interval: Duration, idle_timeout: Duration) {
    info!(
        "Starting session sweeper (interval {:?}, idle timeout {:?})",
        sweep_interval, idle_timeout
    );

    let mut ticker = tokio::time::interval(sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let evicted = store.evict_idle(idle_timeout);
        if evicted > 0 {
            info!("Evicted {} idle sessions, {} remaining", evicted, store.len());
        }
    }
}
