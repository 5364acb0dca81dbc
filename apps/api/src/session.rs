//! In-memory conversation sessions. Nothing here outlives the process.
//!
//! A session's state sits behind an async mutex that a turn holds from start
//! to finish, so profile merges are atomic per turn. The active-turn token
//! lives outside that lock: a newer submission can cancel the running turn
//! without waiting for it.
//!
//! Sessions nobody touches for the configured idle TTL are evicted by a
//! background sweep, unless a turn is still running in them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::message::Message;
use crate::models::profile::Profile;
use crate::models::user::Identity;
use crate::profile::stage::{select_stage, GuidanceHistory, Stage};

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub identity: Identity,
    pub profile: Profile,
    pub messages: Vec<Message>,
    pub guidance: GuidanceHistory,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(identity: Identity) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            profile: Profile::new(),
            messages: Vec::new(),
            guidance: GuidanceHistory::default(),
            created_at: Utc::now(),
        }
    }

    /// Stage the next plain message would get, derived from the live profile.
    pub fn current_stage(&self) -> Stage {
        select_stage(self.profile.completeness(), &self.guidance, false)
    }
}

/// Token for the turn currently allowed to run, tagged with its sequence number.
struct ActiveTurn {
    seq: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct TurnSlot {
    next_seq: u64,
    active: Option<ActiveTurn>,
}

/// Issued by `begin_turn`; identifies the turn when it finishes.
#[derive(Debug, Clone)]
pub struct TurnTicket {
    pub seq: u64,
    pub token: CancellationToken,
}

pub struct SessionHandle {
    pub id: Uuid,
    owner_id: String,
    state: Mutex<Session>,
    turn: Mutex<TurnSlot>,
    last_active: std::sync::Mutex<Instant>,
}

impl SessionHandle {
    fn new(session: Session) -> Self {
        Self {
            id: session.id,
            owner_id: session.identity.id.clone(),
            state: Mutex::new(session),
            turn: Mutex::new(TurnSlot::default()),
            last_active: std::sync::Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        if let Ok(mut last_active) = self.last_active.lock() {
            *last_active = Instant::now();
        }
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active
            .lock()
            .map(|last_active| last_active.elapsed())
            .unwrap_or_default()
    }

    /// A running turn holds the session lock.
    fn is_busy(&self) -> bool {
        self.state.try_lock().is_err()
    }

    pub fn is_owned_by(&self, identity: &Identity) -> bool {
        self.owner_id == identity.id
    }

    /// Waits for any running turn to release the session.
    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.touch();
        self.state.lock().await
    }

    /// Registers a new turn and cancels the previous one, if it is still active.
    pub async fn begin_turn(&self) -> TurnTicket {
        self.touch();
        let mut slot = self.turn.lock().await;
        if let Some(previous) = slot.active.take() {
            info!("Session {}: superseding turn {}", self.id, previous.seq);
            previous.token.cancel();
        }
        slot.next_seq += 1;
        let ticket = TurnTicket {
            seq: slot.next_seq,
            token: CancellationToken::new(),
        };
        slot.active = Some(ActiveTurn {
            seq: ticket.seq,
            token: ticket.token.clone(),
        });
        ticket
    }

    /// Clears the active slot if it still belongs to `ticket`.
    pub async fn finish_turn(&self, ticket: &TurnTicket) {
        self.touch();
        let mut slot = self.turn.lock().await;
        if slot.active.as_ref().is_some_and(|a| a.seq == ticket.seq) {
            slot.active = None;
        }
    }

    /// Cancels the running turn. Returns `false` if nothing was running.
    pub async fn cancel_active_turn(&self) -> bool {
        let mut slot = self.turn.lock().await;
        match slot.active.take() {
            Some(active) => {
                active.token.cancel();
                true
            }
            None => false,
        }
    }
}

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<SessionHandle>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, identity: Identity) -> Arc<SessionHandle> {
        let handle = Arc::new(SessionHandle::new(Session::new(identity)));
        self.sessions
            .write()
            .await
            .insert(handle.id, Arc::clone(&handle));
        info!("Session {} created", handle.id);
        handle
    }

    /// Sessions owned by someone else are reported as missing.
    pub async fn get(&self, id: Uuid, identity: &Identity) -> Result<Arc<SessionHandle>, AppError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .filter(|h| h.is_owned_by(identity))
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
    }

    /// Ends a session, cancelling any turn still running in it.
    pub async fn remove(&self, id: Uuid, identity: &Identity) -> Result<(), AppError> {
        let handle = self.get(id, identity).await?;
        handle.cancel_active_turn().await;
        self.sessions.write().await.remove(&id);
        info!("Session {id} ended");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops sessions idle for at least `ttl`. Returns how many were evicted.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, handle| {
            let idle = handle.idle_for();
            let keep = idle < ttl || handle.is_busy();
            if !keep {
                info!("Session {id} evicted after {}s idle", idle.as_secs());
            }
            keep
        });
        before - sessions.len()
    }
}

/// Sweeps idle sessions out of `store` for as long as the process runs.
pub fn spawn_idle_sweeper(store: SessionStore, ttl: Duration) -> JoinHandle<()> {
    let period = sweep_period(ttl);
    info!("Session idle TTL {}s, sweeping every {}s", ttl.as_secs(), period.as_secs());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = store.evict_idle(ttl).await;
            debug!("Idle sweep evicted {evicted} session(s)");
        }
    })
}

fn sweep_period(ttl: Duration) -> Duration {
    (ttl / 4).clamp(Duration::from_secs(1), Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str) -> Identity {
        Identity {
            id: id.into(),
            email: format!("{id}@example.com"),
            display_name: None,
        }
    }

    #[tokio::test]
    async fn test_new_session_is_empty_collection() {
        let store = SessionStore::new();
        let handle = store.create(identity("a")).await;
        let session = handle.lock().await;
        assert_eq!(session.profile.completeness(), 0);
        assert!(session.messages.is_empty());
        assert_eq!(session.current_stage(), Stage::Collection);
    }

    #[tokio::test]
    async fn test_sessions_are_scoped_to_owner() {
        let store = SessionStore::new();
        let handle = store.create(identity("a")).await;
        assert!(store.get(handle.id, &identity("a")).await.is_ok());
        assert!(matches!(
            store.get(handle.id, &identity("b")).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_begin_turn_cancels_previous() {
        let store = SessionStore::new();
        let handle = store.create(identity("a")).await;
        let first = handle.begin_turn().await;
        let second = handle.begin_turn().await;
        assert!(first.token.is_cancelled());
        assert!(!second.token.is_cancelled());
        assert!(second.seq > first.seq);
    }

    #[tokio::test]
    async fn test_finish_turn_only_clears_own_ticket() {
        let store = SessionStore::new();
        let handle = store.create(identity("a")).await;
        let first = handle.begin_turn().await;
        let second = handle.begin_turn().await;
        handle.finish_turn(&first).await;
        assert!(handle.cancel_active_turn().await);
        assert!(second.token.is_cancelled());
        assert!(!handle.cancel_active_turn().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_are_evicted_and_active_ones_kept() {
        let store = SessionStore::new();
        let ttl = Duration::from_secs(3600);
        let idle = store.create(identity("a")).await;
        let active = store.create(identity("b")).await;

        tokio::time::advance(Duration::from_secs(1800)).await;
        drop(active.lock().await);
        tokio::time::advance(Duration::from_secs(2400)).await;

        assert_eq!(store.evict_idle(ttl).await, 1);
        assert!(matches!(
            store.get(idle.id, &identity("a")).await,
            Err(AppError::NotFound(_))
        ));
        assert!(store.get(active.id, &identity("b")).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_with_running_turn_is_not_evicted() {
        let store = SessionStore::new();
        let handle = store.create(identity("a")).await;
        let _running = handle.lock().await;

        tokio::time::advance(Duration::from_secs(7200)).await;
        assert_eq!(store.evict_idle(Duration::from_secs(3600)).await, 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_in_background() {
        let store = SessionStore::new();
        store.create(identity("a")).await;
        let sweeper = spawn_idle_sweeper(store.clone(), Duration::from_secs(120));

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(store.len().await, 1);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.len().await, 0);
        sweeper.abort();
    }

    #[test]
    fn test_sweep_period_bounds() {
        assert_eq!(sweep_period(Duration::from_secs(2)), Duration::from_secs(1));
        assert_eq!(sweep_period(Duration::from_secs(120)), Duration::from_secs(30));
        assert_eq!(sweep_period(Duration::from_secs(3600)), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_remove_cancels_and_deletes() {
        let store = SessionStore::new();
        let handle = store.create(identity("a")).await;
        let ticket = handle.begin_turn().await;
        store.remove(handle.id, &identity("a")).await.unwrap();
        assert!(ticket.token.is_cancelled());
        assert_eq!(store.len().await, 0);
        assert!(store.remove(handle.id, &identity("a")).await.is_err());
    }
}
