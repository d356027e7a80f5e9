//! Registry of open remote sessions for one run.
//!
//! Every session the executor opens is recorded here until it is released.
//! An interrupted run drains the registry so nothing stays open remotely.
//!
//! Session creation and release run as spawned tasks. Dropping the caller's
//! future (an interrupted run) leaves them running, and [`close_all`]
//! waits for them before draining, so a session created or closing at the
//! moment of the interrupt is still accounted for.
//!
//! [`close_all`]: SessionRegistry::close_all

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use webprobe_core::{ServiceError, ServiceResult, SessionId, TaskService};

/// Owns the open-session set for one run.
pub struct SessionRegistry {
    service: Arc<dyn TaskService>,
    open: Mutex<HashMap<SessionId, String>>,
    in_flight: watch::Sender<usize>,
    opened: AtomicU64,
    closed: AtomicU64,
}

/// Marks one open or release as running until dropped.
struct InFlight(Arc<SessionRegistry>);

impl InFlight {
    fn enter(registry: &Arc<SessionRegistry>) -> Self {
        registry.in_flight.send_modify(|n| *n += 1);
        Self(Arc::clone(registry))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl SessionRegistry {
    pub fn new(service: Arc<dyn TaskService>) -> Self {
        let (in_flight, _) = watch::channel(0);
        Self {
            service,
            open: Mutex::new(HashMap::new()),
            in_flight,
            opened: AtomicU64::new(0),
            closed: AtomicU64::new(0),
        }
    }

    pub fn service(&self) -> &Arc<dyn TaskService> {
        &self.service
    }

    /// Create a session for `test_name` and record it as open.
    ///
    /// The creation outlives a dropped caller: a session the service creates
    /// after the run was interrupted is still registered.
    pub async fn open(self: &Arc<Self>, test_name: &str) -> ServiceResult<SessionId> {
        let guard = InFlight::enter(self);
        let registry = Arc::clone(self);
        let test_name = test_name.to_string();

        let task = tokio::spawn(async move {
            let _guard = guard;
            let session = registry.service.create_session().await?;
            registry
                .open
                .lock()
                .await
                .insert(session.clone(), test_name.clone());
            registry.opened.fetch_add(1, Ordering::SeqCst);
            debug!(test = %test_name, session_id = %session, "session opened");
            Ok::<_, ServiceError>(session)
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(ServiceError::Transport(format!(
                "session creation did not complete: {e}"
            ))),
        }
    }

    /// Close `session` if it is still registered.
    ///
    /// Removal happens under the lock before the close call, so a session
    /// released concurrently with [`close_all`](Self::close_all) is closed once.
    pub async fn release(self: &Arc<Self>, session: &SessionId) {
        let guard = InFlight::enter(self);
        let registry = Arc::clone(self);
        let session = session.clone();

        let task = tokio::spawn(async move {
            let _guard = guard;
            let owner = registry.open.lock().await.remove(&session);
            let Some(test_name) = owner else {
                return;
            };
            match registry.service.close_session(&session).await {
                Ok(()) => debug!(test = %test_name, session_id = %session, "session closed"),
                Err(e) => warn!(test = %test_name, session_id = %session, error = %e, "failed to close session"),
            }
            registry.closed.fetch_add(1, Ordering::SeqCst);
        });

        if let Err(e) = task.await {
            warn!(error = %e, "session release did not complete");
        }
    }

    /// Best-effort close of every session still open. Failures are logged and
    /// not retried.
    ///
    /// Waits for opens and releases still in flight first.
    pub async fn close_all(&self) -> usize {
        let mut in_flight = self.in_flight.subscribe();
        if in_flight.wait_for(|n| *n == 0).await.is_err() {
            warn!("session tracking closed while waiting for in-flight sessions");
        }

        let drained: Vec<(SessionId, String)> = self.open.lock().await.drain().collect();
        if drained.is_empty() {
            return 0;
        }
        info!(count = drained.len(), "closing open sessions");

        let service = &self.service;
        let closes = drained.iter().map(|(session, test_name)| async move {
            if let Err(e) = service.close_session(session).await {
                warn!(test = %test_name, session_id = %session, error = %e, "failed to close session");
            }
        });
        futures::future::join_all(closes).await;
        self.closed.fetch_add(drained.len() as u64, Ordering::SeqCst);
        drained.len()
    }

    /// Sessions currently registered as open.
    pub async fn open_count(&self) -> usize {
        self.open.lock().await.len()
    }

    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> u64 {
        self.closed.load(Ordering::SeqCst)
    }
}
