//! Bounded pool of shared renderer sessions.
//!
//! Sessions are shared, not leased: once the pool is full, `acquire` hands out
//! the least-recently-used session. Callers must open their own page on it and
//! close that page on every exit path.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::{Result, TributaryError};
use crate::scraper::config::PoolConfig;

/// A live rendering session.
#[async_trait]
pub trait RenderSession: Send + Sync + 'static {
    /// Cheap liveness probe.
    async fn probe(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;
}

/// Launches new sessions for the pool.
#[async_trait]
pub trait SessionLauncher: Send + Sync + 'static {
    type Session: RenderSession;

    async fn launch(&self) -> Result<Self::Session>;
}

struct PooledSession<S> {
    id: u64,
    session: Arc<S>,
    last_used: Instant,
}

/// A borrowed session. Dropping it does not close anything.
pub struct SessionHandle<S> {
    id: u64,
    session: Arc<S>,
}

impl<S> SessionHandle<S> {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<S> Deref for SessionHandle<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

pub struct RendererPool<L: SessionLauncher> {
    launcher: L,
    config: PoolConfig,
    sessions: Mutex<Vec<PooledSession<L::Session>>>,
    next_id: AtomicU64,
    health_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<L: SessionLauncher> RendererPool<L> {
    pub fn new(launcher: L, config: PoolConfig) -> Arc<Self> {
        Arc::new(Self {
            launcher,
            config,
            sessions: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            health_task: std::sync::Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Create the pool and start its periodic health check.
    pub fn start(launcher: L, config: PoolConfig) -> Arc<Self> {
        let pool = Self::new(launcher, config);
        pool.spawn_health_check();
        pool
    }

    fn spawn_health_check(self: &Arc<Self>) {
        let period = self.config.health_check_interval();
        let weak: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(pool) = weak.upgrade() else {
                    break;
                };
                let evicted = pool.sweep().await;
                if evicted > 0 {
                    info!("Health check evicted {} renderer session(s)", evicted);
                }
            }
        });

        if let Ok(mut slot) = self.health_task.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
    }

    pub fn max_sessions(&self) -> usize {
        self.config.max_sessions
    }

    pub async fn live_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Borrow a session, launching one if the pool is below its cap.
    pub async fn acquire(&self) -> Result<SessionHandle<L::Session>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TributaryError::pool_launch("renderer pool is shut down"));
        }

        let mut sessions = self.sessions.lock().await;
        Self::evict_unhealthy(&mut sessions).await;

        if sessions.len() < self.config.max_sessions.max(1) {
            let session = self
                .launcher
                .launch()
                .await
                .map_err(|e| TributaryError::pool_launch(e.to_string()))?;

            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let session = Arc::new(session);
            sessions.push(PooledSession {
                id,
                session: session.clone(),
                last_used: Instant::now(),
            });
            debug!("Launched renderer session {} ({} live)", id, sessions.len());

            return Ok(SessionHandle { id, session });
        }

        let lru = sessions
            .iter_mut()
            .min_by_key(|s| s.last_used)
            .ok_or_else(|| TributaryError::pool_launch("renderer pool is empty"))?;
        lru.last_used = Instant::now();

        Ok(SessionHandle {
            id: lru.id,
            session: lru.session.clone(),
        })
    }

    /// Close and forget a session the caller found to be broken.
    pub(crate) async fn release_unhealthy(&self, handle: SessionHandle<L::Session>) {
        let mut sessions = self.sessions.lock().await;
        if let Some(index) = sessions.iter().position(|s| s.id == handle.id) {
            let pooled = sessions.remove(index);
            if let Err(e) = pooled.session.close().await {
                debug!("Ignoring close error for session {}: {}", pooled.id, e);
            }
            warn!("Evicted unhealthy renderer session {}", pooled.id);
        }
    }

    /// Probe every session now; returns how many were evicted.
    pub async fn sweep(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        Self::evict_unhealthy(&mut sessions).await
    }

    async fn evict_unhealthy(sessions: &mut Vec<PooledSession<L::Session>>) -> usize {
        let mut healthy = Vec::with_capacity(sessions.len());
        let mut evicted = 0;

        for pooled in sessions.drain(..) {
            match pooled.session.probe().await {
                Ok(()) => healthy.push(pooled),
                Err(e) => {
                    warn!("Renderer session {} failed health check: {}", pooled.id, e);
                    let _ = pooled.session.close().await;
                    evicted += 1;
                }
            }
        }

        *sessions = healthy;
        evicted
    }

    /// Stop health checking and close every session. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        let already_closed = self.closed.swap(true, Ordering::SeqCst);

        if let Ok(mut slot) = self.health_task.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }

        let mut sessions = self.sessions.lock().await;
        for pooled in sessions.drain(..) {
            if let Err(e) = pooled.session.close().await {
                debug!("Ignoring close error for session {}: {}", pooled.id, e);
            }
        }

        if !already_closed {
            info!("Renderer pool shut down");
        }
    }
}
