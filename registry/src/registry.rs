use crate::metrics_defs::{REGISTRY_REFRESH, REGISTRY_TENANTS};
use crate::store::{StoreError, TenantStore};
use crate::types::{TenantId, TenantRecord};
use parking_lot::RwLock;
use shared::{counter, gauge};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{AcquireError, Semaphore, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("tenant '{0}' is not registered")]
    UnknownTenant(TenantId),

    #[error("tenant backing store unavailable: {0}")]
    Unavailable(#[from] StoreError),

    #[error("another refresh is in progress")]
    ConcurrentRefresh(#[from] AcquireError),
}

#[derive(Debug)]
pub enum Command {
    // Trigger a refresh outside of the normal interval. The worker sends
    // the refresh result when the attempt finishes.
    Refresh(oneshot::Sender<Result<usize, RegistryError>>),
    // Trigger the worker to shut down gracefully.
    Shutdown,
}

struct RegistryInner {
    store: Arc<dyn TenantStore>,
    snapshot: RwLock<HashMap<TenantId, Arc<TenantRecord>>>,
    // Serializes refreshes so overlapping loads cannot interleave swaps.
    update_lock: Semaphore,
    // Used by the readiness probe. Initially false, set to true once any
    // snapshot has been published.
    ready: AtomicBool,
}

/// In-memory cache of the tenant->destination mapping.
///
/// `resolve` is a pure snapshot lookup and never performs I/O. `refresh`
/// reloads the full mapping from the backing store and replaces the
/// snapshot wholesale under a write lock; readers either see the old
/// snapshot or the new one, never a partial mapping. If the store is
/// unreachable the previous snapshot is retained (stale-but-available)
/// and the error is returned to the caller.
#[derive(Clone)]
pub struct TenantRegistry {
    inner: Arc<RegistryInner>,
}

impl TenantRegistry {
    pub fn new(store: Arc<dyn TenantStore>) -> Self {
        TenantRegistry {
            inner: Arc::new(RegistryInner {
                store,
                snapshot: RwLock::new(HashMap::new()),
                update_lock: Semaphore::new(1),
                ready: AtomicBool::new(false),
            }),
        }
    }

    pub fn resolve(&self, tenant_id: &str) -> Result<Arc<TenantRecord>, RegistryError> {
        let guard = self.inner.snapshot.read();
        guard
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownTenant(tenant_id.to_string()))
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Relaxed)
    }

    /// Reloads the tenant mapping. Returns the number of tenants in the
    /// new snapshot.
    pub async fn refresh(&self) -> Result<usize, RegistryError> {
        // Hold the permit for the duration of the load and swap.
        let _permit = self.inner.update_lock.acquire().await?;

        let rows = match self.inner.store.load_tenants().await {
            Ok(rows) => rows,
            Err(err) => {
                counter!(REGISTRY_REFRESH, "outcome" => "failure").increment(1);
                return Err(err.into());
            }
        };

        let mut tenants = HashMap::with_capacity(rows.len());
        for row in rows {
            match Url::parse(&row.host) {
                Ok(host) => {
                    tenants.insert(
                        row.tenant_id.clone(),
                        Arc::new(TenantRecord::new(row.tenant_id, host)),
                    );
                }
                Err(err) => {
                    // A single bad row must not poison the whole refresh.
                    tracing::warn!(
                        tenant_id = %row.tenant_id,
                        host = %row.host,
                        %err,
                        "skipping tenant with invalid destination host"
                    );
                }
            }
        }

        let count = tenants.len();
        *self.inner.snapshot.write() = tenants;
        self.inner.ready.store(true, Ordering::Relaxed);

        counter!(REGISTRY_REFRESH, "outcome" => "success").increment(1);
        gauge!(REGISTRY_TENANTS).set(count as f64);
        tracing::info!(tenants = count, "tenant registry refreshed");

        Ok(count)
    }

    /// Worker loop servicing on-demand refresh commands and, when an
    /// interval is configured, periodic reloads. Runs until `Shutdown` is
    /// received or the command channel is dropped. A failed periodic
    /// refresh keeps the previous snapshot and is never fatal.
    pub async fn run_worker(
        &self,
        mut rx: mpsc::Receiver<Command>,
        refresh_interval: Option<Duration>,
    ) {
        let mut ticker = refresh_interval.map(|period| {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(Command::Refresh(reply)) => {
                        let _ = reply.send(self.refresh().await);
                    }
                    Some(Command::Shutdown) | None => {
                        tracing::debug!("registry worker shutting down");
                        break;
                    }
                },
                _ = tick(&mut ticker) => {
                    if let Err(err) = self.refresh().await {
                        tracing::warn!(%err, "periodic tenant refresh failed, keeping previous snapshot");
                    }
                }
            }
        }
    }
}

async fn tick(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
