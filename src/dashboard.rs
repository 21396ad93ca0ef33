use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::debug;

use crate::api::TelemetryApi;
use crate::config::DashboardSettings;
use crate::models::TaggedRequest;
use crate::registry::{ClientRegistry, ClientSnapshot};
use crate::scheduler::{CycleToken, REFRESH_INTERVAL, RefreshScheduler};
use crate::stats::Stats;
use crate::windows::RequestWindowStore;

/// Everything the dashboard shows, taken from one consistent set of snapshots.
#[derive(Debug, Clone)]
pub(crate) struct DashboardSummary {
    pub(crate) clients: ClientSnapshot,
    pub(crate) recent: Arc<Vec<TaggedRequest>>,
    pub(crate) stats: Stats,
}

impl DashboardSummary {
    /// Share of registered clients that are online, rounded to a whole percent.
    pub(crate) fn healthy_percent(&self) -> u32 {
        if self.clients.is_empty() {
            return 0;
        }
        (self.clients.online_count() as f64 / self.clients.len() as f64 * 100.0).round() as u32
    }
}

struct DashboardState<A> {
    api: Arc<A>,
    settings: DashboardSettings,
    registry: ClientRegistry,
    windows: RequestWindowStore,
    recent: RwLock<Arc<Vec<TaggedRequest>>>,
    generation: watch::Sender<u64>,
}

impl<A: TelemetryApi> DashboardState<A> {
    async fn refresh(&self, cycle: &CycleToken) -> Result<()> {
        self.registry
            .refresh(self.api.as_ref(), cycle)
            .await
            .context("failed to fetch clients")?;

        let clients = self.registry.current();
        let recent = self
            .windows
            .merge_across_online(
                self.api.as_ref(),
                &clients,
                self.settings.max_clients,
                self.settings.per_client_limit,
                self.settings.recent_limit,
                cycle,
            )
            .await;

        let count = recent.len();
        let applied = cycle.apply(|| {
            *self.recent.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(recent);
            self.generation.send_modify(|g| *g += 1);
        });
        if applied.is_some() {
            debug!("Dashboard feed refreshed with {} recent requests", count);
        }
        Ok(())
    }
}

/// Fleet overview: client counts plus the newest requests across the first
/// few online clients. Polls while started; stops when dropped.
pub(crate) struct DashboardView<A> {
    state: Arc<DashboardState<A>>,
    scheduler: RefreshScheduler,
}

impl<A: TelemetryApi + 'static> DashboardView<A> {
    pub(crate) fn new(api: Arc<A>, settings: DashboardSettings) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            state: Arc::new(DashboardState {
                api,
                settings,
                registry: ClientRegistry::default(),
                windows: RequestWindowStore::default(),
                recent: RwLock::new(Arc::new(Vec::new())),
                generation,
            }),
            scheduler: RefreshScheduler::new(),
        }
    }

    pub(crate) fn start(&mut self) {
        let state = Arc::clone(&self.state);
        self.scheduler.start(
            move |cycle| {
                let state = Arc::clone(&state);
                async move { state.refresh(&cycle).await }
            },
            REFRESH_INTERVAL,
        );
    }

    pub(crate) fn stop(&mut self) {
        self.scheduler.stop();
    }

    pub(crate) async fn refresh_once(&self) -> Result<()> {
        self.state.refresh(&CycleToken::detached()).await
    }

    /// Ticks once per applied refresh.
    pub(crate) fn updates(&self) -> watch::Receiver<u64> {
        self.state.generation.subscribe()
    }

    pub(crate) fn summary(&self) -> DashboardSummary {
        let recent = Arc::clone(&self.state.recent.read().unwrap_or_else(PoisonError::into_inner));
        DashboardSummary {
            clients: self.state.registry.current(),
            recent,
            stats: Stats::from_requests(&self.state.windows.all_requests()),
        }
    }
}
