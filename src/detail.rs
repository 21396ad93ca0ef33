use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::api::TelemetryApi;
use crate::chart::ChartWindow;
use crate::config::DetailSettings;
use crate::error::{TelemetryError, TransportError};
use crate::models::{Client, Request};
use crate::scheduler::{CycleToken, REFRESH_INTERVAL, RefreshScheduler};
use crate::stats::Stats;
use crate::windows::RequestWindowStore;

struct DetailState<A> {
    api: Arc<A>,
    client_id: String,
    settings: DetailSettings,
    client: RwLock<Option<Arc<Client>>>,
    windows: RequestWindowStore,
    generation: watch::Sender<u64>,
}

impl<A: TelemetryApi> DetailState<A> {
    fn set_client(&self, client: Option<Client>) {
        *self.client.write().unwrap_or_else(PoisonError::into_inner) = client.map(Arc::new);
    }

    /// Client info and request window are fetched side by side and applied
    /// independently, so either can lag the other by one cycle.
    async fn refresh(&self, cycle: &CycleToken) -> Result<()> {
        let (client, window) = tokio::join!(
            self.api.fetch_client(&self.client_id),
            self.windows.refresh(
                self.api.as_ref(),
                &self.client_id,
                self.settings.request_limit,
                cycle
            ),
        );
        let applied = cycle.apply(|| {
            let outcome = match client {
                Ok(client) => {
                    self.set_client(Some(client));
                    Ok(())
                }
                Err(TransportError::Status { status: 404, .. }) => {
                    info!("Client {} is no longer known to the server", self.client_id);
                    self.set_client(None);
                    Ok(())
                }
                Err(e) => Err(e),
            };
            self.generation.send_modify(|g| *g += 1);
            outcome
        });
        let Some(client_result) = applied else {
            return Ok(());
        };

        client_result.with_context(|| format!("failed to fetch client {}", self.client_id))?;
        window.with_context(|| format!("failed to fetch requests for {}", self.client_id))?;
        debug!("Detail view for {} refreshed", self.client_id);
        Ok(())
    }
}

/// One client's status page: identity, rollup stats, chart series and the
/// raw request window. Derived values are recomputed from the current
/// window on every read.
pub(crate) struct ClientDetailView<A> {
    state: Arc<DetailState<A>>,
    scheduler: RefreshScheduler,
}

impl<A: TelemetryApi + 'static> ClientDetailView<A> {
    pub(crate) fn new(api: Arc<A>, client_id: impl Into<String>, settings: DetailSettings) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            state: Arc::new(DetailState {
                api,
                client_id: client_id.into(),
                settings,
                client: RwLock::new(None),
                windows: RequestWindowStore::default(),
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

    pub(crate) fn updates(&self) -> watch::Receiver<u64> {
        self.state.generation.subscribe()
    }

    pub(crate) fn client_id(&self) -> &str {
        &self.state.client_id
    }

    pub(crate) fn client(&self) -> Result<Arc<Client>, TelemetryError> {
        self.state
            .client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| TelemetryError::NotFound(self.state.client_id.clone()))
    }

    pub(crate) fn requests(&self) -> Arc<Vec<Request>> {
        self.state.windows.window(&self.state.client_id)
    }

    pub(crate) fn stats(&self) -> Stats {
        Stats::from_requests(&self.requests())
    }

    pub(crate) fn chart(&self) -> ChartWindow {
        ChartWindow::build(&self.requests(), self.state.settings.chart_window)
    }
}
