use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::join_all;
use tracing::{debug, warn};

use crate::api::TelemetryApi;
use crate::error::TransportError;
use crate::merge::merge_recent;
use crate::models::{Client, Request, TaggedRequest};
use crate::registry::ClientSnapshot;
use crate::scheduler::CycleToken;

type WindowMap = HashMap<String, Arc<Vec<Request>>>;

/// Recent requests per client. Windows are only ever swapped in whole.
#[derive(Debug, Default)]
pub(crate) struct RequestWindowStore {
    windows: RwLock<Arc<WindowMap>>,
}

impl RequestWindowStore {
    pub(crate) fn window(&self, client_id: &str) -> Arc<Vec<Request>> {
        self.current().get(client_id).cloned().unwrap_or_default()
    }

    /// Every request currently held, client by client.
    pub(crate) fn all_requests(&self) -> Vec<Request> {
        self.current()
            .values()
            .flat_map(|w| w.iter().cloned())
            .collect()
    }

    fn current(&self) -> Arc<WindowMap> {
        let guard = self.windows.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    fn swap(&self, update: impl FnOnce(&mut WindowMap)) {
        let mut guard = self.windows.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = WindowMap::clone(&guard);
        update(&mut next);
        *guard = Arc::new(next);
    }

    /// Returns whether the fetched window was applied.
    pub(crate) async fn refresh<A: TelemetryApi>(
        &self,
        api: &A,
        client_id: &str,
        limit: usize,
        cycle: &CycleToken,
    ) -> Result<bool, TransportError> {
        let requests = api.fetch_client_requests(client_id, limit).await?;
        let window = Arc::new(bounded(requests, limit));
        let applied = cycle.apply(|| {
            self.swap(|windows| {
                windows.insert(client_id.to_string(), window);
            })
        });
        if applied.is_none() {
            debug!("Dropping window for {} fetched after shutdown", client_id);
        }
        Ok(applied.is_some())
    }

    /// Fetch the windows of the first `max_clients` online clients at once and
    /// merge them into the `recent_limit` newest requests.
    ///
    /// A client whose fetch fails contributes an empty window for this cycle.
    /// When the cycle is still live the store is replaced by exactly the
    /// windows fetched here.
    pub(crate) async fn merge_across_online<A: TelemetryApi>(
        &self,
        api: &A,
        clients: &ClientSnapshot,
        max_clients: usize,
        per_client_limit: usize,
        recent_limit: usize,
        cycle: &CycleToken,
    ) -> Vec<TaggedRequest> {
        let selected: Vec<&Client> = clients.online_clients().take(max_clients).collect();

        let fetches: Vec<_> = selected
            .iter()
            .map(|&client| fetch_window(api, client, per_client_limit))
            .collect();
        // join_all keeps registry order, which the merge relies on for ties
        let outcomes = join_all(fetches).await;

        let mut fetched: Vec<(&Client, Vec<Request>)> = Vec::with_capacity(outcomes.len());
        for (client, res) in outcomes {
            match res {
                Ok(requests) => fetched.push((client, bounded(requests, per_client_limit))),
                Err(e) => {
                    warn!("Failed to fetch requests for {} ({}): {}", client.name, client.id, e);
                    fetched.push((client, Vec::new()));
                }
            }
        }

        let next: WindowMap = fetched
            .iter()
            .map(|(client, requests)| (client.id.clone(), Arc::new(requests.clone())))
            .collect();
        cycle.apply(|| {
            *self.windows.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        });

        let windows: Vec<(&Client, &[Request])> = fetched
            .iter()
            .map(|(client, requests)| (*client, requests.as_slice()))
            .collect();
        merge_recent(&windows, recent_limit)
    }
}

async fn fetch_window<'a, A: TelemetryApi>(
    api: &'a A,
    client: &'a Client,
    limit: usize,
) -> (&'a Client, Result<Vec<Request>, TransportError>) {
    (client, api.fetch_client_requests(&client.id, limit).await)
}

/// Keep at most `limit` requests, preferring the newest ones.
fn bounded(mut requests: Vec<Request>, limit: usize) -> Vec<Request> {
    if requests.len() > limit {
        requests.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        requests.truncate(limit);
    }
    requests
}
