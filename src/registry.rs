use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use crate::api::TelemetryApi;
use crate::error::TransportError;
use crate::models::Client;
use crate::scheduler::CycleToken;

/// Latest full client list as returned by the server. Each refresh swaps in
/// a new list; clients missing from it are gone.
#[derive(Debug, Default)]
pub(crate) struct ClientRegistry {
    snapshot: RwLock<Arc<Vec<Client>>>,
}

impl ClientRegistry {
    pub(crate) fn current(&self) -> ClientSnapshot {
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        ClientSnapshot(Arc::clone(&guard))
    }

    fn replace(&self, next: ClientSnapshot) {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next.0;
    }

    /// Returns whether the fetched list was applied.
    pub(crate) async fn refresh<A: TelemetryApi>(
        &self,
        api: &A,
        cycle: &CycleToken,
    ) -> Result<bool, TransportError> {
        let next = ClientSnapshot(Arc::new(api.fetch_clients().await?));
        let applied = cycle.apply(|| {
            let vanished = self
                .current()
                .iter()
                .filter(|old| next.by_id(&old.id).is_none())
                .count();
            if vanished > 0 {
                info!("{} client(s) no longer reported by the server", vanished);
            }
            debug!("Registry refreshed with {} clients", next.len());
            self.replace(next);
        });
        if applied.is_none() {
            debug!("Dropping client list fetched after shutdown");
        }
        Ok(applied.is_some())
    }
}

/// An immutable view of one registry generation.
#[derive(Debug, Clone, Default)]
pub(crate) struct ClientSnapshot(Arc<Vec<Client>>);

impl ClientSnapshot {
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Client> {
        self.0.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn online_clients(&self) -> impl Iterator<Item = &Client> {
        self.0.iter().filter(|c| c.is_online())
    }

    pub(crate) fn offline_clients(&self) -> impl Iterator<Item = &Client> {
        self.0.iter().filter(|c| !c.is_online())
    }

    pub(crate) fn online_count(&self) -> usize {
        self.online_clients().count()
    }

    pub(crate) fn by_id(&self, id: &str) -> Option<&Client> {
        self.0.iter().find(|c| c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClientStatus;
    use crate::testing::{FakeApi, client};

    #[tokio::test]
    async fn refresh_replaces_the_whole_list() {
        let api = FakeApi::with_clients(vec![
            client("a", ClientStatus::Online),
            client("b", ClientStatus::Offline),
            client("c", ClientStatus::Online),
        ]);
        let registry = ClientRegistry::default();
        let cycle = CycleToken::detached();

        tokio_test::assert_ok!(registry.refresh(&api, &cycle).await);
        let first = registry.current();
        assert_eq!(first.len(), 3);
        assert_eq!(first.online_count(), 2);
        let online: Vec<&str> = first.online_clients().map(|c| c.id.as_str()).collect();
        assert_eq!(online, vec!["a", "c"]);
        let offline: Vec<&str> = first.offline_clients().map(|c| c.id.as_str()).collect();
        assert_eq!(offline, vec!["b"]);

        *api.clients.lock().unwrap() = vec![client("c", ClientStatus::Offline)];
        registry.refresh(&api, &cycle).await.unwrap();

        let second = registry.current();
        assert_eq!(second.len(), 1);
        assert!(second.by_id("a").is_none());
        assert_eq!(second.online_count(), 0);
        // the earlier generation is untouched
        assert_eq!(first.len(), 3);
    }

    #[tokio::test]
    async fn unknown_id_is_not_an_error() {
        let registry = ClientRegistry::default();
        assert!(registry.current().by_id("missing").is_none());
        assert_eq!(registry.current().len(), 0);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_snapshot() {
        let api = FakeApi::with_clients(vec![client("a", ClientStatus::Online)]);
        let registry = ClientRegistry::default();
        let cycle = CycleToken::detached();
        registry.refresh(&api, &cycle).await.unwrap();

        struct Down;
        impl TelemetryApi for Down {
            async fn fetch_clients(&self) -> Result<Vec<Client>, TransportError> {
                Err(TransportError::status(503, "Service Unavailable"))
            }
            async fn fetch_client(&self, _: &str) -> Result<Client, TransportError> {
                unreachable!()
            }
            async fn fetch_client_requests(
                &self,
                _: &str,
                _: usize,
            ) -> Result<Vec<crate::models::Request>, TransportError> {
                unreachable!()
            }
            async fn get_config_file(
                &self,
                _: &str,
                _: &str,
            ) -> Result<crate::models::ConfigFile, TransportError> {
                unreachable!()
            }
            async fn update_config_file(
                &self,
                _: &str,
                _: &str,
                _: &str,
            ) -> Result<(), TransportError> {
                unreachable!()
            }
        }

        tokio_test::assert_err!(registry.refresh(&Down, &cycle).await);
        assert!(registry.current().by_id("a").is_some());
    }
}
