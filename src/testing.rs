//! Fixtures shared by the unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::api::TelemetryApi;
use crate::error::TransportError;
use crate::models::{Client, ClientStatus, ConfigFile, Request};

pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs)
}

pub(crate) fn request(id: &str, secs: i64, total_time: u64) -> Request {
    Request {
        id: id.to_string(),
        client_id: String::new(),
        target_name: "GitHub".to_string(),
        url: "https://github.com".to_string(),
        method: Some("GET".to_string()),
        status_code: Some(200),
        error: None,
        error_type: None,
        start_time: at(secs),
        end_time: None,
        dns_time: 0,
        tcp_time: 0,
        tls_time: 0,
        request_time: None,
        response_time: None,
        total_time,
    }
}

pub(crate) fn failed_request(id: &str, secs: i64, error: &str) -> Request {
    Request {
        status_code: None,
        error: Some(error.to_string()),
        error_type: Some("network".to_string()),
        ..request(id, secs, 0)
    }
}

impl Request {
    pub(crate) fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub(crate) fn with_phases(mut self, dns: u64, tcp: u64, tls: u64) -> Self {
        self.dns_time = dns;
        self.tcp_time = tcp;
        self.tls_time = tls;
        self
    }
}

pub(crate) fn client(id: &str, status: ClientStatus) -> Client {
    Client {
        id: id.to_string(),
        name: format!("{}-name", id),
        status,
        ip_address: "10.0.0.1".to_string(),
        os_info: "linux/amd64".to_string(),
        version: "1.0.0".to_string(),
        last_seen: at(0),
        connected_at: at(-3600),
        disconnected_at: None,
    }
}

/// In-memory server. Missing entries answer 404; `delay` is applied to
/// every call so tests can hold fetches in flight on a paused clock.
#[derive(Default)]
pub(crate) struct FakeApi {
    pub(crate) clients: Mutex<Vec<Client>>,
    pub(crate) requests: Mutex<HashMap<String, Vec<Request>>>,
    pub(crate) files: Mutex<HashMap<(String, String), String>>,
    pub(crate) failing_clients: Mutex<Vec<String>>,
    pub(crate) fail_writes: Mutex<bool>,
    pub(crate) delay: Mutex<Option<Duration>>,
    pub(crate) calls: AtomicUsize,
}

impl FakeApi {
    pub(crate) fn with_clients(clients: Vec<Client>) -> Self {
        let api = FakeApi::default();
        *api.clients.lock().unwrap() = clients;
        api
    }

    pub(crate) fn set_requests(&self, client_id: &str, requests: Vec<Request>) {
        self.requests
            .lock()
            .unwrap()
            .insert(client_id.to_string(), requests);
    }

    pub(crate) fn fail_client(&self, client_id: &str) {
        self.failing_clients
            .lock()
            .unwrap()
            .push(client_id.to_string());
    }

    pub(crate) fn file(&self, client_id: &str, path: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(&(client_id.to_string(), path.to_string()))
            .cloned()
    }

    async fn pause(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn not_found() -> TransportError {
        TransportError::status(404, "Not Found")
    }
}

impl TelemetryApi for FakeApi {
    async fn fetch_clients(&self) -> Result<Vec<Client>, TransportError> {
        self.pause().await;
        Ok(self.clients.lock().unwrap().clone())
    }

    async fn fetch_client(&self, client_id: &str) -> Result<Client, TransportError> {
        self.pause().await;
        self.clients
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == client_id)
            .cloned()
            .ok_or_else(Self::not_found)
    }

    async fn fetch_client_requests(
        &self,
        client_id: &str,
        limit: usize,
    ) -> Result<Vec<Request>, TransportError> {
        self.pause().await;
        if self
            .failing_clients
            .lock()
            .unwrap()
            .iter()
            .any(|id| id == client_id)
        {
            return Err(TransportError::status(502, "Bad Gateway"));
        }
        let requests = self.requests.lock().unwrap();
        let window = requests.get(client_id).cloned().unwrap_or_default();
        Ok(window.into_iter().take(limit).collect())
    }

    async fn get_config_file(
        &self,
        client_id: &str,
        path: &str,
    ) -> Result<ConfigFile, TransportError> {
        self.pause().await;
        self.file(client_id, path)
            .map(|content| ConfigFile {
                name: path.to_string(),
                content,
            })
            .ok_or_else(Self::not_found)
    }

    async fn update_config_file(
        &self,
        client_id: &str,
        path: &str,
        content: &str,
    ) -> Result<(), TransportError> {
        self.pause().await;
        if *self.fail_writes.lock().unwrap() {
            return Err(TransportError::status(500, "Internal Server Error"));
        }
        self.files.lock().unwrap().insert(
            (client_id.to_string(), path.to_string()),
            content.to_string(),
        );
        Ok(())
    }
}
