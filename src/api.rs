use std::future::Future;

use anyhow::Result;
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::Settings;
use crate::error::TransportError;
use crate::models::{Client, ConfigFile, FileQuery, FileUpdate, Request, ServerConfig};

/// The subset of the telemetry server the refresh engine talks to.
pub(crate) trait TelemetryApi: Send + Sync {
    fn fetch_clients(&self) -> impl Future<Output = Result<Vec<Client>, TransportError>> + Send;

    fn fetch_client(
        &self,
        client_id: &str,
    ) -> impl Future<Output = Result<Client, TransportError>> + Send;

    fn fetch_client_requests(
        &self,
        client_id: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Request>, TransportError>> + Send;

    fn get_config_file(
        &self,
        client_id: &str,
        path: &str,
    ) -> impl Future<Output = Result<ConfigFile, TransportError>> + Send;

    fn update_config_file(
        &self,
        client_id: &str,
        path: &str,
        content: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

#[derive(Debug, Clone)]
pub(crate) struct HttpApi {
    client: HttpClient,
    base_url: Url,
}

impl HttpApi {
    pub(crate) fn new(settings: &Settings) -> Result<Self> {
        let client = HttpClient::builder()
            .user_agent(&settings.user_agent)
            .timeout(settings.request_timeout)
            .build()?;
        let base_url = Url::parse(&settings.server_url)?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        Ok(self.base_url.join(path)?)
    }

    /// `/api/clients/{id}[/{resource}]`, with the id encoded as a single segment.
    fn client_endpoint(
        &self,
        client_id: &str,
        resource: Option<&str>,
    ) -> Result<Url, TransportError> {
        if matches!(client_id, "" | "." | "..") {
            return Err(TransportError::InvalidClientId(client_id.to_string()));
        }
        let mut url = self.endpoint("/api/clients/")?;
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidClientId(client_id.to_string()))?
            .pop_if_empty()
            .push(client_id)
            .extend(resource);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, TransportError> {
        let resp = request.send().await?;
        check_status(resp.status())?;
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, TransportError> {
        Ok(self.send(request).await?.json::<T>().await?)
    }

    pub(crate) async fn fetch_server_config(&self) -> Result<ServerConfig, TransportError> {
        let url = self.endpoint("/api/config")?;
        self.send_json(self.client.get(url)).await
    }
}

impl TelemetryApi for HttpApi {
    async fn fetch_clients(&self) -> Result<Vec<Client>, TransportError> {
        let url = self.endpoint("/api/clients")?;
        self.send_json(self.client.get(url)).await
    }

    async fn fetch_client(&self, client_id: &str) -> Result<Client, TransportError> {
        let url = self.client_endpoint(client_id, None)?;
        self.send_json(self.client.get(url)).await
    }

    async fn fetch_client_requests(
        &self,
        client_id: &str,
        limit: usize,
    ) -> Result<Vec<Request>, TransportError> {
        let url = self.client_endpoint(client_id, Some("requests"))?;
        debug!("Fetching up to {} requests for client {}", limit, client_id);
        self.send_json(self.client.get(url).query(&[("limit", limit)]))
            .await
    }

    async fn get_config_file(
        &self,
        client_id: &str,
        path: &str,
    ) -> Result<ConfigFile, TransportError> {
        let url = self.client_endpoint(client_id, Some("files"))?;
        self.send_json(self.client.post(url).json(&FileQuery { path }))
            .await
    }

    async fn update_config_file(
        &self,
        client_id: &str,
        path: &str,
        content: &str,
    ) -> Result<(), TransportError> {
        let url = self.client_endpoint(client_id, Some("files"))?;
        self.send(self.client.put(url).json(&FileUpdate { path, content }))
            .await?;
        Ok(())
    }
}

fn check_status(status: StatusCode) -> Result<(), TransportError> {
    if status.is_success() {
        return Ok(());
    }
    Err(TransportError::status(
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown Status"),
    ))
}
