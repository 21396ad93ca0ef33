use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ClientStatus {
    Online,
    Offline,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Client {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) status: ClientStatus,
    #[serde(default)]
    pub(crate) ip_address: String,
    #[serde(default)]
    pub(crate) os_info: String,
    #[serde(default)]
    pub(crate) version: String,
    pub(crate) last_seen: DateTime<Utc>,
    pub(crate) connected_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) disconnected_at: Option<DateTime<Utc>>,
}

impl Client {
    pub(crate) fn is_online(&self) -> bool {
        self.status == ClientStatus::Online
    }
}

/// One recorded probe. All latencies are in milliseconds.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Request {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) client_id: String,
    #[serde(default)]
    pub(crate) target_name: String,
    pub(crate) url: String,
    #[serde(default)]
    pub(crate) method: Option<String>,
    #[serde(default)]
    pub(crate) status_code: Option<u16>,
    #[serde(default)]
    pub(crate) error: Option<String>,
    #[serde(default)]
    pub(crate) error_type: Option<String>,
    pub(crate) start_time: DateTime<Utc>,
    #[serde(default)]
    pub(crate) end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(crate) dns_time: u64,
    #[serde(default)]
    pub(crate) tcp_time: u64,
    #[serde(default)]
    pub(crate) tls_time: u64,
    #[serde(default)]
    pub(crate) request_time: Option<u64>,
    #[serde(default)]
    pub(crate) response_time: Option<u64>,
    #[serde(default)]
    pub(crate) total_time: u64,
}

impl Request {
    /// The server sends an empty string when there was no error.
    pub(crate) fn error_message(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }

    /// An error wins over any status code that came along with it.
    pub(crate) fn is_success(&self) -> bool {
        if self.error_message().is_some() {
            return false;
        }
        self.status_code.map_or(true, |code| code < 400)
    }
}

/// A request in the merged dashboard feed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TaggedRequest {
    pub(crate) client_id: String,
    pub(crate) client_name: String,
    pub(crate) request: Request,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub(crate) struct ConfigFile {
    pub(crate) name: String,
    pub(crate) content: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct FileQuery<'a> {
    pub(crate) path: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct FileUpdate<'a> {
    pub(crate) path: &'a str,
    pub(crate) content: &'a str,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerConfig {
    pub(crate) max_clients: u32,
    pub(crate) history_days: u32,
    pub(crate) listen_address: String,
    pub(crate) refresh_interval: u64,
}

/// A site a client probes on its own schedule (interval in seconds).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub(crate) struct ProbeTarget {
    pub(crate) name: String,
    pub(crate) url: String,
    pub(crate) interval: u64,
    pub(crate) enabled: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClientConfig {
    pub(crate) server_address: String,
    pub(crate) client_name: String,
    pub(crate) targets: Vec<ProbeTarget>,
    pub(crate) log_level: String,
}
