use std::collections::HashMap;
use std::sync::Arc;

use scopeguard::guard;
use tracing::{debug, info, warn};

use crate::api::TelemetryApi;
use crate::error::TelemetryError;
use crate::models::{ClientConfig, ProbeTarget};

/// Name of the agent configuration file; its content must match `ClientConfig`.
pub(crate) const CLIENT_CONFIG_FILE: &str = "client.json";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ConfigFileSession {
    pub(crate) client_id: String,
    pub(crate) path: String,
    pub(crate) name: String,
    pub(crate) original_content: String,
    pub(crate) working_content: String,
}

impl ConfigFileSession {
    pub(crate) fn is_modified(&self) -> bool {
        self.original_content != self.working_content
    }

    /// Number of line positions that differ between the original and the edit.
    pub(crate) fn changed_lines(&self) -> usize {
        let before: Vec<&str> = self.original_content.lines().collect();
        let after: Vec<&str> = self.working_content.lines().collect();
        let common = before.len().min(after.len());
        let differing = (0..common).filter(|&i| before[i] != after[i]).count();
        differing + before.len().max(after.len()) - common
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SessionState {
    Closed,
    Fetching { path: String },
    Ready(ConfigFileSession),
    Saving,
}

impl SessionState {
    fn label(&self) -> &'static str {
        match self {
            SessionState::Closed => "closed",
            SessionState::Fetching { .. } => "fetching",
            SessionState::Ready(_) => "ready",
            SessionState::Saving => "saving",
        }
    }
}

/// The edit session for one client's remote file.
///
/// `open` always ends in `Ready`, falling back to a default document when
/// the file cannot be fetched. `save` and `discard` always end in `Closed`;
/// nothing is retried.
pub(crate) struct ConfigFileTransaction<A> {
    api: Arc<A>,
    client_id: String,
    state: SessionState,
}

impl<A: TelemetryApi> ConfigFileTransaction<A> {
    pub(crate) fn new(api: Arc<A>, client_id: impl Into<String>) -> Self {
        Self {
            api,
            client_id: client_id.into(),
            state: SessionState::Closed,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &SessionState {
        &self.state
    }

    pub(crate) fn session(&self) -> Option<&ConfigFileSession> {
        match &self.state {
            SessionState::Ready(session) => Some(session),
            _ => None,
        }
    }

    /// Replaces whatever session was open before.
    pub(crate) async fn open(&mut self, path: &str) -> &ConfigFileSession {
        if let SessionState::Ready(previous) = &self.state {
            debug!(
                "Replacing open session for {} on client {}",
                previous.path, self.client_id
            );
        }
        self.state = SessionState::Fetching {
            path: path.to_string(),
        };

        let (name, content) = match self.api.get_config_file(&self.client_id, path).await {
            Ok(file) => (file.name, file.content),
            Err(e) => {
                warn!(
                    "Could not fetch {} from client {}: {}. Using the default document.",
                    path, self.client_id, e
                );
                (path.to_string(), default_document())
            }
        };

        self.state = SessionState::Ready(ConfigFileSession {
            client_id: self.client_id.clone(),
            path: path.to_string(),
            name,
            original_content: content.clone(),
            working_content: content,
        });
        match &self.state {
            SessionState::Ready(session) => session,
            _ => unreachable!("state was set to ready above"),
        }
    }

    pub(crate) fn edit(&mut self, content: impl Into<String>) -> Result<(), TelemetryError> {
        match &mut self.state {
            SessionState::Ready(session) => {
                session.working_content = content.into();
                Ok(())
            }
            other => Err(TelemetryError::InvalidState(other.label())),
        }
    }

    /// Write the working content back. The session is closed afterwards
    /// whether or not the write succeeded.
    pub(crate) async fn save(&mut self) -> Result<(), TelemetryError> {
        let session = match std::mem::replace(&mut self.state, SessionState::Saving) {
            SessionState::Ready(session) => session,
            other => {
                let label = other.label();
                self.state = other;
                return Err(TelemetryError::InvalidState(label));
            }
        };
        let tx = guard(self, |tx| tx.state = SessionState::Closed);

        validate(&session.path, &session.working_content)?;
        tx.api
            .update_config_file(&session.client_id, &session.path, &session.working_content)
            .await
            .inspect_err(|e| {
                warn!(
                    "Failed to save {} on client {}: {}",
                    session.path, session.client_id, e
                )
            })?;
        info!("Saved {} on client {}", session.path, session.client_id);
        Ok(())
    }

    pub(crate) fn discard(&mut self) -> Result<(), TelemetryError> {
        match self.state {
            SessionState::Fetching { .. } | SessionState::Ready(_) => {
                self.state = SessionState::Closed;
                Ok(())
            }
            ref other => Err(TelemetryError::InvalidState(other.label())),
        }
    }
}

/// One transaction per client, so two sessions for the same client cannot coexist.
pub(crate) struct ConfigEditor<A> {
    api: Arc<A>,
    transactions: HashMap<String, ConfigFileTransaction<A>>,
}

impl<A: TelemetryApi> ConfigEditor<A> {
    pub(crate) fn new(api: Arc<A>) -> Self {
        Self {
            api,
            transactions: HashMap::new(),
        }
    }

    pub(crate) fn session(&mut self, client_id: &str) -> &mut ConfigFileTransaction<A> {
        let api = &self.api;
        self.transactions
            .entry(client_id.to_string())
            .or_insert_with(|| ConfigFileTransaction::new(Arc::clone(api), client_id))
    }
}

fn validate(path: &str, content: &str) -> Result<(), TelemetryError> {
    if path.rsplit('/').next() == Some(CLIENT_CONFIG_FILE) {
        serde_json::from_str::<ClientConfig>(content)
            .map_err(|e| TelemetryError::Validation(e.to_string()))?;
    } else if path.ends_with(".json") {
        serde_json::from_str::<serde_json::Value>(content)
            .map_err(|e| TelemetryError::Validation(e.to_string()))?;
    }
    Ok(())
}

/// Editable stand-in shown when the client's file cannot be fetched.
pub(crate) fn default_document() -> String {
    let config = ClientConfig {
        server_address: "http://localhost:8080".to_string(),
        client_name: "Demo Client".to_string(),
        targets: vec![
            ProbeTarget {
                name: "Google".to_string(),
                url: "https://www.google.com".to_string(),
                interval: 60,
                enabled: true,
            },
            ProbeTarget {
                name: "GitHub".to_string(),
                url: "https://github.com".to_string(),
                interval: 60,
                enabled: true,
            },
        ],
        log_level: "info".to_string(),
    };
    serde_json::to_string_pretty(&config).unwrap_or_else(|_| "{}".to_string())
}
