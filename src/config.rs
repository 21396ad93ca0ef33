use std::time::Duration;

use anyhow::Result;
use config::{Config, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct DashboardSettings {
    /// Online clients whose windows feed the merged recent-requests list.
    pub(crate) max_clients: usize,
    pub(crate) per_client_limit: usize,
    pub(crate) recent_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct DetailSettings {
    pub(crate) request_limit: usize,
    pub(crate) chart_window: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct DisplaySettings {
    pub(crate) latency_threshold_ms: u64,
    pub(crate) success_rate_threshold_percent: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct Settings {
    pub(crate) server_url: String,
    pub(crate) user_agent: String,
    #[serde(with = "humantime_serde")]
    pub(crate) request_timeout: Duration,
    pub(crate) log_filter: String,
    pub(crate) dashboard: DashboardSettings,
    pub(crate) detail: DetailSettings,
    pub(crate) display: DisplaySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".to_string(),
            user_agent: concat!("fleetwatch/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout: Duration::from_secs(10),
            log_filter: "info".to_string(),
            dashboard: DashboardSettings {
                max_clients: 3,
                per_client_limit: 10,
                recent_limit: 10,
            },
            detail: DetailSettings {
                request_limit: 100,
                chart_window: crate::chart::CHART_WINDOW,
            },
            display: DisplaySettings {
                latency_threshold_ms: 500,
                success_rate_threshold_percent: 95.0,
            },
        }
    }
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
    let d = Settings::default();
    Ok(builder
        .set_default("server_url", d.server_url)?
        .set_default("user_agent", d.user_agent)?
        .set_default("request_timeout", "10s")?
        .set_default("log_filter", d.log_filter)?
        .set_default("dashboard.max_clients", d.dashboard.max_clients as i64)?
        .set_default("dashboard.per_client_limit", d.dashboard.per_client_limit as i64)?
        .set_default("dashboard.recent_limit", d.dashboard.recent_limit as i64)?
        .set_default("detail.request_limit", d.detail.request_limit as i64)?
        .set_default("detail.chart_window", d.detail.chart_window as i64)?
        .set_default("display.latency_threshold_ms", d.display.latency_threshold_ms as i64)?
        .set_default(
            "display.success_rate_threshold_percent",
            d.display.success_rate_threshold_percent,
        )?)
}

pub(crate) fn load_settings() -> Result<Settings> {
    let settings = with_defaults(Config::builder())?
        .add_source(File::with_name("config/default.toml").required(false))
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?;
    Ok(settings.try_deserialize()?)
}
