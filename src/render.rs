use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use colored::*;

use crate::chart::ChartWindow;
use crate::config::DisplaySettings;
use crate::dashboard::DashboardSummary;
use crate::models::{Client, Request, ServerConfig};
use crate::session::ConfigFileSession;
use crate::stats::Stats;

const RULE: &str = "-----------------";
const TOP_CLIENTS: usize = 5;

/// "3m 12s ago", rounded to whole seconds. Timestamps from the future read
/// as "just now" since client clocks drift.
pub(crate) fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    if secs < 1 {
        return "just now".to_string();
    }
    format!(
        "{} ago",
        humantime::format_duration(Duration::from_secs(secs as u64))
    )
}

fn latency(ms: f64, display: &DisplaySettings) -> ColoredString {
    let text = format!("{:.0}ms", ms);
    if ms > display.latency_threshold_ms as f64 {
        text.red()
    } else {
        text.green()
    }
}

/// Whole percent, rounded half up.
fn percent(value: f64) -> String {
    format!("{}%", value.round())
}

fn success_rate(stats: &Stats, display: &DisplaySettings) -> ColoredString {
    let text = percent(stats.success_rate());
    if stats.success_rate() < display.success_rate_threshold_percent {
        text.red()
    } else {
        text.green()
    }
}

fn outcome(request: &Request) -> ColoredString {
    match (request.error_message(), request.status_code) {
        (Some(err), _) => err.red(),
        (None, Some(code)) if code >= 400 => code.to_string().yellow(),
        (None, Some(code)) => code.to_string().green(),
        (None, None) => "-".normal(),
    }
}

fn request_line(request: &Request, display: &DisplaySettings) -> String {
    format!(
        "{} {:<6} {:<16} {} {}",
        request.start_time.with_timezone(&Local).format("%H:%M:%S"),
        request.method.as_deref().unwrap_or("GET"),
        request.target_name,
        outcome(request),
        latency(request.total_time as f64, display)
    )
}

pub(crate) fn format_dashboard(
    summary: &DashboardSummary,
    display: &DisplaySettings,
    now: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let clients = &summary.clients;

    out.push_str(&format!("{}\n{}\n", "Fleet Overview".bold(), RULE));
    out.push_str(&format!(
        "Clients: {} total, {} online, {} offline ({}% healthy)\n",
        clients.len(),
        clients.online_count().to_string().green(),
        clients.offline_clients().count().to_string().red(),
        summary.healthy_percent()
    ));
    out.push_str(&format!(
        "Requests: {} tracked, {} failed ({}), success {}, avg {}\n",
        summary.stats.total,
        summary.stats.error_count,
        percent(summary.stats.error_rate()),
        success_rate(&summary.stats, display),
        latency(summary.stats.avg_total_time, display)
    ));
    out.push_str(&format!("{}\n", RULE));

    for client in clients.online_clients().take(TOP_CLIENTS) {
        out.push_str(&format!(
            "{:<24} {:<16} {:<12} last seen {}\n",
            client.name.bold(),
            client.ip_address,
            client.version,
            relative_time(client.last_seen, now)
        ));
    }

    out.push_str(&format!("{}\n{}\n", RULE, "Recent Requests".bold()));
    if summary.recent.is_empty() {
        out.push_str("No recent requests.\n");
    }
    for tagged in summary.recent.iter() {
        out.push_str(&format!(
            "{:<16} {}\n",
            tagged.client_name,
            request_line(&tagged.request, display)
        ));
    }
    out
}

fn series(values: &[Option<u64>]) -> String {
    values
        .iter()
        .map(|v| v.map_or_else(|| "-".to_string(), |ms| ms.to_string()))
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn format_client_detail(
    client: &Client,
    stats: &Stats,
    chart: &ChartWindow,
    requests: &[Request],
    display: &DisplaySettings,
    now: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let status = if client.is_online() {
        "online".green()
    } else {
        "offline".red()
    };

    out.push_str(&format!("{} ({})\n{}\n", client.name.bold(), client.id, RULE));
    out.push_str(&format!("Status: {}\n", status));
    out.push_str(&format!("Address: {}\n", client.ip_address));
    out.push_str(&format!("Platform: {} (v{})\n", client.os_info, client.version));
    if client.is_online() {
        let up = (now - client.connected_at).num_seconds().max(0) as u64;
        out.push_str(&format!(
            "Uptime: {}\n",
            humantime::format_duration(Duration::from_secs(up))
        ));
    }
    out.push_str(&format!("Last seen: {}\n", relative_time(client.last_seen, now)));
    if let Some(at) = client.disconnected_at {
        out.push_str(&format!("Disconnected: {}\n", relative_time(at, now)));
    }

    out.push_str(&format!("{}\n", RULE));
    out.push_str(&format!(
        "Requests: {} ({} ok, {} failed), success {}\n",
        stats.total,
        stats.success_count,
        stats.error_count,
        success_rate(stats, display)
    ));
    out.push_str(&format!(
        "Avg - Total: {}, DNS: {:.0}ms, TCP: {:.0}ms, TLS: {:.0}ms\n",
        latency(stats.avg_total_time, display),
        stats.avg_dns_time,
        stats.avg_tcp_time,
        stats.avg_tls_time
    ));

    if !chart.is_empty() {
        let title = format!("Timing, last {} requests (oldest first)", chart.len());
        out.push_str(&format!("{}\n{}\n", RULE, title.bold()));
        out.push_str(&format!("  time  {}\n", chart.labels.join(" ")));
        out.push_str(&format!("  total {}\n", series(&chart.total)));
        out.push_str(&format!("  dns   {}\n", series(&chart.dns)));
        out.push_str(&format!("  tcp   {}\n", series(&chart.tcp)));
        out.push_str(&format!("  tls   {}\n", series(&chart.tls)));
    }

    out.push_str(&format!("{}\n{}\n", RULE, "Requests".bold()));
    if requests.is_empty() {
        out.push_str("No requests recorded.\n");
    }
    for request in requests {
        out.push_str(&format!("{}\n", request_line(request, display)));
    }
    out
}

pub(crate) fn format_session(session: &ConfigFileSession) -> String {
    let state = if session.is_modified() {
        format!("{} line(s) changed", session.changed_lines()).yellow()
    } else {
        "unchanged".normal()
    };
    format!(
        "{} on {} [{}]\n{}\n{}\n",
        session.name.bold(),
        session.client_id,
        state,
        RULE,
        session.working_content.trim_end()
    )
}

pub(crate) fn format_server_config(config: &ServerConfig) -> String {
    format!(
        "{}\n{}\nListen address: {}\nMax clients: {}\nHistory: {} day(s)\nClient refresh: {}\n",
        "Server Configuration".bold(),
        RULE,
        config.listen_address,
        config.max_clients,
        config.history_days,
        humantime::format_duration(Duration::from_secs(config.refresh_interval))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClientStatus, TaggedRequest};
    use crate::registry::ClientRegistry;
    use crate::scheduler::CycleToken;
    use crate::testing::{FakeApi, at, client, failed_request, request};
    use std::sync::Arc;

    fn display() -> DisplaySettings {
        colored::control::set_override(false);
        DisplaySettings {
            latency_threshold_ms: 500,
            success_rate_threshold_percent: 95.0,
        }
    }

    #[test]
    fn relative_times_round_to_seconds() {
        assert_eq!(relative_time(at(0), at(0)), "just now");
        assert_eq!(relative_time(at(30), at(0)), "just now");
        assert_eq!(relative_time(at(0), at(125)), "2m 5s ago");
    }

    #[tokio::test]
    async fn dashboard_lists_clients_and_feed() {
        let api = FakeApi::with_clients(vec![
            client("a", ClientStatus::Online),
            client("b", ClientStatus::Offline),
        ]);
        let registry = ClientRegistry::default();
        registry
            .refresh(&api, &CycleToken::detached())
            .await
            .unwrap();
        let recent = vec![TaggedRequest {
            client_id: "a".to_string(),
            client_name: "a-name".to_string(),
            request: failed_request("r1", 0, "connection refused"),
        }];
        let summary = DashboardSummary {
            clients: registry.current(),
            stats: Stats::from_requests(&[recent[0].request.clone()]),
            recent: Arc::new(recent),
        };

        let text = format_dashboard(&summary, &display(), at(60));
        assert!(text.contains("Clients: 2 total, 1 online, 1 offline (50% healthy)"));
        assert!(text.contains("last seen 1m ago"));
        assert!(text.contains("connection refused"));
        assert!(text.contains("1 failed (100%), success 0%"));
        assert!(!text.contains("b-name"));
    }

    #[test]
    fn detail_shows_gaps_in_the_chart() {
        let requests = vec![request("r1", 0, 120), failed_request("r2", 5, "timeout")];
        let chart = ChartWindow::build(&requests, 20);
        let stats = Stats::from_requests(&requests);
        let text = format_client_detail(
            &client("c1", ClientStatus::Online),
            &stats,
            &chart,
            &requests,
            &display(),
            at(10),
        );
        assert!(text.contains("Requests: 2 (1 ok, 1 failed), success 50%"));
        assert!(text.contains("Timing, last 2 requests (oldest first)"));
        assert!(text.contains("  total 120 -\n"));
        assert!(!text.contains("Disconnected"));
        assert!(text.contains("Uptime: 1h 10s"));
    }

    #[test]
    fn server_config_uses_readable_interval() {
        let config = ServerConfig {
            max_clients: 50,
            history_days: 7,
            listen_address: ":8080".to_string(),
            refresh_interval: 90,
        };
        colored::control::set_override(false);
        let text = format_server_config(&config);
        assert!(text.contains("Client refresh: 1m 30s"));
        assert!(text.contains("History: 7 day(s)"));
    }

    #[test]
    fn rates_print_as_whole_percents() {
        assert_eq!(percent(99.5), "100%");
        assert_eq!(percent(97.4), "97%");
        assert_eq!(percent(66.666), "67%");
        assert_eq!(percent(0.0), "0%");
    }
}
