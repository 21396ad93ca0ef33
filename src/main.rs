mod api;
mod chart;
mod cli;
mod config;
mod dashboard;
mod detail;
mod error;
mod merge;
mod models;
mod registry;
mod render;
mod scheduler;
mod session;
mod stats;
#[cfg(test)]
mod testing;
mod windows;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::{HttpApi, TelemetryApi};
use crate::cli::Cli;
use crate::config::{DisplaySettings, Settings, load_settings};
use crate::dashboard::DashboardView;
use crate::detail::ClientDetailView;
use crate::render::{format_client_detail, format_dashboard, format_server_config, format_session};
use crate::session::ConfigEditor;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .context("invalid log_filter")?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let api = Arc::new(HttpApi::new(&settings)?);
    info!("Using telemetry server at {}", settings.server_url);

    if cli.server_config {
        let config = api.fetch_server_config().await?;
        print!("{}", format_server_config(&config));
        return Ok(());
    }

    match (&cli.client, &cli.edit) {
        (Some(client_id), Some(path)) => {
            run_edit(api, client_id, path, cli.from.clone(), cli.dry_run).await
        }
        (Some(client_id), None) => run_detail(api, client_id, &settings, cli.once).await,
        _ => run_dashboard(api, &settings, cli.once).await,
    }
}

/// Print `render()` after every applied refresh until Ctrl-C.
async fn follow(mut updates: watch::Receiver<u64>, render: impl Fn() -> String) -> Result<()> {
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            res = &mut shutdown => {
                res.context("failed to listen for Ctrl-C")?;
                info!("Shutting down");
                return Ok(());
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                println!("{}", render());
            }
        }
    }
}

async fn run_dashboard(api: Arc<HttpApi>, settings: &Settings, once: bool) -> Result<()> {
    let mut view = DashboardView::new(api, settings.dashboard.clone());

    if once {
        view.refresh_once().await?;
        print!("{}", format_dashboard(&view.summary(), &settings.display, Utc::now()));
        return Ok(());
    }

    let updates = view.updates();
    view.start();
    let result = follow(updates, || {
        format_dashboard(&view.summary(), &settings.display, Utc::now())
    })
    .await;
    view.stop();
    result
}

fn render_detail<A: TelemetryApi + 'static>(
    view: &ClientDetailView<A>,
    display: &DisplaySettings,
) -> String {
    match view.client() {
        Ok(client) => format_client_detail(
            &client,
            &view.stats(),
            &view.chart(),
            &view.requests(),
            display,
            Utc::now(),
        ),
        Err(e) => format!("{}\n", e),
    }
}

async fn run_detail(
    api: Arc<HttpApi>,
    client_id: &str,
    settings: &Settings,
    once: bool,
) -> Result<()> {
    let mut view = ClientDetailView::new(api, client_id, settings.detail.clone());

    if once {
        view.refresh_once().await?;
        view.client()?;
        print!("{}", render_detail(&view, &settings.display));
        return Ok(());
    }

    let updates = view.updates();
    view.start();
    info!("Following client {}", view.client_id());
    let result = follow(updates, || render_detail(&view, &settings.display)).await;
    view.stop();
    result
}

async fn run_edit(
    api: Arc<HttpApi>,
    client_id: &str,
    path: &str,
    from: Option<PathBuf>,
    dry_run: bool,
) -> Result<()> {
    let mut editor = ConfigEditor::new(api);
    let tx = editor.session(client_id);
    let opened = tx.open(path).await;

    let Some(from) = from else {
        print!("{}", format_session(opened));
        tx.discard()?;
        return Ok(());
    };

    let source = from.display().to_string();
    let content = tokio::task::spawn_blocking(move || std::fs::read_to_string(from))
        .await?
        .with_context(|| format!("failed to read {}", source))?;
    tx.edit(content)?;

    if dry_run {
        if let Some(session) = tx.session() {
            println!("--- Dry Run ---");
            print!("{}", format_session(session));
        }
        tx.discard()?;
        return Ok(());
    }

    tx.save()
        .await
        .with_context(|| format!("failed to save {} on client {}", path, client_id))?;
    println!("Saved {} on client {}.", path, client_id);
    Ok(())
}
