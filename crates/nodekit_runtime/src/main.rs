//! Nodekit Runtime
//!
//! Host binary: deploys the bundled JS project, boots the embedded runtime
//! and runs the UI queue until interrupted.

mod app;
mod demo;

use anyhow::{Context, Result};
use app::{App, UiState};
use clap::Parser;
use nodekit_services::Settings;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nodekit", version, about = "Embedded JavaScript runtime host")]
struct Cli {
    /// Settings file (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bundled assets directory, overriding `assets.bundle_dir`
    #[arg(long, value_name = "DIR")]
    assets: Option<PathBuf>,

    /// Exit after this many seconds instead of waiting for Ctrl-C
    #[arg(long, value_name = "SECS")]
    run_for: Option<u64>,

    /// Press the versions button once the app is up
    #[arg(long)]
    versions: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!("Nodekit v{}", nodekit_core::VERSION);

    let settings = load_settings(&cli)?;
    tracing::debug!(bundle_dir = %settings.assets.bundle_dir.display(), "Settings loaded");

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build async runtime")?
        .block_on(run(cli, settings))
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load_or_default(cli.config.as_deref())
        .context("Failed to load settings")?;
    if let Some(assets) = &cli.assets {
        settings.assets.bundle_dir = assets.clone();
    }
    Ok(settings)
}

async fn run(cli: Cli, settings: Settings) -> Result<()> {
    let (ui, mut ui_loop) = nodekit_core::ui::channel(
        settings.runtime.callback_capacity,
        settings.runtime.backpressure,
    );
    let app = App::new(settings, ui)?;
    let mut state = UiState::default();

    // The runtime thread is detached; release stops it.
    let _worker = app.on_create()?;
    if cli.versions {
        let versions = app.on_versions_clicked().await?;
        tracing::info!(?versions, "Versions computed");
    }

    let deadline = async {
        match cli.run_for {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = ui_loop.run(|event| state.apply(event)) => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            tracing::info!("Interrupted");
        }
        _ = deadline => tracing::info!("Run time elapsed"),
    }

    app.on_destroy();
    tracing::info!(
        counter = ?state.counter,
        toasts = state.toasts.len(),
        dropped = ui_loop.dropped(),
        "Shut down"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_assets_flag_overrides_bundle_dir() {
        let cli = Cli::parse_from(["nodekit", "--assets", "/opt/bundle"]);
        let settings = load_settings(&cli).unwrap();
        assert_eq!(settings.assets.bundle_dir, Path::new("/opt/bundle"));
    }

    #[test]
    fn test_bundle_dir_comes_from_settings_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("settings.json");
        std::fs::write(&config, r#"{ "assets": { "bundle_dir": "/srv/app" } }"#).unwrap();

        let cli = Cli::parse_from(["nodekit", "--config", config.to_str().unwrap()]);
        let settings = load_settings(&cli).unwrap();
        assert_eq!(settings.assets.bundle_dir, Path::new("/srv/app"));

        let cli = Cli::parse_from(["nodekit"]);
        let settings = load_settings(&cli).unwrap();
        assert_eq!(settings.assets.bundle_dir, Path::new("assets"));
    }
}
