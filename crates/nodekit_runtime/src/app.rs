//! Main screen lifecycle
//!
//! Everything that changes what the user sees goes through the UI queue as
//! a [`UiEvent`]; [`UiState`] is the only place those events land.

use crate::demo::{self, Versions};
use anyhow::{Context, Result};
use nodekit_asset::{AssetSynchronizer, DirAssets};
use nodekit_core::UiHandle;
use nodekit_net::LoopbackProbe;
use nodekit_script::{EmbeddedConfig, EmbeddedNode, NativeRuntime, RuntimeBridge, StartOutcome};
use nodekit_services::{BundleMetadata, Preferences, Settings};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Message(String),
    Toast(String),
    Counter(i32),
    AssetsSynced(bool),
    RuntimeExited(StartOutcome),
    Versions(Versions),
    ProbeFinished,
}

#[derive(Debug, Default)]
pub struct UiState {
    pub message: String,
    pub counter: Option<i32>,
    pub toasts: Vec<String>,
    pub assets_synced: Option<bool>,
    pub runtime: Option<StartOutcome>,
    pub versions: Option<Versions>,
    pub probes: usize,
}

impl UiState {
    pub fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::Message(message) => {
                tracing::info!(%message, "Message");
                self.message = message;
            }
            UiEvent::Toast(toast) => {
                tracing::info!(target: "nodekit::toast", "{}", toast);
                self.toasts.push(toast);
            }
            UiEvent::Counter(value) => {
                tracing::debug!(value, "Counter");
                self.counter = Some(value);
            }
            UiEvent::AssetsSynced(ok) => {
                if !ok {
                    tracing::warn!("Assets could not be deployed, starting anyway");
                }
                self.assets_synced = Some(ok);
            }
            UiEvent::RuntimeExited(outcome) => {
                tracing::info!(?outcome, "Runtime finished");
                self.runtime = Some(outcome);
            }
            UiEvent::Versions(versions) => self.versions = Some(versions),
            UiEvent::ProbeFinished => self.probes += 1,
        }
    }
}

pub struct App<R = EmbeddedNode> {
    settings: Settings,
    bridge: Arc<RuntimeBridge<R>>,
    ui: UiHandle<UiEvent>,
    probe: Arc<LoopbackProbe>,
    counting: AtomicBool,
}

impl App<EmbeddedNode> {
    pub fn new(settings: Settings, ui: UiHandle<UiEvent>) -> Result<Self> {
        let node = EmbeddedNode::new(EmbeddedConfig {
            tick_interval: settings.runtime.tick_interval(),
            tick_limit: settings.runtime.tick_limit,
        });
        Self::with_runtime(settings, ui, node)
    }
}

impl<R: NativeRuntime + 'static> App<R> {
    pub fn with_runtime(settings: Settings, ui: UiHandle<UiEvent>, runtime: R) -> Result<Self> {
        let probe =
            LoopbackProbe::new(settings.network.probe_url.clone(), settings.network.timeout())
                .context("Failed to create loopback probe")?;

        Ok(Self {
            settings,
            bridge: Arc::new(RuntimeBridge::new(runtime)),
            ui,
            probe: Arc::new(probe),
            counting: AtomicBool::new(false),
        })
    }

    pub fn bridge(&self) -> &RuntimeBridge<R> {
        &self.bridge
    }

    /// Wire callbacks and boot the runtime on a worker thread.
    ///
    /// The start is claimed before the worker is spawned, so asset
    /// deployment runs at most once. Returns the worker, or `None` when the
    /// runtime is already starting or started.
    pub fn on_create(&self) -> Result<Option<JoinHandle<()>>> {
        self.ui.post(UiEvent::Message(self.bridge.utf8_string()));
        self.bridge.init(self.ui.callback(UiEvent::Toast));
        if !self.counting.swap(true, Ordering::AcqRel) {
            self.bridge.async_computation(self.ui.callback(UiEvent::Counter));
        }

        let claim = match self.bridge.claim() {
            Ok(claim) => claim,
            Err(outcome) => {
                tracing::debug!(?outcome, "Runtime already claimed");
                return Ok(None);
            }
        };

        let ui = self.ui.clone();
        let settings = self.settings.clone();
        let worker = thread::Builder::new()
            .name("nodekit-node".to_string())
            .spawn(move || {
                ui.post(UiEvent::AssetsSynced(deploy_assets(&settings)));
                let outcome = claim.run(&settings.node_args());
                ui.post(UiEvent::RuntimeExited(outcome));
            })
            .context("Failed to spawn runtime thread")?;

        Ok(Some(worker))
    }

    /// Run the demo snippets, then fire the loopback probe.
    pub async fn on_versions_clicked(&self) -> Result<Versions> {
        let versions = tokio::task::spawn_blocking(demo::run)
            .await
            .context("Demo task panicked")??;
        self.ui.post(UiEvent::Versions(versions.clone()));

        let probe = self.probe.clone();
        let ui = self.ui.clone();
        tokio::spawn(async move {
            // Body is not shown anywhere.
            let _ = probe.probe().await;
            ui.post(UiEvent::ProbeFinished);
        });

        Ok(versions)
    }

    pub fn on_destroy(&self) {
        self.bridge.release();
    }
}

/// Deploy the bundled project if the package changed since the last run.
fn deploy_assets(settings: &Settings) -> bool {
    let mut prefs = Preferences::open(&settings.storage.files_dir, &settings.storage.prefs_name);
    let synchronizer = AssetSynchronizer::new(
        DirAssets::new(settings.assets.bundle_dir.clone()),
        settings.assets.project.clone(),
        settings.project_dir(),
        BundleMetadata::new(settings.assets.bundle_dir.clone()),
    );
    synchronizer.sync(&mut prefs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodekit_core::{ui, Backpressure, CallbackHandle, UiLoop};
    use nodekit_services::LAST_UPDATE_TIME;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeRuntime {
        starts: AtomicUsize,
        toast: Mutex<Option<CallbackHandle<String>>>,
    }

    impl NativeRuntime for FakeRuntime {
        fn start(&self, args: &[String]) -> i32 {
            self.starts.fetch_add(1, Ordering::SeqCst);
            assert!(Path::new(&args[1]).exists());
            if let Some(toast) = self.toast.lock().unwrap().as_ref() {
                toast.invoke("started".to_string());
            }
            0
        }

        fn init(&self, callback: CallbackHandle<String>) {
            *self.toast.lock().unwrap() = Some(callback);
        }

        fn release(&self) {
            self.toast.lock().unwrap().take();
        }

        fn async_computation(&self, callback: CallbackHandle<i32>) {
            thread::spawn(move || {
                for i in 1..=3 {
                    callback.invoke(i);
                }
            });
        }

        fn utf8_string(&self) -> String {
            "héllo".to_string()
        }
    }

    fn settings(files_dir: &Path, bundle_dir: &Path) -> Settings {
        let mut settings = Settings::default();
        settings.storage.files_dir = files_dir.to_path_buf();
        settings.assets.bundle_dir = bundle_dir.to_path_buf();
        settings.runtime.tick_interval_ms = 1;
        settings.runtime.tick_limit = Some(2);
        settings.network.timeout_ms = Some(2_000);
        settings
    }

    fn collect(ui_loop: &mut UiLoop<UiEvent>, count: usize) -> UiState {
        let mut state = UiState::default();
        for _ in 0..count {
            state.apply(ui_loop.blocking_recv().unwrap());
        }
        state
    }

    #[test]
    fn test_on_create_deploys_and_starts_once() {
        let files = tempfile::tempdir().unwrap();
        let bundle = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(bundle.path().join("deps")).unwrap();
        std::fs::write(bundle.path().join("deps/main.js"), "$toast('hi');").unwrap();

        let (ui, mut ui_loop) = ui::channel(64, Backpressure::Block);
        let app =
            App::with_runtime(settings(files.path(), bundle.path()), ui, FakeRuntime::default())
                .unwrap();

        app.on_create().unwrap().unwrap().join().unwrap();
        // message, three counter values, synced, toast, exited
        let state = collect(&mut ui_loop, 7);

        assert_eq!(state.message, "héllo");
        assert_eq!(state.counter, Some(3));
        assert_eq!(state.toasts, vec!["started"]);
        assert_eq!(state.assets_synced, Some(true));
        assert_eq!(state.runtime, Some(StartOutcome::Ran { status: 0 }));

        let prefs = Preferences::open(files.path(), "PREFS");
        assert!(prefs.contains(LAST_UPDATE_TIME));
        assert!(files.path().join("deps/main.js").is_file());

        assert!(app.on_create().unwrap().is_none());
        assert_eq!(app.bridge().runtime().starts.load(Ordering::SeqCst), 1);
        app.on_destroy();
    }

    #[test]
    fn test_back_to_back_creates_deploy_and_count_once() {
        let files = tempfile::tempdir().unwrap();
        let bundle = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(bundle.path().join("deps")).unwrap();
        std::fs::write(bundle.path().join("deps/main.js"), "$toast('hi');").unwrap();

        let (ui, mut ui_loop) = ui::channel(64, Backpressure::Block);
        let app =
            App::with_runtime(settings(files.path(), bundle.path()), ui, FakeRuntime::default())
                .unwrap();

        let first = app.on_create().unwrap();
        let second = app.on_create().unwrap();
        assert!(second.is_none());
        first.unwrap().join().unwrap();

        // two messages, three counter values, synced, toast, exited
        let events: Vec<UiEvent> = (0..8).map(|_| ui_loop.blocking_recv().unwrap()).collect();
        assert!(ui_loop.try_drain().is_empty());

        let synced = events
            .iter()
            .filter(|e| matches!(e, UiEvent::AssetsSynced(_)))
            .count();
        assert_eq!(synced, 1);
        let counters: Vec<i32> = events
            .iter()
            .filter_map(|e| match e {
                UiEvent::Counter(value) => Some(*value),
                _ => None,
            })
            .collect();
        assert_eq!(counters, vec![1, 2, 3]);
        assert_eq!(app.bridge().runtime().starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bundled_project_runs_in_embedded_node() {
        let files = tempfile::tempdir().unwrap();
        let bundle = Path::new(env!("CARGO_MANIFEST_DIR")).join("assets");

        let (ui, mut ui_loop) = ui::channel(64, Backpressure::Block);
        let app = App::new(settings(files.path(), &bundle), ui).unwrap();

        app.on_create().unwrap().unwrap().join().unwrap();
        // message, two counter values, synced, toast, exited
        let state = collect(&mut ui_loop, 6);

        assert_eq!(state.counter, Some(2));
        assert_eq!(state.assets_synced, Some(true));
        assert_eq!(state.runtime, Some(StartOutcome::Ran { status: 0 }));
        assert_eq!(state.toasts.len(), 1);
        assert!(state.toasts[0].ends_with("main.js"));
        app.on_destroy();
    }

    #[tokio::test]
    async fn test_versions_click_reports_results_and_probes() {
        let files = tempfile::tempdir().unwrap();
        let mut settings = settings(files.path(), files.path());
        // Nothing listens on port 9; the probe fails quietly.
        settings.network.probe_url = "http://127.0.0.1:9/".to_string();

        let (ui, mut ui_loop) = ui::channel(64, Backpressure::Block);
        let app = App::with_runtime(settings, ui, FakeRuntime::default()).unwrap();

        let versions = app.on_versions_clicked().await.unwrap();
        assert_eq!(versions.sum, 218_515);
        assert_eq!(versions.max, 256);

        let mut state = UiState::default();
        for _ in 0..2 {
            let event = tokio::time::timeout(Duration::from_secs(10), ui_loop.recv())
                .await
                .unwrap()
                .unwrap();
            state.apply(event);
        }
        assert_eq!(state.versions, Some(versions));
        assert_eq!(state.probes, 1);
    }
}
