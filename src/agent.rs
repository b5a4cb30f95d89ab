//! A worker and a coordinator running headless next to a reminder server.

use crate::adapters::{HeadlessHost, HeadlessPlatform, HttpNetwork, HttpReminderApi, TokioTimeProvider};
use crate::client::{ClientCoordinator, PeriodicSyncMode};
use crate::config::AgentConfig;
use crate::error::{Error, HostError};
use crate::ports::platform::PermissionState;
use crate::store::FileReminderStore;
use crate::types::reminder::ReminderFilter;
use crate::worker::{self, WorkerContainer, WorkerRuntime};

use std::sync::Arc;
use tracing::info;

pub type AgentCoordinator = ClientCoordinator<HeadlessPlatform, HttpReminderApi, TokioTimeProvider>;

pub struct Agent {
    pub coordinator: Arc<AgentCoordinator>,
    pub container: WorkerContainer,
    pub sync_mode: PeriodicSyncMode,
    watcher: tokio::task::JoinHandle<()>,
}

/// Registers the worker, connects the coordinator and re-arms every reminder
/// the server knows about.
pub async fn start(config: AgentConfig) -> Result<Agent, Error> {
    let host = Arc::new(HeadlessHost::new(HttpNetwork::new(&config.server_url)));
    let store = Arc::new(FileReminderStore::new(&config.store_path));
    let container = WorkerContainer::new();
    let worker_config = config.worker.clone();
    container.register(move || {
        worker::spawn(WorkerRuntime::new(
            TokioTimeProvider,
            Arc::clone(&store),
            Arc::clone(&host),
            worker_config.clone(),
        ))
    });

    let coordinator = Arc::new(ClientCoordinator::new(
        Arc::new(HeadlessPlatform::new(PermissionState::Granted)),
        Arc::new(HttpReminderApi::new(&config.server_url)),
        TokioTimeProvider,
        container.clone(),
        config.client,
    ));
    coordinator.connect().await?;
    let watcher = coordinator.watch_controller();

    let reminders = coordinator.get_reminders(&ReminderFilter::default()).await?;
    let sync_mode = coordinator.register_periodic_sync().await?;
    info!(
        reminders = reminders.len(),
        store = %config.store_path.display(),
        ?sync_mode,
        "agent started"
    );

    Ok(Agent {
        coordinator,
        container,
        sync_mode,
        watcher,
    })
}

impl Agent {
    /// Stops following controller changes and terminates the worker.
    pub async fn shutdown(self) {
        self.watcher.abort();
        if let Some(worker) = self.container.controller() {
            worker.terminate().await;
        }
        info!("agent stopped");
    }
}

/// Runs the agent until Ctrl-C.
pub async fn run(config: AgentConfig) -> Result<(), Error> {
    let agent = start(config).await?;
    let signal = tokio::signal::ctrl_c().await;
    agent.shutdown().await;
    signal.map_err(|err| Error::Host(HostError::new(format!("signal handler: {err}"))))
}
