use crate::error::Error;
use crate::worker::host::WorkerHandle;

use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::info;

type Factory = Arc<dyn Fn() -> WorkerHandle + Send + Sync>;

struct Registration {
    factory: Factory,
    controller: WorkerHandle,
}

/// Page-facing worker registration: at most one controlling worker at a time.
#[derive(Clone)]
pub struct WorkerContainer {
    registration: Arc<Mutex<Option<Registration>>>,
    generation: Arc<watch::Sender<u64>>,
}

impl Default for WorkerContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerContainer {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            registration: Arc::new(Mutex::new(None)),
            generation: Arc::new(generation),
        }
    }

    /// Registers a worker built by `factory`, reusing the existing registration if any.
    pub fn register<F>(&self, factory: F) -> WorkerHandle
    where
        F: Fn() -> WorkerHandle + Send + Sync + 'static,
    {
        let mut registration = self.registration.lock().expect("registration lock");
        if let Some(existing) = registration.as_ref() {
            return existing.controller.clone();
        }
        let controller = factory();
        *registration = Some(Registration {
            factory: Arc::new(factory),
            controller: controller.clone(),
        });
        info!("worker registered");
        controller
    }

    pub fn controller(&self) -> Option<WorkerHandle> {
        self.registration
            .lock()
            .expect("registration lock")
            .as_ref()
            .map(|registration| registration.controller.clone())
    }

    /// Waits for the registered worker to become active.
    pub async fn ready(&self) -> Result<WorkerHandle, Error> {
        let controller = self.controller().ok_or(Error::Unregistered)?;
        controller.ready().await?;
        Ok(controller)
    }

    /// Replaces the controlling worker with a fresh instance from the same factory.
    ///
    /// The old worker is terminated first so two timer sets never coexist.
    /// Subscribers of [`WorkerContainer::controller_changes`] are notified once
    /// the new worker controls the page.
    pub async fn update(&self) -> Result<WorkerHandle, Error> {
        let (factory, previous) = {
            let registration = self.registration.lock().expect("registration lock");
            let registration = registration.as_ref().ok_or(Error::Unregistered)?;
            (
                Arc::clone(&registration.factory),
                registration.controller.clone(),
            )
        };
        previous.terminate().await;

        let controller = factory();
        if let Some(registration) = self
            .registration
            .lock()
            .expect("registration lock")
            .as_mut()
        {
            registration.controller = controller.clone();
        }
        controller.ready().await?;
        self.generation.send_modify(|generation| *generation += 1);
        info!("worker updated");
        Ok(controller)
    }

    /// Ticks every time a new worker takes control.
    pub fn controller_changes(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }
}
