use crate::error::Error;
use crate::ports::host::{Asset, AssetNetwork, NotificationDisplay, WindowClients};
use crate::ports::{ReminderStore, TimeProvider};
use crate::types::protocol::{Envelope, ReplyEnvelope};
use crate::worker::runtime::{EventOutcome, WorkerEvent, WorkerRuntime, WorkerState};

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Where the result of an event goes once its handler finishes.
pub(crate) enum Responder {
    None,
    Fetch(oneshot::Sender<Result<Asset, Error>>),
    Page(mpsc::UnboundedSender<ReplyEnvelope>),
}

pub(crate) enum HostCommand {
    Event(WorkerEvent, Responder),
    Terminate(oneshot::Sender<()>),
}

/// Handle to a running worker. Cloning it does not clone the worker.
#[derive(Clone)]
pub struct WorkerHandle {
    commands: mpsc::UnboundedSender<HostCommand>,
    state: watch::Receiver<WorkerState>,
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("state", &*self.state.borrow())
            .finish()
    }
}

/// Starts the worker event loop: install, activate, then every queued event.
///
/// Each event handler runs as its own task and the loop keeps track of it until
/// it completes, so a slow handler never blocks others and termination waits
/// for in-flight work.
pub fn spawn<T, S, H>(runtime: WorkerRuntime<T, S, H>) -> WorkerHandle
where
    T: TimeProvider,
    S: ReminderStore,
    H: NotificationDisplay + WindowClients + AssetNetwork,
{
    let (commands, receiver) = mpsc::unbounded_channel();
    let state = runtime.subscribe_state();
    tokio::spawn(run(Arc::new(runtime), receiver));
    WorkerHandle { commands, state }
}

async fn run<T, S, H>(
    runtime: Arc<WorkerRuntime<T, S, H>>,
    mut commands: mpsc::UnboundedReceiver<HostCommand>,
) where
    T: TimeProvider,
    S: ReminderStore,
    H: NotificationDisplay + WindowClients + AssetNetwork,
{
    for event in [WorkerEvent::Install, WorkerEvent::Activate] {
        let name = event.name();
        if let Err(err) = runtime.handle(event).await {
            error!("worker {name} failed: {err}");
            runtime.teardown();
            return;
        }
    }

    let mut handlers = JoinSet::new();
    let ack = loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(HostCommand::Event(event, responder)) => {
                    let runtime = Arc::clone(&runtime);
                    handlers.spawn(async move {
                        let name = event.name();
                        let outcome = runtime.handle(event).await;
                        respond(name, outcome, responder);
                    });
                }
                Some(HostCommand::Terminate(ack)) => break Some(ack),
                None => break None,
            },
            Some(joined) = handlers.join_next() => {
                if let Err(err) = joined {
                    error!("worker event handler panicked: {err}");
                }
            }
        }
    };

    let in_flight = handlers.len();
    if in_flight > 0 {
        debug!(in_flight, "waiting for event handlers before shutdown");
    }
    while handlers.join_next().await.is_some() {}
    runtime.teardown();
    info!("worker terminated");
    if let Some(ack) = ack {
        let _ = ack.send(());
    }
}

fn respond(event: &'static str, outcome: Result<EventOutcome, Error>, responder: Responder) {
    match (outcome, responder) {
        (Ok(EventOutcome::Asset(asset)), Responder::Fetch(reply)) => {
            let _ = reply.send(Ok(asset));
        }
        (Err(err), Responder::Fetch(reply)) => {
            let _ = reply.send(Err(err));
        }
        (Ok(EventOutcome::Reply(envelope)), Responder::Page(port)) => {
            if port.send(envelope).is_err() {
                debug!(event, "reply port closed");
            }
        }
        (Ok(EventOutcome::Reply(envelope)), _) => {
            warn!(event, token = envelope.token, "reply dropped: no reply port");
        }
        (Err(err), _) => error!(event, "worker event failed: {err}"),
        (Ok(_), _) => {}
    }
}

impl WorkerHandle {
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Resolves once the worker is active. Fails if it never gets there.
    pub async fn ready(&self) -> Result<(), Error> {
        let mut state = self.state.clone();
        let reached = state
            .wait_for(|state| matches!(state, WorkerState::Active | WorkerState::Redundant))
            .await
            .map_err(|_| Error::Disconnected)?;
        match *reached {
            WorkerState::Active => Ok(()),
            _ => Err(Error::Disconnected),
        }
    }

    /// Queues an event whose outcome nobody waits for.
    pub fn dispatch(&self, event: WorkerEvent) -> Result<(), Error> {
        self.send(HostCommand::Event(event, Responder::None))
    }

    pub async fn fetch(&self, path: &str) -> Result<Asset, Error> {
        let (reply, receiver) = oneshot::channel();
        self.send(HostCommand::Event(
            WorkerEvent::Fetch {
                path: path.to_string(),
            },
            Responder::Fetch(reply),
        ))?;
        receiver.await.map_err(|_| Error::Disconnected)?
    }

    /// Posts a page message; the reply, if any, arrives on `reply_to`.
    pub fn post_message(
        &self,
        envelope: Envelope,
        reply_to: mpsc::UnboundedSender<ReplyEnvelope>,
    ) -> Result<(), Error> {
        self.send(HostCommand::Event(
            WorkerEvent::Message(envelope),
            Responder::Page(reply_to),
        ))
    }

    /// Stops accepting events, waits for in-flight handlers and cancels all timers.
    pub async fn terminate(&self) {
        let (ack, done) = oneshot::channel();
        if self.send(HostCommand::Terminate(ack)).is_ok() {
            let _ = done.await;
        }
    }

    fn send(&self, command: HostCommand) -> Result<(), Error> {
        self.commands
            .send(command)
            .map_err(|_| Error::Disconnected)
    }

    /// An active worker that accepts every event and never answers.
    #[cfg(test)]
    pub(crate) fn stalled() -> Self {
        let (commands, mut receiver) = mpsc::unbounded_channel::<HostCommand>();
        let (state_tx, state) = watch::channel(WorkerState::Active);
        tokio::spawn(async move {
            let _state_tx = state_tx;
            let mut parked = Vec::new();
            while let Some(command) = receiver.recv().await {
                parked.push(command);
            }
        });
        Self { commands, state }
    }
}
