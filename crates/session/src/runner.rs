//! Blocking tick-loop worker and its async handle

use std::io::Cursor;
use std::time::Duration;

use image::ImageFormat;
use storage::RecordId;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::controller::{SessionController, SessionStatus, SessionSummary};
use crate::{SessionError, SessionState, Toggles};

/// Control messages for the tick loop
#[derive(Debug)]
pub enum SessionCommand {
    Start(oneshot::Sender<Result<RecordId, SessionError>>),
    Pause(oneshot::Sender<SessionState>),
    Stop(oneshot::Sender<Result<SessionSummary, SessionError>>),
    SetToggles(Toggles, oneshot::Sender<Toggles>),
    Status(oneshot::Sender<SessionStatus>),
    /// Latest annotated frame, PNG encoded
    Frame(oneshot::Sender<Option<Vec<u8>>>),
}

/// Cloneable async front for a running session worker
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| SessionError::WorkerGone)?;
        rx.await.map_err(|_| SessionError::WorkerGone)
    }

    pub async fn start(&self) -> Result<RecordId, SessionError> {
        self.request(SessionCommand::Start).await?
    }

    pub async fn pause(&self) -> Result<SessionState, SessionError> {
        self.request(SessionCommand::Pause).await
    }

    pub async fn stop(&self) -> Result<SessionSummary, SessionError> {
        self.request(SessionCommand::Stop).await?
    }

    pub async fn set_toggles(&self, toggles: Toggles) -> Result<Toggles, SessionError> {
        self.request(|reply| SessionCommand::SetToggles(toggles, reply)).await
    }

    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        self.request(SessionCommand::Status).await
    }

    pub async fn frame_png(&self) -> Result<Option<Vec<u8>>, SessionError> {
        self.request(SessionCommand::Frame).await
    }

    /// Whether the worker has exited
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Move the controller onto a blocking worker and return its handle.
///
/// The worker ticks every `interval` while running and blocks on the
/// command channel otherwise. When every handle is dropped an active
/// session is stopped (and persisted) before the worker exits; the
/// controller is handed back through the join handle.
pub fn spawn_session(controller: SessionController, interval: Duration) -> (SessionHandle, JoinHandle<SessionController>) {
    let (tx, rx) = mpsc::channel(16);
    let worker = tokio::task::spawn_blocking(move || run_loop(controller, rx, interval));
    (SessionHandle { tx }, worker)
}

fn run_loop(
    mut controller: SessionController,
    mut rx: mpsc::Receiver<SessionCommand>,
    interval: Duration,
) -> SessionController {
    loop {
        let command = if controller.state() == SessionState::Running {
            match rx.try_recv() {
                Ok(command) => Some(command),
                Err(mpsc::error::TryRecvError::Empty) => None,
                Err(mpsc::error::TryRecvError::Disconnected) => break,
            }
        } else {
            match rx.blocking_recv() {
                Some(command) => Some(command),
                None => break,
            }
        };

        match command {
            Some(command) => handle(&mut controller, command),
            None => {
                controller.tick();
                std::thread::sleep(interval);
            }
        }
    }

    if matches!(controller.state(), SessionState::Running | SessionState::Paused) {
        info!("Session handle dropped, stopping session");
        if let Err(e) = controller.stop() {
            warn!("Failed to stop session: {}", e);
        }
    }
    controller
}

fn handle(controller: &mut SessionController, command: SessionCommand) {
    // A dropped reply receiver only means the caller went away
    match command {
        SessionCommand::Start(reply) => {
            let _ = reply.send(controller.start());
        }
        SessionCommand::Pause(reply) => {
            let _ = reply.send(controller.pause());
        }
        SessionCommand::Stop(reply) => {
            let _ = reply.send(controller.stop());
        }
        SessionCommand::SetToggles(toggles, reply) => {
            controller.set_toggles(toggles);
            let _ = reply.send(controller.toggles());
        }
        SessionCommand::Status(reply) => {
            let _ = reply.send(controller.status());
        }
        SessionCommand::Frame(reply) => {
            let png = controller.last_frame().and_then(|image| {
                let mut bytes = Cursor::new(Vec::new());
                match image.write_to(&mut bytes, ImageFormat::Png) {
                    Ok(()) => Some(bytes.into_inner()),
                    Err(e) => {
                        warn!("Failed to encode frame: {}", e);
                        None
                    }
                }
            });
            let _ = reply.send(png);
        }
    }
}
