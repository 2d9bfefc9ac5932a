//! Session task
//!
//! One task owns the controller (and through it the compositor). Commands
//! arrive over an mpsc channel and are handled one at a time, including the
//! await on pattern comparison. The prompt timer is a branch of the same
//! `select!`, so it can never race a command.

use screenblock_core::{BubblePosition, Pattern};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::{
    OverlaySessionController, OverlaySessionState, Result, SessionError, SessionFlags,
    SessionScope, SessionStatus,
};

const COMMAND_QUEUE: usize = 32;

#[derive(Debug)]
enum Command {
    TapBubble,
    RequestBlock,
    RequestUnlock,
    BeginTrace,
    PatternEntered(Pattern),
    DismissPrompt,
    DragBubble { dx: i32, dy: i32 },
    Stop,
}

struct Request {
    command: Command,
    reply: oneshot::Sender<Result<SessionStatus>>,
}

/// Start `controller` (if needed) and run it on its own task
pub fn spawn_session(mut controller: OverlaySessionController) -> Result<SessionHandle> {
    if controller.state() == OverlaySessionState::Inactive {
        controller.start()?;
    }

    let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
    let handle = SessionHandle {
        tx,
        scope: controller.scope(),
        state: controller.subscribe_state(),
        flags: controller.subscribe_flags(),
    };

    tokio::spawn(run(controller, rx));
    Ok(handle)
}

async fn run(mut controller: OverlaySessionController, mut rx: mpsc::Receiver<Request>) {
    info!(state = %controller.state(), "session running");
    loop {
        let deadline = controller.prompt_deadline();
        tokio::select! {
            request = rx.recv() => {
                let Some(Request { command, reply }) = request else {
                    debug!("all session handles dropped");
                    controller.stop();
                    break;
                };
                let stopping = matches!(command, Command::Stop);
                let result = dispatch(&mut controller, command).await;
                let _ = reply.send(result.map(|()| controller.status()));
                if stopping {
                    break;
                }
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Err(e) = controller.prompt_timeout() {
                    debug!(error = %e, "prompt timer ignored");
                }
            }
        }
    }
    info!("session task finished");
}

async fn dispatch(controller: &mut OverlaySessionController, command: Command) -> Result<()> {
    match command {
        Command::TapBubble => controller.tap_bubble().map(drop),
        Command::RequestBlock => controller.request_block().map(drop),
        Command::RequestUnlock => controller.request_unlock().map(drop),
        Command::BeginTrace => controller.begin_trace().map(drop),
        Command::PatternEntered(candidate) => controller.pattern_entered(&candidate).await.map(drop),
        Command::DismissPrompt => controller.dismiss_prompt().map(drop),
        Command::DragBubble { dx, dy } => controller.drag_bubble(dx, dy).map(drop),
        Command::Stop => {
            controller.stop();
            Ok(())
        }
    }
}

/// Cloneable front end to a running session
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Request>,
    scope: SessionScope,
    state: watch::Receiver<OverlaySessionState>,
    flags: watch::Receiver<SessionFlags>,
}

impl SessionHandle {
    async fn call(&self, command: Command) -> Result<SessionStatus> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Request { command, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn tap_bubble(&self) -> Result<SessionStatus> {
        self.call(Command::TapBubble).await
    }

    pub async fn request_block(&self) -> Result<SessionStatus> {
        self.call(Command::RequestBlock).await
    }

    pub async fn request_unlock(&self) -> Result<SessionStatus> {
        self.call(Command::RequestUnlock).await
    }

    pub async fn begin_trace(&self) -> Result<SessionStatus> {
        self.call(Command::BeginTrace).await
    }

    pub async fn pattern_entered(&self, candidate: Pattern) -> Result<SessionStatus> {
        self.call(Command::PatternEntered(candidate)).await
    }

    pub async fn dismiss_prompt(&self) -> Result<SessionStatus> {
        self.call(Command::DismissPrompt).await
    }

    pub async fn drag_bubble(&self, dx: i32, dy: i32) -> Result<BubblePosition> {
        Ok(self.call(Command::DragBubble { dx, dy }).await?.position)
    }

    /// Stop the session; safe to call more than once
    ///
    /// Cancels the scope before queueing the stop so an in-flight comparison
    /// does not hold it up.
    pub async fn stop(&self) -> Result<()> {
        self.scope.cancel();
        match self.call(Command::Stop).await {
            Ok(_) | Err(SessionError::Closed) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn state(&self) -> OverlaySessionState {
        *self.state.borrow()
    }

    pub fn flags(&self) -> SessionFlags {
        *self.flags.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<OverlaySessionState> {
        self.state.clone()
    }

    pub fn subscribe_flags(&self) -> watch::Receiver<SessionFlags> {
        self.flags.clone()
    }

    /// Resolves once the session task has exited
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}
