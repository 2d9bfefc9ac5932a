//! Overlay session controller
//!
//! Owns the three surfaces, the bubble position and the state machine.
//! Every transition is applied to the compositor first and committed only
//! once all surfaces took their new layout; a refused update puts the old
//! layout back and leaves the state untouched.

use screenblock_config::SessionPolicy;
use screenblock_core::{BubblePosition, Pattern};
use screenblock_keys::PatternVerifier;
use screenblock_store::{PersistedSession, SessionStatePersistence};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::surface::{Compositor, SurfaceId, SurfaceParams};
use crate::{OverlaySessionState, Result, SessionError, SessionEvent, SessionFlags, SessionScope};

use OverlaySessionState::{Blocking, BubbleVisible, Inactive, PromptVisible};

/// Surface layout for one state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    curtain: SurfaceParams,
    bubble: SurfaceParams,
    prompt: SurfaceParams,
}

impl Layout {
    fn for_state(state: OverlaySessionState, position: BubblePosition) -> Self {
        Self {
            curtain: SurfaceParams::curtain(state.curtain_up()),
            bubble: SurfaceParams::bubble(position),
            prompt: SurfaceParams::prompt(state == PromptVisible),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Surfaces {
    curtain: SurfaceId,
    bubble: SurfaceId,
    prompt: SurfaceId,
}

impl Surfaces {
    /// Update order: bottom to top
    fn paired(self, layout: &Layout) -> [(SurfaceId, &SurfaceParams); 3] {
        [
            (self.curtain, &layout.curtain),
            (self.bubble, &layout.bubble),
            (self.prompt, &layout.prompt),
        ]
    }
}

/// State and position reported after each command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: OverlaySessionState,
    pub position: BubblePosition,
}

pub struct OverlaySessionController {
    compositor: Box<dyn Compositor>,
    verifier: Arc<dyn PatternVerifier>,
    persistence: Arc<dyn SessionStatePersistence>,
    policy: SessionPolicy,

    state: OverlaySessionState,
    position: BubblePosition,
    surfaces: Option<Surfaces>,
    scope: SessionScope,
    last_tap: Option<Instant>,
    prompt_deadline: Option<Instant>,

    state_tx: watch::Sender<OverlaySessionState>,
    flags_tx: watch::Sender<SessionFlags>,
}

impl OverlaySessionController {
    pub fn new(
        compositor: Box<dyn Compositor>,
        verifier: Arc<dyn PatternVerifier>,
        persistence: Arc<dyn SessionStatePersistence>,
        policy: SessionPolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(Inactive);
        let (flags_tx, _) = watch::channel(SessionFlags::default());
        Self {
            compositor,
            verifier,
            persistence,
            policy,
            state: Inactive,
            position: BubblePosition::default(),
            surfaces: None,
            scope: SessionScope::new(),
            last_tap: None,
            prompt_deadline: None,
            state_tx,
            flags_tx,
        }
    }

    pub fn state(&self) -> OverlaySessionState {
        self.state
    }

    pub fn position(&self) -> BubblePosition {
        self.position
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            position: self.position,
        }
    }

    pub fn flags(&self) -> SessionFlags {
        self.state.flags()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<OverlaySessionState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_flags(&self) -> watch::Receiver<SessionFlags> {
        self.flags_tx.subscribe()
    }

    /// Scope of the current (or next) run
    pub fn scope(&self) -> SessionScope {
        self.scope.clone()
    }

    /// When the open prompt gives up waiting, if it is still waiting
    pub fn prompt_deadline(&self) -> Option<Instant> {
        self.prompt_deadline
    }

    pub fn snapshot(&self) -> PersistedSession {
        PersistedSession {
            position: self.position,
            was_blocking: self.state.curtain_up(),
        }
    }

    /// Attach all surfaces and resume from the last snapshot
    pub fn start(&mut self) -> Result<OverlaySessionState> {
        self.require_state(&[Inactive], SessionEvent::Start)?;

        let restored = self.persistence.load();
        let (position, target) = match restored {
            Some(snapshot) => {
                let target = if snapshot.was_blocking { Blocking } else { BubbleVisible };
                info!(x = snapshot.position.x, y = snapshot.position.y, resume = %target, "restoring session");
                (snapshot.position, target)
            }
            None => (self.position, BubbleVisible),
        };

        let layout = Layout::for_state(target, position);
        let mut attached = Vec::with_capacity(3);
        let curtain = self.attach_or_rollback(&layout.curtain, &mut attached)?;
        let bubble = self.attach_or_rollback(&layout.bubble, &mut attached)?;
        let prompt = self.attach_or_rollback(&layout.prompt, &mut attached)?;

        self.surfaces = Some(Surfaces {
            curtain,
            bubble,
            prompt,
        });
        self.position = position;
        self.scope = SessionScope::new();
        self.last_tap = None;
        self.prompt_deadline = None;
        self.commit(target, SessionEvent::Start);
        Ok(target)
    }

    fn attach_or_rollback(
        &mut self,
        params: &SurfaceParams,
        attached: &mut Vec<SurfaceId>,
    ) -> Result<SurfaceId> {
        match self.compositor.attach(params) {
            Ok(id) => {
                attached.push(id);
                Ok(id)
            }
            Err(source) => {
                error!(surface = %params.kind, error = %source, "attach failed, rolling back");
                for id in attached.drain(..).rev() {
                    if let Err(e) = self.compositor.detach(id) {
                        warn!(%id, error = %e, "rollback detach failed");
                    }
                }
                Err(SessionError::Attach {
                    surface: params.kind,
                    source,
                })
            }
        }
    }

    /// Raise the curtain; counts as the tap that arms unlocking
    pub fn request_block(&mut self) -> Result<OverlaySessionState> {
        self.require_state(&[BubbleVisible], SessionEvent::RequestBlock)?;
        let state = self.transition(Blocking, SessionEvent::RequestBlock)?;
        self.last_tap = Some(Instant::now());
        Ok(state)
    }

    /// Open the prompt if the previous tap is recent enough
    ///
    /// An unarmed tap changes nothing but arms the next one.
    pub fn request_unlock(&mut self) -> Result<OverlaySessionState> {
        self.require_state(&[Blocking], SessionEvent::RequestUnlock)?;

        let now = Instant::now();
        let armed = self
            .last_tap
            .map_or(false, |tap| now.duration_since(tap) <= self.policy.unlock_grace());
        self.last_tap = Some(now);

        if !armed {
            debug!("unlock tap armed");
            return Ok(self.state);
        }
        self.transition(PromptVisible, SessionEvent::RequestUnlock)
    }

    /// The bubble's only gesture
    pub fn tap_bubble(&mut self) -> Result<OverlaySessionState> {
        match self.state {
            BubbleVisible => self.request_block(),
            Blocking => self.request_unlock(),
            state => Err(SessionError::Rejected {
                state,
                event: SessionEvent::TapBubble,
            }),
        }
    }

    /// First node touched; the prompt stops counting down
    pub fn begin_trace(&mut self) -> Result<OverlaySessionState> {
        self.require_state(&[PromptVisible], SessionEvent::BeginTrace)?;
        if self.prompt_deadline.take().is_some() {
            debug!("tracing started, prompt timer cleared");
        }
        Ok(self.state)
    }

    /// Check a finished pattern; correct lowers the curtain, wrong keeps it
    ///
    /// Returns [`SessionError::Cancelled`] if the session is stopped while
    /// the comparison runs.
    pub async fn pattern_entered(&mut self, candidate: &Pattern) -> Result<OverlaySessionState> {
        self.require_state(&[PromptVisible], SessionEvent::PatternEntered)?;

        let scope = self.scope.clone();
        let verifier = Arc::clone(&self.verifier);
        let matched = tokio::select! {
            matched = verifier.compare_key(candidate) => matched,
            _ = scope.cancelled() => {
                debug!("session stopped during verification, result dropped");
                return Err(SessionError::Cancelled);
            }
        };

        info!(matched, "pattern entered");
        let next = if matched { BubbleVisible } else { Blocking };
        self.transition(next, SessionEvent::PatternEntered)
    }

    /// Prompt closed without a pattern
    pub fn dismiss_prompt(&mut self) -> Result<OverlaySessionState> {
        self.require_state(&[PromptVisible], SessionEvent::DismissPrompt)?;
        self.transition(Blocking, SessionEvent::DismissPrompt)
    }

    /// Close the prompt once its deadline has passed
    ///
    /// Fires at most once per opened prompt.
    pub fn prompt_timeout(&mut self) -> Result<OverlaySessionState> {
        let due = self.state == PromptVisible
            && self
                .prompt_deadline
                .map_or(false, |deadline| Instant::now() >= deadline);
        if !due {
            return Err(SessionError::Rejected {
                state: self.state,
                event: SessionEvent::PromptTimeout,
            });
        }

        info!("prompt timed out");
        self.transition(Blocking, SessionEvent::PromptTimeout)
    }

    /// Move the bubble by a drag delta
    pub fn drag_bubble(&mut self, dx: i32, dy: i32) -> Result<BubblePosition> {
        self.require_state(&[BubbleVisible, Blocking], SessionEvent::DragBubble)?;
        let surfaces = self.surfaces()?;

        let moved = self.position.offset(dx, dy);
        let params = SurfaceParams::bubble(moved);
        self.compositor
            .update(surfaces.bubble, &params)
            .map_err(|source| SessionError::Transition {
                from: self.state,
                to: self.state,
                source,
            })?;

        self.position = moved;
        debug!(x = moved.x, y = moved.y, "bubble moved");
        if self.policy.checkpoint_transitions {
            self.persistence.save(&self.snapshot());
        }
        Ok(moved)
    }

    /// Save, cancel background work and detach everything
    ///
    /// Stopping an inactive session does nothing.
    pub fn stop(&mut self) {
        if self.state == Inactive {
            debug!("stop on inactive session ignored");
            return;
        }

        self.persistence.save(&self.snapshot());
        self.scope.cancel();

        if let Some(surfaces) = self.surfaces.take() {
            for id in [surfaces.prompt, surfaces.bubble, surfaces.curtain] {
                if let Err(e) = self.compositor.detach(id) {
                    warn!(%id, error = %e, "detach failed during stop");
                }
            }
        }

        self.last_tap = None;
        self.prompt_deadline = None;
        let previous = self.state;
        self.set_state(Inactive);
        info!(from = %previous, "session stopped");
    }

    fn require_state(&self, allowed: &[OverlaySessionState], event: SessionEvent) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            debug!(state = %self.state, %event, "event rejected");
            Err(SessionError::Rejected {
                state: self.state,
                event,
            })
        }
    }

    fn surfaces(&self) -> Result<Surfaces> {
        self.surfaces.ok_or(SessionError::Rejected {
            state: self.state,
            event: SessionEvent::Start,
        })
    }

    fn transition(&mut self, next: OverlaySessionState, event: SessionEvent) -> Result<OverlaySessionState> {
        let surfaces = self.surfaces()?;
        let layout = Layout::for_state(next, self.position);

        for (id, params) in surfaces.paired(&layout) {
            if let Err(source) = self.compositor.update(id, params) {
                warn!(from = %self.state, to = %next, surface = %params.kind, error = %source, "transition refused, restoring layout");
                self.restore_layout(surfaces);
                return Err(SessionError::Transition {
                    from: self.state,
                    to: next,
                    source,
                });
            }
        }

        self.commit(next, event);
        Ok(next)
    }

    fn restore_layout(&mut self, surfaces: Surfaces) {
        let layout = Layout::for_state(self.state, self.position);
        for (id, params) in surfaces.paired(&layout) {
            if let Err(e) = self.compositor.update(id, params) {
                error!(%id, surface = %params.kind, error = %e, "could not restore surface");
            }
        }
    }

    fn commit(&mut self, next: OverlaySessionState, event: SessionEvent) {
        let previous = self.state;
        self.prompt_deadline = (next == PromptVisible).then(|| Instant::now() + self.policy.prompt_timeout());
        self.set_state(next);
        info!(from = %previous, to = %next, %event, "session transition");

        if self.policy.checkpoint_transitions {
            self.persistence.save(&self.snapshot());
        }
    }

    fn set_state(&mut self, state: OverlaySessionState) {
        self.state = state;
        self.state_tx.send_replace(state);
        self.flags_tx.send_replace(state.flags());
    }
}
