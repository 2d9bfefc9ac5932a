//! # ScreenBlock Session
//!
//! The overlay itself: a draggable bubble, a full-screen curtain and a
//! pattern prompt, driven by a small state machine.
//!
//! - [`OverlaySessionController`] owns the surfaces and applies transitions
//!   through a [`Compositor`]. It is `&mut self` throughout, so transitions
//!   are serialized by construction.
//! - [`spawn_session`] moves a controller into a task and hands back a
//!   cloneable [`SessionHandle`]. That task also owns the prompt timer.
//! - Whether the screen is blocked is published through `watch` channels
//!   ([`SessionFlags`]).

pub mod controller;
pub mod runner;
pub mod scope;
pub mod state;
pub mod surface;

pub use controller::{OverlaySessionController, SessionStatus};
pub use runner::{spawn_session, SessionHandle};
pub use scope::SessionScope;
pub use state::{OverlaySessionState, SessionEvent, SessionFlags};
pub use surface::{
    Compositor, CompositorError, Gravity, HeadlessCompositor, SurfaceId, SurfaceKind,
    SurfaceParams, SurfaceSize, TouchMode,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Could not attach the {surface} surface: {source}")]
    Attach {
        surface: SurfaceKind,
        #[source]
        source: CompositorError,
    },

    #[error("Transition {from} -> {to} aborted: {source}")]
    Transition {
        from: OverlaySessionState,
        to: OverlaySessionState,
        #[source]
        source: CompositorError,
    },

    #[error("{event} is not valid while {state}")]
    Rejected {
        state: OverlaySessionState,
        event: SessionEvent,
    },

    #[error("Session stopped before verification finished")]
    Cancelled,

    #[error("Session has shut down")]
    Closed,
}

pub type Result<T> = std::result::Result<T, SessionError>;
