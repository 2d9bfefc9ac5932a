//! Overlay surfaces and the compositor that shows them
//!
//! A session owns three surfaces stacked by z-order:
//!
//! ```text
//!   z=2  Prompt   full screen, centered pattern pad
//!   z=1  Bubble   wrap-content, top-start at (x, y), always touchable
//!   z=0  Curtain  full screen, absorbs touches while blocking
//! ```
//!
//! A hidden surface stays attached but is pass-through.

use screenblock_core::BubblePosition;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SurfaceKind {
    Curtain,
    Bubble,
    Prompt,
}

impl fmt::Display for SurfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceKind::Curtain => write!(f, "curtain"),
            SurfaceKind::Bubble => write!(f, "bubble"),
            SurfaceKind::Prompt => write!(f, "prompt"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceSize {
    /// Match the screen
    Fill,
    /// Size to content
    Wrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gravity {
    Top,
    TopStart,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchMode {
    /// Receives and consumes touches
    Touchable,
    /// Touches fall through to whatever is below
    PassThrough,
}

/// Window parameters for one overlay surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceParams {
    pub kind: SurfaceKind,
    pub z_order: u8,
    pub size: SurfaceSize,
    pub gravity: Gravity,
    pub x: i32,
    pub y: i32,
    pub touch: TouchMode,
    pub visible: bool,
}

impl SurfaceParams {
    pub fn curtain(visible: bool) -> Self {
        Self {
            kind: SurfaceKind::Curtain,
            z_order: 0,
            size: SurfaceSize::Fill,
            gravity: Gravity::Top,
            x: 0,
            y: 0,
            touch: touch_for(visible),
            visible,
        }
    }

    pub fn bubble(position: BubblePosition) -> Self {
        Self {
            kind: SurfaceKind::Bubble,
            z_order: 1,
            size: SurfaceSize::Wrap,
            gravity: Gravity::TopStart,
            x: position.x,
            y: position.y,
            touch: TouchMode::Touchable,
            visible: true,
        }
    }

    pub fn prompt(visible: bool) -> Self {
        Self {
            kind: SurfaceKind::Prompt,
            z_order: 2,
            size: SurfaceSize::Fill,
            gravity: Gravity::Center,
            x: 0,
            y: 0,
            touch: touch_for(visible),
            visible,
        }
    }

    pub fn absorbs_touches(&self) -> bool {
        self.visible && self.touch == TouchMode::Touchable
    }
}

fn touch_for(visible: bool) -> TouchMode {
    if visible {
        TouchMode::Touchable
    } else {
        TouchMode::PassThrough
    }
}

/// Handle to an attached surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Compositor rejected {kind}: {reason}")]
    Rejected { kind: SurfaceKind, reason: String },

    #[error("Unknown surface {0}")]
    UnknownSurface(SurfaceId),
}

/// Window-compositing collaborator
///
/// The session calls this from a single task; implementations need not be
/// re-entrant.
pub trait Compositor: Send {
    fn attach(&mut self, params: &SurfaceParams) -> Result<SurfaceId, CompositorError>;

    fn update(&mut self, id: SurfaceId, params: &SurfaceParams) -> Result<(), CompositorError>;

    fn detach(&mut self, id: SurfaceId) -> Result<(), CompositorError>;
}

#[derive(Default)]
struct HeadlessState {
    next_id: u64,
    surfaces: BTreeMap<SurfaceId, SurfaceParams>,
    fail_attach: Option<SurfaceKind>,
    fail_update: Option<SurfaceKind>,
}

/// In-memory compositor that records and logs every operation
///
/// Clones share the same surface table, so a caller can keep one clone to
/// inspect what the session attached.
#[derive(Clone, Default)]
pub struct HeadlessCompositor {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Refuse to attach surfaces of `kind` (None clears)
    pub fn fail_attach_of(&self, kind: Option<SurfaceKind>) {
        self.lock().fail_attach = kind;
    }

    /// Refuse updates to surfaces of `kind` (None clears)
    pub fn fail_updates_of(&self, kind: Option<SurfaceKind>) {
        self.lock().fail_update = kind;
    }

    /// Attached surfaces, bottom to top
    pub fn surfaces(&self) -> Vec<SurfaceParams> {
        let mut surfaces: Vec<_> = self.lock().surfaces.values().copied().collect();
        surfaces.sort_by_key(|params| params.z_order);
        surfaces
    }

    pub fn surface(&self, kind: SurfaceKind) -> Option<SurfaceParams> {
        self.lock()
            .surfaces
            .values()
            .find(|params| params.kind == kind)
            .copied()
    }

    pub fn attached_count(&self) -> usize {
        self.lock().surfaces.len()
    }
}

impl Compositor for HeadlessCompositor {
    fn attach(&mut self, params: &SurfaceParams) -> Result<SurfaceId, CompositorError> {
        let mut state = self.lock();
        if state.fail_attach == Some(params.kind) {
            return Err(CompositorError::Rejected {
                kind: params.kind,
                reason: "attach refused".into(),
            });
        }

        state.next_id += 1;
        let id = SurfaceId(state.next_id);
        state.surfaces.insert(id, *params);
        info!(%id, surface = %params.kind, visible = params.visible, "surface attached");
        Ok(id)
    }

    fn update(&mut self, id: SurfaceId, params: &SurfaceParams) -> Result<(), CompositorError> {
        let mut state = self.lock();
        if state.fail_update == Some(params.kind) {
            return Err(CompositorError::Rejected {
                kind: params.kind,
                reason: "update refused".into(),
            });
        }

        let slot = state
            .surfaces
            .get_mut(&id)
            .ok_or(CompositorError::UnknownSurface(id))?;
        *slot = *params;
        debug!(
            %id,
            surface = %params.kind,
            visible = params.visible,
            touch = ?params.touch,
            x = params.x,
            y = params.y,
            "surface updated"
        );
        Ok(())
    }

    fn detach(&mut self, id: SurfaceId) -> Result<(), CompositorError> {
        let removed = self
            .lock()
            .surfaces
            .remove(&id)
            .ok_or(CompositorError::UnknownSurface(id))?;
        info!(%id, surface = %removed.kind, "surface detached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_stacking() {
        let curtain = SurfaceParams::curtain(false);
        let bubble = SurfaceParams::bubble(BubblePosition::new(12, 34));
        let prompt = SurfaceParams::prompt(true);

        assert!(curtain.z_order < bubble.z_order);
        assert!(bubble.z_order < prompt.z_order);
        assert_eq!((bubble.x, bubble.y), (12, 34));
        assert_eq!(bubble.gravity, Gravity::TopStart);
        assert_eq!(prompt.gravity, Gravity::Center);
    }

    #[test]
    fn test_hidden_surfaces_pass_through() {
        assert_eq!(SurfaceParams::curtain(false).touch, TouchMode::PassThrough);
        assert_eq!(SurfaceParams::prompt(false).touch, TouchMode::PassThrough);
        assert!(SurfaceParams::curtain(true).absorbs_touches());
        assert!(!SurfaceParams::prompt(false).absorbs_touches());
    }

    #[test]
    fn test_headless_lifecycle() {
        let mut compositor = HeadlessCompositor::new();
        let observer = compositor.clone();

        let id = compositor.attach(&SurfaceParams::curtain(false)).unwrap();
        assert_eq!(observer.attached_count(), 1);

        compositor.update(id, &SurfaceParams::curtain(true)).unwrap();
        assert!(observer.surface(SurfaceKind::Curtain).unwrap().visible);

        compositor.detach(id).unwrap();
        assert_eq!(observer.attached_count(), 0);
        assert!(matches!(
            compositor.detach(id),
            Err(CompositorError::UnknownSurface(_))
        ));
    }

    #[test]
    fn test_surfaces_sorted_bottom_up() {
        let mut compositor = HeadlessCompositor::new();
        compositor.attach(&SurfaceParams::prompt(false)).unwrap();
        compositor.attach(&SurfaceParams::curtain(false)).unwrap();
        compositor
            .attach(&SurfaceParams::bubble(BubblePosition::default()))
            .unwrap();

        let kinds: Vec<_> = compositor.surfaces().iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![SurfaceKind::Curtain, SurfaceKind::Bubble, SurfaceKind::Prompt]
        );
    }

    #[test]
    fn test_fault_injection() {
        let mut compositor = HeadlessCompositor::new();
        compositor.fail_attach_of(Some(SurfaceKind::Prompt));
        assert!(compositor.attach(&SurfaceParams::prompt(false)).is_err());

        let id = compositor.attach(&SurfaceParams::curtain(false)).unwrap();
        compositor.fail_updates_of(Some(SurfaceKind::Curtain));
        assert!(compositor.update(id, &SurfaceParams::curtain(true)).is_err());
        assert!(!compositor.surface(SurfaceKind::Curtain).unwrap().visible);

        compositor.fail_updates_of(None);
        assert!(compositor.update(id, &SurfaceParams::curtain(true)).is_ok());
    }
}
