use std::fmt;

/// Where the overlay session is
///
/// ```text
///               start                 tap/requestBlock
///   Inactive ─────────► BubbleVisible ─────────────────► Blocking
///      ▲                     ▲                            │   ▲
///      │ stop (any state)    │ correct pattern    unlock  │   │ wrong pattern,
///      │                     │                   (armed)  ▼   │ dismiss, timeout
///      └─────────────────────┴────────────────── PromptVisible ┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OverlaySessionState {
    /// Nothing attached
    #[default]
    Inactive,
    /// Only the draggable bubble is showing
    BubbleVisible,
    /// Curtain up, pattern pad on top of it
    PromptVisible,
    /// Curtain up and absorbing every touch
    Blocking,
}

impl OverlaySessionState {
    pub fn flags(self) -> SessionFlags {
        SessionFlags {
            is_overlay_active: self == OverlaySessionState::Blocking,
            is_pattern_visible: self == OverlaySessionState::PromptVisible,
        }
    }

    /// Whether the curtain is covering the screen
    pub fn curtain_up(self) -> bool {
        matches!(
            self,
            OverlaySessionState::Blocking | OverlaySessionState::PromptVisible
        )
    }
}

impl fmt::Display for OverlaySessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OverlaySessionState::Inactive => "inactive",
            OverlaySessionState::BubbleVisible => "bubble-visible",
            OverlaySessionState::PromptVisible => "prompt-visible",
            OverlaySessionState::Blocking => "blocking",
        };
        f.write_str(name)
    }
}

/// Observable side effects of the state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionFlags {
    /// True exactly while blocking
    pub is_overlay_active: bool,
    /// True exactly while the prompt is showing
    pub is_pattern_visible: bool,
}

impl From<OverlaySessionState> for SessionFlags {
    fn from(state: OverlaySessionState) -> Self {
        state.flags()
    }
}

/// Inputs the session reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Start,
    RequestBlock,
    RequestUnlock,
    TapBubble,
    BeginTrace,
    PatternEntered,
    DismissPrompt,
    PromptTimeout,
    DragBubble,
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionEvent::Start => "start",
            SessionEvent::RequestBlock => "request-block",
            SessionEvent::RequestUnlock => "request-unlock",
            SessionEvent::TapBubble => "tap-bubble",
            SessionEvent::BeginTrace => "begin-trace",
            SessionEvent::PatternEntered => "pattern-entered",
            SessionEvent::DismissPrompt => "dismiss-prompt",
            SessionEvent::PromptTimeout => "prompt-timeout",
            SessionEvent::DragBubble => "drag-bubble",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_follow_state() {
        use OverlaySessionState::*;

        assert_eq!(Inactive.flags(), SessionFlags::default());
        assert_eq!(BubbleVisible.flags(), SessionFlags::default());
        assert!(Blocking.flags().is_overlay_active);
        assert!(!Blocking.flags().is_pattern_visible);
        assert!(PromptVisible.flags().is_pattern_visible);
        assert!(!PromptVisible.flags().is_overlay_active);
    }

    #[test]
    fn test_curtain_up() {
        assert!(OverlaySessionState::Blocking.curtain_up());
        assert!(OverlaySessionState::PromptVisible.curtain_up());
        assert!(!OverlaySessionState::BubbleVisible.curtain_up());
        assert!(!OverlaySessionState::Inactive.curtain_up());
    }
}
