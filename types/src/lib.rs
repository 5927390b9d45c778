//! Core domain types for the VHDL client.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the workspace.

mod wire;
pub use wire::{Entity, EntityInterface, FrontEndTag, InterfaceItem, SourceFile};

// ============================================================================
// Scoped Resources
// ============================================================================

/// A resource with a single release operation.
///
/// Implemented by the connection handle and by every watch subscription, so
/// owners can tear them down uniformly without knowing what they hold.
/// Releasing twice must be harmless; the second call has nothing left to do.
pub trait Disposable {
    fn dispose(&mut self);
}

impl<T: Disposable + ?Sized> Disposable for Box<T> {
    fn dispose(&mut self) {
        (**self).dispose();
    }
}

// ============================================================================
// Client State
// ============================================================================

/// Lifecycle state of the connection to the language server.
///
/// `needs_start` and `needs_stop` are never both true. `Stopping` satisfies
/// neither: a restart that lands while a halt is in flight has nothing to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClientState {
    #[default]
    Initial,
    Starting,
    Running,
    Stopping,
    Stopped,
    StartFailed,
}

impl ClientState {
    #[must_use]
    pub fn needs_start(self) -> bool {
        matches!(self, Self::Initial | Self::Stopped | Self::StartFailed)
    }

    #[must_use]
    pub fn needs_stop(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    #[must_use]
    pub fn is_running(self) -> bool {
        self == Self::Running
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::StartFailed => "start failed",
        }
    }
}

impl std::fmt::Display for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [ClientState; 6] = [
        ClientState::Initial,
        ClientState::Starting,
        ClientState::Running,
        ClientState::Stopping,
        ClientState::Stopped,
        ClientState::StartFailed,
    ];

    #[test]
    fn predicates_are_never_both_true() {
        for state in ALL_STATES {
            assert!(
                !(state.needs_start() && state.needs_stop()),
                "{state} needs both start and stop"
            );
        }
    }

    #[test]
    fn stopping_needs_neither() {
        assert!(!ClientState::Stopping.needs_start());
        assert!(!ClientState::Stopping.needs_stop());
    }

    #[test]
    fn startable_states() {
        assert!(ClientState::Initial.needs_start());
        assert!(ClientState::Stopped.needs_start());
        assert!(ClientState::StartFailed.needs_start());
        assert!(!ClientState::Running.needs_start());
    }

    #[test]
    fn stoppable_states() {
        assert!(ClientState::Starting.needs_stop());
        assert!(ClientState::Running.needs_stop());
        assert!(!ClientState::Stopped.needs_stop());
    }

    struct Counter(u32);

    impl Disposable for Counter {
        fn dispose(&mut self) {
            self.0 += 1;
        }
    }

    #[test]
    fn boxed_disposable_forwards() {
        let mut boxed: Box<Counter> = Box::new(Counter(0));
        boxed.dispose();
        assert_eq!(boxed.0, 1);
    }
}
