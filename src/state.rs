//! Per-component UI state.
//!
//! Each async-facing component (upload controller, health probe) exposes
//! exactly one [`UiState`] at a time. Transitions within a single operation
//! are monotonic: once an operation's outcome (`Success` or `Error`) is
//! committed, a later completion of an *older* operation must not move the
//! state backwards. The generation counters in
//! [`crate::controller::UploadController`] and
//! [`crate::renderer::DocumentRenderer`] enforce this by discarding any
//! completion whose generation no longer matches the current one.

use std::fmt;

/// The lifecycle of one user-visible asynchronous operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UiState<T> {
    /// No operation has been issued yet.
    #[default]
    Idle,
    /// An operation is in flight.
    Loading,
    /// The most recent operation completed successfully.
    Success(T),
    /// The most recent operation failed; the message is user-facing.
    Error(String),
}

impl<T> UiState<T> {
    pub fn is_idle(&self) -> bool {
        matches!(self, UiState::Idle)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, UiState::Loading)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UiState::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, UiState::Error(_))
    }

    /// The payload of a successful operation, if any.
    pub fn success(&self) -> Option<&T> {
        match self {
            UiState::Success(v) => Some(v),
            _ => None,
        }
    }

    /// The error message of a failed operation, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            UiState::Error(msg) => Some(msg),
            _ => None,
        }
    }
}

impl<T: fmt::Display> fmt::Display for UiState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiState::Idle => write!(f, "Idle"),
            UiState::Loading => write!(f, "Loading..."),
            UiState::Success(v) => write!(f, "{v}"),
            UiState::Error(msg) => write!(f, "Error: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_idle() {
        let s: UiState<String> = UiState::default();
        assert!(s.is_idle());
    }

    #[test]
    fn accessors_match_variant() {
        let s: UiState<u32> = UiState::Success(7);
        assert!(s.is_success());
        assert_eq!(s.success(), Some(&7));
        assert_eq!(s.error(), None);

        let e: UiState<u32> = UiState::Error("boom".into());
        assert!(e.is_error());
        assert_eq!(e.error(), Some("boom"));
        assert_eq!(e.success(), None);
    }

    #[test]
    fn display_formats() {
        assert_eq!(UiState::<String>::Loading.to_string(), "Loading...");
        assert_eq!(
            UiState::<String>::Error("Network error".into()).to_string(),
            "Error: Network error"
        );
        assert_eq!(UiState::Success("ok".to_string()).to_string(), "ok");
    }
}
