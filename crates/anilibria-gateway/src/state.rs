//! Connection state published by the supervisor.

use std::fmt;

use tokio::sync::watch;

/// Lifecycle of the gateway connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No socket and no attempt in progress.
    #[default]
    Disconnected,
    /// Dialing, or waiting to redial.
    Connecting,
    /// Socket open and receiving.
    Connected,
    /// Shutdown requested, socket being closed.
    Closing,
}

impl ConnectionState {
    /// Lowercase name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-writer cell for [`ConnectionState`].
///
/// Only the supervisor holds one; everyone else observes through
/// [`watch::Receiver`]s from [`StateCell::subscribe`].
#[derive(Debug)]
pub(crate) struct StateCell {
    tx: watch::Sender<ConnectionState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx }
    }

    pub(crate) fn get(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// Publish `next`, returning the previous state.
    pub(crate) fn set(&self, next: ConnectionState) -> ConnectionState {
        self.tx.send_replace(next)
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), ConnectionState::Disconnected);
    }

    #[test]
    fn set_returns_previous() {
        let cell = StateCell::new();
        assert_eq!(cell.set(ConnectionState::Connecting), ConnectionState::Disconnected);
        assert_eq!(cell.get(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let cell = StateCell::new();
        let mut rx = cell.subscribe();
        let _ = cell.set(ConnectionState::Connected);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectionState::Connected);
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(ConnectionState::Closing.to_string(), "closing");
    }
}
