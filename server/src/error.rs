//! Error types for farm actions and connection handling

use shared::PlayerId;

/// Rule violations on a single farm. The farm is left untouched when one is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FarmError {
    #[error("Out of bound")]
    OutOfBounds,
    #[error("Plot occupied")]
    PlotOccupied,
    #[error("Crop not ripe")]
    NotRipe,
    #[error("Not enough coins")]
    InsufficientFunds,
    #[error("Cannot steal: yield too low")]
    YieldTooLow,
}

/// Failures of a command issued by a logged-in session; reported to that session only
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Farm(#[from] FarmError),
    #[error("Cannot steal: owner is home")]
    OwnerIsHome,
    #[error("Unknown player: {0}")]
    UnknownPlayer(PlayerId),
    #[error("Session is no longer active")]
    SessionClosed,
}

/// Reasons a connection worker stops
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("connection closed by peer")]
    Disconnected,
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}
