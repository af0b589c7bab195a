use thiserror::Error;

/// Errors raised when a command-line value does not name a known variant.
/// Reconciliation itself never fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WtError {
    #[error("unknown feed `{0}` (expected battle_log or chat)")]
    UnknownFeed(String),
}
