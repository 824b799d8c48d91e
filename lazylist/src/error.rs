use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by the delegate adapter and the engine.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// The content delegate answered with the wrong shape. This is a caller bug and is never
    /// retried.
    #[error("contract violation: {0}")]
    ContractViolation(String),
    /// The host could not provide a scrolling context.
    #[error("setup error: {0}")]
    Setup(String),
    /// The operation is not valid in the engine's current state. Retrying later may succeed.
    #[error("invalid state: {0}")]
    State(String),
}

impl Error {
    pub(crate) fn contract(msg: impl Into<String>) -> Self {
        Self::ContractViolation(msg.into())
    }

    pub(crate) fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::ContractViolation(_))
    }

    pub fn is_state(&self) -> bool {
        matches!(self, Self::State(_))
    }
}
