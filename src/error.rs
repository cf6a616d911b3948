use thiserror::Error;

/// Errors produced by the account, staking, governance and keybase components.
#[derive(Error, Debug)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("validator {0} is tombstoned and permanently barred from staking")]
    PermanentlyBarred(String),
    #[error("validator {0} is already staked")]
    AlreadyStaked(String),
    #[error("validator {0} is not jailed")]
    NotJailed(String),
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("corrupt data: {0}")]
    Corrupt(String),
    #[error("configuration invariant violated: {0}")]
    ConfigurationInvariantViolated(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Fatal errors mean the indexes can no longer be trusted; block
    /// processing must halt instead of continuing with partial state.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ConfigurationInvariantViolated(_))
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Corrupt(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Corrupt(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_invariant_violations_are_fatal() {
        assert!(Error::ConfigurationInvariantViolated("x".into()).is_fatal());
        assert!(!Error::Corrupt("x".into()).is_fatal());
        assert!(!Error::Unauthorized("x".into()).is_fatal());
    }
}
