use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Short error code used in logs and viewer error frames.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Config(_) => "CONFIG_ERROR",
            BridgeError::Transport(_) => "TRANSPORT_ERROR",
            BridgeError::Persistence(_) => "PERSISTENCE_ERROR",
            BridgeError::Serialization(_) => "SERIALIZATION_ERROR",
            BridgeError::Io(_) => "IO_ERROR",
        }
    }

    /// Transport and persistence failures end the process; everything else
    /// is reported and processing continues.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::Transport(_) | BridgeError::Persistence(_) | BridgeError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_persistence_are_fatal() {
        assert!(BridgeError::Transport("eof".into()).is_fatal());
        assert!(BridgeError::Persistence("disk full".into()).is_fatal());
        assert!(!BridgeError::Config("bad prefix".into()).is_fatal());
        let err = BridgeError::from(serde_json::from_str::<u8>("x").unwrap_err());
        assert_eq!(err.code(), "SERIALIZATION_ERROR");
        assert!(!err.is_fatal());
    }
}
