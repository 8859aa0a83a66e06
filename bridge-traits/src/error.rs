use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Transfer failed ({status:?}): {message}")]
    Transfer {
        status: Option<u16>,
        message: String,
    },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the failure happened on the network side rather than on disk.
    pub fn is_transfer(&self) -> bool {
        matches!(self, BridgeError::Transfer { .. })
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
