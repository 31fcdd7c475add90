/// Domain error taxonomy shared by every crate in the workspace.
///
/// Every variant maps to exactly one HTTP status via [`CoreError::status_code`].
/// `Internal` is the only variant that is not operational: its message is never
/// shown to clients.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Document not found with this id : {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// An expected business-rule violation carrying its own status code.
    #[error("{message}")]
    Operational { status: u16, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a `NotFound` error on an entity identified by `id`.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::NotFound { .. } => 404,
            CoreError::Validation(_) => 400,
            CoreError::Conflict(_) => 409,
            CoreError::Unauthorized(_) => 401,
            CoreError::Forbidden(_) => 403,
            CoreError::Operational { status, .. } => *status,
            CoreError::Internal(_) => 500,
        }
    }

    /// Whether the error is an expected failure whose message is safe to
    /// return to a client.
    pub fn is_operational(&self) -> bool {
        !matches!(self, CoreError::Internal(_))
    }
}
