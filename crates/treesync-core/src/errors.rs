use thiserror::Error;
use treesync_core_types::RequestId;

/// Result type alias using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable code used by reports, logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Document structure
    InvalidDocument,
    MissingField,

    // Prerequisites and lookups
    DependencyMissing,
    NotFound,

    // Store collaborator
    StoreFailure,

    // Input / configuration
    InvalidInput,

    // Integration/IO
    Io,
    Serialization,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidDocument => "ERR_INVALID_DOCUMENT",
            ExErrorKind::MissingField => "ERR_MISSING_FIELD",
            ExErrorKind::DependencyMissing => "ERR_DEPENDENCY_MISSING",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::StoreFailure => "ERR_STORE_FAILURE",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// True for the kinds that describe a broken document rather than a
    /// broken environment.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ExErrorKind::InvalidDocument | ExErrorKind::MissingField
        )
    }
}

/// Canonical structured error type
///
/// Carried as the optional cause of a failed attempt and returned by the file
/// and configuration layers.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    request_id: Option<RequestId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            request_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity context (an alias, key or file name)
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity: {})", entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|s| s as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for sync operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    // ===== Structural Errors =====
    /// A required document field is absent or empty
    #[error("Document {alias} is missing required field {field}")]
    MissingField { alias: String, field: String },

    /// The document is well-formed JSON but semantically invalid
    #[error("Invalid document {alias}: {reason}")]
    InvalidDocument { alias: String, reason: String },

    // ===== Dependency Errors =====
    /// A prerequisite the document relies on does not exist
    #[error("{message}")]
    DependencyMissing { alias: String, message: String },

    /// Entity lookup failed where a hit was required
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    // ===== Store Errors =====
    /// The store collaborator rejected a read or write
    #[error("Store {op} failed: {message}")]
    Store { op: String, message: String },

    // ===== Generic Errors =====
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SyncError {
    pub fn store(op: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Store {
            op: op.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Conversion from SyncError to the structured facility
impl From<SyncError> for ExError {
    fn from(err: SyncError) -> Self {
        let message = err.to_string();
        match err {
            SyncError::MissingField { alias, .. } => ExError::new(ExErrorKind::MissingField)
                .with_entity_id(alias)
                .with_op("validate_document")
                .with_message(message),

            SyncError::InvalidDocument { alias, .. } => {
                ExError::new(ExErrorKind::InvalidDocument)
                    .with_entity_id(alias)
                    .with_op("validate_document")
                    .with_message(message)
            }

            SyncError::DependencyMissing { alias, .. } => {
                ExError::new(ExErrorKind::DependencyMissing)
                    .with_entity_id(alias)
                    .with_message(message)
            }

            SyncError::NotFound { id, .. } => ExError::new(ExErrorKind::NotFound)
                .with_entity_id(id)
                .with_message(message),

            SyncError::Store { op, .. } => ExError::new(ExErrorKind::StoreFailure)
                .with_op(op)
                .with_message(message),

            SyncError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            SyncError::Internal { .. } => ExError::new(ExErrorKind::Internal).with_message(message),
        }
    }
}
