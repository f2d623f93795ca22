use docunit_core_types::RequestId;
use thiserror::Error;

/// Result type alias using the canonical ExError
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every error surfaced by the unit-of-work layer maps to one of these kinds,
/// and each kind maps to a stable code usable by callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Lifecycle
    /// Attaching an entity whose state is not `Detached`, or whose identity
    /// is already tracked
    AlreadyAttached,
    /// Handle refers to an entity no longer in the attachment table
    NotAttached,
    /// Operation not allowed in the entity's current lifecycle state
    InvalidState,

    // Structural/Validation
    InvalidInput,
    /// Dotted document path cannot be resolved or written
    InvalidPath,
    NotFound,

    // Store boundary
    /// The document store rejected an insert, update or delete
    StoreWrite,
    Persistence,
    Io,

    // Codec
    /// Snapshot or document (de)serialization failed, or original and
    /// current graphs do not share a schema
    Serialization,

    // Runtime
    Config,
    Concurrency,
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::AlreadyAttached => "ERR_ALREADY_ATTACHED",
            ExErrorKind::NotAttached => "ERR_NOT_ATTACHED",
            ExErrorKind::InvalidState => "ERR_INVALID_STATE",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidPath => "ERR_INVALID_PATH",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::StoreWrite => "ERR_STORE_WRITE",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Concurrency => "ERR_CONCURRENCY",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries classification for programmatic handling plus the context a caller
/// needs after a failed save: which entity, which collection, which operation.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    collection: Option<String>,
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
            collection: None,
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

    /// Add entity ID context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add collection context
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Add request ID context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the entity ID context, if any
    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    /// Get the collection context, if any
    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    /// Get the request ID context, if any
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }

    /// Build a serialization error from a serde_json failure
    pub fn serialization(op: &str, err: serde_json::Error) -> Self {
        ExError::new(ExErrorKind::Serialization)
            .with_op(op)
            .with_message(err.to_string())
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
            write!(f, " (entity_id: {})", entity_id)?;
        }
        if let Some(collection) = &self.collection {
            write!(f, " (collection: {})", collection)?;
        }
        if let Some(source) = &self.source {
            write!(f, " caused by {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain error taxonomy for unit-of-work operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocunitError {
    // ===== Attachment =====
    /// Entity already belongs to a context
    #[error("Entity {entity_id} is already attached (state: {state})")]
    AlreadyAttached { entity_id: String, state: String },

    /// A different instance with the same identity is already tracked
    #[error("Identity {entity_id} is already tracked by this context")]
    IdentityAlreadyTracked { entity_id: String },

    /// Entity is tracked by another context
    #[error("Entity {entity_id} belongs to another context")]
    ForeignContext { entity_id: String },

    /// Handle no longer refers to an attached entity
    #[error("Entity {entity_id} is not attached to this context")]
    NotAttached { entity_id: String },

    // ===== Lifecycle =====
    /// `delete()` called on a detached entity
    #[error("Cannot delete detached entity {entity_id}: use the context's delete")]
    DeleteDetached { entity_id: String },

    /// Attach as deleted for an entity the store has never seen
    #[error("Cannot attach entity {entity_id} as deleted: it was never persisted")]
    DeleteNotPersisted { entity_id: String },

    // ===== Documents =====
    /// Dotted path could not be resolved against a document
    #[error("Invalid document path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Original and current graphs expose different field lists
    #[error("Schema mismatch in {type_name}: {reason}")]
    SchemaMismatch { type_name: String, reason: String },

    /// Serialization error (JSON encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Conversion from DocunitError to ExError
impl From<DocunitError> for ExError {
    fn from(err: DocunitError) -> Self {
        let message = err.to_string();
        match err {
            DocunitError::AlreadyAttached { entity_id, .. }
            | DocunitError::IdentityAlreadyTracked { entity_id }
            | DocunitError::ForeignContext { entity_id } => {
                ExError::new(ExErrorKind::AlreadyAttached)
                    .with_op("attach")
                    .with_entity_id(entity_id)
                    .with_message(message)
            }

            DocunitError::NotAttached { entity_id } => ExError::new(ExErrorKind::NotAttached)
                .with_entity_id(entity_id)
                .with_message(message),

            DocunitError::DeleteDetached { entity_id } => ExError::new(ExErrorKind::InvalidState)
                .with_op("delete")
                .with_entity_id(entity_id)
                .with_message(message),

            DocunitError::DeleteNotPersisted { entity_id } => {
                ExError::new(ExErrorKind::InvalidState)
                    .with_op("attach")
                    .with_entity_id(entity_id)
                    .with_message(message)
            }

            DocunitError::InvalidPath { .. } => {
                ExError::new(ExErrorKind::InvalidPath).with_message(message)
            }

            DocunitError::SchemaMismatch { .. } | DocunitError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            DocunitError::Internal { .. } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}
