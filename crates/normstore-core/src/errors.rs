use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that can be used for programmatic
/// error handling, log assertions and external responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Schema / registry
    UnknownEntity,
    InvalidSchema,
    AlreadyExists,
    MissingPivot,

    // Input
    InvalidInput,
    InvalidComparator,

    // Integration
    Serialization,
    Config,
    Io,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::UnknownEntity => "ERR_UNKNOWN_ENTITY",
            ExErrorKind::InvalidSchema => "ERR_INVALID_SCHEMA",
            ExErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            ExErrorKind::MissingPivot => "ERR_MISSING_PIVOT",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidComparator => "ERR_INVALID_COMPARATOR",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification kind plus optional operation and entity
/// context. Produced from `StoreError` at the mutation boundary for logging.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity: Option<String>,
    message: String,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity context
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
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

    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
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
        if let Some(entity) = &self.entity {
            write!(f, " (entity: {})", entity)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Error taxonomy for store and query operations
///
/// Lookups of absent identities are not errors: the engine answers them with
/// empty results. These variants cover schema and input problems only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No model is registered under the entity name
    #[error("Unknown entity: {entity}")]
    UnknownEntity { entity: String },

    /// A model was registered twice under the same entity name
    #[error("Model already registered: {entity}")]
    DuplicateModel { entity: String },

    /// Schema declaration is inconsistent
    #[error("Invalid schema for {entity}: {reason}")]
    InvalidSchema { entity: String, reason: String },

    /// Many-to-many relation references a pivot model that is not registered
    #[error("Relation {relation} on {entity} requires an unregistered pivot model")]
    MissingPivot { entity: String, relation: String },

    /// Input payload could not be normalized
    #[error("Invalid input for {entity}: {reason}")]
    InvalidInput { entity: String, reason: String },

    /// Relation-count comparator was not one of `=`, `>`, `>=`, `<`, `<=`
    #[error("Invalid relation comparator: {operator:?}")]
    InvalidComparator { operator: String },

    /// Serialization error (JSON / YAML encoding or decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Filesystem error while reading configuration or seed files
    #[error("IO error: {message}")]
    Io { message: String },
}

impl From<StoreError> for ExError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownEntity { entity } => ExError::new(ExErrorKind::UnknownEntity)
                .with_entity(entity)
                .with_message("No model registered for entity"),

            StoreError::DuplicateModel { entity } => ExError::new(ExErrorKind::AlreadyExists)
                .with_entity(entity)
                .with_op("register_model")
                .with_message("Model already registered"),

            StoreError::InvalidSchema { entity, reason } => {
                ExError::new(ExErrorKind::InvalidSchema)
                    .with_entity(entity)
                    .with_message(reason)
            }

            StoreError::MissingPivot { entity, relation } => {
                ExError::new(ExErrorKind::MissingPivot)
                    .with_entity(entity)
                    .with_message(format!("Pivot model missing for relation {}", relation))
            }

            StoreError::InvalidInput { entity, reason } => ExError::new(ExErrorKind::InvalidInput)
                .with_entity(entity)
                .with_op("normalize")
                .with_message(reason),

            StoreError::InvalidComparator { operator } => {
                ExError::new(ExErrorKind::InvalidComparator)
                    .with_op("has")
                    .with_message(format!("Unsupported comparator {:?}", operator))
            }

            StoreError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            StoreError::Config { message } => {
                ExError::new(ExErrorKind::Config).with_message(message)
            }

            StoreError::Io { message } => ExError::new(ExErrorKind::Io).with_message(message),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for StoreError {
    fn from(err: serde_yaml::Error) -> Self {
        StoreError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for StoreError {
    fn from(err: toml::de::Error) -> Self {
        StoreError::Config {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io {
            message: err.to_string(),
        }
    }
}
