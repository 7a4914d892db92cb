//! # Error Handling
//!
//! Error types for the configuration core, built with `thiserror`.
//!
//! Entity errors (`AlreadyExists`, `NotFound`, `Validation`) mean a change was
//! rejected before anything was mutated. Snapshot errors (`InconsistentSnapshot`,
//! `PublishFailure`) are reported after the entity change has already been
//! committed; see [`crate::services::PublishOutcome`].

/// Custom result type for configurator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the configuration core
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A create operation used a name that is already taken within its kind
    #[error("{resource_type} '{name}' already exists")]
    AlreadyExists { resource_type: String, name: String },

    /// A referenced entity does not exist
    #[error("{resource_type} '{name}' not found")]
    NotFound { resource_type: String, name: String },

    /// The built snapshot failed its internal consistency check
    #[error("Inconsistent snapshot: {message}")]
    InconsistentSnapshot { message: String },

    /// The distribution subsystem rejected the install
    #[error("Failed to publish snapshot for node '{node_id}': {message}")]
    PublishFailure { node_id: String, message: String },

    /// Request validation errors
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A resource encoder could not map an entity to its wire form
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// I/O errors
    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create an already-exists error
    pub fn already_exists<R: Into<String>, N: Into<String>>(resource_type: R, name: N) -> Self {
        Self::AlreadyExists { resource_type: resource_type.into(), name: name.into() }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, N: Into<String>>(resource_type: R, name: N) -> Self {
        Self::NotFound { resource_type: resource_type.into(), name: name.into() }
    }

    /// Create an inconsistent snapshot error
    pub fn inconsistent<S: Into<String>>(message: S) -> Self {
        Self::InconsistentSnapshot { message: message.into() }
    }

    /// Create a publish failure for a node
    pub fn publish<N: Into<String>, S: Into<String>>(node_id: N, message: S) -> Self {
        Self::PublishFailure { node_id: node_id.into(), message: message.into() }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create an encoding error
    pub fn encoding<S: Into<String>>(message: S) -> Self {
        Self::Encoding(message.into())
    }

    /// Wrap an I/O error with context
    pub fn io<S: Into<String>>(context: S, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    /// True for the two failure kinds that follow a committed entity change
    pub fn is_snapshot_failure(&self) -> bool {
        matches!(self, Error::InconsistentSnapshot { .. } | Error::PublishFailure { .. })
    }

    /// Get the HTTP status code an administrative surface should return
    pub fn status_code(&self) -> u16 {
        match self {
            Error::AlreadyExists { .. } => 409,
            Error::NotFound { .. } => 404,
            Error::Validation { .. } => 400,
            Error::Serialization(_) => 400,
            Error::InconsistentSnapshot { .. } => 500,
            Error::PublishFailure { .. } => 502,
            Error::Config(_) => 500,
            Error::Encoding(_) => 500,
            Error::Io { .. } => 500,
        }
    }

    /// Check if retrying the same call could succeed without changing it
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::PublishFailure { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io { context: "I/O operation failed".to_string(), source }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON: {}", error))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Self::Serialization(format!("YAML: {}", error))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let first_field = fields.first().map(|(field, _)| field.to_string());
        let message = fields
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        // Nested struct and list errors carry no top-level field entry.
        let message = if message.is_empty() { errors.to_string() } else { message };

        Self::Validation { message: format!("Validation failed: {}", message), field: first_field }
    }
}
