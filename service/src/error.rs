//! Errors raised by the requirements backend.

/// Failures surfaced to callers registering or resolving requirements.
///
/// Everything else (empty registry, missing `</head>`, absent optional
/// attributes) is a silent pass-through, never an error.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RequirementsError {
    /// The call site passed a value the backend refuses to store.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A themed resource could not be found in any active theme.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// The installed backend is not the deferring implementation.
    #[error("requirements backend is currently of type {0}")]
    WrongBackendType(String),
}
