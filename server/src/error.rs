//! Error handling.

use std::error::Error as StdError;
use std::io;

use anyhow::Error as AnyError;
use displaydoc::Display;

use sdms::error::SdmsError;

pub type ServerResult<T> = Result<T, ServerError>;

/// An error.
#[derive(Debug, Display)]
pub enum ServerError {
    /// Database error: {0}
    DatabaseError(AnyError),

    /// Listing error: {0}
    ListingError(AnyError),

    /// Configuration error: {0}
    ConfigError(AnyError),

    /// Plan serialization error: {0}
    SerializationError(serde_json::Error),

    /// I/O error: {0}
    IoError(io::Error),

    /// The request set has no "{field}" control field
    MissingControlField { field: &'static str },

    /// Unknown query field "{key}"
    UnknownQueryField { key: String },

    /// Error from the common components: {0}
    SdmsError(SdmsError),
}

impl ServerError {
    pub fn database_error(error: impl StdError + Send + Sync + 'static) -> Self {
        Self::DatabaseError(AnyError::new(error))
    }

    pub fn listing_error(error: impl StdError + Send + Sync + 'static) -> Self {
        Self::ListingError(AnyError::new(error))
    }

    pub fn config_error(error: impl StdError + Send + Sync + 'static) -> Self {
        Self::ConfigError(AnyError::new(error))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "DatabaseError",
            Self::ListingError(_) => "ListingError",
            Self::ConfigError(_) => "ConfigError",
            Self::SerializationError(_) => "SerializationError",
            Self::IoError(_) => "IoError",
            Self::MissingControlField { .. } => "MissingControlField",
            Self::UnknownQueryField { .. } => "UnknownQueryField",
            Self::SdmsError(e) => e.name(),
        }
    }
}

impl StdError for ServerError {}

impl From<SdmsError> for ServerError {
    fn from(error: SdmsError) -> Self {
        Self::SdmsError(error)
    }
}

impl From<io::Error> for ServerError {
    fn from(error: io::Error) -> Self {
        Self::IoError(error)
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(error: serde_json::Error) -> Self {
        Self::SerializationError(error)
    }
}
