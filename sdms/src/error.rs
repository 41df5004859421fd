//! Error handling.

use std::error::Error as StdError;

use displaydoc::Display;

use crate::metadata::FieldKind;

pub type SdmsResult<T> = Result<T, SdmsError>;

/// An error.
#[derive(Debug, Display)]
pub enum SdmsError {
    /// Path "{path}" has {found} metadata segments where the schema declares {expected}
    SchemaMismatch {
        path: String,
        expected: usize,
        found: usize,
    },

    /// Cannot coerce "{value}" into {kind} for field "{field}"
    TypeCoercion {
        field: String,
        value: String,
        kind: FieldKind,
    },

    /// Invalid path schema "{decl}": {reason}
    InvalidSchema { decl: String, reason: &'static str },

    /// Unknown staging tier "{name}"
    UnknownStageTier { name: String },

    /// Unknown data class "{name}"
    UnknownDataClass { name: String },
}

impl SdmsError {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SchemaMismatch { .. } => "SchemaMismatch",
            Self::TypeCoercion { .. } => "TypeCoercion",
            Self::InvalidSchema { .. } => "InvalidSchema",
            Self::UnknownStageTier { .. } => "UnknownStageTier",
            Self::UnknownDataClass { .. } => "UnknownDataClass",
        }
    }
}

impl StdError for SdmsError {}
