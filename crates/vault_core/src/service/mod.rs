//! Record use-case services.
//!
//! # Responsibility
//! - Expose note/list/password/reminder use-cases over record collections.
//! - Validate user input before anything is persisted.
//! - Route share/import payloads into the right collection.

use crate::model::RecordKind;
use crate::repo::RepoError;
use crate::share::DecodeError;
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod list_service;
pub mod note_service;
pub mod password_service;
pub mod reminder_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for record use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// User input failed validation; nothing was written.
    InvalidInput(String),
    /// Target record does not exist.
    NotFound { kind: RecordKind, id: String },
    /// Import content could not be decoded.
    Decode(DecodeError),
    /// Persistence-layer failure.
    Store(StoreError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(details) => write!(f, "invalid input: {details}"),
            Self::NotFound { kind, id } => write!(f, "{} not found: {id}", kind.as_str()),
            Self::Decode(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Decode(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { kind, id } => Self::NotFound { kind, id },
            RepoError::Store(err) => Self::Store(err),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<DecodeError> for ServiceError {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

/// Trims `value` and rejects it when blank.
pub(crate) fn require_text(field: &str, value: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidInput(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

/// Trims an optional field, mapping blank values to `None`.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
