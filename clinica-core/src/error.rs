use thiserror::Error;

/// Failure kinds exposed to the transport layer.
///
/// The transport layer maps these to responses: `NotFound` to a 404-style
/// missing-resource response, `PreconditionFailed` to a 409/412-style rule
/// violation, `BadRequest` to a 400-style malformed input, `Storage` to a
/// 500-style backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    PreconditionFailed,
    BadRequest,
    Storage,
}

#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ClinicError {
    /// Standard message for a failed id lookup.
    pub fn not_found(entity: &str) -> Self {
        ClinicError::NotFound(format!("The {entity} with the given id was not found"))
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        ClinicError::PreconditionFailed(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClinicError::NotFound(_) => ErrorKind::NotFound,
            ClinicError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            ClinicError::BadRequest(_) => ErrorKind::BadRequest,
            ClinicError::Storage(_) => ErrorKind::Storage,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClinicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = ClinicError::not_found("patient");
        assert_eq!(
            err.to_string(),
            "The patient with the given id was not found"
        );
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            ClinicError::precondition_failed("rule violated").kind(),
            ErrorKind::PreconditionFailed
        );
        assert_eq!(
            ClinicError::BadRequest("bad".into()).kind(),
            ErrorKind::BadRequest
        );
        assert_eq!(
            ClinicError::Storage("io".into()).kind(),
            ErrorKind::Storage
        );
    }
}
