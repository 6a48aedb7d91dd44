use crate::validation::FieldErrors;

pub type ApiResult<T> = Result<T, ApiError>;

/// Failure of a single transport round trip, before any HTTP status is known.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("request could not be built: {0}")]
    Request(String),
}

/// Outcome taxonomy of a REST call, as the screens consume it.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// 4xx with a field-keyed body.
    #[error("rejected by server: {0}")]
    Validation(FieldErrors),
    #[error("authentication required")]
    Unauthorized,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ApiError::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// Message shown to a person; internals stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Validation(_) => "Please correct the highlighted fields.".into(),
            ApiError::Unauthorized => "Your session has expired. Please sign in again.".into(),
            ApiError::NotFound(_) => "The requested record could not be found.".into(),
            ApiError::Server { .. } | ApiError::Decode(_) => {
                "Something went wrong on the server. Please try again.".into()
            }
            ApiError::Transport(_) => {
                "Unable to reach the server. Check your connection and try again.".into()
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}
