use portal_core::validation::FieldErrors;
use portal_core::ApiError;
use portal_http::HttpError;

pub type AdminResult<T> = Result<T, AdminError>;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("usage: {0}")]
    Usage(String),
    #[error("not signed in; set PORTAL_USERNAME and PORTAL_PASSWORD")]
    NotSignedIn,
    #[error("{0} not found")]
    NotFound(String),
    #[error("refusing to delete {0} without --yes")]
    ConfirmationRequired(String),
    #[error("rejected: {0}")]
    Rejected(FieldErrors),
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
