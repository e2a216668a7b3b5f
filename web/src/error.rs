use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, PartialEq)]
pub enum WebErrorKind {
    /// `group_id` query parameter missing, unparseable or not positive.
    InvalidGroupId,
}

#[derive(Debug)]
pub struct Error {
    pub error_kind: WebErrorKind,
}

impl Error {
    pub fn new(error_kind: WebErrorKind) -> Self {
        Self { error_kind }
    }
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self.error_kind {
            WebErrorKind::InvalidGroupId => {
                (StatusCode::BAD_REQUEST, "Invalid group ID").into_response()
            }
        }
    }
}
