use axum::extract::{rejection::JsonRejection, FromRequest};

use crate::errors::AppError;

/// `Json<T>` whose rejections (malformed JSON, wrong content type, type
/// mismatches) become 400 validation errors in the standard envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation("body", &rejection.body_text())
    }
}
