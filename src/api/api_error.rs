use crate::error::Error;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub(crate) struct APIError(anyhow::Error);

impl IntoResponse for APIError {
    fn into_response(self) -> Response {
        let any_err = self.0;
        // Extractor rejections arrive either bare (via `WithRejection`) or wrapped in our Error.
        let status = match (
            any_err.downcast_ref::<Error>(),
            any_err.downcast_ref::<JsonRejection>(),
        ) {
            (_, Some(rejection)) | (Some(Error::JsonExtractorRejection(rejection)), _) => {
                rejection.status()
            }
            (Some(Error::AuthForbidden(_)), _) => StatusCode::FORBIDDEN,
            (Some(Error::NotAcceptable), _) => StatusCode::NOT_ACCEPTABLE,
            (
                Some(
                    Error::Validation { .. } | Error::InvalidChanges(_) | Error::InvalidRequest(_),
                ),
                _,
            ) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("request failed: {any_err}");
        }
        let body = Json(json!({
            "error": format!("{any_err}"),
        }));
        (status, body).into_response()
    }
}

impl<E> From<E> for APIError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
