//! Response helpers

use axum::Json;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::CONNECTION;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;

/// Hold data for a refused or failed request
pub struct Error {
    status_code: StatusCode,
    message: String,
    description: Option<String>,
}

impl Error {
    /// The server is going away, the client should retry elsewhere
    ///
    /// The connection is closed after the response so keep-alive clients
    /// reconnect, which lands them on another instance.
    pub fn service_unavailable<M>(message: M) -> Self
    where
        M: ToString,
    {
        Self {
            status_code: StatusCode::SERVICE_UNAVAILABLE,
            message: message.to_string(),
            description: None,
        }
    }

    pub fn with_description<M>(self, description: M) -> Self
    where
        M: ToString,
    {
        Self {
            description: Some(description.to_string()),
            ..self
        }
    }
}

#[derive(Serialize)]
struct ErrorWrapper<D>
where
    D: Serialize,
{
    error: D,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<D>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let mut response = (
            self.status_code,
            Json(ErrorWrapper {
                error: self.message,
                description: self.description,
            }),
        )
            .into_response();

        if self.status_code == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert(CONNECTION, HeaderValue::from_static("close"));
        }

        response
    }
}
