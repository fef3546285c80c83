use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] cid_protocol::ProtocolError),

    #[error("{0}")]
    Probe(#[from] cid_prober::ProbeError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] cid_prober::CatalogError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) | ServerError::Protocol(_) => StatusCode::BAD_REQUEST,
            ServerError::Probe(e) if e.is_rejection() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use cid_prober::{ProbeError, Rejection};

    #[test]
    fn test_status_mapping() {
        let rejected = ServerError::from(ProbeError::InvalidTarget(Rejection::ListingPage));
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

        let empty = ServerError::from(ProbeError::EmptyCatalog);
        assert_eq!(empty.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let config = ServerError::Config("bad port".into());
        assert_eq!(config.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        use axum::body::{to_bytes, Body};
        use axum::extract::{FromRequest, Json};
        use axum::http::Request;

        let request = Request::post("/convert")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"url": null}"#))
            .unwrap();
        let rejection = Json::<cid_protocol::ConvertRequest>::from_request(request, &())
            .await
            .unwrap_err();

        let response = ServerError::from(rejection).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], 400);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request"));
    }
}
