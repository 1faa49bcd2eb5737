//! Response envelope, error mapping and the JSON body extractor

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Json as JsonExtractor,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::core::Error;
use crate::system::metrics::Metrics;

/// Standard API response wrapper for all endpoints
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Whether the operation was successful
    pub success: bool,
    /// Response data (if successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Human readable note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error text (if not successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful API response with data
    pub fn success(data: T) -> Self {
        Self { success: true, data: Some(data), message: None, error: None }
    }

    /// Create a successful API response with data and message
    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self { success: true, data: Some(data), message: Some(message.into()), error: None }
    }
}

impl ApiResponse<()> {
    /// Successful response carrying only a message
    pub fn message(message: impl Into<String>) -> Self {
        Self { success: true, data: None, message: Some(message.into()), error: None }
    }

    /// Failed response
    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, data: None, message: None, error: Some(error.into()) }
    }
}

/// Service error on its way out as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let class = if status.is_server_error() { "5xx" } else { "4xx" };
        Metrics::global().api.errors.with_label_values(&[class]).inc();

        if status.is_server_error() {
            error!("❌ {}", self.0);
        } else {
            warn!("⚠️ {}", self.0);
        }

        (status, Json(ApiResponse::failure(self.0.to_string()))).into_response()
    }
}

/// Handler result
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// `200 OK` with the envelope
pub fn ok<T: Serialize>(data: T) -> ApiResult<Json<ApiResponse<T>>> {
    Ok(Json(ApiResponse::success(data)))
}

/// `201 Created` with the envelope
pub fn created<T: Serialize>(data: T, message: impl Into<String>) -> ApiResult<(StatusCode, Json<ApiResponse<T>>)> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success_with_message(data, message))))
}

/// `200 OK` read of something that may be absent; absence becomes 404
pub fn found<T: Serialize>(data: Option<T>, what: impl Into<String>) -> ApiResult<Json<ApiResponse<T>>> {
    match data {
        Some(data) => ok(data),
        None => Err(Error::not_found(what).into()),
    }
}

/// Custom JSON extractor that returns envelope error responses
pub struct JsonRequest<T>(pub T);

impl<T, S> FromRequest<S> for JsonRequest<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match JsonExtractor::<T>::from_request(req, state).await {
            Ok(JsonExtractor(value)) => Ok(JsonRequest(value)),
            Err(rejection) => {
                let message = match rejection {
                    JsonRejection::JsonDataError(err) => format!("Invalid JSON data: {}", err.body_text()),
                    JsonRejection::JsonSyntaxError(_) => "Malformed JSON".to_string(),
                    JsonRejection::MissingJsonContentType(_) => {
                        "Missing or invalid Content-Type header. Expected 'application/json'".to_string()
                    }
                    JsonRejection::BytesRejection(_) => "Failed to read request body".to_string(),
                    _ => "Invalid JSON request".to_string(),
                };
                Err(Error::invalid_input(message).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_omits_empty_fields() {
        let body = serde_json::to_value(ApiResponse::success(1)).unwrap();
        assert_eq!(body, serde_json::json!({"success": true, "data": 1}));

        let body = serde_json::to_value(ApiResponse::failure("nope")).unwrap();
        assert_eq!(body, serde_json::json!({"success": false, "error": "nope"}));
    }

    #[test]
    fn store_failure_maps_to_503() {
        let response = ApiError(Error::store_unavailable("down")).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
