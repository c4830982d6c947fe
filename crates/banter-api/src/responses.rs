//! Success envelope shared by every route.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// `{"status": "success", "data": ...}`
#[derive(Debug, Serialize)]
pub struct Success<T: Serialize> {
    status: &'static str,
    data: T,
    #[serde(skip)]
    code: StatusCode,
}

impl<T: Serialize> Success<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: "success",
            data,
            code: StatusCode::OK,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            code: StatusCode::CREATED,
            ..Self::ok(data)
        }
    }
}

impl<T: Serialize> IntoResponse for Success<T> {
    fn into_response(self) -> Response {
        (self.code, Json(self)).into_response()
    }
}
