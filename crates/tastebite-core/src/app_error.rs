use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::aliases::DieselError;

/// Uniform response envelope used by every route.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct StdResponse<T, M> {
    pub data: Option<T>,
    pub message: Option<M>,
}

impl<T: Serialize, M: Serialize> IntoResponse for StdResponse<T, M> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Resource not found")]
    NotFound,

    #[error("Missing or invalid session")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(String),

    #[error("Access to this resource is forbidden: {0}")]
    ForbiddenResource(String),

    #[error("{0} is unreachable")]
    ServiceUnreachable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<DieselError> for AppError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => AppError::NotFound,
            err => AppError::Other(err.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ForbiddenResource(_) => StatusCode::FORBIDDEN,
            AppError::ServiceUnreachable(_) => StatusCode::BAD_GATEWAY,
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match self {
            AppError::Other(err) => {
                tracing::error!("Internal error: {err:?}");
                "Internal server error".to_string()
            }
            err => err.to_string(),
        };

        let body: StdResponse<(), String> = StdResponse {
            data: None,
            message: Some(message),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diesel_not_found_maps_to_not_found() {
        let err: AppError = DieselError::NotFound.into();
        assert!(matches!(err, AppError::NotFound));
    }

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            AppError::Validation("cart is empty".into())
                .into_response()
                .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::ServiceUnreachable("SessionService".into())
                .into_response()
                .status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
