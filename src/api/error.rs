use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::{debug, error};
use serde::Serialize;
use thiserror::Error;

use crate::diary::errors::{DiaryError, PetError, RewardError, ShopError};

pub type JsonResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Diary(#[from] DiaryError),

    /// Missing or wrong admin credentials.
    #[error("{0}")]
    Unauthorized(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Diary(e) => diary_status(e),
        }
    }
}

fn diary_status(err: &DiaryError) -> StatusCode {
    match err {
        DiaryError::Validation(_) => StatusCode::BAD_REQUEST,
        DiaryError::NotFound(_) => StatusCode::NOT_FOUND,
        DiaryError::Conflict(_) => StatusCode::CONFLICT,
        DiaryError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        DiaryError::Reward(RewardError::InvalidThreshold(_)) => StatusCode::BAD_REQUEST,
        DiaryError::Reward(RewardError::MilestoneNotReached { .. }) => StatusCode::CONFLICT,
        DiaryError::Pet(e) => match e {
            PetError::InvalidSpecies(_) | PetError::EmptyName | PetError::NameTooLong { .. } => {
                StatusCode::BAD_REQUEST
            }
            PetError::PetAlreadyExists
            | PetError::NoPet
            | PetError::PetIsDead
            | PetError::NoPendingTask => StatusCode::CONFLICT,
        },
        DiaryError::Shop(e) => match e {
            ShopError::UnknownItem(_) => StatusCode::NOT_FOUND,
            ShopError::UnknownSlot(_) => StatusCode::BAD_REQUEST,
            ShopError::AlreadyOwned(_)
            | ShopError::NotOwned(_)
            | ShopError::InsufficientFunds { .. }
            | ShopError::NoPet => StatusCode::CONFLICT,
        },
        DiaryError::Io(_)
        | DiaryError::Json(_)
        | DiaryError::SchemaMismatch { .. }
        | DiaryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        let status = self.status();
        match &self {
            ApiError::Diary(e) if !e.is_rejection() => error!("request failed: {}", self),
            _ => debug!("request refused ({}): {}", status.as_u16(), self),
        }
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationError;

    #[test]
    fn rejections_map_to_client_errors() {
        let cases: Vec<(DiaryError, StatusCode)> = vec![
            (ValidationError::InvalidDataUrl.into(), StatusCode::BAD_REQUEST),
            (DiaryError::NotFound("user: 1".into()), StatusCode::NOT_FOUND),
            (PetError::PetIsDead.into(), StatusCode::CONFLICT),
            (PetError::InvalidSpecies("dragon".into()).into(), StatusCode::BAD_REQUEST),
            (
                ShopError::InsufficientFunds { price: 5, balance: 1 }.into(),
                StatusCode::CONFLICT,
            ),
            (ShopError::UnknownItem("x".into()).into(), StatusCode::NOT_FOUND),
            (DiaryError::PermissionDenied("blocked".into()), StatusCode::FORBIDDEN),
            (DiaryError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.is_rejection(), status.is_client_error(), "{}", err);
            assert_eq!(ApiError::from(err).status(), status);
        }
    }
}
