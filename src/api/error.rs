use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::application::directory::DirectoryError;
use crate::application::lending::LendingError;
use crate::domain::errors::ValidationError;

use super::types::ErrorResponse;

/// API層のエラー型
///
/// 各層のエラーをHTTPステータスへ写像する。内部障害の詳細はログにのみ
/// 残し、クライアントには一般的なメッセージを返す。
#[derive(Debug)]
pub enum ApiError {
    Lending(LendingError),
    Directory(DirectoryError),
    Validation(ValidationError),
}

impl From<LendingError> for ApiError {
    fn from(err: LendingError) -> Self {
        ApiError::Lending(err)
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        ApiError::Directory(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            // 400 Bad Request - 入力値の不備
            ApiError::Validation(err) => {
                (StatusCode::BAD_REQUEST, "validation_error", err.to_string())
            }

            ApiError::Lending(err) => match err {
                // 404 Not Found - 対象が存在しない
                LendingError::BookNotFound(_)
                | LendingError::PatronNotFound(_)
                | LendingError::ActiveLoanNotFound { .. } => {
                    (StatusCode::NOT_FOUND, "not_found", err.to_string())
                }

                // 409 Conflict - 競合。呼び出し側が再送を判断する
                LendingError::AlreadyBorrowed(_) => {
                    (StatusCode::CONFLICT, "already_borrowed", err.to_string())
                }
                LendingError::ConcurrentModification => {
                    (StatusCode::CONFLICT, "conflict", err.to_string())
                }

                // 503 Service Unavailable - ロック待ちの上限超過
                LendingError::LockTimeout => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "lock_timeout",
                    err.to_string(),
                ),

                // 500 - 詳細はログへ、クライアントには一般的なメッセージ
                LendingError::Store(ref cause) => {
                    tracing::error!(error = %err, cause = %cause, "lending store failure");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal_error",
                        "An unexpected error occurred".to_string(),
                    )
                }
            },

            ApiError::Directory(err) => match err {
                DirectoryError::NotFound { .. } => {
                    (StatusCode::NOT_FOUND, "not_found", err.to_string())
                }
                DirectoryError::DuplicateKey { .. } => {
                    (StatusCode::CONFLICT, "duplicate_key", err.to_string())
                }
                DirectoryError::KeyImmutable { .. } => {
                    (StatusCode::BAD_REQUEST, "immutable_key", err.to_string())
                }
                DirectoryError::Referenced { .. } => {
                    (StatusCode::CONFLICT, "conflict", err.to_string())
                }
                DirectoryError::Storage(ref cause) => {
                    tracing::error!(error = %err, cause = %cause, "directory storage failure");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal_error",
                        "An unexpected error occurred".to_string(),
                    )
                }
            },
        };

        (status, Json(ErrorResponse::new(error, message))).into_response()
    }
}
