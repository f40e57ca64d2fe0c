//! Request extractors that report failures in the common error shape

use super::error::ApiError;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};

/// `Json<T>` whose rejection is a `VALIDATION_ERROR` body instead of axum's
/// plain-text default
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::Validation(rejection.body_text())),
        }
    }
}
