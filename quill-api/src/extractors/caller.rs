//! Authenticated caller extractor.
//!
//! Authentication happens upstream. The gateway forwards the verified user
//! id in the `X-User-Id` header; this extractor only parses it.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use quill_core::UserId;

use crate::constants::USER_ID_HEADER;
use crate::error::ApiError;

/// The user making the request.
///
/// # Example
///
/// ```rust,ignore
/// async fn withdraw(Caller(user_id): Caller, ...) -> ApiResult<StatusCode> {
///     service.withdraw(id, user_id).await?;
///     Ok(StatusCode::NO_CONTENT)
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub UserId);

impl Caller {
    pub fn id(self) -> UserId {
        self.0
    }
}

fn parse_user_id(raw: &str) -> Option<UserId> {
    raw.trim().parse::<UserId>().ok().filter(|id| *id > 0)
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::unauthorized("Missing caller identity"))?;

        let raw = header
            .to_str()
            .map_err(|_| ApiError::unauthorized("Caller identity is not valid text"))?;

        parse_user_id(raw)
            .map(Caller)
            .ok_or_else(|| ApiError::unauthorized("Caller identity is not a valid user id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    async fn extract(header: Option<&str>) -> Result<Caller, ApiError> {
        let mut builder = Request::builder().uri("/articles/list");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Caller::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_valid_header() {
        assert_eq!(extract(Some("7")).await.unwrap(), Caller(7));
        assert_eq!(extract(Some(" 12 ")).await.unwrap().id(), 12);
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let err = extract(None).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_ids_are_unauthorized() {
        for value in ["abc", "0", "-4", ""] {
            let err = extract(Some(value)).await.unwrap_err();
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED, "value {value:?}");
        }
    }
}
