use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};

use crate::presentation::http::dto::{ApiResponse, error_response};

pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity as forwarded by the upstream auth gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub i64);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ApiResponse<()>>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                error_response(
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHENTICATED",
                    "Missing x-user-id header",
                )
            })?;

        raw.trim()
            .parse::<i64>()
            .map(AuthenticatedUser)
            .map_err(|_| {
                error_response(
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHENTICATED",
                    "Invalid x-user-id header",
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<AuthenticatedUser, StatusCode> {
        let mut builder = Request::builder().uri("/chat");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthenticatedUser::from_request_parts(&mut parts, &())
            .await
            .map_err(|(status, _)| status)
    }

    #[tokio::test]
    async fn test_user_header_is_required_and_numeric() {
        assert_eq!(extract(Some(" 42 ")).await, Ok(AuthenticatedUser(42)));
        assert_eq!(extract(None).await, Err(StatusCode::UNAUTHORIZED));
        assert_eq!(extract(Some("abc")).await, Err(StatusCode::UNAUTHORIZED));
    }
}
