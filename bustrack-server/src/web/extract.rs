//! Request extractors.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::auth::{self, Identity};

use super::error::AppError;
use super::state::AppState;

/// The verified caller of a protected route.
///
/// Extraction runs the bearer-token gate; handlers that take this argument
/// never see unauthenticated requests.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // A header that is not valid text has no readable token.
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .map(|value| value.to_str().unwrap_or_default());

        let identity = auth::authenticate(&state.tokens, header)?;
        Ok(Authenticated(identity))
    }
}
