//! Bearer-token gate for protected requests.
//!
//! Turns the raw `Authorization` header into a verified [`Identity`] or a
//! rejection. Every verification failure collapses into a single
//! rejection so callers cannot tell a bad signature from an expired
//! token; the underlying reason is only logged.

use tracing::warn;

use super::token::{Identity, TokenError, TokenService};

/// Why a request was not authenticated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateRejection {
    /// No `Authorization` header
    #[error("token not provided")]
    MissingToken,

    /// Header present but no token after the scheme
    #[error("invalid token")]
    MalformedHeader,

    /// Token failed verification
    #[error("invalid or expired token: {0}")]
    InvalidToken(TokenError),
}

impl GateRejection {
    /// The message shown to the client.
    pub fn public_message(&self) -> &'static str {
        match self {
            GateRejection::MissingToken => "Token não informado.",
            GateRejection::MalformedHeader => "Token inválido.",
            GateRejection::InvalidToken(_) => "Token inválido ou expirado.",
        }
    }
}

/// Extract the token from a `"Bearer <token>"` header value.
///
/// The header is split on single spaces and the second piece is the
/// token; the scheme itself is not checked.
pub fn bearer_token(header: &str) -> Option<&str> {
    header.split(' ').nth(1).filter(|token| !token.is_empty())
}

/// Authenticate a request from its `Authorization` header value.
pub fn authenticate(
    tokens: &TokenService,
    header: Option<&str>,
) -> Result<Identity, GateRejection> {
    let Some(header) = header else {
        warn!("request rejected: authorization header missing");
        return Err(GateRejection::MissingToken);
    };

    let Some(token) = bearer_token(header) else {
        warn!("request rejected: authorization header has no token");
        return Err(GateRejection::MalformedHeader);
    };

    tokens.verify_token(token).map_err(|err| {
        warn!(reason = %err, "request rejected: token verification failed");
        GateRejection::InvalidToken(err)
    })
}
