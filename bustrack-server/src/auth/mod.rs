//! Credentials and identity.
//!
//! Password hashing, signed identity tokens, and the gate that verifies
//! bearer tokens on protected requests.

mod gate;
mod password;
mod token;

pub use gate::{GateRejection, authenticate, bearer_token};
pub use password::{
    CredentialError, DEFAULT_COST, DEFAULT_MAX_CONCURRENT, PasswordHasher, hash_password,
    verify_password,
};
pub use token::{
    DEVELOPMENT_SECRET, Identity, SigningSecret, TOKEN_TTL_SECS, TokenError, TokenService,
};
