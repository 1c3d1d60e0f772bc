//! Business logic behind the HTTP handlers.

mod profile;
mod token;

pub use profile::{ProfileSync, SyncOutcome, merge_changes, needs_update};
pub use token::{
    ISSUED_AT_SKEW_SECS, IssuedToken, StreamClaims, StreamTokenSigner, TOKEN_TTL_SECS,
    TokenService,
};
