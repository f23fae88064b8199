//! Token forging: claim construction and HS256 signing.

use serde::{Deserialize, Serialize};

pub mod claims;
pub mod forger;

pub use forger::TokenForger;

/// One entry of a published batch. Only the compact token string is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedToken {
    pub token: String,
}

impl SignedToken {
    pub fn new(token: String) -> Self {
        Self { token }
    }
}
