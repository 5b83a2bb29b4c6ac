//! Secondary-realm protocol client and token model.

pub mod client;
pub mod token;

pub use client::{RealmClient, TokenBroker, ACCESS_TOKEN_TYPE, GRANT_TYPE_TOKEN_EXCHANGE};
pub use token::{RealmToken, TokenResponse, REFRESH_WINDOW_SECS};
