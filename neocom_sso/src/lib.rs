pub mod affiliation;
pub mod auth;
pub mod authorize;
pub mod client;
pub mod config;
pub mod errors;
mod http;
pub mod identity;
pub mod jwks;
pub mod pkce;
pub mod revoke;
pub mod token;
pub mod token_store;

pub use affiliation::{AffiliationResolver, CharacterAffiliation, EsiAffiliationClient};
pub use auth::{
    AuthService, AuthorizedCharacterData, Clock, EnsureSessionResult, LoginRequest,
    NextRefreshDelay, SystemClock,
};
pub use authorize::AuthorizationUrlBuilder;
pub use client::{EveSsoClient, SsoAuthClient, build_http_client};
pub use config::{DataSource, SsoConfig, SsoEndpoints};
pub use errors::{SsoError, SsoResult, ValidationError};
pub use http::ClientCredentials;
pub use identity::{IdentityVerifier, VerifiedCharacter};
pub use jwks::JwksCache;
pub use neocom_core::ids::CharacterId;
pub use pkce::PkceChallenge;
pub use revoke::TokenRevoker;
pub use token::{Grant, SsoToken, TokenExchanger};
pub use token_store::{KeyringTokenStore, TokenStore};
