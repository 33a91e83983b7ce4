use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use jsonwebtoken::{
    Algorithm, DecodingKey,
    jwk::{AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm},
};
use reqwest::Client;
use tokio::sync::Mutex;
use url::Url;

use crate::{SsoResult, errors::ValidationError, http::provider_error};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeySetOrigin {
    Fetched,
    Cached,
}

struct CachedKeySet {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

/// The provider's published signing keys. A zero ttl fetches the set for
/// every lookup.
pub struct JwksCache {
    http: Client,
    jwks_url: Url,
    ttl: Duration,
    cached: Mutex<Option<CachedKeySet>>,
}

impl JwksCache {
    pub fn new(http: Client, jwks_url: Url, ttl: Duration) -> Self {
        Self {
            http,
            jwks_url,
            ttl,
            cached: Mutex::new(None),
        }
    }

    pub async fn key_set(&self) -> SsoResult<(Arc<JwkSet>, KeySetOrigin)> {
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref() {
            if entry.fetched_at.elapsed() < self.ttl {
                log::trace!("using cached key set");
                return Ok((Arc::clone(&entry.keys), KeySetOrigin::Cached));
            }
        }

        let keys = Arc::new(self.fetch().await?);
        if !self.ttl.is_zero() {
            *cached = Some(CachedKeySet {
                keys: Arc::clone(&keys),
                fetched_at: Instant::now(),
            });
        }
        Ok((keys, KeySetOrigin::Fetched))
    }

    /// Drops any cached set and fetches a new one.
    pub async fn refetch(&self) -> SsoResult<Arc<JwkSet>> {
        self.cached.lock().await.take();
        let (keys, _) = self.key_set().await?;
        Ok(keys)
    }

    async fn fetch(&self) -> SsoResult<JwkSet> {
        log::debug!("fetching signing keys from {}", self.jwks_url);
        let response = self.http.get(self.jwks_url.clone()).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(provider_error(status, &body));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Prefers the key named by the token header, falling back to the first
/// key in the set.
pub fn select_key<'a>(keys: &'a JwkSet, kid: Option<&str>) -> Result<&'a Jwk, ValidationError> {
    kid.and_then(|kid| keys.find(kid))
        .or_else(|| keys.keys.first())
        .ok_or(ValidationError::NoSigningKey)
}

/// The algorithm is taken from the key, never from the token header.
pub fn decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Algorithm), ValidationError> {
    let algorithm = match &jwk.common.key_algorithm {
        Some(key_algorithm) => algorithm_from_key(key_algorithm)?,
        None => algorithm_from_parameters(&jwk.algorithm)?,
    };
    let key = DecodingKey::from_jwk(jwk)?;
    Ok((key, algorithm))
}

fn algorithm_from_key(key_algorithm: &KeyAlgorithm) -> Result<Algorithm, ValidationError> {
    match key_algorithm {
        KeyAlgorithm::RS256 => Ok(Algorithm::RS256),
        KeyAlgorithm::RS384 => Ok(Algorithm::RS384),
        KeyAlgorithm::RS512 => Ok(Algorithm::RS512),
        KeyAlgorithm::PS256 => Ok(Algorithm::PS256),
        KeyAlgorithm::PS384 => Ok(Algorithm::PS384),
        KeyAlgorithm::PS512 => Ok(Algorithm::PS512),
        KeyAlgorithm::ES256 => Ok(Algorithm::ES256),
        KeyAlgorithm::ES384 => Ok(Algorithm::ES384),
        KeyAlgorithm::EdDSA => Ok(Algorithm::EdDSA),
        other => Err(ValidationError::UnsupportedKey(format!("{other:?}"))),
    }
}

fn algorithm_from_parameters(parameters: &AlgorithmParameters) -> Result<Algorithm, ValidationError> {
    match parameters {
        AlgorithmParameters::RSA(_) => Ok(Algorithm::RS256),
        AlgorithmParameters::EllipticCurve(ec) => match ec.curve {
            EllipticCurve::P256 => Ok(Algorithm::ES256),
            EllipticCurve::P384 => Ok(Algorithm::ES384),
            ref curve => Err(ValidationError::UnsupportedKey(format!("{curve:?}"))),
        },
        AlgorithmParameters::OctetKeyPair(_) => Ok(Algorithm::EdDSA),
        AlgorithmParameters::OctetKey(_) => Err(ValidationError::UnsupportedKey(
            "symmetric key".to_string(),
        )),
    }
}
