//! Proof Key for Code Exchange pairs.
//!
//! The login provider was registered against a transform that base64url
//! encodes the verifier *before* hashing it, and expects that encoded form
//! back as `code_verifier`. Both halves live here so they cannot drift.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{CryptoRng, Rng, distributions::Alphanumeric};
use sha2::{Digest, Sha256};

/// Length of the raw verifier in characters.
pub const VERIFIER_LEN: usize = 32;

pub const CHALLENGE_METHOD: &str = "S256";

#[derive(Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    pub fn generate<R>(rng: &mut R) -> Self
    where
        R: Rng + CryptoRng,
    {
        let verifier = generate_verifier(rng);
        let challenge = derive_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    /// The value sent as `code_verifier` during the token exchange.
    pub fn encoded_verifier(&self) -> String {
        encode_verifier(&self.verifier)
    }
}

impl std::fmt::Debug for PkceChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceChallenge")
            .field("verifier", &"<redacted>")
            .field("challenge", &self.challenge)
            .finish()
    }
}

pub fn generate_verifier<R>(rng: &mut R) -> String
where
    R: Rng + CryptoRng,
{
    (0..VERIFIER_LEN)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

pub fn encode_verifier(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(verifier.as_bytes())
}

pub fn derive_challenge(verifier: &str) -> String {
    let encoded = encode_verifier(verifier);
    let digest = Sha256::digest(encoded.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}
