use std::collections::BTreeSet;

use jsonwebtoken::{Validation, errors::ErrorKind, jwk::JwkSet};
use neocom_core::{ids::CharacterId, time::Timestamp};
use serde::Deserialize;

use crate::{
    SsoError, SsoResult,
    affiliation::AffiliationResolver,
    auth::AuthorizedCharacterData,
    errors::ValidationError,
    jwks::{JwksCache, KeySetOrigin, decoding_key, select_key},
    token::SsoToken,
};

/// Allowed difference between our clock and the provider's when checking
/// `exp`.
pub const CLOCK_SKEW_LEEWAY_SECS: u64 = 2;

const SUBJECT_PREFIX: &str = "CHARACTER:EVE";

#[derive(Debug, Deserialize)]
struct EveTokenClaims {
    sub: String,
    name: String,
    owner: String,
    #[serde(default)]
    scp: Option<ScopeClaim>,
    exp: i64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScopeClaim {
    One(String),
    Many(Vec<String>),
}

/// A verified character plus the outcome of the affiliation lookup, which
/// does not void the identity when it fails.
#[derive(Debug)]
pub struct VerifiedCharacter {
    pub character: AuthorizedCharacterData,
    pub affiliation_error: Option<SsoError>,
}

pub struct IdentityVerifier<A> {
    jwks: JwksCache,
    issuers: Vec<String>,
    affiliation: A,
}

impl<A> IdentityVerifier<A>
where
    A: AffiliationResolver,
{
    pub fn new(jwks: JwksCache, issuers: Vec<String>, affiliation: A) -> Self {
        Self {
            jwks,
            issuers,
            affiliation,
        }
    }

    pub async fn verify(&self, token: SsoToken) -> SsoResult<AuthorizedCharacterData> {
        Ok(self.verify_reporting(token).await?.character)
    }

    pub async fn verify_reporting(&self, token: SsoToken) -> SsoResult<VerifiedCharacter> {
        let claims = self.validate_access_token(&token.access_token).await?;
        let character_id = parse_character_id(&claims.sub)?;
        let expires_on = Timestamp::from_epoch_secs(claims.exp)
            .ok_or(ValidationError::InvalidExpiry(claims.exp))?;

        let mut character = AuthorizedCharacterData {
            character_id,
            character_name: claims.name,
            owner_hash: claims.owner,
            scopes: collect_scopes(claims.scp),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_on,
            alliance_id: None,
            corporation_id: None,
            faction_id: None,
        };
        log::debug!("verified access token for character {character_id}");

        let affiliation_error = match self.affiliation.resolve_affiliation(character_id).await {
            Ok(affiliation) if affiliation.character_id == character_id => {
                character.apply_affiliation(&affiliation);
                None
            }
            Ok(affiliation) => Some(SsoError::Affiliation(format!(
                "lookup for {character_id} answered for {}",
                affiliation.character_id
            ))),
            Err(err) => Some(SsoError::Affiliation(err.display_chain().to_string())),
        };
        if let Some(err) = &affiliation_error {
            log::warn!("character {character_id} verified without affiliation: {err}");
        }

        Ok(VerifiedCharacter {
            character,
            affiliation_error,
        })
    }

    async fn validate_access_token(&self, access_token: &str) -> SsoResult<EveTokenClaims> {
        let (keys, origin) = self.jwks.key_set().await?;
        match decode_claims(&keys, access_token, &self.issuers) {
            Err(err) if origin == KeySetOrigin::Cached && may_be_stale_key(&err) => {
                log::debug!("cached key set rejected token ({err}); refetching");
                let keys = self.jwks.refetch().await?;
                Ok(decode_claims(&keys, access_token, &self.issuers)?)
            }
            other => Ok(other?),
        }
    }
}

fn decode_claims(
    keys: &JwkSet,
    access_token: &str,
    issuers: &[String],
) -> Result<EveTokenClaims, ValidationError> {
    let header = jsonwebtoken::decode_header(access_token)?;
    let jwk = select_key(keys, header.kid.as_deref())?;
    let (key, algorithm) = decoding_key(jwk)?;

    let mut validation = Validation::new(algorithm);
    validation.leeway = CLOCK_SKEW_LEEWAY_SECS;
    validation.validate_exp = true;
    validation.validate_aud = false;
    validation.set_issuer(issuers);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);

    Ok(jsonwebtoken::decode::<EveTokenClaims>(access_token, &key, &validation)?.claims)
}

fn may_be_stale_key(err: &ValidationError) -> bool {
    match err {
        ValidationError::NoSigningKey | ValidationError::UnsupportedKey(_) => true,
        ValidationError::Jwt(err) => matches!(
            err.kind(),
            ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidKeyFormat
                | ErrorKind::InvalidEcdsaKey
                | ErrorKind::InvalidRsaKey(_)
        ),
        _ => false,
    }
}

fn parse_character_id(subject: &str) -> Result<CharacterId, ValidationError> {
    let invalid = || ValidationError::InvalidSubject(subject.to_owned());
    let (prefix, id) = subject.rsplit_once(':').ok_or_else(invalid)?;
    if prefix != SUBJECT_PREFIX {
        return Err(invalid());
    }

    id.parse::<u64>().map(CharacterId).map_err(|_| invalid())
}

fn collect_scopes(claim: Option<ScopeClaim>) -> BTreeSet<String> {
    match claim {
        None => BTreeSet::new(),
        Some(ScopeClaim::One(single)) => BTreeSet::from([single]),
        Some(ScopeClaim::Many(many)) => many.into_iter().collect(),
    }
}
