use async_trait::async_trait;
use rand::{CryptoRng, Rng, SeedableRng, rngs::StdRng};
use reqwest::Client;

use crate::{
    SsoError, SsoResult,
    affiliation::{AffiliationResolver, EsiAffiliationClient},
    auth::{AuthorizedCharacterData, LoginRequest},
    authorize::{AuthorizationUrlBuilder, generate_state},
    config::SsoConfig,
    http::ClientCredentials,
    identity::{IdentityVerifier, VerifiedCharacter},
    jwks::JwksCache,
    pkce::PkceChallenge,
    revoke::TokenRevoker,
    token::TokenExchanger,
};

#[async_trait]
pub trait SsoAuthClient {
    fn begin_login(&mut self) -> SsoResult<LoginRequest>;
    /// The verified character plus any affiliation lookup failure, which
    /// does not fail the login.
    async fn exchange_code(
        &mut self,
        code: &str,
        callback_state: &str,
    ) -> SsoResult<VerifiedCharacter>;
    /// A failed affiliation lookup keeps the affiliation already on
    /// `session`.
    async fn refresh(
        &mut self,
        session: &AuthorizedCharacterData,
    ) -> SsoResult<AuthorizedCharacterData>;
    async fn revoke(&mut self, refresh_token: &str) -> SsoResult<()>;
}

/// State and verifier of the login currently waiting for its redirect.
struct PendingLogin {
    state: String,
    pkce: PkceChallenge,
}

pub struct EveSsoClient<A = EsiAffiliationClient, R = StdRng> {
    authorize: AuthorizationUrlBuilder,
    scopes: Vec<String>,
    exchanger: TokenExchanger,
    revoker: TokenRevoker,
    verifier: IdentityVerifier<A>,
    rng: R,
    pending: Option<PendingLogin>,
}

impl EveSsoClient {
    pub fn new(config: &SsoConfig) -> SsoResult<Self> {
        let http = build_http_client(config)?;
        let affiliation =
            EsiAffiliationClient::new(http.clone(), &config.esi_base_url, config.data_source)?;
        Self::with_parts(config, http, affiliation, StdRng::from_entropy())
    }
}

impl<A, R> EveSsoClient<A, R>
where
    A: AffiliationResolver,
    R: Rng + CryptoRng + Send,
{
    /// Builds a client around an existing http client, affiliation source
    /// and random source.
    pub fn with_parts(config: &SsoConfig, http: Client, affiliation: A, rng: R) -> SsoResult<Self> {
        config.validate()?;
        let endpoints = config.endpoints()?;
        let credentials = match &config.client_secret {
            Some(secret) => ClientCredentials::confidential(&config.client_id, secret),
            None => ClientCredentials::public(&config.client_id),
        };

        let jwks = JwksCache::new(http.clone(), endpoints.jwks.clone(), config.jwks_cache_ttl);

        Ok(Self {
            authorize: AuthorizationUrlBuilder::new(
                endpoints.authorize.clone(),
                &config.client_id,
                &config.callback_url,
            ),
            scopes: config.scopes.clone(),
            exchanger: TokenExchanger::new(
                http.clone(),
                endpoints.token.clone(),
                credentials.clone(),
            ),
            revoker: TokenRevoker::new(http, endpoints.revoke.clone(), credentials),
            verifier: IdentityVerifier::new(jwks, endpoints.issuers, affiliation),
            rng,
            pending: None,
        })
    }
}

#[async_trait]
impl<A, R> SsoAuthClient for EveSsoClient<A, R>
where
    A: AffiliationResolver,
    R: Rng + CryptoRng + Send,
{
    fn begin_login(&mut self) -> SsoResult<LoginRequest> {
        let state = generate_state(&mut self.rng);
        let pkce = PkceChallenge::generate(&mut self.rng);
        let url = self
            .authorize
            .build(
                Some(self.scopes.as_slice()),
                Some(state.as_str()),
                Some(pkce.challenge.as_str()),
            );
        log::debug!("built authorize url for {} scopes", self.scopes.len());

        self.pending = Some(PendingLogin {
            state: state.clone(),
            pkce,
        });

        Ok(LoginRequest {
            authorization_url: url.into(),
            state,
        })
    }

    async fn exchange_code(
        &mut self,
        code: &str,
        callback_state: &str,
    ) -> SsoResult<VerifiedCharacter> {
        // A mismatched callback leaves the pending login in place.
        let expected = self.pending.as_ref().ok_or(SsoError::LoginNotStarted)?;
        if callback_state != expected.state {
            return Err(SsoError::StateMismatch {
                expected: expected.state.clone(),
                got: callback_state.to_string(),
            });
        }

        let pending = self.pending.take().ok_or(SsoError::LoginNotStarted)?;
        let token = self.exchanger.exchange_code(code, Some(&pending.pkce)).await?;
        self.verifier.verify_reporting(token).await
    }

    async fn refresh(
        &mut self,
        session: &AuthorizedCharacterData,
    ) -> SsoResult<AuthorizedCharacterData> {
        let token = self.exchanger.refresh(&session.refresh_token).await?;
        let refreshed = self.verifier.verify(token).await?;

        let mut updated = session.clone();
        updated.apply_refresh(refreshed)?;
        Ok(updated)
    }

    async fn revoke(&mut self, refresh_token: &str) -> SsoResult<()> {
        self.revoker.revoke(refresh_token).await
    }
}

pub fn build_http_client(config: &SsoConfig) -> SsoResult<Client> {
    Ok(Client::builder()
        .timeout(config.request_timeout)
        .user_agent(config.user_agent.clone())
        .build()?)
}
