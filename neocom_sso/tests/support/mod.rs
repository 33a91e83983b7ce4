#![allow(dead_code)]

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use neocom_sso::{
    ClientCredentials, EsiAffiliationClient, IdentityVerifier, JwksCache, SsoConfig,
    SsoEndpoints, TokenExchanger, TokenRevoker, build_http_client,
};
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

pub const CLIENT_ID: &str = "client-123";
pub const CLIENT_SECRET: &str = "secret-456";
pub const CALLBACK_URL: &str = "http://localhost:8080/callback";
pub const CHARACTER_ID: u64 = 95465499;
pub const CHARACTER_NAME: &str = "Test Pilot";
pub const OWNER_HASH: &str = "owner-hash-abc";
pub const PROVIDER_KID: &str = "JWT-Signature-Key";
pub const ROTATED_KID: &str = "JWT-Signature-Key-2";

pub const TOKEN_PATH: &str = "/v2/oauth/token";
pub const REVOKE_PATH: &str = "/v2/oauth/revoke";
pub const JWKS_PATH: &str = "/oauth/jwks";
pub const AFFILIATION_PATH: &str = "/latest/characters/affiliation/";

const PROVIDER_KEY_PEM: &[u8] = include_bytes!("../fixtures/provider_key.pem");
const ROGUE_KEY_PEM: &[u8] = include_bytes!("../fixtures/rogue_key.pem");

const PROVIDER_MODULUS: &str = "lIHtiFAIMTrcRvbrtsnV_AIiPt2LXe25DmCBL-Wjnbx_SV8Z3LBWEBQ02A4a6-Tjwh-J_J_apCGjtifS-kSMzyOiAzTw6xktohdlsk6Z5JjDXCcve65BOdDuVGepWcgjN3d0ZukF32lyN8DmKnKqZQOglgc6posU3sWY0M1MRkkaxWYMMLVI5lrEIe1VuUISnWf0HYhsZ7OIuCLg3IuiMBeyZQmMIo8PtkuAAknJG8KbYuGbBrvZqkoHN1gQkb6CIsPgGJQ6CJdUgDw_2Z8mXgNLT0RlXl4ys_r0b3x4S6LY0AfRYVnr55mklUJius0k-uoP7QwprK4aNiz3I8EbPw";
const ROGUE_MODULUS: &str = "kdywuZ8YEBxFcenHZy1R2RYAPoYt3QSvsuX8xDipN8yEZADHHqFrhJ9cEbN-UCMgjr5L7OI6vmsn43CJvlCcJzdWrN9cUhP1xI4TIMLKPZb0qRPRfYTttJSEygFePDCLaW7as6Xm6sllU4Y21k9CMo1X4zWFxnZOqDCTq8V4u17rJG3SXqssA1U4v2Z8Khiy7-oJ1HdH8zX-KqaGQ9SBeSuEt9vcfQC3L1g3_O7ZTL4m3qgRI9I8Hf8kpSyoFuol-FrMFrxAGnHhRJdZD6-ss8qTMayhv5Ai7KCmrE87apwKNaTV5QnTjYCfLVXNPtXlTQ5SpapFDYG7G9CPFA-BFQ";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SigningKey {
    Provider,
    Rogue,
}

/// A mock login server that also stands in for ESI.
pub struct ProviderHarness {
    pub server: MockServer,
}

impl ProviderHarness {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn config(&self) -> SsoConfig {
        let mut config = SsoConfig::new(CLIENT_ID, CALLBACK_URL);
        config.login_base_url = Some(self.server.uri());
        config.esi_base_url = self.server.uri();
        config.scopes = vec![
            "publicData".to_string(),
            "esi-location.read_location.v1".to_string(),
        ];
        config.request_timeout = Duration::from_secs(5);
        config
    }

    pub fn confidential_config(&self) -> SsoConfig {
        let mut config = self.config();
        config.client_secret = Some(CLIENT_SECRET.to_string());
        config
    }

    /// The issuer the mock provider stamps into its tokens.
    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    pub fn endpoints(&self, config: &SsoConfig) -> SsoEndpoints {
        config.endpoints().expect("endpoints")
    }

    pub fn exchanger(&self, config: &SsoConfig) -> TokenExchanger {
        TokenExchanger::new(
            build_http_client(config).expect("http client"),
            self.endpoints(config).token,
            credentials(config),
        )
    }

    pub fn revoker(&self, config: &SsoConfig) -> TokenRevoker {
        TokenRevoker::new(
            build_http_client(config).expect("http client"),
            self.endpoints(config).revoke,
            credentials(config),
        )
    }

    pub fn verifier(&self, config: &SsoConfig) -> IdentityVerifier<EsiAffiliationClient> {
        let http = build_http_client(config).expect("http client");
        let endpoints = self.endpoints(config);
        let affiliation =
            EsiAffiliationClient::new(http.clone(), &config.esi_base_url, config.data_source)
                .expect("affiliation client");
        IdentityVerifier::new(
            JwksCache::new(http, endpoints.jwks, config.jwks_cache_ttl),
            endpoints.issuers,
            affiliation,
        )
    }

    pub async fn mount_jwks(&self, keys: Value) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(keys))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_affiliation(&self) {
        Mock::given(method("POST"))
            .and(path(AFFILIATION_PATH))
            .and(query_param("datasource", "tranquility"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "character_id": CHARACTER_ID,
                "corporation_id": 98000001,
                "alliance_id": 99000001
            }])))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_affiliation_failure(&self) {
        Mock::given(method("POST"))
            .and(path(AFFILIATION_PATH))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&self.server)
            .await;
    }

    pub fn claims(&self, expires_in_secs: i64) -> Value {
        json!({
            "sub": format!("CHARACTER:EVE:{CHARACTER_ID}"),
            "name": CHARACTER_NAME,
            "owner": OWNER_HASH,
            "scp": ["publicData", "esi-location.read_location.v1"],
            "iss": self.issuer(),
            "exp": now_epoch_secs() + expires_in_secs
        })
    }

    /// A token endpoint response carrying `access_token`.
    pub fn token_body(access_token: &str, refresh_token: &str) -> Value {
        json!({
            "access_token": access_token,
            "expires_in": 1199,
            "token_type": "Bearer",
            "refresh_token": refresh_token
        })
    }

    pub async fn received(&self, request_path: &str) -> Vec<wiremock::Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path() == request_path)
            .collect()
    }
}

pub fn credentials(config: &SsoConfig) -> ClientCredentials {
    match &config.client_secret {
        Some(secret) => ClientCredentials::confidential(&config.client_id, secret),
        None => ClientCredentials::public(&config.client_id),
    }
}

pub fn sign(claims: &Value, key: SigningKey, kid: &str) -> String {
    let pem = match key {
        SigningKey::Provider => PROVIDER_KEY_PEM,
        SigningKey::Rogue => ROGUE_KEY_PEM,
    };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    jsonwebtoken::encode(
        &header,
        claims,
        &EncodingKey::from_rsa_pem(pem).expect("fixture key"),
    )
    .expect("sign token")
}

pub fn provider_jwks() -> Value {
    json!({
        "keys": [rsa_jwk(PROVIDER_KID, PROVIDER_MODULUS)],
        "SkipUnresolvedJsonWebKeys": true
    })
}

/// The provider key followed by a second, rotated key signed with the
/// rogue fixture.
pub fn rotated_jwks() -> Value {
    json!({
        "keys": [
            rsa_jwk(PROVIDER_KID, PROVIDER_MODULUS),
            rsa_jwk(ROTATED_KID, ROGUE_MODULUS)
        ],
        "SkipUnresolvedJsonWebKeys": true
    })
}

fn rsa_jwk(kid: &str, modulus: &str) -> Value {
    json!({
        "alg": "RS256",
        "e": "AQAB",
        "kid": kid,
        "kty": "RSA",
        "n": modulus,
        "use": "sig"
    })
}

pub fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_secs() as i64
}
