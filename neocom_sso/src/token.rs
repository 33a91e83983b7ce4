use std::fmt;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    SsoError, SsoResult,
    http::{ClientCredentials, post_form},
    pkce::PkceChallenge,
};

/// Token endpoint response. Every field is required; a body missing any of
/// them is a decode error.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoToken {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

impl fmt::Debug for SsoToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SsoToken")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Clone, Copy, Debug)]
pub enum Grant<'a> {
    AuthorizationCode {
        code: &'a str,
        pkce: Option<&'a PkceChallenge>,
    },
    RefreshToken(&'a str),
}

impl Grant<'_> {
    pub fn grant_type(&self) -> &'static str {
        match self {
            Self::AuthorizationCode { .. } => "authorization_code",
            Self::RefreshToken(_) => "refresh_token",
        }
    }
}

#[derive(Clone, Debug)]
pub struct TokenExchanger {
    http: Client,
    token_url: Url,
    credentials: ClientCredentials,
}

impl TokenExchanger {
    pub fn new(http: Client, token_url: Url, credentials: ClientCredentials) -> Self {
        Self {
            http,
            token_url,
            credentials,
        }
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        pkce: Option<&PkceChallenge>,
    ) -> SsoResult<SsoToken> {
        self.exchange(Grant::AuthorizationCode { code, pkce }).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> SsoResult<SsoToken> {
        self.exchange(Grant::RefreshToken(refresh_token)).await
    }

    pub async fn exchange(&self, grant: Grant<'_>) -> SsoResult<SsoToken> {
        let encoded_verifier;
        let mut fields = vec![("grant_type", grant.grant_type())];

        // A code bound to a PKCE challenge is redeemed as a public client.
        // Otherwise the secret decides between Basic auth and `client_id`.
        let use_basic_auth = match grant {
            Grant::AuthorizationCode { code, pkce } => {
                fields.push(("code", code));
                match pkce {
                    Some(pkce) => {
                        encoded_verifier = pkce.encoded_verifier();
                        fields.push(("code_verifier", encoded_verifier.as_str()));
                        false
                    }
                    None if self.credentials.is_confidential() => true,
                    None => {
                        return Err(SsoError::InvalidConfig(
                            "a client secret is required to exchange a code without PKCE",
                        ));
                    }
                }
            }
            Grant::RefreshToken(refresh_token) => {
                fields.push(("refresh_token", refresh_token));
                self.credentials.is_confidential()
            }
        };

        let basic_auth = if use_basic_auth {
            self.credentials.basic_auth()
        } else {
            fields.push(("client_id", self.credentials.client_id.as_str()));
            None
        };

        log::debug!(
            "requesting {} grant (basic auth: {})",
            grant.grant_type(),
            basic_auth.is_some()
        );
        let body = post_form(&self.http, &self.token_url, &fields, basic_auth).await?;
        let token: SsoToken = serde_json::from_str(&body)?;
        log::debug!(
            "{} grant succeeded; access token valid for {}s",
            grant.grant_type(),
            token.expires_in
        );
        Ok(token)
    }
}
