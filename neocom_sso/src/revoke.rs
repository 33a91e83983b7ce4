use reqwest::Client;
use url::Url;

use crate::{
    SsoResult,
    http::{ClientCredentials, post_form},
};

#[derive(Clone, Debug)]
pub struct TokenRevoker {
    http: Client,
    revoke_url: Url,
    credentials: ClientCredentials,
}

impl TokenRevoker {
    pub fn new(http: Client, revoke_url: Url, credentials: ClientCredentials) -> Self {
        Self {
            http,
            revoke_url,
            credentials,
        }
    }

    /// Revoking an unknown or already revoked token surfaces as
    /// `SsoError::Provider`, which callers may ignore.
    pub async fn revoke(&self, refresh_token: &str) -> SsoResult<()> {
        let mut fields = vec![("token_type_hint", "refresh_token"), ("token", refresh_token)];

        let basic_auth = self.credentials.basic_auth();
        if basic_auth.is_none() {
            fields.push(("client_id", self.credentials.client_id.as_str()));
        }

        post_form(&self.http, &self.revoke_url, &fields, basic_auth).await?;
        log::debug!("refresh token revoked");
        Ok(())
    }
}
