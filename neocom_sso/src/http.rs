use std::fmt;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::{SsoError, SsoResult};

/// Application credentials. Without a secret the application is a public
/// client and identifies itself with a `client_id` form field instead of
/// HTTP Basic auth.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    client_secret: Option<String>,
}

impl ClientCredentials {
    pub fn public(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
        }
    }

    pub fn confidential(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Some(client_secret.into()),
        }
    }

    pub fn is_confidential(&self) -> bool {
        self.client_secret.is_some()
    }

    pub(crate) fn basic_auth(&self) -> Option<BasicAuth<'_>> {
        self.client_secret.as_deref().map(|secret| BasicAuth {
            username: &self.client_id,
            password: secret,
        })
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

pub(crate) struct BasicAuth<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    error_description: Option<String>,
}

/// Posts a urlencoded form and returns the body of a success response.
/// Authorization is attached to this request only; the shared client's
/// default headers are never touched.
pub(crate) async fn post_form(
    http: &Client,
    url: &Url,
    fields: &[(&str, &str)],
    basic_auth: Option<BasicAuth<'_>>,
) -> SsoResult<String> {
    let mut request = http.post(url.clone()).form(fields);
    if let Some(auth) = basic_auth {
        request = request.basic_auth(auth.username, Some(auth.password));
    }

    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        log::debug!("provider returned {status} for {}", url.path());
        return Err(provider_error(status, &text));
    }

    Ok(text)
}

pub(crate) fn provider_error(status: StatusCode, body: &str) -> SsoError {
    let description = serde_json::from_str::<ProviderErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error_description);
    SsoError::Provider {
        status,
        description,
    }
}
