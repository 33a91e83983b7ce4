use rand::{CryptoRng, Rng, distributions::Alphanumeric};
use url::Url;

use crate::pkce::CHALLENGE_METHOD;

const STATE_LEN: usize = 24;

/// Composes the provider's authorize url. Pure; performs no I/O.
#[derive(Clone, Debug)]
pub struct AuthorizationUrlBuilder {
    authorize_url: Url,
    client_id: String,
    redirect_uri: String,
}

impl AuthorizationUrlBuilder {
    pub fn new(
        authorize_url: Url,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            authorize_url,
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Query order is fixed: `response_type`, `redirect_uri`, `client_id`,
    /// then the optional `scope`, `state` and PKCE pair.
    pub fn build(
        &self,
        scopes: Option<&[String]>,
        state: Option<&str>,
        challenge: Option<&str>,
    ) -> Url {
        let mut url = self.authorize_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.clear();
            query.append_pair("response_type", "code");
            query.append_pair("redirect_uri", &self.redirect_uri);
            query.append_pair("client_id", &self.client_id);

            if let Some(scope) = scopes.map(join_scopes).filter(|joined| !joined.is_empty()) {
                query.append_pair("scope", &scope);
            }
            if let Some(state) = state {
                query.append_pair("state", state);
            }
            if let Some(challenge) = challenge {
                query.append_pair("code_challenge_method", CHALLENGE_METHOD);
                query.append_pair("code_challenge", challenge);
            }
        }
        url
    }
}

pub fn generate_state<R>(rng: &mut R) -> String
where
    R: Rng + CryptoRng,
{
    (0..STATE_LEN)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

/// Space-joined, first occurrence wins. The encoder renders spaces as `+`.
fn join_scopes(scopes: &[String]) -> String {
    let mut unique: Vec<&str> = Vec::with_capacity(scopes.len());
    for scope in scopes.iter().map(|scope| scope.trim()) {
        if !scope.is_empty() && !unique.contains(&scope) {
            unique.push(scope);
        }
    }
    unique.join(" ")
}
