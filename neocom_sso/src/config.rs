use std::{fmt, str::FromStr, time::Duration};

use url::Url;

use crate::{SsoError, SsoResult};

pub const DEFAULT_ESI_BASE_URL: &str = "https://esi.evetech.net";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Which game cluster (and therefore which login host) a client talks to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DataSource {
    #[default]
    Tranquility,
    Serenity,
}

impl DataSource {
    pub fn login_host(self) -> &'static str {
        match self {
            Self::Tranquility => "login.eveonline.com",
            Self::Serenity => "login.evepc.163.com",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tranquility => "tranquility",
            Self::Serenity => "serenity",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSource {
    type Err = SsoError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "tranquility" | "tq" => Ok(Self::Tranquility),
            "serenity" => Ok(Self::Serenity),
            _ => Err(SsoError::InvalidConfig(
                "data source must be `tranquility` or `serenity`",
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SsoConfig {
    pub client_id: String,
    /// `None` runs as a public client and relies on PKCE alone.
    pub client_secret: Option<String>,
    pub callback_url: String,
    pub data_source: DataSource,
    pub esi_base_url: String,
    pub scopes: Vec<String>,
    pub user_agent: String,
    pub request_timeout: Duration,
    /// Zero disables caching: the key set is fetched for every verification.
    pub jwks_cache_ttl: Duration,
    /// Replaces `https://{data_source.login_host()}` when set.
    pub login_base_url: Option<String>,
}

impl SsoConfig {
    pub fn new(client_id: impl Into<String>, callback_url: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            callback_url: callback_url.into(),
            data_source: DataSource::default(),
            esi_base_url: DEFAULT_ESI_BASE_URL.to_owned(),
            scopes: Vec::new(),
            user_agent: concat!("neocom/", env!("CARGO_PKG_VERSION")).to_owned(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            jwks_cache_ttl: Duration::ZERO,
            login_base_url: None,
        }
    }

    pub fn validate(&self) -> SsoResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(SsoError::InvalidConfig("EVE_CLIENT_ID must be set"));
        }
        if self.callback_url.trim().is_empty() {
            return Err(SsoError::InvalidConfig("EVE_CALLBACK_URL must be set"));
        }
        if Url::parse(&self.callback_url).is_err() {
            return Err(SsoError::InvalidConfig(
                "EVE_CALLBACK_URL must be an absolute url",
            ));
        }
        if self
            .client_secret
            .as_deref()
            .is_some_and(|secret| secret.trim().is_empty())
        {
            return Err(SsoError::InvalidConfig(
                "EVE_CLIENT_SECRET must not be blank when provided",
            ));
        }
        if Url::parse(&self.esi_base_url).is_err() {
            return Err(SsoError::InvalidConfig("ESI base url must be an absolute url"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(SsoError::InvalidConfig("user_agent must be set"));
        }
        if self.request_timeout.is_zero() {
            return Err(SsoError::InvalidConfig("request timeout must be non-zero"));
        }
        Ok(())
    }

    pub fn endpoints(&self) -> SsoResult<SsoEndpoints> {
        match &self.login_base_url {
            Some(base) => SsoEndpoints::from_base_url(Url::parse(base)?),
            None => SsoEndpoints::for_data_source(self.data_source),
        }
    }
}

/// Absolute urls of every provider endpoint plus the issuer values a
/// token from that provider may carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SsoEndpoints {
    pub authorize: Url,
    pub token: Url,
    pub revoke: Url,
    pub jwks: Url,
    pub issuers: Vec<String>,
}

impl SsoEndpoints {
    pub fn for_data_source(data_source: DataSource) -> SsoResult<Self> {
        Self::from_base_url(Url::parse(&format!(
            "https://{}",
            data_source.login_host()
        ))?)
    }

    pub fn from_base_url(base: Url) -> SsoResult<Self> {
        let host = base
            .host_str()
            .ok_or(SsoError::InvalidConfig("login base url must include a host"))?;
        let authority = match base.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };

        Ok(Self {
            authorize: base.join("/v2/oauth/authorize/")?,
            token: base.join("/v2/oauth/token")?,
            revoke: base.join("/v2/oauth/revoke")?,
            jwks: base.join("/oauth/jwks")?,
            issuers: vec![
                authority.clone(),
                format!("{}://{authority}", base.scheme()),
            ],
        })
    }
}
