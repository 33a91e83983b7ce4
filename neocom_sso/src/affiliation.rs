use async_trait::async_trait;
use neocom_core::ids::{AllianceId, CharacterId, CorporationId, FactionId};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::{SsoError, SsoResult, config::DataSource, http::provider_error};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CharacterAffiliation {
    pub character_id: CharacterId,
    pub corporation_id: CorporationId,
    #[serde(default)]
    pub alliance_id: Option<AllianceId>,
    #[serde(default)]
    pub faction_id: Option<FactionId>,
}

/// Resolves the corporation, alliance and faction a character belongs to.
#[async_trait]
pub trait AffiliationResolver: Send + Sync {
    async fn resolve_affiliation(&self, character_id: CharacterId)
    -> SsoResult<CharacterAffiliation>;
}

#[derive(Clone, Debug)]
pub struct EsiAffiliationClient {
    http: Client,
    affiliation_url: Url,
}

impl EsiAffiliationClient {
    pub fn new(http: Client, esi_base_url: &str, data_source: DataSource) -> SsoResult<Self> {
        let mut affiliation_url =
            Url::parse(esi_base_url)?.join("/latest/characters/affiliation/")?;
        affiliation_url
            .query_pairs_mut()
            .append_pair("datasource", data_source.as_str());
        Ok(Self {
            http,
            affiliation_url,
        })
    }
}

#[async_trait]
impl AffiliationResolver for EsiAffiliationClient {
    async fn resolve_affiliation(
        &self,
        character_id: CharacterId,
    ) -> SsoResult<CharacterAffiliation> {
        let response = self
            .http
            .post(self.affiliation_url.clone())
            .json(&[character_id])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(provider_error(status, &body));
        }

        let affiliations: Vec<CharacterAffiliation> = serde_json::from_str(&body)?;
        affiliations
            .into_iter()
            .next()
            .ok_or_else(|| SsoError::Affiliation(format!("no affiliation for {character_id}")))
    }
}
