use std::{collections::BTreeSet, fmt, time::Duration};

use neocom_core::{
    ids::{AllianceId, CharacterId, CorporationId, FactionId},
    time::Timestamp,
};
use serde::{Deserialize, Serialize};

use crate::{SsoResult, affiliation::CharacterAffiliation, errors::ValidationError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginRequest {
    pub authorization_url: String,
    pub state: String,
}

/// A logged-in character. Only ever built from a token whose signature,
/// issuer and expiry were verified.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorizedCharacterData {
    pub character_id: CharacterId,
    pub character_name: String,
    pub owner_hash: String,
    pub scopes: BTreeSet<String>,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_on: Timestamp,
    pub alliance_id: Option<AllianceId>,
    pub corporation_id: Option<CorporationId>,
    pub faction_id: Option<FactionId>,
}

impl AuthorizedCharacterData {
    pub fn should_refresh(&self, now: Timestamp, refresh_skew: Duration) -> bool {
        match now.checked_add(refresh_skew) {
            Some(deadline) => self.expires_on <= deadline,
            None => true,
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    pub fn scopes_joined(&self) -> String {
        self.scopes.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
    }

    pub fn apply_affiliation(&mut self, affiliation: &CharacterAffiliation) {
        self.corporation_id = Some(affiliation.corporation_id);
        self.alliance_id = affiliation.alliance_id;
        self.faction_id = affiliation.faction_id;
    }

    /// Takes the tokens, expiry and scopes of a freshly verified record for
    /// the same character. Affiliation is replaced only when the refreshed
    /// record carries one.
    pub fn apply_refresh(&mut self, refreshed: AuthorizedCharacterData) -> SsoResult<()> {
        if refreshed.character_id != self.character_id {
            return Err(ValidationError::CharacterMismatch {
                expected: self.character_id,
                got: refreshed.character_id,
            }
            .into());
        }

        self.access_token = refreshed.access_token;
        self.refresh_token = refreshed.refresh_token;
        self.expires_on = refreshed.expires_on;
        self.scopes = refreshed.scopes;
        if refreshed.corporation_id.is_some() {
            self.corporation_id = refreshed.corporation_id;
            self.alliance_id = refreshed.alliance_id;
            self.faction_id = refreshed.faction_id;
        }
        Ok(())
    }
}

impl fmt::Debug for AuthorizedCharacterData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedCharacterData")
            .field("character_id", &self.character_id)
            .field("character_name", &self.character_name)
            .field("owner_hash", &self.owner_hash)
            .field("scopes", &self.scopes)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .field("alliance_id", &self.alliance_id)
            .field("corporation_id", &self.corporation_id)
            .field("faction_id", &self.faction_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use neocom_core::{
        ids::{AllianceId, CharacterId, CorporationId},
        time::Timestamp,
    };

    use super::AuthorizedCharacterData;
    use crate::{SsoError, errors::ValidationError};

    fn ts(epoch_secs: i64) -> Timestamp {
        Timestamp::from_epoch_secs(epoch_secs).expect("valid epoch seconds")
    }

    fn character(id: u64, access: &str) -> AuthorizedCharacterData {
        AuthorizedCharacterData {
            character_id: CharacterId(id),
            character_name: "Pilot".to_string(),
            owner_hash: "owner".to_string(),
            scopes: ["publicData".to_string()].into_iter().collect(),
            access_token: access.to_string(),
            refresh_token: format!("{access}-refresh"),
            expires_on: ts(1_000),
            alliance_id: Some(AllianceId(99)),
            corporation_id: Some(CorporationId(98)),
            faction_id: None,
        }
    }

    #[test]
    fn should_refresh_inside_skew_window() {
        let data = character(1, "a");
        assert!(data.should_refresh(ts(950), Duration::from_secs(60)));
        assert!(!data.should_refresh(ts(900), Duration::from_secs(60)));
    }

    #[test]
    fn apply_refresh_keeps_identity_and_previous_affiliation() {
        let mut data = character(1, "old");
        let mut refreshed = character(1, "new");
        refreshed.expires_on = ts(2_000);
        refreshed.corporation_id = None;
        refreshed.alliance_id = None;
        refreshed.character_name = "Renamed".to_string();

        data.apply_refresh(refreshed).expect("same character");

        assert_eq!(data.access_token, "new");
        assert_eq!(data.refresh_token, "new-refresh");
        assert_eq!(data.expires_on, ts(2_000));
        assert_eq!(data.character_name, "Pilot");
        assert_eq!(data.corporation_id, Some(CorporationId(98)));
        assert_eq!(data.alliance_id, Some(AllianceId(99)));
    }

    #[test]
    fn apply_refresh_rejects_other_character() {
        let mut data = character(1, "old");
        let err = data
            .apply_refresh(character(2, "new"))
            .expect_err("character mismatch");
        assert!(matches!(
            err,
            SsoError::Validation(ValidationError::CharacterMismatch { .. })
        ));
        assert_eq!(data.access_token, "old");
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let rendered = format!("{:?}", character(1, "very-secret"));
        assert!(!rendered.contains("very-secret"));
    }
}
