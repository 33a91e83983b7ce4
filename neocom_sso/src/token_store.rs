use keyring::Entry;
use neocom_core::ids::CharacterId;

use crate::{SsoError, SsoResult, auth::AuthorizedCharacterData};

pub trait TokenStore {
    fn load_session(&self, character_id: CharacterId)
    -> SsoResult<Option<AuthorizedCharacterData>>;
    fn save_session(&self, session: &AuthorizedCharacterData) -> SsoResult<()>;
    fn clear_session(&self, character_id: CharacterId) -> SsoResult<()>;
}

/// Keeps one JSON encoded session per character in the platform keyring.
#[derive(Clone, Debug)]
pub struct KeyringTokenStore {
    service: String,
    account_prefix: String,
}

impl KeyringTokenStore {
    pub fn new(service: impl Into<String>, account_prefix: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account_prefix: account_prefix.into(),
        }
    }

    fn account_for_character(&self, character_id: CharacterId) -> String {
        format!("{}:character:{character_id}", self.account_prefix)
    }

    fn entry_for_character(&self, character_id: CharacterId) -> SsoResult<Entry> {
        Ok(Entry::new(
            &self.service,
            &self.account_for_character(character_id),
        )?)
    }
}

impl TokenStore for KeyringTokenStore {
    fn load_session(
        &self,
        character_id: CharacterId,
    ) -> SsoResult<Option<AuthorizedCharacterData>> {
        let entry = self.entry_for_character(character_id)?;
        match entry.get_password() {
            Ok(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(SsoError::SessionSerialization),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save_session(&self, session: &AuthorizedCharacterData) -> SsoResult<()> {
        let entry = self.entry_for_character(session.character_id)?;
        let raw = serde_json::to_string(session).map_err(SsoError::SessionSerialization)?;
        entry.set_password(&raw)?;
        log::trace!("saved session for character {}", session.character_id);
        Ok(())
    }

    fn clear_session(&self, character_id: CharacterId) -> SsoResult<()> {
        let entry = self.entry_for_character(character_id)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
