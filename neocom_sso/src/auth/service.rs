use std::{collections::BTreeSet, time::Duration};

use neocom_core::{ids::CharacterId, time::Timestamp};

use super::types::{AuthorizedCharacterData, LoginRequest};
use crate::{
    SsoError, SsoResult, client::SsoAuthClient, identity::VerifiedCharacter,
    token_store::TokenStore,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnsureSessionResult {
    Missing,
    Ready(AuthorizedCharacterData),
    NeedsReauth { reason: String },
}

pub trait Clock {
    fn now(&self) -> Timestamp;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

pub struct AuthService<C, S, T = SystemClock>
where
    C: SsoAuthClient,
    S: TokenStore,
    T: Clock,
{
    client: C,
    store: S,
    required_scopes: Vec<String>,
    clock: T,
    refresh_skew: Duration,
}

impl<C, S> AuthService<C, S, SystemClock>
where
    C: SsoAuthClient,
    S: TokenStore,
{
    pub fn new(client: C, store: S, required_scopes: Vec<String>) -> Self {
        Self::with_clock(client, store, required_scopes, SystemClock)
    }
}

impl<C, S, T> AuthService<C, S, T>
where
    C: SsoAuthClient,
    S: TokenStore,
    T: Clock,
{
    pub fn with_clock(client: C, store: S, required_scopes: Vec<String>, clock: T) -> Self {
        Self {
            client,
            store,
            required_scopes,
            clock,
            refresh_skew: Duration::from_secs(60),
        }
    }

    pub fn with_refresh_skew(mut self, refresh_skew: Duration) -> Self {
        self.refresh_skew = refresh_skew;
        self
    }

    pub fn begin_login(&mut self) -> SsoResult<LoginRequest> {
        self.client.begin_login()
    }

    pub async fn complete_login(
        &mut self,
        code: &str,
        callback_state: &str,
    ) -> SsoResult<VerifiedCharacter> {
        let verified = self.client.exchange_code(code, callback_state).await?;
        let session = &verified.character;

        let missing_scopes = missing_required_scopes(&session.scopes, &self.required_scopes);
        if !missing_scopes.is_empty() {
            self.store.clear_session(session.character_id)?;
            return Err(SsoError::MissingRequiredScopes {
                missing: missing_scopes,
            });
        }

        self.store.save_session(session)?;
        log::debug!("stored session for character {}", session.character_id);
        Ok(verified)
    }

    pub fn load_session(
        &self,
        character_id: CharacterId,
    ) -> SsoResult<Option<AuthorizedCharacterData>> {
        self.store.load_session(character_id)
    }

    /// Revokes the stored refresh token and forgets the session. A provider
    /// that no longer knows the token does not stop the local cleanup.
    pub async fn logout(&mut self, character_id: CharacterId) -> SsoResult<()> {
        if let Some(session) = self.store.load_session(character_id)? {
            match self.client.revoke(&session.refresh_token).await {
                Ok(()) => {}
                Err(err) if err.is_recoverable() => {
                    log::warn!(
                        "revoking token for character {character_id} failed; clearing anyway: {:?}",
                        err.display_chain()
                    );
                }
                Err(err) => return Err(err),
            }
        }

        self.store.clear_session(character_id)
    }

    /// Transient refresh failures are returned as errors and leave the
    /// stored session untouched so the caller can retry. Any other refresh
    /// failure means the character has to log in again.
    pub async fn ensure_valid_session(
        &mut self,
        character_id: CharacterId,
    ) -> SsoResult<EnsureSessionResult> {
        let now = self.clock.now();
        let Some(session) = self.store.load_session(character_id)? else {
            return Ok(EnsureSessionResult::Missing);
        };

        if let Some(result) = self.reject_missing_scopes(&session)? {
            return Ok(result);
        }

        if !session.should_refresh(now, self.refresh_skew) {
            return Ok(EnsureSessionResult::Ready(session));
        }

        log::debug!("refreshing session for character {character_id}");
        match self.client.refresh(&session).await {
            Ok(refreshed) => {
                if let Some(result) = self.reject_missing_scopes(&refreshed)? {
                    return Ok(result);
                }

                self.store.save_session(&refreshed)?;
                Ok(EnsureSessionResult::Ready(refreshed))
            }
            Err(err) if err.is_transient() => {
                log::debug!("refresh for character {character_id} failed transiently: {err}");
                Err(err)
            }
            Err(err) => Ok(EnsureSessionResult::NeedsReauth {
                reason: err.to_string(),
            }),
        }
    }

    pub fn next_refresh_delay(
        &self,
        character_id: CharacterId,
        floor: Duration,
    ) -> SsoResult<NextRefreshDelay> {
        let Some(session) = self.store.load_session(character_id)? else {
            return Ok(NextRefreshDelay::NeedsReauth {
                reason: "session missing for selected character".to_string(),
            });
        };

        let missing_scopes = missing_required_scopes(&session.scopes, &self.required_scopes);
        if !missing_scopes.is_empty() {
            return Ok(NextRefreshDelay::NeedsReauth {
                reason: SsoError::MissingRequiredScopes {
                    missing: missing_scopes,
                }
                .to_string(),
            });
        }

        let now = self.clock.now();
        if session.should_refresh(now, self.refresh_skew) {
            return Ok(NextRefreshDelay::ReadyNow);
        }

        let Some(refresh_deadline) = now.checked_add(self.refresh_skew) else {
            return Ok(NextRefreshDelay::ReadyNow);
        };

        let Ok(delay) = session
            .expires_on
            .signed_duration_since(refresh_deadline)
            .to_std()
        else {
            return Ok(NextRefreshDelay::ReadyNow);
        };

        Ok(NextRefreshDelay::Wait(delay.max(floor)))
    }

    fn reject_missing_scopes(
        &self,
        session: &AuthorizedCharacterData,
    ) -> SsoResult<Option<EnsureSessionResult>> {
        let missing_scopes = missing_required_scopes(&session.scopes, &self.required_scopes);
        if missing_scopes.is_empty() {
            return Ok(None);
        }

        self.store.clear_session(session.character_id)?;
        Ok(Some(EnsureSessionResult::NeedsReauth {
            reason: SsoError::MissingRequiredScopes {
                missing: missing_scopes,
            }
            .to_string(),
        }))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NextRefreshDelay {
    ReadyNow,
    Wait(Duration),
    NeedsReauth { reason: String },
}

fn missing_required_scopes(
    granted_scopes: &BTreeSet<String>,
    required_scopes: &[String],
) -> Vec<String> {
    required_scopes
        .iter()
        .filter(|required| !granted_scopes.contains(required.as_str()))
        .cloned()
        .collect()
}
