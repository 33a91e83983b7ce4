use std::{
    collections::BTreeSet,
    time::{SystemTime, UNIX_EPOCH},
};

use neocom_core::{
    ids::{AllianceId, CorporationId},
    time::Timestamp,
};
use neocom_sso::{AuthorizedCharacterData, CharacterId, KeyringTokenStore, TokenStore};

const TEST_SERVICE: &str = "neocom-keyring-integration-tests";

fn session(
    character_id: u64,
    name: &str,
    scopes: &[&str],
    expires_on: i64,
) -> AuthorizedCharacterData {
    AuthorizedCharacterData {
        character_id: CharacterId(character_id),
        character_name: name.to_string(),
        owner_hash: format!("owner-{character_id}"),
        scopes: scopes.iter().map(|scope| scope.to_string()).collect::<BTreeSet<_>>(),
        access_token: format!("access-token-{character_id}"),
        refresh_token: format!("refresh-token-{character_id}"),
        expires_on: Timestamp::from_epoch_secs(expires_on).expect("valid epoch seconds"),
        alliance_id: Some(AllianceId(99000001)),
        corporation_id: Some(CorporationId(98000001)),
        faction_id: None,
    }
}

#[test]
fn keyring_round_trip_save_load_clear() {
    let account = format!(
        "session-{}-{}",
        std::process::id(),
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos()
    );
    let store = KeyringTokenStore::new(TEST_SERVICE, account);

    store
        .clear_session(CharacterId(123_456_789))
        .expect("cleanup before test should succeed");
    store
        .clear_session(CharacterId(987_654_321))
        .expect("cleanup before test should succeed");

    let first = session(
        123_456_789,
        "Integration Pilot",
        &["publicData", "esi-location.read_location.v1"],
        2_000_000_000,
    );
    let second = session(987_654_321, "Second Pilot", &["publicData"], 2_100_000_000);

    store
        .save_session(&first)
        .expect("saving session in keyring should succeed");
    store
        .save_session(&second)
        .expect("saving second session in keyring should succeed");

    assert_eq!(
        store
            .load_session(CharacterId(123_456_789))
            .expect("loading session from keyring should succeed"),
        Some(first)
    );
    assert_eq!(
        store
            .load_session(CharacterId(987_654_321))
            .expect("loading second session from keyring should succeed"),
        Some(second)
    );

    store
        .clear_session(CharacterId(123_456_789))
        .expect("clearing session in keyring should succeed");

    assert_eq!(
        store
            .load_session(CharacterId(123_456_789))
            .expect("loading after clear should succeed"),
        None
    );
    assert!(
        store
            .load_session(CharacterId(987_654_321))
            .expect("loading second session after first clear should succeed")
            .is_some()
    );

    store
        .clear_session(CharacterId(987_654_321))
        .expect("clearing second session in keyring should succeed");
}
