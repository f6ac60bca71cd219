use std::collections::BTreeMap;

use rstest::rstest;
use tempfile::TempDir;

use roster_core::{
    config::{self, ActivitySource, SourceKind},
    FileProperties, GroupKind, OfficerHolder, OfficerRole, OfficerRoles, PropertyKey,
    PropertyStore, RosterConfig, RosterDocument, RosterMember, SyncToken,
};

#[rstest]
#[case(PropertyKey::DocumentId, "DOCUMENT_ID")]
#[case(PropertyKey::ResourceNameActive, "RESOURCE_NAME_ACTIVE")]
#[case(PropertyKey::ResourceNamePiper, "RESOURCE_NAME_PIPER")]
#[case(PropertyKey::ResourceNameDrummer, "RESOURCE_NAME_DRUMMER")]
#[case(PropertyKey::ConnectionsSyncToken, "CONNECTIONS_SYNC_TOKEN")]
#[case(PropertyKey::LastUpdated, "LAST_UPDATED")]
fn property_keys_use_script_property_names(#[case] key: PropertyKey, #[case] expected: &str) {
    assert_eq!(key.as_str(), expected);
}

#[rstest]
#[case(GroupKind::Active, PropertyKey::ResourceNameActive)]
#[case(GroupKind::Piper, PropertyKey::ResourceNamePiper)]
#[case(GroupKind::Drummer, PropertyKey::ResourceNameDrummer)]
fn each_group_has_its_own_property(#[case] kind: GroupKind, #[case] key: PropertyKey) {
    assert_eq!(PropertyKey::for_group(kind), key);
}

#[test]
fn roster_document_yaml_roundtrip_keeps_vacancies() {
    let mut officers = OfficerRoles::vacant();
    officers.set(
        OfficerRole::PipeMajor,
        OfficerHolder::Held("Angus Bell".to_string()),
    );
    let doc = RosterDocument {
        officers,
        pipers: vec![RosterMember {
            sort_key: "ADAMS, BOB".to_string(),
            display_name: "Bob Adams".to_string(),
        }],
        drummers: vec![],
    };

    let yaml = serde_yaml::to_string(&doc).expect("serialize");
    assert!(yaml.contains("treasurer: vacant"));
    let back: RosterDocument = serde_yaml::from_str(&yaml).expect("deserialize");
    assert_eq!(back, doc);
}

#[test]
fn properties_file_is_a_flat_string_map() {
    let home = TempDir::new().expect("home");
    let mut store = FileProperties::load_at(home.path()).expect("load");
    store
        .set_sync_token(&SyncToken::from("EgYI"))
        .expect("set token");
    store
        .set(PropertyKey::DocumentId, "1AbCdEf".to_string())
        .expect("set doc id");

    let raw = std::fs::read_to_string(store.path()).expect("read");
    let parsed: BTreeMap<String, String> = serde_yaml::from_str(&raw).expect("parse");
    assert_eq!(parsed.get("CONNECTIONS_SYNC_TOKEN").map(String::as_str), Some("EgYI"));
    assert_eq!(parsed.get("DOCUMENT_ID").map(String::as_str), Some("1AbCdEf"));
}

#[test]
fn config_written_by_hand_is_understood() {
    let home = TempDir::new().expect("home");
    let path = roster_core::paths::config_path_at(home.path());
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"
identity: admin@example.org
source: google
document:
  path: /srv/roster/roster.html
  activity: drive
officers:
  org_unit: null
groups:
  active: Current Members
"#,
    )
    .unwrap();

    let cfg: RosterConfig = config::load_at(home.path()).expect("load");
    assert_eq!(cfg.identity.as_deref(), Some("admin@example.org"));
    assert_eq!(cfg.source, SourceKind::Google);
    assert_eq!(cfg.document.activity, ActivitySource::Drive);
    assert_eq!(cfg.officers.org_unit, None);
    assert_eq!(cfg.groups.name(GroupKind::Active), "Current Members");
    assert_eq!(cfg.groups.name(GroupKind::Drummer), "Drummer");
    assert_eq!(
        cfg.document_path_at(home.path()),
        std::path::PathBuf::from("/srv/roster/roster.html")
    );
}
