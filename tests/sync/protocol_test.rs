// Protocol Tests
// Wire format of the gossip payload

use relaymesh::model::{Command, Device, EntityKind, User};
use relaymesh::sync::{GossipPayload, ProtocolError, VersionVector, PROTOCOL_VERSION};

fn sample() -> GossipPayload {
    let mut command = Command::new("esp32_1", "on");
    command.id = 1;
    let mut user = User::new("alice", "hash");
    user.id = 1;
    GossipPayload::new(
        "node-a",
        VersionVector::default(),
        vec![command],
        vec![Device::new("esp32_1", "secret")],
        vec![user],
    )
}

// ============================================================================
// ENCODING
// ============================================================================

#[test]
fn test_payload_top_level_fields() {
    let json: serde_json::Value = serde_json::from_slice(&sample().to_json().unwrap()).unwrap();

    assert_eq!(json["protocol_version"], PROTOCOL_VERSION);
    assert_eq!(json["sender"], "node-a");
    assert!(json["commands"].is_array());
    assert!(json["esp_devices"].is_array());
    assert!(json["users"].is_array());
    assert!(json["version_vector"]["commands"].is_null());
}

#[test]
fn test_payload_survives_wire() {
    let payload = sample();

    let decoded = GossipPayload::from_json(&payload.to_json().unwrap()).unwrap();

    assert_eq!(decoded, payload);
    assert_eq!(decoded.entity_count(), 3);
}

// ============================================================================
// DECODING
// ============================================================================

#[test]
fn test_untagged_payload_defaults() {
    let raw = br#"{"commands": [], "esp_devices": [], "users": []}"#;

    let payload = GossipPayload::from_json(raw).unwrap();

    assert_eq!(payload.protocol_version, 1);
    assert_eq!(payload.sender, None);
    assert_eq!(payload.sender_name(), "unknown");
    assert_eq!(payload.version_vector, VersionVector::default());
}

#[test]
fn test_missing_collection_is_rejected() {
    let raw = br#"{"commands": [], "users": []}"#;

    assert!(matches!(
        GossipPayload::from_json(raw),
        Err(ProtocolError::DeserializationFailed(_))
    ));
}

#[test]
fn test_newer_protocol_version_is_rejected() {
    let raw = br#"{"protocol_version": 2, "commands": [], "esp_devices": [], "users": []}"#;

    assert!(matches!(
        GossipPayload::from_json(raw),
        Err(ProtocolError::UnsupportedVersion { got: 2, supported: 1 })
    ));
}

#[test]
fn test_one_bad_record_rejects_whole_payload() {
    let raw = br#"{
        "commands": [
            {"id": 1, "esp_id": "esp32_1", "command": "on", "updated_at": "2024-01-01T00:00:00Z"},
            {"id": "two", "esp_id": "esp32_1", "command": "off",
             "updated_at": "2024-01-01T00:00:00Z"}
        ],
        "esp_devices": [],
        "users": []
    }"#;

    assert!(GossipPayload::from_json(raw).is_err());
}

#[test]
fn test_garbage_is_rejected() {
    assert!(matches!(
        GossipPayload::from_json(b"not json"),
        Err(ProtocolError::DeserializationFailed(_))
    ));
}

#[test]
fn test_size_limit() {
    let bytes = sample().to_json().unwrap();

    assert!(matches!(
        GossipPayload::from_json_limited(&bytes, 10),
        Err(ProtocolError::MessageTooLarge { limit: 10, .. })
    ));
    assert!(GossipPayload::from_json_limited(&bytes, bytes.len()).is_ok());
}

// ============================================================================
// DIGEST
// ============================================================================

#[test]
fn test_digest_ignores_order_and_metadata() {
    let a = sample();
    let mut b = a.clone();
    b.sender = Some("node-b".to_string());
    b.version_vector.observe(EntityKind::User, a.users[0].updated_at);

    let mut extra = Command::new("esp32_1", "off");
    extra.id = 2;
    let mut c = a.clone();
    c.commands.push(extra.clone());
    let mut d = a.clone();
    d.commands.insert(0, extra);

    assert_eq!(a.state_digest(), b.state_digest());
    assert_eq!(c.state_digest(), d.state_digest());
    assert_ne!(a.state_digest(), c.state_digest());
}
