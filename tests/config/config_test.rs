// Config Tests

use relaymesh::config::{ConfigError, NodeConfig};
use relaymesh::sync::GossipConfig;
use relaymesh::transport::{PeerAddress, TransportConfig};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_defaults() {
    let config = NodeConfig::default();

    assert_eq!(config.listen_address, "0.0.0.0:5000");
    assert_eq!(config.gossip.interval(), Duration::from_secs(60));
    assert_eq!(config.transport.request_timeout(), Duration::from_secs(5));
    assert!(config.peers.is_empty());
    assert!(config.validate().is_ok());
}

#[test]
fn test_empty_toml_yields_defaults() {
    assert_eq!(NodeConfig::from_toml_str("").unwrap(), NodeConfig::default());
}

#[test]
fn test_full_toml() {
    let raw = r#"
        node_name = "relay-a"
        listen_address = "127.0.0.1:7000"
        advertise_address = "10.0.0.1:7000"
        data_dir = "/var/lib/relay"
        peers = ["10.0.0.1:7000", "10.0.0.2:7000", "http://10.0.0.3:7000/"]
        log_level = "debug"

        [gossip]
        interval_secs = 15

        [transport]
        request_timeout_secs = 2
        max_payload_bytes = 1048576
    "#;

    let config = NodeConfig::from_toml_str(raw).unwrap();

    assert_eq!(config.node_name, "relay-a");
    assert_eq!(config.gossip.interval_secs, 15);
    assert!(config.gossip.enabled);
    assert_eq!(config.transport.request_timeout_secs, 2);
    assert_eq!(config.transport.connect_timeout_secs, 5);
    assert_eq!(config.transport.max_payload_bytes, 1 << 20);

    let peers = config.peer_selector().unwrap();
    assert_eq!(
        peers.peers(),
        &[
            PeerAddress::new("10.0.0.2", 7000),
            PeerAddress::new("10.0.0.3", 7000)
        ]
    );
}

#[test]
fn test_zero_interval_rejected() {
    let raw = "[gossip]\ninterval_secs = 0\n";

    assert!(matches!(
        NodeConfig::from_toml_str(raw),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_zero_timeout_rejected() {
    let config = NodeConfig::default()
        .with_transport(TransportConfig::default().with_request_timeout(0));

    assert!(matches!(config.validate(), Err(ConfigError::Transport(_))));
}

#[test]
fn test_bad_peer_rejected() {
    let config = NodeConfig::default().with_peers(vec!["no-port".to_string()]);

    assert!(config.validate().is_err());
}

#[test]
fn test_bad_listen_address_rejected() {
    let config = NodeConfig::default().with_listen_address("localhost");

    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_unknown_type_is_parse_error() {
    assert!(matches!(
        NodeConfig::from_toml_str("peers = 5"),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "node_name = \"from-file\"").unwrap();

    let config = NodeConfig::load(file.path()).unwrap();

    assert_eq!(config.node_name, "from-file");
}

#[test]
fn test_load_missing_file() {
    assert!(matches!(
        NodeConfig::load("/definitely/not/here.toml"),
        Err(ConfigError::Read { .. })
    ));
}

#[test]
fn test_load_or_default_without_path() {
    assert_eq!(NodeConfig::load_or_default(None).unwrap(), NodeConfig::default());
}

#[test]
fn test_builders() {
    let config = NodeConfig::new()
        .with_node_name("b")
        .with_advertise_address("10.0.0.9:5000")
        .with_peers(vec!["10.0.0.9:5000".to_string()])
        .with_gossip(GossipConfig::new().with_interval(5).with_enabled(false));

    assert!(config.validate().is_ok());
    assert!(config.peer_selector().unwrap().is_empty());
    assert!(!config.gossip.enabled);
}
