//! Configuration loading and validation tests
//!
//! Tests focus on the observable outcome of loading a file: the values a
//! session will run with, or the error that stops it from starting.

use mqttms::config::{ConfigError, MsConfig};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let temp_file = write_config(
        r#"
[mqtt]
host = "broker.example"
port = 1884
username = "master"
password = "pw"
client_id = "bench"

[ms]
client_mac = "AABBCCDDEEFF"
server_mac = "112233445566"
timeout_ms = 2500
"#,
    );

    let config = MsConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.mqtt.host, "broker.example");
    assert_eq!(config.mqtt.port, 1884);
    assert_eq!(config.mqtt.credentials(), Some(("master", "pw")));
    assert_eq!(config.mqtt.client_id, "bench");
    assert_eq!(config.ms.client_mac, "AABBCCDDEEFF");
    assert_eq!(config.ms.response_timeout(), Duration::from_millis(2500));
}

#[test]
fn test_missing_sections_use_defaults() {
    let temp_file = write_config(
        r#"
[ms]
server_mac = "AABBCCDDEEFF"
"#,
    );

    let config = MsConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.mqtt.host, "localhost");
    assert_eq!(config.mqtt.port, 1883);
    assert_eq!(config.mqtt.connect_timeout(), Duration::from_secs(15));
    assert_eq!(config.mqtt.long_payload, 25);
    assert_eq!(config.ms.client_mac, "1234567890AB");
    assert_eq!(config.ms.server_mac, "AABBCCDDEEFF");
    assert!(!config.logging.verbose);
}

#[test]
fn test_missing_file_is_a_read_error() {
    let result = MsConfig::load_from_file(Path::new("/nonexistent/mqttms.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_malformed_toml_is_a_parse_error() {
    let temp_file = write_config("[mqtt\nhost = ");
    let result = MsConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_invalid_mac_is_rejected() {
    let temp_file = write_config(
        r#"
[ms]
client_mac = "12:34:56:78:90:AB"
"#,
    );

    match MsConfig::load_from_file(temp_file.path()) {
        Err(ConfigError::InvalidMac { field, value }) => {
            assert_eq!(field, "ms.client_mac");
            assert_eq!(value, "12:34:56:78:90:AB");
        }
        other => panic!("expected InvalidMac, got {other:?}"),
    }
}

#[test]
fn test_out_of_range_values_are_rejected() {
    let cases = [
        "[mqtt]\nport = 0",
        "[mqtt]\nlong_payload = 5",
        "[mqtt]\nlong_payload = 40000",
        "[mqtt]\nqos = 2",
        "[mqtt]\ntimeout_ms = 0",
        "[mqtt]\nsubscribe_timeout_ms = 0",
        "[ms]\ntimeout_ms = 0",
        "[mqtt]\nhost = \"\"",
    ];

    for case in cases {
        let temp_file = write_config(case);
        let result = MsConfig::load_from_file(temp_file.path());
        assert!(
            matches!(result, Err(ConfigError::InvalidConfig(_))),
            "expected InvalidConfig for {case:?}, got {result:?}"
        );
    }
}

#[test]
fn test_bad_topic_templates_are_rejected() {
    let cases = [
        r#"cmd_topic = "@/server_mac/CMD""#,
        r#"cmd_topic = "@/server_mac/format/CMD""#,
        r#"rsp_topic = "@/server_mac/RSP/format""#,
        r#"rsp_topic = "a/@/client_mac/RSP/format""#,
    ];

    for case in cases {
        let temp_file = write_config(&format!("[ms]\n{case}"));
        let result = MsConfig::load_from_file(temp_file.path());
        assert!(
            matches!(result, Err(ConfigError::Template(_))),
            "expected Template error for {case:?}, got {result:?}"
        );
    }
}

#[test]
fn test_shipped_sample_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/mqttms.toml");
    let config = MsConfig::load_from_file(&path).unwrap();
    assert_eq!(config, MsConfig::default());
}
