use std::io::Write;

use serial_test::serial;

use super::*;

const ENV_KEYS: [&str; 8] = [
    "SNIPBOX_BLOCKED_PACKAGES",
    "SNIPBOX_BLOCKED_CLASSES",
    "SNIPBOX_BLOCKED_METHODS",
    "SNIPBOX_TIMEOUT_MS",
    "SNIPBOX_STOP_GRACE_MS",
    "SNIPBOX_OUTPUT_MAX_BYTES",
    "SNIPBOX_AUDIT_ENABLED",
    "SNIPBOX_AUDIT_DESTINATION",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

fn write_config(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snipbox.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(f, "{content}").unwrap();
    (dir, path)
}

#[test]
fn defaults() {
    let config = Config::default();
    assert_eq!(config.blocked.packages, vec!["java.nio"]);
    assert_eq!(
        config.blocked.classes,
        vec!["java.io.File", "java.lang.Runtime", "java.lang.Thread"]
    );
    assert_eq!(
        config.blocked.methods,
        vec!["java.lang.System#exit", "java.lang.System#getenv"]
    );
    assert_eq!(config.execution.timeout_ms, 5_000);
    assert_eq!(config.execution.stop_grace_ms, 1_000);
    assert_eq!(config.output.encoding, "UTF-8");
    assert_eq!(config.output.initial_capacity, 3_200);
    assert_eq!(config.output.max_bytes, 65_536);
    assert!(!config.audit.enabled);
    assert_eq!(config.audit.destination, AuditDestination::Stdout);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn defaults_when_file_missing() {
    clear_env();
    let config = Config::load(Path::new("/nonexistent/snipbox.toml")).unwrap();
    assert_eq!(config.execution.timeout_ms, 5_000);
    assert!(config.blocked.packages.contains(&"java.nio".to_owned()));
    assert!(config.blocked.classes.contains(&"java.io.File".to_owned()));
}

#[test]
#[serial]
fn required_file_must_exist() {
    clear_env();
    let err = Config::load_required(Path::new("/nonexistent/snipbox.toml")).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Read { ref source, .. } if source.kind() == std::io::ErrorKind::NotFound
    ));
}

#[test]
#[serial]
fn required_file_loads_like_load() {
    let (_dir, path) = write_config(
        r"
[execution]
timeout_ms = 700
",
    );
    clear_env();

    let config = Config::load_required(&path).unwrap();
    assert_eq!(config.execution.timeout_ms, 700);
}

#[test]
#[serial]
fn omitted_blocked_lists_keep_defaults() {
    let (_dir, path) = write_config(
        r#"
[blocked]
classes = []
methods = "java.lang.Math#max"
"#,
    );
    clear_env();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.blocked.packages, vec!["java.nio"]);
    assert!(config.blocked.classes.is_empty());
    assert_eq!(config.blocked.methods, vec!["java.lang.Math#max"]);
}

#[test]
#[serial]
fn parse_comma_separated_lists() {
    let (_dir, path) = write_config(
        r#"
[blocked]
packages = "java.io, java.nio.file"
classes = "java.lang.Runtime"
methods = "java.lang.System#exit, java.lang.Thread#sleep"

[execution]
timeout_ms = 2000
"#,
    );
    clear_env();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.blocked.packages, vec!["java.io", "java.nio.file"]);
    assert_eq!(config.blocked.classes, vec!["java.lang.Runtime"]);
    assert_eq!(
        config.blocked.methods,
        vec!["java.lang.System#exit", "java.lang.Thread#sleep"]
    );
    assert_eq!(config.execution.timeout_ms, 2000);
    assert_eq!(config.execution.stop_grace_ms, 1_000);
}

#[test]
#[serial]
fn parse_array_lists() {
    let (_dir, path) = write_config(
        r#"
[blocked]
packages = ["java.io", " java.net "]
classes = []
"#,
    );
    clear_env();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.blocked.packages, vec!["java.io", "java.net"]);
    assert!(config.blocked.classes.is_empty());
}

#[test]
#[serial]
fn malformed_method_fails_load() {
    let (_dir, path) = write_config(
        r#"
[blocked]
methods = "java.lang.Systemexit"
"#,
    );
    clear_env();

    let err = Config::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::MalformedMethod { ref entry } if entry == "java.lang.Systemexit"));
}

#[test]
#[serial]
fn unsupported_encoding_fails_load() {
    let (_dir, path) = write_config(
        r#"
[output]
encoding = "Cp1252"
"#,
    );
    clear_env();

    let err = Config::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedEncoding(ref name) if name == "Cp1252"));
}

#[test]
#[serial]
fn invalid_toml_is_parse_error() {
    let (_dir, path) = write_config("[execution\ntimeout_ms = ");
    clear_env();

    assert!(matches!(
        Config::load(&path).unwrap_err(),
        ConfigError::Parse(_)
    ));
}

#[test]
fn zero_timeout_rejected() {
    let mut config = Config::default();
    config.execution.timeout_ms = 0;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn cap_below_capacity_rejected() {
    let mut config = Config::default();
    config.output.max_bytes = 100;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
#[serial]
fn env_overrides() {
    clear_env();
    let mut config = Config::default();

    unsafe {
        std::env::set_var("SNIPBOX_BLOCKED_CLASSES", "java.io.File, ,java.lang.Runtime");
        std::env::set_var("SNIPBOX_TIMEOUT_MS", "250");
        std::env::set_var("SNIPBOX_AUDIT_ENABLED", "true");
        std::env::set_var("SNIPBOX_AUDIT_DESTINATION", "/tmp/audit.jsonl");
    }
    config.apply_env_overrides();
    clear_env();

    assert_eq!(
        config.blocked.classes,
        vec!["java.io.File", "java.lang.Runtime"]
    );
    assert_eq!(config.execution.timeout_ms, 250);
    assert!(config.audit.enabled);
    assert_eq!(
        config.audit.destination,
        AuditDestination::File("/tmp/audit.jsonl".into())
    );
}

#[test]
#[serial]
fn env_override_invalid_number_ignored() {
    clear_env();
    let mut config = Config::default();

    unsafe { std::env::set_var("SNIPBOX_TIMEOUT_MS", "soon") };
    config.apply_env_overrides();
    unsafe { std::env::remove_var("SNIPBOX_TIMEOUT_MS") };

    assert_eq!(config.execution.timeout_ms, 5_000);
}

#[test]
#[serial]
fn env_override_beats_file() {
    let (_dir, path) = write_config(
        r"
[execution]
timeout_ms = 2000
",
    );
    clear_env();

    unsafe { std::env::set_var("SNIPBOX_TIMEOUT_MS", "300") };
    let config = Config::load(&path).unwrap();
    unsafe { std::env::remove_var("SNIPBOX_TIMEOUT_MS") };

    assert_eq!(config.execution.timeout_ms, 300);
}

#[test]
#[serial]
fn audit_destination_forms() {
    let (_dir, path) = write_config(
        r#"
[audit]
enabled = true
destination = "/var/log/snipbox/audit.jsonl"
"#,
    );
    clear_env();

    let config = Config::load(&path).unwrap();
    assert!(config.audit.enabled);
    assert_eq!(
        config.audit.destination,
        AuditDestination::File("/var/log/snipbox/audit.jsonl".into())
    );
    assert_eq!(
        config.audit.destination.to_string(),
        "/var/log/snipbox/audit.jsonl"
    );
    assert_eq!(AuditDestination::from(" STDOUT "), AuditDestination::Stdout);
    assert_eq!(AuditDestination::Stdout.to_string(), "stdout");
}
