use agw_domain::config::{Config, ConfigSeverity};

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_ne!(config.server.port, config.server.rpc_port);
}

#[test]
fn default_ttls_match_contract() {
    let config = Config::default();
    assert_eq!(config.tokens.access_ttl_secs, 900);
    assert_eq!(config.tokens.challenge_ttl_secs, 300);
    assert_eq!(config.auth.otp.ttl_secs, 300);
    assert_eq!(config.auth.otp.cooldown_secs, 60);
}

#[test]
fn default_limits_match_contract() {
    let config = Config::default();
    assert_eq!(config.limits.signup.max, 5);
    assert_eq!(config.limits.signup.window_secs, 3600);
    assert_eq!(config.limits.signin.max, 10);
    assert_eq!(config.limits.signin.window_secs, 900);
    assert_eq!(config.limits.otp_send.max, 3);
    assert_eq!(config.limits.otp_send.window_secs, 600);
    assert_eq!(config.limits.api.max, 100);
}

#[test]
fn explicit_server_section_parses() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
port = 9000
rpc_port = 9001

[tokens]
access_secrets = ["0123456789abcdef0123456789abcdef"]
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.tokens.access_secrets.len(), 1);
}

#[test]
fn missing_secrets_error_in_production() {
    let mut config = Config::default();
    config.server.env = "production".into();
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error && i.field.contains("secrets")));
}

#[test]
fn port_collision_is_an_error() {
    let mut config = Config::default();
    config.server.rpc_port = config.server.port;
    let issues = config.validate();
    assert!(issues.iter().any(|i| i.severity == ConfigSeverity::Error));
}
