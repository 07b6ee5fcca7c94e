use osb_domain::config::{Config, ConfigSeverity};

#[test]
fn default_broker_points_at_localhost() {
    let config = Config::default();
    assert_eq!(config.broker.url, "http://localhost:8080");
    assert!(config.broker.api_version.is_none());
    assert!(!config.broker.enable_alpha_features);
    assert!(config.validate().is_empty());
}

#[test]
fn default_polling_policy() {
    let config = Config::default();
    assert_eq!(config.polling.default_delay_secs, 5);
    assert_eq!(config.polling.max_error_retries, 3);
    assert!(config.polling.max_delay_secs.is_none());
}

#[test]
fn broker_section_parses() {
    let toml_str = r#"
[broker]
name = "mysql"
url = "https://broker.example.com/"
api_version = "2.14"
enable_alpha_features = true

[broker.auth.basic]
username = "admin"
password_env = "BROKER_PASSWORD"

[polling]
max_delay_secs = 30
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.broker.name, "mysql");
    assert_eq!(config.broker.api_version.as_deref(), Some("2.14"));
    assert!(config.broker.enable_alpha_features);
    let basic = config.broker.auth.as_ref().unwrap().basic.as_ref().unwrap();
    assert_eq!(basic.username, "admin");
    assert_eq!(basic.password_env.as_deref(), Some("BROKER_PASSWORD"));
    assert_eq!(config.polling.max_delay_secs, Some(30));
    assert_eq!(config.polling.default_delay_secs, 5);
}

#[test]
fn both_auth_kinds_is_an_error_issue() {
    let toml_str = r#"
[broker]
url = "https://broker.example.com"

[broker.auth.basic]
username = "u"
password = "p"

[broker.auth.bearer]
token = "t"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error && i.field == "broker.auth"));
}

#[test]
fn insecure_with_ca_is_an_error_issue() {
    let toml_str = r#"
[broker]
insecure_skip_verify = true
ca_file = "/etc/ssl/broker.pem"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let issues = config.validate();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].field, "broker.ca_file");
    assert!(issues[0].to_string().starts_with("[ERROR]"));
}

#[test]
fn plain_http_with_credentials_warns() {
    let toml_str = r#"
[broker.auth.bearer]
token = "t"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let issues = config.validate();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].severity, ConfigSeverity::Warning);
}
