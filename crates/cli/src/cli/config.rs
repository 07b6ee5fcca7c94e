use anyhow::Context;
use osb_domain::config::{Config, ConfigIssue, ConfigSeverity};
use osb_protocol::ApiVersion;

/// All issues with the config, including an unknown version label.
pub fn issues(config: &Config) -> Vec<ConfigIssue> {
    let mut issues = config.validate();
    if let Some(label) = &config.broker.api_version {
        if label.parse::<ApiVersion>().is_err() {
            let known: Vec<&str> = ApiVersion::all().iter().map(|v| v.label()).collect();
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "broker.api_version".into(),
                message: format!("unknown version '{label}' (supported: {})", known.join(", ")),
            });
        }
    }
    issues
}

/// Parse and validate the config, printing any issues.
///
/// Returns `false` when errors are found.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = issues(config);

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }

    println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");

    error_count == 0
}

/// Dump the resolved config as TOML with inline secrets masked.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let output = toml::to_string_pretty(&masked(config)).context("serializing config")?;
    print!("{output}");
    Ok(())
}

fn masked(config: &Config) -> Config {
    let mut config = config.clone();
    if let Some(auth) = config.broker.auth.as_mut() {
        if let Some(basic) = auth.basic.as_mut() {
            if basic.password.is_some() {
                basic.password = Some("***".into());
            }
        }
        if let Some(bearer) = auth.bearer.as_mut() {
            if bearer.token.is_some() {
                bearer.token = Some("***".into());
            }
        }
    }
    config
}
