pub mod broker;
pub mod config;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use osb_domain::config::Config;
use osb_protocol::types::JsonObject;
use osb_protocol::OriginatingIdentity;

/// osbctl: talk to an Open Service Broker from the command line.
#[derive(Debug, Parser)]
#[command(name = "osbctl", version, about)]
pub struct Cli {
    /// Config file (defaults to `OSB_CONFIG`, then `osb.toml`).
    #[arg(long, global = true)]
    pub config: Option<String>,
    /// Override `broker.url`.
    #[arg(long, global = true)]
    pub url: Option<String>,
    /// Override `broker.api_version` (e.g. 2.14).
    #[arg(long, global = true)]
    pub api_version: Option<String>,
    /// Enable alpha protocol features.
    #[arg(long, global = true)]
    pub alpha: bool,
    /// Log request and response bodies.
    #[arg(long, short, global = true)]
    pub verbose: bool,
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the broker catalog.
    Catalog,
    /// Provision a service instance.
    Provision {
        instance_id: String,
        #[arg(long)]
        service_id: String,
        #[arg(long)]
        plan_id: String,
        #[arg(long)]
        organization_guid: String,
        #[arg(long)]
        space_guid: String,
        #[command(flatten)]
        body: BodyArgs,
        #[command(flatten)]
        mode: AsyncArgs,
        #[command(flatten)]
        identity: IdentityArgs,
    },
    /// Update a service instance.
    Update {
        instance_id: String,
        #[arg(long)]
        service_id: String,
        /// New plan.
        #[arg(long)]
        plan_id: Option<String>,
        /// Plan the instance is on before the update.
        #[arg(long)]
        previous_plan_id: Option<String>,
        #[command(flatten)]
        body: BodyArgs,
        #[command(flatten)]
        mode: AsyncArgs,
        #[command(flatten)]
        identity: IdentityArgs,
    },
    /// Deprovision a service instance.
    Deprovision {
        instance_id: String,
        #[arg(long)]
        service_id: String,
        #[arg(long)]
        plan_id: String,
        #[command(flatten)]
        mode: AsyncArgs,
        #[command(flatten)]
        identity: IdentityArgs,
    },
    /// Fetch a service instance (2.14+).
    GetInstance {
        instance_id: String,
        #[arg(long)]
        service_id: Option<String>,
        #[arg(long)]
        plan_id: Option<String>,
        #[command(flatten)]
        identity: IdentityArgs,
    },
    /// Create a binding.
    Bind {
        instance_id: String,
        binding_id: String,
        #[arg(long)]
        service_id: String,
        #[arg(long)]
        plan_id: String,
        #[arg(long)]
        app_guid: Option<String>,
        #[command(flatten)]
        body: BodyArgs,
        #[command(flatten)]
        mode: AsyncArgs,
        #[command(flatten)]
        identity: IdentityArgs,
    },
    /// Create a binding that replaces an existing one (2.17+).
    RotateBinding {
        instance_id: String,
        binding_id: String,
        #[arg(long)]
        predecessor_binding_id: String,
        #[command(flatten)]
        mode: AsyncArgs,
        #[command(flatten)]
        identity: IdentityArgs,
    },
    /// Delete a binding.
    Unbind {
        instance_id: String,
        binding_id: String,
        #[arg(long)]
        service_id: String,
        #[arg(long)]
        plan_id: String,
        #[command(flatten)]
        mode: AsyncArgs,
        #[command(flatten)]
        identity: IdentityArgs,
    },
    /// Fetch a binding (2.14+).
    GetBinding {
        instance_id: String,
        binding_id: String,
        #[command(flatten)]
        identity: IdentityArgs,
    },
    /// Query the last operation of an instance, or of a binding with
    /// `--binding-id`.
    LastOperation {
        instance_id: String,
        #[arg(long)]
        binding_id: Option<String>,
        #[arg(long)]
        service_id: Option<String>,
        #[arg(long)]
        plan_id: Option<String>,
        /// Operation key returned by the broker.
        #[arg(long)]
        operation: Option<String>,
        /// Poll until the operation finishes.
        #[arg(long)]
        wait: bool,
        #[command(flatten)]
        identity: IdentityArgs,
    },
    /// List supported API versions.
    Versions,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

#[derive(Debug, Clone, Default, Args)]
pub struct AsyncArgs {
    /// Let the broker complete the operation asynchronously.
    #[arg(long = "async")]
    pub accepts_incomplete: bool,
    /// Poll an asynchronous operation to completion (implies --async).
    #[arg(long)]
    pub wait: bool,
}

impl AsyncArgs {
    pub fn accepts_incomplete(&self) -> bool {
        self.accepts_incomplete || self.wait
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct BodyArgs {
    /// Parameters as a JSON object, or `@path` to read one from a file.
    #[arg(long)]
    pub params: Option<String>,
    /// Platform context as a JSON object, or `@path`.
    #[arg(long)]
    pub context: Option<String>,
}

impl BodyArgs {
    pub fn parameters(&self) -> anyhow::Result<Option<JsonObject>> {
        parse_object("--params", self.params.as_deref())
    }

    pub fn context(&self) -> anyhow::Result<Option<JsonObject>> {
        parse_object("--context", self.context.as_deref())
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct IdentityArgs {
    /// Originating identity platform (e.g. cloudfoundry, kubernetes).
    #[arg(long, requires = "identity_value")]
    pub identity_platform: Option<String>,
    /// Originating identity value as JSON.
    #[arg(long, requires = "identity_platform")]
    pub identity_value: Option<String>,
}

impl IdentityArgs {
    pub fn resolve(&self) -> anyhow::Result<Option<OriginatingIdentity>> {
        match (&self.identity_platform, &self.identity_value) {
            (Some(platform), Some(value)) => {
                Ok(Some(OriginatingIdentity::new(platform.clone(), value.clone())?))
            }
            (None, None) => Ok(None),
            _ => anyhow::bail!("--identity-platform and --identity-value go together"),
        }
    }
}

/// Parse a JSON object given inline or as `@path`.
pub fn parse_object(flag: &str, raw: Option<&str>) -> anyhow::Result<Option<JsonObject>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let text = match raw.strip_prefix('@') {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("{flag}: reading {path}"))?
        }
        None => raw.to_owned(),
    };
    let obj = serde_json::from_str(&text)
        .with_context(|| format!("{flag}: expected a JSON object"))?;
    Ok(Some(obj))
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from `explicit`, else `OSB_CONFIG`, else
/// `osb.toml`. A missing file yields the defaults. Returns the parsed
/// [`Config`] and the path that was used.
pub fn load_config(explicit: Option<&str>) -> anyhow::Result<(Config, String)> {
    let config_path = match explicit {
        Some(p) => p.to_owned(),
        None => std::env::var("OSB_CONFIG").unwrap_or_else(|_| "osb.toml".into()),
    };

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {config_path}"))?;
        toml::from_str(&raw).with_context(|| format!("parsing {config_path}"))?
    } else {
        Config::default()
    };

    Ok((config, config_path))
}

impl Cli {
    /// Apply command-line overrides on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.broker.url = url.clone();
        }
        if let Some(v) = &self.api_version {
            config.broker.api_version = Some(v.clone());
        }
        if self.alpha {
            config.broker.enable_alpha_features = true;
        }
        if self.verbose {
            config.broker.verbose = true;
        }
    }
}
