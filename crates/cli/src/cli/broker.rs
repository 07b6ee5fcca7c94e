//! Broker commands: build the typed request, call the client, print JSON.

use anyhow::Context;
use osb_client::{
    BrokerClient, LastOperationPoller, PollCompletion, PollPolicy, PollState, PollTarget,
};
use osb_domain::config::Config;
use osb_protocol::types::*;
use osb_protocol::{ApiVersion, Operation, OperationOutcome};
use serde::Serialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::{AsyncArgs, Command};

/// Run one broker command and print its result as pretty JSON.
pub async fn run(config: &Config, command: Command) -> anyhow::Result<()> {
    if let Command::Versions = command {
        let output = versions(configured_version(config)?);
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let client = BrokerClient::new(&config.broker).context("building broker client")?;
    let policy = PollPolicy::from(&config.polling);
    let output = execute(&client, &policy, command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    if output.get("state").and_then(Value::as_str) == Some(PollState::Failed.as_str()) {
        anyhow::bail!("operation failed");
    }
    Ok(())
}

/// Execute a broker command and return what should be printed.
pub async fn execute(
    client: &BrokerClient,
    policy: &PollPolicy,
    command: Command,
) -> anyhow::Result<Value> {
    match command {
        Command::Catalog => to_json(&client.get_catalog().await?),

        Command::Provision {
            instance_id,
            service_id,
            plan_id,
            organization_guid,
            space_guid,
            body,
            mode,
            identity,
        } => {
            let req = ProvisionRequest {
                instance_id,
                accepts_incomplete: mode.accepts_incomplete(),
                service_id,
                plan_id,
                organization_guid,
                space_guid,
                parameters: body.parameters()?,
                context: body.context()?,
                originating_identity: identity.resolve()?,
            };
            let outcome = client.provision_instance(&req).await?;
            let target = PollTarget::provision(&req, outcome.operation_key().cloned());
            finish(client, policy, &mode, outcome, target).await
        }

        Command::Update {
            instance_id,
            service_id,
            plan_id,
            previous_plan_id,
            body,
            mode,
            identity,
        } => {
            let req = UpdateInstanceRequest {
                instance_id,
                accepts_incomplete: mode.accepts_incomplete(),
                service_id,
                plan_id,
                parameters: body.parameters()?,
                previous_values: previous_plan_id.map(|p| PreviousValues {
                    plan_id: Some(p),
                    ..Default::default()
                }),
                context: body.context()?,
                originating_identity: identity.resolve()?,
            };
            let outcome = client.update_instance(&req).await?;
            let target = PollTarget::update(&req, outcome.operation_key().cloned());
            finish(client, policy, &mode, outcome, target).await
        }

        Command::Deprovision {
            instance_id,
            service_id,
            plan_id,
            mode,
            identity,
        } => {
            let req = DeprovisionRequest {
                instance_id,
                accepts_incomplete: mode.accepts_incomplete(),
                service_id,
                plan_id,
                originating_identity: identity.resolve()?,
            };
            let outcome = client.deprovision_instance(&req).await?;
            let target = PollTarget::deprovision(&req, outcome.operation_key().cloned());
            finish(client, policy, &mode, outcome, target).await
        }

        Command::GetInstance {
            instance_id,
            service_id,
            plan_id,
            identity,
        } => {
            let req = GetInstanceRequest {
                instance_id,
                service_id,
                plan_id,
                originating_identity: identity.resolve()?,
            };
            to_json(&client.get_instance(&req).await?)
        }

        Command::Bind {
            instance_id,
            binding_id,
            service_id,
            plan_id,
            app_guid,
            body,
            mode,
            identity,
        } => {
            let req = BindRequest {
                binding_id,
                instance_id,
                accepts_incomplete: mode.accepts_incomplete(),
                service_id,
                plan_id,
                bind_resource: app_guid.clone().map(|guid| BindResource {
                    app_guid: Some(guid),
                    route: None,
                }),
                app_guid,
                parameters: body.parameters()?,
                context: body.context()?,
                originating_identity: identity.resolve()?,
            };
            let outcome = client.bind(&req).await?;
            let target = PollTarget::bind(&req, outcome.operation_key().cloned());
            finish(client, policy, &mode, outcome, target).await
        }

        Command::RotateBinding {
            instance_id,
            binding_id,
            predecessor_binding_id,
            mode,
            identity,
        } => {
            let req = RotateBindingRequest {
                instance_id,
                binding_id,
                accepts_incomplete: mode.accepts_incomplete(),
                predecessor_binding_id,
                originating_identity: identity.resolve()?,
            };
            let outcome = client.rotate_binding(&req).await?;
            let target = PollTarget::rotate_binding(&req, outcome.operation_key().cloned());
            finish(client, policy, &mode, outcome, target).await
        }

        Command::Unbind {
            instance_id,
            binding_id,
            service_id,
            plan_id,
            mode,
            identity,
        } => {
            let req = UnbindRequest {
                instance_id,
                binding_id,
                accepts_incomplete: mode.accepts_incomplete(),
                service_id,
                plan_id,
                originating_identity: identity.resolve()?,
            };
            let outcome = client.unbind(&req).await?;
            let target = PollTarget::unbind(&req, outcome.operation_key().cloned());
            finish(client, policy, &mode, outcome, target).await
        }

        Command::GetBinding {
            instance_id,
            binding_id,
            identity,
        } => {
            let req = GetBindingRequest {
                instance_id,
                binding_id,
                originating_identity: identity.resolve()?,
            };
            to_json(&client.get_binding(&req).await?)
        }

        Command::LastOperation {
            instance_id,
            binding_id,
            service_id,
            plan_id,
            operation,
            wait,
            identity,
        } => {
            let operation_key = operation.map(OperationKey::from);
            let originating_identity = identity.resolve()?;
            let target = match binding_id {
                Some(binding_id) => PollTarget::binding(
                    BindingLastOperationRequest {
                        instance_id,
                        binding_id,
                        service_id,
                        plan_id,
                        operation_key,
                        originating_identity,
                    },
                    Operation::PollBindingLastOperation,
                ),
                None => PollTarget::instance(
                    LastOperationRequest {
                        instance_id,
                        service_id,
                        plan_id,
                        operation_key,
                        originating_identity,
                    },
                    Operation::PollLastOperation,
                ),
            };
            if wait {
                let done = poll(client, policy, target).await?;
                Ok(completion_json(&done))
            } else {
                let status = target.query(client).await?;
                Ok(last_operation_json(&status))
            }
        }

        Command::Versions => Ok(versions(client.version())),

        Command::Config(_) => anyhow::bail!("config commands do not talk to a broker"),
    }
}

/// Print the outcome, polling to completion when asked and the broker
/// went async.
async fn finish<T: Serialize>(
    client: &BrokerClient,
    policy: &PollPolicy,
    mode: &AsyncArgs,
    outcome: OperationOutcome<T>,
    target: PollTarget,
) -> anyhow::Result<Value> {
    match outcome {
        OperationOutcome::Sync(resp) => Ok(json!({
            "async": false,
            "response": serde_json::to_value(&resp)?,
        })),
        OperationOutcome::Gone => Ok(json!({"async": false, "gone": true})),
        OperationOutcome::Async {
            response,
            operation,
        } => {
            let mut out = json!({
                "async": true,
                "operation": operation.as_ref().map(OperationKey::as_str),
                "response": serde_json::to_value(&response)?,
            });
            if mode.wait {
                let done = poll(client, policy, target).await?;
                if let Some(obj) = out.as_object_mut() {
                    obj.extend(completion_json(&done).as_object().cloned().unwrap_or_default());
                }
            }
            Ok(out)
        }
    }
}

async fn poll(
    client: &BrokerClient,
    policy: &PollPolicy,
    target: PollTarget,
) -> anyhow::Result<PollCompletion> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; abandoning poll");
            on_signal.cancel();
        }
    });

    let mut poller = LastOperationPoller::new(client.clone(), target, policy.clone());
    let result = poller.run(&cancel).await;
    watcher.abort();
    Ok(result?)
}

fn to_json<T: Serialize>(value: &T) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn last_operation_json(status: &LastOperationResponse) -> Value {
    let mut out = serde_json::to_value(status).unwrap_or_else(|_| json!({}));
    if let (Some(obj), Some(delay)) = (out.as_object_mut(), status.poll_delay) {
        obj.insert("retry_after_secs".into(), json!(delay.as_secs()));
    }
    out
}

fn completion_json(done: &PollCompletion) -> Value {
    json!({
        "state": done.state.as_str(),
        "description": done.description,
        "queries": done.queries,
    })
}

/// The version named in the config, or the latest when none is set.
fn configured_version(config: &Config) -> anyhow::Result<ApiVersion> {
    match config.broker.api_version.as_deref() {
        Some(label) => label
            .parse()
            .with_context(|| format!("broker.api_version '{label}'")),
        None => Ok(ApiVersion::latest()),
    }
}

fn versions(configured: ApiVersion) -> Value {
    let rows: Vec<Value> = ApiVersion::all()
        .iter()
        .map(|v| {
            json!({
                "version": v.label(),
                "latest": *v == ApiVersion::latest(),
                "configured": *v == configured,
            })
        })
        .collect();
    Value::Array(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn versions_marks_configured_and_latest() {
        let v = versions(ApiVersion::V2_13);
        let rows = v.as_array().unwrap();
        assert_eq!(rows.len(), ApiVersion::all().len());
        assert_eq!(rows[2]["version"], "2.13");
        assert_eq!(rows[2]["configured"], true);
        assert_eq!(rows[6]["latest"], true);
        assert_eq!(rows[6]["configured"], false);
    }

    #[tokio::test]
    async fn versions_work_without_usable_credentials() {
        let config: Config = toml::from_str(
            r#"
[broker]
api_version = "2.12"
ca_file = "/nonexistent/osb-ca.pem"

[broker.auth.bearer]
token_env = "OSB_TEST_TOKEN_THAT_IS_NEVER_SET"
"#,
        )
        .unwrap();
        assert!(BrokerClient::new(&config.broker).is_err());
        run(&config, Command::Versions).await.unwrap();
        assert_eq!(configured_version(&config).unwrap(), ApiVersion::V2_12);
    }

    #[test]
    fn unknown_configured_version_is_reported() {
        let mut config = Config::default();
        config.broker.api_version = Some("9.9".into());
        let err = configured_version(&config).unwrap_err();
        assert!(err.to_string().contains("9.9"));
        config.broker.api_version = None;
        assert_eq!(configured_version(&config).unwrap(), ApiVersion::latest());
    }

    #[test]
    fn completion_output() {
        let done = PollCompletion {
            state: PollState::Succeeded,
            description: Some("ready".into()),
            queries: 3,
            last: None,
        };
        assert_eq!(
            completion_json(&done),
            json!({"state": "succeeded", "description": "ready", "queries": 3})
        );
    }

    #[test]
    fn last_operation_output_includes_hint() {
        let status = LastOperationResponse {
            state: LastOperationState::InProgress,
            description: None,
            instance_usable: None,
            update_repeatable: None,
            poll_delay: Some(Duration::from_secs(10)),
        };
        let out = last_operation_json(&status);
        assert_eq!(out["state"], "in progress");
        assert_eq!(out["retry_after_secs"], 10);
    }
}
