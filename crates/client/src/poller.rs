//! Drives a last-operation query to a terminal state.
//!
//! ```text
//! Started ──▶ Polling ──▶ Succeeded | Failed
//!                │
//!                └──────▶ Abandoned   (cancel token or deadline)
//! ```
//!
//! Cancellation is only observed between queries: a query already sent is
//! always allowed to complete.

use std::time::Duration;

use osb_domain::config::PollingConfig;
use osb_domain::error::{Error, Result};
use osb_domain::trace::TraceEvent;
use osb_protocol::types::*;
use osb_protocol::Operation;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::BrokerClient;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// What to poll
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq)]
enum Query {
    Instance(LastOperationRequest),
    Binding(BindingLastOperationRequest),
}

/// The status query for one asynchronous operation.
///
/// Built from the original request so every query repeats its service and
/// plan ids, identity, and the broker's operation key.
#[derive(Debug, Clone, PartialEq)]
pub struct PollTarget {
    query: Query,
    source: Operation,
}

impl PollTarget {
    /// Poll an instance, treating the source as `source` (which decides
    /// whether 410 Gone ends the poll successfully).
    pub fn instance(req: LastOperationRequest, source: Operation) -> Self {
        Self {
            query: Query::Instance(req),
            source,
        }
    }

    pub fn binding(req: BindingLastOperationRequest, source: Operation) -> Self {
        Self {
            query: Query::Binding(req),
            source,
        }
    }

    pub fn provision(req: &ProvisionRequest, key: Option<OperationKey>) -> Self {
        Self::instance(
            LastOperationRequest {
                instance_id: req.instance_id.clone(),
                service_id: Some(req.service_id.clone()),
                plan_id: Some(req.plan_id.clone()),
                operation_key: key,
                originating_identity: req.originating_identity.clone(),
            },
            Operation::ProvisionInstance,
        )
    }

    pub fn update(req: &UpdateInstanceRequest, key: Option<OperationKey>) -> Self {
        Self::instance(
            LastOperationRequest {
                instance_id: req.instance_id.clone(),
                service_id: Some(req.service_id.clone()),
                plan_id: req.plan_id.clone(),
                operation_key: key,
                originating_identity: req.originating_identity.clone(),
            },
            Operation::UpdateInstance,
        )
    }

    pub fn deprovision(req: &DeprovisionRequest, key: Option<OperationKey>) -> Self {
        Self::instance(
            LastOperationRequest {
                instance_id: req.instance_id.clone(),
                service_id: Some(req.service_id.clone()),
                plan_id: Some(req.plan_id.clone()),
                operation_key: key,
                originating_identity: req.originating_identity.clone(),
            },
            Operation::DeprovisionInstance,
        )
    }

    pub fn bind(req: &BindRequest, key: Option<OperationKey>) -> Self {
        Self::binding(
            BindingLastOperationRequest {
                instance_id: req.instance_id.clone(),
                binding_id: req.binding_id.clone(),
                service_id: Some(req.service_id.clone()),
                plan_id: Some(req.plan_id.clone()),
                operation_key: key,
                originating_identity: req.originating_identity.clone(),
            },
            Operation::Bind,
        )
    }

    pub fn rotate_binding(req: &RotateBindingRequest, key: Option<OperationKey>) -> Self {
        Self::binding(
            BindingLastOperationRequest {
                instance_id: req.instance_id.clone(),
                binding_id: req.binding_id.clone(),
                service_id: None,
                plan_id: None,
                operation_key: key,
                originating_identity: req.originating_identity.clone(),
            },
            Operation::RotateBinding,
        )
    }

    pub fn unbind(req: &UnbindRequest, key: Option<OperationKey>) -> Self {
        Self::binding(
            BindingLastOperationRequest {
                instance_id: req.instance_id.clone(),
                binding_id: req.binding_id.clone(),
                service_id: Some(req.service_id.clone()),
                plan_id: Some(req.plan_id.clone()),
                operation_key: key,
                originating_identity: req.originating_identity.clone(),
            },
            Operation::Unbind,
        )
    }

    /// The operation whose progress is being tracked.
    pub fn source(&self) -> Operation {
        self.source
    }

    pub fn operation_key(&self) -> Option<&OperationKey> {
        match &self.query {
            Query::Instance(r) => r.operation_key.as_ref(),
            Query::Binding(r) => r.operation_key.as_ref(),
        }
    }

    /// Issue one status query.
    pub async fn query(&self, client: &BrokerClient) -> Result<LastOperationResponse> {
        match &self.query {
            Query::Instance(req) => client.poll_last_operation(req).await,
            Query::Binding(req) => client.poll_binding_last_operation(req).await,
        }
    }

    fn status_operation(&self) -> Operation {
        match self.query {
            Query::Instance(_) => Operation::PollLastOperation,
            Query::Binding(_) => Operation::PollBindingLastOperation,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait used when the broker supplies no positive hint.
    pub default_delay: Duration,
    /// Ceiling for broker hints.
    pub max_delay: Option<Duration>,
    /// Consecutive transport/decode failures tolerated.
    pub max_error_retries: u32,
    /// Abandon the poll once this much time has passed since it started.
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for PollPolicy {
    fn from(cfg: &PollingConfig) -> Self {
        Self {
            default_delay: Duration::from_secs(cfg.default_delay_secs),
            max_delay: cfg.max_delay_secs.map(Duration::from_secs),
            max_error_retries: cfg.max_error_retries,
            deadline: cfg.timeout_secs.map(Duration::from_secs),
        }
    }
}

impl PollPolicy {
    /// Wait before the next query given the broker's hint.
    pub fn delay_for(&self, hint: Option<Duration>) -> Duration {
        let delay = hint
            .filter(|d| !d.is_zero())
            .unwrap_or(self.default_delay);
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Poller
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Started,
    Polling,
    Succeeded,
    Failed,
    Abandoned,
}

impl PollState {
    pub fn as_str(self) -> &'static str {
        match self {
            PollState::Started => "started",
            PollState::Polling => "polling",
            PollState::Succeeded => "succeeded",
            PollState::Failed => "failed",
            PollState::Abandoned => "abandoned",
        }
    }
}

/// How a poll ended when the broker reported a terminal state.
#[derive(Debug, Clone, PartialEq)]
pub struct PollCompletion {
    /// `Succeeded` or `Failed`.
    pub state: PollState,
    pub description: Option<String>,
    pub queries: u32,
    /// Final status; `None` when the poll ended on 410 Gone.
    pub last: Option<LastOperationResponse>,
}

pub struct LastOperationPoller {
    client: BrokerClient,
    target: PollTarget,
    policy: PollPolicy,
    state: PollState,
    queries: u32,
}

impl LastOperationPoller {
    pub fn new(client: BrokerClient, target: PollTarget, policy: PollPolicy) -> Self {
        Self {
            client,
            target,
            policy,
            state: PollState::Started,
            queries: 0,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Queries issued so far.
    pub fn queries(&self) -> u32 {
        self.queries
    }

    pub fn target(&self) -> &PollTarget {
        &self.target
    }

    /// Query until the broker reports `succeeded` or `failed`.
    ///
    /// Broker-reported failure is `Ok` with [`PollState::Failed`].
    /// Cancellation and deadline expiry are [`Error::PollCancelled`]; too
    /// many consecutive transport/decode failures are
    /// [`Error::PollExceededRetries`]. Any other error ends the poll as is.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<PollCompletion> {
        let deadline = self.policy.deadline.map(|d| Instant::now() + d);
        let mut consecutive_errors = 0u32;
        self.state = PollState::Polling;

        loop {
            if cancel.is_cancelled() {
                return Err(self.abandon(false));
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(self.abandon(true));
            }

            self.queries += 1;
            let delay = match self.target.query(&self.client).await {
                Ok(status) => {
                    consecutive_errors = 0;
                    match status.state {
                        LastOperationState::Succeeded => {
                            return Ok(self.complete(PollState::Succeeded, Some(status)));
                        }
                        LastOperationState::Failed => {
                            return Ok(self.complete(PollState::Failed, Some(status)));
                        }
                        LastOperationState::InProgress => {
                            let delay = self.policy.delay_for(status.poll_delay);
                            self.attempt(Some(status.state.as_str()), delay);
                            delay
                        }
                    }
                }
                Err(e) if self.target.source.gone_is_success() && is_gone(&e) => {
                    return Ok(self.complete(PollState::Succeeded, None));
                }
                Err(e) if is_retryable(&e) => {
                    consecutive_errors += 1;
                    if consecutive_errors > self.policy.max_error_retries {
                        self.finish(PollState::Failed, "retries_exhausted");
                        return Err(Error::PollExceededRetries {
                            attempts: consecutive_errors,
                            last: Box::new(e),
                        });
                    }
                    tracing::warn!(
                        broker = %self.client.name(),
                        operation = %self.target.source,
                        query = %self.target.status_operation(),
                        attempt = consecutive_errors,
                        error = %e,
                        "last-operation query failed; retrying"
                    );
                    let delay = self.policy.delay_for(None);
                    self.attempt(None, delay);
                    delay
                }
                Err(e) => {
                    self.finish(PollState::Failed, "error");
                    return Err(e);
                }
            };

            let mut wake = Instant::now() + delay;
            if let Some(d) = deadline {
                wake = wake.min(d);
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.abandon(false)),
                _ = tokio::time::sleep_until(wake) => {}
            }
        }
    }

    fn attempt(&self, state: Option<&str>, delay: Duration) {
        TraceEvent::PollAttempt {
            broker: self.client.name().to_owned(),
            operation: self.target.source.to_string(),
            attempt: self.queries,
            state: state.map(str::to_owned),
            next_delay_ms: Some(delay.as_millis() as u64),
        }
        .emit();
    }

    fn complete(&mut self, state: PollState, last: Option<LastOperationResponse>) -> PollCompletion {
        self.finish(state, state.as_str());
        PollCompletion {
            state,
            description: last.as_ref().and_then(|s| s.description.clone()),
            queries: self.queries,
            last,
        }
    }

    fn abandon(&mut self, deadline_elapsed: bool) -> Error {
        self.finish(PollState::Abandoned, PollState::Abandoned.as_str());
        tracing::info!(
            broker = %self.client.name(),
            operation = %self.target.source,
            queries = self.queries,
            deadline_elapsed,
            "polling abandoned"
        );
        Error::PollCancelled {
            queries: self.queries,
            deadline_elapsed,
        }
    }

    fn finish(&mut self, state: PollState, outcome: &str) {
        self.state = state;
        TraceEvent::PollFinished {
            broker: self.client.name().to_owned(),
            operation: self.target.source.to_string(),
            outcome: outcome.to_owned(),
            queries: self.queries,
        }
        .emit();
    }
}

fn is_gone(e: &Error) -> bool {
    e.as_broker().is_some_and(|b| b.is_gone())
}

/// Transport failures and undecodable bodies are worth another query.
fn is_retryable(e: &Error) -> bool {
    e.is_transport() || e.as_broker().is_some_and(|b| b.is_decode_failure())
}

#[cfg(test)]
mod tests {
    use super::*;
    use osb_domain::error::HttpStatusCodeError;

    #[test]
    fn delay_prefers_positive_hints_and_clamps() {
        let policy = PollPolicy {
            max_delay: Some(Duration::from_secs(10)),
            ..Default::default()
        };
        assert_eq!(policy.delay_for(None), Duration::from_secs(5));
        assert_eq!(policy.delay_for(Some(Duration::ZERO)), Duration::from_secs(5));
        assert_eq!(policy.delay_for(Some(Duration::from_secs(2))), Duration::from_secs(2));
        assert_eq!(policy.delay_for(Some(Duration::from_secs(60))), Duration::from_secs(10));
    }

    #[test]
    fn policy_from_config() {
        let cfg = PollingConfig {
            default_delay_secs: 1,
            max_delay_secs: Some(30),
            max_error_retries: 7,
            timeout_secs: Some(600),
        };
        let policy = PollPolicy::from(&cfg);
        assert_eq!(policy.default_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Some(Duration::from_secs(30)));
        assert_eq!(policy.max_error_retries, 7);
        assert_eq!(policy.deadline, Some(Duration::from_secs(600)));
    }

    #[test]
    fn only_transport_and_decode_failures_retry() {
        assert!(is_retryable(&Error::transport("reset")));
        assert!(is_retryable(&Error::timeout("slow")));
        let decode = HttpStatusCodeError {
            status: 200,
            response_error: Some("EOF".into()),
            ..Default::default()
        };
        assert!(is_retryable(&Error::Broker(decode)));
        assert!(!is_retryable(&Error::Broker(HttpStatusCodeError::new(500))));
        assert!(!is_retryable(&Error::MissingRequiredField("instanceID")));
    }

    #[test]
    fn targets_carry_ids_and_key() {
        let req = UnbindRequest {
            instance_id: "i".into(),
            binding_id: "b".into(),
            service_id: "s".into(),
            plan_id: "p".into(),
            ..Default::default()
        };
        let target = PollTarget::unbind(&req, Some(OperationKey::from("op")));
        assert_eq!(target.source(), Operation::Unbind);
        assert_eq!(target.status_operation(), Operation::PollBindingLastOperation);
        assert_eq!(target.operation_key().unwrap().as_str(), "op");
        let Query::Binding(q) = &target.query else {
            panic!("expected binding query");
        };
        assert_eq!(q.service_id.as_deref(), Some("s"));
        assert_eq!(q.plan_id.as_deref(), Some("p"));
    }
}
