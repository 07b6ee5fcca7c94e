//! `osb-client`: async Open Service Broker client.
//!
//! [`BrokerClient`] exposes one method per broker operation on top of the
//! pure protocol engine in `osb-protocol`. Requests go through a
//! [`Transport`]; [`ReqwestTransport`] is the production implementation and
//! tests plug in scripted ones. [`LastOperationPoller`] follows an
//! asynchronous operation to its terminal state.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use osb_client::{BrokerClient, LastOperationPoller, PollPolicy, PollTarget};
//! use osb_domain::config::BrokerConfig;
//! use osb_protocol::types::ProvisionRequest;
//! use osb_protocol::OperationOutcome;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> osb_domain::error::Result<()> {
//! let client = BrokerClient::new(&BrokerConfig::default())?;
//! let req = ProvisionRequest {
//!     instance_id: "inst-1".into(),
//!     accepts_incomplete: true,
//!     service_id: "svc".into(),
//!     plan_id: "small".into(),
//!     organization_guid: "org".into(),
//!     space_guid: "space".into(),
//!     ..Default::default()
//! };
//! if let OperationOutcome::Async { operation, .. } = client.provision_instance(&req).await? {
//!     let target = PollTarget::provision(&req, operation);
//!     let mut poller = LastOperationPoller::new(client, target, PollPolicy::default());
//!     let done = poller.run(&CancellationToken::new()).await?;
//!     println!("{:?}: {:?}", done.state, done.description);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod poller;
pub mod transport;

pub use client::BrokerClient;
pub use poller::{LastOperationPoller, PollCompletion, PollPolicy, PollState, PollTarget};
pub use transport::{ReqwestTransport, Transport};
