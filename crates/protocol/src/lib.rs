//! `osb-protocol`: the version-gated Open Service Broker protocol engine.
//!
//! This crate performs no I/O. It provides:
//! - [`ApiVersion`], the ordered registry of supported revisions.
//! - Typed request/response messages for every operation ([`types`]).
//! - [`gating::FIELD_GATES`], the declarative table of version- and
//!   alpha-gated fields.
//! - [`build_request`], which shapes a typed request into a
//!   [`RequestDescriptor`] (method, URL, query, headers, body).
//! - [`interpret`] and friends, which classify a [`TransportResponse`]
//!   into an [`OperationOutcome`] or a broker error.
//!
//! # Usage
//!
//! ```rust,ignore
//! let ctx = RequestContext {
//!     base_url: "https://broker.example.com",
//!     negotiated: Negotiated::new(ApiVersion::V2_14, false),
//!     credential: None,
//!     extra_query: &[],
//! };
//! let req = build_request(OperationRequest::GetCatalog, &ctx)?;
//! // ... send `req` with any transport ...
//! let catalog: CatalogResponse =
//!     interpret_sync(&resp, Operation::GetCatalog, ctx.negotiated)?;
//! ```

pub mod gating;
pub mod identity;
pub mod operation;
pub mod request;
pub mod response;
pub mod types;
pub mod version;

pub use gating::Negotiated;
pub use identity::OriginatingIdentity;
pub use operation::{HttpMethod, Operation};
pub use request::{build_request, OperationRequest, RequestContext, RequestDescriptor};
pub use response::{
    interpret, interpret_last_operation, interpret_sync, OperationOutcome, ResponseContext,
    TransportResponse,
};
pub use version::ApiVersion;
