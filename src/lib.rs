//! # Restive - a resilient REST-platform call engine
//!
//! Restive is the call/batch/pagination core of a client SDK for a
//! resource-oriented REST platform. It turns one logical operation into
//! correctly sequenced network calls: it packs method calls into server-side
//! batches under the hard 50-command limit, paginates large result sets by
//! offset or by ID cursor, classifies failures into a typed error taxonomy,
//! and transparently recovers from expired tokens and cross-host portal
//! moves.
//!
//! ## Quick Start
//!
//! ```no_run
//! use restive::{Client, Credential, ListFastOptions};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> restive::Result<()> {
//!     let client = Client::builder()
//!         .credential(Credential::webhook("example.portal.com", "17/abc123xyz"))
//!         .build()?;
//!
//!     // One logical call.
//!     let deal = client.call("crm.deal.get", json!({"id": 7})).await?;
//!     println!("deal: {}", deal.result);
//!
//!     // Every page of a list, batched 50 offsets per round-trip.
//!     let deals = client
//!         .call_list("crm.deal.list", json!({"filter": {"STAGE_ID": "NEW"}}))
//!         .await?;
//!     println!("{} deals", deals.len());
//!
//!     // The same without a total-count query, via ID cursor rounds.
//!     let all = client
//!         .call_list_fast("crm.deal.list", json!({}), &ListFastOptions::new())
//!         .await?;
//!     println!("{} deals", all.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Entry points
//!
//! - [`Client::call`] - one logical operation, returning an [`ApiEnvelope`].
//! - [`Client::call_batch`] / [`Client::call_batches`] - pack method calls
//!   into server-side batches; the chunked variant has no size ceiling.
//! - [`Client::call_list`] - offset pagination driven by `next`/`total`.
//! - [`Client::call_list_fast`] - cursor pagination over a monotonic
//!   identifier field, chaining sub-queries server-side.
//!
//! ## Error handling
//!
//! All failures arrive as one [`Error`]: transport errors, decode errors
//! specialized by HTTP status, and [`ApiError`] for platform-reported
//! failures with an exhaustively matchable [`ApiErrorKind`]. Batch calls
//! never raise on per-command failure; inspect
//! [`BatchEnvelope::result_error`] instead.
//!
//! ```no_run
//! use restive::{ApiErrorKind, Error};
//! # async fn example(client: restive::Client) {
//! match client.call("crm.deal.get", serde_json::json!({"id": 1})).await {
//!     Ok(envelope) => println!("{}", envelope.result),
//!     Err(Error::Api(api)) if api.kind == ApiErrorKind::AccessDenied => {
//!         eprintln!("no access: {}", api.record.description);
//!     }
//!     Err(e) => eprintln!("call failed: {e}"),
//! }
//! # }
//! ```
//!
//! ## Recovery
//!
//! The credential guard inside [`Client`] recovers from exactly two failure
//! kinds, each at most once per invocation: an expired access token (for
//! token credentials with refresh enabled) and a redirect to a different
//! host (the portal moved). Register [`ClientBuilder::on_token_renewed`] and
//! [`ClientBuilder::on_domain_changed`] to persist the updated credential.

mod batch;
mod classify;
mod client;
mod command;
mod config;
mod credential;
mod envelope;
mod error;
mod list;
mod list_fast;
mod retry;
mod transport;

pub use client::{Client, ClientBuilder};
pub use command::{BatchCommands, MethodCall};
pub use config::{ClientConfig, DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT, MAX_BATCH_SIZE};
pub use credential::{Credential, TokenPair};
pub use envelope::{ApiEnvelope, BatchEnvelope, TimeInfo};
pub use error::{ApiError, ApiErrorKind, Error, ErrorRecord, Result};
pub use list_fast::ListFastOptions;
pub use retry::RetryPolicy;
