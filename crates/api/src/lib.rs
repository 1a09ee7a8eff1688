//! Public transfer API for Ferry
//!
//! This crate adapts the engine to a request/response surface:
//! - **TransferEndpoint**: export ("backup") and restore handlers
//! - **RequestContext**: caller identity and roles
//! - **ApiError**: HTTP status and JSON body for every failure
//!
//! The crate is transport-agnostic. A host HTTP server reads the request
//! body, builds a [`RequestContext`] from its session, and calls:
//!
//! ```ignore
//! use ferry_api::{RequestContext, TransferEndpoint};
//!
//! let ctx = RequestContext::admin("org-1", "user-7");
//! let resp = endpoint.request_export(&ctx, br#"{"scope":"tenant"}"#, &mut body)?;
//! for (name, value) in &resp.headers {
//!     response.set_header(name, value);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod transfer;

pub use context::RequestContext;
pub use error::{ApiError, ApiResult, ErrorBody};
pub use transfer::{ExportResponse, TransferEndpoint, ARCHIVE_CONTENT_TYPE, FILENAME_HEADER};
