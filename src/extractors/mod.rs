//! Request extractors.

mod context;
pub use context::{Principal, RequestContext, REQUEST_ID_HEADER};
