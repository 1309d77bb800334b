//! Wisp API boundary
//!
//! Request/response shapes for the presence status endpoint
//! (`GET`/`PUT /presence/{userId}/status`) and the mapping from core errors
//! to HTTP status codes and error bodies. Routing and access-token
//! authentication live in front of this crate; callers hand in an already
//! authenticated user.

pub mod error;
pub mod status;

pub use error::*;
pub use status::*;
