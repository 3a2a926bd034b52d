//! # Models Module
//!
//! API request and response structures for the REST boundary.

pub mod requests;
pub mod responses;

pub use requests::*;
pub use responses::*;
