//! Transport layer (HTTP).
//!
//! Turns proxy-authenticated HTTP requests into principals and calls, and
//! engine results into JSON responses.

pub mod http;
