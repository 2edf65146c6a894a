//! HTTP transport
//!
//! reqwest implementation of the executor seam used by the runners.

mod client;

pub use client::{redirect_policy, HttpClient, DEFAULT_MAX_REDIRECTS};
