//! Registry communication over the Distribution API v2.

mod client;

pub use client::{RegistryClient, RegistryClientBuilder};
