//! Proxy server module

pub mod addon;
pub mod http_client;
pub mod server;

// Re-exports
pub use addon::{Addon, AddonChain};
pub use http_client::{HttpClient, UpstreamClient};
pub use server::{ProxyServer, ProxyState};
