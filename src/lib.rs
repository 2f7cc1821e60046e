//! Route Rewrite Proxy - an intercepting HTTP/HTTPS forward proxy that
//! redirects selected host/path pairs to configured targets.
//!
//! Requests flow through an [`AddonChain`]; the [`Router`] addon matches them
//! against a [`RouteTable`] loaded from configuration and rewrites matches in
//! place. Everything else passes through untouched.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod proxy;
pub mod router;
pub mod tls;
pub mod utils;

// Re-export commonly used items
pub use config::settings::ProxyConfig;
pub use error::{Error, Result};
pub use logging::init_logger_with_config;
pub use models::{Headers, InterceptedRequest, InterceptedResponse, Scheme};
pub use proxy::{Addon, AddonChain, ProxyServer};
pub use router::{RouteRule, RouteTable, Router};

/// Runtime utilities for creating single-threaded vs multi-threaded Tokio runtimes
pub mod runtime {
    use crate::config::settings::RuntimeConfig;
    use anyhow::{Context, Result};
    use tokio::runtime::{Builder, Runtime};
    use tracing::{info, warn};

    /// Create a Tokio runtime based on the configuration
    pub fn create_runtime(config: &RuntimeConfig) -> Result<Runtime> {
        match config.mode.as_str() {
            "single_threaded" => {
                info!("🧵 Initializing single-threaded runtime");
                Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .context("Failed to create single-threaded runtime")
            }
            mode => {
                if mode != "multi_threaded" {
                    warn!("⚠️  Unknown runtime mode '{}', defaulting to multi-threaded", mode);
                }

                let mut builder = Builder::new_multi_thread();
                builder.enable_all();
                match config.worker_threads {
                    Some(threads) if threads > 0 => {
                        info!("🧵 Initializing multi-threaded runtime with {} worker threads", threads);
                        builder.worker_threads(threads);
                    }
                    _ => info!("🧵 Initializing multi-threaded runtime with auto-detected CPU cores"),
                }

                builder.build().context("Failed to create multi-threaded runtime")
            }
        }
    }

    /// Execute an async function with the configured runtime
    pub fn run_with_runtime<F, T>(config: &RuntimeConfig, future: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        let runtime = create_runtime(config)?;
        runtime.block_on(future)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_single_threaded_runtime_runs_future() {
            let config = RuntimeConfig {
                mode: "single_threaded".to_string(),
                worker_threads: None,
            };
            let value = run_with_runtime(&config, async { Ok(21 * 2) }).unwrap();
            assert_eq!(value, 42);
        }

        #[test]
        fn test_multi_threaded_runtime_with_workers() {
            let config = RuntimeConfig {
                mode: "multi_threaded".to_string(),
                worker_threads: Some(2),
            };
            assert!(create_runtime(&config).is_ok());
        }
    }
}
