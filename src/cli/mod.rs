//! Command-line interface for certificate management, route inspection and serving

pub mod cert;
pub mod routes;
pub mod server;

pub use cert::CertCommand;
pub use routes::RoutesCommand;
pub use server::ServerArgs;
