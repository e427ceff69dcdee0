//! A small application runtime: component discovery, dependency wiring,
//! declarative routing with middleware chains, and plugins that extend all
//! of the above.

pub mod component;
pub mod config;
pub mod error;
pub mod extensibility;
pub mod http;
pub mod lifecycle;
pub mod middleware;
pub mod observability;
pub mod plugin;
pub mod routing;
pub mod server;

pub use config::schema::RuntimeConfig;
pub use http::HttpServer;
pub use lifecycle::{Application, Runtime, Shutdown};
pub use plugin::{Plugin, PluginManager};
pub use routing::Router;
