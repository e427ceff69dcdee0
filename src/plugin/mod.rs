//! Plugin SPI and lifecycle management.
//!
//! # Data Flow
//! ```text
//! explicit registration / plugin-marked types (phase 1)
//!     → PluginManager::register_handle (id uniqueness)
//!     → load_all: on_load(LoadContext) → extension handlers, middlewares,
//!       gateways; then server_configuration() claims
//!     → (components scanned and wired, routes registered)
//!     → start_all: on_start(StartContext)
//!     → optional transport takeover: serve(Takeover)
//!     → stop_all at shutdown
//! ```
//!
//! # Design Decisions
//! - A failing hook marks only that plugin `Failed`; a load failure also
//!   poisons its namespace so none of its components are wired
//! - Plugins are shared (`Arc`) and must synchronize any internal state

pub mod manager;

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::broadcast;

use crate::component::descriptor::{module_path_of, short_type_name};
use crate::component::Container;
use crate::config::RuntimeConfig;
use crate::error::BoxError;
use crate::extensibility::{ComponentHandler, ExtensionRegistry, ParameterHandler};
use crate::http::HttpServer;
use crate::middleware::{Middleware, MiddlewareRegistry};
use crate::routing::Router;
use crate::server::{Gateway, ServerConfiguration, ServerCustomizer};

pub use manager::{PluginManager, PluginState};

/// A runtime extension. Every method has a default; a plugin overrides what
/// it needs.
pub trait Plugin: Send + Sync + 'static {
    /// Unique across the process. Defaults to the full type name.
    fn id(&self) -> String {
        type_name::<Self>().to_string()
    }

    fn name(&self) -> String {
        short_type_name(type_name::<Self>()).to_string()
    }

    fn version(&self) -> String {
        "1.0.0".to_string()
    }

    /// Namespace scanned for this plugin's components.
    fn namespace(&self) -> String {
        module_path_of(type_name::<Self>()).to_string()
    }

    /// Whether this plugin starts the transport itself (see `serve`).
    fn initializes_server(&self) -> bool {
        false
    }

    fn on_load(&self, _ctx: &mut LoadContext<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    fn on_start(&self, _ctx: &StartContext<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    fn on_stop(&self) {}

    /// Consulted once, right after a successful `on_load`.
    fn server_configuration(&self) -> Option<ServerConfiguration> {
        None
    }

    /// Run the transport. Only called on the plugin that takes over.
    fn serve(&self, _takeover: Takeover) -> BoxFuture<'static, Result<(), BoxError>> {
        let id = self.id();
        Box::pin(async move { Err(format!("plugin '{id}' declares no transport").into()) })
    }
}

/// A registered plugin: the trait object plus enough type information for
/// typed lookup.
#[derive(Clone)]
pub struct PluginHandle {
    plugin: Arc<dyn Plugin>,
    any: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHandle")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

impl PluginHandle {
    pub fn new<P: Plugin>(plugin: Arc<P>) -> Self {
        Self {
            plugin: plugin.clone(),
            any: plugin,
            type_id: TypeId::of::<P>(),
            type_name: type_name::<P>(),
        }
    }

    pub fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.plugin
    }

    pub fn downcast<P: Plugin>(&self) -> Option<Arc<P>> {
        self.any.clone().downcast::<P>().ok()
    }

    /// Same allocation, not merely the same type.
    pub fn same_instance(&self, other: &PluginHandle) -> bool {
        Arc::ptr_eq(&self.any, &other.any)
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// `name vVersion`, as used in conflict reports.
    pub fn identity(&self) -> String {
        format!("{} v{}", self.plugin.name(), self.plugin.version())
    }
}

/// What a plugin may contribute while loading.
pub struct LoadContext<'a> {
    plugin_id: &'a str,
    extensions: &'a mut ExtensionRegistry,
    middlewares: &'a mut MiddlewareRegistry,
    customizer: &'a mut ServerCustomizer,
    config: &'a RuntimeConfig,
}

impl<'a> LoadContext<'a> {
    pub fn new(
        plugin_id: &'a str,
        extensions: &'a mut ExtensionRegistry,
        middlewares: &'a mut MiddlewareRegistry,
        customizer: &'a mut ServerCustomizer,
        config: &'a RuntimeConfig,
    ) -> Self {
        Self {
            plugin_id,
            extensions,
            middlewares,
            customizer,
            config,
        }
    }

    pub fn plugin_id(&self) -> &str {
        self.plugin_id
    }

    pub fn register_component_handler(&mut self, handler: Arc<dyn ComponentHandler>) {
        self.extensions.register_component_handler(handler);
    }

    pub fn register_parameter_handler(&mut self, handler: Arc<dyn ParameterHandler>) {
        self.extensions.register_parameter_handler(handler);
    }

    pub fn register_middleware(&mut self, name: impl Into<String>, middleware: Arc<dyn Middleware>) {
        self.middlewares.register(name, middleware);
    }

    pub fn register_gateway(&mut self, gateway: Arc<dyn Gateway>) {
        self.customizer.register_gateway(gateway);
    }

    pub fn config(&self) -> &RuntimeConfig {
        self.config
    }
}

/// Read-only view of the wired application, handed to `on_start`.
pub struct StartContext<'a> {
    container: &'a Container,
    router: &'a Router,
    config: &'a RuntimeConfig,
}

impl<'a> StartContext<'a> {
    pub fn new(container: &'a Container, router: &'a Router, config: &'a RuntimeConfig) -> Self {
        Self {
            container,
            router,
            config,
        }
    }

    /// A wired singleton, if one exists.
    pub fn component<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.container.get::<T>()
    }

    pub fn container(&self) -> &Container {
        self.container
    }

    pub fn router(&self) -> &Router {
        self.router
    }

    pub fn config(&self) -> &RuntimeConfig {
        self.config
    }
}

/// Everything a plugin needs to run the transport itself.
pub struct Takeover {
    /// The default transport, already carrying claims and gateways.
    pub server: HttpServer,
    pub router: Arc<Router>,
    pub host: String,
    pub port: u16,
    pub shutdown: broadcast::Receiver<()>,
}

impl fmt::Debug for Takeover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Takeover")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}
