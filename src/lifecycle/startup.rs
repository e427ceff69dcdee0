//! Startup orchestration.
//!
//! # Responsibilities
//! - Collect explicit plugins, component sources and built-in extensions
//! - Run the two-phase bootstrap: plugins first, then components
//! - Wire the container and the route table, then start plugins
//! - Hand the finished runtime to the default transport or a plugin
//!
//! # Design Decisions
//! - Fail fast: configuration, duplicate explicit plugins, construction and
//!   route errors are fatal
//! - Plugin hook failures are isolated to the plugin and its namespace
//! - Listeners start last (traffic only when the route table is final)

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::net::TcpListener;

use crate::component::{
    classify, within_namespace, ComponentKind, ComponentScanner, ComponentSource, ComponentType,
    Container,
};
use crate::config::RuntimeConfig;
use crate::error::{guard, panic_message, BootstrapError};
use crate::extensibility::{ComponentHandler, ExtensionRegistry, ParameterHandler};
use crate::http::{Codec, HttpServer, JsonCodec};
use crate::lifecycle::Shutdown;
use crate::middleware::{Middleware, MiddlewareRegistry};
use crate::plugin::{Plugin, PluginHandle, PluginManager, StartContext, Takeover};
use crate::routing::Router;
use crate::server::{Gateway, ServerCustomizer};

/// Builder for an application.
pub struct Application {
    config: RuntimeConfig,
    scanner: ComponentScanner,
    extensions: ExtensionRegistry,
    middlewares: MiddlewareRegistry,
    plugins: Vec<PluginHandle>,
    codec: Arc<dyn Codec>,
}

impl Application {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            scanner: ComponentScanner::new(),
            extensions: ExtensionRegistry::new(),
            middlewares: MiddlewareRegistry::new(),
            plugins: Vec::new(),
            codec: Arc::new(JsonCodec),
        }
    }

    /// Add a place to discover components and plugins from.
    pub fn source(mut self, source: impl ComponentSource + 'static) -> Self {
        self.scanner.add_source(Arc::new(source));
        self
    }

    /// Register a plugin explicitly. Explicit plugins are registered before
    /// discovery, in call order.
    pub fn plugin<P: Plugin>(self, plugin: P) -> Self {
        self.shared_plugin(Arc::new(plugin))
    }

    pub fn shared_plugin<P: Plugin>(mut self, plugin: Arc<P>) -> Self {
        self.plugins.push(PluginHandle::new(plugin));
        self
    }

    pub fn middleware(mut self, name: impl Into<String>, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.register(name, middleware);
        self
    }

    pub fn component_handler(mut self, handler: Arc<dyn ComponentHandler>) -> Self {
        self.extensions.register_component_handler(handler);
        self
    }

    pub fn parameter_handler(mut self, handler: Arc<dyn ParameterHandler>) -> Self {
        self.extensions.register_parameter_handler(handler);
        self
    }

    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Discover, load, wire and start everything. The returned runtime has
    /// a final route table and is ready to serve.
    pub fn bootstrap(self) -> Result<Runtime, BootstrapError> {
        let Application {
            config,
            scanner,
            mut extensions,
            mut middlewares,
            plugins: explicit,
            codec,
        } = self;
        let root = config.application.namespace.clone();
        tracing::info!(
            application = %config.application.name,
            namespace = %root,
            "Starting application"
        );

        let mut plugins = PluginManager::new();
        for handle in explicit {
            plugins.register_handle(handle)?;
        }

        // Phase 1: plugins only.
        let discovered = plugins.discover(&scanner.types(&root));
        tracing::info!(explicit = plugins.len() - discovered, discovered, "Plugins registered");

        let mut customizer = ServerCustomizer::new();
        plugins.load_all(&mut extensions, &mut middlewares, &mut customizer, &config);
        let extensions = Arc::new(extensions);
        let middlewares = Arc::new(middlewares);

        // Phase 2: components from the root and every healthy plugin namespace.
        let mut namespaces = vec![root];
        for namespace in plugins.namespaces() {
            if !namespaces.iter().any(|scanned| within_namespace(&namespace, scanned)) {
                namespaces.push(namespace);
            }
        }

        let mut seen = HashSet::new();
        let mut candidates: Vec<ComponentType> = Vec::new();
        for namespace in &namespaces {
            tracing::info!(namespace = %namespace, "Scanning namespace");
            for ty in scanner.types(namespace) {
                if plugins.is_poisoned(ty.namespace()) {
                    tracing::warn!(component = %ty.type_name(), "Skipping component of failed plugin");
                    continue;
                }
                if seen.insert(ty.type_id()) {
                    candidates.push(ty);
                }
            }
        }

        let mut container = Container::new(extensions.clone());
        for ty in &candidates {
            container.declare(ty.clone());
        }
        for ty in candidates {
            match classify(&ty, &extensions) {
                None | Some(ComponentKind::Plugin) => {}
                Some(kind) => {
                    tracing::info!(kind = %kind, component = %ty.short_name(), "Component found");
                    container.register(ty)?;
                }
            }
        }

        let mut router = Router::new(
            extensions,
            middlewares,
            codec,
            config.routing.default_base_path.clone(),
        );
        let controllers: Vec<_> = container
            .instances()
            .filter(|(ty, _)| router.is_controller(ty))
            .map(|(ty, instance)| (ty.clone(), instance.clone()))
            .collect();
        for (ty, instance) in controllers {
            router.register_controller(&ty, instance)?;
        }
        tracing::info!(
            components = container.len(),
            routes = router.routes().len(),
            "Application wired"
        );

        let ctx = StartContext::new(&container, &router, &config);
        plugins.start_all(&ctx);

        Ok(Runtime {
            config,
            router: Arc::new(router),
            container,
            plugins,
            customizer: Arc::new(customizer),
            shutdown: Shutdown::new(),
        })
    }
}

/// A wired application, ready to serve.
pub struct Runtime {
    config: RuntimeConfig,
    router: Arc<Router>,
    container: Container,
    plugins: PluginManager,
    customizer: Arc<ServerCustomizer>,
    shutdown: Shutdown,
}

impl Runtime {
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    pub fn customizer(&self) -> &ServerCustomizer {
        &self.customizer
    }

    /// Handle for stopping the transport from outside.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Host claim if present, else configuration.
    pub fn host(&self) -> String {
        self.customizer
            .host()
            .unwrap_or(&self.config.server.host)
            .to_string()
    }

    /// Port claim if present, else configuration.
    pub fn port(&self) -> u16 {
        self.customizer.port().unwrap_or(self.config.server.port)
    }

    /// Start the transport: the first server-initializing plugin if there is
    /// one, otherwise the default transport on the effective host and port.
    pub async fn run(self) -> Result<(), BootstrapError> {
        let initializers: Vec<PluginHandle> = self.plugins.server_initializers().cloned().collect();
        if let Some((owner, ignored)) = initializers.split_first() {
            for other in ignored {
                tracing::warn!(
                    plugin = %other.plugin().id(),
                    owner = %owner.plugin().id(),
                    "Server already initialized by another plugin, ignoring"
                );
            }
            return self.run_takeover(owner.clone()).await;
        }

        let listener = TcpListener::bind((self.host().as_str(), self.port())).await?;
        self.serve(listener).await
    }

    /// Serve with the default transport on an already bound listener.
    pub async fn serve(mut self, listener: TcpListener) -> Result<(), BootstrapError> {
        let server = self.default_transport();
        let gateways = server.gateways().to_vec();
        start_gateways(&gateways);

        let result = server.run(listener, self.shutdown.subscribe()).await;

        stop_gateways(&gateways);
        self.plugins.stop_all();
        tracing::info!("Shutdown complete");
        result.map_err(BootstrapError::Transport)
    }

    async fn run_takeover(mut self, owner: PluginHandle) -> Result<(), BootstrapError> {
        let id = owner.plugin().id();
        let server = self.default_transport();
        let gateways = server.gateways().to_vec();
        start_gateways(&gateways);

        let takeover = Takeover {
            server,
            router: self.router.clone(),
            host: self.host(),
            port: self.port(),
            shutdown: self.shutdown.subscribe(),
        };
        tracing::info!(plugin = %id, host = %takeover.host, port = takeover.port, "Server initialized by plugin");

        let outcome = AssertUnwindSafe(owner.plugin().serve(takeover))
            .catch_unwind()
            .await;
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => Err(format!("panic in plugin serve: {}", panic_message(payload)).into()),
        };

        stop_gateways(&gateways);
        self.plugins.stop_all();
        tracing::info!("Shutdown complete");
        result.map_err(|source| BootstrapError::Takeover { id, source })
    }

    fn default_transport(&self) -> HttpServer {
        HttpServer::new(self.router.clone(), self.customizer.clone(), &self.config.limits)
    }
}

fn start_gateways(gateways: &[Arc<dyn Gateway>]) {
    for gateway in gateways {
        tracing::info!(gateway = %gateway.name(), "Starting gateway");
        let _ = guard("gateway on_start", || {
            gateway.on_start();
            Ok(())
        });
    }
}

fn stop_gateways(gateways: &[Arc<dyn Gateway>]) {
    for gateway in gateways.iter().rev() {
        tracing::info!(gateway = %gateway.name(), "Stopping gateway");
        let _ = guard("gateway on_stop", || {
            gateway.on_stop();
            Ok(())
        });
    }
}
