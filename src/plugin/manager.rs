//! Plugin registry and lifecycle state machine.
//!
//! ```text
//! Registered ──on_load ok──▶ Loaded ──on_start ok──▶ Started ──on_stop──▶ Stopped
//!     │                        │
//!     └──on_load err──▶ Failed ◀──on_start err
//! ```

use std::any::TypeId;
use std::sync::Arc;

use crate::component::{within_namespace, ComponentType};
use crate::config::RuntimeConfig;
use crate::error::{guard, PluginError};
use crate::extensibility::ExtensionRegistry;
use crate::middleware::MiddlewareRegistry;
use crate::plugin::{LoadContext, Plugin, PluginHandle, StartContext};
use crate::server::ServerCustomizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Registered,
    Loaded,
    Started,
    Failed,
    Stopped,
}

#[derive(Debug)]
struct PluginRecord {
    handle: PluginHandle,
    id: String,
    namespace: String,
    initializes_server: bool,
    state: PluginState,
}

/// Registered plugins in registration order.
#[derive(Debug, Default)]
pub struct PluginManager {
    records: Vec<PluginRecord>,
    poisoned: Vec<String>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: Plugin>(&mut self, plugin: Arc<P>) -> Result<bool, PluginError> {
        self.register_handle(PluginHandle::new(plugin))
    }

    /// Register a plugin. Returns `Ok(false)` when this exact instance is
    /// already registered; a different plugin with a taken id is an error.
    pub fn register_handle(&mut self, handle: PluginHandle) -> Result<bool, PluginError> {
        if self.records.iter().any(|r| r.handle.same_instance(&handle)) {
            tracing::debug!(plugin = %handle.type_name(), "Plugin instance already registered");
            return Ok(false);
        }

        let plugin = handle.plugin().clone();
        let id = plugin.id();
        if let Some(existing) = self.records.iter().find(|r| r.id == id) {
            return Err(PluginError::DuplicateId {
                id,
                existing: existing.handle.identity(),
                offending: handle.identity(),
            });
        }

        tracing::info!(
            plugin = %id,
            name = %plugin.name(),
            version = %plugin.version(),
            "Plugin registered"
        );
        self.records.push(PluginRecord {
            namespace: plugin.namespace(),
            initializes_server: plugin.initializes_server(),
            handle,
            id,
            state: PluginState::Registered,
        });
        Ok(true)
    }

    /// Instantiate and register plugin-marked types found by scanning.
    /// Failures are logged and poison the plugin's namespace; they never
    /// abort discovery. Returns how many plugins were added.
    pub fn discover(&mut self, types: &[ComponentType]) -> usize {
        let mut added = 0;

        for ty in types.iter().filter(|ty| ty.is_plugin()) {
            if self.is_type_registered(ty.type_id()) {
                tracing::debug!(plugin = %ty.type_name(), "Plugin type already registered, skipping");
                continue;
            }

            let created = guard("plugin factory", || match ty.instantiate_plugin() {
                Some(result) => result.map(Some),
                None => Ok(None),
            });
            let handle = match created {
                Ok(Some(handle)) => handle,
                Ok(None) => continue,
                Err(source) => {
                    let err = PluginError::Instantiation {
                        type_name: ty.type_name(),
                        source,
                    };
                    tracing::error!(error = %err, "Plugin discovery failed");
                    self.poison(ty.namespace());
                    continue;
                }
            };

            let namespace = handle.plugin().namespace();
            match self.register_handle(handle) {
                Ok(true) => added += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::error!(error = %err, "Plugin discovery failed");
                    self.poison(&namespace);
                }
            }
        }

        added
    }

    /// Run `on_load` for every registered plugin, then forward its server
    /// configuration claims. Returns the failures; none of them is fatal.
    pub fn load_all(
        &mut self,
        extensions: &mut ExtensionRegistry,
        middlewares: &mut MiddlewareRegistry,
        customizer: &mut ServerCustomizer,
        config: &RuntimeConfig,
    ) -> Vec<PluginError> {
        let mut failures = Vec::new();

        for index in 0..self.records.len() {
            if self.records[index].state != PluginState::Registered {
                continue;
            }
            let plugin = self.records[index].handle.plugin().clone();
            let id = self.records[index].id.clone();

            let mut ctx = LoadContext::new(&id, extensions, middlewares, customizer, config);
            if let Err(source) = guard("plugin on_load", || plugin.on_load(&mut ctx)) {
                let err = PluginError::Hook {
                    id,
                    phase: "load",
                    source,
                };
                tracing::error!(error = %err, "Error loading plugin");
                self.records[index].state = PluginState::Failed;
                let namespace = self.records[index].namespace.clone();
                self.poison(&namespace);
                failures.push(err);
                continue;
            }

            self.records[index].state = PluginState::Loaded;
            tracing::info!(plugin = %id, "Plugin loaded");

            match guard("plugin server_configuration", || Ok(plugin.server_configuration())) {
                Ok(Some(server_config)) => {
                    customizer.apply(&server_config, &id);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(plugin = %id, error = %e, "Server configuration unavailable");
                }
            }
        }

        failures
    }

    /// Run `on_start` for every loaded plugin.
    pub fn start_all(&mut self, ctx: &StartContext<'_>) -> Vec<PluginError> {
        let mut failures = Vec::new();

        for record in self.records.iter_mut().filter(|r| r.state == PluginState::Loaded) {
            let plugin = record.handle.plugin().clone();
            match guard("plugin on_start", || plugin.on_start(ctx)) {
                Ok(()) => {
                    record.state = PluginState::Started;
                    tracing::info!(plugin = %record.id, "Plugin started");
                }
                Err(source) => {
                    record.state = PluginState::Failed;
                    let err = PluginError::Hook {
                        id: record.id.clone(),
                        phase: "start",
                        source,
                    };
                    tracing::error!(error = %err, "Error starting plugin");
                    failures.push(err);
                }
            }
        }

        failures
    }

    /// Run `on_stop` for started plugins, in registration order.
    pub fn stop_all(&mut self) {
        for record in self
            .records
            .iter_mut()
            .filter(|r| r.state == PluginState::Started)
        {
            let plugin = record.handle.plugin().clone();
            let stopped = guard("plugin on_stop", || {
                plugin.on_stop();
                Ok(())
            });
            if let Err(e) = stopped {
                tracing::warn!(plugin = %record.id, error = %e, "Error stopping plugin");
            }
            record.state = PluginState::Stopped;
        }
    }

    fn poison(&mut self, namespace: &str) {
        if namespace.is_empty() {
            tracing::warn!("Plugin at the namespace root failed; nothing to isolate");
            return;
        }
        if !self.poisoned.iter().any(|p| p == namespace) {
            tracing::warn!(namespace = %namespace, "Namespace excluded from scanning");
            self.poisoned.push(namespace.to_string());
        }
    }

    /// Whether components under `namespace` must be skipped.
    pub fn is_poisoned(&self, namespace: &str) -> bool {
        self.poisoned
            .iter()
            .any(|root| within_namespace(namespace, root))
    }

    pub fn poisoned_namespaces(&self) -> &[String] {
        &self.poisoned
    }

    /// Namespaces of healthy plugins, in registration order, deduplicated.
    pub fn namespaces(&self) -> Vec<String> {
        let mut namespaces: Vec<String> = Vec::new();
        for record in self.records.iter().filter(|r| r.state != PluginState::Failed) {
            if !namespaces.contains(&record.namespace) {
                namespaces.push(record.namespace.clone());
            }
        }
        namespaces
    }

    pub fn is_registered<P: Plugin>(&self) -> bool {
        self.is_type_registered(TypeId::of::<P>())
    }

    pub fn is_type_registered(&self, type_id: TypeId) -> bool {
        self.records.iter().any(|r| r.handle.type_id() == type_id)
    }

    pub fn is_id_registered(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&PluginHandle> {
        self.records.iter().find(|r| r.id == id).map(|r| &r.handle)
    }

    /// First registered plugin of type `P`.
    pub fn plugin<P: Plugin>(&self) -> Option<Arc<P>> {
        self.records.iter().find_map(|r| r.handle.downcast::<P>())
    }

    pub fn state(&self, id: &str) -> Option<PluginState> {
        self.records.iter().find(|r| r.id == id).map(|r| r.state)
    }

    pub fn plugins(&self) -> impl Iterator<Item = &PluginHandle> + '_ {
        self.records.iter().map(|r| &r.handle)
    }

    pub fn has_server_initializer(&self) -> bool {
        self.server_initializers().next().is_some()
    }

    /// Healthy plugins that want to run the transport, in registration order.
    pub fn server_initializers(&self) -> impl Iterator<Item = &PluginHandle> + '_ {
        self.records
            .iter()
            .filter(|r| r.initializes_server && r.state != PluginState::Failed)
            .map(|r| &r.handle)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Container, ComponentType};
    use crate::error::BoxError;
    use crate::http::JsonCodec;
    use crate::middleware::{Flow, Middleware};
    use crate::routing::Router;
    use crate::server::ServerConfiguration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Hello;

    impl Plugin for Hello {
        fn id(&self) -> String {
            "com.example.hello".into()
        }

        fn name(&self) -> String {
            "Hello".into()
        }

        fn on_load(&self, ctx: &mut LoadContext<'_>) -> Result<(), BoxError> {
            let middleware: Arc<dyn Middleware> =
                Arc::new(|_: &crate::http::HttpRequest| Ok::<_, BoxError>(Flow::Continue));
            ctx.register_middleware("hello", middleware);
            Ok(())
        }

        fn server_configuration(&self) -> Option<ServerConfiguration> {
            Some(ServerConfiguration::new().port(9090))
        }
    }

    struct Impostor;

    impl Plugin for Impostor {
        fn id(&self) -> String {
            "com.example.hello".into()
        }

        fn name(&self) -> String {
            "Greeter".into()
        }

        fn version(&self) -> String {
            "2.1.0".into()
        }

        fn namespace(&self) -> String {
            "vendor::greeter".into()
        }
    }

    struct FailingLoad;

    impl Plugin for FailingLoad {
        fn namespace(&self) -> String {
            "app::plugins::broken".into()
        }

        fn on_load(&self, _ctx: &mut LoadContext<'_>) -> Result<(), BoxError> {
            Err("missing configuration".into())
        }
    }

    struct PanickingStart;

    impl Plugin for PanickingStart {
        fn on_start(&self, _ctx: &StartContext<'_>) -> Result<(), BoxError> {
            panic!("start exploded")
        }
    }

    #[derive(Default)]
    struct Counting {
        stops: AtomicUsize,
    }

    impl Plugin for Counting {
        fn initializes_server(&self) -> bool {
            true
        }

        fn on_stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Recording {
        label: &'static str,
        stopped: Arc<std::sync::Mutex<Vec<&'static str>>>,
    }

    impl Plugin for Recording {
        fn id(&self) -> String {
            format!("com.example.{}", self.label)
        }

        fn on_stop(&self) {
            self.stopped.lock().unwrap().push(self.label);
        }
    }

    struct Loader {
        extensions: ExtensionRegistry,
        middlewares: MiddlewareRegistry,
        customizer: ServerCustomizer,
        config: RuntimeConfig,
    }

    impl Loader {
        fn new() -> Self {
            Self {
                extensions: ExtensionRegistry::new(),
                middlewares: MiddlewareRegistry::new(),
                customizer: ServerCustomizer::new(),
                config: RuntimeConfig::default(),
            }
        }

        fn load(&mut self, manager: &mut PluginManager) -> Vec<PluginError> {
            manager.load_all(
                &mut self.extensions,
                &mut self.middlewares,
                &mut self.customizer,
                &self.config,
            )
        }
    }

    fn start(manager: &mut PluginManager) -> Vec<PluginError> {
        let extensions = Arc::new(ExtensionRegistry::new());
        let container = Container::new(extensions.clone());
        let router = Router::new(
            extensions,
            Arc::new(MiddlewareRegistry::new()),
            Arc::new(JsonCodec),
            "/api",
        );
        let config = RuntimeConfig::default();
        let ctx = StartContext::new(&container, &router, &config);
        manager.start_all(&ctx)
    }

    #[test]
    fn test_duplicate_id_names_both_plugins() {
        let mut manager = PluginManager::new();
        manager.register(Arc::new(Hello)).unwrap();

        let err = manager.register(Arc::new(Impostor)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("com.example.hello"));
        assert!(message.contains("Hello v1.0.0"));
        assert!(message.contains("Greeter v2.1.0"));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_same_instance_is_a_no_op() {
        let mut manager = PluginManager::new();
        let hello = Arc::new(Hello);
        assert!(manager.register(hello.clone()).unwrap());
        assert!(!manager.register(hello).unwrap());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_default_metadata_and_queries() {
        let mut manager = PluginManager::new();
        manager.register(Arc::new(Counting::default())).unwrap();

        let id = std::any::type_name::<Counting>();
        assert!(manager.is_id_registered(id));
        assert!(manager.is_registered::<Counting>());
        assert!(!manager.is_registered::<Hello>());
        assert_eq!(manager.get(id).unwrap().identity(), "Counting v1.0.0");
        assert!(manager.plugin::<Counting>().is_some());
        assert!(manager.plugin::<Hello>().is_none());
        assert_eq!(manager.namespaces(), vec![module_path!().to_string()]);
        assert!(manager.has_server_initializer());
    }

    #[test]
    fn test_load_registers_contributions_and_claims() {
        let mut manager = PluginManager::new();
        manager.register(Arc::new(Hello)).unwrap();
        let mut loader = Loader::new();

        assert!(loader.load(&mut manager).is_empty());
        assert_eq!(manager.state("com.example.hello"), Some(PluginState::Loaded));
        assert!(loader.middlewares.contains("hello"));
        assert_eq!(loader.customizer.port(), Some(9090));
    }

    #[test]
    fn test_load_failure_poisons_namespace() {
        let mut manager = PluginManager::new();
        manager.register(Arc::new(FailingLoad)).unwrap();
        manager.register(Arc::new(Hello)).unwrap();
        let mut loader = Loader::new();

        let failures = loader.load(&mut manager);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].to_string().contains("missing configuration"));

        let id = std::any::type_name::<FailingLoad>();
        assert_eq!(manager.state(id), Some(PluginState::Failed));
        assert_eq!(manager.state("com.example.hello"), Some(PluginState::Loaded));
        assert!(manager.is_poisoned("app::plugins::broken"));
        assert!(manager.is_poisoned("app::plugins::broken::controller"));
        assert!(!manager.is_poisoned("app::plugins::brokenish"));
        assert!(!manager.namespaces().contains(&"app::plugins::broken".to_string()));
    }

    #[test]
    fn test_start_panic_marks_failed_and_is_not_stopped() {
        let mut manager = PluginManager::new();
        let counting = Arc::new(Counting::default());
        manager.register(Arc::new(PanickingStart)).unwrap();
        manager.register(counting.clone()).unwrap();
        Loader::new().load(&mut manager);

        let failures = start(&mut manager);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].to_string().contains("start exploded"));
        assert_eq!(
            manager.state(std::any::type_name::<PanickingStart>()),
            Some(PluginState::Failed)
        );

        manager.stop_all();
        assert_eq!(counting.stops.load(Ordering::SeqCst), 1);
        assert_eq!(
            manager.state(std::any::type_name::<Counting>()),
            Some(PluginState::Stopped)
        );

        manager.stop_all();
        assert_eq!(counting.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_runs_in_registration_order() {
        let stopped = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut manager = PluginManager::new();
        for label in ["first", "second", "third"] {
            manager
                .register(Arc::new(Recording {
                    label,
                    stopped: stopped.clone(),
                }))
                .unwrap();
        }
        Loader::new().load(&mut manager);
        assert!(start(&mut manager).is_empty());

        manager.stop_all();
        assert_eq!(*stopped.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_discover_skips_registered_types_and_isolates_duplicates() {
        let mut manager = PluginManager::new();
        manager.register(Arc::new(Hello)).unwrap();

        let types = vec![
            ComponentType::of::<Hello>().plugin().build(),
            ComponentType::of::<Impostor>()
                .namespace("vendor::greeter")
                .plugin_with(|| Ok(Impostor))
                .build(),
            ComponentType::of::<Counting>().plugin().build(),
            ComponentType::of::<FailingLoad>()
                .namespace("vendor::unbuildable")
                .plugin_with(|| Err::<FailingLoad, BoxError>("no factory".into()))
                .build(),
        ];

        assert_eq!(manager.discover(&types), 1);
        assert!(manager.is_registered::<Counting>());
        assert!(!manager.is_registered::<Impostor>());
        assert!(manager.is_poisoned("vendor::unbuildable"));
        assert!(manager.is_poisoned("vendor::greeter"));
        assert_eq!(manager.poisoned_namespaces().len(), 2);
    }
}
