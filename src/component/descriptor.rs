//! Explicit type descriptors.
//!
//! A `ComponentType` carries everything the runtime needs to know about a
//! type: where it lives (namespace), how it is classified (markers), how to
//! build it (constructors, injected fields) and what it exposes over HTTP
//! (operations). Descriptors are built once with `ComponentType::of::<T>()`.

use std::any::{type_name, Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::component::container::{Inject, Resolver};
use crate::error::{BoxError, ContainerError};
use crate::plugin::{Plugin, PluginHandle};
use crate::routing::route::{Operation, OperationSpec};

/// A type-erased singleton.
pub type Instance = Arc<dyn Any + Send + Sync>;

pub(crate) type Constructor =
    Arc<dyn Fn(&mut Resolver<'_>) -> Result<Instance, BoxError> + Send + Sync>;

pub(crate) type Injector =
    Arc<dyn Fn(&Instance, &mut Resolver<'_>) -> Result<(), BoxError> + Send + Sync>;

pub(crate) type PluginFactory = Arc<dyn Fn() -> Result<PluginHandle, BoxError> + Send + Sync>;

/// Declarative metadata attached to a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Component,
    Service,
    Repository,
    /// Routed component; `None` uses the configured default base path.
    Controller { base_path: Option<String> },
    Plugin,
    /// A marker understood by an extension `ComponentHandler`.
    Custom {
        name: String,
        attributes: BTreeMap<String, String>,
    },
}

impl Marker {
    pub fn custom(name: impl Into<String>) -> Self {
        Marker::Custom {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Attach an attribute; ignored on built-in markers.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Marker::Custom { attributes, .. } = &mut self {
            attributes.insert(key.into(), value.into());
        }
        self
    }

    pub fn name(&self) -> &str {
        match self {
            Marker::Component => "Component",
            Marker::Service => "Service",
            Marker::Repository => "Repository",
            Marker::Controller { .. } => "Controller",
            Marker::Plugin => "Plugin",
            Marker::Custom { name, .. } => name,
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        match self {
            Marker::Custom { attributes, .. } => attributes.get(key).map(String::as_str),
            _ => None,
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, Marker::Custom { .. })
    }
}

/// Classification of a discovered type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Controller,
    Service,
    Repository,
    Component,
    Plugin,
    /// Classified by the extension handler for this marker.
    Extension(String),
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentKind::Controller => f.write_str("Controller"),
            ComponentKind::Service => f.write_str("Service"),
            ComponentKind::Repository => f.write_str("Repository"),
            ComponentKind::Component => f.write_str("Component"),
            ComponentKind::Plugin => f.write_str("Plugin"),
            ComponentKind::Extension(marker) => f.write_str(marker),
        }
    }
}

#[derive(Clone)]
pub(crate) struct FieldInjection {
    pub(crate) field: &'static str,
    pub(crate) dependency: &'static str,
    pub(crate) apply: Injector,
}

/// Descriptor of one application type.
#[derive(Clone)]
pub struct ComponentType {
    type_id: TypeId,
    type_name: &'static str,
    namespace: String,
    markers: Vec<Marker>,
    middlewares: Vec<String>,
    constructor: Option<Constructor>,
    default_constructor: Option<Constructor>,
    injections: Vec<FieldInjection>,
    operations: Vec<OperationSpec>,
    plugin: Option<PluginFactory>,
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.injections.iter().map(|i| i.field).collect();
        f.debug_struct("ComponentType")
            .field("type_name", &self.type_name)
            .field("namespace", &self.namespace)
            .field("markers", &self.markers)
            .field("middlewares", &self.middlewares)
            .field("injected_fields", &fields)
            .field("operations", &self.operations)
            .finish()
    }
}

impl ComponentType {
    pub fn of<T: Any + Send + Sync>() -> ComponentTypeBuilder<T> {
        ComponentTypeBuilder::new()
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Type name without its module path.
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.type_name)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Re-home the type under another namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn has_marker(&self, name: &str) -> bool {
        self.marker(name).is_some()
    }

    pub fn marker(&self, name: &str) -> Option<&Marker> {
        self.markers.iter().find(|marker| marker.name() == name)
    }

    /// Kind implied by built-in markers, most specific first.
    pub fn builtin_kind(&self) -> Option<ComponentKind> {
        let has = |wanted: fn(&Marker) -> bool| self.markers.iter().any(wanted);
        if has(|m| matches!(m, Marker::Controller { .. })) {
            Some(ComponentKind::Controller)
        } else if has(|m| matches!(m, Marker::Service)) {
            Some(ComponentKind::Service)
        } else if has(|m| matches!(m, Marker::Repository)) {
            Some(ComponentKind::Repository)
        } else if has(|m| matches!(m, Marker::Component)) {
            Some(ComponentKind::Component)
        } else if has(|m| matches!(m, Marker::Plugin)) {
            Some(ComponentKind::Plugin)
        } else {
            None
        }
    }

    /// Base path declared by a built-in controller marker.
    pub fn controller_base_path(&self) -> Option<Option<&str>> {
        self.markers.iter().find_map(|marker| match marker {
            Marker::Controller { base_path } => Some(base_path.as_deref()),
            _ => None,
        })
    }

    /// Class-level middleware names, in declaration order.
    pub fn middlewares(&self) -> &[String] {
        &self.middlewares
    }

    pub fn operations(&self) -> &[OperationSpec] {
        &self.operations
    }

    pub fn is_plugin(&self) -> bool {
        self.plugin.is_some()
    }

    pub(crate) fn constructor(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }

    pub(crate) fn default_constructor(&self) -> Option<&Constructor> {
        self.default_constructor.as_ref()
    }

    pub(crate) fn injections(&self) -> &[FieldInjection] {
        &self.injections
    }

    /// Create a fresh plugin instance from a plugin-marked type.
    pub fn instantiate_plugin(&self) -> Option<Result<PluginHandle, BoxError>> {
        self.plugin.as_ref().map(|factory| factory())
    }
}

/// Typed builder for `ComponentType`.
pub struct ComponentTypeBuilder<T> {
    ty: ComponentType,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> ComponentTypeBuilder<T> {
    fn new() -> Self {
        let type_name = type_name::<T>();
        Self {
            ty: ComponentType {
                type_id: TypeId::of::<T>(),
                type_name,
                namespace: module_path_of(type_name).to_string(),
                markers: Vec::new(),
                middlewares: Vec::new(),
                constructor: None,
                default_constructor: None,
                injections: Vec::new(),
                operations: Vec::new(),
                plugin: None,
            },
            _marker: std::marker::PhantomData,
        }
    }

    /// Override the namespace derived from the Rust module path.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.ty.namespace = namespace.into();
        self
    }

    pub fn marker(mut self, marker: Marker) -> Self {
        self.ty.markers.push(marker);
        self
    }

    pub fn component(self) -> Self {
        self.marker(Marker::Component)
    }

    pub fn service(self) -> Self {
        self.marker(Marker::Service)
    }

    pub fn repository(self) -> Self {
        self.marker(Marker::Repository)
    }

    /// Routed component mounted under `base_path`.
    pub fn controller(self, base_path: impl Into<String>) -> Self {
        self.marker(Marker::Controller {
            base_path: Some(base_path.into()),
        })
    }

    /// Routed component mounted under the configured default base path.
    pub fn default_controller(self) -> Self {
        self.marker(Marker::Controller { base_path: None })
    }

    /// Class-level middleware, run before any operation's own middlewares.
    pub fn middleware(mut self, name: impl Into<String>) -> Self {
        self.ty.middlewares.push(name.into());
        self
    }

    /// Injecting constructor; dependencies are pulled through the resolver.
    pub fn constructor<F>(mut self, build: F) -> Self
    where
        F: Fn(&mut Resolver<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.ty.constructor = Some(constructor_fn(move |resolver| {
            Ok(Arc::new(build(resolver)?) as Instance)
        }));
        self
    }

    /// Inject a field after construction.
    pub fn inject<D: Any + Send + Sync>(
        mut self,
        field: &'static str,
        accessor: fn(&T) -> &Inject<D>,
    ) -> Self {
        let apply = injector_fn(move |instance, resolver| {
            let target = (**instance)
                .downcast_ref::<T>()
                .ok_or(ContainerError::TypeMismatch {
                    type_name: type_name::<T>(),
                })?;
            let dependency = resolver.resolve::<D>()?;
            accessor(target).fill(dependency);
            Ok(())
        });
        self.ty.injections.push(FieldInjection {
            field,
            dependency: type_name::<D>(),
            apply,
        });
        self
    }

    /// Add a routed operation.
    pub fn operation(mut self, operation: Operation<T>) -> Self {
        self.ty.operations.push(operation.into_spec());
        self
    }

    pub fn build(self) -> ComponentType {
        self.ty
    }
}

impl<T: Any + Send + Sync + Default> ComponentTypeBuilder<T> {
    /// No-argument fallback constructor.
    pub fn default_constructor(mut self) -> Self {
        self.ty.default_constructor =
            Some(constructor_fn(|_| Ok(Arc::new(T::default()) as Instance)));
        self
    }
}

impl<T: Plugin> ComponentTypeBuilder<T> {
    /// Plugin-marked type instantiated with `factory` during discovery.
    pub fn plugin_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.ty.plugin = Some(Arc::new(move || Ok(PluginHandle::new(Arc::new(factory()?)))));
        if !self.ty.markers.contains(&Marker::Plugin) {
            self.ty.markers.push(Marker::Plugin);
        }
        self
    }
}

impl<T: Plugin + Default> ComponentTypeBuilder<T> {
    /// Plugin-marked type instantiated with `T::default()`.
    pub fn plugin(self) -> Self {
        self.plugin_with(|| Ok(T::default()))
    }
}

fn constructor_fn<F>(build: F) -> Constructor
where
    F: Fn(&mut Resolver<'_>) -> Result<Instance, BoxError> + Send + Sync + 'static,
{
    Arc::new(build)
}

fn injector_fn<F>(apply: F) -> Injector
where
    F: Fn(&Instance, &mut Resolver<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
{
    Arc::new(apply)
}

/// Module path part of a type name (`app::service::Repo` → `app::service`).
pub(crate) fn module_path_of(type_name: &str) -> &str {
    let plain = type_name.split('<').next().unwrap_or(type_name);
    plain.rsplit_once("::").map(|(path, _)| path).unwrap_or("")
}

/// Last path segment of a type name, keeping generics.
pub(crate) fn short_type_name(type_name: &str) -> &str {
    let plain_len = type_name.find('<').unwrap_or(type_name.len());
    match type_name[..plain_len].rfind("::") {
        Some(idx) => &type_name[idx + 2..],
        None => type_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Repo;

    #[test]
    fn test_type_name_helpers() {
        assert_eq!(module_path_of("app::service::Repo"), "app::service");
        assert_eq!(module_path_of("Repo"), "");
        assert_eq!(module_path_of("app::Wrapper<core::Inner>"), "app");
        assert_eq!(short_type_name("app::service::Repo"), "Repo");
        assert_eq!(short_type_name("app::Wrapper<core::Inner>"), "Wrapper<core::Inner>");
    }

    #[test]
    fn test_builder_defaults_namespace_to_module_path() {
        let ty = ComponentType::of::<Repo>().repository().build();
        assert_eq!(ty.namespace(), module_path!());
        assert_eq!(ty.short_name(), "Repo");
        assert_eq!(ty.builtin_kind(), Some(ComponentKind::Repository));
    }

    #[test]
    fn test_builtin_kind_prefers_controller() {
        let ty = ComponentType::of::<Repo>()
            .component()
            .controller("/repos")
            .namespace("app::web")
            .build();
        assert_eq!(ty.builtin_kind(), Some(ComponentKind::Controller));
        assert_eq!(ty.controller_base_path(), Some(Some("/repos")));
        assert_eq!(ty.namespace(), "app::web");
    }

    #[test]
    fn test_custom_marker_attributes() {
        let marker = Marker::custom("ApiController").with_attribute("version", "v2");
        assert_eq!(marker.name(), "ApiController");
        assert_eq!(marker.attribute("version"), Some("v2"));
        assert!(!marker.is_builtin());
        assert_eq!(Marker::Service.with_attribute("x", "y").attribute("x"), None);
    }
}
