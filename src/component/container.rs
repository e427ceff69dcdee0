//! Singleton dependency container.
//!
//! # Responsibilities
//! - Hold every declared `ComponentType`
//! - Build each type at most once, caching the instance for the process lifetime
//! - Resolve constructor dependencies recursively, then fill injected fields
//!
//! # Design Decisions
//! - The instance is cached before field injection, so field-level cycles
//!   resolve; constructor-level cycles are detected with a resolution stack
//! - Every construction failure is wrapped in `ConstructionFailed` naming
//!   the type being built
//! - After bootstrap the container is only read (`get`, `instances`)
//! - A failed field injection evicts the instance and everything cached
//!   while it was being wired, so no survivor points at a discarded instance

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use thiserror::Error;

use crate::component::descriptor::{ComponentType, Instance};
use crate::component::scanner::classify;
use crate::component::ComponentKind;
use crate::error::{BoxError, ContainerError};
use crate::extensibility::ExtensionRegistry;

/// A field filled by the container after its owner is constructed.
pub struct Inject<T>(OnceLock<Arc<T>>);

/// Read of an `Inject` field before the container filled it.
#[derive(Debug, Error)]
#[error("dependency {0} has not been injected")]
pub struct NotInjected(&'static str);

impl<T> Inject<T> {
    pub fn new() -> Self {
        Self(OnceLock::new())
    }

    /// The injected dependency.
    pub fn get(&self) -> Result<&T, NotInjected> {
        self.0
            .get()
            .map(Arc::as_ref)
            .ok_or(NotInjected(type_name::<T>()))
    }

    pub fn is_injected(&self) -> bool {
        self.0.get().is_some()
    }

    /// Set the dependency unless it was already set.
    pub(crate) fn fill(&self, value: Arc<T>) {
        if self.0.set(value).is_err() {
            tracing::debug!(
                dependency = type_name::<T>(),
                "Field already injected, keeping the first value"
            );
        }
    }
}

impl<T> Default for Inject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Inject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Inject")
            .field(&if self.is_injected() { type_name::<T>() } else { "<empty>" })
            .finish()
    }
}

/// Dependency lookup handed to injecting constructors.
pub struct Resolver<'a> {
    container: &'a mut Container,
}

impl Resolver<'_> {
    /// Resolve (building if needed) the singleton of type `T`.
    pub fn resolve<T: Any + Send + Sync>(&mut self) -> Result<Arc<T>, ContainerError> {
        self.container.resolve::<T>()
    }
}

pub struct Container {
    extensions: Arc<ExtensionRegistry>,
    declared: HashMap<TypeId, ComponentType>,
    instances: HashMap<TypeId, Instance>,
    /// Creation order of cached instances.
    order: Vec<TypeId>,
    resolving: Vec<(TypeId, &'static str)>,
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("declared", &self.declared.len())
            .field("instances", &self.instances.len())
            .finish()
    }
}

impl Container {
    pub fn new(extensions: Arc<ExtensionRegistry>) -> Self {
        Self {
            extensions,
            declared: HashMap::new(),
            instances: HashMap::new(),
            order: Vec::new(),
            resolving: Vec::new(),
        }
    }

    /// Make a type known so it can be resolved as a dependency. The first
    /// declaration of a type wins.
    pub fn declare(&mut self, ty: ComponentType) {
        self.declared.entry(ty.type_id()).or_insert(ty);
    }

    pub fn is_declared(&self, type_id: TypeId) -> bool {
        self.declared.contains_key(&type_id)
    }

    /// Declare the type and, if it is component-classified, build its
    /// singleton. Plugin-marked and unclassified types are only declared.
    pub fn register(&mut self, ty: ComponentType) -> Result<Option<Instance>, ContainerError> {
        let type_id = ty.type_id();
        let type_name = ty.type_name();
        let kind = classify(&ty, &self.extensions);
        self.declare(ty);

        match kind {
            Some(ComponentKind::Plugin) | None => Ok(None),
            Some(kind) => {
                let instance = self.resolve_erased(type_id, type_name)?;
                tracing::debug!(component = %type_name, kind = %kind, "Registered component");
                Ok(Some(instance))
            }
        }
    }

    /// Resolve the singleton of type `T`, building it on first use.
    pub fn resolve<T: Any + Send + Sync>(&mut self) -> Result<Arc<T>, ContainerError> {
        let instance = self.resolve_erased(TypeId::of::<T>(), type_name::<T>())?;
        instance
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                type_name: type_name::<T>(),
            })
    }

    pub fn resolve_erased(
        &mut self,
        type_id: TypeId,
        type_name: &'static str,
    ) -> Result<Instance, ContainerError> {
        if let Some(instance) = self.instances.get(&type_id) {
            return Ok(instance.clone());
        }

        let ty = self
            .declared
            .get(&type_id)
            .cloned()
            .ok_or(ContainerError::UnknownComponent { type_name })?;

        if let Some(start) = self.resolving.iter().position(|(id, _)| *id == type_id) {
            let mut chain: Vec<&'static str> =
                self.resolving[start..].iter().map(|(_, name)| *name).collect();
            chain.push(ty.type_name());
            return Err(ContainerError::CircularDependency { chain });
        }

        self.resolving.push((type_id, ty.type_name()));
        let built = self.construct(&ty);
        self.resolving.pop();

        let instance = built.map_err(|source| ContainerError::ConstructionFailed {
            type_name: ty.type_name(),
            source,
        })?;

        let mark = self.order.len();
        self.instances.insert(type_id, instance.clone());
        self.order.push(type_id);

        for injection in ty.injections() {
            tracing::trace!(
                component = %ty.type_name(),
                field = injection.field,
                dependency = injection.dependency,
                "Injecting field"
            );
            let mut resolver = Resolver { container: self };
            if let Err(source) = (injection.apply)(&instance, &mut resolver) {
                for evicted in self.order.drain(mark..) {
                    self.instances.remove(&evicted);
                }
                return Err(ContainerError::ConstructionFailed {
                    type_name: ty.type_name(),
                    source,
                });
            }
        }

        Ok(instance)
    }

    fn construct(&mut self, ty: &ComponentType) -> Result<Instance, BoxError> {
        let constructor = ty
            .constructor()
            .or(ty.default_constructor())
            .cloned()
            .ok_or(ContainerError::NoConstructor {
                type_name: ty.type_name(),
            })?;
        let mut resolver = Resolver { container: self };
        constructor(&mut resolver)
    }

    /// Cached singleton of type `T`, without building it.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.instances
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|instance| instance.downcast::<T>().ok())
    }

    pub fn instance(&self, type_id: TypeId) -> Option<&Instance> {
        self.instances.get(&type_id)
    }

    pub fn descriptor(&self, type_id: TypeId) -> Option<&ComponentType> {
        self.declared.get(&type_id)
    }

    /// Cached instances with their descriptors, in creation order.
    pub fn instances(&self) -> impl Iterator<Item = (&ComponentType, &Instance)> + '_ {
        self.order.iter().filter_map(|id| {
            let ty = self.declared.get(id)?;
            let instance = self.instances.get(id)?;
            Some((ty, instance))
        })
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
