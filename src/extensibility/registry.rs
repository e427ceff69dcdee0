//! Append-only registry of component and parameter handlers.

use std::fmt;
use std::sync::Arc;

use crate::component::ComponentType;
use crate::extensibility::{ComponentHandler, ParameterHandler};
use crate::routing::params::Param;

#[derive(Default, Clone)]
pub struct ExtensionRegistry {
    component_handlers: Vec<Arc<dyn ComponentHandler>>,
    parameter_handlers: Vec<Arc<dyn ParameterHandler>>,
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let components: Vec<&str> = self.component_handlers.iter().map(|h| h.marker()).collect();
        let parameters: Vec<&str> = self.parameter_handlers.iter().map(|h| h.marker()).collect();
        f.debug_struct("ExtensionRegistry")
            .field("component_handlers", &components)
            .field("parameter_handlers", &parameters)
            .finish()
    }
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a component handler. Registering the same handler twice is a no-op.
    pub fn register_component_handler(&mut self, handler: Arc<dyn ComponentHandler>) {
        if self
            .component_handlers
            .iter()
            .any(|existing| std::ptr::addr_eq(Arc::as_ptr(existing), Arc::as_ptr(&handler)))
        {
            return;
        }
        tracing::info!(marker = %handler.marker(), "Registered component handler");
        self.component_handlers.push(handler);
    }

    /// Append a parameter handler. Registering the same handler twice is a no-op.
    pub fn register_parameter_handler(&mut self, handler: Arc<dyn ParameterHandler>) {
        if self
            .parameter_handlers
            .iter()
            .any(|existing| std::ptr::addr_eq(Arc::as_ptr(existing), Arc::as_ptr(&handler)))
        {
            return;
        }
        tracing::info!(marker = %handler.marker(), "Registered parameter handler");
        self.parameter_handlers.push(handler);
    }

    pub fn component_handlers(&self) -> &[Arc<dyn ComponentHandler>] {
        &self.component_handlers
    }

    pub fn parameter_handlers(&self) -> &[Arc<dyn ParameterHandler>] {
        &self.parameter_handlers
    }

    /// First handler that classifies the type as a component.
    pub fn component_handler_for(&self, ty: &ComponentType) -> Option<&Arc<dyn ComponentHandler>> {
        self.component_handlers
            .iter()
            .find(|handler| handler.is_component(ty))
    }

    /// First handler that classifies the type as a routed component.
    pub fn controller_handler_for(&self, ty: &ComponentType) -> Option<&Arc<dyn ComponentHandler>> {
        self.component_handlers
            .iter()
            .find(|handler| handler.is_component(ty) && handler.is_controller(ty))
    }

    pub fn find_parameter_handler(&self, param: &Param) -> Option<&Arc<dyn ParameterHandler>> {
        self.parameter_handlers
            .iter()
            .find(|handler| handler.can_handle(param))
    }

    pub fn is_empty(&self) -> bool {
        self.component_handlers.is_empty() && self.parameter_handlers.is_empty()
    }
}
