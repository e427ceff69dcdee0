//! Component discovery.
//!
//! # Responsibilities
//! - Walk a namespace (and everything below it) in one or more sources
//! - Normalise expanded-directory and packaged-archive layouts into one walk
//! - Classify each candidate with built-in markers or extension handlers
//!
//! # Design Decisions
//! - Candidates that fail to load are skipped with a debug log, never fatal
//! - Results are de-duplicated by `TypeId` and returned in walk order, so
//!   scanning the same namespace twice yields the same list
//! - Namespace prefixes match on `::` segment boundaries (`app` covers
//!   `app::web` but not `application`)

use std::any::TypeId;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::component::descriptor::{ComponentKind, ComponentType};
use crate::error::BoxError;
use crate::extensibility::ExtensionRegistry;

/// One entry produced by a source walk.
pub enum Candidate {
    Loaded(ComponentType),
    /// An entry that exists but could not be turned into a type.
    Unresolved { path: String, reason: String },
}

/// A place types can be discovered from.
pub trait ComponentSource: Send + Sync {
    /// Visit every candidate under `namespace`, recursively.
    fn walk(&self, namespace: &str, visit: &mut dyn FnMut(Candidate));
}

/// Whether `namespace` equals `root` or sits below it.
pub fn within_namespace(namespace: &str, root: &str) -> bool {
    root.is_empty()
        || namespace == root
        || namespace
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with("::"))
}

#[derive(Default, Clone)]
struct Node {
    types: Vec<ComponentType>,
    children: BTreeMap<String, Node>,
}

impl Node {
    fn visit_all(&self, visit: &mut dyn FnMut(Candidate)) {
        for ty in &self.types {
            visit(Candidate::Loaded(ty.clone()));
        }
        for child in self.children.values() {
            child.visit_all(visit);
        }
    }
}

/// An expanded tree of namespaces holding already-loaded descriptors.
#[derive(Default, Clone)]
pub struct DirectorySource {
    root: Node,
}

impl fmt::Debug for DirectorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectorySource").finish_non_exhaustive()
    }
}

impl DirectorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a type at the node for its namespace.
    pub fn with(mut self, ty: ComponentType) -> Self {
        self.add(ty);
        self
    }

    pub fn add(&mut self, ty: ComponentType) {
        let mut node = &mut self.root;
        for segment in ty.namespace().split("::").filter(|s| !s.is_empty()) {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.types.push(ty);
    }
}

impl ComponentSource for DirectorySource {
    fn walk(&self, namespace: &str, visit: &mut dyn FnMut(Candidate)) {
        let mut node = &self.root;
        for segment in namespace.split("::").filter(|s| !s.is_empty()) {
            match node.children.get(segment) {
                Some(child) => node = child,
                None => return,
            }
        }
        node.visit_all(visit);
    }
}

type Loader = Arc<dyn Fn() -> Result<ComponentType, BoxError> + Send + Sync>;

/// A packaged archive: flat `/`-separated entries, each loaded on demand.
#[derive(Default, Clone)]
pub struct ArchiveSource {
    entries: Vec<(String, Loader)>,
}

impl fmt::Debug for ArchiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paths: Vec<&str> = self.entries.iter().map(|(path, _)| path.as_str()).collect();
        f.debug_struct("ArchiveSource").field("entries", &paths).finish()
    }
}

impl ArchiveSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry such as `app/service/EmployeeService`.
    pub fn entry<F>(mut self, path: impl Into<String>, load: F) -> Self
    where
        F: Fn() -> Result<ComponentType, BoxError> + Send + Sync + 'static,
    {
        self.entries.push((path.into(), Arc::new(load)));
        self
    }

    /// Add a loaded type under the entry path derived from its namespace.
    pub fn with(self, ty: ComponentType) -> Self {
        let mut path = ty.namespace().replace("::", "/");
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(ty.short_name());
        self.entry(path, move || Ok(ty.clone()))
    }
}

impl ComponentSource for ArchiveSource {
    fn walk(&self, namespace: &str, visit: &mut dyn FnMut(Candidate)) {
        for (path, load) in &self.entries {
            let entry_namespace = path
                .rsplit_once('/')
                .map(|(dir, _)| dir.replace('/', "::"))
                .unwrap_or_default();
            if !within_namespace(&entry_namespace, namespace) {
                continue;
            }

            match load() {
                Ok(ty) => visit(Candidate::Loaded(ty.with_namespace(entry_namespace))),
                Err(err) => visit(Candidate::Unresolved {
                    path: path.clone(),
                    reason: err.to_string(),
                }),
            }
        }
    }
}

/// A classified discovered type.
#[derive(Debug, Clone)]
pub struct ComponentDescriptor {
    pub ty: ComponentType,
    pub kind: ComponentKind,
}

/// Built-in markers first, then extension handlers in registration order.
pub fn classify(ty: &ComponentType, extensions: &ExtensionRegistry) -> Option<ComponentKind> {
    ty.builtin_kind().or_else(|| {
        extensions
            .component_handler_for(ty)
            .map(|handler| ComponentKind::Extension(handler.marker().to_string()))
    })
}

#[derive(Default, Clone)]
pub struct ComponentScanner {
    sources: Vec<Arc<dyn ComponentSource>>,
}

impl fmt::Debug for ComponentScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentScanner")
            .field("sources", &self.sources.len())
            .finish()
    }
}

impl ComponentScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, source: Arc<dyn ComponentSource>) {
        self.sources.push(source);
    }

    /// Every loadable type under `namespace`, classified or not.
    pub fn types(&self, namespace: &str) -> Vec<ComponentType> {
        let mut seen = HashSet::<TypeId>::new();
        let mut found = Vec::new();

        for source in &self.sources {
            source.walk(namespace, &mut |candidate| match candidate {
                Candidate::Loaded(ty) => {
                    if seen.insert(ty.type_id()) {
                        found.push(ty);
                    }
                }
                Candidate::Unresolved { path, reason } => {
                    tracing::debug!(entry = %path, reason = %reason, "Skipping unloadable entry");
                }
            });
        }

        found
    }

    /// Component-classified types under `namespace`.
    pub fn scan(&self, namespace: &str, extensions: &ExtensionRegistry) -> Vec<ComponentDescriptor> {
        self.types(namespace)
            .into_iter()
            .filter_map(|ty| {
                let kind = classify(&ty, extensions)?;
                Some(ComponentDescriptor { ty, kind })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Marker;
    use crate::extensibility::ComponentHandler;

    struct Repo;
    struct Service;
    struct Helper;
    struct Widget;
    struct Outside;

    struct WidgetHandler;

    impl ComponentHandler for WidgetHandler {
        fn marker(&self) -> &str {
            "Widget"
        }
    }

    fn directory() -> DirectorySource {
        DirectorySource::new()
            .with(ComponentType::of::<Repo>().namespace("app::repository").repository().build())
            .with(ComponentType::of::<Service>().namespace("app::service").service().build())
            .with(ComponentType::of::<Helper>().namespace("app::util").build())
            .with(
                ComponentType::of::<Widget>()
                    .namespace("app")
                    .marker(Marker::custom("Widget"))
                    .build(),
            )
            .with(ComponentType::of::<Outside>().namespace("application").component().build())
    }

    fn scanner(source: impl ComponentSource + 'static) -> ComponentScanner {
        let mut scanner = ComponentScanner::new();
        scanner.add_source(Arc::new(source));
        scanner
    }

    #[test]
    fn test_within_namespace() {
        assert!(within_namespace("app", "app"));
        assert!(within_namespace("app::web", "app"));
        assert!(!within_namespace("application", "app"));
        assert!(within_namespace("anything", ""));
    }

    #[test]
    fn test_directory_scan_is_recursive_and_deterministic() {
        let scanner = scanner(directory());
        let registry = ExtensionRegistry::new();

        let first: Vec<_> = scanner
            .scan("app", &registry)
            .into_iter()
            .map(|d| (d.ty.short_name(), d.kind))
            .collect();
        let second: Vec<_> = scanner
            .scan("app", &registry)
            .into_iter()
            .map(|d| (d.ty.short_name(), d.kind))
            .collect();

        assert_eq!(
            first,
            vec![
                ("Repo", ComponentKind::Repository),
                ("Service", ComponentKind::Service)
            ]
        );
        assert_eq!(first, second);
        assert_eq!(scanner.types("app").len(), 4);
        assert!(scanner.types("missing").is_empty());
    }

    #[test]
    fn test_extension_handler_classifies_custom_marker() {
        let scanner = scanner(directory());
        let mut registry = ExtensionRegistry::new();
        registry.register_component_handler(Arc::new(WidgetHandler));

        let kinds: Vec<_> = scanner
            .scan("app", &registry)
            .into_iter()
            .map(|d| d.kind)
            .collect();
        assert!(kinds.contains(&ComponentKind::Extension("Widget".into())));
    }

    #[test]
    fn test_archive_source_skips_unloadable_entries() {
        let archive = ArchiveSource::new()
            .entry("app/service/Service", || {
                Ok(ComponentType::of::<Service>().service().build())
            })
            .entry("app/broken/Missing", || Err("linkage error".into()))
            .entry("other/Repo", || {
                Ok(ComponentType::of::<Repo>().repository().build())
            });
        let scanner = scanner(archive);

        let found = scanner.scan("app", &ExtensionRegistry::new());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].ty.namespace(), "app::service");
        assert_eq!(found[0].kind, ComponentKind::Service);
    }

    #[test]
    fn test_sources_are_merged_without_duplicates() {
        let repo = ComponentType::of::<Repo>().namespace("app").repository().build();
        let mut scanner = scanner(DirectorySource::new().with(repo.clone()));
        scanner.add_source(Arc::new(ArchiveSource::new().with(repo)));

        let found = scanner.scan("app", &ExtensionRegistry::new());
        assert_eq!(found.len(), 1);
    }
}
