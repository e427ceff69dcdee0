//! Component model: descriptors, discovery and dependency wiring.
//!
//! # Data Flow
//! ```text
//! ComponentType (built once per type)
//!     → DirectorySource / ArchiveSource
//!     → scanner.rs (walk namespace, classify via markers + extensions)
//!     → container.rs (declare all, build component-classified singletons)
//!     → router (controllers' operations become routes)
//! ```
//!
//! # Design Decisions
//! - Types describe themselves explicitly instead of being inspected at runtime
//! - One instance per concrete type, cached for the process lifetime
//! - Discovery is tolerant (bad entries are skipped), construction is not

pub mod container;
pub mod descriptor;
pub mod scanner;

pub use container::{Container, Inject, NotInjected, Resolver};
pub use descriptor::{ComponentKind, ComponentType, ComponentTypeBuilder, Instance, Marker};
pub use scanner::{
    classify, within_namespace, ArchiveSource, Candidate, ComponentDescriptor, ComponentScanner,
    ComponentSource, DirectorySource,
};
