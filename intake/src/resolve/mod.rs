//! Flat field key to record path resolution
//!
//! Resolution walks an ordered [`RouteRegistry`] of [`RouteRule`]s. The
//! built-in order is: singleton fixed fields, singleton extensions, first
//! list items and their extensions, type containers, container names,
//! schema hints. Anything else becomes a flat root key.

mod registry;
mod rules;
mod types;


pub use registry::{FieldPathResolver, RouteRegistry, resolve_path};
pub use rules::{
    ContainerLiteralRule, ListItemRule, SchemaHintRule, SingletonExtensionRule, SingletonFixedRule,
    TypeContainerRule,
};
pub use types::{ResolutionSource, ResolvedPath, RouteContext, RouteRule, is_structural_key};
