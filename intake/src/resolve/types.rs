use serde::Serialize;
use strum::{AsRefStr, Display};

use crate::constants::STRUCTURAL_KEYS;
use crate::credit::CreditRouter;
use crate::record::{AggregateRecord, FieldPath};
use crate::schema::SchemaSet;

/// Which rule produced a [`ResolvedPath`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResolutionSource {
    /// Fixed field of `principal`, `economic_activity` or `financial_info`
    SingletonFixed,
    /// Extension map of one of the singleton containers
    SingletonExtension,
    /// Fixed field of the first item of a list entity
    ListItem,
    /// Extension map of the first item of a list entity
    ListItemExtension,
    /// Existing key inside a per-type container
    TypeContainer,
    /// The key names a type container itself
    ContainerLiteral,
    /// Key absent from the record, placed by schema membership
    SchemaHint,
    /// Rule registered by the embedding application
    Custom,
    /// Nothing matched; the key is used as a flat root key
    RootFallback,
}

/// Storage location for a flat field key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPath {
    pub path:   FieldPath,
    pub source: ResolutionSource,
}

impl ResolvedPath {
    pub const fn new(path: FieldPath, source: ResolutionSource) -> Self {
        Self { path, source }
    }
}

/// Everything a rule may consult
pub struct RouteContext<'a> {
    pub record:  &'a AggregateRecord,
    pub key:     &'a str,
    pub schemas: &'a SchemaSet,
    pub credit:  &'a CreditRouter,
}

/// One step of the resolution precedence
pub trait RouteRule: Send + Sync {
    /// Short name used in trace output
    fn name(&self) -> &'static str;

    /// Location for `ctx.key`, or `None` to defer to the next rule
    fn resolve(&self, ctx: &RouteContext<'_>) -> Option<ResolvedPath>;
}

/// Keys describing record structure rather than user data
pub fn is_structural_key(key: &str) -> bool {
    STRUCTURAL_KEYS.contains(&key)
}
