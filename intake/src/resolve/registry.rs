use std::fmt;

use tracing::debug;

use super::rules::{
    ContainerLiteralRule, ListItemRule, SchemaHintRule, SingletonExtensionRule, SingletonFixedRule,
    TypeContainerRule,
};
use super::types::{ResolutionSource, ResolvedPath, RouteContext, RouteRule};
use crate::credit::CreditRouter;
use crate::record::{AggregateRecord, FieldPath};
use crate::schema::SchemaSet;

/// Ordered rule list; the first rule that answers wins
pub struct RouteRegistry {
    rules: Vec<Box<dyn RouteRule>>,
}

impl Default for RouteRegistry {
    fn default() -> Self {
        Self::empty()
            .with_rule(SingletonFixedRule)
            .with_rule(SingletonExtensionRule)
            .with_rule(ListItemRule)
            .with_rule(TypeContainerRule)
            .with_rule(ContainerLiteralRule)
            .with_rule(SchemaHintRule)
    }
}

impl fmt::Debug for RouteRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.rule_names()).finish()
    }
}

impl RouteRegistry {
    /// Registry with no rules; every key falls back to the root
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule after the existing ones
    #[must_use]
    pub fn with_rule(mut self, rule: impl RouteRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Insert a rule ahead of every existing one
    #[must_use]
    pub fn with_priority_rule(mut self, rule: impl RouteRule + 'static) -> Self {
        self.rules.insert(0, Box::new(rule));
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    fn resolve(&self, ctx: &RouteContext<'_>) -> Option<ResolvedPath> {
        self.rules.iter().find_map(|rule| {
            let resolved = rule.resolve(ctx)?;
            debug!("Resolved '{}' via {} -> {}", ctx.key, rule.name(), resolved.path);
            Some(resolved)
        })
    }
}

/// Maps flat schema keys to storage paths in the aggregate record
#[derive(Debug, Default)]
pub struct FieldPathResolver {
    registry: RouteRegistry,
    credit:   CreditRouter,
}

impl FieldPathResolver {
    pub const fn new(registry: RouteRegistry, credit: CreditRouter) -> Self {
        Self { registry, credit }
    }

    pub const fn credit(&self) -> &CreditRouter {
        &self.credit
    }

    /// Storage path for `key`
    ///
    /// Dotted keys (`parent.sub`, produced by object-structure expansion)
    /// resolve their first segment and append the rest. Keys no rule
    /// answers for become flat root keys.
    pub fn resolve(&self, record: &AggregateRecord, key: &str, schemas: &SchemaSet) -> ResolvedPath {
        if let Some((parent, rest)) = key.split_once('.')
            && let Ok(tail) = rest.parse::<FieldPath>()
        {
            let head = self.resolve_flat(record, parent, schemas);
            return ResolvedPath::new(head.path.join(&tail), head.source);
        }
        self.resolve_flat(record, key, schemas)
    }

    fn resolve_flat(&self, record: &AggregateRecord, key: &str, schemas: &SchemaSet) -> ResolvedPath {
        let ctx = RouteContext {
            record,
            key,
            schemas,
            credit: &self.credit,
        };
        self.registry.resolve(&ctx).unwrap_or_else(|| {
            debug!("No rule matched '{key}', using root key");
            ResolvedPath::new(FieldPath::root().key(key), ResolutionSource::RootFallback)
        })
    }
}

/// Resolve `key` with the built-in rules and no schema hints
pub fn resolve_path(record: &AggregateRecord, key: &str) -> ResolvedPath {
    FieldPathResolver::default().resolve(record, key, &SchemaSet::new())
}
