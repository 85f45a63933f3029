//! Built-in resolution rules, in precedence order

use super::types::{ResolutionSource, ResolvedPath, RouteContext, RouteRule, is_structural_key};
use crate::constants::{
    APPLICATIONS, CREDIT_DETAIL, CREDIT_TYPE_FIELD, DETAIL_EXTENSION, ECONOMIC_ACTIVITY, EXTENSION,
    FINANCIAL_INFO, LOCATIONS, PRINCIPAL, REFERENCES, TYPE_CONTAINERS,
};
use crate::credit::type_container_path;
use crate::record::{FieldPath, RecordNode};
use crate::schema::{EntityName, FieldKind};

/// Singleton containers with the name of their extension map
const SINGLETONS: &[(&str, &str)] = &[
    (PRINCIPAL, EXTENSION),
    (ECONOMIC_ACTIVITY, DETAIL_EXTENSION),
    (FINANCIAL_INFO, DETAIL_EXTENSION),
];

/// List containers with the name of their items' extension map
const LISTS: &[(&str, Option<&str>)] = &[
    (LOCATIONS, Some(DETAIL_EXTENSION)),
    (REFERENCES, Some(EXTENSION)),
    (APPLICATIONS, None),
];

fn holds_field(node: &RecordNode, key: &str) -> bool {
    !is_structural_key(key) && node.contains_key(key)
}

/// Fixed field of a singleton container
pub struct SingletonFixedRule;

impl RouteRule for SingletonFixedRule {
    fn name(&self) -> &'static str {
        "singleton_fixed"
    }

    fn resolve(&self, ctx: &RouteContext<'_>) -> Option<ResolvedPath> {
        SINGLETONS.iter().find_map(|(container, _)| {
            let node = ctx.record.section(container)?;
            holds_field(node, ctx.key).then(|| {
                ResolvedPath::new(
                    FieldPath::root().key(*container).key(ctx.key),
                    ResolutionSource::SingletonFixed,
                )
            })
        })
    }
}

/// Extension map of a singleton container
pub struct SingletonExtensionRule;

impl RouteRule for SingletonExtensionRule {
    fn name(&self) -> &'static str {
        "singleton_extension"
    }

    fn resolve(&self, ctx: &RouteContext<'_>) -> Option<ResolvedPath> {
        SINGLETONS.iter().find_map(|(container, extension)| {
            let node = ctx.record.section(container)?.get(extension)?;
            node.contains_key(ctx.key).then(|| {
                ResolvedPath::new(
                    FieldPath::root().key(*container).key(*extension).key(ctx.key),
                    ResolutionSource::SingletonExtension,
                )
            })
        })
    }
}

/// First item of a list entity, or that item's extension map
pub struct ListItemRule;

impl RouteRule for ListItemRule {
    fn name(&self) -> &'static str {
        "list_item"
    }

    fn resolve(&self, ctx: &RouteContext<'_>) -> Option<ResolvedPath> {
        LISTS.iter().find_map(|(container, extension)| {
            let item = ctx.record.section(container)?.index(0)?;
            let item_path = FieldPath::root().key(*container).index(0);
            if holds_field(item, ctx.key) {
                return Some(ResolvedPath::new(
                    item_path.key(ctx.key),
                    ResolutionSource::ListItem,
                ));
            }
            let extension = (*extension)?;
            item.get(extension)?.contains_key(ctx.key).then(|| {
                ResolvedPath::new(
                    item_path.key(extension).key(ctx.key),
                    ResolutionSource::ListItemExtension,
                )
            })
        })
    }
}

/// Existing key inside a per-type container
///
/// Application containers are probed first, the active type's container
/// ahead of the rest, then the economic activity's containers.
pub struct TypeContainerRule;

impl RouteRule for TypeContainerRule {
    fn name(&self) -> &'static str {
        "type_container"
    }

    fn resolve(&self, ctx: &RouteContext<'_>) -> Option<ResolvedPath> {
        let application_containers = FieldPath::root()
            .key(APPLICATIONS)
            .index(0)
            .key(CREDIT_DETAIL)
            .key(TYPE_CONTAINERS);
        let activity_containers = FieldPath::root().key(ECONOMIC_ACTIVITY).key(TYPE_CONTAINERS);
        let active = ctx.credit.active_container(ctx.record);

        [application_containers, activity_containers]
            .into_iter()
            .enumerate()
            .find_map(|(position, base)| {
                let containers = ctx.record.get(&base)?.as_map()?;
                let preferred = if position == 0 { active.as_deref() } else { None };
                preferred
                    .into_iter()
                    .chain(
                        containers
                            .keys()
                            .map(String::as_str)
                            .filter(|name| Some(*name) != preferred),
                    )
                    .find(|name| {
                        containers
                            .get(*name)
                            .is_some_and(|container| container.contains_key(ctx.key))
                    })
                    .map(|name| {
                        ResolvedPath::new(
                            base.clone().key(name).key(ctx.key),
                            ResolutionSource::TypeContainer,
                        )
                    })
            })
    }
}

/// The key is itself a known container name
pub struct ContainerLiteralRule;

impl RouteRule for ContainerLiteralRule {
    fn name(&self) -> &'static str {
        "container_literal"
    }

    fn resolve(&self, ctx: &RouteContext<'_>) -> Option<ResolvedPath> {
        ctx.credit.table().is_container(ctx.key).then(|| {
            ResolvedPath::new(
                type_container_path(ctx.key),
                ResolutionSource::ContainerLiteral,
            )
        })
    }
}

/// Key not present in the record but declared by a loaded schema
///
/// Fixed fields land on the entity container (first item for lists) and
/// dynamic fields in its extension map. Dynamic application fields go to the
/// type container of the credit type they depend on, or of the active type.
pub struct SchemaHintRule;

impl RouteRule for SchemaHintRule {
    fn name(&self) -> &'static str {
        "schema_hint"
    }

    fn resolve(&self, ctx: &RouteContext<'_>) -> Option<ResolvedPath> {
        let found = ctx.schemas.locate(ctx.key)?;
        let mut base = FieldPath::root().key(found.entity.container_key());
        if found.entity.is_list() {
            base = base.index(0);
        }

        let path = match (found.kind, found.entity.extension_key()) {
            (FieldKind::Fixed, _) => base.key(ctx.key),
            (FieldKind::Dynamic, Some(extension)) => base.key(extension).key(ctx.key),
            (FieldKind::Dynamic, None) if found.entity == EntityName::CreditApplication => {
                let container = found
                    .definition
                    .conditional_on
                    .as_ref()
                    .filter(|condition| condition.field == CREDIT_TYPE_FIELD)
                    .and_then(|condition| condition.value.as_str())
                    .map(|selector| ctx.credit.table().container_for(selector))
                    .or_else(|| ctx.credit.active_container(ctx.record))?;
                type_container_path(&container).key(ctx.key)
            }
            (FieldKind::Dynamic, None) => return None,
        };
        Some(ResolvedPath::new(path, ResolutionSource::SchemaHint))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test code")]

    use serde_json::json;

    use super::*;
    use crate::credit::CreditRouter;
    use crate::record::AggregateRecord;
    use crate::schema::SchemaSet;

    fn run(rule: &dyn RouteRule, record: &AggregateRecord, key: &str) -> Option<ResolvedPath> {
        let schemas = SchemaSet::new();
        let credit = CreditRouter::default();
        rule.resolve(&RouteContext {
            record,
            key,
            schemas: &schemas,
            credit: &credit,
        })
    }

    #[test]
    fn test_structural_keys_never_match_fixed_rules() {
        let record = AggregateRecord::from_value(json!({
            "principal": {"extension": {"nickname": "A"}, "identity": 5},
            "locations": [{"detail_extension": {}}]
        }))
        .unwrap();
        assert!(run(&SingletonFixedRule, &record, "extension").is_none());
        assert!(run(&SingletonFixedRule, &record, "identity").is_none());
        assert!(run(&ListItemRule, &record, "detail_extension").is_none());
    }

    #[test]
    fn test_type_container_prefers_active_type() {
        let record = AggregateRecord::from_value(json!({
            "applications": [{"credit_detail": {
                "type_selector": "vehicular",
                "type_containers": {
                    "mortgage_credit": {"term": 10},
                    "vehicle_credit": {"term": 5}
                }
            }}]
        }))
        .unwrap();
        let resolved = run(&TypeContainerRule, &record, "term").unwrap();
        assert_eq!(
            resolved.path.to_string(),
            "applications.0.credit_detail.type_containers.vehicle_credit.term"
        );
    }

    #[test]
    fn test_activity_type_containers_are_probed() {
        let record = AggregateRecord::from_value(json!({
            "economic_activity": {"type_containers": {"employee": {"employer": "ACME"}}}
        }))
        .unwrap();
        let resolved = run(&TypeContainerRule, &record, "employer").unwrap();
        assert_eq!(
            resolved.path.to_string(),
            "economic_activity.type_containers.employee.employer"
        );
    }
}
