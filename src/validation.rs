//! Schema IR validation.
//!
//! Validation runs before compilation and reports every problem it finds in
//! one pass, so a schema author sees the full list rather than the first
//! compile failure.
//!
//! # Example
//!
//! ```
//! use hemmer_provider_generator::schema::{AttributeNode, EntitySchema, ProviderSchema};
//! use hemmer_provider_generator::validation::validate;
//!
//! let schema = ProviderSchema::new("acme").with_resource(
//!     EntitySchema::new("widget")
//!         .with_attribute(AttributeNode::computed_string("id"))
//!         .with_attribute(AttributeNode::required_string("name")),
//! );
//! assert!(validate(&schema).is_empty());
//!
//! // Duplicate sibling names are rejected
//! let schema = ProviderSchema::new("acme").with_resource(
//!     EntitySchema::new("widget")
//!         .with_attribute(AttributeNode::computed_string("id"))
//!         .with_attribute(AttributeNode::required_string("name"))
//!         .with_attribute(AttributeNode::optional_string("name")),
//! );
//! let diagnostics = validate(&schema);
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("name".to_string()));
//! ```

use crate::compiler::NamePath;
use crate::schema::{
    AttributeKind, AttributeNode, Diagnostic, EntitySchema, ProviderSchema, WaitSpec,
};
use crate::types::{EntityId, EntityKind};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Validate every entity of a provider schema.
///
/// Returns errors and warnings; an empty list means the schema is valid.
/// Every diagnostic carries the entity name it belongs to.
///
/// # Validation Rules
///
/// - Entity and attribute names are snake_case identifiers
/// - Entity names are unique per kind
/// - Sibling attribute names are unique
/// - Nested kinds have children and scalar kinds have none
/// - Blocks are not computed, sensitive or defaulted, and only blocks contain blocks
/// - No two nested objects map to the same Go type name
/// - Custom types only replace scalar and collection attributes
/// - Resources have a top-level string attribute for the remote identifier
/// - Convergence waits have targets and disjoint state sets
pub fn validate(schema: &ProviderSchema) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut seen = BTreeSet::new();
    for (kind, entity) in schema.entities() {
        if !seen.insert(EntityId::new(kind, entity.name.clone())) {
            diagnostics.push(
                Diagnostic::error(format!("Duplicate {} '{}'", kind, entity.name))
                    .with_entity(&entity.name),
            );
            continue;
        }
        diagnostics.extend(validate_entity(kind, entity));
    }
    diagnostics
}

/// Validate a provider schema, returning Ok if it has no errors or Err with
/// the error diagnostics.
///
/// Warnings do not make a schema invalid.
pub fn validate_result(schema: &ProviderSchema) -> Result<(), Vec<Diagnostic>> {
    let errors: Vec<_> = validate(schema).into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check if a provider schema has no validation errors.
pub fn is_valid(schema: &ProviderSchema) -> bool {
    validate_result(schema).is_ok()
}

/// Validate one entity.
pub fn validate_entity(kind: EntityKind, entity: &EntitySchema) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    if !is_snake_ident(&entity.name) {
        diagnostics.push(
            Diagnostic::error(format!("Invalid {} name '{}'", kind, entity.name))
                .with_detail("Names must be snake_case identifiers"),
        );
    }

    validate_siblings(&entity.attributes, "", &mut diagnostics);
    check_type_names(
        &entity.attributes,
        &NamePath::root(),
        &mut BTreeMap::new(),
        &mut diagnostics,
    );

    match kind {
        EntityKind::Provider => {
            if entity.operations.is_some() {
                diagnostics.push(
                    Diagnostic::warning("Provider operations are ignored")
                        .with_detail("Only resources and data sources talk to the remote API"),
                );
            }
        },
        EntityKind::Resource => {
            let id_attribute = entity
                .operations
                .as_ref()
                .map_or("id", |ops| ops.id_attribute.as_str());
            check_id_attribute(entity, id_attribute, &mut diagnostics);
        },
        EntityKind::DataSource => {},
    }

    if let Some(ops) = &entity.operations {
        if kind == EntityKind::Resource {
            let waits = [
                ("create", &ops.create),
                ("update", &ops.update),
                ("delete", &ops.delete),
            ];
            for (operation, wait) in waits {
                if let Some(wait) = wait {
                    validate_wait(operation, wait, &mut diagnostics);
                }
            }
        } else if ops.create.is_some() || ops.update.is_some() || ops.delete.is_some() {
            diagnostics.push(Diagnostic::warning(format!(
                "Convergence waits on a {} are ignored",
                kind
            )));
        }
    }

    diagnostics
        .into_iter()
        .map(|d| d.with_entity(&entity.name))
        .collect()
}

fn validate_siblings(nodes: &[AttributeNode], parent: &str, diagnostics: &mut Vec<Diagnostic>) {
    let mut names = HashSet::new();

    for node in nodes {
        let path = join_path(parent, &node.name);

        if !names.insert(node.name.as_str()) {
            diagnostics.push(
                Diagnostic::error(format!("Duplicate attribute '{}'", path)).with_attribute(&path),
            );
            continue;
        }
        if !is_snake_ident(&node.name) {
            diagnostics.push(
                Diagnostic::error(format!("Invalid attribute name '{}'", path))
                    .with_detail("Names must be snake_case identifiers")
                    .with_attribute(&path),
            );
        }

        validate_node(node, &path, diagnostics);
    }
}

fn validate_node(node: &AttributeNode, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    if node.kind.is_nested() {
        if node.children.is_empty() {
            diagnostics.push(
                Diagnostic::error(format!("Nested attribute '{}' has no attributes", path))
                    .with_attribute(path),
            );
        }
        if node.custom_type.is_some() {
            diagnostics.push(
                Diagnostic::error(format!("Custom type on nested attribute '{}'", path))
                    .with_detail("Custom types replace scalar and collection attributes only")
                    .with_attribute(path),
            );
        }
        if node.kind.is_block() {
            let cor = node.computed_optional_required;
            if cor.is_computed() || node.sensitive || node.default.is_some() {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' cannot be computed, sensitive or defaulted",
                        path
                    ))
                    .with_attribute(path),
                );
            }
        } else {
            for child in node.children.iter().filter(|c| c.kind.is_block()) {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Nested attribute '{}' cannot contain block '{}'",
                        path, child.name
                    ))
                    .with_detail("Only blocks can contain blocks")
                    .with_attribute(path),
                );
            }
        }
        validate_siblings(&node.children, path, diagnostics);
    } else if !node.children.is_empty() {
        diagnostics.push(
            Diagnostic::error(format!(
                "Attribute '{}' of kind {} cannot have attributes",
                path,
                node.kind.label()
            ))
            .with_attribute(path),
        );
    }

    if let AttributeKind::List { element_type }
    | AttributeKind::Set { element_type }
    | AttributeKind::Map { element_type } = &node.kind
    {
        if !element_type.is_scalar() {
            diagnostics.push(
                Diagnostic::error(format!(
                    "Unsupported element type {} for '{}'",
                    element_type.label(),
                    path
                ))
                .with_detail("Use a nested attribute for collections of objects")
                .with_attribute(path),
            );
        }
    }

    if node.default.is_some() && !node.computed_optional_required.is_computed() {
        diagnostics.push(
            Diagnostic::warning(format!("Default on non-computed attribute '{}'", path))
                .with_detail("The framework only applies defaults to computed attributes")
                .with_attribute(path),
        );
    }
}

/// Nested objects become Go types named by their path, and `a.b` and `a_b`
/// both become `AB`.
fn check_type_names(
    nodes: &[AttributeNode],
    parent: &NamePath,
    seen: &mut BTreeMap<String, String>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for node in nodes.iter().filter(|n| n.kind.is_nested()) {
        let path = parent.child(&node.name);
        let dotted = path.dotted();
        match seen.get(&path.type_name()) {
            // Duplicate siblings are reported on their own.
            Some(first) if *first == dotted => {},
            Some(first) => diagnostics.push(
                Diagnostic::error(format!(
                    "Attributes '{}' and '{}' map to the same Go type '{}'",
                    first,
                    dotted,
                    path.type_name()
                ))
                .with_attribute(&dotted),
            ),
            None => {
                seen.insert(path.type_name(), dotted);
            },
        }
        check_type_names(&node.children, &path, seen, diagnostics);
    }
}

fn check_id_attribute(
    entity: &EntitySchema,
    id_attribute: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match entity.attributes.iter().find(|a| a.name == id_attribute) {
        Some(node) if node.kind == AttributeKind::String && node.custom_type.is_none() => {},
        Some(_) => diagnostics.push(
            Diagnostic::error(format!("Identifier attribute '{}' must be a string", id_attribute))
                .with_attribute(id_attribute),
        ),
        None => diagnostics.push(
            Diagnostic::error(format!("Missing identifier attribute '{}'", id_attribute))
                .with_detail("Resources keep the remote identifier in a top-level string"),
        ),
    }
}

fn validate_wait(operation: &str, wait: &WaitSpec, diagnostics: &mut Vec<Diagnostic>) {
    if wait.target.is_empty() {
        diagnostics.push(Diagnostic::error(format!(
            "Wait after {} has no target states",
            operation
        )));
    }
    let pending: BTreeSet<_> = wait.pending.iter().collect();
    let target: BTreeSet<_> = wait.target.iter().collect();
    let failure: BTreeSet<_> = wait.failure.iter().collect();
    for state in pending.intersection(&target) {
        diagnostics.push(Diagnostic::error(format!(
            "Wait after {}: state '{}' is both pending and target",
            operation, state
        )));
    }
    for state in failure.intersection(&target).chain(failure.intersection(&pending)) {
        diagnostics.push(Diagnostic::error(format!(
            "Wait after {}: failure state '{}' overlaps another state set",
            operation, state
        )));
    }
    if wait.timeout_seconds == 0 {
        diagnostics.push(Diagnostic::error(format!("Wait after {} has a zero timeout", operation)));
    }
    if wait.min_poll_interval_seconds == 0 {
        diagnostics.push(Diagnostic::error(format!(
            "Wait after {} has a zero poll interval",
            operation
        )));
    }
}

fn is_snake_ident(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !name.ends_with('_')
        && !name.contains("__")
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        ComputedOptionalRequired, CustomType, Descriptor, ElementType, OperationsSpec,
    };

    fn widget() -> EntitySchema {
        EntitySchema::new("widget")
            .with_attribute(AttributeNode::computed_string("id"))
            .with_attribute(AttributeNode::required_string("name"))
    }

    fn errors(diagnostics: &[Diagnostic]) -> Vec<&str> {
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| d.summary.as_str())
            .collect()
    }

    #[test]
    fn test_valid_schema() {
        let schema = ProviderSchema::new("acme")
            .with_resource(widget())
            .with_data_source(
                EntitySchema::new("widget")
                    .with_attribute(AttributeNode::computed_string("name")),
            );
        assert!(validate(&schema).is_empty());
        assert!(is_valid(&schema));
    }

    #[test]
    fn test_duplicate_entities() {
        let schema = ProviderSchema::new("acme")
            .with_resource(widget())
            .with_resource(widget());
        let diagnostics = validate(&schema);
        assert_eq!(errors(&diagnostics), vec!["Duplicate resource 'widget'"]);
        assert_eq!(diagnostics[0].entity, Some("widget".to_string()));
    }

    #[test]
    fn test_invalid_names() {
        let entity = widget()
            .with_attribute(AttributeNode::optional_string("DisplayName"))
            .with_attribute(AttributeNode::optional_string("trailing_"));
        let diagnostics = validate_entity(EntityKind::Resource, &entity);
        assert_eq!(
            errors(&diagnostics),
            vec![
                "Invalid attribute name 'DisplayName'",
                "Invalid attribute name 'trailing_'"
            ]
        );

        let diagnostics = validate_entity(EntityKind::DataSource, &EntitySchema::new("2fa"));
        assert_eq!(errors(&diagnostics), vec!["Invalid data_source name '2fa'"]);
    }

    #[test]
    fn test_nested_shape() {
        let entity = widget()
            .with_attribute(AttributeNode::single_nested(
                "settings",
                Default::default(),
                Vec::new(),
            ))
            .with_attribute(
                AttributeNode::required_string("label")
                    .with_child(AttributeNode::optional_string("inner")),
            );
        let diagnostics = validate_entity(EntityKind::Resource, &entity);
        assert_eq!(
            errors(&diagnostics),
            vec![
                "Nested attribute 'settings' has no attributes",
                "Attribute 'label' of kind string cannot have attributes"
            ]
        );
    }

    #[test]
    fn test_nested_paths() {
        let entity = widget().with_attribute(
            AttributeNode::list_nested("rules", Default::default(), Vec::new())
                .with_child(AttributeNode::required_string("port"))
                .with_child(AttributeNode::required_string("port")),
        );
        let diagnostics = validate_entity(EntityKind::Resource, &entity);
        assert_eq!(errors(&diagnostics), vec!["Duplicate attribute 'rules.port'"]);
        assert_eq!(diagnostics[0].attribute, Some("rules.port".to_string()));
        assert_eq!(diagnostics[0].entity, Some("widget".to_string()));
    }

    #[test]
    fn test_custom_type_on_nested() {
        let entity = widget().with_attribute(
            AttributeNode::single_nested("settings", Default::default(), Vec::new())
                .with_child(AttributeNode::optional_string("mode"))
                .with_custom_type(CustomType::new("SettingsType", "SettingsValue")),
        );
        let diagnostics = validate_entity(EntityKind::Resource, &entity);
        assert_eq!(errors(&diagnostics), vec!["Custom type on nested attribute 'settings'"]);
    }

    #[test]
    fn test_unsupported_element() {
        let entity = widget().with_attribute(AttributeNode::list(
            "items",
            ElementType::Object(Default::default()),
            Default::default(),
        ));
        let diagnostics = validate_entity(EntityKind::Resource, &entity);
        assert_eq!(errors(&diagnostics), vec!["Unsupported element type object for 'items'"]);
    }

    #[test]
    fn test_default_on_required_warns() {
        let entity = widget().with_attribute(
            AttributeNode::required_string("region")
                .with_default(Descriptor::new("stringdefault.StaticString(\"us\")")),
        );
        let diagnostics = validate_entity(EntityKind::Resource, &entity);
        assert!(errors(&diagnostics).is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics[0].is_error());
        assert!(is_valid(&ProviderSchema::new("acme").with_resource(entity)));
    }

    #[test]
    fn test_identifier_attribute() {
        let entity =
            EntitySchema::new("widget").with_attribute(AttributeNode::required_string("name"));
        let diagnostics = validate_entity(EntityKind::Resource, &entity);
        assert_eq!(errors(&diagnostics), vec!["Missing identifier attribute 'id'"]);

        let entity = EntitySchema::new("widget")
            .with_attribute(AttributeNode::computed_int64("id"))
            .with_operations(OperationsSpec::new("/v1/widgets"));
        let diagnostics = validate_entity(EntityKind::Resource, &entity);
        assert_eq!(errors(&diagnostics), vec!["Identifier attribute 'id' must be a string"]);

        let mut ops = OperationsSpec::new("/v1/widgets");
        ops.id_attribute = "uuid".to_string();
        let entity = EntitySchema::new("widget")
            .with_attribute(AttributeNode::computed_string("uuid"))
            .with_operations(ops);
        assert!(validate_entity(EntityKind::Resource, &entity).is_empty());

        // Data sources read by query and need no identifier.
        let entity =
            EntitySchema::new("widgets").with_attribute(AttributeNode::computed_string("name"));
        assert!(validate_entity(EntityKind::DataSource, &entity).is_empty());
    }

    #[test]
    fn test_wait_specs() {
        let entity = widget().with_operations(
            OperationsSpec::new("/v1/widgets")
                .with_create_wait(
                    WaitSpec::new(["creating"], ["active"]).with_failure(["failed", "active"]),
                )
                .with_delete_wait(
                    WaitSpec::new(["deleting"], Vec::<String>::new()).with_timeout_seconds(0),
                ),
        );
        let diagnostics = validate_entity(EntityKind::Resource, &entity);
        assert_eq!(
            errors(&diagnostics),
            vec![
                "Wait after create: failure state 'active' overlaps another state set",
                "Wait after delete has no target states",
                "Wait after delete has a zero timeout"
            ]
        );
    }

    #[test]
    fn test_ignored_operations_warn() {
        let provider = EntitySchema::new("acme").with_operations(OperationsSpec::new("/"));
        let diagnostics = validate_entity(EntityKind::Provider, &provider);
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics[0].is_error());

        let data_source = EntitySchema::new("widgets").with_operations(
            OperationsSpec::new("/v1/widgets").with_create_wait(WaitSpec::new(["a"], ["b"])),
        );
        let diagnostics = validate_entity(EntityKind::DataSource, &data_source);
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics[0].is_error());
    }

    #[test]
    fn test_validate_result() {
        let schema = ProviderSchema::new("acme").with_resource(EntitySchema::new("widget"));
        let errors = validate_result(&schema).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(!is_valid(&schema));
    }

    #[test]
    fn test_colliding_type_names() {
        let entity = widget()
            .with_attribute(AttributeNode::single_nested(
                "a",
                Default::default(),
                vec![AttributeNode::single_nested(
                    "b",
                    Default::default(),
                    vec![AttributeNode::optional_string("x")],
                )],
            ))
            .with_attribute(AttributeNode::single_nested(
                "a_b",
                Default::default(),
                vec![AttributeNode::optional_string("y")],
            ));
        let diagnostics = validate_entity(EntityKind::Resource, &entity);
        assert_eq!(
            errors(&diagnostics),
            vec!["Attributes 'a.b' and 'a_b' map to the same Go type 'AB'"]
        );
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("a_b"));
    }

    #[test]
    fn test_block_rules() {
        let entity = widget()
            .with_attribute(
                AttributeNode::new(
                    "status",
                    AttributeKind::SingleNestedBlock,
                    ComputedOptionalRequired::Computed,
                )
                .with_child(AttributeNode::computed_string("phase")),
            )
            .with_attribute(AttributeNode::single_nested(
                "config",
                Default::default(),
                vec![AttributeNode::list_nested_block(
                    "rule",
                    vec![AttributeNode::required_int64("port")],
                )],
            ))
            .with_attribute(AttributeNode::list_nested_block(
                "listener",
                vec![AttributeNode::single_nested_block(
                    "tls",
                    vec![AttributeNode::optional_string("cert")],
                )],
            ));
        let diagnostics = validate_entity(EntityKind::Resource, &entity);
        assert_eq!(
            errors(&diagnostics),
            vec![
                "Block 'status' cannot be computed, sensitive or defaulted",
                "Nested attribute 'config' cannot contain block 'rule'",
            ]
        );
    }
}
