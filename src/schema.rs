//! Schema IR consumed by the generator.
//!
//! The IR describes the provider configuration, every resource and every data
//! source as ordered trees of [`AttributeNode`]s. It arrives already parsed
//! (usually from JSON via [`ProviderSchema::from_json`]) and is never mutated
//! by the generator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::GeneratorError;
use crate::types::EntityKind;

/// Element type of a list, set or map attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    /// A boolean element.
    Bool,
    /// A string element.
    String,
    /// A 64-bit integer element.
    Int64,
    /// A 64-bit float element.
    Float64,
    /// An arbitrary-precision number element.
    Number,
    /// A nested list element.
    List(Box<ElementType>),
    /// A nested set element.
    Set(Box<ElementType>),
    /// A nested map element.
    Map(Box<ElementType>),
    /// An object element with named attribute types.
    Object(BTreeMap<String, ElementType>),
}

impl ElementType {
    /// Whether this element is a scalar.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Bool | Self::String | Self::Int64 | Self::Float64 | Self::Number
        )
    }

    /// Short label used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::String => "string",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Number => "number",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Object(_) => "object",
        }
    }
}

/// The kind of an attribute or block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttributeKind {
    /// A boolean value.
    Bool,
    /// A string value.
    String,
    /// A 64-bit integer.
    Int64,
    /// A 64-bit floating point number.
    Float64,
    /// An arbitrary-precision number.
    Number,
    /// An ordered list of a single element type.
    List {
        /// The element type.
        element_type: ElementType,
    },
    /// An unordered set of a single element type.
    Set {
        /// The element type.
        element_type: ElementType,
    },
    /// A string-keyed map of a single element type.
    Map {
        /// The element type.
        element_type: ElementType,
    },
    /// An object attribute whose fields are the node's children.
    Object,
    /// A single nested attribute.
    SingleNested,
    /// A list of nested attribute objects.
    ListNested,
    /// A set of nested attribute objects.
    SetNested,
    /// A map of nested attribute objects.
    MapNested,
    /// A single nested block.
    SingleNestedBlock,
    /// A list of nested block objects.
    ListNestedBlock,
    /// A set of nested block objects.
    SetNestedBlock,
}

impl AttributeKind {
    /// Whether this kind is a scalar.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Bool | Self::String | Self::Int64 | Self::Float64 | Self::Number
        )
    }

    /// Whether this kind carries child attributes.
    pub fn is_nested(&self) -> bool {
        matches!(
            self,
            Self::Object
                | Self::SingleNested
                | Self::ListNested
                | Self::SetNested
                | Self::MapNested
                | Self::SingleNestedBlock
                | Self::ListNestedBlock
                | Self::SetNestedBlock
        )
    }

    /// Whether this kind is a block rather than an attribute.
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            Self::SingleNestedBlock | Self::ListNestedBlock | Self::SetNestedBlock
        )
    }

    /// Short label used in diagnostics and generated comments.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::String => "string",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Number => "number",
            Self::List { .. } => "list",
            Self::Set { .. } => "set",
            Self::Map { .. } => "map",
            Self::Object => "object",
            Self::SingleNested => "single_nested",
            Self::ListNested => "list_nested",
            Self::SetNested => "set_nested",
            Self::MapNested => "map_nested",
            Self::SingleNestedBlock => "single_nested_block",
            Self::ListNestedBlock => "list_nested_block",
            Self::SetNestedBlock => "set_nested_block",
        }
    }
}

/// Describes how an attribute can be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComputedOptionalRequired {
    /// Set by the provider only.
    Computed,
    /// May be set in configuration.
    #[default]
    Optional,
    /// May be set in configuration, otherwise set by the provider.
    ComputedOptional,
    /// Must be set in configuration.
    Required,
}

impl ComputedOptionalRequired {
    /// Whether the attribute is computed.
    pub fn is_computed(self) -> bool {
        matches!(self, Self::Computed | Self::ComputedOptional)
    }

    /// Whether the attribute is optional.
    pub fn is_optional(self) -> bool {
        matches!(self, Self::Optional | Self::ComputedOptional)
    }

    /// Whether the attribute is required.
    pub fn is_required(self) -> bool {
        matches!(self, Self::Required)
    }
}

/// A user-supplied Go type that replaces the framework type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomType {
    /// Go import path providing the type, if not in the generated package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import: Option<String>,
    /// The attr.Type implementation (e.g. `timetypes.RFC3339Type{}`).
    #[serde(rename = "type")]
    pub type_name: String,
    /// The attr.Value implementation (e.g. `timetypes.RFC3339`).
    pub value_type: String,
}

impl CustomType {
    /// Create a custom type.
    pub fn new(type_name: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            import: None,
            type_name: type_name.into(),
            value_type: value_type.into(),
        }
    }

    /// Set the import path providing the type.
    pub fn with_import(mut self, import: impl Into<String>) -> Self {
        self.import = Some(import.into());
        self
    }
}

/// An opaque Go expression passed through to the generated schema.
///
/// Used for validators, plan modifiers and defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    /// The Go expression, emitted verbatim.
    pub expression: String,
    /// Import paths the expression needs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
}

impl Descriptor {
    /// Create a descriptor from a Go expression.
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            imports: Vec::new(),
        }
    }

    /// Add an import the expression depends on.
    pub fn with_import(mut self, import: impl Into<String>) -> Self {
        self.imports.push(import.into());
        self
    }
}

/// One attribute or block in the schema IR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeNode {
    /// The snake_case attribute name, unique among siblings.
    pub name: String,
    /// The attribute kind.
    #[serde(flatten)]
    pub kind: AttributeKind,
    /// Child attributes (nested kinds only).
    #[serde(rename = "attributes", default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AttributeNode>,
    /// How the attribute can be set.
    #[serde(default)]
    pub computed_optional_required: ComputedOptionalRequired,
    /// The attribute is sensitive and should be hidden in plans.
    #[serde(default)]
    pub sensitive: bool,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Custom Go type replacing the framework type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_type: Option<CustomType>,
    /// Validator expressions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Descriptor>,
    /// Plan modifier expressions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plan_modifiers: Vec<Descriptor>,
    /// Static or custom default expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Descriptor>,
}

impl AttributeNode {
    /// Create an attribute with the given kind and settability.
    pub fn new(
        name: impl Into<String>,
        kind: AttributeKind,
        computed_optional_required: ComputedOptionalRequired,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            children: Vec::new(),
            computed_optional_required,
            sensitive: false,
            description: None,
            custom_type: None,
            validators: Vec::new(),
            plan_modifiers: Vec::new(),
            default: None,
        }
    }

    /// Create a required string attribute.
    pub fn required_string(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::String, ComputedOptionalRequired::Required)
    }

    /// Create an optional string attribute.
    pub fn optional_string(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::String, ComputedOptionalRequired::Optional)
    }

    /// Create a computed string attribute.
    pub fn computed_string(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::String, ComputedOptionalRequired::Computed)
    }

    /// Create a required int64 attribute.
    pub fn required_int64(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Int64, ComputedOptionalRequired::Required)
    }

    /// Create an optional int64 attribute.
    pub fn optional_int64(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Int64, ComputedOptionalRequired::Optional)
    }

    /// Create a computed int64 attribute.
    pub fn computed_int64(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Int64, ComputedOptionalRequired::Computed)
    }

    /// Create a required bool attribute.
    pub fn required_bool(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Bool, ComputedOptionalRequired::Required)
    }

    /// Create an optional bool attribute.
    pub fn optional_bool(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Bool, ComputedOptionalRequired::Optional)
    }

    /// Create a computed bool attribute.
    pub fn computed_bool(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Bool, ComputedOptionalRequired::Computed)
    }

    /// Create a list attribute of scalar elements.
    pub fn list(
        name: impl Into<String>,
        element_type: ElementType,
        computed_optional_required: ComputedOptionalRequired,
    ) -> Self {
        Self::new(
            name,
            AttributeKind::List { element_type },
            computed_optional_required,
        )
    }

    /// Create a single nested attribute with the given children.
    pub fn single_nested(
        name: impl Into<String>,
        computed_optional_required: ComputedOptionalRequired,
        children: Vec<AttributeNode>,
    ) -> Self {
        Self::new(name, AttributeKind::SingleNested, computed_optional_required)
            .with_children(children)
    }

    /// Create a list nested attribute with the given children.
    pub fn list_nested(
        name: impl Into<String>,
        computed_optional_required: ComputedOptionalRequired,
        children: Vec<AttributeNode>,
    ) -> Self {
        Self::new(name, AttributeKind::ListNested, computed_optional_required)
            .with_children(children)
    }

    /// Create a single nested block with the given children.
    pub fn single_nested_block(name: impl Into<String>, children: Vec<AttributeNode>) -> Self {
        Self::new(
            name,
            AttributeKind::SingleNestedBlock,
            ComputedOptionalRequired::Optional,
        )
        .with_children(children)
    }

    /// Create a list nested block with the given children.
    pub fn list_nested_block(name: impl Into<String>, children: Vec<AttributeNode>) -> Self {
        Self::new(
            name,
            AttributeKind::ListNestedBlock,
            ComputedOptionalRequired::Optional,
        )
        .with_children(children)
    }

    /// Append a child attribute.
    pub fn with_child(mut self, child: AttributeNode) -> Self {
        self.children.push(child);
        self
    }

    /// Append several child attributes.
    pub fn with_children(mut self, children: impl IntoIterator<Item = AttributeNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Set the description for this attribute.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark this attribute as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Replace the framework type with a custom type.
    pub fn with_custom_type(mut self, custom_type: CustomType) -> Self {
        self.custom_type = Some(custom_type);
        self
    }

    /// Add a validator expression.
    pub fn with_validator(mut self, validator: Descriptor) -> Self {
        self.validators.push(validator);
        self
    }

    /// Add a plan modifier expression.
    pub fn with_plan_modifier(mut self, modifier: Descriptor) -> Self {
        self.plan_modifiers.push(modifier);
        self
    }

    /// Set the default expression.
    pub fn with_default(mut self, default: Descriptor) -> Self {
        self.default = Some(default);
        self
    }
}

/// Convergence settings for one lifecycle operation of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitSpec {
    /// States in which the operation is still in progress.
    pub pending: Vec<String>,
    /// States that complete the operation.
    pub target: Vec<String>,
    /// States that end the operation with a failure.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failure: Vec<String>,
    /// Overall timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Delay before the first poll, in seconds.
    #[serde(default)]
    pub delay_seconds: u64,
    /// Minimum interval between polls, in seconds.
    #[serde(default = "default_min_poll_seconds")]
    pub min_poll_interval_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    1200
}

fn default_min_poll_seconds() -> u64 {
    5
}

impl WaitSpec {
    /// Create a wait spec with default timings.
    pub fn new(
        pending: impl IntoIterator<Item = impl Into<String>>,
        target: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            failure: Vec::new(),
            timeout_seconds: default_timeout_seconds(),
            delay_seconds: 0,
            min_poll_interval_seconds: default_min_poll_seconds(),
        }
    }

    /// Set the failure states.
    pub fn with_failure(mut self, failure: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.failure = failure.into_iter().map(Into::into).collect();
        self
    }

    /// Set the overall timeout.
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Set the delay before the first poll.
    pub fn with_delay_seconds(mut self, seconds: u64) -> Self {
        self.delay_seconds = seconds;
        self
    }

    /// The overall timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// The delay before the first poll.
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_seconds)
    }

    /// The minimum interval between polls.
    pub fn min_poll_interval(&self) -> Duration {
        Duration::from_secs(self.min_poll_interval_seconds)
    }
}

/// How generated lifecycle operations talk to the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationsSpec {
    /// Collection path of the remote API (e.g. `/v1/widgets`).
    pub path: String,
    /// Attribute holding the remote identifier.
    #[serde(default = "default_id_attribute")]
    pub id_attribute: String,
    /// Field of the API response holding the object status.
    #[serde(default = "default_status_field")]
    pub status_field: String,
    /// Wait applied after create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<WaitSpec>,
    /// Wait applied after update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<WaitSpec>,
    /// Wait applied after delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<WaitSpec>,
}

fn default_id_attribute() -> String {
    "id".to_string()
}

fn default_status_field() -> String {
    "status".to_string()
}

impl OperationsSpec {
    /// Create operations for an API collection path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            id_attribute: default_id_attribute(),
            status_field: default_status_field(),
            create: None,
            update: None,
            delete: None,
        }
    }

    /// Wait for convergence after create.
    pub fn with_create_wait(mut self, wait: WaitSpec) -> Self {
        self.create = Some(wait);
        self
    }

    /// Wait for convergence after update.
    pub fn with_update_wait(mut self, wait: WaitSpec) -> Self {
        self.update = Some(wait);
        self
    }

    /// Wait for convergence after delete.
    pub fn with_delete_wait(mut self, wait: WaitSpec) -> Self {
        self.delete = Some(wait);
        self
    }
}

/// Schema of one resource, data source, or the provider itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    /// The snake_case entity name.
    pub name: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Top-level attributes in declaration order.
    #[serde(default)]
    pub attributes: Vec<AttributeNode>,
    /// Remote API wiring for lifecycle operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations: Option<OperationsSpec>,
}

impl EntitySchema {
    /// Create an empty entity schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            attributes: Vec::new(),
            operations: None,
        }
    }

    /// Add a top-level attribute.
    pub fn with_attribute(mut self, attribute: AttributeNode) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the lifecycle operations.
    pub fn with_operations(mut self, operations: OperationsSpec) -> Self {
        self.operations = Some(operations);
        self
    }
}

/// The complete schema IR of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSchema {
    /// Schema for provider configuration.
    pub provider: EntitySchema,
    /// Resource schemas.
    #[serde(default)]
    pub resources: Vec<EntitySchema>,
    /// Data source schemas.
    #[serde(default)]
    pub data_sources: Vec<EntitySchema>,
}

impl ProviderSchema {
    /// Create a provider schema with an empty configuration block.
    pub fn new(provider_name: impl Into<String>) -> Self {
        Self {
            provider: EntitySchema::new(provider_name),
            resources: Vec::new(),
            data_sources: Vec::new(),
        }
    }

    /// Parse a provider schema from JSON.
    pub fn from_json(json: &str) -> Result<Self, GeneratorError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the provider configuration schema.
    pub fn with_provider_config(mut self, schema: EntitySchema) -> Self {
        self.provider = schema;
        self
    }

    /// Add a resource schema.
    pub fn with_resource(mut self, schema: EntitySchema) -> Self {
        self.resources.push(schema);
        self
    }

    /// Add a data source schema.
    pub fn with_data_source(mut self, schema: EntitySchema) -> Self {
        self.data_sources.push(schema);
        self
    }

    /// Iterate over every entity with its kind: provider first, then
    /// resources, then data sources.
    pub fn entities(&self) -> impl Iterator<Item = (EntityKind, &EntitySchema)> {
        std::iter::once((EntityKind::Provider, &self.provider))
            .chain(self.resources.iter().map(|r| (EntityKind::Resource, r)))
            .chain(self.data_sources.iter().map(|d| (EntityKind::DataSource, d)))
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// An error that prevents the entity from being generated.
    Error,
    /// A warning; generation continues.
    Warning,
}

/// A diagnostic produced while generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity of the diagnostic.
    pub severity: DiagnosticSeverity,
    /// A short summary of the issue.
    pub summary: String,
    /// A detailed description of the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The entity the diagnostic belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// The attribute path where the issue occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            entity: None,
            attribute: None,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
            entity: None,
            attribute: None,
        }
    }

    /// Add detail to this diagnostic.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the entity this diagnostic belongs to.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Set the attribute path for this diagnostic.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this is an error diagnostic.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}
