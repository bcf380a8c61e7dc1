//! Entity, artifact and template-data types shared by the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The unit of code generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// The provider itself.
    Provider,
    /// A managed resource.
    Resource,
    /// A data source.
    DataSource,
}

impl EntityKind {
    /// The role suffix used in file and template names.
    pub fn role(self) -> &'static str {
        match self {
            Self::Provider => "provider",
            Self::Resource => "resource",
            Self::DataSource => "data_source",
        }
    }

    /// Suffix of the Go type implementing an entity of this kind
    /// (`WidgetResource`).
    pub fn go_suffix(self) -> &'static str {
        match self {
            Self::Provider => "Provider",
            Self::Resource => "Resource",
            Self::DataSource => "DataSource",
        }
    }

    /// Output file name for an entity of this kind.
    ///
    /// Providers are singular: `provider_gen.go`. Resources and data sources
    /// are `<entity>_<role>_gen.go`. Test files add `_test` before `.go`.
    pub fn output_file_name(self, entity: &str, test: bool) -> String {
        let suffix = if test { "_gen_test.go" } else { "_gen.go" };
        match self {
            Self::Provider => format!("provider{}", suffix),
            Self::Resource | Self::DataSource => format!("{}_{}{}", entity, self.role(), suffix),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.role())
    }
}

/// Identifies one entity of a generation run.
///
/// A resource and a data source may share a name, so the kind is part of the
/// identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId {
    /// The entity kind.
    pub kind: EntityKind,
    /// The snake_case entity name.
    pub name: String,
}

impl EntityId {
    /// Create an entity id.
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Output file name of this entity's merged unit (or its test file).
    pub fn output_file_name(&self, test: bool) -> String {
        self.kind.output_file_name(&self.name, test)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// A category of generated output for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Framework schema definition.
    Schema,
    /// CRUD (or read/configure) method bodies.
    Operations,
    /// Model struct and nested object types.
    Model,
    /// Conversion functions from decoded API responses.
    Conversions,
    /// Custom type/value implementations.
    CustomTypeValue,
    /// Generated tests.
    Test,
}

impl ArtifactKind {
    /// All kinds in concatenation order.
    pub const ALL: [ArtifactKind; 6] = [
        Self::Schema,
        Self::Operations,
        Self::Model,
        Self::Conversions,
        Self::CustomTypeValue,
        Self::Test,
    ];

    /// The snake_case name used in template names.
    pub fn name(self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Operations => "operations",
            Self::Model => "model",
            Self::Conversions => "conversions",
            Self::CustomTypeValue => "custom_type_value",
            Self::Test => "test",
        }
    }

    /// Whether a failure on this artifact aborts the entity.
    pub fn is_primary(self) -> bool {
        matches!(
            self,
            Self::Schema | Self::Operations | Self::Model | Self::Conversions
        )
    }

    /// Whether this artifact goes to the `_test.go` file.
    pub fn is_test(self) -> bool {
        matches!(self, Self::Test)
    }

    /// Entity-specific override template name: `<entity>_<kind>.tmpl`.
    pub fn entity_template_name(self, entity: &str) -> String {
        format!("{}_{}.tmpl", entity, self.name())
    }

    /// Shared default override template name: `<kind>_default.tmpl`.
    pub fn default_template_name(self) -> String {
        format!("{}_default.tmpl", self.name())
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw generated text of one artifact kind, keyed by entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    /// The artifact kind.
    pub kind: ArtifactKind,
    /// Rendered text per entity.
    pub entries: BTreeMap<EntityId, String>,
}

impl GeneratedArtifact {
    /// Create an empty artifact of the given kind.
    pub fn new(kind: ArtifactKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    /// Record the text generated for an entity.
    pub fn insert(&mut self, entity: EntityId, text: impl Into<String>) {
        self.entries.insert(entity, text.into());
    }

    /// Text generated for an entity, if any.
    pub fn get(&self, entity: &EntityId) -> Option<&str> {
        self.entries.get(entity).map(String::as_str)
    }
}

/// Summary of one top-level attribute exposed to templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeData {
    /// Original snake_case name.
    pub name: String,
    /// Exported Go field name.
    pub field: String,
    /// Local binding name.
    pub var: String,
    /// Kind label (`string`, `list_nested`, ...).
    pub kind: String,
    /// Go type of the model field.
    pub go_type: String,
    /// Set by the provider.
    pub computed: bool,
    /// May be omitted in configuration.
    pub optional: bool,
    /// Must be set in configuration.
    pub required: bool,
    /// Hidden from plan output.
    pub sensitive: bool,
}

/// A package-local custom type, for the custom-type/value artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTypeData {
    /// The attr.Type implementation.
    pub type_name: String,
    /// The attr.Value implementation.
    pub value_type: String,
    /// Framework scalar the custom type wraps (`String`), naming the
    /// embedded `basetypes.StringType` and `basetypes.StringValue`.
    pub scalar: String,
}

/// Convergence settings rendered as Go expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitData {
    /// Pending states as a `[]string{...}` literal.
    pub pending: String,
    /// Target states as a `[]string{...}` literal.
    pub target: String,
    /// Failure states as a `[]string{...}` literal.
    pub failure: String,
    /// Go duration expression for the timeout.
    pub timeout: String,
    /// Go duration expression for the initial delay.
    pub delay: String,
    /// Go duration expression for the minimum poll interval.
    pub min_poll_interval: String,
}

/// Remote API wiring rendered into operation bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationsData {
    /// Collection path as a quoted Go string.
    pub path: String,
    /// Attribute holding the remote identifier, as a quoted Go string.
    pub id_attribute: String,
    /// Model field holding the remote identifier.
    pub id_field: String,
    /// Quoted response field holding the object status.
    pub status_field: String,
    /// Wait after create.
    pub create: Option<WaitData>,
    /// Wait after update.
    pub update: Option<WaitData>,
    /// Wait after delete.
    pub delete: Option<WaitData>,
    /// Whether create waits for convergence.
    pub has_create_wait: bool,
    /// Whether update waits for convergence.
    pub has_update_wait: bool,
    /// Whether delete waits for convergence.
    pub has_delete_wait: bool,
    /// Whether any operation waits for convergence.
    pub has_waits: bool,
}

/// Everything a template can reference for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateData {
    /// Snake_case entity name.
    pub name: String,
    /// Entity kind.
    pub kind: EntityKind,
    /// Go package of the generated files.
    pub package: String,
    /// Banner comment placed at the top of every file.
    pub header: String,
    /// Exported Go name prefix (`Widget`).
    pub type_name: String,
    /// Local Go name prefix (`widget`).
    pub var_name: String,
    /// Entity description as a quoted Go string.
    pub description: String,
    /// Provider type name (`acme`), used in type names of resources.
    pub provider_name: String,
    /// Go import path of the API client package.
    pub client_import: String,
    /// Imports needed by `schema_attributes`.
    pub schema_imports: Vec<String>,
    /// Imports needed by `model_fields` and `declarations`.
    pub model_imports: Vec<String>,
    /// Imports needed by `conversions`.
    pub conversion_imports: Vec<String>,
    /// Schema attribute entries (`"name": schema.StringAttribute{...},`).
    pub schema_attributes: String,
    /// Schema block entries (`"rule": schema.ListNestedBlock{...},`).
    pub schema_blocks: String,
    /// Model struct field lines.
    pub model_fields: String,
    /// Nested object type declarations.
    pub declarations: String,
    /// Go names of the nested object types in `declarations`.
    pub nested_types: Vec<String>,
    /// Conversion statements from `data map[string]any` into `model`.
    pub conversions: String,
    /// Top-level attribute summaries.
    pub attributes: Vec<AttributeData>,
    /// Package-local custom types this entity declares. A custom type used
    /// by several entities is declared by the first of them only.
    pub custom_types: Vec<CustomTypeData>,
    /// Remote API wiring (resources and data sources).
    pub operations: Option<OperationsData>,
    /// All resources sorted by name (provider only).
    pub resources: Vec<TemplateData>,
    /// All data sources sorted by name (provider only).
    pub data_sources: Vec<TemplateData>,
}

impl TemplateData {
    /// The entity this data describes.
    pub fn id(&self) -> EntityId {
        EntityId::new(self.kind, self.name.clone())
    }

    /// Package-level Go names the entity's built-in templates declare
    /// (`WidgetResource`, `WidgetResourceModel`).
    pub fn reserved_names(&self) -> [String; 2] {
        let go_name = format!("{}{}", self.type_name, self.kind.go_suffix());
        let model = format!("{}Model", go_name);
        [go_name, model]
    }
}
