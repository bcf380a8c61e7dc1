//! The generation driver.
//!
//! [`Generator`] turns a [`ProviderSchema`] into Go source files:
//!
//! 1. every entity is validated and compiled into [`TemplateData`]
//! 2. the provider's data gets the sorted resource and data-source lists
//! 3. each entity runs through the [`Pipeline`]
//!
//! Entities fail independently; the [`GenerationOutput`] holds the files of
//! every entity that succeeded plus the error of every entity that did not.
//!
//! # Example
//!
//! ```
//! use hemmer_provider_generator::generator::{Generator, GeneratorConfig};
//! use hemmer_provider_generator::schema::{AttributeNode, EntitySchema, ProviderSchema};
//!
//! let schema = ProviderSchema::new("acme").with_resource(
//!     EntitySchema::new("widget")
//!         .with_attribute(AttributeNode::computed_string("id"))
//!         .with_attribute(AttributeNode::required_string("name")),
//! );
//!
//! let generator = Generator::new(GeneratorConfig::default()).unwrap();
//! let output = generator.generate(&schema);
//! assert!(output.is_success());
//! assert!(output.file("widget_resource_gen.go").is_some());
//! ```

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::casing::{to_camel, to_pascal};
use crate::compiler::{go_quote, Compiler};
use crate::error::GeneratorError;
use crate::pipeline::{with_entity_lists, GenerationOutput, Pipeline};
use crate::schema::{
    AttributeNode, Diagnostic, EntitySchema, OperationsSpec, ProviderSchema, WaitSpec,
};
use crate::templates::{MemoryTemplateSource, TemplateRegistry, TemplateSource};
use crate::types::{
    AttributeData, CustomTypeData, EntityId, EntityKind, OperationsData, TemplateData, WaitData,
};
use crate::validation::validate_entity;

/// Default banner placed at the top of every generated file.
pub const DEFAULT_HEADER: &str = "// Code generated by hemmer-provider-generator. DO NOT EDIT.";

/// Default Go import path of the API client package.
pub const DEFAULT_CLIENT_IMPORT: &str = "internal/client";

/// Configuration for a generation run.
///
/// Every field has a default, so a JSON config only needs the fields it
/// changes.
///
/// # Example
///
/// ```
/// use hemmer_provider_generator::generator::GeneratorConfig;
///
/// let config = GeneratorConfig::new()
///     .with_package("acme")
///     .with_client_import("github.com/acme/terraform-provider-acme/internal/client")
///     .with_concurrency(4);
/// assert_eq!(config.package, "acme");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Go package name of the generated files.
    pub package: String,
    /// Provider type name. Defaults to the provider entity's name.
    pub provider_name: Option<String>,
    /// Go import path of the API client package.
    pub client_import: String,
    /// Banner comment placed at the top of every file.
    pub header: String,
    /// Maximum number of entities processed in parallel by
    /// [`Generator::generate_concurrent`].
    pub concurrency: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            package: "provider".to_string(),
            provider_name: None,
            client_import: DEFAULT_CLIENT_IMPORT.to_string(),
            header: DEFAULT_HEADER.to_string(),
            concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

impl GeneratorConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from JSON.
    pub fn from_json(json: &str) -> Result<Self, GeneratorError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the Go package name.
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    /// Set the provider type name.
    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }

    /// Set the Go import path of the API client package.
    pub fn with_client_import(mut self, import: impl Into<String>) -> Self {
        self.client_import = import.into();
        self
    }

    /// Set the generated-file banner.
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// Set the maximum number of entities processed in parallel.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Generates Go provider code from a schema IR.
#[derive(Debug)]
pub struct Generator<S = MemoryTemplateSource> {
    config: GeneratorConfig,
    registry: Arc<TemplateRegistry>,
    source: Arc<S>,
}

impl Generator<MemoryTemplateSource> {
    /// Create a generator with the built-in templates and no overrides.
    pub fn new(config: GeneratorConfig) -> Result<Self, GeneratorError> {
        Ok(Self {
            config,
            registry: Arc::new(TemplateRegistry::builtin()?),
            source: Arc::new(MemoryTemplateSource::new()),
        })
    }
}

impl<S> Generator<S>
where
    S: TemplateSource + 'static,
{
    /// Use `source` for override templates.
    pub fn with_source<T: TemplateSource>(self, source: T) -> Generator<T> {
        Generator {
            config: self.config,
            registry: self.registry,
            source: Arc::new(source),
        }
    }

    /// Replace the built-in template registry.
    pub fn with_registry(mut self, registry: TemplateRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// The run configuration.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate every entity of `schema`, one after another.
    pub fn generate(&self, schema: &ProviderSchema) -> GenerationOutput {
        let mut out = GenerationOutput::default();
        let entities = self.prepare(schema, &mut out);
        let pipeline = Pipeline::new(&self.registry, self.source.as_ref());
        for data in with_entity_lists(&entities) {
            out.record(data.id(), pipeline.process_entity(&data));
        }
        info!(
            files = out.files.len(),
            failed = out.errors.len(),
            "generated provider {}",
            schema.provider.name
        );
        out
    }

    /// Generate every entity of `schema`, processing up to
    /// [`GeneratorConfig::concurrency`] entities in parallel.
    ///
    /// Produces the same files and errors as [`generate`](Self::generate).
    pub async fn generate_concurrent(&self, schema: &ProviderSchema) -> GenerationOutput {
        let mut out = GenerationOutput::default();
        let entities: Vec<TemplateData> = with_entity_lists(&self.prepare(schema, &mut out))
            .into_iter()
            .map(Cow::into_owned)
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for data in entities {
            let registry = Arc::clone(&self.registry);
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let id = data.id();
                let result = match semaphore.acquire_owned().await {
                    Ok(permit) => tokio::task::spawn_blocking(move || {
                        let _permit = permit;
                        Pipeline::new(&registry, source.as_ref()).process_entity(&data)
                    })
                    .await
                    .unwrap_or_else(|e| Err(GeneratorError::Join(e.to_string()))),
                    Err(e) => Err(GeneratorError::Join(e.to_string())),
                };
                (id, result)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, result)) => {
                    results.insert(id, result);
                },
                Err(e) => {
                    error!(error = %e, "generation task failed");
                    out.diagnostics.push(
                        Diagnostic::error("Generation task failed").with_detail(e.to_string()),
                    );
                },
            }
        }
        for (id, result) in results {
            out.record(id, result);
        }

        info!(
            files = out.files.len(),
            failed = out.errors.len(),
            "generated provider {}",
            schema.provider.name
        );
        out
    }

    /// Validate and compile every entity. Failures are recorded in `out`.
    fn prepare(&self, schema: &ProviderSchema, out: &mut GenerationOutput) -> Vec<TemplateData> {
        let provider_name = self
            .config
            .provider_name
            .clone()
            .unwrap_or_else(|| schema.provider.name.clone());

        let mut counts: BTreeMap<EntityId, usize> = BTreeMap::new();
        for (kind, entity) in schema.entities() {
            *counts.entry(EntityId::new(kind, entity.name.clone())).or_default() += 1;
        }

        let mut names = PackageNames::default();
        let mut entities = Vec::new();
        for (kind, entity) in schema.entities() {
            let id = EntityId::new(kind, entity.name.clone());
            let count = counts.get(&id).copied().unwrap_or_default();
            if count > 1 {
                // Every copy is rejected; the error is recorded once.
                if !out.errors.contains_key(&id) {
                    let message = format!("{} is declared {} times", id, count);
                    out.record(id, Err(GeneratorError::InvalidSchema(message)));
                }
                continue;
            }

            let diagnostics = validate_entity(kind, entity);
            let invalid = diagnostics
                .iter()
                .find(|d| d.is_error())
                .map(|d| d.summary.clone());
            out.diagnostics.extend(diagnostics);
            if let Some(summary) = invalid {
                out.record(id, Err(GeneratorError::InvalidSchema(summary)));
                continue;
            }

            let compiled = template_data(&self.config, &provider_name, kind, entity)
                .and_then(|mut data| names.claim(&mut data).map(|()| data));
            match compiled {
                Ok(data) => {
                    debug!(entity = %id, attributes = data.attributes.len(), "compiled");
                    entities.push(data);
                },
                Err(e) => out.record(id, Err(e)),
            }
        }
        entities
    }
}

/// Package-level Go names declared so far in a run.
///
/// Every entity is generated into the same Go package, so two entities must
/// never declare the same type. Local custom types are the exception: an
/// identical definition may be shared, and only its first user declares it.
#[derive(Debug, Default)]
struct PackageNames {
    owners: BTreeMap<String, EntityId>,
    custom_types: BTreeMap<String, CustomTypeData>,
}

impl PackageNames {
    /// Claim every package-level name `data` declares. Custom types an
    /// earlier entity already declares are removed from `data`.
    fn claim(&mut self, data: &mut TemplateData) -> Result<(), GeneratorError> {
        let id = data.id();
        let mut declared: Vec<String> = data
            .reserved_names()
            .into_iter()
            .chain(data.nested_types.iter().cloned())
            .collect();
        let mut shared = BTreeSet::new();
        for custom in &data.custom_types {
            match self.custom_types.get(&custom.type_name) {
                Some(existing) if existing == custom => {
                    shared.insert(custom.type_name.clone());
                },
                Some(_) => {
                    let owner = self.owners.get(&custom.type_name);
                    return Err(GeneratorError::InvalidSchema(format!(
                        "custom type {} is already declared differently by {}",
                        custom.type_name,
                        owner.map(ToString::to_string).unwrap_or_default()
                    )));
                },
                None => {
                    declared.push(custom.type_name.clone());
                    declared.push(custom.value_type.clone());
                },
            }
        }

        let mut local = BTreeSet::new();
        for name in &declared {
            if !local.insert(name) {
                return Err(GeneratorError::InvalidSchema(format!(
                    "Go name {} is declared twice by {}",
                    name, id
                )));
            }
            if let Some(owner) = self.owners.get(name) {
                return Err(GeneratorError::InvalidSchema(format!(
                    "Go name {} is already declared by {}",
                    name, owner
                )));
            }
        }

        for name in declared {
            self.owners.insert(name, id.clone());
        }
        for custom in &data.custom_types {
            self.custom_types
                .entry(custom.type_name.clone())
                .or_insert_with(|| custom.clone());
        }
        data.custom_types.retain(|c| !shared.contains(&c.type_name));
        Ok(())
    }
}

/// Build the template data of one entity.
///
/// Runs the compiler over the entity's attributes; validation is the
/// caller's responsibility.
pub fn template_data(
    config: &GeneratorConfig,
    provider_name: &str,
    kind: EntityKind,
    entity: &EntitySchema,
) -> Result<TemplateData, GeneratorError> {
    let type_name = to_pascal(&entity.name);
    let compiler =
        Compiler::new(kind).with_type_prefix(format!("{}{}", type_name, kind.go_suffix()));
    let compiled = compiler.compile_all(&entity.attributes)?;
    let attributes = entity
        .attributes
        .iter()
        .map(|node| attribute_data(&compiler, node))
        .collect::<Result<Vec<_>, _>>()?;
    let operations = match kind {
        EntityKind::Provider => None,
        EntityKind::Resource | EntityKind::DataSource => Some(operations_data(kind, entity)),
    };

    Ok(TemplateData {
        name: entity.name.clone(),
        kind,
        package: config.package.clone(),
        header: config.header.clone(),
        type_name,
        var_name: to_camel(&entity.name),
        description: go_quote(entity.description.as_deref().unwrap_or_default()),
        provider_name: provider_name.to_string(),
        client_import: config.client_import.clone(),
        schema_imports: compiled.schema_imports.into_iter().collect(),
        model_imports: compiled.model_imports.into_iter().collect(),
        conversion_imports: compiled.conversion_imports.into_iter().collect(),
        schema_attributes: compiled.schema,
        schema_blocks: compiled.blocks,
        model_fields: compiled.fields,
        declarations: compiled.declarations,
        nested_types: compiled
            .nested_types
            .into_iter()
            .map(|nested| nested.type_name)
            .collect(),
        conversions: compiled.conversions,
        attributes,
        custom_types: compiled.custom_types,
        operations,
        resources: Vec::new(),
        data_sources: Vec::new(),
    })
}

fn attribute_data(
    compiler: &Compiler,
    node: &AttributeNode,
) -> Result<AttributeData, GeneratorError> {
    let cor = node.computed_optional_required;
    Ok(AttributeData {
        name: node.name.clone(),
        field: to_pascal(&node.name),
        var: to_camel(&node.name),
        kind: node.kind.label().to_string(),
        go_type: compiler.field_type(node)?,
        computed: cor.is_computed(),
        optional: cor.is_optional(),
        required: cor.is_required(),
        sensitive: node.sensitive,
    })
}

/// Operations wiring for a resource or data source. Entities without an
/// explicit spec use the collection path `/<name>`.
fn operations_data(kind: EntityKind, entity: &EntitySchema) -> OperationsData {
    let fallback;
    let ops = match &entity.operations {
        Some(ops) => ops,
        None => {
            fallback = OperationsSpec::new(format!("/{}", entity.name));
            &fallback
        },
    };

    let wait = |spec: &Option<WaitSpec>| match kind {
        EntityKind::Resource => spec.as_ref().map(wait_data),
        _ => None,
    };
    let create = wait(&ops.create);
    let update = wait(&ops.update);
    let delete = wait(&ops.delete);

    OperationsData {
        path: go_quote(&ops.path),
        id_attribute: go_quote(&ops.id_attribute),
        id_field: to_pascal(&ops.id_attribute),
        status_field: go_quote(&ops.status_field),
        has_create_wait: create.is_some(),
        has_update_wait: update.is_some(),
        has_delete_wait: delete.is_some(),
        has_waits: create.is_some() || update.is_some() || delete.is_some(),
        create,
        update,
        delete,
    }
}

fn wait_data(wait: &WaitSpec) -> WaitData {
    WaitData {
        pending: go_string_slice(&wait.pending),
        target: go_string_slice(&wait.target),
        failure: go_string_slice(&wait.failure),
        timeout: go_duration(wait.timeout_seconds),
        delay: go_duration(wait.delay_seconds),
        min_poll_interval: go_duration(wait.min_poll_interval_seconds),
    }
}

/// A `[]string{...}` literal.
fn go_string_slice(values: &[String]) -> String {
    let quoted: Vec<_> = values.iter().map(|v| go_quote(v)).collect();
    format!("[]string{{{}}}", quoted.join(", "))
}

/// A `time.Duration` expression in the largest whole unit.
fn go_duration(seconds: u64) -> String {
    match seconds {
        0 => "0".to_string(),
        s if s % 3600 == 0 => format!("{} * time.Hour", s / 3600),
        s if s % 60 == 0 => format!("{} * time.Minute", s / 60),
        s => format!("{} * time.Second", s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CustomType, Descriptor};
    use crate::testing::{assert_declared_once, assert_no_errors};
    use crate::types::ArtifactKind;

    fn widget() -> EntitySchema {
        EntitySchema::new("widget")
            .with_description("A widget.")
            .with_attribute(AttributeNode::computed_string("id"))
            .with_attribute(AttributeNode::required_string("name"))
            .with_attribute(
                AttributeNode::optional_string("tag")
                    .with_custom_type(CustomType::new("TagType", "TagValue")),
            )
            .with_attribute(AttributeNode::single_nested(
                "api_key",
                Default::default(),
                vec![AttributeNode::required_string("secret").sensitive()],
            ))
            .with_operations(
                OperationsSpec::new("/v1/widgets")
                    .with_create_wait(
                        WaitSpec::new(["creating"], ["active"]).with_failure(["failed"]),
                    )
                    .with_delete_wait(
                        WaitSpec::new(["deleting"], ["deleted"]).with_timeout_seconds(90),
                    ),
            )
    }

    fn schema() -> ProviderSchema {
        ProviderSchema::new("acme")
            .with_provider_config(
                EntitySchema::new("acme")
                    .with_attribute(AttributeNode::optional_string("endpoint")),
            )
            .with_resource(widget())
            .with_data_source(
                EntitySchema::new("widgets").with_attribute(AttributeNode::computed_string("name")),
            )
    }

    #[test]
    fn test_config_defaults() {
        let config = GeneratorConfig::default();
        assert_eq!(config.package, "provider");
        assert_eq!(config.provider_name, None);
        assert_eq!(config.header, DEFAULT_HEADER);
        assert!(config.concurrency >= 1);
    }

    #[test]
    fn test_config_from_json() {
        let config = GeneratorConfig::from_json(
            r#"{"package": "acme", "client_import": "github.com/acme/client"}"#,
        )
        .unwrap();
        assert_eq!(config.package, "acme");
        assert_eq!(config.client_import, "github.com/acme/client");
        assert_eq!(config.header, DEFAULT_HEADER);

        assert!(matches!(
            GeneratorConfig::from_json("{\"concurrency\": \"many\"}"),
            Err(GeneratorError::Serialization(_))
        ));
    }

    #[test]
    fn test_go_literals() {
        assert_eq!(go_duration(1200), "20 * time.Minute");
        assert_eq!(go_duration(90), "90 * time.Second");
        assert_eq!(go_duration(7200), "2 * time.Hour");
        assert_eq!(go_duration(0), "0");
        assert_eq!(
            go_string_slice(&["a".to_string(), "b".to_string()]),
            r#"[]string{"a", "b"}"#
        );
        assert_eq!(go_string_slice(&[]), "[]string{}");
    }

    #[test]
    fn test_template_data() {
        let config = GeneratorConfig::default();
        let data = template_data(&config, "acme", EntityKind::Resource, &widget()).unwrap();

        assert_eq!(data.type_name, "Widget");
        assert_eq!(data.var_name, "widget");
        assert_eq!(data.description, "\"A widget.\"");
        assert_eq!(data.provider_name, "acme");
        assert_eq!(data.attributes.len(), 4);
        assert_eq!(data.attributes[3].field, "ApiKey");
        assert_eq!(data.attributes[3].go_type, "*WidgetResourceApiKey");
        assert_eq!(data.nested_types, vec!["WidgetResourceApiKey".to_string()]);
        assert_eq!(data.attributes[2].go_type, "TagValue");
        assert!(data.attributes[0].computed);
        assert_eq!(data.custom_types.len(), 1);
        assert_eq!(data.custom_types[0].scalar, "String");

        let ops = data.operations.unwrap();
        assert_eq!(ops.path, "\"/v1/widgets\"");
        assert_eq!(ops.id_field, "Id");
        assert!(ops.has_waits);
        assert!(ops.has_create_wait);
        assert!(!ops.has_update_wait);
        assert!(ops.has_delete_wait);
        let create = ops.create.unwrap();
        assert_eq!(create.pending, r#"[]string{"creating"}"#);
        assert_eq!(create.failure, r#"[]string{"failed"}"#);
        assert_eq!(create.timeout, "20 * time.Minute");
        assert_eq!(create.min_poll_interval, "5 * time.Second");
        assert!(ops.update.is_none());
        assert_eq!(ops.delete.unwrap().timeout, "90 * time.Second");
    }

    #[test]
    fn test_default_operations() {
        let config = GeneratorConfig::default();
        let entity =
            EntitySchema::new("widgets").with_attribute(AttributeNode::computed_string("name"));
        let data = template_data(&config, "acme", EntityKind::DataSource, &entity).unwrap();
        let ops = data.operations.unwrap();
        assert_eq!(ops.path, "\"/widgets\"");
        assert!(!ops.has_waits);

        let provider =
            template_data(&config, "acme", EntityKind::Provider, &EntitySchema::new("acme"))
                .unwrap();
        assert!(provider.operations.is_none());
        assert_eq!(provider.description, "\"\"");
    }

    #[test]
    fn test_generate() {
        let generator = Generator::new(GeneratorConfig::default()).unwrap();
        let output = generator.generate(&schema());
        assert_no_errors(&output);

        let names: Vec<_> = output.files.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec![
                "provider_gen.go",
                "provider_gen_test.go",
                "widget_resource_gen.go",
                "widget_resource_gen_test.go",
                "widgets_data_source_gen.go",
                "widgets_data_source_gen_test.go",
            ]
        );

        let widget = output.file("widget_resource_gen.go").unwrap();
        assert!(widget.starts_with(DEFAULT_HEADER));
        assert_declared_once(widget, "type WidgetResourceModel");
        assert_declared_once(widget, "type WidgetResourceApiKey");
        assert_declared_once(widget, "type TagType");
        assert_declared_once(widget, "func (r *WidgetResource) refresh");
        assert!(widget.contains("Pending:    []string{\"creating\"},"));
        assert!(widget.contains("\"github.com/hashicorp/terraform-plugin-sdk/v2/helper/retry\""));
        assert!(widget.contains("\"internal/client\""));

        let provider = output.file("provider_gen.go").unwrap();
        assert!(provider.contains("resp.TypeName = \"acme\""));
        assert!(provider.contains("NewWidgetResource,"));
        assert!(provider.contains("NewWidgetsDataSource,"));

        let custom = &output.artifacts[&ArtifactKind::CustomTypeValue];
        assert_eq!(custom.entries.len(), 1);
    }

    #[test]
    fn test_generate_provider_name_override() {
        let config = GeneratorConfig::new()
            .with_provider_name("acmecloud")
            .with_package("acme")
            .with_header("// generated");
        let generator = Generator::new(config).unwrap();
        let output = generator.generate(&schema());
        assert_no_errors(&output);

        let provider = output.file("provider_gen.go").unwrap();
        assert!(provider.starts_with("// generated\n\npackage acme\n"));
        assert!(provider.contains("resp.TypeName = \"acmecloud\""));
    }

    #[test]
    fn test_invalid_entity_isolated() {
        let schema = schema()
            .with_resource(
                EntitySchema::new("gadget")
                    .with_attribute(AttributeNode::required_string("name")),
            )
            .with_data_source(EntitySchema::new("lookup").with_attribute(
                AttributeNode::optional_string("query").with_plan_modifier(Descriptor::new(
                    "stringplanmodifier.RequiresReplace()",
                )),
            ));
        let generator = Generator::new(GeneratorConfig::default()).unwrap();
        let output = generator.generate(&schema);

        assert_eq!(output.errors.len(), 2);
        assert!(matches!(
            output.errors[&EntityId::new(EntityKind::Resource, "gadget")],
            GeneratorError::InvalidSchema(_)
        ));
        assert!(matches!(
            output.errors[&EntityId::new(EntityKind::DataSource, "lookup")],
            GeneratorError::UnsupportedKind { .. }
        ));
        assert!(output.file("widget_resource_gen.go").is_some());
        assert!(output.file("gadget_resource_gen.go").is_none());
        assert!(output
            .diagnostics
            .iter()
            .any(|d| d.is_error() && d.entity.as_deref() == Some("gadget")));

        // Failed entities are not registered with the provider.
        let provider = output.file("provider_gen.go").unwrap();
        assert!(!provider.contains("NewGadgetResource"));
    }

    #[test]
    fn test_duplicate_entity() {
        let schema = schema().with_resource(widget());
        let output = Generator::new(GeneratorConfig::default())
            .unwrap()
            .generate(&schema);

        let widget = EntityId::new(EntityKind::Resource, "widget");
        assert_eq!(output.errors.keys().collect::<Vec<_>>(), vec![&widget]);
        assert!(output.file("widget_resource_gen.go").is_none());
        assert!(output.file("widgets_data_source_gen.go").is_some());
        assert_eq!(
            output
                .diagnostics
                .iter()
                .filter(|d| d.is_error() && d.entity.as_deref() == Some("widget"))
                .count(),
            1
        );
    }

    #[test]
    fn test_validation_failure_is_recorded_like_other_failures() {
        let schema = schema().with_resource(
            EntitySchema::new("gadget").with_attribute(AttributeNode::required_string("name")),
        );
        let output = Generator::new(GeneratorConfig::default())
            .unwrap()
            .generate(&schema);

        let gadget: Vec<_> = output
            .diagnostics
            .iter()
            .filter(|d| d.is_error() && d.entity.as_deref() == Some("gadget"))
            .map(|d| d.summary.as_str())
            .collect();
        assert_eq!(
            gadget,
            vec!["Missing identifier attribute 'id'", "Failed to generate resource gadget"]
        );
    }

    fn with_tags(name: &str) -> EntitySchema {
        EntitySchema::new(name)
            .with_attribute(AttributeNode::computed_string("id"))
            .with_attribute(AttributeNode::single_nested(
                "tags",
                Default::default(),
                vec![AttributeNode::optional_string("env")],
            ))
    }

    #[test]
    fn test_nested_types_are_distinct_across_entities() {
        let schema = ProviderSchema::new("acme")
            .with_resource(with_tags("widget"))
            .with_resource(with_tags("gadget"))
            .with_data_source(with_tags("widget"));
        let output = Generator::new(GeneratorConfig::default())
            .unwrap()
            .generate(&schema);
        assert_no_errors(&output);

        let widget = output.file("widget_resource_gen.go").unwrap();
        let gadget = output.file("gadget_resource_gen.go").unwrap();
        let lookup = output.file("widget_data_source_gen.go").unwrap();
        assert_declared_once(widget, "type WidgetResourceTags");
        assert_declared_once(gadget, "type GadgetResourceTags");
        assert_declared_once(lookup, "type WidgetDataSourceTags");

        let declarations = output
            .files
            .values()
            .flat_map(|f| f.lines())
            .filter(|line| line.starts_with("type ") && line.contains("Tags struct"))
            .count();
        assert_eq!(declarations, 3);
    }

    #[test]
    fn test_go_name_collision_across_entities_fails() {
        // The nested `model` type lands on the entity's own model struct.
        let schema = ProviderSchema::new("acme").with_resource(
            EntitySchema::new("widget")
                .with_attribute(AttributeNode::computed_string("id"))
                .with_attribute(AttributeNode::single_nested(
                    "model",
                    Default::default(),
                    vec![AttributeNode::optional_string("x")],
                )),
        );
        let output = Generator::new(GeneratorConfig::default())
            .unwrap()
            .generate(&schema);
        assert!(matches!(
            &output.errors[&EntityId::new(EntityKind::Resource, "widget")],
            GeneratorError::InvalidSchema(msg) if msg.contains("WidgetResourceModel")
        ));
    }

    #[test]
    fn test_shared_custom_type_declared_once() {
        let tagged = |name: &str| {
            EntitySchema::new(name)
                .with_attribute(AttributeNode::computed_string("id"))
                .with_attribute(
                    AttributeNode::optional_string("tag")
                        .with_custom_type(CustomType::new("TagType", "TagValue")),
                )
        };
        let schema = ProviderSchema::new("acme")
            .with_resource(tagged("widget"))
            .with_resource(tagged("gadget"));
        let output = Generator::new(GeneratorConfig::default())
            .unwrap()
            .generate(&schema);
        assert_no_errors(&output);

        assert_declared_once(output.file("widget_resource_gen.go").unwrap(), "type TagType");
        let gadget = output.file("gadget_resource_gen.go").unwrap();
        assert!(!gadget.contains("type TagType"));
        assert!(gadget.contains("Tag TagValue `tfsdk:\"tag\"`"));
    }

    #[test]
    fn test_conflicting_custom_type_fails() {
        let schema = ProviderSchema::new("acme")
            .with_resource(
                EntitySchema::new("widget")
                    .with_attribute(AttributeNode::computed_string("id"))
                    .with_attribute(
                        AttributeNode::optional_string("tag")
                            .with_custom_type(CustomType::new("TagType", "TagValue")),
                    ),
            )
            .with_resource(
                EntitySchema::new("gadget")
                    .with_attribute(AttributeNode::computed_string("id"))
                    .with_attribute(
                        AttributeNode::optional_int64("tag")
                            .with_custom_type(CustomType::new("TagType", "TagValue")),
                    ),
            );
        let output = Generator::new(GeneratorConfig::default())
            .unwrap()
            .generate(&schema);

        assert!(output.file("widget_resource_gen.go").is_some());
        assert!(matches!(
            &output.errors[&EntityId::new(EntityKind::Resource, "gadget")],
            GeneratorError::InvalidSchema(msg)
                if msg.contains("TagType") && msg.contains("resource widget")
        ));
    }

    #[test]
    fn test_generate_blocks() {
        let schema = ProviderSchema::new("acme").with_resource(
            EntitySchema::new("firewall")
                .with_attribute(AttributeNode::computed_string("id"))
                .with_attribute(AttributeNode::list_nested_block(
                    "rule",
                    vec![AttributeNode::required_int64("port")],
                )),
        );
        let output = Generator::new(GeneratorConfig::default())
            .unwrap()
            .generate(&schema);
        assert_no_errors(&output);

        let firewall = output.file("firewall_resource_gen.go").unwrap();
        assert!(firewall.contains("\t\tBlocks: map[string]schema.Block{\n"));
        assert!(firewall.contains("\"rule\": schema.ListNestedBlock{"));
        assert!(firewall.contains("Rule []FirewallResourceRule `tfsdk:\"rule\"`"));
        assert_declared_once(firewall, "type FirewallResourceRule");

        let provider = output.file("provider_gen.go").unwrap();
        assert!(!provider.contains("Blocks:"));
    }

    #[test]
    fn test_override_source() {
        let source = MemoryTemplateSource::new().with_template(
            "widget_test.tmpl",
            "package {{package}}\n\nfunc Test{{type_name}}Custom(t *testing.T) {}\n",
        );
        let generator = Generator::new(GeneratorConfig::default())
            .unwrap()
            .with_source(source);
        let output = generator.generate(&schema());
        assert_no_errors(&output);
        assert_eq!(
            output.file("widget_resource_gen_test.go").unwrap(),
            "package provider\n\nfunc TestWidgetCustom(t *testing.T) {}\n"
        );
    }

    #[tokio::test]
    async fn test_generate_concurrent_matches_sequential() {
        let generator = Generator::new(GeneratorConfig::default().with_concurrency(2)).unwrap();
        let schema = schema().with_resource(
            EntitySchema::new("gadget").with_attribute(AttributeNode::required_string("name")),
        );

        let sequential = generator.generate(&schema);
        let concurrent = generator.generate_concurrent(&schema).await;

        assert_eq!(concurrent.files, sequential.files);
        assert_eq!(
            concurrent.errors.keys().collect::<Vec<_>>(),
            sequential.errors.keys().collect::<Vec<_>>()
        );
        assert_eq!(concurrent.diagnostics.len(), sequential.diagnostics.len());
    }
}
