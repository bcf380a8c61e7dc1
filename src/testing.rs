//! Testing utilities for generator users and template authors.
//!
//! - [`ScriptedProbe`] replays a fixed state sequence into the convergence
//!   protocol without a remote API
//! - [`GeneratorTester`] renders one entity against the built-in templates
//!   plus any override templates, without a full [`ProviderSchema`]
//! - assertion helpers check generated source and run output
//!
//! # Example
//!
//! ```
//! use hemmer_provider_generator::schema::{AttributeNode, EntitySchema};
//! use hemmer_provider_generator::testing::{assert_declared_once, GeneratorTester};
//! use hemmer_provider_generator::types::EntityKind;
//!
//! let tester = GeneratorTester::new()
//!     .unwrap()
//!     .with_template(
//!         "model_default.tmpl",
//!         "package {{package}}\n\ntype {{type_name}}Model struct{}\n",
//!     );
//!
//! let entity = EntitySchema::new("widget")
//!     .with_attribute(AttributeNode::computed_string("id"));
//! let output = tester.render(EntityKind::Resource, &entity).unwrap();
//! assert_declared_once(&output.files["widget_resource_gen.go"], "type WidgetModel");
//! ```
//!
//! [`ProviderSchema`]: crate::schema::ProviderSchema

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::convergence::{Observed, ProbeError, StateProbe};
use crate::error::GeneratorError;
use crate::generator::{template_data, GeneratorConfig};
use crate::pipeline::{EntityOutput, GenerationOutput, Pipeline};
use crate::schema::{Diagnostic, EntitySchema};
use crate::templates::{MemoryTemplateSource, TemplateRegistry};
use crate::types::{ArtifactKind, EntityKind};
use crate::validation::validate_entity;

/// A [`StateProbe`] that replays a fixed sequence of states.
///
/// Each call returns the next state; once the script is exhausted the last
/// state repeats. The observed value is the 1-based call number.
///
/// # Example
///
/// ```
/// use hemmer_provider_generator::convergence::{await_state, ConvergenceSpec};
/// use hemmer_provider_generator::testing::ScriptedProbe;
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let spec = ConvergenceSpec::new(["creating"], ["ready"])
///     .with_min_poll_interval(Duration::from_millis(1));
/// let probe = ScriptedProbe::new(["creating", "ready"]);
///
/// let observed = await_state(&spec, &probe).await.unwrap();
/// assert_eq!(observed.value, 2);
/// assert_eq!(probe.calls(), 2);
/// # });
/// ```
#[derive(Debug)]
pub struct ScriptedProbe {
    states: Vec<String>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    /// Create a probe that replays `states` in order.
    pub fn new(states: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            states: states.into_iter().map(Into::into).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a probe that always reports `state`.
    pub fn repeating(state: impl Into<String>) -> Self {
        Self::new([state.into()])
    }

    /// Number of times the probe has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateProbe for ScriptedProbe {
    type Output = usize;

    async fn probe(&self) -> Result<Observed<usize>, ProbeError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let state = self
            .states
            .get(index)
            .or_else(|| self.states.last())
            .ok_or_else(|| ProbeError::permanent("scripted probe has no states"))?;
        Ok(Observed::new(index + 1, state.clone()))
    }
}

/// A test harness for rendering single entities.
///
/// Uses the built-in templates plus any templates added with
/// [`with_template`](Self::with_template), which take the place of an
/// override directory.
#[derive(Debug)]
pub struct GeneratorTester {
    config: GeneratorConfig,
    registry: TemplateRegistry,
    source: MemoryTemplateSource,
}

impl GeneratorTester {
    /// Create a tester with the default config and provider name `example`.
    pub fn new() -> Result<Self, GeneratorError> {
        Ok(Self {
            config: GeneratorConfig::default().with_provider_name("example"),
            registry: TemplateRegistry::builtin()?,
            source: MemoryTemplateSource::new(),
        })
    }

    /// Replace the config.
    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the built-in registry.
    pub fn with_registry(mut self, registry: TemplateRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Add an override template.
    pub fn with_template(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.source.insert(name, text);
        self
    }

    /// Validate, compile, render and merge one entity.
    ///
    /// Validation errors are returned as [`GeneratorError::InvalidSchema`].
    pub fn render(
        &self,
        kind: EntityKind,
        entity: &EntitySchema,
    ) -> Result<EntityOutput, GeneratorError> {
        if let Some(error) = validate_entity(kind, entity).into_iter().find(Diagnostic::is_error) {
            return Err(GeneratorError::InvalidSchema(error.summary));
        }
        let data = template_data(&self.config, self.provider_name(), kind, entity)?;
        Pipeline::new(&self.registry, &self.source).process_entity(&data)
    }

    /// Render a single artifact of one entity without merging.
    ///
    /// Returns `Ok(None)` if no template resolves for the artifact.
    pub fn render_artifact(
        &self,
        kind: EntityKind,
        entity: &EntitySchema,
        artifact: ArtifactKind,
    ) -> Result<Option<String>, GeneratorError> {
        let data = template_data(&self.config, self.provider_name(), kind, entity)?;
        let resolution = self
            .registry
            .resolve(&self.source, kind, &entity.name, artifact)?;
        self.registry.render(&resolution, &data)
    }

    fn provider_name(&self) -> &str {
        self.config.provider_name.as_deref().unwrap_or("example")
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that `source` has exactly one top-level declaration starting with
/// `decl`, such as `type WidgetResourceModel` or `func (r *WidgetResource) Read`.
///
/// # Panics
///
/// Panics if the declaration is missing or declared more than once.
pub fn assert_declared_once(source: &str, decl: &str) {
    let count = source
        .lines()
        .filter(|line| {
            line.strip_prefix(decl)
                .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
        })
        .count();
    assert!(
        count == 1,
        "Expected `{}` to be declared once, but found {} declaration(s)",
        decl,
        count
    );
}

/// Assert that a generation run produced no errors.
///
/// # Panics
///
/// Panics if any entity failed or any error diagnostic was reported.
pub fn assert_no_errors(output: &GenerationOutput) {
    let failed: Vec<_> = output
        .errors
        .iter()
        .map(|(id, e)| format!("{}: {}", id, e))
        .collect();
    assert!(failed.is_empty(), "Expected no failed entities, got: {:?}", failed);

    let errors: Vec<_> = output
        .diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| &d.summary)
        .collect();
    assert!(errors.is_empty(), "Expected no error diagnostics, got: {:?}", errors);
}

/// Template data for a small entity of the given kind.
#[cfg(test)]
pub(crate) fn template_data_for(kind: EntityKind, name: &str) -> crate::types::TemplateData {
    use crate::schema::AttributeNode;

    let entity = match kind {
        EntityKind::Provider => {
            EntitySchema::new(name).with_attribute(AttributeNode::optional_string("endpoint"))
        },
        EntityKind::Resource => EntitySchema::new(name)
            .with_attribute(AttributeNode::computed_string("id"))
            .with_attribute(AttributeNode::required_string("name")),
        EntityKind::DataSource => {
            EntitySchema::new(name).with_attribute(AttributeNode::computed_string("name"))
        },
    };
    let config = GeneratorConfig::default().with_header("// header");
    template_data(&config, "acme", kind, &entity).expect("test entity compiles")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeNode;
    use crate::types::EntityId;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_scripted_probe_replays_then_repeats() {
        let probe = ScriptedProbe::new(["creating", "ready"]);
        let first = assert_ok!(probe.probe().await);
        assert_eq!(first, Observed::new(1, "creating"));
        assert_eq!(probe.probe().await.unwrap().state, "ready");
        assert_eq!(probe.probe().await.unwrap(), Observed::new(3, "ready"));
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test]
    async fn test_scripted_probe_empty() {
        let probe = ScriptedProbe::new(Vec::<String>::new());
        let err = probe.probe().await.unwrap_err();
        assert!(!err.transient);
        assert_eq!(probe.calls(), 1);
    }

    #[test]
    fn test_assert_declared_once() {
        let source = "package p\n\ntype Widget struct{}\n\ntype WidgetModel struct{}\n";
        assert_declared_once(source, "type Widget");
        assert_declared_once(source, "type WidgetModel");
    }

    #[test]
    #[should_panic(expected = "found 2 declaration(s)")]
    fn test_assert_declared_once_duplicate() {
        assert_declared_once("type A struct{}\ntype A struct{}\n", "type A");
    }

    #[test]
    #[should_panic(expected = "found 0 declaration(s)")]
    fn test_assert_declared_once_missing() {
        assert_declared_once("type AB struct{}\n", "type A");
    }

    #[test]
    #[should_panic(expected = "Expected no failed entities")]
    fn test_assert_no_errors_failed_entity() {
        let mut output = GenerationOutput::default();
        output.record(
            EntityId::new(EntityKind::Resource, "widget"),
            Err(GeneratorError::InvalidSchema("bad".to_string())),
        );
        assert_no_errors(&output);
    }

    #[test]
    fn test_assert_no_errors_allows_warnings() {
        let mut output = GenerationOutput::default();
        output.diagnostics.push(Diagnostic::warning("skipped test artifact"));
        assert_no_errors(&output);
    }

    #[test]
    fn test_tester_render() {
        let tester = GeneratorTester::new().unwrap();
        let entity = EntitySchema::new("widget")
            .with_attribute(AttributeNode::computed_string("id"))
            .with_attribute(AttributeNode::optional_int64("size"));
        let output = tester.render(EntityKind::Resource, &entity).unwrap();

        let unit = &output.files["widget_resource_gen.go"];
        assert_declared_once(unit, "type WidgetResource");
        assert_declared_once(unit, "func (r *WidgetResource) Create");
        assert_declared_once(unit, "func widgetResourceFromResponse");
        assert!(unit.contains("\"size\": schema.Int64Attribute{"));

        let test_unit = &output.files["widget_resource_gen_test.go"];
        assert_declared_once(test_unit, "func TestWidgetResourceSchema");
        assert_declared_once(test_unit, "func TestWidgetResourceFromResponseIdTypeMismatch");
    }

    #[test]
    fn test_tester_render_artifact() {
        let tester = GeneratorTester::new()
            .unwrap()
            .with_template("widgets_model.tmpl", "// {{provider_name}}_{{name}}");
        let entity =
            EntitySchema::new("widgets").with_attribute(AttributeNode::computed_string("name"));

        let model = tester
            .render_artifact(EntityKind::DataSource, &entity, ArtifactKind::Model)
            .unwrap();
        assert_eq!(model.as_deref(), Some("// example_widgets"));

        let registry = TemplateRegistry::builtin()
            .unwrap()
            .without_builtin(EntityKind::DataSource, ArtifactKind::Test);
        let tester = tester.with_registry(registry);
        let test = tester
            .render_artifact(EntityKind::DataSource, &entity, ArtifactKind::Test)
            .unwrap();
        assert_eq!(test, None);
    }

    #[test]
    fn test_tester_rejects_invalid_entity() {
        let tester = GeneratorTester::new().unwrap();
        let entity =
            EntitySchema::new("widget").with_attribute(AttributeNode::required_string("name"));
        let err = tester.render(EntityKind::Resource, &entity).unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidSchema(_)));
    }
}
