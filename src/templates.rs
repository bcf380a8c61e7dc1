//! Template sources and the built-in template registry.
//!
//! Every (entity, artifact-kind) pair resolves to at most one template text,
//! first match wins:
//!
//! 1. `<entity>_<kind>.tmpl` from the override [`TemplateSource`]
//! 2. `<kind>_default.tmpl` from the override source
//! 3. the built-in template for the entity's kind, if the registry has one
//!
//! If none of these exist the artifact is skipped.
//!
//! Templates are Handlebars documents. HTML escaping is disabled and strict
//! mode is on, so a typo in a field name is a render error instead of an
//! empty string. The `pascal`, `camel` and `snake` helpers expose the casing
//! transforms.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use handlebars::{handlebars_helper, Handlebars, Template};
use tracing::{debug, warn};

use crate::casing::{to_camel, to_pascal, to_snake};
use crate::error::GeneratorError;
use crate::types::{ArtifactKind, EntityKind};

/// Read-only store of override templates.
///
/// A missing name is a resolution miss, not an error. A name that exists but
/// cannot be read is an error.
pub trait TemplateSource: Send + Sync {
    /// Text of the named template, if present.
    fn read(&self, name: &str) -> Result<Option<String>, GeneratorError>;
}

/// In-memory template source.
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplateSource {
    templates: HashMap<String, String>,
}

impl MemoryTemplateSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template.
    pub fn with_template(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    /// Add or replace a template.
    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.templates.insert(name.into(), text.into());
    }

    /// Number of templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the source holds no templates.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateSource for MemoryTemplateSource {
    fn read(&self, name: &str) -> Result<Option<String>, GeneratorError> {
        Ok(self.templates.get(name).cloned())
    }
}

/// Template source backed by a directory.
///
/// `read("widget_schema.tmpl")` reads `<root>/widget_schema.tmpl`. A missing
/// file is a miss; any other I/O error is returned as [`GeneratorError::Io`].
#[derive(Debug, Clone)]
pub struct DirTemplateSource {
    root: PathBuf,
}

impl DirTemplateSource {
    /// Create a source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TemplateSource for DirTemplateSource {
    fn read(&self, name: &str) -> Result<Option<String>, GeneratorError> {
        // Names are flat; never let an override escape the root.
        if name.contains('/') || name.contains('\\') || name.starts_with('.') {
            warn!(template = %name, "ignoring template name with a path component");
            return Ok(None);
        }
        let path = self.root.join(name);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read override template");
                Err(io::Error::new(e.kind(), format!("{}: {}", path.display(), e)).into())
            },
        }
    }
}

/// Which candidate supplied the template for an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// `<entity>_<kind>.tmpl` from the override source.
    UsingOverride {
        /// Template name.
        name: String,
        /// Template text.
        text: String,
    },
    /// `<kind>_default.tmpl` from the override source.
    UsingDefault {
        /// Template name.
        name: String,
        /// Template text.
        text: String,
    },
    /// The registry's built-in template.
    UsingBuiltin {
        /// Registered name of the built-in.
        name: String,
    },
    /// No candidate exists.
    Skipped,
}

impl Resolution {
    /// The name of the selected template, if any.
    pub fn template_name(&self) -> Option<&str> {
        match self {
            Self::UsingOverride { name, .. }
            | Self::UsingDefault { name, .. }
            | Self::UsingBuiltin { name } => Some(name),
            Self::Skipped => None,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UsingOverride { name, .. } => write!(f, "override {}", name),
            Self::UsingDefault { name, .. } => write!(f, "shared default {}", name),
            Self::UsingBuiltin { name } => write!(f, "built-in {}", name),
            Self::Skipped => f.write_str("skipped"),
        }
    }
}

const BUILTINS: &[(EntityKind, ArtifactKind, &str)] = &[
    (
        EntityKind::Provider,
        ArtifactKind::Schema,
        include_str!("../templates/provider/schema.hbs"),
    ),
    (
        EntityKind::Provider,
        ArtifactKind::Operations,
        include_str!("../templates/provider/operations.hbs"),
    ),
    (
        EntityKind::Provider,
        ArtifactKind::Model,
        include_str!("../templates/provider/model.hbs"),
    ),
    (
        EntityKind::Provider,
        ArtifactKind::CustomTypeValue,
        include_str!("../templates/custom_type_value.hbs"),
    ),
    (
        EntityKind::Provider,
        ArtifactKind::Test,
        include_str!("../templates/provider/test.hbs"),
    ),
    (
        EntityKind::Resource,
        ArtifactKind::Schema,
        include_str!("../templates/resource/schema.hbs"),
    ),
    (
        EntityKind::Resource,
        ArtifactKind::Operations,
        include_str!("../templates/resource/operations.hbs"),
    ),
    (
        EntityKind::Resource,
        ArtifactKind::Model,
        include_str!("../templates/resource/model.hbs"),
    ),
    (
        EntityKind::Resource,
        ArtifactKind::Conversions,
        include_str!("../templates/resource/conversions.hbs"),
    ),
    (
        EntityKind::Resource,
        ArtifactKind::CustomTypeValue,
        include_str!("../templates/custom_type_value.hbs"),
    ),
    (
        EntityKind::Resource,
        ArtifactKind::Test,
        include_str!("../templates/resource/test.hbs"),
    ),
    (
        EntityKind::DataSource,
        ArtifactKind::Schema,
        include_str!("../templates/data_source/schema.hbs"),
    ),
    (
        EntityKind::DataSource,
        ArtifactKind::Operations,
        include_str!("../templates/data_source/operations.hbs"),
    ),
    (
        EntityKind::DataSource,
        ArtifactKind::Model,
        include_str!("../templates/data_source/model.hbs"),
    ),
    (
        EntityKind::DataSource,
        ArtifactKind::Conversions,
        include_str!("../templates/data_source/conversions.hbs"),
    ),
    (
        EntityKind::DataSource,
        ArtifactKind::CustomTypeValue,
        include_str!("../templates/custom_type_value.hbs"),
    ),
    (
        EntityKind::DataSource,
        ArtifactKind::Test,
        include_str!("../templates/data_source/test.hbs"),
    ),
];

handlebars_helper!(pascal: |s: str| to_pascal(s));
handlebars_helper!(camel: |s: str| to_camel(s));
handlebars_helper!(snake: |s: str| to_snake(s));

/// Name under which a built-in is registered (`builtin/resource/schema`).
pub fn builtin_name(entity: EntityKind, kind: ArtifactKind) -> String {
    format!("builtin/{}/{}", entity.role(), kind.name())
}

/// The built-in template set and the configured Handlebars engine.
///
/// Built once, before the first entity is processed, and only read
/// afterwards. Every built-in is compiled when it is added, so a broken
/// built-in is reported at construction rather than per entity.
pub struct TemplateRegistry {
    engine: Handlebars<'static>,
    builtins: BTreeMap<(EntityKind, ArtifactKind), String>,
}

impl fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRegistry")
            .field("builtins", &self.builtins.values().collect::<Vec<_>>())
            .finish()
    }
}

impl TemplateRegistry {
    /// A registry with no built-ins; every artifact without an override is skipped.
    pub fn empty() -> Self {
        let mut engine = Handlebars::new();
        engine.register_escape_fn(handlebars::no_escape);
        engine.set_strict_mode(true);
        engine.register_helper("pascal", Box::new(pascal));
        engine.register_helper("camel", Box::new(camel));
        engine.register_helper("snake", Box::new(snake));
        Self {
            engine,
            builtins: BTreeMap::new(),
        }
    }

    /// A registry holding the built-in terraform-plugin-framework templates.
    pub fn builtin() -> Result<Self, GeneratorError> {
        let mut registry = Self::empty();
        for (entity, kind, text) in BUILTINS {
            registry.register_builtin(*entity, *kind, text)?;
        }
        debug!(count = registry.builtins.len(), "registered built-in templates");
        Ok(registry)
    }

    /// Add or replace the built-in for an entity kind and artifact kind.
    pub fn register_builtin(
        &mut self,
        entity: EntityKind,
        kind: ArtifactKind,
        text: &str,
    ) -> Result<(), GeneratorError> {
        let name = builtin_name(entity, kind);
        let template = compile_template(&name, text)?;
        self.engine.register_template(&name, template);
        self.builtins.insert((entity, kind), name);
        Ok(())
    }

    /// Remove the built-in for an entity kind and artifact kind.
    pub fn without_builtin(mut self, entity: EntityKind, kind: ArtifactKind) -> Self {
        if let Some(name) = self.builtins.remove(&(entity, kind)) {
            self.engine.unregister_template(&name);
        }
        self
    }

    /// Whether a built-in exists for the pair.
    pub fn has_builtin(&self, entity: EntityKind, kind: ArtifactKind) -> bool {
        self.builtins.contains_key(&(entity, kind))
    }

    /// Pick the template for one artifact of one entity.
    ///
    /// Fails only if the override source fails to read a candidate.
    pub fn resolve<S>(
        &self,
        source: &S,
        entity_kind: EntityKind,
        entity: &str,
        kind: ArtifactKind,
    ) -> Result<Resolution, GeneratorError>
    where
        S: TemplateSource + ?Sized,
    {
        let name = kind.entity_template_name(entity);
        if let Some(text) = source.read(&name)? {
            return Ok(Resolution::UsingOverride { name, text });
        }
        let name = kind.default_template_name();
        if let Some(text) = source.read(&name)? {
            return Ok(Resolution::UsingDefault { name, text });
        }
        Ok(match self.builtins.get(&(entity_kind, kind)) {
            Some(name) => Resolution::UsingBuiltin { name: name.clone() },
            None => Resolution::Skipped,
        })
    }

    /// Render a resolved template against `data`.
    ///
    /// Returns `Ok(None)` for [`Resolution::Skipped`].
    pub fn render<T>(
        &self,
        resolution: &Resolution,
        data: &T,
    ) -> Result<Option<String>, GeneratorError>
    where
        T: serde::Serialize,
    {
        match resolution {
            Resolution::UsingOverride { name, text } | Resolution::UsingDefault { name, text } => {
                let template = compile_template(name, text)?;
                let mut engine = self.engine.clone();
                engine.register_template(name, template);
                render_named(&engine, name, data).map(Some)
            },
            Resolution::UsingBuiltin { name } => render_named(&self.engine, name, data).map(Some),
            Resolution::Skipped => Ok(None),
        }
    }
}

fn compile_template(name: &str, text: &str) -> Result<Template, GeneratorError> {
    Template::compile(text).map_err(|e| GeneratorError::TemplateParse {
        template: name.to_string(),
        message: e.to_string(),
    })
}

fn render_named<T>(
    engine: &Handlebars<'static>,
    name: &str,
    data: &T,
) -> Result<String, GeneratorError>
where
    T: serde::Serialize,
{
    engine
        .render(name, data)
        .map_err(|e| GeneratorError::TemplateRender {
            template: name.to_string(),
            message: e.to_string(),
        })
}
