//! Per-entity rendering, concatenation and merge.
//!
//! For each entity the pipeline resolves and renders every artifact kind in
//! [`ArtifactKind::ALL`] order. Non-test artifacts are concatenated and merged
//! into `<entity>_<role>_gen.go`; the test artifact is merged on its own into
//! the matching `_gen_test.go`.
//!
//! Entities are isolated from each other. A failure on a primary artifact
//! (schema, operations, model, conversions) or in the merge aborts that
//! entity only, as does an entity with no schema template at all. A failure
//! on a secondary artifact (custom types, tests) becomes a warning and the
//! artifact is left out. Reading an override template counts as part of
//! rendering its artifact.

use std::borrow::Cow;
use std::collections::BTreeMap;

use tracing::{debug, debug_span, error, info, warn};

use crate::error::GeneratorError;
use crate::merge::{merge_with_report, DroppedDeclaration};
use crate::schema::Diagnostic;
use crate::templates::{Resolution, TemplateRegistry, TemplateSource};
use crate::types::{ArtifactKind, EntityId, EntityKind, GeneratedArtifact, TemplateData};

/// Everything one entity produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityOutput {
    /// The entity.
    pub id: EntityId,
    /// Merged output files, by file name.
    pub files: BTreeMap<String, String>,
    /// Raw rendered text per artifact kind, before merging.
    pub artifacts: BTreeMap<ArtifactKind, String>,
    /// Warnings for skipped secondary artifacts and conflicting duplicates.
    pub diagnostics: Vec<Diagnostic>,
    /// Declarations the merge dropped.
    pub dropped: Vec<DroppedDeclaration>,
}

/// The result of a generation run.
#[derive(Debug, Default)]
pub struct GenerationOutput {
    /// Generated files, by file name.
    pub files: BTreeMap<String, String>,
    /// Entities that failed, with the failure that aborted them.
    pub errors: BTreeMap<EntityId, GeneratorError>,
    /// Errors and warnings for the whole run.
    pub diagnostics: Vec<Diagnostic>,
    /// Raw rendered text, by artifact kind.
    pub artifacts: BTreeMap<ArtifactKind, GeneratedArtifact>,
}

impl GenerationOutput {
    /// Whether every entity was generated.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Text of a generated file.
    pub fn file(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    /// Fold one entity's result into the run.
    pub fn record(&mut self, id: EntityId, result: Result<EntityOutput, GeneratorError>) {
        let result = result.and_then(|output| {
            let clash = output
                .files
                .keys()
                .find(|name| self.files.contains_key(*name))
                .cloned();
            match clash {
                Some(name) => Err(GeneratorError::InvalidSchema(format!(
                    "output file {} is already generated by another entity",
                    name
                ))),
                None => Ok(output),
            }
        });

        match result {
            Ok(output) => {
                self.files.extend(output.files);
                for (kind, text) in output.artifacts {
                    self.artifacts
                        .entry(kind)
                        .or_insert_with(|| GeneratedArtifact::new(kind))
                        .insert(id.clone(), text);
                }
                self.diagnostics.extend(output.diagnostics);
            },
            Err(e) => {
                error!(entity = %id, error = %e, "entity generation failed");
                self.diagnostics.push(
                    Diagnostic::error(format!("Failed to generate {}", id))
                        .with_detail(e.to_string())
                        .with_entity(&id.name),
                );
                self.errors.insert(id, e);
            },
        }
    }
}

/// Renders and merges entities against one registry and override source.
pub struct Pipeline<'a, S: ?Sized> {
    registry: &'a TemplateRegistry,
    source: &'a S,
}

impl<S: ?Sized> std::fmt::Debug for Pipeline<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("registry", self.registry)
            .finish_non_exhaustive()
    }
}

impl<'a, S> Pipeline<'a, S>
where
    S: TemplateSource + ?Sized,
{
    /// Create a pipeline.
    pub fn new(registry: &'a TemplateRegistry, source: &'a S) -> Self {
        Self { registry, source }
    }

    /// Process every entity in order.
    ///
    /// The provider entity gets the sorted resource and data-source lists
    /// before rendering (see [`with_entity_lists`]).
    pub fn process_entities(&self, entities: &[TemplateData]) -> GenerationOutput {
        let mut out = GenerationOutput::default();
        for data in with_entity_lists(entities) {
            let id = data.id();
            out.record(id, self.process_entity(&data));
        }
        info!(
            files = out.files.len(),
            failed = out.errors.len(),
            "processed {} entities",
            entities.len()
        );
        out
    }

    /// Render, concatenate and merge one entity.
    pub fn process_entity(&self, data: &TemplateData) -> Result<EntityOutput, GeneratorError> {
        let id = data.id();
        let _span = debug_span!("entity", entity = %id).entered();
        let mut unit = String::new();
        let mut test_unit = String::new();
        let mut artifacts = BTreeMap::new();
        let mut diagnostics = Vec::new();

        for kind in ArtifactKind::ALL {
            let text = match self.render_artifact(data, kind) {
                Ok(Some(text)) => text,
                Ok(None) => continue,
                Err(e) if kind.is_primary() => {
                    error!(entity = %id, artifact = %kind, error = %e, "failed to render");
                    return Err(e);
                },
                Err(e) => {
                    warn!(entity = %id, artifact = %kind, error = %e, "failed to render; skipping");
                    diagnostics.push(
                        Diagnostic::warning(format!("Skipped {} artifact", kind))
                            .with_detail(e.to_string())
                            .with_entity(&data.name),
                    );
                    continue;
                },
            };

            if text.trim().is_empty() {
                debug!(entity = %id, artifact = %kind, "rendered empty; skipping");
                continue;
            }

            let target = if kind.is_test() {
                &mut test_unit
            } else {
                &mut unit
            };
            target.push_str(&text);
            if !text.ends_with('\n') {
                target.push('\n');
            }
            artifacts.insert(kind, text);
        }

        let mut files = BTreeMap::new();
        let mut dropped = Vec::new();
        for (test, source) in [(false, unit), (true, test_unit)] {
            if source.is_empty() {
                continue;
            }
            let report = merge_with_report(&source)?;
            for conflict in report.conflicts() {
                diagnostics.push(
                    Diagnostic::warning(format!(
                        "Dropped conflicting duplicate declaration {}",
                        conflict.key
                    ))
                    .with_detail(format!("line {} of the concatenated source", conflict.line))
                    .with_entity(&data.name),
                );
            }
            dropped.extend(report.dropped);
            files.insert(id.output_file_name(test), report.merged);
        }

        Ok(EntityOutput {
            id,
            files,
            artifacts,
            diagnostics,
            dropped,
        })
    }

    /// Resolve and render one artifact; `Ok(None)` if it has no template.
    fn render_artifact(
        &self,
        data: &TemplateData,
        kind: ArtifactKind,
    ) -> Result<Option<String>, GeneratorError> {
        let resolution = self
            .registry
            .resolve(self.source, data.kind, &data.name, kind)?;
        if resolution == Resolution::Skipped {
            if kind == ArtifactKind::Schema {
                return Err(GeneratorError::MissingTemplate {
                    entity: data.name.clone(),
                    kind: kind.to_string(),
                });
            }
            debug!(entity = %data.id(), artifact = %kind, "no template; skipping");
            return Ok(None);
        }
        debug!(entity = %data.id(), artifact = %kind, template = %resolution, "rendering");
        self.registry.render(&resolution, data)
    }
}

/// Give the provider entity the lists of resources and data sources, each
/// sorted by name. Other entities are passed through unchanged.
pub fn with_entity_lists(entities: &[TemplateData]) -> Vec<Cow<'_, TemplateData>> {
    let sorted = |kind: EntityKind| {
        let mut list: Vec<TemplateData> = entities
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    };

    entities
        .iter()
        .map(|data| {
            if data.kind == EntityKind::Provider {
                let mut provider = data.clone();
                provider.resources = sorted(EntityKind::Resource);
                provider.data_sources = sorted(EntityKind::DataSource);
                Cow::Owned(provider)
            } else {
                Cow::Borrowed(data)
            }
        })
        .collect()
}
