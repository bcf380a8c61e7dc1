//! Hemmer Provider Generator
//!
//! This crate generates Go source for
//! [terraform-plugin-framework](https://github.com/hashicorp/terraform-plugin-framework)
//! providers from a language-neutral schema description.
//!
//! # Overview
//!
//! The generator provides:
//!
//! - **Schema IR**: Types for describing the provider, its resources and data sources
//! - **Type-mapping compiler**: Model structs, nested object types, framework schema
//!   entries and checked conversion functions for every attribute
//! - **Template pipeline**: Per-entity template resolution with override and
//!   shared-default templates layered over the built-ins
//! - **Source merge**: Declaration-level deduplication of the concatenated fragments
//!   of each entity into one well-formed Go file
//! - **Convergence protocol**: An async wait for a remote object to reach a target state
//! - **Logging**: Integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```
//! use hemmer_provider_generator::{
//!     Generator, GeneratorConfig,
//!     schema::{AttributeNode, EntitySchema, OperationsSpec, ProviderSchema, WaitSpec},
//! };
//!
//! let schema = ProviderSchema::new("acme")
//!     .with_provider_config(
//!         EntitySchema::new("acme").with_attribute(AttributeNode::optional_string("endpoint")),
//!     )
//!     .with_resource(
//!         EntitySchema::new("widget")
//!             .with_attribute(AttributeNode::computed_string("id"))
//!             .with_attribute(AttributeNode::required_string("name"))
//!             .with_operations(
//!                 OperationsSpec::new("/v1/widgets")
//!                     .with_create_wait(WaitSpec::new(["creating"], ["active"])),
//!             ),
//!     );
//!
//! let config = GeneratorConfig::new()
//!     .with_client_import("github.com/acme/terraform-provider-acme/internal/client");
//! let output = Generator::new(config).unwrap().generate(&schema);
//!
//! assert!(output.is_success());
//! for (name, source) in &output.files {
//!     println!("{}: {} bytes", name, source.len());
//! }
//! ```
//!
//! # Output Files
//!
//! Each entity produces one merged file and, when a test template resolves,
//! a test file:
//!
//! ```text
//! provider_gen.go           provider_gen_test.go
//! widget_resource_gen.go    widget_resource_gen_test.go
//! zones_data_source_gen.go  zones_data_source_gen_test.go
//! ```
//!
//! # Template Overrides
//!
//! A [`TemplateSource`] supplies override templates by name:
//!
//! - `<entity>_<kind>.tmpl` replaces one artifact of one entity
//! - `<kind>_default.tmpl` replaces one artifact of every entity
//!
//! where `<kind>` is one of `schema`, `operations`, `model`, `conversions`,
//! `custom_type_value` and `test`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod casing;
pub mod compiler;
pub mod convergence;
pub mod error;
pub mod generator;
pub mod logging;
pub mod merge;
pub mod pipeline;
pub mod schema;
pub mod templates;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use convergence::{
    await_state, await_state_with_cancel, ConvergenceSpec, Observed, ProbeError, StateProbe,
};
pub use error::{ConvergenceError, GeneratorError, MergeError};
pub use generator::{Generator, GeneratorConfig};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use merge::{merge, merge_with_report, MergeReport};
pub use pipeline::{GenerationOutput, Pipeline};
pub use schema::ProviderSchema;
pub use templates::{DirTemplateSource, MemoryTemplateSource, TemplateRegistry, TemplateSource};
pub use types::{ArtifactKind, EntityId, EntityKind};
pub use validation::{is_valid, validate, validate_result};
