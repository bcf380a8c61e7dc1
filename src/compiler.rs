//! Type-mapping compiler.
//!
//! Turns [`AttributeNode`] trees into Go text for the
//! terraform-plugin-framework attribute-type system:
//!
//! - model struct fields (`ApiKey *ApiKey \`tfsdk:"api_key"\``)
//! - a struct type plus an `AttrTypes()` method for every nested object
//! - framework schema attribute and block entries
//! - conversion statements that copy a decoded API response
//!   (`data map[string]any`) into the model with checked type assertions
//!
//! The compiler is recursive and depth-first over children, visiting them in
//! declaration order. It is a pure function of its input: compiling the same
//! tree twice yields byte-identical output.

use std::collections::{BTreeMap, BTreeSet};

use crate::casing::{to_camel, to_pascal};
use crate::error::GeneratorError;
use crate::schema::{AttributeKind, AttributeNode, Descriptor, ElementType};
use crate::types::{CustomTypeData, EntityKind};

/// Go import path of the framework `types` package.
pub const TYPES_IMPORT: &str = "github.com/hashicorp/terraform-plugin-framework/types";
/// Go import path of the framework `attr` package.
pub const ATTR_IMPORT: &str = "github.com/hashicorp/terraform-plugin-framework/attr";
/// Go import path of the framework validator interfaces.
pub const VALIDATOR_IMPORT: &str = "github.com/hashicorp/terraform-plugin-framework/schema/validator";
/// Go import path of the resource plan modifier interfaces.
pub const PLANMODIFIER_IMPORT: &str =
    "github.com/hashicorp/terraform-plugin-framework/resource/schema/planmodifier";

/// Path of attribute names from the entity root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamePath(Vec<String>);

impl NamePath {
    /// The entity root.
    pub fn root() -> Self {
        Self::default()
    }

    /// The path of a child attribute.
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }

    /// Whether this is the entity root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Dotted form used in error messages (`api_key.api_key_id`).
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }

    /// Exported Go type name for the object at this path (`ApiKey`).
    pub fn type_name(&self) -> String {
        to_pascal(&self.0.join("_"))
    }

    /// Local Go binding prefix for this path (`apiKey`).
    pub fn binding(&self) -> String {
        to_camel(&self.0.join("_"))
    }
}

/// A nested object type declared by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedType {
    /// Go type name (`ApiKey`).
    pub type_name: String,
    /// Dotted path of the attribute it models.
    pub path: String,
}

/// Go text produced for one attribute (or a list of siblings).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compiled {
    /// Conversion statements reading from the scope's data map.
    pub conversions: String,
    /// Struct field lines for the enclosing model.
    pub fields: String,
    /// Top-level type declarations for nested objects.
    pub declarations: String,
    /// Framework schema attribute entries.
    pub schema: String,
    /// Framework schema block entries.
    pub blocks: String,
    /// Imports needed by `schema` and `blocks`.
    pub schema_imports: BTreeSet<String>,
    /// Imports needed by `fields` and `declarations`.
    pub model_imports: BTreeSet<String>,
    /// Imports needed by `conversions`.
    pub conversion_imports: BTreeSet<String>,
    /// Package-local custom types referenced, in first-use order.
    pub custom_types: Vec<CustomTypeData>,
    /// Nested object types in declaration order.
    pub nested_types: Vec<NestedType>,
}

impl Compiled {
    /// Append the output of a sibling attribute.
    pub fn extend(&mut self, other: Compiled) {
        self.conversions.push_str(&other.conversions);
        self.fields.push_str(&other.fields);
        self.declarations.push_str(&other.declarations);
        self.schema.push_str(&other.schema);
        self.blocks.push_str(&other.blocks);
        self.schema_imports.extend(other.schema_imports);
        self.model_imports.extend(other.model_imports);
        self.conversion_imports.extend(other.conversion_imports);
        for custom in other.custom_types {
            if !self.custom_types.contains(&custom) {
                self.custom_types.push(custom);
            }
        }
        self.nested_types.extend(other.nested_types);
    }

    /// Fail if two nested objects map to the same Go type name, as `a.b` and
    /// `a_b` both do.
    fn check_type_names(&self) -> Result<(), GeneratorError> {
        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
        for nested in &self.nested_types {
            if let Some(first) = seen.insert(&nested.type_name, &nested.path) {
                return Err(GeneratorError::InvalidSchema(format!(
                    "attributes '{}' and '{}' both map to Go type {}",
                    first, nested.path, nested.type_name
                )));
            }
        }
        Ok(())
    }
}

/// A scalar in the framework type system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scalar {
    Bool,
    String,
    Int64,
    Float64,
    Number,
}

impl Scalar {
    fn of_kind(kind: &AttributeKind) -> Option<Self> {
        match kind {
            AttributeKind::Bool => Some(Self::Bool),
            AttributeKind::String => Some(Self::String),
            AttributeKind::Int64 => Some(Self::Int64),
            AttributeKind::Float64 => Some(Self::Float64),
            AttributeKind::Number => Some(Self::Number),
            _ => None,
        }
    }

    fn of_element(element: &ElementType) -> Option<Self> {
        match element {
            ElementType::Bool => Some(Self::Bool),
            ElementType::String => Some(Self::String),
            ElementType::Int64 => Some(Self::Int64),
            ElementType::Float64 => Some(Self::Float64),
            ElementType::Number => Some(Self::Number),
            _ => None,
        }
    }

    /// Framework type name without package (`String`).
    fn name(self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::String => "String",
            Self::Int64 => "Int64",
            Self::Float64 => "Float64",
            Self::Number => "Number",
        }
    }

    /// Go type a decoded JSON value of this scalar asserts to.
    fn decoded(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::String => "string",
            Self::Int64 | Self::Float64 | Self::Number => "float64",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::String => "string",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Number => "number",
        }
    }

    /// Expression building the framework value from a decoded binding.
    fn value_ctor(self, binding: &str) -> String {
        match self {
            Self::Bool => format!("types.BoolValue({})", binding),
            Self::String => format!("types.StringValue({})", binding),
            Self::Int64 => format!("types.Int64Value(int64({}))", binding),
            Self::Float64 => format!("types.Float64Value({})", binding),
            Self::Number => format!("types.NumberValue(big.NewFloat({}))", binding),
        }
    }

    fn ctor_imports(self) -> &'static [&'static str] {
        match self {
            Self::Number => &[TYPES_IMPORT, "math/big"],
            _ => &[TYPES_IMPORT],
        }
    }
}

/// Quote a string as a Go interpreted string literal.
pub fn go_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            },
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Indented line writer.
#[derive(Default)]
struct GoWriter {
    buf: String,
}

impl GoWriter {
    fn line(&mut self, depth: usize, text: impl AsRef<str>) {
        for _ in 0..depth {
            self.buf.push('\t');
        }
        self.buf.push_str(text.as_ref());
        self.buf.push('\n');
    }

    fn raw(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    fn finish(self) -> String {
        self.buf
    }
}

/// Where conversion statements read from and write to.
struct Scope<'a> {
    data: &'a str,
    target: &'a str,
    depth: usize,
}

/// Compiles attribute trees for one kind of entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiler {
    entity: EntityKind,
    type_prefix: String,
    schema_depth: usize,
    conversion_depth: usize,
}

impl Compiler {
    /// Create a compiler for the given entity kind.
    ///
    /// Schema entries are indented for placement inside
    /// `schema.Schema{Attributes: map[string]schema.Attribute{...}}` in a
    /// function body; conversions for placement in a function body.
    pub fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            type_prefix: String::new(),
            schema_depth: 3,
            conversion_depth: 1,
        }
    }

    /// Prefix every nested object type name with `prefix`, so entities
    /// sharing a Go package declare distinct types (`WidgetResourceTags`).
    pub fn with_type_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.type_prefix = prefix.into();
        self
    }

    /// Go type name of the nested object at `path`.
    pub fn type_name(&self, path: &NamePath) -> String {
        format!("{}{}", self.type_prefix, path.type_name())
    }

    /// Go type of the model field for a top-level attribute.
    pub fn field_type(&self, node: &AttributeNode) -> Result<String, GeneratorError> {
        self.go_type(node, &NamePath::root().child(&node.name))
    }

    /// Compile one attribute whose parent is at `parent`.
    ///
    /// At the entity root, conversions read from `data` and write to `model`.
    /// Below the root they read from `<parent>Data` and write to
    /// `<parent>Value`, matching the bindings the parent's conversion emits.
    pub fn compile(
        &self,
        node: &AttributeNode,
        parent: &NamePath,
    ) -> Result<Compiled, GeneratorError> {
        let (data, target) = if parent.is_root() {
            ("data".to_string(), "model".to_string())
        } else {
            (
                format!("{}Data", parent.binding()),
                format!("{}Value", parent.binding()),
            )
        };
        let scope = Scope {
            data: &data,
            target: &target,
            depth: self.conversion_depth,
        };
        let out = self.compile_node(node, parent, &scope, self.schema_depth)?;
        out.check_type_names()?;
        Ok(out)
    }

    /// Compile every top-level attribute of an entity, in order.
    pub fn compile_all(&self, nodes: &[AttributeNode]) -> Result<Compiled, GeneratorError> {
        let root = NamePath::root();
        let mut out = Compiled::default();
        for node in nodes {
            out.extend(self.compile(node, &root)?);
        }
        out.check_type_names()?;
        Ok(out)
    }

    fn compile_node(
        &self,
        node: &AttributeNode,
        parent: &NamePath,
        scope: &Scope<'_>,
        schema_depth: usize,
    ) -> Result<Compiled, GeneratorError> {
        let path = parent.child(&node.name);
        check_shape(node, &path)?;

        let mut out = Compiled::default();
        let go_type = self.go_type(node, &path)?;
        out.fields = format!(
            "\t{} {} `tfsdk:\"{}\"`\n",
            to_pascal(&node.name),
            go_type,
            node.name
        );
        if go_type.contains("types.") && node.custom_type.is_none() {
            out.model_imports.insert(TYPES_IMPORT.to_string());
        }

        if let Some(custom) = &node.custom_type {
            match &custom.import {
                Some(import) => {
                    out.model_imports.insert(import.clone());
                    out.schema_imports.insert(import.clone());
                    out.conversion_imports.insert(import.clone());
                },
                None => {
                    let scalar = Scalar::of_kind(&node.kind).ok_or_else(|| {
                        GeneratorError::unsupported(path.dotted(), node.kind.label())
                    })?;
                    out.custom_types.push(CustomTypeData {
                        type_name: custom.type_name.clone(),
                        value_type: custom.value_type.clone(),
                        scalar: scalar.name().to_string(),
                    });
                },
            }
        }

        let mut schema = GoWriter::default();
        schema.line(
            schema_depth,
            format!("{}: schema.{}{{", go_quote(&node.name), schema_attribute(&node.kind)),
        );
        self.schema_flags(node, &mut schema, schema_depth + 1, &mut out)?;

        match &node.kind {
            kind if kind.is_scalar() => {
                let scalar = Scalar::of_kind(kind)
                    .ok_or_else(|| GeneratorError::unsupported(path.dotted(), kind.label()))?;
                out.conversions =
                    scalar_conversion(node, &path, scalar, scope, &mut out.conversion_imports);
            },
            AttributeKind::List { element_type }
            | AttributeKind::Set { element_type }
            | AttributeKind::Map { element_type } => {
                let scalar = element_scalar(element_type, &path)?;
                schema.line(
                    schema_depth + 1,
                    format!("ElementType: types.{}Type,", scalar.name()),
                );
                out.schema_imports.insert(TYPES_IMPORT.to_string());
                out.conversions = if matches!(node.kind, AttributeKind::Map { .. }) {
                    scalar_map_conversion(node, &path, scalar, scope, &mut out.conversion_imports)
                } else {
                    scalar_list_conversion(node, &path, scalar, scope, &mut out.conversion_imports)
                };
            },
            _ => {
                self.compile_nested(node, &path, scope, schema_depth, &mut schema, &mut out)?;
            },
        }

        schema.line(schema_depth, "},");
        if node.kind.is_block() {
            out.blocks = schema.finish();
        } else {
            out.schema = schema.finish();
        }
        Ok(out)
    }

    fn compile_nested(
        &self,
        node: &AttributeNode,
        path: &NamePath,
        scope: &Scope<'_>,
        schema_depth: usize,
        schema: &mut GoWriter,
        out: &mut Compiled,
    ) -> Result<(), GeneratorError> {
        let type_name = self.type_name(path);
        let binding = path.binding();
        let data = format!("{}Data", binding);
        let target = format!("{}Value", binding);

        let repeated = !matches!(
            node.kind,
            AttributeKind::Object | AttributeKind::SingleNested | AttributeKind::SingleNestedBlock
        );
        let child_scope = Scope {
            data: &data,
            target: &target,
            depth: scope.depth + if repeated { 2 } else { 1 },
        };
        let child_schema_depth = schema_depth + if repeated { 3 } else { 2 };

        let mut inner = Compiled::default();
        for child in &node.children {
            inner.extend(self.compile_node(child, path, &child_scope, child_schema_depth)?);
        }

        // Object attributes only carry attribute types; the children's
        // schema entries are not part of the framework schema.
        match node.kind {
            AttributeKind::Object => {
                schema.line(
                    schema_depth + 1,
                    format!("AttributeTypes: {}{{}}.AttrTypes(),", type_name),
                );
            },
            AttributeKind::SingleNested | AttributeKind::SingleNestedBlock => {
                nested_entries(schema, schema_depth + 1, &inner);
                out.schema_imports.extend(inner.schema_imports.iter().cloned());
            },
            _ => {
                let object = if node.kind.is_block() {
                    "NestedBlockObject"
                } else {
                    "NestedAttributeObject"
                };
                schema.line(schema_depth + 1, format!("NestedObject: schema.{}{{", object));
                nested_entries(schema, schema_depth + 2, &inner);
                schema.line(schema_depth + 1, "},");
                out.schema_imports.extend(inner.schema_imports.iter().cloned());
            },
        }

        let mut decl = GoWriter::default();
        decl.line(0, format!("type {} struct {{", type_name));
        decl.raw(&inner.fields);
        decl.line(0, "}");
        decl.line(0, "");
        decl.line(0, format!("func ({}) AttrTypes() map[string]attr.Type {{", type_name));
        decl.line(1, "return map[string]attr.Type{");
        for child in &node.children {
            let expr = self.attr_type_expr(child, &path.child(&child.name))?;
            if expr.starts_with("types.") {
                out.model_imports.insert(TYPES_IMPORT.to_string());
            }
            decl.line(2, format!("{}: {},", go_quote(&child.name), expr));
        }
        decl.line(1, "}");
        decl.line(0, "}");
        decl.line(0, "");
        out.declarations = decl.finish();
        out.declarations.push_str(&inner.declarations);
        out.nested_types.push(NestedType {
            type_name: type_name.clone(),
            path: path.dotted(),
        });
        out.nested_types.extend(inner.nested_types);
        out.model_imports.insert(ATTR_IMPORT.to_string());
        out.model_imports.extend(inner.model_imports);

        out.conversions = nested_conversion(node, path, &type_name, scope, &inner.conversions);
        out.conversion_imports.insert("fmt".to_string());
        out.conversion_imports.extend(inner.conversion_imports);

        for custom in inner.custom_types {
            if !out.custom_types.contains(&custom) {
                out.custom_types.push(custom);
            }
        }
        Ok(())
    }

    fn schema_flags(
        &self,
        node: &AttributeNode,
        w: &mut GoWriter,
        depth: usize,
        out: &mut Compiled,
    ) -> Result<(), GeneratorError> {
        // Blocks are always optional in the framework and carry no
        // settability flags.
        let cor = node.computed_optional_required;
        let block = node.kind.is_block();
        if block && (cor.is_computed() || node.sensitive || node.default.is_some()) {
            return Err(GeneratorError::unsupported(
                node.name.clone(),
                "blocks cannot be computed, sensitive or defaulted",
            ));
        }
        if cor.is_required() && !block {
            w.line(depth, "Required: true,");
        }
        if cor.is_optional() && !block {
            w.line(depth, "Optional: true,");
        }
        if cor.is_computed() {
            w.line(depth, "Computed: true,");
        }
        if node.sensitive {
            w.line(depth, "Sensitive: true,");
        }
        if let Some(description) = &node.description {
            let quoted = go_quote(description);
            w.line(depth, format!("Description: {},", quoted));
            w.line(depth, format!("MarkdownDescription: {},", quoted));
        }
        if let Some(custom) = &node.custom_type {
            w.line(depth, format!("CustomType: {}{{}},", custom.type_name));
        }

        let interface = validator_interface(&node.kind);
        if !node.validators.is_empty() {
            out.schema_imports.insert(VALIDATOR_IMPORT.to_string());
            let opener = format!("Validators: []validator.{}{{", interface);
            descriptor_list(w, depth, &opener, &node.validators, out);
        }

        if self.entity != EntityKind::Resource
            && (!node.plan_modifiers.is_empty() || node.default.is_some())
        {
            return Err(GeneratorError::unsupported(
                node.name.clone(),
                format!(
                    "plan modifiers and defaults are only supported on resources, not on a {}",
                    self.entity
                ),
            ));
        }
        if !node.plan_modifiers.is_empty() {
            out.schema_imports.insert(PLANMODIFIER_IMPORT.to_string());
            descriptor_list(
                w,
                depth,
                &format!("PlanModifiers: []planmodifier.{}{{", interface),
                &node.plan_modifiers,
                out,
            );
        }
        if let Some(default) = &node.default {
            w.line(depth, format!("Default: {},", default.expression));
            out.schema_imports.extend(default.imports.iter().cloned());
        }
        Ok(())
    }
}

/// Compile one attribute for a resource entity.
///
/// See [`Compiler::compile`].
pub fn compile(node: &AttributeNode, path: &NamePath) -> Result<Compiled, GeneratorError> {
    Compiler::new(EntityKind::Resource).compile(node, path)
}

fn descriptor_list(
    w: &mut GoWriter,
    depth: usize,
    opener: &str,
    descriptors: &[Descriptor],
    out: &mut Compiled,
) {
    w.line(depth, opener);
    for descriptor in descriptors {
        w.line(depth + 1, format!("{},", descriptor.expression));
        out.schema_imports.extend(descriptor.imports.iter().cloned());
    }
    w.line(depth, "},");
}

/// Reject kind/children/custom-type combinations with no mapping.
fn check_shape(node: &AttributeNode, path: &NamePath) -> Result<(), GeneratorError> {
    let kind = &node.kind;
    if kind.is_nested() && node.children.is_empty() {
        return Err(GeneratorError::unsupported(
            path.dotted(),
            format!("{} attribute has no child attributes", kind.label()),
        ));
    }
    if !kind.is_nested() && !node.children.is_empty() {
        return Err(GeneratorError::unsupported(
            path.dotted(),
            format!("{} attribute cannot have child attributes", kind.label()),
        ));
    }
    if !kind.is_block() && node.children.iter().any(|c| c.kind.is_block()) {
        return Err(GeneratorError::unsupported(
            path.dotted(),
            format!("{} attribute cannot contain blocks", kind.label()),
        ));
    }
    if node.custom_type.is_some() && !kind.is_scalar() {
        return Err(GeneratorError::unsupported(
            path.dotted(),
            format!("custom types are not supported on {} attributes", kind.label()),
        ));
    }
    Ok(())
}

fn element_scalar(element: &ElementType, path: &NamePath) -> Result<Scalar, GeneratorError> {
    Scalar::of_element(element).ok_or_else(|| {
        GeneratorError::unsupported(
            path.dotted(),
            format!(
                "element type {} is not supported; use a nested attribute instead",
                element.label()
            ),
        )
    })
}

fn schema_attribute(kind: &AttributeKind) -> &'static str {
    match kind {
        AttributeKind::Bool => "BoolAttribute",
        AttributeKind::String => "StringAttribute",
        AttributeKind::Int64 => "Int64Attribute",
        AttributeKind::Float64 => "Float64Attribute",
        AttributeKind::Number => "NumberAttribute",
        AttributeKind::List { .. } => "ListAttribute",
        AttributeKind::Set { .. } => "SetAttribute",
        AttributeKind::Map { .. } => "MapAttribute",
        AttributeKind::Object => "ObjectAttribute",
        AttributeKind::SingleNested => "SingleNestedAttribute",
        AttributeKind::ListNested => "ListNestedAttribute",
        AttributeKind::SetNested => "SetNestedAttribute",
        AttributeKind::MapNested => "MapNestedAttribute",
        AttributeKind::SingleNestedBlock => "SingleNestedBlock",
        AttributeKind::ListNestedBlock => "ListNestedBlock",
        AttributeKind::SetNestedBlock => "SetNestedBlock",
    }
}

fn validator_interface(kind: &AttributeKind) -> &'static str {
    match kind {
        AttributeKind::Bool => "Bool",
        AttributeKind::String => "String",
        AttributeKind::Int64 => "Int64",
        AttributeKind::Float64 => "Float64",
        AttributeKind::Number => "Number",
        AttributeKind::List { .. } | AttributeKind::ListNested | AttributeKind::ListNestedBlock => {
            "List"
        },
        AttributeKind::Set { .. } | AttributeKind::SetNested | AttributeKind::SetNestedBlock => {
            "Set"
        },
        AttributeKind::Map { .. } | AttributeKind::MapNested => "Map",
        AttributeKind::Object | AttributeKind::SingleNested | AttributeKind::SingleNestedBlock => {
            "Object"
        },
    }
}

impl Compiler {
    /// Go type of the model field for `node`.
    fn go_type(&self, node: &AttributeNode, path: &NamePath) -> Result<String, GeneratorError> {
        if let Some(custom) = &node.custom_type {
            return Ok(custom.value_type.clone());
        }
        Ok(match &node.kind {
            AttributeKind::List { element_type } | AttributeKind::Set { element_type } => {
                format!("[]types.{}", element_scalar(element_type, path)?.name())
            },
            AttributeKind::Map { element_type } => {
                format!("map[string]types.{}", element_scalar(element_type, path)?.name())
            },
            AttributeKind::Object
            | AttributeKind::SingleNested
            | AttributeKind::SingleNestedBlock => format!("*{}", self.type_name(path)),
            AttributeKind::ListNested
            | AttributeKind::SetNested
            | AttributeKind::ListNestedBlock
            | AttributeKind::SetNestedBlock => format!("[]{}", self.type_name(path)),
            AttributeKind::MapNested => format!("map[string]{}", self.type_name(path)),
            kind => match Scalar::of_kind(kind) {
                Some(scalar) => format!("types.{}", scalar.name()),
                None => {
                    return Err(GeneratorError::unsupported(path.dotted(), kind.label()));
                },
            },
        })
    }

    /// `attr.Type` expression for `node`, used in `AttrTypes()` maps.
    fn attr_type_expr(
        &self,
        node: &AttributeNode,
        path: &NamePath,
    ) -> Result<String, GeneratorError> {
        if let Some(custom) = &node.custom_type {
            return Ok(format!("{}{{}}", custom.type_name));
        }
        let object = format!(
            "types.ObjectType{{AttrTypes: {}{{}}.AttrTypes()}}",
            self.type_name(path)
        );
        Ok(match &node.kind {
            AttributeKind::List { element_type } => format!(
                "types.ListType{{ElemType: types.{}Type}}",
                element_scalar(element_type, path)?.name()
            ),
            AttributeKind::Set { element_type } => format!(
                "types.SetType{{ElemType: types.{}Type}}",
                element_scalar(element_type, path)?.name()
            ),
            AttributeKind::Map { element_type } => format!(
                "types.MapType{{ElemType: types.{}Type}}",
                element_scalar(element_type, path)?.name()
            ),
            AttributeKind::Object
            | AttributeKind::SingleNested
            | AttributeKind::SingleNestedBlock => object,
            AttributeKind::ListNested | AttributeKind::ListNestedBlock => {
                format!("types.ListType{{ElemType: {}}}", object)
            },
            AttributeKind::SetNested | AttributeKind::SetNestedBlock => {
                format!("types.SetType{{ElemType: {}}}", object)
            },
            AttributeKind::MapNested => format!("types.MapType{{ElemType: {}}}", object),
            kind => match Scalar::of_kind(kind) {
                Some(scalar) => format!("types.{}Type", scalar.name()),
                None => {
                    return Err(GeneratorError::unsupported(path.dotted(), kind.label()));
                },
            },
        })
    }
}

/// `Attributes:` and `Blocks:` maps of a nested object, each only if it has entries.
fn nested_entries(w: &mut GoWriter, depth: usize, inner: &Compiled) {
    if !inner.schema.is_empty() {
        w.line(depth, "Attributes: map[string]schema.Attribute{");
        w.raw(&inner.schema);
        w.line(depth, "},");
    }
    if !inner.blocks.is_empty() {
        w.line(depth, "Blocks: map[string]schema.Block{");
        w.raw(&inner.blocks);
        w.line(depth, "},");
    }
}

/// Opening `if v, ok := data["name"]; ok && v != nil {` shared by all conversions.
fn open_field(w: &mut GoWriter, node: &AttributeNode, scope: &Scope<'_>) {
    w.line(
        scope.depth,
        format!(
            "if v, ok := {}[{}]; ok && v != nil {{",
            scope.data,
            go_quote(&node.name)
        ),
    );
}

/// Checked assertion of `source` to `go_type`, returning from the function on mismatch.
///
/// `location` is a `fmt.Errorf` verb sequence describing where the value came
/// from (`%q`, `%q[%d]`) and `args` are its arguments.
#[allow(clippy::too_many_arguments)]
fn assert_into(
    w: &mut GoWriter,
    depth: usize,
    binding: &str,
    source: &str,
    go_type: &str,
    what: &str,
    location: &str,
    args: &[&str],
) {
    let mut args: Vec<&str> = args.to_vec();
    args.push(source);
    w.line(depth, format!("{}, ok := {}.({})", binding, source, go_type));
    w.line(depth, "if !ok {");
    w.line(
        depth + 1,
        format!(
            "return fmt.Errorf(\"attribute {}: expected {}, got %T\", {})",
            location,
            what,
            args.join(", ")
        ),
    );
    w.line(depth, "}");
}

fn scalar_conversion(
    node: &AttributeNode,
    path: &NamePath,
    scalar: Scalar,
    scope: &Scope<'_>,
    imports: &mut BTreeSet<String>,
) -> String {
    let mut w = GoWriter::default();
    open_field(&mut w, node, scope);
    assert_into(
        &mut w,
        scope.depth + 1,
        "val",
        "v",
        scalar.decoded(),
        scalar.label(),
        "%q",
        &[&go_quote(&path.dotted())],
    );
    let ctor = scalar.value_ctor("val");
    let value = match &node.custom_type {
        Some(custom) => format!("{}{{{}Value: {}}}", custom.value_type, scalar.name(), ctor),
        None => ctor,
    };
    w.line(
        scope.depth + 1,
        format!("{}.{} = {}", scope.target, to_pascal(&node.name), value),
    );
    w.line(scope.depth, "}");
    imports.insert("fmt".to_string());
    imports.extend(scalar.ctor_imports().iter().map(|s| s.to_string()));
    w.finish()
}

fn scalar_list_conversion(
    node: &AttributeNode,
    path: &NamePath,
    scalar: Scalar,
    scope: &Scope<'_>,
    imports: &mut BTreeSet<String>,
) -> String {
    let binding = path.binding();
    let items = format!("{}Items", binding);
    let list = format!("{}List", binding);
    let quoted = go_quote(&path.dotted());
    let d = scope.depth;

    let mut w = GoWriter::default();
    open_field(&mut w, node, scope);
    assert_into(&mut w, d + 1, &items, "v", "[]any", "list", "%q", &[&quoted]);
    w.line(
        d + 1,
        format!(
            "{} := make([]types.{}, 0, len({}))",
            list,
            scalar.name(),
            items
        ),
    );
    w.line(d + 1, format!("for i, item := range {} {{", items));
    assert_into(
        &mut w,
        d + 2,
        "val",
        "item",
        scalar.decoded(),
        scalar.label(),
        "%q[%d]",
        &[&quoted, "i"],
    );
    w.line(
        d + 2,
        format!("{} = append({}, {})", list, list, scalar.value_ctor("val")),
    );
    w.line(d + 1, "}");
    w.line(
        d + 1,
        format!("{}.{} = {}", scope.target, to_pascal(&node.name), list),
    );
    w.line(d, "}");
    imports.insert("fmt".to_string());
    imports.extend(scalar.ctor_imports().iter().map(|s| s.to_string()));
    w.finish()
}

fn scalar_map_conversion(
    node: &AttributeNode,
    path: &NamePath,
    scalar: Scalar,
    scope: &Scope<'_>,
    imports: &mut BTreeSet<String>,
) -> String {
    let binding = path.binding();
    let entries = format!("{}Entries", binding);
    let map = format!("{}Map", binding);
    let quoted = go_quote(&path.dotted());
    let d = scope.depth;

    let mut w = GoWriter::default();
    open_field(&mut w, node, scope);
    assert_into(
        &mut w,
        d + 1,
        &entries,
        "v",
        "map[string]any",
        "map",
        "%q",
        &[&quoted],
    );
    w.line(
        d + 1,
        format!(
            "{} := make(map[string]types.{}, len({}))",
            map,
            scalar.name(),
            entries
        ),
    );
    w.line(d + 1, format!("for key, item := range {} {{", entries));
    assert_into(
        &mut w,
        d + 2,
        "val",
        "item",
        scalar.decoded(),
        scalar.label(),
        "%q[%q]",
        &[&quoted, "key"],
    );
    w.line(d + 2, format!("{}[key] = {}", map, scalar.value_ctor("val")));
    w.line(d + 1, "}");
    w.line(
        d + 1,
        format!("{}.{} = {}", scope.target, to_pascal(&node.name), map),
    );
    w.line(d, "}");
    imports.insert("fmt".to_string());
    imports.extend(scalar.ctor_imports().iter().map(|s| s.to_string()));
    w.finish()
}

fn nested_conversion(
    node: &AttributeNode,
    path: &NamePath,
    type_name: &str,
    scope: &Scope<'_>,
    children: &str,
) -> String {
    let binding = path.binding();
    let data = format!("{}Data", binding);
    let value = format!("{}Value", binding);
    let field = to_pascal(&node.name);
    let quoted = go_quote(&path.dotted());
    let d = scope.depth;

    let mut w = GoWriter::default();
    open_field(&mut w, node, scope);
    match node.kind {
        AttributeKind::Object | AttributeKind::SingleNested | AttributeKind::SingleNestedBlock => {
            assert_into(
                &mut w,
                d + 1,
                &data,
                "v",
                "map[string]any",
                "object",
                "%q",
                &[&quoted],
            );
            w.line(d + 1, format!("var {} {}", value, type_name));
            w.raw(children);
            w.line(d + 1, format!("{}.{} = &{}", scope.target, field, value));
        },
        AttributeKind::MapNested => {
            let entries = format!("{}Entries", binding);
            let map = format!("{}Map", binding);
            assert_into(
                &mut w,
                d + 1,
                &entries,
                "v",
                "map[string]any",
                "map",
                "%q",
                &[&quoted],
            );
            w.line(
                d + 1,
                format!("{} := make(map[string]{}, len({}))", map, type_name, entries),
            );
            w.line(d + 1, format!("for key, item := range {} {{", entries));
            assert_into(
                &mut w,
                d + 2,
                &data,
                "item",
                "map[string]any",
                "object",
                "%q[%q]",
                &[&quoted, "key"],
            );
            w.line(d + 2, format!("var {} {}", value, type_name));
            w.raw(children);
            w.line(d + 2, format!("{}[key] = {}", map, value));
            w.line(d + 1, "}");
            w.line(d + 1, format!("{}.{} = {}", scope.target, field, map));
        },
        _ => {
            let items = format!("{}Items", binding);
            let list = format!("{}List", binding);
            assert_into(
                &mut w,
                d + 1,
                &items,
                "v",
                "[]any",
                "list",
                "%q",
                &[&quoted],
            );
            w.line(
                d + 1,
                format!("{} := make([]{}, 0, len({}))", list, type_name, items),
            );
            w.line(d + 1, format!("for i, item := range {} {{", items));
            assert_into(
                &mut w,
                d + 2,
                &data,
                "item",
                "map[string]any",
                "object",
                "%q[%d]",
                &[&quoted, "i"],
            );
            w.line(d + 2, format!("var {} {}", value, type_name));
            w.raw(children);
            w.line(d + 2, format!("{} = append({}, {})", list, list, value));
            w.line(d + 1, "}");
            w.line(d + 1, format!("{}.{} = {}", scope.target, field, list));
        },
    }
    w.line(d, "}");
    w.finish()
}
