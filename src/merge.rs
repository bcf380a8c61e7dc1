//! Declaration-level merge of generated Go fragments.
//!
//! The artifacts rendered for one entity are concatenated and merged into a
//! single source unit:
//!
//! - one package clause (every fragment must name the same package)
//! - one import block, each path once, in first-occurrence order
//! - top-level declarations in source order, each identity once
//!
//! Identities live in three namespaces: types are keyed by name, functions
//! by `(receiver type, name)` with free functions in their own partition,
//! and `var`/`const` declarations by their declared names. A grouped
//! declaration carries every name it declares, and a later declaration that
//! repeats any of them is a duplicate. The first occurrence wins and later
//! duplicates are dropped whole. Blank (`_`) declarations and `init`
//! functions may legally repeat, so they are only dropped when their text is
//! identical to one already kept.
//!
//! The merge is structural, not semantic. A dropped duplicate whose text
//! differs from the kept one is reported as a conflict and logged at `warn`.
//!
//! Comments directly above a declaration travel with it. Comments before the
//! first package clause are the file header and are kept; comments before a
//! later package clause belong to that fragment's header and are dropped.
//!
//! The output is canonical: `merge(merge(x)) == merge(x)`.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, warn};

use crate::error::MergeError;

/// Identity of a top-level declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeclKey {
    /// A type declaration.
    Type(String),
    /// A function or method; `receiver` is the base receiver type name.
    Func {
        /// Receiver type, without pointer or type parameters.
        receiver: Option<String>,
        /// Function name.
        name: String,
    },
    /// A `var` or `const` declaration.
    Value(String),
}

impl fmt::Display for DeclKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(name) => write!(f, "type {}", name),
            Self::Func {
                receiver: Some(receiver),
                name,
            } => write!(f, "func ({}) {}", receiver, name),
            Self::Func {
                receiver: None,
                name,
            } => write!(f, "func {}", name),
            Self::Value(name) => write!(f, "var {}", name),
        }
    }
}

impl DeclKey {
    /// Blank declarations and `init` functions may legally repeat.
    fn is_repeatable(&self) -> bool {
        match self {
            Self::Type(name) | Self::Value(name) => name == "_",
            Self::Func { receiver, name } => receiver.is_none() && name == "init",
        }
    }
}

/// A declaration dropped as a duplicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedDeclaration {
    /// Identity shared with the kept declaration.
    pub key: DeclKey,
    /// Line of the dropped declaration in the input.
    pub line: usize,
    /// Whether its text differs from the kept declaration, ignoring whitespace.
    pub conflicting: bool,
}

/// Result of [`merge_with_report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// The merged source unit.
    pub merged: String,
    /// Declarations dropped as duplicates, in input order.
    pub dropped: Vec<DroppedDeclaration>,
}

impl MergeReport {
    /// Dropped declarations whose text differed from the kept one.
    pub fn conflicts(&self) -> impl Iterator<Item = &DroppedDeclaration> {
        self.dropped.iter().filter(|d| d.conflicting)
    }
}

/// Merge concatenated Go fragments into one source unit.
pub fn merge(source: &str) -> Result<String, MergeError> {
    merge_with_report(source).map(|report| report.merged)
}

/// Merge concatenated Go fragments, also reporting dropped duplicates.
pub fn merge_with_report(source: &str) -> Result<MergeReport, MergeError> {
    let lines = scan(source)?;
    let (items, trailer) = group(&lines)?;

    let mut header: Vec<&str> = Vec::new();
    let mut package: Option<String> = None;
    let mut imports = ImportSet::default();
    let mut kept: Vec<(Vec<DeclKey>, &RawItem<'_>)> = Vec::new();
    let mut seen_text: HashSet<String> = HashSet::new();
    let mut dropped = Vec::new();

    for item in &items {
        let keyword = item.keyword();
        match keyword {
            "package" => {
                let name = package_name(item)?;
                match &package {
                    None => {
                        header = item.leading.clone();
                        package = Some(name);
                    },
                    Some(expected) if *expected != name => {
                        return Err(MergeError::PackageMismatch {
                            expected: expected.clone(),
                            found: name,
                        });
                    },
                    Some(_) => {},
                }
                continue;
            },
            _ if package.is_none() => {
                return Err(MergeError::Malformed {
                    line: item.line,
                    detail: format!("{} before the package clause", keyword),
                });
            },
            "import" => {
                if imports.grouped.is_none() {
                    imports.grouped = Some(item.rest().starts_with('('));
                }
                imports.extend(parse_imports(item)?);
                continue;
            },
            _ => {},
        }

        let keys = decl_keys(item)?;
        if keys.iter().all(DeclKey::is_repeatable) {
            let key = keys[0].clone();
            if seen_text.insert(normalize(&item.code_text())) {
                kept.push((keys, item));
            } else {
                debug!(decl = %key, line = item.line, "dropped identical repeated declaration");
                dropped.push(DroppedDeclaration {
                    key,
                    line: item.line,
                    conflicting: false,
                });
            }
            continue;
        }

        let repeated = kept.iter().find_map(|(kept_keys, first)| {
            keys.iter()
                .filter(|k| !k.is_repeatable())
                .find(|k| kept_keys.contains(k))
                .map(|k| (k.clone(), *first))
        });
        match repeated {
            None => kept.push((keys, item)),
            Some((key, first)) => {
                let conflicting = normalize(&first.code_text()) != normalize(&item.code_text());
                if conflicting {
                    warn!(
                        decl = %key,
                        line = item.line,
                        kept_line = first.line,
                        "dropped conflicting duplicate declaration"
                    );
                } else {
                    debug!(decl = %key, line = item.line, "dropped duplicate declaration");
                }
                dropped.push(DroppedDeclaration {
                    key,
                    line: item.line,
                    conflicting,
                });
            },
        }
    }

    let package = package.ok_or(MergeError::MissingPackage)?;

    let mut blocks: Vec<String> = Vec::new();
    if !header.is_empty() {
        blocks.push(header.join("\n"));
    }
    blocks.push(format!("package {}", package));
    if let ([spec], Some(false)) = (imports.specs.as_slice(), imports.grouped) {
        blocks.push(format!("import {}", spec.text));
    } else if !imports.specs.is_empty() {
        let mut block = String::from("import (\n");
        for spec in &imports.specs {
            block.push('\t');
            block.push_str(&spec.text);
            block.push('\n');
        }
        block.push(')');
        blocks.push(block);
    }
    for (_, item) in &kept {
        let mut block = String::new();
        if !item.leading.is_empty() {
            block.push_str(&item.leading.join("\n"));
            block.push('\n');
        }
        block.push_str(&item.code_text());
        blocks.push(block);
    }
    if !trailer.is_empty() {
        blocks.push(trailer.join("\n"));
    }

    let mut merged = blocks.join("\n\n");
    merged.push('\n');
    Ok(MergeReport { merged, dropped })
}

/// Collapse whitespace runs so formatting differences do not count as conflicts.
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lex {
    Code,
    BlockComment,
    RawString,
}

/// One input line with the lexical state at its start.
#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    number: usize,
    text: &'a str,
    depth: usize,
    lex: Lex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineClass {
    Start,
    Continuation,
    Comment,
    Blank,
}

const KEYWORDS: [&str; 6] = ["package", "import", "type", "func", "var", "const"];

impl Line<'_> {
    fn class(&self) -> LineClass {
        if self.depth > 0 || self.lex == Lex::RawString {
            return LineClass::Continuation;
        }
        if self.lex == Lex::BlockComment {
            return LineClass::Comment;
        }
        let trimmed = self.text.trim();
        if trimmed.is_empty() {
            LineClass::Blank
        } else if trimmed.starts_with("//") || trimmed.starts_with("/*") {
            LineClass::Comment
        } else if leading_keyword(trimmed).is_some() {
            LineClass::Start
        } else {
            LineClass::Continuation
        }
    }
}

fn leading_keyword(text: &str) -> Option<&'static str> {
    KEYWORDS.into_iter().find(|kw| {
        text.strip_prefix(kw)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', '\t', '(']))
    })
}

/// Track comments, literals and bracket nesting line by line.
fn scan(source: &str) -> Result<Vec<Line<'_>>, MergeError> {
    let mut lines = Vec::new();
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut lex = Lex::Code;
    let mut lex_line = 0;

    for (index, text) in source.lines().enumerate() {
        let number = index + 1;
        lines.push(Line {
            number,
            text,
            depth: stack.len(),
            lex,
        });

        let chars: Vec<char> = text.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();
            match lex {
                Lex::BlockComment => {
                    if c == '*' && next == Some('/') {
                        lex = Lex::Code;
                        i += 1;
                    }
                },
                Lex::RawString => {
                    if c == '`' {
                        lex = Lex::Code;
                    }
                },
                Lex::Code => match c {
                    '/' if next == Some('/') => break,
                    '/' if next == Some('*') => {
                        lex = Lex::BlockComment;
                        lex_line = number;
                        i += 1;
                    },
                    '`' => {
                        lex = Lex::RawString;
                        lex_line = number;
                    },
                    '"' | '\'' => {
                        i = closing_quote(&chars, i).ok_or(MergeError::Unterminated {
                            what: if c == '"' {
                                "string literal"
                            } else {
                                "rune literal"
                            },
                            line: number,
                        })?;
                    },
                    '(' | '[' | '{' => stack.push((c, number)),
                    ')' | ']' | '}' => {
                        let open = match c {
                            ')' => '(',
                            ']' => '[',
                            _ => '{',
                        };
                        match stack.pop() {
                            Some((o, _)) if o == open => {},
                            _ => return Err(MergeError::Unbalanced { line: number }),
                        }
                    },
                    _ => {},
                },
            }
            i += 1;
        }
    }

    match lex {
        Lex::BlockComment => Err(MergeError::Unterminated {
            what: "block comment",
            line: lex_line,
        }),
        Lex::RawString => Err(MergeError::Unterminated {
            what: "raw string literal",
            line: lex_line,
        }),
        Lex::Code => match stack.last() {
            Some((_, line)) => Err(MergeError::Unbalanced { line: *line }),
            None => Ok(lines),
        },
    }
}

/// Index of the quote closing the literal opened at `start`.
fn closing_quote(chars: &[char], start: usize) -> Option<usize> {
    let quote = chars[start];
    let mut j = start + 1;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            c if c == quote => return Some(j),
            _ => j += 1,
        }
    }
    None
}

/// A top-level item: its leading comments and its code lines.
#[derive(Debug)]
struct RawItem<'a> {
    line: usize,
    leading: Vec<&'a str>,
    code: Vec<Line<'a>>,
}

impl RawItem<'_> {
    fn keyword(&self) -> &'static str {
        self.code
            .first()
            .and_then(|first| leading_keyword(first.text.trim()))
            .unwrap_or("")
    }

    fn code_text(&self) -> String {
        self.code.iter().map(|l| l.text).collect::<Vec<_>>().join("\n")
    }

    /// Code after the leading keyword.
    fn rest(&self) -> &str {
        let first = self.code.first().map(|l| l.text.trim()).unwrap_or("");
        first[self.keyword().len()..].trim_start()
    }
}

fn texts<'a>(lines: Vec<Line<'a>>) -> Vec<&'a str> {
    lines.into_iter().map(|l| l.text).collect()
}

fn trim_blank_edges<'a>(mut lines: Vec<&'a str>) -> Vec<&'a str> {
    while lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    lines
}

/// Split lines into items; returns the items and any trailing comments.
fn group<'a>(lines: &[Line<'a>]) -> Result<(Vec<RawItem<'a>>, Vec<&'a str>), MergeError> {
    let mut items = Vec::new();
    let mut current: Option<RawItem<'a>> = None;
    let mut pending: Vec<Line<'a>> = Vec::new();

    for line in lines {
        match line.class() {
            LineClass::Start => {
                items.extend(current.take());
                current = Some(RawItem {
                    line: line.number,
                    leading: trim_blank_edges(texts(std::mem::take(&mut pending))),
                    code: vec![*line],
                });
            },
            LineClass::Continuation => match current.as_mut() {
                // A top-level continuation must directly follow its declaration.
                Some(item) if line.depth > 0 || line.lex != Lex::Code || pending.is_empty() => {
                    item.code.append(&mut pending);
                    item.code.push(*line);
                },
                _ => {
                    return Err(MergeError::Malformed {
                        line: line.number,
                        detail: "code outside of a top-level declaration".to_string(),
                    });
                },
            },
            LineClass::Comment | LineClass::Blank => pending.push(*line),
        }
    }
    items.extend(current);
    Ok((items, trim_blank_edges(texts(pending))))
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn first_ident(text: &str) -> Option<String> {
    let ident: String = text.trim_start().chars().take_while(|c| is_ident_char(*c)).collect();
    (!ident.is_empty()).then_some(ident)
}

/// Names declared by one spec: a type name, or a `var`/`const` name list.
fn spec_names(spec: &str, type_spec: bool, names: &mut Vec<String>) {
    let mut rest = spec.trim_start();
    while let Some(name) = first_ident(rest) {
        rest = rest[name.len()..].trim_start();
        names.push(name);
        match rest.strip_prefix(',') {
            Some(after) if !type_spec => rest = after,
            _ => break,
        }
    }
}

/// Every name declared by a `type`, `var` or `const` item, grouped or not.
fn declared_names(item: &RawItem<'_>) -> Vec<String> {
    let type_spec = item.keyword() == "type";
    let rest = item.rest();
    let mut names = Vec::new();
    match rest.strip_prefix('(') {
        None => spec_names(rest, type_spec, &mut names),
        Some(after) => {
            spec_names(after, type_spec, &mut names);
            // Specs start at the group's own depth; deeper lines are their bodies.
            for line in &item.code[1..] {
                if line.depth == 1 && line.lex == Lex::Code {
                    spec_names(line.text, type_spec, &mut names);
                }
            }
        },
    }
    names
}

/// Identities of a declaration; a grouped declaration has one per name.
fn decl_keys(item: &RawItem<'_>) -> Result<Vec<DeclKey>, MergeError> {
    let unnamed = || MergeError::Malformed {
        line: item.line,
        detail: "cannot determine the declared name".to_string(),
    };
    match item.keyword() {
        keyword @ ("type" | "var" | "const") => {
            let names = declared_names(item);
            if names.is_empty() {
                return Err(unnamed());
            }
            let key: fn(String) -> DeclKey = if keyword == "type" {
                DeclKey::Type
            } else {
                DeclKey::Value
            };
            Ok(names.into_iter().map(key).collect())
        },
        _ => {
            let rest = item.rest();
            let (receiver, after) = match rest.strip_prefix('(') {
                Some(inner) => {
                    let close = inner.find(')').ok_or_else(unnamed)?;
                    (receiver_type(&inner[..close]), &inner[close + 1..])
                },
                None => (None, rest),
            };
            let name = first_ident(after).ok_or_else(unnamed)?;
            Ok(vec![DeclKey::Func { receiver, name }])
        },
    }
}

/// Base type of a receiver list: `r *Foo[T]` gives `Foo`.
fn receiver_type(receiver: &str) -> Option<String> {
    let ty = receiver.split_whitespace().last()?.trim_start_matches('*');
    let ty = ty.split('[').next().unwrap_or(ty);
    (!ty.is_empty()).then(|| ty.to_string())
}

fn package_name(item: &RawItem<'_>) -> Result<String, MergeError> {
    let rest = item.rest();
    let name = first_ident(rest).ok_or(MergeError::Malformed {
        line: item.line,
        detail: "package clause without a name".to_string(),
    })?;
    let after = rest[name.len()..].trim();
    if !(after.is_empty() || after.starts_with("//") || after.starts_with(';')) {
        return Err(MergeError::Malformed {
            line: item.line,
            detail: format!("unexpected text after package name: {}", after),
        });
    }
    Ok(name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ImportSpec {
    path: String,
    text: String,
}

#[derive(Debug, Default)]
struct ImportSet {
    specs: Vec<ImportSpec>,
    /// Form of the first import declaration; a lone ungrouped import stays ungrouped.
    grouped: Option<bool>,
}

impl ImportSet {
    fn extend(&mut self, specs: Vec<ImportSpec>) {
        for spec in specs {
            match self.specs.iter().find(|s| s.path == spec.path) {
                Some(existing) if existing.text != spec.text => {
                    debug!(
                        path = %spec.path,
                        kept = %existing.text,
                        dropped = %spec.text,
                        "dropped import with a different name"
                    );
                },
                Some(_) => {},
                None => self.specs.push(spec),
            }
        }
    }
}

/// Parse `import "p"`, `import name "p"` and grouped import declarations.
fn parse_imports(item: &RawItem<'_>) -> Result<Vec<ImportSpec>, MergeError> {
    let text = item.code_text();
    let chars: Vec<char> = text.trim_start().chars().collect();
    let malformed = |detail: &str| MergeError::Malformed {
        line: item.line,
        detail: detail.to_string(),
    };

    let mut specs = Vec::new();
    let mut name: Option<String> = None;
    let mut i = "import".len();
    while i < chars.len() {
        let c = chars[i];
        match c {
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            },
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                    i += 1;
                }
                i += 2;
            },
            '"' | '`' => {
                let end = if c == '"' {
                    closing_quote(&chars, i)
                } else {
                    chars[i + 1..].iter().position(|&ch| ch == '`').map(|p| p + i + 1)
                }
                .ok_or_else(|| malformed("unterminated import path"))?;
                let literal: String = chars[i..=end].iter().collect();
                let path: String = chars[i + 1..end].iter().collect();
                let text = match name.take() {
                    Some(name) => format!("{} {}", name, literal),
                    None => literal,
                };
                specs.push(ImportSpec { path, text });
                i = end + 1;
            },
            c if c.is_whitespace() || c == '(' || c == ')' || c == ';' => i += 1,
            c if is_ident_char(c) || c == '.' => {
                let start = i;
                while i < chars.len() && (is_ident_char(chars[i]) || chars[i] == '.') {
                    i += 1;
                }
                if name.is_some() {
                    return Err(malformed("import name without a path"));
                }
                name = Some(chars[start..i].iter().collect());
            },
            _ => return Err(malformed("unexpected character in import declaration")),
        }
    }
    if name.is_some() {
        return Err(malformed("import name without a path"));
    }
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile, NamePath};
    use crate::schema::{AttributeNode, ComputedOptionalRequired};
    use proptest::prelude::*;

    const WIDGET: &str = r#"// Code generated by hemmer-provider-generator. DO NOT EDIT.

package provider

import (
	"context"
	"fmt"
)

// Widget is a thing.
type Widget struct {
	Name string
}

func (w *Widget) String() string {
	return fmt.Sprintf("widget %s", w.Name)
}
"#;

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn test_canonical_unit_is_unchanged() {
        assert_eq!(merge(WIDGET).unwrap(), WIDGET);
    }

    #[test]
    fn test_duplicate_fragment_collapses() {
        let doubled = format!("{}\n{}", WIDGET, WIDGET);
        let report = merge_with_report(&doubled).unwrap();
        assert_eq!(report.merged, WIDGET);
        assert_eq!(report.dropped.len(), 2);
        assert!(report.conflicts().next().is_none());
        assert_eq!(report.dropped[0].key, DeclKey::Type("Widget".to_string()));
        assert_eq!(
            report.dropped[1].key,
            DeclKey::Func {
                receiver: Some("Widget".to_string()),
                name: "String".to_string(),
            }
        );
    }

    #[test]
    fn test_first_declaration_wins_and_conflict_is_reported() {
        let source = "package p\n\ntype X struct {\n\tA int\n}\n\ntype X struct {\n\tB string\n}\n";
        let report = merge_with_report(source).unwrap();
        assert_eq!(report.merged, "package p\n\ntype X struct {\n\tA int\n}\n");
        assert_eq!(
            report.dropped,
            vec![DroppedDeclaration {
                key: DeclKey::Type("X".to_string()),
                line: 7,
                conflicting: true,
            }]
        );
    }

    #[test]
    fn test_whitespace_differences_are_not_conflicts() {
        let source = "package p\n\nfunc f() int { return 1 }\n\nfunc f() int {\n\treturn 1\n}\n";
        let report = merge_with_report(source).unwrap();
        assert_eq!(report.dropped.len(), 1);
        assert!(!report.dropped[0].conflicting);
    }

    #[test]
    fn test_functions_are_partitioned_by_receiver() {
        let source = r#"package p

func (a A) String() string { return "a" }

func (b *B) String() string { return "b" }

func String() string { return "free" }

func (x *A) String() string { return "again" }

func (A) Name() string { return "" }
"#;
        let report = merge_with_report(source).unwrap();
        assert_eq!(count(&report.merged, "String() string"), 3);
        assert!(report.merged.contains("func (A) Name()"));
        assert!(!report.merged.contains("again"));
        assert_eq!(report.dropped.len(), 1);
        assert!(report.dropped[0].conflicting);
    }

    #[test]
    fn test_generic_receiver_is_keyed_by_base_type() {
        let source = "package p\n\nfunc (l *List[T]) Len() int { return 0 }\n\nfunc (l List[T]) Len() int { return 1 }\n";
        let report = merge_with_report(source).unwrap();
        assert_eq!(
            report.dropped[0].key,
            DeclKey::Func {
                receiver: Some("List".to_string()),
                name: "Len".to_string(),
            }
        );
    }

    #[test]
    fn test_types_and_functions_do_not_collide() {
        let source = "package p\n\ntype New struct{}\n\nfunc New() *New { return nil }\n\nvar New2 = 1\n";
        let report = merge_with_report(source).unwrap();
        assert!(report.dropped.is_empty());
    }

    #[test]
    fn test_imports_are_deduplicated_in_first_occurrence_order() {
        let source = r#"package p

import "fmt"

import (
	"context" // for ctx
	tfattr "github.com/hashicorp/terraform-plugin-framework/attr"
	"fmt"
)

var x = fmt.Sprint

package p

import (
	"strings"
	"context"
	_ "embed"
)
"#;
        let merged = merge(source).unwrap();
        assert_eq!(
            merged,
            "package p\n\nimport (\n\t\"fmt\"\n\t\"context\"\n\ttfattr \"github.com/hashicorp/terraform-plugin-framework/attr\"\n\t\"strings\"\n\t_ \"embed\"\n)\n\nvar x = fmt.Sprint\n"
        );
    }

    #[test]
    fn test_single_import_keeps_its_form() {
        let single = "package p\n\nimport \"fmt\"\n\nvar x = fmt.Sprint\n";
        assert_eq!(merge(single).unwrap(), single);

        let grouped = "package p\n\nimport (\n\t\"fmt\"\n)\n\nvar x = fmt.Sprint\n";
        assert_eq!(merge(grouped).unwrap(), grouped);

        let doubled = format!("{}\n{}", single, single);
        assert_eq!(merge(&doubled).unwrap(), single);
    }

    #[test]
    fn test_empty_import_groups_vanish() {
        assert_eq!(merge("package p\n\nimport (\n)\n").unwrap(), "package p\n");
    }

    #[test]
    fn test_only_first_header_is_kept() {
        let source = "// first header\n\npackage p\n\ntype A int\n\n// second header\n\npackage p\n\ntype B int\n";
        let merged = merge(source).unwrap();
        assert_eq!(merged, "// first header\n\npackage p\n\ntype A int\n\ntype B int\n");
    }

    #[test]
    fn test_doc_comments_travel_with_declarations() {
        let source = "package p\n\n// A doc.\ntype A int\n\n// A doc again.\ntype A int\n\n/*\nB doc.\n*/\ntype B int\n";
        let merged = merge(source).unwrap();
        assert_eq!(merged, "package p\n\n// A doc.\ntype A int\n\n/*\nB doc.\n*/\ntype B int\n");
    }

    #[test]
    fn test_brackets_in_literals_and_comments_are_ignored() {
        let source = r#"package p

func f() string {
	// closing } in a comment
	/* { */
	s := "}" + `
{ raw
` + string('{')
	return s
}

type T struct{}
"#;
        let report = merge_with_report(source).unwrap();
        assert_eq!(report.merged, source);
    }

    #[test]
    fn test_grouped_declarations_are_keyed_by_every_name() {
        let source = "package p\n\nvar (\n\t// doc\n\ta = 1\n\tb = 2\n)\n\nconst (\n\tc = 3\n)\n\ntype (\n\tD int\n)\n\nvar a = 5\n";
        let report = merge_with_report(source).unwrap();
        assert_eq!(
            report.dropped.iter().map(|d| d.key.clone()).collect::<Vec<_>>(),
            vec![DeclKey::Value("a".to_string())]
        );
        assert!(report.merged.contains("const (\n\tc = 3\n)"));
        assert!(report.merged.contains("type (\n\tD int\n)"));
    }

    #[test]
    fn test_later_name_in_group_is_a_duplicate() {
        let source = "package p\n\ntype (\n\tA int\n\tB int\n)\n\ntype B struct{}\n";
        let report = merge_with_report(source).unwrap();
        assert_eq!(report.merged, "package p\n\ntype (\n\tA int\n\tB int\n)\n");
        assert_eq!(
            report.dropped,
            vec![DroppedDeclaration {
                key: DeclKey::Type("B".to_string()),
                line: 8,
                conflicting: true,
            }]
        );
        assert_eq!(merge(&report.merged).unwrap(), report.merged);
    }

    #[test]
    fn test_value_name_lists_and_nested_bodies() {
        let source = r#"package p

var a, b = 1, 2

type (
	S struct {
		Inner int
	}
)

var b = 3

type Inner int
"#;
        let report = merge_with_report(source).unwrap();
        assert_eq!(
            report.dropped.iter().map(|d| d.key.clone()).collect::<Vec<_>>(),
            vec![DeclKey::Value("b".to_string())]
        );
        assert!(report.merged.contains("type Inner int"));
    }

    #[test]
    fn test_blank_and_init_declarations_repeat_unless_identical() {
        let source = r#"package p

var _ A = (*B)(nil)

var _ A = (*B)(nil)

var _ C = (*B)(nil)

func init() { register("a") }

func init() { register("b") }
"#;
        let report = merge_with_report(source).unwrap();
        assert_eq!(count(&report.merged, "var _"), 2);
        assert_eq!(count(&report.merged, "func init()"), 2);
        assert_eq!(report.dropped.len(), 1);
        assert!(!report.dropped[0].conflicting);
    }

    #[test]
    fn test_trailing_comments_are_kept() {
        let source = "package p\n\ntype A int\n\n// trailing\n";
        assert_eq!(merge(source).unwrap(), source);
    }

    #[test]
    fn test_parse_failures() {
        assert_eq!(merge(""), Err(MergeError::MissingPackage));
        assert_eq!(merge("// only a comment\n"), Err(MergeError::MissingPackage));
        assert_eq!(
            merge("package p\n\nfunc f() {\n"),
            Err(MergeError::Unbalanced { line: 3 })
        );
        assert_eq!(
            merge("package p\n\nfunc f() {\n}}\n"),
            Err(MergeError::Unbalanced { line: 4 })
        );
        assert_eq!(
            merge("package p\n\nfunc f() { (] }\n"),
            Err(MergeError::Unbalanced { line: 3 })
        );
        assert_eq!(
            merge("package p\n\nvar s = \"open\n"),
            Err(MergeError::Unterminated {
                what: "string literal",
                line: 3
            })
        );
        assert_eq!(
            merge("package p\n\n/* open\n"),
            Err(MergeError::Unterminated {
                what: "block comment",
                line: 3
            })
        );
        assert_eq!(
            merge("package p\n\nvar s = `open\n"),
            Err(MergeError::Unterminated {
                what: "raw string literal",
                line: 3
            })
        );
        assert_eq!(
            merge("package p\n\npackage q\n"),
            Err(MergeError::PackageMismatch {
                expected: "p".to_string(),
                found: "q".to_string(),
            })
        );
        assert!(matches!(
            merge("type A int\n\npackage p\n"),
            Err(MergeError::Malformed { line: 1, .. })
        ));
        assert!(matches!(
            merge("package p\n\nstray code\n"),
            Err(MergeError::Malformed { line: 3, .. })
        ));
    }

    #[test]
    fn test_compiled_nested_type_merges_once() {
        let node = AttributeNode::single_nested(
            "api_key",
            ComputedOptionalRequired::Required,
            vec![
                AttributeNode::computed_string("api_key_id"),
                AttributeNode::required_string("api_key_name"),
            ],
        );
        let compiled = compile(&node, &NamePath::root()).unwrap();
        let fragment = format!(
            "package provider\n\nimport (\n\t\"{}\"\n)\n\n{}",
            crate::compiler::ATTR_IMPORT,
            compiled.declarations
        );
        let doubled = format!("{}{}", fragment, fragment);

        let report = merge_with_report(&doubled).unwrap();
        assert_eq!(count(&report.merged, "type ApiKey struct"), 1);
        assert_eq!(count(&report.merged, "func (ApiKey) AttrTypes()"), 1);
        assert!(report.dropped.iter().any(|d| d.key == DeclKey::Type("ApiKey".to_string())));
        assert_eq!(merge(&report.merged).unwrap(), report.merged);
    }

    fn decl(name: &str, body: u8) -> String {
        match body % 3 {
            0 => format!("type {} struct {{\n\tV int\n}}\n", name),
            1 => format!("func ({}) Describe() string {{\n\treturn \"{{{}}}\"\n}}\n", name, body),
            _ => format!("// {} doc\nvar {}Default = {}\n", name, name, body),
        }
    }

    proptest! {
        #[test]
        fn merge_is_idempotent(decls in prop::collection::vec(("[A-D]", any::<u8>()), 0..12)) {
            let mut source = String::from("package p\n\nimport \"fmt\"\n\n");
            for (name, body) in &decls {
                source.push_str(&decl(name, *body));
                source.push('\n');
            }
            let once = merge(&source).unwrap();
            let twice = merge(&once).unwrap();
            prop_assert_eq!(&once, &twice);
        }

        #[test]
        fn merge_keeps_one_type_per_name(copies in 1usize..6) {
            let mut source = String::new();
            for _ in 0..copies {
                source.push_str("package p\n\ntype X struct {\n\tA int\n}\n\n");
            }
            let report = merge_with_report(&source).unwrap();
            prop_assert_eq!(count(&report.merged, "type X struct"), 1);
            prop_assert_eq!(report.dropped.len(), copies - 1);
        }
    }
}
