//! Symbol extraction for C and C++ syntax trees.
//!
//! One recursive walk over the tree emits symbols, call references and
//! include directives. Node kinds the walk cares about are mapped to a closed
//! [`NodeKind`] set; everything else falls through to [`NodeKind::Other`] and
//! is only descended into.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use super::complexity::{ComplexityMeasurer, MeasuredFile};
use super::parser::{Language, parse_source};
use crate::error::{IndexError, IndexResult};
use crate::symbol::{Symbol, SymbolDetail};
use crate::types::{Backend, IncludeEdge, IncludeStyle, SymbolId, SymbolKind};

const STORAGE_CLASS_KEYWORDS: &[&str] = &[
    "static",
    "inline",
    "extern",
    "register",
    "auto",
    "__inline",
    "__inline__",
];

/// Unresolved call from a function to a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallReference {
    pub caller_id: SymbolId,
    pub callee_name: String,
}

/// Everything extracted from one file.
#[derive(Debug, Default, Clone)]
pub struct FileExtraction {
    pub symbols: Vec<Symbol>,
    pub calls: Vec<CallReference>,
    pub includes: Vec<IncludeEdge>,
}

impl FileExtraction {
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.calls.is_empty() && self.includes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    FunctionDefinition,
    /// struct, union and C++ class specifiers
    Record,
    Enum,
    TypeDefinition,
    ObjectMacro,
    FunctionMacro,
    Include,
    Declaration,
    /// Containers whose children keep the enclosing scope: preprocessor
    /// conditionals, `extern "C"` blocks, namespaces, templates.
    Transparent,
    /// Statement blocks. Declarations inside are not file scope.
    Block,
    Other,
}

impl NodeKind {
    fn of(node: &Node) -> Self {
        match node.kind() {
            "function_definition" => NodeKind::FunctionDefinition,
            "struct_specifier" | "union_specifier" | "class_specifier" => NodeKind::Record,
            "enum_specifier" => NodeKind::Enum,
            "type_definition" | "alias_declaration" => NodeKind::TypeDefinition,
            "preproc_def" => NodeKind::ObjectMacro,
            "preproc_function_def" => NodeKind::FunctionMacro,
            "preproc_include" => NodeKind::Include,
            "declaration" => NodeKind::Declaration,
            "translation_unit" | "preproc_if" | "preproc_ifdef" | "preproc_else" | "preproc_elif"
            | "preproc_elifdef" | "linkage_specification" | "declaration_list" | "namespace_definition"
            | "template_declaration" | "export_declaration" => NodeKind::Transparent,
            "compound_statement" | "field_declaration_list" | "parameter_list" | "lambda_expression" => {
                NodeKind::Block
            }
            _ => NodeKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    File,
    Nested,
}

/// Tree-sitter based extractor for C and C++ sources.
#[derive(Clone)]
pub struct CExtractor {
    measurer: Arc<dyn ComplexityMeasurer>,
}

impl std::fmt::Debug for CExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CExtractor")
            .field("measurer", &self.measurer.name())
            .finish()
    }
}

impl CExtractor {
    pub fn new(measurer: Arc<dyn ComplexityMeasurer>) -> Self {
        Self { measurer }
    }

    /// Extract symbols, calls and includes from one file.
    ///
    /// `rel_path` is the project-relative path recorded on every symbol.
    /// Returns `ParseFailure` for unsupported extensions or when no tree
    /// could be produced.
    pub fn extract(&self, rel_path: &str, source: &[u8]) -> IndexResult<FileExtraction> {
        let path = Path::new(rel_path);
        let language = Language::from_path(path).ok_or_else(|| IndexError::ParseFailure {
            path: path.to_path_buf(),
            reason: "unsupported file extension".to_string(),
        })?;

        let code = String::from_utf8_lossy(source);
        let tree = parse_source(language, path, code.as_bytes())?;
        let root = tree.root_node();
        if root.has_error() {
            crate::debug_event!("extractor", "syntax errors", "{rel_path}: extracting what parsed");
        }

        let mut walk = Walk {
            path: rel_path,
            code: &code,
            out: FileExtraction::default(),
            ordinal: 0,
        };
        walk.visit(root, Scope::File);

        let scores = self.measurer.measure(&MeasuredFile {
            path,
            code: &code,
            tree: &tree,
        });
        if !scores.is_empty() {
            for symbol in walk.out.symbols.iter_mut().filter(|s| s.is_function()) {
                if let Some(score) = scores.get(&symbol.name) {
                    symbol.set_complexity(*score);
                }
            }
        }

        Ok(walk.out)
    }
}

struct Walk<'a> {
    path: &'a str,
    code: &'a str,
    out: FileExtraction,
    ordinal: u32,
}

impl<'a> Walk<'a> {
    fn text(&self, node: Node) -> &'a str {
        &self.code[node.byte_range()]
    }

    fn next_id(&mut self, kind: SymbolKind, name: &str, line: u32) -> SymbolId {
        let id = SymbolId::derive(Backend::TreeSitter, kind, name, self.path, line, self.ordinal);
        self.ordinal += 1;
        id
    }

    fn push(&mut self, node: Node, name: &str, declaration: String, detail: SymbolDetail) -> SymbolId {
        let line = line_of(&node);
        let id = self.next_id(detail.kind(), name, line);
        self.out.symbols.push(
            Symbol::new(id.clone(), name, self.path, line, Backend::TreeSitter, detail).with_declaration(declaration),
        );
        id
    }

    fn visit(&mut self, node: Node, scope: Scope) {
        match NodeKind::of(&node) {
            NodeKind::FunctionDefinition => {
                self.function(node);
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit(body, Scope::Nested);
                }
            }
            NodeKind::Record => {
                self.record(node);
                self.visit_children(node, Scope::Nested);
            }
            NodeKind::Enum => self.enumeration(node),
            NodeKind::TypeDefinition => {
                self.typedef(node);
                if let Some(ty) = node.child_by_field_name("type") {
                    self.visit(ty, scope);
                }
            }
            NodeKind::ObjectMacro | NodeKind::FunctionMacro => self.macro_definition(node),
            NodeKind::Include => self.include(node),
            NodeKind::Declaration => {
                if scope == Scope::File {
                    self.file_scope_declaration(node);
                }
                if let Some(ty) = node.child_by_field_name("type") {
                    self.visit(ty, scope);
                }
            }
            NodeKind::Transparent | NodeKind::Other => self.visit_children(node, scope),
            NodeKind::Block => self.visit_children(node, Scope::Nested),
        }
    }

    fn visit_children(&mut self, node: Node, scope: Scope) {
        for child in node.children(&mut node.walk()) {
            self.visit(child, scope);
        }
    }

    fn function(&mut self, node: Node) {
        let Some(name) = function_name(&node, self.code) else {
            return;
        };
        let Some(declarator) = node.child_by_field_name("declarator") else {
            return;
        };

        let return_type = return_type(node, declarator, self.code);
        let parameters = find_function_declarator(declarator)
            .and_then(|f| f.child_by_field_name("parameters"))
            .map(|params| parameter_list(params, self.code))
            .unwrap_or_default();

        let declaration = match node.child_by_field_name("body") {
            Some(body) => collapse_whitespace(&self.code[node.start_byte()..body.start_byte()]),
            None => collapse_whitespace(self.text(node)),
        };

        let id = self.push(node, &name, declaration, SymbolDetail::function(return_type, parameters));

        if let Some(body) = node.child_by_field_name("body") {
            let mut seen = HashSet::new();
            self.scan_calls(body, &id, &mut seen);
        }
    }

    fn scan_calls(&mut self, node: Node, caller: &SymbolId, seen: &mut HashSet<String>) {
        if node.kind() == "call_expression" {
            if let Some(callee) = node
                .child_by_field_name("function")
                .and_then(|f| callee_name(f, self.code))
            {
                if seen.insert(callee.clone()) {
                    self.out.calls.push(CallReference {
                        caller_id: caller.clone(),
                        callee_name: callee,
                    });
                }
            }
        }

        for child in node.children(&mut node.walk()) {
            self.scan_calls(child, caller, seen);
        }
    }

    fn record(&mut self, node: Node) {
        // Only definitions with a name; `struct foo *p` is a reference and
        // anonymous records cannot be searched for.
        let (Some(name_node), Some(body)) = (node.child_by_field_name("name"), node.child_by_field_name("body")) else {
            return;
        };
        let name = last_name_component(name_node, self.code);

        let members: Vec<String> = body
            .named_children(&mut body.walk())
            .filter(|child| child.kind() == "field_declaration")
            .map(|field| collapse_whitespace(self.text(field).trim_end_matches(';')))
            .collect();

        let keyword = node.kind().trim_end_matches("_specifier");
        let mut declaration = format!("{keyword} {name} {{");
        for member in &members {
            declaration.push_str(&format!("\n  {member};"));
        }
        declaration.push_str("\n}");

        self.push(node, &name, declaration, SymbolDetail::Struct { members });
    }

    fn enumeration(&mut self, node: Node) {
        let (Some(name_node), Some(body)) = (node.child_by_field_name("name"), node.child_by_field_name("body")) else {
            return;
        };
        let name = last_name_component(name_node, self.code);

        let values: Vec<String> = body
            .named_children(&mut body.walk())
            .filter(|child| child.kind() == "enumerator")
            .filter_map(|e| e.child_by_field_name("name"))
            .map(|n| self.text(n).to_string())
            .collect();

        let declaration = format!("enum {name} {{ {} }}", values.join(", "));
        self.push(node, &name, declaration, SymbolDetail::Enum { values });
    }

    fn typedef(&mut self, node: Node) {
        let declaration = collapse_whitespace(self.text(node));

        // `using Alias = Type;`
        if node.kind() == "alias_declaration" {
            if let (Some(name), Some(ty)) = (node.child_by_field_name("name"), node.child_by_field_name("type")) {
                let name = self.text(name).to_string();
                let underlying = collapse_whitespace(self.text(ty));
                self.push(node, &name, declaration, SymbolDetail::Typedef { underlying });
            }
            return;
        }

        let base = node
            .child_by_field_name("type")
            .map(|ty| underlying_type_text(ty, self.code))
            .unwrap_or_default();

        // `typedef int a, *b;` declares several names
        let declarators: Vec<Node> = {
            let mut cursor = node.walk();
            node.children_by_field_name("declarator", &mut cursor).collect()
        };
        for declarator in declarators {
            let Some(name) = declarator_name(declarator, self.code) else {
                continue;
            };
            let underlying = with_pointers(&base, pointer_depth(declarator));
            self.push(node, &name, declaration.clone(), SymbolDetail::Typedef { underlying });
        }
    }

    fn macro_definition(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node).to_string();
        let value = node
            .child_by_field_name("value")
            .map(|v| self.text(v).trim().to_string())
            .unwrap_or_default();
        let parameters = node.child_by_field_name("parameters").map(|params| {
            params
                .named_children(&mut params.walk())
                .map(|p| self.text(p).to_string())
                .collect::<Vec<_>>()
        });

        let declaration = collapse_whitespace(self.text(node));
        self.push(node, &name, declaration, SymbolDetail::Macro { parameters, value });
    }

    fn include(&mut self, node: Node) {
        let Some(path_node) = node.child_by_field_name("path") else {
            return;
        };
        let raw = self.text(path_node).trim();
        let (style, included) = if path_node.kind() == "system_lib_string" {
            (IncludeStyle::System, raw.trim_start_matches('<').trim_end_matches('>'))
        } else if path_node.kind() == "string_literal" {
            (IncludeStyle::Quoted, raw.trim_matches('"'))
        } else {
            // `#include MACRO` cannot be resolved without the preprocessor
            return;
        };

        self.out.includes.push(IncludeEdge {
            including_file: self.path.to_string(),
            included_path: included.to_string(),
            style,
        });
    }

    fn file_scope_declaration(&mut self, node: Node) {
        let Some(ty) = node.child_by_field_name("type") else {
            return;
        };
        let base = collapse_whitespace(self.text(ty));

        let mut is_static = false;
        let mut is_const = false;
        for child in node.children(&mut node.walk()) {
            match (child.kind(), self.text(child)) {
                ("storage_class_specifier", "static") => is_static = true,
                ("type_qualifier", "const" | "constexpr") => is_const = true,
                _ => {}
            }
        }

        let declarators: Vec<Node> = {
            let mut cursor = node.walk();
            node.children_by_field_name("declarator", &mut cursor).collect()
        };
        for declarator in declarators {
            let target = match declarator.kind() {
                "init_declarator" => declarator.child_by_field_name("declarator").unwrap_or(declarator),
                _ => declarator,
            };
            if is_prototype(target) {
                continue;
            }
            let Some(name) = declarator_name(target, self.code) else {
                continue;
            };

            let data_type = with_pointers(&base, pointer_depth(target));
            let declaration = format!(
                "{} {};",
                collapse_whitespace(&self.code[node.start_byte()..ty.end_byte()]),
                collapse_whitespace(self.text(declarator))
            );
            self.push(
                declarator,
                &name,
                declaration,
                SymbolDetail::Variable {
                    data_type,
                    is_static,
                    is_const,
                },
            );
        }
    }
}

fn line_of(node: &Node) -> u32 {
    line_number(node.start_position().row)
}

/// One-based line for a zero-based tree-sitter row, saturating at `u32::MAX`.
fn line_number(row: usize) -> u32 {
    u32::try_from(row).unwrap_or(u32::MAX).saturating_add(1)
}

pub(crate) fn is_function_definition(node: &Node) -> bool {
    node.kind() == "function_definition"
}

/// Unqualified name of a function definition (`Foo::bar` yields `bar`).
pub(crate) fn function_name(node: &Node, code: &str) -> Option<String> {
    let declarator = node.child_by_field_name("declarator")?;
    let function = find_function_declarator(declarator)?;
    declarator_name(function.child_by_field_name("declarator")?, code)
}

fn find_function_declarator(node: Node) -> Option<Node> {
    if node.kind() == "function_declarator" {
        return Some(node);
    }
    if let Some(inner) = node.child_by_field_name("declarator") {
        return find_function_declarator(inner);
    }
    // reference_declarator and friends have no field name
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).find_map(find_function_declarator);
    found
}

/// `int foo(void);` and `char *bar(int);` are prototypes; `int (*fp)(int);`
/// is a function pointer variable.
fn is_prototype(declarator: Node) -> bool {
    let mut node = declarator;
    while matches!(node.kind(), "pointer_declarator" | "reference_declarator") {
        match node.child_by_field_name("declarator").or_else(|| node.named_child(0)) {
            Some(inner) => node = inner,
            None => return false,
        }
    }
    node.kind() == "function_declarator"
        && node
            .child_by_field_name("declarator")
            .is_some_and(|inner| inner.kind() != "parenthesized_declarator")
}

/// Innermost identifier of a declarator chain.
fn declarator_name(node: Node, code: &str) -> Option<String> {
    match node.kind() {
        "identifier" | "type_identifier" | "field_identifier" | "primitive_type" => {
            Some(code[node.byte_range()].to_string())
        }
        "destructor_name" | "operator_name" => Some(collapse_whitespace(&code[node.byte_range()])),
        "qualified_identifier" => Some(last_name_component(node, code)),
        _ => {
            if let Some(inner) = node.child_by_field_name("declarator") {
                return declarator_name(inner, code);
            }
            let mut cursor = node.walk();
            let found = node
                .named_children(&mut cursor)
                .find_map(|child| declarator_name(child, code));
            found
        }
    }
}

fn last_name_component(node: Node, code: &str) -> String {
    match node.kind() {
        "qualified_identifier" => match node.child_by_field_name("name") {
            Some(name) => last_name_component(name, code),
            None => code[node.byte_range()].to_string(),
        },
        "template_type" | "template_function" => match node.child_by_field_name("name") {
            Some(name) => code[name.byte_range()].to_string(),
            None => code[node.byte_range()].to_string(),
        },
        _ => code[node.byte_range()].to_string(),
    }
}

/// Callee name of a call expression's function node, when it reduces to a
/// plain identifier. Computed targets yield `None`.
fn callee_name(node: Node, code: &str) -> Option<String> {
    match node.kind() {
        "identifier" | "field_identifier" => Some(code[node.byte_range()].to_string()),
        "field_expression" => node
            .child_by_field_name("field")
            .and_then(|field| callee_name(field, code)),
        "pointer_expression" => node
            .child_by_field_name("argument")
            .and_then(|arg| callee_name(arg, code)),
        "parenthesized_expression" => node.named_child(0).and_then(|inner| callee_name(inner, code)),
        "qualified_identifier" | "template_function" | "template_method" => node
            .child_by_field_name("name")
            .and_then(|name| callee_name(name, code)),
        "destructor_name" => Some(code[node.byte_range()].to_string()),
        _ => None,
    }
}

/// Declaration-specifier text before the declarator with storage-class
/// keywords removed, plus one `*` per pointer level. Defaults to `void`.
fn return_type(definition: Node, declarator: Node, code: &str) -> String {
    let specifiers = &code[definition.start_byte()..declarator.start_byte()];
    let base = specifiers
        .split_whitespace()
        .filter(|word| !STORAGE_CLASS_KEYWORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ");
    let base = if base.is_empty() { "void".to_string() } else { base };
    with_pointers(&base, pointer_depth(declarator))
}

fn underlying_type_text(ty: Node, code: &str) -> String {
    match ty.kind() {
        // `typedef struct node { ... } node_t;` keeps just `struct node`
        "struct_specifier" | "union_specifier" | "enum_specifier" | "class_specifier" => {
            let keyword = ty.kind().trim_end_matches("_specifier");
            match ty.child_by_field_name("name") {
                Some(name) => format!("{keyword} {}", &code[name.byte_range()]),
                None => format!("{keyword} <anonymous>"),
            }
        }
        _ => collapse_whitespace(&code[ty.byte_range()]),
    }
}

fn pointer_depth(declarator: Node) -> usize {
    let mut depth = 0;
    let mut node = declarator;
    loop {
        match node.kind() {
            "pointer_declarator" => depth += 1,
            "function_declarator" | "identifier" | "type_identifier" | "field_identifier" => break,
            _ => {}
        }
        match node.child_by_field_name("declarator") {
            Some(inner) => node = inner,
            None => break,
        }
    }
    depth
}

fn with_pointers(base: &str, depth: usize) -> String {
    if depth == 0 {
        base.to_string()
    } else {
        format!("{base} {}", "*".repeat(depth))
    }
}

fn parameter_list(params: Node, code: &str) -> Vec<String> {
    let parameters: Vec<String> = params
        .named_children(&mut params.walk())
        .filter(|p| p.kind() != "comment")
        .map(|p| collapse_whitespace(&code[p.byte_range()]))
        .collect();
    if parameters.len() == 1 && parameters[0] == "void" {
        Vec::new()
    } else {
        parameters
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
