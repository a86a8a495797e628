//! Semantic C# chunking
//!
//! Walks the C# syntax tree and emits one chunk per declaration at and
//! below file scope. Namespaces contribute scope but no chunk of their
//! own; types recurse into members and nested types.
//!
//! Qualification: a type at namespace scope is `Namespace.Type`; nested
//! types and members are qualified by the chain of enclosing type simple
//! names (`Outer.Inner`, `Outer.Inner.Member`). Constructors are named
//! `Parent..ctor`, indexers `Parent.this[]`.

use super::{name_text, node_lines, node_text};
use crate::error::Result;
use crate::types::{chunk_id, Chunk, ChunkKind};
use std::collections::{BTreeMap, HashSet};
use tree_sitter::Node;

/// Closed set of modifier tokens kept in a chunk's modifier string
const MODIFIER_SET: [&str; 11] = [
    "public", "private", "protected", "internal", "static", "abstract", "virtual", "override",
    "sealed", "readonly", "const",
];

pub fn parse(file_path: &str, content: &str) -> Result<Vec<Chunk>> {
    let language = tree_sitter_c_sharp::LANGUAGE.into();
    let tree = super::parse_tree(&language, file_path, content)?;
    let root = tree.root_node();
    super::log_syntax_errors(file_path, root);

    let mut walker = Walker {
        file_path,
        source: content,
        dependencies: collect_usings(root, content),
        chunks: Vec::new(),
    };
    walker.visit_scope(root, None);
    Ok(walker.chunks)
}

/// Enclosing type for members and nested types
struct TypeScope {
    /// The enclosing type chunk's qualified name (with namespace prefix
    /// for top-level types)
    qualified: String,
    /// Chain of simple names used to qualify members and nested types
    chain: String,
}

struct Walker<'a> {
    file_path: &'a str,
    source: &'a str,
    dependencies: Vec<String>,
    chunks: Vec<Chunk>,
}

impl Walker<'_> {
    /// Visit a namespace-level scope: namespaces and top-level types
    fn visit_scope(&mut self, node: Node<'_>, namespace: Option<&str>) {
        let mut current: Option<String> = namespace.map(String::from);
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "namespace_declaration" => {
                    let Some(name) = name_text(child, self.source) else {
                        continue;
                    };
                    let nested = compose_namespace(current.as_deref(), &name);
                    let scope = child.child_by_field_name("body").unwrap_or(child);
                    self.visit_scope(scope, Some(&nested));
                }
                "file_scoped_namespace_declaration" => {
                    let Some(name) = name_text(child, self.source) else {
                        continue;
                    };
                    let nested = compose_namespace(current.as_deref(), &name);
                    // the scope covers both declarations nested under the
                    // node and any that follow it as siblings
                    self.visit_scope(child, Some(&nested));
                    current = Some(nested);
                }
                kind if type_kind(kind).is_some() => {
                    self.visit_type(child, current.as_deref(), None);
                }
                _ => {}
            }
        }
    }

    /// Emit a chunk for a type declaration and recurse into its members
    fn visit_type(&mut self, node: Node<'_>, namespace: Option<&str>, enclosing: Option<&TypeScope>) {
        let Some(kind) = type_kind(node.kind()) else {
            return;
        };
        let Some(simple) = name_text(node, self.source) else {
            return;
        };
        let (qualified, chain) = match enclosing {
            // nested types are qualified by the enclosing simple-name
            // chain, without the namespace prefix
            Some(scope) => (
                format!("{}.{}", scope.chain, simple),
                format!("{}.{}", scope.chain, simple),
            ),
            None => {
                let qualified = match namespace {
                    Some(ns) => format!("{ns}.{simple}"),
                    None => simple.clone(),
                };
                (qualified, simple.clone())
            }
        };

        let mut attrs = BTreeMap::new();
        if kind == ChunkKind::Enum {
            let values = enum_values(node, self.source);
            if !values.is_empty() {
                attrs.insert("values".to_string(), values.join(", "));
            }
        }
        self.push_chunk(
            node,
            kind,
            qualified.clone(),
            enclosing.map(|scope| scope.qualified.clone()),
            namespace,
            attrs,
        );

        if kind != ChunkKind::Enum {
            if let Some(body) = node.child_by_field_name("body") {
                let scope = TypeScope { qualified, chain };
                self.visit_members(body, namespace, &scope);
            }
        }
    }

    /// Emit one chunk per member declaration inside a type body
    fn visit_members(&mut self, body: Node<'_>, namespace: Option<&str>, scope: &TypeScope) {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            match child.kind() {
                kind if type_kind(kind).is_some() => {
                    self.visit_type(child, namespace, Some(scope));
                }
                "method_declaration" => {
                    let Some(name) = name_text(child, self.source) else {
                        continue;
                    };
                    let mut attrs = BTreeMap::new();
                    if let Some(params) = parameters_text(child, self.source) {
                        attrs.insert("parameters".to_string(), params);
                    }
                    if let Some(returns) = type_field_text(child, self.source) {
                        attrs.insert("return_type".to_string(), returns);
                    }
                    self.push_chunk(
                        child,
                        ChunkKind::Method,
                        format!("{}.{}", scope.chain, name),
                        Some(scope.qualified.clone()),
                        namespace,
                        attrs,
                    );
                }
                "constructor_declaration" => {
                    let mut attrs = BTreeMap::new();
                    if let Some(params) = parameters_text(child, self.source) {
                        attrs.insert("parameters".to_string(), params);
                    }
                    self.push_chunk(
                        child,
                        ChunkKind::Constructor,
                        format!("{}..ctor", scope.chain),
                        Some(scope.qualified.clone()),
                        namespace,
                        attrs,
                    );
                }
                "property_declaration" => {
                    let Some(name) = name_text(child, self.source) else {
                        continue;
                    };
                    let mut attrs = BTreeMap::new();
                    if let Some(ty) = type_field_text(child, self.source) {
                        attrs.insert("type".to_string(), ty);
                    }
                    self.push_chunk(
                        child,
                        ChunkKind::Property,
                        format!("{}.{}", scope.chain, name),
                        Some(scope.qualified.clone()),
                        namespace,
                        attrs,
                    );
                }
                "field_declaration" => {
                    self.visit_variable_members(child, namespace, scope, ChunkKind::Field);
                }
                "event_field_declaration" => {
                    self.visit_variable_members(child, namespace, scope, ChunkKind::Event);
                }
                "event_declaration" => {
                    let Some(name) = name_text(child, self.source) else {
                        continue;
                    };
                    let mut attrs = BTreeMap::new();
                    if let Some(ty) = type_field_text(child, self.source) {
                        attrs.insert("type".to_string(), ty);
                    }
                    self.push_chunk(
                        child,
                        ChunkKind::Event,
                        format!("{}.{}", scope.chain, name),
                        Some(scope.qualified.clone()),
                        namespace,
                        attrs,
                    );
                }
                "indexer_declaration" => {
                    let mut attrs = BTreeMap::new();
                    if let Some(ty) = type_field_text(child, self.source) {
                        attrs.insert("type".to_string(), ty);
                    }
                    if let Some(params) = parameters_text(child, self.source) {
                        attrs.insert("parameters".to_string(), params);
                    }
                    self.push_chunk(
                        child,
                        ChunkKind::Indexer,
                        format!("{}.this[]", scope.chain),
                        Some(scope.qualified.clone()),
                        namespace,
                        attrs,
                    );
                }
                _ => {}
            }
        }
    }

    /// A declaration that declares multiple variables emits one chunk per
    /// variable, all sharing the declaration's source span
    fn visit_variable_members(
        &mut self,
        node: Node<'_>,
        namespace: Option<&str>,
        scope: &TypeScope,
        kind: ChunkKind,
    ) {
        let modifiers = modifiers_of(node, self.source);
        let (start_line, end_line) = node_lines(node);
        let content = node_text(node, self.source).to_string();
        let mut cursor = node.walk();
        for declaration in node.named_children(&mut cursor) {
            if declaration.kind() != "variable_declaration" {
                continue;
            }
            let declared_type = type_field_text(declaration, self.source);
            let mut inner = declaration.walk();
            for declarator in declaration.named_children(&mut inner) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                let Some(name) = name_text(declarator, self.source) else {
                    continue;
                };
                let qualified = format!("{}.{}", scope.chain, name);
                let mut attrs = BTreeMap::new();
                if let Some(ty) = &declared_type {
                    attrs.insert("type".to_string(), ty.clone());
                }
                self.chunks.push(Chunk {
                    id: chunk_id(self.file_path, start_line, end_line, &qualified),
                    kind,
                    qualified_name: qualified,
                    parent_qualified_name: Some(scope.qualified.clone()),
                    namespace: namespace.map(String::from),
                    file_path: self.file_path.to_string(),
                    start_line,
                    end_line,
                    content: content.clone(),
                    dependencies: self.dependencies.clone(),
                    modifiers: modifiers.clone(),
                    attrs,
                });
            }
        }
    }

    fn push_chunk(
        &mut self,
        node: Node<'_>,
        kind: ChunkKind,
        qualified_name: String,
        parent_qualified_name: Option<String>,
        namespace: Option<&str>,
        attrs: BTreeMap<String, String>,
    ) {
        let (start_line, end_line) = node_lines(node);
        self.chunks.push(Chunk {
            id: chunk_id(self.file_path, start_line, end_line, &qualified_name),
            kind,
            qualified_name,
            parent_qualified_name,
            namespace: namespace.map(String::from),
            file_path: self.file_path.to_string(),
            start_line,
            end_line,
            content: node_text(node, self.source).to_string(),
            dependencies: self.dependencies.clone(),
            modifiers: modifiers_of(node, self.source),
            attrs,
        });
    }
}

fn compose_namespace(outer: Option<&str>, name: &str) -> String {
    match outer {
        Some(ns) => format!("{ns}.{name}"),
        None => name.to_string(),
    }
}

fn type_kind(node_kind: &str) -> Option<ChunkKind> {
    match node_kind {
        "class_declaration" => Some(ChunkKind::Class),
        "interface_declaration" => Some(ChunkKind::Interface),
        "struct_declaration" => Some(ChunkKind::Struct),
        "record_declaration" => Some(ChunkKind::Record),
        "enum_declaration" => Some(ChunkKind::Enum),
        _ => None,
    }
}

/// Modifier tokens in source order, filtered to the closed set
fn modifiers_of(node: Node<'_>, source: &str) -> String {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() == "modifier")
        .map(|child| node_text(child, source))
        .filter(|token| MODIFIER_SET.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Declared type of a member; grammars name the field `type` or `returns`
/// depending on the declaration
fn type_field_text(node: Node<'_>, source: &str) -> Option<String> {
    node.child_by_field_name("type")
        .or_else(|| node.child_by_field_name("returns"))
        .map(|ty| node_text(ty, source).to_string())
}

/// Parameter list text, parentheses included
fn parameters_text(node: Node<'_>, source: &str) -> Option<String> {
    node.child_by_field_name("parameters")
        .map(|params| node_text(params, source).to_string())
        .or_else(|| {
            let mut cursor = node.walk();
            let result = node
                .named_children(&mut cursor)
                .find(|child| {
                    matches!(child.kind(), "parameter_list" | "bracketed_parameter_list")
                })
                .map(|params| node_text(params, source).to_string());
            result
        })
}

/// Enum member names in declaration order
fn enum_values(node: Node<'_>, source: &str) -> Vec<String> {
    let Some(body) = node.child_by_field_name("body") else {
        return Vec::new();
    };
    let mut cursor = body.walk();
    body.named_children(&mut cursor)
        .filter(|child| child.kind() == "enum_member_declaration")
        .filter_map(|child| name_text(child, source))
        .collect()
}

/// The file's import list: using directives anywhere in the file,
/// deduplicated, order preserved
fn collect_usings(root: Node<'_>, source: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind() == "using_directive" {
            if let Some(target) = using_target(node, source) {
                if seen.insert(target.clone()) {
                    out.push(target);
                }
            }
            continue;
        }
        if matches!(
            node.kind(),
            "compilation_unit"
                | "namespace_declaration"
                | "file_scoped_namespace_declaration"
                | "declaration_list"
        ) {
            for i in (0..node.named_child_count()).rev() {
                if let Some(child) = node.named_child(i) {
                    stack.push(child);
                }
            }
        }
    }
    out
}

/// The imported name of a using directive, skipping any alias part
fn using_target(node: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| matches!(child.kind(), "identifier" | "qualified_name"))
        .last()
        .map(|child| node_text(child, source).to_string())
}
