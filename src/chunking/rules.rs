//! Rule-driven chunking for non-C# languages
//!
//! Each supported language declares which syntax-tree node kinds count as
//! declarations and which node kinds carry imports. Extraction is a
//! single recursive walk: matched declarations emit a chunk qualified by
//! the chain of enclosing declaration names and are descended into for
//! nested declarations.

use super::{name_text, node_lines, node_text};
use crate::error::Result;
use crate::types::{chunk_id, Chunk, ChunkKind};
use std::collections::{BTreeMap, HashSet};
use tree_sitter::Node;

/// A declaration node kind and the chunk kind it produces
pub(crate) struct DeclarationRule {
    pub node_kind: &'static str,
    pub kind: ChunkKind,
}

/// Extraction configuration for one language
pub(crate) struct LanguageRules {
    pub language: fn() -> tree_sitter::Language,
    pub declarations: &'static [DeclarationRule],
    pub import_kinds: &'static [&'static str],
}

fn lang_rust() -> tree_sitter::Language {
    tree_sitter_rust::LANGUAGE.into()
}

fn lang_python() -> tree_sitter::Language {
    tree_sitter_python::LANGUAGE.into()
}

fn lang_java() -> tree_sitter::Language {
    tree_sitter_java::LANGUAGE.into()
}

fn lang_javascript() -> tree_sitter::Language {
    tree_sitter_javascript::LANGUAGE.into()
}

fn lang_typescript() -> tree_sitter::Language {
    tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
}

fn lang_tsx() -> tree_sitter::Language {
    tree_sitter_typescript::LANGUAGE_TSX.into()
}

fn lang_go() -> tree_sitter::Language {
    tree_sitter_go::LANGUAGE.into()
}

static RUST_RULES: LanguageRules = LanguageRules {
    language: lang_rust,
    declarations: &[
        DeclarationRule {
            node_kind: "function_item",
            kind: ChunkKind::Function,
        },
        DeclarationRule {
            node_kind: "struct_item",
            kind: ChunkKind::Struct,
        },
        DeclarationRule {
            node_kind: "enum_item",
            kind: ChunkKind::Enum,
        },
        DeclarationRule {
            node_kind: "trait_item",
            kind: ChunkKind::Interface,
        },
    ],
    import_kinds: &["use_declaration"],
};

static PYTHON_RULES: LanguageRules = LanguageRules {
    language: lang_python,
    declarations: &[
        DeclarationRule {
            node_kind: "class_definition",
            kind: ChunkKind::Class,
        },
        DeclarationRule {
            node_kind: "function_definition",
            kind: ChunkKind::Function,
        },
    ],
    import_kinds: &["import_statement", "import_from_statement"],
};

static JAVA_RULES: LanguageRules = LanguageRules {
    language: lang_java,
    declarations: &[
        DeclarationRule {
            node_kind: "class_declaration",
            kind: ChunkKind::Class,
        },
        DeclarationRule {
            node_kind: "interface_declaration",
            kind: ChunkKind::Interface,
        },
        DeclarationRule {
            node_kind: "enum_declaration",
            kind: ChunkKind::Enum,
        },
        DeclarationRule {
            node_kind: "method_declaration",
            kind: ChunkKind::Method,
        },
        DeclarationRule {
            node_kind: "constructor_declaration",
            kind: ChunkKind::Constructor,
        },
    ],
    import_kinds: &["import_declaration"],
};

static JAVASCRIPT_RULES: LanguageRules = LanguageRules {
    language: lang_javascript,
    declarations: &[
        DeclarationRule {
            node_kind: "class_declaration",
            kind: ChunkKind::Class,
        },
        DeclarationRule {
            node_kind: "function_declaration",
            kind: ChunkKind::Function,
        },
        DeclarationRule {
            node_kind: "generator_function_declaration",
            kind: ChunkKind::Function,
        },
        DeclarationRule {
            node_kind: "method_definition",
            kind: ChunkKind::Method,
        },
    ],
    import_kinds: &["import_statement"],
};

const TS_DECLARATIONS: &[DeclarationRule] = &[
    DeclarationRule {
        node_kind: "class_declaration",
        kind: ChunkKind::Class,
    },
    DeclarationRule {
        node_kind: "function_declaration",
        kind: ChunkKind::Function,
    },
    DeclarationRule {
        node_kind: "method_definition",
        kind: ChunkKind::Method,
    },
    DeclarationRule {
        node_kind: "interface_declaration",
        kind: ChunkKind::Interface,
    },
    DeclarationRule {
        node_kind: "enum_declaration",
        kind: ChunkKind::Enum,
    },
];

static TYPESCRIPT_RULES: LanguageRules = LanguageRules {
    language: lang_typescript,
    declarations: TS_DECLARATIONS,
    import_kinds: &["import_statement"],
};

static TSX_RULES: LanguageRules = LanguageRules {
    language: lang_tsx,
    declarations: TS_DECLARATIONS,
    import_kinds: &["import_statement"],
};

static GO_RULES: LanguageRules = LanguageRules {
    language: lang_go,
    declarations: &[
        DeclarationRule {
            node_kind: "function_declaration",
            kind: ChunkKind::Function,
        },
        DeclarationRule {
            node_kind: "method_declaration",
            kind: ChunkKind::Method,
        },
        DeclarationRule {
            node_kind: "type_spec",
            kind: ChunkKind::Struct,
        },
    ],
    import_kinds: &["import_declaration"],
};

/// Extraction rules for a file extension, if the language has a grammar
pub(crate) fn rules_for_extension(ext: &str) -> Option<&'static LanguageRules> {
    match ext {
        "rs" => Some(&RUST_RULES),
        "py" => Some(&PYTHON_RULES),
        "java" => Some(&JAVA_RULES),
        "js" | "jsx" => Some(&JAVASCRIPT_RULES),
        "ts" => Some(&TYPESCRIPT_RULES),
        "tsx" => Some(&TSX_RULES),
        "go" => Some(&GO_RULES),
        _ => None,
    }
}

pub(crate) fn parse(
    rules: &'static LanguageRules,
    file_path: &str,
    content: &str,
) -> Result<Vec<Chunk>> {
    let language = (rules.language)();
    let tree = super::parse_tree(&language, file_path, content)?;
    let root = tree.root_node();
    super::log_syntax_errors(file_path, root);

    let dependencies = collect_imports(root, rules.import_kinds, content);
    let mut chunks = Vec::new();
    extract(
        rules,
        root,
        content,
        file_path,
        &dependencies,
        None,
        &mut chunks,
    );
    Ok(chunks)
}

/// Recursive walk: matched declarations emit a chunk and become the
/// qualification scope for everything beneath them
fn extract(
    rules: &'static LanguageRules,
    node: Node<'_>,
    source: &str,
    file_path: &str,
    dependencies: &[String],
    enclosing: Option<&str>,
    chunks: &mut Vec<Chunk>,
) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let rule = rules
            .declarations
            .iter()
            .find(|rule| rule.node_kind == child.kind());
        let matched = rule.and_then(|rule| {
            name_text(child, source).map(|name| (rule, name))
        });
        match matched {
            Some((rule, name)) => {
                let qualified = match enclosing {
                    Some(parent) => format!("{parent}.{name}"),
                    None => name,
                };
                // a function declared inside a type reads as a method
                let kind = if rule.kind == ChunkKind::Function && enclosing.is_some() {
                    ChunkKind::Method
                } else {
                    rule.kind
                };
                let (start_line, end_line) = node_lines(child);
                chunks.push(Chunk {
                    id: chunk_id(file_path, start_line, end_line, &qualified),
                    kind,
                    qualified_name: qualified.clone(),
                    parent_qualified_name: enclosing.map(String::from),
                    namespace: None,
                    file_path: file_path.to_string(),
                    start_line,
                    end_line,
                    content: node_text(child, source).to_string(),
                    dependencies: dependencies.to_vec(),
                    modifiers: String::new(),
                    attrs: BTreeMap::new(),
                });
                extract(
                    rules,
                    child,
                    source,
                    file_path,
                    dependencies,
                    Some(&qualified),
                    chunks,
                );
            }
            None => {
                extract(
                    rules, child, source, file_path, dependencies, enclosing, chunks,
                );
            }
        }
    }
}

/// Imports in effect at the file: one entry per import node, keyword
/// prefix and trailing semicolon stripped, deduplicated, order preserved
fn collect_imports(root: Node<'_>, import_kinds: &[&str], source: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if import_kinds.contains(&node.kind()) {
            let name = import_name(node_text(node, source));
            if !name.is_empty() && seen.insert(name.clone()) {
                out.push(name);
            }
            continue;
        }
        for i in (0..node.named_child_count()).rev() {
            if let Some(child) = node.named_child(i) {
                stack.push(child);
            }
        }
    }
    out
}

fn import_name(text: &str) -> String {
    let trimmed = text.trim().trim_end_matches(';').trim();
    trimmed
        .strip_prefix("use ")
        .or_else(|| trimmed.strip_prefix("import "))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::Chunker;

    fn find<'a>(chunks: &'a [Chunk], qualified: &str) -> &'a Chunk {
        chunks
            .iter()
            .find(|c| c.qualified_name == qualified)
            .unwrap_or_else(|| panic!("missing chunk {qualified}"))
    }

    #[test]
    fn rust_structs_and_functions() {
        let source = "use std::fmt;\n\npub struct Point {\n    x: i32,\n}\n\npub fn run() {}\n";
        let chunks = Chunker::new().parse("src/lib.rs", source).unwrap();
        let point = find(&chunks, "Point");
        assert_eq!(point.kind, ChunkKind::Struct);
        assert_eq!(point.dependencies, vec!["std::fmt"]);
        assert_eq!(find(&chunks, "run").kind, ChunkKind::Function);
    }

    #[test]
    fn python_methods_nest_under_their_class() {
        let source = "import os\nfrom typing import List\n\nclass Greeter:\n    def greet(self):\n        return \"hi\"\n\ndef main():\n    pass\n";
        let chunks = Chunker::new().parse("app/main.py", source).unwrap();
        let class = find(&chunks, "Greeter");
        assert_eq!(class.kind, ChunkKind::Class);
        let method = find(&chunks, "Greeter.greet");
        assert_eq!(method.kind, ChunkKind::Method);
        assert_eq!(method.parent_qualified_name.as_deref(), Some("Greeter"));
        assert_eq!(find(&chunks, "main").kind, ChunkKind::Function);
        assert_eq!(
            class.dependencies,
            vec!["os".to_string(), "from typing import List".to_string()]
        );
    }

    #[test]
    fn java_members_qualify_by_class() {
        let source = "import java.util.List;\n\npublic class Service {\n    public Service() {}\n    public int count(List<String> items) { return items.size(); }\n}\n";
        let chunks = Chunker::new().parse("src/Service.java", source).unwrap();
        assert_eq!(find(&chunks, "Service").kind, ChunkKind::Class);
        assert_eq!(find(&chunks, "Service.count").kind, ChunkKind::Method);
        assert_eq!(
            find(&chunks, "Service.count").parent_qualified_name.as_deref(),
            Some("Service")
        );
    }

    #[test]
    fn go_types_and_functions() {
        let source = "package main\n\nimport \"fmt\"\n\ntype Widget struct {\n    Name string\n}\n\nfunc Run() {\n    fmt.Println(\"ok\")\n}\n";
        let chunks = Chunker::new().parse("cmd/main.go", source).unwrap();
        assert_eq!(find(&chunks, "Widget").kind, ChunkKind::Struct);
        assert_eq!(find(&chunks, "Run").kind, ChunkKind::Function);
    }

    #[test]
    fn line_spans_are_one_based_and_ordered() {
        let source = "pub fn first() {}\n\npub fn second() {\n    let _ = 1;\n}\n";
        let chunks = Chunker::new().parse("src/lib.rs", source).unwrap();
        let first = find(&chunks, "first");
        assert_eq!((first.start_line, first.end_line), (1, 1));
        let second = find(&chunks, "second");
        assert_eq!((second.start_line, second.end_line), (3, 5));
        for chunk in &chunks {
            assert!(chunk.start_line >= 1 && chunk.end_line >= chunk.start_line);
        }
    }
}
