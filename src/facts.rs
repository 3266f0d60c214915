//! Structural-facts collaborator.
//!
//! Best-effort extraction of classes, functions, and imports from raw
//! source text. Failure or an unsupported language yields no structural
//! context, never a hard error; the facts only enrich specialist prompts.

use crate::models::SourceFile;
use serde::{Deserialize, Serialize};

/// Structural facts for one source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuralFacts {
    pub file: String,
    pub language: String,
    pub classes: Vec<String>,
    pub functions: Vec<String>,
    pub imports: Vec<String>,
    pub line_count: usize,
}

impl StructuralFacts {
    /// One-line summary for prompt context.
    pub fn summary_line(&self) -> String {
        format!(
            "{} ({}, {} lines): {} classes, {} functions, {} imports",
            self.file,
            self.language,
            self.line_count,
            self.classes.len(),
            self.functions.len(),
            self.imports.len()
        )
    }
}

/// Extract structural facts from a file, when the language is recognized.
pub fn parse(file_name: &str, content: &str) -> Option<StructuralFacts> {
    let language = language_for(file_name)?;

    let mut classes = Vec::new();
    let mut functions = Vec::new();
    let mut imports = Vec::new();

    for line in content.lines() {
        let line = line.trim_start();
        match language {
            "Python" => {
                if let Some(name) = capture(line, "class ") {
                    classes.push(name);
                } else if let Some(name) = capture(line, "def ") {
                    functions.push(name);
                } else if line.starts_with("import ") || line.starts_with("from ") {
                    imports.push(line.to_string());
                }
            }
            "Java" => {
                if let Some(rest) = line
                    .strip_prefix("public class ")
                    .or_else(|| line.strip_prefix("class "))
                {
                    classes.push(leading_identifier(rest));
                } else if line.starts_with("import ") {
                    imports.push(line.trim_end_matches(';').to_string());
                } else if looks_like_java_method(line) {
                    functions.push(java_method_name(line));
                }
            }
            "Go" => {
                if let Some(rest) = line.strip_prefix("type ") {
                    if rest.contains("struct") || rest.contains("interface") {
                        classes.push(leading_identifier(rest));
                    }
                } else if let Some(name) = capture(line, "func ") {
                    functions.push(name);
                } else if line.starts_with("import") {
                    imports.push(line.to_string());
                }
            }
            "Rust" => {
                if let Some(rest) = line
                    .strip_prefix("pub struct ")
                    .or_else(|| line.strip_prefix("struct "))
                    .or_else(|| line.strip_prefix("pub enum "))
                    .or_else(|| line.strip_prefix("enum "))
                {
                    classes.push(leading_identifier(rest));
                } else if let Some(name) =
                    capture(line, "pub fn ").or_else(|| capture(line, "fn "))
                {
                    functions.push(name);
                } else if line.starts_with("use ") {
                    imports.push(line.trim_end_matches(';').to_string());
                }
            }
            "JavaScript" | "TypeScript" => {
                if let Some(name) = capture(line, "class ") {
                    classes.push(name);
                } else if let Some(name) =
                    capture(line, "function ").or_else(|| capture(line, "async function "))
                {
                    functions.push(name);
                } else if line.starts_with("import ") || line.starts_with("const ") && line.contains("require(") {
                    imports.push(line.to_string());
                }
            }
            _ => return None,
        }
    }

    Some(StructuralFacts {
        file: file_name.to_string(),
        language: language.to_string(),
        classes,
        functions,
        imports,
        line_count: content.lines().count(),
    })
}

/// Facts for a whole file set; unrecognized files are simply skipped.
pub fn parse_all(files: &[SourceFile]) -> Vec<StructuralFacts> {
    files
        .iter()
        .filter_map(|f| parse(&f.path, &f.content))
        .collect()
}

fn language_for(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit('.').next()?;
    match ext {
        "py" => Some("Python"),
        "java" => Some("Java"),
        "go" => Some("Go"),
        "rs" => Some("Rust"),
        "js" | "jsx" => Some("JavaScript"),
        "ts" | "tsx" => Some("TypeScript"),
        _ => None,
    }
}

/// Identifier following a keyword prefix, if the line starts with it.
fn capture(line: &str, prefix: &str) -> Option<String> {
    let rest = line.strip_prefix(prefix)?;
    let name = leading_identifier(rest);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn leading_identifier(s: &str) -> String {
    s.chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

fn looks_like_java_method(line: &str) -> bool {
    (line.starts_with("public ") || line.starts_with("private ") || line.starts_with("protected "))
        && line.contains('(')
        && !line.contains("class ")
        && !line.contains('=')
}

fn java_method_name(line: &str) -> String {
    line.split('(')
        .next()
        .and_then(|head| head.split_whitespace().last())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_facts() {
        let content = "import os\nfrom typing import List\n\nclass UserService:\n    def get_user(self, user_id):\n        pass\n";
        let facts = parse("user_service.py", content).unwrap();
        assert_eq!(facts.language, "Python");
        assert_eq!(facts.classes, vec!["UserService"]);
        assert_eq!(facts.functions, vec!["get_user"]);
        assert_eq!(facts.imports.len(), 2);
        assert_eq!(facts.line_count, 6);
    }

    #[test]
    fn test_go_facts() {
        let content = "package main\n\nimport \"fmt\"\n\ntype UserService struct {}\n\nfunc GetUser(id int) {}\n";
        let facts = parse("user_service.go", content).unwrap();
        assert_eq!(facts.classes, vec!["UserService"]);
        assert_eq!(facts.functions, vec!["GetUser"]);
    }

    #[test]
    fn test_java_facts() {
        let content = "import java.util.List;\n\npublic class ProductService {\n    public Product findById(long id) { return null; }\n}\n";
        let facts = parse("ProductService.java", content).unwrap();
        assert_eq!(facts.classes, vec!["ProductService"]);
        assert_eq!(facts.functions, vec!["findById"]);
    }

    #[test]
    fn test_unknown_language_yields_no_context() {
        assert!(parse("notes.txt", "hello").is_none());
        assert!(parse("Makefile", "all:").is_none());
    }

    #[test]
    fn test_parse_all_skips_unrecognized() {
        let files = vec![
            SourceFile {
                path: "a.py".to_string(),
                content: "def f(): pass".to_string(),
            },
            SourceFile {
                path: "b.txt".to_string(),
                content: "plain".to_string(),
            },
        ];
        assert_eq!(parse_all(&files).len(), 1);
    }
}
