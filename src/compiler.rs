//! Top-level compilation driver
//!
//! Read primary file → lex (scheduling import workers as statements are
//! recognized) → join workers → splice import sites with the imported token
//! streams → pre-parse filter → parse. Tokens and the tree live for one
//! call only.

use crate::error::{CompileError, CompileErrorKind, Result};
use crate::importer::{resolve_import, FileHierarchy};
use crate::lexer::{unquote, Lexer, Token, TokenKind};
use crate::parser::{pre_parse, Parser};
use crate::tree::ScriptTree;
use crate::workers::ImportWorkerPool;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub struct Compiler {
    root: PathBuf,
}

impl Compiler {
    /// `root` anchors rooted import paths (`@import "/shared/x.ion"`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Compile one script file into a tree.
    pub fn compile(&self, path: impl AsRef<Path>) -> Result<ScriptTree> {
        let path = path.as_ref();
        let primary = path.canonicalize().map_err(|_| {
            CompileError::new(CompileErrorKind::MissingImportFile, path.to_path_buf(), 0)
        })?;

        let source = fs::read_to_string(&primary).map_err(|_| {
            CompileError::new(CompileErrorKind::MissingImportFile, primary.clone(), 0)
        })?;

        let pool = ImportWorkerPool::new(self.root.clone());
        let mut hierarchy = FileHierarchy::new();
        hierarchy.push(primary.clone(), 0)?;

        log::debug!("compiling {}", primary.display());

        let file_name = primary.display().to_string();
        let mut lexer = Lexer::new(&source, file_name.clone());
        let tokens = lexer.tokenize_with_imports(&mut |import_path, line| {
            let resolved = resolve_import(import_path, &self.root, &primary, line)?;
            pool.schedule(resolved, hierarchy.clone(), line)
        })?;

        // Single join point: all import lexing has finished past here.
        let imports = pool.join()?;
        log::debug!("joined {} import stream(s)", imports.len());

        let spliced = splice_imports(tokens, &imports, &primary, &self.root)?;
        Parser::new(pre_parse(spliced), file_name).parse()
    }
}

/// Replace every `@import "path";` statement with the imported file's
/// (recursively spliced) token stream. Import statements below the top
/// level are rejected here, where nesting depth is known.
fn splice_imports(
    tokens: Vec<Token>,
    imports: &HashMap<PathBuf, Vec<Token>>,
    current_file: &Path,
    root: &Path,
) -> Result<Vec<Token>> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut depth = 0usize;
    let mut iter = tokens.into_iter().peekable();

    while let Some(token) = iter.next() {
        match token.kind {
            TokenKind::Separator if token.lexeme == "{" => {
                depth += 1;
                out.push(token);
            }
            TokenKind::Separator if token.lexeme == "}" => {
                depth = depth.saturating_sub(1);
                out.push(token);
            }
            TokenKind::Rule if token.lexeme == "@import" => {
                if depth > 0 {
                    return Err(CompileError::new(
                        CompileErrorKind::UnexpectedRule,
                        token.file,
                        token.line,
                    ));
                }
                // The lexer already shape-checked the statement; pull the
                // path string and the terminating semicolon back out.
                let path_token = next_significant(&mut iter).ok_or_else(|| {
                    CompileError::new(
                        CompileErrorKind::MissingImportFile,
                        token.file.clone(),
                        token.line,
                    )
                })?;
                let _semicolon = next_significant(&mut iter);

                let resolved =
                    resolve_import(&unquote(&path_token.lexeme), root, current_file, token.line)?;
                let imported = imports.get(&resolved).ok_or_else(|| {
                    CompileError::new(
                        CompileErrorKind::MissingImportFile,
                        token.file.clone(),
                        token.line,
                    )
                })?;
                let mut expanded = splice_imports(imported.clone(), imports, &resolved, root)?;
                out.append(&mut expanded);
            }
            _ => out.push(token),
        }
    }

    Ok(out)
}

fn next_significant(iter: &mut std::iter::Peekable<std::vec::IntoIter<Token>>) -> Option<Token> {
    iter.find(|t| !matches!(t.kind, TokenKind::Whitespace | TokenKind::Comment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileErrorKind;
    use crate::tree::Argument;
    use tempfile::TempDir;

    fn write(dir: &TempDir, rel: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_compile_single_file() {
        let dir = TempDir::new().unwrap();
        let main = write(&dir, "main.ion", "foo { name: \"bar\"; }");

        let tree = Compiler::new(dir.path()).compile(&main).unwrap();
        assert_eq!(tree.objects().len(), 1);
        assert_eq!(tree.objects()[0].name, "foo");
    }

    #[test]
    fn test_import_contributes_objects() {
        let dir = TempDir::new().unwrap();
        write(&dir, "palette.ion", "palette { main: #ff0000; }");
        let main = write(
            &dir,
            "main.ion",
            "@import \"palette.ion\";\nskin { tint: red; }",
        );

        let tree = Compiler::new(dir.path()).compile(&main).unwrap();
        let names: Vec<&str> = tree.objects().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["palette", "skin"]);
    }

    #[test]
    fn test_nested_imports_expand_in_order() {
        let dir = TempDir::new().unwrap();
        write(&dir, "base.ion", "base {}");
        write(&dir, "mid.ion", "@import \"base.ion\";\nmid {}");
        let main = write(&dir, "main.ion", "@import \"mid.ion\";\nmain {}");

        let tree = Compiler::new(dir.path()).compile(&main).unwrap();
        let names: Vec<&str> = tree.objects().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["base", "mid", "main"]);
    }

    #[test]
    fn test_rooted_import_path() {
        let dir = TempDir::new().unwrap();
        write(&dir, "shared/defs.ion", "defs {}");
        let main = write(&dir, "menu/main.ion", "@import \"/shared/defs.ion\";\nmenu {}");

        let tree = Compiler::new(dir.path()).compile(&main).unwrap();
        assert_eq!(tree.objects()[0].name, "defs");
    }

    #[test]
    fn test_sibling_duplicate_import_allowed() {
        let dir = TempDir::new().unwrap();
        write(&dir, "shared.ion", "shared {}");
        write(&dir, "a.ion", "@import \"shared.ion\";\na {}");
        write(&dir, "b.ion", "@import \"shared.ion\";\nb {}");
        let main = write(&dir, "main.ion", "@import \"a.ion\";\n@import \"b.ion\";");

        let tree = Compiler::new(dir.path()).compile(&main).unwrap();
        let names: Vec<&str> = tree.objects().iter().map(|o| o.name.as_str()).collect();
        // Both branches expand their own copy of shared
        assert_eq!(names, vec!["shared", "a", "shared", "b"]);
    }

    #[test]
    fn test_circular_import_fails_without_tree() {
        let dir = TempDir::new().unwrap();
        write(&dir, "x.ion", "@import \"y.ion\";\nx {}");
        write(&dir, "y.ion", "@import \"x.ion\";\ny {}");
        let main = dir.path().join("x.ion");

        let err = Compiler::new(dir.path()).compile(&main).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::CircularImport);
    }

    #[test]
    fn test_missing_import_file() {
        let dir = TempDir::new().unwrap();
        let main = write(&dir, "main.ion", "@import \"nope.ion\";");

        let err = Compiler::new(dir.path()).compile(&main).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::MissingImportFile);
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_missing_primary_file() {
        let dir = TempDir::new().unwrap();
        let err = Compiler::new(dir.path())
            .compile(dir.path().join("absent.ion"))
            .unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::MissingImportFile);
    }

    #[test]
    fn test_import_error_carries_importing_file_and_line() {
        let dir = TempDir::new().unwrap();
        write(&dir, "inner.ion", "@import \"gone.ion\";");
        let main = write(&dir, "main.ion", "line1 {}\n@import \"inner.ion\";");

        let err = Compiler::new(dir.path()).compile(&main).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::MissingImportFile);
        // Failure is attributed to inner.ion's import statement
        assert!(err.file.to_string_lossy().contains("inner.ion"));
    }

    #[test]
    fn test_values_survive_through_imports() {
        let dir = TempDir::new().unwrap();
        write(&dir, "vals.ion", "vals { n: 42; f: 1.5; b: true; }");
        let main = write(&dir, "main.ion", "@import \"vals.ion\";");

        let tree = Compiler::new(dir.path()).compile(&main).unwrap();
        let vals = &tree.objects()[0];
        assert_eq!(vals.property("n").unwrap().arguments[0], Argument::Integer(42));
        assert_eq!(
            vals.property("f").unwrap().arguments[0],
            Argument::FloatingPoint(1.5)
        );
        assert_eq!(vals.property("b").unwrap().arguments[0], Argument::Boolean(true));
    }
}
