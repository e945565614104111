//! Build orchestration: compile, then validate, then report
//!
//! Thin layer over the compiler and validator for hosts that want the
//! whole pipeline in one call. Diagnostics are logged as they are found
//! and also returned, so callers can print or inspect them either way.

use crate::compiler::Compiler;
use crate::error::{CompileError, ValidateError};
use crate::schema::ClassDefinition;
use crate::tree::ScriptTree;
use crate::validator::Validator;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a build produced no usable tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("{} validation error(s)", .0.len())]
    Invalid(Vec<ValidateError>),
}

pub struct ScriptBuilder {
    compiler: Compiler,
    schema: Option<ClassDefinition>,
}

impl ScriptBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            compiler: Compiler::new(root),
            schema: None,
        }
    }

    /// Validate every built tree against `schema`. Without one, building
    /// stops after the compile step.
    pub fn with_schema(mut self, schema: ClassDefinition) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Compile `path` and, when a schema is set, validate the result.
    /// Compilation stops at its first error; validation reports all of
    /// them before failing.
    pub fn build(&self, path: impl AsRef<Path>) -> Result<ScriptTree, BuildError> {
        let path = path.as_ref();
        let tree = self.compiler.compile(path).map_err(|error| {
            log::error!("{}", error);
            error
        })?;

        if let Some(schema) = &self.schema {
            let errors = Validator::new(schema).validate(&tree);
            if !errors.is_empty() {
                for error in &errors {
                    log::error!("{}: {}", path.display(), error);
                }
                return Err(BuildError::Invalid(errors));
            }
        }

        log::info!("built {}", path.display());
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CompileErrorKind, ValidateErrorKind};
    use crate::schema::{ClassDeclaration, Ordinality, ParameterType, PropertyDeclaration};
    use std::fs;
    use tempfile::TempDir;

    fn schema() -> ClassDefinition {
        ClassDefinition::new("root").with_inner(ClassDeclaration::defined(
            ClassDefinition::new("skin").with_property(
                PropertyDeclaration::new("tint", Ordinality::Mandatory)
                    .with_parameters(vec![ParameterType::Color]),
            ),
            Ordinality::Optional,
        ))
    }

    #[test]
    fn test_build_without_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("any.ion");
        fs::write(&path, "whatever { x: 1; }").unwrap();

        let tree = ScriptBuilder::new(dir.path()).build(&path).unwrap();
        assert_eq!(tree.objects()[0].name, "whatever");
    }

    #[test]
    fn test_build_validates_against_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("skin.ion");
        fs::write(&path, "skin { tint: #ff0000; }").unwrap();

        let builder = ScriptBuilder::new(dir.path()).with_schema(schema());
        assert!(builder.build(&path).is_ok());
    }

    #[test]
    fn test_build_surfaces_validation_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("skin.ion");
        fs::write(&path, "skin {}").unwrap();

        let builder = ScriptBuilder::new(dir.path()).with_schema(schema());
        match builder.build(&path) {
            Err(BuildError::Invalid(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].kind, ValidateErrorKind::MissingRequiredProperty);
                assert_eq!(errors[0].fully_qualified_name, "skin.tint");
            }
            other => panic!("expected validation failure, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_build_surfaces_compile_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.ion");
        fs::write(&path, "skin { tint ; }").unwrap();

        let builder = ScriptBuilder::new(dir.path()).with_schema(schema());
        match builder.build(&path) {
            Err(BuildError::Compile(error)) => {
                assert_eq!(error.kind, CompileErrorKind::UnexpectedSeparator)
            }
            other => panic!("expected compile failure, got {:?}", other.map(|_| ())),
        }
    }
}
