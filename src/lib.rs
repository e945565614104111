//! Ion Script Compiler
//!
//! A compiler and validator for the ion declarative configuration
//! language: nested object blocks with typed property values, color and
//! vector constructors, and an `@import` system compiled in parallel.
//!
//! # Basic Usage
//!
//! ```no_run
//! use ionc::{Compiler, Result};
//!
//! fn main() -> Result<()> {
//!     let tree = Compiler::new("scripts").compile("scripts/menu.ion")?;
//!     println!("{}", tree);
//!     Ok(())
//! }
//! ```
//!
//! # Pipeline
//!
//! 1. **Lexer** - scan source text into a flat token stream, scheduling
//!    an import worker for each `@import` as it is recognized
//! 2. **Worker pool** - lex and syntax-check imported files in parallel,
//!    joined once before parsing
//! 3. **Splice** - replace import statements with the imported streams
//! 4. **Parser** - build the script tree, folding color/vector
//!    constructor calls at parse time
//! 5. **Validator** - check the tree against a host-supplied class
//!    schema, collecting every violation in one pass

pub mod builder;
pub mod cli;
pub mod compiler;
pub mod error;
pub mod functions;
pub mod importer;
pub mod lexer;
pub mod parser;
pub mod schema;
pub mod serializer;
pub mod tree;
pub mod types;
pub mod validator;
pub mod workers;

// Re-export commonly used types and functions
pub use builder::{BuildError, ScriptBuilder};
pub use compiler::Compiler;
pub use error::{CompileError, CompileErrorKind, Result, ValidateError, ValidateErrorKind};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;
pub use schema::{
    ClassBinding, ClassDeclaration, ClassDefinition, ClassType, Ordinality, ParameterType,
    PropertyDeclaration,
};
pub use serializer::{deserialize, serialize, TreeDecodeError};
pub use tree::{Argument, ObjectNode, PropertyNode, ScriptTree, Visit};
pub use types::{Color, Vector2};
pub use validator::Validator;

/// Compiler version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
