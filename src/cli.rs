//! Command-line interface for the ion script compiler

use crate::builder::{BuildError, ScriptBuilder};
use crate::schema::ClassDefinition;
use crate::serializer;
use crate::{NAME, VERSION};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub struct Cli;

impl Cli {
    /// Parse arguments and run one subcommand. Returns the process exit
    /// code; all diagnostics go to stderr via the logger or eprintln.
    pub fn run() -> i32 {
        let matches = build_command().get_matches();
        let result = match matches.subcommand() {
            Some(("build", sub)) => run_build(sub),
            Some(("check", sub)) => run_check(sub),
            Some(("print", sub)) => run_print(sub),
            _ => unreachable!("subcommand required"),
        };
        match result {
            Ok(()) => 0,
            Err(message) => {
                eprintln!("{}", message);
                1
            }
        }
    }
}

fn build_command() -> Command {
    let input = Arg::new("input")
        .help("Input .ion script file")
        .required(true);
    let root = Arg::new("root")
        .long("root")
        .help("Root directory for rooted import paths (defaults to the input's directory)");
    let schema = Arg::new("schema")
        .long("schema")
        .help("JSON schema file to validate against");

    Command::new(NAME)
        .version(VERSION)
        .about("Compiles ion script files and validates them against a schema")
        .subcommand_required(true)
        .subcommand(
            Command::new("build")
                .about("Compile a script into its binary tree form")
                .arg(input.clone())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("Output path (defaults to the input with an .ionc extension)"),
                )
                .arg(root.clone())
                .arg(schema.clone()),
        )
        .subcommand(
            Command::new("check")
                .about("Compile and validate without writing output")
                .arg(input.clone().help("Input .ion file, or a directory with --all"))
                .arg(
                    Arg::new("all")
                        .long("all")
                        .action(ArgAction::SetTrue)
                        .help("Treat the input as a directory and check every .ion file in it"),
                )
                .arg(root.clone())
                .arg(schema.clone()),
        )
        .subcommand(
            Command::new("print")
                .about("Compile a script and pretty-print the resulting tree")
                .arg(input)
                .arg(root),
        )
}

fn run_build(matches: &ArgMatches) -> Result<(), String> {
    let input = input_path(matches);
    let builder = builder_for(matches, &input)?;

    let tree = builder
        .build(&input)
        .map_err(|error| render_build_error(&input, error))?;

    let output = matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| input.with_extension("ionc"));
    let bytes = serializer::serialize(&tree)
        .map_err(|error| format!("{}: serialization failed: {}", output.display(), error))?;
    fs::write(&output, bytes)
        .map_err(|error| format!("{}: {}", output.display(), error))?;

    println!("wrote {}", output.display());
    Ok(())
}

fn run_check(matches: &ArgMatches) -> Result<(), String> {
    let input = input_path(matches);

    let targets: Vec<PathBuf> = if matches.get_flag("all") {
        WalkDir::new(&input)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().map_or(false, |ext| ext == "ion"))
            .map(|entry| entry.into_path())
            .collect()
    } else {
        vec![input.clone()]
    };
    if targets.is_empty() {
        return Err(format!("{}: no .ion files found", input.display()));
    }

    let mut failures = 0usize;
    for target in &targets {
        let builder = builder_for(matches, target)?;
        match builder.build(target) {
            Ok(_) => println!("ok {}", target.display()),
            Err(error) => {
                eprintln!("{}", render_build_error(target, error));
                failures += 1;
            }
        }
    }

    if failures > 0 {
        Err(format!("{} of {} file(s) failed", failures, targets.len()))
    } else {
        Ok(())
    }
}

fn run_print(matches: &ArgMatches) -> Result<(), String> {
    let input = input_path(matches);
    let builder = builder_for(matches, &input)?;
    let tree = builder
        .build(&input)
        .map_err(|error| render_build_error(&input, error))?;
    print!("{}", tree);
    Ok(())
}

fn input_path(matches: &ArgMatches) -> PathBuf {
    // "input" is a required argument on every subcommand.
    matches
        .get_one::<String>("input")
        .map(PathBuf::from)
        .unwrap_or_default()
}

fn builder_for(matches: &ArgMatches, input: &Path) -> Result<ScriptBuilder, String> {
    let root = matches
        .get_one::<String>("root")
        .map(PathBuf::from)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));

    let mut builder = ScriptBuilder::new(root);
    if let Some(schema_path) = matches.get_one::<String>("schema") {
        builder = builder.with_schema(load_schema(schema_path)?);
    }
    Ok(builder)
}

fn load_schema(path: &str) -> Result<ClassDefinition, String> {
    let json = fs::read_to_string(path).map_err(|error| format!("{}: {}", path, error))?;
    ClassDefinition::from_json(&json).map_err(|error| format!("{}: invalid schema: {}", path, error))
}

fn render_build_error(path: &Path, error: BuildError) -> String {
    match error {
        BuildError::Compile(error) => error.to_string(),
        BuildError::Invalid(errors) => {
            let mut out = format!("{}: validation failed", path.display());
            for error in errors {
                out.push('\n');
                out.push_str("  ");
                out.push_str(&error.to_string());
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_definition_is_consistent() {
        build_command().debug_assert();
    }

    #[test]
    fn test_build_subcommand_parses() {
        let matches = build_command()
            .try_get_matches_from(["ionc", "build", "menu.ion", "-o", "menu.ionc"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "build");
        assert_eq!(sub.get_one::<String>("output").unwrap(), "menu.ionc");
    }

    #[test]
    fn test_check_all_flag() {
        let matches = build_command()
            .try_get_matches_from(["ionc", "check", "scripts/", "--all"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert!(sub.get_flag("all"));
    }
}
