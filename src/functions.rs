//! Parse-time evaluation of built-in value constructors
//!
//! Color and vector constructor calls fold into a single argument while the
//! tree is being built; nothing is deferred to the engine. `calc()` is the
//! one arithmetic context and evaluates through meval.

use crate::error::{CompileError, CompileErrorKind, Result};
use crate::tree::Argument;
use crate::types::{Color, Vector2};

/// Evaluate a constructor call. `Ok(None)` means the name is not a
/// recognized constructor; the caller passes the raw arguments through
/// unchanged (existing scripts rely on this being permissive).
pub fn evaluate(
    name: &str,
    arguments: &[Argument],
    file: &str,
    line: usize,
) -> Result<Option<Argument>> {
    let folded = match name {
        "rgb" => color_rgb(arity(arguments, 3, file, line)?, None),
        "rgba" => {
            let args = arity(arguments, 4, file, line)?;
            color_rgb(&args[..3], Some(alpha(&args[3], file, line)?))
        }
        "hsl" => color_hsl(arity(arguments, 3, file, line)?, None),
        "hsla" => {
            let args = arity(arguments, 4, file, line)?;
            color_hsl(&args[..3], Some(alpha(&args[3], file, line)?))
        }
        "hwb" => color_hwb(arity(arguments, 3, file, line)?, None),
        "hwba" => {
            let args = arity(arguments, 4, file, line)?;
            color_hwb(&args[..3], Some(alpha(&args[3], file, line)?))
        }
        "cmyk" => color_cmyk(arity(arguments, 4, file, line)?, None),
        "cmyka" => {
            let args = arity(arguments, 5, file, line)?;
            color_cmyk(&args[..4], Some(alpha(&args[4], file, line)?))
        }
        "vec2" => {
            let args = arity(arguments, 2, file, line)?;
            match (number(&args[0]), number(&args[1])) {
                (Some(x), Some(y)) => Some(Argument::Vector2(Vector2::new(x, y))),
                _ => None,
            }
        }
        _ => return Ok(None),
    };

    match folded {
        Some(argument) => Ok(Some(argument)),
        None => Err(CompileError::new(
            CompileErrorKind::InvalidFunctionArguments,
            file,
            line,
        )),
    }
}

/// Evaluate the text of a `calc()` expression into a float argument.
pub fn evaluate_calc(expression: &str, file: &str, line: usize) -> Result<Argument> {
    meval::eval_str(expression)
        .map(|value| Argument::FloatingPoint(value as f32))
        .map_err(|_| CompileError::new(CompileErrorKind::InvalidFunctionArguments, file, line))
}

fn arity<'a>(arguments: &'a [Argument], count: usize, file: &str, line: usize) -> Result<&'a [Argument]> {
    if arguments.len() == count {
        Ok(arguments)
    } else {
        Err(CompileError::new(
            CompileErrorKind::InvalidFunctionArguments,
            file,
            line,
        ))
    }
}

fn number(argument: &Argument) -> Option<f32> {
    match argument {
        Argument::Integer(value) => Some(*value as f32),
        Argument::FloatingPoint(value) => Some(*value),
        _ => None,
    }
}

/// Alpha given as an integer is a percent; as a float it is already
/// normalized.
fn alpha(argument: &Argument, file: &str, line: usize) -> Result<f32> {
    match argument {
        Argument::Integer(value) => Ok(*value as f32 / 100.0),
        Argument::FloatingPoint(value) => Ok(*value),
        _ => Err(CompileError::new(
            CompileErrorKind::InvalidFunctionArguments,
            file,
            line,
        )),
    }
}

/// RGB channels given as integers are 8-bit.
fn color_rgb(channels: &[Argument], alpha: Option<f32>) -> Option<Argument> {
    let channel = |argument: &Argument| match argument {
        Argument::Integer(value) => Some(*value as f32 / 255.0),
        Argument::FloatingPoint(value) => Some(*value),
        _ => None,
    };
    Some(Argument::Color(Color::new(
        channel(&channels[0])?,
        channel(&channels[1])?,
        channel(&channels[2])?,
        alpha.unwrap_or(1.0),
    )))
}

/// Hue given as an integer is degrees; saturation/lightness integers are
/// percentages.
fn color_hsl(components: &[Argument], alpha: Option<f32>) -> Option<Argument> {
    Some(Argument::Color(Color::from_hsl(
        hue(&components[0])?,
        percent(&components[1])?,
        percent(&components[2])?,
        alpha.unwrap_or(1.0),
    )))
}

fn color_hwb(components: &[Argument], alpha: Option<f32>) -> Option<Argument> {
    Some(Argument::Color(Color::from_hwb(
        hue(&components[0])?,
        percent(&components[1])?,
        percent(&components[2])?,
        alpha.unwrap_or(1.0),
    )))
}

fn color_cmyk(components: &[Argument], alpha: Option<f32>) -> Option<Argument> {
    Some(Argument::Color(Color::from_cmyk(
        percent(&components[0])?,
        percent(&components[1])?,
        percent(&components[2])?,
        percent(&components[3])?,
        alpha.unwrap_or(1.0),
    )))
}

fn hue(argument: &Argument) -> Option<f32> {
    match argument {
        Argument::Integer(value) => Some(*value as f32 / 360.0),
        Argument::FloatingPoint(value) => Some(*value),
        _ => None,
    }
}

fn percent(argument: &Argument) -> Option<f32> {
    match argument {
        Argument::Integer(value) => Some(*value as f32 / 100.0),
        Argument::FloatingPoint(value) => Some(*value),
        _ => None,
    }
}
