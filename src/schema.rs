//! Declarative class schemas validated against script trees
//!
//! A schema is built once by the host (or loaded from JSON) and is
//! read-only afterwards; many validations may share it concurrently.

use crate::tree::Argument;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether a declared member must appear on every instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ordinality {
    Mandatory,
    #[default]
    Optional,
}

/// Abstract classes exist only to be inherited from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassType {
    Abstract,
    #[default]
    Concrete,
}

/// Declared type of one property parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterType {
    Boolean,
    Color,
    Enumerable {
        /// Allowed names; empty accepts any enumerable.
        #[serde(default)]
        values: Vec<String>,
    },
    FloatingPoint,
    Integer,
    String,
    Vector2,
}

impl ParameterType {
    /// Does a runtime argument satisfy this parameter? Floating-point
    /// parameters also accept integers.
    pub fn matches(&self, argument: &Argument) -> bool {
        match (self, argument) {
            (ParameterType::Boolean, Argument::Boolean(_)) => true,
            (ParameterType::Color, Argument::Color(_)) => true,
            (ParameterType::Enumerable { values }, Argument::Enumerable(name)) => {
                values.is_empty() || values.iter().any(|v| v == name)
            }
            (ParameterType::FloatingPoint, Argument::FloatingPoint(_)) => true,
            (ParameterType::FloatingPoint, Argument::Integer(_)) => true,
            (ParameterType::Integer, Argument::Integer(_)) => true,
            (ParameterType::String, Argument::String(_)) => true,
            (ParameterType::Vector2, Argument::Vector2(_)) => true,
            _ => false,
        }
    }
}

/// One allowed property on a class. Argument count must fall within
/// `[required_parameters, parameters.len()]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDeclaration {
    pub name: String,
    #[serde(default)]
    pub ordinality: Ordinality,
    #[serde(default)]
    pub parameters: Vec<ParameterType>,
    pub required_parameters: usize,
}

impl PropertyDeclaration {
    pub fn new(name: impl Into<String>, ordinality: Ordinality) -> Self {
        Self {
            name: name.into(),
            ordinality,
            parameters: Vec::new(),
            required_parameters: 0,
        }
    }

    /// All parameters required.
    pub fn with_parameters(mut self, parameters: Vec<ParameterType>) -> Self {
        self.required_parameters = parameters.len();
        self.parameters = parameters;
        self
    }

    /// Trailing `parameters.len() - required` parameters are optional.
    pub fn with_optional_parameters(
        mut self,
        parameters: Vec<ParameterType>,
        required: usize,
    ) -> Self {
        self.required_parameters = required.min(parameters.len());
        self.parameters = parameters;
        self
    }

    pub fn accepts(&self, arguments: &[Argument]) -> bool {
        if arguments.len() < self.required_parameters || arguments.len() > self.parameters.len() {
            return false;
        }
        arguments
            .iter()
            .zip(&self.parameters)
            .all(|(argument, parameter)| parameter.matches(argument))
    }
}

/// Either a bare name resolved lazily against the root namespace (allowing
/// forward and self reference) or an inlined definition. The two states
/// stay statically distinguishable; resolution is an explicit step in the
/// validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassBinding {
    Defined(ClassDefinition),
    Named,
}

impl Default for ClassBinding {
    fn default() -> Self {
        ClassBinding::Named
    }
}

/// A class as declared inside another class: name, how often it may occur,
/// whether it can be instantiated, and its binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDeclaration {
    pub name: String,
    #[serde(default)]
    pub ordinality: Ordinality,
    #[serde(default)]
    pub class_type: ClassType,
    #[serde(default)]
    pub binding: ClassBinding,
}

impl ClassDeclaration {
    /// A bare reference to a class defined elsewhere.
    pub fn reference(name: impl Into<String>, ordinality: Ordinality) -> Self {
        Self {
            name: name.into(),
            ordinality,
            class_type: ClassType::Concrete,
            binding: ClassBinding::Named,
        }
    }

    /// An inlined definition.
    pub fn defined(definition: ClassDefinition, ordinality: Ordinality) -> Self {
        Self {
            name: definition.name.clone(),
            ordinality,
            class_type: ClassType::Concrete,
            binding: ClassBinding::Defined(definition),
        }
    }

    pub fn abstract_class(mut self) -> Self {
        self.class_type = ClassType::Abstract;
        self
    }
}

/// The schema description of one object kind. Member names are unique
/// within their sorted containers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassDefinition {
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDeclaration>,
    #[serde(default)]
    pub base_classes: BTreeMap<String, ClassDeclaration>,
    #[serde(default)]
    pub inner_classes: BTreeMap<String, ClassDeclaration>,
}

impl ClassDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_property(mut self, declaration: PropertyDeclaration) -> Self {
        self.properties
            .insert(declaration.name.clone(), declaration);
        self
    }

    pub fn with_base(mut self, declaration: ClassDeclaration) -> Self {
        self.base_classes
            .insert(declaration.name.clone(), declaration);
        self
    }

    pub fn with_inner(mut self, declaration: ClassDeclaration) -> Self {
        self.inner_classes
            .insert(declaration.name.clone(), declaration);
        self
    }

    /// Load a schema from its JSON form.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
