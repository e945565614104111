//! Inheritance-aware validation of script trees against a class schema
//!
//! The schema is borrowed read-only; all mutable state (the name
//! resolution cache) lives on the validator, so one schema can back any
//! number of concurrent validations. A single pass collects every
//! violation instead of stopping at the first.

use crate::error::{ValidateError, ValidateErrorKind};
use crate::schema::{
    ClassBinding, ClassDeclaration, ClassDefinition, ClassType, Ordinality, PropertyDeclaration,
};
use crate::tree::{ObjectNode, ScriptTree};
use std::collections::{BTreeSet, HashMap, HashSet};

pub struct Validator<'a> {
    root: &'a ClassDefinition,
    // Named bindings resolve against the root namespace at most once per
    // validator; negative results are cached too.
    resolved: HashMap<String, Option<&'a ClassDefinition>>,
}

impl<'a> Validator<'a> {
    /// `root` is the implicit scope for the tree's top-level objects.
    pub fn new(root: &'a ClassDefinition) -> Self {
        Self {
            root,
            resolved: HashMap::new(),
        }
    }

    /// Walk the whole tree and report every schema violation found. An
    /// empty result means the tree conforms.
    pub fn validate(&mut self, tree: &ScriptTree) -> Vec<ValidateError> {
        let mut errors = Vec::new();
        self.validate_scope(self.root, tree.objects(), "", &mut errors);
        errors
    }

    fn validate_scope(
        &mut self,
        class: &'a ClassDefinition,
        objects: &[ObjectNode],
        parent_path: &str,
        errors: &mut Vec<ValidateError>,
    ) {
        let mut unseen_required = self.required_class_names(class);

        for object in objects {
            let path = join_path(parent_path, &object.name);
            // An object counts as seen even when its own validation fails,
            // so one bad instance does not also report the class missing.
            unseen_required.remove(&object.name);

            let declarations = self.class_declarations(class, &object.name);
            if declarations.is_empty() {
                errors.push(ValidateError::new(ValidateErrorKind::UnexpectedClass, path));
                continue;
            }
            if declarations.len() > 1 {
                errors.push(ValidateError::new(ValidateErrorKind::AmbiguousClass, path));
                continue;
            }
            let declaration = declarations[0];
            if declaration.class_type == ClassType::Abstract {
                errors.push(ValidateError::new(
                    ValidateErrorKind::AbstractClassInstantiated,
                    path,
                ));
                continue;
            }
            let Some(definition) = self.definition_of(declaration) else {
                // Declared by name but defined nowhere in the schema; the
                // subtree cannot be checked against anything.
                errors.push(ValidateError::new(ValidateErrorKind::UnexpectedClass, path));
                continue;
            };

            self.validate_properties(definition, object, &path, errors);
            self.validate_scope(definition, &object.children, &path, errors);
        }

        for name in unseen_required {
            errors.push(ValidateError::new(
                ValidateErrorKind::MissingRequiredClass,
                join_path(parent_path, &name),
            ));
        }
    }

    fn validate_properties(
        &mut self,
        class: &'a ClassDefinition,
        object: &ObjectNode,
        path: &str,
        errors: &mut Vec<ValidateError>,
    ) {
        let mut unseen_required = self.required_property_names(class);

        for property in object.properties() {
            unseen_required.remove(&property.name);
            let property_path = join_path(path, &property.name);

            let overloads = self.property_declarations(class, &property.name);
            if overloads.is_empty() {
                errors.push(ValidateError::new(
                    ValidateErrorKind::UnexpectedProperty,
                    property_path,
                ));
                continue;
            }
            if !overloads.iter().any(|o| o.accepts(&property.arguments)) {
                errors.push(ValidateError::new(
                    ValidateErrorKind::InvalidPropertyArguments,
                    property_path,
                ));
            }
        }

        for name in unseen_required {
            errors.push(ValidateError::new(
                ValidateErrorKind::MissingRequiredProperty,
                join_path(path, &name),
            ));
        }
    }

    /// Declarations of `name` visible from `class`: every declaration at
    /// the smallest inheritance depth that has one. Nearer declarations
    /// shadow farther ones; two at the same depth are an ambiguity the
    /// caller reports. Each ancestor is visited once even when the
    /// hierarchy reaches it along several paths.
    fn class_declarations(
        &mut self,
        class: &'a ClassDefinition,
        name: &str,
    ) -> Vec<&'a ClassDeclaration> {
        let mut found = Vec::new();
        let mut visited = HashSet::new();
        self.collect_class_declarations(class, name, 0, &mut visited, &mut found);
        min_depth(found)
    }

    fn collect_class_declarations(
        &mut self,
        class: &'a ClassDefinition,
        name: &str,
        depth: usize,
        visited: &mut HashSet<&'a str>,
        found: &mut Vec<(&'a ClassDeclaration, usize)>,
    ) {
        if !visited.insert(&class.name) {
            return;
        }
        if let Some(declaration) = class.inner_classes.get(name) {
            found.push((declaration, depth));
        }
        for base in class.base_classes.values() {
            if let Some(definition) = self.definition_of(base) {
                self.collect_class_declarations(definition, name, depth + 1, visited, found);
            }
        }
    }

    fn property_declarations(
        &mut self,
        class: &'a ClassDefinition,
        name: &str,
    ) -> Vec<&'a PropertyDeclaration> {
        let mut found = Vec::new();
        let mut visited = HashSet::new();
        self.collect_property_declarations(class, name, 0, &mut visited, &mut found);
        min_depth(found)
    }

    fn collect_property_declarations(
        &mut self,
        class: &'a ClassDefinition,
        name: &str,
        depth: usize,
        visited: &mut HashSet<&'a str>,
        found: &mut Vec<(&'a PropertyDeclaration, usize)>,
    ) {
        if !visited.insert(&class.name) {
            return;
        }
        if let Some(declaration) = class.properties.get(name) {
            found.push((declaration, depth));
        }
        for base in class.base_classes.values() {
            if let Some(definition) = self.definition_of(base) {
                self.collect_property_declarations(definition, name, depth + 1, visited, found);
            }
        }
    }

    /// Inner-class names whose visible declaration is mandatory, own or
    /// inherited.
    fn required_class_names(&mut self, class: &'a ClassDefinition) -> BTreeSet<String> {
        let names = self.visible_names(class, |c| c.inner_classes.keys());
        names
            .into_iter()
            .filter(|name| {
                self.class_declarations(class, name)
                    .iter()
                    .any(|d| d.ordinality == Ordinality::Mandatory)
            })
            .collect()
    }

    fn required_property_names(&mut self, class: &'a ClassDefinition) -> BTreeSet<String> {
        let names = self.visible_names(class, |c| c.properties.keys());
        names
            .into_iter()
            .filter(|name| {
                self.property_declarations(class, name)
                    .iter()
                    .any(|d| d.ordinality == Ordinality::Mandatory)
            })
            .collect()
    }

    fn visible_names<F, I>(&mut self, class: &'a ClassDefinition, member_names: F) -> BTreeSet<String>
    where
        F: Fn(&'a ClassDefinition) -> I,
        I: Iterator<Item = &'a String>,
    {
        let mut names = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut stack = vec![class];
        while let Some(current) = stack.pop() {
            if !visited.insert(current.name.as_str()) {
                continue;
            }
            names.extend(member_names(current).cloned());
            for base in current.base_classes.values() {
                if let Some(definition) = self.definition_of(base) {
                    stack.push(definition);
                }
            }
        }
        names
    }

    fn definition_of(&mut self, declaration: &'a ClassDeclaration) -> Option<&'a ClassDefinition> {
        match &declaration.binding {
            ClassBinding::Defined(definition) => Some(definition),
            ClassBinding::Named => self.resolve(&declaration.name),
        }
    }

    fn resolve(&mut self, name: &str) -> Option<&'a ClassDefinition> {
        if let Some(cached) = self.resolved.get(name) {
            return *cached;
        }
        let found = find_definition(self.root, name);
        self.resolved.insert(name.to_string(), found);
        found
    }
}

/// Depth-first search of the schema for an inlined definition of `name`.
/// The root definition itself is a candidate, which is what makes bare
/// self- and forward references work.
fn find_definition<'a>(class: &'a ClassDefinition, name: &str) -> Option<&'a ClassDefinition> {
    if class.name == name {
        return Some(class);
    }
    class
        .inner_classes
        .values()
        .chain(class.base_classes.values())
        .find_map(|declaration| match &declaration.binding {
            ClassBinding::Defined(definition) => find_definition(definition, name),
            ClassBinding::Named => None,
        })
}

fn min_depth<T>(found: Vec<(T, usize)>) -> Vec<T> {
    let Some(nearest) = found.iter().map(|(_, depth)| *depth).min() else {
        return Vec::new();
    };
    found
        .into_iter()
        .filter(|(_, depth)| *depth == nearest)
        .map(|(declaration, _)| declaration)
        .collect()
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ParameterType;
    use crate::tree::{Argument, PropertyNode};

    fn object(name: &str) -> ObjectNode {
        ObjectNode::new(name)
    }

    fn with_property(mut node: ObjectNode, name: &str, arguments: Vec<Argument>) -> ObjectNode {
        node.properties.push(PropertyNode::new(name, arguments));
        node
    }

    fn with_child(mut node: ObjectNode, child: ObjectNode) -> ObjectNode {
        node.children.push(child);
        node
    }

    fn kinds(errors: &[ValidateError]) -> Vec<ValidateErrorKind> {
        errors.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_conforming_tree_has_no_errors() {
        let schema = ClassDefinition::new("root").with_inner(ClassDeclaration::defined(
            ClassDefinition::new("foo").with_property(
                PropertyDeclaration::new("name", Ordinality::Mandatory)
                    .with_parameters(vec![ParameterType::String]),
            ),
            Ordinality::Optional,
        ));
        let tree = ScriptTree::new(vec![with_property(
            object("foo"),
            "name",
            vec![Argument::String("x".into())],
        )]);

        assert!(Validator::new(&schema).validate(&tree).is_empty());
    }

    #[test]
    fn test_missing_required_property_names_member_path() {
        let schema = ClassDefinition::new("root").with_inner(ClassDeclaration::defined(
            ClassDefinition::new("foo").with_property(
                PropertyDeclaration::new("name", Ordinality::Mandatory)
                    .with_parameters(vec![ParameterType::String]),
            ),
            Ordinality::Optional,
        ));
        let tree = ScriptTree::new(vec![object("foo")]);

        let errors = Validator::new(&schema).validate(&tree);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidateErrorKind::MissingRequiredProperty);
        assert_eq!(errors[0].fully_qualified_name, "foo.name");
    }

    #[test]
    fn test_missing_required_class() {
        let schema = ClassDefinition::new("root").with_inner(
            ClassDeclaration::defined(ClassDefinition::new("menu"), Ordinality::Mandatory),
        );
        let errors = Validator::new(&schema).validate(&ScriptTree::new(vec![]));
        assert_eq!(
            errors,
            vec![ValidateError::new(
                ValidateErrorKind::MissingRequiredClass,
                "menu"
            )]
        );
    }

    #[test]
    fn test_unexpected_class_skips_subtree() {
        let schema = ClassDefinition::new("root").with_inner(
            ClassDeclaration::defined(ClassDefinition::new("known"), Ordinality::Optional),
        );
        // The stranger's child would also be unexpected, but the subtree
        // is skipped after the first failure.
        let tree = ScriptTree::new(vec![with_child(object("stranger"), object("inner"))]);

        let errors = Validator::new(&schema).validate(&tree);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidateErrorKind::UnexpectedClass);
        assert_eq!(errors[0].fully_qualified_name, "stranger");
    }

    #[test]
    fn test_failed_instance_still_counts_as_seen() {
        let abstract_base = ClassDeclaration::defined(
            ClassDefinition::new("widget"),
            Ordinality::Mandatory,
        )
        .abstract_class();
        let schema = ClassDefinition::new("root").with_inner(abstract_base);
        let tree = ScriptTree::new(vec![object("widget")]);

        let errors = Validator::new(&schema).validate(&tree);
        // Abstract instantiation is reported, but not a second error for
        // the mandatory class being absent.
        assert_eq!(
            kinds(&errors),
            vec![ValidateErrorKind::AbstractClassInstantiated]
        );
    }

    #[test]
    fn test_derived_declaration_shadows_base() {
        // base and derived both declare "size"; only derived's string
        // overload is visible from derived, so no ambiguity arises.
        let base = ClassDefinition::new("base").with_property(
            PropertyDeclaration::new("size", Ordinality::Optional)
                .with_parameters(vec![ParameterType::Integer]),
        );
        let derived = ClassDefinition::new("derived")
            .with_base(ClassDeclaration::defined(base, Ordinality::Optional))
            .with_property(
                PropertyDeclaration::new("size", Ordinality::Optional)
                    .with_parameters(vec![ParameterType::String]),
            );
        let schema = ClassDefinition::new("root")
            .with_inner(ClassDeclaration::defined(derived, Ordinality::Optional));

        let good = ScriptTree::new(vec![with_property(
            object("derived"),
            "size",
            vec![Argument::String("big".into())],
        )]);
        assert!(Validator::new(&schema).validate(&good).is_empty());

        // The shadowed integer overload is no longer reachable
        let bad = ScriptTree::new(vec![with_property(
            object("derived"),
            "size",
            vec![Argument::Integer(3)],
        )]);
        let errors = Validator::new(&schema).validate(&bad);
        assert_eq!(
            kinds(&errors),
            vec![ValidateErrorKind::InvalidPropertyArguments]
        );
    }

    #[test]
    fn test_diamond_ancestor_contributes_once() {
        // d inherits a through both b and c; a's declaration of "leaf"
        // must not be counted twice.
        let a = ClassDefinition::new("a").with_inner(ClassDeclaration::defined(
            ClassDefinition::new("leaf"),
            Ordinality::Optional,
        ));
        let b = ClassDefinition::new("b")
            .with_base(ClassDeclaration::reference("a", Ordinality::Optional));
        let c = ClassDefinition::new("c")
            .with_base(ClassDeclaration::reference("a", Ordinality::Optional));
        let d = ClassDefinition::new("d")
            .with_base(ClassDeclaration::defined(b, Ordinality::Optional))
            .with_base(ClassDeclaration::defined(c, Ordinality::Optional));
        let schema = ClassDefinition::new("root")
            .with_inner(ClassDeclaration::defined(a, Ordinality::Optional))
            .with_inner(ClassDeclaration::defined(d, Ordinality::Optional));

        let tree = ScriptTree::new(vec![with_child(object("d"), object("leaf"))]);
        assert!(Validator::new(&schema).validate(&tree).is_empty());
    }

    #[test]
    fn test_same_depth_declarations_are_ambiguous() {
        // Two unrelated bases each declare "leaf" at the same depth.
        let b = ClassDefinition::new("b").with_inner(ClassDeclaration::defined(
            ClassDefinition::new("leaf"),
            Ordinality::Optional,
        ));
        let c = ClassDefinition::new("c").with_inner(ClassDeclaration::defined(
            ClassDefinition::new("leaf"),
            Ordinality::Optional,
        ));
        let d = ClassDefinition::new("d")
            .with_base(ClassDeclaration::defined(b, Ordinality::Optional))
            .with_base(ClassDeclaration::defined(c, Ordinality::Optional));
        let schema = ClassDefinition::new("root")
            .with_inner(ClassDeclaration::defined(d, Ordinality::Optional));

        let tree = ScriptTree::new(vec![with_child(object("d"), object("leaf"))]);
        let errors = Validator::new(&schema).validate(&tree);
        assert_eq!(kinds(&errors), vec![ValidateErrorKind::AmbiguousClass]);
        assert_eq!(errors[0].fully_qualified_name, "d.leaf");
    }

    #[test]
    fn test_named_binding_allows_recursion() {
        // menu contains menus, declared by bare name before (and inside)
        // its own definition.
        let menu = ClassDefinition::new("menu")
            .with_inner(ClassDeclaration::reference("menu", Ordinality::Optional));
        let schema = ClassDefinition::new("root")
            .with_inner(ClassDeclaration::defined(menu, Ordinality::Optional));

        let tree = ScriptTree::new(vec![with_child(
            object("menu"),
            with_child(object("menu"), object("menu")),
        )]);
        assert!(Validator::new(&schema).validate(&tree).is_empty());
    }

    #[test]
    fn test_unresolvable_named_binding_is_unexpected() {
        let schema = ClassDefinition::new("root")
            .with_inner(ClassDeclaration::reference("ghost", Ordinality::Optional));
        let tree = ScriptTree::new(vec![object("ghost")]);

        let errors = Validator::new(&schema).validate(&tree);
        assert_eq!(kinds(&errors), vec![ValidateErrorKind::UnexpectedClass]);
    }

    #[test]
    fn test_all_errors_collected_in_one_pass() {
        let schema = ClassDefinition::new("root").with_inner(ClassDeclaration::defined(
            ClassDefinition::new("foo").with_property(
                PropertyDeclaration::new("name", Ordinality::Mandatory)
                    .with_parameters(vec![ParameterType::String]),
            ),
            Ordinality::Optional,
        ));
        let foo = with_property(object("foo"), "rogue", vec![Argument::Integer(1)]);
        let tree = ScriptTree::new(vec![foo, object("bar")]);

        let errors = Validator::new(&schema).validate(&tree);
        let found = kinds(&errors);
        assert!(found.contains(&ValidateErrorKind::UnexpectedProperty));
        assert!(found.contains(&ValidateErrorKind::MissingRequiredProperty));
        assert!(found.contains(&ValidateErrorKind::UnexpectedClass));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_property_overloads_by_arity() {
        let schema = ClassDefinition::new("root").with_inner(ClassDeclaration::defined(
            ClassDefinition::new("pane").with_property(
                PropertyDeclaration::new("pad", Ordinality::Optional)
                    .with_optional_parameters(
                        vec![ParameterType::Integer, ParameterType::Integer],
                        1,
                    ),
            ),
            Ordinality::Optional,
        ));

        let one = ScriptTree::new(vec![with_property(
            object("pane"),
            "pad",
            vec![Argument::Integer(4)],
        )]);
        assert!(Validator::new(&schema).validate(&one).is_empty());

        let three = ScriptTree::new(vec![with_property(
            object("pane"),
            "pad",
            vec![
                Argument::Integer(4),
                Argument::Integer(4),
                Argument::Integer(4),
            ],
        )]);
        let errors = Validator::new(&schema).validate(&three);
        assert_eq!(
            kinds(&errors),
            vec![ValidateErrorKind::InvalidPropertyArguments]
        );
    }

    #[test]
    fn test_validation_is_repeatable() {
        let schema = ClassDefinition::new("root").with_inner(ClassDeclaration::defined(
            ClassDefinition::new("menu")
                .with_inner(ClassDeclaration::reference("menu", Ordinality::Optional)),
            Ordinality::Optional,
        ));
        let tree = ScriptTree::new(vec![with_child(object("menu"), object("menu"))]);

        let mut validator = Validator::new(&schema);
        let first = validator.validate(&tree);
        let second = validator.validate(&tree);
        assert_eq!(first, second);
        assert!(first.is_empty());
    }
}
