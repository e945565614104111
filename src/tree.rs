//! The script tree: objects, properties, and typed argument values
//!
//! Nodes own their children exclusively and never hold back-pointers;
//! parents are reported by the traversal iterators as borrows only.

use crate::types::{Color, Vector2};
use std::collections::VecDeque;
use std::fmt;

/// One typed value attached to a property. Exactly one variant is live.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Boolean(bool),
    Color(Color),
    Enumerable(String),
    FloatingPoint(f32),
    Integer(i32),
    String(String),
    Vector2(Vector2),
}

impl Argument {
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Argument::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            Argument::Color(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_enumerable(&self) -> Option<&str> {
        match self {
            Argument::Enumerable(value) => Some(value),
            _ => None,
        }
    }

    /// Floating-point reads also accept integers, mirroring the parameter
    /// typing rule used by validation.
    pub fn as_floating_point(&self) -> Option<f32> {
        match self {
            Argument::FloatingPoint(value) => Some(*value),
            Argument::Integer(value) => Some(*value as f32),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Argument::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Argument::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_vector2(&self) -> Option<Vector2> {
        match self {
            Argument::Vector2(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Boolean(value) => write!(f, "{}", value),
            Argument::Color(value) => write!(f, "{}", value),
            Argument::Enumerable(value) => write!(f, "{}", value),
            Argument::FloatingPoint(value) => write!(f, "{}", value),
            Argument::Integer(value) => write!(f, "{}", value),
            Argument::String(value) => write!(f, "\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\"")),
            Argument::Vector2(value) => write!(f, "{}", value),
        }
    }
}

/// A named, ordered list of argument values.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyNode {
    pub name: String,
    pub arguments: Vec<Argument>,
}

impl PropertyNode {
    pub fn new(name: impl Into<String>, arguments: Vec<Argument>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }
}

/// One named block in a script. Owns its properties and children.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectNode {
    pub name: String,
    pub selector: Option<String>,
    pub properties: Vec<PropertyNode>,
    pub children: Vec<ObjectNode>,
}

impl ObjectNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: None,
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn properties(&self) -> &[PropertyNode] {
        &self.properties
    }

    pub fn children(&self) -> &[ObjectNode] {
        &self.children
    }

    pub fn property(&self, name: &str) -> Option<&PropertyNode> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// One step of a traversal. The parent borrow lives only as long as the
/// iterator; nothing is ever stored back on the nodes.
#[derive(Debug, Clone, Copy)]
pub struct Visit<'a> {
    pub node: &'a ObjectNode,
    pub parent: Option<&'a ObjectNode>,
    pub depth: usize,
}

/// The owned object forest produced by one compile call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptTree {
    objects: Vec<ObjectNode>,
}

impl ScriptTree {
    pub fn new(objects: Vec<ObjectNode>) -> Self {
        Self { objects }
    }

    pub fn objects(&self) -> &[ObjectNode] {
        &self.objects
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Level-order traversal; top-level objects sit at depth 0.
    pub fn breadth_first(&self) -> BreadthFirst<'_> {
        BreadthFirst {
            queue: self
                .objects
                .iter()
                .map(|node| Visit {
                    node,
                    parent: None,
                    depth: 0,
                })
                .collect(),
        }
    }

    /// Node before children; the printing order.
    pub fn depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            stack: self
                .objects
                .iter()
                .rev()
                .map(|node| Visit {
                    node,
                    parent: None,
                    depth: 0,
                })
                .collect(),
        }
    }

    /// Children before node; the serialization order, so child records are
    /// written before the object record that consumes them.
    pub fn depth_first_post(&self) -> DepthFirstPost<'_> {
        DepthFirstPost {
            stack: self
                .objects
                .iter()
                .rev()
                .map(|node| Frame {
                    visit: Visit {
                        node,
                        parent: None,
                        depth: 0,
                    },
                    expanded: false,
                })
                .collect(),
        }
    }

    /// Dotted path from the root to `object`, matched by node identity
    /// (names are not unique). `None` when the node is not in this tree.
    pub fn fully_qualified_name(
        &self,
        object: &ObjectNode,
        property: Option<&PropertyNode>,
    ) -> Option<String> {
        let mut path = Vec::new();
        if !Self::descend(&self.objects, object, &mut path) {
            return None;
        }
        if let Some(property) = property {
            if !object.properties.iter().any(|p| std::ptr::eq(p, property)) {
                return None;
            }
            path.push(property.name.clone());
        }
        Some(path.join("."))
    }

    fn descend(nodes: &[ObjectNode], target: &ObjectNode, path: &mut Vec<String>) -> bool {
        for node in nodes {
            path.push(node.name.clone());
            if std::ptr::eq(node, target) || Self::descend(&node.children, target, path) {
                return true;
            }
            path.pop();
        }
        false
    }

    /// Inverse of `fully_qualified_name`: walk a dotted path down the
    /// forest, taking the first name match at each level.
    pub fn find_object(&self, path: &str) -> Option<&ObjectNode> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.objects.iter().find(|o| o.name == first)?;
        for segment in segments {
            current = current.children.iter().find(|o| o.name == segment)?;
        }
        Some(current)
    }
}

pub struct BreadthFirst<'a> {
    queue: VecDeque<Visit<'a>>,
}

impl<'a> Iterator for BreadthFirst<'a> {
    type Item = Visit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let visit = self.queue.pop_front()?;
        for child in &visit.node.children {
            self.queue.push_back(Visit {
                node: child,
                parent: Some(visit.node),
                depth: visit.depth + 1,
            });
        }
        Some(visit)
    }
}

pub struct DepthFirst<'a> {
    stack: Vec<Visit<'a>>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = Visit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let visit = self.stack.pop()?;
        for child in visit.node.children.iter().rev() {
            self.stack.push(Visit {
                node: child,
                parent: Some(visit.node),
                depth: visit.depth + 1,
            });
        }
        Some(visit)
    }
}

struct Frame<'a> {
    visit: Visit<'a>,
    expanded: bool,
}

pub struct DepthFirstPost<'a> {
    stack: Vec<Frame<'a>>,
}

impl<'a> Iterator for DepthFirstPost<'a> {
    type Item = Visit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            if top.expanded {
                let frame = self.stack.pop()?;
                return Some(frame.visit);
            }
            top.expanded = true;
            let visit = top.visit;
            for child in visit.node.children.iter().rev() {
                self.stack.push(Frame {
                    visit: Visit {
                        node: child,
                        parent: Some(visit.node),
                        depth: visit.depth + 1,
                    },
                    expanded: false,
                });
            }
        }
    }
}

impl fmt::Display for ScriptTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_object(
            f: &mut fmt::Formatter<'_>,
            object: &ObjectNode,
            depth: usize,
        ) -> fmt::Result {
            let pad = "    ".repeat(depth);
            write!(f, "{}{}", pad, object.name)?;
            if let Some(selector) = &object.selector {
                write!(f, " \"{}\"", selector)?;
            }
            writeln!(f, " {{")?;
            for property in &object.properties {
                write!(f, "{}    {}: ", pad, property.name)?;
                for (i, argument) in property.arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", argument)?;
                }
                writeln!(f, ";")?;
            }
            for child in &object.children {
                write_object(f, child, depth + 1)?;
            }
            writeln!(f, "{}}}", pad)
        }

        for object in &self.objects {
            write_object(f, object, 0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> ScriptTree {
        // a { p: 1; b { } c { } }  d { }
        let mut a = ObjectNode::new("a");
        a.properties.push(PropertyNode::new("p", vec![Argument::Integer(1)]));
        a.children.push(ObjectNode::new("b"));
        a.children.push(ObjectNode::new("c"));
        let d = ObjectNode::new("d");
        ScriptTree::new(vec![a, d])
    }

    #[test]
    fn test_breadth_first_order() {
        let tree = sample_tree();
        let names: Vec<(&str, usize)> = tree
            .breadth_first()
            .map(|v| (v.node.name.as_str(), v.depth))
            .collect();
        assert_eq!(names, vec![("a", 0), ("d", 0), ("b", 1), ("c", 1)]);
    }

    #[test]
    fn test_depth_first_preorder() {
        let tree = sample_tree();
        let names: Vec<&str> = tree.depth_first().map(|v| v.node.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_depth_first_postorder() {
        let tree = sample_tree();
        let names: Vec<&str> = tree
            .depth_first_post()
            .map(|v| v.node.name.as_str())
            .collect();
        assert_eq!(names, vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn test_parents_are_reported() {
        let tree = sample_tree();
        let visit = tree
            .breadth_first()
            .find(|v| v.node.name == "b")
            .unwrap();
        assert_eq!(visit.parent.unwrap().name, "a");
        assert!(tree.breadth_first().next().unwrap().parent.is_none());
    }

    #[test]
    fn test_fully_qualified_name_by_identity() {
        let tree = sample_tree();
        let a = &tree.objects()[0];
        let b = &a.children[0];
        assert_eq!(tree.fully_qualified_name(b, None).unwrap(), "a.b");

        let p = &a.properties[0];
        assert_eq!(tree.fully_qualified_name(a, Some(p)).unwrap(), "a.p");

        // A structurally equal node that is not in the tree finds nothing
        let stranger = ObjectNode::new("b");
        assert!(tree.fully_qualified_name(&stranger, None).is_none());
    }

    #[test]
    fn test_find_object() {
        let tree = sample_tree();
        assert_eq!(tree.find_object("a.c").unwrap().name, "c");
        assert!(tree.find_object("a.x").is_none());
        assert!(tree.find_object("x").is_none());
    }

    #[test]
    fn test_display_is_relexable() {
        let tree = sample_tree();
        let printed = tree.to_string();
        assert!(printed.contains("a {"));
        assert!(printed.contains("p: 1;"));

        let mut lexer = crate::lexer::Lexer::new(&printed, "printed.ion".to_string());
        assert!(lexer.tokenize().is_ok());
    }

    #[test]
    fn test_typed_accessors() {
        assert_eq!(Argument::Integer(3).as_integer(), Some(3));
        assert_eq!(Argument::Integer(3).as_floating_point(), Some(3.0));
        assert_eq!(Argument::Boolean(true).as_integer(), None);
        assert_eq!(
            Argument::String("x".into()).as_string(),
            Some("x")
        );
    }
}
