use std::collections::HashSet;
use tagscope_core::extract::{TagEvent, TagKind, TagSink};
use tree_sitter::{Node, Tree};

/// Declarations whose `name` field is the defined tag.
const NAMED_DECLARATIONS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
    "annotation_type_declaration",
    "method_declaration",
    "constructor_declaration",
    "compact_constructor_declaration",
    "annotation_type_element_declaration",
    "enum_constant",
];

/// Declarations defining one tag per `declarator`.
const DECLARATOR_LISTS: &[&str] = &["field_declaration", "constant_declaration"];

const NAME_NODES: &[&str] = &["identifier", "type_identifier"];

struct Walk<'a, 's> {
    source: &'a str,
    lines: Vec<&'a str>,
    sink: &'s mut dyn TagSink,
    /// Name nodes already reported as definitions.
    defined: HashSet<usize>,
    emitted: usize,
}

impl Walk<'_, '_> {
    fn emit(&mut self, node: Node, kind: TagKind) {
        let Ok(tag) = node.utf8_text(self.source.as_bytes()) else {
            return;
        };
        let row = node.start_position().row;
        let image = self
            .lines
            .get(row)
            .map(|l| l.trim_end_matches('\r'))
            .unwrap_or_default();
        self.sink.tag(TagEvent {
            kind,
            tag: tag.to_string(),
            line: row as u32 + 1,
            image: image.to_string(),
        });
        self.emitted += 1;
    }

    fn define(&mut self, name: Node) {
        self.defined.insert(name.id());
        self.emit(name, TagKind::Definition);
    }

    fn visit(&mut self, node: Node) {
        let line = node.start_position().row as u32 + 1;
        if node.is_error() {
            let snippet: String = node
                .utf8_text(self.source.as_bytes())
                .unwrap_or_default()
                .chars()
                .take(40)
                .collect();
            self.sink.warn(line, format!("syntax error near {:?}", snippet));
        } else if node.is_missing() {
            self.sink.warn(line, format!("missing {}", node.kind()));
            return;
        }

        let kind = node.kind();
        if NAMED_DECLARATIONS.contains(&kind) {
            if let Some(name) = node.child_by_field_name("name") {
                self.define(name);
            }
        } else if DECLARATOR_LISTS.contains(&kind) {
            let mut cursor = node.walk();
            let names: Vec<Node> = node
                .children_by_field_name("declarator", &mut cursor)
                .filter_map(|d| d.child_by_field_name("name"))
                .collect();
            for name in names {
                self.define(name);
            }
        } else if NAME_NODES.contains(&kind) && !self.defined.contains(&node.id()) {
            self.emit(node, TagKind::Reference);
        }
    }
}

/// Report every definition and name use in `tree`, in source order.
/// Returns the number of tags emitted.
pub(crate) fn walk(tree: &Tree, source: &str, sink: &mut dyn TagSink) -> usize {
    let mut walk = Walk {
        source,
        lines: source.lines().collect(),
        sink,
        defined: HashSet::new(),
        emitted: 0,
    };

    let mut cursor = tree.walk();
    loop {
        walk.visit(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return walk.emitted;
            }
        }
    }
}
