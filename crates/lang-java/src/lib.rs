//! Java tag extraction on top of tree-sitter.

mod walker;

use std::path::Path;
use tagscope_core::error::{Result, TagscopeError};
use tagscope_core::extract::{Extractor, TagSink};
use tree_sitter::Parser;

pub struct JavaTagger {
    language: tree_sitter::Language,
}

impl JavaTagger {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_java::LANGUAGE.into(),
        }
    }
}

impl Default for JavaTagger {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for JavaTagger {
    fn name(&self) -> &str {
        "java"
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "java")
    }

    fn extract(&self, path: &Path, source: &str, sink: &mut dyn TagSink) -> Result<()> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| TagscopeError::Parsing(e.to_string()))?;
        let tree = parser.parse(source, None).ok_or_else(|| {
            TagscopeError::Parsing(format!("failed to parse {}", path.display()))
        })?;
        let emitted = walker::walk(&tree, source, sink);
        tracing::trace!("{}: {} tags", path.display(), emitted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagscope_core::extract::{CollectingSink, TagKind};

    fn extract(source: &str) -> CollectingSink {
        let mut sink = CollectingSink::default();
        JavaTagger::new()
            .extract(Path::new("Test.java"), source, &mut sink)
            .unwrap();
        sink
    }

    fn tags(sink: &CollectingSink, kind: TagKind) -> Vec<(String, u32)> {
        sink.events
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| (e.tag.clone(), e.line))
            .collect()
    }

    #[test]
    fn accepts_only_java_files() {
        let tagger = JavaTagger::new();
        assert!(tagger.accepts(Path::new("src/Main.java")));
        assert!(!tagger.accepts(Path::new("build.gradle")));
        assert!(!tagger.accepts(Path::new("java")));
    }

    #[test]
    fn class_members_are_definitions() {
        let source = "package demo;\n\
                      \n\
                      public class Greeter {\n\
                      \x20   private String name;\n\
                      \x20   public Greeter(String name) { this.name = name; }\n\
                      \x20   public String greet() { return format(name); }\n\
                      }\n";
        let sink = extract(source);

        assert_eq!(
            tags(&sink, TagKind::Definition),
            vec![
                ("Greeter".to_string(), 3),
                ("name".to_string(), 4),
                ("Greeter".to_string(), 5),
                ("greet".to_string(), 6),
            ]
        );

        let refs = tags(&sink, TagKind::Reference);
        assert!(refs.contains(&("format".to_string(), 6)));
        assert!(refs.contains(&("String".to_string(), 4)));
        assert!(refs.contains(&("name".to_string(), 6)));
        assert!(!refs.iter().any(|(tag, _)| tag == "greet"));
        assert!(sink.warnings.is_empty());
    }

    #[test]
    fn images_are_whole_source_lines() {
        let sink = extract("class A {\r\n  void run() {}\r\n}\r\n");
        let run = sink.events.iter().find(|e| e.tag == "run").unwrap();
        assert_eq!(run.line, 2);
        assert_eq!(run.image, "  void run() {}");
    }

    #[test]
    fn other_declaration_kinds() {
        let source = "enum Color { RED, GREEN; }\n\
                      record Point(int x, int y) {}\n\
                      @interface Marker { String value(); }\n\
                      interface Limits { int MAX = 3; void run(); }\n";
        let sink = extract(source);
        let defs: Vec<String> = tags(&sink, TagKind::Definition)
            .into_iter()
            .map(|(tag, _)| tag)
            .collect();
        assert_eq!(
            defs,
            vec!["Color", "RED", "GREEN", "Point", "Marker", "value", "Limits", "MAX", "run"]
        );
    }

    #[test]
    fn syntax_errors_become_warnings() {
        let sink = extract("class Broken {\n  void f( {\n}\n");
        assert!(!sink.warnings.is_empty());
        assert!(sink.warnings.iter().all(|(line, _)| *line >= 1));
    }
}
