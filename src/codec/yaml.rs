use std::collections::HashMap;
use std::ops::Range;

use yaml_rust::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust::scanner::{Marker, TScalarStyle};

use super::node::{Mark, Node, ScalarNode, ScalarStyle};
use super::{CodecError, DocumentCodec, Edit};

/// YAML implementation of the format-preserving codec.
///
/// Loading runs the yaml-rust parser in marked-event mode and builds a tree
/// that records, for every scalar, the character position and quoting style
/// it had in the source. Patching uses those positions to splice replacement
/// values directly into the original text, so everything the parser would
/// normally discard (comments, custom tags, indentation, key order) survives
/// untouched.
pub struct YamlCodec;

impl DocumentCodec for YamlCodec {
    fn load(&self, text: &str) -> Result<Vec<Node>, CodecError> {
        let mut parser = Parser::new(text.chars());
        let mut builder = TreeBuilder::default();
        parser
            .load(&mut builder, true)
            .map_err(|e| CodecError(e.to_string()))?;
        if let Some(msg) = builder.error {
            return Err(CodecError(msg));
        }
        Ok(builder.docs)
    }

    fn patch(&self, text: &str, edits: &[Edit]) -> Result<String, CodecError> {
        // Character index -> byte offset, with a trailing sentinel.
        let mut offsets: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        offsets.push(text.len());

        // Apply back-to-front so earlier byte ranges stay valid.
        let mut ordered: Vec<&Edit> = edits.iter().collect();
        ordered.sort_by(|a, b| b.target.mark.index.cmp(&a.target.mark.index));

        let mut out = text.to_string();
        let mut previous: Option<&Edit> = None;
        for edit in ordered {
            // Aliased records clone the anchored node, so several edits can
            // target the same source span. Identical replacements collapse to
            // one splice; conflicting ones make the file unpatchable.
            if let Some(prev) = previous {
                if prev.target.mark.index == edit.target.mark.index {
                    if prev.replacement == edit.replacement {
                        continue;
                    }
                    return Err(CodecError(format!(
                        "'{}' and '{}' target the same scalar with different replacements",
                        edit.key, prev.key
                    )));
                }
            }
            let (range, style) = locate_scalar(text, &offsets, &edit.target).map_err(|reason| {
                CodecError(format!(
                    "'{}' at line {}: {}",
                    edit.key, edit.target.mark.line, reason
                ))
            })?;
            out.replace_range(range, &render_scalar(&edit.replacement, style));
            previous = Some(edit);
        }
        Ok(out)
    }
}

#[derive(Default)]
struct TreeBuilder {
    docs: Vec<Node>,
    stack: Vec<Container>,
    anchors: HashMap<usize, Node>,
    error: Option<String>,
}

enum Container {
    Seq {
        items: Vec<Node>,
        anchor: usize,
    },
    Map {
        entries: Vec<(String, Node)>,
        pending_key: Option<String>,
        anchor: usize,
    },
}

impl TreeBuilder {
    fn insert(&mut self, node: Node, anchor: usize) {
        if anchor > 0 {
            self.anchors.insert(anchor, node.clone());
        }
        match self.stack.last_mut() {
            None => self.docs.push(node),
            Some(Container::Seq { items, .. }) => items.push(node),
            Some(Container::Map {
                entries,
                pending_key,
                ..
            }) => match pending_key.take() {
                Some(key) => entries.push((key, node)),
                None => match node {
                    Node::Scalar(s) => *pending_key = Some(s.value),
                    _ => self.fail("complex mapping keys are not supported"),
                },
            },
        }
    }

    fn in_key_position(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(Container::Map {
                pending_key: None,
                ..
            })
        )
    }

    fn fail(&mut self, msg: &str) {
        if self.error.is_none() {
            self.error = Some(msg.to_string());
        }
    }
}

impl MarkedEventReceiver for TreeBuilder {
    fn on_event(&mut self, ev: Event, mark: Marker) {
        if self.error.is_some() {
            return;
        }
        match ev {
            Event::Scalar(value, style, anchor, _tag) => {
                let node = Node::Scalar(ScalarNode {
                    value,
                    style: convert_style(style),
                    mark: Mark {
                        index: mark.index(),
                        line: mark.line(),
                        col: mark.col(),
                    },
                });
                self.insert(node, anchor);
            }
            Event::SequenceStart(anchor) => {
                if self.in_key_position() {
                    self.fail("complex mapping keys are not supported");
                    return;
                }
                self.stack.push(Container::Seq {
                    items: Vec::new(),
                    anchor,
                });
            }
            Event::SequenceEnd => {
                if let Some(Container::Seq { items, anchor }) = self.stack.pop() {
                    self.insert(Node::Seq(items), anchor);
                }
            }
            Event::MappingStart(anchor) => {
                if self.in_key_position() {
                    self.fail("complex mapping keys are not supported");
                    return;
                }
                self.stack.push(Container::Map {
                    entries: Vec::new(),
                    pending_key: None,
                    anchor,
                });
            }
            Event::MappingEnd => {
                if let Some(Container::Map { entries, anchor, .. }) = self.stack.pop() {
                    self.insert(Node::Map(entries), anchor);
                }
            }
            Event::Alias(anchor) => match self.anchors.get(&anchor).cloned() {
                Some(node) => self.insert(node, 0),
                None => self.fail("alias references an unknown anchor"),
            },
            _ => {}
        }
    }
}

fn convert_style(style: TScalarStyle) -> ScalarStyle {
    match style {
        TScalarStyle::Plain => ScalarStyle::Plain,
        TScalarStyle::SingleQuoted => ScalarStyle::SingleQuoted,
        TScalarStyle::DoubleQuoted => ScalarStyle::DoubleQuoted,
        _ => ScalarStyle::Block,
    }
}

#[derive(Clone, Copy)]
enum RenderStyle {
    Plain,
    Single,
    Double,
}

/// Find the byte range of the scalar's source representation.
///
/// The parser reports the character position of the scalar token. For quoted
/// scalars the span runs from the opening to the closing quote; for plain
/// single-line scalars the raw text equals the parsed value. Block scalars
/// and folded multi-line text never match and are rejected.
fn locate_scalar(
    text: &str,
    offsets: &[usize],
    scalar: &ScalarNode,
) -> Result<(Range<usize>, RenderStyle), String> {
    let max = offsets.len() - 1;
    let mut ci = scalar.mark.index.min(max);

    let char_at = |ci: usize| -> Option<char> {
        if ci >= max {
            None
        } else {
            text[offsets[ci]..].chars().next()
        }
    };

    // The mark normally lands on the opening quote or the first content
    // character; tolerate it landing one past the quote or on whitespace.
    if !matches!(char_at(ci), Some('"') | Some('\'')) {
        if ci > 0 && matches!(char_at(ci - 1), Some('"') | Some('\'')) {
            ci -= 1;
        } else {
            while matches!(char_at(ci), Some(' ') | Some('\t')) {
                ci += 1;
            }
        }
    }

    let start = offsets[ci.min(max)];
    let rest = &text[start..];

    match rest.chars().next() {
        Some('"') => {
            let len = quoted_len(rest, '"')?;
            Ok((start..start + len, RenderStyle::Double))
        }
        Some('\'') => {
            let len = quoted_len(rest, '\'')?;
            Ok((start..start + len, RenderStyle::Single))
        }
        _ => {
            if !scalar.value.is_empty()
                && !scalar.value.contains('\n')
                && rest.starts_with(scalar.value.as_str())
            {
                Ok((start..start + scalar.value.len(), RenderStyle::Plain))
            } else {
                Err("source text does not match the parsed value \
                     (block and folded scalars cannot be patched in place)"
                    .to_string())
            }
        }
    }
}

/// Length in bytes of a quoted scalar, including both quotes.
fn quoted_len(rest: &str, quote: char) -> Result<usize, String> {
    let mut iter = rest.char_indices();
    iter.next(); // opening quote
    let mut escaped = false;
    while let Some((i, c)) = iter.next() {
        if quote == '"' {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                return Ok(i + c.len_utf8());
            }
        } else if c == '\'' {
            // A doubled quote is an escaped quote inside single-quoted text.
            if matches!(iter.clone().next(), Some((_, '\''))) {
                iter.next();
            } else {
                return Ok(i + c.len_utf8());
            }
        }
    }
    Err("unterminated quoted scalar".to_string())
}

fn render_scalar(value: &str, style: RenderStyle) -> String {
    match style {
        RenderStyle::Double => quote_double(value),
        RenderStyle::Single => {
            if value.contains('\n') {
                quote_double(value)
            } else {
                format!("'{}'", value.replace('\'', "''"))
            }
        }
        RenderStyle::Plain => {
            if plain_safe(value) {
                value.to_string()
            } else {
                quote_double(value)
            }
        }
    }
}

fn quote_double(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Whether a value can be written as a plain scalar without changing how the
/// document parses: no structural characters, no comment introducer, and no
/// spelling that would resolve to null/bool/number instead of a string.
fn plain_safe(value: &str) -> bool {
    if value.is_empty() || value != value.trim() || value.contains('\n') {
        return false;
    }
    let first = value.chars().next().unwrap();
    if "!&*?|>%@`\"'#[]{},".contains(first) {
        return false;
    }
    if value.starts_with("- ") || value.contains(": ") || value.ends_with(':') {
        return false;
    }
    if value.contains(" #") {
        return false;
    }
    if matches!(
        value,
        "~" | "null" | "Null" | "NULL" | "true" | "True" | "TRUE" | "false" | "False" | "FALSE"
    ) {
        return false;
    }
    value.parse::<i64>().is_err() && value.parse::<f64>().is_err()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find_scalar<'a>(node: &'a Node, field: &str) -> &'a ScalarNode {
        node.scalar(field).expect("field should hold a scalar")
    }

    #[test]
    fn test_load_sequence_of_records() {
        let text = "- type: entity\n  id: chair_1\n  name: A plain chair\n";
        let docs = YamlCodec.load(text).unwrap();
        assert_eq!(docs.len(), 1);
        match &docs[0] {
            Node::Seq(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].str_field("id"), Some("chair_1"));
                assert_eq!(items[0].str_field("name"), Some("A plain chair"));
            }
            other => panic!("expected sequence, got {:?}", other),
        }
    }

    #[test]
    fn test_load_records_scalar_positions() {
        let text = "- id: chair_1\n  name: A plain chair\n";
        let docs = YamlCodec.load(text).unwrap();
        let Node::Seq(items) = &docs[0] else {
            panic!("expected sequence")
        };
        let name = find_scalar(&items[0], "name");
        assert_eq!(name.style, ScalarStyle::Plain);
        assert_eq!(name.mark.line, 2);
        assert!(name.mark.index > 0);
    }

    #[test]
    fn test_patch_plain_scalar_preserves_everything_else() {
        let text = "# furniture\n- type: entity\n  id: chair_1\n  name: A plain chair # en\n  description: comfy\n";
        let docs = YamlCodec.load(text).unwrap();
        let Node::Seq(items) = &docs[0] else {
            panic!("expected sequence")
        };
        let target = find_scalar(&items[0], "name").clone();
        let patched = YamlCodec
            .patch(
                text,
                &[Edit {
                    key: "chair_1.name".to_string(),
                    target,
                    replacement: "一张普通的椅子".to_string(),
                }],
            )
            .unwrap();
        assert_eq!(patched, text.replace("A plain chair", "一张普通的椅子"));
    }

    #[test]
    fn test_patch_double_quoted_scalar() {
        let text = "- id: sign_1\n  name: \"exit: this way\"\n";
        let docs = YamlCodec.load(text).unwrap();
        let Node::Seq(items) = &docs[0] else {
            panic!("expected sequence")
        };
        let target = find_scalar(&items[0], "name").clone();
        assert_eq!(target.value, "exit: this way");
        let patched = YamlCodec
            .patch(
                text,
                &[Edit {
                    key: "sign_1.name".to_string(),
                    target,
                    replacement: "出口".to_string(),
                }],
            )
            .unwrap();
        assert_eq!(patched, "- id: sign_1\n  name: \"出口\"\n");
    }

    #[test]
    fn test_patch_single_quoted_scalar_with_escape() {
        let text = "- id: box_1\n  name: 'it''s a box'\n";
        let docs = YamlCodec.load(text).unwrap();
        let Node::Seq(items) = &docs[0] else {
            panic!("expected sequence")
        };
        let target = find_scalar(&items[0], "name").clone();
        assert_eq!(target.value, "it's a box");
        let patched = YamlCodec
            .patch(
                text,
                &[Edit {
                    key: "box_1.name".to_string(),
                    target,
                    replacement: "it's a crate".to_string(),
                }],
            )
            .unwrap();
        assert_eq!(patched, "- id: box_1\n  name: 'it''s a crate'\n");
    }

    #[test]
    fn test_patch_unsafe_plain_replacement_is_quoted() {
        let text = "- id: chair_1\n  name: chair\n";
        let docs = YamlCodec.load(text).unwrap();
        let Node::Seq(items) = &docs[0] else {
            panic!("expected sequence")
        };
        let target = find_scalar(&items[0], "name").clone();
        let patched = YamlCodec
            .patch(
                text,
                &[Edit {
                    key: "chair_1.name".to_string(),
                    target,
                    replacement: "chair: padded".to_string(),
                }],
            )
            .unwrap();
        assert_eq!(patched, "- id: chair_1\n  name: \"chair: padded\"\n");
    }

    #[test]
    fn test_patch_multiple_edits_in_one_document() {
        let text = "- id: a\n  name: alpha\n- id: b\n  name: beta\n";
        let docs = YamlCodec.load(text).unwrap();
        let Node::Seq(items) = &docs[0] else {
            panic!("expected sequence")
        };
        let edits = vec![
            Edit {
                key: "a.name".to_string(),
                target: find_scalar(&items[0], "name").clone(),
                replacement: "阿尔法".to_string(),
            },
            Edit {
                key: "b.name".to_string(),
                target: find_scalar(&items[1], "name").clone(),
                replacement: "贝塔".to_string(),
            },
        ];
        let patched = YamlCodec.patch(text, &edits).unwrap();
        assert_eq!(patched, "- id: a\n  name: 阿尔法\n- id: b\n  name: 贝塔\n");
    }

    #[test]
    fn test_edits_on_the_same_span_collapse() {
        // An alias clones the anchored record, marks included, so both
        // records yield an edit against the same scalar.
        let text = "- &base\n  id: dup\n  name: chair\n- *base\n";
        let docs = YamlCodec.load(text).unwrap();
        let Node::Seq(items) = &docs[0] else {
            panic!("expected sequence")
        };
        assert_eq!(items.len(), 2);
        let edits: Vec<Edit> = items
            .iter()
            .map(|item| Edit {
                key: "dup.name".to_string(),
                target: find_scalar(item, "name").clone(),
                replacement: "一把椅子".to_string(),
            })
            .collect();
        let patched = YamlCodec.patch(text, &edits).unwrap();
        assert_eq!(patched, "- &base\n  id: dup\n  name: 一把椅子\n- *base\n");
    }

    #[test]
    fn test_conflicting_edits_on_the_same_span_are_rejected() {
        let text = "- id: a\n  name: alpha\n";
        let docs = YamlCodec.load(text).unwrap();
        let Node::Seq(items) = &docs[0] else {
            panic!("expected sequence")
        };
        let target = find_scalar(&items[0], "name").clone();
        let edits = vec![
            Edit {
                key: "a.name".to_string(),
                target: target.clone(),
                replacement: "one".to_string(),
            },
            Edit {
                key: "a.name".to_string(),
                target,
                replacement: "two".to_string(),
            },
        ];
        let err = YamlCodec.patch(text, &edits).unwrap_err();
        assert!(err.0.contains("same scalar"));
    }

    #[test]
    fn test_custom_tags_survive_loading() {
        let text = "- type: entity\n  id: door_1\n  name: door\n  components:\n    - type: !type:Door {}\n";
        // Tags are opaque to the tree; the document still loads.
        let docs = YamlCodec.load(text).unwrap();
        let Node::Seq(items) = &docs[0] else {
            panic!("expected sequence")
        };
        assert_eq!(items[0].str_field("id"), Some("door_1"));
    }

    #[test]
    fn test_block_scalar_is_rejected_for_patching() {
        let text = "- id: note_1\n  name: note\n  description: |\n    line one\n    line two\n";
        let docs = YamlCodec.load(text).unwrap();
        let Node::Seq(items) = &docs[0] else {
            panic!("expected sequence")
        };
        let target = find_scalar(&items[0], "description").clone();
        let err = YamlCodec
            .patch(
                text,
                &[Edit {
                    key: "note_1.description".to_string(),
                    target,
                    replacement: "x".to_string(),
                }],
            )
            .unwrap_err();
        assert!(err.0.contains("note_1.description"));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let text = "key: [unclosed\n";
        assert!(YamlCodec.load(text).is_err());
    }

    #[test]
    fn test_empty_document_loads_as_non_mapping() {
        let docs = YamlCodec.load("").unwrap();
        assert!(docs.iter().all(|d| !d.is_map()));
    }
}
