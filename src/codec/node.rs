use std::fmt;

/// Position of a scalar in the original document text.
///
/// `index` counts characters (not bytes) from the start of the text, matching
/// the scanner's notion of position; `line` and `col` are 1- and 0-indexed
/// respectively, as reported by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    pub index: usize,
    pub line: usize,
    pub col: usize,
}

/// Presentation style of a scalar as it appeared in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    /// Literal or folded block scalar. Cannot be patched in place.
    Block,
}

/// A scalar value together with where and how it appeared in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarNode {
    pub value: String,
    pub style: ScalarStyle,
    pub mark: Mark,
}

/// One node of a parsed document.
///
/// Mappings keep their entries in document order and pass unknown fields
/// through untouched; only scalar values carry position information because
/// only scalar values are ever rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Scalar(ScalarNode),
    Seq(Vec<Node>),
    Map(Vec<(String, Node)>),
}

impl Node {
    /// Look up a field by name. Only meaningful on mappings.
    pub fn get(&self, field: &str) -> Option<&Node> {
        match self {
            Node::Map(entries) => entries.iter().find(|(k, _)| k == field).map(|(_, v)| v),
            _ => None,
        }
    }

    /// True if the mapping declares the field at all, regardless of its value.
    pub fn has_field(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// The scalar behind a field, if the field holds one.
    pub fn scalar(&self, field: &str) -> Option<&ScalarNode> {
        match self.get(field)? {
            Node::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// String view of this node, applying plain-scalar type resolution:
    /// a plain `true`, `42` or `~` is a bool/int/null, not a string, and
    /// must not be offered for translation.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(s) if s.is_string() => Some(&s.value),
            _ => None,
        }
    }

    /// String view of a field value, with the same type resolution.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Node::as_str)
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Node::Map(_))
    }
}

impl ScalarNode {
    /// Whether this scalar reads as a string. Quoted and block scalars always
    /// do; plain scalars resolve null/bool/number forms to non-strings first.
    pub fn is_string(&self) -> bool {
        match self.style {
            ScalarStyle::Plain => !resolves_non_string(&self.value),
            _ => true,
        }
    }
}

/// Core-schema resolution for plain scalars: null, bool, int and float
/// spellings are not strings.
fn resolves_non_string(value: &str) -> bool {
    match value {
        "" | "~" | "null" | "Null" | "NULL" => true,
        "true" | "True" | "TRUE" | "false" | "False" | "FALSE" => true,
        _ => value.parse::<i64>().is_ok() || value.parse::<f64>().is_ok(),
    }
}

impl fmt::Display for ScalarNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}
