pub mod node;
pub mod yaml;

pub use node::{Mark, Node, ScalarNode, ScalarStyle};
pub use yaml::YamlCodec;

use thiserror::Error;

/// Codec-level failure: a document that cannot be parsed, or a scalar that
/// cannot be located in the source text for in-place replacement.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CodecError(pub String);

/// One pending substitution: replace the scalar at `target`'s position with
/// `replacement`, keeping every other byte of the document intact.
#[derive(Debug, Clone)]
pub struct Edit {
    /// Derived key, carried for diagnostics only.
    pub key: String,
    pub target: ScalarNode,
    pub replacement: String,
}

/// Format-preserving document round trip.
///
/// `load` produces a positioned tree; `patch` splices new scalar values into
/// the original text at the positions recorded by `load`. Because `patch`
/// never re-serializes the tree, comments, tags, key order and formatting are
/// preserved byte-for-byte outside the substituted spans. The reconciliation
/// engine only talks to this trait, so tests can substitute an in-memory fake.
pub trait DocumentCodec {
    /// Parse document text into one tree per YAML document in the stream.
    fn load(&self, text: &str) -> Result<Vec<Node>, CodecError>;

    /// Apply scalar substitutions to the original text.
    fn patch(&self, text: &str, edits: &[Edit]) -> Result<String, CodecError>;
}
