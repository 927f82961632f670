//! Keyword extraction for the inverted index.
//!
//! A node's tokens are the lowercased word fragments of its name plus, for
//! files, the lowercased extension including its leading dot. Queries are
//! split with the same rule so `search("Report 2024")` matches the tokens
//! produced for `report_2024.pdf` only where the fragments agree.

use std::collections::BTreeSet;

use crate::storage::{name_extension, Node};
use crate::types::NodeKind;

/// Tokens for a node as it currently stands.
pub fn extract_keywords(node: &Node) -> BTreeSet<String> {
    keywords_for(node.name(), node.kind())
}

/// Tokens for a name of the given kind.
pub fn keywords_for(name: &str, kind: NodeKind) -> BTreeSet<String> {
    let mut tokens = tokenize(name);
    if kind == NodeKind::File {
        if let Some(ext) = name_extension(name) {
            tokens.insert(format!(".{}", ext.to_lowercase()));
        }
    }
    tokens
}

/// Splits on non-word characters, lowercases, drops empty fragments.
///
/// Word characters are alphanumerics and `_`.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !is_word_char(c))
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[inline]
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
