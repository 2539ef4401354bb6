//! Shaping of raw libclang completion records into editor-ready suggestions.
//!
//! The façade materializes each record as a [`RawCompletion`] (kind flags,
//! priority, ordered chunks); [`shape`] turns one record into a
//! [`Completion`] carrying the display text shown in the popup and the
//! snippet-style replacement inserted on accept.

mod shaper;

pub use shaper::shape;

/// One labeled fragment of a completion suggestion, as reported by libclang.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// The text the user is expected to type to match the suggestion.
    TypedText,
    /// An editable argument slot, e.g. `int x`.
    Placeholder,
    /// The result type of the suggestion, e.g. the return type of a method.
    ResultType,
    /// Uncategorized text that informs but is not inserted.
    Text,
    Informative,
    Equal,
    CurrentParameter,
    Colon,
    Comma,
    SemiColon,
    /// A chunk that is itself a whole optional completion string.
    Optional,
    /// Horizontal or vertical whitespace between chunks.
    Whitespace,
    /// Parentheses, brackets, braces, angle brackets.
    Punctuation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub kind: ChunkKind,
    pub text: String,
}

impl Chunk {
    pub fn new(
        kind: ChunkKind,
        text: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// A completion record lifted out of libclang, owning all of its text.
#[derive(Debug, Clone)]
pub struct RawCompletion {
    /// Whether the record's cursor kind is a constructor.
    pub constructor: bool,
    /// Whether libclang reports the entity as available.
    pub available: bool,
    /// libclang priority; lower is better.
    pub priority: u32,
    pub chunks: Vec<Chunk>,
}

/// A shaped suggestion.
///
/// Field order matters: the derived ordering sorts ascending by priority and
/// breaks ties on the display string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Completion {
    /// Priority after demotion; lower sorts first.
    pub priority: u32,
    /// Typed text plus an informative suffix after a tab.
    pub display: String,
    /// Typed text with `${N:name}` placeholders for each argument slot.
    pub replacement: String,
}

/// ASCII case-insensitive starts-with, used for prefix filtering at the
/// async boundary.
pub fn starts_with_ignore_ascii_case(
    text: &str,
    prefix: &str,
) -> bool {
    text.len() >= prefix.len() && text.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}
