use std::fmt::Write as _;

use super::{ChunkKind, Completion, RawCompletion};

/// Shape one raw completion record into a `(priority, display, replacement)`
/// triple.
///
/// Returns `None` for records that are unavailable or that end up with an
/// empty display or replacement (e.g. pure-informative entries). Records
/// whose display begins with `operator` or `~` keep their text but are
/// demoted to the end of the sort order.
pub fn shape(raw: &RawCompletion) -> Option<Completion> {
    if !raw.available {
        return None;
    }

    let mut display = String::new();
    let mut replacement = String::new();
    let mut description = String::new();
    let mut placeholder = 1u32;

    for chunk in &raw.chunks {
        match chunk.kind {
            ChunkKind::Punctuation
            | ChunkKind::Whitespace
            | ChunkKind::CurrentParameter
            | ChunkKind::Colon
            | ChunkKind::Comma => {
                display.push_str(&chunk.text);
                replacement.push_str(&chunk.text);
            }
            ChunkKind::TypedText => {
                display.push_str(&chunk.text);
                replacement.push_str(&chunk.text);
                if raw.constructor {
                    let _ = write!(replacement, " ${{{placeholder}:v}}");
                    placeholder += 1;
                }
            }
            ChunkKind::Placeholder => {
                display.push_str(&chunk.text);
                let _ = write!(replacement, "${{{placeholder}:{}}}", chunk.text);
                placeholder += 1;
            }
            ChunkKind::ResultType | ChunkKind::Text | ChunkKind::Informative | ChunkKind::Equal => {
                description.push_str(&chunk.text);
                description.push(' ');
            }
            ChunkKind::Optional | ChunkKind::SemiColon => {}
        }
    }

    if display.is_empty() || replacement.is_empty() {
        return None;
    }

    let demoted = display.starts_with("operator") || display.starts_with('~');
    let priority = if demoted { u32::MAX } else { raw.priority };

    display.push('\t');
    display.push_str(&description);

    Some(Completion {
        priority,
        display,
        replacement,
    })
}
