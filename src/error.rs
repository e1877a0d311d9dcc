use thiserror::Error;

const SNIPPET_CHARS: usize = 200;

/// Outcome of an extraction step that did not produce a record.
///
/// None of these abort a batch: `NotFound` makes the pipeline fall through to
/// the next strategy, `MalformedRecord` and `Unsupported` drop one literal and
/// `ValidationFailure` drops one assembled record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("malformed record ({reason}): {snippet}")]
    MalformedRecord { reason: String, snippet: String },
    #[error("unsupported construct `{construct}` at byte {offset}")]
    Unsupported { construct: String, offset: usize },
    #[error("validation failed: {0}")]
    ValidationFailure(String),
}

impl ExtractError {
    pub fn malformed(reason: impl Into<String>, raw: &str) -> Self {
        ExtractError::MalformedRecord {
            reason: reason.into(),
            snippet: truncate_snippet(raw),
        }
    }

    pub fn unsupported(construct: impl Into<String>, offset: usize) -> Self {
        ExtractError::Unsupported {
            construct: construct.into(),
            offset,
        }
    }
}

/// First 200 characters of `raw` with newlines flattened, for log lines.
pub fn truncate_snippet(raw: &str) -> String {
    let flat = raw.replace(['\n', '\r'], " ");
    let mut out: String = flat.chars().take(SNIPPET_CHARS).collect();
    if flat.chars().count() > SNIPPET_CHARS {
        out.push_str("...");
    }
    out
}
