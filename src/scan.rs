/// Returns the span from `start` (which must hold `open`) through the matching
/// `close`, or `None` when the text ends before depth returns to zero.
///
/// Delimiters inside single- or double-quoted strings are ignored, and a
/// backslash suppresses the meaning of the character after it.
pub fn extract_balanced_span(text: &str, start: usize, open: char, close: char) -> Option<&str> {
    let end = balanced_end(text, start, open, close)?;
    Some(&text[start..end])
}

pub fn balanced_end(text: &str, start: usize, open: char, close: char) -> Option<usize> {
    debug_assert!(open.is_ascii() && close.is_ascii());
    let bytes = text.as_bytes();
    if bytes.get(start).copied() != Some(open as u8) {
        return None;
    }
    let (open, close) = (open as u8, close as u8);

    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        if b == b'\\' {
            escaped = true;
            continue;
        }
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'"' | b'\'' => quote = Some(b),
            _ if b == open => depth += 1,
            _ if b == close => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Offsets of every `open` delimiter that starts the value of `key`.
///
/// Accepts `key:`, `"key":`, `'key':` and `key=` forms with optional
/// whitespace, and skips occurrences that are only a suffix of a longer
/// identifier (`myteams:` does not match `teams`).
pub fn find_value_starts(text: &str, key: &str, open: char) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    if key.is_empty() {
        return out;
    }

    for (pos, _) in text.match_indices(key) {
        let quoted = pos > 0 && matches!(bytes[pos - 1], b'"' | b'\'');
        if pos > 0 && !quoted && is_ident_byte(bytes[pos - 1]) {
            continue;
        }
        let mut i = pos + key.len();
        if quoted {
            if bytes.get(i) != Some(&bytes[pos - 1]) {
                continue;
            }
            i += 1;
        } else if bytes.get(i).copied().is_some_and(is_ident_byte) {
            continue;
        }
        i = skip_ws(bytes, i);
        if !matches!(bytes.get(i), Some(b':') | Some(b'=')) {
            continue;
        }
        i = skip_ws(bytes, i + 1);
        if bytes.get(i) == Some(&(open as u8)) {
            out.push(i);
        }
    }
    out
}

pub fn extract_key_span<'a>(text: &'a str, key: &str, open: char, close: char) -> Option<&'a str> {
    find_value_starts(text, key, open)
        .into_iter()
        .find_map(|start| extract_balanced_span(text, start, open, close))
}

pub fn strip_delimiters(span: &str, open: char, close: char) -> &str {
    let trimmed = span.trim();
    trimmed
        .strip_prefix(open)
        .and_then(|s| s.strip_suffix(close))
        .unwrap_or(trimmed)
}

pub(crate) fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

pub(crate) fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
        i += 1;
    }
    i
}
