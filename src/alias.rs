use std::collections::HashMap;

use serde_json::{Number, Value};
use tracing::debug;

use crate::scan::{balanced_end, extract_balanced_span, skip_ws};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasTable {
    map: HashMap<String, Value>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.map.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.map.get(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Value)> for AliasTable {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}

/// Pairs the closure's formal parameters with the literals of its invocation.
///
/// Returns an empty table when `closure_source` has no `function(` or when the
/// invocation tail is missing (truncated script); callers still run bare-literal
/// extraction in that case.
pub fn build_alias_table(closure_source: &str) -> AliasTable {
    let Some(params) = closure_params(closure_source) else {
        return AliasTable::new();
    };
    let Some(args) = invocation_args(closure_source, params.end) else {
        debug!(
            params = params.names.len(),
            "closure invocation tail not found; alias table left empty"
        );
        return AliasTable::new();
    };

    let args = split_top_level(args);
    if args.len() != params.names.len() {
        debug!(
            params = params.names.len(),
            args = args.len(),
            "closure parameter/argument count mismatch; pairing positionally"
        );
    }

    let table: AliasTable = params
        .names
        .iter()
        .zip(args)
        .map(|(name, raw)| (name.to_string(), parse_literal(raw)))
        .collect();
    debug!(aliases = table.len(), "built alias table");
    table
}

struct ClosureParams<'a> {
    names: Vec<&'a str>,
    // Offset just past the closing `)` of the parameter list.
    end: usize,
}

fn closure_params(src: &str) -> Option<ClosureParams<'_>> {
    let func = src.find("function")?;
    let open = func + src[func..].find('(')?;
    let span = extract_balanced_span(src, open, '(', ')')?;
    let names = span[1..span.len() - 1]
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    Some(ClosureParams {
        names,
        end: open + span.len(),
    })
}

/// Inner text of the invocation argument list.
///
/// Handles both `(function(..){..})(args)` and `(function(..){..}(args))`.
fn invocation_args(src: &str, params_end: usize) -> Option<&str> {
    let bytes = src.as_bytes();
    let body_open = skip_ws(bytes, params_end);
    if let Some(body_end) = balanced_end(src, body_open, '{', '}') {
        let mut i = skip_ws(bytes, body_end);
        if bytes.get(i) == Some(&b')') {
            i = skip_ws(bytes, i + 1);
        }
        if bytes.get(i) == Some(&b'(')
            && let Some(span) = extract_balanced_span(src, i, '(', ')')
        {
            return Some(&span[1..span.len() - 1]);
        }
    }

    // The body could not be balanced (e.g. a regex literal with a quote in
    // it); fall back to the last `})(` marker.
    let marker = src.rfind("})(")?;
    let span = extract_balanced_span(src, marker + 2, '(', ')')?;
    Some(&span[1..span.len() - 1])
}

pub fn split_top_level(list: &str) -> Vec<&str> {
    let bytes = list.as_bytes();
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    let mut start = 0usize;

    for (i, &b) in bytes.iter().enumerate() {
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
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                out.push(list[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = list[start..].trim();
    if !tail.is_empty() || !out.is_empty() {
        out.push(tail);
    }
    out
}

/// Converts one invocation argument to a data value.
///
/// Unknown expressions are kept verbatim as strings rather than rejected.
pub fn parse_literal(raw: &str) -> Value {
    let t = raw.trim();
    if t.is_empty() {
        return Value::Null;
    }
    let first = t.as_bytes()[0];
    if matches!(first, b'"' | b'\'')
        && let Some((s, end)) = read_quoted(t, 0)
        && end == t.len()
    {
        return Value::String(s);
    }
    match t {
        "!0" | "true" => return Value::Bool(true),
        "!1" | "false" => return Value::Bool(false),
        "null" | "undefined" => return Value::Null,
        _ => {}
    }
    if is_void_zero(t) {
        return Value::Null;
    }
    if let Some(n) = parse_js_number(t) {
        return n;
    }
    if matches!(first, b'{' | b'[')
        && let Ok(v) = crate::normalize::normalize_value(t, &AliasTable::new())
    {
        return v;
    }
    Value::String(t.to_string())
}

fn is_void_zero(t: &str) -> bool {
    t.strip_prefix("void")
        .is_some_and(|rest| rest.starts_with(char::is_whitespace) && rest.trim() == "0")
}

/// Parses JS numeric literal forms JSON rejects (`.5`, `1.`, `0x1f`, `+3`, `007`).
pub(crate) fn parse_js_number(tok: &str) -> Option<Value> {
    let t = tok.strip_prefix('+').unwrap_or(tok);
    let (neg, digits) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t),
    };
    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        let n = i64::from_str_radix(hex, 16).ok()?;
        return Some(Value::from(if neg { -n } else { n }));
    }
    if digits.is_empty()
        || !digits
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
        || !digits.bytes().any(|b| b.is_ascii_digit())
    {
        return None;
    }
    if let Ok(n) = t.parse::<i64>() {
        return Some(Value::from(n));
    }
    let f = t.parse::<f64>().ok()?;
    Number::from_f64(f).map(Value::Number)
}

pub(crate) fn read_quoted(text: &str, start: usize) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    let quote = *bytes.get(start)?;
    let mut escaped = false;
    for (offset, &b) in bytes[start + 1..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        if b == b'\\' {
            escaped = true;
        } else if b == quote {
            let end = start + 1 + offset;
            return Some((unescape_js_string(&text[start + 1..end]), end + 1));
        }
    }
    None
}

pub fn unescape_js_string(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(e) = chars.next() else {
            out.push('\\');
            break;
        };
        match e {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !chars.peek().is_some_and(|c| c.is_ascii_digit()) => out.push('\0'),
            '\n' => {}
            'x' => {
                let hex: String = chars.clone().take(2).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) if hex.len() == 2 => {
                        out.push(ch);
                        chars.nth(1);
                    }
                    _ => out.push('x'),
                }
            }
            'u' => match read_unicode_escape(&mut chars) {
                Some(ch) => out.push(ch),
                None => out.push('u'),
            },
            other => out.push(other),
        }
    }
    out
}

fn read_unicode_escape(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<char> {
    if chars.peek() == Some(&'{') {
        let lookahead: String = chars.clone().skip(1).take_while(|c| *c != '}').collect();
        let code = u32::from_str_radix(&lookahead, 16).ok()?;
        let ch = char::from_u32(code)?;
        chars.nth(lookahead.chars().count() + 1);
        return Some(ch);
    }

    let hex: String = chars.clone().take(4).collect();
    if hex.len() != 4 {
        return None;
    }
    let hi = u32::from_str_radix(&hex, 16).ok()?;
    if (0xD800..0xDC00).contains(&hi) {
        // High surrogate: only valid when followed by `\uDC00`..`\uDFFF`.
        let pair: String = chars.clone().skip(4).take(6).collect();
        if let Some(lo_hex) = pair.strip_prefix("\\u")
            && let Ok(lo) = u32::from_str_radix(lo_hex, 16)
            && (0xDC00..0xE000).contains(&lo)
        {
            let code = 0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00);
            chars.nth(9);
            return char::from_u32(code);
        }
        return None;
    }
    let ch = char::from_u32(hi)?;
    chars.nth(3);
    Some(ch)
}
