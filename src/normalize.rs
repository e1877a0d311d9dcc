use serde_json::{Map, Number, Value};

use crate::alias::{AliasTable, parse_js_number, read_quoted};
use crate::error::ExtractError;
use crate::observe::ExtractContext;
use crate::scan::{is_ident_byte, skip_ws};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

/// Rewrites `text` as JSON text. Clean JSON comes back unchanged apart from
/// string escapes being re-encoded.
pub fn to_json_text(text: &str, aliases: &AliasTable) -> Result<String, ExtractError> {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    let mut stack: Vec<Container> = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b' ' | b'\t' | b'\n' | b'\r' => i += 1,
            b'{' => {
                stack.push(Container::Object);
                out.push('{');
                i += 1;
            }
            b'[' => {
                stack.push(Container::Array);
                out.push('[');
                i += 1;
            }
            b'}' | b']' => {
                let expected = if b == b'}' {
                    Container::Object
                } else {
                    Container::Array
                };
                if stack.pop() != Some(expected) {
                    return Err(ExtractError::malformed(
                        format!("unbalanced `{}` at byte {i}", b as char),
                        text,
                    ));
                }
                drop_trailing_comma(&mut out);
                out.push(b as char);
                i += 1;
            }
            b',' | b':' => {
                out.push(b as char);
                i += 1;
            }
            b'"' | b'\'' => {
                let Some((s, end)) = read_quoted(text, i) else {
                    return Err(ExtractError::malformed(
                        format!("unterminated string at byte {i}"),
                        text,
                    ));
                };
                out.push_str(&Value::String(s).to_string());
                i = end;
            }
            b'!' => {
                let value = match bytes.get(i + 1) {
                    Some(b'0') => "true",
                    Some(b'1') => "false",
                    _ => return Err(ExtractError::unsupported("!", i)),
                };
                if bytes.get(i + 2).copied().is_some_and(is_number_byte) {
                    return Err(ExtractError::unsupported("!", i));
                }
                out.push_str(value);
                i += 2;
            }
            b'0'..=b'9' | b'-' | b'+' | b'.' => {
                let end = number_end(bytes, i);
                let token = &text[i..end];
                if at_key_position(bytes, end, &stack) {
                    out.push_str(&Value::String(token.to_string()).to_string());
                } else {
                    out.push_str(&number_json(token, i)?);
                }
                i = end;
            }
            _ if is_ident_start(b) => {
                let end = ident_end(bytes, i);
                let ident = &text[i..end];
                if at_key_position(bytes, end, &stack) {
                    out.push_str(&Value::String(ident.to_string()).to_string());
                    i = end;
                    continue;
                }
                let next = skip_ws(bytes, end);
                match bytes.get(next) {
                    Some(b'(') => return Err(ExtractError::unsupported(format!("{ident}("), i)),
                    Some(b'.') => return Err(ExtractError::unsupported(format!("{ident}."), i)),
                    _ => {}
                }
                match ident {
                    "true" | "false" | "null" => {
                        out.push_str(ident);
                        i = end;
                    }
                    "undefined" => {
                        out.push_str("null");
                        i = end;
                    }
                    "void" => {
                        if bytes.get(next) != Some(&b'0')
                            || bytes.get(next + 1).copied().is_some_and(is_number_byte)
                        {
                            return Err(ExtractError::unsupported("void", i));
                        }
                        out.push_str("null");
                        i = next + 1;
                    }
                    "function" | "new" | "return" | "var" | "let" | "const" | "this" => {
                        return Err(ExtractError::unsupported(ident, i));
                    }
                    _ => {
                        match aliases.get(ident) {
                            Some(value) => out.push_str(&value.to_string()),
                            None => out.push_str(&Value::String(ident.to_string()).to_string()),
                        }
                        i = end;
                    }
                }
            }
            _ => {
                let construct: String = text[i..].chars().take(1).collect();
                return Err(ExtractError::unsupported(construct, i));
            }
        }
    }

    if !stack.is_empty() {
        return Err(ExtractError::malformed("unclosed object or array", text));
    }
    Ok(out)
}

/// Normalizes any supported value (object, array or scalar).
pub fn normalize_value(text: &str, aliases: &AliasTable) -> Result<Value, ExtractError> {
    let json = to_json_text(text, aliases).map_err(|err| match err {
        ExtractError::Unsupported { construct, offset } => ExtractError::malformed(
            format!("unsupported construct `{construct}` at byte {offset}"),
            text,
        ),
        other => other,
    })?;
    serde_json::from_str(&json)
        .map_err(|err| ExtractError::malformed(format!("parse failed: {err}"), text))
}

/// Normalizes one object literal into its field map.
pub fn normalize(literal: &str, aliases: &AliasTable) -> Result<Map<String, Value>, ExtractError> {
    match normalize_value(literal, aliases)? {
        Value::Object(map) => Ok(map),
        other => Err(ExtractError::malformed(
            format!("expected an object, got {}", json_kind(&other)),
            literal,
        )),
    }
}

/// Normalizes every literal, dropping (and reporting) the ones that fail.
pub fn normalize_objects<'a, I>(
    literals: I,
    aliases: &AliasTable,
    ctx: &mut ExtractContext,
) -> Vec<Map<String, Value>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = Vec::new();
    for raw in literals {
        match normalize(raw, aliases) {
            Ok(map) => {
                ctx.record_normalized();
                out.push(map);
            }
            Err(err) => ctx.record_dropped(raw, &err),
        }
    }
    out
}

fn drop_trailing_comma(out: &mut String) {
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    if out.ends_with(',') {
        out.pop();
    }
}

fn at_key_position(bytes: &[u8], token_end: usize, stack: &[Container]) -> bool {
    stack.last() == Some(&Container::Object) && bytes.get(skip_ws(bytes, token_end)) == Some(&b':')
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn ident_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while bytes.get(i).copied().is_some_and(is_ident_byte) {
        i += 1;
    }
    i
}

fn is_number_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'.' || b == b'_'
}

fn number_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    if matches!(bytes.get(i), Some(b'-') | Some(b'+')) {
        i += 1;
    }
    let hex = matches!(
        (bytes.get(i), bytes.get(i + 1)),
        (Some(b'0'), Some(b'x') | Some(b'X'))
    );
    while let Some(&b) = bytes.get(i) {
        let exponent_sign =
            matches!(b, b'+' | b'-') && !hex && matches!(bytes.get(i - 1), Some(b'e') | Some(b'E'));
        if is_number_byte(b) || exponent_sign {
            i += 1;
        } else {
            break;
        }
    }
    i
}

fn number_json(token: &str, offset: usize) -> Result<String, ExtractError> {
    if serde_json::from_str::<Number>(token).is_ok() {
        return Ok(token.to_string());
    }
    parse_js_number(token)
        .map(|v| v.to_string())
        .ok_or_else(|| ExtractError::unsupported(token, offset))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
