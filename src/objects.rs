/// Lazy iterator over the `{...}` literals at brace depth zero of a span.
///
/// A clone resumes from the current position. Only [`split_objects`], or a
/// clone taken before the first `next`, starts from the beginning. An
/// unterminated trailing literal ends the iteration without being yielded.
#[derive(Debug, Clone)]
pub struct ObjectLiterals<'a> {
    text: &'a str,
    pos: usize,
}

pub fn split_objects(span: &str) -> ObjectLiterals<'_> {
    ObjectLiterals { text: span, pos: 0 }
}

impl<'a> Iterator for ObjectLiterals<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let bytes = self.text.as_bytes();
        let mut depth = 0usize;
        let mut quote: Option<u8> = None;
        let mut escaped = false;
        let mut start = None;

        while self.pos < bytes.len() {
            let i = self.pos;
            let b = bytes[i];
            self.pos += 1;

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
                b'{' => {
                    if depth == 0 {
                        start = Some(i);
                    }
                    depth += 1;
                }
                b'}' if depth > 0 => {
                    depth -= 1;
                    if depth == 0
                        && let Some(s) = start.take()
                    {
                        return Some(&self.text[s..=i]);
                    }
                }
                _ => {}
            }
        }
        None
    }
}
