//! Buffer repair. Completion is the only adapter allowed to
//! call this -- diagnostics, hover, and everything else always analyze the
//! buffer exactly as the editor holds it. A repair never mutates the
//! original buffer; it produces a scratch copy plus the offset inside it
//! that corresponds to the original caret.

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_identifier_chain(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    s.split('.').all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(is_ident_char),
            _ => false,
        }
    })
}

fn trailing_identifier(s: &str) -> Option<&str> {
    let start = s.rfind(|c: char| !is_ident_char(c)).map(|i| i + 1).unwrap_or(0);
    let ident = &s[start..];
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => Some(ident),
        _ => None,
    }
}

fn insert(source: &str, pos: usize, text: &str) -> (String, u32) {
    let mut out = String::with_capacity(source.len() + text.len());
    out.push_str(&source[..pos]);
    out.push_str(text);
    out.push_str(&source[pos..]);
    (out, pos as u32 + 1)
}

/// Looks one line back from `pos` and, if the caret context matches one of
/// the four recognized patterns, returns a repaired scratch copy of
/// `source` plus the offset to resolve in it (always `pos + 1`, safely
/// inside the inserted placeholder). Returns `None` when the buffer
/// already parses cleanly enough that no repair applies.
pub fn repair(source: &str, pos: u32) -> Option<(String, u32)> {
    let pos = pos as usize;
    if pos > source.len() || !source.is_char_boundary(pos) {
        return None;
    }
    let line_start = source[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let prefix = &source[line_start..pos];

    if prefix.trim().is_empty() {
        log::trace!("repair: whitespace-only line at {pos}");
        return Some(insert(source, pos, "placeholder = 0"));
    }

    if let Some(before_dot) = prefix.strip_suffix('.') {
        let at_statement_start = is_identifier_chain(before_dot.trim_start());
        let text = if at_statement_start { "placeholder = 0" } else { "placeholder" };
        log::trace!("repair: trailing '.' at {pos}, statement_start={at_statement_start}");
        return Some(insert(source, pos, text));
    }

    if prefix.ends_with(':') {
        log::trace!("repair: trailing ':' at {pos}");
        return Some(insert(source, pos, "placeholder()"));
    }

    if let Some(ident) = trailing_identifier(prefix) {
        if prefix.trim_start() == ident {
            log::trace!("repair: bare identifier '{ident}' at statement start, pos {pos}");
            return Some(insert(source, pos, " = 0"));
        }
    }

    None
}
