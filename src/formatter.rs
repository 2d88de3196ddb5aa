//! The formatter: a line-based indent-counter state machine
//! over the token stream, not a full pretty-printer from the AST. Each
//! output line corresponds to one or more input lines' worth of tokens,
//! re-indented by a running counter and re-spaced by a small set of
//! token-adjacency rules. Never fails: a buffer this pass can't confidently
//! re-render (a lex/parse error, or a token/comment spanning multiple
//! lines) is returned unchanged.

use crate::intern::Interner;
use crate::pos::LineIndex;
use crate::token::{Token, TokenType};

const INDENT_UNIT: &str = "  ";

#[derive(Clone, Copy)]
enum Piece<'a> {
    Token(Token),
    Comment(crate::pos::Span, &'a str),
}

impl<'a> Piece<'a> {
    fn start(&self) -> u32 {
        match self {
            Piece::Token(t) => t.span.start,
            Piece::Comment(s, _) => s.start,
        }
    }

    fn text(&self, source: &'a str) -> &'a str {
        match self {
            Piece::Token(t) => &source[t.span.start as usize..t.span.end as usize],
            Piece::Comment(_, text) => text,
        }
    }

    fn kind(&self) -> Option<TokenType> {
        match self {
            Piece::Token(t) => Some(t.kind),
            Piece::Comment(..) => None,
        }
    }
}

/// Whether `text` crosses a line boundary -- long strings (`[[...]]`) and
/// block comments (`--[[...]]`) do, and this formatter's per-line model
/// can't place them safely, so their presence aborts the whole pass.
fn spans_multiple_lines(text: &str) -> bool {
    text.contains('\n')
}

fn is_tight_left(kind: TokenType) -> bool {
    matches!(
        kind,
        TokenType::LParen
            | TokenType::LBracket
            | TokenType::LBrace
            | TokenType::Dot
            | TokenType::DoubleColon
            | TokenType::Colon
            | TokenType::Hash
    )
}

fn is_tight_right(kind: TokenType) -> bool {
    matches!(
        kind,
        TokenType::RParen
            | TokenType::RBracket
            | TokenType::RBrace
            | TokenType::LParen
            | TokenType::Comma
            | TokenType::Semicolon
            | TokenType::Dot
            | TokenType::DoubleColon
            | TokenType::Colon
    )
}

/// Decides whether a space belongs between two adjacent pieces on the same
/// output line. `prev`/`cur` are `None` for a comment (comments never
/// trigger the tight-punctuation rules, so they always get a separating
/// space when something precedes them).
fn needs_space(prev: Option<TokenType>, cur: Option<TokenType>) -> bool {
    match (prev, cur) {
        (None, _) => false,
        (Some(p), Some(c)) => !(is_tight_right(c) || is_tight_left(p)),
        _ => true,
    }
}

struct HeaderTracker {
    awaiting_paren: bool,
    in_header: bool,
}

impl HeaderTracker {
    fn new() -> Self {
        HeaderTracker { awaiting_paren: false, in_header: false }
    }

    /// Returns `true` exactly when `kind` is the `)` that closes a
    /// `function`/`function name`'s parameter list -- the one place a bare
    /// `)` also opens a new indent level. Lua has no nested parens inside a
    /// parameter list, so the first `RParen` after the header's `LParen` is
    /// always that closer.
    fn observe(&mut self, kind: TokenType) -> bool {
        match kind {
            TokenType::Function => {
                self.awaiting_paren = true;
                false
            }
            TokenType::LParen if self.awaiting_paren => {
                self.awaiting_paren = false;
                self.in_header = true;
                false
            }
            TokenType::RParen if self.in_header => {
                self.in_header = false;
                true
            }
            _ => false,
        }
    }
}

/// Reformats `source`, or returns it byte-for-byte unchanged if the buffer
/// doesn't parse cleanly or contains a construct this pass can't place
/// line-by-line.
pub fn format(source: &str) -> String {
    let mut interner = Interner::new();
    let (tokens, comment_spans, lex_errors) = crate::lexer::tokenize(source, &mut interner);
    if !lex_errors.is_empty() {
        return source.to_string();
    }
    let parse_result = crate::parser::parse(&tokens, &mut interner);
    if !parse_result.errors.is_empty() {
        return source.to_string();
    }

    let mut pieces: Vec<Piece> = Vec::new();
    for t in &tokens {
        if t.kind == TokenType::Eof {
            continue;
        }
        let text = &source[t.span.start as usize..t.span.end as usize];
        if spans_multiple_lines(text) {
            return source.to_string();
        }
        pieces.push(Piece::Token(*t));
    }
    for span in &comment_spans {
        let text = &source[span.start as usize..span.end as usize];
        if spans_multiple_lines(text) {
            return source.to_string();
        }
        pieces.push(Piece::Comment(*span, text));
    }
    pieces.sort_by_key(|p| p.start());

    if pieces.is_empty() {
        return source.to_string();
    }

    let line_index = LineIndex::new(source);
    let mut lines: Vec<Vec<Piece>> = Vec::new();
    let mut current_line = line_index.position(source, pieces[0].start()).line;
    let mut current: Vec<Piece> = Vec::new();
    for piece in pieces {
        let line = line_index.position(source, piece.start()).line;
        if line != current_line && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current_line = line;
        }
        current.push(piece);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    let mut indent: i32 = 0;
    let mut header = HeaderTracker::new();
    let mut out = String::new();

    for line_pieces in &lines {
        let first_kind = line_pieces.iter().find_map(Piece::kind);
        if matches!(first_kind, Some(TokenType::End | TokenType::Else | TokenType::Elseif | TokenType::Until)) {
            indent = (indent - 1).max(0);
        }

        out.push_str(&INDENT_UNIT.repeat(indent as usize));
        let mut prev_kind: Option<TokenType> = None;
        for piece in line_pieces {
            let kind = piece.kind();
            if needs_space(prev_kind, kind) {
                out.push(' ');
            }
            out.push_str(piece.text(source));
            prev_kind = kind.or(prev_kind);
        }
        out.push('\n');

        for piece in line_pieces {
            if let Some(kind) = piece.kind() {
                if header.observe(kind) {
                    indent += 1;
                }
                if matches!(kind, TokenType::Then | TokenType::Do | TokenType::Repeat) {
                    indent += 1;
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reindents_if_block() {
        let source = "if x then\nreturn 1\nend";
        let formatted = format(source);
        assert_eq!(formatted, "if x then\n  return 1\nend\n");
    }

    #[test]
    fn reindents_nested_function() {
        let source = "local function f(a, b)\nif a then\nreturn b\nend\nend";
        let formatted = format(source);
        assert_eq!(formatted, "local function f(a, b)\n  if a then\n    return b\n  end\nend\n");
    }

    #[test]
    fn normalizes_comma_and_operator_spacing() {
        let source = "local x=1+2\nlocal t={1,2}";
        let formatted = format(source);
        assert!(formatted.contains("x = 1 + 2"));
        assert!(formatted.contains("t = {1, 2}"));
    }

    #[test]
    fn member_and_method_access_stay_tight() {
        let source = "local y=t.field\nt:method()";
        let formatted = format(source);
        assert!(formatted.contains("t.field"));
        assert!(formatted.contains("t:method()"));
    }

    #[test]
    fn is_idempotent() {
        let source = "if x then\nlocal y=1\nreturn y\nend";
        let once = format(source);
        let twice = format(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn repeat_until_indents_body() {
        let source = "repeat\nx = x+1\nuntil x>10";
        let formatted = format(source);
        assert_eq!(formatted, "repeat\n  x = x + 1\nuntil x > 10\n");
    }

    #[test]
    fn syntax_error_returns_source_unchanged() {
        let source = "local x = )";
        assert_eq!(format(source), source);
    }

    #[test]
    fn multiline_long_string_is_left_unchanged() {
        let source = "local x = [[a\nb]]";
        assert_eq!(format(source), source);
    }
}
