use crate::error::{ParseError, ParseErrorKind};
use crate::intern::Interner;
use crate::pos::Span;
use crate::token::{Token, TokenType};

/// Hand-rolled recursive-descent-friendly lexer: a single forward scan over
/// the byte buffer, producing a flat token stream plus any errors. Errors do
/// not stop the scan -- a bad string literal or stray character is skipped
/// and lexing continues, so a half-typed buffer still yields *something*
/// for the parser to chew on.
pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    tokens: Vec<Token>,
    errors: Vec<ParseError>,
    /// Spans of every comment seen, line and block alike -- kept so the
    /// scope builder can attach an immediately-preceding one to a
    /// declaration as its `documentation` doc block.
    comments: Vec<Span>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source: source.as_bytes(),
            pos: 0,
            tokens: Vec::new(),
            errors: Vec::new(),
            comments: Vec::new(),
        }
    }

    pub fn tokenize(mut self, interner: &mut Interner) -> (Vec<Token>, Vec<Span>, Vec<ParseError>) {
        loop {
            self.skip_trivia();
            if self.at_eof() {
                break;
            }
            self.scan_token(interner);
        }
        let eof_span = Span::new(self.pos as u32, self.pos as u32);
        self.tokens.push(Token::new(TokenType::Eof, crate::intern::Symbol::EMPTY, eof_span));
        (self.tokens, self.comments, self.errors)
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    self.pos += 1;
                }
                Some(b'-') if self.peek_at(1) == Some(b'-') => {
                    let comment_start = self.pos;
                    self.pos += 2;
                    if self.peek() == Some(b'[') {
                        if let Some(level) = self.long_bracket_level() {
                            self.skip_long_bracket(level);
                            self.comments.push(Span::new(comment_start as u32, self.pos as u32));
                            continue;
                        }
                    }
                    while !self.at_eof() && self.peek() != Some(b'\n') {
                        self.pos += 1;
                    }
                    self.comments.push(Span::new(comment_start as u32, self.pos as u32));
                }
                _ => break,
            }
        }
    }

    fn long_bracket_level(&self) -> Option<usize> {
        let mut i = self.pos;
        if self.source.get(i) != Some(&b'[') {
            return None;
        }
        i += 1;
        let mut level = 0;
        while self.source.get(i) == Some(&b'=') {
            level += 1;
            i += 1;
        }
        if self.source.get(i) == Some(&b'[') {
            Some(level)
        } else {
            None
        }
    }

    fn skip_long_bracket(&mut self, level: usize) {
        self.pos += 2 + level; // consume [===[
        self.consume_long_bracket_body(level);
    }

    fn consume_long_bracket_body(&mut self, level: usize) -> usize {
        let body_start = self.pos;
        loop {
            if self.at_eof() {
                break;
            }
            if self.peek() == Some(b']') {
                let close_start = self.pos;
                let mut i = self.pos + 1;
                let mut eq = 0;
                while self.source.get(i) == Some(&b'=') {
                    eq += 1;
                    i += 1;
                }
                if eq == level && self.source.get(i) == Some(&b']') {
                    self.pos = i + 1;
                    return close_start;
                }
            }
            self.pos += 1;
        }
        body_start
    }

    fn scan_token(&mut self, interner: &mut Interner) {
        let start = self.pos;
        let b = self.advance().unwrap();
        let kind = match b {
            b'+' => TokenType::Plus,
            b'-' => TokenType::Minus,
            b'*' => TokenType::Star,
            b'/' => {
                if self.peek() == Some(b'/') {
                    self.pos += 1;
                    TokenType::DoubleSlash
                } else {
                    TokenType::Slash
                }
            }
            b'%' => TokenType::Percent,
            b'^' => TokenType::Caret,
            b'#' => TokenType::Hash,
            b'&' => TokenType::Ampersand,
            b'~' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    TokenType::NotEq
                } else {
                    TokenType::Tilde
                }
            }
            b'|' => TokenType::Pipe,
            b'<' => {
                if self.peek() == Some(b'<') {
                    self.pos += 1;
                    TokenType::LtLt
                } else if self.peek() == Some(b'=') {
                    self.pos += 1;
                    TokenType::LtEq
                } else {
                    TokenType::Lt
                }
            }
            b'>' => {
                if self.peek() == Some(b'>') {
                    self.pos += 1;
                    TokenType::GtGt
                } else if self.peek() == Some(b'=') {
                    self.pos += 1;
                    TokenType::GtEq
                } else {
                    TokenType::Gt
                }
            }
            b'=' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    TokenType::EqEq
                } else {
                    TokenType::Eq
                }
            }
            b'(' => TokenType::LParen,
            b')' => TokenType::RParen,
            b'{' => TokenType::LBrace,
            b'}' => TokenType::RBrace,
            b'[' => {
                self.pos -= 1;
                if let Some(level) = self.long_bracket_level() {
                    return self.scan_long_string(start, level, interner);
                }
                self.pos += 1;
                TokenType::LBracket
            }
            b']' => TokenType::RBracket,
            b':' => {
                if self.peek() == Some(b':') {
                    self.pos += 1;
                    TokenType::DoubleColon
                } else {
                    TokenType::Colon
                }
            }
            b';' => TokenType::Semicolon,
            b',' => TokenType::Comma,
            b'.' => {
                if self.peek() == Some(b'.') {
                    self.pos += 1;
                    if self.peek() == Some(b'.') {
                        self.pos += 1;
                        TokenType::Ellipsis
                    } else {
                        TokenType::DotDot
                    }
                } else if self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                    self.pos -= 1;
                    return self.scan_number(start, interner);
                } else {
                    TokenType::Dot
                }
            }
            b'"' | b'\'' => return self.scan_string(start, b, interner),
            b'0'..=b'9' => {
                self.pos -= 1;
                return self.scan_number(start, interner);
            }
            c if is_ident_start(c) => {
                self.pos -= 1;
                return self.scan_identifier(start, interner);
            }
            other => {
                self.errors.push(ParseError::new(
                    ParseErrorKind::UnexpectedCharacter { found: other as char },
                    Span::new(start as u32, self.pos as u32),
                ));
                return;
            }
        };
        let lexeme = interner.intern(self.text(start, self.pos));
        self.tokens
            .push(Token::new(kind, lexeme, Span::new(start as u32, self.pos as u32)));
    }

    fn scan_identifier(&mut self, start: usize, interner: &mut Interner) {
        while self.peek().map(is_ident_continue).unwrap_or(false) {
            self.pos += 1;
        }
        let text = self.text(start, self.pos);
        let kind = TokenType::keyword_lookup(text).unwrap_or(TokenType::Identifier);
        let lexeme = interner.intern(text);
        self.tokens
            .push(Token::new(kind, lexeme, Span::new(start as u32, self.pos as u32)));
    }

    fn scan_number(&mut self, start: usize, interner: &mut Interner) {
        let hex = self.peek() == Some(b'0')
            && matches!(self.peek_at(1), Some(b'x') | Some(b'X'));
        if hex {
            self.pos += 2;
            while self
                .peek()
                .map(|c| c.is_ascii_hexdigit() || c == b'.')
                .unwrap_or(false)
            {
                self.pos += 1;
            }
            if matches!(self.peek(), Some(b'p') | Some(b'P')) {
                self.pos += 1;
                if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                    self.pos += 1;
                }
                while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                    self.pos += 1;
                }
            }
        } else {
            while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                self.pos += 1;
            }
            if self.peek() == Some(b'.') {
                self.pos += 1;
                while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                    self.pos += 1;
                }
            }
            if matches!(self.peek(), Some(b'e') | Some(b'E')) {
                self.pos += 1;
                if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                    self.pos += 1;
                }
                while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                    self.pos += 1;
                }
            }
        }
        let text = self.text(start, self.pos);
        let lexeme = interner.intern(text);
        self.tokens.push(Token::new(
            TokenType::NumberLiteral,
            lexeme,
            Span::new(start as u32, self.pos as u32),
        ));
    }

    fn scan_string(&mut self, start: usize, quote: u8, interner: &mut Interner) {
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    self.errors.push(ParseError::new(
                        ParseErrorKind::UnterminatedString,
                        Span::new(start as u32, self.pos as u32),
                    ));
                    break;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.advance() {
                        Some(b'n') => value.push('\n'),
                        Some(b't') => value.push('\t'),
                        Some(b'r') => value.push('\r'),
                        Some(b'\\') => value.push('\\'),
                        Some(b'"') => value.push('"'),
                        Some(b'\'') => value.push('\''),
                        Some(other) => value.push(other as char),
                        None => {}
                    }
                }
                Some(c) => {
                    value.push(c as char);
                    self.pos += 1;
                }
            }
        }
        let lexeme = interner.intern(&value);
        self.tokens.push(Token::new(
            TokenType::StringLiteral,
            lexeme,
            Span::new(start as u32, self.pos as u32),
        ));
    }

    fn scan_long_string(&mut self, start: usize, level: usize, interner: &mut Interner) {
        self.pos += 2 + level;
        if self.peek() == Some(b'\n') {
            self.pos += 1;
        }
        let body_start = self.pos;
        let close_start = self.consume_long_bracket_body(level);
        let text = self.text(body_start, close_start.max(body_start));
        let lexeme = interner.intern(text);
        self.tokens.push(Token::new(
            TokenType::StringLiteral,
            lexeme,
            Span::new(start as u32, self.pos as u32),
        ));
    }

    fn text(&self, start: usize, end: usize) -> &'a str {
        std::str::from_utf8(&self.source[start..end]).unwrap_or("")
    }
}

fn is_ident_start(c: u8) -> bool {
    c == b'_' || c.is_ascii_alphabetic()
}

fn is_ident_continue(c: u8) -> bool {
    c == b'_' || c.is_ascii_alphanumeric()
}

pub fn tokenize(source: &str, interner: &mut Interner) -> (Vec<Token>, Vec<Span>, Vec<ParseError>) {
    Lexer::new(source).tokenize(interner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenType> {
        let mut interner = Interner::new();
        let (tokens, _comments, errors) = tokenize(source, &mut interner);
        assert!(errors.is_empty(), "unexpected lexer errors: {errors:?}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_local_assignment() {
        let kinds = kinds("local x = 1");
        assert_eq!(
            kinds,
            vec![
                TokenType::Local,
                TokenType::Identifier,
                TokenType::Eq,
                TokenType::NumberLiteral,
                TokenType::Eof
            ]
        );
    }

    #[test]
    fn tokenizes_member_and_call() {
        let kinds = kinds("context.user.id");
        assert_eq!(
            kinds,
            vec![
                TokenType::Identifier,
                TokenType::Dot,
                TokenType::Identifier,
                TokenType::Dot,
                TokenType::Identifier,
                TokenType::Eof
            ]
        );
    }

    #[test]
    fn skips_line_comment() {
        let kinds = kinds("-- comment\nlocal y = 2");
        assert_eq!(kinds[0], TokenType::Local);
    }

    #[test]
    fn skips_long_comment() {
        let kinds = kinds("--[[ block\ncomment ]]\nreturn nil");
        assert_eq!(kinds[0], TokenType::Return);
    }

    #[test]
    fn tokenizes_string_literal() {
        let mut interner = Interner::new();
        let (tokens, _comments, errors) = tokenize("\"hello\"", &mut interner);
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenType::StringLiteral);
        assert_eq!(interner.resolve(tokens[0].lexeme), "hello");
    }

    #[test]
    fn tokenizes_long_string() {
        let mut interner = Interner::new();
        let (tokens, _comments, errors) = tokenize("[[raw text]]", &mut interner);
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenType::StringLiteral);
        assert_eq!(interner.resolve(tokens[0].lexeme), "raw text");
    }

    #[test]
    fn unterminated_string_reports_error() {
        let mut interner = Interner::new();
        let (_, _comments, errors) = tokenize("\"unterminated", &mut interner);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ParseErrorKind::UnterminatedString);
    }

    #[test]
    fn tokenizes_hex_and_float_numbers() {
        let kinds = kinds("0xFF 3.14 1e10");
        assert_eq!(
            kinds,
            vec![
                TokenType::NumberLiteral,
                TokenType::NumberLiteral,
                TokenType::NumberLiteral,
                TokenType::Eof
            ]
        );
    }

    #[test]
    fn every_span_is_within_source_bounds() {
        let source = "local t = { a = 1, b = helpers.fetch(\"x\") }";
        let mut interner = Interner::new();
        let (tokens, _comments, _) = tokenize(source, &mut interner);
        for t in &tokens {
            assert!(t.span.start as usize <= source.len());
            assert!(t.span.end as usize <= source.len());
        }
    }

    #[test]
    fn captures_line_comment_span() {
        let mut interner = Interner::new();
        let (_, comments, _) = tokenize("-- doc\nlocal x = 1", &mut interner);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0], Span::new(0, 6));
    }

    #[test]
    fn captures_block_comment_span() {
        let mut interner = Interner::new();
        let (_, comments, _) = tokenize("--[[ doc ]]\nlocal x = 1", &mut interner);
        assert_eq!(comments.len(), 1);
    }
}
