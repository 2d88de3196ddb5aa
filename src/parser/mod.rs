//! Recursive-descent parser for the Script Language (a Lua 5.3 dialect).
//!
//! The parser never aborts: every `parse_*` method returns a best-effort
//! node even after recording an error, so a half-edited buffer still
//! produces a usable (if partial) `Chunk` for completion and scope
//! analysis to work with.

use crate::ast::*;
use crate::error::{ParseError, ParseErrorKind};
use crate::intern::{Interner, Symbol};
use crate::pos::Span;
use crate::token::{Token, TokenType};

pub struct ParseResult {
    pub chunk: Chunk,
    pub errors: Vec<ParseError>,
}

pub fn parse(tokens: &[Token], interner: &mut Interner) -> ParseResult {
    let mut parser = Parser::new(tokens);
    let chunk = parser.parse_chunk();
    ParseResult { chunk, errors: parser.errors }
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    errors: Vec<ParseError>,
    next_id: u32,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Parser { tokens, pos: 0, errors: Vec::new(), next_id: 0 }
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> TokenType {
        self.current().kind
    }

    fn span(&self) -> Span {
        self.current().span
    }

    fn at_end(&self) -> bool {
        self.kind() == TokenType::Eof
    }

    fn advance(&mut self) -> Token {
        let tok = *self.current();
        if !self.at_end() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: TokenType) -> bool {
        self.kind() == kind
    }

    fn eat(&mut self, kind: TokenType) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenType, expected: &'static str) -> Token {
        if self.check(kind) {
            self.advance()
        } else {
            let found = self.describe_current();
            self.errors.push(ParseError::new(
                ParseErrorKind::ExpectedToken { expected, found },
                self.span(),
            ));
            // Synthesize a zero-width token at the current position so
            // downstream span math stays well-formed.
            Token::new(kind, Symbol::EMPTY, Span::new(self.span().start, self.span().start))
        }
    }

    fn describe_current(&self) -> String {
        if self.at_end() {
            "<eof>".to_string()
        } else {
            format!("{:?}", self.kind())
        }
    }

    fn expect_identifier(&mut self) -> (Symbol, Span) {
        if self.check(TokenType::Identifier) {
            let tok = self.advance();
            (tok.lexeme, tok.span)
        } else {
            let found = self.describe_current();
            self.errors.push(ParseError::new(
                ParseErrorKind::ExpectedIdentifier { found },
                self.span(),
            ));
            (Symbol::EMPTY, Span::new(self.span().start, self.span().start))
        }
    }

    // ---- chunk / block ----------------------------------------------

    fn parse_chunk(&mut self) -> Chunk {
        let start = self.span().start;
        let body = self.parse_block();
        let end = self.tokens.last().map(|t| t.span.end).unwrap_or(start);
        Chunk { body, span: Span::new(start, end) }
    }

    /// Parses statements until a block terminator (`end`, `else`, `elseif`,
    /// `until`, eof) is reached.
    fn parse_block(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        while !self.kind().is_block_terminator() {
            if self.eat(TokenType::Semicolon) {
                continue;
            }
            let before = self.pos;
            let stmt = self.parse_statement();
            let is_return = matches!(stmt.kind, StmtKind::Return(_));
            stmts.push(stmt);
            if is_return {
                break;
            }
            if self.pos == before {
                // Parser made no progress (unexpected token); skip it to
                // avoid looping forever on malformed input.
                self.advance();
            }
        }
        stmts
    }

    fn parse_statement(&mut self) -> Stmt {
        let start = self.span().start;
        let id = self.fresh_id();
        let kind = match self.kind() {
            TokenType::Local => self.parse_local(),
            TokenType::If => self.parse_if(),
            TokenType::While => self.parse_while(),
            TokenType::Repeat => self.parse_repeat(),
            TokenType::Do => self.parse_do(),
            TokenType::For => self.parse_for(),
            TokenType::Function => self.parse_function_decl(),
            TokenType::Return => self.parse_return(),
            TokenType::Break => {
                self.advance();
                StmtKind::Break
            }
            TokenType::DoubleColon => self.parse_label(),
            TokenType::Goto => {
                self.advance();
                let (name, _) = self.expect_identifier();
                StmtKind::Goto(name)
            }
            _ => self.parse_expr_statement(),
        };
        let end = self.tokens[self.pos.saturating_sub(1).max(0)].span.end.max(start);
        Stmt { id, span: Span::new(start, end), kind }
    }

    fn parse_label(&mut self) -> StmtKind {
        self.advance();
        let (name, _) = self.expect_identifier();
        self.expect(TokenType::DoubleColon, "'::'");
        StmtKind::Label(name)
    }

    fn parse_local(&mut self) -> StmtKind {
        self.advance();
        if self.eat(TokenType::Function) {
            let (name, name_span) = self.expect_identifier();
            let (params, is_vararg) = self.parse_param_list();
            let body_span_start = self.span().start;
            let body = self.parse_block();
            let body_span = Span::new(body_span_start, self.span().start);
            self.expect(TokenType::End, "'end'");
            return StmtKind::FunctionDecl(FunctionDeclStmt {
                name_path: vec![(name, name_span)],
                is_method: false,
                is_local: true,
                params,
                is_vararg,
                body,
                body_span,
            });
        }
        let mut names = vec![self.expect_identifier()];
        while self.eat(TokenType::Comma) {
            names.push(self.expect_identifier());
        }
        let init = if self.eat(TokenType::Eq) {
            self.parse_expr_list()
        } else {
            Vec::new()
        };
        StmtKind::Local(LocalStmt { names, init })
    }

    fn parse_param_list(&mut self) -> (Vec<(Symbol, Span)>, bool) {
        self.expect(TokenType::LParen, "'('");
        let mut params = Vec::new();
        let mut is_vararg = false;
        if !self.check(TokenType::RParen) {
            loop {
                if self.check(TokenType::Ellipsis) {
                    self.advance();
                    is_vararg = true;
                    break;
                }
                params.push(self.expect_identifier());
                if !self.eat(TokenType::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenType::RParen, "')'");
        (params, is_vararg)
    }

    fn parse_if(&mut self) -> StmtKind {
        self.advance();
        let mut clauses = Vec::new();
        loop {
            let condition = self.parse_expr();
            self.expect(TokenType::Then, "'then'");
            let body_start = self.span().start;
            let body = self.parse_block();
            let body_span = Span::new(body_start, self.span().start);
            clauses.push(IfClause { condition, body, body_span });
            if self.eat(TokenType::Elseif) {
                continue;
            }
            break;
        }
        let (else_body, else_span) = if self.eat(TokenType::Else) {
            let start = self.span().start;
            let body = self.parse_block();
            (Some(body), Some(Span::new(start, self.span().start)))
        } else {
            (None, None)
        };
        self.expect(TokenType::End, "'end'");
        StmtKind::If(IfStmt { clauses, else_body, else_span })
    }

    fn parse_while(&mut self) -> StmtKind {
        self.advance();
        let condition = self.parse_expr();
        self.expect(TokenType::Do, "'do'");
        let body_start = self.span().start;
        let body = self.parse_block();
        let body_span = Span::new(body_start, self.span().start);
        self.expect(TokenType::End, "'end'");
        StmtKind::While(WhileStmt { condition, body, body_span })
    }

    fn parse_repeat(&mut self) -> StmtKind {
        self.advance();
        let body_start = self.span().start;
        let body = self.parse_block();
        let body_span = Span::new(body_start, self.span().start);
        self.expect(TokenType::Until, "'until'");
        let condition = self.parse_expr();
        StmtKind::Repeat(RepeatStmt { body, body_span, condition })
    }

    fn parse_do(&mut self) -> StmtKind {
        self.advance();
        let body_start = self.span().start;
        let body = self.parse_block();
        let body_span = Span::new(body_start, self.span().start);
        self.expect(TokenType::End, "'end'");
        StmtKind::Do(DoStmt { body, body_span })
    }

    fn parse_for(&mut self) -> StmtKind {
        self.advance();
        let first = self.expect_identifier();
        if self.eat(TokenType::Eq) {
            let start_expr = self.parse_expr();
            self.expect(TokenType::Comma, "','");
            let stop = self.parse_expr();
            let step = if self.eat(TokenType::Comma) { Some(self.parse_expr()) } else { None };
            self.expect(TokenType::Do, "'do'");
            let body_start = self.span().start;
            let body = self.parse_block();
            let body_span = Span::new(body_start, self.span().start);
            self.expect(TokenType::End, "'end'");
            StmtKind::ForNumeric(ForNumericStmt { var: first, start: start_expr, stop, step, body, body_span })
        } else {
            let mut names = vec![first];
            while self.eat(TokenType::Comma) {
                names.push(self.expect_identifier());
            }
            self.expect(TokenType::In, "'in'");
            let iterators = self.parse_expr_list();
            self.expect(TokenType::Do, "'do'");
            let body_start = self.span().start;
            let body = self.parse_block();
            let body_span = Span::new(body_start, self.span().start);
            self.expect(TokenType::End, "'end'");
            StmtKind::ForGeneric(ForGenericStmt { names, iterators, body, body_span })
        }
    }

    fn parse_function_decl(&mut self) -> StmtKind {
        self.advance();
        let mut name_path = vec![self.expect_identifier()];
        let mut is_method = false;
        loop {
            if self.eat(TokenType::Dot) {
                name_path.push(self.expect_identifier());
            } else if self.eat(TokenType::Colon) {
                name_path.push(self.expect_identifier());
                is_method = true;
                break;
            } else {
                break;
            }
        }
        let (mut params, is_vararg) = self.parse_param_list();
        if is_method {
            params.insert(0, (Symbol::EMPTY, Span::default()));
        }
        let body_start = self.span().start;
        let body = self.parse_block();
        let body_span = Span::new(body_start, self.span().start);
        self.expect(TokenType::End, "'end'");
        StmtKind::FunctionDecl(FunctionDeclStmt {
            name_path,
            is_method,
            is_local: false,
            params,
            is_vararg,
            body,
            body_span,
        })
    }

    fn parse_return(&mut self) -> StmtKind {
        self.advance();
        let arguments = if self.kind().is_block_terminator() || self.check(TokenType::Semicolon) {
            Vec::new()
        } else {
            self.parse_expr_list()
        };
        self.eat(TokenType::Semicolon);
        StmtKind::Return(ReturnStmt { arguments })
    }

    /// A leading-expression statement is either a bare call (`f(x)`) or the
    /// first target of an assignment (`a.b, c = 1, 2`).
    fn parse_expr_statement(&mut self) -> StmtKind {
        let first = self.parse_suffixed_expr();
        if self.check(TokenType::Eq) || self.check(TokenType::Comma) {
            let mut targets = vec![first];
            while self.eat(TokenType::Comma) {
                targets.push(self.parse_suffixed_expr());
            }
            self.expect(TokenType::Eq, "'='");
            let values = self.parse_expr_list();
            StmtKind::Assignment(AssignmentStmt { targets, values })
        } else {
            StmtKind::Call(first)
        }
    }

    // ---- expressions ---------------------------------------------------

    fn parse_expr_list(&mut self) -> Vec<Expr> {
        let mut exprs = vec![self.parse_expr()];
        while self.eat(TokenType::Comma) {
            exprs.push(self.parse_expr());
        }
        exprs
    }

    fn parse_expr(&mut self) -> Expr {
        self.parse_binary_expr(0)
    }

    fn parse_binary_expr(&mut self, min_bp: u8) -> Expr {
        let mut left = self.parse_unary_expr();
        loop {
            let (op_bp, right_assoc) = match binding_power(self.kind()) {
                Some(bp) => bp,
                None => break,
            };
            if op_bp < min_bp {
                break;
            }
            let op_tok = self.advance();
            let next_min = if right_assoc { op_bp } else { op_bp + 1 };
            let right = self.parse_binary_expr(next_min);
            let span = Span::new(left.span.start, right.span.end);
            left = if let Some(op) = to_binary_op(op_tok.kind) {
                Expr {
                    id: self.fresh_id(),
                    span,
                    kind: ExprKind::Binary(BinaryExpr { op, left: Box::new(left), right: Box::new(right) }),
                }
            } else if let Some(op) = to_logical_op(op_tok.kind) {
                Expr {
                    id: self.fresh_id(),
                    span,
                    kind: ExprKind::Logical(LogicalExpr { op, left: Box::new(left), right: Box::new(right) }),
                }
            } else {
                left
            };
        }
        left
    }

    fn parse_unary_expr(&mut self) -> Expr {
        let start = self.span().start;
        let op = match self.kind() {
            TokenType::Minus => Some(UnaryOp::Neg),
            TokenType::Not => Some(UnaryOp::Not),
            TokenType::Hash => Some(UnaryOp::Len),
            TokenType::Tilde => Some(UnaryOp::BNot),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary_expr();
            let span = Span::new(start, operand.span.end);
            return Expr {
                id: self.fresh_id(),
                span,
                kind: ExprKind::Unary(UnaryExpr { op, operand: Box::new(operand) }),
            };
        }
        self.parse_pow_expr()
    }

    /// `^` is right-associative and binds tighter than unary operators on
    /// its left but looser on its right, per Lua's grammar (`-2^2 == -4`).
    fn parse_pow_expr(&mut self) -> Expr {
        let base = self.parse_suffixed_expr();
        if self.check(TokenType::Caret) {
            self.advance();
            let exponent = self.parse_unary_expr();
            let span = Span::new(base.span.start, exponent.span.end);
            return Expr {
                id: self.fresh_id(),
                span,
                kind: ExprKind::Binary(BinaryExpr {
                    op: BinaryOp::Pow,
                    left: Box::new(base),
                    right: Box::new(exponent),
                }),
            };
        }
        base
    }

    fn parse_suffixed_expr(&mut self) -> Expr {
        let mut expr = self.parse_primary_expr();
        loop {
            expr = match self.kind() {
                TokenType::Dot => {
                    self.advance();
                    let (property, property_span) = self.expect_identifier();
                    let span = Span::new(expr.span.start, property_span.end);
                    Expr {
                        id: self.fresh_id(),
                        span,
                        kind: ExprKind::Member(MemberExpr { base: Box::new(expr), property, property_span }),
                    }
                }
                TokenType::LBracket => {
                    self.advance();
                    let index = self.parse_expr();
                    let close = self.expect(TokenType::RBracket, "']'");
                    let span = Span::new(expr.span.start, close.span.end);
                    Expr {
                        id: self.fresh_id(),
                        span,
                        kind: ExprKind::Index(IndexExpr { base: Box::new(expr), index: Box::new(index) }),
                    }
                }
                TokenType::Colon => {
                    self.advance();
                    let (method, method_span) = self.expect_identifier();
                    let arguments = self.parse_call_arguments();
                    let span = Span::new(expr.span.start, self.span().start.max(method_span.end));
                    Expr {
                        id: self.fresh_id(),
                        span,
                        kind: ExprKind::MethodCall(MethodCallExpr {
                            base: Box::new(expr),
                            method,
                            method_span,
                            arguments,
                        }),
                    }
                }
                TokenType::LParen | TokenType::StringLiteral | TokenType::LBrace => {
                    let arguments = self.parse_call_arguments();
                    let span = Span::new(expr.span.start, self.tokens[self.pos.saturating_sub(1)].span.end);
                    Expr {
                        id: self.fresh_id(),
                        span,
                        kind: ExprKind::Call(CallExpr { callee: Box::new(expr), arguments }),
                    }
                }
                _ => break,
            };
        }
        expr
    }

    fn parse_call_arguments(&mut self) -> Vec<Expr> {
        match self.kind() {
            TokenType::LParen => {
                self.advance();
                let args = if self.check(TokenType::RParen) {
                    Vec::new()
                } else {
                    self.parse_expr_list()
                };
                self.expect(TokenType::RParen, "')'");
                args
            }
            TokenType::StringLiteral => {
                let tok = self.advance();
                vec![Expr { id: self.fresh_id(), span: tok.span, kind: ExprKind::Str(tok.lexeme) }]
            }
            TokenType::LBrace => {
                vec![self.parse_table()]
            }
            _ => Vec::new(),
        }
    }

    fn parse_primary_expr(&mut self) -> Expr {
        let start = self.span().start;
        let id = self.fresh_id();
        match self.kind() {
            TokenType::Nil => {
                self.advance();
                Expr { id, span: Span::new(start, self.tokens[self.pos - 1].span.end), kind: ExprKind::Nil }
            }
            TokenType::True => {
                self.advance();
                Expr { id, span: Span::new(start, self.tokens[self.pos - 1].span.end), kind: ExprKind::True }
            }
            TokenType::False => {
                self.advance();
                Expr { id, span: Span::new(start, self.tokens[self.pos - 1].span.end), kind: ExprKind::False }
            }
            TokenType::Ellipsis => {
                self.advance();
                Expr { id, span: Span::new(start, self.tokens[self.pos - 1].span.end), kind: ExprKind::Vararg }
            }
            TokenType::NumberLiteral => {
                let tok = self.advance();
                Expr { id, span: tok.span, kind: ExprKind::Number(tok.lexeme) }
            }
            TokenType::StringLiteral => {
                let tok = self.advance();
                Expr { id, span: tok.span, kind: ExprKind::Str(tok.lexeme) }
            }
            TokenType::Identifier => {
                let tok = self.advance();
                Expr { id, span: tok.span, kind: ExprKind::Identifier(tok.lexeme) }
            }
            TokenType::LBrace => self.parse_table(),
            TokenType::Function => self.parse_function_expr(),
            TokenType::LParen => {
                self.advance();
                let inner = self.parse_expr();
                let close = self.expect(TokenType::RParen, "')'");
                Expr {
                    id,
                    span: Span::new(start, close.span.end),
                    kind: ExprKind::Paren(Box::new(inner)),
                }
            }
            _ => {
                let found = self.describe_current();
                self.errors.push(ParseError::new(ParseErrorKind::ExpectedExpression { found }, self.span()));
                Expr { id, span: Span::new(start, start), kind: ExprKind::Nil }
            }
        }
    }

    fn parse_function_expr(&mut self) -> Expr {
        let start = self.span().start;
        let id = self.fresh_id();
        self.advance();
        let (params, is_vararg) = self.parse_param_list();
        let body_start = self.span().start;
        let body = self.parse_block();
        let body_span = Span::new(body_start, self.span().start);
        let end_tok = self.expect(TokenType::End, "'end'");
        Expr {
            id,
            span: Span::new(start, end_tok.span.end),
            kind: ExprKind::Function(FunctionExpr { params, is_vararg, body, body_span }),
        }
    }

    fn parse_table(&mut self) -> Expr {
        let start = self.span().start;
        let id = self.fresh_id();
        self.advance(); // {
        let mut fields = Vec::new();
        while !self.check(TokenType::RBrace) && !self.at_end() {
            let field = if self.check(TokenType::LBracket) {
                self.advance();
                let key = self.parse_expr();
                self.expect(TokenType::RBracket, "']'");
                self.expect(TokenType::Eq, "'='");
                let value = self.parse_expr();
                TableField::Keyed { key: Box::new(key), value: Box::new(value) }
            } else if self.check(TokenType::Identifier) && self.peek_is(1, TokenType::Eq) {
                let (name, name_span) = self.expect_identifier();
                self.advance(); // =
                let value = self.parse_expr();
                TableField::Named { name, name_span, value: Box::new(value) }
            } else {
                TableField::Positional { value: Box::new(self.parse_expr()) }
            };
            fields.push(field);
            if !self.eat(TokenType::Comma) && !self.eat(TokenType::Semicolon) {
                break;
            }
        }
        let close = self.expect(TokenType::RBrace, "'}'");
        Expr {
            id,
            span: Span::new(start, close.span.end),
            kind: ExprKind::Table(TableConstructor { fields }),
        }
    }

    fn peek_is(&self, offset: usize, kind: TokenType) -> bool {
        self.tokens.get(self.pos + offset).map(|t| t.kind) == Some(kind)
    }
}

fn binding_power(kind: TokenType) -> Option<(u8, bool)> {
    use TokenType::*;
    Some(match kind {
        Or => (1, false),
        And => (2, false),
        Lt | Gt | LtEq | GtEq | NotEq | EqEq => (3, false),
        Pipe => (4, false),
        Tilde => (5, false),
        Ampersand => (6, false),
        LtLt | GtGt => (7, false),
        DotDot => (9, true),
        Plus | Minus => (10, false),
        Star | Slash | DoubleSlash | Percent => (11, false),
        _ => return None,
    })
}

fn to_binary_op(kind: TokenType) -> Option<BinaryOp> {
    use TokenType::*;
    Some(match kind {
        Plus => BinaryOp::Add,
        Minus => BinaryOp::Sub,
        Star => BinaryOp::Mul,
        Slash => BinaryOp::Div,
        DoubleSlash => BinaryOp::FloorDiv,
        Percent => BinaryOp::Mod,
        Caret => BinaryOp::Pow,
        DotDot => BinaryOp::Concat,
        EqEq => BinaryOp::Eq,
        NotEq => BinaryOp::NotEq,
        Lt => BinaryOp::Lt,
        LtEq => BinaryOp::LtEq,
        Gt => BinaryOp::Gt,
        GtEq => BinaryOp::GtEq,
        Ampersand => BinaryOp::BAnd,
        Pipe => BinaryOp::BOr,
        Tilde => BinaryOp::BXor,
        LtLt => BinaryOp::Shl,
        GtGt => BinaryOp::Shr,
        _ => return None,
    })
}

fn to_logical_op(kind: TokenType) -> Option<LogicalOp> {
    match kind {
        TokenType::And => Some(LogicalOp::And),
        TokenType::Or => Some(LogicalOp::Or),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_source(source: &str) -> (ParseResult, Interner) {
        let mut interner = Interner::new();
        let (tokens, _comments, _) = tokenize(source, &mut interner);
        (parse(&tokens, &mut interner), interner)
    }

    #[test]
    fn parses_local_assignment() {
        let (result, _) = parse_source("local x = 1");
        assert!(result.errors.is_empty());
        assert_eq!(result.chunk.body.len(), 1);
        assert!(matches!(result.chunk.body[0].kind, StmtKind::Local(_)));
    }

    #[test]
    fn parses_member_and_call_chain() {
        let (result, _) = parse_source("context.helpers.fetch(context.user.id)");
        assert!(result.errors.is_empty());
        assert_eq!(result.chunk.body.len(), 1);
        assert!(matches!(result.chunk.body[0].kind, StmtKind::Call(_)));
    }

    #[test]
    fn parses_if_with_elseif_and_else() {
        let (result, _) = parse_source(
            "if x then\n  return 1\nelseif y then\n  return 2\nelse\n  return 3\nend",
        );
        assert!(result.errors.is_empty());
        match &result.chunk.body[0].kind {
            StmtKind::If(s) => {
                assert_eq!(s.clauses.len(), 2);
                assert!(s.else_body.is_some());
            }
            other => panic!("expected if statement, got {other:?}"),
        }
    }

    #[test]
    fn parses_generic_for() {
        let (result, _) = parse_source("for k, v in pairs(t) do\n  print(k)\nend");
        assert!(result.errors.is_empty());
        assert!(matches!(result.chunk.body[0].kind, StmtKind::ForGeneric(_)));
    }

    #[test]
    fn parses_function_declaration_with_params() {
        let (result, _) = parse_source("function add(a, b)\n  return a + b\nend");
        assert!(result.errors.is_empty());
        match &result.chunk.body[0].kind {
            StmtKind::FunctionDecl(f) => assert_eq!(f.params.len(), 2),
            other => panic!("expected function decl, got {other:?}"),
        }
    }

    #[test]
    fn parses_table_constructor_with_mixed_fields() {
        let (result, _) = parse_source("local t = { a = 1, [2] = \"x\", 3 }");
        assert!(result.errors.is_empty());
        match &result.chunk.body[0].kind {
            StmtKind::Local(l) => match &l.init[0].kind {
                ExprKind::Table(t) => assert_eq!(t.fields.len(), 3),
                other => panic!("expected table, got {other:?}"),
            },
            other => panic!("expected local, got {other:?}"),
        }
    }

    #[test]
    fn recovers_from_missing_then() {
        let (result, _) = parse_source("if x\n  return 1\nend");
        assert!(!result.errors.is_empty());
        assert_eq!(result.chunk.body.len(), 1);
    }

    #[test]
    fn every_node_span_within_source_bounds() {
        let source = "local t = helpers.fetch(\"https://example.com\")\nreturn { allowed = true }";
        let (result, _) = parse_source(source);
        assert!(result.errors.is_empty());
        for stmt in &result.chunk.body {
            assert!(stmt.span.end as usize <= source.len());
            assert!(stmt.span.start <= stmt.span.end);
        }
    }

    #[test]
    fn respects_power_right_associativity_and_unary_precedence() {
        // -2^2 should parse as -(2^2), matching Lua's documented grammar.
        let (result, _) = parse_source("local x = -2^2");
        assert!(result.errors.is_empty());
        match &result.chunk.body[0].kind {
            StmtKind::Local(l) => match &l.init[0].kind {
                ExprKind::Unary(u) => {
                    assert_eq!(u.op, UnaryOp::Neg);
                    assert!(matches!(u.operand.kind, ExprKind::Binary(_)));
                }
                other => panic!("expected unary, got {other:?}"),
            },
            other => panic!("expected local, got {other:?}"),
        }
    }

    #[test]
    fn method_call_sugar_parses() {
        let (result, _) = parse_source("obj:method(1, 2)");
        assert!(result.errors.is_empty());
        assert!(matches!(result.chunk.body[0].kind, StmtKind::Call(_)));
    }
}
