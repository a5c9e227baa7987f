//! Single-pass lexer for Sable source text.
//!
//! The lexer walks the UTF-8 source once, greedily matching the longest
//! lexeme at each position, and produces a token vector terminated by an
//! explicit [`TokenKind::Eof`] token.
//!
//! ## Location model
//!
//! Lines and columns are 1-based. A token's start position is captured
//! before its first character is consumed, the end position after its
//! last; newlines inside a lexeme (block comments) advance the line
//! counter normally.
//!
//! ## Errors
//!
//! No lexer error is fatal. Unterminated literals and comments, bad
//! escapes, malformed exponents, and misplaced suffixes are reported
//! through the [`Diagnostics`] sink, an [`TokenKind::Error`] token is
//! emitted to keep the stream synchronized, and scanning continues.

use crate::token::{LiteralValue, Token, TokenKind};
use sable_base::{Diagnostics, ErrorKind, Interner, SourceLocation, Symbol};

pub struct Lexer<'src, 'ctx> {
    source: &'src str,
    interner: &'ctx mut Interner,
    file: Symbol,
    /// Byte offset of the next unread character.
    pos: usize,
    line: u32,
    col: u32,
    /// Start state of the lexeme currently being scanned.
    start_pos: usize,
    start_line: u32,
    start_col: u32,
}

impl<'src, 'ctx> Lexer<'src, 'ctx> {
    pub fn new(source: &'src str, filename: &str, interner: &'ctx mut Interner) -> Self {
        let file = interner.intern(filename);
        Lexer {
            source,
            interner,
            file,
            pos: 0,
            line: 1,
            col: 1,
            start_pos: 0,
            start_line: 1,
            start_col: 1,
        }
    }

    /// Lexes the whole source, reporting problems into `diags`.
    pub fn tokenize(mut self, diags: &mut Diagnostics) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia(diags);
            self.mark_start();
            let Some(ch) = self.peek() else {
                tokens.push(Token::new(
                    TokenKind::Eof,
                    Symbol::EMPTY,
                    SourceLocation::point(self.file, self.line, self.col),
                ));
                break;
            };
            let token = self.scan_token(ch, diags);
            tokens.push(token);
        }
        tokens
    }

    // === Cursor primitives ===

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.source[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn mark_start(&mut self) {
        self.start_pos = self.pos;
        self.start_line = self.line;
        self.start_col = self.col;
    }

    /// Location from the marked lexeme start to the current position.
    fn span(&self) -> SourceLocation {
        SourceLocation::new(self.file, self.start_line, self.start_col, self.line, self.col)
    }

    /// Location pointing at the marked lexeme start only.
    fn start_point(&self) -> SourceLocation {
        SourceLocation::point(self.file, self.start_line, self.start_col)
    }

    fn lexeme_text(&self) -> &'src str {
        &self.source[self.start_pos..self.pos]
    }

    fn make(&mut self, kind: TokenKind) -> Token {
        let lexeme = self.interner.intern(&self.source[self.start_pos..self.pos]);
        Token::new(kind, lexeme, self.span())
    }

    fn make_literal(&mut self, kind: TokenKind, value: LiteralValue) -> Token {
        let lexeme = self.interner.intern(&self.source[self.start_pos..self.pos]);
        Token::with_literal(kind, lexeme, self.span(), value)
    }

    fn error_token(&mut self, diags: &mut Diagnostics, message: String, at: SourceLocation) -> Token {
        diags.report(ErrorKind::Lex, message, at);
        self.make(TokenKind::Error)
    }

    // === Trivia ===

    fn skip_trivia(&mut self, diags: &mut Diagnostics) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_second() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_second() == Some('*') => {
                    self.mark_start();
                    self.advance();
                    self.advance();
                    let mut closed = false;
                    while let Some(c) = self.advance() {
                        if c == '*' && self.eat('/') {
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        diags.report(
                            ErrorKind::Lex,
                            "unterminated block comment",
                            self.start_point(),
                        );
                    }
                }
                _ => break,
            }
        }
    }

    // === Dispatch ===

    fn scan_token(&mut self, first: char, diags: &mut Diagnostics) -> Token {
        if first.is_ascii_alphabetic() || first == '_' {
            return self.scan_identifier();
        }
        if first.is_ascii_digit() {
            return self.scan_number(diags);
        }
        match first {
            '"' => self.scan_string(diags),
            '\'' => self.scan_char(diags),
            _ => self.scan_operator(diags),
        }
    }

    fn scan_identifier(&mut self) -> Token {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        match TokenKind::keyword(self.lexeme_text()) {
            Some(TokenKind::True) => self.make_literal(TokenKind::True, LiteralValue::Bool(true)),
            Some(TokenKind::False) => self.make_literal(TokenKind::False, LiteralValue::Bool(false)),
            Some(TokenKind::Null) => self.make_literal(TokenKind::Null, LiteralValue::Null),
            Some(kind) => self.make(kind),
            None => self.make(TokenKind::Identifier),
        }
    }

    // === Numbers ===

    fn scan_number(&mut self, diags: &mut Diagnostics) -> Token {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        let mut is_float = false;

        // Fractional part: consume '.' only when a digit follows, so that
        // `1.abs()` still lexes as int, dot, identifier.
        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            is_float = true;
            self.advance();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.advance();
            }
            if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                return self.error_token(
                    diags,
                    "exponent has no digits".to_string(),
                    self.start_point(),
                );
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Suffix, if any.
        let suffix = match self.peek() {
            Some(c @ ('l' | 'L' | 'f' | 'F' | 'd' | 'D')) => {
                self.advance();
                Some(c.to_ascii_uppercase())
            }
            _ => None,
        };

        let text = self.lexeme_text();
        let digits = match suffix {
            Some(_) => &text[..text.len() - 1],
            None => text,
        };

        match suffix {
            Some('L') => {
                if is_float {
                    return self.error_token(
                        diags,
                        "integer suffix 'L' on a floating-point literal".to_string(),
                        self.start_point(),
                    );
                }
                match digits.parse::<i64>() {
                    Ok(v) => self.make_literal(TokenKind::LongLiteral, LiteralValue::Int(v)),
                    Err(_) => self.error_token(
                        diags,
                        format!("integer literal '{digits}' is out of range"),
                        self.start_point(),
                    ),
                }
            }
            Some('F') => match digits.parse::<f64>() {
                Ok(v) => self.make_literal(TokenKind::FloatLiteral, LiteralValue::Float(v)),
                Err(_) => self.error_token(
                    diags,
                    format!("malformed float literal '{digits}'"),
                    self.start_point(),
                ),
            },
            Some('D') => match digits.parse::<f64>() {
                Ok(v) => self.make_literal(TokenKind::DoubleLiteral, LiteralValue::Float(v)),
                Err(_) => self.error_token(
                    diags,
                    format!("malformed double literal '{digits}'"),
                    self.start_point(),
                ),
            },
            None if is_float => match digits.parse::<f64>() {
                Ok(v) => self.make_literal(TokenKind::DoubleLiteral, LiteralValue::Float(v)),
                Err(_) => self.error_token(
                    diags,
                    format!("malformed numeric literal '{digits}'"),
                    self.start_point(),
                ),
            },
            None => match digits.parse::<i64>() {
                Ok(v) => self.make_literal(TokenKind::IntLiteral, LiteralValue::Int(v)),
                Err(_) => self.error_token(
                    diags,
                    format!("integer literal '{digits}' is out of range"),
                    self.start_point(),
                ),
            },
            Some(_) => unreachable!("suffix set is closed"),
        }
    }

    // === Strings and chars ===

    fn decode_escape(&mut self, diags: &mut Diagnostics) -> char {
        // Caller consumed the backslash.
        let at = SourceLocation::point(self.file, self.line, self.col);
        match self.advance() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('\\') => '\\',
            Some('"') => '"',
            Some('\'') => '\'',
            Some('0') => '\0',
            Some(other) => {
                diags.report(ErrorKind::Lex, format!("unknown escape '\\{other}'"), at);
                other
            }
            None => {
                diags.report(ErrorKind::Lex, "escape at end of file", at);
                '\0'
            }
        }
    }

    fn scan_string(&mut self, diags: &mut Diagnostics) -> Token {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return self.error_token(
                        diags,
                        "unterminated string literal".to_string(),
                        self.start_point(),
                    );
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    value.push(self.decode_escape(diags));
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }
        let sym = self.interner.intern(&value);
        self.make_literal(TokenKind::StringLiteral, LiteralValue::Str(sym))
    }

    fn scan_char(&mut self, diags: &mut Diagnostics) -> Token {
        self.advance(); // opening quote
        let mut value: Option<char> = None;
        let mut count = 0usize;
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return self.error_token(
                        diags,
                        "unterminated character literal".to_string(),
                        self.start_point(),
                    );
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let c = self.decode_escape(diags);
                    if value.is_none() {
                        value = Some(c);
                    }
                    count += 1;
                }
                Some(c) => {
                    self.advance();
                    if value.is_none() {
                        value = Some(c);
                    }
                    count += 1;
                }
            }
        }
        match (value, count) {
            (Some(c), 1) => self.make_literal(TokenKind::CharLiteral, LiteralValue::Char(c)),
            (None, _) => self.error_token(
                diags,
                "empty character literal".to_string(),
                self.start_point(),
            ),
            (Some(_), _) => self.error_token(
                diags,
                "character literal must contain exactly one character".to_string(),
                self.start_point(),
            ),
        }
    }

    // === Operators and punctuation ===

    fn scan_operator(&mut self, diags: &mut Diagnostics) -> Token {
        let ch = self.advance().expect("caller checked non-empty");
        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '~' => TokenKind::Tilde,
            '+' => {
                if self.eat('+') {
                    TokenKind::Increment
                } else if self.eat('=') {
                    TokenKind::PlusAssign
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.eat('-') {
                    TokenKind::Decrement
                } else if self.eat('=') {
                    TokenKind::MinusAssign
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.eat('=') {
                    TokenKind::StarAssign
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.eat('=') {
                    TokenKind::SlashAssign
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                if self.eat('=') {
                    TokenKind::PercentAssign
                } else {
                    TokenKind::Percent
                }
            }
            '=' => {
                if self.eat('=') {
                    TokenKind::EqEq
                } else if self.eat('>') {
                    TokenKind::FatArrow
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.eat('=') {
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::LtEq
                } else if self.peek() == Some('<') {
                    self.advance();
                    if self.eat('=') {
                        TokenKind::ShlAssign
                    } else {
                        TokenKind::Shl
                    }
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::GtEq
                } else if self.peek() == Some('>') {
                    self.advance();
                    if self.eat('=') {
                        TokenKind::ShrAssign
                    } else {
                        TokenKind::Shr
                    }
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if self.eat('&') {
                    TokenKind::AndAnd
                } else if self.eat('=') {
                    TokenKind::AmpAssign
                } else {
                    TokenKind::Amp
                }
            }
            '|' => {
                if self.eat('|') {
                    TokenKind::OrOr
                } else if self.eat('=') {
                    TokenKind::PipeAssign
                } else {
                    TokenKind::Pipe
                }
            }
            '^' => {
                if self.eat('=') {
                    TokenKind::CaretAssign
                } else {
                    TokenKind::Caret
                }
            }
            other => {
                return self.error_token(
                    diags,
                    format!("unexpected character '{other}'"),
                    self.start_point(),
                );
            }
        };
        self.make(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> (Vec<Token>, Diagnostics, Interner) {
        let mut interner = Interner::new();
        let mut diags = Diagnostics::new();
        let tokens = Lexer::new(source, "test.sb", &mut interner).tokenize(&mut diags);
        (tokens, diags, interner)
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_source_yields_only_eof() {
        let (tokens, diags, _) = lex("");
        assert_eq!(kinds(&tokens), vec![TokenKind::Eof]);
        assert!(!diags.has_errors());
    }

    #[test]
    fn lexing_is_deterministic() {
        let src = "class C { int x = 1 + 2; }";
        let (a, _, _) = lex(src);
        let (b, _, _) = lex(src);
        assert_eq!(kinds(&a), kinds(&b));
    }

    #[test]
    fn keywords_and_identifiers() {
        let (tokens, diags, interner) = lex("while whilex _x x9");
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::While,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
        assert_eq!(tokens[1].text(&interner), "whilex");
        assert!(!diags.has_errors());
    }

    #[test]
    fn greedy_multi_char_operators() {
        let (tokens, diags, _) = lex("<= >= == != && || ++ -- += -= *= /= %= << >> <<= >>= =>");
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Increment,
                TokenKind::Decrement,
                TokenKind::PlusAssign,
                TokenKind::MinusAssign,
                TokenKind::StarAssign,
                TokenKind::SlashAssign,
                TokenKind::PercentAssign,
                TokenKind::Shl,
                TokenKind::Shr,
                TokenKind::ShlAssign,
                TokenKind::ShrAssign,
                TokenKind::FatArrow,
                TokenKind::Eof
            ]
        );
        assert!(!diags.has_errors());
    }

    #[test]
    fn integer_suffixes_pick_literal_kind() {
        let (tokens, diags, _) = lex("1 2L 3f 4d 5.5 6.0e2");
        assert_eq!(tokens[0].kind, TokenKind::IntLiteral);
        assert_eq!(tokens[1].kind, TokenKind::LongLiteral);
        assert_eq!(tokens[2].kind, TokenKind::FloatLiteral);
        assert_eq!(tokens[3].kind, TokenKind::DoubleLiteral);
        assert_eq!(tokens[4].kind, TokenKind::DoubleLiteral);
        assert_eq!(tokens[5].kind, TokenKind::DoubleLiteral);
        assert_eq!(tokens[5].literal, Some(LiteralValue::Float(600.0)));
        assert!(!diags.has_errors());
    }

    #[test]
    fn long_suffix_on_float_is_an_error() {
        let (tokens, diags, _) = lex("1.5L");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(diags.of_kind(ErrorKind::Lex).count(), 1);
    }

    #[test]
    fn exponent_without_digits_is_an_error() {
        let (tokens, diags, _) = lex("1e+");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn dot_after_int_stays_separate() {
        let (tokens, _, _) = lex("1.abs");
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::IntLiteral,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn string_escapes_decode() {
        let (tokens, diags, interner) = lex(r#""a\tb\n\"q\"""#);
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        let Some(LiteralValue::Str(sym)) = tokens[0].literal else {
            panic!("expected string literal value");
        };
        assert_eq!(interner.resolve(sym), "a\tb\n\"q\"");
        assert!(!diags.has_errors());
    }

    #[test]
    fn unterminated_string_points_at_opening_quote() {
        let (tokens, diags, _) = lex("x \"abc");
        assert_eq!(tokens[1].kind, TokenKind::Error);
        let errors: Vec<_> = diags.iter().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].location.line_start, 1);
        assert_eq!(errors[0].location.col_start, 3);
        // Stream still reaches EOF.
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn char_literal_variants() {
        let (tokens, diags, _) = lex(r"'a' '\n' '' 'ab'");
        assert_eq!(tokens[0].kind, TokenKind::CharLiteral);
        assert_eq!(tokens[0].literal, Some(LiteralValue::Char('a')));
        assert_eq!(tokens[1].literal, Some(LiteralValue::Char('\n')));
        assert_eq!(tokens[2].kind, TokenKind::Error);
        assert_eq!(tokens[3].kind, TokenKind::Error);
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn unknown_escape_reported_once() {
        let (tokens, diags, _) = lex(r#""a\qb""#);
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(diags.len(), 1);
        assert!(diags.iter().next().unwrap().message.contains("\\q"));
    }

    #[test]
    fn comments_are_whitespace() {
        let (tokens, diags, _) = lex("a // line\nb /* block\n spanning */ c");
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
        assert!(!diags.has_errors());
        // Newline inside the block comment advanced the line counter.
        assert_eq!(tokens[2].location.line_start, 3);
    }

    #[test]
    fn unterminated_block_comment_is_reported() {
        let (tokens, diags, _) = lex("a /* never closed");
        assert_eq!(kinds(&tokens), vec![TokenKind::Identifier, TokenKind::Eof]);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn locations_are_one_based_and_ordered() {
        let (tokens, _, _) = lex("ab\n  cd");
        assert_eq!(tokens[0].location.line_start, 1);
        assert_eq!(tokens[0].location.col_start, 1);
        assert_eq!(tokens[0].location.col_end, 3);
        assert_eq!(tokens[1].location.line_start, 2);
        assert_eq!(tokens[1].location.col_start, 3);
        for t in &tokens {
            assert!(t.location.is_ordered());
        }
    }

    #[test]
    fn unexpected_character_is_error_token() {
        let (tokens, diags, _) = lex("a ? b");
        assert_eq!(tokens[1].kind, TokenKind::Error);
        assert_eq!(diags.len(), 1);
        assert_eq!(tokens.len(), 4);
    }

    /// A token's location maps back to exactly its source slice.
    #[test]
    fn locations_round_trip_to_source_slices() {
        let source = "class C {\n  int total = 40 + 2;\n}\n";
        let (tokens, diags, interner) = lex(source);
        assert!(!diags.has_errors());

        // Byte offset of each (line, col) position.
        let line_starts: Vec<usize> = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        let offset = |line: u32, col: u32| line_starts[line as usize - 1] + col as usize - 1;

        for token in &tokens {
            if token.kind == TokenKind::Eof {
                continue;
            }
            let start = offset(token.location.line_start, token.location.col_start);
            let end = offset(token.location.line_end, token.location.col_end);
            assert_eq!(&source[start..end], token.text(&interner));
        }
    }
}
