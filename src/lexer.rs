//! Lexer for Nori source text.
//!
//! Scans characters with a 1-based line/column position. Block comments nest.
//! String literals track interpolation brace depth so `{...}` segments may
//! contain arbitrary characters, including newlines; outside interpolation a
//! raw newline terminates the string with `E0001`.

use crate::diagnostics::{Diagnostics, codes};
use crate::span::{Position, SourceSpan};
use crate::token::{LiteralValue, Token, TokenKind, keyword};
use std::path::{Path, PathBuf};

/// Tokenize `source`, reporting lexical diagnostics into `diags`. The result
/// always ends with an `Eof` token. Unclassifiable characters produce `Error`
/// tokens (already reported as `E0003`); the parser discards those.
pub fn lex(source: &str, file: &Path, diags: &mut Diagnostics) -> Vec<Token> {
    Lexer::new(source, file).run(diags)
}

/// Decode the escape sequences `\n \t \\ \" \{ \}` in a string-literal body.
/// Any other `\x` pair is passed through unchanged, backslash included.
pub fn decode_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('{') => out.push('{'),
            Some('}') => out.push('}'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    file: PathBuf,
}

impl Lexer {
    fn new(source: &str, file: &Path) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            file: file.to_path_buf(),
        }
    }

    fn run(mut self, diags: &mut Diagnostics) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia(diags);
            let start = self.here();
            let Some(ch) = self.peek() else {
                tokens.push(Token::new(
                    TokenKind::Eof,
                    "",
                    SourceSpan::new(&self.file, start, start),
                ));
                break;
            };

            if ch.is_ascii_digit() {
                tokens.push(self.number(start));
            } else if ch == '"' {
                tokens.push(self.string(start, diags));
            } else if ch.is_alphabetic() || ch == '_' {
                tokens.push(self.ident(start));
            } else {
                tokens.push(self.operator(start, diags));
            }
        }
        tokens
    }

    fn here(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    /// The position of the most recently consumed character.
    fn last(&self) -> Position {
        if self.column > 1 {
            Position::new(self.line, self.column - 1)
        } else {
            // Previous char was a newline; point at the line it ended.
            Position::new(self.line.saturating_sub(1).max(1), 1)
        }
    }

    fn span_from(&self, start: Position) -> SourceSpan {
        SourceSpan::new(&self.file, start, self.last())
    }

    /// Skip whitespace, line comments, and nestable block comments.
    fn skip_trivia(&mut self, diags: &mut Diagnostics) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek2() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek2() == Some('*') => {
                    let start = self.here();
                    self.bump();
                    self.bump();
                    let mut depth = 1usize;
                    loop {
                        match (self.peek(), self.peek2()) {
                            (Some('/'), Some('*')) => {
                                self.bump();
                                self.bump();
                                depth += 1;
                            }
                            (Some('*'), Some('/')) => {
                                self.bump();
                                self.bump();
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            (Some(_), _) => {
                                self.bump();
                            }
                            (None, _) => {
                                diags.error(
                                    codes::UNTERMINATED_BLOCK_COMMENT,
                                    "unterminated block comment",
                                    SourceSpan::new(&self.file, start, start),
                                );
                                return;
                            }
                        }
                    }
                }
                _ => return,
            }
        }
    }

    /// Integer or float. `N..` is an integer followed by the range operator,
    /// never a float; a float requires a digit after the dot.
    fn number(&mut self, start: Position) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let is_float = self.peek() == Some('.')
            && self.peek2().is_some_and(|c| c.is_ascii_digit());
        if is_float {
            text.push('.');
            self.bump();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
            let value = text.parse::<f64>().unwrap_or(0.0);
            Token::new(TokenKind::FloatLiteral, text, self.span_from(start))
                .with_literal(LiteralValue::Float(value))
        } else {
            let value = text.parse::<i64>().unwrap_or(0);
            Token::new(TokenKind::IntLiteral, text, self.span_from(start))
                .with_literal(LiteralValue::Int(value))
        }
    }

    /// String literal. Brace depth tracking lets interpolation segments span
    /// newlines; a raw newline at depth zero is an unterminated string.
    fn string(&mut self, start: Position, diags: &mut Diagnostics) -> Token {
        let mut raw = String::from("\"");
        self.bump(); // opening quote
        let mut body = String::new();
        let mut depth = 0usize;
        let mut terminated = false;
        while let Some(c) = self.peek() {
            if c == '"' && depth == 0 {
                self.bump();
                raw.push('"');
                terminated = true;
                break;
            }
            if c == '\n' && depth == 0 {
                break;
            }
            if c == '\\' {
                body.push(c);
                raw.push(c);
                self.bump();
                if let Some(esc) = self.bump() {
                    body.push(esc);
                    raw.push(esc);
                }
                continue;
            }
            if c == '{' {
                depth += 1;
            } else if c == '}' {
                depth = depth.saturating_sub(1);
            }
            body.push(c);
            raw.push(c);
            self.bump();
        }
        let span = self.span_from(start);
        if !terminated {
            diags.error(codes::UNTERMINATED_STRING, "unterminated string literal", span.clone());
        }
        Token::new(TokenKind::StringLiteral, raw, span)
            .with_literal(LiteralValue::Str(decode_escapes(&body)))
    }

    fn ident(&mut self, start: Position) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let kind = keyword(&text).unwrap_or(TokenKind::Ident);
        Token::new(kind, text, self.span_from(start))
    }

    /// Operators and delimiters, with one-character lookahead for the
    /// two-character forms.
    fn operator(&mut self, start: Position, diags: &mut Diagnostics) -> Token {
        let first = self.bump().expect("operator called at end of input");
        let two = |lexer: &mut Lexer, kind: TokenKind, text: &str| {
            lexer.bump();
            Token::new(kind, text, lexer.span_from(start))
        };
        match (first, self.peek()) {
            ('+', Some('=')) => two(self, TokenKind::PlusAssign, "+="),
            ('+', _) => Token::new(TokenKind::Plus, "+", self.span_from(start)),
            ('-', Some('=')) => two(self, TokenKind::MinusAssign, "-="),
            ('-', Some('>')) => two(self, TokenKind::Arrow, "->"),
            ('-', _) => Token::new(TokenKind::Minus, "-", self.span_from(start)),
            ('*', Some('=')) => two(self, TokenKind::StarAssign, "*="),
            ('*', _) => Token::new(TokenKind::Star, "*", self.span_from(start)),
            ('/', Some('=')) => two(self, TokenKind::SlashAssign, "/="),
            ('/', _) => Token::new(TokenKind::Slash, "/", self.span_from(start)),
            ('%', _) => Token::new(TokenKind::Percent, "%", self.span_from(start)),
            ('=', Some('=')) => two(self, TokenKind::EqEq, "=="),
            ('=', _) => Token::new(TokenKind::Assign, "=", self.span_from(start)),
            ('!', Some('=')) => two(self, TokenKind::NotEq, "!="),
            ('!', _) => Token::new(TokenKind::Bang, "!", self.span_from(start)),
            ('<', Some('=')) => two(self, TokenKind::LtEq, "<="),
            ('<', _) => Token::new(TokenKind::Lt, "<", self.span_from(start)),
            ('>', Some('=')) => two(self, TokenKind::GtEq, ">="),
            ('>', _) => Token::new(TokenKind::Gt, ">", self.span_from(start)),
            ('&', Some('&')) => two(self, TokenKind::AndAnd, "&&"),
            ('|', Some('|')) => two(self, TokenKind::OrOr, "||"),
            ('.', Some('.')) => two(self, TokenKind::DotDot, ".."),
            ('.', _) => Token::new(TokenKind::Dot, ".", self.span_from(start)),
            ('(', _) => Token::new(TokenKind::LParen, "(", self.span_from(start)),
            (')', _) => Token::new(TokenKind::RParen, ")", self.span_from(start)),
            ('{', _) => Token::new(TokenKind::LBrace, "{", self.span_from(start)),
            ('}', _) => Token::new(TokenKind::RBrace, "}", self.span_from(start)),
            ('[', _) => Token::new(TokenKind::LBracket, "[", self.span_from(start)),
            (']', _) => Token::new(TokenKind::RBracket, "]", self.span_from(start)),
            (',', _) => Token::new(TokenKind::Comma, ",", self.span_from(start)),
            (':', _) => Token::new(TokenKind::Colon, ":", self.span_from(start)),
            (other, _) => {
                let span = self.span_from(start);
                diags.error(
                    codes::UNEXPECTED_CHARACTER,
                    format!("unexpected character '{}'", other),
                    span.clone(),
                );
                Token::new(TokenKind::Error, other.to_string(), span)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn lex_ok(source: &str) -> Vec<Token> {
        let mut diags = Diagnostics::new();
        let tokens = lex(source, Path::new("test.nori"), &mut diags);
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
        tokens
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_source_is_one_eof_token() {
        let tokens = lex_ok("");
        assert_eq!(kinds(&tokens), vec![TokenKind::Eof]);
    }

    #[test]
    fn range_is_never_a_float() {
        let tokens = lex_ok("0..10");
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::IntLiteral,
                TokenKind::DotDot,
                TokenKind::IntLiteral,
                TokenKind::Eof
            ]
        );
        assert_eq!(tokens[0].literal, Some(LiteralValue::Int(0)));
        assert_eq!(tokens[2].literal, Some(LiteralValue::Int(10)));
    }

    #[test]
    fn float_requires_digit_after_dot() {
        let tokens = lex_ok("3.25 7.x");
        assert_eq!(tokens[0].kind, TokenKind::FloatLiteral);
        assert_eq!(tokens[0].literal, Some(LiteralValue::Float(3.25)));
        assert_eq!(tokens[1].kind, TokenKind::IntLiteral);
        assert_eq!(tokens[2].kind, TokenKind::Dot);
        assert_eq!(tokens[3].kind, TokenKind::Ident);
    }

    #[test]
    fn nested_block_comments() {
        let tokens = lex_ok("/* outer /* inner */ still outer */ let");
        assert_eq!(kinds(&tokens), vec![TokenKind::Let, TokenKind::Eof]);
    }

    #[test]
    fn unterminated_block_comment_is_e0002() {
        let mut diags = Diagnostics::new();
        lex("/* /* */", Path::new("test.nori"), &mut diags);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.items()[0].code, codes::UNTERMINATED_BLOCK_COMMENT);
    }

    #[test]
    fn string_escapes_decode() {
        let tokens = lex_ok(r#""a\nb\t\"q\" \{x\}""#);
        assert_eq!(
            tokens[0].literal,
            Some(LiteralValue::Str("a\nb\t\"q\" {x}".to_string()))
        );
    }

    #[test]
    fn unknown_escape_passes_through() {
        let tokens = lex_ok(r#""a\qb""#);
        assert_eq!(tokens[0].literal, Some(LiteralValue::Str("a\\qb".to_string())));
    }

    #[test]
    fn interpolation_braces_may_contain_newlines() {
        let tokens = lex_ok("\"total: {a +\n b}\"");
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn raw_newline_outside_interpolation_is_e0001() {
        let mut diags = Diagnostics::new();
        let tokens = lex("\"oops\nlet", Path::new("test.nori"), &mut diags);
        assert_eq!(diags.items()[0].code, codes::UNTERMINATED_STRING);
        // The lexer resumes after the broken literal.
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Let));
    }

    #[test]
    fn unexpected_character_is_reported_and_skipped() {
        let mut diags = Diagnostics::new();
        let tokens = lex("let @ x", Path::new("test.nori"), &mut diags);
        assert_eq!(diags.items()[0].code, codes::UNEXPECTED_CHARACTER);
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Let,
                TokenKind::Error,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn two_character_operators() {
        let tokens = lex_ok("+= -= *= /= == != <= >= && || -> ..");
        let expect = [
            TokenKind::PlusAssign,
            TokenKind::MinusAssign,
            TokenKind::StarAssign,
            TokenKind::SlashAssign,
            TokenKind::EqEq,
            TokenKind::NotEq,
            TokenKind::LtEq,
            TokenKind::GtEq,
            TokenKind::AndAnd,
            TokenKind::OrOr,
            TokenKind::Arrow,
            TokenKind::DotDot,
        ];
        for (tok, kind) in tokens.iter().zip(expect) {
            assert_eq!(tok.kind, kind);
        }
    }

    #[test]
    fn positions_are_one_based() {
        let tokens = lex_ok("let x\nlet y");
        assert_eq!(tokens[0].span.start, Position::new(1, 1));
        assert_eq!(tokens[1].span.start, Position::new(1, 5));
        assert_eq!(tokens[2].span.start, Position::new(2, 1));
        assert_eq!(tokens[3].span.start, Position::new(2, 5));
    }
}
