//! The scanner that produces tokens from source text.

use super::{Span, Token, TokenKind};
use unicode_xid::UnicodeXID;

/// A scanner that tokenizes script source code.
#[derive(Clone)]
pub struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    line: u32,
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.char_indices().peekable(),
            current_pos: 0,
            line: 1,
        }
    }

    /// Returns the next token from the source.
    pub fn next_token(&mut self) -> Token {
        let newline_before = self.skip_whitespace_and_comments();

        let start = self.current_pos;
        let line = self.line;

        let Some((_pos, ch)) = self.advance() else {
            return Token::new(TokenKind::Eof, Span::new(start, start, line), newline_before);
        };

        let kind = match ch {
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,

            '.' => match self.peek() {
                Some(d) if d.is_ascii_digit() => self.scan_number('.'),
                _ => TokenKind::Dot,
            },
            '+' => self.scan_operator('+', TokenKind::Plus, TokenKind::PlusPlus, TokenKind::PlusEqual),
            '-' => self.scan_operator('-', TokenKind::Minus, TokenKind::MinusMinus, TokenKind::MinusEqual),
            '*' => self.scan_assign_op(TokenKind::Star, TokenKind::StarEqual),
            '/' => self.scan_assign_op(TokenKind::Slash, TokenKind::SlashEqual),
            '%' => self.scan_assign_op(TokenKind::Percent, TokenKind::PercentEqual),
            '<' => self.scan_assign_op(TokenKind::LessThan, TokenKind::LessThanEqual),
            '>' => self.scan_assign_op(TokenKind::GreaterThan, TokenKind::GreaterThanEqual),
            '=' => self.scan_equal(),
            '!' => self.scan_bang(),
            '&' => self.scan_logical('&', TokenKind::AmpersandAmpersand, TokenKind::AmpersandAmpersandEqual),
            '|' => self.scan_logical('|', TokenKind::PipePipe, TokenKind::PipePipeEqual),
            '?' => self.scan_question(),

            '"' | '\'' => self.scan_string(ch),
            '0'..='9' => self.scan_number(ch),
            _ if is_id_start(ch) => self.scan_identifier(ch),

            _ => TokenKind::Invalid(format!("unexpected character '{}'", ch)),
        };

        Token::new(kind, Span::new(start, self.current_pos, line), newline_before)
    }

    /// Returns the next token without consuming it.
    pub fn peek_token(&self) -> Token {
        self.clone().next_token()
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = pos + ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
            }
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next().map(|(_, ch)| ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Skips insignificant input, reporting whether a line break was crossed.
    fn skip_whitespace_and_comments(&mut self) -> bool {
        let mut newline = false;
        loop {
            match self.peek() {
                Some('\n' | '\r' | '\u{2028}' | '\u{2029}') => {
                    newline = true;
                    self.advance();
                }
                Some(ch) if ch.is_whitespace() || ch == '\u{feff}' => {
                    self.advance();
                }
                Some('/') => match self.peek_next() {
                    Some('/') => {
                        while let Some(ch) = self.peek() {
                            if ch == '\n' || ch == '\r' {
                                break;
                            }
                            self.advance();
                        }
                    }
                    Some('*') => {
                        self.advance();
                        self.advance();
                        let mut prev = ' ';
                        while let Some((_, ch)) = self.advance() {
                            if ch == '\n' {
                                newline = true;
                            }
                            if prev == '*' && ch == '/' {
                                break;
                            }
                            prev = ch;
                        }
                    }
                    _ => break,
                },
                _ => break,
            }
        }
        newline
    }

    fn scan_operator(
        &mut self,
        ch: char,
        single: TokenKind,
        double: TokenKind,
        assign: TokenKind,
    ) -> TokenKind {
        if self.eat(ch) {
            double
        } else if self.eat('=') {
            assign
        } else {
            single
        }
    }

    fn scan_assign_op(&mut self, single: TokenKind, assign: TokenKind) -> TokenKind {
        if self.eat('=') { assign } else { single }
    }

    fn scan_logical(&mut self, ch: char, double: TokenKind, assign: TokenKind) -> TokenKind {
        if !self.eat(ch) {
            return TokenKind::Invalid(format!("bitwise operator '{}' is not supported", ch));
        }
        if self.eat('=') { assign } else { double }
    }

    fn scan_equal(&mut self) -> TokenKind {
        if self.eat('=') {
            if self.eat('=') {
                TokenKind::StrictEqual
            } else {
                TokenKind::EqualEqual
            }
        } else if self.eat('>') {
            TokenKind::Arrow
        } else {
            TokenKind::Equal
        }
    }

    fn scan_bang(&mut self) -> TokenKind {
        if self.eat('=') {
            if self.eat('=') {
                TokenKind::StrictNotEqual
            } else {
                TokenKind::NotEqual
            }
        } else {
            TokenKind::Bang
        }
    }

    fn scan_question(&mut self) -> TokenKind {
        if self.eat('?') {
            if self.eat('=') {
                TokenKind::QuestionQuestionEqual
            } else {
                TokenKind::QuestionQuestion
            }
        } else {
            TokenKind::Question
        }
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        let mut value = String::new();

        loop {
            match self.advance() {
                None | Some((_, '\n')) => {
                    return TokenKind::Invalid("unterminated string literal".into());
                }
                Some((_, ch)) if ch == quote => break,
                Some((_, '\\')) => match self.advance() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, 'b')) => value.push('\u{8}'),
                    Some((_, 'f')) => value.push('\u{c}'),
                    Some((_, 'v')) => value.push('\u{b}'),
                    Some((_, '0')) => value.push('\0'),
                    Some((_, 'x')) => match self.scan_hex_escape(2) {
                        Some(ch) => value.push(ch),
                        None => return TokenKind::Invalid("malformed \\x escape".into()),
                    },
                    Some((_, 'u')) => match self.scan_hex_escape(4) {
                        Some(ch) => value.push(ch),
                        None => return TokenKind::Invalid("malformed \\u escape".into()),
                    },
                    // Line continuation
                    Some((_, '\n')) => {}
                    Some((_, '\r')) => {
                        self.eat('\n');
                    }
                    Some((_, escaped)) => value.push(escaped),
                    None => return TokenKind::Invalid("unterminated string literal".into()),
                },
                Some((_, ch)) => value.push(ch),
            }
        }

        TokenKind::String(value)
    }

    fn scan_hex_escape(&mut self, digits: usize) -> Option<char> {
        let mut code = 0u32;
        for _ in 0..digits {
            let (_, ch) = self.advance()?;
            code = code * 16 + ch.to_digit(16)?;
        }
        char::from_u32(code)
    }

    fn scan_number(&mut self, first: char) -> TokenKind {
        if first == '0' && matches!(self.peek(), Some('x' | 'X')) {
            self.advance();
            let mut digits = String::new();
            while let Some(ch) = self.peek() {
                if !ch.is_ascii_hexdigit() {
                    break;
                }
                digits.push(ch);
                self.advance();
            }
            return match u64::from_str_radix(&digits, 16) {
                Ok(n) => TokenKind::Number(n as f64),
                Err(_) => TokenKind::Invalid("malformed hexadecimal literal".into()),
            };
        }

        let mut text = String::new();
        text.push(first);
        let mut seen_dot = first == '.';
        let mut seen_exp = false;

        while let Some(ch) = self.peek() {
            match ch {
                '0'..='9' => text.push(ch),
                '.' if !seen_dot && !seen_exp => {
                    seen_dot = true;
                    text.push(ch);
                }
                'e' | 'E' if !seen_exp => {
                    seen_exp = true;
                    text.push(ch);
                    self.advance();
                    if let Some(sign @ ('+' | '-')) = self.peek() {
                        text.push(sign);
                        self.advance();
                    }
                    continue;
                }
                '_' => {}
                _ => break,
            }
            self.advance();
        }

        match text.parse::<f64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Invalid(format!("malformed number '{}'", text)),
        }
    }

    fn scan_identifier(&mut self, first: char) -> TokenKind {
        let mut name = String::new();
        name.push(first);

        while let Some(ch) = self.peek() {
            if !is_id_continue(ch) {
                break;
            }
            name.push(ch);
            self.advance();
        }

        TokenKind::keyword(&name).unwrap_or(TokenKind::Identifier(name))
    }
}

fn is_id_start(ch: char) -> bool {
    ch == '$' || ch == '_' || UnicodeXID::is_xid_start(ch)
}

fn is_id_continue(ch: char) -> bool {
    ch == '$' || UnicodeXID::is_xid_continue(ch) || ch == '\u{200c}' || ch == '\u{200d}'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut scanner = Scanner::new(source);
        let mut out = Vec::new();
        loop {
            let token = scanner.next_token();
            if token.kind == TokenKind::Eof {
                break;
            }
            out.push(token.kind);
        }
        out
    }

    #[test]
    fn test_scan_require_call() {
        assert_eq!(
            kinds("var b = require('./b');"),
            vec![
                TokenKind::Var,
                TokenKind::Identifier("b".into()),
                TokenKind::Equal,
                TokenKind::Identifier("require".into()),
                TokenKind::LeftParen,
                TokenKind::String("./b".into()),
                TokenKind::RightParen,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn test_scan_operators() {
        assert_eq!(
            kinds("a === b !== c ?? d ||= e => ++"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::StrictEqual,
                TokenKind::Identifier("b".into()),
                TokenKind::StrictNotEqual,
                TokenKind::Identifier("c".into()),
                TokenKind::QuestionQuestion,
                TokenKind::Identifier("d".into()),
                TokenKind::PipePipeEqual,
                TokenKind::Identifier("e".into()),
                TokenKind::Arrow,
                TokenKind::PlusPlus,
            ]
        );
    }

    #[test]
    fn test_scan_numbers() {
        assert_eq!(kinds("42"), vec![TokenKind::Number(42.0)]);
        assert_eq!(kinds("3.5"), vec![TokenKind::Number(3.5)]);
        assert_eq!(kinds(".5"), vec![TokenKind::Number(0.5)]);
        assert_eq!(kinds("1e3"), vec![TokenKind::Number(1000.0)]);
        assert_eq!(kinds("0xff"), vec![TokenKind::Number(255.0)]);
    }

    #[test]
    fn test_scan_string_escapes() {
        assert_eq!(
            kinds(r#""a\nbA\x42""#),
            vec![TokenKind::String("a\nbAB".into())]
        );
        assert!(matches!(kinds("'open")[0], TokenKind::Invalid(_)));
    }

    #[test]
    fn test_comments_and_newlines() {
        let mut scanner = Scanner::new("a // trailing\n/* block\n */ b");
        let a = scanner.next_token();
        let b = scanner.next_token();
        assert!(!a.newline_before);
        assert!(b.newline_before);
        assert_eq!(b.span.line, 3);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut scanner = Scanner::new("x y");
        assert_eq!(scanner.peek_token().kind, TokenKind::Identifier("x".into()));
        assert_eq!(scanner.next_token().kind, TokenKind::Identifier("x".into()));
        assert_eq!(scanner.next_token().kind, TokenKind::Identifier("y".into()));
    }

    #[test]
    fn test_unsupported_bitwise_operator() {
        assert!(matches!(kinds("a & b")[1], TokenKind::Invalid(_)));
    }
}
