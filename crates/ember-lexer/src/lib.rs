//! Ember lexer.
//!
//! Byte-oriented scanner with one-byte lookahead (`peek`) and single-step
//! rewind. Newlines are significant and emitted as tokens; spaces, tabs and
//! carriage returns are skipped. Comments (`#`, `//`, `/* ... */`) become
//! `Comment` tokens that the parser discards. String literals keep their
//! escape sequences verbatim; numeric literals admit `0x`/`0o`/`0b` prefixes
//! and `_` separators.

use ember_diagnostics::{Diagnostics, Position};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    // Literals
    Identifier,
    Boolean,
    String,
    Integer,
    Float,
    // Operators
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Plus,
    Minus,
    Star,
    Power,
    Slash,
    Percent,
    BitOr,
    BitAnd,
    BitNot,
    ShiftLeft,
    ShiftRight,
    Or,
    And,
    Bang,
    Pipe,
    Arrow,
    FatArrow,
    Question,
    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon,
    Comma,
    Dot,
    Range,
    Ellipsis,
    Underscore,
    Newline,
    // Keywords
    Val,
    Var,
    Function,
    Do,
    End,
    Then,
    If,
    Else,
    Repeat,
    In,
    Is,
    As,
    Nil,
    Return,
    Match,
    With,
    When,
    Break,
    Continue,
    Module,
    Use,
    // Miscellaneous
    Comment,
    Eof,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            literal: literal.into(),
            position,
        }
    }

    /// Placeholder token used before the parser has read anything.
    pub fn eof() -> Self {
        Self::new(TokenKind::Eof, "", Position::default())
    }
}

/// Resolve an identifier against the keyword table.
pub fn lookup_keyword(name: &str) -> Option<TokenKind> {
    let kind = match name {
        "true" | "false" => TokenKind::Boolean,
        "nil" => TokenKind::Nil,
        "val" => TokenKind::Val,
        "var" => TokenKind::Var,
        "fn" => TokenKind::Function,
        "do" => TokenKind::Do,
        "end" => TokenKind::End,
        "then" => TokenKind::Then,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "repeat" => TokenKind::Repeat,
        "in" => TokenKind::In,
        "is" => TokenKind::Is,
        "as" => TokenKind::As,
        "return" => TokenKind::Return,
        "match" => TokenKind::Match,
        "with" => TokenKind::With,
        "when" => TokenKind::When,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "module" => TokenKind::Module,
        "use" => TokenKind::Use,
        _ => return None,
    };
    Some(kind)
}

#[inline]
fn is_alpha(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'!' || b == b'?'
}

#[inline]
fn is_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

#[inline]
fn is_hex(b: u8) -> bool {
    b.is_ascii_hexdigit()
}

#[inline]
fn is_octal(b: u8) -> bool {
    (b'0'..=b'7').contains(&b)
}

#[inline]
fn is_binary(b: u8) -> bool {
    b == b'0' || b == b'1'
}

pub struct Lexer {
    buff: Vec<u8>,
    nextr: usize,
    chr: u8,
    pending: bool,
    row: u32,
    col: u32,
    diags: Diagnostics,
}

impl Lexer {
    pub fn new(source: &[u8], diags: Diagnostics) -> Self {
        let mut lexer = Self {
            buff: source.to_vec(),
            nextr: 0,
            chr: 0,
            pending: false,
            row: 1,
            col: 0,
            diags,
        };
        lexer.next();
        lexer
    }

    /// Produce the next token. Past the end of input this keeps returning
    /// `Eof` tokens.
    pub fn next_token(&mut self) -> Token {
        loop {
            self.skip_whitespace();
            let token = match self.chr {
                0 => self.token(TokenKind::Eof, ""),
                b'#' => {
                    self.next();
                    self.read_comment()
                }
                b'=' => match self.peek() {
                    b'=' => {
                        self.next();
                        self.token(TokenKind::Equal, "==")
                    }
                    b'>' => {
                        self.next();
                        self.token(TokenKind::FatArrow, "=>")
                    }
                    _ => self.token(TokenKind::Assign, "="),
                },
                b'>' => match self.peek() {
                    b'=' => {
                        self.next();
                        self.token(TokenKind::GreaterEqual, ">=")
                    }
                    b'>' => {
                        self.next();
                        self.token(TokenKind::ShiftRight, ">>")
                    }
                    _ => self.token(TokenKind::Greater, ">"),
                },
                b'<' => match self.peek() {
                    b'=' => {
                        self.next();
                        self.token(TokenKind::LessEqual, "<=")
                    }
                    b'<' => {
                        self.next();
                        self.token(TokenKind::ShiftLeft, "<<")
                    }
                    _ => self.token(TokenKind::Less, "<"),
                },
                b'+' => match self.peek() {
                    b'=' => {
                        self.next();
                        self.token(TokenKind::PlusAssign, "+=")
                    }
                    _ => self.token(TokenKind::Plus, "+"),
                },
                b'-' => match self.peek() {
                    b'>' => {
                        self.next();
                        self.token(TokenKind::Arrow, "->")
                    }
                    b'=' => {
                        self.next();
                        self.token(TokenKind::MinusAssign, "-=")
                    }
                    _ => self.token(TokenKind::Minus, "-"),
                },
                b'*' => match self.peek() {
                    b'*' => {
                        self.next();
                        self.token(TokenKind::Power, "**")
                    }
                    b'=' => {
                        self.next();
                        self.token(TokenKind::StarAssign, "*=")
                    }
                    _ => self.token(TokenKind::Star, "*"),
                },
                b'/' => match self.peek() {
                    b'/' => {
                        self.next();
                        self.next();
                        self.read_line_comment_body()
                    }
                    b'*' => {
                        self.next();
                        self.read_multiline_comment()
                    }
                    b'=' => {
                        self.next();
                        self.token(TokenKind::SlashAssign, "/=")
                    }
                    _ => self.token(TokenKind::Slash, "/"),
                },
                b'%' => self.token(TokenKind::Percent, "%"),
                b',' => self.token(TokenKind::Comma, ","),
                b'.' => match self.peek() {
                    b'.' => {
                        self.next();
                        match self.peek() {
                            b'.' => {
                                self.next();
                                self.token(TokenKind::Ellipsis, "...")
                            }
                            _ => self.token(TokenKind::Range, ".."),
                        }
                    }
                    _ => self.token(TokenKind::Dot, "."),
                },
                b'|' => match self.peek() {
                    b'|' => {
                        self.next();
                        self.token(TokenKind::Or, "||")
                    }
                    b'>' => {
                        self.next();
                        self.token(TokenKind::Pipe, "|>")
                    }
                    _ => self.token(TokenKind::BitOr, "|"),
                },
                b'&' => match self.peek() {
                    b'&' => {
                        self.next();
                        self.token(TokenKind::And, "&&")
                    }
                    _ => self.token(TokenKind::BitAnd, "&"),
                },
                b'~' => self.token(TokenKind::BitNot, "~"),
                b'!' => match self.peek() {
                    b'=' => {
                        self.next();
                        self.token(TokenKind::NotEqual, "!=")
                    }
                    _ => self.token(TokenKind::Bang, "!"),
                },
                b'(' => self.token(TokenKind::LParen, "("),
                b')' => self.token(TokenKind::RParen, ")"),
                b'[' => self.token(TokenKind::LBracket, "["),
                b']' => self.token(TokenKind::RBracket, "]"),
                b'?' => self.token(TokenKind::Question, "?"),
                b':' => self.token(TokenKind::Colon, ":"),
                b'_' => self.token(TokenKind::Underscore, "_"),
                b'\n' => self.token(TokenKind::Newline, "\n"),
                b'"' => self.read_string(),
                b'0' if self.peek() == b'x' => self.read_prefixed_integer(is_hex),
                b'0' if self.peek() == b'o' => self.read_prefixed_integer(is_octal),
                b'0' if self.peek() == b'b' => self.read_prefixed_integer(is_binary),
                c if is_digit(c) => self.read_numeric(),
                c if is_alpha(c) => self.read_identifier(),
                c => {
                    self.diags.parse_error(
                        self.position(),
                        format!("Unidentified character '{}'", c as char),
                    );
                    self.next();
                    continue;
                }
            };
            self.next();
            return token;
        }
    }

    fn next(&mut self) -> u8 {
        if self.pending {
            // a rewind left the current byte unconsumed; serve it again
            self.pending = false;
            return self.chr;
        }
        if self.nextr >= self.buff.len() {
            self.chr = 0;
        } else {
            self.chr = self.buff[self.nextr];
        }
        self.nextr += 1;
        self.col += 1;
        if self.chr == b'\n' {
            self.row += 1;
            self.col = 0;
        }
        self.chr
    }

    fn peek(&self) -> u8 {
        if self.pending {
            return self.chr;
        }
        if self.nextr >= self.buff.len() {
            0
        } else {
            self.buff[self.nextr]
        }
    }

    /// Un-consume the current byte so the next `next` serves it again.
    fn rewind(&mut self) {
        self.pending = true;
    }

    fn position(&self) -> Position {
        Position::new(self.row, self.col)
    }

    fn token(&self, kind: TokenKind, literal: impl Into<String>) -> Token {
        Token::new(kind, literal, self.position())
    }

    fn skip_whitespace(&mut self) {
        while self.chr == b' ' || self.chr == b'\t' || self.chr == b'\r' {
            self.next();
        }
    }

    fn read_name(&mut self) -> String {
        let mut out = String::new();
        out.push(self.chr as char);
        while is_alpha(self.peek()) {
            self.next();
            out.push(self.chr as char);
        }
        out
    }

    fn read_identifier(&mut self) -> Token {
        let name = self.read_name();
        match lookup_keyword(&name) {
            Some(kind) => self.token(kind, name),
            None => self.token(TokenKind::Identifier, name),
        }
    }

    fn read_string(&mut self) -> Token {
        let mut out = String::new();
        self.next();
        loop {
            match self.chr {
                b'\\' => {
                    self.next();
                    match self.chr {
                        b'"' => {
                            out.push('\\');
                            out.push('"');
                        }
                        b'\\' => out.push('\\'),
                        b'n' | b't' | b'r' | b'a' | b'b' | b'f' | b'v' => {
                            out.push('\\');
                            out.push(self.chr as char);
                        }
                        c => self.diags.parse_error(
                            self.position(),
                            format!("Invalid escape character '{}'", c as char),
                        ),
                    }
                }
                0 => {
                    self.diags.parse_error(self.position(), "Unterminated string");
                    break;
                }
                b'"' => break,
                c => out.push(c as char),
            }
            self.next();
        }
        self.token(TokenKind::String, out)
    }

    fn read_numeric(&mut self) -> Token {
        let mut out = String::new();
        out.push(self.chr as char);
        let mut float_found = false;
        let mut scientific_found = false;
        loop {
            self.next();
            match self.chr {
                c if is_digit(c) => out.push(c as char),
                b'_' => {}
                b'.' if is_digit(self.peek()) => {
                    float_found = true;
                    out.push('.');
                }
                b'e' if is_digit(self.peek()) || self.peek() == b'-' => {
                    float_found = true;
                    scientific_found = true;
                    out.push('e');
                }
                b'-' if scientific_found => out.push('-'),
                b'.' if self.peek() == b'.' => {
                    // `1..5` — unread the dot so the range operator comes next
                    self.rewind();
                    break;
                }
                0 => break,
                _ => {
                    self.rewind();
                    break;
                }
            }
        }
        if float_found {
            self.token(TokenKind::Float, out)
        } else {
            self.token(TokenKind::Integer, out)
        }
    }

    fn read_prefixed_integer(&mut self, accepts: fn(u8) -> bool) -> Token {
        let mut out = String::new();
        out.push(self.chr as char);
        out.push(self.peek() as char);
        self.next();
        while accepts(self.peek()) || self.peek() == b'_' {
            if self.peek() != b'_' {
                out.push(self.peek() as char);
            }
            self.next();
        }
        if out.len() == 2 {
            self.diags.parse_error(
                self.position(),
                format!("Literal sequence '{}' started but not continued", out),
            );
        }
        self.token(TokenKind::Integer, out)
    }

    fn read_comment(&mut self) -> Token {
        self.read_line_comment_body()
    }

    fn read_line_comment_body(&mut self) -> Token {
        let mut out = String::new();
        loop {
            match self.chr {
                b'\n' | 0 => break,
                b'\r' => {
                    self.next();
                    match self.chr {
                        b'\n' | 0 => break,
                        _ => {
                            self.diags
                                .parse_error(self.position(), "Unexpected comment line ending");
                            break;
                        }
                    }
                }
                c => out.push(c as char),
            }
            self.next();
        }
        self.token(TokenKind::Comment, out)
    }

    fn read_multiline_comment(&mut self) -> Token {
        let mut out = String::new();
        loop {
            self.next();
            match self.chr {
                b'*' if self.peek() == b'/' => {
                    self.next();
                    break;
                }
                0 => {
                    self.diags
                        .parse_error(self.position(), "Unterminated multi line comment");
                    break;
                }
                c => out.push(c as char),
            }
        }
        self.token(TokenKind::Comment, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(input: &str) -> (Vec<Token>, Diagnostics) {
        let diags = Diagnostics::new();
        let mut lexer = Lexer::new(input.as_bytes(), diags.clone());
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        (tokens, diags)
    }

    fn assert_tokens(input: &str, expected: &[(TokenKind, &str)]) {
        let diags = Diagnostics::new();
        let mut lexer = Lexer::new(input.as_bytes(), diags.clone());
        for (i, (kind, literal)) in expected.iter().enumerate() {
            let token = lexer.next_token();
            assert_eq!(
                (token.kind, token.literal.as_str()),
                (*kind, *literal),
                "token {} of {:?}",
                i,
                input
            );
        }
        assert!(!diags.has_errors(), "diagnostics: {:?}", diags.take());
    }

    use TokenKind::*;

    #[test]
    fn operators() {
        assert_tokens(
            "val a = 1 + 2 * 3 % 1 / (5 + 2) ** 2 + 1..5\n\
             val b = true && false || 0 >= 1 < 5 && !true\n\
             val c = 10 & 5 >> 1 | 0 & ~1",
            &[
                (Val, "val"),
                (Identifier, "a"),
                (Assign, "="),
                (Integer, "1"),
                (Plus, "+"),
                (Integer, "2"),
                (Star, "*"),
                (Integer, "3"),
                (Percent, "%"),
                (Integer, "1"),
                (Slash, "/"),
                (LParen, "("),
                (Integer, "5"),
                (Plus, "+"),
                (Integer, "2"),
                (RParen, ")"),
                (Power, "**"),
                (Integer, "2"),
                (Plus, "+"),
                (Integer, "1"),
                (Range, ".."),
                (Integer, "5"),
                (Newline, "\n"),
                (Val, "val"),
                (Identifier, "b"),
                (Assign, "="),
                (Boolean, "true"),
                (And, "&&"),
                (Boolean, "false"),
                (Or, "||"),
                (Integer, "0"),
                (GreaterEqual, ">="),
                (Integer, "1"),
                (Less, "<"),
                (Integer, "5"),
                (And, "&&"),
                (Bang, "!"),
                (Boolean, "true"),
                (Newline, "\n"),
                (Val, "val"),
                (Identifier, "c"),
                (Assign, "="),
                (Integer, "10"),
                (BitAnd, "&"),
                (Integer, "5"),
                (ShiftRight, ">>"),
                (Integer, "1"),
                (BitOr, "|"),
                (Integer, "0"),
                (BitAnd, "&"),
                (BitNot, "~"),
                (Integer, "1"),
                (Eof, ""),
            ],
        );
    }

    #[test]
    fn data_types() {
        assert_tokens(
            r#"1 5 true 5.20 3.4789 false "yes" :sym"#,
            &[
                (Integer, "1"),
                (Integer, "5"),
                (Boolean, "true"),
                (Float, "5.20"),
                (Float, "3.4789"),
                (Boolean, "false"),
                (String, "yes"),
                (Colon, ":"),
                (Identifier, "sym"),
                (Eof, ""),
            ],
        );
    }

    #[test]
    fn delimiters() {
        assert_tokens(
            r#"(1, 2, a) ["yes", 5.1, b] [a => b] a.b a..b x..."#,
            &[
                (LParen, "("),
                (Integer, "1"),
                (Comma, ","),
                (Integer, "2"),
                (Comma, ","),
                (Identifier, "a"),
                (RParen, ")"),
                (LBracket, "["),
                (String, "yes"),
                (Comma, ","),
                (Float, "5.1"),
                (Comma, ","),
                (Identifier, "b"),
                (RBracket, "]"),
                (LBracket, "["),
                (Identifier, "a"),
                (FatArrow, "=>"),
                (Identifier, "b"),
                (RBracket, "]"),
                (Identifier, "a"),
                (Dot, "."),
                (Identifier, "b"),
                (Identifier, "a"),
                (Range, ".."),
                (Identifier, "b"),
                (Identifier, "x"),
                (Ellipsis, "..."),
                (Eof, ""),
            ],
        );
    }

    #[test]
    fn keywords() {
        assert_tokens(
            "val var fn do end not if else repeat in then return match when module use nil is as with break continue",
            &[
                (Val, "val"),
                (Var, "var"),
                (Function, "fn"),
                (Do, "do"),
                (End, "end"),
                (Identifier, "not"),
                (If, "if"),
                (Else, "else"),
                (Repeat, "repeat"),
                (In, "in"),
                (Then, "then"),
                (Return, "return"),
                (Match, "match"),
                (When, "when"),
                (Module, "module"),
                (Use, "use"),
                (Nil, "nil"),
                (Is, "is"),
                (As, "as"),
                (With, "with"),
                (Break, "break"),
                (Continue, "continue"),
                (Eof, ""),
            ],
        );
    }

    #[test]
    fn mini_program() {
        assert_tokens(
            "val a = 10\nif b > a then\n  repeat i in 5..10\n    i + 2\n  end\nend",
            &[
                (Val, "val"),
                (Identifier, "a"),
                (Assign, "="),
                (Integer, "10"),
                (Newline, "\n"),
                (If, "if"),
                (Identifier, "b"),
                (Greater, ">"),
                (Identifier, "a"),
                (Then, "then"),
                (Newline, "\n"),
                (Repeat, "repeat"),
                (Identifier, "i"),
                (In, "in"),
                (Integer, "5"),
                (Range, ".."),
                (Integer, "10"),
                (Newline, "\n"),
                (Identifier, "i"),
                (Plus, "+"),
                (Integer, "2"),
                (Newline, "\n"),
                (End, "end"),
                (Newline, "\n"),
                (End, "end"),
                (Eof, ""),
            ],
        );
    }

    #[test]
    fn comments() {
        assert_tokens(
            "1 # trailing note\n2 // another\n/* multi\nline */ 3",
            &[
                (Integer, "1"),
                (Comment, " trailing note"),
                (Integer, "2"),
                (Comment, " another"),
                (Comment, " multi\nline "),
                (Integer, "3"),
                (Eof, ""),
            ],
        );
    }

    #[test]
    fn unterminated_comment_is_diagnosed() {
        let (_, diags) = lex_all("/* never closed");
        assert!(diags.has_errors());
        let rendered = format!("{}", diags.take()[0]);
        assert!(rendered.contains("Unterminated multi line comment"));
    }

    #[test]
    fn strings_keep_escapes_verbatim() {
        assert_tokens(
            r#""a\nb" "tab\there" "q\"q""#,
            &[
                (String, "a\\nb"),
                (String, "tab\\there"),
                (String, "q\\\"q"),
                (Eof, ""),
            ],
        );
    }

    #[test]
    fn string_errors() {
        let (_, diags) = lex_all(r#""bad \q escape""#);
        assert!(diags.take()[0].message.contains("Invalid escape character"));

        let (_, diags) = lex_all(r#""no closing"#);
        assert!(diags.take()[0].message.contains("Unterminated string"));
    }

    #[test]
    fn base_prefixed_integers() {
        assert_tokens(
            "0x1F 0o17 0b10_11 1_000_000 2.5e3 7e-2",
            &[
                (Integer, "0x1F"),
                (Integer, "0o17"),
                (Integer, "0b1011"),
                (Integer, "1000000"),
                (Float, "2.5e3"),
                (Float, "7e-2"),
                (Eof, ""),
            ],
        );
    }

    #[test]
    fn empty_base_prefix_is_diagnosed() {
        let (tokens, diags) = lex_all("0x");
        assert_eq!(tokens[0].kind, Integer);
        assert!(diags.take()[0]
            .message
            .contains("Literal sequence '0x' started but not continued"));
    }

    #[test]
    fn positions_track_rows() {
        let (tokens, _) = lex_all("a\nb");
        assert_eq!(tokens[0].position.row, 1);
        assert_eq!(tokens[0].position.col, 1);
        // the newline token itself sits on the boundary; the next name is on row 2
        assert_eq!(tokens[2].position.row, 2);
        assert_eq!(tokens[2].position.col, 1);
    }

    #[test]
    fn eof_repeats() {
        let diags = Diagnostics::new();
        let mut lexer = Lexer::new(b"", diags);
        assert_eq!(lexer.next_token().kind, Eof);
        assert_eq!(lexer.next_token().kind, Eof);
    }
}
