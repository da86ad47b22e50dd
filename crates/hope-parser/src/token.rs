//! Token definitions for the Hope language.
//!
//! Lexing is line-oriented: string and character literals may not span
//! lines, and `!` starts a comment running to the end of the line.
//! Punctuation runs form operator identifiers unless they are one of the
//! reserved spellings, which get their own tokens.

use logos::{Lexer, Logos};

/// Decodes one escape sequence, returning the character and the number of
/// input bytes consumed after the backslash.
fn escape(rest: &[u8]) -> (u32, usize) {
    let Some(&first) = rest.first() else { return (u32::from(b'\\'), 0) };
    match first {
        b'a' => (0x07, 1),
        b'b' => (0x08, 1),
        b'f' => (0x0c, 1),
        b'n' => (u32::from(b'\n'), 1),
        b'r' => (u32::from(b'\r'), 1),
        b't' => (u32::from(b'\t'), 1),
        b'v' => (0x0b, 1),
        b'x' | b'X' => {
            let width = if first == b'x' { 2 } else { 4 };
            let mut value = 0u32;
            let mut used = 1;
            for &d in rest.iter().skip(1).take(width) {
                let digit = match d {
                    b'0'..=b'9' => u32::from(d - b'0'),
                    b'a'..=b'f' => u32::from(d - b'a') + 10,
                    b'A'..=b'F' => u32::from(d - b'A') + 10,
                    _ => break,
                };
                value = value * 16 + digit;
                used += 1;
            }
            (value, used)
        }
        b'0'..=b'7' => {
            let mut value = 0u32;
            let mut used = 0;
            for &d in rest.iter().take(3) {
                if !(b'0'..=b'7').contains(&d) {
                    break;
                }
                value = value * 8 + u32::from(d - b'0');
                used += 1;
            }
            (value, used)
        }
        other => (u32::from(other), 1),
    }
}

/// Decodes the body of a quoted literal. Returns `None` when an escape
/// produces a character above 255.
fn unescape(body: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        let c = if body[i] == b'\\' {
            let (value, used) = escape(&body[i + 1..]);
            i += 1 + used;
            value
        } else {
            let value = u32::from(body[i]);
            i += 1;
            value
        };
        if c > 255 {
            return None;
        }
        out.push(c as u8);
    }
    Some(out)
}

fn lex_char(lex: &mut Lexer<'_, Token>) -> Option<u8> {
    let slice = lex.slice().as_bytes();
    let body = &slice[1..slice.len() - 1];
    let decoded = unescape(body)?;
    match decoded.as_slice() {
        [c] => Some(*c),
        _ => None,
    }
}

fn lex_string(lex: &mut Lexer<'_, Token>) -> Option<Vec<u8>> {
    let slice = lex.slice().as_bytes();
    unescape(&slice[1..slice.len() - 1])
}

fn lex_number(lex: &mut Lexer<'_, Token>) -> f64 {
    lex.slice().parse().unwrap_or(0.0)
}

fn lex_text(lex: &mut Lexer<'_, Token>) -> String { lex.slice().to_string() }

/// A Hope token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\x0c]+")]
#[logos(skip r"!.*")]
pub enum Token {
    // Keywords
    #[token("abstype")]
    Abstype,
    #[token("data")]
    Data,
    #[token("dec")]
    Dec,
    #[token("display")]
    Display,
    #[token("edit")]
    Edit,
    #[token("else")]
    Else,
    #[token("exit")]
    Exit,
    #[token("if")]
    If,
    #[token("in")]
    In,
    #[token("infix")]
    Infix,
    #[token("infixr")]
    Infixr,
    #[token("lambda")]
    #[token("\\", priority = 3)]
    Lambda,
    #[token("let")]
    Let,
    #[token("letrec")]
    Letrec,
    #[token("mu")]
    Mu,
    #[token("private")]
    Private,
    #[token("save")]
    Save,
    #[token("then")]
    Then,
    #[token("to")]
    To,
    #[token("type")]
    Type,
    #[token("typevar")]
    Typevar,
    #[token("uses")]
    Uses,
    #[token("where")]
    Where,
    #[token("whererec")]
    Whererec,
    #[token("write")]
    Write,

    // Reserved punctuation
    /// `---`, introducing a defining equation.
    #[token("---")]
    Valof,
    /// `<=`, separating an equation's sides.
    #[token("<=")]
    Is,
    /// `==`, the definitional equality of declarations.
    #[token("==")]
    DefEq,
    /// `=>`, separating pattern and body.
    #[token("=>")]
    Gives,
    /// `++`, separating data alternatives.
    #[token("++")]
    Alt,
    #[token(":", priority = 3)]
    Colon,
    #[token("|", priority = 3)]
    Bar,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,

    // Literals and identifiers
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", lex_number)]
    Number(f64),
    #[regex(r"'(\\[^\n']*'?|[^\\'\n])'", lex_char)]
    Char(u8),
    #[regex(r#""([^"\\\n]|\\[^\n])*""#, lex_string)]
    Literal(Vec<u8>),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*'*", lex_text)]
    Ident(String),
    #[regex(r"[#$%&*+\-./:<=>?@\\^`{}~|]+", lex_text)]
    Oper(String),
}

impl Token {
    /// A short description for error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Number(n) => format!("number {n}"),
            Self::Char(c) => format!("character '{}'", char::from(*c)),
            Self::Literal(_) => "string literal".to_string(),
            Self::Ident(text) | Self::Oper(text) => format!("'{text}'"),
            Self::Semi => "';'".to_string(),
            other => format!("'{other:?}'"),
        }
    }
}

/// Lexes one source line.
///
/// # Errors
///
/// An element is `Err` with the offending slice when the line contains a
/// malformed token (unterminated literal, character out of range).
pub fn lex_line(line: &str) -> Vec<Result<Token, String>> {
    Token::lexer(line)
        .spanned()
        .map(|(result, span)| result.map_err(|()| line[span].to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_tokens(line: &str) -> Vec<Token> {
        lex_line(line).into_iter().map(Result::unwrap).collect()
    }

    #[test]
    fn equation_tokens() {
        let tokens = ok_tokens("--- fact 0 <= 1;");
        assert_eq!(
            tokens,
            vec![
                Token::Valof,
                Token::Ident("fact".to_string()),
                Token::Number(0.0),
                Token::Is,
                Token::Number(1.0),
                Token::Semi,
            ]
        );
    }

    #[test]
    fn operator_runs_are_single_tokens() {
        let tokens = ok_tokens("x :: y");
        assert_eq!(tokens[1], Token::Oper("::".to_string()));
        // Reserved spellings win over the operator run at equal length.
        assert_eq!(ok_tokens("a <= b")[1], Token::Is);
        assert_eq!(ok_tokens("a <=> b")[1], Token::Oper("<=>".to_string()));
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(ok_tokens("1 ! the rest is comment ;"), vec![Token::Number(1.0)]);
    }

    #[test]
    fn literals_unescape() {
        assert_eq!(ok_tokens(r"'\n'"), vec![Token::Char(b'\n')]);
        assert_eq!(ok_tokens(r"'\x41'"), vec![Token::Char(b'A')]);
        assert_eq!(ok_tokens(r#""a\tb""#), vec![Token::Literal(b"a\tb".to_vec())]);
    }

    #[test]
    fn primed_identifiers() {
        assert_eq!(ok_tokens("x' y"), vec![
            Token::Ident("x'".to_string()),
            Token::Ident("y".to_string())
        ]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let tokens = lex_line("\"abc");
        assert!(tokens.iter().any(Result::is_err));
    }

    #[test]
    fn numbers_do_not_eat_bare_dots() {
        let tokens = ok_tokens("1. 2.5 3e2 4e");
        assert_eq!(
            tokens,
            vec![
                Token::Number(1.0),
                Token::Oper(".".to_string()),
                Token::Number(2.5),
                Token::Number(300.0),
                Token::Number(4.0),
                Token::Ident("e".to_string()),
            ]
        );
    }
}
