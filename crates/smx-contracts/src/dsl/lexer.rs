//! Tokenizer for the contract DSL.

use rust_decimal::Decimal;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Decimal(Decimal),
    Str(String),
    Ident(String),
    True,
    False,
    Let,
    Fn,
    If,
    Else,
    While,
    Return,
    Use,
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Bang,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Semi,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError(pub String);

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lex error: {}", self.0)
    }
}
impl std::error::Error for LexError {}

pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0usize;
    let mut tokens = Vec::new();

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            if text.contains('.') {
                let d = Decimal::from_str(&text)
                    .map_err(|e| LexError(format!("bad decimal literal '{text}': {e}")))?;
                tokens.push(Token::Decimal(d));
            } else {
                let n: i64 = text
                    .parse()
                    .map_err(|e| LexError(format!("bad integer literal '{text}': {e}")))?;
                tokens.push(Token::Int(n));
            }
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push(match word.as_str() {
                "let" => Token::Let,
                "fn" => Token::Fn,
                "if" => Token::If,
                "else" => Token::Else,
                "while" => Token::While,
                "return" => Token::Return,
                "use" | "using" => Token::Use,
                "true" => Token::True,
                "false" => Token::False,
                _ => Token::Ident(word),
            });
            continue;
        }
        if c == '"' {
            i += 1;
            let mut s = String::new();
            while i < chars.len() && chars[i] != '"' {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    i += 1;
                    s.push(match chars[i] {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                } else {
                    s.push(chars[i]);
                }
                i += 1;
            }
            if i >= chars.len() {
                return Err(LexError("unterminated string literal".to_string()));
            }
            i += 1; // closing quote
            tokens.push(Token::Str(s));
            continue;
        }
        macro_rules! two_char {
            ($next:expr, $two:expr, $one:expr) => {{
                if chars.get(i + 1) == Some(&$next) {
                    i += 2;
                    tokens.push($two);
                } else {
                    i += 1;
                    tokens.push($one);
                }
            }};
        }
        match c {
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '=' => two_char!('=', Token::EqEq, Token::Eq),
            '!' => two_char!('=', Token::NotEq, Token::Bang),
            '<' => two_char!('=', Token::LtEq, Token::Lt),
            '>' => two_char!('=', Token::GtEq, Token::Gt),
            '&' => {
                if chars.get(i + 1) == Some(&'&') {
                    i += 2;
                    tokens.push(Token::AndAnd);
                } else {
                    return Err(LexError("unexpected '&'".to_string()));
                }
            }
            '|' => {
                if chars.get(i + 1) == Some(&'|') {
                    i += 2;
                    tokens.push(Token::OrOr);
                } else {
                    return Err(LexError("unexpected '|'".to_string()));
                }
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '{' => {
                tokens.push(Token::LBrace);
                i += 1;
            }
            '}' => {
                tokens.push(Token::RBrace);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            ';' => {
                tokens.push(Token::Semi);
                i += 1;
            }
            other => return Err(LexError(format!("unexpected character '{other}'"))),
        }
    }
    tokens.push(Token::Eof);
    Ok(tokens)
}
