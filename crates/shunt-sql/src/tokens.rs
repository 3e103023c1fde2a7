//! Token-level helpers shared by the analyzer, definition model and diff.

use sqlparser::tokenizer::{Token, Word};

/// Words after which an opening parenthesis is separated by a space.
const SPACED_BEFORE_PAREN: &[&str] = &[
    "AND", "AS", "CHECK", "EXISTS", "FROM", "IN", "INDEX", "JOIN", "KEY", "NOT", "ON", "OR",
    "SELECT", "UNIQUE", "USING", "VALUES", "WHERE",
];

/// Drop whitespace, comments and the end-of-file marker.
pub(crate) fn significant(tokens: Vec<Token>) -> Vec<Token> {
    tokens
        .into_iter()
        .filter(|t| !matches!(t, Token::Whitespace(_) | Token::EOF))
        .collect()
}

/// The word behind a token, quoted or not.
pub(crate) fn word(token: &Token) -> Option<&Word> {
    match token {
        Token::Word(w) => Some(w),
        _ => None,
    }
}

/// True when `token` is the unquoted keyword `kw` (case-insensitive).
pub(crate) fn is_kw(token: &Token, kw: &str) -> bool {
    matches!(token, Token::Word(w) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(kw))
}

/// Upper-cased text of an unquoted word.
pub(crate) fn kw_upper(token: &Token) -> Option<String> {
    match token {
        Token::Word(w) if w.quote_style.is_none() => Some(w.value.to_ascii_uppercase()),
        _ => None,
    }
}

/// Identifier value of a word token (quotes removed).
pub(crate) fn ident(token: &Token) -> Option<String> {
    word(token).map(|w| w.value.clone())
}

/// Index of the parenthesis closing the one opened at `open`.
pub(crate) fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split at commas that are not nested inside parentheses.
pub(crate) fn split_top_level(tokens: &[Token]) -> Vec<&[Token]> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth -= 1,
            Token::Comma if depth == 0 => {
                parts.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < tokens.len() {
        parts.push(&tokens[start..]);
    }
    parts.retain(|p| !p.is_empty());
    parts
}

fn needs_space(prev: &Token, cur: &Token) -> bool {
    match (prev, cur) {
        (Token::LParen, _) | (Token::Period, _) => false,
        (_, Token::RParen) | (_, Token::Comma) | (_, Token::Period) | (_, Token::SemiColon) => {
            false
        }
        (Token::Word(w), Token::LParen) => SPACED_BEFORE_PAREN
            .iter()
            .any(|kw| w.value.eq_ignore_ascii_case(kw)),
        _ => true,
    }
}

fn join(tokens: &[Token], text: impl Fn(&Token) -> String) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;
    for token in tokens {
        if let Some(p) = prev {
            if needs_space(p, token) {
                out.push(' ');
            }
        }
        out.push_str(&text(token));
        prev = Some(token);
    }
    out
}

/// Render significant tokens with canonical spacing, keeping case and quotes.
pub(crate) fn render(tokens: &[Token]) -> String {
    join(tokens, |t| t.to_string())
}

/// Render significant tokens in comparison form: identifiers and keywords
/// case-folded, redundant identifier quotes removed, literals untouched.
pub(crate) fn render_folded(tokens: &[Token]) -> String {
    join(tokens, |t| match t {
        Token::Word(w) => fold_word(w),
        other => other.to_string(),
    })
}

fn fold_word(w: &Word) -> String {
    let lower = w.value.to_lowercase();
    let plain = !lower.is_empty()
        && lower
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !lower.chars().all(|c| c.is_ascii_digit());
    if w.quote_style.is_none() || plain {
        lower
    } else {
        format!("`{}`", lower.replace('`', "``"))
    }
}

/// Render every token verbatim, whitespace and comments included.
pub(crate) fn render_verbatim(tokens: &[Token]) -> String {
    tokens
        .iter()
        .filter(|t| !matches!(t, Token::EOF))
        .map(|t| t.to_string())
        .collect()
}

/// Strip trailing semicolons from a significant-token slice.
pub(crate) fn trim_semicolons(mut tokens: &[Token]) -> &[Token] {
    while let Some((Token::SemiColon, rest)) = tokens.split_last() {
        tokens = rest;
    }
    tokens
}
