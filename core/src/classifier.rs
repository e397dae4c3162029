//! Statement classifier
//!
//! Splits raw SQL text into statements, strips comments and tags each
//! statement with a [`StatementKind`]. Tokenization uses the `sqlparser`
//! tokenizer; when it rejects the input (unterminated literals and the like)
//! a lenient splitter takes over, so classification never fails. The worst
//! case is [`StatementKind::Unknown`].

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};
use tracing::debug;

use crate::statement::{Statement, StatementKind};

/// Keywords after which the next identifier names a table.
const TABLE_MARKERS: &[&str] = &["FROM", "JOIN", "INTO", "UPDATE", "TABLE", "TRUNCATE"];

/// Words that can sit between a marker and the table name.
const TABLE_NAME_FILLERS: &[&str] = &["IF", "NOT", "EXISTS", "ONLY", "LATERAL", "TABLE"];

/// Split `raw` into classified statements, tagging each with `origin_path`.
///
/// Empty and comment-only statements are dropped.
pub fn classify(raw: &str, origin_path: &str) -> Vec<Statement> {
    let dialect = PostgreSqlDialect {};
    match Tokenizer::new(&dialect, raw).with_unescape(false).tokenize() {
        Ok(tokens) => split_statements(&tokens)
            .into_iter()
            .filter_map(|unit| classify_unit(unit, origin_path))
            .collect(),
        Err(err) => {
            debug!("tokenizer rejected {origin_path}: {err}; using lenient splitter");
            classify_lenient(raw, origin_path)
        }
    }
}

/// Referenced table names, in order of first appearance.
pub fn referenced_tables(text: &str) -> Vec<String> {
    let dialect = PostgreSqlDialect {};
    match Tokenizer::new(&dialect, text).with_unescape(false).tokenize() {
        Ok(tokens) => collect_tables(tokens.iter().filter_map(lexeme_from_token)),
        Err(_) => collect_tables(lenient_lexemes(text)),
    }
}

/// Number of statements in `text` after comment stripping.
pub fn statement_count(text: &str) -> usize {
    classify(text, "").len()
}

fn split_statements(tokens: &[Token]) -> Vec<&[Token]> {
    tokens
        .split(|token| matches!(token, Token::SemiColon))
        .collect()
}

fn classify_unit(tokens: &[Token], origin_path: &str) -> Option<Statement> {
    let text = strip_comments(tokens);
    if text.is_empty() {
        return None;
    }

    let kind = keyword_kind(tokens).unwrap_or_else(|| prefix_kind(&text));
    let tables = collect_tables(tokens.iter().filter_map(lexeme_from_token));
    Some(Statement::new(text, kind, origin_path, tables))
}

/// Reassemble a statement without its comments. Line comments become a
/// newline and block comments a space so neighbouring tokens never fuse.
fn strip_comments(tokens: &[Token]) -> String {
    let mut text = String::new();
    for token in tokens {
        match token {
            Token::Whitespace(Whitespace::SingleLineComment { .. }) => text.push('\n'),
            Token::Whitespace(Whitespace::MultiLineComment(_)) => text.push(' '),
            other => text.push_str(&other.to_string()),
        }
    }
    text.trim().to_string()
}

/// First unquoted top-level word that is a known keyword.
fn keyword_kind(tokens: &[Token]) -> Option<StatementKind> {
    let mut depth = 0usize;
    for token in tokens {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Word(word) if depth == 0 && word.quote_style.is_none() => {
                if let Some(kind) = StatementKind::from_keyword(&word.value) {
                    return Some(kind);
                }
            }
            _ => {}
        }
    }
    None
}

/// Prefix match over the comment-stripped text.
fn prefix_kind(text: &str) -> StatementKind {
    let upper = text.trim_start().to_ascii_uppercase();
    if upper.starts_with("WITH") {
        return StatementKind::Select;
    }
    if upper.starts_with("START TRANSACTION") {
        return StatementKind::Begin;
    }
    StatementKind::KEYWORDS
        .into_iter()
        .find(|kind| upper.starts_with(kind.as_str()))
        .unwrap_or(StatementKind::Unknown)
}

#[derive(Debug, Clone, Copy)]
enum Lexeme<'a> {
    Word { value: &'a str, quoted: bool },
    Period,
    Other,
}

fn lexeme_from_token(token: &Token) -> Option<Lexeme<'_>> {
    match token {
        Token::Whitespace(_) => None,
        Token::Word(word) => Some(Lexeme::Word {
            value: &word.value,
            quoted: word.quote_style.is_some(),
        }),
        Token::Period => Some(Lexeme::Period),
        _ => Some(Lexeme::Other),
    }
}

fn is_marker(lexeme: &Lexeme<'_>) -> bool {
    matches!(lexeme, Lexeme::Word { value, quoted: false }
        if TABLE_MARKERS.iter().any(|marker| marker.eq_ignore_ascii_case(value)))
}

fn is_filler(value: &str) -> bool {
    TABLE_NAME_FILLERS
        .iter()
        .any(|filler| filler.eq_ignore_ascii_case(value))
}

fn collect_tables<'a>(lexemes: impl Iterator<Item = Lexeme<'a>>) -> Vec<String> {
    let lexemes: Vec<Lexeme<'a>> = lexemes.collect();
    let mut tables: Vec<String> = Vec::new();
    let mut index = 0;

    while index < lexemes.len() {
        if !is_marker(&lexemes[index]) {
            index += 1;
            continue;
        }
        index += 1;

        while let Some(Lexeme::Word {
            value,
            quoted: false,
        }) = lexemes.get(index)
        {
            if is_filler(value) {
                index += 1;
            } else {
                break;
            }
        }

        let Some(Lexeme::Word { value, quoted }) = lexemes.get(index) else {
            continue;
        };
        if !quoted && is_marker(&lexemes[index]) {
            continue;
        }

        let mut name = (*value).to_string();
        index += 1;
        while let (Some(Lexeme::Period), Some(Lexeme::Word { value, .. })) =
            (lexemes.get(index), lexemes.get(index + 1))
        {
            name.push('.');
            name.push_str(value);
            index += 2;
        }

        if !tables.contains(&name) {
            tables.push(name);
        }
    }

    tables
}

// ---------------------------------------------------------------------------
// Lenient path
// ---------------------------------------------------------------------------

fn classify_lenient(raw: &str, origin_path: &str) -> Vec<Statement> {
    strip_comments_lenient(raw)
        .split(';')
        .filter_map(|chunk| {
            let text = chunk.trim();
            if text.is_empty() {
                return None;
            }
            let tables = collect_tables(lenient_lexemes(text));
            Some(Statement::new(text, prefix_kind(text), origin_path, tables))
        })
        .collect()
}

/// Quote-unaware comment removal for text the tokenizer rejected.
fn strip_comments_lenient(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        match (ch, chars.peek()) {
            ('-', Some('-')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        break;
                    }
                }
                out.push('\n');
            }
            ('/', Some('*')) => {
                chars.next();
                let mut previous = '\0';
                for skipped in chars.by_ref() {
                    if previous == '*' && skipped == '/' {
                        break;
                    }
                    previous = skipped;
                }
                out.push(' ');
            }
            _ => out.push(ch),
        }
    }

    out
}

fn lenient_lexemes(text: &str) -> impl Iterator<Item = Lexeme<'_>> {
    text.split(|c: char| c.is_whitespace() || c == ',' || c == '(' || c == ')')
        .filter(|word| !word.is_empty())
        .map(|word| Lexeme::Word {
            value: word.trim_matches('"'),
            quoted: word.starts_with('"'),
        })
}
