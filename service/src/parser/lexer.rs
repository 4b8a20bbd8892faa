//! Tokeniser for the textual schema mini-language
//!
//! ```text
//! default(x categorical, z numerical), rf(y numerical given x, z), dependent(x, z)
//! ```
//!
//! turns into one [`SchemaBlock`] per directive. Commas inside a block are
//! kept as `","` tokens; the block parser decides where they matter.

use composer_core::{ComposerError, Result};
use serde::{Deserialize, Serialize};

/// One `(directive, token-list)` block of a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaBlock {
    /// Directive name as written
    pub directive: String,
    /// Tokens between the parentheses, commas included
    pub tokens: Vec<String>,
}

impl SchemaBlock {
    /// Build a block from string slices
    #[must_use]
    pub fn new(directive: impl Into<String>, tokens: &[&str]) -> Self {
        Self {
            directive: directive.into(),
            tokens: tokens.iter().map(|t| (*t).to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Word(String),
    Comma,
    Open,
    Close,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            ',' => {
                chars.next();
                tokens.push(Token { kind: TokenKind::Comma, offset });
            }
            '(' => {
                chars.next();
                tokens.push(Token { kind: TokenKind::Open, offset });
            }
            ')' => {
                chars.next();
                tokens.push(Token { kind: TokenKind::Close, offset });
            }
            c if is_word_char(c) => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !is_word_char(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token {
                    kind: TokenKind::Word(word),
                    offset,
                });
            }
            other => {
                return Err(ComposerError::schema_at(
                    format!("Unexpected character '{other}'"),
                    format!("offset {offset}"),
                ));
            }
        }
    }

    Ok(tokens)
}

/// Split schema text into directive blocks
///
/// # Errors
///
/// Returns `ComposerError::SchemaError` with a byte offset when the text is
/// not a comma-separated list of `name( ... )` blocks
pub fn parse_blocks(text: &str) -> Result<Vec<SchemaBlock>> {
    let tokens = tokenize(text)?;
    let mut blocks = Vec::new();
    let mut pos = 0;

    while pos < tokens.len() {
        let token = &tokens[pos];
        let directive = match &token.kind {
            TokenKind::Word(word) => word.clone(),
            TokenKind::Comma if !blocks.is_empty() => {
                pos += 1;
                continue;
            }
            _ => {
                return Err(ComposerError::schema_at(
                    "Expected a directive name",
                    format!("offset {}", token.offset),
                ));
            }
        };
        pos += 1;

        match tokens.get(pos) {
            Some(Token {
                kind: TokenKind::Open,
                ..
            }) => pos += 1,
            Some(other) => {
                return Err(ComposerError::schema_at(
                    format!("Expected '(' after directive \"{directive}\""),
                    format!("offset {}", other.offset),
                ));
            }
            None => {
                return Err(ComposerError::schema(format!(
                    "Directive \"{directive}\" has no body"
                )));
            }
        }

        let mut body = Vec::new();
        loop {
            let Some(token) = tokens.get(pos) else {
                return Err(ComposerError::schema(format!(
                    "Unclosed body of directive \"{directive}\""
                )));
            };
            pos += 1;
            match &token.kind {
                TokenKind::Word(word) => body.push(word.clone()),
                TokenKind::Comma => body.push(",".to_string()),
                TokenKind::Close => break,
                TokenKind::Open => {
                    return Err(ComposerError::schema_at(
                        "Nested '(' is not allowed inside a directive",
                        format!("offset {}", token.offset),
                    ));
                }
            }
        }

        blocks.push(SchemaBlock {
            directive,
            tokens: body,
        });
    }

    Ok(blocks)
}
