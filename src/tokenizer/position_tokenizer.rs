use super::token::Token;
use crate::model::{Attrs, Fragment, Mark, Slice};

/// What occupies a single document position.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionToken {
    Char(char, Vec<Mark>),
    Open(String, Attrs),
    Close(String),
    Leaf(String, Attrs, Vec<Mark>),
}

/// Splits a slice into one token per document position it covers: a token
/// per character, one for every leaf node and one for each side of every
/// other node. The boundaries of open nodes cover no position and produce no
/// token.
///
/// ```not_rust
/// <p>"Hi"</p><img> -> [Open(p), "H", "i", Close(p), Leaf(img)]
/// ```
pub fn slice_tokenizer(slice: &Slice) -> Vec<Token<PositionToken>> {
    let mut tokens = Vec::new();
    push_tokens(slice.content(), &mut tokens);

    let end = tokens.len().saturating_sub(slice.open_end());
    let start = slice.open_start().min(end);
    tokens.truncate(end);
    tokens.drain(..start);
    tokens
}

fn push_tokens(fragment: &Fragment, tokens: &mut Vec<Token<PositionToken>>) {
    for node in fragment {
        let name = node.node_type().name().to_owned();

        if let Some(text) = node.text() {
            tokens.extend(
                text.chars()
                    .map(|char| Token::new(PositionToken::Char(char, node.marks().to_vec()), char.to_string())),
            );
        } else if node.is_leaf() {
            tokens.push(Token::new(
                PositionToken::Leaf(name, node.attrs().clone(), node.marks().to_vec()),
                String::new(),
            ));
        } else {
            tokens.push(Token::new(
                PositionToken::Open(name.clone(), node.attrs().clone()),
                String::new(),
            ));
            push_tokens(node.content(), tokens);
            tokens.push(Token::new(PositionToken::Close(name), String::new()));
        }
    }
}
