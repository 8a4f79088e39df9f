use token::Token;

pub mod character_tokenizer;
pub mod position_tokenizer;
pub mod token;
pub mod word_tokenizer;

/// Splits text into the tokens a diff compares.
pub type Tokenizer<T> = dyn Fn(&str) -> Vec<Token<T>>;
