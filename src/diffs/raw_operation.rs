use std::fmt::Debug;

use super::myers::myers_diff;
use crate::{
    tokenizer::token::Token,
    utils::deadline::{Deadline, TimedOut},
};

/// A run of tokens that a diff keeps, inserts or deletes.
///
/// Subsequent operations of the same kind are joined into a single run.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOperation<T>
where
    T: PartialEq + Clone + Debug,
{
    Insert(Vec<Token<T>>),
    Delete(Vec<Token<T>>),
    Equal(Vec<Token<T>>),
}

impl<T> RawOperation<T>
where
    T: PartialEq + Clone + Debug,
{
    /// Diffs `left` against `right` and joins the result into runs.
    pub fn vec_from(
        left: &[Token<T>],
        right: &[Token<T>],
        deadline: &Deadline,
    ) -> Result<Vec<Self>, TimedOut> {
        let mut result: Vec<Self> = Vec::new();
        for operation in myers_diff(left, right, deadline)? {
            match result.pop() {
                Some(previous)
                    if std::mem::discriminant(&previous) == std::mem::discriminant(&operation) =>
                {
                    result.push(previous.join(operation));
                }
                Some(previous) => {
                    result.push(previous);
                    result.push(operation);
                }
                None => result.push(operation),
            }
        }
        Ok(result)
    }

    pub fn tokens(&self) -> &Vec<Token<T>> {
        match self {
            RawOperation::Insert(tokens)
            | RawOperation::Delete(tokens)
            | RawOperation::Equal(tokens) => tokens,
        }
    }

    pub fn original_text_length(&self) -> usize { self.tokens().iter().map(Token::original_length).sum() }

    pub fn original_text(&self) -> String { self.tokens().iter().map(Token::original).collect() }

    /// Extends the operation with another operation. Only operations of the
    /// same type as self can be used to extend self.
    pub fn join(self, other: RawOperation<T>) -> RawOperation<T> {
        debug_assert!(
            std::mem::discriminant(&self) == std::mem::discriminant(&other),
            "Cannot extend operations of different types. This should have been handled before \
             calling this function."
        );

        match (self, other) {
            (RawOperation::Insert(self_tokens), RawOperation::Insert(other_tokens)) => {
                RawOperation::Insert(self_tokens.into_iter().chain(other_tokens).collect())
            }
            (RawOperation::Delete(tokens1), RawOperation::Delete(tokens2)) => {
                RawOperation::Delete(tokens1.into_iter().chain(tokens2).collect())
            }
            (RawOperation::Equal(tokens1), RawOperation::Equal(tokens2)) => {
                RawOperation::Equal(tokens1.into_iter().chain(tokens2).collect())
            }
            (operation, _) => operation,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::tokenizer::{character_tokenizer::character_tokenizer, word_tokenizer::word_tokenizer};

    fn describe(operations: &[RawOperation<String>]) -> Vec<String> {
        operations
            .iter()
            .map(|operation| match operation {
                RawOperation::Insert(_) => format!("+{}", operation.original_text()),
                RawOperation::Delete(_) => format!("-{}", operation.original_text()),
                RawOperation::Equal(_) => format!("={}", operation.original_text()),
            })
            .collect()
    }

    #[test]
    fn test_runs_are_joined() {
        let operations = RawOperation::vec_from(
            &character_tokenizer("hello world"),
            &character_tokenizer("hello there"),
            &Deadline::none(),
        )
        .unwrap();

        assert_eq!(operations[0], RawOperation::Equal(character_tokenizer("hello ")));
        assert_eq!(operations[0].original_text_length(), 6);
        assert_eq!(
            operations
                .iter()
                .filter(|operation| matches!(operation, RawOperation::Equal(_)))
                .map(RawOperation::original_text)
                .collect::<String>(),
            "hello r"
        );
    }

    #[test]
    fn test_word_runs() {
        let operations = RawOperation::vec_from(
            &word_tokenizer("the quick fox"),
            &word_tokenizer("the slow fox"),
            &Deadline::none(),
        )
        .unwrap();

        let mut described = describe(&operations);
        assert_eq!(described.first().map(String::as_str), Some("=the"));
        assert_eq!(described.last().map(String::as_str), Some("= fox"));

        described.sort();
        assert_eq!(described, vec!["+ slow", "- quick", "= fox", "=the"]);
    }
}
