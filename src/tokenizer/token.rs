/// A token is a piece of a sequence that is compared as a whole when
/// diffing.
///
/// A token consists of the normalized form used for comparison, and the
/// original string it was cut from, used for measuring and rebuilding the
/// text.
///
/// It's UTF-8 compatible.
#[derive(Debug, Clone)]
pub struct Token<T>
where
    T: PartialEq + Clone + std::fmt::Debug,
{
    /// The normalized form of the token used for deriving the diff.
    normalized: T,

    /// The original string, that should be inserted or deleted in the document.
    original: String,
}

/// Trivial implementation of Token when the normalized form is the same as the
/// original string.
impl From<&str> for Token<String> {
    fn from(text: &str) -> Self { Token::new(text.to_owned(), text.to_owned()) }
}

impl<T> Token<T>
where
    T: PartialEq + Clone + std::fmt::Debug,
{
    pub fn new(normalized: T, original: String) -> Self {
        Token {
            normalized,
            original,
        }
    }

    pub fn original(&self) -> &str { &self.original }

    pub fn set_normalized(&mut self, normalized: T) { self.normalized = normalized; }

    pub fn normalized(&self) -> &T { &self.normalized }

    /// Length of the original string in characters, which is also the number
    /// of document positions it covers.
    pub fn original_length(&self) -> usize { self.original.chars().count() }
}

impl<T> PartialEq for Token<T>
where
    T: PartialEq + Clone + std::fmt::Debug,
{
    fn eq(&self, other: &Self) -> bool { self.normalized == other.normalized }
}
