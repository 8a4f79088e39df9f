use std::{
    fmt::{self, Display},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use super::PatchError;

/// The part of a node a [`Pointer`] addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// The node itself.
    Node,
    Type,
    Text,
    Attr(String),
    Marks,
}

/// An RFC 6901 JSON pointer into a document's JSON form, restricted to the
/// paths a node tree has: a chain of child indices followed by a field.
///
/// ```not_rust
/// /content/0/content/1/text -> children [0, 1], field Text
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pointer {
    children: Vec<usize>,
    field: Field,
}

impl Pointer {
    /// Points at the root node.
    #[must_use]
    pub fn root() -> Self {
        Self {
            children: Vec::new(),
            field: Field::Node,
        }
    }

    #[must_use]
    pub fn new(children: Vec<usize>, field: Field) -> Self { Self { children, field } }

    pub fn children(&self) -> &[usize] { &self.children }

    pub fn field(&self) -> &Field { &self.field }

    /// The pointer to the `index`-th child of the node this points at.
    #[must_use]
    pub fn child(&self, index: usize) -> Self {
        let mut children = self.children.clone();
        children.push(index);
        Self::new(children, Field::Node)
    }

    /// The pointer to `field` of the node this points at.
    #[must_use]
    pub fn with_field(&self, field: Field) -> Self { Self::new(self.children.clone(), field) }

    /// Whether the pointer addresses the type or the attributes of a node.
    pub fn is_markup(&self) -> bool { matches!(self.field, Field::Type | Field::Attr(_)) }
}

fn escape(token: &str) -> String { token.replace('~', "~0").replace('/', "~1") }

fn unescape(token: &str) -> String { token.replace("~1", "/").replace("~0", "~") }

impl Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for index in &self.children {
            write!(f, "/content/{index}")?;
        }
        match &self.field {
            Field::Node => Ok(()),
            Field::Type => write!(f, "/type"),
            Field::Text => write!(f, "/text"),
            Field::Attr(key) => write!(f, "/attrs/{}", escape(key)),
            Field::Marks => write!(f, "/marks"),
        }
    }
}

impl FromStr for Pointer {
    type Err = PatchError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let invalid = || PatchError::InvalidPointer(source.to_owned());

        if source.is_empty() {
            return Ok(Self::root());
        }
        let mut tokens = source.strip_prefix('/').ok_or_else(invalid)?.split('/');
        let mut children = Vec::new();

        while let Some(token) = tokens.next() {
            let field = match token {
                "content" => {
                    let index = tokens
                        .next()
                        .and_then(|index| index.parse().ok())
                        .ok_or_else(invalid)?;
                    children.push(index);
                    continue;
                }
                "type" => Field::Type,
                "text" => Field::Text,
                "marks" => Field::Marks,
                "attrs" => Field::Attr(unescape(tokens.next().ok_or_else(invalid)?)),
                _ => return Err(invalid()),
            };
            if tokens.next().is_some() {
                return Err(invalid());
            }
            return Ok(Self::new(children, field));
        }

        Ok(Self::new(children, Field::Node))
    }
}

impl Serialize for Pointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> { serializer.collect_str(self) }
}

impl<'de> Deserialize<'de> for Pointer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        source.parse().map_err(de::Error::custom)
    }
}
