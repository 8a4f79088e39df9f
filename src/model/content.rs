use std::{collections::BTreeSet, iter::Peekable, str::CharIndices};

use super::ModelError;

/// A parsed content expression such as `"paragraph+"` or
/// `"(heading | paragraph) block*"`. Names are resolved to the concrete node
/// type names they stand for when the schema is built, so groups are already
/// expanded here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ContentExpr {
    Name(Vec<String>),
    Seq(Vec<ContentExpr>),
    Choice(Vec<ContentExpr>),
    Star(Box<ContentExpr>),
    Plus(Box<ContentExpr>),
    Opt(Box<ContentExpr>),
}

impl ContentExpr {
    /// Parses `source`, resolving each name through `resolve` which returns
    /// the node type names a name or group refers to.
    pub fn parse<F>(source: &str, resolve: F) -> Result<Self, ModelError>
    where
        F: Fn(&str) -> Option<Vec<String>>,
    {
        let mut parser = Parser {
            source,
            chars: source.char_indices().peekable(),
            resolve,
        };

        parser.skip_whitespace();
        if parser.chars.peek().is_none() {
            return Ok(ContentExpr::Seq(vec![]));
        }

        let expr = parser.parse_choice()?;
        parser.skip_whitespace();
        if let Some((index, c)) = parser.chars.next() {
            return Err(ModelError::InvalidSchema(format!(
                "unexpected `{c}` at offset {index} in content expression `{source}`"
            )));
        }

        Ok(expr)
    }

    /// Whether the expression accepts no content at all.
    pub fn is_empty(&self) -> bool { matches!(self, ContentExpr::Seq(items) if items.is_empty()) }

    /// All node type names the expression can accept.
    pub fn names(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            ContentExpr::Name(types) => names.extend(types.iter().map(String::as_str)),
            ContentExpr::Seq(items) | ContentExpr::Choice(items) => {
                for item in items {
                    item.collect_names(names);
                }
            }
            ContentExpr::Star(inner) | ContentExpr::Plus(inner) | ContentExpr::Opt(inner) => {
                inner.collect_names(names);
            }
        }
    }

    /// Whether the sequence of child type names is accepted in full.
    pub fn matches(&self, types: &[&str]) -> bool { self.ends(types, 0).contains(&types.len()) }

    /// The set of offsets into `types` at which a match of this expression
    /// starting at `start` can end.
    fn ends(&self, types: &[&str], start: usize) -> BTreeSet<usize> {
        match self {
            ContentExpr::Name(names) => types
                .get(start)
                .filter(|name| names.iter().any(|allowed| allowed == *name))
                .map(|_| start + 1)
                .into_iter()
                .collect(),
            ContentExpr::Seq(items) => items.iter().fold(BTreeSet::from([start]), |positions, item| {
                positions
                    .into_iter()
                    .flat_map(|position| item.ends(types, position))
                    .collect()
            }),
            ContentExpr::Choice(items) => items
                .iter()
                .flat_map(|item| item.ends(types, start))
                .collect(),
            ContentExpr::Star(inner) => Self::repeat(inner, types, start),
            ContentExpr::Plus(inner) => inner
                .ends(types, start)
                .into_iter()
                .flat_map(|position| Self::repeat(inner, types, position))
                .collect(),
            ContentExpr::Opt(inner) => {
                let mut ends = inner.ends(types, start);
                ends.insert(start);
                ends
            }
        }
    }

    fn repeat(inner: &ContentExpr, types: &[&str], start: usize) -> BTreeSet<usize> {
        let mut reached = BTreeSet::from([start]);
        let mut frontier = vec![start];

        while let Some(position) = frontier.pop() {
            for end in inner.ends(types, position) {
                if reached.insert(end) {
                    frontier.push(end);
                }
            }
        }

        reached
    }
}

struct Parser<'a, F> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    resolve: F,
}

impl<F> Parser<'_, F>
where
    F: Fn(&str) -> Option<Vec<String>>,
{
    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    fn error(&self, message: &str) -> ModelError {
        ModelError::InvalidSchema(format!("{message} in content expression `{}`", self.source))
    }

    fn parse_choice(&mut self) -> Result<ContentExpr, ModelError> {
        let mut options = vec![self.parse_seq()?];

        loop {
            self.skip_whitespace();
            if self.chars.next_if(|(_, c)| *c == '|').is_none() {
                break;
            }
            options.push(self.parse_seq()?);
        }

        Ok(if options.len() == 1 {
            options.remove(0)
        } else {
            ContentExpr::Choice(options)
        })
    }

    fn parse_seq(&mut self) -> Result<ContentExpr, ModelError> {
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            match self.chars.peek() {
                Some((_, c)) if *c == '(' || is_name_char(*c) => items.push(self.parse_term()?),
                _ => break,
            }
        }

        match items.len() {
            0 => Err(self.error("expected a name or `(`")),
            1 => Ok(items.remove(0)),
            _ => Ok(ContentExpr::Seq(items)),
        }
    }

    fn parse_term(&mut self) -> Result<ContentExpr, ModelError> {
        let mut expr = self.parse_atom()?;

        while let Some((_, c)) = self.chars.next_if(|(_, c)| matches!(c, '*' | '+' | '?')) {
            expr = match c {
                '*' => ContentExpr::Star(Box::new(expr)),
                '+' => ContentExpr::Plus(Box::new(expr)),
                _ => ContentExpr::Opt(Box::new(expr)),
            };
        }

        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<ContentExpr, ModelError> {
        if self.chars.next_if(|(_, c)| *c == '(').is_some() {
            let expr = self.parse_choice()?;
            self.skip_whitespace();
            return match self.chars.next() {
                Some((_, ')')) => Ok(expr),
                _ => Err(self.error("missing closing `)`")),
            };
        }

        let mut name = String::new();
        while let Some((_, c)) = self.chars.next_if(|(_, c)| is_name_char(*c)) {
            name.push(c);
        }

        match (self.resolve)(&name) {
            Some(types) if !types.is_empty() => Ok(ContentExpr::Name(types)),
            _ => Err(self.error(&format!("unknown node type or group `{name}`"))),
        }
    }
}

fn is_name_char(c: char) -> bool { c.is_alphanumeric() || c == '_' || c == '-' }

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn resolve(name: &str) -> Option<Vec<String>> {
        match name {
            "block" => Some(vec!["paragraph".to_owned(), "heading".to_owned()]),
            "paragraph" | "heading" | "text" | "image" => Some(vec![name.to_owned()]),
            _ => None,
        }
    }

    #[test_case("block+", &["paragraph"], true)]
    #[test_case("block+", &[], false)]
    #[test_case("block*", &[], true)]
    #[test_case("heading paragraph*", &["heading", "paragraph", "paragraph"], true)]
    #[test_case("heading paragraph*", &["paragraph"], false)]
    #[test_case("(text | image)*", &["text", "image", "text"], true)]
    #[test_case("heading? paragraph", &["paragraph"], true)]
    #[test_case("heading? paragraph", &["heading", "heading", "paragraph"], false)]
    #[test_case("", &[], true)]
    #[test_case("", &["text"], false)]
    fn test_matches(source: &str, types: &[&str], expected: bool) {
        let expr = ContentExpr::parse(source, resolve).unwrap();
        assert_eq!(expr.matches(types), expected);
    }

    #[test]
    fn test_names_expand_groups() {
        let expr = ContentExpr::parse("block+", resolve).unwrap();
        assert_eq!(
            expr.names().into_iter().collect::<Vec<_>>(),
            vec!["heading", "paragraph"]
        );
        assert!(ContentExpr::parse("   ", resolve).unwrap().is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert!(ContentExpr::parse("unknown+", resolve).is_err());
        assert!(ContentExpr::parse("(paragraph", resolve).is_err());
        assert!(ContentExpr::parse("paragraph)", resolve).is_err());
    }
}
