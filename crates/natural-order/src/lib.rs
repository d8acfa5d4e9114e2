//! Natural ordering for alphanumeric identifiers.
//!
//! Identifiers are split into runs of ASCII digits and runs of everything
//! else. Digit runs compare by numeric value, other runs compare as text,
//! so `acc2` sorts before `acc10`.
//!
//! ```
//! use natural_order::natural_sort;
//!
//! let mut accounts = vec!["acc10", "acc2", "acc1"];
//! natural_sort(&mut accounts);
//! assert_eq!(accounts, ["acc1", "acc2", "acc10"]);
//! ```

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Numeric,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub kind: TokenKind,
}

impl Token<'_> {
    pub fn is_numeric(&self) -> bool {
        self.kind == TokenKind::Numeric
    }
}

/// Iterator over the maximal digit / non-digit runs of a string.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.rest.chars().next()?;
        let numeric = first.is_ascii_digit();
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != numeric)
            .map(|(idx, _)| idx)
            .unwrap_or(self.rest.len());

        let (text, rest) = self.rest.split_at(end);
        self.rest = rest;

        Some(Token {
            text,
            kind: if numeric {
                TokenKind::Numeric
            } else {
                TokenKind::Text
            },
        })
    }
}

impl std::iter::FusedIterator for Tokens<'_> {}

pub fn tokenize(input: &str) -> Tokens<'_> {
    Tokens { rest: input }
}

/// String collation applied to text runs.
///
/// `Ordinal` compares Unicode scalar values. `CaseInsensitive` compares
/// lowercase-folded text. Identifiers that tie under folding across every
/// position are then ordered by the ordinal natural order, so distinct
/// spellings never collapse into one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Collation {
    #[default]
    Ordinal,
    CaseInsensitive,
}

impl Collation {
    /// Compares a single pair of text runs. `CaseInsensitive` reports
    /// `Equal` for case variants; `compare_with` settles those afterwards.
    pub fn compare_text(self, a: &str, b: &str) -> Ordering {
        match self {
            Self::Ordinal => a.cmp(b),
            Self::CaseInsensitive => a
                .chars()
                .flat_map(char::to_lowercase)
                .cmp(b.chars().flat_map(char::to_lowercase)),
        }
    }
}

pub fn compare(a: &str, b: &str) -> Ordering {
    compare_with(a, b, Collation::Ordinal)
}

pub fn compare_with(a: &str, b: &str, collation: Collation) -> Ordering {
    match collation {
        Collation::Ordinal => compare_tokens(a, b, Collation::Ordinal),
        Collation::CaseInsensitive => compare_tokens(a, b, Collation::CaseInsensitive)
            .then_with(|| compare_tokens(a, b, Collation::Ordinal)),
    }
}

fn compare_tokens(a: &str, b: &str, collation: Collation) -> Ordering {
    let mut left = tokenize(a);
    let mut right = tokenize(b);

    loop {
        match (left.next(), right.next()) {
            (Some(l), Some(r)) => {
                if l.text == r.text {
                    continue;
                }

                let ordering = if l.is_numeric() && r.is_numeric() {
                    compare_numeric(l.text, r.text)
                } else {
                    collation.compare_text(l.text, r.text)
                };

                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            // Remaining token counts decide once one side runs out.
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
        }
    }
}

/// Compares two ASCII digit runs by magnitude.
///
/// Leading zeros are ignored, so `"007"` equals `"7"`. Works for runs of
/// any length.
pub fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

pub fn natural_sort<S: AsRef<str>>(items: &mut [S]) {
    natural_sort_with(items, Collation::Ordinal);
}

pub fn natural_sort_with<S: AsRef<str>>(items: &mut [S], collation: Collation) {
    items.sort_by(|a, b| compare_with(a.as_ref(), b.as_ref(), collation));
}

pub fn natural_sort_by_key<T, F>(items: &mut [T], mut key: F)
where
    F: for<'t> FnMut(&'t T) -> &'t str,
{
    items.sort_by(|a, b| compare(key(a), key(b)));
}

/// Wrapper ordering its contents naturally.
///
/// Equality follows the comparator, so `NaturalKey("007") == NaturalKey("7")`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalKey<S>(pub S);

impl<S: AsRef<str>> PartialEq for NaturalKey<S> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<S: AsRef<str>> Eq for NaturalKey<S> {}

impl<S: AsRef<str>> PartialOrd for NaturalKey<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S: AsRef<str>> Ord for NaturalKey<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self.0.as_ref(), other.0.as_ref())
    }
}
