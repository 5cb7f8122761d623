use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;

/// Fake soft hyphen left behind by tokenization of hyphenated line breaks
pub const FAKE_SOFT_HYPHEN: char = '\u{E501}';
/// Non-breaking blank
pub const NONBREAKING_BLANK: char = '\u{A0}';
/// Marks superscripted characters inside a token
pub const SUPERSCRIPT_MARKER: char = '\u{E503}';

/// An attribute snapshot as seen on a single start tag.
///
/// Attributes keep their document order. Updates go through the consuming
/// `with_*` builders so that a snapshot handed to a downstream sink is never
/// changed behind its back.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    pairs: Vec<(String, String)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the value only if it is present and non-empty
    pub fn get_nonempty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|value| !value.is_empty())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pairs.iter().any(|(key, _)| key == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Sets an attribute, replacing an existing value in place or appending a new one
    pub fn with_set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if let Some(pair) = self.pairs.iter_mut().find(|(key, _)| *key == name) {
            pair.1 = value;
        } else {
            self.pairs.push((name, value));
        }
        self
    }

    /// Sets an attribute only when it is not present yet
    pub fn with_default(self, name: &str, value: impl Into<String>) -> Self {
        if self.get_nonempty(name).is_some() {
            self
        } else {
            self.with_set(name, value)
        }
    }

    pub fn with_removed(mut self, name: &str) -> Self {
        self.pairs.retain(|(key, _)| key != name);
        self
    }

    /// Removes the attribute if its value equals `value`
    pub fn with_removed_if_equal(self, name: &str, value: Option<&str>) -> Self {
        match (self.get(name), value) {
            (Some(current), Some(value)) if current == value => self.with_removed(name),
            _ => self,
        }
    }

    /// Applies a function to the value of an attribute, if present
    pub fn with_mapped<F>(self, name: &str, f: F) -> Self
    where
        F: FnOnce(&str) -> String,
    {
        match self.get(name) {
            Some(value) => {
                let value = f(value);
                self.with_set(name, value)
            }
            None => self,
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Attributes::new(), |attribs, (key, value)| {
                attribs.with_set(key, value)
            })
    }
}

/// Replaces the private-use markers the tokenizer leaves in tokens and text
pub struct MarkerCleaner {
    matcher: AhoCorasick,
    replacements: Vec<&'static str>,
}

impl MarkerCleaner {
    fn new(rules: &[(char, &'static str)]) -> Self {
        let patterns: Vec<String> = rules.iter().map(|(c, _)| c.to_string()).collect();
        Self {
            matcher: AhoCorasick::new(&patterns).expect("marker patterns are valid"),
            replacements: rules.iter().map(|(_, r)| *r).collect(),
        }
    }

    /// Cleans a token (`tok` attribute)
    pub fn token() -> &'static MarkerCleaner {
        static CLEANER: Lazy<MarkerCleaner> = Lazy::new(|| {
            MarkerCleaner::new(&[
                (FAKE_SOFT_HYPHEN, "-"),
                (NONBREAKING_BLANK, " "),
                (SUPERSCRIPT_MARKER, ""),
            ])
        });
        &CLEANER
    }

    /// Cleans the character content of a word element
    pub fn text() -> &'static MarkerCleaner {
        static CLEANER: Lazy<MarkerCleaner> = Lazy::new(|| {
            MarkerCleaner::new(&[(FAKE_SOFT_HYPHEN, "-"), (SUPERSCRIPT_MARKER, "")])
        });
        &CLEANER
    }

    /// Cleans spellings and lemmata
    pub fn superscript() -> &'static MarkerCleaner {
        static CLEANER: Lazy<MarkerCleaner> =
            Lazy::new(|| MarkerCleaner::new(&[(SUPERSCRIPT_MARKER, "")]));
        &CLEANER
    }

    pub fn clean(&self, s: &str) -> String {
        if self.matcher.is_match(s) {
            self.matcher.replace_all(s, &self.replacements)
        } else {
            s.to_owned()
        }
    }
}
