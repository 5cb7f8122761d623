use std::fmt::Display;

use crate::attributes::Attributes;
use crate::config::{WordAttributeNames, ID_ATTRIBUTE};
use crate::path::{FrontMiddleBack, MainSide};

/// Part flag of a word element
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WordPart {
    /// not split
    #[default]
    N,
    /// initial part of a split word
    I,
    /// middle part
    M,
    /// final part
    F,
}

impl WordPart {
    /// Parses a part flag, anything unrecognized counts as unsplit
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "I" => Self::I,
            "M" => Self::M,
            "F" => Self::F,
            _ => Self::N,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::N => "N",
            Self::I => "I",
            Self::M => "M",
            Self::F => "F",
        }
    }

    pub fn is_first(&self) -> bool {
        matches!(self, Self::N | Self::I)
    }

    pub fn is_middle(&self) -> bool {
        matches!(self, Self::N | Self::M)
    }

    pub fn is_last(&self) -> bool {
        matches!(self, Self::N | Self::F)
    }

    pub fn is_split(&self) -> bool {
        *self != Self::N
    }
}

impl Display for WordPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything known about one word element of an adorned document.
///
/// Links to neighbouring words are indices into the owning collection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WordRecord {
    pub id: String,
    /// character content of the word element
    pub word_text: String,
    pub token: Option<String>,
    pub spelling: Option<String>,
    pub standard_spelling: Option<String>,
    pub lemma: Option<String>,
    pub pos: Option<String>,
    pub part: WordPart,
    pub eos: bool,
    /// 0 if unknown
    pub ordinal: i64,
    /// -1 if unknown
    pub sentence_number: i64,
    /// -1 if unknown
    pub word_number: i64,
    pub path: String,
    pub page_number: usize,
    pub front_middle_back: FrontMiddleBack,
    pub main_side: MainSide,
    pub spoken: bool,
    pub verse: bool,
    pub in_jump_tag: bool,
    pub gap: bool,
    /// position in document order
    pub index: usize,
    pub previous_word: Option<usize>,
    pub next_word: Option<usize>,
    pub previous_part: Option<usize>,
    pub next_part: Option<usize>,
}

fn parse_number(value: Option<&str>, fallback: i64) -> i64 {
    value
        .and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(fallback)
}

impl WordRecord {
    /// Reads a record from the attributes of a word element
    pub fn from_attributes(attribs: &Attributes, names: &WordAttributeNames) -> Self {
        let get = |name: &str| attribs.get(name).map(|s| s.to_owned());
        Self {
            id: attribs
                .get(ID_ATTRIBUTE)
                .or_else(|| attribs.get("id"))
                .unwrap_or("")
                .to_owned(),
            token: get(&names.tok),
            spelling: get(&names.spe),
            standard_spelling: get(&names.reg),
            lemma: get(&names.lem),
            pos: get(&names.pos),
            part: attribs
                .get(&names.part)
                .map(WordPart::parse)
                .unwrap_or_default(),
            eos: attribs.get(&names.eos).map(|s| s.trim() == "1").unwrap_or(false),
            ordinal: parse_number(attribs.get(&names.ord), 0),
            sentence_number: parse_number(attribs.get(&names.sn), -1),
            word_number: parse_number(attribs.get(&names.wn), -1),
            path: attribs.get(&names.path).unwrap_or("").to_owned(),
            ..Self::default()
        }
    }

    pub fn is_first_part(&self) -> bool {
        self.part.is_first()
    }

    pub fn is_last_part(&self) -> bool {
        self.part.is_last()
    }

    pub fn is_split(&self) -> bool {
        self.part.is_split()
    }

    /// Token, or the word text when there is none
    pub fn token(&self) -> &str {
        self.token.as_deref().unwrap_or(&self.word_text)
    }

    /// Spelling, falling back to the token
    pub fn spelling(&self) -> &str {
        self.spelling.as_deref().unwrap_or_else(|| self.token())
    }

    pub fn standard_spelling(&self) -> &str {
        self.standard_spelling
            .as_deref()
            .unwrap_or_else(|| self.spelling())
    }

    pub fn lemma(&self) -> &str {
        self.lemma.as_deref().unwrap_or_else(|| self.spelling())
    }

    pub fn pos(&self) -> &str {
        self.pos.as_deref().unwrap_or_else(|| self.spelling())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_attributes() {
        let attribs: Attributes = vec![
            ("xml:id", "doc-00000010"),
            ("tok", "Dogge"),
            ("spe", "Dog"),
            ("pos", "n1"),
            ("eos", "1"),
            ("ord", "7"),
            ("part", "I"),
            ("p", "\\doc\\p[1]\\w[1]"),
        ]
        .into_iter()
        .collect();
        let word = WordRecord::from_attributes(&attribs, &WordAttributeNames::default());
        assert_eq!(word.id, "doc-00000010");
        assert_eq!(word.token(), "Dogge");
        assert_eq!(word.lemma(), "Dog");
        assert_eq!(word.standard_spelling(), "Dog");
        assert_eq!(word.pos(), "n1");
        assert!(word.eos);
        assert_eq!(word.ordinal, 7);
        assert_eq!(word.sentence_number, -1);
        assert_eq!(word.word_number, -1);
        assert_eq!(word.part, WordPart::I);
        assert!(word.is_first_part());
        assert!(!word.is_last_part());
        assert_eq!(word.path, "\\doc\\p[1]\\w[1]");
    }

    #[test]
    fn test_part_flags() {
        assert!(WordPart::N.is_first() && WordPart::N.is_middle() && WordPart::N.is_last());
        assert!(WordPart::M.is_middle() && !WordPart::M.is_first() && !WordPart::M.is_last());
        assert_eq!(WordPart::parse("x"), WordPart::N);
        assert_eq!(WordPart::F.to_string(), "F");
    }
}
