use serde::Deserialize;
use std::collections::HashMap;

use crate::error::AdornError;

/// The attribute holding the word identifier, this one can not be renamed
pub const ID_ATTRIBUTE: &str = "xml:id";

fn default_word_tag() -> String {
    "w".into()
}

fn default_char_tag() -> String {
    "c".into()
}

fn default_true() -> bool {
    true
}

fn default_spacing() -> usize {
    10
}

fn default_pseudo_page_size() -> usize {
    500
}

fn default_indent_step() -> usize {
    2
}

fn default_soft_tags() -> Vec<String> {
    [
        "abbr", "add", "c", "choice", "corr", "del", "emph", "expan", "foreign", "g", "gap", "hi",
        "lb", "cb", "pb", "milestone", "name", "orig", "persname", "placename", "reg", "ref",
        "seg", "sic", "supplied", "unclear", "w",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_jump_tags() -> Vec<String> {
    ["note", "figure", "fw"].iter().map(|s| s.to_string()).collect()
}

fn default_tag_classes() -> HashMap<String, TagClass> {
    let mut classes = HashMap::new();
    classes.insert("front".to_string(), TagClass::Front);
    classes.insert("back".to_string(), TagClass::Back);
    classes.insert("note".to_string(), TagClass::Side);
    classes.insert("fw".to_string(), TagClass::Side);
    classes
}

fn default_container_div_types() -> Vec<String> {
    ["chapter", "letter", "section"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
/// How word identifiers are generated
pub enum IdScheme {
    /// `base-<index * spacing>`, the index being the running word number in reading context order
    ReadingContextOrder,
    /// `base-<page>-<index * spacing>`, the index restarting at each page break
    WordWithinPageBlock,
}

impl Default for IdScheme {
    fn default() -> Self {
        Self::ReadingContextOrder
    }
}

impl TryFrom<&str> for IdScheme {
    type Error = AdornError;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "reading-context-order" | "reading" => Ok(Self::ReadingContextOrder),
            "word-within-page-block" | "page" => Ok(Self::WordWithinPageBlock),
            other => Err(AdornError::Config(format!(
                "unknown id scheme '{}', expected reading-context-order or word-within-page-block",
                other
            ))),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
/// Class of a container tag
pub enum TagClass {
    Front,
    Back,
    Side,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
/// Names of the word attributes
pub struct WordAttributeNames {
    pub tok: String,
    pub spe: String,
    pub pos: String,
    pub lem: String,
    pub reg: String,
    pub eos: String,
    pub ord: String,
    pub sn: String,
    pub wn: String,
    pub part: String,
    pub path: String,
    pub kwic_left: String,
    pub kwic_right: String,
}

impl Default for WordAttributeNames {
    fn default() -> Self {
        Self {
            tok: "tok".into(),
            spe: "spe".into(),
            pos: "pos".into(),
            lem: "lem".into(),
            reg: "reg".into(),
            eos: "eos".into(),
            ord: "ord".into(),
            sn: "sn".into(),
            wn: "wn".into(),
            part: "part".into(),
            path: "p".into(),
            kwic_left: "kl".into(),
            kwic_right: "kr".into(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
/// Part of speech tags with special treatment
pub struct PosTagConfig {
    /// Foreign word tags by language (`latin`, `french`, ...), `other` is used for unlisted languages
    pub foreign: HashMap<String, String>,
    /// Foreign word tag when the language is unknown
    pub foreign_default: String,
    /// Tags that are never overridden by a foreign word tag
    pub number: Vec<String>,
    pub symbol: Vec<String>,
    pub punctuation: Vec<String>,
    /// Tag for words that could not be tagged, such as gap placeholders
    pub unknown: String,
}

impl Default for PosTagConfig {
    fn default() -> Self {
        let mut foreign = HashMap::new();
        for (language, tag) in [
            ("greek", "fw-gr"),
            ("hebrew", "fw-he"),
            ("latin", "fw-la"),
            ("french", "fw-fr"),
            ("german", "fw-ge"),
            ("italian", "fw-it"),
            ("other", "fw-xx"),
        ] {
            foreign.insert(language.to_string(), tag.to_string());
        }
        Self {
            foreign,
            foreign_default: "fw-xx".into(),
            number: vec!["crd".into(), "ord".into()],
            symbol: vec!["sy".into()],
            punctuation: [".", ",", ":", ";", "?", "!", "(", ")", "\"", "'", "-", "pc"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            unknown: "zz".into(),
        }
    }
}

impl PosTagConfig {
    /// Returns the foreign word tag for a language code (`la`, `lat`, `grc-x-ancient`, ...).
    /// English is the main language and has no foreign word tag.
    pub fn foreign_tag(&self, language_code: &str) -> &str {
        let code = language_code
            .split('-')
            .next()
            .unwrap_or("")
            .to_lowercase();
        let language = match code.as_str() {
            "en" | "eng" => return "",
            "de" | "deu" | "ger" => "german",
            "fr" | "fra" | "fre" => "french",
            "el" | "ell" | "grc" | "gre" => "greek",
            "he" | "heb" => "hebrew",
            "it" | "ita" => "italian",
            "la" | "lat" => "latin",
            _ => "other",
        };
        self.foreign
            .get(language)
            .map(|s| s.as_str())
            .unwrap_or(self.foreign_default.as_str())
    }

    pub fn is_number_symbol_or_punctuation(&self, pos: &str) -> bool {
        self.number.iter().any(|t| t == pos)
            || self.symbol.iter().any(|t| t == pos)
            || self.punctuation.iter().any(|t| t == pos)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
/// Holds the configuration for adorning a TEI document
pub struct AdornConfig {
    #[serde(default = "default_word_tag")]
    /// Name of the word element
    pub word_tag: String,

    #[serde(default = "default_char_tag")]
    /// Name of the character (whitespace) element
    pub char_tag: String,

    #[serde(default = "default_soft_tags")]
    /// Tags that do not interrupt a sentence (emphasis, line breaks)
    pub soft_tags: Vec<String>,

    #[serde(default = "default_jump_tags")]
    /// Tags whose content is read out of line (notes), the surrounding sentence resumes after them
    pub jump_tags: Vec<String>,

    #[serde(default = "default_tag_classes")]
    /// Container tags that mark front matter, back matter or side text
    pub tag_classes: HashMap<String, TagClass>,

    pub id_scheme: IdScheme,

    #[serde(default = "default_spacing")]
    /// Multiplier applied to word numbers in generated ids, leaves room for later insertions
    pub id_spacing: usize,

    #[serde(default = "default_true")]
    /// Output `<c> </c>` elements between words
    pub output_whitespace: bool,

    /// Suppress attributes whose value equals the value they would default to
    pub output_nonredundant_attributes_only: bool,

    /// Suppress the token attribute when it equals the text of the word element
    pub output_nonredundant_token_attribute: bool,

    #[serde(default = "default_true")]
    pub output_word_ordinal: bool,

    pub output_sentence_number: bool,

    pub output_word_number: bool,

    /// Word numbers run through the whole document instead of restarting each sentence
    pub output_running_word_numbers: bool,

    /// Output milestones at the start and end of each sentence
    pub output_sentence_milestones: bool,

    /// Output milestones around pseudo pages of a fixed number of words
    pub output_pseudo_pages: bool,

    #[serde(default = "default_pseudo_page_size")]
    pub pseudo_page_size: usize,

    #[serde(default = "default_container_div_types")]
    /// Pseudo pages never extend beyond the end of a div of one of these types
    pub pseudo_page_container_div_types: Vec<String>,

    #[serde(default = "default_true")]
    pub close_sentence_at_end_of_hard_tag: bool,

    #[serde(default = "default_true")]
    pub close_sentence_at_end_of_jump_tag: bool,

    /// Elements in which word and char elements are removed prior to adornment
    pub disallow_word_elements_in: Vec<String>,

    /// Set the `p` (path) attribute on each word
    pub add_word_paths: bool,

    /// Create placeholder words for gap elements when indexing adorned text
    pub generate_gap_words: bool,

    pub doctype_name: Option<String>,

    pub doctype_system: Option<String>,

    #[serde(default = "default_indent_step")]
    pub indent_step: usize,

    pub attributes: WordAttributeNames,

    pub tags: PosTagConfig,
}

impl Default for AdornConfig {
    fn default() -> Self {
        Self {
            word_tag: default_word_tag(),
            char_tag: default_char_tag(),
            soft_tags: default_soft_tags(),
            jump_tags: default_jump_tags(),
            tag_classes: default_tag_classes(),
            id_scheme: IdScheme::default(),
            id_spacing: default_spacing(),
            output_whitespace: true,
            output_nonredundant_attributes_only: false,
            output_nonredundant_token_attribute: false,
            output_word_ordinal: true,
            output_sentence_number: false,
            output_word_number: false,
            output_running_word_numbers: false,
            output_sentence_milestones: false,
            output_pseudo_pages: false,
            pseudo_page_size: default_pseudo_page_size(),
            pseudo_page_container_div_types: default_container_div_types(),
            close_sentence_at_end_of_hard_tag: true,
            close_sentence_at_end_of_jump_tag: true,
            disallow_word_elements_in: Vec::new(),
            add_word_paths: false,
            generate_gap_words: false,
            doctype_name: None,
            doctype_system: None,
            indent_step: default_indent_step(),
            attributes: WordAttributeNames::default(),
            tags: PosTagConfig::default(),
        }
    }
}

impl AdornConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the configuration from a TOML string (load the data from file yourself).
    pub fn from_toml_str(tomlstr: &str) -> Result<Self, AdornError> {
        let config: Self = toml::from_str(tomlstr)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks for settings that make adornment impossible
    pub fn validate(&self) -> Result<(), AdornError> {
        if self.word_tag.trim().is_empty() {
            return Err(AdornError::Config("no word tag name configured".into()));
        }
        if self.id_spacing == 0 {
            return Err(AdornError::Config("id spacing must be at least 1".into()));
        }
        if self.output_pseudo_pages && self.pseudo_page_size == 0 {
            return Err(AdornError::Config(
                "pseudo page size must be at least 1 word".into(),
            ));
        }
        Ok(())
    }

    /// Whether sentence numbering or sentence milestones require a second pass over the output
    pub fn needs_second_pass(&self) -> bool {
        self.output_sentence_number || self.output_word_number || self.output_sentence_milestones
    }

    pub fn with_id_scheme(mut self, scheme: IdScheme) -> Self {
        self.id_scheme = scheme;
        self
    }

    pub fn with_id_spacing(mut self, spacing: usize) -> Self {
        self.id_spacing = spacing;
        self
    }

    pub fn with_whitespace(mut self, value: bool) -> Self {
        self.output_whitespace = value;
        self
    }

    pub fn with_nonredundant_attributes_only(mut self, value: bool) -> Self {
        self.output_nonredundant_attributes_only = value;
        self
    }

    pub fn with_nonredundant_token_attribute(mut self, value: bool) -> Self {
        self.output_nonredundant_token_attribute = value;
        self
    }

    pub fn with_sentence_milestones(mut self, value: bool) -> Self {
        self.output_sentence_milestones = value;
        self
    }

    /// Enable pseudo page milestones with the given number of words per page
    pub fn with_pseudo_pages(mut self, size: usize) -> Self {
        self.output_pseudo_pages = true;
        self.pseudo_page_size = size;
        self
    }

    pub fn with_sentence_numbers(mut self, value: bool) -> Self {
        self.output_sentence_number = value;
        self
    }

    pub fn with_word_numbers(mut self, value: bool) -> Self {
        self.output_word_number = value;
        self
    }

    pub fn with_running_word_numbers(mut self, value: bool) -> Self {
        self.output_running_word_numbers = value;
        self
    }

    pub fn with_word_ordinals(mut self, value: bool) -> Self {
        self.output_word_ordinal = value;
        self
    }

    pub fn with_word_paths(mut self, value: bool) -> Self {
        self.add_word_paths = value;
        self
    }

    pub fn with_gap_words(mut self, value: bool) -> Self {
        self.generate_gap_words = value;
        self
    }

    pub fn with_soft_tags(mut self, iter: impl Iterator<Item = impl Into<String>>) -> Self {
        self.soft_tags = iter.map(|s| s.into()).collect();
        self
    }

    pub fn with_jump_tags(mut self, iter: impl Iterator<Item = impl Into<String>>) -> Self {
        self.jump_tags = iter.map(|s| s.into()).collect();
        self
    }

    pub fn with_disallow_word_elements_in(
        mut self,
        iter: impl Iterator<Item = impl Into<String>>,
    ) -> Self {
        self.disallow_word_elements_in = iter.map(|s| s.into()).collect();
        self
    }

    pub fn with_container_div_types(
        mut self,
        iter: impl Iterator<Item = impl Into<String>>,
    ) -> Self {
        self.pseudo_page_container_div_types = iter.map(|s| s.into()).collect();
        self
    }

    pub fn with_close_sentence_at_end_of_hard_tag(mut self, value: bool) -> Self {
        self.close_sentence_at_end_of_hard_tag = value;
        self
    }

    pub fn with_close_sentence_at_end_of_jump_tag(mut self, value: bool) -> Self {
        self.close_sentence_at_end_of_jump_tag = value;
        self
    }

    pub fn with_doctype(mut self, name: impl Into<String>, system: impl Into<String>) -> Self {
        self.doctype_name = Some(name.into());
        self.doctype_system = Some(system.into());
        self
    }

    pub fn is_pseudo_page_container(&self, div_type: &str) -> bool {
        self.pseudo_page_container_div_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(div_type))
    }
}
