use std::collections::HashMap;

use crate::attributes::Attributes;
use crate::config::{AdornConfig, ID_ATTRIBUTE};
use crate::error::AdornError;
use crate::event::XmlEventSink;

/// Word counts of a document, collected before ids are regenerated
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WordCensus {
    /// largest integer word id that can still be multiplied by the id spacing
    pub max_id: u64,
    /// number of word elements per id, only for ids carried by more than one element
    pub split_words: HashMap<String, usize>,
    pub total_words: usize,
    pub total_page_breaks: usize,
    /// word elements without any id
    pub missing_ids: usize,
}

impl WordCensus {
    /// Number of elements the word with this id is split into, 1 if not split
    pub fn parts(&self, id: &str) -> usize {
        self.split_words.get(id).copied().unwrap_or(1)
    }
}

/// Sink that counts words and page breaks
pub struct WordCensusTaker {
    word_tag: String,
    spacing: u64,
    census: WordCensus,
    counts: HashMap<String, usize>,
}

impl WordCensusTaker {
    pub fn new(config: &AdornConfig) -> Self {
        Self {
            word_tag: config.word_tag.clone(),
            spacing: config.id_spacing.max(1) as u64,
            census: WordCensus::default(),
            counts: HashMap::new(),
        }
    }

    pub fn finish(mut self) -> WordCensus {
        self.census.split_words = self.counts.into_iter().filter(|(_, n)| *n > 1).collect();
        self.census
    }
}

impl XmlEventSink for WordCensusTaker {
    fn start_element(&mut self, name: &str, attribs: &Attributes) -> Result<(), AdornError> {
        if name == self.word_tag {
            self.census.total_words += 1;
            match attribs.get_nonempty(ID_ATTRIBUTE) {
                Some(id) => {
                    if let Ok(n) = id.trim().parse::<u64>() {
                        //ids out of range are kept as they are
                        if n.checked_mul(self.spacing).is_some() {
                            self.census.max_id = self.census.max_id.max(n);
                        }
                    }
                    *self.counts.entry(id.to_owned()).or_insert(0) += 1;
                }
                None => self.census.missing_ids += 1,
            }
        } else if name == "pb" {
            self.census.total_page_breaks += 1;
        }
        Ok(())
    }

    fn characters(&mut self, _text: &str) -> Result<(), AdornError> {
        Ok(())
    }

    fn end_element(&mut self, _name: &str) -> Result<(), AdornError> {
        Ok(())
    }
}
