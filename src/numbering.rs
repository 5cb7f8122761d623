use std::collections::HashMap;
use std::io::{BufRead, Write};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::attributes::Attributes;
use crate::config::AdornConfig;
use crate::error::AdornError;
use crate::pseudopage::MILESTONE_TAG;
use crate::word::WordPart;

pub const SENTENCE_UNIT: &str = "sentence";

/// A sentence milestone written by an earlier adornment
pub fn is_sentence_milestone(name: &str, attribs: &Attributes) -> bool {
    name == MILESTONE_TAG && attribs.get("unit") == Some(SENTENCE_UNIT)
}

/// Splits a word element line into leading text, attributes, word text and trailing text
static WORD_LINE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)<w (.*)>(.*)</w>(.*)$").unwrap());

static ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"xml:id="([a-zA-Z0-9\-._]*)""#).unwrap());

/// Position and sentence membership of one emitted word element
#[derive(Clone, Debug, PartialEq)]
pub struct SentenceAndWordNumber {
    pub id: String,
    pub ordinal: i64,
    pub part: WordPart,
    pub eos: bool,
    /// -1 until numbers are computed
    pub sentence_number: i64,
    /// number written to the output, within the sentence or running through the document
    pub word_number: i64,
    /// position within the sentence, 1 for the first word
    pub word_in_sentence: i64,
}

impl SentenceAndWordNumber {
    pub fn new(id: impl Into<String>, ordinal: i64, part: WordPart, eos: bool) -> Self {
        Self {
            id: id.into(),
            ordinal,
            part,
            eos,
            sentence_number: -1,
            word_number: -1,
            word_in_sentence: -1,
        }
    }

    pub fn is_first_part(&self) -> bool {
        self.part.is_first()
    }

    pub fn is_last_part(&self) -> bool {
        self.part.is_last()
    }
}

/// The words emitted by the first pass, in document order
#[derive(Clone, Debug, Default)]
pub struct SentenceNumberTable {
    entries: Vec<SentenceAndWordNumber>,
    index: HashMap<String, usize>,
    sentences: usize,
}

impl SentenceNumberTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: SentenceAndWordNumber) {
        self.index.insert(entry.id.clone(), self.entries.len());
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SentenceAndWordNumber> {
        self.entries.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut SentenceAndWordNumber> {
        self.entries.get_mut(index)
    }

    /// Position of the entry with the given id
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SentenceAndWordNumber> {
        self.entries.iter()
    }

    /// Number of sentences found by `compute_numbers()`
    pub fn sentence_count(&self) -> usize {
        self.sentences
    }

    /// Assigns sentence and word numbers in document order.
    ///
    /// Words without an id in the input get ids after the highest existing one,
    /// so id order is not document order. A sentence starts at the first part of a word whenever no word of the
    /// current sentence has been seen yet; it ends after the last part of a
    /// word flagged as end of sentence.
    pub fn compute_numbers(&mut self, running_word_numbers: bool) {
        let mut sentence_number = 0;
        let mut word_in_sentence = 0;
        let mut running = 0;
        for entry in self.entries.iter_mut() {
            if entry.is_first_part() {
                if word_in_sentence == 0 {
                    sentence_number += 1;
                }
                word_in_sentence += 1;
                running += 1;
            }
            entry.sentence_number = sentence_number;
            entry.word_in_sentence = word_in_sentence;
            entry.word_number = if running_word_numbers {
                running
            } else {
                word_in_sentence
            };
            if entry.eos && entry.is_last_part() {
                word_in_sentence = 0;
            }
        }
        self.sentences = sentence_number as usize;
    }
}

/// Counts reported by the second pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecondPassSummary {
    pub total_words: usize,
    pub looked_up_words: usize,
    pub unknown_words: usize,
}

/// Adds sentence and word numbers, and optionally sentence milestones, to the
/// line-oriented output of the first pass. Each word element must be on a line of its own.
pub struct SentenceNumberAdder<'a> {
    table: &'a SentenceNumberTable,
    sentence_attribute: Option<String>,
    word_attribute: Option<String>,
    milestones: bool,
    path_attribute: String,
    path_regex: Regex,
}

impl<'a> SentenceNumberAdder<'a> {
    pub fn new(table: &'a SentenceNumberTable, config: &AdornConfig) -> Result<Self, AdornError> {
        let path_attribute = config.attributes.path.clone();
        let path_regex = Regex::new(&format!(
            r#"(?:^|\s){}="([^"]*)""#,
            regex::escape(&path_attribute)
        ))?;
        Ok(Self {
            table,
            sentence_attribute: config
                .output_sentence_number
                .then(|| config.attributes.sn.clone()),
            word_attribute: config
                .output_word_number
                .then(|| config.attributes.wn.clone()),
            milestones: config.output_sentence_milestones,
            path_attribute,
            path_regex,
        })
    }

    fn milestone(&self, position: &str, number: i64, indent: &str, path: &str) -> String {
        let parent = match path.rfind('\\') {
            Some(pos) => &path[..pos],
            None => path,
        };
        if parent.is_empty() {
            format!(
                "{}<{} unit=\"{}\" n=\"{}\" position=\"{}\"/>",
                indent, MILESTONE_TAG, SENTENCE_UNIT, number, position
            )
        } else {
            format!(
                "{}<{} unit=\"{}\" n=\"{}\" position=\"{}\" {}=\"{}\"/>",
                indent, MILESTONE_TAG, SENTENCE_UNIT, number, position, self.path_attribute, parent
            )
        }
    }

    pub fn process<R: BufRead, W: Write>(
        &self,
        input: R,
        mut output: W,
    ) -> Result<SecondPassSummary, AdornError> {
        let mut summary = SecondPassSummary::default();
        let mut cursor: Option<usize> = None;
        let mut lines = input.lines().peekable();
        while let Some(line) = lines.next() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let captures = match WORD_LINE_REGEX.captures(&line) {
                Some(captures) if line.contains("<w ") => captures,
                _ => {
                    writeln!(output, "{}", line)?;
                    continue;
                }
            };
            summary.total_words += 1;
            let left = captures.get(1).map_or("", |m| m.as_str());
            let attribs = captures.get(2).map_or("", |m| m.as_str());
            let text = captures.get(3).map_or("", |m| m.as_str());
            let right = captures.get(4).map_or("", |m| m.as_str());
            let id = ID_REGEX
                .captures(attribs)
                .and_then(|c| c.get(1))
                .map_or("", |m| m.as_str());
            let path = self
                .path_regex
                .captures(attribs)
                .and_then(|c| c.get(1))
                .map_or("", |m| m.as_str());

            let expected = cursor.map_or(0, |c| c + 1);
            let position = match self.table.get(expected) {
                Some(entry) if entry.id == id => Some(expected),
                _ => {
                    summary.looked_up_words += 1;
                    self.table.position(id)
                }
            };
            let entry = match position.and_then(|p| self.table.get(p)) {
                Some(entry) => entry,
                None => {
                    debug!("no sentence information for word {}", id);
                    summary.unknown_words += 1;
                    writeln!(output, "{}", line)?;
                    continue;
                }
            };
            cursor = position;

            if self.milestones && entry.word_in_sentence == 1 && entry.is_first_part() {
                writeln!(
                    output,
                    "{}",
                    self.milestone("start", entry.sentence_number, left, path)
                )?;
            }
            let mut numbers = String::new();
            if let Some(name) = self.sentence_attribute.as_ref() {
                numbers += &format!(" {}=\"{}\"", name, entry.sentence_number);
            }
            if let Some(name) = self.word_attribute.as_ref() {
                numbers += &format!(" {}=\"{}\"", name, entry.word_number);
            }
            writeln!(
                output,
                "{}<w {}{}>{}</w>{}",
                left, attribs, numbers, text, right
            )?;
            if self.milestones && entry.eos && entry.is_last_part() {
                //whitespace belongs to the sentence it follows
                while let Some(Ok(next)) = lines.peek() {
                    if next.trim_start().starts_with("<c>") {
                        writeln!(output, "{}", next)?;
                        lines.next();
                    } else {
                        break;
                    }
                }
                writeln!(
                    output,
                    "{}",
                    self.milestone("end", entry.sentence_number, left, path)
                )?;
            }
        }
        output.flush()?;
        info!(
            "total words={}, looked up words={}",
            summary.total_words, summary.looked_up_words
        );
        Ok(summary)
    }
}
