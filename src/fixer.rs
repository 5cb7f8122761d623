use std::collections::HashMap;
use std::path::Path;

use crate::attributes::{Attributes, MarkerCleaner};
use crate::census::WordCensus;
use crate::classify::TagClassifier;
use crate::config::{AdornConfig, IdScheme, ID_ATTRIBUTE};
use crate::error::AdornError;
use crate::event::{HoldingSink, XmlEvent, XmlEventSink};
use crate::melder::{MelderSnapshot, SentenceMelder};
use crate::numbering::{is_sentence_milestone, SentenceAndWordNumber, SentenceNumberTable};
use crate::pending::PendingElement;
use crate::pseudopage::PseudoPager;
use crate::word::WordPart;

/// Base for generated word ids: the file name without directory and extension,
/// with remaining periods replaced by underscores
pub fn base_name(filename: &Path) -> String {
    filename
        .file_stem()
        .map(|s| s.to_string_lossy().replace('.', "_"))
        .unwrap_or_default()
}

fn digits(n: u64) -> usize {
    n.max(1).to_string().len()
}

/// A word element waiting for its text
struct PendingWord {
    element: PendingElement,
    /// foreign word tag in effect at the word, empty if none
    foreign: String,
}

/// Regenerates word ids and fills in word attributes.
///
/// Word elements are held back until their text is known; everything about
/// a word (id, part flag, ordinal, whitespace before it) is decided when it is
/// emitted, which happens at the next element boundary. Emitted words are
/// recorded in a [`SentenceNumberTable`] for the sentence numbering pass.
///
/// Output from the first part of a split word up to its last part is held back,
/// so that an end of sentence found at any part can be set on all of them.
pub struct IdFixerFilter<'a, S: XmlEventSink> {
    inner: HoldingSink<S>,
    config: &'a AdornConfig,
    census: &'a WordCensus,
    classifier: TagClassifier,
    base_name: String,
    id_width: usize,
    page_width: usize,
    word_in_page_width: usize,

    pending: Option<PendingWord>,
    pending_char: Option<PendingElement>,
    in_word: bool,
    last_raw_id: Option<String>,
    parts_remaining: HashMap<String, usize>,
    missing_ids: u64,
    page: u64,
    word_in_page: u64,
    ordinal: i64,
    emitted: usize,
    depth: usize,
    in_old_milestone: bool,
    /// ids of the held parts of a split word
    held_parts: Vec<String>,
    held_eos: bool,

    melder: SentenceMelder,
    is_first_word: bool,
    jump_stack: Vec<(bool, MelderSnapshot)>,
    foreign_stack: Vec<String>,
    div_stack: Vec<String>,
    pager: Option<PseudoPager>,
    table: SentenceNumberTable,
}

impl<'a, S: XmlEventSink> IdFixerFilter<'a, S> {
    pub fn new(
        inner: S,
        config: &'a AdornConfig,
        base_name: impl Into<String>,
        census: &'a WordCensus,
    ) -> Self {
        let spacing = config.id_spacing.max(1) as u64;
        let highest = census.max_id.max(1).saturating_add(census.missing_ids as u64);
        let id_width = digits(highest.saturating_mul(spacing)).max(8);
        let word_in_page_width = if census.total_page_breaks > 0 {
            digits(999u64.saturating_mul(spacing))
        } else {
            id_width
        };
        Self {
            inner: HoldingSink::new(inner),
            config,
            census,
            classifier: TagClassifier::new(config),
            base_name: base_name.into(),
            id_width,
            page_width: digits(census.total_page_breaks as u64),
            word_in_page_width,
            pending: None,
            pending_char: None,
            in_word: false,
            last_raw_id: None,
            parts_remaining: HashMap::new(),
            missing_ids: 0,
            page: 0,
            word_in_page: 0,
            ordinal: 0,
            emitted: 0,
            depth: 0,
            in_old_milestone: false,
            held_parts: Vec::new(),
            held_eos: false,
            melder: SentenceMelder::new(),
            is_first_word: true,
            jump_stack: Vec::new(),
            foreign_stack: Vec::new(),
            div_stack: Vec::new(),
            pager: config
                .output_pseudo_pages
                .then(|| PseudoPager::new(config)),
            table: SentenceNumberTable::new(),
        }
    }

    /// Number of word elements emitted so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn pseudo_page_count(&self) -> usize {
        self.pager.as_ref().map(|p| p.page_count()).unwrap_or(0)
    }

    /// Returns the downstream sink and the table of emitted words
    pub fn into_parts(self) -> (S, SentenceNumberTable) {
        (self.inner.into_inner(), self.table)
    }

    fn foreign_tag_for(&self, name: &str, attribs: &Attributes) -> String {
        match attribs
            .get_nonempty("xml:lang")
            .or_else(|| attribs.get_nonempty("lang"))
        {
            Some(code) => self.config.tags.foreign_tag(code).to_owned(),
            None => match self.foreign_stack.last() {
                Some(parent) if !parent.is_empty() => parent.clone(),
                _ if name.eq_ignore_ascii_case("foreign") => {
                    self.config.tags.foreign_default.clone()
                }
                _ => String::new(),
            },
        }
    }

    /// Changes that apply to every element
    fn common_attributes(&self, attribs: &Attributes) -> Attributes {
        let path_attribute = self.config.attributes.path.as_str();
        let mut attribs = attribs.clone().with_removed("TEIform");
        if attribs.get_nonempty(path_attribute).is_some() {
            let base = &self.base_name;
            let prefix = format!("\\{}\\", base);
            attribs = attribs.with_mapped(path_attribute, |p| {
                if p.starts_with(&prefix) {
                    p.to_owned()
                } else {
                    format!("\\{}{}", base, p)
                }
            });
        }
        attribs
    }

    /// Generated id for a word number, `None` when the scaled number does not fit
    fn format_id(&self, number: u64) -> Option<String> {
        let spacing = self.config.id_spacing.max(1) as u64;
        let id = match self.config.id_scheme {
            IdScheme::ReadingContextOrder => format!(
                "{}-{:0width$}",
                self.base_name,
                number.checked_mul(spacing)?,
                width = self.id_width
            ),
            IdScheme::WordWithinPageBlock => format!(
                "{}-{:0pw$}-{:0ww$}",
                self.base_name,
                self.page,
                self.word_in_page.checked_mul(spacing)?,
                pw = self.page_width,
                ww = self.word_in_page_width
            ),
        };
        Some(id)
    }

    /// Determines id and part flag of the next word element, and whether it starts a new word
    fn assign_id(
        &mut self,
        raw_id: Option<&str>,
        part: Option<&str>,
    ) -> Result<(String, WordPart, bool), AdornError> {
        let changed = raw_id.is_none() || self.last_raw_id.as_deref() != raw_id;
        self.last_raw_id = raw_id.map(|s| s.to_owned());
        if changed {
            self.word_in_page += 1;
        }
        let raw = match raw_id {
            Some(raw) => raw,
            None => {
                self.missing_ids += 1;
                let number = if self.census.max_id == 0 {
                    Some(self.missing_ids)
                } else {
                    self.census.max_id.checked_add(self.missing_ids)
                };
                let id = number.and_then(|n| self.format_id(n)).ok_or_else(|| {
                    AdornError::IdRange(format!(
                        "{} + {}",
                        self.census.max_id, self.missing_ids
                    ))
                })?;
                return Ok((id, WordPart::N, true));
            }
        };
        let mut id = match raw.parse::<u64>().ok().and_then(|n| self.format_id(n)) {
            Some(id) => id,
            None => {
                //already adorned, or too large to renumber: keep as is
                let part = part.map(WordPart::parse).unwrap_or_default();
                return Ok((raw.to_owned(), part, part.is_first()));
            }
        };
        let mut part = WordPart::N;
        let total = self.census.parts(raw);
        if total > 1 {
            let remaining = self
                .parts_remaining
                .entry(raw.to_owned())
                .or_insert(total);
            part = if *remaining == total {
                WordPart::I
            } else if *remaining <= 1 {
                WordPart::F
            } else {
                WordPart::M
            };
            *remaining = remaining.saturating_sub(1);
            id = format!("{}.{}", id, remaining);
        }
        Ok((id, part, changed))
    }

    /// Passes on the held parts of a split word, all flagged as end of sentence if one was
    fn release_split_word(&mut self, end_of_sentence: bool) -> Result<(), AdornError> {
        let parts = std::mem::take(&mut self.held_parts);
        self.held_eos = false;
        if end_of_sentence {
            let eos = self.config.attributes.eos.as_str();
            if let Some(held) = self.inner.held_mut() {
                for event in held.iter_mut() {
                    if let XmlEvent::Start(name, attribs) = event {
                        let held_part = attribs
                            .get(ID_ATTRIBUTE)
                            .map_or(false, |id| parts.iter().any(|p| p == id));
                        if held_part && self.classifier.is_word(name) {
                            *attribs = std::mem::take(attribs).with_set(eos, "1");
                        }
                    }
                }
            }
            for id in parts.iter() {
                if let Some(entry) = self.table.position(id).and_then(|p| self.table.get_mut(p)) {
                    entry.eos = true;
                }
            }
        }
        self.inner.release()
    }

    fn output_blank(&mut self) -> Result<(), AdornError> {
        self.inner
            .text_element(&self.config.char_tag, &Attributes::new(), " ")
    }

    fn flush(&mut self, allow_whitespace: bool, force_eos: bool) -> Result<(), AdornError> {
        if let Some(pending) = self.pending.take() {
            self.emit_word(pending, allow_whitespace, force_eos)?;
        }
        Ok(())
    }

    fn emit_word(
        &mut self,
        pending: PendingWord,
        allow_whitespace: bool,
        force_eos: bool,
    ) -> Result<(), AdornError> {
        let config = self.config;
        let names = &config.attributes;
        let PendingWord { element, foreign } = pending;
        //a word must stay on one output line
        let text = MarkerCleaner::text()
            .clean(&element.text)
            .replace(|c: char| c == '\n' || c == '\r', " ");
        let attribs = element.attribs;

        let raw_id = attribs.get_nonempty(ID_ATTRIBUTE).map(|s| s.trim().to_owned());
        let (id, part, changed) = self.assign_id(raw_id.as_deref(), attribs.get(&names.part))?;
        if changed {
            self.ordinal += 1;
        }

        let tok = attribs
            .get(&names.tok)
            .map(|s| MarkerCleaner::token().clean(s))
            .unwrap_or_else(|| text.clone());
        let spe = attribs
            .get_nonempty(&names.spe)
            .map(|s| MarkerCleaner::superscript().clean(s))
            .unwrap_or_else(|| tok.clone());
        let mut lem = attribs
            .get_nonempty(&names.lem)
            .map(|s| MarkerCleaner::superscript().clean(s));
        let mut pos = attribs.get_nonempty(&names.pos).map(|s| s.to_owned());
        if !foreign.is_empty()
            && !pos
                .as_deref()
                .map_or(false, |p| config.tags.is_number_symbol_or_punctuation(p))
        {
            pos = Some(foreign);
            lem = Some(spe.clone());
        }
        let pos = pos.unwrap_or_else(|| spe.clone());
        let lem = lem.unwrap_or_else(|| spe.clone());
        let reg = attribs
            .get_nonempty(&names.reg)
            .map(|s| s.to_owned())
            .unwrap_or_else(|| spe.clone());
        let eos = attribs
            .get_nonempty(&names.eos)
            .map(|s| s.trim().to_owned())
            .unwrap_or_else(|| "0".to_owned());

        let mut attribs = attribs.with_set(ID_ATTRIBUTE, id.as_str());
        if config.output_word_ordinal {
            attribs = attribs.with_set(names.ord.as_str(), self.ordinal.to_string());
        }
        attribs = attribs
            .with_set(names.eos.as_str(), eos.as_str())
            .with_set(names.lem.as_str(), lem.as_str())
            .with_set(names.pos.as_str(), pos.as_str())
            .with_set(names.reg.as_str(), reg.as_str())
            .with_set(names.spe.as_str(), spe.as_str())
            .with_set(names.tok.as_str(), tok.as_str())
            .with_set(names.part.as_str(), part.as_str());
        if config.output_nonredundant_attributes_only {
            attribs = attribs
                .with_removed_if_equal(&names.eos, Some("0"))
                .with_removed_if_equal(&names.spe, Some(tok.as_str()))
                .with_removed_if_equal(&names.lem, Some(spe.as_str()))
                .with_removed_if_equal(&names.pos, Some(spe.as_str()))
                .with_removed_if_equal(&names.reg, Some(spe.as_str()));
        }

        //whitespace before the first part of a word
        if changed {
            if config.output_whitespace {
                if self.melder.should_output_blank(&spe, self.is_first_word) {
                    self.output_blank()?;
                }
                self.melder.process_word(&spe);
            }
            self.is_first_word = eos == "1";
        }

        if let Some(pager) = self.pager.as_mut() {
            pager.before_word(&mut self.inner, part, attribs.get(&names.path))?;
        }
        let last_of_split = part.is_split() && part.is_last();
        if force_eos || (last_of_split && self.held_eos) {
            attribs = attribs.with_set(names.eos.as_str(), "1");
        }
        let end_of_sentence = attribs.get(&names.eos) == Some("1");
        if !part.is_last() {
            self.inner.hold();
            self.held_parts.push(id.clone());
            self.held_eos |= end_of_sentence;
        }
        if config.output_nonredundant_attributes_only
            || config.output_nonredundant_token_attribute
        {
            attribs = attribs
                .with_removed_if_equal(&names.tok, Some(text.as_str()))
                .with_removed_if_equal(&names.part, Some("N"));
        }
        attribs = attribs.with_removed(&names.sn).with_removed(&names.wn);
        self.inner.text_element(&element.name, &attribs, &text)?;

        self.table.push(SentenceAndWordNumber::new(
            id,
            self.ordinal,
            part,
            end_of_sentence,
        ));
        self.emitted += 1;
        if last_of_split && self.inner.is_holding() {
            self.release_split_word(end_of_sentence)?;
        }

        if config.output_whitespace && allow_whitespace && self.is_first_word && part.is_last() {
            self.output_blank()?;
        }
        let last_word = self.emitted >= self.census.total_words;
        if let Some(pager) = self.pager.as_mut() {
            pager.after_word(&mut self.inner, part, last_word)?;
        }
        Ok(())
    }
}

impl<'a, S: XmlEventSink> XmlEventSink for IdFixerFilter<'a, S> {
    fn start_document(&mut self) -> Result<(), AdornError> {
        self.inner.start_document()
    }

    fn start_element(&mut self, name: &str, attribs: &Attributes) -> Result<(), AdornError> {
        if self.config.output_sentence_milestones && is_sentence_milestone(name, attribs) {
            //regenerated by the second pass
            self.in_old_milestone = true;
            return Ok(());
        }
        self.depth += 1;
        let foreign = self.foreign_tag_for(name, attribs);
        self.foreign_stack.push(foreign.clone());
        let attribs = self.common_attributes(attribs);

        if self.classifier.is_word(name) {
            self.flush(true, false)?;
            self.in_word = true;
            self.pending = Some(PendingWord {
                element: PendingElement::new(name, attribs),
                foreign,
            });
            return Ok(());
        }

        self.flush(true, false)?;
        if self.classifier.is_char(name) {
            //whitespace is regenerated, other char elements are kept
            self.pending_char = Some(PendingElement::new(name, attribs));
            return Ok(());
        }
        if name == "pb" {
            self.page += 1;
            self.word_in_page = 0;
        }
        if name.eq_ignore_ascii_case("div") {
            let div_type = attribs
                .get_nonempty("type")
                .map(|t| t.to_lowercase())
                .unwrap_or_else(|| "*div".to_owned());
            self.div_stack.push(div_type);
        } else if name.eq_ignore_ascii_case("foreign") {
        } else if !self.classifier.is_soft(name) {
            if self.classifier.is_jump(name) {
                self.jump_stack
                    .push((self.is_first_word, self.melder.save()));
            }
            self.melder.reset();
            self.is_first_word = true;
        }
        self.inner.start_element(name, &attribs)
    }

    fn characters(&mut self, text: &str) -> Result<(), AdornError> {
        if self.in_word {
            if let Some(pending) = self.pending.as_mut() {
                pending.element.append_text(text);
                return Ok(());
            }
        }
        if let Some(pending_char) = self.pending_char.as_mut() {
            pending_char.append_text(text);
            return Ok(());
        }
        if text.trim().is_empty() && self.pending.is_some() {
            //whitespace between words is regenerated
            return Ok(());
        }
        self.flush(true, false)?;
        self.inner.characters(text)
    }

    fn end_element(&mut self, name: &str) -> Result<(), AdornError> {
        if self.in_old_milestone {
            self.in_old_milestone = false;
            return Ok(());
        }
        self.depth = self.depth.saturating_sub(1);
        self.foreign_stack.pop();

        if self.classifier.is_word(name) {
            self.in_word = false;
            return Ok(());
        }
        if self.classifier.is_char(name) {
            if let Some(element) = self.pending_char.take() {
                if !element.text.trim().is_empty() {
                    element.emit(&mut self.inner)?;
                }
                return Ok(());
            }
        }

        let removed_div = if name.eq_ignore_ascii_case("div") {
            self.div_stack.pop()
        } else {
            None
        };
        let is_jump = self.classifier.is_jump(name);
        let is_soft = self.classifier.is_soft(name);
        let is_hard = !is_jump && !is_soft;
        let force_eos = (is_hard && self.config.close_sentence_at_end_of_hard_tag)
            || (is_jump && self.config.close_sentence_at_end_of_jump_tag);
        self.flush(is_soft, force_eos)?;

        if self.depth == 0 {
            if let Some(pager) = self.pager.as_mut() {
                pager.finish(&mut self.inner)?;
            }
        }
        self.inner.end_element(name)?;

        if is_jump {
            if let Some((is_first_word, snapshot)) = self.jump_stack.pop() {
                self.is_first_word = is_first_word;
                self.melder.restore(snapshot);
            }
        } else if is_hard {
            self.melder.reset();
            self.is_first_word = true;
        }

        if let (Some(div_type), Some(pager)) = (removed_div, self.pager.as_mut()) {
            if self.config.is_pseudo_page_container(&div_type) {
                let remain = self.emitted < self.census.total_words;
                pager.container_end(&mut self.inner, remain)?;
            }
        }
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), AdornError> {
        self.flush(true, false)?;
        if self.inner.is_holding() {
            self.release_split_word(self.held_eos)?;
        }
        self.inner.end_document()
    }
}
