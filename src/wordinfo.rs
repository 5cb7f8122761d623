use std::collections::{BTreeMap, HashMap};

use regex::Regex;

use crate::attributes::Attributes;
use crate::classify::TagClassifier;
use crate::config::{AdornConfig, WordAttributeNames};
use crate::error::AdornError;
use crate::event::XmlEventSink;
use crate::path::{trim_trailing_soft_tags, AncestryTracker};
use crate::word::WordRecord;

/// Builds an [`AdornedWordIndex`] from an adorned document
pub struct WordInfoFilter {
    classifier: TagClassifier,
    names: WordAttributeNames,
    generate_gap_words: bool,
    unknown_tag: String,
    tracker: AncestryTracker,
    words: Vec<WordRecord>,
    /// record receiving character data
    current: Option<usize>,
    last_word: Option<usize>,
    last_part: Option<usize>,
    /// saved (last word, last part) per open non-soft element
    saved: Vec<(Option<usize>, Option<usize>)>,
    page_number: usize,
    last_id: String,
    gap_count: usize,
    first_word_id: Option<String>,
    leading_gaps: Vec<usize>,
}

impl WordInfoFilter {
    pub fn new(config: &AdornConfig) -> Self {
        Self {
            classifier: TagClassifier::new(config),
            names: config.attributes.clone(),
            generate_gap_words: config.generate_gap_words,
            unknown_tag: config.tags.unknown.clone(),
            tracker: AncestryTracker::new(),
            words: Vec::new(),
            current: None,
            last_word: None,
            last_part: None,
            saved: Vec::new(),
            page_number: 0,
            last_id: String::new(),
            gap_count: 0,
            first_word_id: None,
            leading_gaps: Vec::new(),
        }
    }

    fn gap_record(&mut self, attribs: &Attributes) -> WordRecord {
        let id = format!("{}-gap{}", self.last_id, self.gap_count);
        self.gap_count += 1;
        let mut text = String::from("{gap");
        for name in ["unit", "extent", "reason"] {
            if let Some(value) = attribs.get(name) {
                text.push('-');
                text.push_str(value);
            }
        }
        text.push('}');
        WordRecord {
            id,
            token: Some(text.clone()),
            spelling: Some(text.clone()),
            standard_spelling: Some(text.clone()),
            lemma: Some(text),
            pos: Some(self.unknown_tag.clone()),
            ordinal: -1,
            sentence_number: -1,
            word_number: -1,
            path: attribs.get(&self.names.path).unwrap_or("").to_owned(),
            gap: true,
            ..WordRecord::default()
        }
    }

    /// Links a new record into the word and word part chains, and stores it
    fn add_word(&mut self, mut word: WordRecord) -> usize {
        let index = self.words.len();
        word.index = index;
        if word.is_first_part() {
            word.previous_word = self.last_word;
            if let Some(last) = self.last_word {
                //all parts of the previous word point to this one
                let mut next = Some(last);
                while let Some(i) = next {
                    self.words[i].next_word = Some(index);
                    next = self.words[i].next_part;
                }
            }
            self.last_word = Some(index);
        } else if let Some(first) = self.last_word {
            word.previous_word = self.words[first].previous_word;
        }
        if word.is_split() {
            if !word.is_first_part() {
                if let Some(previous) = self.last_part {
                    word.previous_part = Some(previous);
                    self.words[previous].next_part = Some(index);
                }
            }
            self.last_part = Some(index);
        } else {
            self.last_part = None;
        }
        self.words.push(word);
        index
    }

    /// Finishes the index: fixes ids of gap words before the first word and fills in
    /// missing ordinals, sentence ends and sentence/word numbers
    pub fn finish(self) -> AdornedWordIndex {
        let mut words = self.words;
        if !self.leading_gaps.is_empty() {
            let base = match self.first_word_id.as_deref() {
                Some(id) => zeroed_id(id),
                None => "0".to_owned(),
            };
            for (n, i) in self.leading_gaps.iter().enumerate() {
                words[*i].id = format!("{}-gap{}", base, n);
            }
        }
        let index = words
            .iter()
            .enumerate()
            .map(|(i, word)| (word.id.clone(), i))
            .collect();
        let mut result = AdornedWordIndex {
            words,
            index,
            classifier: self.classifier,
        };
        result.generate_missing_information();
        result
    }
}

/// Replaces the trailing digits of an id by zeros
fn zeroed_id(id: &str) -> String {
    let mut chars: Vec<char> = id.chars().collect();
    let mut i = chars.len();
    while i > 1 && chars[i - 1] != '-' && chars[i - 1].is_ascii_digit() {
        chars[i - 1] = '0';
        i -= 1;
    }
    chars.into_iter().collect()
}

impl XmlEventSink for WordInfoFilter {
    fn start_element(&mut self, name: &str, attribs: &Attributes) -> Result<(), AdornError> {
        self.tracker.push(name);
        let is_word = self.classifier.is_word(name);
        let is_gap = name == "gap" && self.generate_gap_words;
        if name == "pb" {
            self.page_number += 1;
        } else if is_word || is_gap {
            let (front_middle_back, main_side) = self.tracker.front_middle_back(&self.classifier);
            let mut word = if is_gap {
                self.gap_record(attribs)
            } else {
                let mut word = WordRecord::from_attributes(attribs, &self.names);
                if self.first_word_id.is_none() {
                    self.first_word_id = Some(word.id.clone());
                }
                self.last_id = word.id.clone();
                self.gap_count = 0;
                word.spoken = self.tracker.is_spoken();
                word.verse = self.tracker.is_verse();
                word.in_jump_tag = self.tracker.in_jump_tag(&self.classifier);
                if word.path.is_empty() {
                    word.path = self.tracker.path();
                }
                word
            };
            word.front_middle_back = front_middle_back;
            word.main_side = main_side;
            word.page_number = self.page_number;
            let leading_gap = is_gap && self.last_id.is_empty();
            let index = self.add_word(word);
            if leading_gap {
                self.leading_gaps.push(index);
            }
            if is_word {
                self.current = Some(index);
            }
        } else if !self.classifier.is_soft(name) {
            if self.classifier.is_jump(name) {
                self.saved.push((self.last_word, self.last_part));
            } else {
                self.saved.push((None, None));
            }
            self.last_word = None;
            self.last_part = None;
        }
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<(), AdornError> {
        if let Some(i) = self.current {
            self.words[i].word_text.push_str(text);
        }
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> Result<(), AdornError> {
        self.tracker.pop();
        if self.classifier.is_word(name) {
            self.current = None;
        } else if !self.classifier.is_soft(name) {
            if let Some((last_word, last_part)) = self.saved.pop() {
                self.last_word = last_word;
                self.last_part = last_part;
            }
        }
        Ok(())
    }
}

/// The words of an adorned document, in document order
pub struct AdornedWordIndex {
    words: Vec<WordRecord>,
    index: HashMap<String, usize>,
    classifier: TagClassifier,
}

impl AdornedWordIndex {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn word(&self, id: &str) -> Option<&WordRecord> {
        self.index_of(id).map(|i| &self.words[i])
    }

    /// Like [`Self::word`], for callers that can not do without the word
    pub fn require(&self, id: &str) -> Result<&WordRecord, AdornError> {
        self.word(id)
            .ok_or_else(|| AdornError::MissingWord(id.to_owned()))
    }

    pub fn word_mut(&mut self, id: &str) -> Option<&mut WordRecord> {
        match self.index_of(id) {
            Some(i) => Some(&mut self.words[i]),
            None => None,
        }
    }

    pub fn word_at(&self, index: usize) -> Option<&WordRecord> {
        self.words.get(index)
    }

    pub fn word_at_mut(&mut self, index: usize) -> Option<&mut WordRecord> {
        self.words.get_mut(index)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn words(&self) -> impl Iterator<Item = &WordRecord> {
        self.words.iter()
    }

    /// Word ids in document order
    pub fn ids(&self) -> Vec<&str> {
        self.words.iter().map(|w| w.id.as_str()).collect()
    }

    /// Document order, but words in jump tags are moved behind the end of the sentence they interrupt
    pub fn reading_context_order(&self) -> Vec<usize> {
        let mut result = Vec::with_capacity(self.words.len());
        let mut deferred = Vec::new();
        for (i, word) in self.words.iter().enumerate() {
            if word.in_jump_tag {
                deferred.push(i);
            } else {
                result.push(i);
                if word.eos && !deferred.is_empty() {
                    result.append(&mut deferred);
                }
            }
        }
        result.append(&mut deferred);
        result
    }

    pub fn ids_in_reading_context_order(&self) -> Vec<&str> {
        self.reading_context_order()
            .into_iter()
            .map(|i| self.words[i].id.as_str())
            .collect()
    }

    /// Sentences by sentence number, each a list of word indices (first parts only).
    /// Gap words without a sentence number are left out.
    pub fn sentences(&self) -> Vec<Vec<usize>> {
        let mut sentences: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for i in self.reading_context_order() {
            let word = &self.words[i];
            if word.is_first_part() && !(word.gap && word.sentence_number < 0) {
                sentences.entry(word.sentence_number).or_default().push(i);
            }
        }
        sentences.into_values().collect()
    }

    /// Sentences by sentence end flags, ordered by their first word
    pub fn sentences_from_eos(&self) -> Vec<Vec<usize>> {
        let mut sentences: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut sentence = Vec::new();
        for i in self.reading_context_order() {
            let word = &self.words[i];
            if !word.is_first_part() {
                continue;
            }
            sentence.push(i);
            if word.eos {
                sentences.insert(sentence[0], std::mem::take(&mut sentence));
            }
        }
        if let Some(first) = sentence.first().copied() {
            sentences.insert(first, sentence);
        }
        sentences.into_values().collect()
    }

    /// Indices of all parts of the word at `index`, in order
    pub fn related_parts(&self, index: usize) -> Vec<usize> {
        let mut result = Vec::new();
        if index >= self.words.len() {
            return result;
        }
        let mut first = index;
        while let Some(previous) = self.words[first].previous_part {
            first = previous;
        }
        let mut next = Some(first);
        while let Some(i) = next {
            result.push(i);
            next = self.words[i].next_part;
        }
        result
    }

    /// Ids of all parts of a split word, the given id included; empty for unknown ids
    pub fn related_split_word_ids(&self, id: &str) -> Vec<&str> {
        match self.index_of(id) {
            Some(i) => self
                .related_parts(i)
                .into_iter()
                .map(|i| self.words[i].id.as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Ids of the words sharing the closest enclosing non-soft element with the given word
    pub fn sibling_word_ids(&self, id: &str) -> Vec<&str> {
        match self.word(id) {
            Some(word) if !word.path.is_empty() => {
                let mut prefix = trim_trailing_soft_tags(&word.path, &self.classifier);
                prefix.push('\\');
                self.find_words_by_leading_path(&prefix)
            }
            _ => Vec::new(),
        }
    }

    pub fn find_words_by_leading_path(&self, prefix: &str) -> Vec<&str> {
        self.words
            .iter()
            .filter(|w| w.path.starts_with(prefix))
            .map(|w| w.id.as_str())
            .collect()
    }

    /// Ids of words whose path contains a match for the regular expression
    pub fn find_words_by_path_pattern(&self, pattern: &str) -> Result<Vec<&str>, AdornError> {
        let regex = Regex::new(pattern)?;
        Ok(self
            .words
            .iter()
            .filter(|w| regex.is_match(&w.path))
            .map(|w| w.id.as_str())
            .collect())
    }

    /// Ids from `first` to `last` inclusive, in document order
    pub fn selected_word_ids(&self, first: &str, last: &str) -> Vec<&str> {
        match (self.index_of(first), self.index_of(last)) {
            (Some(start), Some(end)) if end >= start => self.words[start..=end]
                .iter()
                .map(|w| w.id.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }

    fn add_word_ordinals(&mut self) {
        let mut ordinal = 1;
        for i in 0..self.words.len() {
            if self.words[i].gap || !self.words[i].is_first_part() {
                continue;
            }
            for part in self.related_parts(i) {
                self.words[part].ordinal = ordinal;
            }
            ordinal += 1;
        }
    }

    fn generate_missing_information(&mut self) {
        let order = self.reading_context_order();
        let first = match order.iter().map(|i| &self.words[*i]).find(|w| !w.gap) {
            Some(first) => first,
            None => return,
        };
        let need_numbers = first.word_number == -1 || first.sentence_number == -1;
        let has_sentence_numbers = self
            .words
            .iter()
            .any(|w| !w.gap && w.sentence_number != -1);
        let eos_found = self.words.iter().any(|w| w.eos);
        let ordinals_found = self.words.iter().any(|w| w.ordinal > 0);

        if !ordinals_found {
            self.add_word_ordinals();
        }
        if !eos_found && has_sentence_numbers {
            for sentence in self.sentences() {
                if let Some(last) = sentence.last() {
                    for part in self.related_parts(*last) {
                        self.words[part].eos = true;
                    }
                }
            }
        } else if need_numbers {
            for (s, sentence) in self.sentences_from_eos().into_iter().enumerate() {
                //gap words belong to the sentence but are not counted
                let mut word_number = 0;
                for index in sentence {
                    let number = if self.words[index].gap {
                        -1
                    } else {
                        word_number += 1;
                        word_number
                    };
                    for part in self.related_parts(index) {
                        self.words[part].sentence_number = s as i64 + 1;
                        self.words[part].word_number = number;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{FrontMiddleBack, MainSide};
    use crate::reader::parse_str;

    const XMLEXAMPLE: &'static str = r#"<TEI><text><front><p><w xml:id="d-010" eos="1">Title</w></p></front><body><div><p><w xml:id="d-020">The</w><w xml:id="d-030.1" part="I">gr</w><hi><w xml:id="d-030.0" part="F">eat</w></hi><note><w xml:id="d-040" eos="1">Note</w></note><w xml:id="d-050" eos="1">dog</w></p><p><said><w xml:id="d-060" eos="1">Yes</w></said></p></div></body></text></TEI>"#;

    fn index(xml: &str, config: &AdornConfig) -> Result<AdornedWordIndex, String> {
        let mut filter = WordInfoFilter::new(config);
        parse_str(xml, &mut filter).map_err(|e| e.to_string())?;
        Ok(filter.finish())
    }

    #[test]
    fn test_records() -> Result<(), String> {
        let index = index(XMLEXAMPLE, &AdornConfig::new())?;
        assert_eq!(index.len(), 7);
        let title = index.word("d-010").ok_or("missing word")?;
        assert_eq!(title.front_middle_back, FrontMiddleBack::Front);
        assert_eq!(title.word_text, "Title");
        let note = index.word("d-040").ok_or("missing word")?;
        assert!(note.in_jump_tag);
        assert_eq!(note.main_side, MainSide::Side);
        assert!(index.word("d-060").ok_or("missing word")?.spoken);
        assert_eq!(
            index.word("d-030.1").ok_or("missing word")?.path,
            "\\body[1]\\div[1]\\p[1]\\w[2]"
        );
        Ok(())
    }

    #[test]
    fn test_split_word_chain() -> Result<(), String> {
        let index = index(XMLEXAMPLE, &AdornConfig::new())?;
        for id in ["d-030.1", "d-030.0"] {
            assert_eq!(index.related_split_word_ids(id), vec!["d-030.1", "d-030.0"]);
        }
        assert_eq!(index.related_split_word_ids("d-020"), vec!["d-020"]);
        assert!(index.related_split_word_ids("nope").is_empty());
        assert!(matches!(index.require("nope"), Err(AdornError::MissingWord(_))));

        let first = index.word("d-030.1").ok_or("missing word")?;
        let last = index.word("d-030.0").ok_or("missing word")?;
        assert_eq!(first.previous_part, None);
        assert_eq!(first.next_part, Some(last.index));
        assert_eq!(last.previous_part, Some(first.index));
        assert_eq!(last.next_part, None);
        //the next word after the note resumes the chain of the paragraph
        let dog = index.index_of("d-050");
        assert_eq!(first.next_word, dog);
        assert_eq!(last.next_word, dog);
        assert_eq!(first.previous_word, index.index_of("d-020"));
        Ok(())
    }

    #[test]
    fn test_reading_context_order() -> Result<(), String> {
        let index = index(XMLEXAMPLE, &AdornConfig::new())?;
        assert_eq!(
            index.ids_in_reading_context_order(),
            vec!["d-010", "d-020", "d-030.1", "d-030.0", "d-050", "d-040", "d-060"]
        );
        Ok(())
    }

    #[test]
    fn test_missing_information() -> Result<(), String> {
        let index = index(XMLEXAMPLE, &AdornConfig::new())?;
        let ordinals: Vec<i64> = index.words().map(|w| w.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 3, 4, 5, 6]);
        let numbers: Vec<(i64, i64)> = index
            .words()
            .map(|w| (w.sentence_number, w.word_number))
            .collect();
        assert_eq!(
            numbers,
            vec![(1, 1), (2, 1), (2, 2), (2, 2), (3, 1), (2, 3), (4, 1)]
        );
        let sentences = index.sentences();
        assert_eq!(sentences.len(), 4);
        assert_eq!(sentences[1].len(), 3);
        Ok(())
    }

    #[test]
    fn test_eos_from_sentence_numbers() -> Result<(), String> {
        let index = index(
            r#"<p><w xml:id="a" sn="1" wn="1">A</w><w xml:id="b" sn="1" wn="2">b</w><w xml:id="c" sn="2" wn="1">C</w></p>"#,
            &AdornConfig::new(),
        )?;
        let eos: Vec<bool> = index.words().map(|w| w.eos).collect();
        assert_eq!(eos, vec![false, true, true]);
        Ok(())
    }

    #[test]
    fn test_gap_words() -> Result<(), String> {
        let config = AdornConfig::new().with_gap_words(true);
        let index = index(
            r#"<p><gap reason="illegible"/><w xml:id="doc-00000010">one</w><gap unit="chars" extent="3"/><w xml:id="doc-00000020" eos="1">two</w></p>"#,
            &config,
        )?;
        assert_eq!(
            index.ids(),
            vec!["doc-00000000-gap0", "doc-00000010", "doc-00000010-gap0", "doc-00000020"]
        );
        let gap = index.word("doc-00000010-gap0").ok_or("missing gap")?;
        assert!(gap.gap);
        assert_eq!(gap.spelling(), "{gap-chars-3}");
        assert_eq!(gap.pos(), "zz");
        assert_eq!(gap.ordinal, -1);

        let only_gaps = index_of_gaps(&config)?;
        assert_eq!(only_gaps.ids(), vec!["0-gap0", "0-gap1"]);

        let index = self::index(
            r#"<p><gap/><w xml:id="a">A</w><w xml:id="b" eos="1">b</w><w xml:id="c" eos="1">C</w></p>"#,
            &config,
        )?;
        let numbers: Vec<(&str, i64, i64)> = index
            .words()
            .map(|w| (w.id.as_str(), w.sentence_number, w.word_number))
            .collect();
        assert_eq!(
            numbers,
            vec![("a-gap0", 1, -1), ("a", 1, 1), ("b", 1, 2), ("c", 2, 1)]
        );
        assert_eq!(index.sentences().len(), 2);
        assert_eq!(index.sentences()[0].len(), 3);

        //numbers from the document, gaps stay out of the sentences
        let index = self::index(
            r#"<p><gap/><w xml:id="d-010" sn="1" wn="1" eos="1">A</w><gap/></p>"#,
            &config,
        )?;
        assert_eq!(index.ids(), vec!["d-000-gap0", "d-010", "d-010-gap0"]);
        let gap = index.word("d-010-gap0").ok_or("missing gap")?;
        assert_eq!((gap.sentence_number, gap.word_number), (-1, -1));
        assert_eq!(index.sentences(), vec![vec![1]]);
        Ok(())
    }

    fn index_of_gaps(config: &AdornConfig) -> Result<AdornedWordIndex, String> {
        index(r#"<p><gap/><gap/></p>"#, config)
    }

    #[test]
    fn test_path_queries() -> Result<(), String> {
        let index = self::index(
            r#"<p><w xml:id="a" p="\d\div[1]\p[1]\w[1]">a</w><w xml:id="b" p="\d\div[1]\p[1]\hi[1]\w[1]">b</w><w xml:id="c" p="\d\div[1]\p[10]\w[1]">c</w></p>"#,
            &AdornConfig::new(),
        )?;
        assert_eq!(index.sibling_word_ids("b"), vec!["a", "b"]);
        assert!(index.sibling_word_ids("x").is_empty());
        assert_eq!(
            index.find_words_by_path_pattern(r"\\p\[1\d\]").map_err(|e| e.to_string())?,
            vec!["c"]
        );
        assert_eq!(index.find_words_by_leading_path("\\d\\div[1]"), vec!["a", "b", "c"]);
        assert_eq!(index.selected_word_ids("b", "c"), vec!["b", "c"]);
        assert!(index.selected_word_ids("c", "a").is_empty());
        Ok(())
    }
}
