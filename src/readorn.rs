use crate::attributes::Attributes;
use crate::config::{AdornConfig, ID_ATTRIBUTE};
use crate::error::AdornError;
use crate::event::XmlEventSink;
use crate::numbering::is_sentence_milestone;
use crate::wordinfo::AdornedWordIndex;

/// Rewrites the word records of one sentence, given as indices in reading context order.
///
/// This is where a part of speech tagger, lemmatizer or spelling standardizer plugs in.
pub trait WordAdorner {
    fn adorn_sentence(
        &mut self,
        index: &mut AdornedWordIndex,
        sentence: &[usize],
    ) -> Result<(), AdornError>;
}

/// Leaves all records as they are
#[derive(Clone, Copy, Debug, Default)]
pub struct KeepAdornments;

impl WordAdorner for KeepAdornments {
    fn adorn_sentence(
        &mut self,
        _index: &mut AdornedWordIndex,
        _sentence: &[usize],
    ) -> Result<(), AdornError> {
        Ok(())
    }
}

/// Runs the adorner over every sentence of the index, returns the number of sentences
pub fn adorn_sentences<A: WordAdorner + ?Sized>(
    index: &mut AdornedWordIndex,
    adorner: &mut A,
) -> Result<usize, AdornError> {
    let sentences = index.sentences();
    for sentence in sentences.iter() {
        adorner.adorn_sentence(index, sentence)?;
    }
    Ok(sentences.len())
}

/// Replaces the attributes of every word element by those of its record in the index.
///
/// Sentence milestones of the input are dropped when new ones are to be written.
pub struct AddWordAttributesFilter<'a, S: XmlEventSink> {
    inner: S,
    index: &'a AdornedWordIndex,
    config: &'a AdornConfig,
    /// inside a char element that is dropped
    in_char: bool,
    in_word: bool,
    in_old_milestone: bool,
}

impl<'a, S: XmlEventSink> AddWordAttributesFilter<'a, S> {
    pub fn new(inner: S, index: &'a AdornedWordIndex, config: &'a AdornConfig) -> Self {
        Self {
            inner,
            index,
            config,
            in_char: false,
            in_word: false,
            in_old_milestone: false,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn word_attributes(&self, attribs: Attributes) -> Attributes {
        let id = match attribs.get(ID_ATTRIBUTE) {
            Some(id) => id,
            None => return attribs,
        };
        let word = match self.index.word(id) {
            Some(word) => word,
            None => return attribs,
        };
        let names = &self.config.attributes;
        let set_or_remove = |attribs: Attributes, name: &str, value: Option<String>| match value {
            Some(value) => attribs.with_set(name, value),
            None => attribs.with_removed(name),
        };

        let mut attribs = attribs
            .with_set(ID_ATTRIBUTE, word.id.as_str())
            .with_set(names.eos.as_str(), if word.eos { "1" } else { "0" })
            .with_set(names.lem.as_str(), word.lemma());
        attribs = set_or_remove(
            attribs,
            names.ord.as_str(),
            (self.config.output_word_ordinal && word.ordinal > 0).then(|| word.ordinal.to_string()),
        );
        attribs = attribs
            .with_set(names.part.as_str(), word.part.as_str())
            .with_set(names.pos.as_str(), word.pos())
            .with_set(names.reg.as_str(), word.standard_spelling());
        attribs = set_or_remove(
            attribs,
            names.sn.as_str(),
            (self.config.output_sentence_number && word.sentence_number >= 0)
                .then(|| word.sentence_number.to_string()),
        );
        attribs = attribs
            .with_set(names.spe.as_str(), word.spelling())
            .with_set(names.tok.as_str(), word.token());
        attribs = set_or_remove(
            attribs,
            names.wn.as_str(),
            (self.config.output_word_number && word.word_number >= 0)
                .then(|| word.word_number.to_string()),
        );

        if self.config.output_nonredundant_attributes_only {
            let spelling = word.spelling();
            attribs
                .with_removed_if_equal(&names.eos, Some("0"))
                .with_removed_if_equal(&names.spe, Some(word.token()))
                .with_removed_if_equal(&names.lem, Some(spelling))
                .with_removed_if_equal(&names.pos, Some(spelling))
                .with_removed_if_equal(&names.reg, Some(spelling))
                .with_removed_if_equal(&names.part, Some("N"))
                .with_removed_if_equal(&names.tok, Some(word.word_text.as_str()))
        } else if self.config.output_nonredundant_token_attribute {
            attribs.with_removed_if_equal(&names.tok, Some(word.word_text.as_str()))
        } else {
            attribs
        }
    }
}

impl<'a, S: XmlEventSink> XmlEventSink for AddWordAttributesFilter<'a, S> {
    fn start_document(&mut self) -> Result<(), AdornError> {
        self.in_char = false;
        self.in_word = false;
        self.in_old_milestone = false;
        self.inner.start_document()
    }

    fn start_element(&mut self, name: &str, attribs: &Attributes) -> Result<(), AdornError> {
        if self.config.output_sentence_milestones && is_sentence_milestone(name, attribs) {
            self.in_old_milestone = true;
            return Ok(());
        }
        let attribs = attribs.clone().with_removed("TEIform");
        if name == self.config.word_tag {
            self.in_word = true;
            let attribs = self.word_attributes(attribs);
            self.inner.start_element(name, &attribs)
        } else if name == self.config.char_tag {
            if self.config.output_whitespace {
                let attribs = attribs.with_removed(&self.config.attributes.part);
                self.inner.start_element(name, &attribs)
            } else {
                self.in_char = true;
                Ok(())
            }
        } else {
            self.inner.start_element(name, &attribs)
        }
    }

    fn characters(&mut self, text: &str) -> Result<(), AdornError> {
        if self.in_char {
            Ok(())
        } else if self.in_word && text.contains(|c: char| c == '\n' || c == '\r') {
            //a word must stay on one output line
            self.inner
                .characters(&text.replace(|c: char| c == '\n' || c == '\r', " "))
        } else {
            self.inner.characters(text)
        }
    }

    fn end_element(&mut self, name: &str) -> Result<(), AdornError> {
        if self.in_old_milestone {
            self.in_old_milestone = false;
            Ok(())
        } else if self.in_char && name == self.config.char_tag {
            self.in_char = false;
            Ok(())
        } else {
            if name == self.config.word_tag {
                self.in_word = false;
            }
            self.inner.end_element(name)
        }
    }

    fn end_document(&mut self) -> Result<(), AdornError> {
        self.inner.end_document()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::XmlEvent;
    use crate::reader::parse_str;
    use crate::wordinfo::WordInfoFilter;

    const XMLEXAMPLE: &'static str = r#"<TEI><text><body><p TEIform="p"><w xml:id="d-010" lem="the" pos="dt" reg="The" spe="The" tok="The" ord="1" sn="1" wn="1" eos="0" part="N">The</w><c part="N"> </c><w xml:id="d-020" lem="dog" pos="n1" reg="dog" spe="dog" tok="dog" ord="2" sn="1" wn="2" eos="0" part="N">dog</w><w xml:id="d-030" lem="." pos="." reg="." spe="." tok="." ord="3" sn="1" wn="3" eos="1" part="N">.</w><w xml:id="other">x</w></p></body></text></TEI>"#;

    fn readorn<A: WordAdorner>(
        xml: &str,
        config: &AdornConfig,
        adorner: &mut A,
    ) -> Result<Vec<XmlEvent>, String> {
        let mut info = WordInfoFilter::new(config);
        parse_str(xml, &mut info).map_err(|e| e.to_string())?;
        let mut index = info.finish();
        adorn_sentences(&mut index, adorner).map_err(|e| e.to_string())?;
        let mut filter = AddWordAttributesFilter::new(Vec::new(), &index, config);
        parse_str(xml, &mut filter).map_err(|e| e.to_string())?;
        Ok(filter.into_inner())
    }

    fn word_attributes<'a>(events: &'a [XmlEvent], id: &str) -> Option<&'a Attributes> {
        events.iter().find_map(|e| match e {
            XmlEvent::Start(name, attribs) if name == "w" && attribs.get(ID_ATTRIBUTE) == Some(id) => {
                Some(attribs)
            }
            _ => None,
        })
    }

    #[test]
    fn test_keep_adornments() -> Result<(), String> {
        let events = readorn(XMLEXAMPLE, &AdornConfig::new(), &mut KeepAdornments)?;
        let dog = word_attributes(&events, "d-020").ok_or("missing word")?;
        let names: Vec<&str> = dog.iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec!["xml:id", "lem", "pos", "reg", "spe", "tok", "ord", "eos", "part"]
        );
        assert_eq!(dog.get("lem"), Some("dog"));
        assert_eq!(dog.get("ord"), Some("2"));
        assert!(events.iter().any(|e| matches!(e, XmlEvent::Start(name, attribs) if name == "p" && attribs.is_empty())));
        assert!(events.iter().any(|e| matches!(e, XmlEvent::Start(name, attribs) if name == "c" && attribs.is_empty())));
        Ok(())
    }

    #[test]
    fn test_word_number_removed_sentence_number_kept() -> Result<(), String> {
        let config = AdornConfig::new().with_sentence_numbers(true);
        let events = readorn(XMLEXAMPLE, &config, &mut KeepAdornments)?;
        let dog = word_attributes(&events, "d-020").ok_or("missing word")?;
        assert_eq!(dog.get("sn"), Some("1"));
        assert_eq!(dog.get("wn"), None);
        Ok(())
    }

    #[test]
    fn test_unknown_word_unchanged() -> Result<(), String> {
        let config = AdornConfig::new();
        let mut info = WordInfoFilter::new(&config);
        parse_str(XMLEXAMPLE, &mut info).map_err(|e| e.to_string())?;
        let index = info.finish();
        let mut filter = AddWordAttributesFilter::new(Vec::new(), &index, &config);
        parse_str(r#"<p><w xml:id="new" pos="n1">cat</w></p>"#, &mut filter)
            .map_err(|e| e.to_string())?;
        let events = filter.into_inner();
        let cat = word_attributes(&events, "new").ok_or("missing word")?;
        let found: Vec<(&str, &str)> = cat.iter().collect();
        assert_eq!(found, vec![("xml:id", "new"), ("pos", "n1")]);
        Ok(())
    }

    #[test]
    fn test_no_whitespace() -> Result<(), String> {
        let config = AdornConfig::new().with_whitespace(false);
        let events = readorn(XMLEXAMPLE, &config, &mut KeepAdornments)?;
        assert!(!events
            .iter()
            .any(|e| matches!(e, XmlEvent::Start(name, _) | XmlEvent::End(name) if name == "c")));
        assert!(!events.iter().any(|e| matches!(e, XmlEvent::Characters(s) if s.contains(' '))));
        Ok(())
    }

    #[test]
    fn test_nonredundant() -> Result<(), String> {
        let config = AdornConfig::new().with_nonredundant_attributes_only(true);
        let events = readorn(XMLEXAMPLE, &config, &mut KeepAdornments)?;
        let dog = word_attributes(&events, "d-020").ok_or("missing word")?;
        let names: Vec<&str> = dog.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["xml:id", "pos", "ord"]);
        let stop = word_attributes(&events, "d-030").ok_or("missing word")?;
        assert_eq!(stop.get("eos"), Some("1"));
        Ok(())
    }

    struct UpperLemmas {
        sentences: usize,
    }

    impl WordAdorner for UpperLemmas {
        fn adorn_sentence(
            &mut self,
            index: &mut AdornedWordIndex,
            sentence: &[usize],
        ) -> Result<(), AdornError> {
            self.sentences += 1;
            for i in sentence {
                if let Some(word) = index.word_at_mut(*i) {
                    word.lemma = Some(word.lemma().to_uppercase());
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_adorner() -> Result<(), String> {
        let mut adorner = UpperLemmas { sentences: 0 };
        let events = readorn(XMLEXAMPLE, &AdornConfig::new(), &mut adorner)?;
        assert_eq!(adorner.sentences, 2);
        let dog = word_attributes(&events, "d-020").ok_or("missing word")?;
        assert_eq!(dog.get("lem"), Some("DOG"));
        Ok(())
    }

    #[test]
    fn test_old_sentence_milestones_dropped() -> Result<(), String> {
        let xml = r#"<p><milestone unit="sentence" n="1" position="start"/><w xml:id="d-010" eos="1">Stop
</w><milestone unit="sentence" n="1" position="end"/><milestone unit="pseudopage" n="1" position="start"/></p>"#;
        let units = |events: &[XmlEvent]| -> Vec<String> {
            events
                .iter()
                .filter_map(|e| match e {
                    XmlEvent::Start(name, attribs) if name == "milestone" => {
                        Some(attribs.get("unit").unwrap_or("").to_owned())
                    }
                    _ => None,
                })
                .collect()
        };
        let config = AdornConfig::new().with_sentence_milestones(true);
        let events = readorn(xml, &config, &mut KeepAdornments)?;
        assert_eq!(units(&events[..]), vec!["pseudopage"]);
        assert!(events
            .iter()
            .any(|e| matches!(e, XmlEvent::Characters(s) if s == "Stop ")));
        assert!(matches!(events.last(), Some(XmlEvent::EndDocument)));

        let events = readorn(xml, &AdornConfig::new(), &mut KeepAdornments)?;
        assert_eq!(units(&events[..]), vec!["sentence", "sentence", "pseudopage"]);
        Ok(())
    }
}
