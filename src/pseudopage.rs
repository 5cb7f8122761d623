use crate::attributes::Attributes;
use crate::config::AdornConfig;
use crate::error::AdornError;
use crate::event::XmlEventSink;
use crate::word::WordPart;

pub const MILESTONE_TAG: &str = "milestone";
pub const PSEUDOPAGE_UNIT: &str = "pseudopage";

/// Keeps track of pseudo-pages: runs of a fixed number of word elements marked by milestones.
///
/// A start milestone is only written when no page is open and an end milestone only when one is,
/// so milestones always come in pairs.
#[derive(Clone, Debug)]
pub struct PseudoPager {
    page_size: usize,
    path_attribute: String,
    /// number of pages started so far
    page_count: usize,
    words_in_page: usize,
    started: bool,
    last_path: String,
}

impl PseudoPager {
    pub fn new(config: &AdornConfig) -> Self {
        Self {
            page_size: config.pseudo_page_size.max(1),
            path_attribute: config.attributes.path.clone(),
            page_count: 0,
            words_in_page: 0,
            started: false,
            last_path: String::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn words_in_page(&self) -> usize {
        self.words_in_page
    }

    fn milestone<S: XmlEventSink>(&self, sink: &mut S, position: &str) -> Result<(), AdornError> {
        let mut attribs = Attributes::new()
            .with_set("unit", PSEUDOPAGE_UNIT)
            .with_set("n", self.page_count.to_string())
            .with_set("position", position);
        if !self.last_path.is_empty() {
            let parent = match self.last_path.rfind('\\') {
                Some(pos) => &self.last_path[..pos],
                None => "",
            };
            attribs = attribs.with_set(
                self.path_attribute.as_str(),
                format!("{}\\{}[{}]", parent, MILESTONE_TAG, self.page_count),
            );
        }
        sink.empty_element(MILESTONE_TAG, &attribs)
    }

    pub fn start_page<S: XmlEventSink>(&mut self, sink: &mut S) -> Result<(), AdornError> {
        if self.started {
            return Ok(());
        }
        self.page_count += 1;
        self.started = true;
        self.words_in_page = 0;
        self.milestone(sink, "start")
    }

    pub fn end_page<S: XmlEventSink>(&mut self, sink: &mut S) -> Result<(), AdornError> {
        if !self.started {
            return Ok(());
        }
        self.started = false;
        self.words_in_page = 0;
        self.milestone(sink, "end")
    }

    /// Called before a word element is written
    pub fn before_word<S: XmlEventSink>(
        &mut self,
        sink: &mut S,
        part: WordPart,
        path: Option<&str>,
    ) -> Result<(), AdornError> {
        if let Some(path) = path {
            if !path.is_empty() {
                self.last_path = path.to_owned();
            }
        }
        if part.is_first() && self.words_in_page == 0 && !self.started {
            self.start_page(sink)?;
        }
        self.words_in_page += 1;
        Ok(())
    }

    /// Called after a word element is written. Pages only end after the last part of a word.
    pub fn after_word<S: XmlEventSink>(
        &mut self,
        sink: &mut S,
        part: WordPart,
        last_word_of_document: bool,
    ) -> Result<(), AdornError> {
        if part.is_last() && (self.words_in_page >= self.page_size || last_word_of_document) {
            self.end_page(sink)?;
        }
        Ok(())
    }

    /// A container division closed: the current page ends and, when words remain, a new one starts
    pub fn container_end<S: XmlEventSink>(
        &mut self,
        sink: &mut S,
        words_remain: bool,
    ) -> Result<(), AdornError> {
        if words_remain {
            self.end_page(sink)?;
            self.start_page(sink)?;
        }
        Ok(())
    }

    /// Closes a page that is still open at the end of the document
    pub fn finish<S: XmlEventSink>(&mut self, sink: &mut S) -> Result<(), AdornError> {
        self.end_page(sink)
    }
}

/// Adds pseudo-page milestones to an adorned stream, replacing any existing ones
pub struct PseudoPageAdderFilter<S: XmlEventSink> {
    inner: S,
    pager: PseudoPager,
    word_tag: String,
    part_attribute: String,
    path_attribute: String,
    container_div_types: Vec<String>,
    total_words: usize,
    emitted: usize,
    current_part: Option<WordPart>,
    div_types: Vec<String>,
    in_old_milestone: bool,
    //elements seen so far, used to close the root after a pending page
    depth: usize,
}

impl<S: XmlEventSink> PseudoPageAdderFilter<S> {
    /// `total_words` is the number of word elements in the stream
    pub fn new(inner: S, config: &AdornConfig, total_words: usize) -> Self {
        Self {
            inner,
            pager: PseudoPager::new(config),
            word_tag: config.word_tag.clone(),
            part_attribute: config.attributes.part.clone(),
            path_attribute: config.attributes.path.clone(),
            container_div_types: config
                .pseudo_page_container_div_types
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            total_words,
            emitted: 0,
            current_part: None,
            div_types: Vec::new(),
            in_old_milestone: false,
            depth: 0,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pager.page_count()
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: XmlEventSink> XmlEventSink for PseudoPageAdderFilter<S> {
    fn start_document(&mut self) -> Result<(), AdornError> {
        self.inner.start_document()
    }

    fn start_element(&mut self, name: &str, attribs: &Attributes) -> Result<(), AdornError> {
        if name == MILESTONE_TAG && attribs.get("unit") == Some(PSEUDOPAGE_UNIT) {
            self.in_old_milestone = true;
            return Ok(());
        }
        self.depth += 1;
        if name == self.word_tag {
            let part = attribs
                .get(&self.part_attribute)
                .map(WordPart::parse)
                .unwrap_or_default();
            self.current_part = Some(part);
            self.pager
                .before_word(&mut self.inner, part, attribs.get(&self.path_attribute))?;
        } else if name == "div" {
            self.div_types.push(
                attribs
                    .get("type")
                    .map(|s| s.to_lowercase())
                    .unwrap_or_else(|| "*div".to_owned()),
            );
        }
        self.inner.start_element(name, attribs)
    }

    fn characters(&mut self, text: &str) -> Result<(), AdornError> {
        self.inner.characters(text)
    }

    fn end_element(&mut self, name: &str) -> Result<(), AdornError> {
        if self.in_old_milestone && name == MILESTONE_TAG {
            self.in_old_milestone = false;
            return Ok(());
        }
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            //root element closes
            self.pager.finish(&mut self.inner)?;
        }
        self.inner.end_element(name)?;
        if name == self.word_tag {
            if let Some(part) = self.current_part.take() {
                self.emitted += 1;
                let last = self.emitted >= self.total_words;
                self.pager.after_word(&mut self.inner, part, last)?;
            }
        } else if name == "div" {
            if let Some(div_type) = self.div_types.pop() {
                if self.container_div_types.contains(&div_type) {
                    let remain = self.emitted < self.total_words;
                    self.pager.container_end(&mut self.inner, remain)?;
                }
            }
        }
        Ok(())
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

    const XMLEXAMPLE: &'static str = r#"<TEI><text><body>
<div type="chapter"><p><w xml:id="d-1" p="\d\div[1]\p[1]\w[1]">a</w><w xml:id="d-2">b</w><w xml:id="d-3">c</w></p></div>
<div type="chapter"><milestone unit="pseudopage" n="9" position="start"/><p><w xml:id="d-4.1" part="I">d</w><w xml:id="d-4.0" part="F">e</w><w xml:id="d-5">f</w></p></div>
</body></text></TEI>"#;

    fn milestones(events: &[XmlEvent]) -> Vec<(String, String)> {
        events
            .iter()
            .filter_map(|e| match e {
                XmlEvent::Start(name, attribs) if name == MILESTONE_TAG => Some((
                    attribs.get("n").unwrap_or("").to_owned(),
                    attribs.get("position").unwrap_or("").to_owned(),
                )),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_pseudo_page_pairing() -> Result<(), String> {
        let config = AdornConfig::new().with_pseudo_pages(2);
        let mut filter = PseudoPageAdderFilter::new(Vec::new(), &config, 6);
        parse_str(XMLEXAMPLE, &mut filter).map_err(|e| e.to_string())?;
        assert_eq!(filter.page_count(), 4);
        let found = milestones(&filter.into_inner());
        let expected: Vec<(String, String)> = [
            ("1", "start"),
            ("1", "end"),
            ("2", "start"),
            ("2", "end"),
            ("3", "start"),
            ("3", "end"),
            ("4", "start"),
            ("4", "end"),
        ]
        .iter()
        .map(|(n, p)| (n.to_string(), p.to_string()))
        .collect();
        assert_eq!(found, expected);
        Ok(())
    }

    #[test]
    fn test_split_word_not_broken() -> Result<(), String> {
        //page size 4 would end inside the split word d-4, it ends after its last part
        let config = AdornConfig::new()
            .with_pseudo_pages(4)
            .with_container_div_types(Vec::<String>::new().into_iter());
        let mut filter = PseudoPageAdderFilter::new(Vec::new(), &config, 6);
        parse_str(XMLEXAMPLE, &mut filter).map_err(|e| e.to_string())?;
        let events = filter.into_inner();
        let position = events
            .iter()
            .position(|e| matches!(e, XmlEvent::Start(name, attribs) if name == MILESTONE_TAG && attribs.get("position") == Some("end")))
            .ok_or("no end milestone")?;
        assert!(matches!(&events[position - 2], XmlEvent::Characters(s) if s == "e"));
        assert_eq!(milestones(&events).len(), 4);
        Ok(())
    }

    #[test]
    fn test_milestone_path() -> Result<(), String> {
        let config = AdornConfig::new().with_pseudo_pages(10);
        let mut filter = PseudoPageAdderFilter::new(Vec::new(), &config, 6);
        parse_str(XMLEXAMPLE, &mut filter).map_err(|e| e.to_string())?;
        let events = filter.into_inner();
        assert!(events.iter().any(|e| matches!(e, XmlEvent::Start(name, attribs)
            if name == MILESTONE_TAG && attribs.get("p") == Some("\\d\\div[1]\\p[1]\\milestone[1]"))));
        Ok(())
    }
}
