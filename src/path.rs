use std::collections::HashMap;
use std::fmt::Display;

use crate::attributes::Attributes;
use crate::classify::TagClassifier;
use crate::config::{AdornConfig, TagClass};
use crate::error::AdornError;
use crate::event::XmlEventSink;

/// Position of a word relative to the front matter, main body and back matter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FrontMiddleBack {
    Front,
    #[default]
    Middle,
    Back,
}

/// Whether a word belongs to the main text or to side text (notes, running heads)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MainSide {
    #[default]
    Main,
    Side,
}

/// Counts elder siblings per tag name, used to determine index values
#[derive(Default, Debug, Clone)]
struct SiblingCounter {
    map: HashMap<String, usize>,
}

impl SiblingCounter {
    fn count(&mut self, name: &str) -> usize {
        *self
            .map
            .entry(name.to_owned())
            .and_modify(|c| *c += 1)
            .or_insert(1)
    }
}

#[derive(Clone, Debug, PartialEq)]
struct PathComponent {
    name: String,
    /// Index sequence number, 1-indexed (as in XPath)
    index: usize,
}

/// Tracks the currently open elements of a document
#[derive(Debug, Clone, Default)]
pub struct AncestryTracker {
    stack: Vec<PathComponent>,
    /// sibling counters for the children of every open element, plus one for the document
    counters: Vec<SiblingCounter>,
}

impl AncestryTracker {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            counters: vec![SiblingCounter::default()],
        }
    }

    pub fn push(&mut self, name: &str) {
        if self.counters.is_empty() {
            self.counters.push(SiblingCounter::default());
        }
        let index = self
            .counters
            .last_mut()
            .map(|counter| counter.count(name))
            .unwrap_or(1);
        self.stack.push(PathComponent {
            name: name.to_owned(),
            index,
        });
        self.counters.push(SiblingCounter::default());
    }

    pub fn pop(&mut self) {
        if self.stack.pop().is_some() {
            self.counters.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Name of the innermost open element
    pub fn current(&self) -> Option<&str> {
        self.stack.last().map(|c| c.name.as_str())
    }

    /// Backslash-delimited path of the innermost open element, e.g. `\div[1]\p[3]\w[12]`.
    /// A `TEI` root and a `text` element directly below it are left out.
    pub fn path(&self) -> String {
        self.to_string()
    }

    fn ancestors(&self) -> impl Iterator<Item = &str> {
        self.stack.iter().rev().map(|c| c.name.as_str())
    }

    pub fn has_ancestor(&self, name: &str) -> bool {
        self.ancestors().any(|n| n == name)
    }

    /// Inside a `said` element
    pub fn is_spoken(&self) -> bool {
        self.has_ancestor("said")
    }

    /// Inside an `l` (verse line) element
    pub fn is_verse(&self) -> bool {
        self.has_ancestor("l")
    }

    pub fn in_jump_tag(&self, classifier: &TagClassifier) -> bool {
        self.ancestors().any(|n| classifier.is_jump(n))
    }

    /// Classifies the innermost position by the tag classes of its ancestors (the root excluded)
    pub fn front_middle_back(&self, classifier: &TagClassifier) -> (FrontMiddleBack, MainSide) {
        let mut fmb = FrontMiddleBack::Middle;
        let mut main = MainSide::Main;
        for name in self.stack.iter().skip(1).map(|c| c.name.as_str()) {
            match classifier.tag_class(name) {
                Some(TagClass::Front) => fmb = FrontMiddleBack::Front,
                Some(TagClass::Back) => fmb = FrontMiddleBack::Back,
                Some(TagClass::Side) => main = MainSide::Side,
                None => {}
            }
        }
        (fmb, main)
    }
}

impl Display for AncestryTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, component) in self.stack.iter().enumerate() {
            if (i == 0 && component.name == "TEI") || (i == 1 && component.name == "text") {
                continue;
            }
            write!(f, "\\{}[{}]", component.name, component.index)?;
        }
        Ok(())
    }
}

/// Splits a path into its components, the leading empty component excluded
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('\\').filter(|s| !s.is_empty()).collect()
}

/// Strips the `[n]` index from a path component
pub fn component_tag(component: &str) -> &str {
    let component = component.trim();
    match component.find('[') {
        Some(pos) => &component[..pos],
        None => component,
    }
}

/// The path of the closest enclosing element that is not a soft tag.
/// The last component (the word itself) is always removed.
pub fn trim_trailing_soft_tags(path: &str, classifier: &TagClassifier) -> String {
    let components = split_path(path);
    let mut end = components.len().saturating_sub(1);
    while end > 0 && classifier.is_soft(component_tag(components[end - 1])) {
        end -= 1;
    }
    let mut result = String::new();
    for component in &components[..end] {
        result.push('\\');
        result.push_str(component);
    }
    result
}

/// Sets the path attribute on every word element
pub struct WordPathFilter<S: XmlEventSink> {
    inner: S,
    tracker: AncestryTracker,
    word_tag: String,
    path_attribute: String,
}

impl<S: XmlEventSink> WordPathFilter<S> {
    pub fn new(inner: S, config: &AdornConfig) -> Self {
        Self {
            inner,
            tracker: AncestryTracker::new(),
            word_tag: config.word_tag.clone(),
            path_attribute: config.attributes.path.clone(),
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: XmlEventSink> XmlEventSink for WordPathFilter<S> {
    fn start_document(&mut self) -> Result<(), AdornError> {
        self.tracker = AncestryTracker::new();
        self.inner.start_document()
    }

    fn start_element(&mut self, name: &str, attribs: &Attributes) -> Result<(), AdornError> {
        self.tracker.push(name);
        if name == self.word_tag {
            let attribs = attribs
                .clone()
                .with_set(self.path_attribute.as_str(), self.tracker.path());
            self.inner.start_element(name, &attribs)
        } else {
            self.inner.start_element(name, attribs)
        }
    }

    fn characters(&mut self, text: &str) -> Result<(), AdornError> {
        self.inner.characters(text)
    }

    fn end_element(&mut self, name: &str) -> Result<(), AdornError> {
        self.tracker.pop();
        self.inner.end_element(name)
    }

    fn end_document(&mut self) -> Result<(), AdornError> {
        self.inner.end_document()
    }
}
