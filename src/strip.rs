use std::collections::HashSet;

use crate::attributes::Attributes;
use crate::config::{AdornConfig, ID_ATTRIBUTE};
use crate::error::AdornError;
use crate::event::XmlEventSink;

/// Removes word and char elements (keeping their text) inside configured elements
pub struct StripWordElementsFilter<S: XmlEventSink> {
    inner: S,
    strip_in: HashSet<String>,
    word_tag: String,
    char_tag: String,
    /// number of open elements from `strip_in`
    depth: usize,
}

impl<S: XmlEventSink> StripWordElementsFilter<S> {
    pub fn new(inner: S, config: &AdornConfig) -> Self {
        Self {
            inner,
            strip_in: config.disallow_word_elements_in.iter().cloned().collect(),
            word_tag: config.word_tag.clone(),
            char_tag: config.char_tag.clone(),
            depth: 0,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn is_stripped(&self, name: &str) -> bool {
        self.depth > 0 && (name == self.word_tag || name == self.char_tag)
    }
}

impl<S: XmlEventSink> XmlEventSink for StripWordElementsFilter<S> {
    fn start_document(&mut self) -> Result<(), AdornError> {
        self.depth = 0;
        self.inner.start_document()
    }

    fn start_element(&mut self, name: &str, attribs: &Attributes) -> Result<(), AdornError> {
        if self.strip_in.contains(name) {
            self.depth += 1;
        }
        if self.is_stripped(name) {
            Ok(())
        } else {
            self.inner.start_element(name, attribs)
        }
    }

    fn characters(&mut self, text: &str) -> Result<(), AdornError> {
        self.inner.characters(text)
    }

    fn end_element(&mut self, name: &str) -> Result<(), AdornError> {
        let stripped = self.is_stripped(name);
        if self.strip_in.contains(name) {
            self.depth = self.depth.saturating_sub(1);
        }
        if stripped {
            Ok(())
        } else {
            self.inner.end_element(name)
        }
    }

    fn end_document(&mut self) -> Result<(), AdornError> {
        self.inner.end_document()
    }
}

/// Reduces word elements to their identifier and drops part flags from char elements
pub struct StripWordAttributesFilter<S: XmlEventSink> {
    inner: S,
    word_tag: String,
    char_tag: String,
    part_attribute: String,
}

impl<S: XmlEventSink> StripWordAttributesFilter<S> {
    pub fn new(inner: S, config: &AdornConfig) -> Self {
        Self {
            inner,
            word_tag: config.word_tag.clone(),
            char_tag: config.char_tag.clone(),
            part_attribute: config.attributes.part.clone(),
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: XmlEventSink> XmlEventSink for StripWordAttributesFilter<S> {
    fn start_document(&mut self) -> Result<(), AdornError> {
        self.inner.start_document()
    }

    fn start_element(&mut self, name: &str, attribs: &Attributes) -> Result<(), AdornError> {
        if name == self.word_tag {
            let mut stripped = Attributes::new();
            if let Some(id) = attribs.get(ID_ATTRIBUTE) {
                stripped = stripped.with_set(ID_ATTRIBUTE, id);
            }
            self.inner.start_element(name, &stripped)
        } else if name == self.char_tag {
            let stripped = attribs.clone().with_removed(&self.part_attribute);
            self.inner.start_element(name, &stripped)
        } else {
            self.inner.start_element(name, attribs)
        }
    }

    fn characters(&mut self, text: &str) -> Result<(), AdornError> {
        self.inner.characters(text)
    }

    fn end_element(&mut self, name: &str) -> Result<(), AdornError> {
        self.inner.end_element(name)
    }

    fn end_document(&mut self) -> Result<(), AdornError> {
        self.inner.end_document()
    }
}
