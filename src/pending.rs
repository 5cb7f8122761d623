use crate::attributes::Attributes;
use crate::error::AdornError;
use crate::event::XmlEventSink;

/// An element whose emission is deferred until its full text is known
#[derive(Clone, Debug, PartialEq)]
pub struct PendingElement {
    pub name: String,
    pub attribs: Attributes,
    pub text: String,
}

impl PendingElement {
    pub fn new(name: impl Into<String>, attribs: Attributes) -> Self {
        Self {
            name: name.into(),
            attribs,
            text: String::new(),
        }
    }

    pub fn append_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Writes the element with its text to a sink
    pub fn emit<S: XmlEventSink>(&self, sink: &mut S) -> Result<(), AdornError> {
        sink.text_element(&self.name, &self.attribs, &self.text)
    }
}
