use crate::attributes::Attributes;
use crate::error::AdornError;

/// Receives the content events of one XML document, in document order.
///
/// Filters implement this trait and forward (possibly rewritten) events to
/// a downstream sink they own; writers and indexes are terminal sinks.
pub trait XmlEventSink {
    fn start_document(&mut self) -> Result<(), AdornError> {
        Ok(())
    }

    fn start_element(&mut self, name: &str, attribs: &Attributes) -> Result<(), AdornError>;

    fn characters(&mut self, text: &str) -> Result<(), AdornError>;

    fn end_element(&mut self, name: &str) -> Result<(), AdornError>;

    fn end_document(&mut self) -> Result<(), AdornError> {
        Ok(())
    }

    /// Convenience: an element with only text content
    fn text_element(
        &mut self,
        name: &str,
        attribs: &Attributes,
        text: &str,
    ) -> Result<(), AdornError> {
        self.start_element(name, attribs)?;
        if !text.is_empty() {
            self.characters(text)?;
        }
        self.end_element(name)
    }

    /// Convenience: an element without content
    fn empty_element(&mut self, name: &str, attribs: &Attributes) -> Result<(), AdornError> {
        self.start_element(name, attribs)?;
        self.end_element(name)
    }
}

impl<S: XmlEventSink + ?Sized> XmlEventSink for &mut S {
    fn start_document(&mut self) -> Result<(), AdornError> {
        (**self).start_document()
    }
    fn start_element(&mut self, name: &str, attribs: &Attributes) -> Result<(), AdornError> {
        (**self).start_element(name, attribs)
    }
    fn characters(&mut self, text: &str) -> Result<(), AdornError> {
        (**self).characters(text)
    }
    fn end_element(&mut self, name: &str) -> Result<(), AdornError> {
        (**self).end_element(name)
    }
    fn end_document(&mut self) -> Result<(), AdornError> {
        (**self).end_document()
    }
}

impl<S: XmlEventSink + ?Sized> XmlEventSink for Box<S> {
    fn start_document(&mut self) -> Result<(), AdornError> {
        (**self).start_document()
    }
    fn start_element(&mut self, name: &str, attribs: &Attributes) -> Result<(), AdornError> {
        (**self).start_element(name, attribs)
    }
    fn characters(&mut self, text: &str) -> Result<(), AdornError> {
        (**self).characters(text)
    }
    fn end_element(&mut self, name: &str) -> Result<(), AdornError> {
        (**self).end_element(name)
    }
    fn end_document(&mut self) -> Result<(), AdornError> {
        (**self).end_document()
    }
}

/// A recorded event
#[derive(Clone, Debug, PartialEq)]
pub enum XmlEvent {
    StartDocument,
    Start(String, Attributes),
    Characters(String),
    End(String),
    EndDocument,
}

/// Records events in memory, merging adjacent character events
impl XmlEventSink for Vec<XmlEvent> {
    fn start_document(&mut self) -> Result<(), AdornError> {
        self.push(XmlEvent::StartDocument);
        Ok(())
    }
    fn start_element(&mut self, name: &str, attribs: &Attributes) -> Result<(), AdornError> {
        self.push(XmlEvent::Start(name.to_owned(), attribs.clone()));
        Ok(())
    }
    fn characters(&mut self, text: &str) -> Result<(), AdornError> {
        if let Some(XmlEvent::Characters(previous)) = self.last_mut() {
            previous.push_str(text);
        } else {
            self.push(XmlEvent::Characters(text.to_owned()));
        }
        Ok(())
    }
    fn end_element(&mut self, name: &str) -> Result<(), AdornError> {
        self.push(XmlEvent::End(name.to_owned()));
        Ok(())
    }
    fn end_document(&mut self) -> Result<(), AdornError> {
        self.push(XmlEvent::EndDocument);
        Ok(())
    }
}

/// Forwards events to a sink, or records them while a hold is in place
pub struct HoldingSink<S: XmlEventSink> {
    inner: S,
    held: Option<Vec<XmlEvent>>,
}

impl<S: XmlEventSink> HoldingSink<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, held: None }
    }

    /// Starts recording; a hold already in place is kept
    pub fn hold(&mut self) {
        if self.held.is_none() {
            self.held = Some(Vec::new());
        }
    }

    pub fn is_holding(&self) -> bool {
        self.held.is_some()
    }

    /// Events recorded since the hold started
    pub fn held_mut(&mut self) -> Option<&mut Vec<XmlEvent>> {
        self.held.as_mut()
    }

    /// Ends the hold and passes the recorded events on
    pub fn release(&mut self) -> Result<(), AdornError> {
        if let Some(events) = self.held.take() {
            replay(&events, &mut self.inner)?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: XmlEventSink> XmlEventSink for HoldingSink<S> {
    fn start_document(&mut self) -> Result<(), AdornError> {
        match self.held.as_mut() {
            Some(held) => held.start_document(),
            None => self.inner.start_document(),
        }
    }
    fn start_element(&mut self, name: &str, attribs: &Attributes) -> Result<(), AdornError> {
        match self.held.as_mut() {
            Some(held) => held.start_element(name, attribs),
            None => self.inner.start_element(name, attribs),
        }
    }
    fn characters(&mut self, text: &str) -> Result<(), AdornError> {
        match self.held.as_mut() {
            Some(held) => held.characters(text),
            None => self.inner.characters(text),
        }
    }
    fn end_element(&mut self, name: &str) -> Result<(), AdornError> {
        match self.held.as_mut() {
            Some(held) => held.end_element(name),
            None => self.inner.end_element(name),
        }
    }
    fn end_document(&mut self) -> Result<(), AdornError> {
        self.release()?;
        self.inner.end_document()
    }
}

/// Replays recorded events into a sink
pub fn replay<S: XmlEventSink>(events: &[XmlEvent], sink: &mut S) -> Result<(), AdornError> {
    for event in events {
        match event {
            XmlEvent::StartDocument => sink.start_document()?,
            XmlEvent::Start(name, attribs) => sink.start_element(name, attribs)?,
            XmlEvent::Characters(text) => sink.characters(text)?,
            XmlEvent::End(name) => sink.end_element(name)?,
            XmlEvent::EndDocument => sink.end_document()?,
        }
    }
    Ok(())
}
