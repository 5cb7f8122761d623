use std::io::Write;

use crate::attributes::Attributes;
use crate::error::AdornError;
use crate::event::XmlEventSink;

/// Serializes an event stream as indented XML.
///
/// Every start tag begins a new line. An end tag gets its own line only when
/// its element contained child elements, so a word element and its text always
/// end up on a single line. Whitespace-only text containing a line break is
/// dropped, since the writer supplies its own indentation. Line breaks in
/// attribute values are written as character references.
pub struct IndentingXmlWriter<W: Write> {
    out: W,
    indent_step: usize,
    doctype: Option<(String, String)>,
    /// for every open element: whether it has child elements
    has_children: Vec<bool>,
    /// the last start tag still lacks its closing `>`
    tag_open: bool,
    /// elements never written as `<name/>`
    expanded: Vec<String>,
}

impl<W: Write> IndentingXmlWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            indent_step: 2,
            doctype: None,
            has_children: Vec::new(),
            tag_open: false,
            expanded: Vec::new(),
        }
    }

    pub fn with_indent_step(mut self, step: usize) -> Self {
        self.indent_step = step;
        self
    }

    /// Emit a `<!DOCTYPE name SYSTEM "system">` declaration
    pub fn with_doctype(mut self, name: impl Into<String>, system: impl Into<String>) -> Self {
        self.doctype = Some((name.into(), system.into()));
        self
    }

    /// Always write this element with a start and an end tag, even when empty
    pub fn with_expanded_element(mut self, name: impl Into<String>) -> Self {
        self.expanded.push(name.into());
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn close_start_tag(&mut self) -> Result<(), AdornError> {
        if self.tag_open {
            self.out.write_all(b">")?;
            self.tag_open = false;
        }
        Ok(())
    }

    fn newline_and_indent(&mut self, depth: usize) -> Result<(), AdornError> {
        write!(self.out, "\n{:width$}", "", width = depth * self.indent_step)?;
        Ok(())
    }
}

impl<W: Write> XmlEventSink for IndentingXmlWriter<W> {
    fn start_document(&mut self) -> Result<(), AdornError> {
        self.out
            .write_all(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
        if let Some((name, system)) = self.doctype.as_ref() {
            write!(
                self.out,
                "\n<!DOCTYPE {} SYSTEM \"{}\">",
                name,
                html_escape::encode_double_quoted_attribute(system)
            )?;
        }
        Ok(())
    }

    fn start_element(&mut self, name: &str, attribs: &Attributes) -> Result<(), AdornError> {
        self.close_start_tag()?;
        if let Some(parent) = self.has_children.last_mut() {
            *parent = true;
        }
        let depth = self.has_children.len();
        self.newline_and_indent(depth)?;
        write!(self.out, "<{}", name)?;
        for (key, value) in attribs.iter() {
            let value = html_escape::encode_double_quoted_attribute(value)
                .replace('\n', "&#10;")
                .replace('\r', "&#13;");
            write!(self.out, " {}=\"{}\"", key, value)?;
        }
        self.tag_open = true;
        self.has_children.push(false);
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<(), AdornError> {
        if text.is_empty() || (text.contains('\n') && text.trim().is_empty()) {
            return Ok(());
        }
        self.close_start_tag()?;
        self.out
            .write_all(html_escape::encode_text(text).as_bytes())?;
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> Result<(), AdornError> {
        let had_children = self.has_children.pop().unwrap_or(false);
        if self.tag_open && !self.expanded.iter().any(|e| e == name) {
            self.out.write_all(b"/>")?;
            self.tag_open = false;
        } else {
            self.close_start_tag()?;
            if had_children {
                let depth = self.has_children.len();
                self.newline_and_indent(depth)?;
            }
            write!(self.out, "</{}>", name)?;
        }
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), AdornError> {
        self.close_start_tag()?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}
