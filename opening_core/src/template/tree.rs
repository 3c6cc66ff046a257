//! Lossless XML tree.
//!
//! Nodes keep the raw quick-xml events they were read from, so writing the
//! tree back reproduces untouched markup exactly: attribute order and
//! quoting, self-closing tags, whitespace, comments, entity escapes.

use std::borrow::Cow;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// A node in document order
#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    /// Character data, still escaped as in the source
    Text(BytesText<'static>),
    /// Declaration, comment, CDATA, processing instruction or doctype
    Other(Event<'static>),
}

/// An element and its children
#[derive(Debug, Clone)]
pub struct Element {
    name: String,
    start: BytesStart<'static>,
    /// `None` for a self-closing tag that has not been given content
    end: Option<BytesEnd<'static>>,
    children: Vec<Node>,
}

impl Element {
    fn open(start: BytesStart<'static>) -> Self {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        Element {
            name,
            start,
            end: None,
            children: Vec::new(),
        }
    }

    /// Tag name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Child nodes
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Child elements with the given tag name, in order
    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter_map(move |node| match node {
            Node::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    /// The `index`-th child element with the given tag name
    pub fn nth_element(&self, name: &str, index: usize) -> Option<&Element> {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Element(el) if el.name == name => Some(el),
                _ => None,
            })
            .nth(index)
    }

    /// Mutable variant of [`Element::nth_element`]
    pub fn nth_element_mut(&mut self, name: &str, index: usize) -> Option<&mut Element> {
        self.children
            .iter_mut()
            .filter_map(|node| match node {
                Node::Element(el) if el.name == name => Some(el),
                _ => None,
            })
            .nth(index)
    }

    /// Number of child elements with the given tag name
    pub fn count_elements(&self, name: &str) -> usize {
        self.elements_named(name).count()
    }

    /// Unescaped text content of the direct text and CDATA children
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            match node {
                Node::Text(t) => match t.unescape() {
                    Ok(s) => text.push_str(&s),
                    Err(_) => text.push_str(&String::from_utf8_lossy(t)),
                },
                Node::Other(Event::CData(c)) => text.push_str(&String::from_utf8_lossy(c)),
                _ => {}
            }
        }
        text
    }

    /// Replace all children with a single text node
    pub fn set_text(&mut self, value: &str) {
        self.children = vec![Node::Text(BytesText::new(value).into_owned())];
        if self.end.is_none() {
            self.end = Some(BytesEnd::new(Cow::Owned(self.name.clone())));
        }
    }

    /// Remove the `index`-th child element named `name`, together with the
    /// whitespace-only text directly before it. Returns false if absent.
    pub fn remove_element(&mut self, name: &str, index: usize) -> bool {
        let position = self
            .children
            .iter()
            .enumerate()
            .filter(|(_, node)| matches!(node, Node::Element(el) if el.name == name))
            .map(|(pos, _)| pos)
            .nth(index);

        let Some(position) = position else {
            return false;
        };
        self.children.remove(position);
        if position > 0 && is_blank_text(&self.children[position - 1]) {
            self.children.remove(position - 1);
        }
        true
    }
}

fn is_blank_text(node: &Node) -> bool {
    match node {
        Node::Text(t) => t.iter().all(u8::is_ascii_whitespace),
        _ => false,
    }
}

/// Parse a document into its top-level nodes.
///
/// Fails on malformed markup, mismatched closing tags, or unclosed elements.
pub fn parse(xml: &str) -> Result<Vec<Node>, String> {
    let mut reader = Reader::from_str(xml);
    let mut open: Vec<Element> = Vec::new();
    let mut top: Vec<Node> = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("{} (at byte {})", e, reader.buffer_position()))?;

        let node = match event {
            Event::Start(start) => {
                open.push(Element::open(start.into_owned()));
                continue;
            }
            Event::End(end) => {
                let mut element = open
                    .pop()
                    .ok_or_else(|| "closing tag without matching opening tag".to_string())?;
                element.end = Some(end.into_owned());
                Node::Element(element)
            }
            Event::Empty(start) => Node::Element(Element::open(start.into_owned())),
            Event::Text(text) => Node::Text(text.into_owned()),
            Event::Eof => break,
            other => Node::Other(other.into_owned()),
        };

        match open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => top.push(node),
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(format!("element <{}> is never closed", unclosed.name));
    }
    Ok(top)
}

/// Write nodes back to bytes
pub fn write(nodes: &[Node]) -> Result<Vec<u8>, String> {
    let mut writer = Writer::new(Vec::new());
    for node in nodes {
        write_node(&mut writer, node)?;
    }
    Ok(writer.into_inner())
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<(), String> {
    match node {
        Node::Element(el) => match &el.end {
            None if el.children.is_empty() => emit(writer, Event::Empty(el.start.clone())),
            end => {
                emit(writer, Event::Start(el.start.clone()))?;
                for child in &el.children {
                    write_node(writer, child)?;
                }
                let end = end
                    .clone()
                    .unwrap_or_else(|| BytesEnd::new(Cow::Owned(el.name.clone())));
                emit(writer, Event::End(end))
            }
        },
        Node::Text(t) => emit(writer, Event::Text(t.clone())),
        Node::Other(event) => emit(writer, event.clone()),
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), String> {
    writer.write_event(event).map_err(|e| e.to_string())
}
