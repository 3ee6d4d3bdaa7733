//! Streaming GraphML writer

use super::{edge_id, node_id, GraphMlResult, GRAPHML_NS, SCHEMA_LOCATION, XSI_NS};
use crate::model::{MutualFriendSet, User};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Counts reported when a document is closed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphMlSummary {
    /// Node elements written, owner included
    pub nodes: usize,
    /// Edge elements written
    pub edges: usize,
    /// Edges dropped by [`GraphMlWriter::add_edges`] because an endpoint was never declared
    pub skipped_edges: usize,
}

/// Append-only GraphML document writer.
///
/// The owner node is written by [`GraphMlWriter::open`]; friend nodes must be
/// added before edges. Call [`GraphMlWriter::close`] to emit the closing tags
/// and release the sink.
pub struct GraphMlWriter<W: Write> {
    writer: Writer<W>,
    owner_id: String,
    /// Names of declared nodes, keyed by user id
    names: HashMap<String, String>,
    summary: GraphMlSummary,
}

impl GraphMlWriter<BufWriter<File>> {
    /// Create (or truncate) `path` and begin a document for `owner`
    pub fn create(path: impl AsRef<Path>, owner: &User) -> GraphMlResult<Self> {
        let file = File::create(path.as_ref())?;
        debug!("Writing GraphML to {:?}", path.as_ref());
        Self::open(owner, BufWriter::new(file))
    }
}

impl<W: Write> GraphMlWriter<W> {
    /// Begin a document on `sink` and write the owner as the first node
    pub fn open(owner: &User, sink: W) -> GraphMlResult<Self> {
        let mut writer = Writer::new_with_indent(sink, b' ', 2);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new("graphml").with_attributes([
            ("xmlns", GRAPHML_NS),
            ("xmlns:xsi", XSI_NS),
            ("xsi:schemaLocation", SCHEMA_LOCATION),
        ])))?;
        writer.write_event(Event::Empty(BytesStart::new("key").with_attributes([
            ("id", "name"),
            ("for", "node"),
            ("attr.name", "name"),
            ("attr.type", "string"),
        ])))?;
        writer.write_event(Event::Start(
            BytesStart::new("graph").with_attributes([("id", "G"), ("edgedefault", "directed")]),
        ))?;

        let mut graph = Self {
            writer,
            owner_id: owner.id.clone(),
            names: HashMap::new(),
            summary: GraphMlSummary::default(),
        };
        graph.add_node(&owner.id, &owner.name)?;
        Ok(graph)
    }

    /// Append one node; `name` is XML-escaped
    pub fn add_node(&mut self, id: &str, name: &str) -> GraphMlResult<()> {
        let node = node_id(&xml_safe(id));
        self.writer
            .write_event(Event::Start(BytesStart::new("node").with_attributes([("id", node.as_str())])))?;
        self.writer
            .write_event(Event::Start(BytesStart::new("data").with_attributes([("key", "name")])))?;
        self.writer.write_event(Event::Text(BytesText::new(&xml_safe(name))))?;
        self.writer.write_event(Event::End(BytesEnd::new("data")))?;
        self.writer.write_event(Event::End(BytesEnd::new("node")))?;

        self.names.insert(id.to_string(), name.to_string());
        self.summary.nodes += 1;
        Ok(())
    }

    /// Append a node per user, skipping ids that are already declared
    pub fn add_nodes<'a>(&mut self, users: impl IntoIterator<Item = &'a User>) -> GraphMlResult<()> {
        for user in users {
            if self.names.contains_key(&user.id) {
                debug!("Node {} already declared", user);
                continue;
            }
            self.add_node(&user.id, &user.name)?;
        }
        Ok(())
    }

    /// Append one directed edge
    pub fn add_edge(&mut self, source_id: &str, target_id: &str) -> GraphMlResult<()> {
        let (source_id, target_id) = (xml_safe(source_id), xml_safe(target_id));
        let id = edge_id(&source_id, &target_id);
        let source = node_id(&source_id);
        let target = node_id(&target_id);
        self.writer.write_event(Event::Empty(BytesStart::new("edge").with_attributes([
            ("id", id.as_str()),
            ("source", source.as_str()),
            ("target", target.as_str()),
        ])))?;
        self.summary.edges += 1;
        Ok(())
    }

    /// Append the edges of every friend, in iteration order.
    ///
    /// Each friend gets a comment with its name, an edge from the owner, then
    /// one edge per mutual friend. Endpoints that were never added as nodes
    /// are skipped so every edge resolves inside the document.
    pub fn add_edges<'a>(
        &mut self,
        friend_to_mutuals: impl IntoIterator<Item = (&'a String, &'a MutualFriendSet)>,
    ) -> GraphMlResult<()> {
        for (friend_id, mutuals) in friend_to_mutuals {
            let Some(name) = self.names.get(friend_id).cloned() else {
                debug!("Skipping edges of undeclared node {}", friend_id);
                self.summary.skipped_edges += 1 + mutuals.len();
                continue;
            };

            self.write_comment(&name)?;
            let owner_id = self.owner_id.clone();
            self.add_edge(&owner_id, friend_id)?;

            for mutual_id in mutuals {
                if self.names.contains_key(mutual_id) {
                    self.add_edge(friend_id, mutual_id)?;
                } else {
                    debug!("Skipping edge {} -> {}: target not in graph", friend_id, mutual_id);
                    self.summary.skipped_edges += 1;
                }
            }
        }
        Ok(())
    }

    /// Insert an XML comment. `--` cannot appear inside a comment, so every
    /// pair of adjacent dashes is split.
    pub fn write_comment(&mut self, text: &str) -> GraphMlResult<()> {
        let mut body = String::with_capacity(text.len() + 4);
        body.push(' ');
        for c in xml_safe(text).chars() {
            if c == '-' && body.ends_with('-') {
                body.push(' ');
            }
            body.push(c);
        }
        if body.ends_with('-') {
            body.push(' ');
        }
        body.push(' ');

        self.writer
            .write_event(Event::Comment(BytesText::from_escaped(body)))?;
        Ok(())
    }

    /// Counts so far
    pub fn summary(&self) -> GraphMlSummary {
        self.summary
    }

    /// Write the closing tags and flush, returning the sink
    pub fn finish(mut self) -> GraphMlResult<(W, GraphMlSummary)> {
        self.writer.write_event(Event::End(BytesEnd::new("graph")))?;
        self.writer.write_event(Event::End(BytesEnd::new("graphml")))?;
        self.writer.get_mut().write_all(b"\n")?;

        let mut sink = self.writer.into_inner();
        sink.flush()?;
        Ok((sink, self.summary))
    }

    /// Write the closing tags, flush and release the sink
    pub fn close(self) -> GraphMlResult<GraphMlSummary> {
        let (sink, summary) = self.finish()?;
        drop(sink);
        Ok(summary)
    }
}

/// Characters allowed by the XML 1.0 `Char` production
fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

/// `text` with every character XML cannot carry replaced by U+FFFD
fn xml_safe(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|c| if is_xml_char(c) { c } else { char::REPLACEMENT_CHARACTER })
            .collect(),
    )
}
