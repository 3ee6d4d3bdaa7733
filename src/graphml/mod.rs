//! GraphML serialization
//!
//! Streams a directed friend graph to any [`std::io::Write`] sink:
//! header, owner node, friend nodes, edges, closing tags. Nothing is
//! rewritten once emitted, so the whole document never sits in memory.
//!
//! GraphML specification: <http://graphml.graphdrawing.org/>

pub mod writer;

pub use writer::{GraphMlSummary, GraphMlWriter};

use thiserror::Error;

/// GraphML namespace
pub const GRAPHML_NS: &str = "http://graphml.graphdrawing.org/xmlns";

/// XML Schema instance namespace
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// `xsi:schemaLocation` value for GraphML 1.0
pub const SCHEMA_LOCATION: &str =
    "http://graphml.graphdrawing.org/xmlns http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd";

/// Prefix applied to every node id so node and edge ids never collide
pub const NODE_PREFIX: &str = "friend";

/// Prefix applied to every edge id
pub const EDGE_PREFIX: &str = "edge";

/// GraphML errors
#[derive(Error, Debug)]
pub enum GraphMlError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML writer error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

pub type GraphMlResult<T> = Result<T, GraphMlError>;

/// Node id used in the document for a user id
pub fn node_id(user_id: &str) -> String {
    format!("{}{}", NODE_PREFIX, user_id)
}

/// Edge id used in the document for an ordered pair
pub fn edge_id(source_id: &str, target_id: &str) -> String {
    format!("{}{}->{}", EDGE_PREFIX, source_id, target_id)
}
