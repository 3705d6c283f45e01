//! Error kinds for the routing core, collected behind one composite type so that
//! callers never have to match on more than one enum at the façade boundary.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read document: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse OSM document: {0}")]
    Parse(#[from] ParseError),

    #[error("no drivable node found near the requested position")]
    NoSnap,

    #[error("query issued before any document was loaded")]
    NotLoaded,

    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

/// Malformed-input errors specific to the OSM XML loader.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("XML syntax error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("document has no <osm> root element")]
    MissingRoot,

    #[error("<tag> element is missing its `{0}` attribute")]
    MissingTagAttribute(&'static str),

    #[error("<node> element has a non-numeric lat/lon")]
    InvalidCoordinate,

    #[error("<node> element has a missing or malformed `id` attribute")]
    InvalidNodeId,

    #[error("<way> references unknown node id {0}")]
    UnknownNodeRef(i64),
}
