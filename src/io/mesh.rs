//! Per-partition mesh tables and partition catalog files.
//!
//! # Mesh table format (ASCII)
//! ```text
//! <title line>
//! NE NP
//! id x y depth            (NP node records, id signed)
//! id 3 n1 n2 n3           (NE element records, id signed)
//! ```
//! Node ids are global ids; a negative sign marks a halo copy. Element
//! corners are **1-based positions in this table's node list**, not global
//! ids. [`MeshPartition`](crate::topology::partition::MeshPartition) stores
//! them 0-based.
//!
//! # Catalog format
//! One 1-based rank label per global node, whitespace separated.

use crate::mesh_error::MeshRegridError;
use crate::topology::catalog::PartitionCatalog;
use itertools::Itertools;
use std::io::{BufRead, Read, Write};

/// One node record as read from a mesh table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeRecord {
    /// Global id carrying the upstream ownership sign.
    pub signed_id: i64,
    pub x: f64,
    pub y: f64,
    /// Scalar attribute (bathymetric depth).
    pub depth: f64,
}

/// One triangle record as read from a mesh table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementRecord {
    pub signed_id: i64,
    /// 1-based positions into the node list.
    pub corners: [u32; 3],
}

/// Raw contents of one rank's mesh table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PresentMeshTable {
    pub title: String,
    pub nodes: Vec<NodeRecord>,
    pub elements: Vec<ElementRecord>,
}

// Header counts are untrusted until the records are read.
const MAX_PREALLOCATED_RECORDS: usize = 1 << 16;

fn malformed(msg: impl Into<String>) -> MeshRegridError {
    MeshRegridError::MalformedMeshFile(msg.into())
}

/// Strip the ownership sign from a record id, rejecting ids outside `1..=u32::MAX`.
pub fn unsigned_global_id(signed_id: i64) -> Result<u32, MeshRegridError> {
    match u32::try_from(signed_id.unsigned_abs()) {
        Ok(id) if id != 0 => Ok(id),
        _ => Err(malformed(format!("id {signed_id} is not a valid global id"))),
    }
}

fn parse_field<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, MeshRegridError> {
    raw.parse::<T>()
        .map_err(|_| malformed(format!("invalid {what}: {raw}")))
}

impl PresentMeshTable {
    /// Node global ids with the sign removed, in table order.
    pub fn node_global_ids(&self) -> Result<Vec<u32>, MeshRegridError> {
        self.nodes
            .iter()
            .map(|n| unsigned_global_id(n.signed_id))
            .collect()
    }

    /// Element global ids with the sign removed, in table order.
    pub fn element_global_ids(&self) -> Result<Vec<u32>, MeshRegridError> {
        self.elements
            .iter()
            .map(|e| unsigned_global_id(e.signed_id))
            .collect()
    }

    /// Parse a mesh table.
    pub fn read<R: BufRead>(reader: R) -> Result<Self, MeshRegridError> {
        let mut lines = reader.lines();
        let mut next_line = |what: &str| -> Result<String, MeshRegridError> {
            match lines.next() {
                Some(line) => Ok(line?),
                None => Err(malformed(format!("unexpected end of table: missing {what}"))),
            }
        };

        let title = next_line("title")?.trim().to_string();
        let counts = next_line("element/node counts")?;
        let (ne, np) = counts
            .split_whitespace()
            .take(2)
            .collect_tuple()
            .ok_or_else(|| malformed(format!("invalid count line: {counts}")))?;
        let ne: usize = parse_field(ne, "element count")?;
        let np: usize = parse_field(np, "node count")?;

        let mut nodes = Vec::with_capacity(np.min(MAX_PREALLOCATED_RECORDS));
        for _ in 0..np {
            let line = next_line("node record")?;
            let (id, x, y, depth) = line
                .split_whitespace()
                .take(4)
                .collect_tuple()
                .ok_or_else(|| malformed(format!("short node record: {line}")))?;
            let signed_id: i64 = parse_field(id, "node id")?;
            unsigned_global_id(signed_id)?;
            nodes.push(NodeRecord {
                signed_id,
                x: parse_field(x, "x coordinate")?,
                y: parse_field(y, "y coordinate")?,
                depth: parse_field(depth, "depth")?,
            });
        }

        let mut elements = Vec::with_capacity(ne.min(MAX_PREALLOCATED_RECORDS));
        for _ in 0..ne {
            let line = next_line("element record")?;
            let (id, kind, a, b, c) = line
                .split_whitespace()
                .take(5)
                .collect_tuple()
                .ok_or_else(|| malformed(format!("short element record: {line}")))?;
            let signed_id: i64 = parse_field(id, "element id")?;
            unsigned_global_id(signed_id)?;
            let kind: u32 = parse_field(kind, "element node count")?;
            if kind != 3 {
                return Err(malformed(format!(
                    "element {signed_id} has {kind} nodes; only triangles are supported"
                )));
            }
            elements.push(ElementRecord {
                signed_id,
                corners: [
                    parse_field(a, "element corner")?,
                    parse_field(b, "element corner")?,
                    parse_field(c, "element corner")?,
                ],
            });
        }

        Ok(Self {
            title,
            nodes,
            elements,
        })
    }

    /// Write the table in the format accepted by [`PresentMeshTable::read`].
    pub fn write<W: Write>(&self, mut writer: W) -> Result<(), MeshRegridError> {
        writeln!(writer, "{}", self.title)?;
        writeln!(writer, "{} {}", self.elements.len(), self.nodes.len())?;
        for n in &self.nodes {
            writeln!(writer, "{} {:e} {:e} {:e}", n.signed_id, n.x, n.y, n.depth)?;
        }
        for e in &self.elements {
            let [a, b, c] = e.corners;
            writeln!(writer, "{} 3 {a} {b} {c}", e.signed_id)?;
        }
        Ok(())
    }
}

/// Read a partition catalog holding exactly `global_nodes` 1-based labels.
pub fn read_catalog<R: Read>(
    mut reader: R,
    global_nodes: usize,
) -> Result<PartitionCatalog, MeshRegridError> {
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;
    let labels = contents
        .split_whitespace()
        .map(|raw| {
            raw.parse::<u32>().map_err(|_| {
                MeshRegridError::MalformedPartitionFile(format!("invalid rank label: {raw}"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    PartitionCatalog::from_one_based(&labels, global_nodes)
}

/// Write a catalog as one 1-based label per line.
pub fn write_catalog<W: Write>(
    catalog: &PartitionCatalog,
    mut writer: W,
) -> Result<(), MeshRegridError> {
    for id in 1..=catalog.global_node_count() as u32 {
        writeln!(writer, "{}", catalog.owner_of(id)? + 1)?;
    }
    Ok(())
}
