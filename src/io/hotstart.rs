//! Fixed-layout binary hotstart files.
//!
//! # Layout
//! A hotstart is a flat sequence of 8-byte little-endian records, one scalar
//! or one array element per record:
//!
//! 1. header: `file_format_version`, `model_flag`, `time` (f64), `time_step`,
//!    `global_nodes`, `global_elements`, `nodes`, `elements`
//! 2. node arrays (f64): `eta1`, `eta2`, `eta_disc`, `u`, `v`, then `ch1`
//!    only when `model_flag == 10`
//! 3. `node_code` (one integer per node)
//! 4. `element_off` (one integer per element)
//! 5. seventeen trailing integers, named by [`TRAILING_NAMES`]
//!
//! Integers occupy the low four bytes of their record as `i32`; the high four
//! bytes are zero. Records are addressed purely by position, so reader and
//! writer both decide on `ch1` through [`includes_wetting_coefficient`].

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshRegridError;
use crate::topology::partition::MeshPartition;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use static_assertions::const_assert_eq;
use std::io::{Read, Write};

/// Size of every record in bytes.
pub const RECORD_BYTES: usize = 8;
const_assert_eq!(RECORD_BYTES, std::mem::size_of::<f64>());
const_assert_eq!(RECORD_BYTES, 2 * std::mem::size_of::<i32>());

/// `model_flag` value that adds the wetting/drying coefficient array.
pub const WETTING_COEFFICIENT_FLAG: i32 = 10;

/// Number of header records.
pub const HEADER_RECORDS: usize = 8;

/// Output-station and global-output counters stored after the arrays.
pub const TRAILING_NAMES: [&str; 17] = [
    "iestp", "nscoue", "ivstp", "nscouv", "icstp", "nscouc", "ipstp", "iwstp", "nscoum", "igep",
    "nscouge", "igvp", "nscougv", "igcp", "nscougc", "igpp", "igwp",
];

/// Whether a record with `model_flag` carries `ch1`. Both directions ask this.
pub fn includes_wetting_coefficient(model_flag: i32) -> bool {
    model_flag == WETTING_COEFFICIENT_FLAG
}

/// Convert a node or element count to its `i32` header record.
pub fn count_record(count: usize, what: &str) -> Result<i32, MeshRegridError> {
    i32::try_from(count).map_err(|_| {
        MeshRegridError::HotstartFormat(format!("{what} count {count} does not fit a header record"))
    })
}

/// Scalar header of a hotstart record.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HotstartHeader {
    pub file_format_version: i32,
    pub model_flag: i32,
    pub time: f64,
    pub time_step: i32,
    pub global_nodes: i32,
    pub global_elements: i32,
    pub nodes: i32,
    pub elements: i32,
}

/// Simulation state of one rank (or of the whole mesh, see [`HotstartRecord::is_global`]).
#[derive(Clone, Debug, PartialEq)]
pub struct HotstartRecord {
    pub header: HotstartHeader,
    pub eta1: Vec<f64>,
    pub eta2: Vec<f64>,
    pub eta_disc: Vec<f64>,
    pub u: Vec<f64>,
    pub v: Vec<f64>,
    /// Present iff `header.model_flag == 10`.
    pub ch1: Option<Vec<f64>>,
    pub node_code: Vec<i32>,
    pub element_off: Vec<i32>,
    pub trailing: [i32; 17],
}

impl HotstartRecord {
    /// Zero-filled record sized by `header.nodes` / `header.elements`.
    pub fn zeroed(header: HotstartHeader) -> Self {
        let n = header.nodes.max(0) as usize;
        let e = header.elements.max(0) as usize;
        Self {
            header,
            eta1: vec![0.0; n],
            eta2: vec![0.0; n],
            eta_disc: vec![0.0; n],
            u: vec![0.0; n],
            v: vec![0.0; n],
            ch1: includes_wetting_coefficient(header.model_flag).then(|| vec![0.0; n]),
            node_code: vec![0; n],
            element_off: vec![0; e],
            trailing: [0; 17],
        }
    }

    /// Zero-filled record sized to the present nodes/elements of `partition`.
    pub fn sized_for(
        partition: &MeshPartition,
        global_nodes: usize,
        global_elements: usize,
        model_flag: i32,
    ) -> Result<Self, MeshRegridError> {
        Ok(Self::zeroed(HotstartHeader {
            model_flag,
            global_nodes: count_record(global_nodes, "global node")?,
            global_elements: count_record(global_elements, "global element")?,
            nodes: count_record(partition.num_present_nodes(), "node")?,
            elements: count_record(partition.num_present_elements(), "element")?,
            ..HotstartHeader::default()
        }))
    }

    pub fn node_count(&self) -> usize {
        self.header.nodes.max(0) as usize
    }

    pub fn element_count(&self) -> usize {
        self.header.elements.max(0) as usize
    }

    pub fn has_wetting_coefficient(&self) -> bool {
        includes_wetting_coefficient(self.header.model_flag)
    }

    /// True for the consolidated variant sized to the whole mesh.
    pub fn is_global(&self) -> bool {
        self.header.nodes == self.header.global_nodes
            && self.header.elements == self.header.global_elements
    }

    /// Node arrays in file order, `ch1` last when present.
    pub fn node_arrays(&self) -> Vec<(&'static str, &[f64])> {
        let mut arrays: Vec<(&'static str, &[f64])> = vec![
            ("eta1", self.eta1.as_slice()),
            ("eta2", self.eta2.as_slice()),
            ("eta_disc", self.eta_disc.as_slice()),
            ("u", self.u.as_slice()),
            ("v", self.v.as_slice()),
        ];
        if let Some(ch1) = &self.ch1 {
            arrays.push(("ch1", ch1.as_slice()));
        }
        arrays
    }

    /// Mutable node arrays in file order, `ch1` last when present.
    pub fn node_arrays_mut(&mut self) -> Vec<&mut Vec<f64>> {
        let mut arrays = vec![
            &mut self.eta1,
            &mut self.eta2,
            &mut self.eta_disc,
            &mut self.u,
            &mut self.v,
        ];
        if let Some(ch1) = self.ch1.as_mut() {
            arrays.push(ch1);
        }
        arrays
    }

    fn check_layout(&self) -> Result<(), MeshRegridError> {
        if self.header.nodes < 0 || self.header.elements < 0 {
            return Err(MeshRegridError::HotstartFormat(format!(
                "negative counts: {} nodes, {} elements",
                self.header.nodes, self.header.elements
            )));
        }
        if self.has_wetting_coefficient() != self.ch1.is_some() {
            return Err(MeshRegridError::HotstartFormat(format!(
                "model flag {} {} a wetting coefficient array",
                self.header.model_flag,
                if self.ch1.is_some() { "forbids" } else { "requires" }
            )));
        }
        let n = self.node_count();
        for (name, array) in self.node_arrays() {
            if array.len() != n {
                return Err(MeshRegridError::HotstartFormat(format!(
                    "{name} has {} values, header declares {n} nodes",
                    array.len()
                )));
            }
        }
        if self.node_code.len() != n {
            return Err(MeshRegridError::HotstartFormat(format!(
                "node_code has {} values, header declares {n} nodes",
                self.node_code.len()
            )));
        }
        if self.element_off.len() != self.element_count() {
            return Err(MeshRegridError::HotstartFormat(format!(
                "element_off has {} values, header declares {} elements",
                self.element_off.len(),
                self.element_count()
            )));
        }
        Ok(())
    }
}

impl DebugInvariants for HotstartRecord {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "HotstartRecord");
    }

    fn validate_invariants(&self) -> Result<(), MeshRegridError> {
        self.check_layout()
    }
}

/// Positional reader over 8-byte records.
struct RecordCursor<'a> {
    buf: &'a [u8],
    index: usize,
}

impl<'a> RecordCursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, index: 0 }
    }

    fn next_record(&mut self, what: &str) -> Result<&'a [u8], MeshRegridError> {
        if self.buf.remaining() < RECORD_BYTES {
            return Err(MeshRegridError::HotstartFormat(format!(
                "truncated at record {} ({what})",
                self.index + 1
            )));
        }
        let (record, rest) = self.buf.split_at(RECORD_BYTES);
        self.buf = rest;
        self.index += 1;
        Ok(record)
    }

    fn next_i32(&mut self, what: &str) -> Result<i32, MeshRegridError> {
        let mut record = self.next_record(what)?;
        Ok(record.get_i32_le())
    }

    fn next_f64(&mut self, what: &str) -> Result<f64, MeshRegridError> {
        let mut record = self.next_record(what)?;
        Ok(record.get_f64_le())
    }

    fn next_f64s(&mut self, n: usize, what: &str) -> Result<Vec<f64>, MeshRegridError> {
        (0..n).map(|_| self.next_f64(what)).collect()
    }

    fn next_i32s(&mut self, n: usize, what: &str) -> Result<Vec<i32>, MeshRegridError> {
        (0..n).map(|_| self.next_i32(what)).collect()
    }
}

fn put_i32_record(buf: &mut BytesMut, value: i32) {
    buf.put_i32_le(value);
    buf.put_u32_le(0);
}

/// Reader/writer for [`HotstartRecord`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct HotstartCodec;

impl HotstartCodec {
    /// Number of records a file for `record` occupies.
    pub fn record_count(record: &HotstartRecord) -> usize {
        let arrays = if record.has_wetting_coefficient() { 6 } else { 5 };
        HEADER_RECORDS
            + arrays * record.node_count()
            + record.node_count()
            + record.element_count()
            + TRAILING_NAMES.len()
    }

    /// Encode `record` into its binary image.
    pub fn encode(record: &HotstartRecord) -> Result<Bytes, MeshRegridError> {
        record.check_layout()?;
        let mut buf = BytesMut::with_capacity(Self::record_count(record) * RECORD_BYTES);
        let h = &record.header;
        put_i32_record(&mut buf, h.file_format_version);
        put_i32_record(&mut buf, h.model_flag);
        buf.put_f64_le(h.time);
        for value in [
            h.time_step,
            h.global_nodes,
            h.global_elements,
            h.nodes,
            h.elements,
        ] {
            put_i32_record(&mut buf, value);
        }
        for (_, array) in record.node_arrays() {
            for &value in array {
                buf.put_f64_le(value);
            }
        }
        for &code in record.node_code.iter().chain(&record.element_off) {
            put_i32_record(&mut buf, code);
        }
        for &value in &record.trailing {
            put_i32_record(&mut buf, value);
        }
        Ok(buf.freeze())
    }

    /// Decode a binary image, expecting `nodes` nodes and `elements` elements.
    pub fn decode(
        bytes: &[u8],
        nodes: usize,
        elements: usize,
    ) -> Result<HotstartRecord, MeshRegridError> {
        let mut cur = RecordCursor::new(bytes);
        let header = HotstartHeader {
            file_format_version: cur.next_i32("file_format_version")?,
            model_flag: cur.next_i32("model_flag")?,
            time: cur.next_f64("time")?,
            time_step: cur.next_i32("time_step")?,
            global_nodes: cur.next_i32("global_nodes")?,
            global_elements: cur.next_i32("global_elements")?,
            nodes: cur.next_i32("nodes")?,
            elements: cur.next_i32("elements")?,
        };
        if i32::try_from(nodes).ok() != Some(header.nodes)
            || i32::try_from(elements).ok() != Some(header.elements)
        {
            return Err(MeshRegridError::HotstartFormat(format!(
                "file declares {} nodes / {} elements, expected {nodes} / {elements}",
                header.nodes, header.elements
            )));
        }

        let eta1 = cur.next_f64s(nodes, "eta1")?;
        let eta2 = cur.next_f64s(nodes, "eta2")?;
        let eta_disc = cur.next_f64s(nodes, "eta_disc")?;
        let u = cur.next_f64s(nodes, "u")?;
        let v = cur.next_f64s(nodes, "v")?;
        let ch1 = if includes_wetting_coefficient(header.model_flag) {
            Some(cur.next_f64s(nodes, "ch1")?)
        } else {
            None
        };
        let node_code = cur.next_i32s(nodes, "node_code")?;
        let element_off = cur.next_i32s(elements, "element_off")?;
        let mut trailing = [0i32; 17];
        for (slot, name) in trailing.iter_mut().zip(TRAILING_NAMES) {
            *slot = cur.next_i32(name)?;
        }
        if cur.buf.has_remaining() {
            return Err(MeshRegridError::HotstartFormat(format!(
                "{} unexpected bytes after record {}",
                cur.buf.remaining(),
                cur.index
            )));
        }

        Ok(HotstartRecord {
            header,
            eta1,
            eta2,
            eta_disc,
            u,
            v,
            ch1,
            node_code,
            element_off,
            trailing,
        })
    }

    /// Read a hotstart from `reader`.
    pub fn read<R: Read>(
        mut reader: R,
        nodes: usize,
        elements: usize,
    ) -> Result<HotstartRecord, MeshRegridError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::decode(&bytes, nodes, elements)
    }

    /// Write `record` to `writer`.
    pub fn write<W: Write>(record: &HotstartRecord, mut writer: W) -> Result<(), MeshRegridError> {
        writer.write_all(&Self::encode(record)?)?;
        writer.flush()?;
        Ok(())
    }

    /// Human-readable dump in binary order. For debugging only; never read back.
    pub fn write_text<W: Write>(
        record: &HotstartRecord,
        mut writer: W,
    ) -> Result<(), MeshRegridError> {
        record.check_layout()?;
        let h = &record.header;
        writeln!(writer, "file_format_version = {}", h.file_format_version)?;
        writeln!(writer, "model_flag = {}", h.model_flag)?;
        writeln!(writer, "time = {}", h.time)?;
        writeln!(writer, "time_step = {}", h.time_step)?;
        writeln!(writer, "global_nodes = {}", h.global_nodes)?;
        writeln!(writer, "global_elements = {}", h.global_elements)?;
        writeln!(writer, "nodes = {}", h.nodes)?;
        writeln!(writer, "elements = {}", h.elements)?;
        for (name, array) in record.node_arrays() {
            for (i, value) in array.iter().enumerate() {
                writeln!(writer, "{name}[{i}] = {value}")?;
            }
        }
        for (i, code) in record.node_code.iter().enumerate() {
            writeln!(writer, "node_code[{i}] = {code}")?;
        }
        for (i, off) in record.element_off.iter().enumerate() {
            writeln!(writer, "element_off[{i}] = {off}")?;
        }
        for (name, value) in TRAILING_NAMES.iter().zip(&record.trailing) {
            writeln!(writer, "{name} = {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(model_flag: i32) -> HotstartRecord {
        let mut rec = HotstartRecord::zeroed(HotstartHeader {
            file_format_version: 0x0500_01,
            model_flag,
            time: 3600.25,
            time_step: 720,
            global_nodes: 3,
            global_elements: 1,
            nodes: 3,
            elements: 1,
        });
        rec.eta1 = vec![0.1, -0.2, 0.3];
        rec.v = vec![f64::MIN_POSITIVE, -0.0, 1e300];
        rec.node_code = vec![1, 0, 1];
        rec.element_off = vec![1];
        rec.trailing[16] = -7;
        rec
    }

    #[test]
    fn record_count_matches_encoding() {
        for flag in [0, WETTING_COEFFICIENT_FLAG] {
            let rec = sample(flag);
            let bytes = HotstartCodec::encode(&rec).unwrap();
            assert_eq!(bytes.len(), HotstartCodec::record_count(&rec) * RECORD_BYTES);
        }
        assert_eq!(HotstartCodec::record_count(&sample(0)), 8 + 15 + 3 + 1 + 17);
    }

    #[test]
    fn integers_are_padded_low_word_first() {
        let bytes = HotstartCodec::encode(&sample(0)).unwrap();
        assert_eq!(&bytes[..8], &[0x01, 0x00, 0x05, 0x00, 0, 0, 0, 0]);
    }

    #[test]
    fn flag_and_array_must_agree_on_write() {
        let mut rec = sample(0);
        rec.ch1 = Some(vec![0.0; 3]);
        assert!(matches!(
            HotstartCodec::encode(&rec),
            Err(MeshRegridError::HotstartFormat(_))
        ));
        let mut rec = sample(WETTING_COEFFICIENT_FLAG);
        rec.ch1 = None;
        assert!(HotstartCodec::encode(&rec).is_err());
    }

    #[test]
    fn wrong_expected_counts_are_rejected() {
        let bytes = HotstartCodec::encode(&sample(0)).unwrap();
        assert!(matches!(
            HotstartCodec::decode(&bytes, 4, 1),
            Err(MeshRegridError::HotstartFormat(_))
        ));
    }

    #[test]
    fn expected_counts_beyond_i32_never_wrap() {
        let bytes = HotstartCodec::encode(&sample(0)).unwrap();
        // 2^32 + 3 would wrap to 3 nodes
        let wrapped = (1usize << 32) + 3;
        assert!(matches!(
            HotstartCodec::decode(&bytes, wrapped, 1),
            Err(MeshRegridError::HotstartFormat(_))
        ));
        assert!(matches!(
            HotstartCodec::decode(&bytes, 3, (1usize << 32) + 1),
            Err(MeshRegridError::HotstartFormat(_))
        ));
        assert!(count_record(i32::MAX as usize + 1, "node").is_err());
        assert_eq!(count_record(42, "node").unwrap(), 42);
    }

    #[test]
    fn truncation_and_trailing_garbage() {
        let bytes = HotstartCodec::encode(&sample(0)).unwrap();
        let err = HotstartCodec::decode(&bytes[..bytes.len() - 8], 3, 1).unwrap_err();
        assert!(matches!(err, MeshRegridError::HotstartFormat(m) if m.contains("igwp")));
        let mut long = bytes.to_vec();
        long.extend_from_slice(&[0u8; 8]);
        assert!(HotstartCodec::decode(&long, 3, 1).is_err());
    }

    #[test]
    fn text_dump_follows_binary_order() {
        let mut out = Vec::new();
        HotstartCodec::write_text(&sample(WETTING_COEFFICIENT_FLAG), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), HotstartCodec::record_count(&sample(10)));
        assert_eq!(lines[0], "file_format_version = 327681");
        assert_eq!(lines[8], "eta1[0] = 0.1");
        assert!(text.contains("ch1[2] = 0"));
        assert_eq!(*lines.last().unwrap(), "igwp = -7");
    }

    #[test]
    fn global_variant_detection() {
        let mut rec = sample(0);
        assert!(rec.is_global());
        rec.header.global_nodes = 10;
        assert!(!rec.is_global());
    }
}
