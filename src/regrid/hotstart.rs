//! Carrying a hotstart from one mesh resolution to another.
//!
//! Scalars are copied, node arrays are stitched through the engine and
//! completed on halo nodes from their owners, wet/dry codes are regridded as
//! fractions and thresholded, and element "off" flags are recomputed from the
//! new wet/dry codes.

use crate::algs::communicator::Communicator;
use crate::algs::consolidate::{Consolidator, PresentNodeSource};
use crate::config::RegridConfig;
use crate::debug_invariants::DebugInvariants;
use crate::io::hotstart::{HotstartHeader, HotstartRecord, count_record};
use crate::mesh_error::MeshRegridError;
use crate::regrid::RegridOperator;
use crate::regrid::engine::DualPathRegridEngine;

const WET: i32 = 1;
const DRY: i32 = 0;

/// Collective: regrid `source` onto the engine's destination partition.
///
/// `consolidator` must be built over the destination catalog. Every rank
/// calls this with records carrying the same `model_flag`, so all ranks run
/// the same number of collectives.
pub fn regrid_hotstart<P, F, C, S>(
    engine: &mut DualPathRegridEngine<'_, P, F>,
    consolidator: &Consolidator<'_, C, S>,
    source: &HotstartRecord,
    destination_global_elements: usize,
    config: &RegridConfig,
) -> Result<HotstartRecord, MeshRegridError>
where
    P: RegridOperator,
    F: RegridOperator,
    C: Communicator,
    S: PresentNodeSource,
{
    let src_partition = engine.source();
    let dst = engine.destination();
    if source.node_count() != src_partition.num_present_nodes() {
        return Err(MeshRegridError::FieldLengthMismatch {
            expected: src_partition.num_present_nodes(),
            found: source.node_count(),
        });
    }

    let header = HotstartHeader {
        global_nodes: count_record(consolidator.global_node_count(), "global node")?,
        global_elements: count_record(destination_global_elements, "global element")?,
        nodes: count_record(dst.num_present_nodes(), "node")?,
        elements: count_record(dst.num_present_elements(), "element")?,
        ..source.header
    };
    let mut out = HotstartRecord::zeroed(header);
    out.trailing = source.trailing;

    for ((_, src_array), dst_array) in source.node_arrays().into_iter().zip(out.node_arrays_mut())
    {
        let owned = engine.stitch_present(src_array)?;
        *dst_array = consolidator.gather_to_present(dst, &owned)?;
    }

    let wet_fraction: Vec<f64> = source.node_code.iter().map(|&c| f64::from(c)).collect();
    let owned_codes: Vec<i32> = engine
        .stitch_present(&wet_fraction)?
        .into_iter()
        .map(|f| if f >= config.wet_threshold { WET } else { DRY })
        .collect();
    out.node_code = consolidator.gather_to_present(dst, &owned_codes)?;

    out.element_off = dst
        .element_connectivity()
        .iter()
        .map(|tri| {
            if tri.iter().all(|&n| out.node_code[n as usize] == WET) {
                WET
            } else {
                DRY
            }
        })
        .collect();

    crate::debug_invariants!(out.validate_invariants(), "regrid_hotstart");
    Ok(out)
}
