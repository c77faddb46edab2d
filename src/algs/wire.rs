//! Little-endian wire helpers for collective payloads.
//!
//! Field values travel as plain `Pod` slices; the only framing is the
//! expected byte length, which the receiver already knows from the catalog.

use crate::mesh_error::MeshRegridError;
use bytemuck::Pod;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

/// Decode a received byte buffer into `out`, which must match it exactly.
///
/// Goes through `copy_from_slice` on the byte view of `out` so the incoming
/// `Vec<u8>` need not be aligned for `T`.
pub fn decode_into<T: Pod>(
    bytes: &[u8],
    out: &mut [T],
    peer: usize,
) -> Result<(), MeshRegridError> {
    let dst = cast_slice_mut(out);
    expect_exact_len(bytes.len(), dst.len(), peer)?;
    dst.copy_from_slice(bytes);
    Ok(())
}

pub fn expect_exact_len(
    actual: usize,
    expected: usize,
    peer: usize,
) -> Result<(), MeshRegridError> {
    if actual == expected {
        Ok(())
    } else {
        Err(MeshRegridError::CommError {
            neighbor: peer,
            source: format!("expected {expected} bytes, got {actual}").into(),
        })
    }
}
