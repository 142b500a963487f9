//! Binary codec for persisted graph records.
//!
//! Points and layer nodes are stored as compact little-endian records:
//! length-prefixed fields, 32-bit ids and counts, 32-bit floats. Adjacency
//! lists and vectors dominate payload size, so the format favours bytes over
//! readability; the KV adapter base64-encodes these records for string-valued
//! backends.
//!
//! Each record starts with a one-byte tag so a value can be decoded without
//! an external schema.

// Record sizes are bounded well below u32::MAX by the dimension cap.
#![allow(clippy::cast_possible_truncation)]

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::point::{NeighborMap, PointId};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Record tag for an encoded point.
const TAG_POINT: u8 = 0x01;
/// Record tag for an encoded layer node.
const TAG_LAYER_NODE: u8 = 0x02;

/// Encodes a point record: tag, id, dimension, then the raw components.
#[must_use]
pub fn encode_point(id: PointId, vector: &[f32]) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + 8 + vector.len() * 4);
    buf.put_u8(TAG_POINT);
    buf.put_u32_le(id);
    buf.put_u32_le(vector.len() as u32);
    for &component in vector {
        buf.put_f32_le(component);
    }
    buf.freeze()
}

/// Decodes a point record.
///
/// # Errors
///
/// Returns [`Error::Corrupted`] when the record is truncated, carries the
/// wrong tag, or its declared dimension disagrees with the payload length.
pub fn decode_point(mut bytes: &[u8]) -> Result<(PointId, Vec<f32>)> {
    if bytes.remaining() < 9 {
        return Err(Error::Corrupted("point record truncated".to_string()));
    }
    let tag = bytes.get_u8();
    if tag != TAG_POINT {
        return Err(Error::Corrupted(format!(
            "expected point record, found tag 0x{tag:02x}"
        )));
    }
    let id = bytes.get_u32_le();
    let dimension = bytes.get_u32_le() as usize;
    if dimension > IndexConfig::MAX_DIMENSION {
        return Err(Error::Corrupted(format!(
            "point {id} declares dimension {dimension}"
        )));
    }
    if bytes.remaining() != dimension * 4 {
        return Err(Error::Corrupted(format!(
            "point {id} payload is {} bytes, dimension {dimension} needs {}",
            bytes.remaining(),
            dimension * 4
        )));
    }
    let mut vector = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        vector.push(bytes.get_f32_le());
    }
    Ok((id, vector))
}

/// Encodes a layer-node record: tag, id, layer, neighbor count, then
/// `(neighbor_id, cached_distance)` pairs.
///
/// The neighbor map is unordered; encoding order is not part of the format.
#[must_use]
pub fn encode_layer_node(id: PointId, layer: u32, neighbors: &NeighborMap) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + 12 + neighbors.len() * 8);
    buf.put_u8(TAG_LAYER_NODE);
    buf.put_u32_le(id);
    buf.put_u32_le(layer);
    buf.put_u32_le(neighbors.len() as u32);
    for (&neighbor, &distance) in neighbors {
        buf.put_u32_le(neighbor);
        buf.put_f32_le(distance);
    }
    buf.freeze()
}

/// Decodes a layer-node record.
///
/// # Errors
///
/// Returns [`Error::Corrupted`] when the record is truncated, carries the
/// wrong tag, declares a count that disagrees with the payload length, or
/// repeats a neighbor id.
pub fn decode_layer_node(mut bytes: &[u8]) -> Result<(PointId, u32, NeighborMap)> {
    if bytes.remaining() < 13 {
        return Err(Error::Corrupted("layer node record truncated".to_string()));
    }
    let tag = bytes.get_u8();
    if tag != TAG_LAYER_NODE {
        return Err(Error::Corrupted(format!(
            "expected layer node record, found tag 0x{tag:02x}"
        )));
    }
    let id = bytes.get_u32_le();
    let layer = bytes.get_u32_le();
    let count = bytes.get_u32_le() as usize;
    if bytes.remaining() != count * 8 {
        return Err(Error::Corrupted(format!(
            "layer node ({layer}, {id}) payload is {} bytes, count {count} needs {}",
            bytes.remaining(),
            count * 8
        )));
    }
    let mut neighbors = NeighborMap::default();
    neighbors.reserve(count);
    for _ in 0..count {
        let neighbor = bytes.get_u32_le();
        let distance = bytes.get_f32_le();
        if neighbors.insert(neighbor, distance).is_some() {
            return Err(Error::Corrupted(format!(
                "layer node ({layer}, {id}) repeats neighbor {neighbor}"
            )));
        }
    }
    Ok((id, layer, neighbors))
}
