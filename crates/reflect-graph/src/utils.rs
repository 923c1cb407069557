use std::io;

use crate::{DecodedGraph, PointerTable, ReflectedValue, ReflectionError, TokenReader};

/// Serialize the full graph reachable from `value` to the stream.
///
/// The stream is borrowed; the core never closes it.
pub fn serialize(
    value: &ReflectedValue,
    stream: &mut dyn io::Write,
) -> Result<(), ReflectionError> {
    // Discover every object referenceable from this value first; the table
    // is then used to resolve pointers into indices while serializing.
    let mut table = PointerTable::new();
    table.populate(*value, true)?;
    table.emit(stream)
}

/// Serialize the full graph reachable from `value` into a string.
pub fn serialize_to_string(value: &ReflectedValue) -> Result<String, ReflectionError> {
    let mut buffer = Vec::new();
    serialize(value, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Reconstruct an object graph from its serialized form.
///
/// The returned [`DecodedGraph`] owns the fresh instances; its root is the
/// value recorded at table index 0.
pub fn deserialize(input: &[u8]) -> Result<DecodedGraph, ReflectionError> {
    let mut reader = TokenReader::new(input);
    let mut table = PointerTable::new();
    table.load(&mut reader)?;
    table.into_graph()
}
