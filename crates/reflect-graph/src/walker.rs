//! The recursive encoder/decoder driven by [`TypeDescriptor`]: walks a
//! type's parent chain and members, emitting and re-reading the textual
//! record grammar.

use std::io::{self, Write};

use crate::{
    stream::pad_stream, PointerTable, ReflectedValue, ReflectionError, TokenReader,
    TypeDescriptor,
};

impl TypeDescriptor {
    /// Serialize `value` to the stream.
    ///
    /// A parent's members are emitted before the type's own, as a complete
    /// record of their own under the same table index. Pointer members are
    /// written as bare table indices; array members as one indented element
    /// record per element; everything else inline. In array context the
    /// element records carry no table index.
    pub fn encode(
        &self,
        value: &ReflectedValue,
        stream: &mut dyn io::Write,
        table: &PointerTable,
        padding: usize,
        in_array: bool,
    ) -> Result<(), ReflectionError> {
        if let Some(parent) = self.parent() {
            parent.encode(value, stream, table, padding, in_array)?;
        }

        // A type with a codec knows how to serialize itself, let it.
        if let Some(codec) = self.leaf_codec() {
            return unsafe { (codec.encode)(value.address(), stream) };
        }

        if !in_array {
            write!(stream, "{} ", table.index_of(value)?)?;
        }
        writeln!(stream, "{}", self.name())?;

        pad_stream(stream, padding)?;
        writeln!(stream, "[")?;

        // The instance data could be the target of a null pointer.
        if value.is_null() {
            pad_stream(stream, padding + 1)?;
            writeln!(stream, "null")?;
            pad_stream(stream, padding)?;
            writeln!(stream, "]")?;
            return Ok(());
        }

        for member in self.members() {
            pad_stream(stream, padding + 1)?;
            let element = member.element()?;
            if member.is_pointer() {
                let target = value.pointer_target(member, element);
                writeln!(stream, "{} {}", member.name(), table.index_of(&target)?)?;
            } else if member.is_array()? {
                writeln!(stream, "{}", member.name())?;
                for index in 0..member.element_count()? {
                    pad_stream(stream, padding + 2)?;
                    let element_value = value.member_element(member, element, index);
                    element.encode(&element_value, stream, table, padding + 2, true)?;
                }
            } else {
                write!(stream, "{} ", member.name())?;
                let member_value = value.member_at(member, element);
                element.encode(&member_value, stream, table, padding + 1, false)?;
            }
        }

        pad_stream(stream, padding)?;
        writeln!(stream, "]")?;
        Ok(())
    }

    /// Deserialize into `value` from the stream, mirroring [`Self::encode`].
    ///
    /// Pointer members are not resolved here; each one records a patch that
    /// the table applies after every record has been loaded. A frame that
    /// read a table index publishes the decoded instance into the table once
    /// its block is complete.
    pub fn decode(
        &self,
        value: &mut ReflectedValue,
        reader: &mut TokenReader<'_>,
        table: &mut PointerTable,
        in_array: bool,
    ) -> Result<(), ReflectionError> {
        if let Some(parent) = self.parent() {
            parent.decode(value, reader, table, in_array)?;
        }

        if let Some(codec) = self.leaf_codec() {
            return unsafe { (codec.decode)(value.address_mut(), reader) };
        }

        let mut table_index = None;
        if !in_array {
            let index = reader.read_index()?;
            table.check_index(index)?;
            table_index = Some(index);
        }

        let name = reader.read_token()?;
        if name != self.name() {
            return Err(ReflectionError::MalformedStream {
                offset: reader.token_offset(),
                reason: format!("expected type '{}', found '{}'", self.name(), name),
            });
        }

        let bracket = reader.read_token()?;
        if bracket != "[" {
            return Err(ReflectionError::MalformedStream {
                offset: reader.token_offset(),
                reason: format!("expected '[', found '{}'", bracket),
            });
        }

        loop {
            let token = reader.read_token()?;
            if token == "]" {
                break;
            }

            // A null record has no members to read; this instance has no
            // data.
            if token == "null" {
                value.set_null();
                let closing = reader.read_token()?;
                if closing != "]" {
                    return Err(ReflectionError::MalformedStream {
                        offset: reader.token_offset(),
                        reason: format!("expected ']' after 'null', found '{}'", closing),
                    });
                }
                break;
            }

            let member = self.member(token).ok_or_else(|| {
                ReflectionError::MalformedStream {
                    offset: reader.token_offset(),
                    reason: format!("unknown member '{}' on type '{}'", token, self.name()),
                }
            })?;
            let element = member.element()?;

            if member.is_pointer() {
                let target_index = reader.read_index()?;
                table.check_index(target_index)?;
                // Defer resolving the pointer until the whole table is
                // loaded.
                let destination = value.member_at(member, element);
                table.add_patch_pointer(target_index, destination);
            } else if member.is_array()? {
                for index in 0..member.element_count()? {
                    let mut element_value = value.member_element(member, element, index);
                    element.decode(&mut element_value, reader, table, true)?;
                }
            } else {
                let mut member_value = value.member_at(member, element);
                element.decode(&mut member_value, reader, table, false)?;
            }
        }

        // The root of the parent chain publishes the instance; frames for
        // array elements never carried an index.
        if self.parent().is_none() {
            if let Some(index) = table_index {
                table.publish(index, *value);
            }
        }

        Ok(())
    }
}
