//! Built-in leaf descriptors for the primitive types, installed when the
//! registry initializes.

use std::io::{self, Write};

use crate::{ReflectionError, TokenReader, TypeDescriptor};

fn encode_display<T: std::fmt::Display>(
    value: *const (),
    stream: &mut dyn io::Write,
) -> Result<(), ReflectionError> {
    let value = unsafe { &*value.cast::<T>() };
    writeln!(stream, "{}", value)?;
    Ok(())
}

fn decode_parse<T: std::str::FromStr>(
    value: *mut (),
    reader: &mut TokenReader<'_>,
) -> Result<(), ReflectionError> {
    let token = reader.read_token()?;
    let parsed = token
        .parse::<T>()
        .map_err(|_| ReflectionError::MalformedStream {
            offset: reader.token_offset(),
            reason: format!(
                "'{}' is not a valid {}",
                token,
                std::any::type_name::<T>()
            ),
        })?;
    unsafe { *value.cast::<T>() = parsed };
    Ok(())
}

// Strings are emitted as `<byte-len> <bytes>` so their content can contain
// whitespace.
fn encode_string(value: *const (), stream: &mut dyn io::Write) -> Result<(), ReflectionError> {
    let value = unsafe { &*value.cast::<String>() };
    writeln!(stream, "{} {}", value.len(), value)?;
    Ok(())
}

fn decode_string(value: *mut (), reader: &mut TokenReader<'_>) -> Result<(), ReflectionError> {
    let length = reader.read_index()?;
    // Step over the single separator byte so leading whitespace in the
    // content survives.
    reader.skip_separator()?;
    let decoded = String::from_utf8(reader.read_exact(length)?.to_vec())?;
    unsafe { *value.cast::<String>() = decoded };
    Ok(())
}

macro_rules! leaf_descriptor {
    ($type_id:ty) => {
        TypeDescriptor::of::<$type_id>(stringify!($type_id))
            .leaf_codec(encode_display::<$type_id>, decode_parse::<$type_id>)
            .build()
            .expect("built-in leaf descriptor")
    };
}

pub(crate) fn builtin_descriptors() -> Vec<TypeDescriptor> {
    vec![
        leaf_descriptor!(bool),
        leaf_descriptor!(char),
        leaf_descriptor!(u8),
        leaf_descriptor!(i8),
        leaf_descriptor!(u16),
        leaf_descriptor!(i16),
        leaf_descriptor!(u32),
        leaf_descriptor!(i32),
        leaf_descriptor!(u64),
        leaf_descriptor!(i64),
        leaf_descriptor!(usize),
        leaf_descriptor!(f32),
        leaf_descriptor!(f64),
        TypeDescriptor::of::<String>("String")
            .leaf_codec(encode_string, decode_string)
            .build()
            .expect("built-in leaf descriptor"),
    ]
}
