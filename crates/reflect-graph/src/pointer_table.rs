//! The table of every object reachable from a root value. Discovery assigns
//! each distinct object a stable index; emission writes the owning records
//! in index order; loading rebuilds the instances and patches pointers once
//! every record exists.

use std::collections::HashMap;
use std::io::{self, Write};

use crate::{ReflectedValue, ReflectionError, TokenReader, TypeDescriptor, TypeRegistry};

struct TableEntry {
    value: Option<ReflectedValue>,
    owns_serialization: bool,
}

// The address of a composite and the address of its first member coincide,
// so one address can identify several objects; entries at the same address
// are told apart by type name.
struct AddressRecord {
    descriptor: &'static TypeDescriptor,
    index: usize,
}

struct PatchPointer {
    target_index: usize,
    destination: ReflectedValue,
}

/// The set of objects reachable from a root, identified by
/// `(address, type name)` and ordered by discovery.
///
/// A table serves a single serialize or deserialize operation. During
/// deserialization it owns every instance it allocates until the caller
/// extracts the root through [`DecodedGraph`].
#[derive(Default)]
pub struct PointerTable {
    entries: Vec<TableEntry>,
    by_address: HashMap<usize, Vec<AddressRecord>>,
    patches: Vec<PatchPointer>,
    allocations: Vec<(&'static TypeDescriptor, *mut ())>,
}

impl PointerTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True iff the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discover every object reachable from `value` depth-first, assigning
    /// table indices in visit order.
    ///
    /// `owns_serialization` marks entries that emit their own record; an
    /// object reached through a pointer owns its record until some container
    /// reaches it inline, at which point the container wins and the
    /// standalone record is suppressed.
    pub fn populate(
        &mut self,
        value: ReflectedValue,
        owns_serialization: bool,
    ) -> Result<(), ReflectionError> {
        if let Some(index) = self.find(&value) {
            // Rediscovered: an inline owner always wins over a pointer
            // owner. Cycles are cut here.
            self.entries[index].owns_serialization &= owns_serialization;
            return Ok(());
        }

        self.add(value, owns_serialization);
        if value.is_null() {
            // No need to keep processing this value, it has no data.
            return Ok(());
        }

        // Visit the parent chain root-first so discovery matches emission
        // order.
        let mut chain = Vec::new();
        let mut current = Some(value.descriptor());
        while let Some(descriptor) = current {
            chain.push(descriptor);
            current = descriptor.parent();
        }

        for descriptor in chain.into_iter().rev() {
            for member in descriptor.members() {
                let element = member.element()?;
                if member.is_pointer() {
                    if element.leaf_codec().is_some() {
                        // A standalone leaf record carries no index header,
                        // so the loader could never re-identify it.
                        return Err(ReflectionError::InvalidMemberLayout {
                            type_name: descriptor.name().to_owned(),
                            member: member.name().to_owned(),
                            reason: "pointer members must target structural types".into(),
                        });
                    }
                    let target = value.pointer_target(member, element);
                    self.populate(target, true)?;
                } else if element.has_structural_members() {
                    for index in 0..member.element_count()? {
                        let element_value = value.member_element(member, element, index);
                        self.populate(element_value, false)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn add(&mut self, value: ReflectedValue, owns_serialization: bool) -> usize {
        let index = self.entries.len();
        self.entries.push(TableEntry {
            value: Some(value),
            owns_serialization,
        });
        self.by_address
            .entry(value.address() as usize)
            .or_default()
            .push(AddressRecord {
                descriptor: value.descriptor(),
                index,
            });
        index
    }

    fn find(&self, value: &ReflectedValue) -> Option<usize> {
        self.by_address
            .get(&(value.address() as usize))?
            .iter()
            .find(|record| record.descriptor.name() == value.descriptor().name())
            .map(|record| record.index)
    }

    /// Table index of a discovered object.
    pub fn index_of(&self, value: &ReflectedValue) -> Result<usize, ReflectionError> {
        self.find(value).ok_or_else(|| {
            ReflectionError::Generic(format!(
                "object of type '{}' is not in the pointer table",
                value.descriptor().name()
            ))
        })
    }

    pub(crate) fn check_index(&self, index: usize) -> Result<(), ReflectionError> {
        if index >= self.entries.len() {
            return Err(ReflectionError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn publish(&mut self, index: usize, value: ReflectedValue) {
        self.entries[index].value = Some(value);
    }

    /// Serialize the table: its size, then every owning record in index
    /// order.
    pub fn emit(&self, stream: &mut dyn io::Write) -> Result<(), ReflectionError> {
        tracing::debug!("serializing pointer table with {} entries", self.len());
        writeln!(stream, "{}", self.entries.len())?;

        for entry in &self.entries {
            if !entry.owns_serialization {
                continue;
            }
            let value = entry.value.as_ref().ok_or_else(|| {
                ReflectionError::Generic("unresolved entry in pointer table".into())
            })?;
            let descriptor = value.descriptor();
            if descriptor.parent().is_some() {
                // Tag the record with its concrete type; the block headers
                // will carry the parent chain's names.
                write!(stream, "({}) ", descriptor.name())?;
            }
            descriptor.encode(value, stream, self, 0, false)?;
        }

        stream.flush()?;
        Ok(())
    }

    /// Deserialize the table: read each record into a fresh allocation, then
    /// patch every recorded pointer slot once all instances exist.
    pub fn load(&mut self, reader: &mut TokenReader<'_>) -> Result<(), ReflectionError> {
        let table_size = reader.read_index()?;
        if table_size == 0 {
            return Err(ReflectionError::MalformedStream {
                offset: reader.token_offset(),
                reason: "empty pointer table".into(),
            });
        }
        self.entries = (0..table_size)
            .map(|_| TableEntry {
                value: None,
                owns_serialization: false,
            })
            .collect();
        tracing::debug!("loading pointer table with {} entries", table_size);

        while !reader.at_end() {
            // A leading tag names the concrete type of a record whose block
            // headers carry a parent type's name.
            let mut tag = None;
            if reader.peek() == Some(b'(') {
                let token = reader.read_token()?;
                let name = token
                    .strip_prefix('(')
                    .and_then(|rest| rest.strip_suffix(')'))
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| ReflectionError::MalformedStream {
                        offset: reader.token_offset(),
                        reason: format!("malformed concrete-type tag '{}'", token),
                    })?;
                tag = Some(name);
            }

            // The decoder re-reads the record header, so remember where it
            // starts.
            let record_start = reader.position();
            let index = reader.read_index()?;
            self.check_index(index)?;

            let type_name = match tag {
                Some(name) => name,
                None => reader.read_token()?,
            };
            let descriptor = TypeRegistry::lookup(type_name)
                .ok_or_else(|| ReflectionError::UnknownType(type_name.to_owned()))?;

            let instance = descriptor.allocate_instance();
            if instance.is_null() {
                return Err(ReflectionError::AllocationFailure(
                    descriptor.name().to_owned(),
                ));
            }

            let mut value = ReflectedValue::new(descriptor, instance);
            reader.seek(record_start);
            if let Err(error) = descriptor.decode(&mut value, reader, self, false) {
                unsafe { descriptor.deallocate_instance(instance) };
                return Err(error);
            }

            if value.is_null() {
                // The record was a null target; only its index is reserved.
                unsafe { descriptor.deallocate_instance(instance) };
            } else {
                self.allocations.push((descriptor, instance));
            }
        }

        self.apply_patches()
    }

    /// Record a pointer slot to patch once the whole table is loaded.
    pub fn add_patch_pointer(&mut self, target_index: usize, destination: ReflectedValue) {
        self.patches.push(PatchPointer {
            target_index,
            destination,
        });
    }

    fn apply_patches(&mut self) -> Result<(), ReflectionError> {
        let patches = std::mem::take(&mut self.patches);
        for patch in patches {
            let entry = &self.entries[patch.target_index];
            let target = entry.value.as_ref().ok_or_else(|| {
                ReflectionError::Generic(format!(
                    "pointer table entry {} was never defined",
                    patch.target_index
                ))
            })?;
            unsafe {
                *patch.destination.address_mut().cast::<*mut ()>() = target.address_mut();
            }
        }
        Ok(())
    }

    /// Hand the loaded instances over to a [`DecodedGraph`] rooted at entry
    /// 0.
    pub fn into_graph(mut self) -> Result<DecodedGraph, ReflectionError> {
        let root = self
            .entries
            .first()
            .and_then(|entry| entry.value)
            .ok_or_else(|| ReflectionError::Generic("pointer table has no root entry".into()))?;
        let allocations = std::mem::take(&mut self.allocations);
        Ok(DecodedGraph { root, allocations })
    }
}

impl Drop for PointerTable {
    fn drop(&mut self) {
        // Instances that were never handed over die with the table.
        for (descriptor, instance) in self.allocations.drain(..) {
            unsafe { descriptor.deallocate_instance(instance) };
        }
    }
}

/// A deserialized object graph. Owns every instance the load allocated and
/// releases them on drop unless the caller takes over with
/// [`Self::into_root`].
pub struct DecodedGraph {
    root: ReflectedValue,
    allocations: Vec<(&'static TypeDescriptor, *mut ())>,
}

impl DecodedGraph {
    /// The root value (table entry 0).
    pub fn root(&self) -> &ReflectedValue {
        &self.root
    }

    /// Borrow the root instance as `T`.
    ///
    /// # Safety
    ///
    /// The root's descriptor must describe `T` and the root must be
    /// non-null.
    pub unsafe fn root_value<T>(&self) -> &T {
        self.root.value::<T>()
    }

    /// Take over the graph: returns the root and leaves every instance
    /// alive for the caller to manage.
    pub fn into_root(mut self) -> ReflectedValue {
        self.allocations.clear();
        self.root
    }
}

impl Drop for DecodedGraph {
    fn drop(&mut self) {
        for (descriptor, instance) in self.allocations.drain(..) {
            unsafe { descriptor.deallocate_instance(instance) };
        }
    }
}
