use std::io;

use once_cell::sync::OnceCell;

use crate::{ReflectionError, TokenReader, TypeRegistry};

/// Function to dynamically serialize a leaf value from a raw ptr.
pub type LeafEncodeFn =
    unsafe fn(value: *const (), stream: &mut dyn io::Write) -> Result<(), ReflectionError>;

/// Function to dynamically deserialize a leaf value into a raw ptr.
pub type LeafDecodeFn =
    unsafe fn(value: *mut (), reader: &mut TokenReader<'_>) -> Result<(), ReflectionError>;

/// Encode/decode callbacks for a primitive type with no structural members.
pub struct LeafCodec {
    /// Writes the value's textual form to the stream.
    pub encode: LeafEncodeFn,
    /// Parses the value's textual form from the stream.
    pub decode: LeafDecodeFn,
}

/// Immutable schema for one reflected type: name, byte size, optional
/// parent, members, allocator and optional leaf codec.
///
/// Descriptors are built through [`TypeDescriptor::of`] and live for the
/// process once registered (see [`TypeRegistry`]).
pub struct TypeDescriptor {
    name: String,
    size: usize,
    parent: Option<&'static TypeDescriptor>,
    members: Vec<MemberDescriptor>,
    allocate: fn() -> *mut (),
    deallocate: unsafe fn(*mut ()),
    leaf_codec: Option<LeafCodec>,
}

impl TypeDescriptor {
    /// Start building a descriptor for `T`, capturing its size and a
    /// default-initializing allocator.
    pub fn of<T: Default>(name: impl Into<String>) -> TypeDescriptorBuilder {
        TypeDescriptorBuilder {
            name: name.into(),
            size: std::mem::size_of::<T>(),
            parent_name: None,
            members: Vec::new(),
            allocate: allocate_default::<T>,
            deallocate: deallocate_boxed::<T>,
            leaf_codec: None,
        }
    }

    /// Name of this type.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of an instance of this type (in bytes).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Parent descriptor, when this type inherits one.
    pub fn parent(&self) -> Option<&'static TypeDescriptor> {
        self.parent
    }

    /// Members declared directly on this type (a parent's members are on the
    /// parent descriptor).
    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    /// Find a member of this type by name.
    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|member| member.name == name)
    }

    /// True iff this type declares members of its own.
    pub fn has_structural_members(&self) -> bool {
        !self.members.is_empty()
    }

    /// Leaf codec, when this type serializes itself as a primitive.
    pub fn leaf_codec(&self) -> Option<&LeafCodec> {
        self.leaf_codec.as_ref()
    }

    /// Allocate a fresh, default-initialized instance. The caller manages
    /// its lifetime and eventually releases it with
    /// [`Self::deallocate_instance`].
    pub fn allocate_instance(&self) -> *mut () {
        (self.allocate)()
    }

    /// Release an instance produced by [`Self::allocate_instance`].
    ///
    /// # Safety
    ///
    /// `instance` must come from this descriptor's allocator and must not be
    /// released twice.
    pub unsafe fn deallocate_instance(&self, instance: *mut ()) {
        (self.deallocate)(instance);
    }
}

fn allocate_default<T: Default>() -> *mut () {
    Box::into_raw(Box::new(T::default())).cast::<()>()
}

unsafe fn deallocate_boxed<T>(instance: *mut ()) {
    drop(Box::from_raw(instance.cast::<T>()));
}

/// Schema for one member of a reflected type.
///
/// The element type is referenced by name and resolved through the registry
/// on first use, which is what allows a type's member to reference the type
/// itself (`Node.next` pointing at `Node`).
pub struct MemberDescriptor {
    name: String,
    offset: usize,
    total_size: usize,
    is_pointer: bool,
    element_name: String,
    element: OnceCell<&'static TypeDescriptor>,
}

impl MemberDescriptor {
    /// Name of the member.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Offset (in bytes) from the start of the containing instance.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes occupied by this member. For an array member this is the size
    /// of the whole array; for a pointer member, the pointer width.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// True iff this member is a pointer to an instance of the element type.
    pub fn is_pointer(&self) -> bool {
        self.is_pointer
    }

    /// Resolve the element type's descriptor.
    pub fn element(&self) -> Result<&'static TypeDescriptor, ReflectionError> {
        self.element
            .get_or_try_init(|| {
                TypeRegistry::lookup(&self.element_name)
                    .ok_or_else(|| ReflectionError::UnknownType(self.element_name.clone()))
            })
            .copied()
    }

    /// True iff this member occupies more than one element (an inline array).
    pub fn is_array(&self) -> Result<bool, ReflectionError> {
        Ok(!self.is_pointer && self.total_size > self.element()?.size())
    }

    /// Number of elements covered by this member (1 unless it is an array).
    pub fn element_count(&self) -> Result<usize, ReflectionError> {
        let element = self.element()?;
        if self.total_size % element.size() != 0 {
            return Err(ReflectionError::InvalidMemberLayout {
                type_name: self.element_name.clone(),
                member: self.name.clone(),
                reason: format!(
                    "member size {} is not a multiple of element size {}",
                    self.total_size,
                    element.size()
                ),
            });
        }
        Ok(self.total_size / element.size())
    }
}

/// Collects the schema of one type before it is validated and registered.
pub struct TypeDescriptorBuilder {
    name: String,
    size: usize,
    parent_name: Option<String>,
    members: Vec<MemberDescriptor>,
    allocate: fn() -> *mut (),
    deallocate: unsafe fn(*mut ()),
    leaf_codec: Option<LeafCodec>,
}

impl TypeDescriptorBuilder {
    /// Declare the parent type (single inheritance). The parent must already
    /// be registered.
    pub fn parent(mut self, name: impl Into<String>) -> Self {
        self.parent_name = Some(name.into());
        self
    }

    /// Declare a member. `total_size` is the bytes the member occupies in
    /// the containing instance; `element_type` names the member's element
    /// descriptor.
    pub fn member(
        mut self,
        name: impl Into<String>,
        offset: usize,
        total_size: usize,
        is_pointer: bool,
        element_type: impl Into<String>,
    ) -> Self {
        self.members.push(MemberDescriptor {
            name: name.into(),
            offset,
            total_size,
            is_pointer,
            element_name: element_type.into(),
            element: OnceCell::new(),
        });
        self
    }

    /// Declare this type a primitive that serializes itself through the
    /// given codec. Leaf types have no members and no parent.
    pub fn leaf_codec(mut self, encode: LeafEncodeFn, decode: LeafDecodeFn) -> Self {
        self.leaf_codec = Some(LeafCodec { encode, decode });
        self
    }

    /// Validate the collected schema and produce the descriptor.
    pub fn build(self) -> Result<TypeDescriptor, ReflectionError> {
        if self.name.is_empty() {
            return Err(ReflectionError::InvalidTypeDescriptor(
                self.name,
                "type name is empty".into(),
            ));
        }
        if self.size == 0 {
            return Err(ReflectionError::InvalidTypeDescriptor(
                self.name,
                "type size is zero".into(),
            ));
        }
        if self.leaf_codec.is_some() && (!self.members.is_empty() || self.parent_name.is_some()) {
            return Err(ReflectionError::InvalidTypeDescriptor(
                self.name,
                "a leaf type cannot declare members or a parent".into(),
            ));
        }
        for member in &self.members {
            if member.total_size == 0 {
                return Err(ReflectionError::InvalidMemberLayout {
                    type_name: self.name.clone(),
                    member: member.name.clone(),
                    reason: "member size is zero".into(),
                });
            }
            if member.offset + member.total_size > self.size {
                return Err(ReflectionError::InvalidMemberLayout {
                    type_name: self.name.clone(),
                    member: member.name.clone(),
                    reason: format!(
                        "member spans bytes {}..{} but the type is {} bytes",
                        member.offset,
                        member.offset + member.total_size,
                        self.size
                    ),
                });
            }
            if member.is_pointer && member.total_size != std::mem::size_of::<*const ()>() {
                return Err(ReflectionError::InvalidMemberLayout {
                    type_name: self.name.clone(),
                    member: member.name.clone(),
                    reason: format!(
                        "pointer member occupies {} bytes, expected {}",
                        member.total_size,
                        std::mem::size_of::<*const ()>()
                    ),
                });
            }
        }
        let parent = match &self.parent_name {
            Some(name) => Some(
                TypeRegistry::lookup(name)
                    .ok_or_else(|| ReflectionError::UnknownType(name.clone()))?,
            ),
            None => None,
        };
        Ok(TypeDescriptor {
            name: self.name,
            size: self.size,
            parent,
            members: self.members,
            allocate: self.allocate,
            deallocate: self.deallocate,
            leaf_codec: self.leaf_codec,
        })
    }

    /// Build the descriptor and register it process-wide.
    pub fn register(self) -> Result<&'static TypeDescriptor, ReflectionError> {
        TypeRegistry::register(self.build()?)
    }
}
