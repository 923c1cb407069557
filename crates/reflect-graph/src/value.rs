use crate::{MemberDescriptor, TypeDescriptor};

/// A non-owning (descriptor, raw address) pair naming one live instance of a
/// reflected type.
///
/// The address may be null, which represents the target of a null pointer.
#[derive(Clone, Copy)]
pub struct ReflectedValue {
    descriptor: &'static TypeDescriptor,
    address: *mut (),
}

impl ReflectedValue {
    /// Name a live instance by descriptor and raw address.
    pub fn new(descriptor: &'static TypeDescriptor, address: *mut ()) -> Self {
        Self {
            descriptor,
            address,
        }
    }

    /// Name a borrowed instance. The caller guarantees `descriptor` matches
    /// `T`'s registered schema.
    pub fn from_ref<T>(descriptor: &'static TypeDescriptor, instance: &T) -> Self {
        debug_assert_eq!(std::mem::size_of::<T>(), descriptor.size());
        Self {
            descriptor,
            address: (instance as *const T as *mut T).cast::<()>(),
        }
    }

    /// A null-addressed value of the given type.
    pub fn null(descriptor: &'static TypeDescriptor) -> Self {
        Self {
            descriptor,
            address: std::ptr::null_mut(),
        }
    }

    /// Descriptor of the named instance.
    pub fn descriptor(&self) -> &'static TypeDescriptor {
        self.descriptor
    }

    /// Raw address of the named instance.
    pub fn address(&self) -> *const () {
        self.address
    }

    /// Raw mutable address of the named instance.
    pub fn address_mut(&self) -> *mut () {
        self.address
    }

    /// True iff this value has no instance data.
    pub fn is_null(&self) -> bool {
        self.address.is_null()
    }

    pub(crate) fn set_null(&mut self) {
        self.address = std::ptr::null_mut();
    }

    /// Borrow the instance data as `T`.
    ///
    /// # Safety
    ///
    /// The address must be non-null and the descriptor must describe `T`.
    pub unsafe fn value<T>(&self) -> &T {
        &*self.address.cast::<T>()
    }

    /// Mutably borrow the instance data as `T`.
    ///
    /// # Safety
    ///
    /// The address must be non-null and the descriptor must describe `T`.
    pub unsafe fn value_mut<T>(&self) -> &mut T {
        &mut *self.address.cast::<T>()
    }

    /// The in-place value of element `index` of `member` (index 0 for
    /// non-array members).
    pub(crate) fn member_element(
        &self,
        member: &MemberDescriptor,
        element: &'static TypeDescriptor,
        index: usize,
    ) -> ReflectedValue {
        let address = unsafe {
            self.address
                .cast::<u8>()
                .add(member.offset() + index * element.size())
                .cast::<()>()
        };
        ReflectedValue::new(element, address)
    }

    /// The in-place value of `member`.
    pub(crate) fn member_at(
        &self,
        member: &MemberDescriptor,
        element: &'static TypeDescriptor,
    ) -> ReflectedValue {
        self.member_element(member, element, 0)
    }

    /// The value a pointer member currently points at (null-addressed when
    /// the pointer is null).
    pub(crate) fn pointer_target(
        &self,
        member: &MemberDescriptor,
        element: &'static TypeDescriptor,
    ) -> ReflectedValue {
        let target = unsafe {
            *self
                .address
                .cast::<u8>()
                .add(member.offset())
                .cast::<*mut ()>()
        };
        ReflectedValue::new(element, target)
    }
}
