use std::collections::HashMap;
use std::sync::RwLock;

use lazy_static::lazy_static;

use crate::{ReflectionError, TypeDescriptor};

lazy_static! {
    static ref REGISTRY: RwLock<Directory> = RwLock::new(Directory::with_builtins());
}

struct Directory {
    types: HashMap<String, &'static TypeDescriptor>,
}

impl Directory {
    fn with_builtins() -> Self {
        let mut directory = Self {
            types: HashMap::new(),
        };
        for descriptor in crate::primitives::builtin_descriptors() {
            directory
                .insert(descriptor)
                .expect("built-in type registration");
        }
        directory
    }

    fn insert(
        &mut self,
        descriptor: TypeDescriptor,
    ) -> Result<&'static TypeDescriptor, ReflectionError> {
        if self.types.contains_key(descriptor.name()) {
            return Err(ReflectionError::DuplicateType(descriptor.name().to_owned()));
        }
        // Descriptors live for the process once registered.
        let descriptor: &'static TypeDescriptor = Box::leak(Box::new(descriptor));
        self.types.insert(descriptor.name().to_owned(), descriptor);
        Ok(descriptor)
    }
}

/// Process-wide directory mapping type name to [`TypeDescriptor`].
///
/// Initialized lazily on first access (installing the built-in primitive
/// descriptors) and never torn down. Registration happens during the
/// single-threaded start-up phase; lookups afterwards are read-only and safe
/// for concurrent readers.
pub struct TypeRegistry;

impl TypeRegistry {
    /// Register a descriptor under its type name.
    pub fn register(
        descriptor: TypeDescriptor,
    ) -> Result<&'static TypeDescriptor, ReflectionError> {
        let registered = REGISTRY.write().unwrap().insert(descriptor)?;
        tracing::debug!(
            "registered type '{}' ({} bytes)",
            registered.name(),
            registered.size()
        );
        Ok(registered)
    }

    /// Look up a descriptor by type name.
    pub fn lookup(name: &str) -> Option<&'static TypeDescriptor> {
        REGISTRY.read().unwrap().types.get(name).copied()
    }

    /// All registered type names, in a stable order.
    pub fn names() -> Vec<String> {
        let mut names: Vec<String> = REGISTRY.read().unwrap().types.keys().cloned().collect();
        names.sort();
        names
    }
}
