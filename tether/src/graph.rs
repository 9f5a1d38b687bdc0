//! Shared object handles.
//!
//! [`Ref`] is the typed handle used for reference-typed slots whose static
//! type is final at the use site. [`ObjRef`] erases the concrete type and is
//! used wherever the dynamic type must be carried in the byte stream.
//! Identity is the address of the shared allocation, so two clones of a
//! handle are the *same* object to the serializer while two handles built
//! from equal values are not.

use core::any::{
    Any,
    TypeId,
};
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
};

/// A shared, mutable node of an object graph.
pub struct Ref<T>(Arc<Mutex<T>>);

impl<T> Ref<T> {
    /// Wrap a value into a fresh shared node.
    pub fn new(value: T) -> Self {
        Self(Arc::new(Mutex::new(value)))
    }

    /// Lock the node for reading or writing.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock().expect("poisoned")
    }

    /// Whether two handles designate the same node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Identity of the node: the address of its shared allocation.
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const u8 as usize
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: core::fmt::Debug> core::fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Ref").field(&*self.lock()).finish()
    }
}

/// A type-erased handle to a shared node.
///
/// Carries the dynamic type so a polymorphic slot can reconstruct the
/// concrete value on decode.
#[derive(Clone)]
pub struct ObjRef {
    cell: Arc<dyn Any + Send + Sync>,
    ty: TypeId,
    name: &'static str,
}

impl ObjRef {
    /// Wrap a value into a fresh erased node.
    pub fn new<T: Send + 'static>(value: T) -> Self {
        Self::from_ref(&Ref::new(value))
    }

    /// Erase an existing typed handle, preserving its identity.
    pub fn from_ref<T: Send + 'static>(node: &Ref<T>) -> Self {
        Self {
            cell: Arc::clone(&node.0) as Arc<dyn Any + Send + Sync>,
            ty: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }

    /// The dynamic type of the referenced value.
    pub fn value_type(&self) -> TypeId {
        self.ty
    }

    /// Diagnostic name of the dynamic type.
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// Recover the typed handle, if the dynamic type matches.
    pub fn downcast<T: Send + 'static>(&self) -> Option<Ref<T>> {
        Arc::clone(&self.cell)
            .downcast::<Mutex<T>>()
            .ok()
            .map(Ref)
    }

    /// Whether two handles designate the same node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }

    /// Identity of the node: the address of its shared allocation.
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.cell) as *const u8 as usize
    }
}

impl<T: Send + 'static> From<Ref<T>> for ObjRef {
    fn from(node: Ref<T>) -> Self {
        Self::from_ref(&node)
    }
}

impl core::fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ObjRef")
            .field("type", &self.name)
            .field("addr", &self.addr())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity() {
        let a = Ref::new(7u32);
        let b = a.clone();
        let c = Ref::new(7u32);
        assert!(a.ptr_eq(&b));
        assert_eq!(a.addr(), b.addr());
        assert_ne!(a.addr(), c.addr());
    }

    #[test]
    fn erasure_preserves_identity_and_type() {
        let node = Ref::new(String::from("x"));
        let erased = ObjRef::from_ref(&node);
        assert_eq!(erased.addr(), node.addr());
        assert_eq!(erased.value_type(), TypeId::of::<String>());

        let back = erased.downcast::<String>().expect("same type");
        assert!(back.ptr_eq(&node));
        assert!(erased.downcast::<u32>().is_none());
    }

    #[test]
    fn mutation_is_visible_through_all_handles() {
        let node = Ref::new(1u8);
        let erased = ObjRef::from_ref(&node);
        *node.lock() = 2;
        let typed = erased.downcast::<u8>().unwrap();
        assert_eq!(*typed.lock(), 2);
    }
}
