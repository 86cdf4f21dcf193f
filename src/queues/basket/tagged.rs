//! A single-word packed tagged pointer
//!
//! The Basket-Queue algorithm works on pointers of the form
//! `{ address, deleted, tag }`: the `tag` is a generation counter that
//! invalidates stale CAS attempts (the ABA problem), the `deleted` bit marks
//! the pointed-to Node as logically removed while it is still linked. All
//! three parts have to change together in one atomic step, so they are
//! packed into a single `u64`:
//!
//! ```text
//! | 63 .. 48 | 47 .. 1 | 0       |
//! | tag      | address | deleted |
//! ```
//!
//! Heap addresses on the supported 64-bit targets fit into the low 48 bits
//! and Nodes are aligned to at least 2 Bytes, which frees up bit 0.

use core::fmt;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicU64, Ordering};

const DELETED_BIT: u64 = 1;
const TAG_SHIFT: u32 = 48;
const ADDR_MASK: u64 = ((1u64 << TAG_SHIFT) - 1) & !DELETED_BIT;

/// One decoded Snapshot of a [`AtomicTagged`] slot
pub struct TaggedPtr<T> {
    raw: u64,
    _marker: PhantomData<*mut T>,
}

impl<T> TaggedPtr<T> {
    /// Packs the given parts into a single word
    pub fn new(ptr: *mut T, deleted: bool, tag: u16) -> Self {
        let addr = ptr as u64;
        debug_assert_eq!(0, addr & !ADDR_MASK, "the Address has to fit the packing");

        Self {
            raw: (u64::from(tag) << TAG_SHIFT) | addr | u64::from(deleted),
            _marker: PhantomData,
        }
    }

    /// A null pointer carrying only the given Tag
    pub fn null(tag: u16) -> Self {
        Self::new(core::ptr::null_mut(), false, tag)
    }

    /// The plain address part
    pub fn as_ptr(self) -> *mut T {
        (self.raw & ADDR_MASK) as *mut T
    }

    /// Checks if the address part is null, ignoring Tag and deletion mark
    pub fn is_null(self) -> bool {
        self.as_ptr().is_null()
    }

    /// The logical deletion mark of the pointed-to Node
    pub fn deleted(self) -> bool {
        self.raw & DELETED_BIT == DELETED_BIT
    }

    /// The generation Tag of this slot
    pub fn tag(self) -> u16 {
        (self.raw >> TAG_SHIFT) as u16
    }

    /// Dereferences the address part
    ///
    /// # Safety:
    /// The caller has to guarantee that the pointer is not null and that the
    /// Node has not been reclaimed yet, normally by holding an epoch guard
    /// that was pinned before the pointer was loaded
    pub unsafe fn deref<'g>(self) -> &'g T {
        &*self.as_ptr()
    }
}

impl<T> Clone for TaggedPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for TaggedPtr<T> {}

impl<T> PartialEq for TaggedPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}
impl<T> Eq for TaggedPtr<T> {}

impl<T> fmt::Debug for TaggedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedPtr")
            .field("ptr", &self.as_ptr())
            .field("deleted", &self.deleted())
            .field("tag", &self.tag())
            .finish()
    }
}

/// An atomic cell holding one packed [`TaggedPtr`]
///
/// All updates go through [`compare_exchange`](Self::compare_exchange), which
/// compares and swaps address, deletion mark and Tag as one unit
#[derive(Debug)]
pub struct AtomicTagged<T> {
    inner: AtomicU64,
    _marker: PhantomData<*mut T>,
}

impl<T> AtomicTagged<T> {
    /// Creates a new cell holding the given Snapshot
    pub fn new(ptr: TaggedPtr<T>) -> Self {
        Self {
            inner: AtomicU64::new(ptr.raw),
            _marker: PhantomData,
        }
    }

    /// Creates a new cell holding a null pointer with the given Tag
    pub fn null(tag: u16) -> Self {
        Self::new(TaggedPtr::null(tag))
    }

    /// Loads the current Snapshot
    pub fn load(&self, order: Ordering) -> TaggedPtr<T> {
        TaggedPtr {
            raw: self.inner.load(order),
            _marker: PhantomData,
        }
    }

    /// Stores the given Snapshot
    pub fn store(&self, ptr: TaggedPtr<T>, order: Ordering) {
        self.inner.store(ptr.raw, order);
    }

    /// Attempts to swap `current` for `new` in one atomic step
    ///
    /// # Returns
    /// * `Ok(new)` if the cell still held `current`
    /// * `Err(actual)` with the Snapshot the cell actually held
    pub fn compare_exchange(
        &self,
        current: TaggedPtr<T>,
        new: TaggedPtr<T>,
        success: Ordering,
        failure: Ordering,
    ) -> Result<TaggedPtr<T>, TaggedPtr<T>> {
        match self
            .inner
            .compare_exchange(current.raw, new.raw, success, failure)
        {
            Ok(_) => Ok(new),
            Err(actual) => Err(TaggedPtr {
                raw: actual,
                _marker: PhantomData,
            }),
        }
    }
}
