//! Opaque handles and the raw memory layout helpers.

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};

/// Address of a native object owned by the host (window, device, context,
/// swap chain, data format).
///
/// The coordination core only stores and compares these; it never
/// dereferences them.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct RawHandle(NonNull<c_void>);

// The pointee belongs to the host, which hands the same objects to whichever
// thread it likes. The handle itself is just an address.
unsafe impl Send for RawHandle {}
unsafe impl Sync for RawHandle {}

impl RawHandle {
    /// Wrap a pointer, yielding `None` for null.
    pub fn new(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    /// Wrap an integer address such as an `HWND`, yielding `None` for zero.
    pub fn from_addr(addr: usize) -> Option<Self> {
        Self::new(addr as *mut c_void)
    }

    /// The raw pointer.
    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }

    /// The address as an integer.
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:p}", self.0.as_ptr())
    }
}

/// Read-modify-exchange on a flag: `Some` stores the new value, `None` only
/// reads. The previous value is returned either way.
pub(crate) fn exchange(flag: &AtomicBool, value: Option<bool>) -> bool {
    match value {
        Some(value) => flag.swap(value, Ordering::SeqCst),
        None => flag.load(Ordering::SeqCst),
    }
}

/// Virtual table slot of `IDXGISwapChain::Present`.
///
/// `IUnknown` occupies slots 0 to 2, `IDXGIObject` 3 to 6,
/// `IDXGIDeviceSubObject` 7, which puts `Present` at 8.
pub const PRESENT_VTABLE_SLOT: usize = 8;

/// Read the function pointer stored at `slot` in the virtual table of a
/// COM-style `object`.
///
/// This is the only place that assumes the in-memory layout of an interface:
/// the first word of the object points to an array of function pointers.
///
/// # Safety
///
/// `object` must point to a live object whose first word is a pointer to a
/// virtual table holding at least `slot + 1` entries.
pub unsafe fn vtable_entry(object: RawHandle, slot: usize) -> Option<RawHandle> {
    let vtable = *(object.as_ptr() as *const *const *mut c_void);
    if vtable.is_null() {
        return None;
    }
    RawHandle::new(*vtable.add(slot))
}

/// Helper for fallible [`windows`] APIs that have an out-param with a default
/// value.
///
/// # Example
///
/// ```ignore
/// let desc = try_out_param(|d| unsafe { swap_chain.GetDesc(d) })?;
/// ```
#[cfg(windows)]
pub fn try_out_param<T, F, E, O>(mut f: F) -> Result<T, E>
where
    T: Default,
    F: FnMut(&mut T) -> Result<O, E>,
{
    let mut t: T = Default::default();
    f(&mut t).map(|_| t)
}
