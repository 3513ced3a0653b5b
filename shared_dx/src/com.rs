//! Reference-counted handle over a raw COM pointer owned (in part) by the host.
use std::fmt;
use std::ops::Deref;
use std::ptr::NonNull;

use winapi::um::unknwnbase::IUnknown;
use winapi::Interface;

/// Holds exactly one reference on the wrapped object.  Clone adds a reference, drop releases
/// it, so a handle leaving scope on any path (including `?`) gives its reference back.
pub struct ComRef<T: Interface> {
    ptr: NonNull<T>,
}

// D3D12 and DXGI objects are free threaded.
unsafe impl<T: Interface> Send for ComRef<T> {}
unsafe impl<T: Interface> Sync for ComRef<T> {}

impl<T: Interface> ComRef<T> {
    /// Adopt a reference the caller already owns, such as an out-param of a Create call.
    pub unsafe fn from_raw(ptr: *mut T) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| ComRef { ptr })
    }

    /// Take a new reference on an object somebody else owns.
    pub unsafe fn from_borrowed(ptr: *mut T) -> Option<Self> {
        let r = Self::from_raw(ptr)?;
        r.unknown().AddRef();
        Some(r)
    }

    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    fn unknown(&self) -> &IUnknown {
        unsafe { &*(self.ptr.as_ptr() as *mut IUnknown) }
    }

    /// QueryInterface for `U`; `None` if the object doesn't implement it.
    pub fn query<U: Interface>(&self) -> Option<ComRef<U>> {
        let mut out: *mut winapi::ctypes::c_void = std::ptr::null_mut();
        let hr = unsafe { self.unknown().QueryInterface(&U::uuidof(), &mut out) };
        if hr < 0 {
            return None;
        }
        unsafe { ComRef::from_raw(out as *mut U) }
    }
}

impl<T: Interface> Clone for ComRef<T> {
    fn clone(&self) -> Self {
        unsafe {
            self.unknown().AddRef();
        }
        ComRef { ptr: self.ptr }
    }
}

impl<T: Interface> Drop for ComRef<T> {
    fn drop(&mut self) {
        unsafe {
            self.unknown().Release();
        }
    }
}

impl<T: Interface> Deref for ComRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: Interface> PartialEq for ComRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

/// Identity against a raw pointer a hook was handed.
impl<T: Interface> PartialEq<*mut T> for ComRef<T> {
    fn eq(&self, other: &*mut T) -> bool {
        self.ptr.as_ptr() == *other
    }
}

impl<T: Interface> fmt::Debug for ComRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ComRef({:p})", self.ptr.as_ptr())
    }
}
