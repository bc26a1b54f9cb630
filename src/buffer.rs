//! Output buffers and the ownership contract
//!
//! A codec session writes into an [`OutputBuffer`], which grows by doubling
//! whenever the engine fills it. When the session finishes, the buffer is
//! handed to the caller in one of two ways:
//!
//! - **managed**: the produced bytes are copied into an exactly-sized
//!   `Vec<u8>` whose lifetime follows normal scoping;
//! - **external**: the session's own storage is detached and returned as an
//!   [`ExternalBuffer`] without a copy. The caller must call
//!   [`ExternalBuffer::release`] exactly once. Dropping it without release
//!   leaks the storage (and logs a warning); releasing twice does not compile
//!   because `release` consumes the buffer.

use crate::{CzlibError, Result};
use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

static LIVE_EXTERNAL: AtomicUsize = AtomicUsize::new(0);

/// Number of [`ExternalBuffer`]s handed out and not yet released
pub fn live_external_buffers() -> usize {
    LIVE_EXTERNAL.load(Ordering::SeqCst)
}

/// Lifetime discipline of a result buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Reclaimed automatically when it goes out of scope
    Managed,
    /// Reclaimed only by an explicit release
    External,
}

/// Growable output window for a codec session.
///
/// Produced bytes are the `Vec`'s length; the engine writes straight into
/// its spare capacity, which is never zero-filled.
#[derive(Debug)]
pub struct OutputBuffer {
    data: Vec<u8>,
    minimum: usize,
    grows: usize,
}

impl OutputBuffer {
    /// Allocate `max(initial, minimum)` bytes of output space
    pub fn with_capacity(initial: usize, minimum: usize) -> Result<Self> {
        let mut buffer = Self {
            data: Vec::new(),
            minimum,
            grows: 0,
        };
        buffer.reserve_to(initial.max(minimum))?;
        Ok(buffer)
    }

    /// Bytes produced so far
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been produced yet
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current capacity of the window
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Space left before the window is full
    pub fn spare(&self) -> usize {
        self.data.capacity() - self.data.len()
    }

    /// How many times the buffer has been grown
    pub fn grow_count(&self) -> usize {
        self.grows
    }

    /// Produced bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn storage_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    /// Double the capacity, never below the minimum.
    ///
    /// Already-produced bytes are kept in place.
    pub fn grow(&mut self) -> Result<()> {
        let current = self.data.capacity();
        let target = current
            .checked_mul(2)
            .ok_or(CzlibError::OutOfMemory {
                requested: usize::MAX,
            })?
            .max(self.minimum)
            .max(1);
        self.reserve_to(target)?;
        self.grows += 1;
        log::debug!("output buffer grown {} -> {} bytes", current, target);
        Ok(())
    }

    fn reserve_to(&mut self, capacity: usize) -> Result<()> {
        let additional = capacity.saturating_sub(self.data.len());
        self.data
            .try_reserve_exact(additional)
            .map_err(|_| CzlibError::OutOfMemory {
                requested: capacity,
            })
    }

    /// Copy the produced bytes into caller-owned storage
    pub fn into_managed(self) -> Vec<u8> {
        self.data.as_slice().to_vec()
    }

    /// Detach the storage and hand it to the caller without copying
    pub fn into_external(self) -> ExternalBuffer {
        ExternalBuffer::from_vec(self.data)
    }
}

/// Output storage transferred out of a codec session without a copy.
///
/// # Contract
///
/// Call [`release`](Self::release) exactly once when done. The buffer
/// may be read through `Deref<Target = [u8]>` until then. A buffer dropped
/// without release is leaked.
#[must_use = "an ExternalBuffer leaks unless release() is called"]
pub struct ExternalBuffer {
    ptr: NonNull<u8>,
    len: usize,
    capacity: usize,
}

// SAFETY: the buffer uniquely owns its allocation, exactly like `Vec<u8>`.
unsafe impl Send for ExternalBuffer {}
// SAFETY: shared access only hands out `&[u8]`.
unsafe impl Sync for ExternalBuffer {}

impl ExternalBuffer {
    fn from_vec(data: Vec<u8>) -> Self {
        let mut data = ManuallyDrop::new(data);
        let buffer = Self {
            ptr: NonNull::from(data.as_mut_slice()).cast::<u8>(),
            len: data.len(),
            capacity: data.capacity(),
        };
        LIVE_EXTERNAL.fetch_add(1, Ordering::SeqCst);
        buffer
    }

    /// Number of bytes in the buffer
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no bytes
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Always [`Ownership::External`]
    pub fn ownership(&self) -> Ownership {
        Ownership::External
    }

    /// Read-only view of the bytes
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr/len/capacity came from a live Vec that has not been
        // reclaimed; release() consumes self so no view outlives it.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Copy the bytes into a managed `Vec` and release the storage
    pub fn into_managed(self) -> Vec<u8> {
        let copy = self.as_slice().to_vec();
        self.release();
        copy
    }

    /// Return the storage to the allocator
    pub fn release(self) {
        let this = ManuallyDrop::new(self);
        // SAFETY: the parts are exactly those taken from the Vec in
        // from_vec, and ManuallyDrop keeps Drop from running afterwards.
        unsafe {
            drop(Vec::from_raw_parts(this.ptr.as_ptr(), this.len, this.capacity));
        }
        LIVE_EXTERNAL.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Deref for ExternalBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsRef<[u8]> for ExternalBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for ExternalBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalBuffer")
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Drop for ExternalBuffer {
    fn drop(&mut self) {
        log::warn!(
            "ExternalBuffer of {} bytes dropped without release(); storage leaked",
            self.len
        );
    }
}
