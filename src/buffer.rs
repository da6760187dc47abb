// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Owning byte buffers and the recycling pool behind read_message_buffers.
//
// A `Buffer` either owns its storage (resizable) or holds a shared view of
// foreign bytes (never resizable). The pool only tracks buffers above a
// platform threshold; smaller requests get a plain owned buffer so
// short-lived traffic never contends on the pool lock.

use std::sync::{Arc, Mutex, Weak};

use crate::error::Error;

/// Largest allocation that bypasses the pool.
#[cfg(windows)]
pub const POOL_BYPASS_MAX: usize = 4096;
/// Largest allocation that bypasses the pool.
#[cfg(not(windows))]
pub const POOL_BYPASS_MAX: usize = 127 * 1024;

enum Storage {
    /// Owned storage; the vector's length is the allocated capacity.
    Owned(Vec<u8>),
    /// A shared view of foreign bytes. Not resizable.
    Shared(Arc<[u8]>),
}

/// A contiguous byte region with an explicit logical size and ownership flag.
///
/// Resize semantics: same size is a no-op; shrinking only moves the logical
/// size; growing within the allocated capacity likewise; growing beyond it
/// reallocates (optionally preserving prior contents). Non-owning buffers
/// refuse to resize.
pub struct Buffer {
    storage: Storage,
    len: usize,
}

impl Buffer {
    /// An owned, zero-filled buffer of `size` bytes.
    ///
    /// # Panics
    /// Panics if the allocation fails; use [`try_with_size`](Self::try_with_size)
    /// where the caller can handle exhaustion.
    pub fn with_size(size: usize) -> Self {
        Self {
            storage: Storage::Owned(vec![0; size]),
            len: size,
        }
    }

    /// An owned, zero-filled buffer of `size` bytes, or `OutOfMemory`.
    pub fn try_with_size(size: usize) -> Result<Self, Error> {
        let mut v = Vec::new();
        v.try_reserve_exact(size).map_err(|_| Error::OutOfMemory(size))?;
        v.resize(size, 0);
        Ok(Self {
            storage: Storage::Owned(v),
            len: size,
        })
    }

    /// An owned buffer taking over an existing vector.
    pub fn from_vec(v: Vec<u8>) -> Self {
        let len = v.len();
        Self {
            storage: Storage::Owned(v),
            len,
        }
    }

    /// An owned buffer initialised by copying `data`.
    pub fn from_slice(data: &[u8]) -> Self {
        Self::from_vec(data.to_vec())
    }

    /// A non-owning view of shared bytes. Refuses resize; cheap to create
    /// from any `Arc<[u8]>` a caller already holds.
    pub fn shared(data: Arc<[u8]>) -> Self {
        let len = data.len();
        Self {
            storage: Storage::Shared(data),
            len,
        }
    }

    /// Logical size in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocated capacity of the backing storage.
    pub fn capacity(&self) -> usize {
        match &self.storage {
            Storage::Owned(v) => v.len(),
            Storage::Shared(s) => s.len(),
        }
    }

    /// Whether this buffer owns its storage.
    pub fn has_ownership(&self) -> bool {
        matches!(self.storage, Storage::Owned(_))
    }

    /// The logical contents.
    pub fn data(&self) -> &[u8] {
        match &self.storage {
            Storage::Owned(v) => &v[..self.len],
            Storage::Shared(s) => &s[..self.len],
        }
    }

    /// Mutable contents, or `None` for a shared view.
    pub fn data_mut(&mut self) -> Option<&mut [u8]> {
        match &mut self.storage {
            Storage::Owned(v) => Some(&mut v[..self.len]),
            Storage::Shared(_) => None,
        }
    }

    /// Resize to `size` bytes. Returns `false` if the buffer does not own
    /// its storage or a required reallocation fails. With `preserve`, a
    /// reallocation copies the prior contents; without it the new region is
    /// zero-filled.
    pub fn resize(&mut self, size: usize, preserve: bool) -> bool {
        let v = match &mut self.storage {
            Storage::Owned(v) => v,
            Storage::Shared(_) => return false,
        };
        if size == self.len {
            return true;
        }
        if size <= v.len() {
            self.len = size;
            return true;
        }
        let mut grown = Vec::new();
        if grown.try_reserve_exact(size).is_err() {
            return false;
        }
        grown.resize(size, 0);
        if preserve {
            grown[..self.len].copy_from_slice(&v[..self.len]);
        }
        *v = grown;
        self.len = size;
        true
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("owner", &self.has_ownership())
            .finish()
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}

// ---------------------------------------------------------------------------
// BufferPool — recycles large owned buffers across messages
// ---------------------------------------------------------------------------

struct PoolInner {
    free: Mutex<Vec<Buffer>>,
}

/// A pool of recycled owned buffers for message payloads.
///
/// Requests at or below [`POOL_BYPASS_MAX`] get a fresh buffer that is not
/// tracked; larger requests reuse a recycled buffer when one is available.
/// Dropping a [`PooledBuffer`] returns tracked buffers to the pool.
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Hand out a buffer of exactly `size` bytes.
    ///
    /// A recycled buffer whose resize fails is discarded back to the pool
    /// before `OutOfMemory` is reported.
    pub fn get(&self, size: usize) -> Result<PooledBuffer, Error> {
        if size <= POOL_BYPASS_MAX {
            return Ok(PooledBuffer {
                buf: Some(Buffer::try_with_size(size)?),
                pool: None,
            });
        }
        let recycled = self.inner.free.lock().unwrap().pop();
        let buf = match recycled {
            Some(mut buf) => {
                if !buf.resize(size, false) {
                    self.inner.free.lock().unwrap().push(buf);
                    return Err(Error::OutOfMemory(size));
                }
                buf
            }
            None => Buffer::try_with_size(size)?,
        };
        Ok(PooledBuffer {
            buf: Some(buf),
            pool: Some(Arc::downgrade(&self.inner)),
        })
    }

    /// Number of recycled buffers currently idle in the pool.
    pub fn idle(&self) -> usize {
        self.inner.free.lock().unwrap().len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// An owned buffer on loan from a [`BufferPool`].
///
/// Dereferences to [`Buffer`]. Buffers above the bypass threshold return to
/// their pool on drop; bypass buffers are simply freed.
pub struct PooledBuffer {
    buf: Option<Buffer>,
    pool: Option<Weak<PoolInner>>,
}

impl PooledBuffer {
    fn buf(&self) -> &Buffer {
        self.buf.as_ref().expect("pooled buffer present until drop")
    }

    /// The buffer contents.
    pub fn data(&self) -> &[u8] {
        self.buf().data()
    }

    /// Mutable contents. Pool buffers always own their storage.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.buf
            .as_mut()
            .and_then(|b| b.data_mut())
            .expect("pooled buffers own their storage")
    }

    pub fn len(&self) -> usize {
        self.buf().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf().is_empty()
    }

    /// Detach from the pool, keeping the buffer alive past the lease.
    pub fn into_buffer(mut self) -> Buffer {
        self.pool = None;
        self.buf.take().expect("pooled buffer present until drop")
    }
}

impl std::ops::Deref for PooledBuffer {
    type Target = Buffer;

    fn deref(&self) -> &Buffer {
        self.buf()
    }
}

impl AsRef<[u8]> for PooledBuffer {
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.len())
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let (Some(buf), Some(pool)) = (self.buf.take(), self.pool.take()) {
            if let Some(inner) = pool.upgrade() {
                inner.free.lock().unwrap().push(buf);
            }
        }
    }
}
