//! Owning byte container for binary payloads
//!
//! Used for binary-mode contents, decoded binary attribute values and
//! serialized node frames.

use std::ops::Deref;

/// Owning, resizable raw-byte buffer
///
/// Resizing keeps the existing prefix and zero-fills any growth. Equality is
/// byte-wise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteBuffer {
    data: Vec<u8>,
}

impl ByteBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        ByteBuffer { data: Vec::new() }
    }

    /// Create a zero-filled buffer of `size` bytes
    pub fn zeroed(size: usize) -> Self {
        ByteBuffer {
            data: vec![0; size],
        }
    }

    /// Create a buffer holding a copy of `bytes`
    pub fn from_slice(bytes: &[u8]) -> Self {
        ByteBuffer {
            data: bytes.to_vec(),
        }
    }

    /// Number of bytes held
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Change the size, keeping the prefix and zero-filling growth
    pub fn resize(&mut self, size: usize) {
        self.data.resize(size, 0);
    }

    /// Append bytes at the end
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Release spare capacity
    pub fn compress(&mut self) {
        self.data.shrink_to_fit();
    }

    /// Bytes reserved by the buffer, including spare capacity
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl Deref for ByteBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(data: Vec<u8>) -> Self {
        ByteBuffer { data }
    }
}

impl From<&[u8]> for ByteBuffer {
    fn from(bytes: &[u8]) -> Self {
        ByteBuffer::from_slice(bytes)
    }
}
