//! Fixed-capacity receive buffer for one datagram.

/// Storage for a single received datagram.
///
/// The buffer separates capacity from valid length: `storage_mut`
/// exposes the whole allocation for the socket to write into, and
/// `set_len` records how many bytes the read actually produced. A
/// length of zero means the buffer is empty and holds nothing worth
/// reading.
#[derive(Debug)]
pub struct ReadBuf {
    storage: Vec<u8>,
    len: usize,
}

impl ReadBuf {
    /// Creates a buffer able to hold `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: vec![0; capacity],
            len: 0,
        }
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// The valid bytes of the last datagram written into this buffer.
    pub fn bytes(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// Number of valid bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer currently holds no datagram.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The full backing storage, for a socket read to fill.
    pub fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.storage
    }

    /// Records that the first `len` bytes of storage are valid.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds the buffer capacity.
    pub fn set_len(&mut self, len: usize) {
        assert!(
            len <= self.storage.len(),
            "datagram length {len} exceeds buffer capacity {}",
            self.storage.len()
        );
        self.len = len;
    }

    /// Marks the buffer empty. The allocation is kept for reuse.
    pub fn clear(&mut self) {
        self.len = 0;
    }
}
