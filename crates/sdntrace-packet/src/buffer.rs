/// A byte buffer over either a borrowed read-only frame or a frame under construction.
#[derive(Debug)]
pub enum Buffer<'a> {
    Immutable(&'a [u8]),
    Mutable(&'a mut [u8]),
}

impl Buffer<'_> {
    /// The whole buffer as a read-only slice.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Immutable(frame) => frame,
            Buffer::Mutable(frame) => frame,
        }
    }

    /// The whole buffer as a mutable slice.
    ///
    /// Panics if called on a read-only buffer.
    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        match self {
            Buffer::Immutable(_) => panic!("write operation called on readonly buffer"),
            Buffer::Mutable(frame) => frame,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Read the byte at `offset`.
    pub fn read(&self, offset: usize) -> u8 {
        self.as_slice()[offset]
    }

    /// Mutable access to the byte at `offset`.
    pub fn write(&mut self, offset: usize) -> &mut u8 {
        &mut self.as_slice_mut()[offset]
    }

    /// Read `N` consecutive bytes starting at `offset`.
    pub fn get_bytes<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut bytes = [0_u8; N];
        bytes.copy_from_slice(&self.as_slice()[offset..offset + N]);
        bytes
    }

    /// Write `N` consecutive bytes starting at `offset`.
    pub fn set_bytes<const N: usize>(&mut self, offset: usize, bytes: [u8; N]) {
        self.as_slice_mut()[offset..offset + N].copy_from_slice(&bytes);
    }

    /// Copy `vals` into the buffer at `offset`, truncating to the space available.
    pub fn copy_from(&mut self, offset: usize, vals: &[u8]) {
        let slice = self.as_slice_mut();
        let end = std::cmp::min(offset + vals.len(), slice.len());
        slice[offset..end].copy_from_slice(&vals[..end - offset]);
    }
}
