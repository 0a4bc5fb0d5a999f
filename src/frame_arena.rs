use bytemuck::Pod;

/// Capacity of the per-frame scratch allocator. Overrunning it is a content
/// bug, not a recoverable condition, so the allocator panics instead of
/// returning an error.
pub const FRAME_ARENA_CAPACITY: usize = 10 * 1024 * 1024;

/// Linear allocator for transient per-frame render data. `reset` is called by
/// the device once per frame; allocations never outlive the frame they were
/// made in.
pub struct FrameArena {
    storage: Vec<u8>,
    head: usize,
    high_water: usize,
}

impl FrameArena {
    pub fn new() -> Self {
        Self::with_capacity(FRAME_ARENA_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { storage: vec![0u8; capacity], head: 0, high_water: 0 }
    }

    /// Allocates a zeroed slice of `len` Pod values, aligned for `T`.
    pub fn alloc_slice<T: Pod>(&mut self, len: usize) -> &mut [T] {
        let align = std::mem::align_of::<T>();
        let base = self.storage.as_ptr() as usize;
        let start = ((base + self.head + align - 1) & !(align - 1)) - base;
        let bytes = len * std::mem::size_of::<T>();
        let end = start + bytes;
        if end > self.storage.len() {
            panic!(
                "frame arena exhausted: requested {} bytes with {} of {} in use",
                bytes,
                self.head,
                self.storage.len()
            );
        }
        self.head = end;
        self.high_water = self.high_water.max(self.head);
        let slice = &mut self.storage[start..end];
        slice.fill(0);
        bytemuck::cast_slice_mut(slice)
    }

    pub fn reset(&mut self) {
        self.head = 0;
    }

    pub fn used(&self) -> usize {
        self.head
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Largest in-use size seen since construction. Useful when sizing content.
    pub fn high_water_mark(&self) -> usize {
        self.high_water
    }
}

impl Default for FrameArena {
    fn default() -> Self {
        Self::new()
    }
}
