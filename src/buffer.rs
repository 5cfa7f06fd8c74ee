use parking_lot::Mutex;
use std::sync::Arc;

/// Free list of read buffers shared by connection handlers.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<Mutex<BufferPoolInner>>,
}

struct BufferPoolInner {
    buffers: Vec<Vec<u8>>,
    size: usize,
    max_pooled: usize,
}

impl BufferPool {
    pub fn new(size: usize, max_pooled: usize) -> Self {
        BufferPool {
            inner: Arc::new(Mutex::new(BufferPoolInner {
                buffers: Vec::with_capacity(max_pooled),
                size,
                max_pooled,
            })),
        }
    }

    pub fn get(&self) -> Vec<u8> {
        let mut inner = self.inner.lock();
        inner
            .buffers
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(inner.size))
    }

    /// Returns a buffer. Buffers that grew past four times the base size are
    /// dropped, as are buffers beyond the pool's limit.
    pub fn put(&self, mut buffer: Vec<u8>) {
        let mut inner = self.inner.lock();
        if inner.buffers.len() >= inner.max_pooled || buffer.capacity() > inner.size * 4 {
            return;
        }
        buffer.clear();
        inner.buffers.push(buffer);
    }

    pub fn available(&self) -> usize {
        self.inner.lock().buffers.len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(8192, 64) // 8KB buffers, at most 64 idle
    }
}
