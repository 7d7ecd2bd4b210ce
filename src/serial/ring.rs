use heapless::spsc::{Consumer, Producer, Queue};

/// Receive ring shared between the serial interrupt and the poll loop.
///
/// `N` is the number of slots; the ring buffers `N - 1` bytes. Construct it
/// once (it is `const`, so it can live in a `static`), then [`split`] it: the
/// interrupt side keeps the [`RxProducer`], the poll loop the [`RxConsumer`].
///
/// [`split`]: RxRing::split
pub struct RxRing<const N: usize> {
    queue: Queue<u8, N>,
}

impl<const N: usize> RxRing<N> {
    pub const fn new() -> Self {
        Self {
            queue: Queue::new(),
        }
    }

    pub const fn capacity(&self) -> usize {
        N - 1
    }

    pub fn split(&mut self) -> (RxProducer<'_, N>, RxConsumer<'_, N>) {
        let (producer, consumer) = self.queue.split();
        (
            RxProducer {
                inner: producer,
                dropped: 0,
            },
            RxConsumer { inner: consumer },
        )
    }
}

impl<const N: usize> Default for RxRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Interrupt half of the ring.
pub struct RxProducer<'a, const N: usize> {
    inner: Producer<'a, u8, N>,
    dropped: u32,
}

impl<const N: usize> RxProducer<'_, N> {
    /// Queues `byte`, or drops it when the ring is full. Never blocks.
    pub fn insert(&mut self, byte: u8) {
        if self.inner.enqueue(byte).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
        }
    }

    pub fn is_full(&self) -> bool {
        !self.inner.ready()
    }

    /// Bytes lost to a full ring since the split.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

/// Poll-loop half of the ring.
pub struct RxConsumer<'a, const N: usize> {
    inner: Consumer<'a, u8, N>,
}

impl<const N: usize> RxConsumer<'_, N> {
    pub fn is_empty(&self) -> bool {
        !self.inner.ready()
    }

    pub fn is_full(&self) -> bool {
        self.inner.len() == self.inner.capacity()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    pub fn remove(&mut self) -> Option<u8> {
        self.inner.dequeue()
    }

    /// Discards everything queued so far. Bytes the producer inserts while the
    /// flush runs may survive it.
    pub fn flush(&mut self) {
        while self.inner.dequeue().is_some() {}
    }
}
