//! Block-pool transport for chunked peripherals.
//!
//! Received data arrives in chunks from a producer (typically a driver
//! callback) through a [`ChunkProducer`]. Outbound data is cut into blocks and
//! handed to a dedicated sender thread that pushes them through a
//! [`BlockSink`]. All memory is allocated up front; when a pool or queue is
//! full the newest chunk is dropped and the caller sees a short count.
//!
//! A single mutex per direction plays the role of the critical section: it is
//! only ever held for index bookkeeping and small copies, never across a call
//! into the sink.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Largest chunk a single block can hold.
pub const CHUNK_MAX_BYTES: usize = 256;

/// Blocking block writer supplied by the peripheral.
///
/// `send_block` returns once the whole block is out (or has failed).
pub trait BlockSink: Send + 'static {
    fn send_block(&mut self, data: &[u8]) -> std::io::Result<()>;
}

impl<F> BlockSink for F
where
    F: FnMut(&[u8]) -> std::io::Result<()> + Send + 'static,
{
    fn send_block(&mut self, data: &[u8]) -> std::io::Result<()> {
        self(data)
    }
}

/// Pool and queue sizing for a [`ChunkStreamTransport`].
#[derive(Debug, Clone)]
pub struct ChunkStreamConfig {
    pub rx_chunk_bytes: usize,
    pub rx_pool_count: usize,
    pub rx_queue_len: usize,
    pub tx_chunk_bytes: usize,
    pub tx_pool_count: usize,
    pub tx_queue_len: usize,
}

impl Default for ChunkStreamConfig {
    fn default() -> Self {
        Self {
            rx_chunk_bytes: CHUNK_MAX_BYTES,
            rx_pool_count: 32,
            rx_queue_len: 32,
            tx_chunk_bytes: CHUNK_MAX_BYTES,
            tx_pool_count: 32,
            tx_queue_len: 32,
        }
    }
}

fn clamp_chunk(bytes: usize) -> usize {
    if bytes == 0 || bytes > CHUNK_MAX_BYTES {
        CHUNK_MAX_BYTES
    } else {
        bytes
    }
}

#[derive(Debug)]
struct Block {
    data: Box<[u8]>,
    len: usize,
    rpos: usize,
}

impl Block {
    fn filled(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

/// Fixed set of blocks handed out through a free-list of indices.
#[derive(Debug)]
struct BlockPool {
    blocks: Vec<Block>,
    free: Vec<usize>,
}

impl BlockPool {
    fn new(count: usize) -> Self {
        let blocks = (0..count)
            .map(|_| Block {
                data: vec![0u8; CHUNK_MAX_BYTES].into_boxed_slice(),
                len: 0,
                rpos: 0,
            })
            .collect();
        Self {
            blocks,
            free: (0..count).rev().collect(),
        }
    }

    fn alloc(&mut self) -> Option<usize> {
        let idx = self.free.pop()?;
        let block = &mut self.blocks[idx];
        block.len = 0;
        block.rpos = 0;
        Some(idx)
    }

    fn release(&mut self, idx: usize) {
        if self.free.len() < self.blocks.len() {
            self.free.push(idx);
        }
    }

    fn fill(&mut self, idx: usize, data: &[u8]) {
        let block = &mut self.blocks[idx];
        block.data[..data.len()].copy_from_slice(data);
        block.len = data.len();
    }

    fn available(&self) -> usize {
        self.free.len()
    }
}

/// Ring of block indices with one slot reserved, so `len` slots hold `len - 1`.
#[derive(Debug)]
struct BlockQueue {
    items: VecDeque<usize>,
    capacity: usize,
}

impl BlockQueue {
    fn new(len: usize) -> Self {
        let capacity = len.saturating_sub(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, idx: usize) -> bool {
        if self.items.len() >= self.capacity {
            return false;
        }
        self.items.push_back(idx);
        true
    }

    fn pop(&mut self) -> Option<usize> {
        self.items.pop_front()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug)]
struct RxState {
    pool: BlockPool,
    ready: BlockQueue,
    current: Option<usize>,
    chunk_bytes: usize,
}

#[derive(Debug)]
struct TxState {
    pool: BlockPool,
    queue: BlockQueue,
    chunk_bytes: usize,
    shutdown: bool,
}

#[derive(Debug)]
struct TxShared {
    state: Mutex<TxState>,
    wake: Condvar,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Producer side of the receive path.
#[derive(Debug, Clone)]
pub struct ChunkProducer {
    rx: Arc<Mutex<RxState>>,
}

impl ChunkProducer {
    /// Hand received bytes to the transport.
    ///
    /// Never waits for the consumer. Data is split into blocks of the current
    /// receive chunk size; once the pool or the ready queue is full the rest
    /// is dropped. Returns the number of bytes accepted.
    pub fn on_rx_chunk(&self, data: &[u8]) -> usize {
        let mut rx = lock(&self.rx);
        let chunk_bytes = rx.chunk_bytes;
        let mut pushed = 0usize;

        for piece in data.chunks(chunk_bytes) {
            let Some(idx) = rx.pool.alloc() else {
                break;
            };
            rx.pool.fill(idx, piece);
            if !rx.ready.push(idx) {
                rx.pool.release(idx);
                break;
            }
            pushed += piece.len();
        }

        if pushed < data.len() {
            warn!(
                accepted = pushed,
                dropped = data.len() - pushed,
                "rx chunk pool full, newest data dropped"
            );
        }
        pushed
    }
}

/// Transport over a chunked peripheral with bounded, preallocated pools.
pub struct ChunkStreamTransport<S: BlockSink> {
    rx: Arc<Mutex<RxState>>,
    tx: Arc<TxShared>,
    sink: Option<S>,
    sender: Option<JoinHandle<()>>,
}

impl<S: BlockSink> ChunkStreamTransport<S> {
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, ChunkStreamConfig::default())
    }

    pub fn with_config(sink: S, config: ChunkStreamConfig) -> Self {
        let rx = RxState {
            pool: BlockPool::new(config.rx_pool_count),
            ready: BlockQueue::new(config.rx_queue_len),
            current: None,
            chunk_bytes: clamp_chunk(config.rx_chunk_bytes),
        };
        let tx = TxState {
            pool: BlockPool::new(config.tx_pool_count),
            queue: BlockQueue::new(config.tx_queue_len),
            chunk_bytes: clamp_chunk(config.tx_chunk_bytes),
            shutdown: false,
        };
        Self {
            rx: Arc::new(Mutex::new(rx)),
            tx: Arc::new(TxShared {
                state: Mutex::new(tx),
                wake: Condvar::new(),
            }),
            sink: Some(sink),
            sender: None,
        }
    }

    /// Handle for the code that receives data from the peripheral.
    pub fn producer(&self) -> ChunkProducer {
        ChunkProducer {
            rx: Arc::clone(&self.rx),
        }
    }

    /// Adjust chunk sizes at runtime. Zero or oversize values select the maximum.
    pub fn set_chunk_sizes(&self, rx_chunk: usize, tx_chunk: usize) {
        lock(&self.rx).chunk_bytes = clamp_chunk(rx_chunk);
        lock(&self.tx.state).chunk_bytes = clamp_chunk(tx_chunk);
    }

    /// Blocks waiting in the receive ready queue.
    pub fn rx_queued(&self) -> usize {
        lock(&self.rx).ready.len()
    }

    /// Free transmit blocks.
    pub fn tx_free_blocks(&self) -> usize {
        lock(&self.tx.state).pool.available()
    }
}

fn sender_loop<S: BlockSink>(shared: Arc<TxShared>, mut sink: S) {
    let mut scratch = Vec::with_capacity(CHUNK_MAX_BYTES);
    let mut state = lock(&shared.state);
    loop {
        // Drain everything before parking; the queue is re-checked under the
        // same lock the producer pushes under, so no wakeup can slip between.
        while let Some(idx) = state.queue.pop() {
            scratch.clear();
            scratch.extend_from_slice(state.pool.blocks[idx].filled());
            state.pool.release(idx);
            drop(state);
            if let Err(err) = sink.send_block(&scratch) {
                warn!(error = %err, len = scratch.len(), "block send failed");
            }
            state = lock(&shared.state);
        }
        if state.shutdown {
            break;
        }
        state = shared
            .wake
            .wait(state)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
    }
    debug!("chunk stream sender stopped");
}

impl<S: BlockSink> Transport for ChunkStreamTransport<S> {
    fn init(&mut self, _config: &str) -> Result<()> {
        let sink = self
            .sink
            .take()
            .ok_or_else(|| TransportError::InvalidConfig("already initialized".to_string()))?;
        lock(&self.tx.state).shutdown = false;
        let shared = Arc::clone(&self.tx);
        let handle = std::thread::Builder::new()
            .name("chunk-stream-tx".to_string())
            .spawn(move || sender_loop(shared, sink))?;
        self.sender = Some(handle);
        Ok(())
    }

    fn wait_connection(&mut self) -> Result<()> {
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut guard = lock(&self.rx);
        let rx = &mut *guard;
        let mut copied = 0usize;

        while copied < buf.len() {
            let idx = match rx.current {
                Some(idx) => idx,
                None => match rx.ready.pop() {
                    Some(idx) => {
                        rx.current = Some(idx);
                        idx
                    }
                    None => break,
                },
            };

            let block = &mut rx.pool.blocks[idx];
            let take = (block.len - block.rpos).min(buf.len() - copied);
            buf[copied..copied + take].copy_from_slice(&block.data[block.rpos..block.rpos + take]);
            block.rpos += take;
            copied += take;

            if block.rpos >= block.len {
                rx.pool.release(idx);
                rx.current = None;
            }
        }
        Ok(copied)
    }

    fn send(&mut self, buf: &[u8]) -> Result<usize> {
        if self.sender.is_none() {
            return Err(TransportError::NotConnected);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let mut sent = 0usize;
        {
            let mut state = lock(&self.tx.state);
            let chunk_bytes = state.chunk_bytes;
            for piece in buf.chunks(chunk_bytes) {
                let Some(idx) = state.pool.alloc() else {
                    break;
                };
                state.pool.fill(idx, piece);
                if !state.queue.push(idx) {
                    state.pool.release(idx);
                    break;
                }
                sent += piece.len();
            }
        }

        if sent == 0 {
            return Err(TransportError::Exhausted);
        }
        self.tx.wake.notify_one();
        if sent < buf.len() {
            warn!(sent, total = buf.len(), "tx chunk pool full, tail dropped");
        }
        Ok(sent)
    }

    fn cleanup(&mut self) {
        lock(&self.tx.state).shutdown = true;
        self.tx.wake.notify_one();
        if let Some(handle) = self.sender.take() {
            let _ = handle.join();
        }
    }

    fn name(&self) -> &'static str {
        "chunk-stream"
    }
}

impl<S: BlockSink> Drop for ChunkStreamTransport<S> {
    fn drop(&mut self) {
        self.cleanup();
    }
}
