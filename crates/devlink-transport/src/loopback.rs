use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Capacity of the injected-bytes queue. Bytes beyond it are dropped.
pub const LOOPBACK_QUEUE_SIZE: usize = 4096;

#[derive(Debug, Default)]
struct Shared {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    connected: bool,
    recv_calls: usize,
    send_calls: usize,
}

/// In-memory transport for tests and the CLI loopback mode.
///
/// The host side is played through a [`LoopbackHandle`], which injects bytes
/// the device will read and collects everything the device sends.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    shared: Arc<Mutex<Shared>>,
}

/// Host-side view of a [`LoopbackTransport`].
#[derive(Debug, Clone)]
pub struct LoopbackHandle {
    shared: Arc<Mutex<Shared>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handle to drive the host side of this transport.
    pub fn handle(&self) -> LoopbackHandle {
        LoopbackHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        lock_shared(&self.shared)
    }
}

fn lock_shared(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    // A panicking test thread must not wedge the other side.
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl LoopbackHandle {
    /// Queue bytes for the device to receive. Returns how many were queued.
    pub fn inject(&self, data: &[u8]) -> usize {
        let mut shared = lock_shared(&self.shared);
        let room = LOOPBACK_QUEUE_SIZE.saturating_sub(shared.inbound.len());
        let accepted = data.len().min(room);
        shared.inbound.extend(&data[..accepted]);
        if accepted < data.len() {
            warn!(
                dropped = data.len() - accepted,
                "loopback queue full, injected bytes dropped"
            );
        }
        accepted
    }

    /// Take every byte the device has sent so far.
    pub fn take_sent(&self) -> Vec<u8> {
        std::mem::take(&mut lock_shared(&self.shared).outbound)
    }

    /// Number of injected bytes not yet read by the device.
    pub fn pending(&self) -> usize {
        lock_shared(&self.shared).inbound.len()
    }

    pub fn is_connected(&self) -> bool {
        lock_shared(&self.shared).connected
    }

    /// Number of `recv` calls that returned data.
    pub fn recv_calls(&self) -> usize {
        lock_shared(&self.shared).recv_calls
    }

    /// Number of `send` calls.
    pub fn send_calls(&self) -> usize {
        lock_shared(&self.shared).send_calls
    }
}

impl Transport for LoopbackTransport {
    fn init(&mut self, config: &str) -> Result<()> {
        let mut shared = self.lock();
        *shared = Shared::default();
        debug!(config, "loopback transport initialized");
        Ok(())
    }

    fn wait_connection(&mut self) -> Result<()> {
        let mut shared = self.lock();
        if !shared.connected {
            shared.connected = true;
            debug!("loopback connection established");
        }
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut shared = self.lock();
        if !shared.connected {
            return Err(TransportError::NotConnected);
        }
        let n = buf.len().min(shared.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(shared.inbound.drain(..n)) {
            *slot = byte;
        }
        if n > 0 {
            shared.recv_calls += 1;
        }
        Ok(n)
    }

    fn send(&mut self, buf: &[u8]) -> Result<usize> {
        let mut shared = self.lock();
        if !shared.connected {
            return Err(TransportError::NotConnected);
        }
        shared.send_calls += 1;
        shared.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn cleanup(&mut self) {
        let mut shared = self.lock();
        debug!(
            recv_calls = shared.recv_calls,
            send_calls = shared.send_calls,
            "loopback transport cleanup"
        );
        shared.connected = false;
        shared.inbound.clear();
    }

    fn name(&self) -> &'static str {
        "loopback"
    }
}
