use std::sync::atomic::AtomicBool;

use crate::error::Result;

/// A byte-stream boundary the device endpoint is driven through.
///
/// The contract mirrors what the driving loop needs and nothing more:
/// `recv` never blocks (it returns `Ok(0)` when nothing is pending), and any
/// `Err` from `recv` or `send` is a connection failure the loop reports upward.
pub trait Transport {
    /// Prepare the transport. The meaning of `config` is transport-specific.
    fn init(&mut self, config: &str) -> Result<()>;

    /// Wait until a peer is attached. May block.
    fn wait_connection(&mut self) -> Result<()>;

    /// Like [`wait_connection`](Self::wait_connection), but gives up once
    /// `running` is cleared. Returns `Ok(false)` if no peer attached.
    ///
    /// The default blocks in `wait_connection` and never looks at the flag.
    fn wait_connection_while(&mut self, running: &AtomicBool) -> Result<bool> {
        let _ = running;
        self.wait_connection().map(|()| true)
    }

    /// Read whatever is available into `buf`.
    ///
    /// Returns `Ok(0)` when no data is pending right now.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Send `buf`, returning how many bytes were accepted.
    fn send(&mut self, buf: &[u8]) -> Result<usize>;

    /// Release every resource held by the transport.
    fn cleanup(&mut self);

    /// Transport name for diagnostics.
    fn name(&self) -> &'static str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn init(&mut self, config: &str) -> Result<()> {
        (**self).init(config)
    }

    fn wait_connection(&mut self) -> Result<()> {
        (**self).wait_connection()
    }

    fn wait_connection_while(&mut self, running: &AtomicBool) -> Result<bool> {
        (**self).wait_connection_while(running)
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).recv(buf)
    }

    fn send(&mut self, buf: &[u8]) -> Result<usize> {
        (**self).send(buf)
    }

    fn cleanup(&mut self) {
        (**self).cleanup()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
