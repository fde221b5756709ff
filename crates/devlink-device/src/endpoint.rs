use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use devlink_frame::{
    decode_frame, CommandId, Frame, RxFrameExtractor, MAX_FRAME_SIZE, RX_BUFFER_SIZE,
};
use devlink_transport::Transport;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::FORMAT_INT16;
use crate::error::Result;
use crate::payload::{encode_configure_stream, ChannelConfigEntry, LogLevel};
use crate::session::DeviceSession;

/// Bytes read from the transport per iteration.
pub const RECV_BUFFER_SIZE: usize = 4096;

const LOOP_PAUSE: Duration = Duration::from_millis(1);
const STATUS_INTERVAL_MS: u32 = 5000;

/// Counters kept by the driving loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EndpointStats {
    pub iterations: u64,
    pub bytes_received: u64,
    /// Inbound bytes that did not fit in the receive buffer.
    pub bytes_lost: u64,
    pub frames_received: u64,
    /// Candidates that failed validation.
    pub frames_rejected: u64,
    pub frames_sent: u64,
}

/// Binds a [`DeviceSession`] to a transport and pumps bytes between them.
pub struct Endpoint<T: Transport> {
    transport: T,
    session: DeviceSession,
    rx: RxFrameExtractor,
    recv_buf: Box<[u8]>,
    stats: EndpointStats,
}

impl<T: Transport> Endpoint<T> {
    pub fn new(transport: T, session: DeviceSession) -> Self {
        Self::with_rx_capacity(transport, session, RX_BUFFER_SIZE)
    }

    /// Like [`new`](Self::new) with a receive ring of `capacity` bytes.
    pub fn with_rx_capacity(transport: T, session: DeviceSession, capacity: usize) -> Self {
        Self {
            transport,
            session,
            rx: RxFrameExtractor::with_capacity(capacity),
            recv_buf: vec![0u8; RECV_BUFFER_SIZE].into_boxed_slice(),
            stats: EndpointStats::default(),
        }
    }

    /// Initialize the transport with `config` and wait for a peer.
    pub fn start(&mut self, config: &str) -> Result<()> {
        self.transport.init(config)?;
        info!(transport = self.transport.name(), "waiting for connection");
        self.transport.wait_connection()?;
        info!(transport = self.transport.name(), "connected");
        Ok(())
    }

    /// Like [`start`](Self::start), but stops waiting for a peer once
    /// `running` is cleared. Returns `Ok(false)` if nobody connected.
    pub fn start_while(&mut self, config: &str, running: &AtomicBool) -> Result<bool> {
        self.transport.init(config)?;
        info!(transport = self.transport.name(), "waiting for connection");
        let connected = self.transport.wait_connection_while(running)?;
        if connected {
            info!(transport = self.transport.name(), "connected");
        }
        Ok(connected)
    }

    /// One pass of the loop: receive, dispatch, tick, then drain outbound
    /// frames to the transport.
    pub fn poll(&mut self, now: u32) -> Result<()> {
        self.stats.iterations += 1;

        let n = self.transport.recv(&mut self.recv_buf)?;
        if n > 0 {
            self.stats.bytes_received += n as u64;
            let accepted = self.rx.feed(&self.recv_buf[..n]);
            if accepted < n {
                let lost = n - accepted;
                self.stats.bytes_lost += lost as u64;
                warn!(lost, "rx buffer overflow");
                let text = format!("rx buffer overflow, lost {lost} bytes");
                self.session.emit_log(LogLevel::Warn, &text);
            }
        }

        while let Some(candidate) = self.rx.next_frame() {
            match decode_frame(&candidate) {
                Ok(frame) => {
                    self.stats.frames_received += 1;
                    self.session.handle_frame(&frame, now);
                }
                Err(err) => {
                    self.stats.frames_rejected += 1;
                    warn!(error = %err, len = candidate.len(), "dropping invalid frame");
                }
            }
        }

        self.session.tick(now);
        self.flush()
    }

    /// Send every queued outbound frame.
    ///
    /// Stops at the first short write; a transport error is returned.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            let frame: Bytes = self.session.next_outbound(MAX_FRAME_SIZE);
            if frame.is_empty() {
                return Ok(());
            }
            let sent = self.transport.send(&frame)?;
            if sent != frame.len() {
                warn!(sent, len = frame.len(), "short send, frame lost");
                return Ok(());
            }
            self.stats.frames_sent += 1;
        }
    }

    /// Poll until `running` clears or the transport fails.
    pub fn run(&mut self, clock: &impl Clock, running: &AtomicBool) -> Result<()> {
        info!(transport = self.transport.name(), "entering main loop");
        let mut last_status = clock.now_ms();

        while running.load(Ordering::SeqCst) {
            let now = clock.now_ms();
            if let Err(err) = self.poll(now) {
                error!(error = %err, "transport failure, leaving main loop");
                return Err(err);
            }
            if now.wrapping_sub(last_status) >= STATUS_INTERVAL_MS {
                debug!(
                    iterations = self.stats.iterations,
                    now,
                    frames_received = self.stats.frames_received,
                    frames_sent = self.stats.frames_sent,
                    "status"
                );
                last_status = now;
            }
            std::thread::sleep(LOOP_PAUSE);
        }

        info!("main loop stopped");
        Ok(())
    }

    /// Release the transport.
    pub fn shutdown(&mut self) {
        self.transport.cleanup();
        info!(
            transport = self.transport.name(),
            frames_received = self.stats.frames_received,
            frames_sent = self.stats.frames_sent,
            "endpoint shut down"
        );
    }

    pub fn stats(&self) -> EndpointStats {
        self.stats
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DeviceSession {
        &mut self.session
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

/// Host command sequence used to exercise a device without a real host:
/// PING, GET_DEVICE_INFO, CONFIGURE_STREAM (two channels at 10 kHz, int16),
/// SET_MODE_TRIGGER, START_STREAM, with sequence numbers 0 to 4.
pub fn test_script() -> Vec<Frame> {
    let channel = |channel_id| ChannelConfigEntry {
        channel_id,
        sample_rate: 10_000,
        format: FORMAT_INT16,
    };
    vec![
        Frame::new(CommandId::Ping.code(), 0, Bytes::new()),
        Frame::new(CommandId::GetDeviceInfo.code(), 1, Bytes::new()),
        Frame::new(
            CommandId::ConfigureStream.code(),
            2,
            encode_configure_stream(&[channel(0), channel(1)]),
        ),
        Frame::new(CommandId::SetModeTrigger.code(), 3, Bytes::new()),
        Frame::new(CommandId::StartStream.code(), 4, Bytes::new()),
    ]
}
