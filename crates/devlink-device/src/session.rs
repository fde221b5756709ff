use bytes::{Bytes, BytesMut};
use devlink_frame::{command_name, encode_frame, CommandId, Frame, TxFrameQueue};
use tracing::{debug, info, warn};

use crate::config::{SessionConfig, MAX_CHANNELS};
use crate::error::Result;
use crate::payload::{
    encode_pong, parse_configure_stream, ChannelDescriptor, DataPacket, DeviceInfo,
    EventTriggered, LogLevel, LogMessage, Nack, StatusReport, StreamMode, StreamStatus,
    SAMPLES_PER_PACKET,
};
use crate::random::{RandomSource, SeededRandom};
use crate::samples::{SampleSource, SineNoise};

/// Minimum spacing between DATA_PACKET frames.
pub const DATA_SEND_INTERVAL_MS: u32 = 10;

/// Pre- and post-trigger sample counts reported in EVENT_TRIGGERED.
pub const TRIGGER_WINDOW_SAMPLES: u32 = 1000;

/// Delay from arming to the first trigger, `[lo, hi)` ms.
const FIRST_TRIGGER_DELAY_MS: (u32, u32) = (5000, 10_000);

/// Delay from the end of a burst to the next trigger, `[lo, hi)` ms.
const REARM_DELAY_MS: (u32, u32) = (10_000, 15_000);

/// Packets per trigger burst, `[lo, hi)`.
const BURST_PACKETS: (u32, u32) = (5, 11);

/// Live stream settings of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelState {
    pub enabled: bool,
    pub sample_rate: u32,
    pub format: u8,
}

/// Trigger sub-state. Only meaningful in [`StreamMode::Trigger`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerState {
    pub armed: bool,
    pub occurred: bool,
    pub sending: bool,
    /// Time the last trigger fired.
    pub timestamp: u32,
    pub packets_to_send: u32,
    pub packets_sent: u32,
    pub next_trigger_time: u32,
}

/// The simulated instrument.
///
/// State changes only through [`handle_frame`](Self::handle_frame) and
/// [`tick`](Self::tick). Every outbound frame lands in an internal
/// [`TxFrameQueue`] that the caller drains.
pub struct DeviceSession {
    config: SessionConfig,
    mode: StreamMode,
    status: StreamStatus,
    channels: Vec<ChannelState>,
    trigger: TriggerState,
    seq_counter: u8,
    last_data_send_time: u32,
    start_time: Option<u32>,
    tx: TxFrameQueue,
    random: Box<dyn RandomSource>,
    samples: Box<dyn SampleSource>,
    sample_buf: Vec<i16>,
    dropped_frames: u64,
}

impl Default for DeviceSession {
    fn default() -> Self {
        Self::build(SessionConfig::default())
    }
}

impl DeviceSession {
    /// Create a session for `config`, seeded from the operating system.
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SessionConfig) -> Self {
        let channels = config
            .channels
            .iter()
            .take(MAX_CHANNELS)
            .map(|spec| ChannelState {
                enabled: spec.enabled,
                sample_rate: spec.sample_rate,
                format: spec.format,
            })
            .collect();

        info!(
            channels = config.channels.len(),
            "device session initialized (mode=continuous, status=stopped)"
        );

        Self {
            config,
            mode: StreamMode::Continuous,
            status: StreamStatus::Stopped,
            channels,
            trigger: TriggerState::default(),
            seq_counter: 0,
            last_data_send_time: 0,
            start_time: None,
            tx: TxFrameQueue::new(),
            random: Box::new(SeededRandom::from_entropy()),
            samples: Box::new(SineNoise::default()),
            sample_buf: vec![0; usize::from(SAMPLES_PER_PACKET)],
            dropped_frames: 0,
        }
    }

    /// Replace the source of trigger timing jitter.
    pub fn with_random(mut self, random: impl RandomSource + 'static) -> Self {
        self.random = Box::new(random);
        self
    }

    /// Replace the sample generator.
    pub fn with_samples(mut self, samples: impl SampleSource + 'static) -> Self {
        self.samples = Box::new(samples);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    pub fn status(&self) -> StreamStatus {
        self.status
    }

    pub fn channels(&self) -> &[ChannelState] {
        &self.channels
    }

    pub fn trigger(&self) -> &TriggerState {
        &self.trigger
    }

    /// Sequence number the next unsolicited frame will carry.
    pub fn seq_counter(&self) -> u8 {
        self.seq_counter
    }

    /// Time of the first tick, once one has happened.
    pub fn start_time(&self) -> Option<u32> {
        self.start_time
    }

    /// Outbound frames dropped because the queue was full.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub fn tx_queue(&self) -> &TxFrameQueue {
        &self.tx
    }

    pub fn tx_queue_mut(&mut self) -> &mut TxFrameQueue {
        &mut self.tx
    }

    /// Take the oldest queued outbound frame, cut to `max_out` bytes.
    pub fn next_outbound(&mut self, max_out: usize) -> Bytes {
        self.tx.dequeue(max_out)
    }

    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            mode: self.mode,
            status: self.status,
            error_flag: 0,
            error_code: 0,
        }
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            protocol_version: self.config.protocol_version,
            firmware_version: self.config.firmware_version,
            channels: self
                .config
                .channels
                .iter()
                .take(MAX_CHANNELS)
                .enumerate()
                .map(|(id, spec)| ChannelDescriptor {
                    id: id as u8,
                    max_sample_rate: spec.max_sample_rate,
                    supported_formats: spec.supported_formats,
                    name: spec.name.clone(),
                })
                .collect(),
        }
    }

    /// Act on one decoded inbound frame. Every request is answered with a
    /// frame echoing its sequence number.
    pub fn handle_frame(&mut self, frame: &Frame, now: u32) {
        let seq = frame.seq;
        debug!(
            cmd = command_name(frame.command),
            code = frame.command,
            seq,
            len = frame.payload.len(),
            "rx"
        );

        match frame.command_id() {
            Some(CommandId::Ping) => {
                let id = encode_pong(self.config.device_id);
                self.respond(CommandId::Pong, seq, &id);
            }
            Some(CommandId::GetStatus) => {
                let report = self.status_report().encode();
                self.respond(CommandId::StatusResponse, seq, &report);
            }
            Some(CommandId::GetDeviceInfo) => {
                let info = self.device_info().encode();
                self.respond(CommandId::DeviceInfoResponse, seq, &info);
            }
            Some(CommandId::SetModeContinuous) => {
                self.mode = StreamMode::Continuous;
                self.trigger.armed = false;
                info!("mode changed to continuous");
                self.ack(seq);
            }
            Some(CommandId::SetModeTrigger) => {
                let (lo, hi) = FIRST_TRIGGER_DELAY_MS;
                self.mode = StreamMode::Trigger;
                self.trigger.armed = true;
                self.trigger.occurred = false;
                self.trigger.sending = false;
                self.trigger.next_trigger_time = now.wrapping_add(self.random.range(lo, hi));
                info!(
                    next_trigger_time = self.trigger.next_trigger_time,
                    "mode changed to trigger"
                );
                self.ack(seq);
            }
            Some(CommandId::StartStream) => {
                self.status = StreamStatus::Running;
                self.last_data_send_time = 0;
                info!("stream started");
                self.ack(seq);
            }
            Some(CommandId::StopStream) => {
                self.status = StreamStatus::Stopped;
                self.trigger.sending = false;
                info!("stream stopped");
                self.ack(seq);
            }
            Some(CommandId::ConfigureStream) => self.configure_stream(seq, &frame.payload),
            Some(CommandId::RequestBufferedData) => {
                if self.mode == StreamMode::Trigger && self.trigger.occurred {
                    self.ack(seq);
                } else {
                    self.nack(seq, Nack::NO_TRIGGER_DATA);
                }
            }
            _ => {
                warn!(code = frame.command, seq, "unsupported command");
                self.nack(seq, Nack::CommandNotSupported);
            }
        }
    }

    fn configure_stream(&mut self, seq: u8, payload: &[u8]) {
        let Some(entries) = parse_configure_stream(payload) else {
            self.nack(seq, Nack::EMPTY_CONFIGURATION);
            return;
        };
        for entry in entries {
            let Some(channel) = self.channels.get_mut(usize::from(entry.channel_id)) else {
                debug!(channel = entry.channel_id, "ignoring unknown channel");
                continue;
            };
            channel.enabled = entry.sample_rate > 0;
            channel.sample_rate = entry.sample_rate;
            channel.format = entry.format;
            info!(
                channel = entry.channel_id,
                rate = entry.sample_rate,
                format = entry.format,
                "channel configured"
            );
        }
        self.ack(seq);
    }

    /// Advance timers to `now` (milliseconds) and emit whatever is due.
    pub fn tick(&mut self, now: u32) {
        if self.start_time.is_none() {
            self.start_time = Some(now);
        }
        if self.status != StreamStatus::Running {
            return;
        }

        match self.mode {
            StreamMode::Trigger => self.tick_trigger(now),
            StreamMode::Continuous => {
                if now.wrapping_sub(self.last_data_send_time) >= DATA_SEND_INTERVAL_MS {
                    self.send_data_packet(now);
                    self.last_data_send_time = now;
                }
            }
        }
    }

    fn tick_trigger(&mut self, now: u32) {
        if self.trigger.armed && !self.trigger.occurred && now >= self.trigger.next_trigger_time {
            let event = EventTriggered {
                timestamp: now,
                channel: 0,
                pre_samples: TRIGGER_WINDOW_SAMPLES,
                post_samples: TRIGGER_WINDOW_SAMPLES,
            };
            self.send_unsolicited(CommandId::EventTriggered, &event.encode());

            let (lo, hi) = BURST_PACKETS;
            self.trigger.occurred = true;
            self.trigger.sending = true;
            self.trigger.timestamp = now;
            self.trigger.packets_to_send = self.random.range(lo, hi);
            self.trigger.packets_sent = 0;
            info!(
                timestamp = now,
                packets = self.trigger.packets_to_send,
                "trigger fired"
            );
        }

        if !self.trigger.sending
            || now.wrapping_sub(self.last_data_send_time) < DATA_SEND_INTERVAL_MS
        {
            return;
        }

        if self.trigger.packets_sent < self.trigger.packets_to_send {
            let timestamp = self
                .trigger
                .timestamp
                .wrapping_add(self.trigger.packets_sent * DATA_SEND_INTERVAL_MS);
            self.send_data_packet(timestamp);
            self.trigger.packets_sent += 1;
            self.last_data_send_time = now;
            debug!(
                sent = self.trigger.packets_sent,
                total = self.trigger.packets_to_send,
                "trigger packet sent"
            );
        } else {
            let (lo, hi) = REARM_DELAY_MS;
            self.send_unsolicited(CommandId::BufferTransferComplete, &[]);
            self.trigger.sending = false;
            self.trigger.occurred = false;
            self.trigger.next_trigger_time = now.wrapping_add(self.random.range(lo, hi));
            info!(
                next_trigger_time = self.trigger.next_trigger_time,
                "trigger burst complete"
            );
        }
    }

    fn send_data_packet(&mut self, timestamp: u32) {
        let mut channel_mask = 0u16;
        let mut samples = Vec::new();
        for (id, channel) in self.channels.iter().enumerate() {
            if !channel.enabled {
                continue;
            }
            channel_mask |= 1 << id;
            self.samples.fill(id as u8, timestamp, &mut self.sample_buf);
            samples.extend_from_slice(&self.sample_buf);
        }

        let packet = DataPacket {
            timestamp,
            channel_mask,
            sample_count: SAMPLES_PER_PACKET,
            samples,
        };
        self.send_unsolicited(CommandId::DataPacket, &packet.encode());
    }

    /// Queue a LOG_MESSAGE frame for the host.
    pub fn emit_log(&mut self, level: LogLevel, text: &str) {
        let message = LogMessage::new(level, text);
        self.send_unsolicited(CommandId::LogMessage, &message.encode());
    }

    fn ack(&mut self, seq: u8) {
        self.respond(CommandId::Ack, seq, &[]);
    }

    fn nack(&mut self, seq: u8, reason: Nack) {
        debug!(seq, %reason, "nack");
        self.respond(CommandId::Nack, seq, &reason.encode());
    }

    fn send_unsolicited(&mut self, command: CommandId, payload: &[u8]) {
        let seq = self.seq_counter;
        self.seq_counter = self.seq_counter.wrapping_add(1);
        self.respond(command, seq, payload);
    }

    fn respond(&mut self, command: CommandId, seq: u8, payload: &[u8]) {
        let mut frame = BytesMut::new();
        if let Err(err) = encode_frame(command.code(), seq, payload, &mut frame) {
            warn!(cmd = command.name(), error = %err, "failed to build frame");
            self.dropped_frames += 1;
            return;
        }
        if self.tx.enqueue(&frame) {
            debug!(cmd = command.name(), seq, len = frame.len(), "tx queued");
        } else {
            warn!(cmd = command.name(), seq, "tx queue full, frame dropped");
            self.dropped_frames += 1;
        }
    }
}
