use bytes::BytesMut;
use devlink_device::{
    test_script, DataPacket, DeviceSession, Endpoint, EventTriggered, Nack, ScriptedRandom,
    StatusReport, StreamMode, StreamStatus,
};
use devlink_frame::{decode_frame, encode_frame, Frame, RxFrameExtractor};
use devlink_transport::{LoopbackHandle, LoopbackTransport};

fn connected(random: &[u32]) -> (Endpoint<LoopbackTransport>, LoopbackHandle) {
    let transport = LoopbackTransport::new();
    let handle = transport.handle();
    let session = DeviceSession::default().with_random(ScriptedRandom::new(random.to_vec()));
    let mut endpoint = Endpoint::new(transport, session);
    endpoint.start("test_mode").unwrap();
    (endpoint, handle)
}

fn send(handle: &LoopbackHandle, command: u8, seq: u8, payload: &[u8]) {
    let mut buf = BytesMut::new();
    encode_frame(command, seq, payload, &mut buf).unwrap();
    assert_eq!(handle.inject(&buf), buf.len());
}

fn received(handle: &LoopbackHandle) -> Vec<Frame> {
    let bytes = handle.take_sent();
    let mut rx = RxFrameExtractor::new();
    assert_eq!(rx.feed(&bytes), bytes.len());
    let frames = rx
        .extract_frames()
        .map(|raw| decode_frame(&raw).unwrap())
        .collect();
    assert_eq!(rx.buffered(), 0);
    frames
}

#[test]
fn trigger_burst_after_scripted_setup() {
    // First trigger 5000 + 2000 ms after arming, 5 + 3 packets, re-arm after 10000 ms.
    let (mut endpoint, handle) = connected(&[2000, 3, 0]);
    for frame in test_script() {
        send(&handle, frame.command, frame.seq, &frame.payload);
    }

    endpoint.poll(0).unwrap();
    let replies = received(&handle);
    assert_eq!(replies.len(), 5);
    assert!(replies.iter().zip(0u8..).all(|(f, seq)| f.seq == seq));

    for now in (10..7000).step_by(10) {
        endpoint.poll(now).unwrap();
    }
    assert!(received(&handle).is_empty());

    for now in (7000..=7200).step_by(10) {
        endpoint.poll(now).unwrap();
    }
    let burst = received(&handle);
    assert_eq!(burst.len(), 1 + 8 + 1);

    assert_eq!(burst[0].command, 0x41);
    let event = EventTriggered::decode(&burst[0].payload).unwrap();
    assert_eq!(event.timestamp, 7000);
    assert_eq!(event.channel, 0);
    assert_eq!((event.pre_samples, event.post_samples), (1000, 1000));

    for (i, frame) in burst[1..9].iter().enumerate() {
        assert_eq!(frame.command, 0x40);
        let packet = DataPacket::decode(&frame.payload).unwrap();
        assert_eq!(packet.timestamp, 7000 + 10 * i as u32);
        assert_eq!(packet.channel_mask, 0b11);
        assert_eq!(packet.sample_count, 100);
    }

    assert_eq!(burst[9].command, 0x4F);
    assert!(burst[9].payload.is_empty());
    let seqs: Vec<u8> = burst.iter().map(|f| f.seq).collect();
    assert_eq!(seqs, (0..10).collect::<Vec<u8>>());

    let trigger = endpoint.session().trigger();
    assert!(!trigger.sending && !trigger.occurred && trigger.armed);
    assert_eq!(trigger.next_trigger_time, 7080 + 10_000);
}

#[test]
fn empty_configure_stream_is_rejected() {
    let (mut endpoint, handle) = connected(&[0]);
    send(&handle, 0x14, 2, &[]);
    endpoint.poll(0).unwrap();

    let frames = received(&handle);
    assert_eq!(frames.len(), 1);
    assert_eq!((frames[0].command, frames[0].seq), (0x91, 2));
    assert_eq!(Nack::decode(&frames[0].payload).unwrap(), Nack::ParamError(0x01));
}

#[test]
fn unknown_command_is_rejected() {
    let (mut endpoint, handle) = connected(&[0]);
    send(&handle, 0x99, 7, &[]);
    endpoint.poll(0).unwrap();

    let frames = received(&handle);
    assert_eq!(frames.len(), 1);
    assert_eq!((frames[0].command, frames[0].seq), (0x91, 7));
    assert_eq!(frames[0].payload.as_ref(), &[0x05, 0x00]);
}

#[test]
fn buffered_data_before_trigger_is_rejected() {
    let (mut endpoint, handle) = connected(&[0]);
    send(&handle, 0x42, 3, &[]);
    endpoint.poll(0).unwrap();

    let frames = received(&handle);
    assert_eq!(frames.len(), 1);
    assert_eq!((frames[0].command, frames[0].seq), (0x91, 3));
    assert_eq!(frames[0].payload.as_ref(), &[0x02, 0x02]);
}

#[test]
fn resync_after_garbage_and_bogus_header() {
    let (mut endpoint, handle) = connected(&[0]);
    handle.inject(&[0x13, 0xAA, 0x55, 0xFF, 0x7F, 0x00, 0x00]);
    send(&handle, 0x01, 5, &[]);
    endpoint.poll(0).unwrap();

    let frames = received(&handle);
    assert_eq!(frames.len(), 1);
    assert_eq!((frames[0].command, frames[0].seq), (0x81, 5));
}

#[test]
fn continuous_stream_until_stopped() {
    let (mut endpoint, handle) = connected(&[0]);
    send(&handle, 0x12, 1, &[]);
    endpoint.poll(0).unwrap();
    assert_eq!(received(&handle)[0].command, 0x90);

    for now in (10..=100).step_by(10) {
        endpoint.poll(now).unwrap();
    }
    let packets = received(&handle);
    assert_eq!(packets.len(), 10);
    assert!(packets.iter().all(|f| f.command == 0x40));

    send(&handle, 0x02, 2, &[]);
    endpoint.poll(105).unwrap();
    let status = received(&handle);
    let report = StatusReport::decode(&status[0].payload).unwrap();
    assert_eq!(report.mode, StreamMode::Continuous);
    assert_eq!(report.status, StreamStatus::Running);

    send(&handle, 0x13, 3, &[]);
    endpoint.poll(110).unwrap();
    let frames = received(&handle);
    assert_eq!(frames.len(), 1);
    assert_eq!((frames[0].command, frames[0].seq), (0x90, 3));

    for now in (120..300).step_by(10) {
        endpoint.poll(now).unwrap();
    }
    assert!(received(&handle).is_empty());
}
