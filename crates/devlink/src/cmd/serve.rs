use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use devlink_device::{
    test_script, Clock, DeviceSession, Endpoint, EndpointStats, MonotonicClock, SeededRandom,
    SessionConfig,
};
use devlink_frame::{decode_frame, encode_frame_into, RxFrameExtractor, MAX_FRAME_SIZE};
use devlink_transport::{LoopbackTransport, TcpServerTransport};

use crate::cmd::{ServeArgs, TransportKind};
use crate::exit::{device_error, frame_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_frame, print_stats, OutputFormat};

const LOOPBACK_PAUSE: Duration = Duration::from_millis(1);

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = match &args.config {
        Some(path) => SessionConfig::from_json_file(path)
            .map_err(|err| device_error(&format!("loading {}", path.display()), err))?,
        None => SessionConfig::default(),
    };
    let mut session =
        DeviceSession::new(config).map_err(|err| device_error("invalid configuration", err))?;
    if let Some(seed) = args.seed {
        session = session.with_random(SeededRandom::seeded(seed));
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    let deadline = args
        .duration_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));

    let (name, stats) = match args.transport {
        TransportKind::Tcp => ("tcp", serve_tcp(session, &args.bind, &running, deadline)?),
        TransportKind::Loopback => (
            "loopback",
            serve_loopback(session, &running, deadline, format)?,
        ),
    };

    print_stats(name, &stats, format);
    Ok(SUCCESS)
}

fn serve_tcp(
    session: DeviceSession,
    bind: &str,
    running: &Arc<AtomicBool>,
    deadline: Option<Instant>,
) -> CliResult<EndpointStats> {
    if let Some(deadline) = deadline {
        let running = Arc::clone(running);
        std::thread::spawn(move || {
            std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
            running.store(false, Ordering::SeqCst);
        });
    }

    let mut endpoint = Endpoint::new(TcpServerTransport::new(), session);
    let connected = endpoint
        .start_while(bind, running)
        .map_err(|err| device_error("waiting for host failed", err))?;
    if !connected {
        endpoint.shutdown();
        return Ok(endpoint.stats());
    }

    let result = endpoint.run(&MonotonicClock::new(), running);
    endpoint.shutdown();
    result.map_err(|err| device_error("serve failed", err))?;
    Ok(endpoint.stats())
}

/// Play the built-in host script into an in-memory transport and print
/// every frame the device answers with.
fn serve_loopback(
    session: DeviceSession,
    running: &AtomicBool,
    deadline: Option<Instant>,
    format: OutputFormat,
) -> CliResult<EndpointStats> {
    let transport = LoopbackTransport::new();
    let host = transport.handle();
    let mut endpoint = Endpoint::new(transport, session);
    endpoint
        .start("test_mode")
        .map_err(|err| device_error("loopback start failed", err))?;

    let mut wire = vec![0u8; MAX_FRAME_SIZE];
    for frame in test_script() {
        let len = encode_frame_into(frame.command, frame.seq, &frame.payload, &mut wire)
            .map_err(|err| frame_error("building test script failed", err))?;
        if host.inject(&wire[..len]) != len {
            return Err(CliError::new(INTERNAL, "test script does not fit the loopback queue"));
        }
    }

    let clock = MonotonicClock::new();
    let mut replies = RxFrameExtractor::new();
    while running.load(Ordering::SeqCst) && deadline.is_none_or(|d| Instant::now() < d) {
        endpoint
            .poll(clock.now_ms())
            .map_err(|err| device_error("serve failed", err))?;

        let sent = host.take_sent();
        if !sent.is_empty() {
            replies.feed(&sent);
            for raw in replies.extract_frames() {
                match decode_frame(&raw) {
                    Ok(frame) => print_frame(&frame, format),
                    Err(err) => tracing::warn!(error = %err, "device sent an invalid frame"),
                }
            }
        }
        std::thread::sleep(LOOPBACK_PAUSE);
    }

    endpoint.shutdown();
    Ok(endpoint.stats())
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
