use std::io::{ErrorKind, Read, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Host used when the config names none.
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Port used when the config names none (or an unusable one).
pub const DEFAULT_PORT: u16 = 9001;

const SEND_RETRY_PAUSE: Duration = Duration::from_millis(1);
const ACCEPT_POLL_PAUSE: Duration = Duration::from_millis(10);

/// Single-client TCP server transport.
///
/// `wait_connection` blocks until one host connects; the accepted stream is
/// switched to non-blocking mode so `recv` can be polled from the driving loop.
#[derive(Debug, Default)]
pub struct TcpServerTransport {
    listener: Option<TcpListener>,
    client: Option<TcpStream>,
    peer: Option<SocketAddr>,
}

impl TcpServerTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind and listen on an explicit socket address.
    pub fn bind(&mut self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr).map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        info!(%addr, "listening for host connection");
        self.listener = Some(listener);
        Ok(())
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Address of the connected host, if any.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn attach(&mut self, stream: TcpStream, peer: SocketAddr) -> Result<()> {
        stream.set_nonblocking(true)?;
        let _ = stream.set_nodelay(true);
        info!(%peer, "host connected");
        self.client = Some(stream);
        self.peer = Some(peer);
        Ok(())
    }
}

impl Transport for TcpServerTransport {
    fn init(&mut self, config: &str) -> Result<()> {
        let (host, port) = parse_bind_addr(config);
        let ip = if host == DEFAULT_BIND_HOST {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            match host.parse::<IpAddr>() {
                Ok(ip) => ip,
                Err(_) => {
                    warn!(%host, "unparseable bind host, falling back to any address");
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
                }
            }
        };
        self.bind(SocketAddr::new(ip, port))
    }

    fn wait_connection(&mut self) -> Result<()> {
        let listener = self.listener.as_ref().ok_or(TransportError::NotConnected)?;
        listener.set_nonblocking(false)?;
        let (stream, peer) = listener.accept().map_err(TransportError::Accept)?;
        self.attach(stream, peer)
    }

    fn wait_connection_while(&mut self, running: &AtomicBool) -> Result<bool> {
        let listener = self.listener.as_ref().ok_or(TransportError::NotConnected)?;
        listener.set_nonblocking(true)?;
        loop {
            if !running.load(Ordering::SeqCst) {
                info!("stopped waiting for host connection");
                return Ok(false);
            }
            let accepted = match self.listener.as_ref() {
                Some(listener) => listener.accept(),
                None => return Err(TransportError::NotConnected),
            };
            match accepted {
                Ok((stream, peer)) => {
                    self.attach(stream, peer)?;
                    return Ok(true);
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(ACCEPT_POLL_PAUSE);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Accept(err)),
            }
        }
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        let stream = self.client.as_mut().ok_or(TransportError::NotConnected)?;
        if buf.is_empty() {
            return Ok(0);
        }
        match stream.read(buf) {
            Ok(0) => {
                info!("host closed connection");
                Err(TransportError::Closed)
            }
            Ok(n) => Ok(n),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(0),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn send(&mut self, buf: &[u8]) -> Result<usize> {
        let stream = self.client.as_mut().ok_or(TransportError::NotConnected)?;
        let mut sent = 0usize;
        // A frame is never left half-written: wait out a full socket buffer.
        while sent < buf.len() {
            match stream.write(&buf[sent..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => sent += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(SEND_RETRY_PAUSE);
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        Ok(sent)
    }

    fn cleanup(&mut self) {
        if let Some(stream) = self.client.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            debug!("client stream closed");
        }
        self.listener = None;
        self.peer = None;
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

/// Split a bind config into host and port.
///
/// Accepts `tcp://host:port`, `host:port`, a bare port, or a bare host. Missing
/// or out-of-range parts fall back to [`DEFAULT_BIND_HOST`] / [`DEFAULT_PORT`].
pub fn parse_bind_addr(config: &str) -> (String, u16) {
    let mut host = DEFAULT_BIND_HOST.to_string();
    let mut port = DEFAULT_PORT;

    let cfg = config.trim();
    if cfg.is_empty() {
        return (host, port);
    }
    let cfg = match cfg.find("://") {
        Some(idx) => &cfg[idx + 3..],
        None => cfg,
    };

    if let Some(colon) = cfg.rfind(':') {
        let (h, p) = (&cfg[..colon], &cfg[colon + 1..]);
        if !h.is_empty() {
            host = h.to_string();
        }
        if let Some(parsed) = parse_port(p) {
            port = parsed;
        }
        return (host, port);
    }

    if !cfg.is_empty() && cfg.bytes().all(|b| b.is_ascii_digit()) {
        if let Some(parsed) = parse_port(cfg) {
            port = parsed;
        }
        return (host, port);
    }

    (cfg.to_string(), port)
}

fn parse_port(text: &str) -> Option<u16> {
    match text.parse::<u32>() {
        Ok(p) if (1..=65535).contains(&p) => Some(p as u16),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bind_addr_defaults() {
        assert_eq!(parse_bind_addr(""), ("0.0.0.0".to_string(), 9001));
    }

    #[test]
    fn parse_bind_addr_forms() {
        assert_eq!(
            parse_bind_addr("tcp://127.0.0.1:7000"),
            ("127.0.0.1".to_string(), 7000)
        );
        assert_eq!(
            parse_bind_addr("10.0.0.2:1234"),
            ("10.0.0.2".to_string(), 1234)
        );
        assert_eq!(parse_bind_addr("8080"), ("0.0.0.0".to_string(), 8080));
        assert_eq!(
            parse_bind_addr("localhost"),
            ("localhost".to_string(), 9001)
        );
    }

    #[test]
    fn parse_bind_addr_rejects_bad_ports() {
        assert_eq!(
            parse_bind_addr("127.0.0.1:0"),
            ("127.0.0.1".to_string(), 9001)
        );
        assert_eq!(
            parse_bind_addr("127.0.0.1:70000"),
            ("127.0.0.1".to_string(), 9001)
        );
        assert_eq!(parse_bind_addr("127.0.0.1:abc").1, 9001);
    }

    #[test]
    fn recv_before_connection_is_an_error() {
        let mut transport = TcpServerTransport::new();
        let mut buf = [0u8; 8];
        assert!(matches!(
            transport.recv(&mut buf),
            Err(TransportError::NotConnected)
        ));
    }

    #[test]
    fn accept_recv_send_roundtrip() {
        let mut transport = TcpServerTransport::new();
        transport.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = transport.local_addr().unwrap();

        let client = std::thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream.write_all(b"hello").unwrap();
            let mut reply = [0u8; 5];
            stream.read_exact(&mut reply).unwrap();
            reply
        });

        transport.wait_connection().unwrap();
        assert!(transport.peer_addr().is_some());

        let mut buf = [0u8; 16];
        let mut got = Vec::new();
        let deadline = std::time::Instant::now() + Duration::from_secs(3);
        while got.len() < 5 && std::time::Instant::now() < deadline {
            let n = transport.recv(&mut buf).unwrap();
            got.extend_from_slice(&buf[..n]);
            if n == 0 {
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        assert_eq!(got, b"hello");

        assert_eq!(transport.send(b"world").unwrap(), 5);
        assert_eq!(&client.join().unwrap(), b"world");
        transport.cleanup();
    }

    #[test]
    fn cleared_flag_abandons_accept() {
        let mut transport = TcpServerTransport::new();
        transport.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let running = AtomicBool::new(true);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                std::thread::sleep(Duration::from_millis(50));
                running.store(false, Ordering::SeqCst);
            });
            assert!(!transport.wait_connection_while(&running).unwrap());
        });
        assert!(transport.peer_addr().is_none());
    }

    #[test]
    fn polled_accept_attaches_client() {
        let mut transport = TcpServerTransport::new();
        transport.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = transport.local_addr().unwrap();

        let client = std::thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream.write_all(b"hi").unwrap();
            stream
        });

        let running = AtomicBool::new(true);
        assert!(transport.wait_connection_while(&running).unwrap());
        assert!(transport.peer_addr().is_some());

        let mut buf = [0u8; 4];
        let mut got = Vec::new();
        let deadline = std::time::Instant::now() + Duration::from_secs(3);
        while got.len() < 2 && std::time::Instant::now() < deadline {
            let n = transport.recv(&mut buf).unwrap();
            got.extend_from_slice(&buf[..n]);
            if n == 0 {
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        assert_eq!(got, b"hi");
        drop(client.join().unwrap());
        transport.cleanup();
    }

    #[test]
    fn recv_reports_closed_connection() {
        let mut transport = TcpServerTransport::new();
        transport.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = transport.local_addr().unwrap();

        let client = std::thread::spawn(move || {
            let stream = TcpStream::connect(addr).unwrap();
            drop(stream);
        });
        transport.wait_connection().unwrap();
        client.join().unwrap();

        let mut buf = [0u8; 16];
        let deadline = std::time::Instant::now() + Duration::from_secs(3);
        loop {
            match transport.recv(&mut buf) {
                Ok(0) if std::time::Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(1));
                }
                Ok(n) => panic!("unexpected result: {n}"),
                Err(err) => {
                    assert!(matches!(err, TransportError::Closed));
                    break;
                }
            }
        }
    }
}
