use super::integration_test::spawn_server;
use crate::config::Config;
use crate::server::ShutdownSignal;
use crate::stream::{
    Frame, FrameDiff, FramePull, FrameSource, StreamChannel, StreamOptions, stream_response,
};
use crate::transport::Connection;
use bytes::Bytes;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Emits a distinct numbered frame every cycle.
struct CounterSource {
    n: u32,
}

impl FrameSource for CounterSource {
    fn next_frame(&mut self) -> FramePull {
        self.n += 1;
        FramePull::Frame(Frame {
            content_type: "text/plain".to_string(),
            data: Bytes::from(format!("frame-{}", self.n)),
        })
    }
}

/// Emits the same frame forever.
struct StaticSource {
    payload: Bytes,
}

impl FrameSource for StaticSource {
    fn next_frame(&mut self) -> FramePull {
        FramePull::Frame(Frame {
            content_type: "application/octet-stream".to_string(),
            data: self.payload.clone(),
        })
    }
}

// ── frame differencing ──

#[test]
fn first_frame_always_counts_as_changed() {
    let mut diff = FrameDiff::new(0.01);
    assert!(diff.is_changed(&Bytes::from(vec![0u8; 100])));
}

#[test]
fn identical_frames_are_suppressed() {
    let mut diff = FrameDiff::new(0.01);
    let frame = Bytes::from(vec![7u8; 1000]);
    assert!(diff.is_changed(&frame));
    assert!(!diff.is_changed(&frame));
    assert!(!diff.is_changed(&frame));
}

#[test]
fn changes_below_the_threshold_are_suppressed() {
    let mut diff = FrameDiff::new(0.01);
    assert!(diff.is_changed(&Bytes::from(vec![0u8; 1000])));

    // 5 of 1000 bytes changed: 0.5% < 1%.
    let mut nudged = vec![0u8; 1000];
    for byte in nudged.iter_mut().take(5) {
        *byte = 1;
    }
    assert!(!diff.is_changed(&Bytes::from(nudged)));
}

#[test]
fn changes_at_the_threshold_pass() {
    let mut diff = FrameDiff::new(0.01);
    assert!(diff.is_changed(&Bytes::from(vec![0u8; 1000])));

    // 20 of 1000 bytes changed: 2% >= 1%.
    let mut moved = vec![0u8; 1000];
    for byte in moved.iter_mut().take(20) {
        *byte = 1;
    }
    assert!(diff.is_changed(&Bytes::from(moved)));
}

#[test]
fn a_length_change_always_passes() {
    let mut diff = FrameDiff::new(0.01);
    assert!(diff.is_changed(&Bytes::from(vec![0u8; 100])));
    assert!(diff.is_changed(&Bytes::from(vec![0u8; 101])));
}

// ── the channel itself, over a socket pair ──

fn socket_pair() -> (Connection, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let (server_side, _) = listener.accept().unwrap();
    (Connection::from_stream(server_side).unwrap(), client)
}

#[test]
fn writes_preamble_and_framed_parts() {
    let (mut conn, mut client) = socket_pair();
    let shutdown = Arc::new(ShutdownSignal::new());

    let writer = thread::spawn({
        let shutdown = shutdown.clone();
        move || {
            let channel = StreamChannel::new(StreamOptions {
                fps: 100,
                deadline: Some(Duration::from_millis(200)),
                diff_threshold: None,
                boundary: Some("tick".to_string()),
            });
            let mut source = CounterSource { n: 0 };
            let _ = channel.run(&mut conn, &mut source, &shutdown);
        }
    });

    let mut received = Vec::new();
    client.read_to_end(&mut received).unwrap();
    writer.join().unwrap();

    let text = String::from_utf8_lossy(&received);
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains("Content-Type: multipart/x-mixed-replace; boundary=tick\r\n"));
    assert!(text.contains("Connection: close\r\n"));
    assert!(text.contains("--tick\r\nContent-Type: text/plain\r\nContent-Length: 7\r\n\r\nframe-1\r\n"));
    assert!(text.contains("frame-2"), "several frames fit in 200ms at 100fps");
}

#[test]
fn differencing_suppresses_an_unchanging_source() {
    let (mut conn, mut client) = socket_pair();
    let shutdown = Arc::new(ShutdownSignal::new());

    let writer = thread::spawn({
        let shutdown = shutdown.clone();
        move || {
            let channel = StreamChannel::new(StreamOptions {
                fps: 100,
                deadline: Some(Duration::from_millis(300)),
                diff_threshold: Some(0.01),
                boundary: Some("still".to_string()),
            });
            let mut source = StaticSource {
                payload: Bytes::from(vec![42u8; 1000]),
            };
            let _ = channel.run(&mut conn, &mut source, &shutdown);
        }
    });

    let mut received = Vec::new();
    client.read_to_end(&mut received).unwrap();
    writer.join().unwrap();

    let text = String::from_utf8_lossy(&received);
    let frames = text.matches("--still\r\n").count();
    assert_eq!(frames, 1, "only the first frame of an unchanging source is sent");
}

#[test]
fn fatal_producer_errors_end_the_stream() {
    struct FailingSource;
    impl FrameSource for FailingSource {
        fn next_frame(&mut self) -> FramePull {
            FramePull::Fatal("capture device unplugged".to_string())
        }
    }

    let (mut conn, mut client) = socket_pair();
    let shutdown = Arc::new(ShutdownSignal::new());

    let writer = thread::spawn({
        let shutdown = shutdown.clone();
        move || {
            let channel = StreamChannel::new(StreamOptions {
                fps: 100,
                deadline: None,
                diff_threshold: None,
                boundary: Some("b".to_string()),
            });
            let _ = channel.run(&mut conn, &mut FailingSource, &shutdown);
        }
    });

    let mut received = Vec::new();
    client.read_to_end(&mut received).unwrap();
    writer.join().unwrap();

    let text = String::from_utf8_lossy(&received);
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"), "preamble was written");
    assert!(!text.contains("--b\r\n"), "no frame was written");
}

// ── end to end through the server ──

#[test]
fn stream_handlers_take_the_socket_over() {
    let (handle, join, addr) = spawn_server(Config::new(), |server| {
        server
            .router()
            .get("/stream", |_ctx| {
                stream_response(
                    StreamOptions {
                        fps: 50,
                        deadline: Some(Duration::from_secs(2)),
                        diff_threshold: None,
                        boundary: Some("live".to_string()),
                    },
                    CounterSource { n: 0 },
                )
            })
            .unwrap();
    });

    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(b"GET /stream HTTP/1.1\r\n\r\n").unwrap();
    client
        .set_read_timeout(Some(Duration::from_millis(100)))
        .unwrap();

    let mut received = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        let mut chunk = [0u8; 4096];
        match client.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => received.extend_from_slice(&chunk[..n]),
            Err(_) => {}
        }
        let text = String::from_utf8_lossy(&received);
        if text.matches("--live\r\n").count() >= 2 {
            break;
        }
    }

    let text = String::from_utf8_lossy(&received);
    assert!(text.contains("multipart/x-mixed-replace; boundary=live"));
    assert!(text.matches("--live\r\n").count() >= 2);

    handle.stop();
    join.join().unwrap().unwrap();
}

#[test]
fn server_stop_interrupts_a_sleeping_stream() {
    let (handle, join, addr) = spawn_server(Config::new(), |server| {
        server
            .router()
            .get("/slow-stream", |_ctx| {
                stream_response(
                    StreamOptions {
                        // A one-second frame interval: a stop that waited
                        // out the sleep would blow the assertion below.
                        fps: 1,
                        deadline: None,
                        diff_threshold: None,
                        boundary: Some("slow".to_string()),
                    },
                    CounterSource { n: 0 },
                )
            })
            .unwrap();
    });

    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(b"GET /slow-stream HTTP/1.1\r\n\r\n").unwrap();
    client
        .set_read_timeout(Some(Duration::from_millis(200)))
        .unwrap();

    // Wait for the first frame so the stream is mid-interval.
    let mut received = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        let mut chunk = [0u8; 1024];
        match client.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => received.extend_from_slice(&chunk[..n]),
            Err(_) => {}
        }
        if String::from_utf8_lossy(&received).contains("frame-1") {
            break;
        }
    }
    assert!(String::from_utf8_lossy(&received).contains("frame-1"));

    let stop_started = Instant::now();
    handle.stop();
    join.join().unwrap().unwrap();
    let elapsed = stop_started.elapsed();

    assert!(
        elapsed < Duration::from_millis(900),
        "shutdown must wake the sleeping stream, took {elapsed:?}"
    );

    // The stream socket is closed out from under the client.
    let mut rest = Vec::new();
    client
        .set_read_timeout(Some(Duration::from_secs(1)))
        .unwrap();
    let _ = client.read_to_end(&mut rest);
}
