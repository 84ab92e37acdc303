#![warn(missing_docs)]

//! The streaming channel for long-lived multipart responses.
//!
//! An MJPEG-style push endpoint keeps the client socket for minutes and
//! writes one multipart part per frame. A handler opts in by returning
//! [`ResponseKind::Stream`]; the worker then hands the [`Connection`]
//! and the server's shutdown signal to the continuation instead of
//! serializing a buffered response.
//!
//! The loop is paced to a minimum frame interval, sleeps on the
//! shutdown-aware signal (so `Server::stop` never waits out a frame
//! interval), suppresses frames the differencer considers unchanged, and
//! logs a statistics record every five seconds.

use crate::server::ShutdownSignal;
use crate::transport::Connection;
use crate::types::ResponseKind;
use bytes::Bytes;
use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Fraction of changed bytes below which a frame is considered
/// unchanged: 1%.
pub const DEFAULT_DIFF_THRESHOLD: f64 = 0.01;

/// How often the stream logs its statistics record.
const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// One frame a producer hands the channel.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Per-frame content type, e.g. `image/jpeg`.
    pub content_type: String,
    /// The raw frame bytes.
    pub data: Bytes,
}

/// What a producer returned for one cycle.
#[derive(Debug)]
pub enum FramePull {
    /// A frame to (maybe) send.
    Frame(Frame),
    /// The producer already knows nothing changed; skip this cycle.
    Unchanged,
    /// The producer cannot continue; the stream ends.
    Fatal(String),
}

/// A producer of frames - a screen grabber, a camera, a test counter.
///
/// Called once per cycle from the streaming loop. Implementations that
/// block should keep their own timeouts; the loop cannot interrupt a
/// stuck producer.
pub trait FrameSource: Send {
    /// Produces the next frame, or reports that nothing changed, or
    /// fails fatally.
    fn next_frame(&mut self) -> FramePull;
}

/// Byte-level frame differencing for raster producers.
///
/// Compares each frame against the previous one and reports whether the
/// fraction of differing bytes reaches the threshold. Buffers of unequal
/// length always count as changed. The first frame is always changed.
///
/// ## Example
///
/// ```
/// use aqueduct::stream::FrameDiff;
/// use bytes::Bytes;
///
/// let mut diff = FrameDiff::new(0.01);
/// let frame = Bytes::from(vec![0u8; 1000]);
/// assert!(diff.is_changed(&frame));        // first frame
/// assert!(!diff.is_changed(&frame));       // identical
///
/// let mut nudged = vec![0u8; 1000];
/// nudged[0] = 1;                           // 0.1% changed
/// assert!(!diff.is_changed(&Bytes::from(nudged)));
/// ```
#[derive(Debug, Default)]
pub struct FrameDiff {
    prev: Option<Bytes>,
    threshold: f64,
}

impl FrameDiff {
    /// A differencer with the given changed-fraction threshold.
    pub fn new(threshold: f64) -> Self {
        FrameDiff {
            prev: None,
            threshold,
        }
    }

    /// Whether `frame` differs enough from the previous frame to be
    /// worth sending. Updates the reference frame only when it does, so
    /// slow drift eventually accumulates past the threshold.
    pub fn is_changed(&mut self, frame: &Bytes) -> bool {
        let changed = match &self.prev {
            None => true,
            Some(prev) if prev.len() != frame.len() => true,
            Some(prev) => {
                let differing = prev
                    .iter()
                    .zip(frame.iter())
                    .filter(|(a, b)| a != b)
                    .count();
                (differing as f64) >= self.threshold * (frame.len() as f64)
            }
        };
        if changed {
            self.prev = Some(frame.clone());
        }
        changed
    }
}

/// Tuning for one stream.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Target frame rate; the loop enforces a minimum interval of
    /// `1000 / fps` milliseconds per cycle.
    pub fps: u32,
    /// Optional wall-clock cap on the stream's lifetime.
    pub deadline: Option<Duration>,
    /// Changed-byte threshold for differencing; `None` disables it and
    /// every produced frame is written.
    pub diff_threshold: Option<f64>,
    /// Multipart boundary override; generated when `None`.
    pub boundary: Option<String>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        StreamOptions {
            fps: 30,
            deadline: None,
            diff_threshold: Some(DEFAULT_DIFF_THRESHOLD),
            boundary: None,
        }
    }
}

#[derive(Debug, Default)]
struct StreamStats {
    sent: u64,
    skipped: u64,
    bytes: u64,
    window_bytes: u64,
}

/// Writes a `multipart/x-mixed-replace` body over an owned connection
/// until a stop condition fires: producer failure, write failure (peer
/// gone), server shutdown, or the configured deadline.
pub struct StreamChannel {
    boundary: String,
    fps: u32,
    deadline: Option<Duration>,
    differ: Option<FrameDiff>,
}

impl StreamChannel {
    /// Builds a channel from options, generating a boundary if none was
    /// supplied.
    pub fn new(options: StreamOptions) -> Self {
        let boundary = options
            .boundary
            .unwrap_or_else(|| format!("frame-{}", Uuid::new_v4().simple()));
        StreamChannel {
            boundary,
            fps: options.fps.max(1),
            deadline: options.deadline,
            differ: options.diff_threshold.map(FrameDiff::new),
        }
    }

    /// The boundary this stream frames parts with.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Runs the stream to completion. Writes the status line and
    /// multipart headers, then one part per changed frame.
    pub fn run(
        mut self,
        conn: &mut Connection,
        source: &mut dyn FrameSource,
        shutdown: &ShutdownSignal,
    ) -> io::Result<()> {
        let preamble = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: multipart/x-mixed-replace; boundary={}\r\nConnection: close\r\n\r\n",
            self.boundary
        );
        conn.send_all(preamble.as_bytes())?;

        let interval = Duration::from_millis(1000 / u64::from(self.fps));
        let started = Instant::now();
        let mut stats = StreamStats::default();
        let mut last_report = Instant::now();

        while !shutdown.is_shutdown() {
            if let Some(deadline) = self.deadline {
                if started.elapsed() >= deadline {
                    debug!("stream deadline reached");
                    break;
                }
            }

            let cycle = Instant::now();
            match source.next_frame() {
                FramePull::Frame(frame) => {
                    let changed = match self.differ.as_mut() {
                        Some(differ) => differ.is_changed(&frame.data),
                        None => true,
                    };
                    if changed {
                        self.write_frame(conn, &frame)?;
                        stats.sent += 1;
                        stats.bytes += frame.data.len() as u64;
                        stats.window_bytes += frame.data.len() as u64;
                    } else {
                        stats.skipped += 1;
                    }
                }
                FramePull::Unchanged => stats.skipped += 1,
                FramePull::Fatal(reason) => {
                    warn!(reason = %reason, "frame source failed; ending stream");
                    break;
                }
            }

            if last_report.elapsed() >= STATS_INTERVAL {
                let kbps =
                    (stats.window_bytes as f64 / last_report.elapsed().as_secs_f64()) / 1024.0;
                info!(
                    sent = stats.sent,
                    skipped = stats.skipped,
                    bytes = stats.bytes,
                    bandwidth_kib_s = kbps,
                    "stream statistics"
                );
                stats.window_bytes = 0;
                last_report = Instant::now();
            }

            let elapsed = cycle.elapsed();
            if elapsed < interval && shutdown.wait_timeout(interval - elapsed) {
                break;
            }
        }

        debug!(
            sent = stats.sent,
            skipped = stats.skipped,
            bytes = stats.bytes,
            "stream ended"
        );
        Ok(())
    }

    fn write_frame(&self, conn: &mut Connection, frame: &Frame) -> io::Result<()> {
        let head = format!(
            "--{}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
            self.boundary,
            frame.content_type,
            frame.data.len()
        );
        conn.send_all(head.as_bytes())?;
        conn.send_all(&frame.data)?;
        conn.send_all(b"\r\n")
    }
}

/// Convenience for handlers: wraps a source and options into the
/// [`ResponseKind::Stream`] the worker knows how to run.
///
/// ## Example
///
/// ```no_run
/// use aqueduct::stream::{stream_response, FramePull, FrameSource, StreamOptions};
/// use aqueduct::types::ResponseKind;
///
/// struct Camera;
/// impl FrameSource for Camera {
///     fn next_frame(&mut self) -> FramePull {
///         FramePull::Unchanged
///     }
/// }
///
/// let handler = |_ctx: &mut aqueduct::context::Context| -> ResponseKind {
///     stream_response(StreamOptions::default(), Camera)
/// };
/// ```
pub fn stream_response<S>(options: StreamOptions, mut source: S) -> ResponseKind
where
    S: FrameSource + 'static,
{
    ResponseKind::Stream(Box::new(move |mut conn, shutdown| {
        StreamChannel::new(options).run(&mut conn, &mut source, shutdown)
    }))
}
