use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pktsniff_common::{decode_frame, CaptureMode, Protocol, ProtocolFilter};

use crate::error::CaptureError;
use crate::sink::RecordSink;
use crate::socket::RawSocket;

/// Settings for one capture session, fixed once the session starts.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub interface: Option<String>,
    pub mode: CaptureMode,
    pub filter: Option<ProtocolFilter>,
    pub count: Option<u64>,
    pub read_timeout: Duration,
    pub buffer_size: usize,
}

/// Where the kernel says a frame came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOrigin {
    pub ifindex: i32,
    pub packet_type: u8,
}

/// One successful socket read. `data` borrows the source's receive buffer
/// and is only valid until the next read.
#[derive(Debug)]
pub struct RawFrame<'a> {
    pub data: &'a [u8],
    pub captured_at: DateTime<Utc>,
    pub origin: Option<FrameOrigin>,
}

/// Something the capture loop can pull frames from.
pub trait FrameSource {
    /// Block until a frame arrives. `Ok(None)` means the read timed out with
    /// nothing to deliver, so the caller can check for cancellation.
    fn read_frame(&mut self) -> Result<Option<RawFrame<'_>>, CaptureError>;
}

/// Cooperative cancellation flag shared with the signal handler.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    CountReached,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Capturing,
    Stopped(StopReason),
    Failed,
}

/// Totals reported when a session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSummary {
    pub state: CaptureState,
    /// Every frame read, including ones the filter dropped.
    pub frames_observed: u64,
    pub frames_filtered: u64,
    pub records_emitted: u64,
    /// Emitted records by protocol; frames without an IPv4 layer are not
    /// counted here.
    pub per_protocol: BTreeMap<Protocol, u64>,
}

impl CaptureSummary {
    fn new() -> Self {
        Self {
            state: CaptureState::Idle,
            frames_observed: 0,
            frames_filtered: 0,
            records_emitted: 0,
            per_protocol: BTreeMap::new(),
        }
    }
}

/// A capture session in the `Capturing` state: the source is already open.
pub struct CaptureSession<S: FrameSource> {
    source: S,
    config: CaptureConfig,
}

impl CaptureSession<RawSocket> {
    /// Acquire the raw socket. On error the session never starts capturing.
    pub fn open(config: CaptureConfig) -> Result<Self, CaptureError> {
        let source = RawSocket::open(
            config.interface.as_deref(),
            config.mode,
            config.read_timeout,
            config.buffer_size,
        )?;
        Ok(Self::with_source(source, config))
    }
}

impl<S: FrameSource> CaptureSession<S> {
    pub fn with_source(source: S, config: CaptureConfig) -> Self {
        Self { source, config }
    }

    /// Run until the count limit, cancellation, or a fatal error.
    ///
    /// Consumes the session: the source is dropped exactly once when this
    /// returns, whichever way it returns. The sink is flushed on every path.
    pub fn run<K: RecordSink>(
        self,
        sink: &mut K,
        cancel: &CancelToken,
    ) -> Result<CaptureSummary, CaptureError> {
        let Self {
            mut source,
            config,
        } = self;
        let mut summary = CaptureSummary::new();
        summary.state = CaptureState::Capturing;

        tracing::info!(
            interface = config.interface.as_deref().unwrap_or("any"),
            mode = %config.mode,
            filter = ?config.filter,
            count = ?config.count,
            "Capture started"
        );

        let result = capture_loop(&mut source, &config, sink, cancel, &mut summary);
        let flushed = sink.flush();

        match result.and_then(|reason| flushed.map(|()| reason)) {
            Ok(reason) => {
                summary.state = CaptureState::Stopped(reason);
                tracing::info!(
                    ?reason,
                    observed = summary.frames_observed,
                    emitted = summary.records_emitted,
                    filtered = summary.frames_filtered,
                    "Capture stopped"
                );
                Ok(summary)
            }
            Err(e) => {
                summary.state = CaptureState::Failed;
                tracing::error!(
                    observed = summary.frames_observed,
                    emitted = summary.records_emitted,
                    "Capture failed: {}",
                    e
                );
                Err(e)
            }
        }
    }
}

fn capture_loop<S: FrameSource, K: RecordSink>(
    source: &mut S,
    config: &CaptureConfig,
    sink: &mut K,
    cancel: &CancelToken,
    summary: &mut CaptureSummary,
) -> Result<StopReason, CaptureError> {
    loop {
        if cancel.is_cancelled() {
            return Ok(StopReason::Cancelled);
        }

        let frame = match source.read_frame()? {
            Some(frame) => frame,
            None => continue,
        };
        summary.frames_observed += 1;

        let record = decode_frame(frame.data, config.mode);
        if let Some(failure) = record.failure {
            tracing::debug!(len = frame.data.len(), "Partial decode: {}", failure);
        }

        if let Some(filter) = config.filter {
            if !record.protocol.is_some_and(|p| filter.matches(p)) {
                summary.frames_filtered += 1;
                continue;
            }
        }

        sink.emit(summary.records_emitted + 1, &frame, &record)?;
        summary.records_emitted += 1;
        if let Some(protocol) = record.protocol {
            *summary.per_protocol.entry(protocol).or_insert(0) += 1;
        }

        if config
            .count
            .is_some_and(|limit| summary.records_emitted >= limit)
        {
            return Ok(StopReason::CountReached);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pktsniff_common::DecodedRecord;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Replays canned frames, then fails (or cancels) once they run out.
    pub(crate) struct ReplaySource {
        frames: VecDeque<Option<Vec<u8>>>,
        current: Vec<u8>,
        on_exhausted: Option<CancelToken>,
        drops: Rc<Cell<u32>>,
    }

    impl ReplaySource {
        pub(crate) fn new(frames: Vec<Vec<u8>>) -> Self {
            Self {
                frames: frames.into_iter().map(Some).collect(),
                current: Vec::new(),
                on_exhausted: None,
                drops: Rc::new(Cell::new(0)),
            }
        }

        /// Insert a read timeout before every frame.
        fn with_timeouts(mut self) -> Self {
            self.frames = std::mem::take(&mut self.frames)
                .into_iter()
                .flat_map(|f| [None, f])
                .collect();
            self
        }

        fn cancel_when_exhausted(mut self, token: CancelToken) -> Self {
            self.on_exhausted = Some(token);
            self
        }

        fn drop_counter(&self) -> Rc<Cell<u32>> {
            self.drops.clone()
        }
    }

    impl FrameSource for ReplaySource {
        fn read_frame(&mut self) -> Result<Option<RawFrame<'_>>, CaptureError> {
            match self.frames.pop_front() {
                Some(Some(frame)) => {
                    self.current = frame;
                    Ok(Some(RawFrame {
                        data: &self.current,
                        captured_at: Utc::now(),
                        origin: None,
                    }))
                }
                Some(None) => Ok(None),
                None => match &self.on_exhausted {
                    Some(token) => {
                        token.cancel();
                        Ok(None)
                    }
                    None => Err(CaptureError::Read(std::io::Error::new(
                        std::io::ErrorKind::BrokenPipe,
                        "device went away",
                    ))),
                },
            }
        }
    }

    impl Drop for ReplaySource {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    #[derive(Default)]
    struct VecSink {
        records: Vec<(u64, Option<Protocol>, bool)>,
        flushes: u32,
    }

    impl RecordSink for VecSink {
        fn emit(
            &mut self,
            seq: u64,
            _frame: &RawFrame<'_>,
            record: &DecodedRecord<'_>,
        ) -> Result<(), CaptureError> {
            self.records
                .push((seq, record.protocol, record.transport.is_some()));
            Ok(())
        }

        fn flush(&mut self) -> Result<(), CaptureError> {
            self.flushes += 1;
            Ok(())
        }
    }

    pub(crate) fn config(filter: Option<ProtocolFilter>, count: Option<u64>) -> CaptureConfig {
        CaptureConfig {
            interface: None,
            mode: CaptureMode::LinkLayer,
            filter,
            count,
            read_timeout: Duration::from_millis(10),
            buffer_size: 65535,
        }
    }

    /// Ethernet + IPv4 + a minimal transport header for `protocol`.
    pub(crate) fn frame(protocol: u8) -> Vec<u8> {
        let mut f = vec![0x02, 0, 0, 0, 0, 1, 0x02, 0, 0, 0, 0, 2, 0x08, 0x00];
        f.extend_from_slice(&[
            0x45, 0, 0, 40, 0, 0, 0x40, 0, 64, protocol, 0, 0, 10, 0, 0, 1, 10, 0, 0, 2,
        ]);
        match protocol {
            6 => f.extend_from_slice(&[
                0x1f, 0x90, 0xc3, 0x50, 0, 0, 0, 1, 0, 0, 0, 0, 0x50, 0x02, 0xff, 0xff, 0, 0, 0, 0,
            ]),
            17 => f.extend_from_slice(&[0, 53, 0xc3, 0x50, 0, 8, 0, 0]),
            1 => f.extend_from_slice(&[0, 0, 0xff, 0xff]),
            _ => {}
        }
        f
    }

    #[test]
    fn test_filter_discards_but_counts_observed() {
        let source = ReplaySource::new(vec![frame(6)]);
        let token = CancelToken::new();
        let source = source.cancel_when_exhausted(token.clone());
        let mut sink = VecSink::default();

        let summary = CaptureSession::with_source(source, config(Some(ProtocolFilter::Icmp), None))
            .run(&mut sink, &token)
            .unwrap();

        assert!(sink.records.is_empty());
        assert_eq!(summary.frames_observed, 1);
        assert_eq!(summary.frames_filtered, 1);
        assert_eq!(summary.records_emitted, 0);
        assert_eq!(summary.state, CaptureState::Stopped(StopReason::Cancelled));
    }

    #[test]
    fn test_count_limit_ignores_filtered_frames() {
        let frames = vec![frame(6), frame(17), frame(17), frame(1), frame(17), frame(17), frame(17)];
        let source = ReplaySource::new(frames);
        let drops = source.drop_counter();
        let mut sink = VecSink::default();

        let summary = CaptureSession::with_source(source, config(Some(ProtocolFilter::Udp), Some(3)))
            .run(&mut sink, &CancelToken::new())
            .unwrap();

        assert_eq!(summary.state, CaptureState::Stopped(StopReason::CountReached));
        assert_eq!(sink.records.len(), 3);
        assert_eq!(
            sink.records.iter().map(|r| r.0).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(sink.records.iter().all(|r| r.1 == Some(Protocol::Udp)));
        assert_eq!(summary.frames_observed, 5);
        assert_eq!(summary.frames_filtered, 2);
        assert_eq!(summary.per_protocol.get(&Protocol::Udp), Some(&3));
        assert_eq!(drops.get(), 1);
        assert_eq!(sink.flushes, 1);
    }

    #[test]
    fn test_unfiltered_frames_all_reach_sink() {
        let frames = vec![frame(6), frame(17), frame(1), frame(89)];
        let mut sink = VecSink::default();

        let summary = CaptureSession::with_source(ReplaySource::new(frames), config(None, Some(4)))
            .run(&mut sink, &CancelToken::new())
            .unwrap();

        assert_eq!(summary.records_emitted, 4);
        let protocols: Vec<_> = sink.records.iter().map(|r| r.1).collect();
        assert_eq!(
            protocols,
            vec![
                Some(Protocol::Tcp),
                Some(Protocol::Udp),
                Some(Protocol::Icmp),
                Some(Protocol::Other(89))
            ]
        );
        assert!(!sink.records[3].2);
    }

    #[test]
    fn test_truncated_frames_are_emitted_not_dropped() {
        let mut short = frame(6);
        short.truncate(14 + 10);
        let frames = vec![short, vec![0xde, 0xad]];
        let mut sink = VecSink::default();

        let summary = CaptureSession::with_source(ReplaySource::new(frames), config(None, Some(2)))
            .run(&mut sink, &CancelToken::new())
            .unwrap();

        assert_eq!(summary.records_emitted, 2);
        assert_eq!(sink.records[0].1, None);
        assert_eq!(sink.records[1].1, None);
    }

    #[test]
    fn test_unclassified_frames_do_not_match_filter() {
        let frames = vec![vec![0u8; 8], frame(6)];
        let mut sink = VecSink::default();

        let summary = CaptureSession::with_source(
            ReplaySource::new(frames),
            config(Some(ProtocolFilter::Tcp), Some(1)),
        )
        .run(&mut sink, &CancelToken::new())
        .unwrap();

        assert_eq!(summary.frames_filtered, 1);
        assert_eq!(sink.records.len(), 1);
    }

    #[test]
    fn test_read_error_fails_and_releases_source() {
        let source = ReplaySource::new(vec![frame(6)]);
        let drops = source.drop_counter();
        let mut sink = VecSink::default();

        let err = CaptureSession::with_source(source, config(None, None))
            .run(&mut sink, &CancelToken::new())
            .unwrap_err();

        assert!(matches!(err, CaptureError::Read(_)));
        assert_eq!(sink.records.len(), 1);
        assert_eq!(sink.flushes, 1);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_cancellation_before_first_read() {
        let source = ReplaySource::new(vec![frame(6)]);
        let drops = source.drop_counter();
        let token = CancelToken::new();
        token.cancel();
        let mut sink = VecSink::default();

        let summary = CaptureSession::with_source(source, config(None, None))
            .run(&mut sink, &token)
            .unwrap();

        assert_eq!(summary.state, CaptureState::Stopped(StopReason::Cancelled));
        assert_eq!(summary.frames_observed, 0);
        assert_eq!(sink.flushes, 1);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_timeouts_are_not_frames() {
        let token = CancelToken::new();
        let source = ReplaySource::new(vec![frame(1), frame(1)])
            .with_timeouts()
            .cancel_when_exhausted(token.clone());
        let mut sink = VecSink::default();

        let summary = CaptureSession::with_source(source, config(None, None))
            .run(&mut sink, &token)
            .unwrap();

        assert_eq!(summary.frames_observed, 2);
        assert_eq!(summary.records_emitted, 2);
        assert_eq!(summary.state, CaptureState::Stopped(StopReason::Cancelled));
    }

    struct ClosedSink;

    impl RecordSink for ClosedSink {
        fn emit(
            &mut self,
            _seq: u64,
            _frame: &RawFrame<'_>,
            _record: &DecodedRecord<'_>,
        ) -> Result<(), CaptureError> {
            Err(CaptureError::SinkClosed)
        }
    }

    #[test]
    fn test_closed_sink_fails_session() {
        let source = ReplaySource::new(vec![frame(17)]);
        let drops = source.drop_counter();

        let err = CaptureSession::with_source(source, config(None, None))
            .run(&mut ClosedSink, &CancelToken::new())
            .unwrap_err();

        assert!(matches!(err, CaptureError::SinkClosed));
        assert_eq!(drops.get(), 1);
    }
}
