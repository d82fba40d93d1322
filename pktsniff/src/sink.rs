use tokio::sync::mpsc::Sender;

use pktsniff_common::DecodedRecord;

use crate::capture::RawFrame;
use crate::error::CaptureError;
use crate::record::PacketRecord;

/// Consumer of decoded records, called synchronously in capture order.
pub trait RecordSink {
    /// `seq` is the 1-based index of the record among those emitted.
    fn emit(
        &mut self,
        seq: u64,
        frame: &RawFrame<'_>,
        record: &DecodedRecord<'_>,
    ) -> Result<(), CaptureError>;

    fn flush(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }
}

/// Forwards records over a bounded channel to the output task.
///
/// Must be driven from a plain thread, not from inside the runtime:
/// `blocking_send` parks the capture thread while the queue is full.
pub struct ChannelSink {
    tx: Sender<PacketRecord>,
}

impl ChannelSink {
    pub fn new(tx: Sender<PacketRecord>) -> Self {
        Self { tx }
    }
}

impl RecordSink for ChannelSink {
    fn emit(
        &mut self,
        seq: u64,
        frame: &RawFrame<'_>,
        record: &DecodedRecord<'_>,
    ) -> Result<(), CaptureError> {
        self.tx
            .blocking_send(PacketRecord::from_decoded(seq, frame, record))
            .map_err(|_| CaptureError::SinkClosed)
    }
}
