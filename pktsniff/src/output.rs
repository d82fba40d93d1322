use std::io::Write;
use tokio::sync::mpsc::Receiver;
use tokio::time::{interval, Duration};

use crate::display::write_packet;
use crate::error::CaptureError;
use crate::record::PacketRecord;
use crate::storage::{Storage, BATCH_SIZE};

const FLUSH_INTERVAL: Duration = Duration::from_secs(2);

/// Where the writer task sends each record. Any of them may be absent.
#[derive(Default)]
pub struct Outputs {
    pub display: Option<Box<dyn Write + Send>>,
    pub json: Option<Box<dyn Write + Send>>,
    pub storage: Option<Storage>,
}

/// Counts reported by the writer task once the channel closes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriterSummary {
    pub received: u64,
    pub json_lines: u64,
    pub stored: u64,
}

/// Drain `rx` until every sender is gone, fanning records out to `outputs`.
///
/// SQLite rows are batched and flushed at [`BATCH_SIZE`] records, on a
/// ticker, and once more when the channel closes. The JSON writer is flushed
/// on the ticker and at the end.
pub async fn run_writer(
    mut rx: Receiver<PacketRecord>,
    mut outputs: Outputs,
) -> Result<WriterSummary, CaptureError> {
    let mut summary = WriterSummary::default();
    let mut buffer = Vec::new();
    let mut ticker = interval(FLUSH_INTERVAL);

    loop {
        tokio::select! {
            maybe = rx.recv() => {
                let Some(packet) = maybe else { break };
                summary.received += 1;
                write_one(&mut outputs, &packet, &mut summary)?;
                if outputs.storage.is_some() {
                    buffer.push(packet);
                    if buffer.len() >= BATCH_SIZE {
                        flush_storage(&outputs, &mut buffer, &mut summary)?;
                    }
                }
            }
            _ = ticker.tick() => {
                flush_storage(&outputs, &mut buffer, &mut summary)?;
                if let Some(json) = outputs.json.as_mut() {
                    json.flush().map_err(CaptureError::Output)?;
                }
            }
        }
    }

    flush_storage(&outputs, &mut buffer, &mut summary)?;
    if let Some(json) = outputs.json.as_mut() {
        json.flush().map_err(CaptureError::Output)?;
    }
    if let Some(display) = outputs.display.as_mut() {
        display.flush().map_err(CaptureError::Output)?;
    }

    tracing::debug!(
        "Writer finished: {} received, {} JSON lines, {} stored",
        summary.received,
        summary.json_lines,
        summary.stored
    );
    Ok(summary)
}

fn write_one(
    outputs: &mut Outputs,
    packet: &PacketRecord,
    summary: &mut WriterSummary,
) -> Result<(), CaptureError> {
    if let Some(display) = outputs.display.as_mut() {
        write_packet(display, packet).map_err(CaptureError::Output)?;
    }
    if let Some(json) = outputs.json.as_mut() {
        serde_json::to_writer(&mut *json, packet).map_err(|e| CaptureError::Output(e.into()))?;
        json.write_all(b"\n").map_err(CaptureError::Output)?;
        summary.json_lines += 1;
    }
    Ok(())
}

fn flush_storage(
    outputs: &Outputs,
    buffer: &mut Vec<PacketRecord>,
    summary: &mut WriterSummary,
) -> Result<(), CaptureError> {
    if let Some(storage) = &outputs.storage {
        summary.stored += storage.flush(buffer)? as u64;
    }
    Ok(())
}
