use crate::record::PacketRecord;
use rusqlite::{params, Connection, Result};
use std::sync::{Arc, Mutex};

/// Records buffered before a batch insert.
pub const BATCH_SIZE: usize = 1000;

#[derive(Clone)]
pub struct Storage {
    conn: Arc<Mutex<Connection>>,
}

impl Storage {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        let _: String = conn.query_row("PRAGMA journal_mode=WAL;", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA synchronous=NORMAL;")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS packets (
                id INTEGER PRIMARY KEY,
                idx INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                length INTEGER NOT NULL,
                src_mac TEXT,
                dst_mac TEXT,
                ether_type INTEGER,
                src_ip TEXT,
                dst_ip TEXT,
                ttl INTEGER,
                protocol TEXT,
                src_port INTEGER,
                dst_port INTEGER,
                tcp_flags TEXT,
                udp_length INTEGER,
                icmp_type INTEGER,
                icmp_code INTEGER,
                payload_length INTEGER NOT NULL,
                decode_error TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_timestamp ON packets(timestamp)",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert `buffer` in one transaction and clear it on commit.
    ///
    /// Rows that fail to insert are logged and skipped; a failed commit
    /// leaves the buffer untouched and returns the error.
    pub fn flush(&self, buffer: &mut Vec<PacketRecord>) -> Result<usize> {
        if buffer.is_empty() {
            return Ok(0);
        }
        // A poisoned lock only means another writer panicked mid-batch; the
        // connection itself is still usable.
        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let tx = conn.transaction()?;
        let mut written = 0;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO packets (idx, timestamp, length, src_mac, dst_mac, ether_type,
                    src_ip, dst_ip, ttl, protocol, src_port, dst_port, tcp_flags,
                    udp_length, icmp_type, icmp_code, payload_length, decode_error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            )?;

            for rec in buffer.iter() {
                let eth = rec.ethernet.as_ref();
                let ip = rec.ipv4.as_ref();
                let (src_port, dst_port) = match (&rec.tcp, &rec.udp) {
                    (Some(t), _) => (Some(t.src_port), Some(t.dst_port)),
                    (_, Some(u)) => (Some(u.src_port), Some(u.dst_port)),
                    _ => (None, None),
                };
                let res = stmt.execute(params![
                    rec.index as i64,
                    rec.timestamp.timestamp_millis(),
                    rec.length as i64,
                    eth.map(|e| e.src_mac.as_str()),
                    eth.map(|e| e.dst_mac.as_str()),
                    eth.map(|e| e.ether_type),
                    ip.map(|i| i.src_ip.as_str()),
                    ip.map(|i| i.dst_ip.as_str()),
                    ip.map(|i| i.ttl),
                    rec.protocol,
                    src_port,
                    dst_port,
                    rec.tcp.as_ref().map(|t| t.flags.as_str()),
                    rec.udp.as_ref().map(|u| u.length),
                    rec.icmp.as_ref().map(|i| i.icmp_type),
                    rec.icmp.as_ref().map(|i| i.code),
                    rec.payload_length as i64,
                    rec.decode_error,
                ]);
                match res {
                    Ok(_) => written += 1,
                    Err(e) => tracing::warn!("Failed to insert packet #{}: {}", rec.index, e),
                }
            }
        }

        tx.commit()?;
        buffer.clear();
        Ok(written)
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.query_row("SELECT COUNT(*) FROM packets", [], |row| row.get(0))
    }
}
