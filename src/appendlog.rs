//!
//! Append-only log: a bounded-channel writer task serializes executed
//! mutating commands back to wire bytes, and startup replay re-executes
//! them through a pre-authenticated loopback connection.
//!
//! A `SELECT` frame is written ahead of a command whenever the publishing
//! connection's selected database differs from the last entry written,
//! the same convention Redis's own AOF uses to keep replay database-index
//! correct without stamping every single frame.
//!

use std::path::PathBuf;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::connection::{dispatch, loopback_state};
use crate::dbset::DatabaseSet;
use crate::registry::CommandRegistry;
use crate::resp::{encode_frame, spawn_parser, RequestError};

struct Entry {
    db_index: usize,
    frame: Vec<u8>,
}

#[derive(Clone)]
pub struct AppendLogHandle {
    tx: mpsc::Sender<Entry>,
}

impl AppendLogHandle {
    /// Hand `frame` to the writer task, waiting for room if the channel is
    /// full. A full channel means the writer is falling behind; blocking
    /// here makes that backpressure the caller's to feel, instead of
    /// silently dropping a mutation that replay would then never see.
    pub async fn publish(&self, db_index: usize, frame: Vec<u8>) {
        if self.tx.send(Entry { db_index, frame }).await.is_err() {
            warn!("append log writer task has stopped; mutation was not recorded");
        }
    }
}

pub fn spawn_writer(path: PathBuf, capacity: usize) -> (AppendLogHandle, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<Entry>(capacity);
    let handle = tokio::spawn(async move {
        let file = match OpenOptions::new().create(true).append(true).open(&path).await {
            Ok(f) => f,
            Err(e) => {
                error!(error = %e, path = %path.display(), "failed to open append log for writing");
                return;
            }
        };
        let mut writer = BufWriter::new(file);
        let mut last_db: Option<usize> = None;

        while let Some(entry) = rx.recv().await {
            if last_db != Some(entry.db_index) {
                let select = encode_frame(&[b"SELECT".to_vec(), entry.db_index.to_string().into_bytes()]);
                if writer.write_all(&select).await.is_err() {
                    break;
                }
                last_db = Some(entry.db_index);
            }
            if writer.write_all(&entry.frame).await.is_err() {
                break;
            }
            if writer.flush().await.is_err() {
                break;
            }
        }
    });
    (AppendLogHandle { tx }, handle)
}

/// Replay an existing append log at startup. A missing file is not an
/// error — it means this is a fresh database. A malformed tail (e.g. a
/// frame truncated by a crash mid-write) stops replay at that point
/// rather than failing startup.
pub async fn replay(path: &PathBuf, registry: &CommandRegistry, dbset: &DatabaseSet) {
    let file = match File::open(path).await {
        Ok(f) => f,
        Err(_) => {
            info!(path = %path.display(), "no append log found, starting empty");
            return;
        }
    };

    let mut rx = spawn_parser(file, 256);
    let conn = loopback_state();
    let mut applied = 0u64;

    while let Some(req) = rx.recv().await {
        match req.err {
            Some(RequestError::Eof) => break,
            Some(RequestError::Protocol(msg)) => {
                warn!(reason = %msg, "append log replay stopped at malformed frame");
                break;
            }
            Some(RequestError::Io(e)) => {
                warn!(error = %e, "append log replay stopped on i/o error");
                break;
            }
            None => {}
        }
        let Some(name) = req.command_name() else { continue };
        dispatch(&conn, registry, dbset, None, &name, &req.args).await;
        applied += 1;
    }
    info!(frames = applied, "append log replay complete");
}
