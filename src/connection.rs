//!
//! Per-connection state machine: NEW → AUTHED → (SELECTED)* → CLOSED.
//! One parser task decodes frames into a bounded channel; this handler
//! loop drains it and writes responses back, mirroring the teacher's
//! split between I/O and command execution but over an async channel
//! instead of the teacher's single-threaded event loop.
//!

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::appendlog::AppendLogHandle;
use crate::dbset::DatabaseSet;
use crate::error::RudisError;
use crate::registry::{CommandRegistry, MUTATING_COMMANDS};
use crate::resp::{encode_frame, spawn_parser, RequestError, Response};

/// Mutable per-connection state. Only ever touched by this connection's
/// own handler task, but a reference to it is held across the `.await`
/// points inside `EXEC`'s queue-draining loop, which requires the type to
/// be `Sync` — atomics and a plain `Mutex` instead of `Cell`/`RefCell`,
/// with no lock ever held across a suspension point.
pub struct ConnectionState {
    authenticated: AtomicBool,
    db_index: AtomicUsize,
    in_multi: AtomicBool,
    queue: Mutex<Vec<(String, Vec<Vec<u8>>)>>,
    pub remote_addr: String,
    pub required_password: Option<Arc<String>>,
}

impl ConnectionState {
    pub fn new(remote_addr: String, required_password: Option<Arc<String>>) -> Self {
        let authenticated = required_password.is_none();
        ConnectionState {
            authenticated: AtomicBool::new(authenticated),
            db_index: AtomicUsize::new(0),
            in_multi: AtomicBool::new(false),
            queue: Mutex::new(Vec::new()),
            remote_addr,
            required_password,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    pub fn db_index(&self) -> usize {
        self.db_index.load(Ordering::SeqCst)
    }
}

/// Replay connections (append-log startup replay) are pre-authenticated
/// and never write responses anywhere.
pub fn loopback_state() -> ConnectionState {
    ConnectionState::new("loopback".to_string(), None)
}

pub async fn handle_connection<R, W>(
    reader: R,
    mut writer: W,
    remote_addr: String,
    registry: Arc<CommandRegistry>,
    dbset: Arc<DatabaseSet>,
    required_password: Option<Arc<String>>,
    append_log: Option<AppendLogHandle>,
) where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let conn = ConnectionState::new(remote_addr, required_password);
    let mut rx = spawn_parser(reader, 64);

    while let Some(req) = rx.recv().await {
        if let Some(err) = req.err {
            match err {
                RequestError::Eof => break,
                RequestError::Io(e) => {
                    warn!(addr = %conn.remote_addr, error = %e, "connection i/o error");
                    break;
                }
                RequestError::Protocol(msg) => {
                    let resp = Response::Error(RudisError::Protocol(msg).wire_message());
                    if write_response(&mut writer, &resp).await.is_err() {
                        break;
                    }
                    continue;
                }
            }
        }

        let Some(name) = req.command_name() else {
            let resp = Response::Error(RudisError::Protocol("empty request".to_string()).wire_message());
            if write_response(&mut writer, &resp).await.is_err() {
                break;
            }
            continue;
        };

        let response = dispatch(&conn, &registry, &dbset, append_log.as_ref(), &name, &req.args).await;
        if write_response(&mut writer, &response).await.is_err() {
            break;
        }
    }
    debug!(addr = %conn.remote_addr, "connection closed");
}

/// Resolve one command against the connection/auth/select/transaction
/// state machine, then the registry. `AUTH`, `SELECT`, `FLUSHALL`,
/// `MULTI`, `EXEC` and `DISCARD` need the whole [`DatabaseSet`] or
/// connection-level state the registry's `Executor` signature doesn't
/// carry, so they're special-cased here exactly where the teacher's
/// `Handle()` special-cases connection commands ahead of generic dispatch.
pub(crate) async fn dispatch(
    conn: &ConnectionState,
    registry: &CommandRegistry,
    dbset: &DatabaseSet,
    append_log: Option<&AppendLogHandle>,
    name: &str,
    args: &[Vec<u8>],
) -> Response {
    if conn.required_password.is_some() && !conn.is_authenticated() && name != "auth" {
        return Response::Error(RudisError::NoAuth.wire_message());
    }

    match name {
        "auth" => return auth(conn, args),
        "select" => return select(conn, dbset, args),
        "flushall" => return flushall(dbset, append_log, args).await,
        "multi" => return multi(conn),
        "discard" => return discard(conn),
        "exec" => return exec(conn, registry, dbset, append_log, args).await,
        _ => {}
    }

    if conn.in_multi.load(Ordering::SeqCst) {
        conn.queue.lock().unwrap().push((name.to_string(), args.to_vec()));
        return Response::Simple("QUEUED".to_string());
    }

    run_one(conn, registry, dbset, append_log, name, args).await
}

/// Execute a single non-transaction command against the connection's
/// currently selected database, publishing it to the append log on
/// success if it mutates the keyspace.
async fn run_one(
    conn: &ConnectionState,
    registry: &CommandRegistry,
    dbset: &DatabaseSet,
    append_log: Option<&AppendLogHandle>,
    name: &str,
    args: &[Vec<u8>],
) -> Response {
    let db = match dbset.get(conn.db_index()) {
        Some(db) => db,
        None => return Response::Error(RudisError::InvalidDbIndex.wire_message()),
    };

    let response = db.exec(registry, conn, name, args);
    if !response.is_error() && MUTATING_COMMANDS.contains(name) {
        if let Some(log) = append_log {
            log.publish(conn.db_index(), encode_frame(args)).await;
        }
    }
    response
}

fn multi(conn: &ConnectionState) -> Response {
    if conn.in_multi.load(Ordering::SeqCst) {
        return Response::Error(RudisError::Custom("ERR MULTI calls can not be nested".to_string()).wire_message());
    }
    conn.in_multi.store(true, Ordering::SeqCst);
    conn.queue.lock().unwrap().clear();
    Response::ok()
}

fn discard(conn: &ConnectionState) -> Response {
    if !conn.in_multi.load(Ordering::SeqCst) {
        return Response::Error(RudisError::Custom("ERR DISCARD without MULTI".to_string()).wire_message());
    }
    conn.in_multi.store(false, Ordering::SeqCst);
    conn.queue.lock().unwrap().clear();
    Response::ok()
}

/// No `WATCH`/optimistic-lock semantics: queued commands simply execute in
/// order once `EXEC` runs (DESIGN.md Open Question decision).
async fn exec(
    conn: &ConnectionState,
    registry: &CommandRegistry,
    dbset: &DatabaseSet,
    append_log: Option<&AppendLogHandle>,
    args: &[Vec<u8>],
) -> Response {
    if args.len() != 1 {
        return Response::Error(RudisError::WrongArity("exec".to_string()).wire_message());
    }
    if !conn.in_multi.load(Ordering::SeqCst) {
        return Response::Error(RudisError::Custom("ERR EXEC without MULTI".to_string()).wire_message());
    }
    conn.in_multi.store(false, Ordering::SeqCst);
    let queued = std::mem::take(&mut *conn.queue.lock().unwrap());
    let mut results = Vec::with_capacity(queued.len());
    for (name, cmd_args) in queued {
        results.push(run_one(conn, registry, dbset, append_log, &name, &cmd_args).await);
    }
    Response::Array(Some(results))
}

fn auth(conn: &ConnectionState, args: &[Vec<u8>]) -> Response {
    if args.len() != 2 {
        return Response::Error(RudisError::WrongArity("auth".to_string()).wire_message());
    }
    match &conn.required_password {
        None => Response::Error(RudisError::AuthNotSet.wire_message()),
        Some(expected) => {
            if args[1] == expected.as_bytes() {
                conn.authenticated.store(true, Ordering::SeqCst);
                Response::Simple("ok".to_string())
            } else {
                Response::Error(RudisError::InvalidPassword.wire_message())
            }
        }
    }
}

fn select(conn: &ConnectionState, dbset: &DatabaseSet, args: &[Vec<u8>]) -> Response {
    if args.len() != 2 {
        return Response::Error(RudisError::WrongArity("select".to_string()).wire_message());
    }
    let index = match std::str::from_utf8(&args[1]).ok().and_then(|s| s.parse::<i64>().ok()) {
        Some(n) => n,
        None => return Response::Error(RudisError::NotInteger.wire_message()),
    };
    if !dbset.is_valid_index(index) {
        return Response::Error(RudisError::InvalidDbIndex.wire_message());
    }
    conn.db_index.store(index as usize, Ordering::SeqCst);
    Response::ok()
}

async fn flushall(dbset: &DatabaseSet, append_log: Option<&AppendLogHandle>, args: &[Vec<u8>]) -> Response {
    if args.len() != 1 {
        return Response::Error(RudisError::WrongArity("flushall".to_string()).wire_message());
    }
    for i in 0..dbset.len() {
        if let Some(db) = dbset.get(i) {
            db.clear();
        }
    }
    // FLUSHALL clears every database, not just the connection's selected
    // one; db_index 0 is an arbitrary tag here, not a target.
    if let Some(log) = append_log {
        log.publish(0, encode_frame(args)).await;
    }
    Response::ok()
}

async fn write_response<W: AsyncWrite + Unpin>(writer: &mut W, response: &Response) -> std::io::Result<()> {
    writer.write_all(&response.to_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_connection_rejects_non_auth_commands() {
        let conn = ConnectionState::new("t".into(), Some(Arc::new("secret".to_string())));
        assert!(!conn.is_authenticated());
    }

    #[test]
    fn no_password_configured_starts_authenticated() {
        let conn = ConnectionState::new("t".into(), None);
        assert!(conn.is_authenticated());
    }

    #[test]
    fn auth_with_correct_password_succeeds() {
        let conn = ConnectionState::new("t".into(), Some(Arc::new("secret".to_string())));
        let args = vec![b"AUTH".to_vec(), b"secret".to_vec()];
        match auth(&conn, &args) {
            Response::Simple(s) => assert_eq!(s, "ok"),
            _ => panic!("expected simple string"),
        }
        assert!(conn.is_authenticated());
    }

    #[test]
    fn auth_with_wrong_password_fails() {
        let conn = ConnectionState::new("t".into(), Some(Arc::new("secret".to_string())));
        let args = vec![b"AUTH".to_vec(), b"wrong".to_vec()];
        assert!(auth(&conn, &args).is_error());
        assert!(!conn.is_authenticated());
    }

    #[test]
    fn select_rejects_out_of_range_index() {
        let conn = ConnectionState::new("t".into(), None);
        let dbset = DatabaseSet::new(16);
        let args = vec![b"SELECT".to_vec(), b"99".to_vec()];
        assert!(select(&conn, &dbset, &args).is_error());
    }

    #[test]
    fn select_switches_db_index() {
        let conn = ConnectionState::new("t".into(), None);
        let dbset = DatabaseSet::new(16);
        let args = vec![b"SELECT".to_vec(), b"3".to_vec()];
        select(&conn, &dbset, &args);
        assert_eq!(conn.db_index(), 3);
    }
}
