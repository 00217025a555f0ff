//!
//! End-to-end tests over a real bound `TcpListener`.
//!

use std::sync::Arc;

use rudis::acceptor::Acceptor;
use rudis::dbset::DatabaseSet;
use rudis::registry::build_registry;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn start_server(required_password: Option<&str>) -> std::net::SocketAddr {
    let registry = Arc::new(build_registry());
    let dbset = Arc::new(DatabaseSet::new(16));
    let password = required_password.map(|p| Arc::new(p.to_string()));
    let acceptor = Acceptor::bind("127.0.0.1:0", registry, dbset, password, None).await.unwrap();
    let addr = acceptor.local_addr().unwrap();
    tokio::spawn(async move {
        acceptor.run(std::future::pending::<()>()).await;
    });
    addr
}

fn frame(parts: &[&str]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", parts.len()).into_bytes();
    for p in parts {
        out.extend_from_slice(format!("${}\r\n", p.len()).as_bytes());
        out.extend_from_slice(p.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out
}

async fn roundtrip(stream: &mut TcpStream, parts: &[&str]) -> String {
    stream.write_all(&frame(parts)).await.unwrap();
    let mut buf = vec![0u8; 4096];
    let n = stream.read(&mut buf).await.unwrap();
    String::from_utf8_lossy(&buf[..n]).to_string()
}

#[tokio::test]
async fn ping_replies_pong() {
    let addr = start_server(None).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let reply = roundtrip(&mut stream, &["PING"]).await;
    assert_eq!(reply, "+PONG\r\n");
}

#[tokio::test]
async fn set_and_get_roundtrip() {
    let addr = start_server(None).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    assert_eq!(roundtrip(&mut stream, &["SET", "k", "v"]).await, "+OK\r\n");
    assert_eq!(roundtrip(&mut stream, &["GET", "k"]).await, "$1\r\nv\r\n");
}

#[tokio::test]
async fn get_missing_key_is_null_bulk() {
    let addr = start_server(None).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    assert_eq!(roundtrip(&mut stream, &["GET", "missing"]).await, "$-1\r\n");
}

#[tokio::test]
async fn unknown_command_is_an_error() {
    let addr = start_server(None).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let reply = roundtrip(&mut stream, &["NOSUCHCOMMAND"]).await;
    assert!(reply.starts_with("-ERR unknown command"));
}

#[tokio::test]
async fn wrong_type_is_reported() {
    let addr = start_server(None).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    roundtrip(&mut stream, &["SET", "k", "v"]).await;
    let reply = roundtrip(&mut stream, &["SADD", "k", "member"]).await;
    assert!(reply.starts_with("-WRONGTYPE"));
}

#[tokio::test]
async fn commands_are_rejected_until_authenticated() {
    let addr = start_server(Some("hunter2")).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let reply = roundtrip(&mut stream, &["GET", "k"]).await;
    assert!(reply.starts_with("-NOAUTH"));

    let auth_reply = roundtrip(&mut stream, &["AUTH", "hunter2"]).await;
    assert_eq!(auth_reply, "+ok\r\n");

    let get_reply = roundtrip(&mut stream, &["GET", "k"]).await;
    assert_eq!(get_reply, "$-1\r\n");
}

#[tokio::test]
async fn select_switches_active_database() {
    let addr = start_server(None).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    roundtrip(&mut stream, &["SET", "k", "db0"]).await;
    assert_eq!(roundtrip(&mut stream, &["SELECT", "1"]).await, "+OK\r\n");
    assert_eq!(roundtrip(&mut stream, &["GET", "k"]).await, "$-1\r\n");
    roundtrip(&mut stream, &["SELECT", "0"]).await;
    assert_eq!(roundtrip(&mut stream, &["GET", "k"]).await, "$3\r\ndb0\r\n");
}

#[tokio::test]
async fn sismember_tests_the_supplied_member() {
    let addr = start_server(None).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    roundtrip(&mut stream, &["SADD", "s", "x"]).await;
    assert_eq!(roundtrip(&mut stream, &["SISMEMBER", "s", "x"]).await, ":1\r\n");
    assert_eq!(roundtrip(&mut stream, &["SISMEMBER", "s", "s"]).await, ":0\r\n");
}

#[tokio::test]
async fn flushall_clears_every_database() {
    let addr = start_server(None).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    roundtrip(&mut stream, &["SET", "k", "v"]).await;
    roundtrip(&mut stream, &["SELECT", "1"]).await;
    roundtrip(&mut stream, &["SET", "k", "v"]).await;
    assert_eq!(roundtrip(&mut stream, &["FLUSHALL"]).await, "+OK\r\n");
    assert_eq!(roundtrip(&mut stream, &["GET", "k"]).await, "$-1\r\n");
    roundtrip(&mut stream, &["SELECT", "0"]).await;
    assert_eq!(roundtrip(&mut stream, &["GET", "k"]).await, "$-1\r\n");
}

#[tokio::test]
async fn multi_queues_commands_until_exec() {
    let addr = start_server(None).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    assert_eq!(roundtrip(&mut stream, &["MULTI"]).await, "+OK\r\n");
    assert_eq!(roundtrip(&mut stream, &["SET", "k", "v"]).await, "+QUEUED\r\n");
    assert_eq!(roundtrip(&mut stream, &["GET", "k"]).await, "+QUEUED\r\n");
    let reply = roundtrip(&mut stream, &["EXEC"]).await;
    assert_eq!(reply, "*2\r\n+OK\r\n$1\r\nv\r\n");
}

#[tokio::test]
async fn discard_drops_the_queued_commands() {
    let addr = start_server(None).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    roundtrip(&mut stream, &["MULTI"]).await;
    roundtrip(&mut stream, &["SET", "k", "v"]).await;
    assert_eq!(roundtrip(&mut stream, &["DISCARD"]).await, "+OK\r\n");
    assert_eq!(roundtrip(&mut stream, &["GET", "k"]).await, "$-1\r\n");
}

#[tokio::test]
async fn malformed_frame_resyncs_on_the_next_line() {
    let addr = start_server(None).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"not a frame\r\n").await.unwrap();
    let mut buf = vec![0u8; 4096];
    let n = stream.read(&mut buf).await.unwrap();
    assert!(String::from_utf8_lossy(&buf[..n]).starts_with("-ERR Protocol error"));

    let reply = roundtrip(&mut stream, &["PING"]).await;
    assert_eq!(reply, "+PONG\r\n");
}
