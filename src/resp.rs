//!
//! Wire protocol: streaming frame decoder and response encoder.
//!
//! Grammar:
//!   frame    := '*' <decimal N> "\r\n" argument{N}
//!   argument := '$' <decimal L> "\r\n" <L bytes> "\r\n"
//!

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::mpsc;

/// A single decoded command, or a framing/IO failure in its place.
#[derive(Debug)]
pub struct Request {
    pub args: Vec<Vec<u8>>,
    pub err: Option<RequestError>,
}

#[derive(Debug, Clone)]
pub enum RequestError {
    /// Malformed bytes: wrong sigil, non-numeric length, missing CRLF, short payload.
    Protocol(String),
    /// The socket was closed.
    Eof,
    /// Any other I/O failure.
    Io(String),
}

impl Request {
    fn ok(args: Vec<Vec<u8>>) -> Self {
        Request { args, err: None }
    }

    fn protocol_error(msg: impl Into<String>) -> Self {
        Request { args: Vec::new(), err: Some(RequestError::Protocol(msg.into())) }
    }

    pub fn command_name(&self) -> Option<String> {
        self.args.first().map(|a| String::from_utf8_lossy(a).to_ascii_lowercase())
    }
}

/// A tagged reply value.
#[derive(Debug, Clone)]
pub enum Response {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Vec<u8>>),
    Array(Option<Vec<Response>>),
}

impl Response {
    pub fn ok() -> Self {
        Response::Simple("OK".to_string())
    }

    pub fn null_bulk() -> Self {
        Response::Bulk(None)
    }

    pub fn null_array() -> Self {
        Response::Array(None)
    }

    pub fn bulk(s: impl Into<Vec<u8>>) -> Self {
        Response::Bulk(Some(s.into()))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }

    /// Serialize this response to wire bytes.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Response::Simple(s) => {
                out.push(b'+');
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Response::Error(s) => {
                out.push(b'-');
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Response::Integer(n) => {
                out.push(b':');
                out.extend_from_slice(n.to_string().as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Response::Bulk(None) => out.extend_from_slice(b"$-1\r\n"),
            Response::Bulk(Some(b)) => {
                out.push(b'$');
                out.extend_from_slice(b.len().to_string().as_bytes());
                out.extend_from_slice(b"\r\n");
                out.extend_from_slice(b);
                out.extend_from_slice(b"\r\n");
            }
            Response::Array(None) => out.extend_from_slice(b"*-1\r\n"),
            Response::Array(Some(items)) => {
                out.push(b'*');
                out.extend_from_slice(items.len().to_string().as_bytes());
                out.extend_from_slice(b"\r\n");
                for item in items {
                    item.encode(out);
                }
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }
}

/// Re-serialize an argument vector back to wire frame bytes, for the append
/// log.
pub fn encode_frame(args: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(b'*');
    out.extend_from_slice(args.len().to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
    for a in args {
        out.push(b'$');
        out.extend_from_slice(a.len().to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(a);
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Spawn the parser task: reads frames off `reader` and feeds decoded
/// requests into a bounded channel consumed by the connection handler.
/// Requests are a lazy, finite sequence terminating only on end-of-stream.
pub fn spawn_parser<R>(reader: R, capacity: usize) -> mpsc::Receiver<Request>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity);
    tokio::spawn(async move {
        let mut buf = BufReader::new(reader);
        loop {
            match read_frame(&mut buf).await {
                Ok(Some(args)) => {
                    if tx.send(Request::ok(args)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    let _ = tx.send(Request { args: Vec::new(), err: Some(RequestError::Eof) }).await;
                    break;
                }
                Err(RequestError::Protocol(msg)) => {
                    if tx.send(Request::protocol_error(msg)).await.is_err() {
                        break;
                    }
                    // Resynchronize: the next read_until('\n') call already
                    // restarts at a line boundary, so no extra skip is
                    // required here.
                }
                Err(RequestError::Eof) => {
                    let _ = tx.send(Request { args: Vec::new(), err: Some(RequestError::Eof) }).await;
                    break;
                }
                Err(e) => {
                    let _ = tx.send(Request { args: Vec::new(), err: Some(e) }).await;
                    break;
                }
            }
        }
    });
    rx
}

/// Read one line terminated by `\n`, trimming a trailing `\r\n` or `\n`.
/// Returns `Ok(None)` at a clean EOF with no partial data.
async fn read_line<R: AsyncBufReadExt + Unpin>(r: &mut R) -> Result<Option<Vec<u8>>, RequestError> {
    let mut line = Vec::new();
    let n = r
        .read_until(b'\n', &mut line)
        .await
        .map_err(|e| RequestError::Io(e.to_string()))?;
    if n == 0 {
        return Ok(None);
    }
    if line.last() != Some(&b'\n') {
        return Err(RequestError::Protocol("missing CRLF terminator".to_string()));
    }
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(Some(line))
}

async fn read_frame<R>(r: &mut BufReader<R>) -> Result<Option<Vec<Vec<u8>>>, RequestError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let header = match read_line(r).await? {
        Some(h) => h,
        None => return Ok(None),
    };
    if header.first() != Some(&b'*') {
        return Err(RequestError::Protocol("expected '*'".to_string()));
    }
    let count: i64 = std::str::from_utf8(&header[1..])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| RequestError::Protocol("invalid array length".to_string()))?;
    if count < 0 {
        return Ok(Some(Vec::new()));
    }

    let mut args = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let arg_header = match read_line(r).await? {
            Some(h) => h,
            None => return Err(RequestError::Protocol("short read in argument header".to_string())),
        };
        if arg_header.first() != Some(&b'$') {
            return Err(RequestError::Protocol("expected '$'".to_string()));
        }
        let len: i64 = std::str::from_utf8(&arg_header[1..])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| RequestError::Protocol("invalid bulk length".to_string()))?;
        if len < 0 {
            return Err(RequestError::Protocol("negative bulk length".to_string()));
        }
        let mut payload = BytesMut::zeroed(len as usize + 2);
        r.read_exact(&mut payload)
            .await
            .map_err(|_| RequestError::Protocol("short payload".to_string()))?;
        if &payload[len as usize..] != b"\r\n" {
            return Err(RequestError::Protocol("missing CRLF after payload".to_string()));
        }
        payload.truncate(len as usize);
        args.push(payload.to_vec());
    }
    Ok(Some(args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn decodes_one_frame() {
        let input = b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n".to_vec();
        let mut reader = BufReader::new(Cursor::new(input));
        let frame = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(frame, vec![b"SET".to_vec(), b"key".to_vec(), b"value".to_vec()]);
    }

    #[tokio::test]
    async fn rejects_bad_sigil() {
        let input = b"$3\r\nfoo\r\n".to_vec();
        let mut reader = BufReader::new(Cursor::new(input));
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, RequestError::Protocol(_)));
    }

    #[tokio::test]
    async fn rejects_length_mismatch() {
        // *2\r\n$3\r\nSE\r\n$1\r\nx\r\n -- declared length 3 but payload "SE" is 2 bytes
        let input = b"*2\r\n$3\r\nSE\r\n$1\r\nx\r\n".to_vec();
        let mut reader = BufReader::new(Cursor::new(input));
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, RequestError::Protocol(_)));
    }

    #[test]
    fn encodes_all_tagged_forms() {
        assert_eq!(Response::Simple("OK".into()).to_bytes(), b"+OK\r\n");
        assert_eq!(Response::Error("ERR x".into()).to_bytes(), b"-ERR x\r\n");
        assert_eq!(Response::Integer(42).to_bytes(), b":42\r\n");
        assert_eq!(Response::bulk("hi").to_bytes(), b"$2\r\nhi\r\n");
        assert_eq!(Response::null_bulk().to_bytes(), b"$-1\r\n");
        assert_eq!(Response::null_array().to_bytes(), b"*-1\r\n");
        let arr = Response::Array(Some(vec![Response::Integer(1), Response::bulk("a")]));
        assert_eq!(arr.to_bytes(), b"*2\r\n:1\r\n$1\r\na\r\n");
    }
}
