//!
//! Command implementations, grouped by the data type they operate on.
//! Each module exposes `validate_*` functions (the `Validator` half of a
//! [`crate::registry::CommandDescriptor`]) and the executors the registry
//! dispatches to.
//!

pub mod generic;
pub mod lists;
pub mod sets;
pub mod strings;

use crate::error::RudisError;

pub(crate) fn parse_i64(bytes: &[u8]) -> Result<i64, RudisError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or(RudisError::NotInteger)
}

pub(crate) fn parse_f64(bytes: &[u8]) -> Result<f64, RudisError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or(RudisError::NotFloat)
}

pub(crate) fn key_str(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).to_string()
}

/// Minimal glob matcher supporting `*` and `?`, used by `KEYS`.
pub(crate) fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    fn go(p: &[u8], t: &[u8]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some(b'*') => go(&p[1..], t) || (!t.is_empty() && go(p, &t[1..])),
            Some(b'?') => !t.is_empty() && go(&p[1..], &t[1..]),
            Some(&c) => !t.is_empty() && t[0] == c && go(&p[1..], &t[1..]),
        }
    }
    go(pattern, text)
}
