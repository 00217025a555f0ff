//!
//! Key-space-agnostic commands: connection housekeeping and generic key
//! operations.
//!
//! `AUTH`, `SELECT` and `FLUSHALL` are deliberately absent from this module
//! even though they are conceptually "generic" commands: each needs
//! context this module's `Executor` signature does not carry (the set of
//! *all* databases, not just the one selected), so `connection.rs`
//! special-cases them ahead of the registry, the way the teacher's own
//! `Handle()` special-cases connection-level commands before reaching
//! generic dispatch.
//!

use crate::commands::{glob_match, key_str, parse_i64};
use crate::connection::ConnectionState;
use crate::db::{now_ms, Database};
use crate::error::RudisError;
use crate::resp::Response;

pub fn validate_ping(_conn: &ConnectionState, args: &[Vec<u8>]) -> Result<(), RudisError> {
    if args.len() == 1 || args.len() == 2 {
        Ok(())
    } else {
        Err(RudisError::WrongArity("ping".into()))
    }
}

pub fn validate_fixed1(_conn: &ConnectionState, args: &[Vec<u8>]) -> Result<(), RudisError> {
    if args.len() == 2 {
        Ok(())
    } else {
        Err(RudisError::WrongArity(key_str(&args[0])))
    }
}

pub fn validate_fixed2(_conn: &ConnectionState, args: &[Vec<u8>]) -> Result<(), RudisError> {
    if args.len() == 3 {
        Ok(())
    } else {
        Err(RudisError::WrongArity(key_str(&args[0])))
    }
}

pub fn validate_at_least1(_conn: &ConnectionState, args: &[Vec<u8>]) -> Result<(), RudisError> {
    if args.len() >= 2 {
        Ok(())
    } else {
        Err(RudisError::WrongArity(key_str(&args[0])))
    }
}

pub fn ping(_conn: &ConnectionState, _db: &Database, args: &[Vec<u8>]) -> Response {
    if args.len() == 2 {
        Response::bulk(args[1].clone())
    } else {
        Response::Simple("PONG".to_string())
    }
}

pub fn del(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    let removed = args[1..].iter().filter(|k| db.remove(&key_str(k))).count();
    Response::Integer(removed as i64)
}

pub fn exists(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    let count = args[1..].iter().filter(|k| db.contains(&key_str(k))).count();
    Response::Integer(count as i64)
}

pub fn key_type(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    match db.get(&key_str(&args[1])) {
        Some(v) => Response::Simple(v.type_name().to_string()),
        None => Response::Simple("none".to_string()),
    }
}

pub fn expire(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    let key = key_str(&args[1]);
    let seconds = match parse_i64(&args[2]) {
        Ok(n) => n,
        Err(e) => return Response::Error(e.wire_message()),
    };
    if !db.contains(&key) {
        return Response::Integer(0);
    }
    db.set_ttl(&key, now_ms() + seconds * 1000);
    Response::Integer(1)
}

/// Returns remaining milliseconds, -1 if the key has no expiry, -2 if the
/// key is absent (DESIGN.md's Open Question resolution: milliseconds, not
/// seconds, despite the command name).
pub fn ttl(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    Response::Integer(db.ttl_ms(&key_str(&args[1])))
}

pub fn dbsize(_conn: &ConnectionState, db: &Database, _args: &[Vec<u8>]) -> Response {
    Response::Integer(db.len() as i64)
}

pub fn flushdb(_conn: &ConnectionState, db: &Database, _args: &[Vec<u8>]) -> Response {
    db.clear();
    Response::ok()
}

pub fn keys(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    let pattern = &args[1];
    let matched = db
        .keys()
        .into_iter()
        .filter(|k| glob_match(pattern, k.as_bytes()))
        .map(|k| Response::bulk(k.into_bytes()))
        .collect();
    Response::Array(Some(matched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obj::RedisValue;

    fn conn() -> ConnectionState {
        ConnectionState::new("test".to_string(), None)
    }

    #[test]
    fn del_counts_removed_keys_only() {
        let db = Database::new(0);
        db.put("a".into(), RedisValue::Str(b"1".to_vec()));
        let args = vec![b"DEL".to_vec(), b"a".to_vec(), b"missing".to_vec()];
        assert!(matches!(del(&conn(), &db, &args), Response::Integer(1)));
    }

    #[test]
    fn type_reports_none_for_missing_key() {
        let db = Database::new(0);
        let args = vec![b"TYPE".to_vec(), b"missing".to_vec()];
        match key_type(&conn(), &db, &args) {
            Response::Simple(s) => assert_eq!(s, "none"),
            _ => panic!("expected simple string"),
        }
    }

    #[test]
    fn keys_filters_by_glob() {
        let db = Database::new(0);
        db.put("foo".into(), RedisValue::Str(b"1".to_vec()));
        db.put("bar".into(), RedisValue::Str(b"1".to_vec()));
        let args = vec![b"KEYS".to_vec(), b"f*".to_vec()];
        match keys(&conn(), &db, &args) {
            Response::Array(Some(items)) => assert_eq!(items.len(), 1),
            _ => panic!("expected array"),
        }
    }
}
