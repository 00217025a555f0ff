//!
//! String-valued commands.
//!

use crate::commands::{key_str, parse_f64, parse_i64};
use crate::connection::ConnectionState;
use crate::db::{now_ms, Database};
use crate::error::RudisError;
use crate::obj::RedisValue;
use crate::resp::Response;

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

pub fn validate_fixed3(_conn: &ConnectionState, args: &[Vec<u8>]) -> Result<(), RudisError> {
    if args.len() == 4 {
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

pub fn validate_set(_conn: &ConnectionState, args: &[Vec<u8>]) -> Result<(), RudisError> {
    if args.len() < 3 {
        Err(RudisError::WrongArity("set".into()))
    } else {
        Ok(())
    }
}

pub fn validate_mset(_conn: &ConnectionState, args: &[Vec<u8>]) -> Result<(), RudisError> {
    let pairs = args.len() - 1;
    if pairs < 2 || pairs % 2 != 0 {
        Err(RudisError::WrongArity(key_str(&args[0])))
    } else {
        Ok(())
    }
}

/// `GET` returns a bulk string (DESIGN.md Open Question resolution: the
/// distilled prototype's simple-string reply was a bug, not a feature).
pub fn get(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    match db.get(&key_str(&args[1])) {
        None => Response::null_bulk(),
        Some(v) => match v.as_str() {
            Ok(s) => Response::bulk(s.clone()),
            Err(e) => Response::Error(e.wire_message()),
        },
    }
}

pub fn set(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    let key = key_str(&args[1]);
    let value = args[2].clone();

    let mut ex_ms: Option<i64> = None;
    let mut nx = false;
    let mut xx = false;

    let mut i = 3;
    while i < args.len() {
        match key_str(&args[i]).to_ascii_uppercase().as_str() {
            "EX" => {
                i += 1;
                let Some(raw) = args.get(i) else { return Response::Error(RudisError::Syntax.wire_message()) };
                match parse_i64(raw) {
                    Ok(secs) => ex_ms = Some(secs * 1000),
                    Err(e) => return Response::Error(e.wire_message()),
                }
            }
            "PX" => {
                i += 1;
                let Some(raw) = args.get(i) else { return Response::Error(RudisError::Syntax.wire_message()) };
                match parse_i64(raw) {
                    Ok(ms) => ex_ms = Some(ms),
                    Err(e) => return Response::Error(e.wire_message()),
                }
            }
            "NX" => nx = true,
            "XX" => xx = true,
            _ => return Response::Error(RudisError::Syntax.wire_message()),
        }
        i += 1;
    }

    if nx && xx {
        return Response::Error(RudisError::Syntax.wire_message());
    }
    if nx && db.contains(&key) {
        return Response::null_bulk();
    }
    if xx && !db.contains(&key) {
        return Response::null_bulk();
    }

    db.put(key.clone(), RedisValue::Str(value));
    match ex_ms {
        Some(ms) => db.set_ttl(&key, now_ms() + ms),
        None => db.set_ttl(&key, crate::db::UNLIMITED),
    }
    Response::ok()
}

pub fn setnx(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    let key = key_str(&args[1]);
    let inserted = db.put_if_absent(key, RedisValue::Str(args[2].clone()));
    Response::Integer(if inserted { 1 } else { 0 })
}

pub fn setex(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    set_with_expiry(db, args, 1000)
}

pub fn psetex(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    set_with_expiry(db, args, 1)
}

fn set_with_expiry(db: &Database, args: &[Vec<u8>], unit_ms: i64) -> Response {
    let key = key_str(&args[1]);
    let ttl = match parse_i64(&args[2]) {
        Ok(n) if n > 0 => n,
        Ok(_) => return Response::Error(RudisError::Custom("ERR invalid expire time".into()).wire_message()),
        Err(e) => return Response::Error(e.wire_message()),
    };
    db.put(key.clone(), RedisValue::Str(args[3].clone()));
    db.set_ttl(&key, now_ms() + ttl * unit_ms);
    Response::ok()
}

pub fn getset(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    let key = key_str(&args[1]);
    let previous = match db.get(&key) {
        None => None,
        Some(v) => match v.as_str() {
            Ok(s) => Some(s.clone()),
            Err(e) => return Response::Error(e.wire_message()),
        },
    };
    db.put(key, RedisValue::Str(args[2].clone()));
    match previous {
        Some(s) => Response::bulk(s),
        None => Response::null_bulk(),
    }
}

pub fn mset(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    let pairs: Vec<(String, Vec<u8>)> = args[1..]
        .chunks(2)
        .map(|c| (key_str(&c[0]), c[1].clone()))
        .collect();
    let keys: Vec<String> = pairs.iter().map(|(k, _)| k.clone()).collect();
    db.with_keys_locked(&keys, || {
        for (k, v) in pairs {
            db.put(k, RedisValue::Str(v));
        }
    });
    Response::ok()
}

pub fn mget(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    let values = args[1..]
        .iter()
        .map(|k| match db.get(&key_str(k)) {
            Some(RedisValue::Str(s)) => Response::bulk(s),
            _ => Response::null_bulk(),
        })
        .collect();
    Response::Array(Some(values))
}

/// All-or-nothing across the sorted, deduplicated key set, so a concurrent
/// `SET` on one of the keys can't interleave between the presence check and
/// the writes.
pub fn msetnx(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    let pairs: Vec<(String, Vec<u8>)> = args[1..]
        .chunks(2)
        .map(|c| (key_str(&c[0]), c[1].clone()))
        .collect();
    let keys: Vec<String> = pairs.iter().map(|(k, _)| k.clone()).collect();
    let set = db.with_keys_locked(&keys, || {
        if keys.iter().any(|k| db.contains(k)) {
            false
        } else {
            for (k, v) in &pairs {
                db.put(k.clone(), RedisValue::Str(v.clone()));
            }
            true
        }
    });
    Response::Integer(if set { 1 } else { 0 })
}

pub fn incr(conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    incrby_impl(conn, db, &key_str(&args[1]), 1)
}

pub fn decr(conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    incrby_impl(conn, db, &key_str(&args[1]), -1)
}

pub fn incrby(conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    match parse_i64(&args[2]) {
        Ok(delta) => incrby_impl(conn, db, &key_str(&args[1]), delta),
        Err(e) => Response::Error(e.wire_message()),
    }
}

pub fn decrby(conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    match parse_i64(&args[2]) {
        Ok(delta) => incrby_impl(conn, db, &key_str(&args[1]), -delta),
        Err(e) => Response::Error(e.wire_message()),
    }
}

fn incrby_impl(_conn: &ConnectionState, db: &Database, key: &str, delta: i64) -> Response {
    let result = db.with_keys_locked(&[key.to_string()], || -> Result<i64, RudisError> {
        if !db.contains(key) {
            db.put(key.to_string(), RedisValue::Str(delta.to_string().into_bytes()));
            return Ok(delta);
        }
        db.update(key, |v| {
            let s = v.as_str()?;
            let current = parse_i64(s)?;
            let updated = current.checked_add(delta).ok_or_else(|| {
                RudisError::Custom("ERR increment or decrement would overflow".to_string())
            })?;
            *v = RedisValue::Str(updated.to_string().into_bytes());
            Ok(updated)
        })
        .unwrap_or(Err(RudisError::WrongType))
    });
    match result {
        Ok(n) => Response::Integer(n),
        Err(e) => Response::Error(e.wire_message()),
    }
}

pub fn incrbyfloat(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    let key = key_str(&args[1]);
    let delta = match parse_f64(&args[2]) {
        Ok(d) => d,
        Err(e) => return Response::Error(e.wire_message()),
    };
    let result = db.with_keys_locked(&[key.clone()], || -> Result<f64, RudisError> {
        if !db.contains(&key) {
            db.put(key.clone(), RedisValue::Str(format_float(delta).into_bytes()));
            return Ok(delta);
        }
        db.update(&key, |v| {
            let s = v.as_str()?;
            let current = parse_f64(s)?;
            let updated = current + delta;
            *v = RedisValue::Str(format_float(updated).into_bytes());
            Ok(updated)
        })
        .unwrap_or(Err(RudisError::WrongType))
    });
    match result {
        Ok(n) => Response::bulk(format_float(n)),
        Err(e) => Response::Error(e.wire_message()),
    }
}

fn format_float(f: f64) -> String {
    let mut s = format!("{f:.17}");
    while s.contains('.') && s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}
