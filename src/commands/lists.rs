//!
//! List-valued commands.
//!

use crate::commands::{key_str, parse_i64};
use crate::connection::ConnectionState;
use crate::db::Database;
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

pub fn validate_push(_conn: &ConnectionState, args: &[Vec<u8>]) -> Result<(), RudisError> {
    if args.len() >= 3 {
        Ok(())
    } else {
        Err(RudisError::WrongArity(key_str(&args[0])))
    }
}

pub fn lpush(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    push(db, &key_str(&args[1]), &args[2..], true)
}

pub fn rpush(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    push(db, &key_str(&args[1]), &args[2..], false)
}

fn push(db: &Database, key: &str, values: &[Vec<u8>], front: bool) -> Response {
    db.put_if_absent(key.to_string(), RedisValue::List(Default::default()));
    let result = db.update(key, |v| -> Result<i64, RudisError> {
        let list = v.as_list_mut()?;
        for value in values {
            if front {
                list.push_front(value.clone());
            } else {
                list.push_back(value.clone());
            }
        }
        Ok(list.len() as i64)
    });
    match result {
        Some(Ok(n)) => Response::Integer(n),
        Some(Err(e)) => Response::Error(e.wire_message()),
        None => Response::Integer(0),
    }
}

pub fn lpop(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    pop(db, &key_str(&args[1]), true)
}

pub fn rpop(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    pop(db, &key_str(&args[1]), false)
}

fn pop(db: &Database, key: &str, front: bool) -> Response {
    let result = db.update(key, |v| -> Result<Option<Vec<u8>>, RudisError> {
        let list = v.as_list_mut()?;
        Ok(if front { list.pop_front() } else { list.pop_back() })
    });
    match result {
        Some(Ok(Some(v))) => Response::bulk(v),
        Some(Ok(None)) => Response::null_bulk(),
        Some(Err(e)) => Response::Error(e.wire_message()),
        None => Response::null_bulk(),
    }
}

pub fn llen(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    match db.get(&key_str(&args[1])) {
        None => Response::Integer(0),
        Some(v) => match v.as_list() {
            Ok(l) => Response::Integer(l.len() as i64),
            Err(e) => Response::Error(e.wire_message()),
        },
    }
}

/// Resolve a Redis-style index (negative counts from the end) against a
/// length, returning `None` if still out of range after normalizing.
fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if index < 0 { len + index } else { index };
    if idx < 0 || idx >= len {
        None
    } else {
        Some(idx as usize)
    }
}

pub fn lindex(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    let index = match parse_i64(&args[2]) {
        Ok(n) => n,
        Err(e) => return Response::Error(e.wire_message()),
    };
    match db.get(&key_str(&args[1])) {
        None => Response::null_bulk(),
        Some(v) => match v.as_list() {
            Ok(l) => match normalize_index(index, l.len()) {
                Some(i) => Response::bulk(l[i].clone()),
                None => Response::null_bulk(),
            },
            Err(e) => Response::Error(e.wire_message()),
        },
    }
}

pub fn lset(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    let key = key_str(&args[1]);
    let index = match parse_i64(&args[2]) {
        Ok(n) => n,
        Err(e) => return Response::Error(e.wire_message()),
    };
    let value = args[3].clone();
    let result = db.update(&key, |v| -> Result<bool, RudisError> {
        let list = v.as_list_mut()?;
        match normalize_index(index, list.len()) {
            Some(i) => {
                list[i] = value;
                Ok(true)
            }
            None => Ok(false),
        }
    });
    match result {
        Some(Ok(true)) => Response::ok(),
        Some(Ok(false)) => Response::Error(RudisError::Custom("ERR index out of range".to_string()).wire_message()),
        Some(Err(e)) => Response::Error(e.wire_message()),
        None => Response::Error(RudisError::Custom("ERR no such key".to_string()).wire_message()),
    }
}

pub fn lrange(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    let start = match parse_i64(&args[2]) {
        Ok(n) => n,
        Err(e) => return Response::Error(e.wire_message()),
    };
    let stop = match parse_i64(&args[3]) {
        Ok(n) => n,
        Err(e) => return Response::Error(e.wire_message()),
    };
    match db.get(&key_str(&args[1])) {
        None => Response::Array(Some(Vec::new())),
        Some(v) => match v.as_list() {
            Ok(list) => {
                let len = list.len() as i64;
                let lo = clamp_range_bound(start, len);
                let hi = clamp_range_bound(stop, len);
                if lo > hi || lo >= len {
                    return Response::Array(Some(Vec::new()));
                }
                let items = list
                    .iter()
                    .skip(lo as usize)
                    .take((hi - lo + 1) as usize)
                    .map(|b| Response::bulk(b.clone()))
                    .collect();
                Response::Array(Some(items))
            }
            Err(e) => Response::Error(e.wire_message()),
        },
    }
}

fn clamp_range_bound(index: i64, len: i64) -> i64 {
    let idx = if index < 0 { (len + index).max(0) } else { index };
    idx.min(len - 1).max(0)
}

pub fn lrem(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    let key = key_str(&args[1]);
    let count = match parse_i64(&args[2]) {
        Ok(n) => n,
        Err(e) => return Response::Error(e.wire_message()),
    };
    let value = args[3].clone();
    let result = db.update(&key, |v| -> Result<i64, RudisError> {
        let list = v.as_list_mut()?;
        let removed = if count == 0 {
            let before = list.len();
            list.retain(|x| x != &value);
            before - list.len()
        } else if count > 0 {
            remove_n_from_front(list, &value, count as usize)
        } else {
            remove_n_from_back(list, &value, (-count) as usize)
        };
        Ok(removed as i64)
    });
    match result {
        Some(Ok(n)) => Response::Integer(n),
        Some(Err(e)) => Response::Error(e.wire_message()),
        None => Response::Integer(0),
    }
}

fn remove_n_from_front(list: &mut std::collections::VecDeque<Vec<u8>>, value: &[u8], n: usize) -> usize {
    let mut removed = 0;
    let mut i = 0;
    while i < list.len() && removed < n {
        if list[i] == value {
            list.remove(i);
            removed += 1;
        } else {
            i += 1;
        }
    }
    removed
}

fn remove_n_from_back(list: &mut std::collections::VecDeque<Vec<u8>>, value: &[u8], n: usize) -> usize {
    let mut removed = 0;
    let mut i = list.len();
    while i > 0 && removed < n {
        i -= 1;
        if list[i] == value {
            list.remove(i);
            removed += 1;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> ConnectionState {
        ConnectionState::new("test".to_string(), None)
    }

    #[test]
    fn rpush_then_lrange_preserves_order() {
        let db = Database::new(0);
        let args = vec![b"RPUSH".to_vec(), b"l".to_vec(), b"a".to_vec(), b"b".to_vec(), b"c".to_vec()];
        rpush(&conn(), &db, &args);
        let range = vec![b"LRANGE".to_vec(), b"l".to_vec(), b"0".to_vec(), b"-1".to_vec()];
        match lrange(&conn(), &db, &range) {
            Response::Array(Some(items)) => assert_eq!(items.len(), 3),
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn lpop_on_missing_key_is_null() {
        let db = Database::new(0);
        let args = vec![b"LPOP".to_vec(), b"missing".to_vec()];
        assert!(matches!(lpop(&conn(), &db, &args), Response::Bulk(None)));
    }

    #[test]
    fn lrem_negative_count_removes_from_tail() {
        let db = Database::new(0);
        let push_args = vec![
            b"RPUSH".to_vec(), b"l".to_vec(), b"x".to_vec(), b"y".to_vec(), b"x".to_vec(), b"x".to_vec(),
        ];
        rpush(&conn(), &db, &push_args);
        let rem_args = vec![b"LREM".to_vec(), b"l".to_vec(), b"-1".to_vec(), b"x".to_vec()];
        assert!(matches!(lrem(&conn(), &db, &rem_args), Response::Integer(1)));
        let range = vec![b"LRANGE".to_vec(), b"l".to_vec(), b"0".to_vec(), b"-1".to_vec()];
        match lrange(&conn(), &db, &range) {
            Response::Array(Some(items)) => assert_eq!(items.len(), 3),
            _ => panic!("expected array"),
        }
    }
}
