//!
//! Set-valued commands.
//!

use std::collections::HashSet;

use rand::seq::IteratorRandom;

use crate::commands::key_str;
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

pub fn validate_push(_conn: &ConnectionState, args: &[Vec<u8>]) -> Result<(), RudisError> {
    if args.len() >= 3 {
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

pub fn sadd(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    let key = key_str(&args[1]);
    db.put_if_absent(key.clone(), RedisValue::Set(HashSet::new()));
    let result = db.update(&key, |v| -> Result<i64, RudisError> {
        let set = v.as_set_mut()?;
        let mut added = 0;
        for m in &args[2..] {
            if set.insert(m.clone()) {
                added += 1;
            }
        }
        Ok(added)
    });
    match result {
        Some(Ok(n)) => Response::Integer(n),
        Some(Err(e)) => Response::Error(e.wire_message()),
        None => Response::Integer(0),
    }
}

pub fn srem(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    let key = key_str(&args[1]);
    let result = db.update(&key, |v| -> Result<i64, RudisError> {
        let set = v.as_set_mut()?;
        let mut removed = 0;
        for m in &args[2..] {
            if set.remove(m.as_slice()) {
                removed += 1;
            }
        }
        Ok(removed)
    });
    match result {
        Some(Ok(n)) => Response::Integer(n),
        Some(Err(e)) => Response::Error(e.wire_message()),
        None => Response::Integer(0),
    }
}

pub fn spop(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    let key = key_str(&args[1]);
    let result = db.update(&key, |v| -> Result<Option<Vec<u8>>, RudisError> {
        let set = v.as_set_mut()?;
        let mut rng = rand::thread_rng();
        let chosen = set.iter().choose(&mut rng).cloned();
        if let Some(ref m) = chosen {
            set.remove(m);
        }
        Ok(chosen)
    });
    match result {
        Some(Ok(Some(m))) => Response::bulk(m),
        Some(Ok(None)) => Response::null_bulk(),
        Some(Err(e)) => Response::Error(e.wire_message()),
        None => Response::null_bulk(),
    }
}

pub fn smembers(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    match db.get(&key_str(&args[1])) {
        None => Response::Array(Some(Vec::new())),
        Some(v) => match v.as_set() {
            Ok(s) => Response::Array(Some(s.iter().map(|m| Response::bulk(m.clone())).collect())),
            Err(e) => Response::Error(e.wire_message()),
        },
    }
}

pub fn scard(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    match db.get(&key_str(&args[1])) {
        None => Response::Integer(0),
        Some(v) => match v.as_set() {
            Ok(s) => Response::Integer(s.len() as i64),
            Err(e) => Response::Error(e.wire_message()),
        },
    }
}

/// Tests membership of the *supplied member* argument, not the key itself
/// (DESIGN.md Open Question resolution — the original source tested the
/// key, which is a bug SISMEMBER's own contract rules out).
pub fn sismember(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    match db.get(&key_str(&args[1])) {
        None => Response::Integer(0),
        Some(v) => match v.as_set() {
            Ok(s) => Response::Integer(if s.contains(&args[2]) { 1 } else { 0 }),
            Err(e) => Response::Error(e.wire_message()),
        },
    }
}

fn load_set(db: &Database, key: &[u8]) -> Result<HashSet<Vec<u8>>, RudisError> {
    match db.get(&key_str(key)) {
        None => Ok(HashSet::new()),
        Some(v) => v.as_set().cloned(),
    }
}

pub fn sdiff(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    combine_sets(db, &args[1..], |acc, next| acc.difference(next).cloned().collect())
}

pub fn sinter(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    combine_sets(db, &args[1..], |acc, next| acc.intersection(next).cloned().collect())
}

pub fn sunion(_conn: &ConnectionState, db: &Database, args: &[Vec<u8>]) -> Response {
    combine_sets(db, &args[1..], |acc, next| acc.union(next).cloned().collect())
}

fn combine_sets(
    db: &Database,
    keys: &[Vec<u8>],
    op: impl Fn(&HashSet<Vec<u8>>, &HashSet<Vec<u8>>) -> HashSet<Vec<u8>>,
) -> Response {
    let mut sets = Vec::with_capacity(keys.len());
    for key in keys {
        match load_set(db, key) {
            Ok(s) => sets.push(s),
            Err(e) => return Response::Error(e.wire_message()),
        }
    }
    let mut acc = match sets.first() {
        Some(s) => s.clone(),
        None => HashSet::new(),
    };
    for s in &sets[1..] {
        acc = op(&acc, s);
    }
    Response::Array(Some(acc.into_iter().map(Response::bulk).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> ConnectionState {
        ConnectionState::new("test".to_string(), None)
    }

    #[test]
    fn sadd_reports_only_newly_added() {
        let db = Database::new(0);
        let args = vec![b"SADD".to_vec(), b"s".to_vec(), b"a".to_vec(), b"b".to_vec()];
        assert!(matches!(sadd(&conn(), &db, &args), Response::Integer(2)));
        let args2 = vec![b"SADD".to_vec(), b"s".to_vec(), b"a".to_vec(), b"c".to_vec()];
        assert!(matches!(sadd(&conn(), &db, &args2), Response::Integer(1)));
    }

    #[test]
    fn sismember_tests_supplied_member_not_key() {
        let db = Database::new(0);
        let add = vec![b"SADD".to_vec(), b"s".to_vec(), b"x".to_vec()];
        sadd(&conn(), &db, &add);
        let hit = vec![b"SISMEMBER".to_vec(), b"s".to_vec(), b"x".to_vec()];
        let miss = vec![b"SISMEMBER".to_vec(), b"s".to_vec(), b"s".to_vec()];
        assert!(matches!(sismember(&conn(), &db, &hit), Response::Integer(1)));
        assert!(matches!(sismember(&conn(), &db, &miss), Response::Integer(0)));
    }

    #[test]
    fn sdiff_against_missing_key_is_identity() {
        let db = Database::new(0);
        let add = vec![b"SADD".to_vec(), b"s".to_vec(), b"a".to_vec(), b"b".to_vec()];
        sadd(&conn(), &db, &add);
        let args = vec![b"SDIFF".to_vec(), b"s".to_vec(), b"missing".to_vec()];
        match sdiff(&conn(), &db, &args) {
            Response::Array(Some(items)) => assert_eq!(items.len(), 2),
            _ => panic!("expected array"),
        }
    }
}
