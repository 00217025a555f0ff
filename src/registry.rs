//!
//! Command registry: a frozen dispatch table built once at startup, with
//! no runtime registration.
//!

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

use crate::commands;
use crate::connection::ConnectionState;
use crate::db::Database;
use crate::error::RudisError;
use crate::resp::Response;

pub type Validator = fn(&ConnectionState, &[Vec<u8>]) -> Result<(), RudisError>;
pub type Executor = fn(&ConnectionState, &Database, &[Vec<u8>]) -> Response;

pub struct CommandDescriptor {
    pub name: &'static str,
    pub validator: Validator,
    pub executor: Executor,
}

pub struct CommandRegistry {
    table: HashMap<&'static str, CommandDescriptor>,
}

impl CommandRegistry {
    pub fn lookup(&self, name: &str) -> Option<&CommandDescriptor> {
        self.table.get(name)
    }
}

/// Explicitly construct the dispatch table. Each entry is listed by hand —
/// no reflection, no derive-driven auto-registration.
pub fn build_registry() -> CommandRegistry {
    let mut table: HashMap<&'static str, CommandDescriptor> = HashMap::new();

    insert(&mut table, "ping", commands::generic::validate_ping, commands::generic::ping);
    insert(&mut table, "del", commands::generic::validate_at_least1, commands::generic::del);
    insert(&mut table, "exists", commands::generic::validate_at_least1, commands::generic::exists);
    insert(&mut table, "type", commands::generic::validate_fixed1, commands::generic::key_type);
    insert(&mut table, "expire", commands::generic::validate_fixed2, commands::generic::expire);
    insert(&mut table, "ttl", commands::generic::validate_fixed1, commands::generic::ttl);
    insert(&mut table, "dbsize", commands::generic::validate_ping, commands::generic::dbsize);
    insert(&mut table, "flushdb", commands::generic::validate_ping, commands::generic::flushdb);
    insert(&mut table, "keys", commands::generic::validate_fixed1, commands::generic::keys);

    insert(&mut table, "get", commands::strings::validate_fixed1, commands::strings::get);
    insert(&mut table, "set", commands::strings::validate_set, commands::strings::set);
    insert(&mut table, "setnx", commands::strings::validate_fixed2, commands::strings::setnx);
    insert(&mut table, "setex", commands::strings::validate_fixed3, commands::strings::setex);
    insert(&mut table, "psetex", commands::strings::validate_fixed3, commands::strings::psetex);
    insert(&mut table, "getset", commands::strings::validate_fixed2, commands::strings::getset);
    insert(&mut table, "mset", commands::strings::validate_mset, commands::strings::mset);
    insert(&mut table, "mget", commands::strings::validate_at_least1, commands::strings::mget);
    insert(&mut table, "msetnx", commands::strings::validate_mset, commands::strings::msetnx);
    insert(&mut table, "incr", commands::strings::validate_fixed1, commands::strings::incr);
    insert(&mut table, "incrby", commands::strings::validate_fixed2, commands::strings::incrby);
    insert(&mut table, "incrbyfloat", commands::strings::validate_fixed2, commands::strings::incrbyfloat);
    insert(&mut table, "decr", commands::strings::validate_fixed1, commands::strings::decr);
    insert(&mut table, "decrby", commands::strings::validate_fixed2, commands::strings::decrby);

    insert(&mut table, "lpush", commands::lists::validate_push, commands::lists::lpush);
    insert(&mut table, "rpush", commands::lists::validate_push, commands::lists::rpush);
    insert(&mut table, "lpop", commands::lists::validate_fixed1, commands::lists::lpop);
    insert(&mut table, "rpop", commands::lists::validate_fixed1, commands::lists::rpop);
    insert(&mut table, "llen", commands::lists::validate_fixed1, commands::lists::llen);
    insert(&mut table, "lindex", commands::lists::validate_fixed2, commands::lists::lindex);
    insert(&mut table, "lset", commands::lists::validate_fixed3, commands::lists::lset);
    insert(&mut table, "lrange", commands::lists::validate_fixed3, commands::lists::lrange);
    insert(&mut table, "lrem", commands::lists::validate_fixed3, commands::lists::lrem);

    insert(&mut table, "sadd", commands::sets::validate_push, commands::sets::sadd);
    insert(&mut table, "srem", commands::sets::validate_push, commands::sets::srem);
    insert(&mut table, "spop", commands::sets::validate_fixed1, commands::sets::spop);
    insert(&mut table, "smembers", commands::sets::validate_fixed1, commands::sets::smembers);
    insert(&mut table, "scard", commands::sets::validate_fixed1, commands::sets::scard);
    insert(&mut table, "sismember", commands::sets::validate_fixed2, commands::sets::sismember);
    insert(&mut table, "sdiff", commands::sets::validate_at_least1, commands::sets::sdiff);
    insert(&mut table, "sinter", commands::sets::validate_at_least1, commands::sets::sinter);
    insert(&mut table, "sunion", commands::sets::validate_at_least1, commands::sets::sunion);

    CommandRegistry { table }
}

fn insert(
    table: &mut HashMap<&'static str, CommandDescriptor>,
    name: &'static str,
    validator: Validator,
    executor: Executor,
) {
    table.insert(name, CommandDescriptor { name, validator, executor });
}

/// Commands that mutate the keyspace and therefore get published to the
/// append log on success.
pub static MUTATING_COMMANDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "set", "setnx", "setex", "psetex", "mset", "msetnx", "getset", "incr", "incrby",
        "incrbyfloat", "decr", "decrby", "del", "expire", "flushdb", "flushall",
        "lpush", "rpush", "lpop", "rpop", "lset", "lrem",
        "sadd", "srem", "spop",
    ]
    .into_iter()
    .collect()
});
