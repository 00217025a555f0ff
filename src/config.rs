//!
//! `redis.conf`-style configuration. Grounded on the teacher's own
//! `redis/config.rs` line-oriented directive parser, adapted
//! to return a `Result` instead of calling `exit()` mid-parse so the
//! caller decides how a fatal config error is reported.
//!

use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub requirepass: Option<String>,
    pub appendonly: bool,
    pub appendfilename: String,
    pub databases: usize,
    pub loglevel: String,
    pub logfile: Option<String>,
    pub timeout: i64,
    pub maxclients: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: "127.0.0.1".to_string(),
            port: 6379,
            requirepass: None,
            appendonly: false,
            appendfilename: "appendonly.aof".to_string(),
            databases: 16,
            loglevel: "notice".to_string(),
            logfile: None,
            timeout: 0,
            maxclients: 10000,
        }
    }
}

impl Config {
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("can't open config file '{}': {e}", path.as_ref().display()))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, String> {
        let mut config = Config::default();
        for (line_num, raw_line) in contents.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let argv: Vec<&str> = line.split_whitespace().collect();
            let directive = argv[0].to_ascii_lowercase();

            let directive_err = |msg: &str| format!("config file error at line {}: {msg}\n>>> {line}", line_num + 1);

            match (directive.as_str(), argv.len()) {
                ("bind", 2) => config.bind = argv[1].to_string(),
                ("port", 2) => {
                    config.port = argv[1].parse().map_err(|_| directive_err("invalid port"))?;
                }
                ("requirepass", 2) => config.requirepass = Some(argv[1].to_string()),
                ("appendonly", 2) => {
                    config.appendonly = yes_no_to_bool(argv[1]).map_err(|e| directive_err(&e))?;
                }
                ("appendfilename", 2) => config.appendfilename = argv[1].to_string(),
                ("databases", 2) => {
                    let n: usize = argv[1].parse().map_err(|_| directive_err("invalid number of databases"))?;
                    if n < 1 {
                        return Err(directive_err("invalid number of databases"));
                    }
                    config.databases = n;
                }
                ("loglevel", 2) => {
                    let level = argv[1].to_ascii_lowercase();
                    if !["debug", "verbose", "notice", "warning"].contains(&level.as_str()) {
                        return Err(directive_err("invalid log level"));
                    }
                    config.loglevel = level;
                }
                ("logfile", 2) => {
                    config.logfile = if argv[1].eq_ignore_ascii_case("stdout") { None } else { Some(argv[1].to_string()) };
                }
                ("timeout", 2) => {
                    config.timeout = argv[1].parse().map_err(|_| directive_err("invalid timeout"))?;
                }
                ("maxclients", 2) => {
                    config.maxclients = argv[1].parse().map_err(|_| directive_err("invalid maxclients"))?;
                }
                _ => return Err(directive_err("bad directive or wrong number of arguments")),
            }
        }
        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn yes_no_to_bool(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "yes" => Ok(true),
        "no" => Ok(false),
        _ => Err("argument must be 'yes' or 'no'".to_string()),
    }
}
