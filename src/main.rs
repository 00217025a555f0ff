use std::env;
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;
use std::time::Instant;

use rudis::acceptor::Acceptor;
use rudis::appendlog;
use rudis::config::Config;
use rudis::dbset::DatabaseSet;
use rudis::logging;
use rudis::registry::build_registry;

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let config = match args.len() {
        1 => {
            eprintln!("Warning: no config file specified, using the default config.");
            Config::default()
        }
        2 => Config::load_file(&args[1]).unwrap_or_else(|e| {
            eprintln!("*** FATAL CONFIG FILE ERROR ***\n{e}");
            exit(1);
        }),
        _ => {
            eprintln!("Usage: rudis-server [/path/to/redis.conf]");
            exit(1);
        }
    };

    logging::init(&config);

    let registry = Arc::new(build_registry());
    let dbset = Arc::new(DatabaseSet::new(config.databases));
    let required_password = config.requirepass.clone().map(Arc::new);

    let append_log = if config.appendonly {
        let path = PathBuf::from(&config.appendfilename);
        let start = Instant::now();
        appendlog::replay(&path, &registry, &dbset).await;
        tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "append log replay finished");
        let (handle, _writer_task) = appendlog::spawn_writer(path, 4096);
        Some(handle)
    } else {
        None
    };

    let acceptor = match Acceptor::bind(&config.bind_addr(), registry, dbset, required_password, append_log).await {
        Ok(a) => a,
        Err(e) => {
            eprintln!("could not bind {}: {e}", config.bind_addr());
            exit(1);
        }
    };

    tracing::info!(addr = %acceptor.local_addr().unwrap(), "rudis is ready to accept connections");

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    acceptor.run(shutdown).await;
}
