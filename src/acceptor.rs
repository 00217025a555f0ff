//!
//! TCP acceptor with graceful shutdown drain: stop accepting new
//! connections, let outstanding handler tasks finish, then return so the
//! caller can close the append log.
//!

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::appendlog::AppendLogHandle;
use crate::connection::handle_connection;
use crate::dbset::DatabaseSet;
use crate::registry::CommandRegistry;

pub struct Acceptor {
    listener: TcpListener,
    registry: Arc<CommandRegistry>,
    dbset: Arc<DatabaseSet>,
    required_password: Option<Arc<String>>,
    append_log: Option<AppendLogHandle>,
}

impl Acceptor {
    pub async fn bind(
        addr: &str,
        registry: Arc<CommandRegistry>,
        dbset: Arc<DatabaseSet>,
        required_password: Option<Arc<String>>,
        append_log: Option<AppendLogHandle>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Acceptor { listener, registry, dbset, required_password, append_log })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown signal received, no longer accepting new connections");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((socket, addr)) => {
                            let registry = self.registry.clone();
                            let dbset = self.dbset.clone();
                            let required_password = self.required_password.clone();
                            let append_log = self.append_log.clone();
                            let (reader, writer) = socket.into_split();
                            tasks.push(tokio::spawn(async move {
                                handle_connection(
                                    reader,
                                    writer,
                                    addr.to_string(),
                                    registry,
                                    dbset,
                                    required_password,
                                    append_log,
                                )
                                .await;
                            }));
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }
            }
        }

        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "connection handler task panicked");
            }
        }
        info!("all connections drained");
    }
}
