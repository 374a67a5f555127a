//! The serving side: accept loop, per-connection handshake and sessions.
//!
//! All sessions share one block pool; each gets its own stats channel and
//! reporter labeled with the peer address. A failed accept or a failed
//! session is logged and never takes the listener down.

use crate::config::Config;
use crate::engine::{consume, provide};
use crate::handshake::{read_mode, Mode};
use crate::pool::BlockPool;
use crate::reporter::{report, ReportSink, StdoutSink};
use crate::stats::stats_channel;
use crate::Result;
use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

/// Throughput measurement server.
///
/// Listens for clients, resolves each one's mode word and serves the
/// opposite side of the transfer: a client upload is consumed, a client
/// download is provided. Any number of clients may be in flight at once.
///
/// # Examples
///
/// ```no_run
/// use netgauge::{Config, Server};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::serve("0.0.0.0:5555".to_string());
/// let server = Server::new(config)?;
/// server.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Server {
    config: Config,
    pool: Arc<BlockPool>,
    sink: Arc<dyn ReportSink>,
}

impl Server {
    /// Creates a server and its shared block pool.
    ///
    /// The pool is randomized once up front because the server also plays
    /// the sending side for downloading clients.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let pool = Arc::new(BlockPool::new(config.buffer_size, config.chunk_size)?);
        info!(
            "pool ready: {} blocks of {} bytes",
            pool.capacity(),
            pool.chunk_size()
        );
        pool.randomize();

        Ok(Self {
            config,
            pool,
            sink: Arc::new(StdoutSink),
        })
    }

    /// Replaces the stdout report sink.
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Binds the listen address and accepts clients forever.
    ///
    /// # Errors
    ///
    /// Returns an error only when the listen address cannot be bound;
    /// per-connection failures are logged and absorbed.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        info!("listening on {}", self.config.addr);

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let pool = self.pool.clone();
                    let sink = self.sink.clone();
                    let interval = self.config.interval;

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, pool, interval, sink).await
                        {
                            error!("client {}: session failed: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    error!("error accepting connection: {}", e);
                }
            }
        }
    }
}

/// Serves one connection: handshake, session, final report flush.
async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    pool: Arc<BlockPool>,
    interval: Duration,
    sink: Arc<dyn ReportSink>,
) -> Result<()> {
    info!("client {}: connected", peer);

    let mode = read_mode(&mut stream).await?;
    if mode == Mode::Bye {
        info!("client {}: goodbye", peer);
        return Ok(());
    }

    let (publisher, feed) = stats_channel();
    let label = format!("client {}", peer);
    let reporter = tokio::spawn(report(feed, interval, sink, label));

    // The server plays the opposite side of whatever the client asked for.
    let result = match mode {
        Mode::Upload => consume(&mut stream, &pool, &publisher).await,
        Mode::Download => provide(&mut stream, &pool, &publisher).await,
        Mode::Bye => unreachable!(),
    };

    drop(publisher);
    let _ = reporter.await;

    if result.is_ok() {
        info!("client {}: session ended: block source closed", peer);
    }
    result
}
