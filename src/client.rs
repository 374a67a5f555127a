//! Client sessions: connect, handshake, run one directional transfer.

use crate::config::{Config, Role};
use crate::engine::{consume, provide};
use crate::handshake::{send_mode, Mode};
use crate::pool::BlockPool;
use crate::reporter::{report, ReportSink, StdoutSink};
use crate::stats::stats_channel;
use crate::{Error, Result};
use log::{error, info};
use std::sync::Arc;
use tokio::net::TcpStream;

/// Measurement client for the upload and download roles.
///
/// Connects to a server, announces a mode word and then runs one transfer
/// session until the connection drops. Reporting runs beside the session
/// and flushes a final cumulative line when it ends.
///
/// # Examples
///
/// ```no_run
/// use netgauge::{Client, Config};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::download("192.168.1.20:5555".to_string());
/// let client = Client::new(config)?;
/// client.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Client {
    config: Config,
    sink: Arc<dyn ReportSink>,
}

impl Client {
    /// Creates a client after validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for degenerate sizes or a server role.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        if config.role == Role::Serve {
            return Err(Error::Config(
                "client requires the upload or download role".to_string(),
            ));
        }
        Ok(Self {
            config,
            sink: Arc::new(StdoutSink),
        })
    }

    /// Replaces the stdout report sink, e.g. with a capture buffer.
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Connects and runs the session to completion.
    ///
    /// Returns `Ok` only for a clean end (closed block source); an I/O
    /// failure, including the server going away, is returned as the error
    /// after it has been logged.
    pub async fn run(&self) -> Result<()> {
        let mode = match self.config.role {
            Role::Upload => Mode::Upload,
            Role::Download => Mode::Download,
            Role::Serve => unreachable!("rejected in Client::new"),
        };

        let mut stream = TcpStream::connect(&self.config.addr).await?;
        info!("connected to {}: {}", self.config.addr, mode);

        send_mode(&mut stream, mode).await?;

        let pool = BlockPool::new(self.config.buffer_size, self.config.chunk_size)?;
        if mode == Mode::Upload {
            info!(
                "randomizing {} blocks of {} bytes",
                pool.capacity(),
                pool.chunk_size()
            );
            pool.randomize();
        }

        let (publisher, feed) = stats_channel();
        let label = format!("server {}", self.config.addr);
        let reporter = tokio::spawn(report(
            feed,
            self.config.interval,
            self.sink.clone(),
            label,
        ));

        let result = match mode {
            Mode::Upload => provide(&mut stream, &pool, &publisher).await,
            Mode::Download => consume(&mut stream, &pool, &publisher).await,
            Mode::Bye => unreachable!(),
        };

        pool.close();
        drop(publisher);
        // Wait for the final flushed line.
        let _ = reporter.await;

        match &result {
            Ok(()) => info!("session ended: block source closed"),
            Err(e) => error!("session failed: {}", e),
        }
        result
    }
}
