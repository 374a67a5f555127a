use clap::{Parser, Subcommand};
use netgauge::config::parse_size;
use netgauge::{Client, Config, Server};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "netgauge")]
#[command(about = "Measure sustained network throughput between two endpoints", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Size of each buffer chunk
    #[arg(short = 'c', long, default_value = "64KB", value_parser = parse_size, global = true)]
    chunk_size: u64,

    /// Total buffer size
    #[arg(short = 's', long, default_value = "16MiB", value_parser = parse_size, global = true)]
    buffer_size: u64,

    /// Interval between throughput reports in seconds
    #[arg(short, long, default_value = "1", global = true)]
    interval: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a server that clients can connect to
    Serve {
        /// Address to serve on
        #[arg(short, long, default_value = "0.0.0.0:5555")]
        addr: String,
    },

    /// Check upload speed to a server
    Upload {
        /// Server address, including port
        server: String,
    },

    /// Check download speed from a server
    Download {
        /// Server address, including port
        server: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let sizes = |config: Config| {
        config
            .with_chunk_size(cli.chunk_size as usize)
            .with_buffer_size(cli.buffer_size as usize)
            .with_interval(Duration::from_secs(cli.interval))
    };

    match &cli.command {
        Commands::Serve { addr } => {
            let server = Server::new(sizes(Config::serve(addr.clone())))?;
            server.run().await?;
        }

        Commands::Upload { server } => {
            let client = Client::new(sizes(Config::upload(server.clone())))?;
            client.run().await?;
        }

        Commands::Download { server } => {
            let client = Client::new(sizes(Config::download(server.clone())))?;
            client.run().await?;
        }
    }

    Ok(())
}
