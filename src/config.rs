use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default size of one transfer block.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1000;

/// Default size of the backing allocation the pool carves blocks from.
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Which side of a measurement this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Listen and serve many concurrent clients.
    Serve,
    /// Connect and send to a server.
    Upload,
    /// Connect and receive from a server.
    Download,
}

/// Configuration for a netgauge process.
///
/// Built via the role constructors plus builder methods.
///
/// # Examples
///
/// ```
/// use netgauge::Config;
/// use std::time::Duration;
///
/// let config = Config::upload("192.168.1.20:5555".to_string())
///     .with_chunk_size(128 * 1024)
///     .with_buffer_size(32 * 1024 * 1024)
///     .with_interval(Duration::from_secs(2));
///
/// assert_eq!(config.block_count(), 256);
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Serve, upload or download.
    pub role: Role,

    /// Listen address (serve) or server address (upload/download).
    pub addr: String,

    /// Size of each block in bytes; one I/O call moves at most one block.
    pub chunk_size: usize,

    /// Total backing buffer size in bytes. The pool holds
    /// `buffer_size / chunk_size` blocks.
    pub buffer_size: usize,

    /// Reporting cadence.
    pub interval: Duration,
}

impl Config {
    /// Server configuration listening on `addr`.
    pub fn serve(addr: String) -> Self {
        Self {
            role: Role::Serve,
            addr,
            chunk_size: DEFAULT_CHUNK_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            interval: Duration::from_secs(1),
        }
    }

    /// Client configuration uploading to the server at `addr`.
    pub fn upload(addr: String) -> Self {
        Self {
            role: Role::Upload,
            ..Self::serve(addr)
        }
    }

    /// Client configuration downloading from the server at `addr`.
    pub fn download(addr: String) -> Self {
        Self {
            role: Role::Download,
            ..Self::serve(addr)
        }
    }

    /// Sets the block size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the total backing buffer size.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Sets the reporting interval (default 1 second).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Number of blocks the pool will carve: `buffer_size / chunk_size`,
    /// rounded down.
    pub fn block_count(&self) -> usize {
        if self.chunk_size == 0 {
            0
        } else {
            self.buffer_size / self.chunk_size
        }
    }

    /// Checks the size and cadence parameters.
    pub fn validate(&self) -> crate::Result<()> {
        if self.chunk_size == 0 {
            return Err(crate::Error::Config(
                "chunk size must be non-zero".to_string(),
            ));
        }
        if self.block_count() == 0 {
            return Err(crate::Error::Config(format!(
                "buffer size {} holds no blocks of chunk size {}",
                self.buffer_size, self.chunk_size
            )));
        }
        if self.interval.is_zero() {
            return Err(crate::Error::Config(
                "report interval must be non-zero".to_string(),
            ));
        }
        if self.addr.is_empty() {
            return Err(crate::Error::Config("address must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Parses a human-friendly size such as `64KB`, `16MiB` or `4096`.
///
/// Decimal suffixes (`KB`, `MB`, `GB`) are powers of 1000, binary suffixes
/// (`KiB`, `MiB`, `GiB`) powers of 1024; a bare number or a `B` suffix is
/// taken as bytes. Case-insensitive. Used as a clap value parser.
///
/// # Examples
///
/// ```
/// use netgauge::config::parse_size;
///
/// assert_eq!(parse_size("64KB").unwrap(), 64_000);
/// assert_eq!(parse_size("16MiB").unwrap(), 16 * 1024 * 1024);
/// assert_eq!(parse_size("4096").unwrap(), 4096);
/// ```
pub fn parse_size(input: &str) -> std::result::Result<u64, String> {
    let s = input.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (digits, suffix) = s.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid size {:?}", input))?;

    let multiplier: u64 = match suffix.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "kb" => 1_000,
        "mb" => 1_000_000,
        "gb" => 1_000_000_000,
        "kib" => 1 << 10,
        "mib" => 1 << 20,
        "gib" => 1 << 30,
        other => return Err(format!("unknown size suffix {:?}", other)),
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size {:?} overflows", input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_constructors() {
        let addr = "127.0.0.1:5555".to_string();
        assert_eq!(Config::serve(addr.clone()).role, Role::Serve);
        assert_eq!(Config::upload(addr.clone()).role, Role::Upload);
        assert_eq!(Config::download(addr).role, Role::Download);
    }

    #[test]
    fn test_builder() {
        let config = Config::upload("host:5555".to_string())
            .with_chunk_size(1024)
            .with_buffer_size(8192)
            .with_interval(Duration::from_millis(500));

        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.buffer_size, 8192);
        assert_eq!(config.interval, Duration::from_millis(500));
        assert_eq!(config.block_count(), 8);
    }

    #[test]
    fn test_validate_rejects_degenerate_sizes() {
        let base = Config::serve("0.0.0.0:5555".to_string());

        assert!(base.clone().with_chunk_size(0).validate().is_err());
        assert!(base
            .clone()
            .with_chunk_size(4096)
            .with_buffer_size(1024)
            .validate()
            .is_err());
        assert!(base
            .clone()
            .with_interval(Duration::ZERO)
            .validate()
            .is_err());
        assert!(base.validate().is_ok());
    }

    #[test]
    fn test_parse_size_plain_and_suffixed() {
        assert_eq!(parse_size("0").unwrap(), 0);
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("512B").unwrap(), 512);
        assert_eq!(parse_size("64KB").unwrap(), 64_000);
        assert_eq!(parse_size("64kb").unwrap(), 64_000);
        assert_eq!(parse_size("2MB").unwrap(), 2_000_000);
        assert_eq!(parse_size("1GB").unwrap(), 1_000_000_000);
        assert_eq!(parse_size("4KiB").unwrap(), 4096);
        assert_eq!(parse_size("16MiB").unwrap(), 16 * 1024 * 1024);
        assert_eq!(parse_size("1GiB").unwrap(), 1 << 30);
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("KB").is_err());
        assert!(parse_size("12XB").is_err());
        assert!(parse_size("-5KB").is_err());
        assert!(parse_size("1.5MB").is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Bare digit strings always parse to themselves.
            #[test]
            fn prop_plain_numbers_identity(n in 0u64..u64::MAX / 2) {
                prop_assert_eq!(parse_size(&n.to_string()).unwrap(), n);
            }

            /// Binary suffixes scale by the right power of 1024.
            #[test]
            fn prop_binary_suffix_scales(n in 0u64..1_000_000) {
                prop_assert_eq!(parse_size(&format!("{}KiB", n)).unwrap(), n * 1024);
                prop_assert_eq!(parse_size(&format!("{}MiB", n)).unwrap(), n * 1024 * 1024);
            }
        }
    }
}
