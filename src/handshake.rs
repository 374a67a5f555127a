//! The line-protocol mode handshake.
//!
//! Before any blocks move, the client tells the server which role it wants
//! by writing a single bare word over the freshly opened connection. The
//! word is from the client's point of view: `upload` means the client will
//! provide and the server consume, `download` the reverse, `bye` asks the
//! server to close politely. The transfer engine itself never sees any of
//! this; it receives the already-resolved direction.

use crate::{Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on the handshake read. Any real op word is far shorter.
const MAX_OP_LEN: usize = 256;

/// Session role requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Client sends, server receives.
    Upload,
    /// Client receives, server sends.
    Download,
    /// Client is done; close the connection.
    Bye,
}

impl Mode {
    /// The bare word sent over the wire.
    pub fn as_wire_word(&self) -> &'static str {
        match self {
            Mode::Upload => "upload",
            Mode::Download => "download",
            Mode::Bye => "bye",
        }
    }

    /// Parses a wire word. Exact match, no framing or whitespace.
    pub fn from_wire_word(word: &str) -> Option<Mode> {
        match word {
            "upload" => Some(Mode::Upload),
            "download" => Some(Mode::Download),
            "bye" => Some(Mode::Bye),
            _ => None,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire_word())
    }
}

/// Writes the mode word to the connection. Client side.
pub async fn send_mode<W>(writer: &mut W, mode: Mode) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(mode.as_wire_word().as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads and resolves the client's mode word. Server side.
///
/// One short read; the op word always arrives in a single segment ahead of
/// any transfer data.
pub async fn read_mode<R>(reader: &mut R) -> Result<Mode>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; MAX_OP_LEN];
    let n = reader.read(&mut buf).await?;
    if n == 0 {
        return Err(Error::Connection(
            "connection closed before handshake".to_string(),
        ));
    }

    let word = std::str::from_utf8(&buf[..n])
        .map_err(|_| Error::Handshake("op word is not valid UTF-8".to_string()))?;
    Mode::from_wire_word(word)
        .ok_or_else(|| Error::Handshake(format!("unknown op {:?}", word)))
}
