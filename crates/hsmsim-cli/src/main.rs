//! hsmsim: line client for the payment HSM simulator.
//!
//! Frames one command payload, sends it to a running simulator, and
//! prints the decoded response. Binary payload bytes are written as
//! `\xNN` escapes:
//!
//! ```text
//! hsmsim NC
//! hsmsim --header SSSS 'NC\x00\x00'
//! hsmsim 'BU021UA97831862E31CCC36E854FE184EE6453'
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use hsmsim_core::frame;

/// hsmsim - talk to a running payment HSM simulator
#[derive(Parser, Debug)]
#[command(name = "hsmsim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Simulator address
    #[arg(short, long, default_value = "127.0.0.1:1500")]
    addr: String,

    /// Message header configured on the simulator
    #[arg(long, default_value = "")]
    header: String,

    /// Command code and payload, e.g. "A00002U"; use \xNN for raw bytes
    payload: String,
}

/// Expands `\xNN` escapes into raw bytes; everything else passes through
/// as ASCII.
fn unescape(input: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(u8::try_from(c as u32).context("payload must be ASCII")?);
            continue;
        }
        match chars.next() {
            Some('x') => {
                let hi = chars.next().context("truncated \\x escape")?;
                let lo = chars.next().context("truncated \\x escape")?;
                let byte = u8::from_str_radix(&format!("{hi}{lo}"), 16)
                    .context("invalid \\x escape")?;
                out.push(byte);
            },
            Some('\\') => out.push(b'\\'),
            other => bail!("unsupported escape: \\{:?}", other),
        }
    }
    Ok(out)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let body = unescape(&args.payload)?;
    let request = frame::build(args.header.as_bytes(), &body)?;

    let mut stream = TcpStream::connect(&args.addr)
        .await
        .with_context(|| format!("failed to connect to {}", args.addr))?;
    stream.write_all(&request).await?;

    let mut response = vec![0u8; hsmsim_core::MAX_FRAME_LEN];
    let n = stream.read(&mut response).await?;
    if n == 0 {
        bail!("connection closed without a reply (frame or grammar rejected)");
    }
    response.truncate(n);

    // Strip length prefix and header, then split the response body.
    let body_start = 2 + args.header.len();
    if response.len() < body_start + 4 {
        bail!("short response: {}", hex::encode_upper(&response));
    }
    let body = &response[body_start..];

    println!("response code: {}", String::from_utf8_lossy(&body[..2]));
    println!("error code:    {}", String::from_utf8_lossy(&body[2..4]));
    let fields = &body[4..];
    if !fields.is_empty() {
        println!("fields (hex):  {}", hex::encode_upper(fields));
        println!(
            "fields (text): {}",
            fields
                .iter()
                .map(|&b| {
                    if b.is_ascii_graphic() || b == b' ' {
                        b as char
                    } else {
                        '.'
                    }
                })
                .collect::<String>()
        );
    }

    Ok(())
}
