//! Command-line interface.
//!
//! The only flag is `--share`; everything else is configured through
//! environment variables (see [`crate::config::StudioConfig::from_env`]).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Parser;

/// musicgen-studio: text and melody conditioned music generation service
#[derive(Parser, Debug)]
#[command(name = "musicgen-studio")]
#[command(about = "Serve MusicGen generation with tone filters over JSON-RPC")]
#[command(version)]
pub struct Cli {
    /// Expose the service beyond localhost
    #[arg(long)]
    pub share: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Address the server should bind to.
    ///
    /// Local-only unless `--share` was given.
    pub fn bind_addr(&self, port: u16) -> SocketAddr {
        let ip = if self.share {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        };
        SocketAddr::new(ip, port)
    }
}
