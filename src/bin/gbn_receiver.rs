use anyhow::{Context, Result};
use clap::Parser;
use rs_peer_core::gbn::args::{GbnArgs, Side};
use rs_peer_core::gbn::receiver;
use tokio::net::UdpSocket;
use tracing_subscriber::EnvFilter;

/// Receives a Go-Back-N stream and writes it to standard output.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let endpoints = GbnArgs::parse().into_endpoints(Side::Receiver)?;
    let socket = UdpSocket::bind((endpoints.receiver_addr, endpoints.receiver_port))
        .await
        .context("failed to bind socket")?;
    socket
        .connect((endpoints.sender_addr, endpoints.sender_port))
        .await
        .context("failed to connect socket")?;

    let mut output = tokio::io::stdout();
    receiver::run(&socket, &mut output, endpoints.verbose)
        .await
        .context("receiver session failed")?;
    Ok(())
}
