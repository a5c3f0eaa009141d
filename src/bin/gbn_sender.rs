use anyhow::{Context, Result};
use clap::Parser;
use rs_peer_core::gbn::args::{GbnArgs, Side};
use rs_peer_core::gbn::sender;
use tokio::net::UdpSocket;
use tracing_subscriber::EnvFilter;

/// Reads standard input and ships it to the receiver over the Go-Back-N
/// transport.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let endpoints = GbnArgs::parse().into_endpoints(Side::Sender)?;
    let socket = UdpSocket::bind((endpoints.sender_addr, endpoints.sender_port))
        .await
        .context("failed to bind socket")?;
    socket
        .connect((endpoints.receiver_addr, endpoints.receiver_port))
        .await
        .context("failed to connect socket")?;

    let mut input = tokio::io::stdin();
    sender::run(&socket, &mut input, endpoints.verbose)
        .await
        .context("sender session failed")?;
    Ok(())
}
