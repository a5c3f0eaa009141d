//! Endpoint configuration for the GBN sender and receiver programs.
//!
//! Both programs take the same `key=value` operands; only the defaults
//! differ, each side defaulting its own address to the wildcard and the
//! other side to loopback.
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::net::Ipv4Addr;

pub const DEFAULT_SENDER_PORT: u16 = 3456;
pub const DEFAULT_RECEIVER_PORT: u16 = 6543;

/// Which program is parsing, selecting the address defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Sender,
    Receiver,
}

#[derive(Debug, Parser)]
pub struct GbnArgs {
    /// Log transport-level counters onto standard error
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Endpoint options: sa=<sender-addr> ra=<receiver-addr>
    /// sp=<sender-port> rp=<receiver-port>
    #[arg(value_name = "OPTION")]
    pub options: Vec<String>,
}

/// Resolved endpoint addresses for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub sender_addr: Ipv4Addr,
    pub sender_port: u16,
    pub receiver_addr: Ipv4Addr,
    pub receiver_port: u16,
    pub verbose: bool,
}

impl GbnArgs {
    /// Applies the `key=value` operands over the side's defaults.
    pub fn into_endpoints(self, side: Side) -> Result<Endpoints> {
        let (mut sender_addr, mut receiver_addr) = match side {
            Side::Sender => (Ipv4Addr::UNSPECIFIED, Ipv4Addr::LOCALHOST),
            Side::Receiver => (Ipv4Addr::LOCALHOST, Ipv4Addr::UNSPECIFIED),
        };
        let mut sender_port = DEFAULT_SENDER_PORT;
        let mut receiver_port = DEFAULT_RECEIVER_PORT;

        for option in &self.options {
            if let Some(value) = option.strip_prefix("sa=") {
                sender_addr = value
                    .parse()
                    .with_context(|| format!("invalid IPv4 address: {value}"))?;
            } else if let Some(value) = option.strip_prefix("ra=") {
                receiver_addr = value
                    .parse()
                    .with_context(|| format!("invalid IPv4 address: {value}"))?;
            } else if let Some(value) = option.strip_prefix("sp=") {
                sender_port = value
                    .parse()
                    .with_context(|| format!("invalid port number: {value}"))?;
            } else if let Some(value) = option.strip_prefix("rp=") {
                receiver_port = value
                    .parse()
                    .with_context(|| format!("invalid port number: {value}"))?;
            } else {
                bail!("unrecognized option: {option}");
            }
        }

        Ok(Endpoints {
            sender_addr,
            sender_port,
            receiver_addr,
            receiver_port,
            verbose: self.verbose,
        })
    }
}
