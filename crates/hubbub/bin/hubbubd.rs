use std::net::{Ipv4Addr, SocketAddrV4};

use clap::Parser;
use hubbub::{Clock, Server};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Line-oriented multi-user chat server.
#[derive(Parser, Debug)]
#[command(name = "hubbubd", version, about)]
struct Args {
    /// TCP port to listen on.
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, args.port);

    let mut server = match Server::bind(addr, Clock::new()) {
        Ok(server) => server,
        Err(err) => {
            error!(%err, "failed to start");
            std::process::exit(1);
        }
    };
    info!(addr = %server.local_addr(), "listening");

    if let Err(err) = server.run() {
        error!(%err, "server terminated");
        std::process::exit(1);
    }
}
