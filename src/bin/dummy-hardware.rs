//! Dummy hardware server - a software IPbus device for client testing.
//!
//! Listens on a UDP port and answers IPbus register-access packets against
//! an in-memory register file. An optional one-shot reply delay simulates a
//! device that is slow to answer its first request after power-up.

use std::time::Duration;

use clap::Parser;

use ipbus_dummy::{DummyConfig, DummyServer, Version};

#[derive(Parser)]
#[command(name = "dummy-hardware", about = "Software IPbus device emulator")]
struct Args {
    /// Port number to listen on
    #[arg(short, long)]
    port: u16,

    /// IPbus major version (1 or 2)
    #[arg(short = 'v', long, value_parser = clap::value_parser!(u32).range(1..=2))]
    version: u32,

    /// Reply delay for the first packet, in seconds
    #[arg(short, long, default_value_t = 0)]
    delay: u64,

    /// Produce verbose output
    #[arg(short = 'V', long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    // range-validated by clap
    let version = Version::from_major(args.version).unwrap();

    let mut config = DummyConfig::new(version)
        .with_bind_address(([0, 0, 0, 0], args.port).into());
    if args.delay > 0 {
        config = config.with_reply_delay(Duration::from_secs(args.delay));
    }

    let server = match DummyServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            log::error!("failed to start dummy hardware: {}", e);
            std::process::exit(1);
        }
    };

    server.run();
}
