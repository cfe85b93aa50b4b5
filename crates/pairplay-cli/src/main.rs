//! Pairplay console binary.
//!
//! # Usage
//!
//! ```bash
//! # On one machine
//! pairplay --name alice
//! > host
//!
//! # On another machine on the same LAN
//! pairplay --name bob
//! > join
//! > connect 1
//! ```

#![allow(clippy::print_stdout, reason = "The console talks to the operator on stdout")]

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use clap::Parser;
use pairplay_app::{Command, CommandError, NodeHandle, Runtime};
use pairplay_cli::{
    console::{self, HELP, Input},
    render,
};
use pairplay_core::{ActiveGame, SessionConfig};
use pairplay_net::{DEFAULT_DISCOVERY_PORT, NetConfig, NetDriver, SystemEnv};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Two-player board games over the local network
#[derive(Parser, Debug)]
#[command(name = "pairplay")]
#[command(about = "Find a peer on the LAN and play line-connect or grid chess")]
#[command(version)]
struct Args {
    /// Name shown to the other player
    #[arg(short, long, default_value = "player")]
    name: String,

    /// Address of the session endpoint (port 0 picks a free one)
    #[arg(short, long, default_value = "0.0.0.0:0")]
    bind: SocketAddr,

    /// UDP port for discovery beacons
    #[arg(long, default_value_t = DEFAULT_DISCOVERY_PORT)]
    discovery_port: u16,

    /// Where beacons are sent
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::BROADCAST))]
    beacon_target: IpAddr,

    /// Seconds to wait for a connection before giving up
    #[arg(long, default_value_t = 15)]
    connect_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // stdout belongs to the console
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let net = NetConfig {
        bind: args.bind,
        discovery_bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.discovery_port)),
        beacon_target: SocketAddr::new(args.beacon_target, args.discovery_port),
        ..NetConfig::default()
    };
    let session = SessionConfig { connect_timeout: Duration::from_secs(args.connect_timeout) };

    let driver = NetDriver::bind(net)?;
    tracing::info!(addr = %driver.local_addr()?, "session endpoint bound");

    let (runtime, handle) = Runtime::new(driver, SystemEnv::new(), args.name, session);
    let task = tokio::spawn(runtime.run());

    println!("pairplay: {} ({})", handle.status().local, handle.status().local.id());
    println!("type `help` for commands");

    console_loop(&handle).await?;

    if let Err(e) = handle.execute(Command::Shutdown).await {
        tracing::debug!(error = %e, "runtime already stopped");
    }
    task.await?;

    Ok(())
}

/// Read commands until `quit`, end of input or the runtime stopping.
async fn console_loop(handle: &NodeHandle) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut updates = handle.watch();
    let mut last_status = String::new();
    let mut last_game: Option<ActiveGame> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                match console::parse(&line) {
                    Ok(None) => {},
                    Ok(Some(Input::Quit)) => return Ok(()),
                    Ok(Some(Input::Help)) => println!("{HELP}"),
                    Ok(Some(Input::Status)) => print!("{}", render::status(&handle.status())),
                    Ok(Some(Input::Board)) => match handle.status().game {
                        Some(game) => print!("{}", render::board(&game)),
                        None => println!("no game open"),
                    },
                    Ok(Some(Input::Connect(index))) => {
                        match console::resolve_room(&handle.status(), index) {
                            Some(peer) => report(handle.execute(Command::Connect(peer)).await),
                            None => println!("no room [{index}], see `status`"),
                        }
                    },
                    Ok(Some(Input::Run(command))) => report(handle.execute(command).await),
                    Err(e) => println!("{e}"),
                }
            },
            changed = updates.changed() => {
                if changed.is_err() {
                    println!("runtime stopped");
                    return Ok(());
                }
                let snapshot = updates.borrow_and_update().clone();
                if snapshot.status != last_status {
                    println!("* {}", snapshot.status);
                    last_status.clone_from(&snapshot.status);
                }
                if snapshot.game != last_game {
                    if let Some(game) = &snapshot.game {
                        print!("{}", render::board(game));
                    }
                    last_game = snapshot.game;
                }
            },
        }
    }
}

fn report(outcome: Result<(), CommandError>) {
    if let Err(e) = outcome {
        println!("refused: {e}");
    }
}
