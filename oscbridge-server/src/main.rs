// Interactive console around the OSC bridge: starts/stops the UDP listener
// and prints every message that reaches the bus.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use oscbridge_core::OscService;
use oscbridge_core::config::Settings;
use oscbridge_core::eventbus::{BusEvent, EventKind};

const MONITOR_PUMP_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "oscbridge")]
#[command(author, version, about = "OSC UDP listener bridging messages onto an event bus")]
struct Args {
    /// Path to a JSON settings file with the default bind address and port
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address, overriding the settings file
    #[arg(long)]
    address: Option<String>,

    /// Bind port, overriding the settings file
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut settings = match &args.config {
        Some(path) => Settings::load_or_default(path),
        None => Settings::default(),
    };
    if let Some(address) = args.address {
        settings.address = address;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }

    let mut service = OscService::new();

    // Monitor subscription: prints everything the listener publishes. It is
    // drained on its own small interval thread.
    let mut monitor = service.bus().subscribe(EventKind::OscMessage, |event| {
        let BusEvent::OscMessage(msg) = event;
        println!("{} {:?}", msg.address, msg.args);
    });
    let monitor_running = Arc::new(AtomicBool::new(true));
    let monitor_handle = {
        let running = Arc::clone(&monitor_running);
        thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                monitor.pump();
                thread::sleep(MONITOR_PUMP_INTERVAL);
            }
        })
    };

    service.start(&settings.address, settings.port);
    println!("Type 'help' for available commands.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("start") => {
                let address = parts.next().unwrap_or(settings.address.as_str()).to_string();
                let port = match parts.next() {
                    Some(raw) => match raw.parse::<u16>() {
                        Ok(port) => port,
                        Err(_) => {
                            println!("invalid port: {raw}");
                            continue;
                        }
                    },
                    None => settings.port,
                };
                if service.start(&address, port) {
                    println!("running UDP server @ {address}:{port}");
                } else {
                    println!("failed to start, see log output");
                }
            }
            Some("stop") => {
                service.stop();
                println!("stopped");
            }
            Some("status") => {
                println!("{}", if service.running() { "running" } else { "stopped" });
            }
            Some("help") => {
                println!("commands: start [address] [port], stop, status, quit");
            }
            Some("quit") | Some("exit") => break,
            Some(other) => println!("unknown command: {other}"),
            None => {}
        }
    }

    info!("console exiting");
    monitor_running.store(false, Ordering::SeqCst);
    let _ = monitor_handle.join();
    service.shutdown();
    Ok(())
}
