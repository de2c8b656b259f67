/// Cache Admin - inspect or reset the configured cache store
///
/// Usage: cargo run --bin cache_admin <stats|ping|health|ttl <key>|clear>
///
/// The store is chosen by BAZAAR_CACHE_BACKEND (memory, lmdb, redis).

use bazaar_storage::telemetry::{init_tracing, TelemetryConfig};
use bazaar_storage::{CacheBackendConfig, CacheMonitor};

fn usage() -> ! {
    eprintln!("Usage: cargo run --bin cache_admin <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  stats        key counts per namespace");
    eprintln!("  ping         connectivity probe");
    eprintln!("  health       timed health check as JSON");
    eprintln!("  ttl <key>    remaining time to live of a key");
    eprintln!("  clear        delete every key");
    std::process::exit(1);
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        usage();
    }

    if let Err(e) = init_tracing(&TelemetryConfig::default()) {
        eprintln!("Failed to initialise logging: {}", e);
    }

    let store = match CacheBackendConfig::from_env().and_then(|c| c.open()) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to open cache store: {}", e);
            std::process::exit(1);
        }
    };
    let monitor = CacheMonitor::new(store);

    match args[1].as_str() {
        "stats" => match serde_json::to_string_pretty(&monitor.statistics()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to render statistics: {}", e);
                std::process::exit(1);
            }
        },
        "ping" => {
            if monitor.is_connected() {
                println!("connected");
            } else {
                println!("not connected");
                std::process::exit(2);
            }
        }
        "health" => match serde_json::to_string_pretty(&monitor.health()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to render health: {}", e);
                std::process::exit(1);
            }
        },
        "ttl" => {
            let Some(key) = args.get(2) else { usage() };
            match monitor.key_ttl(key) {
                Some(ttl) => println!("{}s", ttl.as_secs()),
                None => println!("no expiry or missing"),
            }
        }
        "clear" => println!("removed {} keys", monitor.clear_all()),
        _ => usage(),
    }
}
