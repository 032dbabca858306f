//!
//! postern server binary
//! ---------------------
//! Command-line entry point for starting the postern HTTP server.
//! Supports configuration via CLI flags and environment variables.

use anyhow::Result;
use std::env;

fn parse_port_env(name: &str) -> Option<u16> {
    match env::var(name) {
        Ok(val) => val.parse::<u16>().ok(),
        Err(_) => None,
    }
}

fn parse_port_arg(args: &[String], flag: &str) -> Option<u16> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag
            && i + 1 < args.len() {
                return args[i + 1].parse::<u16>().ok();
            }
        i += 1;
    }
    None
}

fn parse_i64_env(name: &str) -> Option<i64> {
    match env::var(name) {
        Ok(val) => val.parse::<i64>().ok(),
        Err(_) => None,
    }
}

fn parse_i64_arg(args: &[String], flag: &str) -> Option<i64> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag
            && i + 1 < args.len() {
                return args[i + 1].parse::<i64>().ok();
            }
        i += 1;
    }
    None
}

fn parse_bool_env(name: &str) -> Option<bool> {
    match env::var(name) {
        Ok(v) => {
            let s = v.to_lowercase();
            match s.as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            }
        }
        Err(_) => None,
    }
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> Result<()> {
    println!(r"                     __
    ____  ____  _____/ /____  _________
   / __ \/ __ \/ ___/ __/ _ \/ ___/ __ \
  / /_/ / /_/ (__  ) /_/  __/ /  / / / /
 / .___/\____/____/\__/\___/_/  /_/ /_/
/_/                                     ");

    // Initialize tracing subscriber with env filter if provided
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("postern Server\n\nUSAGE:\n  postern_server [--http-port N] [--data-dir PATH] [--invite-ttl N] [--ephemeral]\n\nOPTIONS:\n  --http-port N     HTTP API port (env: POSTERN_HTTP_PORT, default 7878)\n  --data-dir PATH   Directory snapshot folder (env: POSTERN_DATA_DIR, default data)\n  --invite-ttl N    Invitation lifetime in days (env: POSTERN_INVITE_TTL_DAYS, default 14)\n  --ephemeral       Keep everything in memory, never touch disk (env: POSTERN_EPHEMERAL)\n\nSnapshot cadence is env-only: POSTERN_SNAPSHOT_INTERVAL_SEC (default 30, <=0 disables).\n");
        return Ok(());
    }

    // Defaults
    let default_http: u16 = 7878;
    let default_root: &str = "data";

    // Environment variables
    let env_http = parse_port_env("POSTERN_HTTP_PORT");
    let env_root = std::env::var("POSTERN_DATA_DIR").ok();
    let env_ttl = parse_i64_env("POSTERN_INVITE_TTL_DAYS");
    let env_ephemeral = parse_bool_env("POSTERN_EPHEMERAL");

    // CLI arguments override environment
    let arg_http = parse_port_arg(&args, "--http-port");
    let arg_root = {
        let mut i = 0;
        let mut val: Option<String> = None;
        while i < args.len() {
            if args[i] == "--data-dir" {
                if i + 1 < args.len() { val = Some(args[i + 1].clone()); }
                break;
            }
            i += 1;
        }
        val
    };
    let arg_ttl = parse_i64_arg(&args, "--invite-ttl");

    let http_port = arg_http.or(env_http).unwrap_or(default_http);
    let data_root = arg_root.or(env_root).unwrap_or_else(|| default_root.to_string());
    let ephemeral = has_flag(&args, "--ephemeral") || env_ephemeral.unwrap_or(false);

    let mut invite_ttl_days = arg_ttl
        .or(env_ttl)
        .unwrap_or(postern::server::DEFAULT_INVITE_TTL_DAYS);
    if invite_ttl_days <= 0 {
        println!(
            "WARNING: invitation TTL must be positive, falling back to {} days",
            postern::server::DEFAULT_INVITE_TTL_DAYS
        );
        invite_ttl_days = postern::server::DEFAULT_INVITE_TTL_DAYS;
    }

    if ephemeral {
        println!("postern starting in memory (no persistence): http={}", http_port);
        tracing::info!("Ephemeral mode; http={}", http_port);
        return postern::server::run_with_config(http_port, None, invite_ttl_days).await;
    }

    println!("postern starting: http={}, data_dir={}", http_port, data_root);
    tracing::info!("Using port: http={}, data_dir={}", http_port, data_root);
    postern::server::run_with_config(http_port, Some(&data_root), invite_ttl_days).await
}
