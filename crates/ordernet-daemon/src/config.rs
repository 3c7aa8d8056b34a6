//! CLI argument parsing for the daemon.
//!
//! Flags map directly onto [`NodeConfig`]:
//!
//! - `--nick <string>` — initial nickname if no stored identity exists
//! - `--port <int>` — local TCP listen port (0 = ephemeral)
//! - `--db <path>` — override database path
//! - `--bootstrap <multiaddr>` — repeatable; peers to dial at startup
//! - `--mdns` — enable LAN mDNS discovery (off by default)
//! - `--passphrase <string>` — identity passphrase (or set
//!   `ORDERNET_PASSPHRASE`)

use std::path::PathBuf;

use ordernet_types::config::NodeConfig;

/// Environment variable carrying the identity passphrase.
pub const PASSPHRASE_ENV: &str = "ORDERNET_PASSPHRASE";

/// Result of parsing the argument list.
pub enum ParseOutcome {
    /// Parsed successfully.
    Config(NodeConfig),
    /// `--help` was requested.
    Help,
    /// A flag was unknown or malformed.
    Error(String),
}

/// Parses an argument list (without the program name).
pub fn parse_args(args: &[String]) -> ParseOutcome {
    let mut config = NodeConfig::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--nick" => {
                i += 1;
                match args.get(i) {
                    Some(nick) => config.nickname = Some(nick.clone()),
                    None => return ParseOutcome::Error("--nick requires a value".into()),
                }
            }
            "--port" => {
                i += 1;
                match args.get(i).and_then(|s| s.parse().ok()) {
                    Some(port) => config.listen_port = port,
                    None => return ParseOutcome::Error("--port requires an integer".into()),
                }
            }
            "--db" => {
                i += 1;
                match args.get(i) {
                    Some(path) => config.db_path = Some(PathBuf::from(path)),
                    None => return ParseOutcome::Error("--db requires a path".into()),
                }
            }
            "--bootstrap" => {
                i += 1;
                match args.get(i) {
                    Some(addr) => config.bootstrap.push(addr.clone()),
                    None => return ParseOutcome::Error("--bootstrap requires a multiaddr".into()),
                }
            }
            "--mdns" => {
                config.enable_mdns = true;
            }
            "--passphrase" => {
                i += 1;
                match args.get(i) {
                    Some(pass) => config.passphrase = Some(pass.clone()),
                    None => return ParseOutcome::Error("--passphrase requires a value".into()),
                }
            }
            "--help" | "-h" => return ParseOutcome::Help,
            other => return ParseOutcome::Error(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if config.passphrase.is_none() {
        if let Ok(pass) = std::env::var(PASSPHRASE_ENV) {
            if !pass.is_empty() {
                config.passphrase = Some(pass);
            }
        }
    }

    ParseOutcome::Config(config)
}

/// Prints usage information.
pub fn print_help() {
    println!(
        r#"OrderNet daemon - local-first peer-to-peer chat node

USAGE:
    ordernet-daemon [OPTIONS]

OPTIONS:
    --nick <STRING>          Initial nickname (used only when no identity exists)
    --port <INT>             Local TCP listen port (default: 0 = ephemeral)
    --db <PATH>              Database path (default: ~/.ordernet/ordernet.db)
    --bootstrap <MULTIADDR>  Peer to dial at startup (repeatable)
    --mdns                   Enable LAN mDNS discovery (off by default)
    --passphrase <STRING>    Identity passphrase (or set ORDERNET_PASSPHRASE)
    -h, --help               Show this help

EXAMPLES:
    # First run on a LAN
    ordernet-daemon --nick alice --port 9000 --mdns

    # Join an existing overlay
    ordernet-daemon --bootstrap /ip4/203.0.113.1/tcp/9000/p2p/12D3KooW...

ENVIRONMENT:
    ORDERNET_PASSPHRASE      Identity passphrase
    RUST_LOG                 Log level filter (default: info)
"#
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
