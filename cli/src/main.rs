//! chainsource CLI — verify blocks and replay aggregate event logs.
//!
//! Usage:
//! ```bash
//! chainsource verify block.json
//! chainsource replay events.json
//! chainsource info
//! ```

use std::env;
use std::fs;
use std::process;

use chainsource_core::{replay, Event};
use chainsource_merkle::{
    verify_block_merkle_root, verify_genesis_merkle_root, verify_witness_commitment, Block,
};
use chainsource_network::{NetworkAggregate, NetworkEvent};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "verify" => cmd_verify(&args[2..]),
        "replay" => cmd_replay(&args[2..]),
        "info" => cmd_info(),
        "version" | "--version" | "-V" => {
            println!("chainsource {}", env!("CARGO_PKG_VERSION"));
        }
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("chainsource {}", env!("CARGO_PKG_VERSION"));
    println!("Reorg-aware, event-sourced blockchain indexing core\n");
    println!("USAGE:");
    println!("    chainsource <COMMAND>\n");
    println!("COMMANDS:");
    println!("    verify <block.json>   Check merkle root and witness commitment");
    println!("    replay <events.json>  Fold a network event log and print the state");
    println!("    info                  Show ChainSource configuration info");
    println!("    version               Print version");
    println!("    help                  Print this help");
}

fn cmd_info() {
    println!("ChainSource v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default max reorganisation depth: 128 blocks");
    println!("  Default snapshot interval: every 100 events");
    println!("  Retained block window: 2048 summaries");
    println!("  Mempool trust policies: any-provider, quorum(n)");
    println!("  Chain kinds: utxo (merkle + witness checks), account");
}

/// Verify a block's merkle root and, when present, its witness commitment.
fn cmd_verify(args: &[String]) {
    let Some(path) = args.first() else {
        eprintln!("verify: missing <block.json> argument");
        process::exit(1);
    };
    let block: Block = read_json(path);

    let merkle_ok = if block.height == 0 {
        verify_genesis_merkle_root(&block)
    } else {
        match verify_block_merkle_root(&block) {
            Ok(ok) => ok,
            Err(err) => {
                eprintln!("verify: {err}");
                process::exit(1);
            }
        }
    };
    println!(
        "height {}  merkle root: {}",
        block.height,
        if merkle_ok { "ok" } else { "MISMATCH" }
    );

    let witness_ok = verify_witness_commitment(&block);
    println!(
        "height {}  witness commitment: {}",
        block.height,
        if witness_ok { "ok" } else { "MISMATCH" }
    );

    if !merkle_ok || !witness_ok {
        process::exit(1);
    }
}

/// Fold a JSON array of network events and print the resulting state.
fn cmd_replay(args: &[String]) {
    let Some(path) = args.first() else {
        eprintln!("replay: missing <events.json> argument");
        process::exit(1);
    };
    let events: Vec<Event<NetworkEvent>> = read_json(path);

    let fold = match replay::<NetworkAggregate>(&events) {
        Ok(fold) => fold,
        Err(err) => {
            eprintln!("replay: {err}");
            process::exit(1);
        }
    };

    let state = &fold.state;
    println!("events applied: {}", fold.version);
    println!("status:         {}", state.status());
    println!("height:         {}", state.height());
    println!("blocks indexed: {}", state.blocks_indexed());
    println!("window size:    {}", state.window().len());
    if let Some(head) = state.window().head() {
        println!("head hash:      {}", head.hash);
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> T {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            eprintln!("cannot read {path}: {err}");
            process::exit(1);
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("cannot parse {path}: {err}");
            process::exit(1);
        }
    }
}
