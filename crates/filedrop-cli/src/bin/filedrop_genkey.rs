use std::io::Read;

use anyhow::{Context, Result};
use clap::Parser;
use filedrop_services::hash_api_key;

use filedrop_cli::key_from_args_or_input;

#[derive(Parser, Debug)]
#[command(name = "filedrop-genkey")]
#[command(about = "Hash an upload API key for the server's auth file")]
struct Args {
    /// Plaintext key; read from stdin when omitted
    key: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut input = String::new();
    if args.key.is_none() {
        std::io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read key from stdin")?;
    }

    let key = key_from_args_or_input(args.key, &input)
        .ok_or_else(|| anyhow::anyhow!("No key given"))?;
    let hash = hash_api_key(&key)?;

    println!("{}", hash);
    Ok(())
}
