//! secp256k1 keypair generator for paygate-node identities.
//!
//! Generates a new keypair and outputs, as JSON:
//! - `publicKey`: compressed SEC1 public key, hex
//! - `privateKey`: 32-byte secret scalar, hex
//! - `address`: the account address derived from the public key
//!
//! Usage:
//!   cargo run --bin paygate-keygen -- [--file keys.json]

use clap::Parser;
use color_eyre::eyre::WrapErr;
use k256::ecdsa::SigningKey;
use paygate_node::payment::signature::address_of;
use rand::rngs::OsRng;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

/// Generate a secp256k1 keypair.
#[derive(Parser, Debug)]
#[command(name = "paygate-keygen")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Write the keypair to this JSON file instead of stdout.
    #[arg(long, short)]
    file: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyPair {
    public_key: String,
    private_key: String,
    address: String,
}

impl KeyPair {
    fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        Self {
            public_key: hex::encode(verifying_key.to_encoded_point(true).as_bytes()),
            private_key: hex::encode(signing_key.to_bytes()),
            address: address_of(verifying_key).to_string(),
        }
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let keypair = KeyPair::generate();
    let json = serde_json::to_string_pretty(&keypair)?;

    match args.file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                fs::create_dir_all(dir)
                    .wrap_err_with(|| format!("failed to create {}", dir.display()))?;
            }
            fs::write(&path, json)
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            println!("Key pair exported to file {}", path.display());
            println!("  WARNING: Keep this file secure! It holds the private key.");
        }
        None => println!("{json}"),
    }

    Ok(())
}
