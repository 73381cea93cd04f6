use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "prov", about = "Provenance asset transfer", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a signing key pair
    Keygen(KeygenArgs),
    /// Compute the disclosure commitment of an (id, secret) pair
    Hash(HashArgs),
    /// Check an (id, secret) pair against a commitment
    VerifyHash(VerifyHashArgs),
    /// Print the effective configuration
    Config(ConfigArgs),
    /// Run a transfer responder backed by an in-memory ledger
    Serve(ServeArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Algorithm {
    Rsa,
    Ecdsa,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Curve {
    P256,
    P384,
    P521,
}

#[derive(Args)]
pub struct KeygenArgs {
    #[arg(long, default_value = "ecdsa")]
    pub algorithm: Algorithm,
    /// RSA modulus size
    #[arg(long, default_value = "2048")]
    pub bits: u32,
    #[arg(long, default_value = "p521")]
    pub curve: Curve,
    /// Write private.pem and public.pem here instead of printing them
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct HashArgs {
    pub id: String,
    pub secret: String,
}

#[derive(Args)]
pub struct VerifyHashArgs {
    pub id: String,
    pub secret: String,
    pub hash: String,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// PEM private key; a fresh ECDSA key is generated if omitted
    #[arg(long)]
    pub key: Option<PathBuf>,
    #[arg(long, default_value = "1")]
    pub user: u64,
    /// Known sender as ID,HOST:PORT,PUBLIC_KEY_PEM_PATH (repeatable)
    #[arg(long = "peer")]
    pub peers: Vec<String>,
}
