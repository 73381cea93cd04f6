use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use prov_crypto::{commit, verify, CommitmentHash, EcCurve, KeyPair};
use prov_ledger::InMemoryLedger;
use prov_protocol::TcpConnector;
use prov_transfer::{LocalIdentity, TransferConfig, TransferNode, TransferNodeParts};
use prov_types::{Peer, PeerId, PeerProtocol, UserId};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Keygen(args) => cmd_keygen(args),
        Command::Hash(args) => cmd_hash(args, format),
        Command::VerifyHash(args) => cmd_verify_hash(args),
        Command::Config(args) => cmd_config(args, format),
        Command::Serve(args) => cmd_serve(args),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TransferConfig> {
    let config = match path {
        Some(path) => TransferConfig::load(path)?,
        None => TransferConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn cmd_keygen(args: KeygenArgs) -> anyhow::Result<()> {
    let key = match args.algorithm {
        Algorithm::Rsa => KeyPair::generate_rsa(args.bits)?,
        Algorithm::Ecdsa => KeyPair::generate_ecdsa(match args.curve {
            Curve::P256 => EcCurve::P256,
            Curve::P384 => EcCurve::P384,
            Curve::P521 => EcCurve::P521,
        })?,
    };
    match args.out {
        Some(dir) => {
            std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
            let private = dir.join("private.pem");
            let public = dir.join("public.pem");
            std::fs::write(&private, key.private_key_pem())
                .with_context(|| format!("writing {}", private.display()))?;
            std::fs::write(&public, key.public_key_pem())
                .with_context(|| format!("writing {}", public.display()))?;
            println!("{} Generated {:?} key pair", "✓".green().bold(), key.algorithm());
            println!("  Private: {}", private.display().to_string().yellow());
            println!("  Public:  {}", public.display().to_string().yellow());
        }
        None => {
            print!("{}", key.private_key_pem());
            print!("{}", key.public_key_pem());
        }
    }
    Ok(())
}

fn cmd_hash(args: HashArgs, format: OutputFormat) -> anyhow::Result<()> {
    let hash = commit(&args.id, &args.secret);
    match format {
        OutputFormat::Text => println!("{}", hash.as_str()),
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "id": args.id, "hash": hash.as_str() })
        ),
    }
    Ok(())
}

fn cmd_verify_hash(args: VerifyHashArgs) -> anyhow::Result<()> {
    let claimed = CommitmentHash::from_base64(&args.hash)?;
    if !verify(&args.id, &args.secret, &claimed) {
        bail!("commitment mismatch for {}", args.id);
    }
    println!("{} {} matches {}", "✓".green().bold(), args.id.cyan(), claimed.short().yellow());
    Ok(())
}

fn cmd_config(args: ConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    match format {
        OutputFormat::Text => print!("{}", config.to_toml_string()?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
    }
    Ok(())
}

/// Parse `ID,HOST:PORT,PUBLIC_KEY_PEM_PATH`.
pub(crate) fn parse_peer(spec: &str) -> anyhow::Result<Peer> {
    let mut parts = spec.splitn(3, ',');
    let (Some(id), Some(uri), Some(key_path)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("peer must be ID,HOST:PORT,PUBLIC_KEY_PEM_PATH: {spec}");
    };
    let id: u64 = id.trim().parse().with_context(|| format!("peer id {id:?}"))?;
    let public_key = std::fs::read_to_string(key_path.trim())
        .with_context(|| format!("reading {}", key_path.trim()))?;
    Ok(Peer {
        id: PeerId(id),
        user_id: UserId(0),
        protocol: PeerProtocol::framed(),
        connection_uri: uri.trim().to_string(),
        public_key,
    })
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let key = match &args.key {
        Some(path) => {
            let pem = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            KeyPair::from_private_pem(&pem)?
        }
        None => KeyPair::generate_ecdsa(EcCurve::default())?,
    };
    let peers = args
        .peers
        .iter()
        .map(|spec| parse_peer(spec))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let ledger = Arc::new(InMemoryLedger::new(config.graph_name.clone()));
        let parts = TransferNodeParts::in_memory(ledger, Arc::new(TcpConnector));
        let identity = LocalIdentity::new(UserId(args.user), key);
        let listen = config.listen_addr;
        let node = TransferNode::new(config, identity, parts)?;
        for peer in peers {
            node.add_peer(peer)?;
        }
        let _handlers = node.start()?;

        let shutdown = CancellationToken::new();
        let on_signal = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutting down");
                on_signal.cancel();
            }
        });

        println!("{} Serving user {} on {}", "✓".green().bold(), args.user, listen.to_string().bold());
        println!("{}", node.identity().public_key_pem().dimmed());
        node.serve(shutdown).await?;
        Ok::<_, anyhow::Error>(())
    })
}
