//! ECDSA2P Party CLI
//!
//! Command-line interface for the two-party protocol:
//! - Run both parties as separate tasks over an in-memory relay
//! - Verify a signature against a public key

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ecdsa2p_core::mpc::MemoryRelay;
use ecdsa2p_core::verify::{self, ethereum_address, parse_public_key, recover_public_key};
use ecdsa2p_core::{
    keygen, new_session_id, sign, KeySplit, MessageHash, PartyId, ProtocolConfig, SessionId,
    Signature, SigningKey,
};
use futures_util::future::try_join_all;
use rand::rngs::OsRng;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// ECDSA2P Party - two-party threshold ECDSA
#[derive(Parser)]
#[command(name = "ecdsa2p-party")]
#[command(about = "Two-party threshold ECDSA on secp256k1")]
#[command(version)]
struct Cli {
    /// Log output format
    #[arg(long, env = "ECDSA2P_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum SplitArg {
    /// x = x1 * x2
    Multiplicative,
    /// x = x1 + x2
    Additive,
}

impl From<SplitArg> for KeySplit {
    fn from(arg: SplitArg) -> Self {
        match arg {
            SplitArg::Multiplicative => KeySplit::Multiplicative,
            SplitArg::Additive => KeySplit::Additive,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a joint key and sign messages with both parties
    Demo {
        /// Message to sign; repeat to run several signing sessions concurrently
        #[arg(
            short,
            long = "message",
            default_value = "Some secret message to be encrypted!"
        )]
        messages: Vec<String>,

        /// Paillier modulus size in bits
        #[arg(long, env = "ECDSA2P_PAILLIER_BITS", default_value_t = ecdsa2p_core::DEFAULT_PAILLIER_MODULUS_BITS)]
        paillier_bits: usize,

        /// Nonce attempts per signature (0 = unlimited)
        #[arg(long, env = "ECDSA2P_MAX_NONCE_ATTEMPTS", default_value_t = ecdsa2p_core::DEFAULT_MAX_NONCE_ATTEMPTS)]
        max_attempts: u32,

        /// Seconds to wait for any single peer message
        #[arg(long, env = "ECDSA2P_RELAY_TIMEOUT_SECS", default_value_t = 30)]
        timeout_secs: u64,

        /// How the signing key is split between the parties
        #[arg(long, env = "ECDSA2P_KEY_SPLIT", value_enum, default_value_t = SplitArg::Multiplicative)]
        key_split: SplitArg,

        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify a signature against a public key
    Verify {
        /// SEC1 public key (hex, compressed or uncompressed)
        #[arg(short, long)]
        public_key: String,

        /// Message text, hashed with Keccak-256
        #[arg(short, long, required_unless_present = "hash", conflicts_with = "hash")]
        message: Option<String>,

        /// Precomputed 32-byte digest (hex)
        #[arg(long)]
        hash: Option<String>,

        /// R component (hex)
        #[arg(short)]
        r: String,

        /// S component (hex)
        #[arg(short)]
        s: String,

        /// Recovery value (0-3 or 27-30); also checks key recovery when given
        #[arg(short)]
        v: Option<u8>,
    },
}

#[derive(Serialize)]
struct SignatureReport {
    message: String,
    hash: String,
    r: String,
    s: String,
    v: u8,
    der: String,
    valid: bool,
}

#[derive(Serialize)]
struct DemoReport {
    key_split: KeySplit,
    public_key: String,
    address: String,
    signatures: Vec<SignatureReport>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Commands::Demo {
            messages,
            paillier_bits,
            max_attempts,
            timeout_secs,
            key_split,
            json,
        } => {
            let config = ProtocolConfig {
                paillier_modulus_bits: paillier_bits,
                max_nonce_attempts: (max_attempts > 0).then_some(max_attempts),
                relay_timeout: Duration::from_secs(timeout_secs),
                key_split: key_split.into(),
            };
            run_demo(messages, config, json).await?;
        }
        Commands::Verify {
            ref public_key,
            ref message,
            ref hash,
            ref r,
            ref s,
            v,
        } => {
            run_verify(public_key, message.as_deref(), hash.as_deref(), r, s, v)?;
        }
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run_demo(messages: Vec<String>, config: ProtocolConfig, json: bool) -> Result<()> {
    config.validate()?;

    let relay = MemoryRelay::new();
    let key_session = new_session_id(&mut OsRng);
    let sessions: Vec<(SessionId, MessageHash)> = messages
        .iter()
        .map(|m| (new_session_id(&mut OsRng), MessageHash::from_message(m.as_bytes())))
        .collect();
    let session_ids: Vec<SessionId> = sessions.iter().map(|(id, _)| *id).collect();

    info!(
        key_session = hex::encode(&key_session[..8]),
        messages = messages.len(),
        paillier_bits = config.paillier_modulus_bits,
        key_split = %config.key_split,
        "Starting two-party demo"
    );

    let party1 = tokio::spawn(run_party1(
        relay.clone(),
        key_session,
        session_ids,
        config.clone(),
    ));
    let party2 = tokio::spawn(run_party2(relay.clone(), key_session, sessions.clone(), config));
    let (party1, party2) = tokio::join!(party1, party2);
    let signatures1 = party1.context("party 1 task failed")??;
    let (signing_key, signatures2) = party2.context("party 2 task failed")??;

    if signatures1 != signatures2 {
        bail!("parties finished with different signatures");
    }
    if relay.pending() != 0 {
        warn!(pending = relay.pending(), "Relay still holds undelivered messages");
    }

    let public_key = signing_key.public_key();
    let mut reports = Vec::with_capacity(signatures1.len());
    for ((message, (_, hash)), signature) in messages.iter().zip(&sessions).zip(&signatures1) {
        reports.push(SignatureReport {
            message: message.clone(),
            hash: hex::encode(hash.as_bytes()),
            r: hex::encode(signature.r),
            s: hex::encode(signature.s),
            v: signature.v(),
            der: hex::encode(signature.to_der()?),
            valid: verify::verify(signature, hash, public_key),
        });
    }
    let report = DemoReport {
        key_split: signing_key.key_split(),
        public_key: hex::encode(signing_key.public_key_bytes()),
        address: ethereum_address(public_key)?,
        signatures: reports,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Key split:  {}", report.key_split);
    println!("Public Key: {}", report.public_key);
    println!("Address:    {}", report.address);
    for sig in &report.signatures {
        println!();
        println!("Message: {}", sig.message);
        println!("  hash:  {}", sig.hash);
        println!("  r:     {}", sig.r);
        println!("  s:     {}", sig.s);
        println!("  v:     {}", sig.v);
        println!("  DER:   {}", sig.der);
        println!("  valid: {}", sig.valid);
    }

    Ok(())
}

async fn run_party1(
    relay: MemoryRelay,
    key_session: SessionId,
    sessions: Vec<SessionId>,
    config: ProtocolConfig,
) -> Result<Vec<Signature>> {
    let key_share =
        keygen::run_key_agreement(PartyId::Party1, &key_session, &config, &relay).await?;
    let signer = sign::run_party1_setup(key_share, &key_session, &config, &relay).await?;

    let signatures = try_join_all(
        sessions
            .iter()
            .map(|id| sign::run_party1_signing(&signer, id, &config, &relay)),
    )
    .await?;
    Ok(signatures)
}

async fn run_party2(
    relay: MemoryRelay,
    key_session: SessionId,
    sessions: Vec<(SessionId, MessageHash)>,
    config: ProtocolConfig,
) -> Result<(SigningKey, Vec<Signature>)> {
    let key_share =
        keygen::run_key_agreement(PartyId::Party2, &key_session, &config, &relay).await?;
    let signer = sign::run_party2_setup(key_share, &key_session, &config, &relay).await?;

    let signatures = try_join_all(
        sessions
            .iter()
            .map(|(id, hash)| sign::run_party2_signing(&signer, id, hash, &config, &relay)),
    )
    .await?;
    Ok((signer.signing_key().clone(), signatures))
}

fn run_verify(
    public_key: &str,
    message: Option<&str>,
    hash: Option<&str>,
    r: &str,
    s: &str,
    v: Option<u8>,
) -> Result<()> {
    let key_bytes = hex::decode(public_key.trim_start_matches("0x"))?;
    let public_key = parse_public_key(&key_bytes)?;

    let hash = match (message, hash) {
        (Some(message), _) => MessageHash::from_message(message.as_bytes()),
        (None, Some(hash)) => MessageHash::from_prehashed(decode_32(hash, "hash")?),
        (None, None) => bail!("either --message or --hash is required"),
    };

    let recovery_id = match v {
        Some(v @ 0..=3) => v,
        Some(v @ 27..=30) => v - 27,
        Some(v) => bail!("recovery value {} is out of range", v),
        None => 0,
    };
    let signature = Signature::new(decode_32(r, "r")?, decode_32(s, "s")?, recovery_id);

    let valid = verify::verify(&signature, &hash, &public_key);
    info!(valid, hash = hex::encode(hash.as_bytes()), "Signature checked");

    println!("Address: {}", ethereum_address(&public_key)?);
    println!("Valid:   {}", valid);
    if v.is_some() {
        let recovered = recover_public_key(&signature, &hash)
            .map(|key| key == public_key)
            .unwrap_or(false);
        println!("Recovers public key: {}", recovered);
    }

    if !valid {
        bail!("signature does not verify");
    }
    Ok(())
}

fn decode_32(value: &str, name: &str) -> Result<[u8; 32]> {
    hex::decode(value.trim_start_matches("0x"))
        .with_context(|| format!("{} is not valid hex", name))?
        .try_into()
        .map_err(|_| anyhow!("{} must be 32 bytes", name))
}
