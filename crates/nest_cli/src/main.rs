//! nest — mint, extend, and verify nested assertion tokens.

use clap::{Parser, Subcommand};
use nest_directory::DirectoryClient;
use nest_schnorr::Keypair;
use nest_token::{
    concatenate, schnorr_append, schnorr_assert, trace_extend, trace_new, DirectoryKeys,
    EcdsaBuilder, EmbeddedIssuer, IssuerMode, Verifier,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nest")]
#[command(about = "Nested assertion tokens for SPIFFE workloads")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pretty-print a token's payloads and signatures
    Print {
        token: String,
    },
    /// Mint a fresh ECDSA assertion and publish its key
    Ecdsagen {
        claim_key: String,
        claim_value: String,
        /// spiffeid, svid, or anonymous
        issuer_mode: String,
    },
    /// Verify an ECDSA token against the key directory
    Ecdsaver {
        token: String,
    },
    /// Extend an ECDSA token; the prior token is verified first
    Append {
        prior: String,
        claim_key: String,
        claim_value: String,
        /// spiffeid, svid, or anonymous
        issuer_mode: String,
    },
    /// Extend an ECDSA token `count` times
    Multiappend {
        prior: String,
        claim_key: String,
        claim_value: String,
        count: u32,
        /// spiffeid, svid, or anonymous
        issuer_mode: String,
    },
    /// Mint a fresh Schnorr assertion with a random key
    Schgen {
        claim_key: String,
        claim_value: String,
    },
    /// Verify a Schnorr token, signatures only
    Schver {
        token: String,
    },
    /// Mint a seeded Schnorr assertion naming its next hop
    Tracenew {
        claim_key: String,
        claim_value: String,
        iss_seed: String,
        aud_seed: String,
    },
    /// Add the next hop to a trace token
    Traceadd {
        prior: String,
        iss_seed: String,
        next_aud_seed: String,
    },
    /// Verify a Schnorr token including the iss/aud chain
    Tracever {
        token: String,
    },
    /// Extend a Schnorr token, reusing the outer signature scalar as the key
    Concatenate {
        prior: String,
        claim_key: String,
        claim_value: String,
    },
    /// Print the deterministic keypair for a seed
    Schkeypair {
        seed: String,
    },
    /// Append with fresh random keys, printing the next hop's secret
    Schapp {
        prior: String,
        claim_key: String,
        claim_value: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();
    nest_config::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Print { token } => cmd_print(&token),
        Commands::Ecdsagen {
            claim_key,
            claim_value,
            issuer_mode,
        } => cmd_ecdsa_assert(&claim_key, &claim_value, &issuer_mode, None).await,
        Commands::Ecdsaver { token } => cmd_ecdsa_verify(&token).await,
        Commands::Append {
            prior,
            claim_key,
            claim_value,
            issuer_mode,
        } => cmd_ecdsa_assert(&claim_key, &claim_value, &issuer_mode, Some(&prior)).await,
        Commands::Multiappend {
            prior,
            claim_key,
            claim_value,
            count,
            issuer_mode,
        } => cmd_multiappend(&prior, &claim_key, &claim_value, count, &issuer_mode).await,
        Commands::Schgen {
            claim_key,
            claim_value,
        } => cmd_schgen(&claim_key, &claim_value),
        Commands::Schver { token } => cmd_schnorr_verify(&token, false).await,
        Commands::Tracenew {
            claim_key,
            claim_value,
            iss_seed,
            aud_seed,
        } => cmd_tracenew(&claim_key, &claim_value, &iss_seed, &aud_seed),
        Commands::Traceadd {
            prior,
            iss_seed,
            next_aud_seed,
        } => cmd_traceadd(&prior, &iss_seed, &next_aud_seed),
        Commands::Tracever { token } => cmd_schnorr_verify(&token, true).await,
        Commands::Concatenate {
            prior,
            claim_key,
            claim_value,
        } => cmd_concatenate(&prior, &claim_key, &claim_value),
        Commands::Schkeypair { seed } => cmd_schkeypair(&seed),
        Commands::Schapp {
            prior,
            claim_key,
            claim_value,
        } => cmd_schapp(&prior, &claim_key, &claim_value),
    }
}

fn directory() -> DirectoryClient {
    DirectoryClient::new(nest_config::KEYDIR_URL.as_str())
}

// ── print ───────────────────────────────────────────────────────

fn cmd_print(token: &str) -> anyhow::Result<()> {
    let parsed = nest_codec::Token::parse(token)?;
    let hops = parsed.payload_count();
    println!("Total segments: {}", hops * 2);
    for i in 0..hops {
        let decoded = nest_codec::b64_decode(parsed.payload(i))?;
        println!("Claim     [{i}]: {}", String::from_utf8_lossy(&decoded));
    }
    for i in (0..hops).rev() {
        println!("Signature [{}]: {}", 2 * hops - 1 - i, parsed.signature(i));
    }
    Ok(())
}

// ── ecdsa ───────────────────────────────────────────────────────

async fn cmd_ecdsa_assert(
    claim_key: &str,
    claim_value: &str,
    issuer_mode: &str,
    prior: Option<&str>,
) -> anyhow::Result<()> {
    let mode: IssuerMode = issuer_mode.parse()?;
    let identity = nest_identity::fetch_identity().await?;
    let builder = EcdsaBuilder::new(&identity, directory());
    let token = builder.assert(claim_key, claim_value, mode, prior).await?;
    println!("{token}");
    Ok(())
}

async fn cmd_multiappend(
    prior: &str,
    claim_key: &str,
    claim_value: &str,
    count: u32,
    issuer_mode: &str,
) -> anyhow::Result<()> {
    let mode: IssuerMode = issuer_mode.parse()?;
    let identity = nest_identity::fetch_identity().await?;
    let builder = EcdsaBuilder::new(&identity, directory());
    let token = builder
        .assert_many(prior, claim_key, claim_value, count, mode)
        .await?;
    println!("{token}");
    Ok(())
}

async fn cmd_ecdsa_verify(token: &str) -> anyhow::Result<()> {
    Verifier::new(DirectoryKeys::new(directory()))
        .verify(token)
        .await?;
    println!("token verified");
    Ok(())
}

// ── schnorr ─────────────────────────────────────────────────────

fn cmd_schgen(claim_key: &str, claim_value: &str) -> anyhow::Result<()> {
    let keypair = Keypair::random();
    let token = schnorr_assert(claim_key, claim_value, &keypair, None, None)?;
    println!("{token}");
    Ok(())
}

async fn cmd_schnorr_verify(token: &str, link_check: bool) -> anyhow::Result<()> {
    let verifier = Verifier::new(EmbeddedIssuer);
    let verifier = if link_check {
        verifier.with_link_check()
    } else {
        verifier
    };
    verifier.verify(token).await?;
    println!("token verified");
    Ok(())
}

fn cmd_tracenew(
    claim_key: &str,
    claim_value: &str,
    iss_seed: &str,
    aud_seed: &str,
) -> anyhow::Result<()> {
    let issuer = Keypair::from_seed(iss_seed);
    let audience = Keypair::from_seed(aud_seed);
    let token = trace_new(claim_key, claim_value, &issuer, &audience.public)?;
    println!("{token}");
    Ok(())
}

fn cmd_traceadd(prior: &str, iss_seed: &str, next_aud_seed: &str) -> anyhow::Result<()> {
    let keypair = Keypair::from_seed(iss_seed);
    let next = Keypair::from_seed(next_aud_seed);
    let token = trace_extend(prior, &keypair, &next.public)?;
    println!("{token}");
    Ok(())
}

fn cmd_concatenate(prior: &str, claim_key: &str, claim_value: &str) -> anyhow::Result<()> {
    let token = concatenate(prior, claim_key, claim_value)?;
    println!("{token}");
    Ok(())
}

fn cmd_schkeypair(seed: &str) -> anyhow::Result<()> {
    let keypair = Keypair::from_seed(seed);
    println!("private: {}", hex::encode(keypair.secret.as_bytes()));
    println!("public : {}", nest_schnorr::point_to_b64(&keypair.public));
    Ok(())
}

fn cmd_schapp(prior: &str, claim_key: &str, claim_value: &str) -> anyhow::Result<()> {
    let (token, next) = schnorr_append(prior, claim_key, claim_value)?;
    println!("{token}");
    println!("next private key: {}", hex::encode(next.secret.as_bytes()));
    Ok(())
}
