use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use swap_client::chain::types::Currency;
use swap_client::config::{load_config, ClientConfig};
use swap_client::counterparty::{CounterpartyApi, HttpCounterparty};
use swap_client::crypto::{cipher, WalletCredentials};
use swap_client::lifecycle::Shutdown;
use swap_client::onchain::{build_onchain, ChainTransaction, Onchain};

#[derive(Parser)]
#[command(name = "swap-cli")]
#[command(about = "Operator CLI for the swap client", long_about = None)]
struct Cli {
    /// Client configuration; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Query explorers only, without the counterparty fallback
    #[arg(long)]
    no_fallback: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fee estimate in sat/vbyte
    Fee { currency: Currency },
    /// Current block height
    Height { currency: Currency },
    /// Fetch a transaction as hex
    Tx {
        currency: Currency,
        id: String,
        /// Blinding key to unblind Liquid outputs, hex encoded
        #[arg(long)]
        blinding_key: Option<String>,
    },
    /// Whether a transaction is confirmed
    Confirmed { currency: Currency, id: String },
    /// Broadcast a raw transaction to every source
    Broadcast { currency: Currency, hex: String },
    /// Encrypt a wallet credentials file
    Encrypt {
        file: PathBuf,
        #[arg(short, long)]
        password: String,
    },
    /// Decrypt a wallet credentials file
    Decrypt {
        file: PathBuf,
        #[arg(short, long)]
        password: String,
    },
    /// Generate a fresh salt
    NewSalt,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Fee { currency } => {
            let onchain = connect(&cli.config, cli.no_fallback)?;
            let fee = onchain.estimate_fee(currency).await?;
            print_value(json!({ "currency": currency, "satPerVbyte": fee }))?;
        }
        Commands::Height { currency } => {
            let onchain = connect(&cli.config, cli.no_fallback)?;
            let height = onchain.get_block_height(currency).await?;
            print_value(json!({ "currency": currency, "height": height }))?;
        }
        Commands::Tx {
            currency,
            ref id,
            ref blinding_key,
        } => {
            let onchain = connect(&cli.config, cli.no_fallback)?;
            let blinding_key = blinding_key.as_deref().map(hex::decode).transpose()?;
            let tx = onchain
                .get_transaction(currency, id, blinding_key.as_deref(), false)
                .await?;
            print_value(json!({ "id": tx.txid(), "hex": tx.to_hex() }))?;
        }
        Commands::Confirmed { currency, ref id } => {
            let onchain = connect(&cli.config, cli.no_fallback)?;
            let confirmed = onchain.is_transaction_confirmed(currency, id, false).await?;
            print_value(json!({ "id": id, "confirmed": confirmed }))?;
        }
        Commands::Broadcast { currency, ref hex } => {
            let onchain = connect(&cli.config, cli.no_fallback)?;
            let tx = ChainTransaction::from_hex(currency, hex, None)?;
            let id = onchain.broadcast_transaction(&tx).await?;
            print_value(json!({ "id": id }))?;
        }
        Commands::Encrypt { ref file, ref password } => {
            let credentials = read_credentials(file)?;
            print_value(serde_json::to_value(credentials.encrypt(password)?)?)?;
        }
        Commands::Decrypt { ref file, ref password } => {
            let credentials = read_credentials(file)?;
            print_value(serde_json::to_value(credentials.decrypt(password)?)?)?;
        }
        Commands::NewSalt => {
            println!("{}", cipher::generate_salt());
        }
    }

    Ok(())
}

fn connect(config: &Option<PathBuf>, no_fallback: bool) -> Result<Onchain, Box<dyn std::error::Error>> {
    let config = match config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };

    let counterparty = if no_fallback {
        None
    } else {
        let api = HttpCounterparty::new(&config.counterparty_url(), config.counterparty.timeout())?;
        Some(Arc::new(api) as Arc<dyn CounterpartyApi>)
    };
    Ok(build_onchain(&config, counterparty, Shutdown::new())?)
}

fn read_credentials(file: &PathBuf) -> Result<WalletCredentials, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(file)?;
    Ok(serde_json::from_str(&content)?)
}

fn print_value(value: Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
