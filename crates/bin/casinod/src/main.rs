//! casinod - single-node devnet for the wta lottery ledger
//!
//! Every invocation opens the sled database under `--home`, runs one command
//! against the chain stored there, and exits. Blocks are only produced on
//! demand (`produce-block`, `buy-tickets`), with a block time that advances
//! from the last committed block.

use anyhow::{bail, Context as _, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;
use wta::keeper::query::{
    PageRequest, QueryCurrentDrawRequest, QueryHistoricalDrawsRequest, QueryParamsRequest,
    QueryTicketsRequest,
};
use wta::simulation::{dump_store, run_simulation, SimConfig};
use wta::types::{tokens_from_power, DEFAULT_DENOM};
use wta::{Address, AppGenesis, Chain, Coin, Coins, GenesisAccount, MsgBuyTickets};

mod storage;

use storage::SledStore;

#[derive(Parser, Debug)]
#[command(name = "casinod")]
#[command(about = "single-node devnet for the wta lottery ledger", long_about = None)]
struct Cli {
    /// Data directory
    #[arg(long, env = "CASINOD_HOME", default_value = "./casinod-data")]
    home: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the chain from a genesis file, or a default genesis
    Init {
        /// Genesis JSON to load
        #[arg(long)]
        genesis: Option<PathBuf>,

        #[arg(long, default_value = "wta-devnet")]
        chain_id: String,

        /// Funded account as ADDRESS:POWER (tokens = power * 10^6), repeatable
        #[arg(long = "account")]
        accounts: Vec<String>,
    },

    /// Check a genesis file without touching the database
    ValidateGenesis { genesis: PathBuf },

    /// Print the current state as a genesis document
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Buy tickets and commit them in a new block
    BuyTickets {
        quantity: u32,

        /// Buyer address (hex)
        #[arg(long)]
        from: String,

        /// Seconds between the last block and the new one
        #[arg(long, default_value_t = 5)]
        advance_secs: i64,
    },

    /// Commit an empty block, closing the draw if its time has come
    ProduceBlock {
        #[arg(long, default_value_t = 5)]
        advance_secs: i64,
    },

    /// Read module state
    Query {
        #[command(subcommand)]
        what: QueryCommand,
    },

    /// Run a randomized in-memory simulation and check invariants every block
    Simulate {
        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, default_value_t = 200)]
        blocks: u64,

        #[arg(long, default_value_t = 10)]
        accounts: usize,

        #[arg(long, default_value_t = 5)]
        max_txs_per_block: usize,

        #[arg(long, default_value_t = 900)]
        max_block_secs: u64,
    },

    /// Print every raw store entry, decoded
    DumpStore,
}

#[derive(clap::Args, Debug)]
struct PageArgs {
    #[arg(long, default_value_t = 0)]
    offset: u64,

    #[arg(long, default_value_t = 0)]
    limit: u64,

    /// Resume from a hex key returned as next_key
    #[arg(long)]
    key: Option<String>,

    #[arg(long)]
    count_total: bool,

    #[arg(long)]
    reverse: bool,
}

impl PageArgs {
    fn to_request(&self) -> Result<PageRequest> {
        let key = self
            .key
            .as_deref()
            .map(hex::decode)
            .transpose()
            .context("page key must be hex")?;
        Ok(PageRequest {
            key,
            offset: self.offset,
            limit: self.limit,
            count_total: self.count_total,
            reverse: self.reverse,
        })
    }
}

#[derive(Subcommand, Debug)]
enum QueryCommand {
    /// The live draw
    Draw,
    /// Tickets of the live draw
    Tickets(PageArgs),
    /// One ticket of the live draw by id
    Ticket { id: String },
    /// Closed draws, oldest first
    History(PageArgs),
    Params,
    Balance {
        address: String,
        #[arg(long, default_value = DEFAULT_DENOM)]
        denom: String,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn db_path(home: &Path) -> PathBuf {
    home.join("db")
}

fn open_chain(home: &Path) -> Result<Chain<SledStore>> {
    let store = SledStore::open(&db_path(home))?;
    if store.is_empty() {
        bail!("no chain at {}, run `casinod init` first", home.display());
    }
    Ok(Chain::load(store)?)
}

fn next_block_time(chain: &Chain<SledStore>, advance_secs: i64) -> Result<DateTime<Utc>> {
    if advance_secs < 0 {
        bail!("block time cannot go backwards");
    }
    chain
        .last_block()
        .time
        .checked_add_signed(Duration::seconds(advance_secs))
        .context("block time out of range")
}

fn parse_account(spec: &str) -> Result<GenesisAccount> {
    let (address, power) = spec
        .split_once(':')
        .with_context(|| format!("account {} is not ADDRESS:POWER", spec))?;
    let address: Address = address.parse()?;
    let power: u64 = power.parse().context("account power")?;
    Ok(GenesisAccount {
        address,
        coins: Coins::from(Coin::new(DEFAULT_DENOM, tokens_from_power(power))),
    })
}

fn read_genesis(path: &Path) -> Result<AppGenesis> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "casinod=info,wta=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            genesis,
            chain_id,
            accounts,
        } => {
            let genesis = match genesis {
                Some(path) => read_genesis(&path)?,
                None => {
                    let accounts = accounts
                        .iter()
                        .map(|spec| parse_account(spec))
                        .collect::<Result<Vec<_>>>()?;
                    AppGenesis::new(chain_id, Utc::now(), accounts)
                }
            };
            std::fs::create_dir_all(&cli.home)?;
            let store = SledStore::open(&db_path(&cli.home))?;
            let chain = Chain::init(store, &genesis)?;
            chain.store().flush()?;
            info!("chain {} ready at {}", chain.chain_id(), cli.home.display());
        }

        Commands::ValidateGenesis { genesis } => {
            read_genesis(&genesis)?.validate()?;
            println!("genesis {} is valid", genesis.display());
        }

        Commands::Export { output } => {
            let chain = open_chain(&cli.home)?;
            let genesis = chain.export_genesis()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, serde_json::to_vec_pretty(&genesis)?)?;
                    info!("exported genesis to {}", path.display());
                }
                None => print_json(&genesis)?,
            }
        }

        Commands::BuyTickets {
            quantity,
            from,
            advance_secs,
        } => {
            MsgBuyTickets::new(quantity, from.clone()).validate_basic()?;
            let buyer: Address = from.parse()?;

            let mut chain = open_chain(&cli.home)?;
            let tx = chain.build_buy_tickets_tx(quantity, &buyer)?;
            let time = next_block_time(&chain, advance_secs)?;
            let result = chain.produce_block(time, &[tx])?;
            chain.store().flush()?;
            print_json(&result)?;
        }

        Commands::ProduceBlock { advance_secs } => {
            let mut chain = open_chain(&cli.home)?;
            let time = next_block_time(&chain, advance_secs)?;
            let result = chain.produce_block(time, &[])?;
            chain.store().flush()?;
            print_json(&result)?;
        }

        Commands::Query { what } => {
            let chain = open_chain(&cli.home)?;
            let keeper = chain.keeper();
            let store = chain.store();
            match what {
                QueryCommand::Draw => {
                    print_json(&keeper.query_current_draw(store, Some(&QueryCurrentDrawRequest {}))?)?
                }
                QueryCommand::Tickets(page) => {
                    let req = QueryTicketsRequest {
                        pagination: Some(page.to_request()?),
                    };
                    print_json(&keeper.query_tickets(store, Some(&req))?)?
                }
                QueryCommand::Ticket { id } => match keeper.get_ticket(store, &id)? {
                    Some(ticket) => print_json(&ticket)?,
                    None => bail!("no ticket {} in the live draw", id),
                },
                QueryCommand::History(page) => {
                    let req = QueryHistoricalDrawsRequest {
                        pagination: Some(page.to_request()?),
                    };
                    print_json(&keeper.query_historical_draws(store, Some(&req))?)?
                }
                QueryCommand::Params => {
                    print_json(&keeper.query_params(store, Some(&QueryParamsRequest {}))?)?
                }
                QueryCommand::Balance { address, denom } => {
                    let address: Address = address.parse()?;
                    let amount = chain.balance(&address, &denom)?;
                    println!("{}", Coin::new(denom, amount));
                }
            }
        }

        Commands::Simulate {
            seed,
            blocks,
            accounts,
            max_txs_per_block,
            max_block_secs,
        } => {
            let config = SimConfig {
                seed,
                blocks,
                accounts,
                max_txs_per_block,
                max_block_secs,
            };
            info!("running simulation: {:?}", config);
            print_json(&run_simulation(&config)?)?;
        }

        Commands::DumpStore => {
            let chain = open_chain(&cli.home)?;
            for line in dump_store(chain.store())? {
                println!("{}", line);
            }
        }
    }

    Ok(())
}
