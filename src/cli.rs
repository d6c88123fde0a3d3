//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_export;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::catalog::{self, MarketFilter, MarketListing, MarketQuery, SortField, SortOrder};
use crate::domain::error::MarketError;
use crate::domain::identity;
use crate::domain::player::{Money, Player};
use crate::domain::seed::{self, SeedPlan};
use crate::domain::team::Squad;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::StorePort;

pub type SharedStore = Arc<dyn StorePort + Send + Sync>;

#[derive(Parser, Debug)]
#[command(name = "squadtrader", about = "Fantasy football transfer market")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database schema
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Fill the database with demo users, teams and an unassigned pool
    Seed {
        #[arg(short, long)]
        config: PathBuf,
        /// Unassigned players to generate
        #[arg(long, default_value_t = 200)]
        pool: usize,
        /// Demo accounts to create, each with a default team
        #[arg(long, default_value_t = 20)]
        users: usize,
    },
    /// List unassigned players
    Pool {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        csv: bool,
    },
    /// Search the transfer market
    Market {
        #[arg(short, long)]
        config: PathBuf,
        /// Player name prefix
        #[arg(long)]
        name: Option<String>,
        /// Part of the selling team's name
        #[arg(long)]
        team: Option<String>,
        #[arg(long)]
        max_price: Option<Money>,
        /// name, position, price or team
        #[arg(long, default_value = "name")]
        sort: String,
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        csv: bool,
    },
    /// Show a user's team
    Team {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        email: String,
        #[arg(long)]
        csv: bool,
    },
    /// Start the web server
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
}

impl Command {
    fn config_path(&self) -> &Path {
        match self {
            Command::InitDb { config }
            | Command::Seed { config, .. }
            | Command::Pool { config, .. }
            | Command::Market { config, .. }
            | Command::Team { config, .. }
            | Command::Serve { config } => config,
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let config = match load_config(cli.command.config_path()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    init_tracing(&config);

    let result = match cli.command {
        Command::InitDb { .. } => run_init_db(&config),
        Command::Seed { pool, users, .. } => run_seed(&config, pool, users),
        Command::Pool { csv, .. } => run_pool(&config, csv),
        Command::Market {
            name,
            team,
            max_price,
            sort,
            desc,
            csv,
            ..
        } => parse_market_query(name, team, max_price, &sort, desc)
            .and_then(|query| run_market(&config, &query, csv)),
        Command::Team { email, csv, .. } => run_team(&config, &email, csv),
        Command::Serve { .. } => run_serve(config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, MarketError> {
    FileConfigAdapter::from_file(path)
}

/// `RUST_LOG` when set, otherwise `[logging] filter`, otherwise `info`.
/// Logs go to stderr so table and CSV output stays clean.
fn init_tracing(config: &dyn ConfigPort) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directive = config
            .get_string("logging", "filter")
            .unwrap_or_else(|| "info".to_string());
        EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"))
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Open the store named by `[database] backend` (default sqlite).
pub fn open_store(config: &dyn ConfigPort) -> Result<SharedStore, MarketError> {
    let backend = config
        .get_string("database", "backend")
        .unwrap_or_else(|| "sqlite".to_string());
    match backend.trim().to_lowercase().as_str() {
        "sqlite" => open_sqlite(config),
        "postgres" | "postgresql" => open_postgres(config),
        other => Err(MarketError::ConfigInvalid {
            section: "database".into(),
            key: "backend".into(),
            reason: format!("unknown backend '{other}'"),
        }),
    }
}

fn missing_feature(feature: &str) -> MarketError {
    MarketError::ConfigInvalid {
        section: "database".into(),
        key: "backend".into(),
        reason: format!("built without the {feature} feature"),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &dyn ConfigPort) -> Result<SharedStore, MarketError> {
    use crate::adapters::sqlite_adapter::SqliteStore;
    Ok(Arc::new(SqliteStore::from_config(config)?))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &dyn ConfigPort) -> Result<SharedStore, MarketError> {
    Err(missing_feature("sqlite"))
}

#[cfg(feature = "postgres")]
fn open_postgres(config: &dyn ConfigPort) -> Result<SharedStore, MarketError> {
    use crate::adapters::postgres_adapter::PostgresStore;
    Ok(Arc::new(PostgresStore::from_config(config)?))
}

#[cfg(not(feature = "postgres"))]
fn open_postgres(_config: &dyn ConfigPort) -> Result<SharedStore, MarketError> {
    Err(missing_feature("postgres"))
}

pub fn parse_market_query(
    name: Option<String>,
    team: Option<String>,
    max_price: Option<Money>,
    sort: &str,
    desc: bool,
) -> Result<MarketQuery, MarketError> {
    Ok(MarketQuery {
        filter: MarketFilter {
            name_prefix: name,
            team_name_contains: team,
            max_price,
        },
        sort: sort.parse::<SortField>()?,
        order: if desc { SortOrder::Desc } else { SortOrder::Asc },
    })
}

fn run_init_db(config: &dyn ConfigPort) -> Result<(), MarketError> {
    let store = open_store(config)?;
    store.initialize_schema()?;
    eprintln!("Schema ready");
    Ok(())
}

fn run_seed(config: &dyn ConfigPort, pool: usize, users: usize) -> Result<(), MarketError> {
    let store = open_store(config)?;
    store.initialize_schema()?;
    let plan = SeedPlan {
        pool_size: pool,
        users,
        listing_probability: config.get_double(
            "seed",
            "listing_probability",
            seed::LISTING_PROBABILITY,
        )?,
    };
    let summary = seed::seed_demo_data(store.as_ref(), &plan, &mut rand::thread_rng())?;
    println!(
        "Seeded {} pool players, {} users, {} listings",
        summary.pool_players, summary.users, summary.listed
    );
    if summary.users > 0 {
        println!(
            "Demo logins: {} .. {} / {}",
            seed::demo_email(1),
            seed::demo_email(summary.users),
            seed::DEMO_PASSWORD
        );
    }
    Ok(())
}

fn run_pool(config: &dyn ConfigPort, csv: bool) -> Result<(), MarketError> {
    let store = open_store(config)?;
    let players = catalog::list_unassigned_players(store.as_ref())?;
    let stdout = io::stdout();
    if csv {
        return csv_export::write_players(stdout.lock(), &players);
    }
    write_player_table(&mut stdout.lock(), &players)?;
    eprintln!("{} unassigned players", players.len());
    Ok(())
}

fn run_market(config: &dyn ConfigPort, query: &MarketQuery, csv: bool) -> Result<(), MarketError> {
    let store = open_store(config)?;
    let listings = catalog::list_market_players(store.as_ref(), query)?;
    let stdout = io::stdout();
    if csv {
        return csv_export::write_listings(stdout.lock(), &listings);
    }
    write_listing_table(&mut stdout.lock(), &listings)?;
    eprintln!("{} listings", listings.len());
    Ok(())
}

fn run_team(config: &dyn ConfigPort, email: &str, csv: bool) -> Result<(), MarketError> {
    let store = open_store(config)?;
    let user = store
        .find_user_by_email(&identity::normalize_email(email))?
        .ok_or_else(|| MarketError::not_found("user"))?;
    let squad = catalog::get_team_for_user(store.as_ref(), user.id)?
        .ok_or_else(|| MarketError::not_found("team"))?;
    let stdout = io::stdout();
    if csv {
        return csv_export::write_squad(stdout.lock(), &squad);
    }
    write_squad_summary(&mut stdout.lock(), &squad)?;
    Ok(())
}

#[cfg(feature = "web")]
fn run_serve(config: FileConfigAdapter) -> Result<(), MarketError> {
    use crate::adapters::web::{self, AppState};

    let store = open_store(&config)?;
    store.initialize_schema()?;
    let listen = config
        .get_string("web", "listen")
        .unwrap_or_else(|| "127.0.0.1:3000".to_string());
    let state = AppState {
        store,
        config: Arc::new(config),
    };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(web::serve(state, &listen))
}

#[cfg(not(feature = "web"))]
fn run_serve(_config: FileConfigAdapter) -> Result<(), MarketError> {
    Err(MarketError::Internal {
        reason: "web feature is required for serve".into(),
    })
}

fn format_money(amount: Option<Money>) -> String {
    amount.map(|a| a.to_string()).unwrap_or_else(|| "-".into())
}

pub fn write_player_table<W: Write>(out: &mut W, players: &[Player]) -> io::Result<()> {
    writeln!(
        out,
        "{:>6}  {:<24} {:<4} {:>10} {:>10}",
        "ID", "NAME", "POS", "PRICE", "ASKING"
    )?;
    for p in players {
        writeln!(
            out,
            "{:>6}  {:<24} {:<4} {:>10} {:>10}",
            p.id,
            p.name,
            p.position.code(),
            p.price,
            format_money(p.asking_price())
        )?;
    }
    Ok(())
}

pub fn write_listing_table<W: Write>(out: &mut W, listings: &[MarketListing]) -> io::Result<()> {
    writeln!(
        out,
        "{:>6}  {:<24} {:<4} {:>10} {:>10}  {}",
        "ID", "NAME", "POS", "PRICE", "ASKING", "TEAM"
    )?;
    for l in listings {
        writeln!(
            out,
            "{:>6}  {:<24} {:<4} {:>10} {:>10}  {}",
            l.player.id,
            l.player.name,
            l.player.position.code(),
            l.player.price,
            l.asking_price(),
            l.team_name
        )?;
    }
    Ok(())
}

pub fn write_squad_summary<W: Write>(out: &mut W, squad: &Squad) -> io::Result<()> {
    writeln!(out, "{} (team {})", squad.team.name, squad.team.id)?;
    writeln!(out, "  Budget:      {}", squad.team.budget)?;
    writeln!(out, "  Players:     {}", squad.player_count())?;
    writeln!(out, "  Squad value: {}", squad.squad_value())?;
    writeln!(out)?;
    write_player_table(out, &squad.players)
}
