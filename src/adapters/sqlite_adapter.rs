//! SQLite store.
//!
//! Transactions open with `BEGIN IMMEDIATE`, taking the database write lock up
//! front. A second writer waits (up to the busy timeout) and then reads the
//! first one's committed state, so two buys of one player cannot both pass
//! validation.

use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};

use crate::domain::catalog::{self, MarketFilter, MarketListing};
use crate::domain::error::MarketError;
use crate::domain::player::{Listing, Money, NewPlayer, Ownership, Player, PlayerId};
use crate::domain::team::{NewTeam, Squad, Team, TeamId};
use crate::domain::user::{NewUser, User, UserId};
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::{StorePort, UnitOfWork};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS teams (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL UNIQUE REFERENCES users(id),
    name TEXT NOT NULL,
    budget INTEGER NOT NULL CHECK (budget >= 0)
);
CREATE TABLE IF NOT EXISTS players (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    position TEXT NOT NULL CHECK (position IN ('GK', 'DEF', 'MID', 'ATT')),
    price INTEGER NOT NULL CHECK (price >= 0),
    team_id INTEGER REFERENCES teams(id),
    is_listed INTEGER NOT NULL DEFAULT 0 CHECK (is_listed IN (0, 1)),
    asking_price INTEGER,
    CHECK ((is_listed = 0 AND asking_price IS NULL)
        OR (is_listed = 1 AND asking_price IS NOT NULL AND asking_price > 0))
);
CREATE INDEX IF NOT EXISTS idx_players_team ON players(team_id);
CREATE INDEX IF NOT EXISTS idx_players_listed ON players(is_listed);";

const PLAYER_COLUMNS: &str = "p.id, p.name, p.position, p.price, p.team_id, p.is_listed, p.asking_price";

fn pool_err(e: r2d2::Error) -> MarketError {
    MarketError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> MarketError {
    MarketError::DatabaseQuery {
        reason: e.to_string(),
    }
}

struct PlayerRow {
    id: i64,
    name: String,
    position: String,
    price: Money,
    team_id: Option<i64>,
    is_listed: bool,
    asking_price: Option<Money>,
}

impl PlayerRow {
    /// Reads the seven [`PLAYER_COLUMNS`] starting at column 0.
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            position: row.get(2)?,
            price: row.get(3)?,
            team_id: row.get(4)?,
            is_listed: row.get(5)?,
            asking_price: row.get(6)?,
        })
    }

    fn into_player(self) -> Result<Player, MarketError> {
        let position = self.position.parse().map_err(|_| MarketError::Database {
            reason: format!("player {} has unknown position '{}'", self.id, self.position),
        })?;
        Ok(Player {
            id: PlayerId(self.id),
            name: self.name,
            position,
            price: self.price,
            owner: Ownership::from_team_id(self.team_id.map(TeamId)),
            listing: Listing::from_columns(self.is_listed, self.asking_price)?,
        })
    }
}

fn read_team(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: TeamId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        name: row.get(2)?,
        budget: row.get(3)?,
    })
}

fn read_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        email: row.get(1)?,
        password_hash: row.get(2)?,
    })
}

fn select_players(
    conn: &Connection,
    where_clause: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Player>, MarketError> {
    let query = format!("SELECT {PLAYER_COLUMNS} FROM players p WHERE {where_clause}");
    let mut stmt = conn.prepare(&query).map_err(query_err)?;
    let rows = stmt.query_map(params, PlayerRow::read).map_err(query_err)?;

    let mut players = Vec::new();
    for row in rows {
        players.push(row.map_err(query_err)?.into_player()?);
    }
    Ok(players)
}

fn select_player(conn: &Connection, id: PlayerId) -> Result<Option<Player>, MarketError> {
    Ok(select_players(conn, "p.id = ?1", params![id.0])?.pop())
}

fn select_team(conn: &Connection, id: TeamId) -> Result<Option<Team>, MarketError> {
    conn.query_row(
        "SELECT id, user_id, name, budget FROM teams WHERE id = ?1",
        params![id.0],
        read_team,
    )
    .optional()
    .map_err(query_err)
}

fn select_team_for_user(conn: &Connection, user_id: UserId) -> Result<Option<Team>, MarketError> {
    conn.query_row(
        "SELECT id, user_id, name, budget FROM teams WHERE user_id = ?1",
        params![user_id.0],
        read_team,
    )
    .optional()
    .map_err(query_err)
}

fn select_user(
    conn: &Connection,
    where_clause: &str,
    param: &dyn rusqlite::ToSql,
) -> Result<Option<User>, MarketError> {
    let query = format!("SELECT id, email, password_hash FROM users WHERE {where_clause}");
    conn.query_row(&query, [param], read_user)
        .optional()
        .map_err(query_err)
}

/// Case-insensitive matching with the same Unicode folding as the in-process
/// filter. SQLite's own `lower()` only folds ASCII.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;
    conn.create_scalar_function("starts_with_ci", 2, flags, |ctx| {
        let text: Option<String> = ctx.get(0)?;
        let prefix: Option<String> = ctx.get(1)?;
        Ok(match (text, prefix) {
            (Some(text), Some(prefix)) => catalog::starts_with_ignore_case(&text, &prefix),
            _ => false,
        })
    })?;
    conn.create_scalar_function("contains_ci", 2, flags, |ctx| {
        let text: Option<String> = ctx.get(0)?;
        let fragment: Option<String> = ctx.get(1)?;
        Ok(match (text, fragment) {
            (Some(text), Some(fragment)) => catalog::contains_ignore_case(&text, &fragment),
            _ => false,
        })
    })
}

fn init_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    register_functions(conn)
}

pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, MarketError> {
        let db_path = config.require_string("sqlite", "path")?;
        let pool_size = config.get_positive_u32("sqlite", "pool_size", 4)?;
        let busy_timeout = config.get_positive("sqlite", "busy_timeout_ms", 5_000)?.unsigned_abs();

        Self::open(&db_path, pool_size, Duration::from_millis(busy_timeout))
    }

    pub fn open<P: AsRef<Path>>(
        path: P,
        pool_size: u32,
        busy_timeout: Duration,
    ) -> Result<Self, MarketError> {
        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            init_connection(conn)
        });
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory database; every handle shares it.
    pub fn in_memory() -> Result<Self, MarketError> {
        let manager = SqliteConnectionManager::memory().with_init(init_connection);
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>, MarketError> {
        self.pool.get().map_err(pool_err)
    }
}

impl StorePort for SqliteStore {
    fn initialize_schema(&self) -> Result<(), MarketError> {
        self.connection()?.execute_batch(SCHEMA).map_err(query_err)
    }

    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, MarketError> {
        let conn = self.connection()?;
        conn.execute_batch("BEGIN IMMEDIATE").map_err(query_err)?;
        Ok(Box::new(SqliteUnitOfWork { conn, open: true }))
    }

    fn unassigned_players(&self) -> Result<Vec<Player>, MarketError> {
        let conn = self.connection()?;
        select_players(&conn, "p.team_id IS NULL", [])
    }

    fn market_listings(&self, filter: &MarketFilter) -> Result<Vec<MarketListing>, MarketError> {
        let conn = self.connection()?;
        let query = format!(
            "SELECT {PLAYER_COLUMNS}, t.id, t.name
             FROM players p JOIN teams t ON t.id = p.team_id
             WHERE p.is_listed = 1
               AND (?1 IS NULL OR starts_with_ci(p.name, ?1))
               AND (?2 IS NULL OR contains_ci(t.name, ?2))
               AND (?3 IS NULL OR p.asking_price <= ?3)"
        );
        let mut stmt = conn.prepare(&query).map_err(query_err)?;
        let rows = stmt
            .query_map(
                params![filter.name_prefix, filter.team_name_contains, filter.max_price],
                |row| {
                    let player = PlayerRow::read(row)?;
                    let team_id: i64 = row.get(7)?;
                    let team_name: String = row.get(8)?;
                    Ok((player, team_id, team_name))
                },
            )
            .map_err(query_err)?;

        let mut listings = Vec::new();
        for row in rows {
            let (player, team_id, team_name) = row.map_err(query_err)?;
            listings.push(MarketListing {
                player: player.into_player()?,
                team_id: TeamId(team_id),
                team_name,
            });
        }
        Ok(listings)
    }

    fn squad_for_user(&self, user_id: UserId) -> Result<Option<Squad>, MarketError> {
        let conn = self.connection()?;
        let Some(team) = select_team_for_user(&conn, user_id)? else {
            return Ok(None);
        };
        let players = select_players(&conn, "p.team_id = ?1", params![team.id.0])?;
        Ok(Some(Squad { team, players }))
    }

    fn find_player(&self, id: PlayerId) -> Result<Option<Player>, MarketError> {
        let conn = self.connection()?;
        select_player(&conn, id)
    }

    fn find_user(&self, id: UserId) -> Result<Option<User>, MarketError> {
        let conn = self.connection()?;
        select_user(&conn, "id = ?1", &id.0)
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, MarketError> {
        let conn = self.connection()?;
        select_user(&conn, "email = ?1", &email)
    }

    fn insert_user(&self, user: &NewUser) -> Result<User, MarketError> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO users (email, password_hash) VALUES (?1, ?2)",
            params![user.email, user.password_hash],
        )
        .map_err(|e| match e.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => {
                MarketError::invalid_state("email already registered")
            }
            _ => query_err(e),
        })?;

        Ok(User {
            id: UserId(conn.last_insert_rowid()),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
        })
    }
}

struct SqliteUnitOfWork {
    conn: PooledConnection<SqliteConnectionManager>,
    open: bool,
}

impl UnitOfWork for SqliteUnitOfWork {
    fn lock_player(&mut self, id: PlayerId) -> Result<Option<Player>, MarketError> {
        select_player(&self.conn, id)
    }

    fn lock_team(&mut self, id: TeamId) -> Result<Option<Team>, MarketError> {
        select_team(&self.conn, id)
    }

    fn team_id_for_user(&mut self, user_id: UserId) -> Result<Option<TeamId>, MarketError> {
        Ok(select_team_for_user(&self.conn, user_id)?.map(|t| t.id))
    }

    fn count_players(&mut self, team_id: TeamId) -> Result<usize, MarketError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM players WHERE team_id = ?1",
                params![team_id.0],
                |row| row.get(0),
            )
            .map_err(query_err)?;
        Ok(count as usize)
    }

    fn save_player(&mut self, player: &Player) -> Result<(), MarketError> {
        let changed = self
            .conn
            .execute(
                "UPDATE players SET team_id = ?2, is_listed = ?3, asking_price = ?4 WHERE id = ?1",
                params![
                    player.id.0,
                    player.team_id().map(|t| t.0),
                    player.is_listed(),
                    player.asking_price()
                ],
            )
            .map_err(query_err)?;
        if changed != 1 {
            return Err(MarketError::DatabaseQuery {
                reason: format!("player {} does not exist", player.id),
            });
        }
        Ok(())
    }

    fn set_budget(&mut self, team_id: TeamId, budget: Money) -> Result<(), MarketError> {
        let changed = self
            .conn
            .execute(
                "UPDATE teams SET budget = ?2 WHERE id = ?1",
                params![team_id.0, budget],
            )
            .map_err(query_err)?;
        if changed != 1 {
            return Err(MarketError::DatabaseQuery {
                reason: format!("team {team_id} does not exist"),
            });
        }
        Ok(())
    }

    fn insert_team(&mut self, team: &NewTeam) -> Result<Team, MarketError> {
        self.conn
            .execute(
                "INSERT INTO teams (user_id, name, budget) VALUES (?1, ?2, ?3)",
                params![team.user_id.0, team.name, team.budget],
            )
            .map_err(query_err)?;
        Ok(Team {
            id: TeamId(self.conn.last_insert_rowid()),
            user_id: team.user_id,
            name: team.name.clone(),
            budget: team.budget,
        })
    }

    fn insert_player(&mut self, player: &NewPlayer) -> Result<Player, MarketError> {
        self.conn
            .execute(
                "INSERT INTO players (name, position, price, team_id, is_listed, asking_price)
                 VALUES (?1, ?2, ?3, ?4, 0, NULL)",
                params![
                    player.name,
                    player.position.code(),
                    player.price,
                    player.owner.team_id().map(|t| t.0)
                ],
            )
            .map_err(query_err)?;
        Ok(Player {
            id: PlayerId(self.conn.last_insert_rowid()),
            name: player.name.clone(),
            position: player.position,
            price: player.price,
            owner: player.owner,
            listing: Listing::Unlisted,
        })
    }

    fn dissolve_team(&mut self, team_id: TeamId) -> Result<usize, MarketError> {
        let released = self
            .conn
            .execute(
                "UPDATE players SET team_id = NULL, is_listed = 0, asking_price = NULL
                 WHERE team_id = ?1",
                params![team_id.0],
            )
            .map_err(query_err)?;
        self.conn
            .execute("DELETE FROM teams WHERE id = ?1", params![team_id.0])
            .map_err(query_err)?;
        Ok(released)
    }

    fn commit(mut self: Box<Self>) -> Result<(), MarketError> {
        self.conn.execute_batch("COMMIT").map_err(query_err)?;
        self.open = false;
        Ok(())
    }
}

impl Drop for SqliteUnitOfWork {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %e, "sqlite rollback failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use crate::domain::market;
    use crate::domain::player::Position;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> Result<i64, MarketError> {
            Ok(default)
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> Result<f64, MarketError> {
            Ok(default)
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> Result<bool, MarketError> {
            Ok(default)
        }
    }

    fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize_schema().unwrap();
        store
    }

    fn user(store: &SqliteStore, email: &str) -> User {
        store
            .insert_user(&NewUser {
                email: email.into(),
                password_hash: "hash".into(),
            })
            .unwrap()
    }

    fn team_with_players(store: &SqliteStore, user: &User, name: &str, size: usize) -> (Team, Vec<Player>) {
        let mut tx = store.begin().unwrap();
        let team = tx
            .insert_team(&NewTeam {
                user_id: user.id,
                name: name.into(),
                budget: 5_000_000,
            })
            .unwrap();
        let mut players = Vec::new();
        for i in 0..size {
            players.push(
                tx.insert_player(&NewPlayer {
                    name: format!("{name} Player {i}"),
                    position: Position::ALL[i % 4],
                    price: 1_000_000,
                    owner: Ownership::Team(team.id),
                })
                .unwrap(),
            );
        }
        tx.commit().unwrap();
        (team, players)
    }

    #[test]
    fn from_config_missing_path() {
        let config = EmptyConfig;
        let result = SqliteStore::from_config(&config);
        match result {
            Err(MarketError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn schema_initialization_is_idempotent() {
        let store = store();
        store.initialize_schema().unwrap();
    }

    #[test]
    fn listing_check_constraint_enforced() {
        let store = store();
        let conn = store.connection().unwrap();
        for (is_listed, asking_price) in [(1, None), (1, Some(0)), (0, Some(10)), (2, Some(10))] {
            let result = conn.execute(
                "INSERT INTO players (name, position, price, is_listed, asking_price)
                 VALUES ('Bad', 'GK', 1, ?1, ?2)",
                params![is_listed, asking_price],
            );
            assert!(result.is_err(), "accepted is_listed={is_listed} asking_price={asking_price:?}");
        }
        for (is_listed, asking_price) in [(0, None), (1, Some(10))] {
            conn.execute(
                "INSERT INTO players (name, position, price, is_listed, asking_price)
                 VALUES ('Good', 'GK', 1, ?1, ?2)",
                params![is_listed, asking_price],
            )
            .unwrap();
        }
    }

    #[test]
    fn from_config_rejects_malformed_numbers() {
        let config = FileConfigAdapter::from_string(
            "[sqlite]\npath = /tmp/never-opened.db\npool_size = four\nbusy_timeout_ms = 5s\n",
        )
        .unwrap();
        match SqliteStore::from_config(&config) {
            Err(MarketError::ConfigInvalid { section, key, .. }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "pool_size");
            }
            Err(other) => panic!("expected ConfigInvalid, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn duplicate_email_is_invalid_state() {
        let store = store();
        user(&store, "dup@example.com");
        let err = store
            .insert_user(&NewUser {
                email: "dup@example.com".into(),
                password_hash: "other".into(),
            })
            .unwrap_err();
        assert!(matches!(err, MarketError::InvalidState { .. }));
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let store = store();
        {
            let mut tx = store.begin().unwrap();
            tx.insert_player(&NewPlayer {
                name: "Ghost".into(),
                position: Position::Defender,
                price: 10,
                owner: Ownership::Pool,
            })
            .unwrap();
        }
        assert!(store.unassigned_players().unwrap().is_empty());
    }

    #[test]
    fn buy_moves_player_and_money() {
        let store = store();
        let seller = user(&store, "seller@example.com");
        let buyer = user(&store, "buyer@example.com");
        let (seller_team, seller_players) = team_with_players(&store, &seller, "Sellers", 16);
        let (buyer_team, _) = team_with_players(&store, &buyer, "Buyers", 20);

        let target = seller_players[3].id;
        market::list_player(&store, target, 1_000_000, seller.id).unwrap();
        let purchase = market::buy_player(&store, target, buyer.id).unwrap();
        assert_eq!(purchase.settlement, 950_000);

        let moved = store.find_player(target).unwrap().unwrap();
        assert_eq!(moved.owner, Ownership::Team(buyer_team.id));
        assert_eq!(moved.listing, Listing::Unlisted);
        assert_eq!(moved.price, 1_000_000);

        let seller_squad = store.squad_for_user(seller.id).unwrap().unwrap();
        let buyer_squad = store.squad_for_user(buyer.id).unwrap().unwrap();
        assert_eq!(seller_squad.team.id, seller_team.id);
        assert_eq!(seller_squad.players.len(), 15);
        assert_eq!(buyer_squad.players.len(), 21);
        assert_eq!(seller_squad.team.budget + buyer_squad.team.budget, 10_000_000);
    }

    #[test]
    fn failed_buy_leaves_no_trace() {
        let store = store();
        let seller = user(&store, "seller@example.com");
        let buyer = user(&store, "buyer@example.com");
        let (_, seller_players) = team_with_players(&store, &seller, "Sellers", 15);
        team_with_players(&store, &buyer, "Buyers", 20);

        let target = seller_players[0].id;
        market::list_player(&store, target, 1_000_000, seller.id).unwrap();
        let err = market::buy_player(&store, target, buyer.id).unwrap_err();
        assert!(matches!(err, MarketError::InvalidState { .. }));

        let still = store.find_player(target).unwrap().unwrap();
        assert!(still.is_listed());
        assert_eq!(
            store.squad_for_user(buyer.id).unwrap().unwrap().team.budget,
            5_000_000
        );
    }

    #[test]
    fn market_filter_pushdown() {
        let store = store();
        let seller = user(&store, "seller@example.com");
        let (_, players) = team_with_players(&store, &seller, "Rovers United", 18);
        market::list_player(&store, players[0].id, 100, seller.id).unwrap();
        market::list_player(&store, players[1].id, 300, seller.id).unwrap();

        let all = store.market_listings(&MarketFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|l| l.team_name == "Rovers United"));

        let cheap = store
            .market_listings(&MarketFilter {
                max_price: Some(100),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(cheap.len(), 1);
        assert_eq!(cheap[0].player.id, players[0].id);

        let by_team = store
            .market_listings(&MarketFilter {
                team_name_contains: Some("UNITED".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_team.len(), 2);

        let by_name = store
            .market_listings(&MarketFilter {
                name_prefix: Some("rovers united player 1".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].player.id, players[1].id);

        let no_match = store
            .market_listings(&MarketFilter {
                name_prefix: Some("united".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(no_match.is_empty());
    }
}
