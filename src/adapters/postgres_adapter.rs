//! PostgreSQL store.
//!
//! Transactions run at READ COMMITTED. `lock_player` and `lock_team` use
//! `SELECT ... FOR UPDATE`; a waiting transaction re-reads the row once the
//! holder commits. Lock-order conflicts the server resolves as deadlocks
//! surface as `DatabaseQuery` errors with nothing committed.

use postgres::error::SqlState;
use postgres::types::ToSql;
use postgres::{Client, NoTls, Row};
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;

use crate::domain::catalog::{MarketFilter, MarketListing};
use crate::domain::error::MarketError;
use crate::domain::player::{Listing, Money, NewPlayer, Ownership, Player, PlayerId};
use crate::domain::team::{NewTeam, Squad, Team, TeamId};
use crate::domain::user::{NewUser, User, UserId};
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::{StorePort, UnitOfWork};

type Manager = PostgresConnectionManager<NoTls>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS teams (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL UNIQUE REFERENCES users(id),
    name TEXT NOT NULL,
    budget BIGINT NOT NULL CHECK (budget >= 0)
);
CREATE TABLE IF NOT EXISTS players (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    position TEXT NOT NULL CHECK (position IN ('GK', 'DEF', 'MID', 'ATT')),
    price BIGINT NOT NULL CHECK (price >= 0),
    team_id BIGINT REFERENCES teams(id),
    is_listed BOOLEAN NOT NULL DEFAULT FALSE,
    asking_price BIGINT,
    CONSTRAINT listing_has_price CHECK (
        (NOT is_listed AND asking_price IS NULL)
        OR (is_listed AND asking_price IS NOT NULL AND asking_price > 0))
);
CREATE INDEX IF NOT EXISTS idx_players_team ON players(team_id);
CREATE INDEX IF NOT EXISTS idx_players_listed ON players(is_listed);";

const PLAYER_COLUMNS: &str = "p.id, p.name, p.position, p.price, p.team_id, p.is_listed, p.asking_price";

fn query_err(e: postgres::Error) -> MarketError {
    MarketError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn decode_player(row: &Row) -> Result<Player, MarketError> {
    let id: i64 = row.get(0);
    let position: String = row.get(2);
    let team_id: Option<i64> = row.get(4);
    Ok(Player {
        id: PlayerId(id),
        name: row.get(1),
        position: position.parse().map_err(|_| MarketError::Database {
            reason: format!("player {id} has unknown position '{position}'"),
        })?,
        price: row.get(3),
        owner: Ownership::from_team_id(team_id.map(TeamId)),
        listing: Listing::from_columns(row.get(5), row.get(6))?,
    })
}

fn decode_team(row: &Row) -> Team {
    Team {
        id: TeamId(row.get(0)),
        user_id: UserId(row.get(1)),
        name: row.get(2),
        budget: row.get(3),
    }
}

fn decode_user(row: &Row) -> User {
    User {
        id: UserId(row.get(0)),
        email: row.get(1),
        password_hash: row.get(2),
    }
}

fn select_players(
    client: &mut Client,
    where_clause: &str,
    params: &[&(dyn ToSql + Sync)],
) -> Result<Vec<Player>, MarketError> {
    let query = format!("SELECT {PLAYER_COLUMNS} FROM players p WHERE {where_clause}");
    client
        .query(&query, params)
        .map_err(query_err)?
        .iter()
        .map(decode_player)
        .collect()
}

fn select_team_for_user(client: &mut Client, user_id: UserId) -> Result<Option<Team>, MarketError> {
    let row = client
        .query_opt(
            "SELECT id, user_id, name, budget FROM teams WHERE user_id = $1",
            &[&user_id.0],
        )
        .map_err(query_err)?;
    Ok(row.as_ref().map(decode_team))
}

pub struct PostgresStore {
    pool: Pool<Manager>,
}

impl PostgresStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, MarketError> {
        // [postgres] connection_string first, then [database] conninfo
        let connection_string = config
            .get_string("postgres", "connection_string")
            .or_else(|| config.get_string("database", "conninfo"))
            .ok_or_else(|| MarketError::ConfigMissing {
                section: "database".into(),
                key: "conninfo".into(),
            })?;
        let pool_size = config.get_positive_u32("postgres", "pool_size", 4)?;

        let pg_config = connection_string
            .parse::<postgres::Config>()
            .map_err(|e| MarketError::ConfigInvalid {
                section: "postgres".into(),
                key: "connection_string".into(),
                reason: e.to_string(),
            })?;
        let manager = PostgresConnectionManager::new(pg_config, NoTls);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e| MarketError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn connection(&self) -> Result<PooledConnection<Manager>, MarketError> {
        self.pool.get().map_err(|e| MarketError::Database {
            reason: e.to_string(),
        })
    }
}

impl StorePort for PostgresStore {
    fn initialize_schema(&self) -> Result<(), MarketError> {
        self.connection()?.batch_execute(SCHEMA).map_err(query_err)
    }

    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, MarketError> {
        let mut conn = self.connection()?;
        conn.batch_execute("BEGIN ISOLATION LEVEL READ COMMITTED")
            .map_err(query_err)?;
        Ok(Box::new(PostgresUnitOfWork { conn, open: true }))
    }

    fn unassigned_players(&self) -> Result<Vec<Player>, MarketError> {
        let mut conn = self.connection()?;
        select_players(&mut conn, "p.team_id IS NULL", &[])
    }

    fn market_listings(&self, filter: &MarketFilter) -> Result<Vec<MarketListing>, MarketError> {
        let query = format!(
            "SELECT {PLAYER_COLUMNS}, t.id, t.name
             FROM players p JOIN teams t ON t.id = p.team_id
             WHERE p.is_listed
               AND ($1::TEXT IS NULL OR starts_with(lower(p.name), lower($1)))
               AND ($2::TEXT IS NULL OR strpos(lower(t.name), lower($2)) > 0)
               AND ($3::BIGINT IS NULL OR p.asking_price <= $3)"
        );
        let rows = self
            .connection()?
            .query(
                &query,
                &[
                    &filter.name_prefix,
                    &filter.team_name_contains,
                    &filter.max_price,
                ],
            )
            .map_err(query_err)?;

        rows.iter()
            .map(|row| {
                Ok(MarketListing {
                    player: decode_player(row)?,
                    team_id: TeamId(row.get(7)),
                    team_name: row.get(8),
                })
            })
            .collect()
    }

    fn squad_for_user(&self, user_id: UserId) -> Result<Option<Squad>, MarketError> {
        let mut conn = self.connection()?;
        let Some(team) = select_team_for_user(&mut conn, user_id)? else {
            return Ok(None);
        };
        let players = select_players(&mut conn, "p.team_id = $1", &[&team.id.0])?;
        Ok(Some(Squad { team, players }))
    }

    fn find_player(&self, id: PlayerId) -> Result<Option<Player>, MarketError> {
        let mut conn = self.connection()?;
        Ok(select_players(&mut conn, "p.id = $1", &[&id.0])?.pop())
    }

    fn find_user(&self, id: UserId) -> Result<Option<User>, MarketError> {
        let row = self
            .connection()?
            .query_opt(
                "SELECT id, email, password_hash FROM users WHERE id = $1",
                &[&id.0],
            )
            .map_err(query_err)?;
        Ok(row.as_ref().map(decode_user))
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, MarketError> {
        let row = self
            .connection()?
            .query_opt(
                "SELECT id, email, password_hash FROM users WHERE email = $1",
                &[&email],
            )
            .map_err(query_err)?;
        Ok(row.as_ref().map(decode_user))
    }

    fn insert_user(&self, user: &NewUser) -> Result<User, MarketError> {
        let row = self
            .connection()?
            .query_one(
                "INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING id",
                &[&user.email, &user.password_hash],
            )
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    MarketError::invalid_state("email already registered")
                } else {
                    query_err(e)
                }
            })?;
        Ok(User {
            id: UserId(row.get(0)),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
        })
    }
}

struct PostgresUnitOfWork {
    conn: PooledConnection<Manager>,
    open: bool,
}

impl UnitOfWork for PostgresUnitOfWork {
    fn lock_player(&mut self, id: PlayerId) -> Result<Option<Player>, MarketError> {
        let query = format!("SELECT {PLAYER_COLUMNS} FROM players p WHERE p.id = $1 FOR UPDATE");
        let row = self.conn.query_opt(&query, &[&id.0]).map_err(query_err)?;
        row.as_ref().map(decode_player).transpose()
    }

    fn lock_team(&mut self, id: TeamId) -> Result<Option<Team>, MarketError> {
        let row = self
            .conn
            .query_opt(
                "SELECT id, user_id, name, budget FROM teams WHERE id = $1 FOR UPDATE",
                &[&id.0],
            )
            .map_err(query_err)?;
        Ok(row.as_ref().map(decode_team))
    }

    fn team_id_for_user(&mut self, user_id: UserId) -> Result<Option<TeamId>, MarketError> {
        Ok(select_team_for_user(&mut self.conn, user_id)?.map(|t| t.id))
    }

    fn count_players(&mut self, team_id: TeamId) -> Result<usize, MarketError> {
        let row = self
            .conn
            .query_one("SELECT COUNT(*) FROM players WHERE team_id = $1", &[&team_id.0])
            .map_err(query_err)?;
        let count: i64 = row.get(0);
        Ok(count as usize)
    }

    fn save_player(&mut self, player: &Player) -> Result<(), MarketError> {
        let team_id = player.team_id().map(|t| t.0);
        let changed = self
            .conn
            .execute(
                "UPDATE players SET team_id = $2, is_listed = $3, asking_price = $4 WHERE id = $1",
                &[
                    &player.id.0,
                    &team_id,
                    &player.is_listed(),
                    &player.asking_price(),
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
                "UPDATE teams SET budget = $2 WHERE id = $1",
                &[&team_id.0, &budget],
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
        let row = self
            .conn
            .query_one(
                "INSERT INTO teams (user_id, name, budget) VALUES ($1, $2, $3) RETURNING id",
                &[&team.user_id.0, &team.name, &team.budget],
            )
            .map_err(query_err)?;
        Ok(Team {
            id: TeamId(row.get(0)),
            user_id: team.user_id,
            name: team.name.clone(),
            budget: team.budget,
        })
    }

    fn insert_player(&mut self, player: &NewPlayer) -> Result<Player, MarketError> {
        let team_id = player.owner.team_id().map(|t| t.0);
        let row = self
            .conn
            .query_one(
                "INSERT INTO players (name, position, price, team_id, is_listed, asking_price)
                 VALUES ($1, $2, $3, $4, FALSE, NULL) RETURNING id",
                &[&player.name, &player.position.code(), &player.price, &team_id],
            )
            .map_err(query_err)?;
        Ok(Player {
            id: PlayerId(row.get(0)),
            name: player.name.clone(),
            position: player.position,
            price: player.price,
            owner: player.owner,
            listing: Listing::Unlisted,
        })
    }

    fn dissolve_team(&mut self, team_id: TeamId) -> Result<usize, MarketError> {
        self.conn
            .execute("SELECT id FROM teams WHERE id = $1 FOR UPDATE", &[&team_id.0])
            .map_err(query_err)?;
        let released = self
            .conn
            .execute(
                "UPDATE players SET team_id = NULL, is_listed = FALSE, asking_price = NULL
                 WHERE team_id = $1",
                &[&team_id.0],
            )
            .map_err(query_err)?;
        self.conn
            .execute("DELETE FROM teams WHERE id = $1", &[&team_id.0])
            .map_err(query_err)?;
        Ok(released as usize)
    }

    fn commit(mut self: Box<Self>) -> Result<(), MarketError> {
        self.conn.batch_execute("COMMIT").map_err(query_err)?;
        self.open = false;
        Ok(())
    }
}

impl Drop for PostgresUnitOfWork {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.conn.batch_execute("ROLLBACK") {
                tracing::warn!(error = %e, "postgres rollback failed");
            }
        }
    }
}
