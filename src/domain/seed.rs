//! Demo data: an unassigned pool plus users with teams and some listings.

use rand::Rng;

use crate::domain::error::MarketError;
use crate::domain::generator::{self, Prospect};
use crate::domain::identity;
use crate::domain::lifecycle;
use crate::domain::market;
use crate::domain::operation::{self, Operation};
use crate::domain::player::{Money, NewPlayer, Ownership, Player};
use crate::domain::user::NewUser;
use crate::ports::store_port::{StorePort, UnitOfWork};

pub const DEMO_PASSWORD: &str = "password123";

/// Default chance that a demo team's player is put on the market.
pub const LISTING_PROBABILITY: f64 = 0.3;

/// Asking price of seeded listings, in percent of the player's price.
pub const LISTING_MARKUP_PERCENT: i64 = 120;

/// Insert prospects into the unassigned pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedPool {
    pub prospects: Vec<Prospect>,
}

impl Operation for SeedPool {
    type Output = Vec<Player>;

    const NAME: &'static str = "seed_pool";

    fn execute(&self, tx: &mut dyn UnitOfWork) -> Result<Vec<Player>, MarketError> {
        let mut players = Vec::with_capacity(self.prospects.len());
        for prospect in &self.prospects {
            players.push(tx.insert_player(&NewPlayer {
                name: prospect.name.clone(),
                position: prospect.position,
                price: prospect.price,
                owner: Ownership::Pool,
            })?);
        }
        Ok(players)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedPlan {
    pub pool_size: usize,
    pub users: usize,
    pub listing_probability: f64,
}

impl Default for SeedPlan {
    fn default() -> Self {
        Self {
            pool_size: 200,
            users: 20,
            listing_probability: LISTING_PROBABILITY,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub pool_players: usize,
    pub users: usize,
    pub listed: usize,
}

pub fn demo_email(index: usize) -> String {
    format!("user{index}@example.com")
}

fn markup(price: Money) -> Money {
    (price * LISTING_MARKUP_PERCENT + 50) / 100
}

/// Seed the unassigned pool and the demo accounts described by `plan`.
///
/// Accounts that already exist keep their credentials but get a fresh team.
pub fn seed_demo_data<R: Rng + ?Sized>(
    store: &dyn StorePort,
    plan: &SeedPlan,
    rng: &mut R,
) -> Result<SeedSummary, MarketError> {
    if !(0.0..=1.0).contains(&plan.listing_probability) {
        return Err(MarketError::invalid_argument(
            "listing probability must be between 0 and 1",
        ));
    }
    let prospects = (0..plan.pool_size)
        .map(|_| generator::pool_player(rng))
        .collect();
    let pool = operation::run(store, &SeedPool { prospects })?;
    let mut summary = SeedSummary {
        pool_players: pool.len(),
        ..Default::default()
    };

    let password_hash = identity::hash_password(DEMO_PASSWORD)?;
    for index in 1..=plan.users {
        let email = demo_email(index);
        let user = match store.find_user_by_email(&email)? {
            Some(user) => user,
            None => store.insert_user(&NewUser {
                email,
                password_hash: password_hash.clone(),
            })?,
        };
        let squad = lifecycle::create_default_team(store, user.id, rng)?;
        summary.users += 1;

        for player in &squad.players {
            if rng.gen_bool(plan.listing_probability) {
                market::list_player(store, player.id, markup(player.price), user.id)?;
                summary.listed += 1;
            }
        }
    }

    tracing::info!(
        pool_players = summary.pool_players,
        users = summary.users,
        listed = summary.listed,
        "demo data seeded"
    );
    Ok(summary)
}
