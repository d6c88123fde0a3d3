//! Market ledger: listing, unlisting and buying players.
//!
//! Each operation runs as a single transaction. Buy moves the player, debits
//! the buyer and credits the seller together or not at all.

use crate::domain::error::MarketError;
use crate::domain::operation::{self, Operation};
use crate::domain::player::{Listing, Money, Ownership, Player, PlayerId};
use crate::domain::roster::{MAX_SQUAD_SIZE, MIN_SQUAD_SIZE};
use crate::domain::team::{Team, TeamId};
use crate::domain::user::UserId;
use crate::ports::store_port::{StorePort, UnitOfWork};

/// Share of the asking price that changes hands, in percent.
pub const SETTLEMENT_PERCENT: i64 = 95;

/// 95% of the asking price, rounded half up to a whole unit.
///
/// The remaining 5% is a transfer discount: the buyer never pays it and the
/// seller never receives it.
pub fn settlement_price(asking_price: Money) -> Money {
    let scaled = i128::from(asking_price) * i128::from(SETTLEMENT_PERCENT);
    ((scaled + 50).div_euclid(100)) as Money
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPlayer {
    pub player_id: PlayerId,
    pub asking_price: Money,
    pub requester: UserId,
}

impl Operation for ListPlayer {
    type Output = Player;

    const NAME: &'static str = "list_player";

    fn execute(&self, tx: &mut dyn UnitOfWork) -> Result<Player, MarketError> {
        let mut player = load_owned_player(tx, self.player_id, self.requester)?;
        if self.asking_price <= 0 {
            return Err(MarketError::invalid_argument(
                "asking price must be positive",
            ));
        }
        player.listing = Listing::Listed {
            asking_price: self.asking_price,
        };
        tx.save_player(&player)?;
        Ok(player)
    }
}

/// Take a player off the transfer list. Unlisting an unlisted player succeeds
/// without changing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlistPlayer {
    pub player_id: PlayerId,
    pub requester: UserId,
}

impl Operation for UnlistPlayer {
    type Output = Player;

    const NAME: &'static str = "unlist_player";

    fn execute(&self, tx: &mut dyn UnitOfWork) -> Result<Player, MarketError> {
        let mut player = load_owned_player(tx, self.player_id, self.requester)?;
        if player.is_listed() {
            player.listing = Listing::Unlisted;
            tx.save_player(&player)?;
        }
        Ok(player)
    }
}

fn load_owned_player(
    tx: &mut dyn UnitOfWork,
    player_id: PlayerId,
    requester: UserId,
) -> Result<Player, MarketError> {
    let player = tx
        .lock_player(player_id)?
        .ok_or_else(|| MarketError::not_found("player"))?;
    let team_id = player
        .team_id()
        .ok_or_else(|| MarketError::forbidden("player is not on your team"))?;
    let team = tx
        .lock_team(team_id)?
        .ok_or_else(|| MarketError::not_found("team"))?;
    if team.user_id != requester {
        return Err(MarketError::forbidden("player is not on your team"));
    }
    Ok(player)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyPlayer {
    pub player_id: PlayerId,
    pub buyer: UserId,
}

/// Everything a purchase decision looks at, read under lock.
#[derive(Debug, Clone)]
pub struct PurchaseContext<'a> {
    pub player: &'a Player,
    pub seller: &'a Team,
    pub seller_count: usize,
    pub buyer: &'a Team,
    pub buyer_count: usize,
}

/// Outcome of a successful buy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    pub player: Player,
    pub buyer_team: TeamId,
    pub seller_team: TeamId,
    pub settlement: Money,
    pub buyer_budget: Money,
    pub seller_budget: Money,
}

/// Business rules of a purchase, in order; the first one broken wins.
/// Returns the settlement price.
pub fn validate_purchase(ctx: &PurchaseContext<'_>) -> Result<Money, MarketError> {
    let asking_price = match ctx.player.listing {
        Listing::Listed { asking_price } => asking_price,
        Listing::Unlisted => return Err(MarketError::invalid_state("not listed")),
    };
    if ctx.buyer.id == ctx.seller.id {
        return Err(MarketError::invalid_state("cannot buy your own player"));
    }
    let settlement = settlement_price(asking_price);
    if ctx.buyer.budget < settlement {
        return Err(MarketError::invalid_state("insufficient funds"));
    }
    if ctx.buyer_count >= MAX_SQUAD_SIZE {
        return Err(MarketError::invalid_state("buyer roster full"));
    }
    if ctx.seller_count <= MIN_SQUAD_SIZE {
        return Err(MarketError::invalid_state(
            "seller roster would fall below minimum",
        ));
    }
    Ok(settlement)
}

impl Operation for BuyPlayer {
    type Output = Purchase;

    const NAME: &'static str = "buy_player";

    fn execute(&self, tx: &mut dyn UnitOfWork) -> Result<Purchase, MarketError> {
        let mut player = tx
            .lock_player(self.player_id)?
            .ok_or_else(|| MarketError::not_found("player"))?;
        let seller_id = player
            .team_id()
            .ok_or_else(|| MarketError::invalid_state("unowned player cannot be traded"))?;
        let buyer_id = tx
            .team_id_for_user(self.buyer)?
            .ok_or_else(|| MarketError::not_found("buyer team"))?;

        let (seller, buyer) = lock_pair(tx, seller_id, buyer_id)?;
        let seller_count = tx.count_players(seller.id)?;
        let buyer_count = tx.count_players(buyer.id)?;

        let settlement = validate_purchase(&PurchaseContext {
            player: &player,
            seller: &seller,
            seller_count,
            buyer: &buyer,
            buyer_count,
        })?;

        player.owner = Ownership::Team(buyer.id);
        player.listing = Listing::Unlisted;
        tx.save_player(&player)?;

        let overflow = || MarketError::Internal {
            reason: format!("budget overflow settling player {}", player.id),
        };
        let buyer_budget = buyer.budget.checked_sub(settlement).ok_or_else(overflow)?;
        let seller_budget = seller.budget.checked_add(settlement).ok_or_else(overflow)?;
        tx.set_budget(buyer.id, buyer_budget)?;
        tx.set_budget(seller.id, seller_budget)?;

        Ok(Purchase {
            player,
            buyer_team: buyer.id,
            seller_team: seller.id,
            settlement,
            buyer_budget,
            seller_budget,
        })
    }
}

/// Lock seller and buyer rows in ascending id order.
fn lock_pair(
    tx: &mut dyn UnitOfWork,
    seller_id: TeamId,
    buyer_id: TeamId,
) -> Result<(Team, Team), MarketError> {
    let mut lock = |id: TeamId, what: &str| -> Result<Team, MarketError> {
        tx.lock_team(id)?
            .ok_or_else(|| MarketError::not_found(what))
    };
    if seller_id == buyer_id {
        let team = lock(seller_id, "seller team")?;
        return Ok((team.clone(), team));
    }
    if seller_id < buyer_id {
        let seller = lock(seller_id, "seller team")?;
        let buyer = lock(buyer_id, "buyer team")?;
        Ok((seller, buyer))
    } else {
        let buyer = lock(buyer_id, "buyer team")?;
        let seller = lock(seller_id, "seller team")?;
        Ok((seller, buyer))
    }
}

pub fn list_player(
    store: &dyn StorePort,
    player_id: PlayerId,
    asking_price: Money,
    requester: UserId,
) -> Result<Player, MarketError> {
    let player = operation::run(
        store,
        &ListPlayer {
            player_id,
            asking_price,
            requester,
        },
    )?;
    tracing::info!(
        player_id = %player_id,
        user_id = %requester,
        asking_price,
        "player listed"
    );
    Ok(player)
}

pub fn unlist_player(
    store: &dyn StorePort,
    player_id: PlayerId,
    requester: UserId,
) -> Result<Player, MarketError> {
    let player = operation::run(
        store,
        &UnlistPlayer {
            player_id,
            requester,
        },
    )?;
    tracing::info!(player_id = %player_id, user_id = %requester, "player unlisted");
    Ok(player)
}

pub fn buy_player(
    store: &dyn StorePort,
    player_id: PlayerId,
    buyer: UserId,
) -> Result<Purchase, MarketError> {
    let purchase = operation::run(store, &BuyPlayer { player_id, buyer })?;
    tracing::info!(
        player_id = %player_id,
        buyer_team = %purchase.buyer_team,
        seller_team = %purchase.seller_team,
        settlement = purchase.settlement,
        "player transferred"
    );
    Ok(purchase)
}
