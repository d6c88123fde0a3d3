//! Market ledger properties against the in-process store.
//!
//! Tests cover:
//! - Settlement rounding over the whole money range
//! - Roster legality for arbitrary position counts
//! - Budget conservation and roster bounds under random trading
//! - Concurrent buys of one player (exactly one wins)
//! - Concurrent buys draining a seller down to the minimum

mod common;

use common::*;
use proptest::prelude::*;
use squadtrader::adapters::memory_adapter::MemoryStore;
use squadtrader::domain::error::MarketError;
use squadtrader::domain::market::{self, settlement_price};
use squadtrader::domain::player::{Listing, Ownership, Player, PlayerId, Position};
use squadtrader::domain::roster::{self, MAX_SQUAD_SIZE, MIN_SQUAD_SIZE};
use squadtrader::domain::team::{STARTING_BUDGET, TeamId};
use squadtrader::ports::store_port::StorePort;

fn players_for(counts: [usize; 4]) -> Vec<Player> {
    let mut players = Vec::new();
    for (position, count) in Position::ALL.into_iter().zip(counts) {
        for _ in 0..count {
            players.push(Player {
                id: PlayerId(players.len() as i64 + 1),
                name: format!("P{}", players.len()),
                position,
                price: 1,
                owner: Ownership::Team(TeamId(1)),
                listing: Listing::Unlisted,
            });
        }
    }
    players
}

mod settlement {
    use super::*;

    proptest! {
        #[test]
        fn rounds_half_up(asking in 1i64..1_000_000_000_000) {
            let settlement = settlement_price(asking);
            let exact = i128::from(asking) * 95;
            let scaled = i128::from(settlement) * 100;
            prop_assert!(scaled - 50 <= exact);
            prop_assert!(exact < scaled + 50);
            prop_assert!(settlement <= asking);
        }
    }

    #[test]
    fn worked_examples() {
        assert_eq!(settlement_price(1_000_000), 950_000);
        assert_eq!(settlement_price(10), 10); // 9.5 rounds up
        assert_eq!(settlement_price(1), 1); // 0.95
        assert_eq!(settlement_price(3), 3); // 2.85
        assert_eq!(settlement_price(30), 29); // 28.5 rounds up
    }
}

mod roster_policy {
    use super::*;

    proptest! {
        #[test]
        fn legality_matches_definition(gk in 0usize..8, def in 0usize..10, mid in 0usize..10, att in 0usize..8) {
            let players = players_for([gk, def, mid, att]);
            let total = gk + def + mid + att;
            let expected = (MIN_SQUAD_SIZE..=MAX_SQUAD_SIZE).contains(&total)
                && gk >= 2 && def >= 5 && mid >= 5 && att >= 3;
            prop_assert_eq!(roster::is_legal_roster(&players), expected);
            prop_assert_eq!(roster::check_roster(&players).is_ok(), expected);
        }
    }

    #[test]
    fn minimum_legal_squad() {
        assert!(roster::is_legal_roster(&players_for([2, 5, 5, 3])));
        assert!(!roster::is_legal_roster(&players_for([1, 6, 5, 3])));
        assert!(!roster::is_legal_roster(&players_for([2, 5, 5, 14])));
    }
}

mod conservation {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn random_trading_conserves_money_and_rosters(
            sizes in proptest::collection::vec(15usize..=25, 3),
            prices in proptest::collection::vec(1i64..3_000_000, 75),
            trades in proptest::collection::vec((0usize..75, 0usize..3), 0..40),
        ) {
            let store = MemoryStore::new();
            let mut users = Vec::new();
            let mut all_players = Vec::new();
            for (i, &size) in sizes.iter().enumerate() {
                let (user, _, players) =
                    legal_team(&store, &format!("u{i}@example.com"), &format!("Team {i}"), size);
                for (j, &player) in players.iter().enumerate() {
                    let asking = prices[(i * 25 + j) % prices.len()];
                    market::list_player(&store, player, asking, user).unwrap();
                }
                users.push(user);
                all_players.extend(players);
            }

            for (pick, buyer) in trades {
                let player = all_players[pick % all_players.len()];
                match market::buy_player(&store, player, users[buyer]) {
                    Ok(purchase) => {
                        prop_assert!(purchase.buyer_budget >= 0);
                    }
                    Err(e) => {
                        prop_assert!(!e.is_internal(), "unexpected internal error: {}", e);
                    }
                }
            }

            let total: i64 = users.iter().map(|&u| budget_of(&store, u)).sum();
            prop_assert_eq!(total, STARTING_BUDGET * users.len() as i64);
            for &user in &users {
                let size = squad_size(&store, user);
                prop_assert!((MIN_SQUAD_SIZE..=MAX_SQUAD_SIZE).contains(&size));
                prop_assert!(budget_of(&store, user) >= 0);
            }
            let owned: usize = users.iter().map(|&u| squad_size(&store, u)).sum();
            prop_assert_eq!(owned, all_players.len());
        }
    }
}

mod concurrency {
    use super::*;
    use std::thread;

    #[test]
    fn one_player_many_buyers_exactly_one_wins() {
        let store = MemoryStore::new();
        let (seller, _, players) = legal_team(&store, "seller@example.com", "Sellers", 20);
        let target = players[7];
        market::list_player(&store, target, 1_000_000, seller).unwrap();

        let buyers: Vec<_> = (0..8)
            .map(|i| {
                legal_team(&store, &format!("b{i}@example.com"), &format!("Buyers {i}"), 15).0
            })
            .collect();

        let results: Vec<Result<_, MarketError>> = thread::scope(|s| {
            let handles: Vec<_> = buyers
                .iter()
                .map(|&buyer| {
                    let store = &store;
                    s.spawn(move || market::buy_player(store, target, buyer))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(err, MarketError::InvalidState { .. }), "got {err}");
        }

        let moved = store.find_player(target).unwrap().unwrap();
        assert_eq!(moved.owner, Ownership::Team(winners[0].buyer_team));
        assert!(!moved.is_listed());
        assert_eq!(budget_of(&store, seller), STARTING_BUDGET + 950_000);

        let total: i64 = buyers.iter().map(|&b| budget_of(&store, b)).sum::<i64>()
            + budget_of(&store, seller);
        assert_eq!(total, STARTING_BUDGET * 9);
    }

    #[test]
    fn seller_never_drops_below_minimum() {
        let store = MemoryStore::new();
        let (seller, _, players) = legal_team(&store, "seller@example.com", "Sellers", 18);
        for &player in &players[..6] {
            market::list_player(&store, player, 100_000, seller).unwrap();
        }
        let buyers: Vec<_> = (0..6)
            .map(|i| {
                legal_team(&store, &format!("b{i}@example.com"), &format!("Buyers {i}"), 15).0
            })
            .collect();

        let successes = thread::scope(|s| {
            let handles: Vec<_> = buyers
                .iter()
                .zip(&players[..6])
                .map(|(&buyer, &player)| {
                    let store = &store;
                    s.spawn(move || market::buy_player(store, player, buyer).is_ok())
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });

        assert_eq!(successes, 3);
        assert_eq!(squad_size(&store, seller), MIN_SQUAD_SIZE);
    }

    #[test]
    fn stale_listing_rejected_after_unlist() {
        let store = MemoryStore::new();
        let (seller, _, players) = legal_team(&store, "seller@example.com", "Sellers", 16);
        let (buyer, _, _) = legal_team(&store, "buyer@example.com", "Buyers", 15);
        market::list_player(&store, players[0], 500_000, seller).unwrap();
        market::unlist_player(&store, players[0], seller).unwrap();

        let err = market::buy_player(&store, players[0], buyer).unwrap_err();
        assert!(matches!(err, MarketError::InvalidState { .. }));
        assert_eq!(budget_of(&store, buyer), STARTING_BUDGET);
    }
}
