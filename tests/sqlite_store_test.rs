#![cfg(feature = "sqlite")]
//! SQLite store integration tests on an on-disk database.
//!
//! Tests cover:
//! - Concurrent buys of one player across pooled connections
//! - Market queries agree with the in-process store
//! - Team creation from the pool and team replacement
//! - Data survives reopening the database file

mod common;

use common::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use squadtrader::adapters::memory_adapter::MemoryStore;
use squadtrader::adapters::sqlite_adapter::SqliteStore;
use squadtrader::domain::catalog::{self, MarketFilter, MarketQuery, SortField, SortOrder};
use squadtrader::domain::error::MarketError;
use squadtrader::domain::lifecycle;
use squadtrader::domain::market;
use squadtrader::domain::player::{Ownership, Position};
use squadtrader::domain::team::STARTING_BUDGET;
use squadtrader::ports::store_port::StorePort;
use std::path::Path;
use std::thread;
use std::time::Duration;

fn open(path: &Path) -> SqliteStore {
    let store = SqliteStore::open(path, 8, Duration::from_secs(10)).unwrap();
    store.initialize_schema().unwrap();
    store
}

#[test]
fn concurrent_buys_have_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("market.db"));

    let (seller, _, players) = legal_team(&store, "seller@example.com", "Sellers", 20);
    let target = players[4];
    market::list_player(&store, target, 2_000_000, seller).unwrap();
    let buyers: Vec<_> = (0..6)
        .map(|i| legal_team(&store, &format!("b{i}@example.com"), &format!("Buyers {i}"), 15).0)
        .collect();

    let outcomes: Vec<Result<_, MarketError>> = thread::scope(|s| {
        let handles: Vec<_> = buyers
            .iter()
            .map(|&buyer| {
                let store = &store;
                s.spawn(move || market::buy_player(store, target, buyer))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners: Vec<_> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    for err in outcomes.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(err, MarketError::InvalidState { .. }), "got {err}");
    }

    let moved = store.find_player(target).unwrap().unwrap();
    assert_eq!(moved.owner, Ownership::Team(winners[0].buyer_team));
    assert_eq!(budget_of(&store, seller), STARTING_BUDGET + 1_900_000);
    let total: i64 = buyers.iter().map(|&b| budget_of(&store, b)).sum::<i64>()
        + budget_of(&store, seller);
    assert_eq!(total, STARTING_BUDGET * 7);
}

fn populate(store: &dyn StorePort) {
    let (rovers, _, rover_players) = legal_team(store, "r@example.com", "Rovers FC", 18);
    let (city, _, city_players) = legal_team(store, "c@example.com", "City Athletic", 18);
    for (i, &player) in rover_players.iter().take(5).enumerate() {
        market::list_player(store, player, 100_000 * (i as i64 + 1), rovers).unwrap();
    }
    for (i, &player) in city_players.iter().take(4).enumerate() {
        market::list_player(store, player, 250_000 * (i as i64 + 1), city).unwrap();
    }
    let (elan, _, elan_players) = legal_team(store, "e@example.com", "Élan Étoile", 16);
    for &player in elan_players.iter().take(2) {
        market::list_player(store, player, 400_000, elan).unwrap();
    }
}

fn listing_ids(store: &dyn StorePort, query: &MarketQuery) -> Vec<(String, i64, String)> {
    catalog::list_market_players(store, query)
        .unwrap()
        .into_iter()
        .map(|l| (l.player.name.clone(), l.asking_price(), l.team_name))
        .collect()
}

#[test]
fn market_queries_match_memory_store() {
    let dir = tempfile::tempdir().unwrap();
    let sqlite = open(&dir.path().join("parity.db"));
    let memory = MemoryStore::new();
    populate(&sqlite);
    populate(&memory);

    let queries = [
        MarketQuery::default(),
        MarketQuery {
            filter: MarketFilter {
                name_prefix: Some("ROVERS".into()),
                ..Default::default()
            },
            ..Default::default()
        },
        MarketQuery {
            filter: MarketFilter {
                team_name_contains: Some("athl".into()),
                max_price: Some(500_000),
                ..Default::default()
            },
            sort: SortField::AskingPrice,
            order: SortOrder::Desc,
        },
        MarketQuery {
            filter: MarketFilter {
                name_prefix: Some("  ".into()),
                max_price: Some(300_000),
                ..Default::default()
            },
            sort: SortField::TeamName,
            order: SortOrder::Asc,
        },
        MarketQuery {
            filter: MarketFilter {
                name_prefix: Some("élan é".into()),
                team_name_contains: Some("ÉTOILE".into()),
                ..Default::default()
            },
            ..Default::default()
        },
    ];

    for query in &queries {
        assert_eq!(listing_ids(&sqlite, query), listing_ids(&memory, query), "{query:?}");
    }
    assert_eq!(listing_ids(&sqlite, &queries[0]).len(), 11);
    assert_eq!(listing_ids(&sqlite, &queries[2]).len(), 2);
    assert_eq!(listing_ids(&sqlite, &queries[4]).len(), 2);
}

#[test]
fn team_from_pool_then_replacement() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("lifecycle.db"));
    let mut rng = StdRng::seed_from_u64(17);
    let user = register(&store, "manager@example.com");

    let first = pool_players(&store, &legal_layout(16));
    let squad = lifecycle::create_team_from_selection(&store, user, first.clone(), &mut rng).unwrap();
    assert_eq!(squad.players.len(), 16);
    assert_eq!(squad.team.budget, STARTING_BUDGET);
    assert!(catalog::list_unassigned_players(&store).unwrap().is_empty());

    market::list_player(&store, first[0], 700_000, user).unwrap();

    let second = pool_players(&store, &legal_layout(15));
    let replaced =
        lifecycle::create_team_from_selection(&store, user, second.clone(), &mut rng).unwrap();
    assert_ne!(replaced.team.id, squad.team.id);

    let pool = catalog::list_unassigned_players(&store).unwrap();
    assert_eq!(pool.len(), 16);
    assert!(pool.iter().all(|p| !p.is_listed()));
    assert!(catalog::list_market_players(&store, &MarketQuery::default())
        .unwrap()
        .is_empty());
    // The pool comes back ordered GK, DEF, MID, ATT.
    let positions: Vec<Position> = pool.iter().map(|p| p.position).collect();
    let mut sorted = positions.clone();
    sorted.sort();
    assert_eq!(positions, sorted);
}

#[test]
fn selection_with_taken_player_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("taken.db"));
    let mut rng = StdRng::seed_from_u64(3);
    let (_, _, other_players) = legal_team(&store, "other@example.com", "Others", 16);
    let user = register(&store, "manager@example.com");

    let mut picks = pool_players(&store, &legal_layout(15));
    picks[14] = other_players[12];
    let err = lifecycle::create_team_from_selection(&store, user, picks, &mut rng).unwrap_err();
    assert!(matches!(err, MarketError::InvalidState { .. }));
    assert!(store.squad_for_user(user).unwrap().is_none());
    assert_eq!(catalog::list_unassigned_players(&store).unwrap().len(), 15);
}

#[test]
fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("persist.db");
    let user = {
        let store = open(&path);
        let (user, _, players) = legal_team(&store, "keep@example.com", "Keepers", 17);
        market::list_player(&store, players[2], 333_333, user).unwrap();
        user
    };

    let store = open(&path);
    let squad = catalog::get_team_for_user(&store, user).unwrap().unwrap();
    assert_eq!(squad.players.len(), 17);
    let listed: Vec<_> = squad.players.iter().filter(|p| p.is_listed()).collect();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].asking_price(), Some(333_333));
}
