#![allow(dead_code)]

use squadtrader::domain::player::{Money, NewPlayer, Ownership, PlayerId, Position};
use squadtrader::domain::team::{NewTeam, STARTING_BUDGET, TeamId};
use squadtrader::domain::user::{NewUser, UserId};
use squadtrader::ports::store_port::StorePort;

/// Positions of a legal squad of `size` players (minimums first, extras in midfield).
pub fn legal_layout(size: usize) -> Vec<Position> {
    let mut layout = Vec::with_capacity(size);
    layout.extend([Position::Goalkeeper; 2]);
    layout.extend([Position::Defender; 5]);
    layout.extend([Position::Midfielder; 5]);
    layout.extend([Position::Attacker; 3]);
    while layout.len() < size {
        layout.push(Position::Midfielder);
    }
    layout
}

pub fn register(store: &dyn StorePort, email: &str) -> UserId {
    store
        .insert_user(&NewUser {
            email: email.to_string(),
            password_hash: "not-a-real-hash".to_string(),
        })
        .unwrap()
        .id
}

/// Insert a team for `user` holding one player per entry of `positions`.
pub fn team_with(
    store: &dyn StorePort,
    user: UserId,
    name: &str,
    budget: Money,
    positions: &[Position],
) -> (TeamId, Vec<PlayerId>) {
    let mut tx = store.begin().unwrap();
    let team = tx
        .insert_team(&NewTeam {
            user_id: user,
            name: name.to_string(),
            budget,
        })
        .unwrap();
    let players = positions
        .iter()
        .enumerate()
        .map(|(i, &position)| {
            tx.insert_player(&NewPlayer {
                name: format!("{name} {i:02}"),
                position,
                price: 1_000_000,
                owner: Ownership::Team(team.id),
            })
            .unwrap()
            .id
        })
        .collect();
    tx.commit().unwrap();
    (team.id, players)
}

pub fn legal_team(store: &dyn StorePort, email: &str, name: &str, size: usize) -> (UserId, TeamId, Vec<PlayerId>) {
    let user = register(store, email);
    let (team, players) = team_with(store, user, name, STARTING_BUDGET, &legal_layout(size));
    (user, team, players)
}

pub fn pool_players(store: &dyn StorePort, positions: &[Position]) -> Vec<PlayerId> {
    let mut tx = store.begin().unwrap();
    let ids = positions
        .iter()
        .enumerate()
        .map(|(i, &position)| {
            tx.insert_player(&NewPlayer {
                name: format!("Pool {i:03}"),
                position,
                price: 800_000,
                owner: Ownership::Pool,
            })
            .unwrap()
            .id
        })
        .collect();
    tx.commit().unwrap();
    ids
}

pub fn budget_of(store: &dyn StorePort, user: UserId) -> Money {
    store.squad_for_user(user).unwrap().unwrap().team.budget
}

pub fn squad_size(store: &dyn StorePort, user: UserId) -> usize {
    store.squad_for_user(user).unwrap().unwrap().players.len()
}
