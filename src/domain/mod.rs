//! Core domain types and logic.

pub mod error;
pub mod player;
pub mod team;
pub mod user;
pub mod roster;
pub mod operation;
pub mod market;
pub mod lifecycle;
pub mod catalog;
pub mod generator;
pub mod identity;
pub mod seed;
