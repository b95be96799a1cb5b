//! # tradebench - terminal test harness for a marketplace engine
//!
//! tradebench lets a marketplace/economy engine be exercised from a terminal
//! without a host game. It provides a line-oriented command interpreter and a
//! simulated set of seven inventories (the player's own plus one on each side).
//!
//! ## Features
//!
//! - **Command dispatch**: name → handler registry with aliases, optional command
//!   prefix character (`/`) and namespace token (`ce`) stripping.
//! - **Spatial inventories**: direction words and unit offsets route to one of
//!   seven capacity-bounded containers.
//! - **Autosave**: a cooperatively cancellable tokio task that persists the
//!   market on a fixed interval.
//! - **Pluggable market**: the engine is reached only through [market::Market];
//!   [market::LocalMarket] is a small fixed-price implementation for local use.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tradebench::config::Config;
//! use tradebench::harness::{Harness, Outcome};
//! use tradebench::market::{LocalMarket, SharedMarket};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let market = LocalMarket::open(config.market.clone(), None)?;
//!     let mut harness = Harness::new(config, None, SharedMarket::new(market));
//!     if let Outcome::Reply(text) = harness.dispatch("/ce give wood 3 north") {
//!         println!("{}", text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`harness`] - registry, command handlers, help cache, autosave pulse, REPL
//! - [`inventory`] - container routing and storage
//! - [`identity`] - player ids and operator membership
//! - [`market`] - the collaborator traits and the bundled local market
//! - [`config`] - configuration loading and validation
//! - [`errors`] - the error type every command reports through
//!
//! ```text
//! REPL ─→ CommandRegistry ─→ handlers ─→ InventoryRouter ─→ ContainerStore
//!                               │
//!                               └─→ Market (behind one mutex) ←─ AutosavePulse
//! ```

pub mod config;
pub mod errors;
pub mod harness;
pub mod identity;
pub mod inventory;
pub mod logutil;
pub mod market;
