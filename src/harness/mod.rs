//! Command dispatch for the terminal harness.
//!
//! [Harness] owns everything a command can touch: the registry, the simulated
//! [World] (containers and identities), the session player, the help cache and
//! the shared market handle. [Harness::dispatch] turns one raw input line into
//! an [Outcome]; the REPL in [repl] decides what to do with it.
//!
//! Handler failures never escape `dispatch`. They come back as
//! [Outcome::Error] and the caller prints them.
use std::path::PathBuf;

use log::debug;

use crate::config::Config;
use crate::errors::{HarnessError, HarnessResult};
use crate::identity::{IdentityRegistry, PlayerId};
use crate::inventory::{resolve_container, ContainerStore, Coordinate, StoreOutcome};
use crate::logutil::escape_log;
use crate::market::{HarnessHooks, MarketRequest, SharedMarket};

pub mod commands;
pub mod help;
pub mod pulse;
pub mod registry;
pub mod repl;

pub use help::HelpCache;
pub use pulse::{AutosavePulse, PulseError, PulseStats};
pub use registry::{CommandRegistry, Handler};
pub use repl::Repl;

/// Result of dispatching one line.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// Blank line or bare prefix/namespace; re-prompt.
    Idle,
    Reply(String),
    /// Config was re-read; the REPL restarts autosave with the new schedule.
    ConfigReloaded(String),
    Exit,
    Error(HarnessError),
}

/// The player the local session is acting as.
#[derive(Debug, Clone)]
pub struct Session {
    pub player_name: String,
    pub player_id: PlayerId,
}

/// Simulated game state exposed to the market through [HarnessHooks].
#[derive(Debug, Clone)]
pub struct World {
    pub store: ContainerStore,
    pub identities: IdentityRegistry,
}

impl World {
    pub fn new(store: ContainerStore, identities: IdentityRegistry) -> Self {
        Self { store, identities }
    }
}

impl HarnessHooks for World {
    fn resolve_identity(&mut self, name: &str) -> PlayerId {
        self.identities.resolve(name)
    }

    fn display_name(&self, id: &PlayerId) -> Option<String> {
        self.identities.display_name(id).map(str::to_string)
    }

    fn is_operator(&self, id: &PlayerId) -> bool {
        self.identities.is_operator(id)
    }

    fn has_permission(&self, actor: &PlayerId, target: Option<&PlayerId>, requires_operator: bool) -> bool {
        self.identities.has_permission(actor, target, requires_operator)
    }

    fn list_contents(&self, at: Coordinate) -> HarnessResult<Vec<(String, u64)>> {
        Ok(self.store.enumerate(resolve_container(Some(at))?))
    }

    fn free_slots(&self, at: Coordinate) -> HarnessResult<usize> {
        Ok(self.store.free_slots(resolve_container(Some(at))?))
    }

    fn add(&mut self, at: Coordinate, id: &str, quantity: i64) -> HarnessResult<StoreOutcome> {
        self.store.add(resolve_container(Some(at))?, id, quantity)
    }

    fn remove(&mut self, at: Coordinate, id: &str, quantity: i64) -> HarnessResult<StoreOutcome> {
        self.store.remove(resolve_container(Some(at))?, id, quantity)
    }

    fn query(&self, at: Coordinate, id: &str) -> HarnessResult<Option<u64>> {
        Ok(self.store.query(resolve_container(Some(at))?, id))
    }
}

pub struct Harness {
    config: Config,
    config_path: Option<PathBuf>,
    registry: CommandRegistry,
    world: World,
    session: Session,
    market: SharedMarket,
    help: HelpCache,
}

impl Harness {
    /// Build a harness with empty containers and every built-in command registered.
    ///
    /// The configured player starts as the only operator. `config_path` is the
    /// file `reload config` re-reads; pass `None` when the config was built in memory.
    pub fn new(config: Config, config_path: Option<PathBuf>, market: SharedMarket) -> Self {
        let mut identities = IdentityRegistry::with_operator(&config.harness.player_name);
        let player_id = identities.resolve(&config.harness.player_name);
        let mut registry = CommandRegistry::new(&config.harness.command_prefixes, &config.harness.namespaces);
        commands::register_builtins(&mut registry);

        Self {
            session: Session {
                player_name: config.harness.player_name.clone(),
                player_id,
            },
            world: World::new(ContainerStore::from_config(&config.inventory), identities),
            registry,
            config,
            config_path,
            market,
            help: HelpCache::new(),
        }
    }

    /// Run one raw input line.
    pub fn dispatch(&mut self, line: &str) -> Outcome {
        let tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        let Some((name, args)) = self.registry.normalize(&tokens) else {
            return Outcome::Idle;
        };
        debug!("dispatch: {}", escape_log(line));

        let Some(handler) = self.registry.lookup(&name) else {
            return Outcome::Error(HarnessError::unknown_command(&name));
        };
        match handler(self, args) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!("{} failed ({}): {}", escape_log(&name), e.kind(), escape_log(&e.to_string()));
                Outcome::Error(e)
            }
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config_path.as_ref()
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn market(&self) -> &SharedMarket {
        &self.market
    }

    /// Persist through the market collaborator.
    pub fn save(&self) -> HarnessResult<()> {
        self.market.save_all()
    }

    /// Switch the session to `name`, creating the identity on first use.
    pub(crate) fn switch_player(&mut self, name: &str) -> PlayerId {
        let id = self.world.identities.resolve(name);
        self.session = Session {
            player_name: name.to_string(),
            player_id: id,
        };
        id
    }

    pub(crate) fn apply_config(&mut self, config: Config) {
        self.registry
            .set_prefixes(&config.harness.command_prefixes, &config.harness.namespaces);
        self.config = config;
    }

    /// Hand a trading request to the market on behalf of the session player.
    pub(crate) fn execute(&mut self, request: MarketRequest) -> HarnessResult<String> {
        let actor = self.session.player_id;
        let world = &mut self.world;
        self.market.with(|m| m.execute(actor, request, world))
    }

    pub(crate) fn help_text(&mut self) -> HarnessResult<String> {
        let research = self.market.with(|m| Ok(m.research_cost().is_some()))?;
        Ok(self.help.render(research).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::ContainerId;

    fn world() -> World {
        World::new(ContainerStore::new(2, 1), IdentityRegistry::with_operator("John_Doe"))
    }

    #[test]
    fn hooks_route_coordinates_to_containers() {
        let mut w = world();
        let north = ContainerId::North.coordinate();
        assert_eq!(w.free_slots(north).unwrap(), 1);

        w.add(north, "minecraft:apple", 5).unwrap();
        assert_eq!(w.free_slots(north).unwrap(), 0);
        assert_eq!(w.query(north, "minecraft:apple").unwrap(), Some(5));
        assert_eq!(w.store.query(ContainerId::North, "minecraft:apple"), Some(5));
        assert_eq!(
            w.list_contents(north).unwrap(),
            vec![("minecraft:apple".to_string(), 5)]
        );
        assert_eq!(w.free_slots(Coordinate::ORIGIN).unwrap(), 2);

        let outcome = w.remove(north, "minecraft:apple", 0).unwrap();
        assert_eq!(outcome, StoreOutcome::Removed { quantity: 5, emptied: true });
        assert!(w.list_contents(north).unwrap().is_empty());
    }

    #[test]
    fn off_grid_coordinates_are_routing_errors() {
        let mut w = world();
        let diagonal = Coordinate::new(1, 1, 0);
        assert!(matches!(w.free_slots(diagonal), Err(HarnessError::Routing(_))));
        assert!(matches!(w.query(diagonal, "minecraft:apple"), Err(HarnessError::Routing(_))));
        assert!(matches!(w.add(diagonal, "minecraft:apple", 1), Err(HarnessError::Routing(_))));
        assert!(ContainerId::ALL.iter().all(|c| w.store.container(*c).is_empty()));
    }

    #[test]
    fn hooks_expose_identities() {
        let mut w = world();
        let admin = IdentityRegistry::derive("John_Doe");
        let guest = w.resolve_identity("guest");
        assert_eq!(w.display_name(&guest).as_deref(), Some("guest"));
        assert!(w.is_operator(&admin));
        assert!(!w.has_permission(&guest, None, true));
        assert!(w.has_permission(&guest, Some(&guest), false));
    }
}
