//! The seam between the harness and a marketplace engine.
//!
//! The harness owns commands, identities and the simulated inventories; the
//! market owns prices, stock, accounts and how they are persisted. The two talk
//! through a pair of traits:
//!
//! - [Market] is what the harness consumes: ware lookup, persistence hooks, and
//!   [Market::execute] for the trading commands whose semantics live on the
//!   market side.
//! - [HarnessHooks] is what the harness exposes back so a market can read and
//!   move items in the simulated containers and check identities.
//!
//! All calls into a market go through [SharedMarket], whose single mutex keeps
//! REPL-initiated saves from overlapping autosave ticks.
use std::sync::{Arc, Mutex};

use crate::errors::{HarnessError, HarnessResult};
use crate::identity::PlayerId;
use crate::inventory::{ContainerId, Coordinate, StoreOutcome};

pub mod local;

pub use local::LocalMarket;

/// What the market knows about a ware.
#[derive(Debug, Clone, PartialEq)]
pub struct WareInfo {
    pub id: String,
    pub alias: Option<String>,
    pub exists: bool,
}

impl WareInfo {
    /// Alias when there is one, id otherwise.
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadScope {
    Config,
    Wares,
    Accounts,
    All,
}

impl ReloadScope {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "config" => Some(ReloadScope::Config),
            "wares" => Some(ReloadScope::Wares),
            "accounts" => Some(ReloadScope::Accounts),
            "all" => Some(ReloadScope::All),
            _ => None,
        }
    }

    pub fn includes_config(self) -> bool {
        matches!(self, ReloadScope::Config | ReloadScope::All)
    }
}

/// Target for `changeStock`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StockLevel {
    Quantity(i64),
    Equilibrium,
    Overstocked,
    Understocked,
}

impl StockLevel {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "equilibrium" => Some(StockLevel::Equilibrium),
            "overstocked" => Some(StockLevel::Overstocked),
            "understocked" => Some(StockLevel::Understocked),
            other => other.parse::<i64>().ok().map(StockLevel::Quantity),
        }
    }
}

/// A parsed trading command, handed to [Market::execute].
///
/// Argument parsing and permission checks have already happened; ware ids are
/// still as typed and may be aliases.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketRequest {
    Buy {
        ware: String,
        quantity: i64,
        max_unit_price: Option<f64>,
        account: Option<String>,
        container: ContainerId,
    },
    Sell {
        ware: String,
        /// `None` sells every unit held
        quantity: Option<i64>,
        min_unit_price: Option<f64>,
        account: Option<String>,
        container: ContainerId,
    },
    Check {
        ware: String,
        quantity: i64,
    },
    SellAll {
        container: ContainerId,
        account: Option<String>,
    },
    Money {
        account: Option<String>,
    },
    Send {
        amount: f64,
        recipient: String,
        sender: Option<String>,
    },
    CreateAccount {
        account: String,
    },
    DeleteAccount {
        account: String,
    },
    GrantAccess {
        player: String,
        account: String,
    },
    RevokeAccess {
        player: String,
        account: String,
    },
    Research {
        ware: String,
        max_price: Option<f64>,
        account: Option<String>,
    },
    AddFunds {
        amount: f64,
        account: Option<String>,
    },
    SetFunds {
        amount: f64,
        account: Option<String>,
    },
    ChangeStock {
        ware: String,
        level: StockLevel,
    },
    SetDefaultAccount {
        account: String,
    },
    PrintMarket,
}

/// A marketplace engine driven by the harness.
pub trait Market: Send {
    /// Metadata for a ware id or alias, `None` when unknown.
    fn translate_and_grab(&self, id: &str) -> Option<WareInfo>;

    /// Canonical id for a ware id or alias; empty when unknown.
    fn translate_id(&self, id: &str) -> String;

    /// Cost of one research action, `None` when research is switched off.
    fn research_cost(&self) -> Option<f64>;

    fn save_wares(&mut self) -> HarnessResult<()>;

    fn save_accounts(&mut self) -> HarnessResult<()>;

    fn reload(&mut self, scope: ReloadScope) -> HarnessResult<()>;

    /// Run a trading command on behalf of `actor`, returning the reply text.
    fn execute(
        &mut self,
        actor: PlayerId,
        request: MarketRequest,
        hooks: &mut dyn HarnessHooks,
    ) -> HarnessResult<String>;

    /// Called once when the harness terminates.
    fn shutdown(&mut self) {}
}

/// Access to harness state for a [Market] implementation.
pub trait HarnessHooks {
    fn resolve_identity(&mut self, name: &str) -> PlayerId;
    fn display_name(&self, id: &PlayerId) -> Option<String>;
    fn is_operator(&self, id: &PlayerId) -> bool;
    fn has_permission(&self, actor: &PlayerId, target: Option<&PlayerId>, requires_operator: bool) -> bool;
    fn list_contents(&self, at: Coordinate) -> HarnessResult<Vec<(String, u64)>>;
    fn free_slots(&self, at: Coordinate) -> HarnessResult<usize>;
    fn add(&mut self, at: Coordinate, id: &str, quantity: i64) -> HarnessResult<StoreOutcome>;
    fn remove(&mut self, at: Coordinate, id: &str, quantity: i64) -> HarnessResult<StoreOutcome>;
    fn query(&self, at: Coordinate, id: &str) -> HarnessResult<Option<u64>>;
}

/// A market behind the one lock every caller shares.
#[derive(Clone)]
pub struct SharedMarket {
    inner: Arc<Mutex<Box<dyn Market>>>,
}

impl SharedMarket {
    pub fn new(market: impl Market + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(market))),
        }
    }

    /// Run `f` with the market locked. Keep `f` short; autosave waits on it.
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn Market) -> HarnessResult<R>) -> HarnessResult<R> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| HarnessError::Persistence("market lock poisoned".to_string()))?;
        f(&mut **guard)
    }

    /// Persist wares then accounts under one lock hold.
    pub fn save_all(&self) -> HarnessResult<()> {
        self.with(|m| {
            m.save_wares()?;
            m.save_accounts()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_scope_tokens() {
        assert_eq!(ReloadScope::from_token("Config"), Some(ReloadScope::Config));
        assert_eq!(ReloadScope::from_token("all"), Some(ReloadScope::All));
        assert_eq!(ReloadScope::from_token("everything"), None);
        assert!(ReloadScope::All.includes_config());
        assert!(!ReloadScope::Wares.includes_config());
    }

    #[test]
    fn stock_level_tokens() {
        assert_eq!(StockLevel::from_token("EQUILIBRIUM"), Some(StockLevel::Equilibrium));
        assert_eq!(StockLevel::from_token("-5"), Some(StockLevel::Quantity(-5)));
        assert_eq!(StockLevel::from_token("lots"), None);
    }

    #[test]
    fn ware_display_prefers_alias() {
        let ware = WareInfo {
            id: "minecraft:planks".to_string(),
            alias: Some("wood".to_string()),
            exists: true,
        };
        assert_eq!(ware.display_name(), "wood");
    }
}
