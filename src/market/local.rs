//! Reference market collaborator.
//!
//! `LocalMarket` is the smallest market that exercises every hook: a fixed price
//! per ware, a stock counter, flat account balances with access lists, and JSON
//! snapshots for save/reload. Prices never move. Swap it out for a real engine
//! by implementing [Market] elsewhere.
//!
//! Snapshots are written the same way everywhere in this crate: exclusive fs2
//! lock on the destination, write to a temp sibling, fsync, rename.
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::{HarnessHooks, Market, MarketRequest, ReloadScope, StockLevel, WareInfo};
use crate::config::{Config, MarketConfig, WareConfig};
use crate::errors::{HarnessError, HarnessResult};
use crate::identity::PlayerId;
use crate::inventory::ContainerId;

const WARES_FILE: &str = "wares.json";
const ACCOUNTS_FILE: &str = "accounts.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Ware {
    id: String,
    alias: Option<String>,
    price: f64,
    stock: i64,
    base_stock: i64,
    #[serde(default)]
    researched: bool,
}

impl From<&WareConfig> for Ware {
    fn from(cfg: &WareConfig) -> Self {
        Self {
            id: cfg.id.clone(),
            alias: cfg.alias.clone(),
            price: cfg.price,
            stock: cfg.stock,
            base_stock: cfg.stock,
            researched: false,
        }
    }
}

impl Ware {
    fn label(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Account {
    money: f64,
    owners: Vec<PlayerId>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountsFile {
    accounts: BTreeMap<String, Account>,
    defaults: HashMap<PlayerId, String>,
}

pub struct LocalMarket {
    config: MarketConfig,
    config_path: Option<PathBuf>,
    wares: Vec<Ware>,
    accounts: BTreeMap<String, Account>,
    defaults: HashMap<PlayerId, String>,
}

impl LocalMarket {
    /// Build from config, then overlay any snapshots already in `data_dir`.
    ///
    /// `config_path` is re-read on `reload config`; without it that scope is a no-op.
    pub fn open(config: MarketConfig, config_path: Option<PathBuf>) -> HarnessResult<Self> {
        let mut market = Self {
            wares: config.wares.iter().map(Ware::from).collect(),
            config,
            config_path,
            accounts: BTreeMap::new(),
            defaults: HashMap::new(),
        };
        market.load_wares()?;
        market.load_accounts()?;
        info!(
            "Market ready: {} wares, {} accounts (data dir {})",
            market.wares.len(),
            market.accounts.len(),
            market.config.data_dir
        );
        Ok(market)
    }

    fn data_path(&self, file: &str) -> PathBuf {
        Path::new(&self.config.data_dir).join(file)
    }

    /// Exact id first, then alias, then the id without its `namespace:` part.
    fn ware_index(&self, id: &str) -> Option<usize> {
        self.wares
            .iter()
            .position(|w| w.id == id)
            .or_else(|| self.wares.iter().position(|w| w.alias.as_deref() == Some(id)))
            .or_else(|| {
                self.wares
                    .iter()
                    .position(|w| w.id.split_once(':').map(|(_, name)| name) == Some(id))
            })
    }

    fn ware_mut(&mut self, id: &str) -> HarnessResult<&mut Ware> {
        let index = self
            .ware_index(id)
            .ok_or_else(|| HarnessError::NotFound(format!("Unknown ware '{}'", id)))?;
        Ok(&mut self.wares[index])
    }

    fn load_wares(&mut self) -> HarnessResult<()> {
        let path = self.data_path(WARES_FILE);
        if let Some(saved) = read_snapshot::<Vec<Ware>>(&path)? {
            debug!("Loaded {} wares from {}", saved.len(), path.display());
            self.wares = saved;
        }
        // Wares added to the config since the last save still show up.
        for cfg in &self.config.wares {
            if !self.wares.iter().any(|w| w.id == cfg.id) {
                self.wares.push(Ware::from(cfg));
            }
        }
        Ok(())
    }

    fn load_accounts(&mut self) -> HarnessResult<()> {
        let path = self.data_path(ACCOUNTS_FILE);
        let saved = read_snapshot::<AccountsFile>(&path)?.unwrap_or_default();
        self.accounts = saved.accounts;
        self.defaults = saved.defaults;
        Ok(())
    }

    fn reload_config(&mut self) -> HarnessResult<()> {
        let Some(path) = self.config_path.clone() else {
            return Ok(());
        };
        let path = path.to_string_lossy().to_string();
        let config = Config::load_blocking(&path)
            .map_err(|e| HarnessError::Persistence(format!("{:#}", e)))?;
        self.config = config.market;
        info!("Market config reloaded from {}", path);
        Ok(())
    }

    fn reload_scope(&mut self, scope: ReloadScope) -> HarnessResult<()> {
        if scope.includes_config() {
            self.reload_config()?;
        }
        if matches!(scope, ReloadScope::Wares | ReloadScope::All) {
            self.wares = self.config.wares.iter().map(Ware::from).collect();
            self.load_wares()?;
        }
        if matches!(scope, ReloadScope::Accounts | ReloadScope::All) {
            self.load_accounts()?;
        }
        Ok(())
    }

    /// Name of the account `actor` trades from, creating their personal one on demand.
    fn account_for(&mut self, actor: PlayerId, requested: Option<&str>, hooks: &dyn HarnessHooks) -> HarnessResult<String> {
        if let Some(name) = requested {
            let account = self
                .accounts
                .get(name)
                .ok_or_else(|| HarnessError::NotFound(format!("Account '{}' does not exist", name)))?;
            if !account.owners.contains(&actor) && !hooks.is_operator(&actor) {
                return Err(HarnessError::Permission(format!(
                    "you do not have access to account '{}'",
                    name
                )));
            }
            return Ok(name.to_string());
        }

        if let Some(name) = self.defaults.get(&actor) {
            if self.accounts.contains_key(name) {
                return Ok(name.clone());
            }
        }

        let personal = hooks
            .display_name(&actor)
            .unwrap_or_else(|| actor.to_string());
        if !self.accounts.contains_key(&personal) {
            debug!("Creating personal account '{}'", personal);
            self.accounts.insert(
                personal.clone(),
                Account {
                    money: self.config.default_funds,
                    owners: vec![actor],
                },
            );
        }
        Ok(personal)
    }

    fn account_mut(&mut self, name: &str) -> HarnessResult<&mut Account> {
        self.accounts
            .get_mut(name)
            .ok_or_else(|| HarnessError::NotFound(format!("Account '{}' does not exist", name)))
    }

    fn owned_account_mut(&mut self, actor: PlayerId, name: &str, hooks: &dyn HarnessHooks) -> HarnessResult<&mut Account> {
        let account = self
            .accounts
            .get_mut(name)
            .ok_or_else(|| HarnessError::NotFound(format!("Account '{}' does not exist", name)))?;
        if !account.owners.contains(&actor) && !hooks.is_operator(&actor) {
            return Err(HarnessError::Permission(format!(
                "you do not have access to account '{}'",
                name
            )));
        }
        Ok(account)
    }

    fn buy(
        &mut self,
        actor: PlayerId,
        ware: &str,
        quantity: i64,
        max_unit_price: Option<f64>,
        account: Option<&str>,
        container: ContainerId,
        hooks: &mut dyn HarnessHooks,
    ) -> HarnessResult<String> {
        let (id, label, price, stock) = {
            let w = self.ware_mut(ware)?;
            (w.id.clone(), w.label().to_string(), w.price, w.stock)
        };
        if stock < quantity {
            return Err(HarnessError::Market(format!(
                "Only {} {} left in stock",
                stock.max(0),
                label
            )));
        }
        if let Some(limit) = max_unit_price {
            if price > limit {
                return Err(HarnessError::Market(format!(
                    "{} costs ${:.2} each, above your limit of ${:.2}",
                    label, price, limit
                )));
            }
        }
        let account_name = self.account_for(actor, account, &*hooks)?;
        let total = price * quantity as f64;
        let balance = self.account_mut(&account_name)?.money;
        if balance < total {
            return Err(HarnessError::Market(format!(
                "Insufficient funds: {} {} costs ${:.2}, account '{}' holds ${:.2}",
                quantity, label, total, account_name, balance
            )));
        }

        // Inventory first: a full container must not cost anything.
        hooks.add(container.coordinate(), &id, quantity)?;
        self.account_mut(&account_name)?.money -= total;
        self.ware_mut(&id)?.stock -= quantity;
        Ok(format!(
            "Bought {} {} for ${:.2} into {}",
            quantity, label, total, container
        ))
    }

    fn sell(
        &mut self,
        actor: PlayerId,
        ware: &str,
        quantity: Option<i64>,
        min_unit_price: Option<f64>,
        account: Option<&str>,
        container: ContainerId,
        hooks: &mut dyn HarnessHooks,
    ) -> HarnessResult<String> {
        let (id, label, price) = {
            let w = self.ware_mut(ware)?;
            (w.id.clone(), w.label().to_string(), w.price)
        };
        let at = container.coordinate();
        let held = units(hooks.query(at, &id)?.unwrap_or(0), &label)?;
        if held == 0 {
            return Err(HarnessError::NotFound(format!("You have no {} in {}", label, container)));
        }
        let quantity = quantity.unwrap_or(held);
        if quantity > held {
            return Err(HarnessError::Market(format!(
                "You only have {} {} in {}",
                held, label, container
            )));
        }
        if let Some(floor) = min_unit_price {
            if price < floor {
                return Err(HarnessError::Market(format!(
                    "{} sells for ${:.2} each, below your minimum of ${:.2}",
                    label, price, floor
                )));
            }
        }
        let account_name = self.account_for(actor, account, &*hooks)?;
        hooks.remove(at, &id, quantity)?;
        let total = price * quantity as f64;
        self.account_mut(&account_name)?.money += total;
        let ware = self.ware_mut(&id)?;
        ware.stock = ware.stock.saturating_add(quantity);
        Ok(format!("Sold {} {} for ${:.2}", quantity, label, total))
    }

    fn sell_all(
        &mut self,
        actor: PlayerId,
        container: ContainerId,
        account: Option<&str>,
        hooks: &mut dyn HarnessHooks,
    ) -> HarnessResult<String> {
        let at = container.coordinate();
        let account_name = self.account_for(actor, account, &*hooks)?;
        let mut sold_units = 0i64;
        let mut earned = 0.0;
        for (item, qty) in hooks.list_contents(at)? {
            let Some(index) = self.ware_index(&item) else {
                continue;
            };
            let qty = units(qty, &item)?;
            hooks.remove(at, &item, qty)?;
            let ware = &mut self.wares[index];
            ware.stock = ware.stock.saturating_add(qty);
            earned += ware.price * qty as f64;
            sold_units = sold_units.saturating_add(qty);
        }
        if sold_units == 0 {
            return Ok(format!("Nothing in {} could be sold", container));
        }
        self.account_mut(&account_name)?.money += earned;
        Ok(format!("Sold {} items for ${:.2}", sold_units, earned))
    }

    fn print_market(&self) -> String {
        let mut lines = vec![format!("{} wares:", self.wares.len())];
        for w in &self.wares {
            let research = if w.researched { " [researched]" } else { "" };
            lines.push(format!(
                "  {} - ${:.2}, stock {}{}",
                w.label(),
                w.price,
                w.stock,
                research
            ));
        }
        lines.join("\n")
    }
}

impl Market for LocalMarket {
    fn translate_and_grab(&self, id: &str) -> Option<WareInfo> {
        self.ware_index(id).map(|i| {
            let w = &self.wares[i];
            WareInfo {
                id: w.id.clone(),
                alias: w.alias.clone(),
                exists: true,
            }
        })
    }

    fn translate_id(&self, id: &str) -> String {
        self.ware_index(id)
            .map(|i| self.wares[i].id.clone())
            .unwrap_or_default()
    }

    fn research_cost(&self) -> Option<f64> {
        self.config.research_cost
    }

    fn save_wares(&mut self) -> HarnessResult<()> {
        write_snapshot(&self.data_path(WARES_FILE), &self.wares)
    }

    fn save_accounts(&mut self) -> HarnessResult<()> {
        let file = AccountsFile {
            accounts: self.accounts.clone(),
            defaults: self.defaults.clone(),
        };
        write_snapshot(&self.data_path(ACCOUNTS_FILE), &file)
    }

    fn reload(&mut self, scope: ReloadScope) -> HarnessResult<()> {
        let before = (
            self.config.clone(),
            self.wares.clone(),
            self.accounts.clone(),
            self.defaults.clone(),
        );
        let result = self.reload_scope(scope);
        if let Err(e) = &result {
            warn!("Reload of {:?} failed, keeping previous state: {}", scope, e);
            (self.config, self.wares, self.accounts, self.defaults) = before;
        }
        result
    }

    fn execute(
        &mut self,
        actor: PlayerId,
        request: MarketRequest,
        hooks: &mut dyn HarnessHooks,
    ) -> HarnessResult<String> {
        match request {
            MarketRequest::Buy {
                ware,
                quantity,
                max_unit_price,
                account,
                container,
            } => self.buy(actor, &ware, quantity, max_unit_price, account.as_deref(), container, hooks),
            MarketRequest::Sell {
                ware,
                quantity,
                min_unit_price,
                account,
                container,
            } => self.sell(actor, &ware, quantity, min_unit_price, account.as_deref(), container, hooks),
            MarketRequest::Check { ware, quantity } => {
                let w = self.ware_mut(&ware)?;
                let mut line = format!("{}: ${:.2} each, {} in stock", w.label(), w.price, w.stock);
                if quantity > 1 {
                    line.push_str(&format!(
                        "; {} would cost ${:.2}",
                        quantity,
                        w.price * quantity as f64
                    ));
                }
                Ok(line)
            }
            MarketRequest::SellAll { container, account } => {
                self.sell_all(actor, container, account.as_deref(), hooks)
            }
            MarketRequest::Money { account } => {
                let name = self.account_for(actor, account.as_deref(), &*hooks)?;
                let money = self.account_mut(&name)?.money;
                Ok(format!("Account '{}': ${:.2}", name, money))
            }
            MarketRequest::Send {
                amount,
                recipient,
                sender,
            } => {
                if !self.accounts.contains_key(&recipient) {
                    return Err(HarnessError::NotFound(format!(
                        "Account '{}' does not exist",
                        recipient
                    )));
                }
                let from = self.account_for(actor, sender.as_deref(), &*hooks)?;
                if from == recipient {
                    return Err(HarnessError::Market("Cannot send money to the same account".to_string()));
                }
                let source = self.account_mut(&from)?;
                if source.money < amount {
                    return Err(HarnessError::Market(format!(
                        "Insufficient funds: account '{}' holds ${:.2}",
                        from, source.money
                    )));
                }
                source.money -= amount;
                self.account_mut(&recipient)?.money += amount;
                Ok(format!("Sent ${:.2} from '{}' to '{}'", amount, from, recipient))
            }
            MarketRequest::CreateAccount { account } => {
                if self.accounts.contains_key(&account) {
                    return Err(HarnessError::Market(format!("Account '{}' already exists", account)));
                }
                self.accounts.insert(
                    account.clone(),
                    Account {
                        money: 0.0,
                        owners: vec![actor],
                    },
                );
                Ok(format!("Created account '{}'", account))
            }
            MarketRequest::DeleteAccount { account } => {
                self.owned_account_mut(actor, &account, &*hooks)?;
                self.accounts.remove(&account);
                self.defaults.retain(|_, name| *name != account);
                Ok(format!("Deleted account '{}'", account))
            }
            MarketRequest::GrantAccess { player, account } => {
                let target = hooks.resolve_identity(&player);
                let entry = self.owned_account_mut(actor, &account, &*hooks)?;
                if entry.owners.contains(&target) {
                    return Err(HarnessError::Market(format!(
                        "{} already has access to '{}'",
                        player, account
                    )));
                }
                entry.owners.push(target);
                Ok(format!("{} may now use account '{}'", player, account))
            }
            MarketRequest::RevokeAccess { player, account } => {
                let target = hooks.resolve_identity(&player);
                let entry = self.owned_account_mut(actor, &account, &*hooks)?;
                let before = entry.owners.len();
                entry.owners.retain(|o| *o != target);
                if entry.owners.len() == before {
                    return Err(HarnessError::Market(format!(
                        "{} has no access to '{}'",
                        player, account
                    )));
                }
                Ok(format!("{} may no longer use account '{}'", player, account))
            }
            MarketRequest::Research {
                ware,
                max_price,
                account,
            } => {
                let Some(cost) = self.config.research_cost else {
                    return Err(HarnessError::Market("Research is disabled on this market".to_string()));
                };
                let (id, label, researched) = {
                    let w = self.ware_mut(&ware)?;
                    (w.id.clone(), w.label().to_string(), w.researched)
                };
                if researched {
                    return Err(HarnessError::Market(format!("{} is already researched", label)));
                }
                if max_price.is_some_and(|limit| cost > limit) {
                    return Err(HarnessError::Market(format!(
                        "Research costs ${:.2}, above your limit",
                        cost
                    )));
                }
                let name = self.account_for(actor, account.as_deref(), &*hooks)?;
                let acct = self.account_mut(&name)?;
                if acct.money < cost {
                    return Err(HarnessError::Market(format!(
                        "Insufficient funds: research costs ${:.2}",
                        cost
                    )));
                }
                acct.money -= cost;
                self.ware_mut(&id)?.researched = true;
                Ok(format!("Researched {} for ${:.2}", label, cost))
            }
            MarketRequest::AddFunds { amount, account } => {
                let name = self.account_for(actor, account.as_deref(), &*hooks)?;
                let acct = self.account_mut(&name)?;
                acct.money += amount;
                Ok(format!("Account '{}' now holds ${:.2}", name, acct.money))
            }
            MarketRequest::SetFunds { amount, account } => {
                let name = self.account_for(actor, account.as_deref(), &*hooks)?;
                self.account_mut(&name)?.money = amount;
                Ok(format!("Account '{}' now holds ${:.2}", name, amount))
            }
            MarketRequest::ChangeStock { ware, level } => {
                let w = self.ware_mut(&ware)?;
                w.stock = match level {
                    StockLevel::Quantity(q) => q,
                    StockLevel::Equilibrium => w.base_stock,
                    StockLevel::Overstocked => w.base_stock.saturating_mul(2),
                    StockLevel::Understocked => w.base_stock / 2,
                };
                Ok(format!("{} stock set to {}", w.label(), w.stock))
            }
            MarketRequest::SetDefaultAccount { account } => {
                self.owned_account_mut(actor, &account, &*hooks)?;
                self.defaults.insert(actor, account.clone());
                Ok(format!("Default account set to '{}'", account))
            }
            MarketRequest::PrintMarket => Ok(self.print_market()),
        }
    }

    fn shutdown(&mut self) {
        info!("Market shutting down ({} accounts)", self.accounts.len());
    }
}

/// Stored quantity as the signed count trades work in.
fn units(quantity: u64, label: &str) -> HarnessResult<i64> {
    i64::try_from(quantity)
        .map_err(|_| HarnessError::Market(format!("{} {} is more than can be traded", quantity, label)))
}

fn read_snapshot<T: for<'de> Deserialize<'de>>(path: &Path) -> HarnessResult<Option<T>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if let Err(e) = file.lock_shared() {
        warn!("Could not take shared lock on {}: {}", path.display(), e);
    }
    let parsed = serde_json::from_reader(&file);
    let _ = file.unlock();
    Ok(Some(parsed?))
}

fn write_snapshot<T: Serialize>(path: &Path, value: &T) -> HarnessResult<()> {
    let content = serde_json::to_string_pretty(value)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)?;
    lock_file.lock_exclusive()?;

    let base = path.file_name().and_then(|s| s.to_str()).unwrap_or("snapshot.json");
    let tmp_path = dir.join(format!(".{}.tmp-{}", base, std::process::id()));
    {
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        let _ = tmp.sync_all();
    }
    fs::rename(&tmp_path, path)?;
    let _ = lock_file.unlock();
    debug!("Wrote snapshot {}", path.display());
    Ok(())
}
