//! Built-in command handlers.
//!
//! Harness-owned commands (inventory, give/take, op/deop, save/reload, help)
//! are implemented here in full. Trading commands only parse and check
//! permissions, then hand a [MarketRequest] to the market collaborator.
use log::{info, warn};

use super::registry::{CommandRegistry, Handler};
use super::{Harness, Outcome};
use crate::config::Config;
use crate::errors::{HarnessError, HarnessResult};
use crate::inventory::{format_container, is_direction, resolve_direction, ContainerId, StoreOutcome};
use crate::logutil::escape_log;
use crate::market::{MarketRequest, ReloadScope, StockLevel};

const BUILTINS: &[(&str, &str, Handler)] = &[
    ("help", "help [command]", help),
    ("buy", "buy <ware> <quantity> [max_unit_price] [account] [direction]", buy),
    ("sell", "sell <ware> [quantity] [min_unit_price] [account] [direction]", sell),
    ("check", "check <ware> [quantity]", check),
    ("sellAll", "sellAll [direction] [account]", sell_all),
    ("money", "money [account]", money),
    ("send", "send <quantity> <recipient> [sender]", send),
    ("create", "create <account>", create),
    ("delete", "delete <account>", delete),
    ("grantAccess", "grantAccess <player> <account>", grant_access),
    ("revokeAccess", "revokeAccess <player> <account>", revoke_access),
    ("research", "research <ware> [max_price] [account]", research),
    ("version", "version", version),
    ("save", "save", save),
    ("reload", "reload <config|wares|accounts|all>", reload),
    ("add", "add <quantity> [account]", add_funds),
    ("set", "set <quantity> [account]", set_funds),
    (
        "changeStock",
        "changeStock <ware> <quantity|equilibrium|overstocked|understocked>",
        change_stock,
    ),
    ("setDefaultAccount", "setDefaultAccount <account>", set_default_account),
    ("printMarket", "printMarket", print_market),
    ("op", "op <player>", op),
    ("deop", "deop <player>", deop),
    ("inventory", "inventory [direction]", inventory),
    ("give", "give <ware> [quantity] [direction]", give),
    ("take", "take <ware> [quantity] [direction]", take),
    ("changeName", "changeName <player>", change_name),
    ("stop", "stop", stop),
    ("exit", "exit", stop),
];

pub fn register_builtins(registry: &mut CommandRegistry) {
    for (name, usage, handler) in BUILTINS {
        registry.register(name, usage, *handler);
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

fn usage_of(h: &Harness, name: &str) -> String {
    h.registry().usage(name).unwrap_or(name).to_string()
}

fn arity(h: &Harness, name: &str, args: &[String], min: usize, max: usize) -> HarnessResult<()> {
    if args.len() < min {
        return Err(HarnessError::parse("not enough arguments", usage_of(h, name)));
    }
    if args.len() > max {
        return Err(HarnessError::parse("too many arguments", usage_of(h, name)));
    }
    Ok(())
}

fn parse_quantity(h: &Harness, name: &str, token: &str) -> HarnessResult<i64> {
    token
        .parse::<i64>()
        .map_err(|_| HarnessError::parse(format!("'{}' is not a whole number", token), usage_of(h, name)))
}

fn parse_positive(h: &Harness, name: &str, token: &str) -> HarnessResult<i64> {
    let qty = parse_quantity(h, name, token)?;
    if qty <= 0 {
        return Err(HarnessError::parse("quantity must be greater than zero", usage_of(h, name)));
    }
    Ok(qty)
}

fn parse_amount(h: &Harness, name: &str, token: &str) -> HarnessResult<f64> {
    match token.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(HarnessError::parse(
            format!("'{}' is not a number", token),
            usage_of(h, name),
        )),
    }
}

fn require_operator(h: &Harness, name: &str) -> HarnessResult<()> {
    let actor = &h.session().player_id;
    if h.world().identities.has_permission(actor, None, true) {
        return Ok(());
    }
    warn!(
        "{} refused for non-operator {}",
        name,
        escape_log(&h.session().player_name)
    );
    Err(HarnessError::Permission(format!("{} requires operator rights", name)))
}

/// Optional trailing arguments of the trading commands.
///
/// Direction words pick the container, numbers fill the numeric slots in
/// order, and anything else names the account. Each kind may appear once.
struct TradeOptions {
    numbers: Vec<f64>,
    account: Option<String>,
    container: ContainerId,
}

fn scan_options(h: &Harness, name: &str, tokens: &[String], max_numbers: usize) -> HarnessResult<TradeOptions> {
    let mut options = TradeOptions {
        numbers: Vec::new(),
        account: None,
        container: ContainerId::Local,
    };
    let mut direction_seen = false;
    for token in tokens {
        if is_direction(token) {
            if direction_seen {
                return Err(HarnessError::parse("more than one direction given", usage_of(h, name)));
            }
            options.container = resolve_direction(Some(token))?;
            direction_seen = true;
        } else if let Ok(value) = token.parse::<f64>() {
            if options.numbers.len() == max_numbers || !value.is_finite() {
                return Err(HarnessError::parse(
                    format!("unexpected number '{}'", token),
                    usage_of(h, name),
                ));
            }
            options.numbers.push(value);
        } else {
            if options.account.is_some() {
                return Err(HarnessError::parse(
                    format!("unexpected argument '{}'", token),
                    usage_of(h, name),
                ));
            }
            options.account = Some(token.clone());
        }
    }
    Ok(options)
}

/// Canonical id for a ware name or alias.
fn ware_id(h: &Harness, token: &str) -> HarnessResult<String> {
    let id = h.market().with(|m| Ok(m.translate_id(token)))?;
    if id.is_empty() {
        return Err(HarnessError::NotFound(format!("Unknown ware '{}'", token)));
    }
    Ok(id)
}

fn ware_label(h: &Harness, id: &str) -> String {
    h.market()
        .with(|m| Ok(m.translate_and_grab(id)))
        .ok()
        .flatten()
        .map(|w| w.display_name().to_string())
        .unwrap_or_else(|| id.to_string())
}

fn reply(text: impl Into<String>) -> HarnessResult<Outcome> {
    Ok(Outcome::Reply(text.into()))
}

// ============================================================================
// Harness commands
// ============================================================================

fn help(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "help", args, 0, 1)?;
    match args.first() {
        None => reply(h.help_text()?),
        Some(name) => match h.registry().usage(name) {
            Some(usage) => reply(format!("Usage: {}", usage)),
            None => Err(HarnessError::unknown_command(name)),
        },
    }
}

fn version(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "version", args, 0, 0)?;
    reply(format!("tradebench {}", env!("CARGO_PKG_VERSION")))
}

fn save(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "save", args, 0, 0)?;
    h.save()?;
    info!("Saved on request");
    reply("Saved wares and accounts.")
}

fn reload(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "reload", args, 1, 1)?;
    let scope = ReloadScope::from_token(&args[0]).ok_or_else(|| {
        HarnessError::parse(format!("unknown reload target '{}'", args[0]), usage_of(h, "reload"))
    })?;

    // Parse first, apply last: a failed market reload leaves the old config in place.
    let mut pending = None;
    if scope.includes_config() {
        if let Some(path) = h.config_path().cloned() {
            let path = path.to_string_lossy().to_string();
            let config = Config::load_blocking(&path)
                .map_err(|e| HarnessError::Persistence(format!("{:#}", e)))?;
            pending = Some(config);
        }
    }
    h.market().with(|m| m.reload(scope))?;
    info!("Reloaded {:?}", scope);

    let message = format!("Reloaded {}.", args[0].to_lowercase());
    match pending {
        Some(config) => {
            h.apply_config(config);
            Ok(Outcome::ConfigReloaded(message))
        }
        None => reply(message),
    }
}

fn op(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "op", args, 1, 1)?;
    let id = h.world_mut().identities.resolve(&args[0]);
    if h.world_mut().identities.grant_operator(id) {
        reply(format!("{} is now an operator.", args[0]))
    } else {
        reply(format!("{} is already an operator.", args[0]))
    }
}

fn deop(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "deop", args, 1, 1)?;
    let identities = &mut h.world_mut().identities;
    let id = identities.resolve(&args[0]);
    if !identities.is_operator(&id) {
        return reply(format!("{} is not an operator.", args[0]));
    }
    if identities.operator_count() == 1 {
        return Err(HarnessError::Permission(
            "cannot remove the last operator".to_string(),
        ));
    }
    identities.revoke_operator(&id);
    reply(format!("{} is no longer an operator.", args[0]))
}

fn inventory(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "inventory", args, 0, 1)?;
    let target = resolve_direction(args.first().map(String::as_str))?;
    let market = h.market().clone();
    let lines = format_container(h.world().store.container(target), |id| {
        market
            .with(|m| Ok(m.translate_and_grab(id)))
            .ok()
            .flatten()
            .and_then(|w| w.alias)
    });
    reply(lines.join("\n"))
}

/// Shared argument shape of give/take: `<ware> [quantity] [direction]`.
fn item_args(h: &Harness, name: &str, args: &[String]) -> HarnessResult<(String, Option<i64>, ContainerId)> {
    arity(h, name, args, 1, 3)?;
    let id = ware_id(h, &args[0])?;
    match &args[1..] {
        [] => Ok((id, None, ContainerId::Local)),
        [one] if is_direction(one) => Ok((id, None, resolve_direction(Some(one))?)),
        [qty] => Ok((id, Some(parse_positive(h, name, qty)?), ContainerId::Local)),
        [qty, dir] => Ok((
            id,
            Some(parse_positive(h, name, qty)?),
            resolve_direction(Some(dir))?,
        )),
        _ => Err(HarnessError::parse("too many arguments", usage_of(h, name))),
    }
}

fn give(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    let (id, qty, target) = item_args(h, "give", args)?;
    let outcome = h.world_mut().store.add(target, &id, qty.unwrap_or(1))?;
    let given = match outcome {
        StoreOutcome::Added { quantity, .. } => quantity,
        _ => 0,
    };
    reply(format!("Gave {} {} to {}.", given, ware_label(h, &id), target))
}

fn take(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    let (id, qty, target) = item_args(h, "take", args)?;
    let outcome = h.world_mut().store.remove(target, &id, qty.unwrap_or(0))?;
    let taken = match outcome {
        StoreOutcome::Removed { quantity, .. } => quantity,
        _ => 0,
    };
    reply(format!("Took {} {} from {}.", taken, ware_label(h, &id), target))
}

fn change_name(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "changeName", args, 1, 1)?;
    h.switch_player(&args[0]);
    info!("Session player changed to {}", escape_log(&args[0]));
    reply(format!("You are now playing as {}.", args[0]))
}

fn stop(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "stop", args, 0, 0)?;
    Ok(Outcome::Exit)
}

// ============================================================================
// Trading commands (forwarded to the market)
// ============================================================================

fn buy(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "buy", args, 2, 5)?;
    let quantity = parse_positive(h, "buy", &args[1])?;
    let options = scan_options(h, "buy", &args[2..], 1)?;
    let text = h.execute(MarketRequest::Buy {
        ware: args[0].clone(),
        quantity,
        max_unit_price: options.numbers.first().copied(),
        account: options.account,
        container: options.container,
    })?;
    reply(text)
}

fn sell(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "sell", args, 1, 5)?;
    let options = scan_options(h, "sell", &args[1..], 2)?;
    let quantity = match options.numbers.first() {
        Some(&q) if q.fract() == 0.0 && q > 0.0 => Some(q as i64),
        Some(_) => {
            return Err(HarnessError::parse(
                "quantity must be a whole number greater than zero",
                usage_of(h, "sell"),
            ))
        }
        None => None,
    };
    let text = h.execute(MarketRequest::Sell {
        ware: args[0].clone(),
        quantity,
        min_unit_price: options.numbers.get(1).copied(),
        account: options.account,
        container: options.container,
    })?;
    reply(text)
}

fn check(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "check", args, 1, 2)?;
    let quantity = match args.get(1) {
        Some(token) => parse_positive(h, "check", token)?,
        None => 1,
    };
    let id = ware_id(h, &args[0])?;
    let mut text = h.execute(MarketRequest::Check {
        ware: id.clone(),
        quantity,
    })?;
    if let Some(held) = h.world().store.query(ContainerId::Local, &id) {
        text.push_str(&format!("\nYou hold {} in your inventory.", held));
    }
    reply(text)
}

fn sell_all(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "sellAll", args, 0, 2)?;
    let options = scan_options(h, "sellAll", args, 0)?;
    let text = h.execute(MarketRequest::SellAll {
        container: options.container,
        account: options.account,
    })?;
    reply(text)
}

fn money(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "money", args, 0, 1)?;
    let text = h.execute(MarketRequest::Money {
        account: args.first().cloned(),
    })?;
    reply(text)
}

fn send(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "send", args, 2, 3)?;
    let amount = parse_amount(h, "send", &args[0])?;
    if amount <= 0.0 {
        return Err(HarnessError::parse("amount must be greater than zero", usage_of(h, "send")));
    }
    let text = h.execute(MarketRequest::Send {
        amount,
        recipient: args[1].clone(),
        sender: args.get(2).cloned(),
    })?;
    reply(text)
}

fn create(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "create", args, 1, 1)?;
    let text = h.execute(MarketRequest::CreateAccount {
        account: args[0].clone(),
    })?;
    reply(text)
}

fn delete(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "delete", args, 1, 1)?;
    let text = h.execute(MarketRequest::DeleteAccount {
        account: args[0].clone(),
    })?;
    reply(text)
}

fn grant_access(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "grantAccess", args, 2, 2)?;
    let text = h.execute(MarketRequest::GrantAccess {
        player: args[0].clone(),
        account: args[1].clone(),
    })?;
    reply(text)
}

fn revoke_access(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "revokeAccess", args, 2, 2)?;
    let text = h.execute(MarketRequest::RevokeAccess {
        player: args[0].clone(),
        account: args[1].clone(),
    })?;
    reply(text)
}

fn research(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "research", args, 1, 3)?;
    let (max_price, account) = match &args[1..] {
        [] => (None, None),
        [one] => match one.parse::<f64>() {
            Ok(price) if price.is_finite() => (Some(price), None),
            _ => (None, Some(one.clone())),
        },
        [price, account] => (Some(parse_amount(h, "research", price)?), Some(account.clone())),
        _ => return Err(HarnessError::parse("too many arguments", usage_of(h, "research"))),
    };
    let text = h.execute(MarketRequest::Research {
        ware: args[0].clone(),
        max_price,
        account,
    })?;
    reply(text)
}

fn add_funds(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    require_operator(h, "add")?;
    arity(h, "add", args, 1, 2)?;
    let amount = parse_amount(h, "add", &args[0])?;
    let text = h.execute(MarketRequest::AddFunds {
        amount,
        account: args.get(1).cloned(),
    })?;
    reply(text)
}

fn set_funds(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    require_operator(h, "set")?;
    arity(h, "set", args, 1, 2)?;
    let amount = parse_amount(h, "set", &args[0])?;
    let text = h.execute(MarketRequest::SetFunds {
        amount,
        account: args.get(1).cloned(),
    })?;
    reply(text)
}

fn change_stock(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    require_operator(h, "changeStock")?;
    arity(h, "changeStock", args, 2, 2)?;
    let level = StockLevel::from_token(&args[1]).ok_or_else(|| {
        HarnessError::parse(
            format!("'{}' is not a quantity or stock level", args[1]),
            usage_of(h, "changeStock"),
        )
    })?;
    let text = h.execute(MarketRequest::ChangeStock {
        ware: args[0].clone(),
        level,
    })?;
    reply(text)
}

fn set_default_account(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    arity(h, "setDefaultAccount", args, 1, 1)?;
    let text = h.execute(MarketRequest::SetDefaultAccount {
        account: args[0].clone(),
    })?;
    reply(text)
}

fn print_market(h: &mut Harness, args: &[String]) -> HarnessResult<Outcome> {
    require_operator(h, "printMarket")?;
    arity(h, "printMarket", args, 0, 0)?;
    reply(h.execute(MarketRequest::PrintMarket)?)
}
