//! Memoized `help` output.
//!
//! The text only changes with the research flag, so it is rendered once and
//! reused until the flag flips.

const GENERAL: &[(&str, &str)] = &[
    ("help [command]", "list commands or show one command's usage"),
    ("buy <ware> <quantity> [max_unit_price] [account] [direction]", "purchase a ware"),
    ("sell <ware> [quantity] [min_unit_price] [account] [direction]", "sell a ware"),
    ("check <ware> [quantity]", "current price and stock"),
    ("sellAll [direction] [account]", "sell everything the market accepts"),
    ("money [account]", "account balance"),
    ("send <quantity> <recipient> [sender]", "transfer money between accounts"),
    ("create <account>", "open a new account"),
    ("delete <account>", "close an account you own"),
    ("grantAccess <player> <account>", "let a player use an account"),
    ("revokeAccess <player> <account>", "withdraw a player's access"),
    ("setDefaultAccount <account>", "account used when none is given"),
    ("version", "print the harness version"),
];

const RESEARCH: &[(&str, &str)] = &[
    ("research <ware> [max_price] [account]", "pay to study a ware"),
];

const SESSION: &[(&str, &str)] = &[
    ("inventory [direction]", "list a container"),
    ("give <ware> [quantity] [direction]", "put items into a container"),
    ("take <ware> [quantity] [direction]", "remove items; no quantity takes all"),
    ("changeName <player>", "play as someone else"),
    ("save", "save wares and accounts"),
    ("reload <config|wares|accounts|all>", "reload from disk"),
    ("stop | exit", "leave the harness"),
];

const OPERATOR: &[(&str, &str)] = &[
    ("add <quantity> [account]", "add money"),
    ("set <quantity> [account]", "set a balance"),
    ("changeStock <ware> <quantity|equilibrium|overstocked|understocked>", "adjust stock"),
    ("printMarket", "list every ware"),
    ("op <player> | deop <player>", "grant or revoke operator rights"),
];

#[derive(Debug, Default)]
pub struct HelpCache {
    rendered: String,
    research_snapshot: Option<bool>,
    renders: u64,
}

impl HelpCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current help text, regenerated only when empty or when the flag changed.
    pub fn render(&mut self, research_enabled: bool) -> &str {
        if self.rendered.is_empty() || self.research_snapshot != Some(research_enabled) {
            self.rendered = build(research_enabled);
            self.research_snapshot = Some(research_enabled);
            self.renders += 1;
        }
        &self.rendered
    }

    /// How many times the text has been rebuilt.
    pub fn renders(&self) -> u64 {
        self.renders
    }
}

fn build(research_enabled: bool) -> String {
    let mut out = String::from("Commands:\n");
    push_block(&mut out, GENERAL);
    if research_enabled {
        push_block(&mut out, RESEARCH);
    }
    push_block(&mut out, SESSION);
    out.push_str("Operator commands:\n");
    push_block(&mut out, OPERATOR);
    out.push_str("Directions: none, up, down, north, east, west, south (or u/d/n/e/w/s)");
    out
}

fn push_block(out: &mut String, block: &[(&str, &str)]) {
    for (usage, summary) in block {
        out.push_str(&format!("  {} - {}\n", usage, summary));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_once_per_flag_value() {
        let mut cache = HelpCache::new();
        let first = cache.render(false).to_string();
        assert!(!first.contains("research"));
        cache.render(false);
        assert_eq!(cache.renders(), 1);

        let with_research = cache.render(true).to_string();
        assert!(with_research.contains("research <ware>"));
        assert_eq!(cache.renders(), 2);
        cache.render(true);
        assert_eq!(cache.renders(), 2);
    }

    #[test]
    fn research_block_sits_after_general_commands() {
        let text = build(true);
        let version = text.find("version").unwrap();
        let research = text.find("research").unwrap();
        let inventory = text.find("inventory [direction]").unwrap();
        assert!(version < research && research < inventory);
    }
}
