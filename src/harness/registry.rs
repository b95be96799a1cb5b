/// Name → handler table plus the input normalization that runs before lookup.
use std::collections::HashMap;

use super::{Harness, Outcome};
use crate::errors::HarnessResult;

/// Every command handler has this shape; aliases share the same fn pointer.
pub type Handler = fn(&mut Harness, &[String]) -> HarnessResult<Outcome>;

#[derive(Clone)]
struct Entry {
    handler: Handler,
    usage: String,
}

#[derive(Clone, Default)]
pub struct CommandRegistry {
    entries: HashMap<String, Entry>,
    prefixes: Vec<char>,
    namespaces: Vec<String>,
}

impl CommandRegistry {
    pub fn new(prefixes: &[String], namespaces: &[String]) -> Self {
        let mut registry = Self::default();
        registry.set_prefixes(prefixes, namespaces);
        registry
    }

    /// Replace the prefix characters and namespace tokens, e.g. after `reload config`.
    pub fn set_prefixes(&mut self, prefixes: &[String], namespaces: &[String]) {
        self.prefixes = prefixes.iter().filter_map(|p| p.chars().next()).collect();
        self.namespaces = namespaces.iter().map(|n| n.to_lowercase()).collect();
    }

    /// Bind `name` to `handler`. An existing binding is replaced silently.
    pub fn register(&mut self, name: &str, usage: &str, handler: Handler) {
        let entry = Entry {
            handler,
            usage: usage.to_string(),
        };
        self.entries.insert(name.to_string(), entry);
    }

    pub fn lookup(&self, name: &str) -> Option<Handler> {
        self.entries.get(name).map(|e| e.handler)
    }

    pub fn usage(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|e| e.usage.as_str())
    }

    /// Split off the command name from already-tokenized input.
    ///
    /// Strips one leading prefix character, then drops a namespace token.
    /// Returns `None` when nothing is left to dispatch.
    pub fn normalize<'a>(&self, tokens: &'a [String]) -> Option<(String, &'a [String])> {
        let (first, mut rest) = tokens.split_first()?;
        let mut name = self.strip_prefix(first);

        if self.is_namespace(name) {
            let (next, tail) = rest.split_first()?;
            name = self.strip_prefix(next);
            rest = tail;
        }

        if name.is_empty() {
            return None;
        }
        Some((name.to_string(), rest))
    }

    fn strip_prefix<'a>(&self, token: &'a str) -> &'a str {
        match token.chars().next() {
            Some(c) if self.prefixes.contains(&c) => &token[c.len_utf8()..],
            _ => token,
        }
    }

    fn is_namespace(&self, token: &str) -> bool {
        !token.is_empty() && self.namespaces.iter().any(|ns| ns.eq_ignore_ascii_case(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CommandRegistry {
        CommandRegistry::new(
            &["/".to_string()],
            &["commandeconomy".to_string(), "ce".to_string()],
        )
    }

    fn tokens(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    fn noop(_: &mut Harness, _: &[String]) -> HarnessResult<Outcome> {
        Ok(Outcome::Idle)
    }

    #[test]
    fn prefix_and_namespace_are_stripped() {
        let reg = registry();
        let line = tokens("/ce buy wood 3");
        let (name, rest) = reg.normalize(&line).unwrap();
        assert_eq!(name, "buy");
        assert_eq!(rest, &["wood".to_string(), "3".to_string()]);

        let line = tokens("CommandEconomy /money");
        let (name, rest) = reg.normalize(&line).unwrap();
        assert_eq!(name, "money");
        assert!(rest.is_empty());
    }

    #[test]
    fn empty_input_is_a_noop() {
        let reg = registry();
        assert!(reg.normalize(&tokens("")).is_none());
        assert!(reg.normalize(&tokens("   ")).is_none());
        assert!(reg.normalize(&tokens("ce")).is_none());
        assert!(reg.normalize(&tokens("/")).is_none());
    }

    #[test]
    fn unknown_prefix_is_kept() {
        let reg = registry();
        let line = tokens("!buy");
        assert_eq!(reg.normalize(&line).unwrap().0, "!buy");
    }

    #[test]
    fn last_registration_wins() {
        let mut reg = registry();
        reg.register("go", "go", noop);
        reg.register("walk", "walk", noop);
        reg.register("go", "go again", noop);
        assert_eq!(reg.usage("go"), Some("go again"));
        assert!(reg.lookup("walk").is_some());
        assert!(reg.lookup("Go").is_none());
    }
}
