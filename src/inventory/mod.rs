//! Simulated spatial inventories.
//!
//! Seven containers stand in for a host game's inventories: the player's own and
//! one on each face of the block the player occupies. [route] turns direction
//! tokens and offsets into a [ContainerId]; [store] owns the contents and their
//! capacity rules.

pub mod route;
pub mod store;

pub use route::{
    is_direction, resolve_container, resolve_coordinate, resolve_direction, ContainerId,
    Coordinate,
};
pub use store::{Container, ContainerStore, ItemStack, StoreOutcome, MAX_STACK};

/// Render a container for the `inventory` command.
///
/// `alias_of` maps an item id to a display alias when the market knows one.
pub fn format_container(
    container: &Container,
    alias_of: impl Fn(&str) -> Option<String>,
) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({}/{} slots used):",
        capitalize(&container.id().to_string()),
        container.len(),
        container.capacity()
    )];
    if container.is_empty() {
        lines.push("  Empty".to_string());
        return lines;
    }
    for (item, qty) in container.iter() {
        match alias_of(item) {
            Some(alias) if alias != item => lines.push(format!("  {} ({}): {}", alias, item, qty)),
            _ => lines.push(format!("  {}: {}", item, qty)),
        }
    }
    lines
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_container_listing() {
        let c = Container::new(ContainerId::Up, 5);
        let lines = format_container(&c, |_| None);
        assert_eq!(lines, vec!["The up inventory (0/5 slots used):", "  Empty"]);
    }

    #[test]
    fn listing_prefers_alias() {
        let mut c = Container::new(ContainerId::Local, 5);
        c.add("minecraft:planks", 3).unwrap();
        c.add("flint", 1).unwrap();
        let lines = format_container(&c, |id| match id {
            "minecraft:planks" => Some("wood".to_string()),
            _ => None,
        });
        assert_eq!(lines[0], "Your inventory (2/5 slots used):");
        assert_eq!(lines[1], "  wood (minecraft:planks): 3");
        assert_eq!(lines[2], "  flint: 1");
    }
}
