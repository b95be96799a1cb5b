/// Dispatch end to end: normalization, routing and capacity through the command surface
mod common;

use common::{harness_with, reply, test_config};
use tradebench::errors::HarnessError;
use tradebench::harness::Outcome;
use tradebench::inventory::{resolve_container, resolve_coordinate, ContainerId, Coordinate};

fn snapshot(h: &tradebench::harness::Harness) -> Vec<Vec<(String, u64)>> {
    ContainerId::ALL
        .iter()
        .map(|id| h.world().store.enumerate(*id))
        .collect()
}

#[test]
fn unknown_command_leaves_containers_untouched() {
    let (config, _tmp) = test_config();
    let mut h = harness_with(config);
    h.dispatch("give wood 2 east");
    let before = snapshot(&h);

    match h.dispatch("frobnicate wood 5") {
        Outcome::Error(e) => {
            assert_eq!(
                e.to_string(),
                "Unknown command 'frobnicate'. Type 'help' for a list of commands."
            );
        }
        other => panic!("expected unknown-command error, got {:?}", other),
    }
    assert_eq!(snapshot(&h), before);
}

#[test]
fn blank_and_bare_namespace_lines_are_idle() {
    let (config, _tmp) = test_config();
    let mut h = harness_with(config);
    assert_eq!(h.dispatch(""), Outcome::Idle);
    assert_eq!(h.dispatch("   \t"), Outcome::Idle);
    assert_eq!(h.dispatch("ce"), Outcome::Idle);
    assert_eq!(h.dispatch("/commandeconomy"), Outcome::Idle);
}

#[test]
fn prefixed_and_namespaced_forms_reach_the_same_handler() {
    let (config, _tmp) = test_config();
    let mut h = harness_with(config);
    for line in ["give stone 1", "/give stone 1", "ce give stone 1", "/CE give stone 1"] {
        reply(h.dispatch(line));
    }
    assert_eq!(
        h.world().store.query(ContainerId::Local, "minecraft:cobblestone"),
        Some(4)
    );
}

#[test]
fn every_direction_routes_to_its_own_container() {
    let (config, _tmp) = test_config();
    let mut h = harness_with(config);
    for (n, dir) in ["none", "up", "down", "north", "east", "west", "south"]
        .iter()
        .enumerate()
    {
        reply(h.dispatch(&format!("give apple {} {}", n + 1, dir)));
    }
    for (n, id) in ContainerId::ALL.iter().enumerate() {
        assert_eq!(
            h.world().store.query(*id, "minecraft:apple"),
            Some(n as u64 + 1),
            "{} holds the wrong amount",
            id
        );
    }
}

#[test]
fn router_bijection_and_rejects() {
    let mut seen = Vec::new();
    for token in ["self", "up", "down", "north", "east", "west", "south"] {
        let coordinate = resolve_coordinate(token).unwrap();
        let container = resolve_container(Some(coordinate)).unwrap();
        assert!(!seen.contains(&container));
        seen.push(container);
    }
    assert_eq!(resolve_coordinate("up").unwrap(), Coordinate::new(0, 1, 0));
    assert!(matches!(resolve_coordinate("sideways"), Err(HarnessError::Routing(_))));
    assert!(resolve_container(Some(Coordinate::new(1, 1, 0))).is_err());
    assert_eq!(resolve_container(None).unwrap(), ContainerId::Local);
}

#[test]
fn full_container_rejects_new_ware_through_give() {
    let (mut config, _tmp) = test_config();
    config.inventory.neighbor_capacity = 2;
    let mut h = harness_with(config);

    reply(h.dispatch("give wood 1 w"));
    reply(h.dispatch("give stone 1 w"));
    match h.dispatch("give iron 1 w") {
        Outcome::Error(HarnessError::Capacity { capacity, .. }) => assert_eq!(capacity, 2),
        other => panic!("expected capacity error, got {:?}", other),
    }
    reply(h.dispatch("give wood 3 w"));
    assert_eq!(h.world().store.query(ContainerId::West, "minecraft:planks"), Some(4));
    assert_eq!(h.world().store.query(ContainerId::West, "minecraft:iron_ingot"), None);
}

#[test]
fn inventory_listing_shows_aliases() {
    let (config, _tmp) = test_config();
    let mut h = harness_with(config);
    h.dispatch("give wood 3");
    h.dispatch("give apple 1");
    let text = reply(h.dispatch("inventory"));
    assert_eq!(
        text,
        "Your inventory (2/36 slots used):\n  wood (minecraft:planks): 3\n  minecraft:apple: 1"
    );
    assert_eq!(
        reply(h.dispatch("inventory down")),
        "The down inventory (0/27 slots used):\n  Empty"
    );
}

#[test]
fn buy_and_sell_move_stock_between_market_and_containers() {
    let (config, _tmp) = test_config();
    let mut h = harness_with(config);

    reply(h.dispatch("buy iron 2 north"));
    assert_eq!(h.world().store.query(ContainerId::North, "minecraft:iron_ingot"), Some(2));
    assert_eq!(reply(h.dispatch("money")), "Account 'John_Doe': $76.00");

    assert_eq!(reply(h.dispatch("sell iron n")), "Sold 2 iron for $24.00");
    assert_eq!(h.world().store.query(ContainerId::North, "minecraft:iron_ingot"), None);
    assert_eq!(reply(h.dispatch("money")), "Account 'John_Doe': $100.00");
}

#[test]
fn buy_beyond_funds_is_a_market_error() {
    let (config, _tmp) = test_config();
    let mut h = harness_with(config);
    match h.dispatch("buy iron 100") {
        Outcome::Error(HarnessError::Market(msg)) => assert!(msg.starts_with("Insufficient funds")),
        other => panic!("expected market refusal, got {:?}", other),
    }
    assert!(h.world().store.container(ContainerId::Local).is_empty());
}
