//! Test utilities & fixtures.
//! Builds a harness whose market snapshots live in a throwaway directory.

use tempfile::TempDir;
use tradebench::config::Config;
use tradebench::harness::{Harness, Outcome};
use tradebench::market::{LocalMarket, SharedMarket};

/// Default config pointed at a fresh temp data dir. Keep the `TempDir` alive.
pub fn test_config() -> (Config, TempDir) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut config = Config::default();
    config.market.data_dir = tmp.path().to_string_lossy().to_string();
    config.logging.file = None;
    (config, tmp)
}

pub fn harness_with(config: Config) -> Harness {
    let market = LocalMarket::open(config.market.clone(), None).expect("market");
    Harness::new(config, None, SharedMarket::new(market))
}

#[allow(dead_code)] // Not every test binary dispatches directly.
pub fn reply(outcome: Outcome) -> String {
    match outcome {
        Outcome::Reply(text) => text,
        other => panic!("expected a reply, got {:?}", other),
    }
}
