/// Scripted REPL sessions driven through tokio-test's mock reader
mod common;

use std::path::PathBuf;
use std::time::Duration;

use common::{harness_with, test_config};
use tokio::io::BufReader;
use tokio_test::io::Builder;
use tradebench::config::{Config, SaveOnExit};
use tradebench::harness::{Harness, Repl};
use tradebench::market::{LocalMarket, SharedMarket};

async fn run_script(repl: &mut Repl, lines: &[&str]) -> String {
    let mut builder = Builder::new();
    for line in lines {
        builder.read(line.as_bytes());
    }
    let input = BufReader::new(builder.build());
    let mut out = Vec::new();
    repl.run(input, &mut out).await.expect("repl run");
    String::from_utf8(out).expect("utf8 output")
}

#[tokio::test]
async fn exit_prompts_and_saves() {
    let (config, tmp) = test_config();
    let mut repl = Repl::new(harness_with(config));

    let out = run_script(&mut repl, &["give wood 3\n", "inventory\n", "exit\n", "y\n"]).await;
    assert_eq!(
        out,
        "Gave 3 wood to your inventory.\n\
         Your inventory (1/36 slots used):\n  wood (minecraft:planks): 3\n\
         Save before exiting? (y/n) Saved.\n"
    );
    assert!(tmp.path().join("wares.json").exists());
    assert!(tmp.path().join("accounts.json").exists());
    assert!(!repl.pulse().is_running());
}

#[tokio::test]
async fn declining_the_prompt_skips_the_save() {
    let (mut config, tmp) = test_config();
    config.autosave.enabled = false;
    let mut repl = Repl::new(harness_with(config));

    let out = run_script(&mut repl, &["/ce stop\n", "n\n"]).await;
    assert_eq!(out, "Save before exiting? (y/n) ");
    assert!(!tmp.path().join("wares.json").exists());
}

#[tokio::test]
async fn end_of_input_exits_without_prompting() {
    let (mut config, tmp) = test_config();
    config.autosave.enabled = false;
    let mut repl = Repl::new(harness_with(config));

    let out = run_script(&mut repl, &["fly away\n", "give apple\n"]).await;
    assert_eq!(
        out,
        "Unknown command 'fly'. Type 'help' for a list of commands.\n\
         Gave 1 minecraft:apple to your inventory.\n"
    );
    assert!(!tmp.path().join("accounts.json").exists());
}

#[tokio::test]
async fn save_on_exit_always_needs_no_answer() {
    let (mut config, tmp) = test_config();
    config.autosave.enabled = false;
    config.autosave.save_on_exit = SaveOnExit::Always;
    let mut repl = Repl::new(harness_with(config));

    let out = run_script(&mut repl, &["money\n"]).await;
    assert_eq!(out, "Account 'John_Doe': $100.00\nSaved.\n");
    assert!(tmp.path().join("accounts.json").exists());
}

#[tokio::test]
async fn interactive_sessions_print_the_prompt() {
    let (mut config, _tmp) = test_config();
    config.autosave.enabled = false;
    config.autosave.save_on_exit = SaveOnExit::Never;
    let mut repl = Repl::new(harness_with(config)).interactive(true);

    let out = run_script(&mut repl, &["\n", "version\n"]).await;
    assert_eq!(out, format!("> > tradebench {}\n> ", env!("CARGO_PKG_VERSION")));
}

/// Repl whose harness re-reads `on_disk` from a config file on `reload config`.
fn repl_with_config_file(config: Config, on_disk: &Config, tmp: &tempfile::TempDir) -> Repl {
    let path: PathBuf = tmp.path().join("config.toml");
    std::fs::write(&path, toml::to_string_pretty(on_disk).unwrap()).unwrap();
    let market = LocalMarket::open(config.market.clone(), Some(path.clone())).unwrap();
    Repl::new(Harness::new(config, Some(path), SharedMarket::new(market)))
}

#[tokio::test]
async fn reload_config_applies_new_namespaces() {
    let (mut config, tmp) = test_config();
    config.autosave.enabled = false;
    config.autosave.save_on_exit = SaveOnExit::Never;
    let mut on_disk = config.clone();
    on_disk.harness.namespaces = vec!["eco".to_string()];
    let mut repl = repl_with_config_file(config, &on_disk, &tmp);

    let out = run_script(&mut repl, &["reload config\n", "eco give stone 2\n"]).await;
    assert_eq!(out, "Reloaded config.\nGave 2 stone to your inventory.\n");
    assert_eq!(repl.harness().config().harness.namespaces, vec!["eco"]);
}

#[tokio::test]
async fn reload_config_restarts_autosave_with_the_new_interval() {
    let (mut config, tmp) = test_config();
    config.autosave.enabled = true;
    config.autosave.interval_secs = 60;
    let mut on_disk = config.clone();
    on_disk.autosave.interval_secs = 600;
    let mut repl = repl_with_config_file(config, &on_disk, &tmp);

    assert!(repl.start_autosave());
    assert_eq!(repl.pulse().interval(), Some(Duration::from_secs(60)));

    let mut out = Vec::new();
    assert!(!repl.process_line("reload config", &mut out).await.unwrap());
    assert_eq!(String::from_utf8(out).unwrap(), "Reloaded config.\n");
    assert!(repl.pulse().is_running());
    assert_eq!(repl.pulse().interval(), Some(Duration::from_secs(600)));

    assert!(repl.process_line("exit", &mut Vec::new()).await.unwrap());
}

#[tokio::test]
async fn reload_config_can_turn_autosave_off() {
    let (mut config, tmp) = test_config();
    config.autosave.enabled = true;
    let mut on_disk = config.clone();
    on_disk.autosave.enabled = false;
    let mut repl = repl_with_config_file(config, &on_disk, &tmp);

    assert!(repl.start_autosave());
    assert!(repl.pulse().is_running());

    repl.process_line("reload all", &mut Vec::new()).await.unwrap();
    assert!(!repl.pulse().is_running());
    assert_eq!(repl.pulse().interval(), None);
    assert!(!repl.harness().config().autosave.enabled);
}

#[test]
fn config_round_trip_keeps_namespaces() {
    let mut config = Config::default();
    config.harness.namespaces = vec!["eco".to_string()];
    let parsed: Config = toml::from_str(&toml::to_string_pretty(&config).unwrap()).unwrap();
    assert_eq!(parsed.harness.namespaces, vec!["eco"]);
}
