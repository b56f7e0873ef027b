use clap::Subcommand;
use serde_json::json;
use wholesecond_core::{Config, RewardTable, SettingsSource};

use super::print_json;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "game.attempts_per_session", "player.default_id")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
    /// Reset config to defaults
    Reset,
    /// Report values that will be replaced by defaults, and reward band gaps/overlaps
    Check,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(format!("unknown key: {key}").into()),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            println!("ok");
        }
        ConfigAction::List => {
            let config = Config::load()?;
            print_json(&config)?;
        }
        ConfigAction::Reset => {
            let config = Config::default();
            config.save()?;
            println!("config reset to defaults");
        }
        ConfigAction::Check => {
            let unreadable = Config::unreadable_fields(&Config::path()?)?;
            let config = Config::load()?;
            print_json(&check(&config, unreadable))?;
        }
    }
    Ok(())
}

fn check(config: &Config, unreadable: Vec<String>) -> serde_json::Value {
    let mut warnings: Vec<String> = unreadable
        .into_iter()
        .map(|problem| format!("{problem}; the default is used"))
        .collect();
    if config.default_player_id().is_none() {
        warnings.push("player.default_id is not set; commands need --player".to_string());
    }
    if config.game.attempts_per_session == 0 {
        warnings.push("game.attempts_per_session is 0; the default is used".to_string());
    }
    if config.game.cooldown_minutes == 0 {
        warnings.push("game.cooldown_minutes is 0; the default is used".to_string());
    }
    if config.game.reward_bands.is_empty() {
        warnings.push("game.reward_bands is empty; the default table is used".to_string());
    }

    let table = RewardTable::new(&config.game.reward_bands);
    let gaps = table.gaps();
    let overlaps = table.overlaps();
    for gap in &gaps {
        let upper = gap.to.map_or_else(|| "up".to_string(), |to| to.to_string());
        warnings.push(format!("offsets {}..{} match no band and score 0", gap.from, upper));
    }
    for (a, b) in &overlaps {
        warnings.push(format!(
            "band starting at {} shadows band starting at {}",
            a.min, b.min
        ));
    }

    json!({
        "ok": warnings.is_empty(),
        "effective": config.session_settings(),
        "gaps": gaps,
        "overlaps": overlaps,
        "warnings": warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wholesecond_core::RewardBand;

    #[test]
    fn default_config_is_clean() {
        let report = check(&Config::default(), Vec::new());
        assert_eq!(report["ok"], true);
        assert!(report["gaps"].as_array().unwrap().is_empty());
    }

    #[test]
    fn reports_gaps_and_overlaps() {
        let mut config = Config::default();
        config.game.cooldown_minutes = 0;
        config.game.reward_bands = vec![
            RewardBand::new(0, Some(10), 5),
            RewardBand::new(5, Some(20), 3),
            RewardBand::new(30, Some(40), 1),
        ];
        let report = check(&config, Vec::new());
        assert_eq!(report["ok"], false);
        assert_eq!(report["gaps"].as_array().unwrap().len(), 2);
        assert_eq!(report["overlaps"].as_array().unwrap().len(), 1);
        assert_eq!(report["effective"]["cooldown_minutes"], 60);
    }

    #[test]
    fn unreadable_fields_and_missing_player_are_reported() {
        let mut config = Config::default();
        config.player.default_id = String::new();
        let report = check(
            &config,
            vec!["game.cooldown_minutes: invalid value".to_string()],
        );
        assert_eq!(report["ok"], false);
        let warnings: Vec<&str> = report["warnings"]
            .as_array()
            .unwrap()
            .iter()
            .map(|w| w.as_str().unwrap())
            .collect();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].starts_with("game.cooldown_minutes"));
        assert!(warnings[1].contains("--player"));
    }
}
