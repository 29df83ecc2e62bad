use serde::Deserialize;
use std::env;

use linehaul_dispatch::models::DispatchSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_delay_code")]
    pub default_delay_code: String,
    #[serde(default = "default_delay_description")]
    pub default_delay_description: String,
    #[serde(default = "default_delay_incidents_enabled")]
    pub delay_incidents_enabled: bool,
}

fn default_delay_code() -> String {
    "LATE".into()
}

fn default_delay_description() -> String {
    "Arrived after the appointment window".into()
}

fn default_delay_incidents_enabled() -> bool {
    true
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .set_default("business_rules.default_delay_code", default_delay_code())?
            .set_default(
                "business_rules.default_delay_description",
                default_delay_description(),
            )?
            .set_default(
                "business_rules.delay_incidents_enabled",
                default_delay_incidents_enabled(),
            )?
            // Optional configuration files, development first
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `LINEHAUL_BUSINESS_RULES__DEFAULT_DELAY_CODE=WTHR`
            .add_source(config::Environment::with_prefix("LINEHAUL").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            default_delay_code: self.business_rules.default_delay_code.to_uppercase(),
            default_delay_description: self.business_rules.default_delay_description.clone(),
            delay_incidents_enabled: self.business_rules.delay_incidents_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_falls_back_to_defaults() {
        let config = Config::load().unwrap();
        assert_eq!(config.business_rules.default_delay_code, "LATE");
        assert!(config.business_rules.delay_incidents_enabled);
    }

    #[test]
    fn test_dispatch_settings_uppercases_the_delay_code() {
        let config = Config {
            business_rules: BusinessRules {
                default_delay_code: "wthr".into(),
                default_delay_description: "Weather hold".into(),
                delay_incidents_enabled: false,
            },
        };
        let settings = config.dispatch_settings();
        assert_eq!(settings.default_delay_code, "WTHR");
        assert!(!settings.delay_incidents_enabled);
    }
}
