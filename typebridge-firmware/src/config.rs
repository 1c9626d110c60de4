//! Embedded configuration

use defmt::*;

use typebridge_core::config::toml::parse_config;
use typebridge_core::config::BridgeConfig;

/// Configuration compiled into the firmware
///
/// Edit bridge.toml and rebuild to customize; build.rs validates it.
const EMBEDDED_CONFIG: &str = include_str!("../bridge.toml");

/// Parse the embedded configuration, falling back to defaults
pub fn load() -> BridgeConfig {
    match parse_config(EMBEDDED_CONFIG) {
        Ok(config) => {
            info!("Parsed embedded configuration");
            config
        }
        Err(e) => {
            // Only reachable if build.rs and the parser disagree
            error!("Failed to parse embedded config: {}", e);
            BridgeConfig::default()
        }
    }
}
