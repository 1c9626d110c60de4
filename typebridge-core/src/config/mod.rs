//! Bridge configuration
//!
//! One structure per concern, gathered in [`BridgeConfig`]. The firmware
//! embeds `bridge.toml` and parses it with [`toml::parse_config`] at boot;
//! every key is optional and falls back to the defaults below.

pub mod toml;

use heapless::String;

pub use crate::keyboard::ScannerConfig;
pub use crate::link::{LinkConfig, ResetPolicy};
pub use crate::session::SessionConfig;

/// Maximum SSID length (802.11)
pub const MAX_SSID_LEN: usize = 32;
/// Maximum WPA2 passphrase length
pub const MAX_PASSWORD_LEN: usize = 64;

/// Wi-Fi credentials and listening port
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NetworkConfig {
    pub ssid: String<MAX_SSID_LEN>,
    /// Empty for an open network
    pub password: String<MAX_PASSWORD_LEN>,
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            password: String::new(),
            port: 80,
        }
    }
}

impl NetworkConfig {
    /// Whether credentials are present to join a network
    pub fn is_configured(&self) -> bool {
        !self.ssid.is_empty()
    }

    /// Whether the network needs a passphrase
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

/// Complete bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BridgeConfig {
    pub network: NetworkConfig,
    pub link: LinkConfig,
    pub keyboard: ScannerConfig,
    pub session: SessionConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use typebridge_protocol::InboundMode;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.network.port, 80);
        assert!(!config.network.is_configured());
        assert!(config.network.is_open());
        assert_eq!(config.link.handshake_timeout_us, 500_000);
        assert_eq!(config.link.reset_policy, ResetPolicy::Always);
        assert_eq!(config.keyboard.settle_us, 0);
        assert_eq!(config.session.mode, InboundMode::Explicit);
    }
}
