use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, Default)]
pub enum ToggleSetting {
    Explicit(bool),
    #[default]
    Inherit,
}

impl ToggleSetting {
    pub fn explicit_or(self, default: bool) -> bool {
        match self {
            ToggleSetting::Explicit(value) => value,
            ToggleSetting::Inherit => default,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, Default)]
pub enum NetShieldMode {
    Disabled,
    #[default]
    BlockMalware,
    BlockAdsTrackersMalware,
}

impl NetShieldMode {
    pub fn toggled(self) -> Self {
        match self {
            NetShieldMode::Disabled => NetShieldMode::BlockAdsTrackersMalware,
            _ => NetShieldMode::Disabled,
        }
    }

    pub fn is_enabled(self) -> bool {
        self != NetShieldMode::Disabled
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, Default)]
pub enum TunnelKind {
    #[default]
    Smart,
    WireGuard,
    OpenVpn,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Transport {
    Udp,
    Tcp,
    Tls,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, Default)]
pub struct ProtocolSelection {
    pub kind: TunnelKind,
    pub transport: Option<Transport>,
}

impl ProtocolSelection {
    pub fn new(kind: TunnelKind, transport: Option<Transport>) -> Self {
        Self { kind, transport }
    }

    pub fn smart() -> Self {
        Self::default()
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, Default)]
pub struct CustomDnsSettings {
    pub enabled: bool,
    pub addresses: Vec<String>,
}

impl CustomDnsSettings {
    pub fn effective_addresses(&self) -> Vec<String> {
        if self.enabled {
            self.addresses.clone()
        } else {
            Vec::new()
        }
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub protocol: ProtocolSelection,
    pub netshield: NetShieldMode,
    pub randomized_nat: bool,
    pub lan_connections: bool,
    pub custom_dns: CustomDnsSettings,
    pub vpn_accelerator: ToggleSetting,
    pub safe_mode: ToggleSetting,
    pub alt_routing: bool,
    pub telemetry: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            protocol: ProtocolSelection::smart(),
            netshield: NetShieldMode::BlockMalware,
            randomized_nat: true,
            lan_connections: false,
            custom_dns: CustomDnsSettings::default(),
            vpn_accelerator: ToggleSetting::Inherit,
            safe_mode: ToggleSetting::Inherit,
            alt_routing: true,
            telemetry: true,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub vpn_accelerator: bool,
    pub safe_mode: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        // Fallback when the gate has delivered nothing yet: honor the stored
        // accelerator value, keep safe mode off.
        Self {
            vpn_accelerator: true,
            safe_mode: false,
        }
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize, Default)]
pub struct SettingsOverrides {
    pub protocol: Option<ProtocolSelection>,
    pub netshield: Option<NetShieldMode>,
    pub randomized_nat: Option<bool>,
    pub lan_connections: Option<bool>,
    pub custom_dns: Option<CustomDnsSettings>,
    pub vpn_accelerator: Option<bool>,
    pub safe_mode: Option<bool>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct EffectiveSettings {
    pub protocol: ProtocolSelection,
    pub netshield: NetShieldMode,
    pub randomized_nat: bool,
    pub lan_connections: bool,
    pub custom_dns: Vec<String>,
    pub vpn_accelerator: bool,
    pub safe_mode: bool,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, Default)]
pub enum ConnectTarget {
    #[default]
    Fastest,
    Country(String),
    City {
        country: String,
        city: String,
    },
    Server(String),
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ConnectIntent {
    pub target: ConnectTarget,
    pub profile_id: Option<Uuid>,
    pub overrides: Option<SettingsOverrides>,
}

impl ConnectIntent {
    pub fn fastest() -> Self {
        Self {
            target: ConnectTarget::Fastest,
            profile_id: None,
            overrides: None,
        }
    }

    pub fn with_overrides(mut self, overrides: SettingsOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub intent: ConnectIntent,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ReconnectChangeCategory {
    ProtocolChange,
    CustomDnsChange,
    NetShieldChange,
    LanConnectionsChange,
    NatChange,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, Default)]
pub enum ReconnectChoice {
    #[default]
    Ask,
    Reconnect,
    Stay,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_serialization() {
        let settings = GlobalSettings {
            netshield: NetShieldMode::BlockAdsTrackersMalware,
            custom_dns: CustomDnsSettings {
                enabled: true,
                addresses: vec!["1.1.1.1".to_string()],
            },
            vpn_accelerator: ToggleSetting::Explicit(false),
            ..GlobalSettings::default()
        };
        let serialized = serde_json::to_string(&settings).unwrap();
        let deserialized: GlobalSettings = serde_json::from_str(&serialized).unwrap();
        assert_eq!(settings, deserialized);
    }

    #[test]
    fn test_effective_addresses_gated_on_enabled() {
        let disabled = CustomDnsSettings {
            enabled: false,
            addresses: vec!["1.1.1.1".to_string()],
        };
        assert!(disabled.effective_addresses().is_empty());

        let enabled = CustomDnsSettings {
            enabled: true,
            ..disabled
        };
        assert_eq!(enabled.effective_addresses(), vec!["1.1.1.1".to_string()]);
    }

    #[test]
    fn test_netshield_toggle() {
        assert_eq!(
            NetShieldMode::Disabled.toggled(),
            NetShieldMode::BlockAdsTrackersMalware
        );
        assert_eq!(NetShieldMode::BlockMalware.toggled(), NetShieldMode::Disabled);
        assert_eq!(
            NetShieldMode::BlockAdsTrackersMalware.toggled(),
            NetShieldMode::Disabled
        );
    }
}
