use crate::models::{GlobalSettings, NetShieldMode, ProtocolSelection, ToggleSetting};
use crate::services::SettingsStore;
use crate::storage;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::warn;

/// Holds the raw per-user settings and the mutation entry points the settings
/// screens call. Consumers that need resolved values should go through the
/// effective settings stream instead.
pub struct LocalSettingsManager {
    tx: watch::Sender<GlobalSettings>,
    persist_path: Option<PathBuf>,
}

impl LocalSettingsManager {
    pub fn new(initial: GlobalSettings) -> Self {
        Self {
            tx: watch::channel(initial).0,
            persist_path: None,
        }
    }

    /// Loads persisted settings from `path` and writes every subsequent
    /// update back to it. A missing or unreadable file starts from defaults.
    pub fn load(path: PathBuf) -> Self {
        let settings = match storage::load_config_from(&path) {
            Ok(config) => config.settings.unwrap_or_default(),
            Err(err) => {
                warn!("Failed to load settings, starting from defaults: {}", err);
                GlobalSettings::default()
            }
        };
        Self {
            tx: watch::channel(settings).0,
            persist_path: Some(path),
        }
    }

    pub fn update(
        &self,
        transform: impl FnOnce(GlobalSettings) -> GlobalSettings,
    ) -> GlobalSettings {
        self.tx.send_if_modified(|current| {
            let next = transform(current.clone());
            if next == *current {
                false
            } else {
                *current = next;
                true
            }
        });
        let updated = self.tx.borrow().clone();
        self.persist(&updated);
        updated
    }

    pub fn toggle_netshield(&self) -> GlobalSettings {
        self.update(|mut current| {
            current.netshield = current.netshield.toggled();
            current
        })
    }

    pub fn update_netshield(&self, mode: NetShieldMode) -> GlobalSettings {
        self.update(|mut current| {
            current.netshield = mode;
            current
        })
    }

    pub fn toggle_custom_dns(&self) -> GlobalSettings {
        self.update(|mut current| {
            current.custom_dns.enabled = !current.custom_dns.enabled;
            current
        })
    }

    pub fn disable_custom_dns(&self) -> GlobalSettings {
        self.update(|mut current| {
            current.custom_dns.enabled = false;
            current
        })
    }

    pub fn update_custom_dns_list(&self, addresses: Vec<String>) -> GlobalSettings {
        self.update(|mut current| {
            current.custom_dns.addresses = addresses;
            current
        })
    }

    pub fn update_protocol(&self, protocol: ProtocolSelection) -> GlobalSettings {
        self.update(|mut current| {
            current.protocol = protocol;
            current
        })
    }

    pub fn set_randomized_nat(&self, enabled: bool) -> GlobalSettings {
        self.update(|mut current| {
            current.randomized_nat = enabled;
            current
        })
    }

    pub fn toggle_lan_connections(&self) -> GlobalSettings {
        self.update(|mut current| {
            current.lan_connections = !current.lan_connections;
            current
        })
    }

    pub fn toggle_vpn_accelerator(&self) -> GlobalSettings {
        self.update(|mut current| {
            current.vpn_accelerator =
                ToggleSetting::Explicit(!current.vpn_accelerator.explicit_or(true));
            current
        })
    }

    pub fn set_safe_mode(&self, value: ToggleSetting) -> GlobalSettings {
        self.update(|mut current| {
            current.safe_mode = value;
            current
        })
    }

    pub fn toggle_alt_routing(&self) -> GlobalSettings {
        self.update(|mut current| {
            current.alt_routing = !current.alt_routing;
            current
        })
    }

    pub fn set_telemetry(&self, enabled: bool) -> GlobalSettings {
        self.update(|mut current| {
            current.telemetry = enabled;
            current
        })
    }

    fn persist(&self, settings: &GlobalSettings) {
        if let Some(path) = &self.persist_path {
            let result = storage::update_config_at(path, |config| {
                config.settings = Some(settings.clone());
            });
            if let Err(err) = result {
                warn!("Failed to persist settings: {}", err);
            }
        }
    }
}

impl SettingsStore for LocalSettingsManager {
    fn current(&self) -> GlobalSettings {
        self.tx.borrow().clone()
    }

    fn observe(&self) -> watch::Receiver<GlobalSettings> {
        self.tx.subscribe()
    }
}
