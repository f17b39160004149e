pub mod flags;
pub mod profiles;
pub mod settings;

use crate::models::{
    ConnectIntent, EffectiveSettings, GlobalSettings, ReconnectChangeCategory, ReconnectChoice,
    SettingsOverrides,
};
use async_trait::async_trait;
use tokio::sync::watch;

pub trait SettingsStore: Send + Sync {
    fn current(&self) -> GlobalSettings;
    fn observe(&self) -> watch::Receiver<GlobalSettings>;
}

pub trait OverrideSource: Send + Sync {
    fn current_for(&self, intent: &ConnectIntent) -> Option<SettingsOverrides>;
    fn observe_for(&self, intent: &ConnectIntent) -> watch::Receiver<Option<SettingsOverrides>>;
}

#[async_trait]
pub trait TunnelManager: Send + Sync {
    fn observe_active_intent(&self) -> watch::Receiver<Option<ConnectIntent>>;
    fn is_establishing_or_connected(&self) -> bool;
    fn last_applied(&self) -> Option<EffectiveSettings>;
    async fn reconnect(&self, category: ReconnectChangeCategory);

    fn active_intent(&self) -> Option<ConnectIntent> {
        self.observe_active_intent().borrow().clone()
    }
}

#[async_trait]
pub trait ChoiceStore: Send + Sync {
    async fn get(&self, category: ReconnectChangeCategory) -> ReconnectChoice;
    async fn set(&self, category: ReconnectChangeCategory, choice: ReconnectChoice);
}
