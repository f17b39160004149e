use crate::models::{EffectiveSettings, ReconnectChangeCategory, ReconnectChoice};
use crate::services::{ChoiceStore, TunnelManager};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Classifies the difference between the settings in force on the active
/// connection and a freshly resolved value. Returns `None` when nothing is
/// connected or no transport-relevant field changed.
///
/// Only fields with a transport effect are compared; accelerator and safe
/// mode are renegotiated in-band and never require a restart. When several
/// fields changed at once the most disruptive category wins.
pub fn needs_reconnect(
    active: Option<&EffectiveSettings>,
    proposed: &EffectiveSettings,
) -> Option<ReconnectChangeCategory> {
    let active = active?;
    if active.protocol != proposed.protocol {
        Some(ReconnectChangeCategory::ProtocolChange)
    } else if active.custom_dns != proposed.custom_dns {
        Some(ReconnectChangeCategory::CustomDnsChange)
    } else if active.netshield != proposed.netshield {
        Some(ReconnectChangeCategory::NetShieldChange)
    } else if active.lan_connections != proposed.lan_connections {
        Some(ReconnectChangeCategory::LanConnectionsChange)
    } else if active.randomized_nat != proposed.randomized_nat {
        Some(ReconnectChangeCategory::NatChange)
    } else {
        None
    }
}

/// Turns a reconnect-significant change into a confirmation prompt, honoring
/// the per-category choice the user asked to remember. At most one category
/// is pending at a time; a newer change replaces it.
pub struct ReconnectGate {
    tunnel: Arc<dyn TunnelManager>,
    choices: Arc<dyn ChoiceStore>,
    pending: watch::Sender<Option<ReconnectChangeCategory>>,
}

impl ReconnectGate {
    pub fn new(tunnel: Arc<dyn TunnelManager>, choices: Arc<dyn ChoiceStore>) -> Self {
        Self {
            tunnel,
            choices,
            pending: watch::channel(None).0,
        }
    }

    /// Stream of the category awaiting confirmation, for the dialog UI.
    pub fn pending(&self) -> watch::Receiver<Option<ReconnectChangeCategory>> {
        self.pending.subscribe()
    }

    pub async fn reconnection_check(&self, category: ReconnectChangeCategory) {
        if !self.tunnel.is_establishing_or_connected() {
            return;
        }
        match self.choices.get(category).await {
            ReconnectChoice::Reconnect => {
                info!("Saved choice for {:?}: reconnecting", category);
                self.tunnel.reconnect(category).await;
            }
            ReconnectChoice::Stay => {
                debug!("Saved choice for {:?}: keeping the connection", category);
            }
            ReconnectChoice::Ask => {
                self.pending.send_if_modified(|pending| {
                    if *pending == Some(category) {
                        false
                    } else {
                        *pending = Some(category);
                        true
                    }
                });
            }
        }
    }

    pub async fn on_reconnect_clicked(
        &self,
        dont_ask_again: bool,
        category: ReconnectChangeCategory,
    ) {
        if dont_ask_again {
            self.choices.set(category, ReconnectChoice::Reconnect).await;
        }
        self.pending.send_replace(None);
        info!("Reconnecting after settings change ({:?})", category);
        self.tunnel.reconnect(category).await;
    }

    pub async fn dismiss_reconnect_dialog(
        &self,
        dont_ask_again: bool,
        category: ReconnectChangeCategory,
    ) {
        if dont_ask_again {
            self.choices.set(category, ReconnectChoice::Stay).await;
        }
        self.pending.send_replace(None);
    }

    /// Dialog dismissed without an explicit choice (back press). No-op when
    /// nothing is pending.
    pub fn on_reconnect_dismissed(&self) {
        self.pending.send_if_modified(|pending| pending.take().is_some());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ConnectIntent, FeatureFlags, GlobalSettings, NetShieldMode, ProtocolSelection,
        TunnelKind,
    };
    use crate::resolver::resolve;
    use crate::storage::MemoryChoiceStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockTunnel {
        intent_tx: watch::Sender<Option<ConnectIntent>>,
        connected: AtomicBool,
        last_applied: Mutex<Option<EffectiveSettings>>,
        reconnect_calls: AtomicUsize,
    }

    impl MockTunnel {
        fn new() -> Self {
            Self {
                intent_tx: watch::channel(None).0,
                connected: AtomicBool::new(false),
                last_applied: Mutex::new(None),
                reconnect_calls: AtomicUsize::new(0),
            }
        }

        fn set_connected(&self, connected: bool) {
            self.connected.store(connected, Ordering::SeqCst);
        }

        fn reconnect_count(&self) -> usize {
            self.reconnect_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TunnelManager for MockTunnel {
        fn observe_active_intent(&self) -> watch::Receiver<Option<ConnectIntent>> {
            self.intent_tx.subscribe()
        }

        fn is_establishing_or_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn last_applied(&self) -> Option<EffectiveSettings> {
            self.last_applied.lock().unwrap().clone()
        }

        async fn reconnect(&self, _category: ReconnectChangeCategory) {
            self.reconnect_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn effective() -> EffectiveSettings {
        resolve(&GlobalSettings::default(), &FeatureFlags::default(), None)
    }

    #[test]
    fn test_no_reconnect_without_active_connection() {
        let proposed = effective();
        assert_eq!(needs_reconnect(None, &proposed), None);
    }

    #[test]
    fn test_no_reconnect_when_settings_equal() {
        let active = effective();
        let proposed = active.clone();
        assert_eq!(needs_reconnect(Some(&active), &proposed), None);
    }

    #[test]
    fn test_each_transport_field_maps_to_its_category() {
        let active = effective();

        let mut proposed = active.clone();
        proposed.protocol = ProtocolSelection::new(TunnelKind::OpenVpn, None);
        assert_eq!(
            needs_reconnect(Some(&active), &proposed),
            Some(ReconnectChangeCategory::ProtocolChange)
        );

        let mut proposed = active.clone();
        proposed.custom_dns = vec!["1.1.1.1".to_string()];
        assert_eq!(
            needs_reconnect(Some(&active), &proposed),
            Some(ReconnectChangeCategory::CustomDnsChange)
        );

        let mut proposed = active.clone();
        proposed.netshield = NetShieldMode::Disabled;
        assert_eq!(
            needs_reconnect(Some(&active), &proposed),
            Some(ReconnectChangeCategory::NetShieldChange)
        );

        let mut proposed = active.clone();
        proposed.lan_connections = !proposed.lan_connections;
        assert_eq!(
            needs_reconnect(Some(&active), &proposed),
            Some(ReconnectChangeCategory::LanConnectionsChange)
        );

        let mut proposed = active.clone();
        proposed.randomized_nat = !proposed.randomized_nat;
        assert_eq!(
            needs_reconnect(Some(&active), &proposed),
            Some(ReconnectChangeCategory::NatChange)
        );
    }

    #[test]
    fn test_accelerator_and_safe_mode_changes_are_benign() {
        let active = effective();
        let mut proposed = active.clone();
        proposed.vpn_accelerator = !proposed.vpn_accelerator;
        proposed.safe_mode = !proposed.safe_mode;
        assert_eq!(needs_reconnect(Some(&active), &proposed), None);
    }

    #[test]
    fn test_most_disruptive_category_wins() {
        let active = effective();
        let mut proposed = active.clone();
        proposed.protocol = ProtocolSelection::new(TunnelKind::WireGuard, None);
        proposed.netshield = NetShieldMode::Disabled;
        proposed.randomized_nat = !proposed.randomized_nat;
        assert_eq!(
            needs_reconnect(Some(&active), &proposed),
            Some(ReconnectChangeCategory::ProtocolChange)
        );
    }

    #[tokio::test]
    async fn test_check_prompts_only_while_connected() {
        let tunnel = Arc::new(MockTunnel::new());
        let gate = ReconnectGate::new(tunnel.clone(), Arc::new(MemoryChoiceStore::new()));

        gate.reconnection_check(ReconnectChangeCategory::LanConnectionsChange)
            .await;
        assert_eq!(*gate.pending().borrow(), None);

        tunnel.set_connected(true);
        gate.reconnection_check(ReconnectChangeCategory::LanConnectionsChange)
            .await;
        assert_eq!(
            *gate.pending().borrow(),
            Some(ReconnectChangeCategory::LanConnectionsChange)
        );
    }

    #[tokio::test]
    async fn test_saved_positive_choice_reconnects_without_prompt() {
        let tunnel = Arc::new(MockTunnel::new());
        tunnel.set_connected(true);
        let choices = Arc::new(MemoryChoiceStore::new());
        choices
            .set(
                ReconnectChangeCategory::LanConnectionsChange,
                ReconnectChoice::Reconnect,
            )
            .await;
        let gate = ReconnectGate::new(tunnel.clone(), choices);

        gate.reconnection_check(ReconnectChangeCategory::LanConnectionsChange)
            .await;
        assert_eq!(*gate.pending().borrow(), None);
        assert_eq!(tunnel.reconnect_count(), 1);
    }

    #[tokio::test]
    async fn test_saved_negative_choice_suppresses_prompt_and_reconnect() {
        let tunnel = Arc::new(MockTunnel::new());
        tunnel.set_connected(true);
        let choices = Arc::new(MemoryChoiceStore::new());
        choices
            .set(
                ReconnectChangeCategory::LanConnectionsChange,
                ReconnectChoice::Stay,
            )
            .await;
        let gate = ReconnectGate::new(tunnel.clone(), choices);

        gate.reconnection_check(ReconnectChangeCategory::LanConnectionsChange)
            .await;
        assert_eq!(*gate.pending().borrow(), None);
        assert_eq!(tunnel.reconnect_count(), 0);
    }

    #[tokio::test]
    async fn test_clicked_reconnect_persists_choice_when_asked() {
        let tunnel = Arc::new(MockTunnel::new());
        tunnel.set_connected(true);
        let choices = Arc::new(MemoryChoiceStore::new());
        let gate = ReconnectGate::new(tunnel.clone(), choices.clone());

        gate.reconnection_check(ReconnectChangeCategory::ProtocolChange)
            .await;
        gate.on_reconnect_clicked(true, ReconnectChangeCategory::ProtocolChange)
            .await;

        assert_eq!(*gate.pending().borrow(), None);
        assert_eq!(tunnel.reconnect_count(), 1);
        assert_eq!(
            choices.get(ReconnectChangeCategory::ProtocolChange).await,
            ReconnectChoice::Reconnect
        );
    }

    #[tokio::test]
    async fn test_clicked_reconnect_without_persistence_keeps_asking() {
        let tunnel = Arc::new(MockTunnel::new());
        tunnel.set_connected(true);
        let choices = Arc::new(MemoryChoiceStore::new());
        let gate = ReconnectGate::new(tunnel.clone(), choices.clone());

        gate.reconnection_check(ReconnectChangeCategory::ProtocolChange)
            .await;
        gate.on_reconnect_clicked(false, ReconnectChangeCategory::ProtocolChange)
            .await;
        assert_eq!(
            choices.get(ReconnectChangeCategory::ProtocolChange).await,
            ReconnectChoice::Ask
        );

        gate.reconnection_check(ReconnectChangeCategory::ProtocolChange)
            .await;
        assert_eq!(
            *gate.pending().borrow(),
            Some(ReconnectChangeCategory::ProtocolChange)
        );
    }

    #[tokio::test]
    async fn test_dismiss_persists_negative_choice_when_asked() {
        let tunnel = Arc::new(MockTunnel::new());
        tunnel.set_connected(true);
        let choices = Arc::new(MemoryChoiceStore::new());
        let gate = ReconnectGate::new(tunnel.clone(), choices.clone());

        gate.reconnection_check(ReconnectChangeCategory::CustomDnsChange)
            .await;
        gate.dismiss_reconnect_dialog(true, ReconnectChangeCategory::CustomDnsChange)
            .await;

        assert_eq!(*gate.pending().borrow(), None);
        assert_eq!(tunnel.reconnect_count(), 0);
        assert_eq!(
            choices.get(ReconnectChangeCategory::CustomDnsChange).await,
            ReconnectChoice::Stay
        );

        // The remembered choice now suppresses the prompt entirely.
        gate.reconnection_check(ReconnectChangeCategory::CustomDnsChange)
            .await;
        assert_eq!(*gate.pending().borrow(), None);
    }

    #[tokio::test]
    async fn test_newer_pending_category_replaces_older() {
        let tunnel = Arc::new(MockTunnel::new());
        tunnel.set_connected(true);
        let gate = ReconnectGate::new(tunnel, Arc::new(MemoryChoiceStore::new()));

        gate.reconnection_check(ReconnectChangeCategory::LanConnectionsChange)
            .await;
        gate.reconnection_check(ReconnectChangeCategory::ProtocolChange)
            .await;
        assert_eq!(
            *gate.pending().borrow(),
            Some(ReconnectChangeCategory::ProtocolChange)
        );
    }

    #[tokio::test]
    async fn test_dismissed_is_idempotent() {
        let tunnel = Arc::new(MockTunnel::new());
        tunnel.set_connected(true);
        let gate = ReconnectGate::new(tunnel, Arc::new(MemoryChoiceStore::new()));

        gate.on_reconnect_dismissed();
        assert_eq!(*gate.pending().borrow(), None);

        gate.reconnection_check(ReconnectChangeCategory::NatChange).await;
        gate.on_reconnect_dismissed();
        gate.on_reconnect_dismissed();
        assert_eq!(*gate.pending().borrow(), None);
    }
}
