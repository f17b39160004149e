use crate::models::{ConnectIntent, EffectiveSettings};
use crate::reconnect::{needs_reconnect, ReconnectGate};
use crate::services::flags::{watch_flags, FeatureGate};
use crate::services::{ChoiceStore, OverrideSource, SettingsStore, TunnelManager};
use crate::stream::EffectiveSettingsStream;
use std::sync::Arc;
use tokio::sync::watch;

/// Wires the effective settings stream to the reconnect gate: every deduped
/// emission is compared against the settings last applied to the tunnel, and
/// a significant difference goes through the confirmation flow.
pub struct SettingsEngine {
    stream: EffectiveSettingsStream,
    gate: Arc<ReconnectGate>,
}

impl SettingsEngine {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        feature_gate: Arc<dyn FeatureGate>,
        overrides: Arc<dyn OverrideSource>,
        tunnel: Arc<dyn TunnelManager>,
        choices: Arc<dyn ChoiceStore>,
    ) -> Self {
        let flags_rx = watch_flags(feature_gate.as_ref());
        let stream =
            EffectiveSettingsStream::new(settings, flags_rx, overrides, tunnel.clone());
        let gate = Arc::new(ReconnectGate::new(tunnel.clone(), choices));

        let mut effective_rx = stream.subscribe();
        let monitor_gate = gate.clone();
        tokio::spawn(async move {
            while effective_rx.changed().await.is_ok() {
                let proposed = effective_rx.borrow().clone();
                let active = tunnel.last_applied();
                if let Some(category) = needs_reconnect(active.as_ref(), &proposed) {
                    monitor_gate.reconnection_check(category).await;
                }
            }
        });

        Self { stream, gate }
    }

    pub fn subscribe(&self) -> watch::Receiver<EffectiveSettings> {
        self.stream.subscribe()
    }

    pub fn current(&self) -> EffectiveSettings {
        self.stream.current()
    }

    pub fn get_for(&self, intent: Option<&ConnectIntent>) -> EffectiveSettings {
        self.stream.get_for(intent)
    }

    pub fn reconnect_gate(&self) -> Arc<ReconnectGate> {
        self.gate.clone()
    }
}
