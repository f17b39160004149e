use crate::models::{ConnectIntent, EffectiveSettings, FeatureFlags, SettingsOverrides};
use crate::resolver::resolve;
use crate::services::{OverrideSource, SettingsStore, TunnelManager};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Recomputes the effective settings whenever any upstream input changes:
/// the raw settings, the feature flags, the active connect intent, or that
/// intent's own overrides. Emissions equal to the last value are suppressed.
///
/// All recomputation happens on one task, so every resolution sees a
/// consistent snapshot of the three inputs.
pub struct EffectiveSettingsStream {
    settings: Arc<dyn SettingsStore>,
    flags_rx: watch::Receiver<FeatureFlags>,
    overrides: Arc<dyn OverrideSource>,
    out_rx: watch::Receiver<EffectiveSettings>,
}

impl EffectiveSettingsStream {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        flags_rx: watch::Receiver<FeatureFlags>,
        overrides: Arc<dyn OverrideSource>,
        tunnel: Arc<dyn TunnelManager>,
    ) -> Self {
        let mut settings_rx = settings.observe();
        let mut task_flags_rx = flags_rx.clone();
        let mut intent_rx = tunnel.observe_active_intent();
        let source = overrides.clone();

        let initial_intent = intent_rx.borrow().clone();
        let mut overrides_rx = subscribe_overrides(source.as_ref(), initial_intent.as_ref());
        let mut overrides_open = true;

        let initial_settings = settings_rx.borrow().clone();
        let initial_flags = *task_flags_rx.borrow();
        let initial_overrides = overrides_rx.borrow().clone();
        let initial = resolve(&initial_settings, &initial_flags, initial_overrides.as_ref());
        let (out_tx, out_rx) = watch::channel(initial);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = settings_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    changed = task_flags_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    changed = intent_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        // Switch to the new intent's override stream; the
                        // previous subscription is dropped with its receiver.
                        let intent = intent_rx.borrow().clone();
                        overrides_rx = subscribe_overrides(source.as_ref(), intent.as_ref());
                        overrides_open = true;
                    }
                    changed = overrides_rx.changed(), if overrides_open => {
                        if changed.is_err() {
                            // Static overrides: the channel closes immediately
                            // and the borrowed value keeps being used.
                            overrides_open = false;
                        }
                    }
                }

                let settings_snapshot = settings_rx.borrow().clone();
                let flags_snapshot = *task_flags_rx.borrow();
                let overrides_snapshot = overrides_rx.borrow().clone();
                let next = resolve(
                    &settings_snapshot,
                    &flags_snapshot,
                    overrides_snapshot.as_ref(),
                );
                let emitted = out_tx.send_if_modified(|current| {
                    if *current == next {
                        false
                    } else {
                        *current = next;
                        true
                    }
                });
                if emitted {
                    debug!("Effective settings recomputed");
                }
            }
        });

        Self {
            settings,
            flags_rx,
            overrides,
            out_rx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<EffectiveSettings> {
        self.out_rx.clone()
    }

    pub fn current(&self) -> EffectiveSettings {
        self.out_rx.borrow().clone()
    }

    /// Synchronous snapshot resolution for call sites that cannot subscribe.
    /// `None` resolves pure global/flag settings, i.e. what a fresh
    /// connection without an intent would get.
    pub fn get_for(&self, intent: Option<&ConnectIntent>) -> EffectiveSettings {
        let overrides = intent.and_then(|intent| self.overrides.current_for(intent));
        let flags = *self.flags_rx.borrow();
        resolve(&self.settings.current(), &flags, overrides.as_ref())
    }
}

fn subscribe_overrides(
    source: &dyn OverrideSource,
    intent: Option<&ConnectIntent>,
) -> watch::Receiver<Option<SettingsOverrides>> {
    match intent {
        Some(intent) => source.observe_for(intent),
        None => watch::channel(None).1,
    }
}
