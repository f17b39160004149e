use crate::models::FeatureFlags;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum FeatureFlag {
    VpnAccelerator,
    SafeMode,
}

impl FeatureFlag {
    fn default_value(self) -> bool {
        let defaults = FeatureFlags::default();
        match self {
            FeatureFlag::VpnAccelerator => defaults.vpn_accelerator,
            FeatureFlag::SafeMode => defaults.safe_mode,
        }
    }
}

pub trait FeatureGate: Send + Sync {
    fn observe(&self, flag: FeatureFlag) -> watch::Receiver<bool>;
}

/// In-process stand-in for the remote flag service. Flag refreshes arrive by
/// calling `set`, which pushes to every observer.
pub struct MemoryFeatureGate {
    channels: Mutex<HashMap<FeatureFlag, watch::Sender<bool>>>,
}

impl MemoryFeatureGate {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, flag: FeatureFlag, enabled: bool) {
        let mut channels = self.lock_channels();
        let sender = channels
            .entry(flag)
            .or_insert_with(|| watch::channel(flag.default_value()).0);
        sender.send_replace(enabled);
    }

    fn lock_channels(&self) -> MutexGuard<'_, HashMap<FeatureFlag, watch::Sender<bool>>> {
        self.channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryFeatureGate {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureGate for MemoryFeatureGate {
    fn observe(&self, flag: FeatureFlag) -> watch::Receiver<bool> {
        let mut channels = self.lock_channels();
        channels
            .entry(flag)
            .or_insert_with(|| watch::channel(flag.default_value()).0)
            .subscribe()
    }
}

/// Folds the per-flag streams into one snapshot stream, so a recomputation
/// never observes a torn combination of flags.
pub fn watch_flags(gate: &dyn FeatureGate) -> watch::Receiver<FeatureFlags> {
    let mut accelerator_rx = gate.observe(FeatureFlag::VpnAccelerator);
    let mut safe_mode_rx = gate.observe(FeatureFlag::SafeMode);

    let initial = FeatureFlags {
        vpn_accelerator: *accelerator_rx.borrow(),
        safe_mode: *safe_mode_rx.borrow(),
    };
    let (tx, rx) = watch::channel(initial);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = accelerator_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = safe_mode_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            let next = FeatureFlags {
                vpn_accelerator: *accelerator_rx.borrow(),
                safe_mode: *safe_mode_rx.borrow(),
            };
            if tx.send(next).is_err() {
                break;
            }
        }
    });

    rx
}
