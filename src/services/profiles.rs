use crate::models::{ConnectIntent, Profile, SettingsOverrides};
use crate::services::OverrideSource;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use uuid::Uuid;

/// Saved-profile store. Edits to a profile are pushed to every observer, so
/// an active connection resolved through a profile picks them up live.
pub struct ProfileRegistry {
    channels: Mutex<HashMap<Uuid, watch::Sender<Option<Profile>>>>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, profile: Profile) {
        let mut channels = self.lock_channels();
        channels
            .entry(profile.id)
            .or_insert_with(|| watch::channel(None).0)
            .send_replace(Some(profile));
    }

    pub fn remove(&self, id: Uuid) {
        let channels = self.lock_channels();
        if let Some(sender) = channels.get(&id) {
            sender.send_replace(None);
        }
    }

    pub fn get(&self, id: Uuid) -> Option<Profile> {
        let channels = self.lock_channels();
        channels.get(&id).and_then(|sender| sender.borrow().clone())
    }

    pub fn observe(&self, id: Uuid) -> watch::Receiver<Option<Profile>> {
        let mut channels = self.lock_channels();
        channels
            .entry(id)
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }

    fn lock_channels(&self) -> MutexGuard<'_, HashMap<Uuid, watch::Sender<Option<Profile>>>> {
        self.channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OverrideSource for ProfileRegistry {
    fn current_for(&self, intent: &ConnectIntent) -> Option<SettingsOverrides> {
        match intent.profile_id {
            Some(id) => self.get(id).and_then(|profile| profile.intent.overrides),
            None => intent.overrides.clone(),
        }
    }

    fn observe_for(&self, intent: &ConnectIntent) -> watch::Receiver<Option<SettingsOverrides>> {
        match intent.profile_id {
            Some(id) => {
                let mut profile_rx = self.observe(id);
                let initial = profile_rx
                    .borrow()
                    .as_ref()
                    .and_then(|profile| profile.intent.overrides.clone());
                let (tx, rx) = watch::channel(initial);
                tokio::spawn(async move {
                    while profile_rx.changed().await.is_ok() {
                        let next = profile_rx
                            .borrow()
                            .as_ref()
                            .and_then(|profile| profile.intent.overrides.clone());
                        if tx.send(next).is_err() {
                            break;
                        }
                    }
                });
                rx
            }
            // Intent-attached overrides never change after the intent is
            // created; the stream closes right away and the value stands.
            None => watch::channel(intent.overrides.clone()).1,
        }
    }
}
