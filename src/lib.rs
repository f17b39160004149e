pub mod engine;
pub mod error;
pub mod models;
pub mod reconnect;
pub mod resolver;
pub mod services;
pub mod storage;
pub mod stream;

pub use engine::SettingsEngine;
pub use error::AppError;
pub use models::{
    ConnectIntent, ConnectTarget, CustomDnsSettings, EffectiveSettings, FeatureFlags,
    GlobalSettings, NetShieldMode, Profile, ProtocolSelection, ReconnectChangeCategory,
    ReconnectChoice, SettingsOverrides, ToggleSetting, Transport, TunnelKind,
};
pub use reconnect::{needs_reconnect, ReconnectGate};
pub use resolver::resolve;
pub use stream::EffectiveSettingsStream;
