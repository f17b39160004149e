use crate::models::{
    EffectiveSettings, FeatureFlags, GlobalSettings, SettingsOverrides, ToggleSetting,
};

/// Merges the stored settings, the current feature flags and an optional
/// override record into the settings actually handed to the transport layer.
///
/// Pure and deterministic: identical inputs always produce identical output.
/// Overrides carry explicit user intent and win over the flag-adjusted global
/// value, including for flag-gated fields.
pub fn resolve(
    global: &GlobalSettings,
    flags: &FeatureFlags,
    overrides: Option<&SettingsOverrides>,
) -> EffectiveSettings {
    // Flag off: the accelerator is forced on no matter what is stored.
    let vpn_accelerator = resolve_gated(global.vpn_accelerator, flags.vpn_accelerator, true, true);
    // Flag off: safe mode stays off. Flag on: unset means enabled.
    let safe_mode = resolve_gated(global.safe_mode, flags.safe_mode, false, true);

    let custom_dns = overrides
        .and_then(|o| o.custom_dns.as_ref())
        .unwrap_or(&global.custom_dns);

    EffectiveSettings {
        protocol: overrides
            .and_then(|o| o.protocol)
            .unwrap_or(global.protocol),
        netshield: overrides
            .and_then(|o| o.netshield)
            .unwrap_or(global.netshield),
        randomized_nat: overrides
            .and_then(|o| o.randomized_nat)
            .unwrap_or(global.randomized_nat),
        lan_connections: overrides
            .and_then(|o| o.lan_connections)
            .unwrap_or(global.lan_connections),
        custom_dns: custom_dns.effective_addresses(),
        vpn_accelerator: overrides
            .and_then(|o| o.vpn_accelerator)
            .unwrap_or(vpn_accelerator),
        safe_mode: overrides.and_then(|o| o.safe_mode).unwrap_or(safe_mode),
    }
}

fn resolve_gated(
    stored: ToggleSetting,
    flag_on: bool,
    forced_when_off: bool,
    default_when_on: bool,
) -> bool {
    if flag_on {
        stored.explicit_or(default_when_on)
    } else {
        forced_when_off
    }
}
