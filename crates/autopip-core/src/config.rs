//! Configuration snapshot shape shared by every context.
//!
//! Field names follow the settings store keys (`camelCase`). Every field is
//! defaulted so partial or older stores still deserialize; keys from
//! earlier layouts (`siteEnabled`, `enableTabSwitch`, `enablePanelCollapse`)
//! are ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ─── Defaults ─────────────────────────────────────────────────────

pub const DEFAULT_COLLAPSE_WIDTH_PX: u32 = 8;
pub const DEFAULT_COLLAPSE_HEIGHT_PX: u32 = 80;
pub const DEFAULT_DEBOUNCE_MS: u64 = 250;
pub const DEFAULT_ARM_MINUTES: u64 = 10;
pub const DEFAULT_TAB_SWITCH_DELAY_MS: u64 = 500;

/// Sites known to serve PiP-capable players; always listed in the site table.
pub const KNOWN_PIP_SITES: [&str; 12] = [
    "app.plex.tv",
    "teams.microsoft.com",
    "meet.google.com",
    "www.twitch.tv",
    "player.twitch.tv",
    "www.netflix.com",
    "www.espn.com",
    "www.youtube.com",
    "www.hulu.com",
    "vimeo.com",
    "www.dailymotion.com",
    "www.crunchyroll.com",
];

// ─── Per-site settings ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    TabSwitch,
    PanelCollapse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteSettings {
    pub enable_tab: bool,
    pub enable_panel: bool,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            enable_tab: true,
            enable_panel: true,
        }
    }
}

impl SiteSettings {
    pub fn allows(&self, feature: Feature) -> bool {
        match feature {
            Feature::TabSwitch => self.enable_tab,
            Feature::PanelCollapse => self.enable_panel,
        }
    }
}

// ─── Config ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub enabled: bool,
    pub collapse_width_px: u32,
    pub collapse_height_px: u32,
    pub debounce_ms: u64,
    pub arm_minutes: u64,
    pub exit_on_expand: bool,
    /// Delay between the page going hidden and the tab-switch attempt.
    pub tab_switch_delay: u64,
    /// When false the recovery banner is never shown.
    pub show_block_alerts: bool,
    #[serde(deserialize_with = "lenient_site_settings")]
    pub site_settings: BTreeMap<String, SiteSettings>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            collapse_width_px: DEFAULT_COLLAPSE_WIDTH_PX,
            collapse_height_px: DEFAULT_COLLAPSE_HEIGHT_PX,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            arm_minutes: DEFAULT_ARM_MINUTES,
            exit_on_expand: true,
            tab_switch_delay: DEFAULT_TAB_SWITCH_DELAY_MS,
            show_block_alerts: true,
            site_settings: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Whether `feature` is enabled for `host`.
    ///
    /// Unknown hosts, and an empty host, are enabled.
    pub fn site_enabled(&self, host: &str, feature: Feature) -> bool {
        if host.is_empty() {
            return true;
        }
        self.site_settings
            .get(host)
            .is_none_or(|s| s.allows(feature))
    }

    pub fn arm_duration_ms(&self) -> u64 {
        self.arm_minutes.saturating_mul(60_000)
    }

    /// Merge a change-notification delta (`key → new value`) into this
    /// snapshot.
    ///
    /// Unknown keys are ignored. A value that does not fit its field leaves
    /// that field unchanged. Returns the keys that were applied.
    pub fn apply_changes(&mut self, delta: &Map<String, Value>) -> Vec<String> {
        let Ok(Value::Object(mut current)) = serde_json::to_value(&*self) else {
            return Vec::new();
        };

        let mut applied = Vec::new();
        for (key, value) in delta {
            if !current.contains_key(key) {
                continue;
            }
            let mut candidate = current.clone();
            candidate.insert(key.clone(), value.clone());
            if let Ok(next) = serde_json::from_value::<Config>(Value::Object(candidate.clone())) {
                *self = next;
                current = candidate;
                applied.push(key.clone());
            }
        }
        applied
    }
}

fn lenient_site_settings<'de, D>(deserializer: D) -> Result<BTreeMap<String, SiteSettings>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let Value::Object(entries) = raw else {
        return Ok(BTreeMap::new());
    };
    Ok(entries
        .into_iter()
        .filter_map(|(host, v)| {
            serde_json::from_value::<SiteSettings>(v)
                .ok()
                .map(|s| (host, s))
        })
        .collect())
}

// ─── Hosts ────────────────────────────────────────────────────────

/// Host portion of `url`, without scheme or port.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .map(str::to_string)
}

/// Rows for the settings table: the known PiP sites followed by any other
/// configured host, with unset hosts shown as fully enabled.
pub fn site_table(config: &Config) -> Vec<(String, SiteSettings)> {
    let mut rows: Vec<(String, SiteSettings)> = KNOWN_PIP_SITES
        .iter()
        .map(|host| {
            let settings = config.site_settings.get(*host).copied().unwrap_or_default();
            ((*host).to_string(), settings)
        })
        .collect();

    for (host, settings) in &config.site_settings {
        if !KNOWN_PIP_SITES.contains(&host.as_str()) {
            rows.push((host.clone(), *settings));
        }
    }
    rows
}

// ─── Tests ────────────────────────────────────────────────────────
