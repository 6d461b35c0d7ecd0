//! `autopip config`, `autopip sites`, `autopip classify`.

use autopip_core::config::{Config, site_table};
use autopip_core::viewport::{CollapseThresholds, is_collapsed};
use autopip_core::types::Viewport;

pub fn cmd_config(config: &Config) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

pub fn cmd_sites(config: &Config) {
    println!("{}", format_sites(config));
}

pub fn cmd_classify(config: &Config, width: u32, height: u32) {
    println!("{}", classify(config, Viewport::new(width, height)));
}

fn classify(config: &Config, viewport: Viewport) -> String {
    let thresholds = CollapseThresholds::from(config);
    let verdict = if is_collapsed(viewport, thresholds) {
        "collapsed"
    } else {
        "expanded"
    };
    format!(
        "{viewport}: {verdict} (width <= {} or height <= {})",
        thresholds.width_px, thresholds.height_px
    )
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

fn format_sites(config: &Config) -> String {
    let rows = site_table(config);
    let width = rows
        .iter()
        .map(|(host, _)| host.len())
        .max()
        .unwrap_or(0)
        .max("HOST".len());
    let mut lines = vec![format!("{:<width$}  TAB  PANEL", "HOST")];
    for (host, settings) in rows {
        lines.push(format!(
            "{host:<width$}  {:<3}  {}",
            on_off(settings.enable_tab),
            on_off(settings.enable_panel)
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopip_core::config::SiteSettings;

    #[test]
    fn classify_reports_thresholds() {
        let cfg = Config::default();
        assert_eq!(
            classify(&cfg, Viewport::new(5, 720)),
            "5x720: collapsed (width <= 8 or height <= 80)"
        );
        assert!(classify(&cfg, Viewport::new(400, 720)).contains("expanded"));
    }

    #[test]
    fn site_table_lists_known_and_configured_hosts() {
        let mut cfg = Config::default();
        cfg.site_settings.insert(
            "vimeo.com".into(),
            SiteSettings {
                enable_tab: false,
                enable_panel: true,
            },
        );
        cfg.site_settings
            .insert("example.org".into(), SiteSettings::default());
        let table = format_sites(&cfg);
        let vimeo = table
            .lines()
            .find(|l| l.starts_with("vimeo.com"))
            .unwrap();
        assert!(vimeo.contains("off  on"));
        assert!(table.lines().last().unwrap().starts_with("example.org"));
    }
}
