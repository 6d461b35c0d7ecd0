//! Browser-vendor probe and the narrow web-panel heuristic.
//!
//! Only one vendor hosts pages in collapsible side panels. Detection:
//!
//! 1. Vendor side data on the tab (a JSON string or an object). A
//!    `panelId` naming a web panel (`WEBPANEL_` prefix) marks a panel;
//!    present-but-unparsable side data means "not detected".
//! 2. Without side data, geometry: positive tab width under
//!    [`NARROW_PANEL_MAX_WIDTH`] and under half the window width.
//!
//! Side data can miss panels created by extensions that never set a
//! `panelId`; the geometry fallback can flag a narrow regular window that
//! has been split. Both are accepted: a false positive only reveals the
//! panel-collapse settings column.

use serde_json::{Map, Value};

pub const VENDOR_UA_TOKEN: &str = "Vivaldi";
pub const SIDE_DATA_FIELD: &str = "vivExtData";
pub const WEB_PANEL_PREFIX: &str = "WEBPANEL_";
pub const NARROW_PANEL_MAX_WIDTH: u32 = 600;

pub fn is_vivaldi(user_agent: &str, has_vendor_object: bool) -> bool {
    has_vendor_object || user_agent.contains(VENDOR_UA_TOKEN)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideData {
    Absent,
    Malformed,
    Parsed(Map<String, Value>),
}

pub fn parse_side_data(raw: Option<&Value>) -> SideData {
    match raw {
        None | Some(Value::Null) => SideData::Absent,
        Some(Value::String(s)) if s.trim().is_empty() => SideData::Absent,
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => SideData::Parsed(map),
            _ => SideData::Malformed,
        },
        Some(Value::Object(map)) => SideData::Parsed(map.clone()),
        Some(_) => SideData::Malformed,
    }
}

fn names_web_panel(data: &Map<String, Value>) -> bool {
    data.get("panelId")
        .and_then(Value::as_str)
        .is_some_and(|id| id.to_ascii_uppercase().starts_with(WEB_PANEL_PREFIX))
}

fn narrow_geometry(tab_width: Option<u32>, window_width: Option<u32>) -> bool {
    let Some(tab) = tab_width.filter(|w| *w > 0) else {
        return false;
    };
    let half_window = window_width.map(|w| w / 2).unwrap_or(u32::MAX);
    tab < NARROW_PANEL_MAX_WIDTH && tab < half_window
}

pub fn detect_panel(
    side_data: Option<&Value>,
    tab_width: Option<u32>,
    window_width: Option<u32>,
) -> bool {
    match parse_side_data(side_data) {
        SideData::Parsed(map) => names_web_panel(&map),
        SideData::Malformed => false,
        SideData::Absent => narrow_geometry(tab_width, window_width),
    }
}
