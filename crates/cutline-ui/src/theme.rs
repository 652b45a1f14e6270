// src/theme.rs
use egui::style::WidgetVisuals;
use egui::{Color32, Context, CornerRadius, Stroke, Style, Visuals};
use serde_json::Value;

// ── Palette ──────────────────────────────────────────────────────────────────
// Cool ink grays with a blue accent; timeline surfaces sit between
// BG_CANVAS (scroll gutter) and BG_HOVER (interactive highlight).
pub const ACCENT:       Color32 = Color32::from_rgb( 80, 160, 255);
pub const ACCENT_DIM:   Color32 = Color32::from_rgb( 40,  95, 170);
pub const ACCENT_HOVER: Color32 = Color32::from_rgb(120, 185, 255);

pub const BG_CANVAS: Color32 = Color32::from_rgb( 10,  11,  14);
pub const BG_PANEL:  Color32 = Color32::from_rgb( 17,  19,  24);
pub const BG_RAISED: Color32 = Color32::from_rgb( 26,  29,  36);
pub const BG_HOVER:  Color32 = Color32::from_rgb( 36,  40,  50);

pub const TEXT:     Color32 = Color32::from_rgb(214, 218, 228);
pub const TEXT_DIM: Color32 = Color32::from_rgb(124, 131, 148);
pub const BORDER:   Color32 = Color32::from_rgb( 47,  52,  64);

pub const SNAPLINE:     Color32 = Color32::from_rgb(255, 200,  50);
pub const PLAYHEAD:     Color32 = Color32::from_rgb(230,  60,  60);
pub const MARKER:       Color32 = Color32::from_rgb(110, 200, 140);
pub const CACHE_STRIPE: Color32 = Color32::from_rgb( 70, 130,  90);

/// Host-overridable theme colors. `setThemeColors` replaces individual
/// entries; everything else keeps the built-in palette above.
#[derive(Clone, Debug)]
pub struct ThemeColors {
    pub clip_body: Color32,
    pub clip_audio: Color32,
    pub clip_selected: Color32,
    pub transition_body: Color32,
    pub transition_selected: Color32,
    pub track_row: Color32,
    pub track_locked: Color32,
    pub keyframe: Color32,
    /// Raw theme CSS from `setTheme`, kept verbatim for host round-trips.
    pub custom_css: Option<String>,
}

impl Default for ThemeColors {
    fn default() -> Self {
        ThemeColors {
            clip_body:           Color32::from_rgb( 52,  98, 168),
            clip_audio:          Color32::from_rgb( 42, 138,  98),
            clip_selected:       Color32::from_rgb(200, 120,  50),
            transition_body:     Color32::from_rgb(108,  80, 165),
            transition_selected: Color32::from_rgb(160, 110, 220),
            track_row:           BG_PANEL,
            track_locked:        Color32::from_rgb( 22,  19,  20),
            keyframe:            Color32::from_rgb(235, 235, 245),
            custom_css:          None,
        }
    }
}

/// Parse `#rrggbb` / `#rgb`; anything else is rejected so a bad host value
/// can't blank out an element.
fn parse_hex(s: &str) -> Option<Color32> {
    let hex = s.trim().strip_prefix('#')?;
    let full = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect::<String>(),
        6 => hex.to_string(),
        _ => return None,
    };
    let n = u32::from_str_radix(&full, 16).ok()?;
    Some(Color32::from_rgb((n >> 16) as u8, (n >> 8) as u8, n as u8))
}

impl ThemeColors {
    /// Apply a `{ name: "#rrggbb" }` map from the host. Unknown names and
    /// unparsable colors are skipped with a log, never an error.
    pub fn apply_host_colors(&mut self, json: &Value) {
        let Some(map) = json.as_object() else {
            log::debug!("[theme] setThemeColors payload is not an object, ignoring");
            return;
        };
        for (name, raw) in map {
            let Some(color) = raw.as_str().and_then(parse_hex) else {
                log::debug!("[theme] unparsable color for {name}: {raw}");
                continue;
            };
            match name.as_str() {
                "clip" => self.clip_body = color,
                "clip_audio" => self.clip_audio = color,
                "clip_selected" => self.clip_selected = color,
                "transition" => self.transition_body = color,
                "transition_selected" => self.transition_selected = color,
                "track" => self.track_row = color,
                "track_locked" => self.track_locked = color,
                "keyframe" => self.keyframe = color,
                other => log::debug!("[theme] unknown theme color name {other}"),
            }
        }
    }
}

/// One widget interaction state. Every state shares the corner radius and
/// stroke width; only the three colors vary, so the whole table below stays
/// readable at a glance.
fn widget(fill: Color32, stroke: Color32, fg: Color32) -> WidgetVisuals {
    WidgetVisuals {
        bg_fill: fill,
        weak_bg_fill: fill,
        bg_stroke: Stroke::new(1.0, stroke),
        corner_radius: CornerRadius::same(3),
        fg_stroke: Stroke::new(1.2, fg),
        expansion: 0.0,
    }
}

pub fn configure_style(ctx: &Context) {
    let mut style = Style::default();
    style.spacing.item_spacing = egui::vec2(5.0, 4.0);
    style.spacing.window_margin = egui::Margin::same(8);
    style.spacing.button_padding = egui::vec2(9.0, 4.0);
    style.spacing.scroll.bar_width = 7.0;

    let mut v = Visuals::dark();
    v.panel_fill = BG_PANEL;
    v.window_fill = BG_RAISED;
    v.faint_bg_color = BG_CANVAS;
    v.extreme_bg_color = BG_CANVAS;
    v.window_stroke = Stroke::new(1.0, BORDER);
    v.selection.bg_fill = ACCENT_DIM;
    v.selection.stroke = Stroke::new(1.0, Color32::BLACK);
    v.hyperlink_color = ACCENT_HOVER;
    v.override_text_color = Some(TEXT);

    v.widgets.noninteractive = widget(BG_PANEL, BORDER, TEXT_DIM);
    v.widgets.inactive = widget(BG_RAISED, BORDER, TEXT);
    v.widgets.hovered = widget(BG_HOVER, ACCENT_DIM, ACCENT_HOVER);
    v.widgets.active = widget(ACCENT_DIM, ACCENT, Color32::WHITE);
    v.widgets.open = widget(BG_HOVER, ACCENT_DIM, ACCENT_HOVER);

    ctx.set_visuals(v);
    ctx.set_style(style);
}
