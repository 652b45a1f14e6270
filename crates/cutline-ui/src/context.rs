// crates/cutline-ui/src/context.rs
//
// EngineContext owns all runtime handles that are NOT part of the project
// replica. CutlineApp holds one of these plus a Project and the module
// list — nothing else.

use cutline_bridge::{EngineLink, HostCall};
use cutline_core::keyframes::KeyframeCache;

use crate::interaction::InteractionContext;
use crate::theme::ThemeColors;
use crate::thumbs::ThumbnailCache;

/// A scroll change requested by the host, applied at the next frame when
/// the viewport geometry is known.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScrollRequest {
    /// Fraction of total canvas width, in [0, 1].
    Normalized(f64),
    /// Relative pixels.
    Delta(f64),
    /// Absolute canvas pixels (zoom re-anchoring).
    Pixels(f64),
    /// Put this time at viewport center, clamped at the edges.
    CenterOn(f64),
}

pub struct EngineContext {
    // ── Host bridge ──────────────────────────────────────────────────────────
    pub bridge: EngineLink,
    /// True once `enableQt` arrived; before that the engine operates on
    /// demo data and outbound calls go nowhere interesting.
    pub host_attached: bool,

    // ── Mode flags (host-owned toggles) ──────────────────────────────────────
    pub snapping: bool,
    pub razor: bool,
    pub timing: bool,
    pub follow: bool,
    /// External override of the dragging flag (`setDragging`).
    pub dragging_override: bool,

    // ── Host-fed display config ──────────────────────────────────────────────
    pub property_filter: String,
    /// `%s` is replaced by the layer number.
    pub track_label_format: String,
    pub thumb_server: Option<String>,
    pub theme: ThemeColors,

    // ── View state ───────────────────────────────────────────────────────────
    pub scroll_x: f32,
    pub viewport_width: f32,
    pub pending_scroll: Option<ScrollRequest>,
    /// Timeline seconds under the pointer, refreshed every frame. Razor
    /// slices and context menus read this instead of threading pointer
    /// positions through every command.
    pub cursor_seconds: f64,

    // ── Caches & gesture ─────────────────────────────────────────────────────
    pub kf_cache: KeyframeCache,
    pub thumbs: ThumbnailCache,
    pub interaction: InteractionContext,

    // ── Outbound dedupe ──────────────────────────────────────────────────────
    /// Last timeline length requested via ResizeTimeline, so autogrow fires
    /// once per growth instead of once per frame.
    pub last_growth_request: Option<f64>,
    /// Last scrub time a PlayheadMoved was emitted for. Sub-frame pointer
    /// moves at low zoom would otherwise flood the host with seeks.
    pub last_scrub_emitted: f64,
}

impl EngineContext {
    pub fn new(bridge: EngineLink) -> Self {
        EngineContext {
            bridge,
            host_attached: false,
            snapping: true,
            razor: false,
            timing: false,
            follow: false,
            dragging_override: false,
            property_filter: String::new(),
            track_label_format: "Track %s".into(),
            thumb_server: None,
            theme: ThemeColors::default(),
            scroll_x: 0.0,
            viewport_width: 0.0,
            pending_scroll: None,
            cursor_seconds: 0.0,
            kf_cache: KeyframeCache::new(),
            thumbs: ThumbnailCache::new(),
            interaction: InteractionContext::default(),
            last_growth_request: None,
            last_scrub_emitted: f64::NEG_INFINITY,
        }
    }

    /// The engine-wide dragging flag: a live gesture or the host override.
    pub fn dragging(&self) -> bool {
        self.dragging_override || self.interaction.dragging()
    }

    pub fn call(&self, call: HostCall) {
        self.bridge.call(call);
    }
}
