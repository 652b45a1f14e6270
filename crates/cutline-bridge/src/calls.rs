// crates/cutline-bridge/src/calls.rs
//
// Outbound host calls — everything the engine tells the native host.
// Plain data, one variant per host method. Payload-bearing commits carry
// the full updated entity as JSON plus the gesture's transaction id so the
// host can group every call of one gesture into a single undoable action.

use cutline_core::project::ItemKind;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub enum HostCall {
    // ── Selection sync ────────────────────────────────────────────────────────
    AddSelection { id: String, kind: ItemKind, clear_others: bool },
    RemoveSelection { id: String, kind: ItemKind },

    // ── Entity commits ────────────────────────────────────────────────────────
    UpdateClipData {
        json: Value,
        allow_keyframes: bool,
        force_json_diff: bool,
        ignore_refresh: bool,
        transaction_id: Option<String>,
    },
    UpdateTransitionData {
        json: Value,
        force_json_diff: bool,
        ignore_refresh: bool,
        transaction_id: Option<String>,
    },

    // ── Keyframe transactions ─────────────────────────────────────────────────
    StartKeyframeDrag { kind: ItemKind, id: String, transaction_id: String },
    FinalizeKeyframeDrag { kind: ItemKind, id: String },

    // ── Timing ────────────────────────────────────────────────────────────────
    /// The host recomputes the clip's time curve for the new duration;
    /// `end` and `position` are already FPS-grid-snapped.
    RetimeClip { id: String, end: f64, position: f64 },
    SeekToKeyframe { frame: i64 },

    // ── Razor ─────────────────────────────────────────────────────────────────
    RazorSliceAtCursor { clip_id: String, transition_id: String, seconds: f64 },

    // ── Preview & lifecycle ───────────────────────────────────────────────────
    PlayheadMoved { frame: i64 },
    PreviewClipFrame { clip_id: String, frame: i64 },
    PageReady,
    QtLog { level: String, msg: String },
    ResizeTimeline { seconds: f64 },

    // ── Context menus ─────────────────────────────────────────────────────────
    ShowClipMenu { id: String },
    ShowEffectMenu { id: String },
    ShowTransitionMenu { id: String },
    ShowTrackMenu { layer: i32 },
    ShowMarkerMenu { id: String },
    ShowPlayheadMenu,
    ShowTimelineMenu { seconds: f64, layer: i32 },

    // ── Proposals ─────────────────────────────────────────────────────────────
    AddMissingTransition { json: Value },
}
