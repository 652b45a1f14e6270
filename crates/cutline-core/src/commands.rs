// crates/cutline-core/src/commands.rs
//
// Every user action in Cutline is expressed as an EngineCommand.
// Gesture code and bridge handlers emit these; app.rs processes them after
// the UI pass, mutating the replica and mirroring each committed change to
// the host. Adding a new interaction = add a variant here + one match arm
// in app.rs.

use crate::bbox::ItemPlacement;
use crate::keyframes::KeyframePreview;
use crate::project::ItemKind;
use crate::selection::Modifiers;

#[derive(Clone, Debug, PartialEq)]
pub enum EngineCommand {
    // ── Selection ────────────────────────────────────────────────────────────
    SelectItem {
        id: String,
        kind: ItemKind,
        clear_selections: bool,
        modifiers: Modifiers,
        force_ripple: bool,
    },
    SelectAll,
    ClearAllSelections,

    // ── Playhead / preview ───────────────────────────────────────────────────
    /// Quantise to the FPS grid and move the playhead marker.
    SetPlayhead(f64),
    /// Ruler scrub: move the playhead and report the frame to the host so
    /// the preview window follows.
    ScrubPreview(f64),
    SeekToKeyframe(i64),

    // ── Live gesture updates (replica only, no host traffic) ─────────────────
    /// Per-frame optimistic placement of the dragged selection.
    PlaceItemsLive { moves: Vec<ItemPlacement> },
    /// Per-frame optimistic resize of one clip, with the active preview.
    ResizeClipLive {
        id: String,
        position: f64,
        start: f64,
        end: f64,
        preview: Option<KeyframePreview>,
    },
    ResizeTransitionLive { id: String, position: f64, end: f64, preview: Option<KeyframePreview> },

    // ── Gesture commits (replica + one host call per entity) ─────────────────
    /// Drag-stop of a group move. Positions are already FPS-grid-snapped.
    /// All entities share the gesture's transaction id.
    MoveItems { placements: Vec<ItemPlacement>, transaction: String },
    /// Trim-mode resize stop.
    TrimClip { id: String, position: f64, start: f64, end: f64, transaction: String },
    /// Retime-mode resize stop: `start` is pinned, the host rewrites the
    /// time curve, and the cached waveform is resampled locally.
    RetimeClip { id: String, position: f64, end: f64, transaction: String },
    ResizeTransition { id: String, position: f64, end: f64, transaction: String },
    /// Keyframe drag start: opens the host-side keyframe transaction.
    StartKeyframeDrag { id: String, kind: ItemKind, transaction: String },
    /// Keyframe drag stop: remap `old_frame` → `new_frame` across every
    /// property of the entity, color channels included, then finalize the
    /// host-side transaction.
    RemapKeyframe {
        id: String,
        kind: ItemKind,
        old_frame: i64,
        new_frame: i64,
        transaction: String,
    },

    // ── Context menus (pure host pass-through) ───────────────────────────────
    ShowClipMenu(String),
    ShowEffectMenu(String),
    ShowTransitionMenu(String),
    ShowTrackMenu(i32),
    ShowMarkerMenu(String),
    ShowPlayheadMenu,
    ShowTimelineMenu { seconds: f64, layer: i32 },
}
