// crates/cutline-ui/src/interaction.rs
//
// Per-gesture state. Exactly one gesture may hold the interaction context
// at a time — the `dragging()` flag is what the selection machine and the
// other directives consult before acting. The context lives on
// EngineContext and is cleared on every drag stop, blur, or refusal.

use cutline_core::bbox::BoundingBox;
use cutline_core::keyframes::PreviewMode;
use cutline_core::project::ItemKind;
use egui::Pos2;

/// Which edge of a clip or transition a resize grabbed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeHandle {
    Left,
    Right,
}

/// Shape of a clip when its resize began, for constraint math and restore.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipShape {
    pub position: f64,
    pub start: f64,
    pub end: f64,
}

#[derive(Clone, Debug)]
pub struct MoveGesture {
    pub bbox: BoundingBox,
    /// Pointer position at drag start, canvas space.
    pub origin: Pos2,
    pub transaction: String,
    /// Last proposal hit a locked layer; items are parked at their start
    /// positions until the pointer leaves the refused span.
    pub refused: bool,
    /// Last applied snap-corrected delta, used for the commit at stop.
    pub last_dx: f64,
    pub last_dy: f64,
}

#[derive(Clone, Debug)]
pub struct ClipResizeGesture {
    pub id: String,
    pub handle: EdgeHandle,
    pub mode: PreviewMode,
    pub original: ClipShape,
    /// Pointer x at drag start, canvas space — deltas are cumulative so
    /// constraint clamps never accumulate rounding.
    pub pointer_origin_x: f32,
    /// Trim ceiling for the right handle, None = unlimited (timing mode or
    /// a time curve lifts the reader limit).
    pub max_duration: Option<f64>,
    pub transaction: String,
}

#[derive(Clone, Debug)]
pub struct TransitionResizeGesture {
    pub id: String,
    pub handle: EdgeHandle,
    pub original_position: f64,
    pub original_end: f64,
    pub pointer_origin_x: f32,
    pub transaction: String,
}

#[derive(Clone, Debug)]
pub struct KeyframeDrag {
    pub kind: ItemKind,
    pub entity_id: String,
    pub original_frame: i64,
    /// Live candidate, FPS-grid-snapped and clamped to the visible slice.
    pub candidate_frame: i64,
    pub transaction: String,
}

#[derive(Clone, Debug)]
pub struct MarqueeState {
    pub origin: Pos2,
    pub current: Pos2,
    /// Ctrl held at marquee start: add to the selection instead of
    /// replacing it.
    pub additive: bool,
}

#[derive(Clone, Debug)]
pub enum Gesture {
    Move(MoveGesture),
    ResizeClip(ClipResizeGesture),
    ResizeTransition(TransitionResizeGesture),
    Keyframe(KeyframeDrag),
    Marquee(MarqueeState),
}

/// The one mutable home for everything a gesture needs, passed explicitly
/// to the drag handlers. Its lifetime is the gesture.
#[derive(Default)]
pub struct InteractionContext {
    pub gesture: Option<Gesture>,
    /// Canvas-space x of the active snap guide, if one is showing.
    pub snapline_px: Option<f32>,
}

impl InteractionContext {
    pub fn dragging(&self) -> bool {
        self.gesture.is_some()
    }

    /// Drag stop / blur / refusal: drop the gesture and the snap guide
    /// together so neither outlives the interaction.
    pub fn clear(&mut self) {
        self.gesture = None;
        self.snapline_px = None;
    }

    pub fn show_snapline(&mut self, px: f32) {
        self.snapline_px = Some(px);
    }

    pub fn hide_snapline(&mut self) {
        self.snapline_px = None;
    }

    /// The keyframe drag candidate for an entity, if that entity is the
    /// one being dragged. The renderer draws this frame at the pointer
    /// instead of its committed position.
    pub fn keyframe_candidate(&self, entity_id: &str) -> Option<(i64, i64)> {
        match &self.gesture {
            Some(Gesture::Keyframe(k)) if k.entity_id == entity_id => {
                Some((k.original_frame, k.candidate_frame))
            }
            _ => None,
        }
    }
}
