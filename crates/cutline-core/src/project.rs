// crates/cutline-core/src/project.rs
// Pure project data — no egui, no host handles. Serializable via serde in
// the host JSON shape (keyframe tracks flattened onto entities, transitions
// stored under the host's "effects" key). The engine holds this as a
// read-mostly replica; the native host owns the authoritative copy.

use serde::{Deserialize, Serialize};

use crate::helpers::time::{pixels_per_second, snap_to_fps_grid, to_finite};
use crate::keyframes::{EntityUi, PropertyMap};

/// Rational frames-per-second. `den` is never 0 in a valid project; the
/// accessor guards anyway so arithmetic on a broken project stays finite.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fps {
    pub num: i32,
    pub den: i32,
}

impl Fps {
    pub fn value(&self) -> f64 {
        if self.den == 0 {
            return self.num as f64;
        }
        self.num as f64 / self.den as f64
    }
}

impl Default for Fps {
    fn default() -> Self {
        Fps { num: 30, den: 1 }
    }
}

/// What kind of timeline entity an id refers to. The host addresses items
/// by `(id, kind)` pairs in every selection and context-menu call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Clip,
    Transition,
    Effect,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Clip => "clip",
            ItemKind::Transition => "transition",
            ItemKind::Effect => "effect",
        }
    }

    pub fn parse(s: &str) -> Option<ItemKind> {
        match s {
            "clip" => Some(ItemKind::Clip),
            "transition" => Some(ItemKind::Transition),
            "effect" => Some(ItemKind::Effect),
            _ => None,
        }
    }
}

/// Common surface of the two positioned entity kinds. Lets the snap and
/// bounding-box engines treat clips and transitions uniformly.
pub trait TimelineItem {
    fn id(&self) -> &str;
    fn layer(&self) -> i32;
    /// `(left, right)` in timeline seconds.
    fn time_extent(&self) -> (f64, f64);
    fn selected(&self) -> bool;
    fn set_selected(&mut self, selected: bool);
    fn kind(&self) -> ItemKind;
}

// ── Layers ────────────────────────────────────────────────────────────────────

/// A horizontal track row. `number` is the host-assigned address (higher
/// renders above); `y` and `height` are display-only and recomputed by
/// `reindex_layers` after every structural change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub number: i32,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub lock: bool,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_track_height")]
    pub height: f64,
}

fn default_track_height() -> f64 {
    62.0
}

impl Layer {
    pub fn new(number: i32) -> Self {
        Layer {
            number,
            label: String::new(),
            lock: false,
            y: 0.0,
            height: default_track_height(),
        }
    }
}

// ── Clips ─────────────────────────────────────────────────────────────────────

/// Media descriptor for a clip's source, as reported by the host.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reader {
    pub has_video: bool,
    pub has_audio: bool,
    pub fps: Fps,
    /// Natural duration of the source media in seconds — the trim ceiling
    /// for the right handle unless a time curve lifts it.
    pub duration: f64,
    pub video_length: i64,
    pub media_type: String,
    pub has_single_image: bool,
}

/// A placed instance of a media source: a trimmed source slice
/// `[start, end]` anchored at `position` timeline seconds on `layer`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: String,
    pub file_id: String,
    pub layer: i32,
    pub position: f64,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub reader: Reader,
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub ui: EntityUi,
    /// Keyframe tracks keyed by property name, flattened into the entity
    /// JSON the way the host writes them (`alpha`, `location_x`, `time`,
    /// `wave_color`, …). Unknown host fields survive here untouched.
    #[serde(flatten)]
    pub properties: PropertyMap,
}

impl Clip {
    /// Visible length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn left(&self) -> f64 {
        self.position
    }

    pub fn right(&self) -> f64 {
        self.position + self.duration()
    }

    /// A still image has no natural duration; trimming it longer than the
    /// source is legal.
    pub fn is_single_image(&self) -> bool {
        self.reader.has_single_image
    }

    /// The multi-point `time` curve retiming this clip, if one exists.
    pub fn time_curve(&self) -> Option<&crate::keyframes::Track> {
        self.properties.get("time").and_then(|p| p.marker_track())
    }
}

impl TimelineItem for Clip {
    fn id(&self) -> &str {
        &self.id
    }
    fn layer(&self) -> i32 {
        self.layer
    }
    fn time_extent(&self) -> (f64, f64) {
        (self.left(), self.right())
    }
    fn selected(&self) -> bool {
        self.selected
    }
    fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }
    fn kind(&self) -> ItemKind {
        ItemKind::Clip
    }
}

// ── Transitions ───────────────────────────────────────────────────────────────

/// An overlap-region entity. Unlike clips, transitions have no source
/// slice: `start` is always 0 and `end` is the duration. They may overlap
/// clips and each other freely.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub id: String,
    pub layer: i32,
    pub position: f64,
    #[serde(default)]
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub ui: EntityUi,
    #[serde(flatten)]
    pub properties: PropertyMap,
}

impl Transition {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn left(&self) -> f64 {
        self.position
    }

    pub fn right(&self) -> f64 {
        self.position + self.duration()
    }
}

impl TimelineItem for Transition {
    fn id(&self) -> &str {
        &self.id
    }
    fn layer(&self) -> i32 {
        self.layer
    }
    fn time_extent(&self) -> (f64, f64) {
        (self.left(), self.right())
    }
    fn selected(&self) -> bool {
        self.selected
    }
    fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }
    fn kind(&self) -> ItemKind {
        ItemKind::Transition
    }
}

// ── Effects / markers / cache ranges ──────────────────────────────────────────

/// A processing node nested in a clip. No own position — it inherits the
/// parent clip's timeline extent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub id: String,
    #[serde(rename = "type")]
    pub effect_type: String,
    #[serde(default)]
    pub selected: bool,
    #[serde(flatten)]
    pub properties: PropertyMap,
}

impl Effect {
    pub fn new(id: &str, effect_type: &str) -> Self {
        Effect {
            id: id.into(),
            effect_type: effect_type.into(),
            selected: false,
            properties: PropertyMap::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: String,
    pub position: f64,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub vector: String,
}

/// A half-open interval of already-rendered frames, drawn as a stripe on
/// the ruler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRange {
    pub start_frame: i64,
    pub end_frame: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Progress {
    pub ranges: Vec<CacheRange>,
}

// ── Missing-transition proposal ───────────────────────────────────────────────

/// Overlap region reported to the host after a single-clip drop, so the
/// host can offer to fill it with a transition.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransitionProposal {
    pub layer: i32,
    pub position: f64,
    pub start: f64,
    pub end: f64,
}

/// Overlaps shorter than this are accidental nudges, not transitions.
const MIN_PROPOSAL_SECONDS: f64 = 0.5;
/// Edge-coincidence radius against existing transitions.
const PROPOSAL_EDGE_EPSILON: f64 = 0.01;

// ── Project ───────────────────────────────────────────────────────────────────

/// Timeline autogrow floor and headroom (seconds).
pub const MIN_TIMELINE_SECONDS: f64 = 300.0;
pub const TIMELINE_PAD_SECONDS: f64 = 10.0;

/// The whole project replica. `version` is engine-local and bumps on every
/// mutation so caches can tell stale reads apart.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub fps: Fps,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub scale: f64,
    #[serde(default)]
    pub tick_pixels: f64,
    #[serde(default)]
    pub playhead_position: f64,
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub clips: Vec<Clip>,
    /// Host key is "effects": transitions live in the project-level effects
    /// list of the host format.
    #[serde(default, rename = "effects")]
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub progress: Progress,
    #[serde(skip)]
    pub version: u64,
    #[serde(skip)]
    pub last_selected: Option<(String, ItemKind)>,
}

impl Project {
    pub fn pixels_per_second(&self) -> f64 {
        pixels_per_second(self.tick_pixels, self.scale)
    }

    pub fn bump_version(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    // ── Ordering ─────────────────────────────────────────────────────────

    /// Restore the invariant sort orders: clips and transitions by
    /// `position`, layers by `number`. Called after every load, diff
    /// application, and drag stop.
    pub fn sort_entities(&mut self) {
        self.clips.sort_by(|a, b| {
            a.position
                .partial_cmp(&b.position)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        self.transitions.sort_by(|a, b| {
            a.position
                .partial_cmp(&b.position)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        self.layers.sort_by_key(|l| l.number);
    }

    /// Recompute display `y` for every layer. Higher `number` renders
    /// above, so the highest-numbered layer gets `y = 0` and rows stack
    /// downward from there.
    pub fn reindex_layers(&mut self) {
        let mut order: Vec<usize> = (0..self.layers.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(self.layers[i].number));
        let mut y = 0.0;
        for i in order {
            self.layers[i].y = y;
            y += self.layers[i].height;
        }
    }

    /// Sort + reindex in one step.
    pub fn normalize(&mut self) {
        self.sort_entities();
        self.reindex_layers();
    }

    // ── Lookup ───────────────────────────────────────────────────────────

    pub fn layer(&self, number: i32) -> Option<&Layer> {
        self.layers.iter().find(|l| l.number == number)
    }

    pub fn has_layer(&self, number: i32) -> bool {
        self.layer(number).is_some()
    }

    /// The layer whose row contains view-space `y`, walking layers in
    /// display order. `None` only when the project has no layers at all;
    /// a y past the last row returns the bottom layer so drops below the
    /// tracks land somewhere sensible.
    pub fn find_track_at_y(&self, y: f64) -> Option<&Layer> {
        let mut rows: Vec<&Layer> = self.layers.iter().collect();
        rows.sort_by(|a, b| a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal));
        if y < 0.0 {
            return rows.first().copied();
        }
        for layer in &rows {
            if y >= layer.y && y < layer.y + layer.height {
                return Some(layer);
            }
        }
        rows.last().copied()
    }

    pub fn clip(&self, id: &str) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    pub fn clip_mut(&mut self, id: &str) -> Option<&mut Clip> {
        self.clips.iter_mut().find(|c| c.id == id)
    }

    pub fn transition(&self, id: &str) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.id == id)
    }

    pub fn transition_mut(&mut self, id: &str) -> Option<&mut Transition> {
        self.transitions.iter_mut().find(|t| t.id == id)
    }

    /// Resolve an effect id: the global transition-level list first, then
    /// every clip's nested effects. Returns the owning clip's id for
    /// nested hits.
    pub fn find_effect(&self, id: &str) -> Option<(Option<&str>, &Effect)> {
        for clip in &self.clips {
            if let Some(e) = clip.effects.iter().find(|e| e.id == id) {
                return Some((Some(clip.id.as_str()), e));
            }
        }
        None
    }

    // ── Playhead ─────────────────────────────────────────────────────────

    /// Move the playhead, quantised to the FPS grid and clamped at 0.
    pub fn move_playhead(&mut self, t: f64) {
        let t = to_finite(t, self.playhead_position).max(0.0);
        self.playhead_position = snap_to_fps_grid(t, self.fps);
    }

    // ── Autogrow ─────────────────────────────────────────────────────────

    /// Right edge of the furthest clip, in seconds.
    pub fn max_right(&self) -> f64 {
        self.clips.iter().map(|c| c.right()).fold(0.0, f64::max)
    }

    /// New timeline length to request from the host, if the content has
    /// outgrown the current duration.
    pub fn required_duration(&self) -> Option<f64> {
        let max_right = self.max_right();
        if max_right > self.duration {
            Some((max_right + TIMELINE_PAD_SECONDS).max(MIN_TIMELINE_SECONDS))
        } else {
            None
        }
    }

    // ── Missing-transition detection ─────────────────────────────────────

    /// After a single-clip drop, search the clip's layer for a partial
    /// overlap worth filling with a transition. Whole-containment is not an
    /// overlap region; proposals shorter than half a second or coinciding
    /// with an existing transition edge are rejected.
    pub fn detect_missing_transition(&self, clip_id: &str) -> Option<TransitionProposal> {
        let clip = self.clip(clip_id)?;
        for other in &self.clips {
            if other.id == clip.id || other.layer != clip.layer {
                continue;
            }
            let proposal = if clip.left() < other.right() && clip.left() > other.left() {
                TransitionProposal {
                    layer: clip.layer,
                    position: clip.left(),
                    start: 0.0,
                    end: other.right() - clip.left(),
                }
            } else if clip.right() > other.left() && clip.right() < other.right() {
                TransitionProposal {
                    layer: clip.layer,
                    position: other.left(),
                    start: 0.0,
                    end: clip.right() - other.left(),
                }
            } else {
                continue;
            };

            if proposal.end - proposal.start < MIN_PROPOSAL_SECONDS {
                continue;
            }
            let left = proposal.position;
            let right = proposal.position + (proposal.end - proposal.start);
            let taken = self.transitions.iter().any(|t| {
                t.layer == proposal.layer
                    && ((t.left() - left).abs() < PROPOSAL_EDGE_EPSILON
                        || (t.right() - right).abs() < PROPOSAL_EDGE_EPSILON)
            });
            if taken {
                continue;
            }
            return Some(proposal);
        }
        None
    }
}

// ── Test fixtures ─────────────────────────────────────────────────────────────

#[cfg(test)]
pub mod test_fixtures {
    use super::*;
    use crate::keyframes::{Coord, Interpolation, Point, Property, Track};

    /// 24 fps project with five unlocked layers and a 50 px/s view.
    pub fn base_project() -> Project {
        let mut p = Project {
            fps: Fps { num: 24, den: 1 },
            duration: 300.0,
            scale: 2.0,
            tick_pixels: 100.0,
            layers: (1..=5).map(Layer::new).collect(),
            ..Project::default()
        };
        p.normalize();
        p
    }

    pub fn clip_at(id: &str, layer: i32, position: f64, start: f64, end: f64) -> Clip {
        Clip {
            id: id.into(),
            file_id: format!("file-{id}"),
            layer,
            position,
            start,
            end,
            selected: false,
            reader: Reader {
                has_video: true,
                has_audio: true,
                fps: Fps { num: 24, den: 1 },
                duration: 30.0,
                video_length: 720,
                media_type: "video".into(),
                has_single_image: false,
            },
            effects: Vec::new(),
            ui: EntityUi::default(),
            properties: PropertyMap::new(),
        }
    }

    /// A clip at position 0 with an animated `alpha` track on the given
    /// 1-based frames.
    pub fn clip_with_alpha_track(frames: &[i64]) -> Clip {
        let mut clip = clip_at("clip-kf", 1, 0.0, 0.0, 4.0);
        clip.properties.insert(
            "alpha".into(),
            Property::Scalar(Track {
                points: frames
                    .iter()
                    .map(|&f| Point {
                        co: Coord { x: f as f64, y: 1.0 },
                        interpolation: Interpolation::Bezier,
                    })
                    .collect(),
            }),
        );
        clip
    }

    pub fn transition_at(id: &str, layer: i32, position: f64, duration: f64) -> Transition {
        Transition {
            id: id.into(),
            layer,
            position,
            start: 0.0,
            end: duration,
            selected: false,
            ui: EntityUi::default(),
            properties: PropertyMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_fixtures::*;
    use super::*;

    #[test]
    fn reindex_puts_highest_layer_on_top() {
        let mut p = base_project();
        p.reindex_layers();
        let top = p.layer(5).unwrap();
        let bottom = p.layer(1).unwrap();
        assert_eq!(top.y, 0.0);
        assert!(bottom.y > top.y);
    }

    #[test]
    fn find_track_at_y_walks_display_order() {
        let p = base_project();
        assert_eq!(p.find_track_at_y(0.0).unwrap().number, 5);
        assert_eq!(p.find_track_at_y(70.0).unwrap().number, 4);
        // Past the last row → bottom layer.
        assert_eq!(p.find_track_at_y(10_000.0).unwrap().number, 1);
    }

    #[test]
    fn sort_entities_orders_by_position() {
        let mut p = base_project();
        p.clips.push(clip_at("b", 1, 8.0, 0.0, 2.0));
        p.clips.push(clip_at("a", 1, 3.0, 0.0, 2.0));
        p.sort_entities();
        let order: Vec<&str> = p.clips.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn playhead_quantises_and_clamps() {
        let mut p = base_project();
        p.move_playhead(1.02);
        assert_eq!(p.playhead_position, 1.0);
        p.move_playhead(-3.0);
        assert_eq!(p.playhead_position, 0.0);
        p.move_playhead(f64::NAN);
        assert_eq!(p.playhead_position, 0.0, "NaN keeps the previous position");
    }

    #[test]
    fn autogrow_pads_and_floors() {
        let mut p = base_project();
        p.duration = 300.0;
        p.clips.push(clip_at("a", 1, 299.0, 0.0, 4.0));
        // 303 > 300 → request 313, already above the floor.
        assert_eq!(p.required_duration(), Some(313.0));

        p.duration = 400.0;
        assert_eq!(p.required_duration(), None);
    }

    #[test]
    fn missing_transition_reported_for_partial_overlap() {
        // Literal boundary scenario: A [0,5], B dropped at [4,10], layer 1.
        let mut p = base_project();
        p.clips.push(clip_at("a", 1, 0.0, 0.0, 5.0));
        p.clips.push(clip_at("b", 1, 4.0, 0.0, 6.0));
        let proposal = p.detect_missing_transition("b").unwrap();
        assert_eq!(proposal.layer, 1);
        assert_eq!(proposal.position, 4.0);
        assert_eq!(proposal.start, 0.0);
        assert_eq!(proposal.end, 1.0);
    }

    #[test]
    fn short_overlaps_and_taken_edges_are_rejected() {
        let mut p = base_project();
        p.clips.push(clip_at("a", 1, 0.0, 0.0, 5.0));
        p.clips.push(clip_at("b", 1, 4.7, 0.0, 6.0)); // 0.3 s overlap
        assert!(p.detect_missing_transition("b").is_none());

        p.clips[1].position = 4.0; // 1.0 s overlap, but edge already taken:
        p.transitions.push(transition_at("tr", 1, 4.0, 2.0));
        assert!(p.detect_missing_transition("b").is_none());
    }

    #[test]
    fn overlap_on_other_layers_is_ignored() {
        let mut p = base_project();
        p.clips.push(clip_at("a", 1, 0.0, 0.0, 5.0));
        p.clips.push(clip_at("b", 2, 4.0, 0.0, 6.0));
        assert!(p.detect_missing_transition("b").is_none());
    }

    #[test]
    fn effect_lookup_searches_nested_clips() {
        let mut p = base_project();
        let mut clip = clip_at("a", 1, 0.0, 0.0, 5.0);
        clip.effects.push(Effect::new("fx9", "blur"));
        p.clips.push(clip);
        let (owner, effect) = p.find_effect("fx9").unwrap();
        assert_eq!(owner, Some("a"));
        assert_eq!(effect.effect_type, "blur");
        assert!(p.find_effect("nope").is_none());
    }

    #[test]
    fn project_round_trips_through_host_json() {
        let mut p = base_project();
        p.clips.push(clip_with_alpha_track(&[1, 25]));
        p.transitions.push(transition_at("tr", 2, 1.0, 2.0));
        let json = serde_json::to_value(&p).unwrap();
        // Host format invariants: transitions under "effects", keyframe
        // tracks flattened with capitalised Points/co.X.
        assert!(json.get("effects").is_some());
        assert!(json["clips"][0]["alpha"]["Points"][0]["co"]["X"].is_number());
        let back: Project = serde_json::from_value(json).unwrap();
        assert_eq!(back.clips[0].properties, p.clips[0].properties);
    }
}
