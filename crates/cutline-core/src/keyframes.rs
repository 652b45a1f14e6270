// crates/cutline-core/src/keyframes.rs
//
// Keyframe tracks, visible-keyframe enumeration, and the live trim/retime
// preview mapping.
//
// Three layers live here:
//
//   1. Serialized track types — `Point`, `Track`, `Property` match the host
//      project format (`Points`, `co.X`/`co.Y`, numeric interpolation) and
//      round-trip through serde unchanged. Frame indices (`co.X`) are
//      1-based integers stored as f64, exactly as the host writes them.
//
//   2. Enumeration — `clip_keyframes` / `transition_keyframes` walk every
//      animatable property of an entity (and its nested effects) and return
//      one `KeyframeMark` per visible frame. `KeyframeCache` memoises the
//      result per entity behind a stable signature so a scope refresh does
//      not re-walk every property tree.
//
//   3. Preview — `KeyframePreview` is the transient transform installed on
//      an entity while the user resizes it. Trim keeps source positions and
//      only re-tests the window; retime stretches them linearly into the
//      new display window.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::helpers::time::frame_to_seconds;
use crate::project::{Clip, Fps, ItemKind, Transition};

// ── Serialized track types ────────────────────────────────────────────────────

/// Interpolation of the segment leaving a point. Serialized as the host's
/// numeric code: 0 = bezier, 1 = linear, 2 = constant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Interpolation {
    Bezier = 0,
    #[default]
    Linear = 1,
    Constant = 2,
}

impl TryFrom<u8> for Interpolation {
    type Error = String;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Interpolation::Bezier),
            1 => Ok(Interpolation::Linear),
            2 => Ok(Interpolation::Constant),
            other => Err(format!("unknown interpolation code {other}")),
        }
    }
}

impl From<Interpolation> for u8 {
    fn from(i: Interpolation) -> u8 {
        i as u8
    }
}

/// A control-point coordinate: `x` is the 1-based frame, `y` the value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub co: Coord,
    #[serde(default)]
    pub interpolation: Interpolation,
}

impl Point {
    /// The point's frame as the integer the host means it to be.
    pub fn frame(&self) -> i64 {
        self.co.x.round() as i64
    }
}

/// One keyframe track: the `{ "Points": [...] }` objects of the host format.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(rename = "Points")]
    pub points: Vec<Point>,
}

impl Track {
    /// A track animates only when it holds more than one point; a single
    /// point is a constant value, not an animation.
    pub fn is_animated(&self) -> bool {
        self.points.len() > 1
    }

    pub fn sort(&mut self) {
        self.points
            .sort_by(|a, b| a.co.x.partial_cmp(&b.co.x).unwrap_or(std::cmp::Ordering::Equal));
    }
}

/// Color-valued property: three parallel scalar tracks with a shared schema.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorTracks {
    pub red: Track,
    pub green: Track,
    pub blue: Track,
}

/// An animatable property as stored on a clip, transition, or effect.
///
/// Untagged: the JSON shape decides. `Other` preserves host fields we do not
/// model (numbers, strings, readers) so an unknown property can never make a
/// whole entity fail to load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Property {
    Color(ColorTracks),
    Scalar(Track),
    Other(serde_json::Value),
}

impl Property {
    /// The track that contributes enumeration marks, if any.
    ///
    /// Scalar properties contribute their own points; color properties
    /// contribute through the red channel (the three channels share frames).
    pub fn marker_track(&self) -> Option<&Track> {
        match self {
            Property::Scalar(t) if t.is_animated() => Some(t),
            Property::Color(c) if c.red.is_animated() => Some(&c.red),
            _ => None,
        }
    }

    /// Every scalar track inside this property, for deep frame rewrites.
    pub fn tracks_mut(&mut self) -> Vec<&mut Track> {
        match self {
            Property::Scalar(t) => vec![t],
            Property::Color(c) => vec![&mut c.red, &mut c.green, &mut c.blue],
            Property::Other(_) => Vec::new(),
        }
    }
}

/// Property map of one entity, keyed by property name (`alpha`,
/// `location_x`, `time`, `wave_color`, …).
pub type PropertyMap = BTreeMap<String, Property>;

// ── Enumeration ───────────────────────────────────────────────────────────────

/// Palette assigned to per-clip effects, cycled by effect index. The mark
/// renderer tints effect keyframes with their effect's color so multiple
/// effects on one clip stay tellable apart.
pub const EFFECT_PALETTE: [[u8; 3]; 6] = [
    [242, 175, 72],
    [109, 196, 151],
    [102, 153, 255],
    [224, 106, 125],
    [181, 126, 220],
    [94, 198, 216],
];

/// One visible keyframe at a given frame of an entity.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyframeMark {
    pub interpolation: Interpolation,
    /// Whether the owning entity (or effect) is currently selected.
    pub selected: bool,
    /// Selection state of the top-level entity, regardless of which effect
    /// contributed the mark. Used for dimming during previews.
    pub base_selected: bool,
    pub kind: ItemKind,
    /// Id of the entity or nested effect that owns the contributing track.
    pub owner_id: String,
    /// False when a live preview maps this frame outside the display window.
    pub inside_preview: bool,
    /// Palette color for effect-owned marks; entity marks use the theme color.
    pub color: Option<[u8; 3]>,
}

/// Frame → mark for one entity. BTreeMap so marks iterate in frame order.
pub type MarkMap = BTreeMap<i64, KeyframeMark>;

fn name_passes(name: &str, filter: &str) -> bool {
    filter.is_empty() || name.to_lowercase().contains(&filter.to_lowercase())
}

/// Collision rule: first writer keeps the frame unless the newcomer is
/// selected and the incumbent is not.
fn insert_mark(map: &mut MarkMap, frame: i64, mark: KeyframeMark) {
    match map.get(&frame) {
        Some(existing) if existing.selected || !mark.selected => {}
        _ => {
            map.insert(frame, mark);
        }
    }
}

fn collect_property_marks(
    map: &mut MarkMap,
    properties: &PropertyMap,
    filter: &str,
    preview: Option<&KeyframePreview>,
    fps: Fps,
    template: &KeyframeMark,
) {
    for (name, property) in properties {
        if !name_passes(name, filter) {
            continue;
        }
        let Some(track) = property.marker_track() else { continue };
        for point in &track.points {
            let frame = point.frame();
            if frame < 1 {
                continue;
            }
            let inside = match preview {
                None => true,
                Some(p) => p.inside(p.map_seconds(frame_to_seconds(frame, fps)), fps),
            };
            let mark = KeyframeMark {
                interpolation: point.interpolation,
                inside_preview: inside,
                ..template.clone()
            };
            insert_mark(map, frame, mark);
        }
    }
}

/// Enumerate the visible keyframes of a clip.
///
/// Visibility gate: the clip must be selected, or one of its effects must be
/// selected, or a resize preview must be active — otherwise the map is
/// empty. `filter` restricts properties by case-insensitive substring.
pub fn clip_keyframes(clip: &Clip, fps: Fps, filter: &str) -> MarkMap {
    let mut map = MarkMap::new();
    let preview = clip.ui.keyframe_preview.as_ref();
    let any_effect_selected = clip.effects.iter().any(|e| e.selected);
    if !clip.selected && !any_effect_selected && preview.is_none() {
        return map;
    }

    if clip.selected || preview.is_some() {
        let template = KeyframeMark {
            interpolation: Interpolation::Linear,
            selected: clip.selected,
            base_selected: clip.selected,
            kind: ItemKind::Clip,
            owner_id: clip.id.clone(),
            inside_preview: true,
            color: None,
        };
        collect_property_marks(&mut map, &clip.properties, filter, preview, fps, &template);
    }

    for (index, effect) in clip.effects.iter().enumerate() {
        if !effect.selected && !clip.selected && preview.is_none() {
            continue;
        }
        let template = KeyframeMark {
            interpolation: Interpolation::Linear,
            selected: effect.selected,
            base_selected: clip.selected,
            kind: ItemKind::Effect,
            owner_id: effect.id.clone(),
            inside_preview: true,
            color: Some(EFFECT_PALETTE[index % EFFECT_PALETTE.len()]),
        };
        collect_property_marks(&mut map, &effect.properties, filter, preview, fps, &template);
    }

    map
}

/// Enumerate the visible keyframes of a transition. All keyframes are
/// returned while the transition is selected (or mid-resize preview).
pub fn transition_keyframes(tr: &Transition, fps: Fps, filter: &str) -> MarkMap {
    let mut map = MarkMap::new();
    let preview = tr.ui.keyframe_preview.as_ref();
    if !tr.selected && preview.is_none() {
        return map;
    }
    let template = KeyframeMark {
        interpolation: Interpolation::Linear,
        selected: tr.selected,
        base_selected: tr.selected,
        kind: ItemKind::Transition,
        owner_id: tr.id.clone(),
        inside_preview: true,
        color: None,
    };
    collect_property_marks(&mut map, &tr.properties, filter, preview, fps, &template);
    map
}

// ── Result caching ────────────────────────────────────────────────────────────

/// Memoises the last enumeration per entity behind a stable signature of
/// everything the result depends on (selection, effect-selection list,
/// filter, preview). A repeated signature returns the cached map without
/// re-walking the property trees.
#[derive(Default)]
pub struct KeyframeCache {
    entries: HashMap<String, (String, MarkMap)>,
}

fn preview_sig(preview: Option<&KeyframePreview>) -> String {
    match preview {
        None => "-".into(),
        Some(p) => p.signature(),
    }
}

fn clip_signature(clip: &Clip, filter: &str) -> String {
    let effects: String = clip
        .effects
        .iter()
        .map(|e| format!("{}:{};", e.id, e.selected as u8))
        .collect();
    format!(
        "c{};{};{};{}",
        clip.selected as u8,
        effects,
        filter,
        preview_sig(clip.ui.keyframe_preview.as_ref())
    )
}

fn transition_signature(tr: &Transition, filter: &str) -> String {
    format!(
        "t{};{};{}",
        tr.selected as u8,
        filter,
        preview_sig(tr.ui.keyframe_preview.as_ref())
    )
}

impl KeyframeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clip_marks(&mut self, clip: &Clip, fps: Fps, filter: &str) -> &MarkMap {
        let sig = clip_signature(clip, filter);
        let entry = self.entries.entry(clip.id.clone()).or_default();
        if entry.0 != sig {
            *entry = (sig, clip_keyframes(clip, fps, filter));
        }
        &entry.1
    }

    pub fn transition_marks(&mut self, tr: &Transition, fps: Fps, filter: &str) -> &MarkMap {
        let sig = transition_signature(tr, filter);
        let entry = self.entries.entry(tr.id.clone()).or_default();
        if entry.0 != sig {
            *entry = (sig, transition_keyframes(tr, fps, filter));
        }
        &entry.1
    }

    /// Drop one entity's memo — call after any keyframe-bearing mutation
    /// (the signature cannot see point edits, only selection/preview state).
    pub fn invalidate(&mut self, entity_id: &str) {
        self.entries.remove(entity_id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ── Transient entity UI state ─────────────────────────────────────────────────

/// Per-entity state that exists for the view, not the project: the host-fed
/// waveform peaks and the live resize preview. The preview is engine-local
/// and never serialized back to the host.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityUi {
    pub audio_data: Vec<f32>,
    #[serde(skip)]
    pub keyframe_preview: Option<KeyframePreview>,
}

// ── Live preview during trim / retime ─────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewMode {
    Trim,
    Retime,
}

/// Transient transform installed on an entity while the user resizes it.
///
/// All fields are source-time seconds except `pixels_per_second`, captured
/// at preview start so mark positions stay stable under concurrent zoom
/// changes from the host.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyframePreview {
    pub mode: PreviewMode,
    pub original_start: f64,
    pub original_end: f64,
    pub display_start: f64,
    pub display_end: f64,
    pub projected_start: f64,
    pub projected_end: f64,
    pub pixels_per_second: f64,
}

impl KeyframePreview {
    /// Map a keyframe's source-time seconds through the live transform.
    ///
    /// Trim is the identity — points keep their source positions and only
    /// the window test changes. Retime stretches `[projected_start,
    /// projected_end]` linearly onto `[display_start, display_end]`; a
    /// zero-length source or display span collapses every point onto
    /// `display_start`.
    pub fn map_seconds(&self, original: f64) -> f64 {
        match self.mode {
            PreviewMode::Trim => original,
            PreviewMode::Retime => {
                let projected = self.projected_end - self.projected_start;
                let display = self.display_end - self.display_start;
                if projected == 0.0 || display == 0.0 {
                    return self.display_start;
                }
                self.display_start + ((original - self.projected_start) / projected) * display
            }
        }
    }

    /// Window test with half-a-frame tolerance, so a keyframe sitting
    /// exactly on the trimmed edge still counts as inside.
    pub fn inside(&self, mapped: f64, fps: Fps) -> bool {
        let tol = (0.5 / fps.value()).max(1e-9);
        mapped >= self.display_start - tol && mapped <= self.display_end + tol
    }

    /// Pixel offset of a mapped keyframe from the entity's left edge.
    pub fn left_px(&self, mapped: f64) -> i64 {
        ((mapped - self.display_start) * self.pixels_per_second).round() as i64
    }

    fn signature(&self) -> String {
        format!(
            "{:?}:{:.6}:{:.6}:{:.6}:{:.6}:{:.6}:{:.6}:{:.3}",
            self.mode,
            self.original_start,
            self.original_end,
            self.display_start,
            self.display_end,
            self.projected_start,
            self.projected_end,
            self.pixels_per_second,
        )
    }
}

// ── Frame remap (commit path) ─────────────────────────────────────────────────

/// Rewrite every point at `old_frame` to `new_frame` across all tracks of a
/// property map, color channels included. Returns how many points moved.
pub fn remap_frames(properties: &mut PropertyMap, old_frame: i64, new_frame: i64) -> usize {
    let mut moved = 0;
    for property in properties.values_mut() {
        for track in property.tracks_mut() {
            for point in &mut track.points {
                if point.frame() == old_frame {
                    point.co.x = new_frame as f64;
                    moved += 1;
                }
            }
            if moved > 0 {
                track.sort();
            }
        }
    }
    moved
}

/// Remap a frame across a clip and every nested effect.
pub fn remap_clip_frames(clip: &mut Clip, old_frame: i64, new_frame: i64) -> usize {
    let mut moved = remap_frames(&mut clip.properties, old_frame, new_frame);
    for effect in &mut clip.effects {
        moved += remap_frames(&mut effect.properties, old_frame, new_frame);
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::test_fixtures::{clip_with_alpha_track, transition_at};

    const FPS24: Fps = Fps { num: 24, den: 1 };

    fn track(frames: &[i64]) -> Track {
        Track {
            points: frames
                .iter()
                .map(|&f| Point {
                    co: Coord { x: f as f64, y: 0.5 },
                    interpolation: Interpolation::Linear,
                })
                .collect(),
        }
    }

    #[test]
    fn unselected_clip_yields_no_marks() {
        let clip = clip_with_alpha_track(&[1, 25]);
        assert!(clip_keyframes(&clip, FPS24, "").is_empty());
    }

    #[test]
    fn selected_clip_yields_animated_tracks_only() {
        let mut clip = clip_with_alpha_track(&[1, 25]);
        clip.selected = true;
        // A single-point property is a constant, not an animation.
        clip.properties
            .insert("volume".into(), Property::Scalar(track(&[7])));
        let marks = clip_keyframes(&clip, FPS24, "");
        assert_eq!(marks.keys().copied().collect::<Vec<_>>(), vec![1, 25]);
    }

    #[test]
    fn color_property_contributes_via_red_channel() {
        let mut clip = clip_with_alpha_track(&[1, 25]);
        clip.selected = true;
        clip.properties.insert(
            "wave_color".into(),
            Property::Color(ColorTracks {
                red: track(&[5, 13]),
                green: track(&[5]),
                blue: track(&[5]),
            }),
        );
        let marks = clip_keyframes(&clip, FPS24, "");
        assert!(marks.contains_key(&5) && marks.contains_key(&13));
    }

    #[test]
    fn filter_restricts_by_property_substring() {
        let mut clip = clip_with_alpha_track(&[1, 25]);
        clip.selected = true;
        clip.properties
            .insert("location_x".into(), Property::Scalar(track(&[40, 50])));
        let marks = clip_keyframes(&clip, FPS24, "LOC");
        assert_eq!(marks.keys().copied().collect::<Vec<_>>(), vec![40, 50]);
    }

    #[test]
    fn selected_mark_wins_frame_collision() {
        let mut clip = clip_with_alpha_track(&[10, 20]);
        clip.selected = false;
        let mut effect = crate::project::Effect::new("fx1", "blur");
        effect.selected = true;
        effect
            .properties
            .insert("sigma".into(), Property::Scalar(track(&[10, 30])));
        clip.effects.push(effect);

        let marks = clip_keyframes(&clip, FPS24, "");
        // Clip is unselected so only the selected effect contributes; its
        // mark owns frame 10.
        assert_eq!(marks[&10].owner_id, "fx1");
        assert_eq!(marks[&10].kind, crate::project::ItemKind::Effect);
        assert!(marks[&10].selected);
        assert!(!marks[&10].base_selected);
        assert!(marks[&10].color.is_some());
    }

    #[test]
    fn trim_preview_flags_outside_marks_but_keeps_them() {
        let mut clip = clip_with_alpha_track(&[1, 49]); // 0.0 s and 2.0 s
        clip.selected = true;
        clip.ui.keyframe_preview = Some(KeyframePreview {
            mode: PreviewMode::Trim,
            original_start: 0.0,
            original_end: 4.0,
            display_start: 0.0,
            display_end: 1.0,
            projected_start: 0.0,
            projected_end: 4.0,
            pixels_per_second: 50.0,
        });
        let marks = clip_keyframes(&clip, FPS24, "");
        assert!(marks[&1].inside_preview);
        assert!(!marks[&49].inside_preview);
        assert_eq!(marks.len(), 2, "outside marks stay enumerable for dimming");
    }

    #[test]
    fn retime_mapping_is_linear_and_collapses_on_zero_span() {
        let preview = KeyframePreview {
            mode: PreviewMode::Retime,
            original_start: 0.0,
            original_end: 4.0,
            display_start: 0.0,
            display_end: 2.0,
            projected_start: 0.0,
            projected_end: 4.0,
            pixels_per_second: 50.0,
        };
        assert_eq!(preview.map_seconds(2.0), 1.0);
        assert_eq!(preview.map_seconds(4.0), 2.0);

        let degenerate = KeyframePreview {
            display_end: 0.0,
            ..preview
        };
        assert_eq!(degenerate.map_seconds(3.0), 0.0);
    }

    #[test]
    fn preview_left_px_rounds_the_offset() {
        let preview = KeyframePreview {
            mode: PreviewMode::Trim,
            original_start: 1.0,
            original_end: 5.0,
            display_start: 1.0,
            display_end: 5.0,
            projected_start: 1.0,
            projected_end: 5.0,
            pixels_per_second: 33.3,
        };
        assert_eq!(preview.left_px(2.0), (1.0 * 33.3_f64).round() as i64);
    }

    #[test]
    fn cache_hits_until_signature_changes() {
        let mut clip = clip_with_alpha_track(&[1, 25]);
        clip.selected = true;
        let mut cache = KeyframeCache::new();
        let first = cache.clip_marks(&clip, FPS24, "").clone();
        assert_eq!(cache.clip_marks(&clip, FPS24, ""), &first);

        clip.selected = false;
        assert!(cache.clip_marks(&clip, FPS24, "").is_empty());
    }

    #[test]
    fn transition_marks_require_selection() {
        let mut tr = transition_at("tr1", 1, 2.0, 1.0);
        tr.properties
            .insert("brightness".into(), Property::Scalar(track(&[1, 12])));
        assert!(transition_keyframes(&tr, FPS24, "").is_empty());
        tr.selected = true;
        assert_eq!(transition_keyframes(&tr, FPS24, "").len(), 2);
    }

    #[test]
    fn remap_rewrites_every_channel_and_resorts() {
        let mut clip = clip_with_alpha_track(&[1, 25]);
        clip.properties.insert(
            "wave_color".into(),
            Property::Color(ColorTracks {
                red: track(&[25, 40]),
                green: track(&[25, 40]),
                blue: track(&[25, 40]),
            }),
        );
        let moved = remap_frames(&mut clip.properties, 25, 49);
        assert_eq!(moved, 4); // alpha + three color channels
        match &clip.properties["wave_color"] {
            Property::Color(c) => {
                let frames: Vec<i64> = c.red.points.iter().map(|p| p.frame()).collect();
                assert_eq!(frames, vec![40, 49], "points stay sorted after remap");
            }
            _ => unreachable!(),
        }
    }
}
