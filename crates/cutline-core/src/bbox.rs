// crates/cutline-core/src/bbox.rs
//
// Bounding-box engine for group moves.
//
// Built once at drag start from every selected clip and transition, the box
// remembers each element's starting pixel rect. Every drag frame proposes a
// cumulative (dx, dy) from the gesture origin; the engine snap-corrects dx
// against the box edges and refuses any move whose vertical span would
// cross a locked layer. Applying the same corrected delta to every element
// preserves relative offsets within the selection.

use std::collections::HashSet;

use crate::helpers::time::{pixel_to_time, snap_to_fps_grid, time_to_pixel};
use crate::project::{ItemKind, Project, TimelineItem};
use crate::snap::{find_snap, Snap, SnapQuery};

/// One member of the dragged selection, with its starting pixel rect.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxElement {
    pub id: String,
    pub kind: ItemKind,
    pub left_px: f64,
    pub top_px: f64,
    pub width_px: f64,
    pub height_px: f64,
}

/// Snap configuration for a move. Disabled snapping still draws no line and
/// applies no correction — the query is simply skipped.
#[derive(Clone, Copy, Debug)]
pub struct SnapOptions {
    pub enabled: bool,
    pub threshold_px: f64,
    pub include_keyframes: bool,
}

/// Outcome of one proposed move.
#[derive(Clone, Debug, PartialEq)]
pub enum MoveOutcome {
    /// The span would cross a locked layer: the pointer may keep moving but
    /// the elements stay put.
    Refused,
    /// Apply `(dx, dy)` to every element. `snap` is present when dx was
    /// corrected, so the caller can draw the snap line at `snap.target_px`.
    Moved { dx: f64, dy: f64, snap: Option<Snap> },
}

/// Final resting place of one element after a drag, in model units.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemPlacement {
    pub id: String,
    pub kind: ItemKind,
    pub position: f64,
    pub layer: i32,
}

/// The minimal rectangle enclosing the dragged selection, plus per-element
/// start positions. All coordinates are view pixels at build time.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub elements: Vec<BoxElement>,
}

impl BoundingBox {
    /// Build from the current selection. `None` when nothing is selected —
    /// drag handlers bail out instead of moving phantom elements.
    pub fn from_selection(project: &Project) -> Option<BoundingBox> {
        let ids: Vec<(String, ItemKind)> = project
            .clips
            .iter()
            .filter(|c| c.selected)
            .map(|c| (c.id.clone(), ItemKind::Clip))
            .chain(
                project
                    .transitions
                    .iter()
                    .filter(|t| t.selected)
                    .map(|t| (t.id.clone(), ItemKind::Transition)),
            )
            .collect();
        Self::from_items(project, &ids)
    }

    /// Build from an explicit id list — the host's `startManualMove` path.
    /// Ids that resolve to nothing are skipped with a log.
    pub fn from_items(project: &Project, ids: &[(String, ItemKind)]) -> Option<BoundingBox> {
        let pps = project.pixels_per_second();
        let mut elements = Vec::new();

        for (id, kind) in ids {
            let (extent, layer) = match kind {
                ItemKind::Clip => match project.clip(id) {
                    Some(c) => (c.time_extent(), c.layer),
                    None => {
                        log::debug!("[bbox] unknown clip id {id}, skipping");
                        continue;
                    }
                },
                ItemKind::Transition => match project.transition(id) {
                    Some(t) => (t.time_extent(), t.layer),
                    None => {
                        log::debug!("[bbox] unknown transition id {id}, skipping");
                        continue;
                    }
                },
                ItemKind::Effect => continue, // effects have no own extent
            };
            let Some(row) = project.layer(layer) else { continue };
            elements.push(BoxElement {
                id: id.clone(),
                kind: *kind,
                left_px: time_to_pixel(extent.0, pps),
                top_px: row.y,
                width_px: time_to_pixel(extent.1 - extent.0, pps),
                height_px: row.height,
            });
        }

        if elements.is_empty() {
            return None;
        }
        let left = elements.iter().map(|e| e.left_px).fold(f64::INFINITY, f64::min);
        let right = elements
            .iter()
            .map(|e| e.left_px + e.width_px)
            .fold(f64::NEG_INFINITY, f64::max);
        let top = elements.iter().map(|e| e.top_px).fold(f64::INFINITY, f64::min);
        let bottom = elements
            .iter()
            .map(|e| e.top_px + e.height_px)
            .fold(f64::NEG_INFINITY, f64::max);
        Some(BoundingBox { left, top, right, bottom, elements })
    }

    pub fn ids(&self) -> HashSet<String> {
        self.elements.iter().map(|e| e.id.clone()).collect()
    }

    /// Propose a cumulative move of the whole box by `(dx, dy)` pixels from
    /// the gesture origin.
    pub fn propose_move(
        &self,
        project: &Project,
        dx: f64,
        dy: f64,
        options: SnapOptions,
    ) -> MoveOutcome {
        if self.elements.is_empty() {
            return MoveOutcome::Refused;
        }

        // Locked-layer scan over the moved vertical span. A locked row
        // anywhere inside the span cancels the move outright.
        let span_top = self.top + dy;
        let span_bottom = self.bottom + dy;
        for layer in &project.layers {
            let overlaps = layer.y < span_bottom && layer.y + layer.height > span_top;
            if overlaps && layer.lock {
                return MoveOutcome::Refused;
            }
        }

        // Left edge cannot leave the timeline.
        let mut dx = dx.max(-self.left);

        let mut snap = None;
        if options.enabled {
            let ignore = self.ids();
            snap = find_snap(
                project,
                &SnapQuery {
                    candidates_px: &[self.left + dx, self.right + dx],
                    threshold_px: options.threshold_px,
                    ignore_ids: &ignore,
                    include_keyframes: options.include_keyframes,
                },
            );
            if let Some(s) = snap {
                dx -= s.diff_px;
            }
        }

        MoveOutcome::Moved { dx, dy, snap }
    }

    /// Convert final pixel positions back to model units: FPS-grid-snapped
    /// seconds and the layer whose row contains each element's center.
    pub fn placements(&self, project: &Project, dx: f64, dy: f64) -> Vec<ItemPlacement> {
        self.placements_inner(project, dx, dy, true)
    }

    /// Mid-drag placements keep fractional seconds so the elements track
    /// the pointer smoothly; quantisation happens only at drag stop.
    pub fn live_placements(&self, project: &Project, dx: f64, dy: f64) -> Vec<ItemPlacement> {
        self.placements_inner(project, dx, dy, false)
    }

    fn placements_inner(
        &self,
        project: &Project,
        dx: f64,
        dy: f64,
        quantise: bool,
    ) -> Vec<ItemPlacement> {
        let pps = project.pixels_per_second();
        self.elements
            .iter()
            .filter_map(|e| {
                let seconds = pixel_to_time((e.left_px + dx).max(0.0), pps);
                let position = if quantise {
                    snap_to_fps_grid(seconds, project.fps).max(0.0)
                } else {
                    seconds.max(0.0)
                };
                let center_y = e.top_px + dy + e.height_px / 2.0;
                let layer = project.find_track_at_y(center_y)?.number;
                Some(ItemPlacement {
                    id: e.id.clone(),
                    kind: e.kind,
                    position,
                    layer,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::test_fixtures::*;

    fn no_snap() -> SnapOptions {
        SnapOptions { enabled: false, threshold_px: 0.0, include_keyframes: false }
    }

    fn selected_pair() -> Project {
        let mut p = base_project();
        let mut a = clip_at("a", 3, 1.0, 0.0, 2.0);
        a.selected = true;
        let mut b = clip_at("b", 2, 4.0, 0.0, 2.0);
        b.selected = true;
        p.clips.push(a);
        p.clips.push(b);
        let mut tr = transition_at("tr", 3, 2.0, 1.0);
        tr.selected = true;
        p.transitions.push(tr);
        p
    }

    #[test]
    fn box_encloses_all_selected_items() {
        let p = selected_pair();
        let bb = BoundingBox::from_selection(&p).unwrap();
        assert_eq!(bb.elements.len(), 3);
        assert_eq!(bb.left, 50.0); // clip a at 1.0 s · 50 px/s
        assert_eq!(bb.right, 300.0); // clip b right edge at 6.0 s
        // Layer 3 sits above layer 2.
        assert_eq!(bb.top, p.layer(3).unwrap().y);
        assert_eq!(bb.bottom, p.layer(2).unwrap().y + p.layer(2).unwrap().height);
    }

    #[test]
    fn empty_selection_builds_no_box() {
        let p = base_project();
        assert!(BoundingBox::from_selection(&p).is_none());
    }

    #[test]
    fn unknown_manual_ids_are_skipped() {
        let p = selected_pair();
        let bb = BoundingBox::from_items(
            &p,
            &[("a".into(), ItemKind::Clip), ("ghost".into(), ItemKind::Clip)],
        )
        .unwrap();
        assert_eq!(bb.elements.len(), 1);
    }

    #[test]
    fn locked_layer_inside_span_refuses_the_move() {
        let mut p = selected_pair();
        // Layer 1 is the bottom row; lock it and push the selection down
        // into it.
        p.layers.iter_mut().find(|l| l.number == 1).unwrap().lock = true;
        p.reindex_layers();
        let bb = BoundingBox::from_selection(&p).unwrap();
        let row_h = p.layer(1).unwrap().height;
        assert_eq!(bb.propose_move(&p, 0.0, row_h, no_snap()), MoveOutcome::Refused);
        // Horizontal moves inside unlocked rows still pass.
        assert!(matches!(
            bb.propose_move(&p, 25.0, 0.0, no_snap()),
            MoveOutcome::Moved { .. }
        ));
    }

    #[test]
    fn moves_cannot_push_the_box_past_zero() {
        let p = selected_pair();
        let bb = BoundingBox::from_selection(&p).unwrap();
        match bb.propose_move(&p, -500.0, 0.0, no_snap()) {
            MoveOutcome::Moved { dx, .. } => assert_eq!(dx, -bb.left),
            other => panic!("expected move, got {other:?}"),
        }
    }

    #[test]
    fn snap_correction_applies_to_the_whole_group() {
        let mut p = selected_pair();
        p.clips.push(clip_at("anchor", 1, 7.0, 0.0, 1.0)); // left edge 350 px
        let bb = BoundingBox::from_selection(&p).unwrap();
        // Move right edge (300) to 348 → 2 px short of the anchor edge.
        let outcome = bb.propose_move(
            &p,
            48.0,
            0.0,
            SnapOptions { enabled: true, threshold_px: 5.0, include_keyframes: false },
        );
        match outcome {
            MoveOutcome::Moved { dx, snap, .. } => {
                assert_eq!(dx, 50.0, "dx corrected so the right edge lands on 350");
                assert_eq!(snap.unwrap().target_px, 350.0);
            }
            other => panic!("expected move, got {other:?}"),
        }
    }

    #[test]
    fn placements_quantise_and_retarget_layers() {
        let p = selected_pair();
        let bb = BoundingBox::from_selection(&p).unwrap();
        let row_h = p.layer(1).unwrap().height;
        // 26 px right (0.52 s, snaps to 0.5 at 24 fps → 12.5 frames… snaps
        // to 12/24 = 0.5), one row down.
        let placements = bb.placements(&p, 25.0, row_h);
        let a = placements.iter().find(|pl| pl.id == "a").unwrap();
        assert_eq!(a.position, snap_to_fps_grid(1.5, p.fps));
        assert_eq!(a.layer, 2, "clip a moved from layer 3 to layer 2");
        let b = placements.iter().find(|pl| pl.id == "b").unwrap();
        assert_eq!(b.layer, 1);
    }

    #[test]
    fn relative_offsets_survive_the_move() {
        let p = selected_pair();
        let bb = BoundingBox::from_selection(&p).unwrap();
        let placements = bb.placements(&p, 100.0, 0.0);
        let a = placements.iter().find(|pl| pl.id == "a").unwrap();
        let b = placements.iter().find(|pl| pl.id == "b").unwrap();
        assert_eq!(b.position - a.position, 3.0);
    }
}
