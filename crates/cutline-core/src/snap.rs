// crates/cutline-core/src/snap.rs
//
// Snap engine: given candidate pixel x-positions (typically the left and
// right edges of whatever is being dragged), find the nearest interesting
// feature within a pixel threshold.
//
// Scan order doubles as the tie-break order — clip edges, transition edges,
// markers, playhead, timeline end, then the visible keyframes of selected
// entities. The first target at the minimal |diff| wins, so equidistant
// features resolve deterministically.

use std::collections::HashSet;

use crate::helpers::time::{frame_to_seconds, time_to_pixel};
use crate::project::{Project, TimelineItem};

/// One snap request. `ignore_ids` carries the items being dragged so their
/// own edges never attract them.
pub struct SnapQuery<'a> {
    pub candidates_px: &'a [f64],
    pub threshold_px: f64,
    pub ignore_ids: &'a HashSet<String>,
    pub include_keyframes: bool,
}

/// The winning target. `diff_px = candidate − target`, signed, so a caller
/// corrects its move by subtracting `diff_px`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Snap {
    pub candidate_index: usize,
    pub target_px: f64,
    pub diff_px: f64,
}

fn keyframe_pixels(project: &Project, ignore: &HashSet<String>, out: &mut Vec<f64>) {
    let pps = project.pixels_per_second();
    let fps = project.fps;

    for clip in project.clips.iter().filter(|c| c.selected && !ignore.contains(&c.id)) {
        let marks = crate::keyframes::clip_keyframes(clip, fps, "");
        let preview = clip.ui.keyframe_preview.as_ref();
        for frame in marks.keys() {
            let source = frame_to_seconds(*frame, fps);
            let mapped = preview.map(|p| p.map_seconds(source)).unwrap_or(source);
            let timeline = clip.position + (mapped - clip.start);
            out.push(time_to_pixel(timeline, pps));
        }
    }

    for tr in project
        .transitions
        .iter()
        .filter(|t| t.selected && !ignore.contains(&t.id))
    {
        let marks = crate::keyframes::transition_keyframes(tr, fps, "");
        for frame in marks.keys() {
            let timeline = tr.position + (frame_to_seconds(*frame, fps) - tr.start);
            out.push(time_to_pixel(timeline, pps));
        }
    }
}

/// Scan the project for the snap target nearest to any candidate.
///
/// Returns `None` when nothing lies within the threshold. The threshold is
/// inclusive; a candidate exactly `threshold_px` away still snaps.
pub fn find_snap(project: &Project, query: &SnapQuery) -> Option<Snap> {
    if query.candidates_px.is_empty() || query.threshold_px < 0.0 {
        return None;
    }
    let pps = project.pixels_per_second();

    let mut targets: Vec<f64> = Vec::new();
    for clip in &project.clips {
        if query.ignore_ids.contains(&clip.id) {
            continue;
        }
        let (l, r) = clip.time_extent();
        targets.push(time_to_pixel(l, pps));
        targets.push(time_to_pixel(r, pps));
    }
    for tr in &project.transitions {
        if query.ignore_ids.contains(&tr.id) {
            continue;
        }
        let (l, r) = tr.time_extent();
        targets.push(time_to_pixel(l, pps));
        targets.push(time_to_pixel(r, pps));
    }
    for marker in &project.markers {
        targets.push(time_to_pixel(marker.position, pps));
    }
    targets.push(time_to_pixel(project.playhead_position, pps));
    targets.push(time_to_pixel(project.duration, pps));
    if query.include_keyframes {
        keyframe_pixels(project, query.ignore_ids, &mut targets);
    }

    let mut best: Option<Snap> = None;
    for (index, &candidate) in query.candidates_px.iter().enumerate() {
        for &target in &targets {
            let diff = candidate - target;
            if diff.abs() > query.threshold_px {
                continue;
            }
            // Strict less-than keeps the earliest hit on ties, which keeps
            // the scan order meaningful.
            if best.map(|b| diff.abs() < b.diff_px.abs()).unwrap_or(true) {
                best = Some(Snap {
                    candidate_index: index,
                    target_px: target,
                    diff_px: diff,
                });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::test_fixtures::*;

    fn no_ignore() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn snaps_to_playhead_within_threshold() {
        // Literal boundary scenario: playhead at 5.0 s, candidate edge at
        // 5.004 s, threshold worth 0.01 s. pps = 50 → candidate 250.2 px,
        // target 250.0 px, threshold 0.5 px.
        let mut p = base_project();
        p.move_playhead(5.0);
        let ignore = no_ignore();
        let snap = find_snap(
            &p,
            &SnapQuery {
                candidates_px: &[250.2],
                threshold_px: 0.5,
                ignore_ids: &ignore,
                include_keyframes: false,
            },
        )
        .unwrap();
        assert_eq!(snap.target_px, 250.0);
        assert!((snap.diff_px - 0.2).abs() < 1e-9);
    }

    #[test]
    fn nearest_target_wins() {
        let mut p = base_project();
        p.clips.push(clip_at("a", 1, 1.0, 0.0, 2.0)); // edges at 50 px, 150 px
        p.markers.push(crate::project::Marker {
            id: "m1".into(),
            position: 3.1, // 155 px
            icon: String::new(),
            vector: String::new(),
        });
        let ignore = no_ignore();
        let snap = find_snap(
            &p,
            &SnapQuery {
                candidates_px: &[153.0],
                threshold_px: 10.0,
                ignore_ids: &ignore,
                include_keyframes: false,
            },
        )
        .unwrap();
        // Marker at 155 (2 px away) beats clip edge at 150 (3 px away).
        assert_eq!(snap.target_px, 155.0);
    }

    #[test]
    fn dragged_items_do_not_attract_themselves() {
        let mut p = base_project();
        p.clips.push(clip_at("a", 1, 1.0, 0.0, 2.0));
        let ignore: HashSet<String> = ["a".to_string()].into();
        let snap = find_snap(
            &p,
            &SnapQuery {
                candidates_px: &[51.0],
                threshold_px: 5.0,
                ignore_ids: &ignore,
                include_keyframes: false,
            },
        );
        assert!(snap.is_none());
    }

    #[test]
    fn keyframes_of_selected_clips_are_targets_when_enabled() {
        let mut p = base_project();
        let mut clip = clip_with_alpha_track(&[1, 49]); // 0.0 s, 2.0 s source
        clip.position = 1.0;
        clip.selected = true;
        p.clips.push(clip);
        // Keyframe 49 → source 2.0 s → timeline 3.0 s → 150 px.
        let ignore = no_ignore();
        let q = |include| {
            find_snap(
                &p,
                &SnapQuery {
                    candidates_px: &[148.0],
                    threshold_px: 3.0,
                    ignore_ids: &ignore,
                    include_keyframes: include,
                },
            )
        };
        assert_eq!(q(true).unwrap().target_px, 150.0);
        assert!(q(false).is_none());
    }

    #[test]
    fn multiple_candidates_report_winning_index() {
        let mut p = base_project();
        p.clips.push(clip_at("a", 1, 4.0, 0.0, 2.0)); // left edge 200 px
        let ignore = no_ignore();
        let snap = find_snap(
            &p,
            &SnapQuery {
                candidates_px: &[90.0, 198.5],
                threshold_px: 4.0,
                ignore_ids: &ignore,
                include_keyframes: false,
            },
        )
        .unwrap();
        assert_eq!(snap.candidate_index, 1);
        assert_eq!(snap.target_px, 200.0);
    }

    #[test]
    fn preview_mapping_moves_keyframe_targets() {
        let mut p = base_project();
        let mut clip = clip_with_alpha_track(&[49, 97]); // 2.0 s, 4.0 s source
        clip.position = 0.0;
        clip.selected = true;
        clip.ui.keyframe_preview = Some(crate::keyframes::KeyframePreview {
            mode: crate::keyframes::PreviewMode::Retime,
            original_start: 0.0,
            original_end: 4.0,
            display_start: 0.0,
            display_end: 2.0,
            projected_start: 0.0,
            projected_end: 4.0,
            pixels_per_second: 50.0,
        });
        // Retime halves every source time: keyframe at 4.0 s maps to 2.0 s
        // → 100 px instead of 200 px.
        p.clips.push(clip);
        let ignore = no_ignore();
        let snap = find_snap(
            &p,
            &SnapQuery {
                candidates_px: &[99.0],
                threshold_px: 2.0,
                ignore_ids: &ignore,
                include_keyframes: true,
            },
        )
        .unwrap();
        assert_eq!(snap.target_px, 100.0);
    }
}
