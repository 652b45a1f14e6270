// crates/cutline-core/src/helpers/time.rs
//
// Time ↔ pixel math shared by every crate in the workspace.
//
// All times are seconds (f64), all view positions are pixels. The single
// conversion constant is `pixels_per_second = tick_pixels / scale`, where
// `scale` is seconds-per-tick. Frame indices are 1-based, matching the
// keyframe `co.X` convention of the host project format.

use crate::project::Fps;

/// Hard cap on any computed view width, in pixels.
///
/// Several canvas backends silently fail past signed-16-bit extents; the
/// ruler and track surfaces clamp their widths here.
pub const MAX_CANVAS_PX: f64 = 32_767.0;

/// Pixels of view width per second of timeline, for the given zoom.
///
/// `scale` is seconds-per-tick and `tick_pixels` is the on-screen width of
/// one tick. Non-positive or non-finite scales fall back to 1.0 so a bad
/// zoom value from the host can never produce NaN positions downstream.
///
/// ```
/// use cutline_core::helpers::time::pixels_per_second;
/// assert_eq!(pixels_per_second(100.0, 10.0), 10.0);
/// assert_eq!(pixels_per_second(100.0, 0.0), 100.0); // degenerate scale
/// ```
pub fn pixels_per_second(tick_pixels: f64, scale: f64) -> f64 {
    let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
    tick_pixels / scale
}

/// Convert a view x-position to timeline seconds.
pub fn pixel_to_time(px: f64, pps: f64) -> f64 {
    if pps <= 0.0 || !pps.is_finite() {
        return 0.0;
    }
    px / pps
}

/// Convert timeline seconds to a view x-position.
pub fn time_to_pixel(t: f64, pps: f64) -> f64 {
    t * pps
}

/// Round `t` to the nearest whole frame on the project FPS grid.
///
/// The grid is defined by the rational frame rate: frame boundaries sit at
/// `k · den / num` seconds. Idempotent — snapping a snapped value is a no-op.
///
/// ```
/// use cutline_core::helpers::time::snap_to_fps_grid;
/// use cutline_core::project::Fps;
/// let fps = Fps { num: 24, den: 1 };
/// assert_eq!(snap_to_fps_grid(1.02, fps), 1.0);
/// let t = snap_to_fps_grid(7.3333, fps);
/// assert_eq!(snap_to_fps_grid(t, fps), t);
/// ```
pub fn snap_to_fps_grid(t: f64, fps: Fps) -> f64 {
    let (num, den) = (fps.num as f64, fps.den as f64);
    if num <= 0.0 || den <= 0.0 {
        return t;
    }
    (t * num / den).round() * den / num
}

/// 1-based frame number shown for the playhead at `t` seconds.
///
/// Frame 1 covers `[−0.5/F, 0.5/F)`; every input within half a frame of a
/// grid point reports the same frame.
pub fn frame_at(t: f64, fps: Fps) -> i64 {
    (t * fps.value()).round() as i64 + 1
}

/// Seconds into the source for a 1-based keyframe frame index.
pub fn frame_to_seconds(frame: i64, fps: Fps) -> f64 {
    (frame - 1) as f64 / fps.value()
}

/// 1-based keyframe frame index nearest to `t` source seconds.
pub fn seconds_to_frame(t: f64, fps: Fps) -> i64 {
    (t * fps.value()).round() as i64 + 1
}

/// Format `t` for the ruler readout as `HH:MM:SS,frame`.
///
/// The frame component counts from zero and wraps at the rounded frames
/// per second; whole seconds carry first.
///
/// ```
/// use cutline_core::helpers::time::ruler_time;
/// use cutline_core::project::Fps;
/// let fps = Fps { num: 24, den: 1 };
/// assert_eq!(ruler_time(0.0, fps), "00:00:00,00");
/// assert_eq!(ruler_time(61.5, fps), "00:01:01,12");
/// assert_eq!(ruler_time(3661.0, fps), "01:01:01,00");
/// ```
pub fn ruler_time(t: f64, fps: Fps) -> String {
    let t = to_finite(t, 0.0).max(0.0);
    let f = fps.value();
    let whole_fps = f.round().max(1.0) as i64;
    let total_frames = (t * f).round() as i64;
    let frame = total_frames.rem_euclid(whole_fps);
    let secs = total_frames.div_euclid(whole_fps);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    format!("{h:02}:{m:02}:{s:02},{frame:02}")
}

/// New absolute scroll offset after a zoom change, keeping one anchor time
/// fixed on screen.
///
/// Anchor priority: the pointer (`cursor_x > 0`, viewport-relative), then
/// the playhead when it lies inside the viewport, then the left edge.
/// With `old_pps == new_pps` the returned offset equals the input offset,
/// so repeated same-value zoom calls cannot drift the view.
pub fn rescaled_scroll(
    old_pps: f64,
    new_pps: f64,
    scroll_px: f64,
    viewport_px: f64,
    cursor_x: f64,
    playhead_seconds: f64,
) -> f64 {
    let (anchor_time, anchor_px) = if cursor_x > 0.0 {
        (pixel_to_time(scroll_px + cursor_x, old_pps), cursor_x)
    } else {
        let playhead_px = time_to_pixel(playhead_seconds, old_pps) - scroll_px;
        if playhead_px >= 0.0 && playhead_px <= viewport_px {
            (playhead_seconds, playhead_px)
        } else {
            (pixel_to_time(scroll_px, old_pps), 0.0)
        }
    };
    (time_to_pixel(anchor_time, new_pps) - anchor_px).max(0.0)
}

/// Replace NaN / infinite input with `fallback`.
///
/// Applied at every boundary where the host (or a degenerate zoom) can feed
/// us a non-finite number, so time and frame math never propagates NaN into
/// view positions.
///
/// ```
/// use cutline_core::helpers::time::to_finite;
/// assert_eq!(to_finite(f64::NAN, 3.0), 3.0);
/// assert_eq!(to_finite(2.5, 3.0), 2.5);
/// ```
pub fn to_finite(v: f64, fallback: f64) -> f64 {
    if v.is_finite() { v } else { fallback }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Fps;

    const FPS24: Fps = Fps { num: 24, den: 1 };
    const NTSC: Fps = Fps { num: 30_000, den: 1001 };

    #[test]
    fn grid_snap_is_idempotent() {
        for raw in [0.0, 0.021, 1.0 / 3.0, 7.77, 123.456] {
            let once = snap_to_fps_grid(raw, NTSC);
            assert_eq!(snap_to_fps_grid(once, NTSC), once);
        }
    }

    #[test]
    fn grid_snap_rounds_to_nearest_frame() {
        // 24 fps frames are 1/24 s apart; 1.02 is closer to frame 24 (1.0)
        // than frame 25 (1.04166…).
        assert_eq!(snap_to_fps_grid(1.02, FPS24), 1.0);
        assert!((snap_to_fps_grid(1.03, FPS24) - 25.0 / 24.0).abs() < 1e-12);
    }

    #[test]
    fn frame_at_is_stable_within_half_a_frame() {
        // Every t in [2.0 − 0.5/24, 2.0 + 0.5/24) reports the same frame.
        let base = frame_at(2.0, FPS24);
        assert_eq!(frame_at(2.0 - 0.49 / 24.0, FPS24), base);
        assert_eq!(frame_at(2.0 + 0.49 / 24.0, FPS24), base);
        assert_ne!(frame_at(2.0 + 0.51 / 24.0, FPS24), base);
    }

    #[test]
    fn frame_seconds_round_trip() {
        for frame in [1, 2, 25, 480] {
            assert_eq!(seconds_to_frame(frame_to_seconds(frame, FPS24), FPS24), frame);
        }
    }

    #[test]
    fn degenerate_scale_does_not_poison_positions() {
        let pps = pixels_per_second(100.0, f64::NAN);
        assert!(pixel_to_time(50.0, pps).is_finite());
        assert!(time_to_pixel(50.0, pps).is_finite());
    }

    #[test]
    fn ruler_time_clamps_garbage() {
        assert_eq!(ruler_time(f64::NAN, FPS24), "00:00:00,00");
        assert_eq!(ruler_time(-5.0, FPS24), "00:00:00,00");
    }

    #[test]
    fn same_scale_rescale_is_a_noop_on_scroll() {
        // Every anchor path: cursor, visible playhead, left-edge fallback.
        for (cursor_x, playhead) in [(200.0, 0.0), (-1.0, 4.0), (-1.0, 900.0)] {
            let mut scroll = 137.5;
            for _ in 0..5 {
                scroll = rescaled_scroll(50.0, 50.0, scroll, 500.0, cursor_x, playhead);
            }
            assert!(
                (scroll - 137.5).abs() < 1e-9,
                "scroll drifted to {scroll} for cursor {cursor_x}, playhead {playhead}"
            );
        }
    }

    #[test]
    fn zoom_keeps_the_time_under_the_cursor_fixed() {
        // 6.0 s sits under the cursor before the zoom; it must still be
        // there afterwards.
        let scroll = rescaled_scroll(50.0, 100.0, 100.0, 500.0, 200.0, 0.0);
        assert_eq!(scroll, 400.0);
        assert_eq!(pixel_to_time(scroll + 200.0, 100.0), 6.0);
    }

    #[test]
    fn zoom_without_cursor_anchors_the_visible_playhead() {
        // Playhead at 4.0 s = 200 px into the viewport at 50 px/s.
        let scroll = rescaled_scroll(50.0, 100.0, 0.0, 500.0, -1.0, 4.0);
        assert_eq!(scroll, 200.0);
        assert_eq!(time_to_pixel(4.0, 100.0) - scroll, 200.0);
    }

    #[test]
    fn offscreen_playhead_falls_back_to_the_left_edge() {
        // Playhead far past the viewport: the left-edge time (2.0 s at
        // 50 px/s) stays pinned instead.
        let scroll = rescaled_scroll(50.0, 100.0, 100.0, 500.0, -1.0, 900.0);
        assert_eq!(scroll, 200.0);
        assert_eq!(pixel_to_time(scroll, 100.0), 2.0);
    }
}
