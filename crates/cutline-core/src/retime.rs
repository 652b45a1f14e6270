// crates/cutline-core/src/retime.rs
//
// Retime helpers: waveform resampling for the UI while a clip is being
// stretched, and the duration ceiling implied by a `time` curve. The host
// recomputes the authoritative audio data and time curve after the
// gesture; everything here exists so the preview looks right mid-drag.

use crate::keyframes::Track;
use crate::project::Fps;

/// Linearly resample waveform peaks to match a new clip duration.
///
/// The output length is `round(len · new / old)`; sample `i` interpolates
/// between its two nearest source samples. Degenerate inputs (empty
/// samples, non-positive durations) yield an empty vec, which the drawing
/// code treats as "no waveform".
pub fn resample_waveform(samples: &[f32], original_duration: f64, new_duration: f64) -> Vec<f32> {
    if samples.is_empty()
        || !original_duration.is_finite()
        || !new_duration.is_finite()
        || original_duration <= 0.0
        || new_duration <= 0.0
    {
        return Vec::new();
    }
    let new_len = ((samples.len() as f64) * new_duration / original_duration).round() as usize;
    if new_len == 0 {
        return Vec::new();
    }
    if new_len == 1 || samples.len() == 1 {
        return vec![samples[0]; new_len];
    }

    let step = (samples.len() - 1) as f64 / (new_len - 1) as f64;
    (0..new_len)
        .map(|i| {
            let pos = i as f64 * step;
            let i0 = pos.floor() as usize;
            let i1 = (i0 + 1).min(samples.len() - 1);
            let frac = (pos - i0 as f64) as f32;
            samples[i0] * (1.0 - frac) + samples[i1] * frac
        })
        .collect()
}

/// Duration in seconds that a `time` curve retimes its clip to — the frame
/// span of the curve's X axis. `None` for tracks that don't animate.
pub fn retimed_duration(time_track: &Track, fps: Fps) -> Option<f64> {
    if !time_track.is_animated() {
        return None;
    }
    let first = time_track.points.first()?.frame();
    let last = time_track.points.last()?.frame();
    let span = (last - first + 1).max(0);
    Some(span as f64 / fps.value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyframes::{Coord, Interpolation, Point};

    #[test]
    fn halving_duration_halves_sample_count() {
        // Literal boundary scenario: 800 samples, 4.0 s → 2.0 s.
        let samples: Vec<f32> = (0..800).map(|i| i as f32).collect();
        let out = resample_waveform(&samples, 4.0, 2.0);
        assert_eq!(out.len(), 400);
        // Sample i lands near samples[i · 799/399].
        for i in [0usize, 100, 250, 399] {
            let expected = samples[(i as f64 * 799.0 / 399.0).floor() as usize];
            assert!(
                (out[i] - expected).abs() <= 2.0 + f32::EPSILON,
                "sample {i}: {} vs {expected}",
                out[i]
            );
        }
        assert_eq!(out[0], 0.0);
        assert_eq!(out[399], 799.0);
    }

    #[test]
    fn stretching_interpolates_between_peaks() {
        let out = resample_waveform(&[0.0, 1.0], 1.0, 2.0);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[3], 1.0);
        assert!(out[1] > 0.0 && out[1] < out[2]);
    }

    #[test]
    fn degenerate_inputs_yield_empty() {
        assert!(resample_waveform(&[], 4.0, 2.0).is_empty());
        assert!(resample_waveform(&[1.0], 0.0, 2.0).is_empty());
        assert!(resample_waveform(&[1.0], 4.0, f64::NAN).is_empty());
    }

    fn time_track(first: i64, last: i64) -> Track {
        Track {
            points: vec![
                Point { co: Coord { x: first as f64, y: 1.0 }, interpolation: Interpolation::Linear },
                Point { co: Coord { x: last as f64, y: 240.0 }, interpolation: Interpolation::Linear },
            ],
        }
    }

    #[test]
    fn time_curve_span_sets_the_duration() {
        let fps = Fps { num: 24, den: 1 };
        // Frames 1..=48 → 48 output frames → 2 s.
        assert_eq!(retimed_duration(&time_track(1, 48), fps), Some(2.0));
    }

    #[test]
    fn flat_time_track_has_no_retime() {
        let fps = Fps { num: 24, den: 1 };
        let single = Track { points: vec![time_track(1, 48).points[0]] };
        assert_eq!(retimed_duration(&single, fps), None);
    }
}
