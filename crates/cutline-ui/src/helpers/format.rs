// crates/cutline-ui/src/helpers/format.rs
//
// UI-layer string utilities. Time and ruler formatting live in
// cutline_core::helpers::time — this module only holds display-side
// truncation so clip labels never overflow their rects.

/// Fit `label` into `max_px` of horizontal space at roughly `char_px`
/// pixels per character, appending an ellipsis when clipped.
///
/// Proportional fonts make exact fitting a layout question; a per-char
/// estimate is enough for clip name badges and avoids a galley measure on
/// every clip every frame.
pub fn fit_label(label: &str, max_px: f32, char_px: f32) -> String {
    if max_px <= 0.0 || char_px <= 0.0 {
        return String::new();
    }
    let max_chars = (max_px / char_px).floor() as usize;
    let count = label.chars().count();
    if count <= max_chars {
        return label.to_string();
    }
    if max_chars <= 1 {
        return "…".into();
    }
    let cut: String = label.chars().take(max_chars - 1).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_labels_pass_through() {
        assert_eq!(fit_label("intro", 100.0, 7.0), "intro");
    }

    #[test]
    fn long_labels_get_an_ellipsis() {
        let out = fit_label("a_very_long_clip_name.mp4", 70.0, 7.0);
        assert!(out.ends_with('…'));
        assert!(out.chars().count() <= 10);
    }

    #[test]
    fn degenerate_widths_yield_empty() {
        assert_eq!(fit_label("name", 0.0, 7.0), "");
        assert_eq!(fit_label("name", 50.0, 0.0), "");
    }

    #[test]
    fn multibyte_labels_never_split_codepoints() {
        let out = fit_label("éééééééééé", 21.0, 7.0);
        assert_eq!(out, "éé…");
    }
}
