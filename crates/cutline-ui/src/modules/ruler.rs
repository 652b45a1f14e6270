// crates/cutline-ui/src/modules/ruler.rs
//
// The time ruler strip: tick marks with HH:MM:SS,frame labels, the render
// cache stripe, project markers, and the playhead head. Dragging anywhere
// on the strip scrubs the playhead; the emitted host seeks are deduped to
// one per frame of timeline time so low zoom levels don't flood the host.

use cutline_core::helpers::time::{frame_to_seconds, pixel_to_time, ruler_time, snap_to_fps_grid};
use cutline_core::{EngineCommand, Project};
use egui::{Align2, FontId, Pos2, Rect, Sense, Stroke, Ui, Vec2};

use super::EditorModule;
use crate::context::EngineContext;
use crate::theme::{BG_RAISED, BORDER, CACHE_STRIPE, MARKER, PLAYHEAD, TEXT, TEXT_DIM};

pub const RULER_HEIGHT: f32 = 36.0;

pub struct RulerModule;

impl RulerModule {
    pub fn new() -> Self {
        RulerModule
    }
}

impl EditorModule for RulerModule {
    fn name(&self) -> &str {
        "Ruler"
    }

    fn ui(
        &mut self,
        ui: &mut Ui,
        project: &Project,
        ctx: &mut EngineContext,
        cmd: &mut Vec<EngineCommand>,
    ) {
        let pps = project.pixels_per_second() as f32;
        let canvas_w = super::timeline::canvas_width(project);
        let (rect, response) =
            ui.allocate_exact_size(Vec2::new(canvas_w, RULER_HEIGHT), Sense::click_and_drag());
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, BG_RAISED);
        painter.line_segment(
            [rect.left_bottom(), rect.right_bottom()],
            Stroke::new(1.0, BORDER),
        );

        // ── Ticks ────────────────────────────────────────────────────────
        // One major tick per `scale` seconds (the host's zoom unit), four
        // minor subdivisions. Labels skip ticks when the zoom squeezes
        // them under 70 px apart.
        let tick_px = project.tick_pixels.max(1.0) as f32;
        let label_every = (70.0 / tick_px).ceil().max(1.0) as usize;
        let mut i = 0usize;
        let mut x = rect.left();
        while x <= rect.right() {
            let major_top = rect.bottom() - 12.0;
            painter.line_segment(
                [Pos2::new(x, major_top), Pos2::new(x, rect.bottom())],
                Stroke::new(1.0, TEXT_DIM),
            );
            if i % label_every == 0 {
                let t = project.scale * i as f64;
                painter.text(
                    Pos2::new(x + 3.0, rect.top() + 3.0),
                    Align2::LEFT_TOP,
                    ruler_time(t, project.fps),
                    FontId::monospace(9.5),
                    TEXT_DIM,
                );
            }
            for minor in 1..4 {
                let mx = x + tick_px * minor as f32 / 4.0;
                if mx > rect.right() {
                    break;
                }
                painter.line_segment(
                    [Pos2::new(mx, rect.bottom() - 5.0), Pos2::new(mx, rect.bottom())],
                    Stroke::new(1.0, BORDER),
                );
            }
            i += 1;
            x += tick_px;
        }

        // ── Cache stripe ─────────────────────────────────────────────────
        // Frame intervals the host has already rendered, as a thin band
        // just above the bottom edge.
        for range in &project.progress.ranges {
            let x0 = rect.left()
                + (frame_to_seconds(range.start_frame, project.fps) * pps as f64) as f32;
            let x1 = rect.left()
                + (frame_to_seconds(range.end_frame, project.fps) * pps as f64) as f32;
            painter.rect_filled(
                Rect::from_min_max(Pos2::new(x0, rect.bottom() - 3.0), Pos2::new(x1, rect.bottom())),
                0.0,
                CACHE_STRIPE,
            );
        }

        // ── Markers ──────────────────────────────────────────────────────
        for marker in &project.markers {
            let x = rect.left() + (marker.position * pps as f64) as f32;
            let center = Pos2::new(x, rect.bottom() - 16.0);
            let hit = Rect::from_center_size(center, Vec2::splat(12.0));
            painter.add(egui::Shape::convex_polygon(
                vec![
                    center + Vec2::new(0.0, -5.0),
                    center + Vec2::new(5.0, 0.0),
                    center + Vec2::new(0.0, 5.0),
                    center + Vec2::new(-5.0, 0.0),
                ],
                MARKER,
                Stroke::NONE,
            ));
            let marker_resp = ui.interact(
                hit,
                egui::Id::new(("marker", marker.id.as_str())),
                Sense::click(),
            );
            if marker_resp.secondary_clicked() {
                cmd.push(EngineCommand::ShowMarkerMenu(marker.id.clone()));
            }
            if marker_resp.clicked() {
                cmd.push(EngineCommand::SetPlayhead(marker.position));
            }
        }

        // ── Scrub ────────────────────────────────────────────────────────
        // Click or drag moves the playhead; one emit per timeline frame.
        if response.clicked() || response.dragged() {
            if let Some(pointer) = response.interact_pointer_pos() {
                let t = pixel_to_time((pointer.x - rect.left()) as f64, pps as f64).max(0.0);
                let t = snap_to_fps_grid(t, project.fps);
                let frame_step = 1.0 / project.fps.value();
                if (t - ctx.last_scrub_emitted).abs() >= frame_step || response.clicked() {
                    cmd.push(EngineCommand::ScrubPreview(t));
                    ctx.last_scrub_emitted = t;
                }
            }
            ui.ctx().set_cursor_icon(egui::CursorIcon::ResizeHorizontal);
        } else if response.hovered() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::ResizeHorizontal);
        }

        // ── Playhead head + readout ──────────────────────────────────────
        let px = rect.left() + (project.playhead_position * pps as f64) as f32;
        let head = vec![
            Pos2::new(px - 6.0, rect.bottom() - 12.0),
            Pos2::new(px + 6.0, rect.bottom() - 12.0),
            Pos2::new(px, rect.bottom()),
        ];
        painter.add(egui::Shape::convex_polygon(head, PLAYHEAD, Stroke::NONE));
        let head_rect =
            Rect::from_center_size(Pos2::new(px, rect.bottom() - 7.0), Vec2::new(14.0, 14.0));
        let head_resp =
            ui.interact(head_rect, egui::Id::new("playhead-head"), Sense::click());
        if head_resp.secondary_clicked() {
            cmd.push(EngineCommand::ShowPlayheadMenu);
        }
        painter.text(
            Pos2::new(px + 9.0, rect.bottom() - 14.0),
            Align2::LEFT_BOTTOM,
            ruler_time(project.playhead_position, project.fps),
            FontId::monospace(10.0),
            TEXT,
        );
    }
}
