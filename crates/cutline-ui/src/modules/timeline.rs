// crates/cutline-ui/src/modules/timeline.rs
//
// The track surface: rows, clips, transitions, effect badges, keyframe
// marks, marquee selection, snap line, playhead line. Every gesture here
// follows the same shape — capture pointer → clamp the delta → snap →
// commit as an EngineCommand on drag stop. Only one gesture can hold
// ctx.interaction at a time.

use std::collections::HashSet;

use cutline_core::bbox::{BoundingBox, MoveOutcome, SnapOptions};
use cutline_core::helpers::time::{
    frame_to_seconds, pixel_to_time, seconds_to_frame, snap_to_fps_grid, time_to_pixel,
    MAX_CANVAS_PX,
};
use cutline_core::keyframes::{Interpolation, KeyframeMark, KeyframePreview, PreviewMode};
use cutline_core::project::ItemKind;
use cutline_core::retime::retimed_duration;
use cutline_core::selection::Modifiers;
use cutline_core::snap::{find_snap, SnapQuery};
use cutline_core::{Clip, EngineCommand, Project, Transition};
use egui::{Align2, Color32, CursorIcon, FontId, Pos2, Rect, Sense, Stroke, StrokeKind, Ui, Vec2};

use super::EditorModule;
use crate::context::EngineContext;
use crate::helpers::format::fit_label;
use crate::interaction::{
    ClipResizeGesture, ClipShape, EdgeHandle, Gesture, KeyframeDrag, MarqueeState, MoveGesture,
    TransitionResizeGesture,
};
use crate::theme::{BORDER, PLAYHEAD, SNAPLINE, TEXT_DIM};

/// Pixel radius inside which edges, markers, the playhead, and keyframes
/// attract a dragged item.
pub const SNAP_THRESHOLD_PX: f64 = 10.0;
const TRIM_HANDLE_PX: f32 = 7.0;
const KEYFRAME_HIT_PX: f32 = 11.0;
const MIN_CANVAS_TRACKS_PX: f32 = 200.0;

/// Shared canvas width for the ruler and track strips, clamped to the
/// render-safe maximum.
pub fn canvas_width(project: &Project) -> f32 {
    let pps = project.pixels_per_second();
    let w = time_to_pixel(project.duration, pps) + 240.0;
    w.min(MAX_CANVAS_PX) as f32
}

fn modifiers(ui: &Ui) -> Modifiers {
    let m = ui.input(|i| i.modifiers);
    Modifiers { ctrl: m.ctrl || m.command, shift: m.shift, alt: m.alt }
}

pub struct TimelineModule;

impl TimelineModule {
    pub fn new() -> Self {
        TimelineModule
    }
}

impl EditorModule for TimelineModule {
    fn name(&self) -> &str {
        "Timeline"
    }

    fn ui(
        &mut self,
        ui: &mut Ui,
        project: &Project,
        ctx: &mut EngineContext,
        cmd: &mut Vec<EngineCommand>,
    ) {
        let pps = project.pixels_per_second();
        let tracks_h: f32 = project
            .layers
            .iter()
            .map(|l| l.height as f32)
            .sum::<f32>()
            .max(MIN_CANVAS_TRACKS_PX);
        let canvas_w = canvas_width(project);

        // Background first: clips and transitions register their interacts
        // afterwards, so they win the hit-test and the marquee can only
        // start on empty track space.
        let (rect, background) =
            ui.allocate_exact_size(Vec2::new(canvas_w, tracks_h), Sense::click_and_drag());
        let painter = ui.painter_at(rect);
        let origin = rect.min;
        let mods = modifiers(ui);

        // Ambient cursor time for razor slices and context menus.
        if let Some(pointer) = ui.ctx().pointer_hover_pos() {
            ctx.cursor_seconds = pixel_to_time((pointer.x - origin.x) as f64, pps).max(0.0);
        }

        // Ctrl+A selects everything; the host is told item by item.
        if ui.input(|i| i.modifiers.command_only() && i.key_pressed(egui::Key::A)) {
            cmd.push(EngineCommand::SelectAll);
        }

        self.draw_tracks(ui, &painter, origin, canvas_w, project, ctx, cmd);

        // Transitions render under clips; both stacks of interacts sit
        // above the background.
        for tr in &project.transitions {
            self.transition_ui(ui, &painter, origin, project, tr, ctx, cmd, mods);
        }
        for clip in &project.clips {
            self.clip_ui(ui, &painter, origin, project, clip, ctx, cmd, mods);
        }

        self.background_ui(&background, origin, project, ctx, cmd, mods);

        // ── Overlays ─────────────────────────────────────────────────────
        let playhead_x = origin.x + time_to_pixel(project.playhead_position, pps) as f32;
        painter.line_segment(
            [Pos2::new(playhead_x, rect.top()), Pos2::new(playhead_x, rect.bottom())],
            Stroke::new(1.5, PLAYHEAD),
        );
        if let Some(snap_x) = ctx.interaction.snapline_px {
            let x = origin.x + snap_x;
            painter.line_segment(
                [Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())],
                Stroke::new(1.5, SNAPLINE),
            );
        }
        if let Some(Gesture::Marquee(m)) = &ctx.interaction.gesture {
            let band = Rect::from_two_pos(m.origin, m.current);
            painter.rect_filled(band, 0.0, Color32::from_rgba_unmultiplied(90, 140, 220, 28));
            painter.rect_stroke(
                band,
                0.0,
                Stroke::new(1.0, Color32::from_rgb(120, 170, 255)),
                StrokeKind::Inside,
            );
        }
        if ctx.razor {
            ui.ctx().set_cursor_icon(CursorIcon::Crosshair);
        }
    }
}

impl TimelineModule {
    // ── Track rows ───────────────────────────────────────────────────────────

    fn draw_tracks(
        &self,
        ui: &mut Ui,
        painter: &egui::Painter,
        origin: Pos2,
        canvas_w: f32,
        project: &Project,
        ctx: &mut EngineContext,
        cmd: &mut Vec<EngineCommand>,
    ) {
        for layer in &project.layers {
            let row = Rect::from_min_size(
                Pos2::new(origin.x, origin.y + layer.y as f32),
                Vec2::new(canvas_w, layer.height as f32),
            );
            let fill = if layer.lock { ctx.theme.track_locked } else { ctx.theme.track_row };
            painter.rect_filled(row, 0.0, fill);
            painter.line_segment(
                [row.left_bottom(), row.right_bottom()],
                Stroke::new(1.0, BORDER),
            );

            // Label pinned to the visible left edge; right-click opens the
            // host's track menu.
            let label = if layer.label.is_empty() {
                ctx.track_label_format.replace("%s", &layer.number.to_string())
            } else {
                layer.label.clone()
            };
            let label_pos = Pos2::new(origin.x + ctx.scroll_x + 6.0, row.top() + 4.0);
            let text = if layer.lock { format!("{label} 🔒") } else { label };
            let galley_rect = Rect::from_min_size(label_pos, Vec2::new(90.0, 14.0));
            painter.text(
                label_pos,
                Align2::LEFT_TOP,
                text,
                FontId::proportional(11.0),
                TEXT_DIM,
            );
            let label_resp = ui.interact(
                galley_rect,
                egui::Id::new(("track-label", layer.number)),
                Sense::click(),
            );
            if label_resp.secondary_clicked() {
                cmd.push(EngineCommand::ShowTrackMenu(layer.number));
            }
        }
    }

    // ── Background: marquee, clear, timeline menu ────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn background_ui(
        &self,
        background: &egui::Response,
        origin: Pos2,
        project: &Project,
        ctx: &mut EngineContext,
        cmd: &mut Vec<EngineCommand>,
        mods: Modifiers,
    ) {
        let pps = project.pixels_per_second();

        if background.clicked() && !ctx.dragging() {
            cmd.push(EngineCommand::ClearAllSelections);
        }
        if background.secondary_clicked() {
            if let Some(pointer) = background.interact_pointer_pos() {
                let seconds = pixel_to_time((pointer.x - origin.x) as f64, pps).max(0.0);
                let layer = project
                    .find_track_at_y((pointer.y - origin.y) as f64)
                    .map(|l| l.number)
                    .unwrap_or(0);
                cmd.push(EngineCommand::ShowTimelineMenu { seconds, layer });
            }
        }

        // Marquee. Starting is implicitly blocked over entities because
        // their interacts sit above the background.
        if background.drag_started() && !ctx.dragging() && !ctx.razor {
            if let Some(pointer) = background.interact_pointer_pos() {
                ctx.interaction.gesture = Some(Gesture::Marquee(MarqueeState {
                    origin: pointer,
                    current: pointer,
                    additive: mods.ctrl,
                }));
            }
        }
        if background.dragged() {
            if let (Some(Gesture::Marquee(m)), Some(pointer)) =
                (&mut ctx.interaction.gesture, background.interact_pointer_pos())
            {
                m.current = pointer;
            }
        }
        if background.drag_stopped() {
            if let Some(Gesture::Marquee(m)) = ctx.interaction.gesture.take() {
                let band = Rect::from_two_pos(m.origin, m.current);
                if !m.additive {
                    cmd.push(EngineCommand::ClearAllSelections);
                }
                let mut select = |id: &str, kind: ItemKind, selected: bool| {
                    // Additive marquee toggles; plain marquee adds onto the
                    // clear above. Either way the ctrl path avoids a second
                    // implicit clear inside the selection machine.
                    if m.additive || !selected {
                        cmd.push(EngineCommand::SelectItem {
                            id: id.into(),
                            kind,
                            clear_selections: false,
                            modifiers: Modifiers { ctrl: true, shift: false, alt: false },
                            force_ripple: false,
                        });
                    }
                };
                for clip in &project.clips {
                    if entity_rect(origin, project, clip.left(), clip.duration(), clip.layer)
                        .map(|r| r.intersects(band))
                        .unwrap_or(false)
                    {
                        select(&clip.id, ItemKind::Clip, clip.selected);
                    }
                }
                for tr in &project.transitions {
                    if entity_rect(origin, project, tr.left(), tr.duration(), tr.layer)
                        .map(|r| r.intersects(band))
                        .unwrap_or(false)
                    {
                        select(&tr.id, ItemKind::Transition, tr.selected);
                    }
                }
                ctx.interaction.clear();
            }
        }
    }

    // ── Clips ────────────────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn clip_ui(
        &self,
        ui: &mut Ui,
        painter: &egui::Painter,
        origin: Pos2,
        project: &Project,
        clip: &Clip,
        ctx: &mut EngineContext,
        cmd: &mut Vec<EngineCommand>,
        mods: Modifiers,
    ) {
        let Some(rect) = entity_rect(origin, project, clip.left(), clip.duration(), clip.layer)
        else {
            log::debug!("[timeline] clip {} on unknown layer {}", clip.id, clip.layer);
            return;
        };

        let audio_only = clip.reader.has_audio && !clip.reader.has_video;
        let body = if clip.selected {
            ctx.theme.clip_selected
        } else if audio_only {
            ctx.theme.clip_audio
        } else {
            ctx.theme.clip_body
        };
        painter.rect_filled(rect, 4.0, body);

        // Thumbnail at the clip head, video clips only.
        if clip.reader.has_video && rect.width() > 24.0 {
            let server = ctx.thumb_server.clone();
            if let Some(tex) = ctx.thumbs.texture(server.as_deref(), clip) {
                let aspect = tex.size_vec2().x / tex.size_vec2().y.max(1.0);
                let tile_w = (rect.height() * aspect).min(rect.width());
                let tile = Rect::from_min_size(
                    Pos2::new(rect.left(), rect.top() + 3.0),
                    Vec2::new(tile_w, rect.height() - 3.0),
                );
                let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
                painter.image(tex.id(), tile, uv, Color32::from_rgba_unmultiplied(255, 255, 255, 140));
            }
        }

        if !clip.ui.audio_data.is_empty() && rect.width() > 10.0 {
            draw_waveform(painter, rect, &clip.ui.audio_data);
        }

        if rect.width() > 30.0 {
            painter.text(
                rect.min + Vec2::new(6.0, 5.0),
                Align2::LEFT_TOP,
                fit_label(&clip.file_id, rect.width() * 0.5, 6.5),
                FontId::proportional(11.0),
                Color32::from_rgba_unmultiplied(255, 255, 255, 220),
            );
        }

        painter.rect_stroke(
            rect,
            4.0,
            Stroke::new(
                if clip.selected { 1.5 } else { 1.0 },
                if clip.selected { ctx.theme.clip_selected } else { BORDER },
            ),
            StrokeKind::Outside,
        );

        // ── Effect badges ────────────────────────────────────────────────
        for (index, effect) in clip.effects.iter().enumerate() {
            let color = cutline_core::keyframes::EFFECT_PALETTE
                [index % cutline_core::keyframes::EFFECT_PALETTE.len()];
            let center = Pos2::new(rect.left() + 10.0 + index as f32 * 13.0, rect.bottom() - 24.0);
            let color = Color32::from_rgb(color[0], color[1], color[2]);
            painter.circle_filled(center, 5.0, color);
            if effect.selected {
                painter.circle_stroke(center, 6.5, Stroke::new(1.5, Color32::WHITE));
            }
            let badge = ui.interact(
                Rect::from_center_size(center, Vec2::splat(13.0)),
                egui::Id::new(("effect", effect.id.as_str())),
                Sense::click(),
            );
            if badge.clicked() {
                cmd.push(EngineCommand::SelectItem {
                    id: effect.id.clone(),
                    kind: ItemKind::Effect,
                    clear_selections: true,
                    modifiers: mods,
                    force_ripple: false,
                });
            }
            if badge.secondary_clicked() {
                cmd.push(EngineCommand::ShowEffectMenu(effect.id.clone()));
            }
        }

        // ── Trim handles ─────────────────────────────────────────────────
        // 7 px strips at each edge. Dragging the left edge trims start and
        // position; the right edge trims end (or retimes in timing mode).
        let left_rect = Rect::from_min_size(rect.min, Vec2::new(TRIM_HANDLE_PX, rect.height()));
        let right_rect = Rect::from_min_max(
            Pos2::new(rect.right() - TRIM_HANDLE_PX, rect.top()),
            rect.max,
        );
        let left = ui.interact(left_rect, egui::Id::new(("trim-l", clip.id.as_str())), Sense::drag());
        let right =
            ui.interact(right_rect, egui::Id::new(("trim-r", clip.id.as_str())), Sense::drag());
        let resizing_this = matches!(
            &ctx.interaction.gesture,
            Some(Gesture::ResizeClip(g)) if g.id == clip.id
        );

        if left.hovered() || right.hovered() || resizing_this {
            ui.ctx().set_cursor_icon(CursorIcon::ResizeHorizontal);
        }
        if (left.hovered() || right.hovered() || resizing_this) || clip.selected {
            let col = Color32::from_rgba_unmultiplied(255, 255, 255, if resizing_this { 180 } else { 80 });
            painter.rect_filled(left_rect.shrink2(Vec2::new(2.0, 0.0)), 2.0, col);
            painter.rect_filled(right_rect.shrink2(Vec2::new(2.0, 0.0)), 2.0, col);
        }

        for (resp, handle) in [(&left, EdgeHandle::Left), (&right, EdgeHandle::Right)] {
            if resp.drag_started() && !ctx.dragging() {
                self.begin_clip_resize(project, clip, handle, resp, ctx, cmd);
            }
        }
        if resizing_this {
            if left.dragged() || right.dragged() {
                let pointer = left
                    .interact_pointer_pos()
                    .or_else(|| right.interact_pointer_pos());
                if let Some(pointer) = pointer {
                    self.update_clip_resize(project, clip, pointer, ctx, cmd);
                }
            }
            if left.drag_stopped() || right.drag_stopped() {
                self.finish_clip_resize(project, clip, ctx, cmd);
            }
        }

        // ── Body: select / move / context menu ───────────────────────────
        // Skipped while a resize is live so edges don't move the clip.
        let body_resp =
            ui.interact(rect, egui::Id::new(("clip", clip.id.as_str())), Sense::click_and_drag());
        if !resizing_this {
            if body_resp.clicked() {
                cmd.push(EngineCommand::SelectItem {
                    id: clip.id.clone(),
                    kind: ItemKind::Clip,
                    clear_selections: true,
                    modifiers: mods,
                    force_ripple: false,
                });
            }
            if body_resp.secondary_clicked() {
                cmd.push(EngineCommand::SelectItem {
                    id: clip.id.clone(),
                    kind: ItemKind::Clip,
                    clear_selections: !clip.selected,
                    modifiers: mods,
                    force_ripple: false,
                });
                cmd.push(EngineCommand::ShowClipMenu(clip.id.clone()));
            }
            self.item_move_ui(&body_resp, &clip.id, ItemKind::Clip, clip.selected, project, ctx, cmd, mods);
        }

        // ── Keyframe marks ───────────────────────────────────────────────
        self.keyframe_marks_ui(ui, painter, project, clip.id.as_str(), ItemKind::Clip, &rect, clip.start, clip.position, clip.end, clip.ui.keyframe_preview.as_ref(), ctx, cmd, |ctx| {
            let filter = ctx.property_filter.clone();
            ctx.kf_cache.clip_marks(clip, project.fps, &filter).clone()
        });
    }

    // ── Transitions ──────────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn transition_ui(
        &self,
        ui: &mut Ui,
        painter: &egui::Painter,
        origin: Pos2,
        project: &Project,
        tr: &Transition,
        ctx: &mut EngineContext,
        cmd: &mut Vec<EngineCommand>,
        mods: Modifiers,
    ) {
        let Some(rect) = entity_rect(origin, project, tr.left(), tr.duration(), tr.layer) else {
            log::debug!("[timeline] transition {} on unknown layer {}", tr.id, tr.layer);
            return;
        };
        // Transitions occupy the upper half of the row so overlapped clips
        // stay visible and grabbable underneath.
        let rect = Rect::from_min_size(rect.min, Vec2::new(rect.width(), rect.height() * 0.5));

        let body = if tr.selected { ctx.theme.transition_selected } else { ctx.theme.transition_body };
        painter.rect_filled(rect, 3.0, body.linear_multiply(0.85));
        painter.rect_stroke(
            rect,
            3.0,
            Stroke::new(1.0, if tr.selected { Color32::WHITE } else { BORDER }),
            StrokeKind::Inside,
        );
        if rect.width() > 26.0 {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "⧉",
                FontId::proportional(10.0),
                Color32::from_rgba_unmultiplied(255, 255, 255, 180),
            );
        }

        // Edge handles resize the transition in place.
        let left_rect = Rect::from_min_size(rect.min, Vec2::new(TRIM_HANDLE_PX, rect.height()));
        let right_rect =
            Rect::from_min_max(Pos2::new(rect.right() - TRIM_HANDLE_PX, rect.top()), rect.max);
        let left = ui.interact(left_rect, egui::Id::new(("tr-l", tr.id.as_str())), Sense::drag());
        let right = ui.interact(right_rect, egui::Id::new(("tr-r", tr.id.as_str())), Sense::drag());
        let resizing_this = matches!(
            &ctx.interaction.gesture,
            Some(Gesture::ResizeTransition(g)) if g.id == tr.id
        );
        if left.hovered() || right.hovered() || resizing_this {
            ui.ctx().set_cursor_icon(CursorIcon::ResizeHorizontal);
        }

        for (resp, handle) in [(&left, EdgeHandle::Left), (&right, EdgeHandle::Right)] {
            if resp.drag_started() && !ctx.dragging() {
                if let Some(pointer) = resp.interact_pointer_pos() {
                    ctx.interaction.gesture =
                        Some(Gesture::ResizeTransition(TransitionResizeGesture {
                            id: tr.id.clone(),
                            handle,
                            original_position: tr.position,
                            original_end: tr.end,
                            pointer_origin_x: pointer.x,
                            transaction: cutline_bridge::transaction_id(),
                        }));
                }
            }
        }
        if resizing_this {
            if left.dragged() || right.dragged() {
                let pointer =
                    left.interact_pointer_pos().or_else(|| right.interact_pointer_pos());
                if let Some(pointer) = pointer {
                    self.update_transition_resize(project, pointer, ctx, cmd);
                }
            }
            if left.drag_stopped() || right.drag_stopped() {
                self.finish_transition_resize(tr, ctx, cmd);
            }
        }

        let body_resp =
            ui.interact(rect, egui::Id::new(("transition", tr.id.as_str())), Sense::click_and_drag());
        if !resizing_this {
            if body_resp.clicked() {
                cmd.push(EngineCommand::SelectItem {
                    id: tr.id.clone(),
                    kind: ItemKind::Transition,
                    clear_selections: true,
                    modifiers: mods,
                    force_ripple: false,
                });
            }
            if body_resp.secondary_clicked() {
                cmd.push(EngineCommand::SelectItem {
                    id: tr.id.clone(),
                    kind: ItemKind::Transition,
                    clear_selections: !tr.selected,
                    modifiers: mods,
                    force_ripple: false,
                });
                cmd.push(EngineCommand::ShowTransitionMenu(tr.id.clone()));
            }
            self.item_move_ui(&body_resp, &tr.id, ItemKind::Transition, tr.selected, project, ctx, cmd, mods);
        }

        self.keyframe_marks_ui(ui, painter, project, tr.id.as_str(), ItemKind::Transition, &rect, tr.start, tr.position, tr.end, tr.ui.keyframe_preview.as_ref(), ctx, cmd, |ctx| {
            let filter = ctx.property_filter.clone();
            ctx.kf_cache.transition_marks(tr, project.fps, &filter).clone()
        });
    }

    // ── Shared move directive ────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn item_move_ui(
        &self,
        resp: &egui::Response,
        id: &str,
        kind: ItemKind,
        selected: bool,
        project: &Project,
        ctx: &mut EngineContext,
        cmd: &mut Vec<EngineCommand>,
        mods: Modifiers,
    ) {
        // Razor mode: clicks slice, drags are dead.
        if ctx.razor {
            return;
        }

        if resp.drag_started() && !ctx.dragging() {
            let Some(pointer) = resp.interact_pointer_pos() else { return };
            // The dragged item rides along even when the click that starts
            // the drag hasn't committed its selection yet.
            let mut ids: Vec<(String, ItemKind)> = project
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
            if !selected {
                cmd.push(EngineCommand::SelectItem {
                    id: id.to_string(),
                    kind,
                    clear_selections: true,
                    modifiers: mods,
                    force_ripple: false,
                });
                // A plain drag on an unselected item starts a fresh
                // selection, so only it moves; ctrl keeps the group.
                if !mods.ctrl {
                    ids.clear();
                }
                ids.push((id.to_string(), kind));
            }
            let Some(bbox) = BoundingBox::from_items(project, &ids) else { return };
            ctx.interaction.gesture = Some(Gesture::Move(MoveGesture {
                bbox,
                origin: pointer,
                transaction: cutline_bridge::transaction_id(),
                refused: false,
                last_dx: 0.0,
                last_dy: 0.0,
            }));
        }

        if resp.dragged() {
            let Some(pointer) = resp.interact_pointer_pos() else { return };
            let snapping = ctx.snapping;
            let mut applied = None;
            if let Some(Gesture::Move(g)) = &mut ctx.interaction.gesture {
                let dx = (pointer.x - g.origin.x) as f64;
                let dy = (pointer.y - g.origin.y) as f64;
                let outcome = g.bbox.propose_move(
                    project,
                    dx,
                    dy,
                    SnapOptions {
                        enabled: snapping,
                        threshold_px: SNAP_THRESHOLD_PX,
                        include_keyframes: true,
                    },
                );
                applied = Some(match outcome {
                    MoveOutcome::Refused => {
                        // Park the elements; pointer keeps moving.
                        g.refused = true;
                        (g.bbox.live_placements(project, g.last_dx, g.last_dy), None, false)
                    }
                    MoveOutcome::Moved { dx, dy, snap } => {
                        g.refused = false;
                        g.last_dx = dx;
                        g.last_dy = dy;
                        (g.bbox.live_placements(project, dx, dy), snap, true)
                    }
                });
            }
            if let Some((moves, snap, moved)) = applied {
                cmd.push(EngineCommand::PlaceItemsLive { moves });
                if moved {
                    match snap {
                        Some(s) => ctx.interaction.show_snapline(s.target_px as f32),
                        None => ctx.interaction.hide_snapline(),
                    }
                }
            }
        }

        if resp.drag_stopped() {
            if let Some(Gesture::Move(g)) = ctx.interaction.gesture.take() {
                if g.refused {
                    // Locked-layer refusal: restore start positions, no
                    // host traffic at all.
                    let moves = g.bbox.live_placements(project, 0.0, 0.0);
                    cmd.push(EngineCommand::PlaceItemsLive { moves });
                } else {
                    let placements = g.bbox.placements(project, g.last_dx, g.last_dy);
                    cmd.push(EngineCommand::MoveItems {
                        placements,
                        transaction: g.transaction,
                    });
                }
                ctx.interaction.clear();
            }
        }
    }

    // ── Clip resize directive ────────────────────────────────────────────────

    fn begin_clip_resize(
        &self,
        project: &Project,
        clip: &Clip,
        handle: EdgeHandle,
        resp: &egui::Response,
        ctx: &mut EngineContext,
        cmd: &mut Vec<EngineCommand>,
    ) {
        let Some(pointer) = resp.interact_pointer_pos() else { return };
        let mode = if ctx.timing { PreviewMode::Retime } else { PreviewMode::Trim };

        // Right-handle ceiling: the source's natural duration, unless a
        // time curve (or timing mode itself) lifts it.
        let max_duration = if ctx.timing {
            None
        } else if let Some(time_track) = clip.time_curve() {
            retimed_duration(time_track, project.fps)
        } else if clip.is_single_image() {
            None
        } else {
            Some(clip.reader.duration)
        };

        let original = ClipShape { position: clip.position, start: clip.start, end: clip.end };
        let transaction = cutline_bridge::transaction_id();
        ctx.interaction.gesture = Some(Gesture::ResizeClip(ClipResizeGesture {
            id: clip.id.clone(),
            handle,
            mode,
            original,
            pointer_origin_x: pointer.x,
            max_duration,
            transaction,
        }));

        // Open the preview immediately so keyframes dim/stretch from the
        // first dragged pixel.
        let preview = make_preview(project, mode, original, original);
        cmd.push(EngineCommand::ResizeClipLive {
            id: clip.id.clone(),
            position: clip.position,
            start: clip.start,
            end: clip.end,
            preview: Some(preview),
        });
    }

    fn update_clip_resize(
        &self,
        project: &Project,
        clip: &Clip,
        pointer: Pos2,
        ctx: &mut EngineContext,
        cmd: &mut Vec<EngineCommand>,
    ) {
        let pps = project.pixels_per_second();
        let snapping = ctx.snapping;
        let Some(Gesture::ResizeClip(g)) = &ctx.interaction.gesture else { return };
        let g = g.clone();

        let mut dt = (pointer.x - g.pointer_origin_x) as f64 / pps;

        // Snap the dragged edge alone.
        if snapping {
            let edge_time = match g.handle {
                EdgeHandle::Left => g.original.position + dt,
                EdgeHandle::Right => g.original.position + (g.original.end - g.original.start) + dt,
            };
            let ignore: HashSet<String> = [g.id.clone()].into();
            if let Some(snap) = find_snap(
                project,
                &SnapQuery {
                    candidates_px: &[time_to_pixel(edge_time, pps)],
                    threshold_px: SNAP_THRESHOLD_PX,
                    ignore_ids: &ignore,
                    include_keyframes: true,
                },
            ) {
                dt -= snap.diff_px / pps;
                ctx.interaction.show_snapline(snap.target_px as f32);
            } else {
                ctx.interaction.hide_snapline();
            }
        }

        let shape = resize_clip_shape(&g, clip, project, dt);
        let preview = make_preview(project, g.mode, g.original, shape);
        cmd.push(EngineCommand::ResizeClipLive {
            id: g.id.clone(),
            position: shape.position,
            start: shape.start,
            end: shape.end,
            preview: Some(preview),
        });
    }

    fn finish_clip_resize(
        &self,
        project: &Project,
        clip: &Clip,
        ctx: &mut EngineContext,
        cmd: &mut Vec<EngineCommand>,
    ) {
        let Some(Gesture::ResizeClip(g)) = ctx.interaction.gesture.take() else { return };
        ctx.interaction.clear();

        match g.mode {
            PreviewMode::Trim => {
                // The replica already holds the live shape; quantise it.
                let fps = project.fps;
                let start = snap_to_fps_grid(clip.start, fps).max(0.0);
                let mut end = snap_to_fps_grid(clip.end, fps);
                let position = snap_to_fps_grid(clip.position, fps).max(0.0);
                if end < start {
                    end = start;
                }
                cmd.push(EngineCommand::TrimClip {
                    id: g.id,
                    position,
                    start,
                    end,
                    transaction: g.transaction,
                });
            }
            PreviewMode::Retime => {
                let fps = project.fps;
                let end = snap_to_fps_grid(clip.end, fps);
                let position = snap_to_fps_grid(clip.position, fps).max(0.0);
                cmd.push(EngineCommand::RetimeClip {
                    id: g.id,
                    position,
                    end,
                    transaction: g.transaction,
                });
            }
        }
    }

    // ── Transition resize directive ──────────────────────────────────────────

    fn update_transition_resize(
        &self,
        project: &Project,
        pointer: Pos2,
        ctx: &mut EngineContext,
        cmd: &mut Vec<EngineCommand>,
    ) {
        let pps = project.pixels_per_second();
        let Some(Gesture::ResizeTransition(g)) = &ctx.interaction.gesture else { return };
        let dt = (pointer.x - g.pointer_origin_x) as f64 / pps;
        let min_len = 1.0 / project.fps.value();

        let (position, end) = match g.handle {
            EdgeHandle::Left => {
                // Clamp the left-edge movement so the duration keeps at
                // least one frame and the transition stays on the timeline.
                let moved = dt.clamp(-g.original_position, g.original_end - min_len);
                (g.original_position + moved, g.original_end - moved)
            }
            EdgeHandle::Right => (g.original_position, (g.original_end + dt).max(min_len)),
        };
        cmd.push(EngineCommand::ResizeTransitionLive {
            id: g.id.clone(),
            position,
            end,
            preview: Some(make_preview(
                project,
                PreviewMode::Trim,
                ClipShape { position: g.original_position, start: 0.0, end: g.original_end },
                ClipShape { position, start: 0.0, end },
            )),
        });
    }

    fn finish_transition_resize(
        &self,
        tr: &Transition,
        ctx: &mut EngineContext,
        cmd: &mut Vec<EngineCommand>,
    ) {
        let Some(Gesture::ResizeTransition(g)) = ctx.interaction.gesture.take() else { return };
        ctx.interaction.clear();
        cmd.push(EngineCommand::ResizeTransition {
            id: g.id,
            position: tr.position,
            end: tr.end,
            transaction: g.transaction,
        });
    }

    // ── Keyframe marks + drag directive ──────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn keyframe_marks_ui(
        &self,
        ui: &mut Ui,
        painter: &egui::Painter,
        project: &Project,
        entity_id: &str,
        kind: ItemKind,
        rect: &Rect,
        entity_start: f64,
        entity_position: f64,
        entity_end: f64,
        preview: Option<&KeyframePreview>,
        ctx: &mut EngineContext,
        cmd: &mut Vec<EngineCommand>,
        marks_of: impl FnOnce(&mut EngineContext) -> cutline_core::keyframes::MarkMap,
    ) {
        let marks = marks_of(ctx);
        if marks.is_empty() {
            return;
        }
        let pps = project.pixels_per_second();
        let fps = project.fps;
        let lane_y = rect.bottom() - 9.0;
        let candidate = ctx.interaction.keyframe_candidate(entity_id);

        for (frame, mark) in &marks {
            // A live drag paints the dragged frame at its candidate spot.
            let draw_frame = match candidate {
                Some((original, moved)) if original == *frame => moved,
                _ => *frame,
            };
            let source = frame_to_seconds(draw_frame, fps);
            let left_px = match preview {
                Some(p) => p.left_px(p.map_seconds(source)) as f64,
                None => time_to_pixel(source - entity_start, pps),
            };
            let x = rect.left() + left_px as f32;
            if x < rect.left() - 2.0 || x > rect.right() + 2.0 {
                // Outside marks stay in the enumeration (dimming contract)
                // but there is nothing sensible to hit-test off-clip.
                continue;
            }
            let center = Pos2::new(x, lane_y);
            draw_mark(painter, center, mark, ctx);

            let hit = Rect::from_center_size(center, Vec2::splat(KEYFRAME_HIT_PX));
            let resp = ui.interact(
                hit,
                egui::Id::new(("kf", entity_id, *frame)),
                Sense::click_and_drag(),
            );
            if resp.clicked() {
                let timeline_seconds = entity_position + (source - entity_start);
                cmd.push(EngineCommand::SeekToKeyframe(
                    cutline_core::helpers::time::frame_at(timeline_seconds, fps),
                ));
            }
            if resp.drag_started() && !ctx.dragging() {
                let transaction = cutline_bridge::transaction_id();
                cmd.push(EngineCommand::StartKeyframeDrag {
                    id: entity_id.to_string(),
                    kind,
                    transaction: transaction.clone(),
                });
                ctx.interaction.gesture = Some(Gesture::Keyframe(KeyframeDrag {
                    kind,
                    entity_id: entity_id.to_string(),
                    original_frame: *frame,
                    candidate_frame: *frame,
                    transaction,
                }));
            }
            if resp.dragged() {
                if let (Some(Gesture::Keyframe(k)), Some(pointer)) =
                    (&mut ctx.interaction.gesture, resp.interact_pointer_pos())
                {
                    if k.entity_id == entity_id && k.original_frame == *frame {
                        // Pointer → source seconds, FPS grid, clamp to the
                        // visible slice (exclusive right edge: the last
                        // valid frame is floor(end · F)).
                        let raw =
                            entity_start + (pointer.x - rect.left()) as f64 / pps;
                        let snapped = snap_to_fps_grid(raw, fps);
                        let max_t = entity_end - 1.0 / fps.value();
                        let clamped = snapped.clamp(entity_start, max_t.max(entity_start));
                        k.candidate_frame = seconds_to_frame(clamped, fps);
                    }
                }
            }
            if resp.drag_stopped() {
                if let Some(Gesture::Keyframe(k)) = ctx.interaction.gesture.take() {
                    cmd.push(EngineCommand::RemapKeyframe {
                        id: k.entity_id,
                        kind: k.kind,
                        old_frame: k.original_frame,
                        new_frame: k.candidate_frame,
                        transaction: k.transaction,
                    });
                    ctx.interaction.clear();
                }
            }
        }
    }
}

// ── Free helpers ──────────────────────────────────────────────────────────────

/// Screen rect of a positioned entity, None when its layer is unknown.
fn entity_rect(
    origin: Pos2,
    project: &Project,
    left_seconds: f64,
    duration: f64,
    layer: i32,
) -> Option<Rect> {
    let row = project.layer(layer)?;
    let pps = project.pixels_per_second();
    Some(Rect::from_min_size(
        Pos2::new(
            origin.x + time_to_pixel(left_seconds, pps) as f32,
            origin.y + row.y as f32,
        ),
        Vec2::new(
            (time_to_pixel(duration, pps) as f32).max(4.0),
            row.height as f32,
        ),
    ))
}

/// Resize constraint math for a clip, §-by-§:
///
/// Left handle: start and position track the pointer; start clamps at 0
/// (run out of source → the clip slides), position clamps at 0 (hit the
/// timeline wall → the overflow eats the end). Single-image and
/// timing-mode clips have no source floor cost: their end never shrinks
/// from wall overflow.
///
/// Right handle: end tracks the pointer, floored at one frame, capped at
/// `start + max_duration` when a ceiling applies.
fn resize_clip_shape(
    g: &ClipResizeGesture,
    clip: &Clip,
    project: &Project,
    dt: f64,
) -> ClipShape {
    let min_len = 1.0 / project.fps.value();
    let o = g.original;
    match g.handle {
        EdgeHandle::Left => {
            let free_extend = clip.is_single_image() || g.mode == PreviewMode::Retime;
            // Rightward clamp first: the left edge cannot cross the right.
            let dt = dt.min((o.end - o.start) - min_len);
            let new_start = (o.start + dt).max(0.0);
            let raw_position = o.position + dt;
            let new_position = raw_position.max(0.0);
            let wall_overflow = new_position - raw_position;
            let new_end = if free_extend { o.end } else { (o.end - wall_overflow).max(new_start + min_len) };
            ClipShape { position: new_position, start: new_start, end: new_end }
        }
        EdgeHandle::Right => {
            let mut new_end = (o.end + dt).max(o.start + min_len);
            if let Some(max) = g.max_duration {
                new_end = new_end.min(o.start + max);
            }
            ClipShape { position: o.position, start: o.start, end: new_end }
        }
    }
}

/// Build the live preview transform for the current shape of a resize.
fn make_preview(
    project: &Project,
    mode: PreviewMode,
    original: ClipShape,
    current: ClipShape,
) -> KeyframePreview {
    KeyframePreview {
        mode,
        original_start: original.start,
        original_end: original.end,
        display_start: current.start,
        display_end: current.end,
        projected_start: original.start,
        projected_end: original.end,
        pixels_per_second: project.pixels_per_second(),
    }
}

/// Paint one keyframe mark: circle = bezier, diamond = linear, square =
/// constant. Effect-owned marks take their effect's palette color; marks
/// a preview pushed outside the window are dimmed, not hidden.
fn draw_mark(painter: &egui::Painter, center: Pos2, mark: &KeyframeMark, ctx: &EngineContext) {
    let base = mark
        .color
        .map(|c| Color32::from_rgb(c[0], c[1], c[2]))
        .unwrap_or(ctx.theme.keyframe);
    let color = if !mark.inside_preview {
        base.linear_multiply(0.3)
    } else if !mark.selected && !mark.base_selected {
        // Visible only because a preview is live on an unselected entity.
        base.linear_multiply(0.6)
    } else {
        base
    };
    match mark.interpolation {
        Interpolation::Bezier => {
            painter.circle_filled(center, 3.5, color);
        }
        Interpolation::Linear => {
            painter.add(egui::Shape::convex_polygon(
                vec![
                    center + Vec2::new(0.0, -4.0),
                    center + Vec2::new(4.0, 0.0),
                    center + Vec2::new(0.0, 4.0),
                    center + Vec2::new(-4.0, 0.0),
                ],
                color,
                Stroke::NONE,
            ));
        }
        Interpolation::Constant => {
            painter.rect_filled(Rect::from_center_size(center, Vec2::splat(6.0)), 1.0, color);
        }
    }
    if mark.selected {
        painter.circle_stroke(center, 5.5, Stroke::new(1.0, Color32::WHITE));
    }
}

/// Audio waveform primitive: mirrored peak bars over the lower half of the
/// clip body, stretched across the current width so live resizes redraw
/// against the preview window for free.
fn draw_waveform(painter: &egui::Painter, rect: Rect, peaks: &[f32]) {
    let n = peaks.len();
    if n == 0 {
        return;
    }
    let mid = rect.bottom() - rect.height() * 0.28;
    let max_h = rect.height() * 0.26;
    let step = n as f32 / rect.width().max(1.0);
    let mut x = rect.left();
    while x < rect.right() {
        let idx = (((x - rect.left()) * step) as usize).min(n - 1);
        let h = (peaks[idx].clamp(0.0, 1.0)) * max_h;
        painter.line_segment(
            [Pos2::new(x, mid - h), Pos2::new(x, mid + h)],
            Stroke::new(1.0, Color32::from_rgba_unmultiplied(255, 255, 255, 90)),
        );
        x += 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutline_core::keyframes::PropertyMap;
    use cutline_core::project::{Fps, Reader};

    fn project_24() -> Project {
        let mut p = Project {
            fps: Fps { num: 24, den: 1 },
            duration: 300.0,
            scale: 2.0,
            tick_pixels: 100.0,
            layers: vec![cutline_core::Layer::new(1)],
            ..Project::default()
        };
        p.normalize();
        p
    }

    fn clip(position: f64, start: f64, end: f64, single_image: bool) -> Clip {
        Clip {
            id: "c1".into(),
            file_id: "f1".into(),
            layer: 1,
            position,
            start,
            end,
            selected: false,
            reader: Reader {
                has_video: true,
                has_audio: false,
                fps: Fps { num: 24, den: 1 },
                duration: 6.0,
                video_length: 144,
                media_type: if single_image { "image".into() } else { "video".into() },
                has_single_image: single_image,
            },
            effects: Vec::new(),
            ui: Default::default(),
            properties: PropertyMap::new(),
        }
    }

    fn gesture(clip: &Clip, handle: EdgeHandle, mode: PreviewMode) -> ClipResizeGesture {
        ClipResizeGesture {
            id: clip.id.clone(),
            handle,
            mode,
            original: ClipShape { position: clip.position, start: clip.start, end: clip.end },
            pointer_origin_x: 0.0,
            max_duration: if single_image_or_retime(clip, mode) {
                None
            } else {
                Some(clip.reader.duration)
            },
            transaction: String::new(),
        }
    }

    fn single_image_or_retime(clip: &Clip, mode: PreviewMode) -> bool {
        clip.is_single_image() || mode == PreviewMode::Retime
    }

    #[test]
    fn left_trim_overflow_absorbs_into_start_clamp() {
        // Normal clip {position 2, start 1, end 5}, dragged left by 3 s:
        // start and position clamp at 0 and the wall overflow eats the end.
        let p = project_24();
        let c = clip(2.0, 1.0, 5.0, false);
        let g = gesture(&c, EdgeHandle::Left, PreviewMode::Trim);
        let shape = resize_clip_shape(&g, &c, &p, -3.0);
        assert_eq!(shape.position, 0.0);
        assert_eq!(shape.start, 0.0);
        assert_eq!(shape.end, 4.0);
    }

    #[test]
    fn single_image_left_overflow_extends_instead() {
        // Same shape, single-image clip: no source floor, end stays put so
        // the visible duration grows by the revealed second.
        let p = project_24();
        let c = clip(2.0, 1.0, 5.0, true);
        let g = gesture(&c, EdgeHandle::Left, PreviewMode::Trim);
        let shape = resize_clip_shape(&g, &c, &p, -3.0);
        assert_eq!(shape.position, 0.0);
        assert_eq!(shape.start, 0.0);
        assert_eq!(shape.end, 5.0);
    }

    #[test]
    fn partial_left_trim_keeps_the_right_edge_fixed() {
        let p = project_24();
        let c = clip(2.0, 1.0, 5.0, false);
        let g = gesture(&c, EdgeHandle::Left, PreviewMode::Trim);
        let shape = resize_clip_shape(&g, &c, &p, -0.5);
        assert_eq!(shape.position, 1.5);
        assert_eq!(shape.start, 0.5);
        assert_eq!(shape.end, 5.0);
        // Right edge = position + (end − start) is unchanged.
        assert_eq!(shape.position + (shape.end - shape.start), 6.0);
    }

    #[test]
    fn right_trim_clamps_to_the_reader_duration() {
        // reader.duration = 6, start 1 → end can reach 7 at most.
        let p = project_24();
        let c = clip(0.0, 1.0, 4.0, false);
        let g = gesture(&c, EdgeHandle::Right, PreviewMode::Trim);
        let shape = resize_clip_shape(&g, &c, &p, 10.0);
        assert_eq!(shape.end, 7.0);
        assert_eq!(shape.start, 1.0);
    }

    #[test]
    fn retime_right_handle_is_unlimited() {
        let p = project_24();
        let c = clip(0.0, 1.0, 4.0, false);
        let g = gesture(&c, EdgeHandle::Right, PreviewMode::Retime);
        let shape = resize_clip_shape(&g, &c, &p, 10.0);
        assert_eq!(shape.end, 14.0);
        assert_eq!(shape.start, 1.0, "retime pins the source start");
    }

    #[test]
    fn left_handle_cannot_cross_the_right_edge() {
        let p = project_24();
        let c = clip(0.0, 1.0, 5.0, false);
        let g = gesture(&c, EdgeHandle::Left, PreviewMode::Trim);
        let shape = resize_clip_shape(&g, &c, &p, 100.0);
        assert!(shape.start < shape.end);
        assert!(shape.end - shape.start >= 1.0 / 24.0 - 1e-9);
    }

    #[test]
    fn canvas_width_respects_the_render_cap() {
        let mut p = project_24();
        p.duration = 1.0e6; // far past the 16-bit canvas limit at 50 px/s
        assert!(canvas_width(&p) <= MAX_CANVAS_PX as f32);
    }
}
