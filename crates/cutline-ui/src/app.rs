// src/app.rs (cutline-ui)
//
// The engine frame loop. Each egui frame:
//   1. drain host requests from the bridge and apply them,
//   2. ingest finished thumbnail fetches,
//   3. run the view modules (which emit EngineCommands),
//   4. process the commands — mutate the replica and mirror every commit
//      to the host,
//   5. check timeline autogrow.
//
// The replica is mutated ONLY in steps 1 and 4; modules see an immutable
// project plus the mutable EngineContext. That keeps one frame of user
// input internally consistent: a command emitted this frame acts on the
// state the user saw.

use cutline_bridge::{EngineLink, HostCall, HostHandle, HostRequest};
use cutline_core::bbox::{BoundingBox, ItemPlacement, MoveOutcome, SnapOptions};
use cutline_core::diff::{apply_json_diff, load_project};
use cutline_core::helpers::time::{
    frame_at, frame_to_seconds, rescaled_scroll, snap_to_fps_grid, time_to_pixel, to_finite,
};
use cutline_core::keyframes::remap_clip_frames;
use cutline_core::project::{CacheRange, ItemKind, Progress};
use cutline_core::retime::resample_waveform;
use cutline_core::selection::{select_item, SelectFlags, SelectInput, SelectionOutcome};
use cutline_core::{Clip, EngineCommand, Fps, Layer, Marker, Project, Transition};
use eframe::egui;
use uuid::Uuid;

use crate::context::{EngineContext, ScrollRequest};
use crate::interaction::{Gesture, MoveGesture};
use crate::modules::ruler::RulerModule;
use crate::modules::timeline::{canvas_width, TimelineModule, SNAP_THRESHOLD_PX};
use crate::modules::EditorModule;
use crate::theme::configure_style;

pub struct CutlineApp {
    project: Project,
    context: EngineContext,
    modules: Vec<Box<dyn EditorModule>>,
    /// Commands emitted by modules each frame, processed after the UI pass.
    pending_cmds: Vec<EngineCommand>,
    /// First (x, y) seen by an external `moveItem` stream; deltas are
    /// relative to it.
    manual_origin: Option<(f64, f64)>,
    /// Keeps the demo-mode host side of the bridge alive when no real
    /// host is attached.
    _demo_host: Option<HostHandle>,
}

impl CutlineApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        bridge: EngineLink,
        demo_host: Option<HostHandle>,
    ) -> Self {
        configure_style(&cc.egui_ctx);
        cc.egui_ctx.options_mut(|o| {
            o.theme_preference = egui::ThemePreference::Dark;
        });

        CutlineApp {
            project: demo_project(),
            context: EngineContext::new(bridge),
            modules: vec![Box::new(RulerModule::new()), Box::new(TimelineModule::new())],
            pending_cmds: Vec::new(),
            manual_origin: None,
            _demo_host: demo_host,
        }
    }

    // ── Outbound helpers ─────────────────────────────────────────────────────

    /// Full entity JSON for a commit, minus the engine-transient `ui` blob.
    fn entity_json<T: serde::Serialize>(entity: &T) -> serde_json::Value {
        let mut value = serde_json::to_value(entity).unwrap_or(serde_json::Value::Null);
        if let Some(obj) = value.as_object_mut() {
            obj.remove("ui");
        }
        value
    }

    fn emit_clip_update(&self, id: &str, transaction: Option<String>) {
        if let Some(clip) = self.project.clip(id) {
            self.context.call(HostCall::UpdateClipData {
                json: Self::entity_json(clip),
                allow_keyframes: true,
                force_json_diff: false,
                ignore_refresh: false,
                transaction_id: transaction,
            });
        }
    }

    fn emit_transition_update(&self, id: &str, transaction: Option<String>) {
        if let Some(tr) = self.project.transition(id) {
            self.context.call(HostCall::UpdateTransitionData {
                json: Self::entity_json(tr),
                force_json_diff: false,
                ignore_refresh: false,
                transaction_id: transaction,
            });
        }
    }

    fn report_missing_transition(&self, clip_id: &str) {
        if let Some(proposal) = self.project.detect_missing_transition(clip_id) {
            let json = serde_json::to_value(&proposal).unwrap_or(serde_json::Value::Null);
            self.context.call(HostCall::AddMissingTransition { json });
        }
    }

    fn apply_selection_outcome(&mut self, outcome: SelectionOutcome) {
        match outcome {
            SelectionOutcome::Skipped => {}
            SelectionOutcome::Razor { clip_id, transition_id, seconds } => {
                self.context.call(HostCall::RazorSliceAtCursor {
                    clip_id,
                    transition_id,
                    seconds,
                });
            }
            SelectionOutcome::Applied { changes } => {
                for change in changes {
                    if change.added {
                        self.context.call(HostCall::AddSelection {
                            id: change.id,
                            kind: change.kind,
                            clear_others: change.clear_others,
                        });
                    } else {
                        self.context.call(HostCall::RemoveSelection {
                            id: change.id,
                            kind: change.kind,
                        });
                    }
                }
            }
        }
    }

    fn check_autogrow(&mut self) {
        if let Some(len) = self.project.required_duration() {
            if self.context.last_growth_request != Some(len) {
                self.context.call(HostCall::ResizeTimeline { seconds: len });
                self.context.last_growth_request = Some(len);
                // Optimistic: the host confirms through a diff, but the
                // canvas must grow now so the dragged clip stays visible.
                self.project.duration = len;
            }
        }
    }

    // ── Inbound host requests ────────────────────────────────────────────────

    fn process_request(&mut self, request: HostRequest) {
        match request {
            HostRequest::EnableQt => {
                self.context.host_attached = true;
                self.project = Project::default();
                self.project.normalize();
                self.context.kf_cache.clear();
                log::info!("[bridge] host attached, demo data cleared");
                self.context.call(HostCall::PageReady);
            }
            HostRequest::SetThumbAddress(url) => {
                self.context.thumb_server = Some(url);
            }
            HostRequest::SetThemeColors(json) => {
                self.context.theme.apply_host_colors(&json);
            }
            HostRequest::SetTrackLabel(fmt) => {
                self.context.track_label_format = fmt;
            }
            HostRequest::SetScale { scale, cursor_x } => {
                self.apply_set_scale(scale, cursor_x);
            }
            HostRequest::SetScroll(normalized) => {
                let n = to_finite(normalized, 0.0).clamp(0.0, 1.0);
                self.context.pending_scroll = Some(ScrollRequest::Normalized(n));
            }
            HostRequest::ScrollLeft(dpx) => {
                self.context.pending_scroll = Some(ScrollRequest::Delta(to_finite(dpx, 0.0)));
            }
            HostRequest::CenterOnTime(t) => {
                self.context.pending_scroll =
                    Some(ScrollRequest::CenterOn(to_finite(t, 0.0).max(0.0)));
            }
            HostRequest::CenterOnPlayhead => {
                self.context.pending_scroll =
                    Some(ScrollRequest::CenterOn(self.project.playhead_position));
            }
            HostRequest::MovePlayhead(t) => {
                self.project.move_playhead(t);
                if self.context.follow {
                    self.context.pending_scroll =
                        Some(ScrollRequest::CenterOn(self.project.playhead_position));
                }
            }
            HostRequest::MovePlayheadToFrame(frame) => {
                let t = frame_to_seconds(frame, self.project.fps);
                self.project.move_playhead(t);
            }
            HostRequest::PreviewFrame(t) => {
                let frame = frame_at(to_finite(t, 0.0).max(0.0), self.project.fps);
                self.context.call(HostCall::PlayheadMoved { frame });
            }
            HostRequest::PreviewClipFrame { id, seconds } => {
                self.preview_clip_frame(&id, seconds);
            }
            HostRequest::SetSnappingMode(b) => self.context.snapping = b,
            HostRequest::SetRazorMode(b) => self.context.razor = b,
            HostRequest::SetTimingMode(b) => self.context.timing = b,
            HostRequest::SetFollow(b) => self.context.follow = b,
            HostRequest::SetPropertyFilter(s) => self.context.property_filter = s,
            HostRequest::UpdateThumbnail(clip_id) => {
                self.context.thumbs.invalidate(&clip_id);
            }
            HostRequest::RedrawAllAudioData => {
                // Waveforms draw from ui.audio_data every frame; a version
                // bump forces the repaint after the host rewrote them.
                self.project.bump_version();
            }
            HostRequest::RenderCache(json) => {
                // Parse failures fall back to an empty overlay, never an
                // error surfaced to the host.
                let progress: Progress = serde_json::from_value(json).unwrap_or_default();
                self.project.progress = progress;
            }
            HostRequest::SelectAll => self.select_all(),
            HostRequest::ClearAllSelections => self.clear_all_selections(),
            HostRequest::StartManualMove { kind, ids } => {
                self.start_manual_move(kind, &ids);
            }
            HostRequest::MoveItem { x, y } => self.manual_move_step(x, y),
            HostRequest::UpdateRecentItemJson { kind: _, ids, transaction_id } => {
                self.finish_manual_move(&ids, transaction_id);
            }
            HostRequest::ApplyJsonDiff(actions) => {
                match apply_json_diff(&mut self.project, &actions) {
                    Ok(applied) => {
                        log::debug!("[diff] applied {applied} action(s)");
                        self.context.kf_cache.clear();
                    }
                    Err(e) => {
                        log::warn!("[diff] rejected diff: {e}");
                        self.context
                            .call(HostCall::QtLog { level: "warn".into(), msg: e.to_string() });
                    }
                }
            }
            HostRequest::LoadJson(value) => match load_project(value) {
                Ok(project) => {
                    self.project = project;
                    self.context.kf_cache.clear();
                    self.context.interaction.clear();
                    self.context.last_growth_request = None;
                    log::info!(
                        "[bridge] project loaded: {} clips, {} transitions, {} layers",
                        self.project.clips.len(),
                        self.project.transitions.len(),
                        self.project.layers.len()
                    );
                }
                Err(e) => {
                    log::warn!("[bridge] loadJson rejected: {e}");
                    self.context
                        .call(HostCall::QtLog { level: "error".into(), msg: e.to_string() });
                }
            },
            HostRequest::RefreshTimeline => {
                self.context.kf_cache.clear();
                self.project.bump_version();
            }
            HostRequest::SetTheme(css) => {
                self.context.theme.custom_css = Some(css);
            }
            HostRequest::SetDragging(b) => self.context.dragging_override = b,
        }
    }

    /// Zoom while pinning the time under the cursor (or the playhead when
    /// it is visible, or the left edge — see `rescaled_scroll`). The pin is
    /// what keeps repeated same-value calls from drifting the scroll
    /// position.
    fn apply_set_scale(&mut self, scale: f64, cursor_x: f64) {
        let scale = to_finite(scale, self.project.scale);
        if scale <= 0.0 {
            log::debug!("[view] setScale ignored non-positive scale {scale}");
            return;
        }
        let old_pps = self.project.pixels_per_second();
        self.project.scale = scale;
        self.project.bump_version();
        let new_scroll = rescaled_scroll(
            old_pps,
            self.project.pixels_per_second(),
            self.context.scroll_x as f64,
            self.context.viewport_width as f64,
            cursor_x,
            self.project.playhead_position,
        );
        self.context.pending_scroll = Some(ScrollRequest::Pixels(new_scroll));
    }

    fn preview_clip_frame(&mut self, clip_id: &str, seconds: f64) {
        if self.project.clip(clip_id).is_none() {
            log::debug!("[preview] unknown clip id {clip_id}, ignoring");
            return;
        }
        // Round to the frame grid first so every time within half a frame
        // previews the same frame — no inter-frame cuts.
        let snapped = snap_to_fps_grid(to_finite(seconds, 0.0).max(0.0), self.project.fps);
        let frame = frame_at(snapped, self.project.fps);
        self.context.call(HostCall::PreviewClipFrame { clip_id: clip_id.to_string(), frame });
    }

    fn select_all(&mut self) {
        for clip in &mut self.project.clips {
            if !clip.selected {
                clip.selected = true;
                self.context.bridge.call(HostCall::AddSelection {
                    id: clip.id.clone(),
                    kind: ItemKind::Clip,
                    clear_others: false,
                });
            }
        }
        for tr in &mut self.project.transitions {
            if !tr.selected {
                tr.selected = true;
                self.context.bridge.call(HostCall::AddSelection {
                    id: tr.id.clone(),
                    kind: ItemKind::Transition,
                    clear_others: false,
                });
            }
        }
        self.project.bump_version();
    }

    fn clear_all_selections(&mut self) {
        let flags = SelectFlags::default();
        for kind in [ItemKind::Clip, ItemKind::Effect] {
            let outcome = select_item(
                &mut self.project,
                &SelectInput {
                    id: "",
                    kind,
                    clear_selections: true,
                    modifiers: Default::default(),
                    force_ripple: false,
                },
                &flags,
            );
            self.apply_selection_outcome(outcome);
        }
        self.project.last_selected = None;
    }

    // ── External (host-driven) drags ─────────────────────────────────────────

    fn start_manual_move(&mut self, kind: ItemKind, ids: &[String]) {
        self.clear_all_selections();
        let items: Vec<(String, ItemKind)> =
            ids.iter().map(|id| (id.clone(), kind)).collect();
        for (id, kind) in &items {
            let outcome = select_item(
                &mut self.project,
                &SelectInput {
                    id,
                    kind: *kind,
                    clear_selections: false,
                    modifiers: cutline_core::selection::Modifiers {
                        ctrl: true,
                        shift: false,
                        alt: false,
                    },
                    force_ripple: false,
                },
                &SelectFlags::default(),
            );
            self.apply_selection_outcome(outcome);
        }
        let Some(bbox) = BoundingBox::from_items(&self.project, &items) else {
            log::debug!("[move] startManualMove matched no items");
            return;
        };
        self.manual_origin = None;
        self.context.interaction.gesture = Some(Gesture::Move(MoveGesture {
            bbox,
            origin: egui::Pos2::ZERO,
            transaction: cutline_bridge::transaction_id(),
            refused: false,
            last_dx: 0.0,
            last_dy: 0.0,
        }));
    }

    fn manual_move_step(&mut self, x: f64, y: f64) {
        let (ox, oy) = *self.manual_origin.get_or_insert((x, y));
        let snapping = self.context.snapping;
        let mut moves: Option<Vec<ItemPlacement>> = None;
        let mut snap_px = None;
        if let Some(Gesture::Move(g)) = &mut self.context.interaction.gesture {
            let outcome = g.bbox.propose_move(
                &self.project,
                x - ox,
                y - oy,
                SnapOptions {
                    enabled: snapping,
                    threshold_px: SNAP_THRESHOLD_PX,
                    include_keyframes: true,
                },
            );
            if let MoveOutcome::Moved { dx, dy, snap } = outcome {
                g.refused = false;
                g.last_dx = dx;
                g.last_dy = dy;
                moves = Some(g.bbox.live_placements(&self.project, dx, dy));
                snap_px = snap.map(|s| s.target_px as f32);
            } else {
                g.refused = true;
            }
        }
        if let Some(moves) = moves {
            self.place_items_live(moves);
        }
        match snap_px {
            Some(px) => self.context.interaction.show_snapline(px),
            None => self.context.interaction.hide_snapline(),
        }
    }

    fn finish_manual_move(&mut self, ids: &[String], transaction: String) {
        self.manual_origin = None;
        if let Some(Gesture::Move(g)) = self.context.interaction.gesture.take() {
            let placements = if g.refused {
                g.bbox.live_placements(&self.project, 0.0, 0.0)
            } else {
                g.bbox.placements(&self.project, g.last_dx, g.last_dy)
            };
            let commit = !g.refused;
            self.context.interaction.clear();
            if commit {
                self.commit_move(placements, transaction);
            } else {
                self.place_items_live(placements);
            }
        } else if !ids.is_empty() {
            // No live gesture — the host finalised ids directly; emit their
            // current state under the given transaction.
            for id in ids {
                if self.project.clip(id).is_some() {
                    self.emit_clip_update(id, Some(transaction.clone()));
                } else if self.project.transition(id).is_some() {
                    self.emit_transition_update(id, Some(transaction.clone()));
                }
            }
        }
    }

    // ── Shared command bodies ────────────────────────────────────────────────

    fn place_items_live(&mut self, moves: Vec<ItemPlacement>) {
        for m in moves {
            match m.kind {
                ItemKind::Clip => {
                    if let Some(clip) = self.project.clip_mut(&m.id) {
                        clip.position = m.position;
                        clip.layer = m.layer;
                    }
                }
                ItemKind::Transition => {
                    if let Some(tr) = self.project.transition_mut(&m.id) {
                        tr.position = m.position;
                        tr.layer = m.layer;
                    }
                }
                ItemKind::Effect => {}
            }
        }
        self.project.bump_version();
    }

    fn commit_move(&mut self, placements: Vec<ItemPlacement>, transaction: String) {
        let single_clip = match placements.as_slice() {
            [one] if one.kind == ItemKind::Clip => Some(one.id.clone()),
            _ => None,
        };
        self.place_items_live(placements.clone());
        self.project.sort_entities();
        for p in &placements {
            match p.kind {
                ItemKind::Clip => self.emit_clip_update(&p.id, Some(transaction.clone())),
                ItemKind::Transition => {
                    self.emit_transition_update(&p.id, Some(transaction.clone()))
                }
                ItemKind::Effect => {}
            }
        }
        // Proposals only make sense for the one clip the user just placed;
        // group moves have no single anchor edge.
        if let Some(clip_id) = single_clip {
            self.report_missing_transition(&clip_id);
        }
    }

    // ── Commands ─────────────────────────────────────────────────────────────

    fn process_command(&mut self, cmd: EngineCommand) {
        match cmd {
            // ── Selection ────────────────────────────────────────────────
            EngineCommand::SelectItem { id, kind, clear_selections, modifiers, force_ripple } => {
                let flags = SelectFlags {
                    dragging: self.context.dragging(),
                    razor_mode: self.context.razor,
                    cursor_seconds: self.context.cursor_seconds,
                };
                let outcome = select_item(
                    &mut self.project,
                    &SelectInput {
                        id: &id,
                        kind,
                        clear_selections,
                        modifiers,
                        force_ripple,
                    },
                    &flags,
                );
                self.apply_selection_outcome(outcome);
            }
            EngineCommand::SelectAll => self.select_all(),
            EngineCommand::ClearAllSelections => self.clear_all_selections(),

            // ── Playhead / preview ───────────────────────────────────────
            EngineCommand::SetPlayhead(t) => {
                self.project.move_playhead(t);
            }
            EngineCommand::ScrubPreview(t) => {
                self.project.move_playhead(t);
                let frame = frame_at(self.project.playhead_position, self.project.fps);
                self.context.call(HostCall::PlayheadMoved { frame });
                if self.context.follow {
                    self.context.pending_scroll =
                        Some(ScrollRequest::CenterOn(self.project.playhead_position));
                }
            }
            EngineCommand::SeekToKeyframe(frame) => {
                self.context.call(HostCall::SeekToKeyframe { frame });
            }

            // ── Live gesture updates ─────────────────────────────────────
            EngineCommand::PlaceItemsLive { moves } => self.place_items_live(moves),
            EngineCommand::ResizeClipLive { id, position, start, end, preview } => {
                if let Some(clip) = self.project.clip_mut(&id) {
                    clip.position = position;
                    clip.start = start;
                    clip.end = end;
                    clip.ui.keyframe_preview = preview;
                    self.project.bump_version();
                }
            }
            EngineCommand::ResizeTransitionLive { id, position, end, preview } => {
                if let Some(tr) = self.project.transition_mut(&id) {
                    tr.position = position;
                    tr.end = end;
                    tr.ui.keyframe_preview = preview;
                    self.project.bump_version();
                }
            }

            // ── Gesture commits ──────────────────────────────────────────
            EngineCommand::MoveItems { placements, transaction } => {
                self.commit_move(placements, transaction);
            }
            EngineCommand::TrimClip { id, position, start, end, transaction } => {
                if let Some(clip) = self.project.clip_mut(&id) {
                    clip.position = position.max(0.0);
                    clip.start = start.max(0.0);
                    clip.end = end.max(clip.start);
                    clip.ui.keyframe_preview = None;
                    self.project.sort_entities();
                    self.project.bump_version();
                    self.context.kf_cache.invalidate(&id);
                    self.emit_clip_update(&id, Some(transaction));
                    self.report_missing_transition(&id);
                } else {
                    log::debug!("[trim] unknown clip id {id}");
                }
            }
            EngineCommand::RetimeClip { id, position, end, transaction: _ } => {
                if let Some(clip) = self.project.clip_mut(&id) {
                    // The live preview still holds the pre-gesture window;
                    // that is the resampling source of truth.
                    let old_duration = clip
                        .ui
                        .keyframe_preview
                        .as_ref()
                        .map(|p| p.original_end - p.original_start)
                        .unwrap_or_else(|| clip.duration());
                    clip.position = position.max(0.0);
                    clip.end = end.max(clip.start);
                    let new_duration = clip.duration();
                    if !clip.ui.audio_data.is_empty() {
                        clip.ui.audio_data =
                            resample_waveform(&clip.ui.audio_data, old_duration, new_duration);
                    }
                    clip.ui.keyframe_preview = None;
                    let end = clip.end;
                    let position = clip.position;
                    self.project.sort_entities();
                    self.project.bump_version();
                    self.context.kf_cache.invalidate(&id);
                    // The host rewrites the time curve; we never touch the
                    // Points ourselves.
                    self.context.call(HostCall::RetimeClip { id, end, position });
                } else {
                    log::debug!("[retime] unknown clip id {id}");
                }
            }
            EngineCommand::ResizeTransition { id, position, end, transaction } => {
                let fps = self.project.fps;
                if let Some(tr) = self.project.transition_mut(&id) {
                    tr.position = snap_to_fps_grid(position, fps).max(0.0);
                    tr.end = snap_to_fps_grid(end, fps).max(1.0 / fps.value());
                    tr.ui.keyframe_preview = None;
                    self.project.sort_entities();
                    self.project.bump_version();
                    self.context.kf_cache.invalidate(&id);
                    self.emit_transition_update(&id, Some(transaction));
                }
            }
            EngineCommand::StartKeyframeDrag { id, kind, transaction } => {
                self.context.call(HostCall::StartKeyframeDrag {
                    kind,
                    id,
                    transaction_id: transaction,
                });
            }
            EngineCommand::RemapKeyframe { id, kind, old_frame, new_frame, transaction } => {
                self.remap_keyframe(&id, kind, old_frame, new_frame, transaction);
            }

            // ── Context menus ────────────────────────────────────────────
            EngineCommand::ShowClipMenu(id) => self.context.call(HostCall::ShowClipMenu { id }),
            EngineCommand::ShowEffectMenu(id) => {
                self.context.call(HostCall::ShowEffectMenu { id })
            }
            EngineCommand::ShowTransitionMenu(id) => {
                self.context.call(HostCall::ShowTransitionMenu { id })
            }
            EngineCommand::ShowTrackMenu(layer) => {
                self.context.call(HostCall::ShowTrackMenu { layer })
            }
            EngineCommand::ShowMarkerMenu(id) => {
                self.context.call(HostCall::ShowMarkerMenu { id })
            }
            EngineCommand::ShowPlayheadMenu => self.context.call(HostCall::ShowPlayheadMenu),
            EngineCommand::ShowTimelineMenu { seconds, layer } => {
                self.context.call(HostCall::ShowTimelineMenu { seconds, layer })
            }
        }
    }

    fn remap_keyframe(
        &mut self,
        id: &str,
        kind: ItemKind,
        old_frame: i64,
        new_frame: i64,
        transaction: String,
    ) {
        if old_frame != new_frame {
            let moved = match kind {
                ItemKind::Clip => match self.project.clip_mut(id) {
                    Some(clip) => remap_clip_frames(clip, old_frame, new_frame),
                    None => 0,
                },
                ItemKind::Transition | ItemKind::Effect => {
                    match self.project.transition_mut(id) {
                        Some(tr) => cutline_core::keyframes::remap_frames(
                            &mut tr.properties,
                            old_frame,
                            new_frame,
                        ),
                        None => 0,
                    }
                }
            };
            if moved > 0 {
                self.project.bump_version();
                self.context.kf_cache.invalidate(id);
                match kind {
                    ItemKind::Clip => {
                        if let Some(clip) = self.project.clip(id) {
                            self.context.call(HostCall::UpdateClipData {
                                json: Self::entity_json(clip),
                                allow_keyframes: false,
                                force_json_diff: true,
                                ignore_refresh: false,
                                transaction_id: Some(transaction),
                            });
                        }
                    }
                    ItemKind::Transition | ItemKind::Effect => {
                        if let Some(tr) = self.project.transition(id) {
                            self.context.call(HostCall::UpdateTransitionData {
                                json: Self::entity_json(tr),
                                force_json_diff: true,
                                ignore_refresh: false,
                                transaction_id: Some(transaction),
                            });
                        }
                    }
                }
            } else {
                log::debug!("[keyframe] remap matched nothing on {id} ({old_frame}→{new_frame})");
            }
        }
        self.context.call(HostCall::FinalizeKeyframeDrag { kind, id: id.to_string() });
    }

    // ── Scroll plumbing ──────────────────────────────────────────────────────

    fn resolve_scroll(&mut self) -> Option<f32> {
        let request = self.context.pending_scroll.take()?;
        let canvas = canvas_width(&self.project) as f64;
        let viewport = self.context.viewport_width as f64;
        let max_scroll = (canvas - viewport).max(0.0);
        let x = match request {
            ScrollRequest::Normalized(n) => n * max_scroll,
            ScrollRequest::Delta(d) => self.context.scroll_x as f64 + d,
            ScrollRequest::Pixels(px) => px,
            ScrollRequest::CenterOn(t) => {
                time_to_pixel(t, self.project.pixels_per_second()) - viewport / 2.0
            }
        };
        Some(x.clamp(0.0, max_scroll) as f32)
    }
}

impl eframe::App for CutlineApp {
    fn update(&mut self, egui_ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 1. Host requests, in arrival order, before any input handling.
        for request in self.context.bridge.drain_requests() {
            self.process_request(request);
        }
        // 2. Finished thumbnail fetches.
        self.context.thumbs.ingest(egui_ctx);

        // 3. View pass.
        let scroll_override = self.resolve_scroll();
        egui::CentralPanel::default()
            .frame(egui::Frame::new().fill(crate::theme::BG_CANVAS))
            .show(egui_ctx, |ui| {
                self.context.viewport_width = ui.available_width();
                let mut area = egui::ScrollArea::both().id_salt("timeline-canvas");
                if let Some(x) = scroll_override {
                    area = area.scroll_offset(egui::Vec2::new(x, 0.0));
                }
                let output = area.show(ui, |ui| {
                    ui.spacing_mut().item_spacing.y = 0.0;
                    let CutlineApp { project, context, modules, pending_cmds, .. } = self;
                    for module in modules.iter_mut() {
                        module.ui(ui, project, context, pending_cmds);
                    }
                });
                self.context.scroll_x = output.state.offset.x;

                if !self.context.host_attached {
                    ui.painter().text(
                        ui.max_rect().right_top() + egui::vec2(-8.0, 6.0),
                        egui::Align2::RIGHT_TOP,
                        "demo project — no host attached",
                        egui::FontId::proportional(10.0),
                        crate::theme::TEXT_DIM,
                    );
                }
            });

        // 4. Commands emitted by the modules.
        let commands = std::mem::take(&mut self.pending_cmds);
        for command in commands {
            self.process_command(command);
        }

        // 5. Autogrow after any edit.
        self.check_autogrow();
    }
}

// ── Demo project ──────────────────────────────────────────────────────────────

fn demo_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Synthetic waveform peaks, deterministic so the demo looks the same on
/// every launch.
fn demo_peaks(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| {
            let t = i as f32 / n as f32;
            ((t * 37.0).sin() * 0.5 + (t * 9.0).sin() * 0.35).abs().min(1.0)
        })
        .collect()
}

/// Seeded until `enableQt` arrives, so every public method is exercisable
/// without a host.
fn demo_project() -> Project {
    use cutline_core::keyframes::{Coord, Interpolation, Point, Property, Track};

    let track = |frames: &[(i64, f64)]| -> Property {
        Property::Scalar(Track {
            points: frames
                .iter()
                .map(|&(x, y)| Point {
                    co: Coord { x: x as f64, y },
                    interpolation: Interpolation::Bezier,
                })
                .collect(),
        })
    };

    let mut project = Project {
        fps: Fps { num: 30, den: 1 },
        duration: 300.0,
        scale: 2.0,
        tick_pixels: 100.0,
        playhead_position: 4.0,
        layers: (1..=5).map(Layer::new).collect(),
        ..Project::default()
    };

    let mut a = Clip {
        id: demo_id(),
        file_id: "sunrise.mp4".into(),
        layer: 4,
        position: 0.5,
        start: 0.0,
        end: 8.0,
        selected: false,
        reader: cutline_core::project::Reader {
            has_video: true,
            has_audio: true,
            fps: Fps { num: 30, den: 1 },
            duration: 20.0,
            video_length: 600,
            media_type: "video".into(),
            has_single_image: false,
        },
        effects: Vec::new(),
        ui: Default::default(),
        properties: Default::default(),
    };
    a.properties.insert("alpha".into(), track(&[(1, 0.0), (61, 1.0), (241, 1.0)]));
    a.ui.audio_data = demo_peaks(400);
    let mut blur = cutline_core::Effect::new(&demo_id(), "blur");
    blur.properties.insert("sigma".into(), track(&[(1, 3.0), (121, 0.0)]));
    a.effects.push(blur);

    let mut b = a.clone();
    b.id = demo_id();
    b.file_id = "interview.mp4".into();
    b.position = 9.5;
    b.start = 2.0;
    b.end = 14.0;
    b.effects.clear();
    b.properties = Default::default();
    b.properties.insert("volume".into(), track(&[(1, 1.0), (181, 0.4)]));

    let mut music = Clip {
        id: demo_id(),
        file_id: "score.wav".into(),
        layer: 1,
        position: 0.0,
        start: 0.0,
        end: 16.0,
        selected: false,
        reader: cutline_core::project::Reader {
            has_video: false,
            has_audio: true,
            fps: Fps { num: 30, den: 1 },
            duration: 120.0,
            video_length: 0,
            media_type: "audio".into(),
            has_single_image: false,
        },
        effects: Vec::new(),
        ui: Default::default(),
        properties: Default::default(),
    };
    music.ui.audio_data = demo_peaks(800);

    let mut fade = Transition {
        id: demo_id(),
        layer: 4,
        position: 8.0,
        start: 0.0,
        end: 2.5,
        selected: false,
        ui: Default::default(),
        properties: Default::default(),
    };
    fade.properties.insert("brightness".into(), track(&[(1, 1.0), (75, 0.0)]));

    project.clips.extend([a, b, music]);
    project.transitions.push(fade);
    project.markers.push(Marker {
        id: demo_id(),
        position: 5.0,
        icon: "blue".into(),
        vector: "blue.svg".into(),
    });
    project.markers.push(Marker {
        id: demo_id(),
        position: 12.0,
        icon: "green".into(),
        vector: "green.svg".into(),
    });
    project.progress.ranges.push(CacheRange { start_frame: 1, end_frame: 150 });
    project.normalize();
    project
}
