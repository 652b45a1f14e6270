// crates/cutline-core/src/selection.rs
//
// Selection state machine.
//
// One entry point, `select_item`, interprets a modifier-augmented click on
// a clip, transition, or effect and rewrites the `selected` flags on the
// replica. It returns the list of selection transitions so the caller can
// mirror every one to the host (`AddSelection` / `RemoveSelection`) before
// the handler returns — the host must never drift from the replica.
//
// Dispatch order matters and is fixed: empty-id clear → dragging guard →
// razor redirect → ripple (alt / forced) → shift range → plain/ctrl.

use crate::project::{ItemKind, Project, TimelineItem};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

/// The click being interpreted.
#[derive(Clone, Debug)]
pub struct SelectInput<'a> {
    pub id: &'a str,
    pub kind: ItemKind,
    pub clear_selections: bool,
    pub modifiers: Modifiers,
    pub force_ripple: bool,
}

/// Engine state the machine consults but does not own.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelectFlags {
    pub dragging: bool,
    pub razor_mode: bool,
    /// Timeline seconds under the pointer, for razor slices.
    pub cursor_seconds: f64,
}

/// One selection transition to mirror to the host.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionChange {
    pub id: String,
    pub kind: ItemKind,
    pub added: bool,
    /// True on the add that starts a fresh selection, so the host can drop
    /// its own stale set in one call.
    pub clear_others: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SelectionOutcome {
    /// Selection must not race an active drag.
    Skipped,
    /// Razor mode eats the click: tell the host where to slice instead.
    Razor { clip_id: String, transition_id: String, seconds: f64 },
    Applied { changes: Vec<SelectionChange> },
}

fn push_change(changes: &mut Vec<SelectionChange>, id: &str, kind: ItemKind, added: bool) {
    changes.push(SelectionChange { id: id.into(), kind, added, clear_others: false });
}

fn clear_clips(project: &mut Project, changes: &mut Vec<SelectionChange>) {
    for clip in &mut project.clips {
        if clip.selected {
            clip.selected = false;
            push_change(changes, &clip.id.clone(), ItemKind::Clip, false);
        }
    }
}

fn clear_transitions(project: &mut Project, changes: &mut Vec<SelectionChange>) {
    for tr in &mut project.transitions {
        if tr.selected {
            tr.selected = false;
            push_change(changes, &tr.id.clone(), ItemKind::Transition, false);
        }
    }
}

fn clear_effects(project: &mut Project, changes: &mut Vec<SelectionChange>) {
    for clip in &mut project.clips {
        for effect in &mut clip.effects {
            if effect.selected {
                effect.selected = false;
                push_change(changes, &effect.id.clone(), ItemKind::Effect, false);
            }
        }
    }
}

fn clear_kind(project: &mut Project, kind: ItemKind, changes: &mut Vec<SelectionChange>) {
    match kind {
        ItemKind::Clip => clear_clips(project, changes),
        ItemKind::Transition => clear_transitions(project, changes),
        // The "effect" type covers both the global transition-level list
        // and every per-clip effect.
        ItemKind::Effect => {
            clear_transitions(project, changes);
            clear_effects(project, changes);
        }
    }
}

/// `(left, right, layer)` of a clip or transition, if the id resolves.
fn item_extent(project: &Project, id: &str, kind: ItemKind) -> Option<(f64, f64, i32)> {
    match kind {
        ItemKind::Clip => project.clip(id).map(|c| {
            let (l, r) = c.time_extent();
            (l, r, c.layer)
        }),
        ItemKind::Transition => project.transition(id).map(|t| {
            let (l, r) = t.time_extent();
            (l, r, t.layer)
        }),
        ItemKind::Effect => None,
    }
}

fn ripple_select(
    project: &mut Project,
    anchor_position: f64,
    anchor_layer: i32,
    keep_existing: bool,
    changes: &mut Vec<SelectionChange>,
) {
    if !keep_existing {
        clear_clips(project, changes);
        clear_transitions(project, changes);
    }
    for clip in &mut project.clips {
        if clip.layer == anchor_layer && clip.position >= anchor_position && !clip.selected {
            clip.selected = true;
            push_change(changes, &clip.id.clone(), ItemKind::Clip, true);
        }
    }
    for tr in &mut project.transitions {
        if tr.layer == anchor_layer && tr.position >= anchor_position && !tr.selected {
            tr.selected = true;
            push_change(changes, &tr.id.clone(), ItemKind::Transition, true);
        }
    }
}

fn range_select(
    project: &mut Project,
    a: (f64, f64, i32),
    b: (f64, f64, i32),
    keep_existing: bool,
    changes: &mut Vec<SelectionChange>,
) {
    if !keep_existing {
        clear_clips(project, changes);
        clear_transitions(project, changes);
    }
    let (t0, t1) = (a.0.min(b.0), a.1.max(b.1));
    let (l0, l1) = (a.2.min(b.2), a.2.max(b.2));
    for clip in &mut project.clips {
        let (cl, cr) = (clip.left(), clip.right());
        if cl >= t0 && cr <= t1 && clip.layer >= l0 && clip.layer <= l1 && !clip.selected {
            clip.selected = true;
            push_change(changes, &clip.id.clone(), ItemKind::Clip, true);
        }
    }
    for tr in &mut project.transitions {
        let (tl, trr) = (tr.left(), tr.right());
        if tl >= t0 && trr <= t1 && tr.layer >= l0 && tr.layer <= l1 && !tr.selected {
            tr.selected = true;
            push_change(changes, &tr.id.clone(), ItemKind::Transition, true);
        }
    }
}

/// Set one entity's flag, resolving effects global-list-first, and record
/// the transition. Returns false for unknown ids (logged no-op).
fn set_selected(
    project: &mut Project,
    id: &str,
    kind: ItemKind,
    selected: bool,
    changes: &mut Vec<SelectionChange>,
) -> bool {
    let done = match kind {
        ItemKind::Clip => {
            if let Some(c) = project.clip_mut(id) {
                c.selected = selected;
                true
            } else {
                false
            }
        }
        ItemKind::Transition => {
            if let Some(t) = project.transition_mut(id) {
                t.selected = selected;
                true
            } else {
                false
            }
        }
        ItemKind::Effect => {
            // Global transition-level effect first, then nested effects.
            if let Some(t) = project.transition_mut(id) {
                t.selected = selected;
                true
            } else {
                let mut hit = false;
                for clip in &mut project.clips {
                    if let Some(e) = clip.effects.iter_mut().find(|e| e.id == id) {
                        e.selected = selected;
                        hit = true;
                        break;
                    }
                }
                hit
            }
        }
    };
    if done {
        push_change(changes, id, kind, selected);
    } else {
        log::debug!("[selection] unknown {} id {id}, ignoring", kind.as_str());
    }
    done
}

fn is_selected(project: &Project, id: &str, kind: ItemKind) -> bool {
    match kind {
        ItemKind::Clip => project.clip(id).map(|c| c.selected).unwrap_or(false),
        ItemKind::Transition => project.transition(id).map(|t| t.selected).unwrap_or(false),
        ItemKind::Effect => project
            .transition(id)
            .map(|t| t.selected)
            .or_else(|| project.find_effect(id).map(|(_, e)| e.selected))
            .unwrap_or(false),
    }
}

/// Interpret one click. See the module header for the dispatch order.
pub fn select_item(
    project: &mut Project,
    input: &SelectInput,
    flags: &SelectFlags,
) -> SelectionOutcome {
    let mut changes = Vec::new();

    // Empty id + clear: bulk deselect of the given type. Does not touch
    // `last_selected` so a later shift-click still has its anchor.
    if input.id.is_empty() {
        if input.clear_selections {
            clear_kind(project, input.kind, &mut changes);
            project.bump_version();
        }
        return SelectionOutcome::Applied { changes };
    }

    if flags.dragging {
        return SelectionOutcome::Skipped;
    }

    if flags.razor_mode {
        let (clip_id, transition_id) = match input.kind {
            ItemKind::Clip => (input.id.to_string(), String::new()),
            ItemKind::Transition => (String::new(), input.id.to_string()),
            ItemKind::Effect => (String::new(), String::new()),
        };
        return SelectionOutcome::Razor {
            clip_id,
            transition_id,
            seconds: flags.cursor_seconds,
        };
    }

    let mods = input.modifiers;
    let rippling = (mods.alt || input.force_ripple) && input.kind != ItemKind::Effect;
    if rippling {
        if let Some((left, _, layer)) = item_extent(project, input.id, input.kind) {
            let keep = mods.ctrl || !input.clear_selections;
            ripple_select(project, left, layer, keep, &mut changes);
            project.bump_version();
        }
        // Ripple never becomes the shift anchor.
        return SelectionOutcome::Applied { changes };
    }

    if mods.shift && input.kind != ItemKind::Effect {
        if let Some((last_id, last_kind)) = project.last_selected.clone() {
            let anchor = item_extent(project, &last_id, last_kind);
            let target = item_extent(project, input.id, input.kind);
            if let (Some(a), Some(b)) = (anchor, target) {
                let keep = mods.ctrl || !input.clear_selections;
                range_select(project, a, b, keep, &mut changes);
                project.bump_version();
                return SelectionOutcome::Applied { changes };
            }
        }
    }

    // Plain / ctrl path.
    let fresh = input.clear_selections && !mods.ctrl;
    if fresh {
        clear_kind(project, input.kind, &mut changes);
        clear_effects(project, &mut changes);
    }
    let toggle_off = mods.ctrl && is_selected(project, input.id, input.kind);
    if set_selected(project, input.id, input.kind, !toggle_off, &mut changes) {
        if !toggle_off {
            if fresh {
                if let Some(last) = changes.last_mut() {
                    last.clear_others = true;
                }
            }
            project.last_selected = Some((input.id.to_string(), input.kind));
        }
        project.bump_version();
    }
    SelectionOutcome::Applied { changes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::test_fixtures::*;
    use crate::project::Effect;

    fn plain(id: &str, kind: ItemKind) -> SelectInput<'_> {
        SelectInput {
            id,
            kind,
            clear_selections: true,
            modifiers: Modifiers::default(),
            force_ripple: false,
        }
    }

    fn with_mods(id: &str, kind: ItemKind, mods: Modifiers) -> SelectInput<'_> {
        SelectInput { id, kind, clear_selections: true, modifiers: mods, force_ripple: false }
    }

    fn project_with_row() -> Project {
        let mut p = base_project();
        p.clips.push(clip_at("c1", 1, 0.0, 0.0, 2.0));
        p.clips.push(clip_at("c2", 1, 3.0, 0.0, 2.0));
        p.clips.push(clip_at("c3", 1, 6.0, 0.0, 2.0));
        p.clips.push(clip_at("d1", 2, 3.0, 0.0, 2.0));
        p.transitions.push(transition_at("t1", 1, 4.5, 1.0));
        p
    }

    #[test]
    fn plain_click_clears_and_selects() {
        let mut p = project_with_row();
        p.clip_mut("c1").unwrap().selected = true;
        let out = select_item(&mut p, &plain("c2", ItemKind::Clip), &SelectFlags::default());
        assert!(!p.clip("c1").unwrap().selected);
        assert!(p.clip("c2").unwrap().selected);
        assert_eq!(p.last_selected, Some(("c2".into(), ItemKind::Clip)));
        match out {
            SelectionOutcome::Applied { changes } => {
                let add = changes.iter().find(|c| c.added).unwrap();
                assert_eq!(add.id, "c2");
                assert!(add.clear_others);
                assert!(changes.iter().any(|c| c.id == "c1" && !c.added));
            }
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[test]
    fn ctrl_click_toggles_without_clearing() {
        let mut p = project_with_row();
        p.clip_mut("c1").unwrap().selected = true;
        let ctrl = Modifiers { ctrl: true, ..Modifiers::default() };
        select_item(&mut p, &with_mods("c2", ItemKind::Clip, ctrl), &SelectFlags::default());
        assert!(p.clip("c1").unwrap().selected);
        assert!(p.clip("c2").unwrap().selected);

        // Second ctrl-click deselects, leaving the anchor alone.
        select_item(&mut p, &with_mods("c2", ItemKind::Clip, ctrl), &SelectFlags::default());
        assert!(!p.clip("c2").unwrap().selected);
        assert_eq!(p.last_selected, Some(("c2".into(), ItemKind::Clip)));
    }

    #[test]
    fn dragging_skips_selection() {
        let mut p = project_with_row();
        let flags = SelectFlags { dragging: true, ..SelectFlags::default() };
        assert_eq!(
            select_item(&mut p, &plain("c1", ItemKind::Clip), &flags),
            SelectionOutcome::Skipped
        );
        assert!(!p.clip("c1").unwrap().selected);
    }

    #[test]
    fn razor_mode_redirects_instead_of_selecting() {
        let mut p = project_with_row();
        let flags = SelectFlags { razor_mode: true, cursor_seconds: 1.25, ..SelectFlags::default() };
        let out = select_item(&mut p, &plain("c1", ItemKind::Clip), &flags);
        assert_eq!(
            out,
            SelectionOutcome::Razor {
                clip_id: "c1".into(),
                transition_id: String::new(),
                seconds: 1.25
            }
        );
        assert!(!p.clip("c1").unwrap().selected);
    }

    #[test]
    fn alt_ripples_downstream_on_the_same_layer() {
        let mut p = project_with_row();
        let alt = Modifiers { alt: true, ..Modifiers::default() };
        select_item(&mut p, &with_mods("c2", ItemKind::Clip, alt), &SelectFlags::default());
        assert!(!p.clip("c1").unwrap().selected);
        assert!(p.clip("c2").unwrap().selected);
        assert!(p.clip("c3").unwrap().selected);
        assert!(p.transition("t1").unwrap().selected, "downstream transition rides along");
        assert!(!p.clip("d1").unwrap().selected, "other layers are untouched");
        assert_eq!(p.last_selected, None, "ripple never becomes the shift anchor");
    }

    #[test]
    fn shift_selects_the_contained_rectangle() {
        let mut p = project_with_row();
        select_item(&mut p, &plain("c1", ItemKind::Clip), &SelectFlags::default());
        let shift = Modifiers { shift: true, ..Modifiers::default() };
        select_item(&mut p, &with_mods("c3", ItemKind::Clip, shift), &SelectFlags::default());
        // Rectangle is [0, 8] × layer 1: everything on layer 1, not d1.
        for id in ["c1", "c2", "c3"] {
            assert!(p.clip(id).unwrap().selected, "{id} inside range");
        }
        assert!(p.transition("t1").unwrap().selected);
        assert!(!p.clip("d1").unwrap().selected);
    }

    #[test]
    fn effect_id_resolves_global_list_first() {
        let mut p = project_with_row();
        let mut clip = clip_at("host", 3, 0.0, 0.0, 2.0);
        clip.effects.push(Effect::new("fx1", "blur"));
        p.clips.push(clip);

        select_item(&mut p, &plain("fx1", ItemKind::Effect), &SelectFlags::default());
        assert!(p.find_effect("fx1").unwrap().1.selected);

        // A transition id addressed as an effect hits the global list.
        select_item(&mut p, &plain("t1", ItemKind::Effect), &SelectFlags::default());
        assert!(p.transition("t1").unwrap().selected);
        assert!(!p.find_effect("fx1").unwrap().1.selected, "fresh effect click cleared fx1");
    }

    #[test]
    fn empty_id_clear_reports_every_removal() {
        let mut p = project_with_row();
        p.clip_mut("c1").unwrap().selected = true;
        p.clip_mut("c2").unwrap().selected = true;
        p.last_selected = Some(("c1".into(), ItemKind::Clip));
        let out = select_item(&mut p, &plain("", ItemKind::Clip), &SelectFlags::default());
        match out {
            SelectionOutcome::Applied { changes } => {
                assert_eq!(changes.len(), 2);
                assert!(changes.iter().all(|c| !c.added));
            }
            other => panic!("expected Applied, got {other:?}"),
        }
        assert_eq!(p.last_selected, Some(("c1".into(), ItemKind::Clip)), "anchor survives");
    }

    #[test]
    fn unknown_id_is_a_noop() {
        let mut p = project_with_row();
        let out = select_item(&mut p, &plain("ghost", ItemKind::Clip), &SelectFlags::default());
        match out {
            SelectionOutcome::Applied { changes } => {
                assert!(changes.iter().all(|c| !c.added));
            }
            other => panic!("expected Applied, got {other:?}"),
        }
        assert_eq!(p.last_selected, None);
    }
}
