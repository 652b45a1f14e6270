// crates/cutline-bridge/src/requests.rs
//
// Inbound host methods. The native host invokes the engine by method name
// with a positional JSON argument array; `HostRequest::parse` routes that
// into a typed request or a `DispatchError`. Unknown methods and bad
// argument shapes never panic — the host side logs the error and moves on.

use cutline_core::project::ItemKind;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown host method `{0}`")]
    UnknownMethod(String),
    #[error("bad arguments for `{method}`: {detail}")]
    BadArgs { method: String, detail: String },
}

#[derive(Clone, Debug, PartialEq)]
pub enum HostRequest {
    /// Bind to the native host: clear demo data, answer `PageReady`.
    EnableQt,
    SetThumbAddress(String),
    SetThemeColors(Value),
    SetTrackLabel(String),
    /// Change zoom while keeping the time under `cursor_x` fixed
    /// (fallbacks: visible playhead, then the left edge).
    SetScale { scale: f64, cursor_x: f64 },
    /// Absolute scroll as a fraction of total timeline width, in [0, 1].
    SetScroll(f64),
    ScrollLeft(f64),
    CenterOnTime(f64),
    CenterOnPlayhead,
    MovePlayhead(f64),
    MovePlayheadToFrame(i64),
    PreviewFrame(f64),
    PreviewClipFrame { id: String, seconds: f64 },
    SetSnappingMode(bool),
    SetRazorMode(bool),
    SetTimingMode(bool),
    SetFollow(bool),
    SetPropertyFilter(String),
    UpdateThumbnail(String),
    RedrawAllAudioData,
    RenderCache(Value),
    SelectAll,
    ClearAllSelections,
    /// Pre-build the bounding box for an externally driven drag.
    StartManualMove { kind: ItemKind, ids: Vec<String> },
    MoveItem { x: f64, y: f64 },
    /// Finalise an external drag: commit the moved ids under one
    /// transaction.
    UpdateRecentItemJson { kind: ItemKind, ids: Vec<String>, transaction_id: String },
    ApplyJsonDiff(Value),
    LoadJson(Value),
    RefreshTimeline,
    SetTheme(String),
    SetDragging(bool),
}

// ── Positional argument helpers ───────────────────────────────────────────────

fn bad(method: &str, detail: impl Into<String>) -> DispatchError {
    DispatchError::BadArgs { method: method.into(), detail: detail.into() }
}

fn arg<'a>(args: &'a [Value], i: usize, method: &str) -> Result<&'a Value, DispatchError> {
    args.get(i).ok_or_else(|| bad(method, format!("missing argument {i}")))
}

fn arg_f64(args: &[Value], i: usize, method: &str) -> Result<f64, DispatchError> {
    arg(args, i, method)?
        .as_f64()
        .ok_or_else(|| bad(method, format!("argument {i} is not a number")))
}

fn arg_i64(args: &[Value], i: usize, method: &str) -> Result<i64, DispatchError> {
    arg(args, i, method)?
        .as_i64()
        .ok_or_else(|| bad(method, format!("argument {i} is not an integer")))
}

fn arg_bool(args: &[Value], i: usize, method: &str) -> Result<bool, DispatchError> {
    arg(args, i, method)?
        .as_bool()
        .ok_or_else(|| bad(method, format!("argument {i} is not a bool")))
}

fn arg_str(args: &[Value], i: usize, method: &str) -> Result<String, DispatchError> {
    arg(args, i, method)?
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| bad(method, format!("argument {i} is not a string")))
}

fn arg_kind(args: &[Value], i: usize, method: &str) -> Result<ItemKind, DispatchError> {
    let s = arg_str(args, i, method)?;
    ItemKind::parse(&s).ok_or_else(|| bad(method, format!("unknown item kind `{s}`")))
}

fn arg_ids(args: &[Value], i: usize, method: &str) -> Result<Vec<String>, DispatchError> {
    let list = arg(args, i, method)?
        .as_array()
        .ok_or_else(|| bad(method, format!("argument {i} is not an id array")))?;
    list.iter()
        .map(|v| {
            v.as_str()
                .map(str::to_owned)
                .ok_or_else(|| bad(method, "id array holds a non-string"))
        })
        .collect()
}

impl HostRequest {
    /// Route a named invocation into a typed request.
    pub fn parse(method: &str, args: Value) -> Result<HostRequest, DispatchError> {
        let args = match args {
            Value::Array(a) => a,
            Value::Null => Vec::new(),
            // A single bare argument is accepted for host convenience.
            other => vec![other],
        };
        let a = args.as_slice();

        Ok(match method {
            "enableQt" => HostRequest::EnableQt,
            "setThumbAddress" => HostRequest::SetThumbAddress(arg_str(a, 0, method)?),
            "setThemeColors" => HostRequest::SetThemeColors(arg(a, 0, method)?.clone()),
            "setTrackLabel" => HostRequest::SetTrackLabel(arg_str(a, 0, method)?),
            "setScale" => HostRequest::SetScale {
                scale: arg_f64(a, 0, method)?,
                // cursor_x is optional; ≤ 0 means "no cursor anchor".
                cursor_x: a.get(1).and_then(Value::as_f64).unwrap_or(-1.0),
            },
            "setScroll" => HostRequest::SetScroll(arg_f64(a, 0, method)?),
            "scrollLeft" => HostRequest::ScrollLeft(arg_f64(a, 0, method)?),
            "centerOnTime" => HostRequest::CenterOnTime(arg_f64(a, 0, method)?),
            "centerOnPlayhead" => HostRequest::CenterOnPlayhead,
            "movePlayhead" => HostRequest::MovePlayhead(arg_f64(a, 0, method)?),
            "movePlayheadToFrame" => HostRequest::MovePlayheadToFrame(arg_i64(a, 0, method)?),
            "previewFrame" => HostRequest::PreviewFrame(arg_f64(a, 0, method)?),
            "previewClipFrame" => HostRequest::PreviewClipFrame {
                id: arg_str(a, 0, method)?,
                seconds: arg_f64(a, 1, method)?,
            },
            "setSnappingMode" => HostRequest::SetSnappingMode(arg_bool(a, 0, method)?),
            "setRazorMode" => HostRequest::SetRazorMode(arg_bool(a, 0, method)?),
            "setTimingMode" => HostRequest::SetTimingMode(arg_bool(a, 0, method)?),
            "setFollow" => HostRequest::SetFollow(arg_bool(a, 0, method)?),
            "setPropertyFilter" => HostRequest::SetPropertyFilter(arg_str(a, 0, method)?),
            "updateThumbnail" => HostRequest::UpdateThumbnail(arg_str(a, 0, method)?),
            "reDrawAllAudioData" => HostRequest::RedrawAllAudioData,
            "renderCache" => HostRequest::RenderCache(arg(a, 0, method)?.clone()),
            "selectAll" => HostRequest::SelectAll,
            "clearAllSelections" => HostRequest::ClearAllSelections,
            "startManualMove" => HostRequest::StartManualMove {
                kind: arg_kind(a, 0, method)?,
                ids: arg_ids(a, 1, method)?,
            },
            "moveItem" => HostRequest::MoveItem {
                x: arg_f64(a, 0, method)?,
                y: arg_f64(a, 1, method)?,
            },
            "updateRecentItemJSON" => HostRequest::UpdateRecentItemJson {
                kind: arg_kind(a, 0, method)?,
                ids: arg_ids(a, 1, method)?,
                transaction_id: arg_str(a, 2, method)?,
            },
            "applyJsonDiff" => HostRequest::ApplyJsonDiff(arg(a, 0, method)?.clone()),
            "loadJson" => {
                let value = arg(a, 0, method)?;
                // The host wraps the project in `{ "value": … }`.
                let project = value.get("value").cloned().unwrap_or_else(|| value.clone());
                HostRequest::LoadJson(project)
            }
            "refreshTimeline" => HostRequest::RefreshTimeline,
            "setTheme" => HostRequest::SetTheme(arg_str(a, 0, method)?),
            "setDragging" => HostRequest::SetDragging(arg_bool(a, 0, method)?),
            other => return Err(DispatchError::UnknownMethod(other.into())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_zero_argument_methods() {
        assert_eq!(HostRequest::parse("enableQt", Value::Null).unwrap(), HostRequest::EnableQt);
        assert_eq!(
            HostRequest::parse("centerOnPlayhead", json!([])).unwrap(),
            HostRequest::CenterOnPlayhead
        );
    }

    #[test]
    fn parses_positional_arguments() {
        assert_eq!(
            HostRequest::parse("previewClipFrame", json!(["c1", 2.5])).unwrap(),
            HostRequest::PreviewClipFrame { id: "c1".into(), seconds: 2.5 }
        );
        assert_eq!(
            HostRequest::parse("startManualMove", json!(["clip", ["a", "b"]])).unwrap(),
            HostRequest::StartManualMove {
                kind: ItemKind::Clip,
                ids: vec!["a".into(), "b".into()]
            }
        );
    }

    #[test]
    fn bare_argument_is_treated_as_singleton() {
        assert_eq!(
            HostRequest::parse("movePlayhead", json!(4.25)).unwrap(),
            HostRequest::MovePlayhead(4.25)
        );
    }

    #[test]
    fn set_scale_cursor_is_optional() {
        assert_eq!(
            HostRequest::parse("setScale", json!([2.0])).unwrap(),
            HostRequest::SetScale { scale: 2.0, cursor_x: -1.0 }
        );
        assert_eq!(
            HostRequest::parse("setScale", json!([2.0, 640.0])).unwrap(),
            HostRequest::SetScale { scale: 2.0, cursor_x: 640.0 }
        );
    }

    #[test]
    fn load_json_unwraps_the_value_envelope() {
        let req = HostRequest::parse("loadJson", json!([{ "value": { "duration": 10.0 } }]));
        assert_eq!(req.unwrap(), HostRequest::LoadJson(json!({ "duration": 10.0 })));
    }

    #[test]
    fn unknown_method_is_a_typed_error() {
        match HostRequest::parse("detonate", json!([])) {
            Err(DispatchError::UnknownMethod(m)) => assert_eq!(m, "detonate"),
            other => panic!("expected UnknownMethod, got {other:?}"),
        }
    }

    #[test]
    fn wrong_argument_shape_is_a_typed_error() {
        match HostRequest::parse("movePlayhead", json!(["not-a-number"])) {
            Err(DispatchError::BadArgs { method, .. }) => assert_eq!(method, "movePlayhead"),
            other => panic!("expected BadArgs, got {other:?}"),
        }
        match HostRequest::parse("startManualMove", json!(["marker", []])) {
            Err(DispatchError::BadArgs { .. }) => {}
            other => panic!("expected BadArgs, got {other:?}"),
        }
    }
}
