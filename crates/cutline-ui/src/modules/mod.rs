// crates/cutline-ui/src/modules/mod.rs
//
// Module registry. To add a new view strip:
//   1. Create modules/mystrip.rs implementing EditorModule
//   2. Add `pub mod mystrip;` below
//   3. Paint it from CutlineApp::update in layout order

pub mod ruler;
pub mod timeline;

use cutline_core::{EngineCommand, Project};
use egui::Ui;

use crate::context::EngineContext;

/// Every view strip implements this. Modules read the replica, mutate only
/// the EngineContext (gesture state, caches), and express every model
/// change as an EngineCommand processed after the UI pass.
pub trait EditorModule {
    fn name(&self) -> &str;
    fn ui(
        &mut self,
        ui: &mut Ui,
        project: &Project,
        ctx: &mut EngineContext,
        cmd: &mut Vec<EngineCommand>,
    );
}
