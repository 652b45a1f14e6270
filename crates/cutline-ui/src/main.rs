#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod context;
mod helpers;
mod interaction;
mod modules;
mod theme;
mod thumbs;

fn main() -> eframe::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // With no native host attached the engine runs on demo data; keeping
    // the host end of the bridge alive means the channels stay connected
    // and an embedding process could still drive it through HostHandle.
    let (engine_link, host_handle) = cutline_bridge::pair();

    let native_options = eframe::NativeOptions {
        centered: true,
        viewport: egui::ViewportBuilder::default()
            .with_title("Cutline")
            .with_inner_size([1380.0, 520.0])
            .with_min_inner_size([800.0, 320.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Cutline",
        native_options,
        Box::new(move |cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(app::CutlineApp::new(cc, engine_link, Some(host_handle))))
        }),
    )
}
