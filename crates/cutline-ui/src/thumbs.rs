// crates/cutline-ui/src/thumbs.rs
//
// Thumbnail fetcher: one background thread, request channel in, decoded
// images out, results drained once per frame into GPU textures. The engine
// never blocks on the thumbnail HTTP server; a dead server just means
// clips render without preview strips.
//
// URL format: `{thumb_server}{file_id}/{frame}/?{nonce}` where
// `frame = floor(source_fps · clip.start) + 1`. The random nonce defeats
// aggressive caching on the host's embedded server.

use std::collections::HashMap;
use std::io::Read;

use anyhow::Context as _;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use cutline_core::project::Clip;
use egui::TextureHandle;

struct ThumbRequest {
    clip_id: String,
    url: String,
}

struct ThumbResult {
    clip_id: String,
    image: egui::ColorImage,
}

/// GPU-resident thumbnails keyed by clip id, plus the fetch plumbing.
pub struct ThumbnailCache {
    textures: HashMap<String, TextureHandle>,
    /// Clip ids with a fetch in flight or already failed — never re-request
    /// until `invalidate` busts them.
    requested: HashMap<String, bool>,
    req_tx: Sender<ThumbRequest>,
    res_rx: Receiver<ThumbResult>,
}

impl ThumbnailCache {
    pub fn new() -> Self {
        let (req_tx, req_rx) = bounded::<ThumbRequest>(256);
        let (res_tx, res_rx) = bounded::<ThumbResult>(64);

        std::thread::spawn(move || fetch_loop(req_rx, res_tx));

        ThumbnailCache {
            textures: HashMap::new(),
            requested: HashMap::new(),
            req_tx,
            res_rx,
        }
    }

    /// 1-based source frame shown as a clip's thumbnail.
    pub fn thumb_frame(clip: &Clip) -> i64 {
        (clip.reader.fps.value() * clip.start).floor() as i64 + 1
    }

    pub fn url_for(server: &str, clip: &Clip) -> String {
        let nonce: u32 = rand::random();
        format!("{server}{}/{}/?{nonce}", clip.file_id, Self::thumb_frame(clip))
    }

    /// Texture for a clip, requesting a fetch on first sight. Returns
    /// `None` until the fetch lands (or when no thumb server is set).
    pub fn texture(&mut self, server: Option<&str>, clip: &Clip) -> Option<&TextureHandle> {
        if let Some(server) = server {
            if !self.textures.contains_key(&clip.id) && !self.requested.contains_key(&clip.id) {
                let request = ThumbRequest {
                    clip_id: clip.id.clone(),
                    url: Self::url_for(server, clip),
                };
                match self.req_tx.try_send(request) {
                    Ok(()) => {
                        self.requested.insert(clip.id.clone(), true);
                    }
                    Err(TrySendError::Full(_)) => {} // retry next frame
                    Err(TrySendError::Disconnected(_)) => {
                        log::warn!("[thumb] fetch thread gone, thumbnails disabled");
                        self.requested.insert(clip.id.clone(), false);
                    }
                }
            }
        }
        self.textures.get(&clip.id)
    }

    /// Drop one clip's texture and re-fetch with a fresh nonce — the
    /// host's `updateThumbnail`.
    pub fn invalidate(&mut self, clip_id: &str) {
        self.textures.remove(clip_id);
        self.requested.remove(clip_id);
    }

    /// Upload every finished fetch. Called once per frame before painting.
    pub fn ingest(&mut self, ctx: &egui::Context) {
        while let Ok(result) = self.res_rx.try_recv() {
            let tex = ctx.load_texture(
                format!("thumb-{}", result.clip_id),
                result.image,
                egui::TextureOptions::LINEAR,
            );
            self.textures.insert(result.clip_id, tex);
            ctx.request_repaint();
        }
    }
}

fn fetch_image(url: &str) -> anyhow::Result<egui::ColorImage> {
    let response = ureq::get(url).call().context("request failed")?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .context("body read failed")?;
    egui_extras::image::load_image_bytes(&bytes).map_err(|e| anyhow::anyhow!("decode failed: {e}"))
}

fn fetch_loop(req_rx: Receiver<ThumbRequest>, res_tx: Sender<ThumbResult>) {
    while let Ok(req) = req_rx.recv() {
        match fetch_image(&req.url) {
            Ok(image) => {
                if res_tx.send(ThumbResult { clip_id: req.clip_id, image }).is_err() {
                    return; // UI gone, stop fetching
                }
            }
            Err(e) => log::debug!("[thumb] {}: {e:#}", req.url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutline_core::project::{Fps, Reader};
    use cutline_core::keyframes::PropertyMap;

    fn clip() -> Clip {
        Clip {
            id: "c1".into(),
            file_id: "F7".into(),
            layer: 1,
            position: 0.0,
            start: 2.5,
            end: 6.0,
            selected: false,
            reader: Reader {
                fps: Fps { num: 30, den: 1 },
                ..Reader::default()
            },
            effects: Vec::new(),
            ui: Default::default(),
            properties: PropertyMap::new(),
        }
    }

    #[test]
    fn thumb_frame_floors_into_the_source() {
        // 30 fps source, start 2.5 s → floor(75) + 1 = 76.
        assert_eq!(ThumbnailCache::thumb_frame(&clip()), 76);
    }

    #[test]
    fn url_carries_file_frame_and_nonce() {
        let url = ThumbnailCache::url_for("http://localhost:8081/thumbnails/", &clip());
        assert!(url.starts_with("http://localhost:8081/thumbnails/F7/76/?"));
        let nonce = url.rsplit('?').next().unwrap();
        assert!(!nonce.is_empty());
    }
}
