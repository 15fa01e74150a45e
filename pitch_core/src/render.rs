//! Turns [`RenderCommand`]s into frames.

use image::{Rgba, RgbaImage};
use serde::Serialize;

use crate::contour::draw_contour;
use crate::document::LoadedDocument;
use crate::editor::{EditorSession, Mode, RenderCommand};
use crate::heatmap::render_heatmap;
use crate::scale::MelScale;
use crate::surface::{ImageSurface, Surface};

pub const FINAL_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const SELECTION_COLOR: Rgba<u8> = Rgba([255, 255, 255, 72]);
/// Candidate contours cycle through these.
pub const CANDIDATE_COLORS: [Rgba<u8>; 4] = [
    Rgba([0, 255, 255, 255]),
    Rgba([255, 165, 0, 255]),
    Rgba([255, 255, 255, 255]),
    Rgba([255, 0, 255, 255]),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "contour", rename_all = "snake_case")]
pub enum FrameTarget {
    Editor,
    Thumbnail(String),
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub target: FrameTarget,
    pub image: RgbaImage,
}

impl Frame {
    pub fn png_base64(&self) -> crate::Result<String> {
        crate::encode_png_base64(&self.image)
    }
}

/// Executes render commands against a session, caching the heatmap between
/// frames so pointer events only re-composite.
#[derive(Debug, Default)]
pub struct Compositor {
    heatmap: Option<CachedHeatmap>,
}

#[derive(Debug)]
struct CachedHeatmap {
    generation: u64,
    image: RgbaImage,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execute(&mut self, session: &EditorSession, commands: &[RenderCommand]) -> Vec<Frame> {
        let mut frames = Vec::new();
        for command in commands {
            match command {
                RenderCommand::RenderHeatmap { width, height } => {
                    self.rebuild_heatmap(session, *width, *height);
                }
                RenderCommand::RenderEditor => frames.extend(self.render_editor(session)),
                RenderCommand::RenderThumbnail { contour } => {
                    frames.extend(self.render_thumbnail(session, contour));
                }
            }
        }
        frames
    }

    /// Editor canvas: heatmap, final contour, then the selection if any.
    pub fn render_editor(&mut self, session: &EditorSession) -> Option<Frame> {
        let doc = session.document()?;
        let mut surface = self.base_surface(session)?;
        let view = session.view();

        draw_contour(
            &mut surface,
            doc.contours.final_contour(),
            FINAL_COLOR,
            view.scale,
            session.mel_scale(),
        );

        if view.mode == Mode::Select {
            if let Some(sel) = view.selection {
                let (lo, hi) = sel.span();
                let height = surface.height() as f64;
                surface.fill_rect(lo, 0.0, hi - lo, height, SELECTION_COLOR);
            }
        }

        Some(Frame {
            target: FrameTarget::Editor,
            image: surface.into_image(),
        })
    }

    /// Heatmap with one candidate contour drawn over it.
    pub fn render_thumbnail(&mut self, session: &EditorSession, contour: &str) -> Option<Frame> {
        let doc = session.document()?;
        let position = doc.contours.candidates().position(|(name, _)| name == contour)?;
        let values = doc.contours.get(contour)?;
        let mut surface = self.base_surface(session)?;

        draw_contour(
            &mut surface,
            values,
            CANDIDATE_COLORS[position % CANDIDATE_COLORS.len()],
            session.view().scale,
            session.mel_scale(),
        );

        Some(Frame {
            target: FrameTarget::Thumbnail(contour.to_string()),
            image: surface.into_image(),
        })
    }

    fn rebuild_heatmap(&mut self, session: &EditorSession, width: u32, height: u32) {
        self.heatmap = session.document().map(|doc| CachedHeatmap {
            generation: session.generation(),
            image: render_heatmap(&doc.matrix, width, height),
        });
    }

    /// A surface at the session's canvas size with the heatmap blitted in,
    /// rebuilding the cache if it belongs to another load or size.
    fn base_surface(&mut self, session: &EditorSession) -> Option<ImageSurface> {
        let (width, height) = (session.canvas_width(), session.canvas_height());
        let stale = match &self.heatmap {
            Some(cached) => cached.generation != session.generation() || cached.image.dimensions() != (width, height),
            None => true,
        };
        if stale {
            self.rebuild_heatmap(session, width, height);
        }
        let cached = self.heatmap.as_ref()?;

        let mut surface = ImageSurface::new(width, height);
        surface.put_image(&cached.image);
        Some(surface)
    }
}

/// One-shot render of a document: heatmap with every contour, `"final"`
/// first so candidates sit on top of it.
pub fn render_overview(doc: &LoadedDocument, scale: f64, height: u32, mel: &MelScale) -> RgbaImage {
    let width = ((doc.matrix.cols() as f64 * scale).floor() as u32).max(1);
    let height = height.max(1);
    let mut surface = ImageSurface::from_image(render_heatmap(&doc.matrix, width, height));

    draw_contour(&mut surface, doc.contours.final_contour(), FINAL_COLOR, scale, mel);
    for (i, (_, values)) in doc.contours.candidates().enumerate() {
        draw_contour(&mut surface, values, CANDIDATE_COLORS[i % CANDIDATE_COLORS.len()], scale, mel);
    }

    surface.into_image()
}
