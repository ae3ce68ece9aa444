use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use tracing::{debug, info, warn};

use crate::error::Result;

const CAPTION_PX: f32 = 60.0;
const LINE_SPACING: i32 = 6;
/// Vertical centre of the caption block as a fraction of frame height.
const CAPTION_CENTER_Y: f32 = 0.82;
const OUTLINE_OFFSETS: [(i32, i32); 4] = [(-2, -2), (2, 2), (-2, 2), (2, -2)];

const FALLBACK_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial Unicode.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Compiled into the binary so captions never depend on the host's fonts.
static BUNDLED_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans-Bold.ttf");

pub fn bundled_font() -> Result<FontArc> {
    Ok(FontArc::try_from_slice(BUNDLED_FONT)?)
}

fn read_font(path: &Path) -> Option<FontArc> {
    let bytes = std::fs::read(path).ok()?;
    match FontArc::try_from_vec(bytes) {
        Ok(font) => {
            debug!("Loaded font {}", path.display());
            Some(font)
        }
        Err(e) => {
            warn!("Font {} is invalid: {e}", path.display());
            None
        }
    }
}

/// Loads `preferred`, then the first readable system font, then the bundled
/// font.
pub fn load_font(preferred: &Path) -> Result<FontArc> {
    if let Some(font) = read_font(preferred) {
        return Ok(font);
    }
    warn!("Font {} unavailable; trying system fonts", preferred.display());
    if let Some(font) = FALLBACK_FONTS
        .iter()
        .map(PathBuf::from)
        .find_map(|path| read_font(&path))
    {
        return Ok(font);
    }
    info!("No system font found; using the bundled font");
    bundled_font()
}

/// Greedy word wrap at `width` characters. Words longer than the width are
/// broken across lines.
pub fn wrap_caption(text: &str, width: usize) -> String {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        if current_len > 0 && current_len + 1 + word.len() <= width {
            current.push(' ');
            current.extend(word.iter());
            current_len += 1 + word.len();
            continue;
        }
        if current_len > 0 {
            lines.push(std::mem::take(&mut current));
        }
        while word.len() > width {
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        current_len = word.len();
        current = word.into_iter().collect();
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

/// Draws an outlined caption near the bottom of a frame.
#[derive(Clone)]
pub struct CaptionRenderer {
    font: FontArc,
    scale: PxScale,
}

impl CaptionRenderer {
    pub fn new(font: FontArc) -> Self {
        Self {
            font,
            scale: PxScale::from(CAPTION_PX),
        }
    }

    pub fn load(font_path: &Path) -> Result<Self> {
        Ok(Self::new(load_font(font_path)?))
    }

    pub fn font(&self) -> &FontArc {
        &self.font
    }

    /// Returns a copy of `image` with `caption` (already wrapped) drawn centred
    /// at 82% of its height: four black offset passes, then white on top.
    pub fn render(&self, image: &RgbImage, caption: &str) -> RgbImage {
        let mut out = image.clone();
        let font = &self.font;

        let cx = (out.width() / 2) as i32;
        let cy = (out.height() as f32 * CAPTION_CENTER_Y) as i32;
        let black = Rgb([0, 0, 0]);
        let white = Rgb([255, 255, 255]);
        for (dx, dy) in OUTLINE_OFFSETS {
            draw_block(&mut out, font, self.scale, caption, cx + dx, cy + dy, black);
        }
        draw_block(&mut out, font, self.scale, caption, cx, cy, white);
        out
    }
}

/// Draws multi-line `text` with every line centred on `cx` and the whole block
/// centred on `cy`.
fn draw_block(
    image: &mut RgbImage,
    font: &FontArc,
    scale: PxScale,
    text: &str,
    cx: i32,
    cy: i32,
    color: Rgb<u8>,
) {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return;
    }
    let line_height = scale.y.ceil() as i32;
    let block_height = line_height * lines.len() as i32 + LINE_SPACING * (lines.len() as i32 - 1);
    let mut y = cy - block_height / 2;
    for line in lines {
        let (w, _) = text_size(scale, font, line);
        let x = cx - w as i32 / 2;
        draw_text_mut(image, color, x, y, scale, font, line);
        y += line_height + LINE_SPACING;
    }
}
