//! Timeline composition and caption overlays.

use reel_models::{Caption, CaptionPosition, CaptionWindow, TextStyle};
use tracing::{info, warn};

use crate::error::{MediaError, MediaResult};
use crate::fonts::FontResolverChain;
use crate::plan::{CaptionOverlay, ClipSegment, FeatureOutcome};

/// Caption outline width in pixels.
pub const STROKE_WIDTH: u32 = 3;
/// Horizontal space kept free around caption text (total, both sides).
pub const CAPTION_MARGIN: u32 = 100;
/// Distance of top captions from the top edge.
pub const TOP_OFFSET: u32 = 100;
/// Distance of bottom captions from the bottom edge.
pub const BOTTOM_OFFSET: u32 = 150;
/// Average glyph advance as a share of the font size.
const GLYPH_WIDTH_RATIO: f64 = 0.55;
/// Smallest font size a caption is shrunk to.
const MIN_FONT_SIZE: u32 = 8;

/// Named colors accepted for caption fills, with their RGB values.
const NAMED_COLORS: &[(&str, (u8, u8, u8))] = &[
    ("white", (255, 255, 255)),
    ("black", (0, 0, 0)),
    ("yellow", (255, 255, 0)),
    ("red", (255, 0, 0)),
    ("green", (0, 128, 0)),
    ("lime", (0, 255, 0)),
    ("blue", (0, 0, 255)),
    ("navy", (0, 0, 128)),
    ("cyan", (0, 255, 255)),
    ("magenta", (255, 0, 255)),
    ("pink", (255, 192, 203)),
    ("purple", (128, 0, 128)),
    ("orange", (255, 165, 0)),
    ("gold", (255, 215, 0)),
    ("brown", (165, 42, 42)),
    ("gray", (128, 128, 128)),
    ("grey", (128, 128, 128)),
];

/// Concatenated clips on a shared canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub segments: Vec<ClipSegment>,
    pub canvas: (u32, u32),
}

impl Timeline {
    pub fn duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }
}

/// Caption overlays for a timeline plus whether they made it in.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLayer {
    pub overlays: Vec<CaptionOverlay>,
    pub outcome: FeatureOutcome,
}

/// Put segments back to back on a canvas as large as the largest clip.
///
/// Smaller clips are centered and padded, so differing resolutions are fine.
pub fn concatenate(segments: Vec<ClipSegment>) -> MediaResult<Timeline> {
    if segments.is_empty() {
        return Err(MediaError::NoClips);
    }

    let width = segments.iter().map(|s| s.geometry.output_width()).max().unwrap_or(0);
    let height = segments.iter().map(|s| s.geometry.output_height()).max().unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(MediaError::ConcatFailed(format!(
            "degenerate canvas {}x{}",
            width, height
        )));
    }
    if let Some(bad) = segments.iter().find(|s| !(s.duration.is_finite() && s.duration > 0.0)) {
        return Err(MediaError::ConcatFailed(format!(
            "segment from {} has no duration",
            bad.source.display()
        )));
    }

    let timeline = Timeline {
        segments,
        canvas: (width, height),
    };
    info!(
        "Concatenated {} clips, final duration {:.2}s on {}x{}",
        timeline.segments.len(),
        timeline.duration(),
        width,
        height
    );
    Ok(timeline)
}

/// Builds caption overlays for a timeline.
pub struct Compositor {
    fonts: FontResolverChain,
}

impl Compositor {
    pub fn new(fonts: FontResolverChain) -> Self {
        Self { fonts }
    }

    /// Build every caption, or none: a failing caption drops the whole layer.
    pub fn caption_layer(&self, timeline: &Timeline, captions: &[Caption], style: &TextStyle) -> CaptionLayer {
        let wanted: Vec<&Caption> = captions
            .iter()
            .filter(|c| !c.trimmed_text().is_empty())
            .collect();
        if wanted.is_empty() {
            return CaptionLayer {
                overlays: Vec::new(),
                outcome: FeatureOutcome::NotRequested,
            };
        }

        match self.build_overlays(timeline, &wanted, style) {
            Ok(overlays) => {
                info!("Added {} captions", overlays.len());
                CaptionLayer {
                    overlays,
                    outcome: FeatureOutcome::Applied,
                }
            }
            Err(e) => {
                warn!("Could not add captions: {}", e);
                CaptionLayer {
                    overlays: Vec::new(),
                    outcome: FeatureOutcome::skipped(e),
                }
            }
        }
    }

    fn build_overlays(
        &self,
        timeline: &Timeline,
        captions: &[&Caption],
        style: &TextStyle,
    ) -> MediaResult<Vec<CaptionOverlay>> {
        let font_file = self.fonts.resolve(&style.font);
        let duration = timeline.duration();
        let box_width = timeline.canvas.0.saturating_sub(CAPTION_MARGIN);
        if box_width == 0 {
            return Err(MediaError::caption(format!(
                "canvas width {} leaves no room for text",
                timeline.canvas.0
            )));
        }

        captions
            .iter()
            .map(|caption| -> MediaResult<CaptionOverlay> {
                let window = CaptionWindow::clamp(caption.start_time, caption.end_time, duration)
                    .ok_or_else(|| MediaError::caption(format!("timeline of {:.2}s is too short", duration)))?;
                let fill = parse_color(caption.effective_color(style))?;
                let (text, font_size) = fit_text(caption.trimmed_text(), style.font_size, box_width)?;

                Ok(CaptionOverlay {
                    text,
                    window,
                    position: caption.effective_position(style),
                    font_size,
                    color: fill.ffmpeg(),
                    stroke_color: if fill.takes_dark_stroke() { "black" } else { "white" }.to_string(),
                    stroke_width: STROKE_WIDTH,
                    font_file: font_file.clone(),
                })
            })
            .collect()
    }
}

/// A validated caption color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// `0xRRGGBB`, which FFmpeg accepts everywhere a color is expected.
    pub fn ffmpeg(&self) -> String {
        format!("0x{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }

    /// Only white and yellow fills, by name or hex, get a black outline.
    pub fn takes_dark_stroke(&self) -> bool {
        matches!(self, Rgb(255, 255, 255) | Rgb(255, 255, 0))
    }
}

/// Parse a CSS color name or `#rgb` / `#rrggbb`.
pub fn parse_color(color: &str) -> MediaResult<Rgb> {
    let color = color.trim();
    if let Some(hex) = color.strip_prefix('#') {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(MediaError::caption(format!("invalid color '{}'", color)));
        }
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(MediaError::caption(format!("invalid color '{}'", color))),
        };
        let channel = |i: usize| {
            u8::from_str_radix(&expanded[i..i + 2], 16)
                .map_err(|_| MediaError::caption(format!("invalid color '{}'", color)))
        };
        return Ok(Rgb(channel(0)?, channel(2)?, channel(4)?));
    }

    NAMED_COLORS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(color))
        .map(|(_, (r, g, b))| Rgb(*r, *g, *b))
        .ok_or_else(|| MediaError::caption(format!("unknown color '{}'", color)))
}

fn glyph_width(font_size: u32) -> f64 {
    f64::from(font_size) * GLYPH_WIDTH_RATIO
}

/// Word-wrap `text` into `box_width` pixels, shrinking the font when a single
/// word would not fit on its own line.
pub fn fit_text(text: &str, font_size: u32, box_width: u32) -> MediaResult<(String, u32)> {
    let longest_word = text
        .split_whitespace()
        .map(|w| w.chars().count())
        .max()
        .ok_or_else(|| MediaError::caption("empty caption text"))?;

    let mut size = font_size.max(MIN_FONT_SIZE);
    let needed = glyph_width(size) * longest_word as f64;
    if needed > f64::from(box_width) {
        size = (f64::from(box_width) / (GLYPH_WIDTH_RATIO * longest_word as f64)).floor() as u32;
        if size < MIN_FONT_SIZE {
            return Err(MediaError::caption(format!(
                "word of {} characters does not fit in {}px",
                longest_word, box_width
            )));
        }
    }

    let max_chars = ((f64::from(box_width) / glyph_width(size)).floor() as usize).max(1);
    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let extra = if current.is_empty() { 0 } else { 1 };
            if !current.is_empty() && current.chars().count() + extra + word.chars().count() > max_chars {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    Ok((lines.join("\n"), size))
}

/// FFmpeg `y` expression for a caption placement.
pub fn position_y(position: CaptionPosition) -> String {
    match position {
        CaptionPosition::Top => TOP_OFFSET.to_string(),
        CaptionPosition::Center => "(h-text_h)/2".to_string(),
        CaptionPosition::Bottom => format!("h-{}", BOTTOM_OFFSET),
    }
}
