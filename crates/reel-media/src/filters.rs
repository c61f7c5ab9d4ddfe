//! FFmpeg filter graph construction for a [`RenderPlan`].
//!
//! Input `i` of the command is segment `i`; the music bed, when present, is the
//! input right after the last segment.

use std::path::Path;

use crate::compositor::position_y;
use crate::plan::{AudioBinding, CaptionOverlay, ClipSegment, MusicBed, RenderPlan};

/// Sample rate every audio branch is normalized to.
pub const AUDIO_SAMPLE_RATE: u32 = 44_100;

/// Final labels of a built graph.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderGraph {
    pub filter: String,
    pub video_label: String,
    pub audio_label: String,
}

/// Escape a path for use inside a single-quoted filter option.
pub fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "\\\\").replace('\'', "\\'").replace(':', "\\:")
}

/// Scale, crop and pad one segment onto the canvas.
pub fn segment_video_chain(index: usize, segment: &ClipSegment, canvas: (u32, u32), fps: u32) -> String {
    let g = &segment.geometry;
    let mut chain = format!("[{}:v]scale={}:{}", index, g.scaled_width, g.scaled_height);
    if let Some(crop) = g.crop_width {
        chain.push_str(&format!(",crop={}:{}:{}:0", crop, g.scaled_height, g.crop_x()));
    }
    chain.push_str(&format!(
        ",pad={}:{}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={},format=yuv420p,setpts=PTS-STARTPTS[v{}]",
        canvas.0, canvas.1, fps, index
    ));
    chain
}

/// Normalized native audio for one segment, or silence of the same length.
pub fn segment_audio_chain(index: usize, segment: &ClipSegment) -> String {
    if segment.keep_audio {
        format!(
            "[{}:a]aformat=sample_rates={}:channel_layouts=stereo,asetpts=PTS-STARTPTS[a{}]",
            index, AUDIO_SAMPLE_RATE, index
        )
    } else {
        format!(
            "anullsrc=r={}:cl=stereo,atrim=duration={:.3}[a{}]",
            AUDIO_SAMPLE_RATE, segment.duration, index
        )
    }
}

/// Concat `count` segments, with or without their audio.
pub fn concat_filter(count: usize, with_audio: bool) -> String {
    let mut inputs = String::new();
    for i in 0..count {
        inputs.push_str(&format!("[v{}]", i));
        if with_audio {
            inputs.push_str(&format!("[a{}]", i));
        }
    }
    if with_audio {
        format!("{}concat=n={}:v=1:a=1[vcat][acat]", inputs, count)
    } else {
        format!("{}concat=n={}:v=1:a=0[vcat]", inputs, count)
    }
}

/// One drawtext filter. The text is read from `text_file` with expansion off,
/// so caption content never needs escaping.
pub fn drawtext_filter(overlay: &CaptionOverlay, text_file: &Path) -> String {
    let mut filter = format!(
        "drawtext=textfile='{}':expansion=none",
        escape_filter_path(&text_file.to_string_lossy())
    );
    if let Some(font) = &overlay.font_file {
        filter.push_str(&format!(":fontfile='{}'", escape_filter_path(&font.to_string_lossy())));
    }
    filter.push_str(&format!(
        ":fontsize={}:fontcolor={}:borderw={}:bordercolor={}:x=(w-text_w)/2:y={}:enable='between(t,{:.3},{:.3})'",
        overlay.font_size,
        overlay.color,
        overlay.stroke_width,
        overlay.stroke_color,
        position_y(overlay.position),
        overlay.window.start,
        overlay.window.end
    ));
    filter
}

/// Chain every caption over `input`, in order.
pub fn caption_chain(input: &str, overlays: &[CaptionOverlay], text_files: &[&Path], output: &str) -> String {
    let filters: Vec<String> = overlays
        .iter()
        .zip(text_files.iter())
        .map(|(overlay, file)| drawtext_filter(overlay, file))
        .collect();
    if filters.is_empty() {
        format!("[{}]null[{}]", input, output)
    } else {
        format!("[{}]{}[{}]", input, filters.join(","), output)
    }
}

/// Pad or cut the (looped) music input to the bed length, then fade and attenuate.
pub fn music_chain(input_index: usize, bed: &MusicBed, output: &str) -> String {
    let mut chain = format!(
        "[{}:a]aformat=sample_rates={}:channel_layouts=stereo,apad,atrim=duration={:.3},asetpts=PTS-STARTPTS",
        input_index, AUDIO_SAMPLE_RATE, bed.duration
    );
    if let Some(fade) = bed.fade.filter(|f| *f > 0.0) {
        chain.push_str(&format!(
            ",afade=t=in:st=0:d={:.3},afade=t=out:st={:.3}:d={:.3}",
            fade,
            (bed.duration - fade).max(0.0),
            fade
        ));
    }
    if let Some(volume) = bed.volume {
        chain.push_str(&format!(",volume={:.3}", volume));
    }
    chain.push_str(&format!("[{}]", output));
    chain
}

/// Full graph for a plan. `text_files[i]` holds the text of caption `i`.
pub fn build_render_graph(plan: &RenderPlan, text_files: &[&Path]) -> RenderGraph {
    let count = plan.segments.len();
    let with_native = matches!(plan.audio, AudioBinding::Native);
    let mut parts = Vec::with_capacity(count * 2 + 3);

    for (i, segment) in plan.segments.iter().enumerate() {
        parts.push(segment_video_chain(i, segment, plan.canvas, plan.encoding.fps));
        if with_native {
            parts.push(segment_audio_chain(i, segment));
        }
    }
    parts.push(concat_filter(count, with_native));
    parts.push(caption_chain("vcat", &plan.captions, text_files, "vout"));

    let audio_label = match &plan.audio {
        AudioBinding::Native => "acat".to_string(),
        AudioBinding::Music(bed) => {
            parts.push(music_chain(count, bed, "aout"));
            "aout".to_string()
        }
    };

    RenderGraph {
        filter: parts.join(";"),
        video_label: "vout".to_string(),
        audio_label,
    }
}
