use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use captioner::{
    CaptionJob, EmojiGrouping, FixedContentTop, FontAsset, FontCache, RenderConfig,
    encode::ffmpeg::FALLBACK_TOP_Y,
};

#[derive(Parser, Debug)]
#[command(name = "captioner", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a caption to a transparent PNG.
    Render(RenderArgs),
    /// Burn a caption into a video (requires `ffmpeg` on PATH).
    Overlay(OverlayArgs),
}

#[derive(Args, Debug)]
struct StyleArgs {
    /// JSON render config; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Font file (.ttf/.otf).
    #[arg(long, conflicts_with = "font_family")]
    font: Option<PathBuf>,

    /// Installed font family name.
    #[arg(long)]
    font_family: Option<String>,

    #[arg(long)]
    font_size: Option<u32>,

    /// Directory of `<codepoints>.png` emoji assets.
    #[arg(long)]
    emoji_dir: Option<PathBuf>,

    /// Output width in pixels.
    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    scale: Option<u32>,

    #[arg(long)]
    margin: Option<u32>,

    #[arg(long, allow_hyphen_values = true)]
    tracking: Option<i32>,

    /// Add an outline stroke to text glyphs.
    #[arg(long)]
    stroke: bool,

    #[arg(long, value_enum)]
    grouping: Option<GroupingChoice>,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Caption text. `\n` inside the argument is not interpreted; use a real newline.
    caption: String,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Args, Debug)]
struct OverlayArgs {
    caption: String,

    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output video.
    #[arg(long)]
    out: PathBuf,

    /// Row where the video content starts.
    #[arg(long, default_value_t = FALLBACK_TOP_Y)]
    content_top: u32,

    /// Directory for intermediate files.
    #[arg(long)]
    work_dir: Option<PathBuf>,

    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum GroupingChoice {
    Codepoint,
    Grapheme,
}

impl From<GroupingChoice> for EmojiGrouping {
    fn from(value: GroupingChoice) -> Self {
        match value {
            GroupingChoice::Codepoint => Self::Codepoint,
            GroupingChoice::Grapheme => Self::Grapheme,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Overlay(args) => cmd_overlay(args),
    }
}

fn build_config(style: StyleArgs) -> anyhow::Result<RenderConfig> {
    let mut cfg = match &style.config {
        Some(path) => RenderConfig::from_json_path(path)?,
        None => RenderConfig::default(),
    };

    if let Some(path) = style.font {
        cfg.font = FontAsset::File(path);
    }
    if let Some(family) = style.font_family {
        cfg.font = FontAsset::System(family);
    }
    if let Some(v) = style.font_size {
        cfg.font_size = v;
    }
    if let Some(v) = style.emoji_dir {
        cfg.emoji_dir = v;
    }
    if let Some(v) = style.width {
        cfg.video_width = v;
    }
    if let Some(v) = style.scale {
        cfg.scale_factor = v;
    }
    if let Some(v) = style.margin {
        cfg.margin = v;
    }
    if let Some(v) = style.tracking {
        cfg.tracking = v;
    }
    if style.stroke {
        cfg.stroke_emphasis = true;
    }
    if let Some(v) = style.grouping {
        cfg.emoji_grouping = v.into();
    }

    cfg.validate()?;
    Ok(cfg)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let cfg = build_config(args.style)?;
    let fonts = FontCache::new();
    let (out, height) = captioner::render_caption_to_path(&args.caption, &args.out, &cfg, &fonts)?;
    eprintln!("wrote {} ({}x{height})", out.display(), cfg.video_width);
    Ok(())
}

fn cmd_overlay(args: OverlayArgs) -> anyhow::Result<()> {
    let cfg = build_config(args.style)?;
    let fonts = FontCache::new();
    let job = CaptionJob {
        video: args.in_path,
        caption: args.caption,
        output: args.out,
        work_dir: args.work_dir.unwrap_or_else(std::env::temp_dir),
    };
    let outcome = captioner::caption_video(&job, &cfg, &fonts, &FixedContentTop(args.content_top))?;
    eprintln!(
        "wrote {} (caption {}px tall at y={})",
        outcome.output.display(),
        outcome.caption_height,
        outcome.overlay_y
    );
    Ok(())
}
