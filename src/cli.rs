use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

use snapfetch::request::PixelFormat;

#[derive(Parser, Debug)]
#[command(name = "snapfetch")]
#[command(about = "Fetch, transform and save images", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load one image through the engine and write it to disk
    Fetch(FetchArgs),
    /// Print the resolved configuration as TOML
    Config,
}

#[derive(clap::Args, Debug)]
#[command(group(ArgGroup::new("mode").args(["center_crop", "center_inside", "max_side"])))]
pub struct FetchArgs {
    /// Image URI (http, https, file, asset, gallery, resource) or a local path
    pub uri: String,

    /// Target size as WIDTHxHEIGHT
    #[arg(long, value_parser = parse_size)]
    pub resize: Option<(u32, u32)>,

    /// Only shrink images larger than the target
    #[arg(long, requires = "resize")]
    pub only_if_bigger: bool,

    #[arg(long, requires = "resize")]
    pub center_crop: bool,

    #[arg(long, requires = "resize")]
    pub center_inside: bool,

    /// Scale so the longer side matches the target
    #[arg(long, requires = "resize")]
    pub max_side: bool,

    /// Rotation in degrees, clockwise
    #[arg(long, allow_hyphen_values = true)]
    pub rotate: Option<f32>,

    /// Rotation pivot as X,Y
    #[arg(long, value_parser = parse_pivot, requires = "rotate", allow_hyphen_values = true)]
    pub pivot: Option<(f32, f32)>,

    /// Decode pixel format: rgba8, rgb8, luma8 or lumaa8
    #[arg(long)]
    pub format: Option<PixelFormat>,

    /// Output file; the encoding follows the extension
    #[arg(long, short)]
    pub output: PathBuf,
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let w = w.trim().parse().map_err(|e| format!("bad width '{w}': {e}"))?;
    let h = h.trim().parse().map_err(|e| format!("bad height '{h}': {e}"))?;
    Ok((w, h))
}

fn parse_pivot(value: &str) -> Result<(f32, f32), String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{value}'"))?;
    let x = x.trim().parse().map_err(|e| format!("bad x '{x}': {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("bad y '{y}': {e}"))?;
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("640x480"), Ok((640, 480)));
        assert_eq!(parse_size("32X16"), Ok((32, 16)));
        assert!(parse_size("640").is_err());
        assert!(parse_size("ax1").is_err());
    }

    #[test]
    fn test_parse_pivot() {
        assert_eq!(parse_pivot("10,12.5"), Ok((10.0, 12.5)));
        assert!(parse_pivot("10").is_err());
    }

    #[test]
    fn test_fetch_args() {
        let cli = Cli::try_parse_from([
            "snapfetch",
            "fetch",
            "https://example.com/a.png",
            "--resize",
            "100x50",
            "--center-crop",
            "--rotate",
            "-90",
            "--format",
            "rgb8",
            "-o",
            "out.png",
        ])
        .unwrap();

        let Commands::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };
        assert_eq!(args.resize, Some((100, 50)));
        assert!(args.center_crop);
        assert_eq!(args.rotate, Some(-90.0));
        assert_eq!(args.format, Some(PixelFormat::Rgb8));
    }

    #[test]
    fn test_modes_are_exclusive() {
        let result = Cli::try_parse_from([
            "snapfetch",
            "fetch",
            "a.png",
            "--resize",
            "10x10",
            "--center-crop",
            "--center-inside",
            "-o",
            "out.png",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_mode_requires_resize() {
        let result = Cli::try_parse_from(["snapfetch", "fetch", "a.png", "--max-side", "-o", "x.png"]);
        assert!(result.is_err());
    }
}
