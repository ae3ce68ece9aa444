use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use storyreel::config::{DEFAULT_DEITY, DEFAULT_TARGET_DURATION};
use storyreel::image_source::ImageProvider;

#[derive(Parser, Debug)]
#[clap(name = "storyreel", about = "Turn short stories into vertical narrated videos")]
pub struct Args {
    /// Overrides IMAGE_PROVIDER (local, url, openai)
    #[clap(long, global = true)]
    pub image_provider: Option<ImageProvider>,

    /// Overrides ASSETS_DIR
    #[clap(long, global = true)]
    pub assets_dir: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP service (default)
    Serve(ServeArgs),
    /// Render one story to a file
    Render(RenderArgs),
    /// Render a JSON list of chapters into a project directory
    Batch(BatchArgs),
}

#[derive(ClapArgs, Debug, Default)]
pub struct ServeArgs {
    #[clap(long)]
    pub host: Option<String>,

    #[clap(long)]
    pub port: Option<u16>,

    #[clap(long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct RenderArgs {
    /// Story text
    #[clap(long, conflicts_with = "file", required_unless_present = "file")]
    pub story: Option<String>,

    /// Read the story from a UTF-8 text file
    #[clap(long)]
    pub file: Option<PathBuf>,

    #[clap(long, default_value = "out.mp4")]
    pub out: PathBuf,

    #[clap(long, default_value = DEFAULT_DEITY)]
    pub deity: String,

    /// Defaults to VOICE_LANG
    #[clap(long)]
    pub voice_lang: Option<String>,

    /// Target length in seconds
    #[clap(long, default_value_t = DEFAULT_TARGET_DURATION)]
    pub duration: u32,

    #[clap(long)]
    pub image_prompt: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct BatchArgs {
    /// JSON file holding a list of {title, story, duration}
    #[clap(long)]
    pub chapters: PathBuf,

    #[clap(long)]
    pub out_dir: PathBuf,

    #[clap(long, default_value = DEFAULT_DEITY)]
    pub deity: String,

    #[clap(long)]
    pub voice_lang: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let args = Args::try_parse_from(["storyreel"]).unwrap();
        assert!(args.command.is_none());
    }

    #[test]
    fn global_overrides_follow_subcommand() {
        let args = Args::try_parse_from([
            "storyreel",
            "render",
            "--story",
            "The rains came.",
            "--image-provider",
            "local",
        ])
        .unwrap();
        assert_eq!(args.image_provider, Some(ImageProvider::Local));
        match args.command {
            Some(Command::Render(render)) => {
                assert_eq!(render.duration, 20);
                assert_eq!(render.deity, "Generic");
                assert_eq!(render.out, PathBuf::from("out.mp4"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn render_needs_exactly_one_story_source() {
        assert!(Args::try_parse_from(["storyreel", "render"]).is_err());
        assert!(
            Args::try_parse_from(["storyreel", "render", "--story", "x", "--file", "s.txt"])
                .is_err()
        );
        assert!(Args::try_parse_from(["storyreel", "render", "--file", "s.txt"]).is_ok());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(Args::try_parse_from(["storyreel", "--image-provider", "dalle"]).is_err());
    }
}
