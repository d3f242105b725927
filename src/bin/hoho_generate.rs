use anyhow::{Context, Result, anyhow};
use clap::Parser;
use hohostudio::catalog::{self, DecorationPosition};
use hohostudio::cli::ModelOptions;
use hohostudio::composer;
use hohostudio::config::setup_logging;
use hohostudio::constants::DEFAULT_MAX_UPLOAD_MB;
use hohostudio::gemini::{GeminiClient, GeminiConfig};
use hohostudio::generation::{Orchestrator, Outcome};
use hohostudio::photo::SourceImage;
use hohostudio::preview::PreviewRegistry;
use hohostudio::selection::truncate_caption;
use hohostudio::wizard::Wizard;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::sync::Mutex;

/// Turn one family photo into a holiday card without the browser.
///
///   hoho_generate family.jpg --style SNOWY --decoration gifts=foreground --text "Feliz 2025"
#[derive(Parser, Debug)]
#[command(name = "hoho_generate")]
struct Args {
    /// The photo (JPG, PNG or WebP)
    photo: PathBuf,

    /// Scene style id, eg CLASSIC, SNOWY, FUNNY, ELVES
    #[arg(long)]
    style: Option<String>,

    /// Decoration as `id` or `id=position` (left, right, background, foreground). Repeatable.
    #[arg(long = "decoration")]
    decorations: Vec<String>,

    /// Pose id, eg original, sitting, opening, toasting
    #[arg(long)]
    pose: Option<String>,

    /// Caption rendered into the card (cut to 30 characters)
    #[arg(long)]
    text: Option<String>,

    /// Lettering style id for the caption
    #[arg(long)]
    text_style: Option<String>,

    /// Where the card is written
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Print the composed prompt and stop before calling the model. No API key needed.
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(long, env = "HOHO_DEBUG")]
    debug: bool,

    #[command(flatten)]
    model: ModelOptions,
}

fn parse_decoration(raw: &str) -> Result<(String, Option<DecorationPosition>)> {
    match raw.split_once('=') {
        Some((id, position)) => {
            let position = DecorationPosition::from_str(position)
                .map_err(|err| anyhow!("Bad decoration '{raw}': {err}"))?;
            Ok((id.trim().to_string(), Some(position)))
        }
        None => Ok((raw.trim().to_string(), None)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.debug).map_err(|err| anyhow!("Failed to set up logging: {err}"))?;

    catalog::init()?;
    let catalog = catalog::catalog()?;

    let bytes =
        fs::read(&args.photo).with_context(|| format!("Failed to read {}", args.photo.display()))?;
    let file_name = args
        .photo
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let source = SourceImage::from_upload(bytes, &file_name, DEFAULT_MAX_UPLOAD_MB * 1024 * 1024)
        .with_context(|| format!("{} was rejected", args.photo.display()))?;

    let mut wizard = Wizard::new(catalog, PreviewRegistry::new());
    wizard.set_image(source);
    if let Some(style) = &args.style {
        wizard.set_style(style);
    }
    for raw in &args.decorations {
        let (id, position) = parse_decoration(raw)?;
        let decoration = catalog.decoration(&id)?;
        wizard.toggle_decoration(&id, position.unwrap_or(decoration.default_position));
    }
    if let Some(pose) = &args.pose {
        wizard.set_pose(pose);
    }
    let text_style = args
        .text_style
        .clone()
        .unwrap_or_else(|| catalog.default_text_style().id.clone());
    wizard.set_text(
        &truncate_caption(args.text.as_deref().unwrap_or_default()),
        &text_style,
    );

    if args.dry_run {
        println!("{}", composer::compose_prompt(catalog, wizard.selection())?);
        return Ok(());
    }

    let client = GeminiClient::new(GeminiConfig::try_from(&args.model)?);
    let orchestrator = Orchestrator::new(client);
    let wizard = Mutex::new(wizard);
    loop {
        match orchestrator.advance(&wizard, catalog).await {
            Outcome::Moved(_) => continue,
            Outcome::Generated => break,
            Outcome::Failed(err) => return Err(anyhow!("Generation failed: {err}")),
            Outcome::Aborted(err) => return Err(anyhow!("Could not build the prompt: {err}")),
            Outcome::Blocked(reason) => return Err(anyhow!("Wizard stopped: {reason}")),
        }
    }

    let wizard = wizard.into_inner();
    let result = wizard
        .result()
        .ok_or_else(|| anyhow!("Generation finished without an image"))?;
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;
    let path = result
        .write_to_dir(&args.out_dir)
        .with_context(|| format!("Failed to write into {}", args.out_dir.display()))?;

    eprintln!("Saved: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_parses_without_an_api_key() {
        let args = Args::try_parse_from(["hoho_generate", "family.jpg", "--dry-run"])
            .expect("parse");
        assert!(args.dry_run);
    }

    #[test]
    fn decorations_take_an_optional_position() {
        let (id, position) = parse_decoration("gifts=foreground").expect("decoration");
        assert_eq!(id, "gifts");
        assert_eq!(position, Some(DecorationPosition::Foreground));
        assert_eq!(parse_decoration("tree").expect("decoration").1, None);
        assert!(parse_decoration("tree=ceiling").is_err());
    }
}
