//! Turns a [`Selection`] into the single instruction sent to the image model.
//!
//! Composition is pure: the same selection and catalog always give the same bytes.

use crate::catalog::{Catalog, CatalogError, ORIGINAL_POSE_ID};
use crate::generation::GenerationRequest;
use crate::photo::SourceImage;
use crate::selection::{Selection, TextConfiguration};

/// Pose clause used for the original pose.
pub const POSE_PRESERVE: &str =
    "Keep the facial features and body positions strictly consistent with the original image.";

/// Start of the pose clause used for every other pose.
pub const POSE_CHANGE_PREFIX: &str =
    "Change the body positions of the people to match this description:";

const POSE_CHANGE_SUFFIX: &str =
    "However, preserve the facial identity of the people from the original image as much as possible.";

const DECORATION_INTRO: &str = "Integrate the following decorative elements into the scene:";

/// Lettering used when the caption's text style no longer resolves.
pub const FALLBACK_TEXT_STYLE: &str = "elegant festive lettering";

const STANDING_INSTRUCTIONS: [&str; 4] = [
    "Change the clothing to festive winter/Christmas attire appropriate for the style.",
    "Replace the background completely to match the description.",
    "Ensure high photorealism and lighting consistency.",
    "Make it look like a professional holiday card.",
];

/// Builds the request for the generator: the composed prompt plus the photo payload.
///
/// Fails only when the style does not resolve.
pub fn compose(
    catalog: &Catalog,
    image: &SourceImage,
    selection: &Selection,
) -> Result<GenerationRequest, CatalogError> {
    let prompt = compose_prompt(catalog, selection)?;
    Ok(GenerationRequest {
        prompt,
        image: image.to_payload(),
    })
}

/// Builds the prompt text alone.
pub fn compose_prompt(catalog: &Catalog, selection: &Selection) -> Result<String, CatalogError> {
    let style = catalog.style(selection.style_id())?;
    let pose = pose_clause(catalog, selection.pose_id());
    let decorations = decoration_clause(catalog, selection);
    let text = text_clause(catalog, selection.text());

    let mut prompt = String::new();
    prompt.push_str("Transform this image into a detailed Christmas scene.\n\n");
    prompt.push_str(&format!("Visual Style: {}\n\n", style.prompt));
    prompt.push_str(&format!("Scene Composition & Pose:\n{pose}\n\n"));
    prompt.push_str(&format!("Decorations:\n{decorations}\n\n"));
    prompt.push_str(&format!("Text/Title:\n{text}\n\n"));
    prompt.push_str("Instructions:\n");
    for (idx, instruction) in STANDING_INSTRUCTIONS.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", idx + 1, instruction));
    }
    Ok(prompt)
}

fn pose_clause(catalog: &Catalog, pose_id: &str) -> String {
    if pose_id == ORIGINAL_POSE_ID {
        return POSE_PRESERVE.to_string();
    }
    let pose = catalog.pose_or_default(pose_id);
    format!("{POSE_CHANGE_PREFIX} {}. {POSE_CHANGE_SUFFIX}", pose.prompt.trim_end_matches('.'))
}

fn decoration_clause(catalog: &Catalog, selection: &Selection) -> String {
    let decorations = selection.decorations();
    if decorations.is_empty() {
        return String::new();
    }
    let mut clause = String::from(DECORATION_INTRO);
    for (id, position) in decorations {
        // stale ids are skipped, not fatal
        let Ok(decoration) = catalog.decoration(id) else {
            continue;
        };
        clause.push_str(&format!(" {} positioned {}.", decoration.label, position));
    }
    clause
}

fn text_clause(catalog: &Catalog, text: &TextConfiguration) -> String {
    if !text.has_caption() {
        return String::new();
    }
    let style = catalog
        .text_style(&text.style_id)
        .map(|style| style.prompt.as_str())
        .unwrap_or(FALLBACK_TEXT_STYLE);
    format!(
        "IMPORTANT TEXT INSTRUCTION:\n\
         Render the text \"{}\" visible in the image.\n\
         Style of text: {}.\n\
         Ensure the text is spelled correctly, legible, and aesthetically integrated into the environment (not just an overlay).",
        text.content, style
    )
}
