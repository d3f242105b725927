//! The user's current choices for one session.

use std::collections::BTreeMap;

use crate::catalog::{Catalog, DecorationPosition, ORIGINAL_POSE_ID};
use crate::constants::MAX_CAPTION_CHARS;
use crate::photo::SourceImage;
use crate::preview::{PreviewHandle, PreviewRegistry};

/// Caption plus the lettering style it is rendered in.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TextConfiguration {
    /// Caption, at most [`MAX_CAPTION_CHARS`] characters
    pub content: String,
    /// Text style identifier
    pub style_id: String,
}

impl TextConfiguration {
    /// True when the caption has something other than whitespace.
    pub fn has_caption(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// Cuts raw input down to the caption limit, counting characters rather than bytes.
pub fn truncate_caption(raw: &str) -> String {
    raw.chars().take(MAX_CAPTION_CHARS).collect()
}

/// The uploaded photo together with the preview that displays it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SelectedImage {
    /// The validated upload
    pub source: SourceImage,
    /// Live preview for the page
    pub preview: PreviewHandle,
}

/// What happened on a decoration toggle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Toggle {
    /// The decoration was absent and is now present
    Added,
    /// The decoration was present elsewhere and moved
    Moved,
    /// The decoration was present at the same position and is now gone
    Removed,
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct Defaults {
    style_id: String,
    text_style_id: String,
}

/// One session's choices.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Selection {
    image: Option<SelectedImage>,
    style_id: String,
    decorations: BTreeMap<String, DecorationPosition>,
    pose_id: String,
    text: TextConfiguration,
    defaults: Defaults,
}

impl Selection {
    /// A fresh selection: first style, no decorations, original pose, no caption.
    pub fn new(catalog: &Catalog) -> Self {
        let defaults = Defaults {
            style_id: catalog.default_style().id.clone(),
            text_style_id: catalog.default_text_style().id.clone(),
        };
        Self {
            image: None,
            style_id: defaults.style_id.clone(),
            decorations: BTreeMap::new(),
            pose_id: ORIGINAL_POSE_ID.to_string(),
            text: TextConfiguration {
                content: String::new(),
                style_id: defaults.text_style_id.clone(),
            },
            defaults,
        }
    }

    /// The current photo, if any.
    pub fn image(&self) -> Option<&SelectedImage> {
        self.image.as_ref()
    }

    /// Selected style identifier.
    pub fn style_id(&self) -> &str {
        &self.style_id
    }

    /// Selected decorations keyed by identifier.
    pub fn decorations(&self) -> &BTreeMap<String, DecorationPosition> {
        &self.decorations
    }

    /// Position of a decoration, if it is selected.
    pub fn decoration_position(&self, id: &str) -> Option<DecorationPosition> {
        self.decorations.get(id).copied()
    }

    /// Selected pose identifier.
    pub fn pose_id(&self) -> &str {
        &self.pose_id
    }

    /// Caption configuration.
    pub fn text(&self) -> &TextConfiguration {
        &self.text
    }

    /// Replaces the photo, releasing the old preview and acquiring a new one.
    pub fn set_image(&mut self, source: SourceImage, previews: &PreviewRegistry) {
        if let Some(old) = self.image.take() {
            previews.release(&old.preview);
        }
        let preview = previews.acquire(&source);
        self.image = Some(SelectedImage { source, preview });
    }

    /// Removes the photo and releases its preview.
    pub fn clear_image(&mut self, previews: &PreviewRegistry) {
        if let Some(old) = self.image.take() {
            previews.release(&old.preview);
        }
    }

    /// Selects a style. Unknown identifiers surface when the prompt is composed.
    pub fn set_style(&mut self, id: &str) {
        self.style_id = id.to_string();
    }

    /// Adds a decoration, moves it, or removes it when it is already at `position`.
    pub fn toggle_decoration(&mut self, id: &str, position: DecorationPosition) -> Toggle {
        match self.decorations.get(id).copied() {
            None => {
                self.decorations.insert(id.to_string(), position);
                Toggle::Added
            }
            Some(current) if current != position => {
                self.decorations.insert(id.to_string(), position);
                Toggle::Moved
            }
            Some(_) => {
                self.decorations.remove(id);
                Toggle::Removed
            }
        }
    }

    /// Selects a pose.
    pub fn set_pose(&mut self, id: &str) {
        self.pose_id = id.to_string();
    }

    /// Replaces the caption configuration. Callers truncate with [`truncate_caption`] first.
    pub fn set_text(&mut self, content: &str, style_id: &str) {
        self.text = TextConfiguration {
            content: content.to_string(),
            style_id: style_id.to_string(),
        };
    }

    /// Back to the defaults, dropping the photo.
    pub fn reset(&mut self, previews: &PreviewRegistry) {
        self.clear_image(previews);
        self.style_id = self.defaults.style_id.clone();
        self.decorations.clear();
        self.pose_id = ORIGINAL_POSE_ID.to_string();
        self.text = TextConfiguration {
            content: String::new(),
            style_id: self.defaults.text_style_id.clone(),
        };
    }
}
