//! The step-by-step flow: Upload, Style, Customize, Text, then Result.
//!
//! A [`Wizard`] owns one session's [`Selection`] plus the step, busy flag, last error and
//! last result. Everything here is synchronous; the one suspension point (the generator
//! call) lives in [`crate::generation::Orchestrator`], which uses [`Wizard::advance`] and
//! [`Wizard::finish_generation`] on either side of it.

use std::fmt;

use tracing::{debug, warn};

use crate::catalog::{Catalog, CatalogError, DecorationPosition};
use crate::composer;
use crate::generation::{GeneratedImage, GenerationError, GenerationRequest};
use crate::photo::SourceImage;
use crate::preview::PreviewRegistry;
use crate::selection::{Selection, Toggle};

/// Number of steps before the result.
pub const PRE_RESULT_STEPS: usize = 4;

/// A wizard step.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Step {
    /// Pick the photo
    Upload,
    /// Pick the scene style
    Style,
    /// Decorations and pose
    Customize,
    /// Optional caption, then generate
    Text,
    /// Show the generated card
    Result,
}

impl Step {
    /// Every step in order.
    pub const ALL: [Step; 5] = [
        Step::Upload,
        Step::Style,
        Step::Customize,
        Step::Text,
        Step::Result,
    ];

    /// Zero-based index.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Step at an index, if any.
    pub fn from_index(index: usize) -> Option<Step> {
        Self::ALL.get(index).copied()
    }

    fn next(self) -> Step {
        Self::from_index(self.index() + 1).unwrap_or(Step::Result)
    }

    fn previous(self) -> Step {
        self.index()
            .checked_sub(1)
            .and_then(Self::from_index)
            .unwrap_or(Step::Upload)
    }

    /// Heading shown on the page.
    pub fn title(self) -> &'static str {
        match self {
            Step::Upload => "Tu Foto Familiar",
            Step::Style => "Elige el Estilo",
            Step::Customize => "Detalles de la Escena",
            Step::Text => "Añade un Título",
            Step::Result => "¡Felices Fiestas!",
        }
    }

    /// True on the step whose "next" generates.
    pub fn is_last_before_result(self) -> bool {
        self.index() == PRE_RESULT_STEPS - 1
    }
}

/// Why a navigation request did nothing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Blocked {
    /// A generation is in flight
    Busy,
    /// The upload step needs a photo first
    NoImage,
    /// Already showing the result
    AtResult,
    /// Already on the first step
    AtStart,
}

impl fmt::Display for Blocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Busy => "a generation is in progress",
            Self::NoImage => "no photo has been uploaded",
            Self::AtResult => "the result is already showing",
            Self::AtStart => "already at the first step",
        };
        f.write_str(reason)
    }
}

/// What [`Wizard::advance`] did.
#[derive(Debug)]
pub enum Advance {
    /// Moved forward to this step
    Moved(Step),
    /// Generation started; the wizard is busy until [`Wizard::finish_generation`]
    Generate(GenerationRequest),
    /// Nothing changed
    Blocked(Blocked),
    /// The prompt could not be composed; the error is stored on the wizard
    Aborted(CatalogError),
}

/// One session's wizard.
#[derive(Debug)]
pub struct Wizard {
    selection: Selection,
    step: Step,
    busy: bool,
    error: Option<String>,
    result: Option<GeneratedImage>,
    previews: PreviewRegistry,
}

impl Wizard {
    /// A wizard at the upload step with default choices.
    pub fn new(catalog: &Catalog, previews: PreviewRegistry) -> Self {
        Self {
            selection: Selection::new(catalog),
            step: Step::Upload,
            busy: false,
            error: None,
            result: None,
            previews,
        }
    }

    /// Current choices.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Current step.
    pub fn step(&self) -> Step {
        self.step
    }

    /// True while a generation is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Message from the last failure, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The last generated image, if any.
    pub fn result(&self) -> Option<&GeneratedImage> {
        self.result.as_ref()
    }

    /// True when the current step's gate lets the user move on.
    pub fn gate_passes(&self) -> bool {
        match self.step {
            Step::Upload => self.selection.image().is_some(),
            Step::Style | Step::Customize | Step::Text => true,
            Step::Result => false,
        }
    }

    /// Whether the "next"/"generate" control is enabled.
    pub fn can_advance(&self) -> bool {
        !self.busy && self.step < Step::Result && self.gate_passes() && self.has_image_for(self.step)
    }

    fn has_image_for(&self, step: Step) -> bool {
        !step.is_last_before_result() || self.selection.image().is_some()
    }

    /// Whether the "back" control is enabled.
    pub fn can_retreat(&self) -> bool {
        !self.busy && self.step > Step::Upload
    }

    /// Replaces the photo, dropping any previous result or error.
    pub fn set_image(&mut self, source: SourceImage) -> bool {
        if self.ignore_while_busy("set_image") {
            return false;
        }
        self.selection.set_image(source, &self.previews);
        self.result = None;
        self.error = None;
        true
    }

    /// Removes the photo and returns to the upload step.
    pub fn clear_image(&mut self) -> bool {
        if self.ignore_while_busy("clear_image") {
            return false;
        }
        self.selection.clear_image(&self.previews);
        self.result = None;
        self.error = None;
        self.step = Step::Upload;
        true
    }

    /// Selects a style.
    pub fn set_style(&mut self, id: &str) -> bool {
        if self.ignore_while_busy("set_style") {
            return false;
        }
        self.selection.set_style(id);
        true
    }

    /// Adds, moves or removes a decoration.
    pub fn toggle_decoration(&mut self, id: &str, position: DecorationPosition) -> Option<Toggle> {
        if self.ignore_while_busy("toggle_decoration") {
            return None;
        }
        Some(self.selection.toggle_decoration(id, position))
    }

    /// Selects a pose.
    pub fn set_pose(&mut self, id: &str) -> bool {
        if self.ignore_while_busy("set_pose") {
            return false;
        }
        self.selection.set_pose(id);
        true
    }

    /// Replaces the caption configuration.
    pub fn set_text(&mut self, content: &str, style_id: &str) -> bool {
        if self.ignore_while_busy("set_text") {
            return false;
        }
        self.selection.set_text(content, style_id);
        true
    }

    /// Back to the first step with every choice, the photo and the result cleared.
    pub fn reset(&mut self) -> bool {
        if self.ignore_while_busy("reset") {
            return false;
        }
        self.selection.reset(&self.previews);
        self.result = None;
        self.error = None;
        self.step = Step::Upload;
        true
    }

    /// Moves forward, or on the text step composes the prompt and starts a generation.
    pub fn advance(&mut self, catalog: &Catalog) -> Advance {
        if self.busy {
            return Advance::Blocked(Blocked::Busy);
        }
        if self.step == Step::Result {
            return Advance::Blocked(Blocked::AtResult);
        }
        if !self.gate_passes() {
            return Advance::Blocked(Blocked::NoImage);
        }
        if !self.step.is_last_before_result() {
            self.step = self.step.next();
            debug!("Wizard moved to {:?}", self.step);
            return Advance::Moved(self.step);
        }

        let Some(image) = self.selection.image() else {
            return Advance::Blocked(Blocked::NoImage);
        };
        self.error = None;
        match composer::compose(catalog, &image.source, &self.selection) {
            Ok(request) => {
                self.busy = true;
                Advance::Generate(request)
            }
            Err(err) => {
                warn!("Could not compose prompt: {}", err);
                self.error = Some(err.to_string());
                Advance::Aborted(err)
            }
        }
    }

    /// Records the outcome of the generation started by [`Wizard::advance`].
    pub fn finish_generation(&mut self, outcome: Result<GeneratedImage, GenerationError>) {
        if !self.busy {
            warn!("Ignoring a generation outcome with no generation in flight");
            return;
        }
        self.busy = false;
        match outcome {
            Ok(image) => {
                self.result = Some(image);
                self.error = None;
                self.step = Step::Result;
            }
            Err(err) => {
                self.error = Some(err.user_message());
            }
        }
    }

    /// Moves back one step. Never touches the choices.
    pub fn retreat(&mut self) -> Result<Step, Blocked> {
        if self.busy {
            return Err(Blocked::Busy);
        }
        if self.step == Step::Upload {
            return Err(Blocked::AtStart);
        }
        self.step = self.step.previous();
        debug!("Wizard moved back to {:?}", self.step);
        Ok(self.step)
    }

    fn ignore_while_busy(&self, action: &str) -> bool {
        if self.busy {
            debug!("Ignoring {} while a generation is in flight", action);
        }
        self.busy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::tests::sample_image;

    fn catalog() -> Catalog {
        Catalog::bundled().expect("bundled catalog")
    }

    fn photo() -> SourceImage {
        SourceImage::from_upload(sample_image(image::ImageFormat::Png), "p.png", 1024 * 1024)
            .expect("png")
    }

    fn result_image() -> GeneratedImage {
        GeneratedImage {
            mime_type: "image/png".to_string(),
            data: "aGVsbG8=".to_string(),
        }
    }

    fn wizard_at_text_step(catalog: &Catalog) -> Wizard {
        let mut wizard = Wizard::new(catalog, PreviewRegistry::new());
        wizard.set_image(photo());
        for _ in 0..3 {
            assert!(matches!(wizard.advance(catalog), Advance::Moved(_)));
        }
        assert_eq!(wizard.step(), Step::Text);
        wizard
    }

    #[test]
    fn upload_gate_needs_an_image() {
        let catalog = catalog();
        let mut wizard = Wizard::new(&catalog, PreviewRegistry::new());
        assert!(!wizard.can_advance());
        assert!(matches!(
            wizard.advance(&catalog),
            Advance::Blocked(Blocked::NoImage)
        ));
        assert_eq!(wizard.step(), Step::Upload);

        wizard.set_image(photo());
        assert!(wizard.can_advance());
        assert!(matches!(
            wizard.advance(&catalog),
            Advance::Moved(Step::Style)
        ));
        assert_eq!(wizard.step().index(), 1);
    }

    #[test]
    fn retreat_keeps_choices() {
        let catalog = catalog();
        let mut wizard = wizard_at_text_step(&catalog);
        wizard.set_style("FUNNY");
        wizard.toggle_decoration("tree", DecorationPosition::Left);
        let before = wizard.selection().clone();

        assert_eq!(wizard.retreat(), Ok(Step::Customize));
        assert_eq!(wizard.retreat(), Ok(Step::Style));
        assert_eq!(wizard.retreat(), Ok(Step::Upload));
        assert_eq!(wizard.retreat(), Err(Blocked::AtStart));
        assert_eq!(wizard.selection(), &before);
    }

    #[test]
    fn busy_blocks_navigation_and_edits() {
        let catalog = catalog();
        let mut wizard = wizard_at_text_step(&catalog);
        assert!(matches!(wizard.advance(&catalog), Advance::Generate(_)));
        assert!(wizard.is_busy());

        assert!(matches!(
            wizard.advance(&catalog),
            Advance::Blocked(Blocked::Busy)
        ));
        assert_eq!(wizard.retreat(), Err(Blocked::Busy));
        assert!(!wizard.set_style("ELVES"));
        assert!(!wizard.clear_image());
        assert!(!wizard.reset());
        assert!(!wizard.can_advance());
        assert!(!wizard.can_retreat());
        assert_eq!(wizard.step(), Step::Text);
        assert_eq!(wizard.selection().style_id(), "CLASSIC");
    }

    #[test]
    fn success_moves_to_result() {
        let catalog = catalog();
        let mut wizard = wizard_at_text_step(&catalog);
        assert!(matches!(wizard.advance(&catalog), Advance::Generate(_)));
        wizard.finish_generation(Ok(result_image()));

        assert!(!wizard.is_busy());
        assert_eq!(wizard.step(), Step::Result);
        assert_eq!(wizard.result(), Some(&result_image()));
        assert!(wizard.error().is_none());
        assert!(matches!(
            wizard.advance(&catalog),
            Advance::Blocked(Blocked::AtResult)
        ));
    }

    #[test]
    fn failure_stays_on_text_step() {
        let catalog = catalog();
        let mut wizard = wizard_at_text_step(&catalog);
        wizard.set_pose("toasting");
        let before = wizard.selection().clone();
        assert!(matches!(wizard.advance(&catalog), Advance::Generate(_)));
        wizard.finish_generation(Err(GenerationError::NoContent));

        assert!(!wizard.is_busy());
        assert_eq!(wizard.step(), Step::Text);
        assert_eq!(wizard.error(), Some("No content generated."));
        assert_eq!(wizard.selection(), &before);

        // retrying clears the old error
        assert!(matches!(wizard.advance(&catalog), Advance::Generate(_)));
        assert!(wizard.error().is_none());
    }

    #[test]
    fn unknown_style_aborts_generation() {
        let catalog = catalog();
        let mut wizard = wizard_at_text_step(&catalog);
        wizard.set_style("TROPICAL");
        assert!(matches!(wizard.advance(&catalog), Advance::Aborted(_)));
        assert!(!wizard.is_busy());
        assert_eq!(wizard.step(), Step::Text);
        assert_eq!(wizard.error(), Some("Style not found: TROPICAL"));
    }

    #[test]
    fn clear_image_returns_to_upload() {
        let catalog = catalog();
        let previews = PreviewRegistry::new();
        let mut wizard = Wizard::new(&catalog, previews.clone());
        wizard.set_image(photo());
        wizard.advance(&catalog);
        wizard.advance(&catalog);
        assert!(wizard.clear_image());
        assert_eq!(wizard.step(), Step::Upload);
        assert!(wizard.selection().image().is_none());
        assert!(previews.is_empty());
    }

    #[test]
    fn reset_clears_everything() {
        let catalog = catalog();
        let previews = PreviewRegistry::new();
        let mut wizard = Wizard::new(&catalog, previews.clone());
        wizard.set_image(photo());
        for _ in 0..3 {
            wizard.advance(&catalog);
        }
        wizard.set_style("SNOWY");
        wizard.toggle_decoration("lights", DecorationPosition::Background);
        wizard.set_pose("opening");
        wizard.set_text("Hola", "neon");
        assert!(matches!(wizard.advance(&catalog), Advance::Generate(_)));
        wizard.finish_generation(Ok(result_image()));

        assert!(wizard.reset());
        assert_eq!(wizard.step(), Step::Upload);
        assert_eq!(wizard.selection(), &Selection::new(&catalog));
        assert!(wizard.result().is_none());
        assert!(wizard.error().is_none());
        assert!(previews.is_empty());
    }

    #[test]
    fn stray_outcome_is_ignored() {
        let catalog = catalog();
        let mut wizard = Wizard::new(&catalog, PreviewRegistry::new());
        wizard.finish_generation(Ok(result_image()));
        assert_eq!(wizard.step(), Step::Upload);
        assert!(wizard.result().is_none());
    }
}
