//! The built-in catalog of styles, decorations, poses and text styles, loaded from a bundled
//! JSON file.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Identifier of the pose that keeps the people exactly as photographed.
pub const ORIGINAL_POSE_ID: &str = "original";

/// Where a decoration sits in the scene.
///
/// The [`Display`](fmt::Display) form is the phrase injected into the prompt, and must read
/// correctly after "positioned".
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecorationPosition {
    /// On the left side of the scene
    Left,
    /// On the right side of the scene
    Right,
    /// Behind the people
    Background,
    /// In front of the people
    Foreground,
}

impl DecorationPosition {
    /// Every position, in the order the picker shows them.
    pub const ALL: [DecorationPosition; 4] = [
        DecorationPosition::Left,
        DecorationPosition::Right,
        DecorationPosition::Background,
        DecorationPosition::Foreground,
    ];

    /// The prompt phrase for this position.
    pub fn phrase(self) -> &'static str {
        match self {
            Self::Left => "on the left side",
            Self::Right => "on the right side",
            Self::Background => "in the background",
            Self::Foreground => "in the foreground",
        }
    }

    /// Short key used in forms and the catalog file.
    pub fn key(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Background => "background",
            Self::Foreground => "foreground",
        }
    }

    /// Label shown next to the position picker.
    pub fn label(self) -> &'static str {
        match self {
            Self::Left => "Izquierda",
            Self::Right => "Derecha",
            Self::Background => "Fondo",
            Self::Foreground => "Primer Plano",
        }
    }
}

impl fmt::Display for DecorationPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.phrase())
    }
}

impl FromStr for DecorationPosition {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|position| position.key() == value || position.phrase() == value)
            .ok_or_else(|| CatalogError::NotFound {
                kind: CatalogKind::Position,
                id: s.to_string(),
            })
    }
}

/// A visual setting for the whole scene.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct StyleOption {
    /// Identifier, eg `CLASSIC`
    pub id: String,
    /// Display title
    pub title: String,
    /// Display description
    pub description: String,
    /// Prompt fragment describing the setting
    pub prompt: String,
    /// Icon key for the page
    pub icon: String,
}

/// Something that can be added to the scene.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct Decoration {
    /// Identifier, eg `gifts`
    pub id: String,
    /// Display label, also used in the prompt
    pub label: String,
    /// Icon key for the page
    pub icon: String,
    /// Placement offered when the decoration is first added
    pub default_position: DecorationPosition,
}

/// How the people should be posed.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct PoseOption {
    /// Identifier, eg `toasting`
    pub id: String,
    /// Display label
    pub label: String,
    /// Prompt fragment describing the pose
    pub prompt: String,
}

impl PoseOption {
    /// True for the pose that keeps the original photo's positions.
    pub fn is_original(&self) -> bool {
        self.id == ORIGINAL_POSE_ID
    }
}

/// How an overlay caption is rendered.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct TextStyleOption {
    /// Identifier, eg `neon`
    pub id: String,
    /// Display label
    pub label: String,
    /// Prompt fragment describing the lettering
    pub prompt: String,
    /// CSS class for the page preview only
    pub preview_class: String,
}

/// Which list a lookup was made against.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CatalogKind {
    /// [`StyleOption`]
    Style,
    /// [`Decoration`]
    Decoration,
    /// [`DecorationPosition`]
    Position,
    /// [`PoseOption`]
    Pose,
    /// [`TextStyleOption`]
    TextStyle,
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Style => "Style",
            Self::Decoration => "Decoration",
            Self::Position => "Position",
            Self::Pose => "Pose",
            Self::TextStyle => "Text style",
        };
        f.write_str(name)
    }
}

/// Errors from loading or querying the catalog.
#[derive(Debug)]
pub enum CatalogError {
    /// No entry with that identifier exists.
    NotFound {
        /// The list searched
        kind: CatalogKind,
        /// The identifier that failed to resolve
        id: String,
    },
    /// The JSON payload could not be parsed.
    Parse(serde_json::Error),
    /// The catalog parsed but breaks an invariant (duplicate or missing entries).
    Invalid(String),
    /// The catalog has not been initialized.
    NotInitialized,
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Parse(err) => write!(f, "Failed to parse catalog JSON: {err}"),
            Self::Invalid(reason) => write!(f, "Invalid catalog: {reason}"),
            Self::NotInitialized => write!(f, "Catalog has not been initialized"),
        }
    }
}

impl std::error::Error for CatalogError {}

/// The four fixed option lists.
#[derive(Clone, Debug, Deserialize)]
pub struct Catalog {
    styles: Vec<StyleOption>,
    decorations: Vec<Decoration>,
    poses: Vec<PoseOption>,
    text_styles: Vec<TextStyleOption>,
}

impl Catalog {
    /// Parses and checks a catalog document.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_str(raw).map_err(CatalogError::Parse)?;
        catalog.check()?;
        Ok(catalog)
    }

    /// The catalog shipped with the crate.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_json(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data/catalog.json"
        )))
    }

    fn check(&self) -> Result<(), CatalogError> {
        unique_ids("style", self.styles.iter().map(|s| s.id.as_str()))?;
        unique_ids("decoration", self.decorations.iter().map(|d| d.id.as_str()))?;
        unique_ids("pose", self.poses.iter().map(|p| p.id.as_str()))?;
        unique_ids("text style", self.text_styles.iter().map(|t| t.id.as_str()))?;
        // the first pose doubles as the fallback for stale ids
        if !self.poses.first().is_some_and(PoseOption::is_original) {
            return Err(CatalogError::Invalid(format!(
                "pose list must start with '{ORIGINAL_POSE_ID}'"
            )));
        }
        Ok(())
    }

    /// All styles, in display order.
    pub fn styles(&self) -> &[StyleOption] {
        &self.styles
    }

    /// All decorations, in display order.
    pub fn decorations(&self) -> &[Decoration] {
        &self.decorations
    }

    /// All poses, in display order.
    pub fn poses(&self) -> &[PoseOption] {
        &self.poses
    }

    /// All text styles, in display order.
    pub fn text_styles(&self) -> &[TextStyleOption] {
        &self.text_styles
    }

    /// Looks up a style by identifier.
    pub fn style(&self, id: &str) -> Result<&StyleOption, CatalogError> {
        find(&self.styles, CatalogKind::Style, id, |s| &s.id)
    }

    /// Looks up a decoration by identifier.
    pub fn decoration(&self, id: &str) -> Result<&Decoration, CatalogError> {
        find(&self.decorations, CatalogKind::Decoration, id, |d| &d.id)
    }

    /// Looks up a pose by identifier.
    pub fn pose(&self, id: &str) -> Result<&PoseOption, CatalogError> {
        find(&self.poses, CatalogKind::Pose, id, |p| &p.id)
    }

    /// Looks up a text style by identifier.
    pub fn text_style(&self, id: &str) -> Result<&TextStyleOption, CatalogError> {
        find(&self.text_styles, CatalogKind::TextStyle, id, |t| &t.id)
    }

    /// Looks up a pose, falling back to the first pose when the identifier is stale.
    pub fn pose_or_default(&self, id: &str) -> &PoseOption {
        match self.pose(id) {
            Ok(pose) => pose,
            Err(err) => {
                tracing::warn!("{err}, using the default pose");
                self.default_pose()
            }
        }
    }

    /// The style selected when a session starts.
    pub fn default_style(&self) -> &StyleOption {
        // check() and the non-empty JSON lists guarantee an entry
        &self.styles[0]
    }

    /// The pose selected when a session starts, always the `original` pose.
    pub fn default_pose(&self) -> &PoseOption {
        &self.poses[0]
    }

    /// The text style selected when a session starts.
    pub fn default_text_style(&self) -> &TextStyleOption {
        &self.text_styles[0]
    }
}

fn find<'a, T>(
    items: &'a [T],
    kind: CatalogKind,
    id: &str,
    key: impl Fn(&T) -> &String,
) -> Result<&'a T, CatalogError> {
    items
        .iter()
        .find(|item| key(item) == id)
        .ok_or_else(|| CatalogError::NotFound {
            kind,
            id: id.to_string(),
        })
}

fn unique_ids<'a>(what: &str, ids: impl Iterator<Item = &'a str>) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    let mut count = 0;
    for id in ids {
        count += 1;
        if !seen.insert(id) {
            return Err(CatalogError::Invalid(format!("duplicate {what} id '{id}'")));
        }
    }
    if count == 0 {
        return Err(CatalogError::Invalid(format!("no {what} entries")));
    }
    Ok(())
}

static CATALOG: OnceLock<Catalog> = OnceLock::new();

/// Parse the bundled catalog; called during startup.
pub fn init() -> Result<(), CatalogError> {
    if CATALOG.get().is_some() {
        return Ok(());
    }
    let parsed = Catalog::bundled()?;
    let _ = CATALOG.set(parsed);
    Ok(())
}

/// Returns the process-wide catalog.
pub fn catalog() -> Result<&'static Catalog, CatalogError> {
    CATALOG.get().ok_or(CatalogError::NotInitialized)
}
