use super::prelude::*;
use crate::catalog::{Catalog, DecorationPosition};
use crate::constants::MAX_CAPTION_CHARS;
use crate::generation::GeneratedImage;
use crate::wizard::{PRE_RESULT_STEPS, Step, Wizard};

#[derive(Clone, Debug)]
pub(crate) struct StepView {
    number: usize,
    title: &'static str,
    is_current: bool,
    is_done: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct StyleCard {
    id: String,
    title: String,
    description: String,
    icon: String,
    selected: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct PositionButton {
    key: &'static str,
    label: &'static str,
    active: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct DecorationRow {
    id: String,
    label: String,
    icon: String,
    selected: bool,
    default_key: &'static str,
    positions: Vec<PositionButton>,
}

#[derive(Clone, Debug)]
pub(crate) struct OptionCard {
    id: String,
    label: String,
    css_class: String,
    selected: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "wizard.html")]
pub(crate) struct WizardTemplate {
    csrf_token: String,
    has_flash: bool,
    flash_message: String,
    flash_class: String,

    steps: Vec<StepView>,
    step_title: &'static str,
    step_number: usize,
    total_steps: usize,
    on_upload: bool,
    on_style: bool,
    on_customize: bool,
    on_text: bool,
    on_result: bool,

    has_image: bool,
    preview_url: String,
    file_name: String,
    max_upload_mb: usize,

    styles: Vec<StyleCard>,
    decorations: Vec<DecorationRow>,
    poses: Vec<OptionCard>,
    text_styles: Vec<OptionCard>,
    caption: String,
    caption_max: usize,
    result_src: String,

    busy: bool,
    has_error: bool,
    error_message: String,
    can_advance: bool,
    can_retreat: bool,
    generates_next: bool,
}

fn step_views(current: Step) -> Vec<StepView> {
    Step::ALL
        .iter()
        .take(PRE_RESULT_STEPS)
        .map(|step| StepView {
            number: step.index() + 1,
            title: step.title(),
            is_current: *step == current,
            is_done: *step < current,
        })
        .collect()
}

fn style_cards(catalog: &Catalog, wizard: &Wizard) -> Vec<StyleCard> {
    let selected = wizard.selection().style_id();
    catalog
        .styles()
        .iter()
        .map(|style| StyleCard {
            id: style.id.clone(),
            title: style.title.clone(),
            description: style.description.clone(),
            icon: style.icon.clone(),
            selected: style.id == selected,
        })
        .collect()
}

fn decoration_rows(catalog: &Catalog, wizard: &Wizard) -> Vec<DecorationRow> {
    catalog
        .decorations()
        .iter()
        .map(|decoration| {
            let current = wizard.selection().decoration_position(&decoration.id);
            DecorationRow {
                id: decoration.id.clone(),
                label: decoration.label.clone(),
                icon: decoration.icon.clone(),
                selected: current.is_some(),
                default_key: current.unwrap_or(decoration.default_position).key(),
                positions: DecorationPosition::ALL
                    .iter()
                    .map(|position| PositionButton {
                        key: position.key(),
                        label: position.label(),
                        active: current == Some(*position),
                    })
                    .collect(),
            }
        })
        .collect()
}

fn pose_cards(catalog: &Catalog, wizard: &Wizard) -> Vec<OptionCard> {
    let selected = wizard.selection().pose_id();
    catalog
        .poses()
        .iter()
        .map(|pose| OptionCard {
            id: pose.id.clone(),
            label: pose.label.clone(),
            css_class: String::new(),
            selected: pose.id == selected,
        })
        .collect()
}

fn text_style_cards(catalog: &Catalog, wizard: &Wizard) -> Vec<OptionCard> {
    let selected = &wizard.selection().text().style_id;
    catalog
        .text_styles()
        .iter()
        .map(|style| OptionCard {
            id: style.id.clone(),
            label: style.label.clone(),
            css_class: style.preview_class.clone(),
            selected: &style.id == selected,
        })
        .collect()
}

/// handles the / GET
#[instrument(level = "debug", skip_all)]
pub(crate) async fn root_handler(
    State(state): State<AppState>,
    session: Session,
) -> Result<WizardTemplate, StudioError> {
    let csrf_token = csrf_token(&session).await?;
    let flash = flash::take_flash_message(&session, state.max_upload_bytes).await?;
    let (has_flash, flash_message, flash_class) = match flash {
        Some(message) => (true, message.text, message.class.to_string()),
        None => (false, String::new(), String::new()),
    };

    let wizard = state.wizard(&session).await?;
    let wizard = wizard.lock().await;
    let catalog = state.catalog;
    let step = wizard.step();
    let image = wizard.selection().image();

    Ok(WizardTemplate {
        csrf_token,
        has_flash,
        flash_message,
        flash_class,

        steps: step_views(step),
        step_title: step.title(),
        step_number: (step.index() + 1).min(PRE_RESULT_STEPS),
        total_steps: PRE_RESULT_STEPS,
        on_upload: step == Step::Upload,
        on_style: step == Step::Style,
        on_customize: step == Step::Customize,
        on_text: step == Step::Text,
        on_result: step == Step::Result,

        has_image: image.is_some(),
        preview_url: image.map(|image| image.preview.url()).unwrap_or_default(),
        file_name: image
            .map(|image| image.source.file_name().to_string())
            .unwrap_or_default(),
        max_upload_mb: state.max_upload_bytes / (1024 * 1024),

        styles: style_cards(catalog, &wizard),
        decorations: decoration_rows(catalog, &wizard),
        poses: pose_cards(catalog, &wizard),
        text_styles: text_style_cards(catalog, &wizard),
        caption: wizard.selection().text().content.clone(),
        caption_max: MAX_CAPTION_CHARS,
        result_src: wizard
            .result()
            .map(GeneratedImage::data_url)
            .unwrap_or_default(),

        busy: wizard.is_busy(),
        has_error: wizard.error().is_some(),
        error_message: wizard.error().unwrap_or_default().to_string(),
        can_advance: wizard.can_advance(),
        can_retreat: wizard.can_retreat(),
        generates_next: step.is_last_before_result(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::PreviewRegistry;

    #[test]
    fn progress_marks_done_and_current() {
        let views = step_views(Step::Customize);
        assert_eq!(views.len(), PRE_RESULT_STEPS);
        assert!(views[0].is_done && views[1].is_done);
        assert!(views[2].is_current && !views[2].is_done);
        assert!(!views[3].is_current && !views[3].is_done);

        let at_result = step_views(Step::Result);
        assert!(at_result.iter().all(|view| view.is_done));
    }

    #[test]
    fn decoration_rows_reflect_the_selection() {
        let catalog = Catalog::bundled().expect("catalog");
        let mut wizard = Wizard::new(&catalog, PreviewRegistry::new());
        wizard.toggle_decoration("gifts", DecorationPosition::Foreground);

        let rows = decoration_rows(&catalog, &wizard);
        let gifts = rows.iter().find(|row| row.id == "gifts").expect("gifts row");
        assert!(gifts.selected);
        let active: Vec<&str> = gifts
            .positions
            .iter()
            .filter(|button| button.active)
            .map(|button| button.key)
            .collect();
        assert_eq!(active, vec!["foreground"]);
        assert!(rows.iter().filter(|row| row.id != "gifts").all(|row| !row.selected));
    }
}
