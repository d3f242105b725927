//! Form posts. Every handler checks the CSRF token, applies one wizard operation and
//! redirects back to the page.

use std::str::FromStr;

use axum::extract::Multipart;

use super::prelude::*;
use crate::catalog::DecorationPosition;
use crate::generation::Outcome;
use crate::photo::{SourceImage, UploadError};
use crate::selection::truncate_caption;
use crate::wizard::Blocked;

#[derive(Deserialize)]
pub(crate) struct CsrfForm {
    csrf_token: String,
}

#[derive(Deserialize)]
pub(crate) struct StyleForm {
    csrf_token: String,
    style: String,
}

#[derive(Deserialize)]
pub(crate) struct DecorationForm {
    csrf_token: String,
    decoration: String,
    position: String,
}

#[derive(Deserialize)]
pub(crate) struct PoseForm {
    csrf_token: String,
    pose: String,
}

#[derive(Deserialize)]
pub(crate) struct TextForm {
    csrf_token: String,
    #[serde(default)]
    content: String,
    text_style: String,
}

/// The text step submits its fields along with "generate".
#[derive(Deserialize)]
pub(crate) struct NextForm {
    csrf_token: String,
    content: Option<String>,
    text_style: Option<String>,
}

fn back_to_wizard() -> Redirect {
    Redirect::to("/")
}

/// Flags the busy notice when a wizard ignored an edit.
async fn note_ignored(session: &Session, applied: bool) -> Result<(), StudioError> {
    if !applied {
        flash::set_flash(session, flash::FLASH_BUSY).await?;
    }
    Ok(())
}

#[instrument(level = "debug", skip_all)]
pub(crate) async fn upload_handler(
    State(state): State<AppState>,
    session: Session,
    mut multipart: Multipart,
) -> Result<Redirect, StudioError> {
    let mut csrf_token_value: Option<String> = None;
    let mut upload: Option<(Vec<u8>, String)> = None;
    let mut too_large = false;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) if err.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                too_large = true;
                break;
            }
            Err(err) => {
                warn!("Malformed upload: {}", err);
                return Err(StudioError::BadRequest);
            }
        };
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "csrf_token" => {
                let value = field.text().await.map_err(|_| StudioError::BadRequest)?;
                csrf_token_value = Some(value);
            }
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => upload = Some((bytes.to_vec(), file_name)),
                    Err(err) if err.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                        too_large = true;
                        break;
                    }
                    Err(err) => {
                        warn!("Failed to read upload: {}", err);
                        return Err(StudioError::BadRequest);
                    }
                }
            }
            _ => {}
        }
    }

    let csrf_token_value = csrf_token_value.ok_or(StudioError::Unauthorized)?;
    validate_csrf(&session, &csrf_token_value).await?;

    let source = if too_large {
        Err(UploadError::TooLarge {
            max_bytes: state.max_upload_bytes,
        })
    } else {
        let (bytes, file_name) = upload.unwrap_or_default();
        SourceImage::from_upload(bytes, &file_name, state.max_upload_bytes)
    };
    let source = match source {
        Ok(source) => source,
        Err(err) => {
            info!("Rejected upload: {}", err);
            flash::set_flash(&session, flash::upload_flag(&err)).await?;
            return Ok(back_to_wizard());
        }
    };

    info!(
        "Accepted upload {} ({}, {} bytes)",
        source.file_name(),
        source.mime_type(),
        source.bytes().len()
    );
    let wizard = state.wizard(&session).await?;
    let applied = wizard.lock().await.set_image(source);
    note_ignored(&session, applied).await?;
    Ok(back_to_wizard())
}

pub(crate) async fn clear_image_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, StudioError> {
    validate_csrf(&session, &form.csrf_token).await?;
    let wizard = state.wizard(&session).await?;
    let applied = wizard.lock().await.clear_image();
    note_ignored(&session, applied).await?;
    Ok(back_to_wizard())
}

pub(crate) async fn style_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<StyleForm>,
) -> Result<Redirect, StudioError> {
    validate_csrf(&session, &form.csrf_token).await?;
    let wizard = state.wizard(&session).await?;
    let applied = wizard.lock().await.set_style(&form.style);
    note_ignored(&session, applied).await?;
    Ok(back_to_wizard())
}

#[instrument(level = "debug", skip_all, fields(decoration = %form.decoration, position = %form.position))]
pub(crate) async fn decoration_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<DecorationForm>,
) -> Result<Redirect, StudioError> {
    validate_csrf(&session, &form.csrf_token).await?;
    let position =
        DecorationPosition::from_str(&form.position).map_err(|_| StudioError::BadRequest)?;
    let wizard = state.wizard(&session).await?;
    let toggled = wizard
        .lock()
        .await
        .toggle_decoration(&form.decoration, position);
    debug!("Decoration toggle: {:?}", toggled);
    note_ignored(&session, toggled.is_some()).await?;
    Ok(back_to_wizard())
}

pub(crate) async fn pose_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<PoseForm>,
) -> Result<Redirect, StudioError> {
    validate_csrf(&session, &form.csrf_token).await?;
    let wizard = state.wizard(&session).await?;
    let applied = wizard.lock().await.set_pose(&form.pose);
    note_ignored(&session, applied).await?;
    Ok(back_to_wizard())
}

pub(crate) async fn text_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<TextForm>,
) -> Result<Redirect, StudioError> {
    validate_csrf(&session, &form.csrf_token).await?;
    let content = truncate_caption(&form.content);
    let wizard = state.wizard(&session).await?;
    let applied = wizard.lock().await.set_text(&content, &form.text_style);
    note_ignored(&session, applied).await?;
    Ok(back_to_wizard())
}

/// Moves forward; on the text step this waits for the generated card.
#[instrument(level = "debug", skip_all)]
pub(crate) async fn next_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<NextForm>,
) -> Result<Redirect, StudioError> {
    validate_csrf(&session, &form.csrf_token).await?;
    let wizard = state.wizard(&session).await?;

    if let (Some(content), Some(text_style)) = (&form.content, &form.text_style) {
        let mut locked = wizard.lock().await;
        if locked.step().is_last_before_result() {
            locked.set_text(&truncate_caption(content), text_style);
        }
    }

    match state.orchestrator.advance_shared(&wizard, state.catalog).await {
        Outcome::Moved(step) => debug!("Moved to {:?}", step),
        Outcome::Generated => info!("Card generated"),
        Outcome::Failed(err) => info!("Generation failed: {}", err),
        Outcome::Aborted(err) => warn!("Generation aborted: {}", err),
        Outcome::Blocked(reason) => {
            debug!("Next ignored: {}", reason);
            if reason == Blocked::Busy {
                flash::set_flash(&session, flash::FLASH_BUSY).await?;
            }
        }
    }
    Ok(back_to_wizard())
}

pub(crate) async fn back_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, StudioError> {
    validate_csrf(&session, &form.csrf_token).await?;
    let wizard = state.wizard(&session).await?;
    let retreated = wizard.lock().await.retreat();
    match retreated {
        Ok(step) => debug!("Moved back to {:?}", step),
        Err(Blocked::Busy) => flash::set_flash(&session, flash::FLASH_BUSY).await?,
        Err(reason) => debug!("Back ignored: {}", reason),
    }
    Ok(back_to_wizard())
}

pub(crate) async fn reset_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, StudioError> {
    validate_csrf(&session, &form.csrf_token).await?;
    let wizard = state.wizard(&session).await?;
    let applied = wizard.lock().await.reset();
    note_ignored(&session, applied).await?;
    Ok(back_to_wizard())
}
