use tower_sessions::Session;

use crate::error::StudioError;
use crate::photo::UploadError;

const FLASH_FLAG_KEY: &str = "flash_flag";

pub(crate) const FLASH_UPLOAD_EMPTY: u16 = 1;
pub(crate) const FLASH_UPLOAD_TYPE: u16 = 2;
pub(crate) const FLASH_UPLOAD_SIZE: u16 = 3;
pub(crate) const FLASH_UPLOAD_UNREADABLE: u16 = 4;
pub(crate) const FLASH_BUSY: u16 = 5;

#[derive(Clone, Debug)]
pub(crate) struct FlashMessage {
    pub(crate) text: String,
    pub(crate) class: &'static str,
}

/// The flag reported for a rejected upload.
pub(crate) fn upload_flag(err: &UploadError) -> u16 {
    match err {
        UploadError::Empty => FLASH_UPLOAD_EMPTY,
        UploadError::UnsupportedType => FLASH_UPLOAD_TYPE,
        UploadError::TooLarge { .. } => FLASH_UPLOAD_SIZE,
        UploadError::Unreadable => FLASH_UPLOAD_UNREADABLE,
    }
}

pub(crate) async fn set_flash(session: &Session, flag: u16) -> Result<(), StudioError> {
    session.insert(FLASH_FLAG_KEY, flag).await?;
    Ok(())
}

/// Pops the pending flash, if any. `max_upload_bytes` fills in the size message.
pub(crate) async fn take_flash_message(
    session: &Session,
    max_upload_bytes: usize,
) -> Result<Option<FlashMessage>, StudioError> {
    let flag = session
        .get::<u16>(FLASH_FLAG_KEY)
        .await?
        .filter(|flag| *flag != 0);
    if flag.is_some() {
        session.insert(FLASH_FLAG_KEY, 0u16).await?;
    }
    Ok(flag.and_then(|flag| message_for(flag, max_upload_bytes)))
}

fn message_for(flag: u16, max_upload_bytes: usize) -> Option<FlashMessage> {
    let upload_error = match flag {
        FLASH_UPLOAD_EMPTY => UploadError::Empty,
        FLASH_UPLOAD_TYPE => UploadError::UnsupportedType,
        FLASH_UPLOAD_SIZE => UploadError::TooLarge {
            max_bytes: max_upload_bytes,
        },
        FLASH_UPLOAD_UNREADABLE => UploadError::Unreadable,
        FLASH_BUSY => {
            return Some(FlashMessage {
                text: "Estamos creando tu tarjeta, espera un momento.".to_string(),
                class: "info",
            });
        }
        _ => return None,
    };
    Some(FlashMessage {
        text: upload_error.to_string(),
        class: "warning",
    })
}
