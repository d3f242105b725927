//! Shared constants/setters for things
//!

/// Longest caption accepted on the text step, in characters.
pub const MAX_CAPTION_CHARS: usize = 30;

/// Mime types accepted on the upload step.
pub const ALLOWED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Default upload limit, in megabytes.
pub const DEFAULT_MAX_UPLOAD_MB: usize = 4;

/// Prefix of the downloaded result's file name.
pub const DOWNLOAD_PREFIX: &str = "hoho-studio";

/// Default image-editing model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

/// Default Generative Language API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Sessions (and their wizards) are dropped after this many seconds without a request.
pub const SESSION_IDLE_SECONDS: i64 = 60 * 60 * 2;

/// Length of preview tokens and CSRF tokens
pub const TOKEN_LENGTH: usize = 32;

/// Message shown when the generator fails without a usable reason.
pub const GENERIC_GENERATION_ERROR: &str =
    "Ocurrió un error al generar la imagen. Por favor intenta de nuevo.";
