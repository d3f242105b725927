//! Short-lived handles that let the browser display the uploaded photo.
//!
//! Every handle is created by [`PreviewRegistry::acquire`] and must be given back with
//! [`PreviewRegistry::release`] when the photo it shows is replaced or cleared.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use rand::distr::{Alphanumeric, Distribution};
use tracing::debug;

use crate::constants::TOKEN_LENGTH;
use crate::photo::SourceImage;

/// A live preview of one uploaded photo.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PreviewHandle {
    token: String,
}

impl PreviewHandle {
    /// Token identifying the preview.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Where the page fetches the preview from.
    pub fn url(&self) -> String {
        format!("/preview/{}", self.token)
    }
}

/// Bytes served for a preview.
#[derive(Clone, Debug)]
pub struct PreviewImage {
    /// eg `image/png`
    pub mime_type: &'static str,
    /// The photo as uploaded
    pub bytes: Arc<Vec<u8>>,
}

/// Shared store of live previews.
#[derive(Clone, Debug, Default)]
pub struct PreviewRegistry {
    entries: Arc<RwLock<HashMap<String, PreviewImage>>>,
}

/// Random alphanumeric token, also used for session keys.
pub(crate) fn generate_token() -> String {
    Alphanumeric
        .sample_iter(rand::rng())
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

impl PreviewRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a preview for the photo.
    pub fn acquire(&self, image: &SourceImage) -> PreviewHandle {
        let token = generate_token();
        let entry = PreviewImage {
            mime_type: image.mime_type(),
            bytes: Arc::new(image.bytes().to_vec()),
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.clone(), entry);
        debug!("Acquired preview {}", token);
        PreviewHandle { token }
    }

    /// Drops a preview. Releasing twice is harmless.
    pub fn release(&self, handle: &PreviewHandle) {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.token);
        if removed.is_some() {
            debug!("Released preview {}", handle.token);
        }
    }

    /// Looks up a live preview.
    pub fn get(&self, token: &str) -> Option<PreviewImage> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
    }

    /// Number of live previews.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True when no preview is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::tests::sample_image;

    #[test]
    fn acquire_and_release_pair_up() {
        let registry = PreviewRegistry::new();
        let image = SourceImage::from_upload(
            sample_image(image::ImageFormat::Png),
            "a.png",
            1024 * 1024,
        )
        .expect("png");

        let first = registry.acquire(&image);
        let second = registry.acquire(&image);
        assert_ne!(first, second);
        assert_eq!(registry.len(), 2);
        assert_eq!(first.url(), format!("/preview/{}", first.token()));

        let served = registry.get(first.token()).expect("live preview");
        assert_eq!(served.mime_type, "image/png");
        assert_eq!(served.bytes.as_slice(), image.bytes());

        registry.release(&first);
        registry.release(&first);
        assert!(registry.get(first.token()).is_none());
        assert_eq!(registry.len(), 1);
        registry.release(&second);
        assert!(registry.is_empty());
    }
}
