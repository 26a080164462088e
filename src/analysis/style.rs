// SPDX-License-Identifier: GPL-3.0-only

//! Style reference set
//!
//! Up to five user supplied images that bias analysis toward a target look.
//! Kept for the session only, in upload order.

use super::request::StyleProfile;
use crate::constants::MAX_STYLE_IMAGES;
use crate::errors::SourceError;
use crate::pipelines::photo::CaptureFrame;
use base64::Engine;
use base64::engine::general_purpose;
use uuid::Uuid;

/// One reference image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleReference {
    pub id: Uuid,
    /// Display name, usually the file name
    pub name: String,
    pub image: CaptureFrame,
}

/// Bounded, ordered collection of reference images
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleReferenceSet {
    items: Vec<StyleReference>,
}

impl StyleReferenceSet {
    /// Append an image, failing when the set is full
    pub fn add(&mut self, name: &str, image: CaptureFrame) -> Result<Uuid, SourceError> {
        if self.is_full() {
            return Err(SourceError::StyleSetFull(MAX_STYLE_IMAGES));
        }
        let id = Uuid::new_v4();
        self.items.push(StyleReference {
            id,
            name: name.to_string(),
            image,
        });
        Ok(id)
    }

    /// Remove an image by id
    pub fn remove(&mut self, id: Uuid) -> Option<StyleReference> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index))
    }

    /// Remove an image by position
    pub fn remove_at(&mut self, index: usize) -> Option<StyleReference> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= MAX_STYLE_IMAGES
    }

    pub fn iter(&self) -> impl Iterator<Item = &StyleReference> {
        self.items.iter()
    }

    /// Wire profile, `None` when the set is empty
    pub fn to_profile(&self) -> Option<StyleProfile> {
        if self.items.is_empty() {
            return None;
        }
        Some(StyleProfile {
            images: self
                .items
                .iter()
                .map(|item| general_purpose::STANDARD.encode(item.image.bytes()))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(tag: u8) -> CaptureFrame {
        CaptureFrame::new(vec![tag], "image/jpeg", 1, 1)
    }

    #[test]
    fn test_bounded_at_five() {
        let mut set = StyleReferenceSet::default();
        for i in 0..MAX_STYLE_IMAGES {
            assert!(set.add(&format!("{}.jpg", i), image(i as u8)).is_ok());
        }
        assert!(set.is_full());
        assert_eq!(
            set.add("extra.jpg", image(9)),
            Err(SourceError::StyleSetFull(MAX_STYLE_IMAGES))
        );
        assert_eq!(set.len(), MAX_STYLE_IMAGES);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut set = StyleReferenceSet::default();
        let first = set.add("a.jpg", image(1));
        let _ = set.add("b.jpg", image(2));
        let _ = set.add("c.jpg", image(3));

        let removed = first.ok().and_then(|id| set.remove(id));
        assert_eq!(removed.map(|r| r.name), Some("a.jpg".to_string()));

        let names: Vec<_> = set.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["b.jpg", "c.jpg"]);
        assert!(set.remove_at(5).is_none());
    }

    #[test]
    fn test_profile_order() {
        let mut set = StyleReferenceSet::default();
        assert!(set.to_profile().is_none());
        let _ = set.add("a.jpg", image(1));
        let _ = set.add("b.jpg", image(2));

        let profile = set.to_profile().map(|p| p.images);
        assert_eq!(profile, Some(vec!["AQ==".to_string(), "Ag==".to_string()]));
    }
}
