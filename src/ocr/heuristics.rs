//! Face heuristic
//!
//! Neither engine detects faces. The gateway approximates "this document
//! photo contains a face" by looking for tell-tale words in the extracted
//! text (ID cards usually print "PHOTO" next to the portrait). Callers must
//! treat the result as a hint, not a detection.

use crate::config::DEFAULT_FACE_KEYWORDS;

use super::types::FaceIndicator;

/// Keyword matcher producing a [`FaceIndicator`]
#[derive(Debug, Clone)]
pub struct FaceHeuristic {
    keywords: Vec<String>,
}

impl Default for FaceHeuristic {
    fn default() -> Self {
        Self::new(DEFAULT_FACE_KEYWORDS.iter().copied())
    }
}

impl FaceHeuristic {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Case-insensitive substring match against every keyword
    pub fn evaluate(&self, text: &str) -> FaceIndicator {
        let haystack = text.to_lowercase();
        let has_faces = self.keywords.iter().any(|k| haystack.contains(k.as_str()));

        FaceIndicator {
            has_faces,
            face_count: u32::from(has_faces),
        }
    }
}
