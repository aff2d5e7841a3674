use serde::{Deserialize, Serialize};

use crate::{CarouselError, Result};

/// Navigation direction for the carousel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
}

/// Immutable record describing one carousel page. Loaded once at startup
/// and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub image: String,
    #[serde(default)]
    pub alt: String,
    /// Optional reference to an HTML fragment rendered below the image.
    #[serde(default)]
    pub content_url: Option<String>,
    pub audio_url: String,
}

/// Ordered, non-empty sequence of pages with circular index arithmetic.
#[derive(Debug, Clone)]
pub struct PageSet {
    pages: Vec<Page>,
}

impl PageSet {
    /// Builds a page set, rejecting empty sequences and duplicate ids.
    pub fn new(pages: Vec<Page>) -> Result<Self> {
        if pages.is_empty() {
            return Err(CarouselError::InvalidInput(
                "a carousel needs at least one page",
            ));
        }

        for (index, page) in pages.iter().enumerate() {
            if pages[..index].iter().any(|other| other.id == page.id) {
                return Err(CarouselError::msg(format!(
                    "duplicate page id `{}`",
                    page.id
                )));
            }
        }

        Ok(Self { pages })
    }

    /// Parses a page manifest from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self> {
        let pages: Vec<Page> = serde_json::from_str(json)
            .map_err(|err| CarouselError::msg(format!("invalid page manifest: {err}")))?;
        Self::new(pages)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Advances or retreats the index by exactly one page, wrapping around
    /// at either end.
    pub fn step(&self, index: usize, direction: Direction) -> usize {
        let count = self.pages.len();
        match direction {
            Direction::Left => (index + count - 1) % count,
            Direction::Right => (index + 1) % count,
        }
    }

    /// Built-in six-page demo set used by the command line application.
    pub fn demo() -> Self {
        let pages = (0..6)
            .map(|n| {
                let id = if n == 0 {
                    "intro".to_string()
                } else {
                    format!("project-{n}")
                };
                Page {
                    image: format!("assets/images/{id}.png"),
                    alt: format!("{id} preview"),
                    content_url: Some(format!("content/{id}.html")),
                    audio_url: format!("assets/audio/{id}.wav"),
                    id,
                }
            })
            .collect();

        Self { pages }
    }
}
