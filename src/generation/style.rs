use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Visual style requested from the generation service
///
/// `Auto` leaves the choice to the service: the style parameter is omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VideoStyle {
    #[default]
    Classic,
    Whiteboard,
    Watercolor,
    RetroPrint,
    Heritage,
    PaperCraft,
    Kawaii,
    Anime,
    Auto,
}

impl VideoStyle {
    pub const ALL: [VideoStyle; 9] = [
        VideoStyle::Classic,
        VideoStyle::Whiteboard,
        VideoStyle::Watercolor,
        VideoStyle::RetroPrint,
        VideoStyle::Heritage,
        VideoStyle::PaperCraft,
        VideoStyle::Kawaii,
        VideoStyle::Anime,
        VideoStyle::Auto,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Whiteboard => "whiteboard",
            Self::Watercolor => "watercolor",
            Self::RetroPrint => "retro-print",
            Self::Heritage => "heritage",
            Self::PaperCraft => "paper-craft",
            Self::Kawaii => "kawaii",
            Self::Anime => "anime",
            Self::Auto => "auto",
        }
    }

    /// Value to pass to the service, `None` for `Auto`
    pub fn service_arg(self) -> Option<&'static str> {
        match self {
            Self::Auto => None,
            other => Some(other.as_str()),
        }
    }

    /// Names of every selectable style
    pub fn available_styles() -> Vec<&'static str> {
        Self::ALL.iter().map(|s| s.as_str()).collect()
    }
}

impl fmt::Display for VideoStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoStyle {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|style| style.as_str() == wanted)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "style".to_string(),
                value: format!("{} (available: {})", s, Self::available_styles().join(", ")),
            })
    }
}
