use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(PageId);
id_newtype!(AreaId);
id_newtype!(SectionId);

/// Which device ordering a render pass follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Viewport {
    #[default]
    Desktop,
    Mobile,
}

/// How a section title is emitted. `Tag` carries an explicit element name
/// configured by an editor that is not one of the predefined choices.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TitleSemantic {
    #[default]
    Auto,
    Heading(u8),
    Paragraph,
    Hide,
    Tag(String),
}

impl TitleSemantic {
    pub const CHOICES: [&'static str; 9] = ["auto", "h1", "h2", "h3", "h4", "h5", "h6", "p", "hide"];

    /// Elements accepted as an explicit title tag beyond the predefined
    /// choices. Anything outside this list is rejected.
    pub const EXTRA_TAGS: [&'static str; 8] =
        ["div", "span", "strong", "em", "b", "i", "header", "small"];
}

impl fmt::Display for TitleSemantic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TitleSemantic::Auto => f.write_str("auto"),
            TitleSemantic::Heading(level) => write!(f, "h{level}"),
            TitleSemantic::Paragraph => f.write_str("p"),
            TitleSemantic::Hide => f.write_str("hide"),
            TitleSemantic::Tag(tag) => f.write_str(tag),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid title semantic '{0}'")]
pub struct InvalidTitleSemantic(pub String);

impl FromStr for TitleSemantic {
    type Err = InvalidTitleSemantic;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value = raw.trim().to_ascii_lowercase();
        match value.as_str() {
            "" | "auto" => Ok(TitleSemantic::Auto),
            "p" => Ok(TitleSemantic::Paragraph),
            "hide" => Ok(TitleSemantic::Hide),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                Ok(TitleSemantic::Heading(value.as_bytes()[1] - b'0'))
            }
            tag if TitleSemantic::EXTRA_TAGS.contains(&tag) => {
                Ok(TitleSemantic::Tag(tag.to_string()))
            }
            _ => Err(InvalidTitleSemantic(raw.to_string())),
        }
    }
}

impl TryFrom<String> for TitleSemantic {
    type Error = InvalidTitleSemantic;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TitleSemantic> for String {
    fn from(value: TitleSemantic) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSummary {
    pub page_id: PageId,
    pub page_type: String,
    pub url_segment: String,
    pub title: String,
}
