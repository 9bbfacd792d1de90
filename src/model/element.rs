//! Classified structural elements.

use serde::{Deserialize, Serialize};

/// Admonition kinds recognized by the callout marker rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalloutKind {
    /// An informational note
    Note,
    /// A warning
    Warning,
    /// A usage tip
    Tip,
    /// An emphasized, must-read admonition
    Important,
}

impl CalloutKind {
    /// Parse a marker token, ignoring case.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "note" => Some(CalloutKind::Note),
            "warning" => Some(CalloutKind::Warning),
            "tip" => Some(CalloutKind::Tip),
            "important" => Some(CalloutKind::Important),
            _ => None,
        }
    }

    /// Marker name as it appears in rendered output.
    pub fn as_str(&self) -> &'static str {
        match self {
            CalloutKind::Note => "note",
            CalloutKind::Warning => "warning",
            CalloutKind::Tip => "tip",
            CalloutKind::Important => "important",
        }
    }
}

/// A classified structural element, the unit handed from the page pipeline
/// to the assembler.
///
/// Ordering among the elements of a page is reading order: top to bottom,
/// left to right for same-line ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    /// A section heading
    Heading {
        /// Heading level (1-6)
        level: u8,
        /// Heading text
        text: String,
    },

    /// A regular paragraph
    Paragraph {
        /// Paragraph text
        text: String,
    },

    /// A verbatim code block
    CodeBlock {
        /// Language hint for the fence
        language: String,
        /// Code content, preserved byte-for-byte
        text: String,
    },

    /// A stylistically marked admonition
    Callout {
        /// Admonition kind
        kind: CalloutKind,
        /// Body text with the marker stripped
        text: String,
    },

    /// A placeholder for an extracted table asset
    TableRef {
        /// Stable relative identifier returned by the asset writer
        id: String,
    },

    /// A placeholder for an extracted image asset
    ImageRef {
        /// Stable relative identifier returned by the asset writer
        id: String,
        /// Optional caption text
        caption: Option<String>,
    },
}

impl Element {
    /// Create a heading element with the level clamped to 1-6.
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Element::Heading {
            level: level.clamp(1, 6),
            text: text.into(),
        }
    }

    /// Create a paragraph element.
    pub fn paragraph(text: impl Into<String>) -> Self {
        Element::Paragraph { text: text.into() }
    }

    /// Create a code block element.
    pub fn code(language: impl Into<String>, text: impl Into<String>) -> Self {
        Element::CodeBlock {
            language: language.into(),
            text: text.into(),
        }
    }

    /// Create a callout element.
    pub fn callout(kind: CalloutKind, text: impl Into<String>) -> Self {
        Element::Callout {
            kind,
            text: text.into(),
        }
    }

    /// Heading level, if this element is a heading.
    pub fn heading_level(&self) -> Option<u8> {
        match self {
            Element::Heading { level, .. } => Some(*level),
            _ => None,
        }
    }

    /// Check if this element is a code block.
    pub fn is_code(&self) -> bool {
        matches!(self, Element::CodeBlock { .. })
    }

    /// Check if this element is an asset placeholder.
    pub fn is_ref(&self) -> bool {
        matches!(self, Element::TableRef { .. } | Element::ImageRef { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callout_kind_from_token() {
        assert_eq!(CalloutKind::from_token("NOTE"), Some(CalloutKind::Note));
        assert_eq!(
            CalloutKind::from_token("Warning"),
            Some(CalloutKind::Warning)
        );
        assert_eq!(CalloutKind::from_token("caution"), None);
    }

    #[test]
    fn test_heading_level_clamped() {
        let h = Element::heading(9, "Deep");
        assert_eq!(h.heading_level(), Some(6));

        let h = Element::heading(0, "Shallow");
        assert_eq!(h.heading_level(), Some(1));
    }

    #[test]
    fn test_element_serde_tag() {
        let el = Element::callout(CalloutKind::Tip, "try this");
        let json = serde_json::to_string(&el).unwrap();
        assert!(json.contains("\"type\":\"callout\""));
        assert!(json.contains("\"kind\":\"tip\""));

        let back: Element = serde_json::from_str(&json).unwrap();
        assert_eq!(back, el);
    }
}
