//! Styled text fragments for report paragraphs.
//!
//! A [`Span`] carries the inline decorations the report uses, bold and
//! underline.  genpdf's [`StyledString`] has no underline attribute, so
//! [`StyledSpan`] keeps the flag next to the converted string for the elements
//! that draw the stroke themselves.

use genpdf::style::{Style, StyledString};

/// A slice of text together with inline style attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Span {
    text: String,
    bold: bool,
    underline: bool,
}

impl Span {
    /// Creates a new span with the provided text and no styles applied.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Returns the raw text contained in this span.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_bold(&self) -> bool {
        self.bold
    }

    pub fn is_underlined(&self) -> bool {
        self.underline
    }

    /// Convenience shorthand that marks the span as bold.
    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Convenience shorthand that marks the span as underlined.
    pub fn underline(mut self) -> Self {
        self.underline = true;
        self
    }

    fn to_style(&self) -> Style {
        let mut style = Style::new();
        if self.bold {
            style.set_bold();
        }
        style
    }

    /// Converts the span to a [`StyledString`], dropping the underline attribute.
    pub fn to_styled_string(&self) -> StyledString {
        StyledString::new(self.text.clone(), self.to_style())
    }
}

impl From<&Span> for StyledString {
    fn from(span: &Span) -> Self {
        span.to_styled_string()
    }
}

impl From<Span> for StyledString {
    fn from(span: Span) -> Self {
        span.to_styled_string()
    }
}

/// A styled span ready to be consumed by `genpdf` elements together with the underline flag.
#[derive(Clone, Debug)]
pub struct StyledSpan {
    /// The styled text fragment.
    pub string: StyledString,
    /// Whether the fragment should be rendered with an underline.
    pub underline: bool,
}

impl From<&Span> for StyledSpan {
    fn from(span: &Span) -> Self {
        StyledSpan {
            string: span.to_styled_string(),
            underline: span.underline,
        }
    }
}

impl From<Span> for StyledSpan {
    fn from(span: Span) -> Self {
        StyledSpan::from(&span)
    }
}

/// Builds the `label value` spans used for the report's field lines.
pub fn labeled_value(label: &str, value: &str) -> [Span; 2] {
    [Span::new(label).bold(), Span::new(format!(" {}", value))]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_to_style_reflects_flags() {
        let styled = Span::new("Hello").bold().to_styled_string();
        assert_eq!(styled.s, "Hello");
        assert!(styled.style.is_bold());
        assert!(!styled.style.is_italic());
        assert_eq!(styled.style.color(), None);

        let plain = Span::new("Hello").to_styled_string();
        assert!(!plain.style.is_bold());
    }

    #[test]
    fn styled_span_captures_underline_flag() {
        let span = Span::new("Photos:").underline();
        let styled = StyledSpan::from(&span);
        assert_eq!(styled.string.s, "Photos:");
        assert!(styled.underline);
    }

    #[test]
    fn labeled_value_bolds_only_the_label() {
        let [label, value] = labeled_value("Plate:", "ABC1D23");
        assert!(label.is_bold());
        assert_eq!(label.text(), "Plate:");
        assert!(!value.is_bold());
        assert_eq!(value.text(), " ABC1D23");
    }

    #[test]
    fn labeled_value_keeps_empty_values() {
        let [_, value] = labeled_value("Destination:", "");
        assert_eq!(value.text(), " ");
    }
}
