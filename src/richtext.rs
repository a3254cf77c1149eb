//! Utilities for working with styled text fragments.
//!
//! A [`Span`] is a run of text with the subset of DrawingML character
//! properties the report uses: bold, size, color and typeface.  Spans
//! are grouped into paragraphs by [`crate::model::RichParagraph`] and turned
//! into `<a:r>` elements by [`Span::to_run_xml`].

use quick_xml::escape::escape;

/// A 24-bit RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Returns the color as the six-digit uppercase hex string used by `a:srgbClr`.
    pub fn hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// A slice of text together with inline style attributes.
///
/// Line feeds inside the text are preserved; the paragraph serializer turns
/// them into `<a:br/>` line breaks that carry the same style.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Span {
    text: String,
    bold: bool,
    size_pt: Option<f64>,
    color: Option<Rgb>,
    typeface: Option<String>,
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

    /// Returns whether the span should be rendered in bold.
    pub fn is_bold(&self) -> bool {
        self.bold
    }

    /// Returns the font size in points, if set.
    pub fn size_pt(&self) -> Option<f64> {
        self.size_pt
    }

    /// Sets the bold flag and returns the updated span.
    pub fn with_bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    /// Sets the font size in points and returns the updated span.
    pub fn with_size(mut self, size_pt: impl Into<Option<f64>>) -> Self {
        self.size_pt = size_pt.into();
        self
    }

    /// Sets the span color and returns the updated span.
    pub fn with_color(mut self, color: Option<Rgb>) -> Self {
        self.color = color;
        self
    }

    /// Sets the Latin typeface and returns the updated span.
    pub fn with_typeface(mut self, typeface: impl Into<String>) -> Self {
        self.typeface = Some(typeface.into());
        self
    }

    /// Convenience shorthand that marks the span as bold.
    pub fn bold(self) -> Self {
        self.with_bold(true)
    }

    /// Convenience shorthand that assigns a color to the span.
    pub fn colored(self, color: Rgb) -> Self {
        self.with_color(Some(color))
    }

    /// Convenience shorthand that sets the size in points.
    pub fn sized(self, size_pt: f64) -> Self {
        self.with_size(Some(size_pt))
    }

    /// Builds the `<a:rPr>` element describing the span's character properties.
    pub fn to_run_properties_xml(&self) -> String {
        let mut attributes = String::from(r#" lang="en-US""#);
        if let Some(size) = self.size_pt {
            attributes.push_str(&format!(r#" sz="{}""#, (size * 100.0).round() as i64));
        }
        if self.bold {
            attributes.push_str(r#" b="1""#);
        }
        attributes.push_str(r#" dirty="0""#);

        let mut children = String::new();
        if let Some(color) = self.color {
            children.push_str(&format!(
                r#"<a:solidFill><a:srgbClr val="{}"/></a:solidFill>"#,
                color.hex()
            ));
        }
        if let Some(typeface) = &self.typeface {
            children.push_str(&format!(
                r#"<a:latin typeface="{}"/><a:cs typeface="{}"/>"#,
                escape(typeface.as_str()),
                escape(typeface.as_str())
            ));
        }

        if children.is_empty() {
            format!("<a:rPr{attributes}/>")
        } else {
            format!("<a:rPr{attributes}>{children}</a:rPr>")
        }
    }

    /// Serializes the span into runs, splitting line feeds into `<a:br/>` breaks.
    pub fn to_run_xml(&self) -> String {
        let properties = self.to_run_properties_xml();
        self.text
            .split('\n')
            .map(|line| {
                format!(
                    "<a:r>{properties}<a:t>{}</a:t></a:r>",
                    escape(line)
                )
            })
            .collect::<Vec<_>>()
            .join(&format!("<a:br>{properties}</a:br>"))
    }
}
