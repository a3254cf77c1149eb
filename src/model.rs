//! Data structures describing the logical content of a generated slide.
//!
//! The types in this module form a small model of what the report places on
//! a slide: positioned text boxes and data tables.  They carry no XML; the
//! [`crate::elements`] module serializes them into DrawingML when the deck is
//! assembled.  Geometry is expressed in inches.

use crate::richtext::Span;

/// Paragraph alignment, mapped onto the `algn` attribute of `a:pPr`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HorizontalAlignment {
    /// Left aligned content.
    #[default]
    Left,
    /// Right aligned content.
    Right,
}

impl HorizontalAlignment {
    /// Returns the DrawingML attribute value for the alignment.
    pub fn as_drawingml(&self) -> &'static str {
        match self {
            HorizontalAlignment::Left => "l",
            HorizontalAlignment::Right => "r",
        }
    }
}

/// Rich text paragraph carrying inline styling information and alignment
/// metadata.
///
/// Paragraphs without an explicit alignment inherit it from the placeholder
/// or layout they are placed into.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RichParagraph {
    spans: Vec<Span>,
    alignment: Option<HorizontalAlignment>,
}

impl RichParagraph {
    /// Creates a paragraph from the provided spans with inherited alignment.
    pub fn new(spans: impl Into<Vec<Span>>) -> Self {
        Self {
            spans: spans.into(),
            ..Self::default()
        }
    }

    /// Creates a paragraph holding a single span.
    pub fn single(span: Span) -> Self {
        Self::new(vec![span])
    }

    /// Returns the spans that make up the paragraph.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Returns the explicit alignment, if any.
    pub fn alignment(&self) -> Option<HorizontalAlignment> {
        self.alignment
    }

    /// Returns the concatenated text of all spans.
    pub fn plain_text(&self) -> String {
        self.spans.iter().map(Span::text).collect()
    }

    /// Sets the alignment and returns the updated paragraph.
    pub fn with_alignment(mut self, alignment: HorizontalAlignment) -> Self {
        self.alignment = Some(alignment);
        self
    }
}

/// Position and size of a shape on the slide, in inches.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Frame {
    /// Distance from the left slide edge.
    pub left: f64,
    /// Distance from the top slide edge.
    pub top: f64,
    /// Shape width.
    pub width: f64,
    /// Shape height.
    pub height: f64,
}

impl Frame {
    /// Creates a frame from its left/top offsets and width/height.
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// A free-standing text box.
#[derive(Clone, Debug, PartialEq)]
pub struct TextBox {
    frame: Frame,
    paragraphs: Vec<RichParagraph>,
}

impl TextBox {
    /// Creates an empty text box occupying `frame`.
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            paragraphs: Vec::new(),
        }
    }

    /// Returns the frame of the text box.
    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Returns the paragraphs of the text box.
    pub fn paragraphs(&self) -> &[RichParagraph] {
        &self.paragraphs
    }

    /// Appends a paragraph and returns the updated text box.
    pub fn with_paragraph(mut self, paragraph: RichParagraph) -> Self {
        self.paragraphs.push(paragraph);
        self
    }
}

/// A grid of cells with fixed column widths.
///
/// The first row is rendered as the header row.  The overall height is split
/// evenly between rows.
#[derive(Clone, Debug, PartialEq)]
pub struct TableBlock {
    frame: Frame,
    column_widths: Vec<f64>,
    rows: Vec<Vec<RichParagraph>>,
}

impl TableBlock {
    /// Creates a table at `frame` with the given column widths in inches.
    pub fn new(frame: Frame, column_widths: impl Into<Vec<f64>>) -> Self {
        Self {
            frame,
            column_widths: column_widths.into(),
            rows: Vec::new(),
        }
    }

    /// Returns the frame of the table.
    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Returns the column widths in inches.
    pub fn column_widths(&self) -> &[f64] {
        &self.column_widths
    }

    /// Returns the rows, header first.
    pub fn rows(&self) -> &[Vec<RichParagraph>] {
        &self.rows
    }

    /// Returns the height of a single row in inches.
    pub fn row_height(&self) -> f64 {
        if self.rows.is_empty() {
            self.frame.height
        } else {
            self.frame.height / self.rows.len() as f64
        }
    }

    /// Appends a row and returns the updated table.
    ///
    /// Rows shorter than the column count are padded with empty cells; extra
    /// cells are dropped.
    pub fn with_row(mut self, mut cells: Vec<RichParagraph>) -> Self {
        cells.resize_with(self.column_widths.len(), RichParagraph::default);
        self.rows.push(cells);
        self
    }
}

/// A shape placed on a generated slide.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    /// Positioned text.
    TextBox(TextBox),
    /// Positioned table.
    Table(TableBlock),
}

/// Content of one generated slide.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Slide {
    shapes: Vec<Shape>,
}

impl Slide {
    /// Creates an empty slide.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shapes in z-order.
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Appends a shape and returns the updated slide.
    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shapes.push(shape);
        self
    }

    /// Extends the slide with multiple shapes and returns the updated instance.
    pub fn with_shapes<I>(mut self, shapes: I) -> Self
    where
        I: IntoIterator<Item = Shape>,
    {
        self.shapes.extend(shapes);
        self
    }
}
