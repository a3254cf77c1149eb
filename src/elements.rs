//! DrawingML serialization of the slide content model.
//!
//! This module turns [`crate::model`] values into the XML fragments that make
//! up a slide part: `p:sp` text boxes and `p:graphicFrame` tables inside a
//! `p:spTree`.  All coordinates are converted from inches to EMUs.

use crate::model::{Frame, RichParagraph, Shape, Slide, TableBlock, TextBox};
use crate::package::{relationships_xml, Relationship, SLIDE_LAYOUT_RELATIONSHIP};
use crate::error::DeckBuildError;

/// English Metric Units per inch.
pub const EMU_PER_INCH: f64 = 914_400.0;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const SLIDE_NAMESPACES: &str = concat!(
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#
);

const TABLE_GRAPHIC_URI: &str = "http://schemas.openxmlformats.org/drawingml/2006/table";

/// Built-in "Medium Style 2 - Accent 1" table style.
const TABLE_STYLE_ID: &str = "{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}";

/// Converts inches to EMUs.
pub fn emu_from_inches(inches: f64) -> i64 {
    (inches * EMU_PER_INCH).round() as i64
}

/// Converts EMUs to inches.
pub fn inches_from_emu(emu: i64) -> f64 {
    emu as f64 / EMU_PER_INCH
}

fn transform_xml(tag: &str, frame: Frame) -> String {
    format!(
        r#"<{tag}><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></{tag}>"#,
        emu_from_inches(frame.left),
        emu_from_inches(frame.top),
        emu_from_inches(frame.width),
        emu_from_inches(frame.height),
    )
}

/// Serializes a paragraph into an `<a:p>` element.
pub fn paragraph_xml(paragraph: &RichParagraph) -> String {
    let mut xml = String::from("<a:p>");
    if let Some(alignment) = paragraph.alignment() {
        xml.push_str(&format!(r#"<a:pPr algn="{}"/>"#, alignment.as_drawingml()));
    }
    for span in paragraph.spans() {
        xml.push_str(&span.to_run_xml());
    }
    xml.push_str("</a:p>");
    xml
}

fn paragraphs_xml(paragraphs: &[RichParagraph]) -> String {
    if paragraphs.is_empty() {
        return "<a:p/>".to_owned();
    }
    paragraphs.iter().map(paragraph_xml).collect()
}

/// Serializes a text box as a `p:sp` shape with the given shape id.
pub fn text_box_xml(id: usize, text_box: &TextBox) -> String {
    format!(
        concat!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="TextBox {index}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr>"#,
            r#"<p:spPr>{xfrm}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>"#,
            r#"<p:txBody><a:bodyPr wrap="square" rtlCol="0"><a:spAutoFit/></a:bodyPr><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#
        ),
        id = id,
        index = id - 1,
        xfrm = transform_xml("a:xfrm", text_box.frame()),
        paragraphs = paragraphs_xml(text_box.paragraphs()),
    )
}

/// Serializes a table as a `p:graphicFrame` with the given shape id.
pub fn table_xml(id: usize, table: &TableBlock) -> String {
    let grid: String = table
        .column_widths()
        .iter()
        .map(|width| format!(r#"<a:gridCol w="{}"/>"#, emu_from_inches(*width)))
        .collect();

    let row_height = emu_from_inches(table.row_height());
    let rows: String = table
        .rows()
        .iter()
        .map(|cells| {
            let cells: String = cells
                .iter()
                .map(|cell| {
                    format!(
                        "<a:tc><a:txBody><a:bodyPr/><a:lstStyle/>{}</a:txBody><a:tcPr/></a:tc>",
                        paragraph_xml(cell)
                    )
                })
                .collect();
            format!(r#"<a:tr h="{row_height}">{cells}</a:tr>"#)
        })
        .collect();

    format!(
        concat!(
            r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="{id}" name="Table {index}"/>"#,
            r#"<p:cNvGraphicFramePr><a:graphicFrameLocks noGrp="1"/></p:cNvGraphicFramePr><p:nvPr/></p:nvGraphicFramePr>"#,
            r#"{xfrm}<a:graphic><a:graphicData uri="{uri}"><a:tbl>"#,
            r#"<a:tblPr firstRow="1" bandRow="1"><a:tableStyleId>{style}</a:tableStyleId></a:tblPr>"#,
            r#"<a:tblGrid>{grid}</a:tblGrid>{rows}</a:tbl></a:graphicData></a:graphic></p:graphicFrame>"#
        ),
        id = id,
        index = id - 1,
        xfrm = transform_xml("p:xfrm", table.frame()),
        uri = TABLE_GRAPHIC_URI,
        style = TABLE_STYLE_ID,
        grid = grid,
        rows = rows,
    )
}

/// Serializes a whole slide part.
///
/// Shape ids start at 2; id 1 belongs to the shape tree itself.
pub fn slide_xml(slide: &Slide) -> String {
    let shapes: String = slide
        .shapes()
        .iter()
        .enumerate()
        .map(|(index, shape)| match shape {
            Shape::TextBox(text_box) => text_box_xml(index + 2, text_box),
            Shape::Table(table) => table_xml(index + 2, table),
        })
        .collect();

    format!(
        concat!(
            "{decl}\n<p:sld {ns}><p:cSld><p:spTree>",
            r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
            r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#,
            "{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"
        ),
        decl = XML_DECLARATION,
        ns = SLIDE_NAMESPACES,
        shapes = shapes,
    )
}

/// Serializes the relationship part of a generated slide pointing at its layout.
pub fn slide_rels_xml(layout_target: &str) -> Result<String, DeckBuildError> {
    relationships_xml(&[Relationship {
        id: "rId1".to_owned(),
        rel_type: SLIDE_LAYOUT_RELATIONSHIP.to_owned(),
        target: layout_target.to_owned(),
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HorizontalAlignment;
    use crate::richtext::Span;

    #[test]
    fn inches_convert_to_emu() {
        assert_eq!(emu_from_inches(1.0), 914_400);
        assert_eq!(emu_from_inches(0.3), 274_320);
        assert!((inches_from_emu(9_144_000) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn paragraph_alignment_is_optional() {
        let inherited = paragraph_xml(&RichParagraph::single(Span::new("a")));
        assert!(!inherited.contains("a:pPr"));

        let right = paragraph_xml(
            &RichParagraph::single(Span::new("a")).with_alignment(HorizontalAlignment::Right),
        );
        assert!(right.starts_with(r#"<a:p><a:pPr algn="r"/>"#));
    }

    #[test]
    fn text_box_carries_geometry_and_text() {
        let text_box = TextBox::new(Frame::new(0.3, 0.2, 6.0, 0.4))
            .with_paragraph(RichParagraph::single(Span::new("Title")));
        let xml = text_box_xml(2, &text_box);
        assert!(xml.contains(r#"<a:off x="274320" y="182880"/>"#));
        assert!(xml.contains(r#"<a:ext cx="5486400" cy="365760"/>"#));
        assert!(xml.contains("<a:t>Title</a:t>"));
        assert!(xml.contains(r#"name="TextBox 1""#));
    }

    #[test]
    fn table_has_grid_and_rows() {
        let table = TableBlock::new(Frame::new(1.0, 0.9, 3.0, 0.6), vec![2.5, 0.5])
            .with_row(vec![
                RichParagraph::single(Span::new("diag")),
                RichParagraph::single(Span::new("2025-01")),
            ])
            .with_row(vec![
                RichParagraph::single(Span::new("X")),
                RichParagraph::single(Span::new("2")),
            ]);
        let xml = table_xml(3, &table);
        assert_eq!(xml.matches("<a:gridCol").count(), 2);
        assert_eq!(xml.matches("<a:tr ").count(), 2);
        assert_eq!(xml.matches("<a:tc>").count(), 4);
        assert!(xml.contains(r#"<a:tr h="274320">"#));
    }

    #[test]
    fn slide_numbers_shapes_from_two() {
        let slide = Slide::new()
            .with_shape(Shape::TextBox(TextBox::new(Frame::default())))
            .with_shape(Shape::TextBox(TextBox::new(Frame::default())));
        let xml = slide_xml(&slide);
        assert!(xml.contains(r#"<p:cNvPr id="2""#));
        assert!(xml.contains(r#"<p:cNvPr id="3""#));
        assert!(xml.contains("<a:p/>"));
        assert!(xml.ends_with("</p:sld>"));
    }

    #[test]
    fn slide_rels_point_at_layout() {
        let xml = slide_rels_xml("../slideLayouts/slideLayout7.xml").unwrap();
        assert!(xml.contains(r#"Target="../slideLayouts/slideLayout7.xml""#));
        assert!(xml.contains(SLIDE_LAYOUT_RELATIONSHIP));
    }
}
