#![allow(dead_code)]

use case_review_report::cases::{CaseRecord, SummaryRow, SummaryTable};
use case_review_report::package::{parse_relationships, resolve_target, Package};
use chrono::NaiveDate;

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PART: &str = "ppt/_rels/presentation.xml.rels";

const NS: &str = concat!(
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#
);

const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Shape of a synthetic slide template.
pub struct TemplateFixture {
    /// Number of layouts under the single slide master.
    pub layouts: usize,
    /// Text of each text-bearing shape on the introduction slide.
    pub intro_shapes: Vec<&'static str>,
    /// Whether the template has a second slide after the introduction.
    pub trailing_slide: bool,
}

impl Default for TemplateFixture {
    fn default() -> Self {
        Self {
            layouts: 11,
            intro_shapes: vec!["Template title", "Template subtitle", "Keep me"],
            trailing_slide: false,
        }
    }
}

fn text_shape(id: usize, text: &str) -> String {
    format!(
        concat!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="Shape {id}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/>"#,
            r#"<p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:r><a:rPr lang="en-US"/><a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp>"#
        ),
        id = id,
        text = text
    )
}

fn slide(shapes: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n<p:sld {ns}><p:cSld><p:spTree>",
            r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>"#,
            "{shapes}</p:spTree></p:cSld></p:sld>"
        ),
        ns = NS,
        shapes = shapes
    )
}

fn rels(entries: &[(String, &str, String)]) -> String {
    let body: String = entries
        .iter()
        .map(|(id, kind, target)| {
            format!(r#"<Relationship Id="{id}" Type="{REL_BASE}/{kind}" Target="{target}"/>"#)
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{REL_NS}">{body}</Relationships>"#
    )
}

impl TemplateFixture {
    /// Builds the template archive.
    pub fn build(&self) -> Vec<u8> {
        let mut package = Package::default();
        let slide_type = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
        let layout_type = "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml";

        let mut overrides = vec![
            (
                "/ppt/presentation.xml".to_owned(),
                "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml",
            ),
            (
                "/ppt/slideMasters/slideMaster1.xml".to_owned(),
                "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml",
            ),
            ("/ppt/slides/slide1.xml".to_owned(), slide_type),
        ];
        if self.trailing_slide {
            overrides.push(("/ppt/slides/slide2.xml".to_owned(), slide_type));
        }
        for index in 1..=self.layouts {
            overrides.push((format!("/ppt/slideLayouts/slideLayout{index}.xml"), layout_type));
        }
        let overrides: String = overrides
            .iter()
            .map(|(part, kind)| format!(r#"<Override PartName="{part}" ContentType="{kind}"/>"#))
            .collect();
        package.set_part(
            "[Content_Types].xml",
            format!(
                concat!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                    "\n",
                    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
                    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
                    r#"<Default Extension="xml" ContentType="application/xml"/>{}</Types>"#
                ),
                overrides
            ),
        );

        package.set_part(
            "_rels/.rels",
            rels(&[("rId1".to_owned(), "officeDocument", "ppt/presentation.xml".to_owned())]),
        );

        let mut slide_ids = String::from(r#"<p:sldId id="256" r:id="rId2"/>"#);
        let mut presentation_rels = vec![
            ("rId1".to_owned(), "slideMaster", "slideMasters/slideMaster1.xml".to_owned()),
            ("rId2".to_owned(), "slide", "slides/slide1.xml".to_owned()),
        ];
        if self.trailing_slide {
            slide_ids.push_str(r#"<p:sldId id="257" r:id="rId3"/>"#);
            presentation_rels.push(("rId3".to_owned(), "slide", "slides/slide2.xml".to_owned()));
        }
        package.set_part(
            PRESENTATION_PART,
            format!(
                concat!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                    "\n<p:presentation {ns}>",
                    r#"<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>"#,
                    "<p:sldIdLst>{ids}</p:sldIdLst>",
                    r#"<p:sldSz cx="9144000" cy="6858000"/><p:notesSz cx="6858000" cy="9144000"/>"#,
                    "</p:presentation>"
                ),
                ns = NS,
                ids = slide_ids
            ),
        );
        package.set_part(PRESENTATION_RELS_PART, rels(&presentation_rels));

        let intro: String = self
            .intro_shapes
            .iter()
            .enumerate()
            .map(|(index, text)| text_shape(index + 2, text))
            .collect();
        package.set_part("ppt/slides/slide1.xml", slide(&intro));
        let layout_rel = rels(&[(
            "rId1".to_owned(),
            "slideLayout",
            "../slideLayouts/slideLayout1.xml".to_owned(),
        )]);
        package.set_part("ppt/slides/_rels/slide1.xml.rels", layout_rel.clone());
        if self.trailing_slide {
            package.set_part("ppt/slides/slide2.xml", slide(&text_shape(2, "Closing slide")));
            package.set_part("ppt/slides/_rels/slide2.xml.rels", layout_rel);
        }

        let layout_ids: String = (1..=self.layouts)
            .map(|index| {
                format!(
                    r#"<p:sldLayoutId id="{}" r:id="rId{index}"/>"#,
                    2_147_483_648u64 + index as u64
                )
            })
            .collect();
        package.set_part(
            "ppt/slideMasters/slideMaster1.xml",
            format!(
                concat!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                    "\n<p:sldMaster {ns}><p:cSld><p:spTree/></p:cSld>",
                    "<p:sldLayoutIdLst>{ids}</p:sldLayoutIdLst></p:sldMaster>"
                ),
                ns = NS,
                ids = layout_ids
            ),
        );
        let master_rels: Vec<(String, &str, String)> = (1..=self.layouts)
            .map(|index| {
                (
                    format!("rId{index}"),
                    "slideLayout",
                    format!("../slideLayouts/slideLayout{index}.xml"),
                )
            })
            .collect();
        package.set_part(
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            rels(&master_rels),
        );

        for index in 1..=self.layouts {
            package.set_part(
                format!("ppt/slideLayouts/slideLayout{index}.xml"),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldLayout {NS}><p:cSld name="Layout {index}"><p:spTree/></p:cSld></p:sldLayout>"#
                ),
            );
            package.set_part(
                format!("ppt/slideLayouts/_rels/slideLayout{index}.xml.rels"),
                rels(&[(
                    "rId1".to_owned(),
                    "slideMaster",
                    "../slideMasters/slideMaster1.xml".to_owned(),
                )]),
            );
        }

        package.to_bytes().unwrap()
    }
}

/// Returns the slide parts of a deck in presentation order.
pub fn slide_parts(package: &Package) -> Vec<String> {
    let relationships = parse_relationships(
        PRESENTATION_RELS_PART,
        package.xml_part(PRESENTATION_RELS_PART).unwrap(),
    )
    .unwrap();
    let xml = package.xml_part(PRESENTATION_PART).unwrap();
    let list = xml
        .split("<p:sldIdLst>")
        .nth(1)
        .and_then(|rest| rest.split("</p:sldIdLst>").next())
        .unwrap();

    list.split("<p:sldId ")
        .skip(1)
        .map(|entry| {
            let id = entry
                .split("r:id=\"")
                .nth(1)
                .and_then(|rest| rest.split('"').next())
                .unwrap();
            let relationship = relationships.iter().find(|rel| rel.id == id).unwrap();
            resolve_target(PRESENTATION_PART, &relationship.target)
        })
        .collect()
}

/// Returns the text of every `<a:t>` element in document order.
pub fn texts(xml: &str) -> Vec<String> {
    xml.split("<a:t>")
        .skip(1)
        .filter_map(|rest| rest.split("</a:t>").next())
        .map(str::to_owned)
        .collect()
}

/// Returns whether `needle` occurs as a contiguous run inside `haystack`.
pub fn contains_run(haystack: &[String], needle: &[&str]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window.iter().zip(needle).all(|(a, b)| a == b))
}

pub fn months(year: i32, first: u32) -> [String; 3] {
    [first, first + 1, first + 2].map(|month| format!("{year}-{month:02}"))
}

pub fn summary_row(physician: &str, diagnosis: &str, gender: Option<&str>, counts: [i64; 3]) -> SummaryRow {
    SummaryRow {
        physician: physician.to_owned(),
        diagnosis: diagnosis.to_owned(),
        gender: gender.map(str::to_owned),
        facility: "North Clinic".to_owned(),
        counts,
    }
}

/// The two-row summary for "Dr. A" used across the rendering tests.
pub fn dr_a_summary() -> SummaryTable {
    SummaryTable::new(
        months(2025, 1),
        vec![
            summary_row("Dr. A", "X", Some("M"), [2, 0, 1]),
            summary_row("Dr. A", "Y", Some("F"), [0, 3, 0]),
        ],
    )
}

pub fn case(id: &str, signout: NaiveDate, diagnosis: &str, physician: &str, gender: Option<&str>, facility: &str) -> CaseRecord {
    CaseRecord {
        case_id: id.to_owned(),
        signout_date: signout,
        diagnosis: Some(diagnosis.to_owned()),
        physician: physician.to_owned(),
        gender: gender.map(str::to_owned),
        facility: facility.to_owned(),
    }
}
