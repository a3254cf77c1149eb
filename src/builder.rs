//! Deck construction on top of a slide template.
//!
//! [`DeckBuilder`] opens a `.pptx` template, rewrites the text of the
//! introduction slide, and inserts generated slides directly after it.  The
//! template package is only ever modified in memory; [`DeckBuilder::render`]
//! returns the finished archive as bytes.

use std::io::Write as _;

use log::{debug, warn};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::elements::{inches_from_emu, paragraph_xml, slide_rels_xml, slide_xml};
use crate::error::DeckBuildError;
use crate::model::{RichParagraph, Slide};
use crate::package::{
    add_content_type_overrides, append_relationships, next_relationship_id, parse_relationships,
    rels_part_name, relative_target, resolve_target, Package, Relationship, CONTENT_TYPES_PART,
    SLIDE_CONTENT_TYPE, SLIDE_RELATIONSHIP,
};

/// Index of the blank layout in the default Office slide master.
pub const DEFAULT_BLANK_LAYOUT_INDEX: usize = 6;

const DEFAULT_PRESENTATION_PART: &str = "ppt/presentation.xml";
const OFFICE_DOCUMENT_RELATIONSHIP_SUFFIX: &str = "/officeDocument";
const SLIDE_LAYOUT_RELATIONSHIP_SUFFIX: &str = "/slideLayout";

/// Default 4:3 slide dimensions (10 × 7.5 inches) in EMUs.
const DEFAULT_SLIDE_SIZE_EMU: (i64, i64) = (9_144_000, 6_858_000);

/// Slide dimensions in inches.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlideSize {
    /// Slide width.
    pub width: f64,
    /// Slide height.
    pub height: f64,
}

/// Output of [`DeckBuilder::render`].
#[derive(Clone, Debug)]
pub struct RenderedDeck {
    /// The finished `.pptx` archive.
    pub bytes: Vec<u8>,
    /// Number of slides in the deck, template slides included.
    pub slide_count: usize,
}

#[derive(Clone, Debug)]
struct SlideEntry {
    id: u32,
    relationship_id: String,
}

#[derive(Clone, Debug)]
struct Presentation {
    part: String,
    slides: Vec<SlideEntry>,
    master_relationship_id: Option<String>,
    size_emu: (i64, i64),
}

/// Builder for report decks derived from a template package.
pub struct DeckBuilder {
    package: Package,
    presentation: Presentation,
    intro_text: Vec<RichParagraph>,
    slides: Vec<Slide>,
    blank_layout_index: usize,
}

impl DeckBuilder {
    /// Opens the template contained in `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeckBuildError> {
        Self::from_package(Package::from_bytes(bytes)?)
    }

    /// Wraps an already loaded template package.
    pub fn from_package(package: Package) -> Result<Self, DeckBuildError> {
        let part = presentation_part_name(&package)?;
        let presentation = parse_presentation(part.clone(), package.xml_part(&part)?)?;
        Ok(Self {
            package,
            presentation,
            intro_text: Vec::new(),
            slides: Vec::new(),
            blank_layout_index: DEFAULT_BLANK_LAYOUT_INDEX,
        })
    }

    /// Returns the slide dimensions declared by the template.
    pub fn slide_size(&self) -> SlideSize {
        let (cx, cy) = self.presentation.size_emu;
        SlideSize {
            width: inches_from_emu(cx),
            height: inches_from_emu(cy),
        }
    }

    /// Selects which layout of the first slide master generated slides use.
    ///
    /// Indices past the end of the layout list fall back to the last layout.
    pub fn with_blank_layout_index(mut self, index: usize) -> Self {
        self.blank_layout_index = index;
        self
    }

    /// Sets the replacement text for the introduction slide.
    ///
    /// The n-th paragraph replaces the text of the n-th text-bearing shape of
    /// the first slide.  Shapes without a replacement keep their text; extra
    /// paragraphs without a matching shape are ignored.
    pub fn with_intro_text(mut self, paragraphs: Vec<RichParagraph>) -> Self {
        self.intro_text = paragraphs;
        self
    }

    /// Appends a generated slide.
    ///
    /// Generated slides follow the introduction slide in the order they were added.
    pub fn push_slide(&mut self, slide: Slide) {
        self.slides.push(slide);
    }

    /// Assembles the deck and serializes it into a `.pptx` archive.
    pub fn render(mut self) -> Result<RenderedDeck, DeckBuildError> {
        let presentation_part = self.presentation.part.clone();
        let presentation_rels_part = rels_part_name(&presentation_part);
        let relationships = parse_relationships(
            &presentation_rels_part,
            self.package.xml_part(&presentation_rels_part)?,
        )?;

        let intro = self
            .presentation
            .slides
            .first()
            .cloned()
            .ok_or_else(|| DeckBuildError::malformed(&presentation_part, "template has no slides"))?;
        let intro_part = target_part(&presentation_part, &relationships, &intro.relationship_id)?;

        if !self.intro_text.is_empty() {
            let (xml, filled) = rewrite_intro(self.package.xml_part(&intro_part)?, &self.intro_text)?;
            if filled < self.intro_text.len() {
                warn!(
                    "Introduction slide {} has {} text shape(s); {} replacement(s) skipped",
                    intro_part,
                    filled,
                    self.intro_text.len() - filled
                );
            }
            self.package.set_part(intro_part.clone(), xml);
        }

        let generated = std::mem::take(&mut self.slides);
        let slide_count = self.presentation.slides.len() + generated.len();
        if !generated.is_empty() {
            self.insert_slides(&presentation_part, &relationships, &intro_part, &generated)?;
        }

        Ok(RenderedDeck {
            bytes: self.package.to_bytes()?,
            slide_count,
        })
    }

    fn insert_slides(
        &mut self,
        presentation_part: &str,
        relationships: &[Relationship],
        intro_part: &str,
        slides: &[Slide],
    ) -> Result<(), DeckBuildError> {
        let layout_part = self.blank_layout_part(presentation_part, relationships)?;
        debug!("Generated slides use layout {}", layout_part);

        let slides_dir = intro_part
            .rsplit_once('/')
            .map(|(dir, _)| dir.to_owned())
            .unwrap_or_default();
        let mut slide_number = self.max_slide_number(&slides_dir) + 1;
        let mut next_id = self
            .presentation
            .slides
            .iter()
            .map(|entry| entry.id)
            .max()
            .unwrap_or(255)
            .max(255)
            + 1;
        let mut relationship_counter = relationships.len() + 1;

        let mut new_relationships = Vec::with_capacity(slides.len());
        let mut new_entries = Vec::with_capacity(slides.len());
        let mut overrides = Vec::with_capacity(slides.len());
        let mut taken: Vec<Relationship> = relationships.to_vec();

        for slide in slides {
            let part = if slides_dir.is_empty() {
                format!("slide{slide_number}.xml")
            } else {
                format!("{slides_dir}/slide{slide_number}.xml")
            };
            slide_number += 1;

            self.package.set_part(part.clone(), slide_xml(slide));
            self.package.set_part(
                rels_part_name(&part),
                slide_rels_xml(&relative_target(&part, &layout_part))?,
            );

            let (relationship_id, next_counter) =
                next_relationship_id(&taken, relationship_counter);
            relationship_counter = next_counter;
            let relationship = Relationship {
                id: relationship_id.clone(),
                rel_type: SLIDE_RELATIONSHIP.to_owned(),
                target: relative_target(presentation_part, &part),
            };
            taken.push(relationship.clone());
            new_relationships.push(relationship);

            new_entries.push(SlideEntry {
                id: next_id,
                relationship_id,
            });
            next_id += 1;
            overrides.push((part, SLIDE_CONTENT_TYPE));
        }

        let rels_part = rels_part_name(presentation_part);
        let rels_xml = append_relationships(self.package.xml_part(&rels_part)?, &new_relationships)?;
        self.package.set_part(rels_part, rels_xml);

        let presentation_xml =
            insert_slide_ids(self.package.xml_part(presentation_part)?, &new_entries)?;
        self.package
            .set_part(presentation_part.to_owned(), presentation_xml);

        let types_xml =
            add_content_type_overrides(self.package.xml_part(CONTENT_TYPES_PART)?, &overrides)?;
        self.package.set_part(CONTENT_TYPES_PART, types_xml);

        for (offset, entry) in new_entries.into_iter().enumerate() {
            self.presentation.slides.insert(1 + offset, entry);
        }
        Ok(())
    }

    fn blank_layout_part(
        &self,
        presentation_part: &str,
        relationships: &[Relationship],
    ) -> Result<String, DeckBuildError> {
        let master_relationship = self
            .presentation
            .master_relationship_id
            .as_deref()
            .ok_or_else(|| {
                DeckBuildError::malformed(presentation_part, "template has no slide master")
            })?;
        let master_part = target_part(presentation_part, relationships, master_relationship)?;
        let master_rels_part = rels_part_name(&master_part);
        let master_rels =
            parse_relationships(&master_rels_part, self.package.xml_part(&master_rels_part)?)?;

        let ordered_ids = layout_relationship_ids(self.package.xml_part(&master_part)?)?;
        let layouts: Vec<String> = if ordered_ids.is_empty() {
            master_rels
                .iter()
                .filter(|rel| rel.rel_type.ends_with(SLIDE_LAYOUT_RELATIONSHIP_SUFFIX))
                .map(|rel| resolve_target(&master_part, &rel.target))
                .collect()
        } else {
            ordered_ids
                .iter()
                .map(|id| target_part(&master_part, &master_rels, id))
                .collect::<Result<_, _>>()?
        };

        if layouts.len() <= self.blank_layout_index {
            if let Some(last) = layouts.last() {
                warn!(
                    "Template master has {} layout(s); layout index {} unavailable, using {}",
                    layouts.len(),
                    self.blank_layout_index,
                    last
                );
            }
        }

        let index = self.blank_layout_index.min(layouts.len().saturating_sub(1));
        layouts
            .into_iter()
            .nth(index)
            .ok_or_else(|| DeckBuildError::malformed(master_part, "slide master has no layouts"))
    }

    fn max_slide_number(&self, slides_dir: &str) -> u32 {
        let prefix = if slides_dir.is_empty() {
            "slide".to_owned()
        } else {
            format!("{slides_dir}/slide")
        };
        self.package
            .part_names()
            .filter_map(|name| name.strip_prefix(prefix.as_str()))
            .filter_map(|rest| rest.strip_suffix(".xml"))
            .filter_map(|number| number.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
    }
}

fn presentation_part_name(package: &Package) -> Result<String, DeckBuildError> {
    let root_rels = "_rels/.rels";
    if !package.contains(root_rels) {
        return Ok(DEFAULT_PRESENTATION_PART.to_owned());
    }
    let relationships = parse_relationships(root_rels, package.xml_part(root_rels)?)?;
    Ok(relationships
        .iter()
        .find(|rel| rel.rel_type.ends_with(OFFICE_DOCUMENT_RELATIONSHIP_SUFFIX))
        .map(|rel| resolve_target("", &rel.target))
        .unwrap_or_else(|| DEFAULT_PRESENTATION_PART.to_owned()))
}

fn target_part(
    source_part: &str,
    relationships: &[Relationship],
    id: &str,
) -> Result<String, DeckBuildError> {
    relationships
        .iter()
        .find(|rel| rel.id == id)
        .map(|rel| resolve_target(source_part, &rel.target))
        .ok_or_else(|| {
            DeckBuildError::malformed(
                rels_part_name(source_part),
                format!("relationship {id} is not declared"),
            )
        })
}

fn attribute_value(
    element: &BytesStart<'_>,
    matches: impl Fn(&[u8]) -> bool,
) -> Result<Option<String>, DeckBuildError> {
    for attribute in element.attributes() {
        let attribute = attribute?;
        if matches(attribute.key.as_ref()) {
            return Ok(Some(attribute.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn is_relationship_id(key: &[u8]) -> bool {
    key.ends_with(b":id")
}

fn parse_presentation(part: String, xml: &str) -> Result<Presentation, DeckBuildError> {
    let mut reader = Reader::from_str(xml);
    let mut slides = Vec::new();
    let mut master_relationship_id = None;
    let mut size_emu = DEFAULT_SLIDE_SIZE_EMU;

    loop {
        match reader.read_event()? {
            Event::Start(element) | Event::Empty(element) => {
                match element.local_name().as_ref() {
                    b"sldId" => {
                        let id = attribute_value(&element, |key| key == b"id")?
                            .and_then(|value| value.parse::<u32>().ok())
                            .ok_or_else(|| DeckBuildError::malformed(&part, "slide id without numeric id"))?;
                        let relationship_id = attribute_value(&element, is_relationship_id)?
                            .ok_or_else(|| DeckBuildError::malformed(&part, "slide id without relationship"))?;
                        slides.push(SlideEntry {
                            id,
                            relationship_id,
                        });
                    }
                    b"sldMasterId" if master_relationship_id.is_none() => {
                        master_relationship_id = attribute_value(&element, is_relationship_id)?;
                    }
                    b"sldSz" => {
                        let cx = attribute_value(&element, |key| key == b"cx")?
                            .and_then(|value| value.parse::<i64>().ok());
                        let cy = attribute_value(&element, |key| key == b"cy")?
                            .and_then(|value| value.parse::<i64>().ok());
                        if let (Some(cx), Some(cy)) = (cx, cy) {
                            size_emu = (cx, cy);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(Presentation {
        part,
        slides,
        master_relationship_id,
        size_emu,
    })
}

fn layout_relationship_ids(xml: &str) -> Result<Vec<String>, DeckBuildError> {
    let mut reader = Reader::from_str(xml);
    let mut ids = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(element) | Event::Empty(element)
                if element.local_name().as_ref() == b"sldLayoutId" =>
            {
                if let Some(id) = attribute_value(&element, is_relationship_id)? {
                    ids.push(id);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(ids)
}

fn into_string(part: &str, bytes: Vec<u8>) -> Result<String, DeckBuildError> {
    String::from_utf8(bytes).map_err(|_| DeckBuildError::malformed(part, "rewritten part is not valid UTF-8"))
}

/// Inserts new `sldId` entries directly after the first existing one.
fn insert_slide_ids(xml: &str, entries: &[SlideEntry]) -> Result<String, DeckBuildError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + entries.len() * 64));
    let mut inserted = false;
    let mut pending: Option<(String, String)> = None;

    let write_entries = |writer: &mut Writer<Vec<u8>>,
                         name: &str,
                         relationship_key: &str|
     -> Result<(), DeckBuildError> {
        for entry in entries {
            let id = entry.id.to_string();
            let mut element = BytesStart::new(name);
            element.push_attribute(("id", id.as_str()));
            element.push_attribute((relationship_key, entry.relationship_id.as_str()));
            writer.write_event(Event::Empty(element))?;
        }
        Ok(())
    };

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Empty(element) if !inserted && element.local_name().as_ref() == b"sldId" => {
                let (name, key) = slide_id_names(&element)?;
                writer.write_event(Event::Empty(element))?;
                write_entries(&mut writer, &name, &key)?;
                inserted = true;
            }
            Event::Start(element) if !inserted && element.local_name().as_ref() == b"sldId" => {
                pending = Some(slide_id_names(&element)?);
                writer.write_event(Event::Start(element))?;
            }
            Event::End(element) if !inserted && element.local_name().as_ref() == b"sldId" => {
                writer.write_event(Event::End(element))?;
                if let Some((name, key)) = pending.take() {
                    write_entries(&mut writer, &name, &key)?;
                    inserted = true;
                }
            }
            event => writer.write_event(event)?,
        }
    }

    into_string("presentation", writer.into_inner())
}

fn slide_id_names(element: &BytesStart<'_>) -> Result<(String, String), DeckBuildError> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut key = "r:id".to_owned();
    for attribute in element.attributes() {
        let attribute = attribute?;
        if is_relationship_id(attribute.key.as_ref()) {
            key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        }
    }
    Ok((name, key))
}

/// Replaces the paragraphs of the first text-bearing shapes of a slide.
///
/// Only top-level shapes are considered; shapes nested inside groups and
/// table cells keep their text.  Returns the rewritten XML and the number of
/// shapes that received a replacement.
fn rewrite_intro(
    xml: &str,
    replacements: &[RichParagraph],
) -> Result<(String, usize), DeckBuildError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 1024));
    let mut group_depth = 0usize;
    let mut filled = 0usize;
    let mut in_body = false;
    let mut skip_depth = 0usize;

    loop {
        let event = reader.read_event()?;

        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Eof => break,
            Event::Start(element) if element.local_name().as_ref() == b"grpSp" => {
                group_depth += 1;
                writer.write_event(Event::Start(element))?;
            }
            Event::End(element) if element.local_name().as_ref() == b"grpSp" => {
                group_depth = group_depth.saturating_sub(1);
                writer.write_event(Event::End(element))?;
            }
            Event::Start(element)
                if !in_body
                    && group_depth == 0
                    && filled < replacements.len()
                    && is_shape_text_body(&element) =>
            {
                in_body = true;
                writer.write_event(Event::Start(element))?;
            }
            Event::Empty(element)
                if group_depth == 0
                    && filled < replacements.len()
                    && is_shape_text_body(&element) =>
            {
                let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
                writer.write_event(Event::Start(element))?;
                writer
                    .get_mut()
                    .write_all(paragraph_xml(&replacements[filled]).as_bytes())?;
                writer.write_event(Event::End(BytesEnd::new(name)))?;
                filled += 1;
            }
            Event::Start(element) if in_body && element.local_name().as_ref() == b"p" => {
                skip_depth = 1;
            }
            Event::Empty(element) if in_body && element.local_name().as_ref() == b"p" => {}
            Event::End(element) if in_body && element.local_name().as_ref() == b"txBody" => {
                writer
                    .get_mut()
                    .write_all(paragraph_xml(&replacements[filled]).as_bytes())?;
                writer.write_event(Event::End(element))?;
                filled += 1;
                in_body = false;
            }
            event => writer.write_event(event)?,
        }
    }

    Ok((into_string("introduction slide", writer.into_inner())?, filled))
}

fn is_shape_text_body(element: &BytesStart<'_>) -> bool {
    element.local_name().as_ref() == b"txBody" && element.name().as_ref() != b"a:txBody"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::richtext::Span;

    const SLIDE: &str = concat!(
        r#"<p:sld xmlns:a="a" xmlns:p="p"><p:cSld><p:spTree>"#,
        r#"<p:sp><p:nvSpPr/><p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:r><a:t>Old title</a:t></a:r></a:p><a:p><a:r><a:t>more</a:t></a:r></a:p></p:txBody></p:sp>"#,
        r#"<p:pic/>"#,
        r#"<p:grpSp><p:sp><p:txBody><a:bodyPr/><a:p><a:r><a:t>Grouped</a:t></a:r></a:p></p:txBody></p:sp></p:grpSp>"#,
        r#"<p:sp><p:txBody><a:bodyPr/><a:p/></p:txBody></p:sp>"#,
        r#"<p:sp><p:txBody><a:bodyPr/><a:p><a:r><a:t>Third</a:t></a:r></a:p></p:txBody></p:sp>"#,
        r#"</p:spTree></p:cSld></p:sld>"#
    );

    fn paragraph(text: &str) -> RichParagraph {
        RichParagraph::single(Span::new(text))
    }

    #[test]
    fn intro_rewrite_replaces_first_two_top_level_shapes() {
        let (xml, filled) = rewrite_intro(SLIDE, &[paragraph("New title"), paragraph("Sub")]).unwrap();
        assert_eq!(filled, 2);
        assert!(!xml.contains("Old title"));
        assert!(!xml.contains(">more<"));
        assert!(xml.contains("<a:t>New title</a:t>"));
        assert!(xml.contains("<a:t>Sub</a:t>"));
        assert!(xml.contains("<a:t>Grouped</a:t>"));
        assert!(xml.contains("<a:t>Third</a:t>"));
        assert!(xml.contains("<a:bodyPr/><a:lstStyle/><a:p>"));
    }

    #[test]
    fn intro_rewrite_reports_missing_shapes() {
        let slide = r#"<p:sld xmlns:a="a" xmlns:p="p"><p:cSld><p:spTree><p:sp><p:txBody><a:p/></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#;
        let (xml, filled) = rewrite_intro(slide, &[paragraph("Only"), paragraph("Missing")]).unwrap();
        assert_eq!(filled, 1);
        assert!(xml.contains("<a:t>Only</a:t>"));
        assert!(!xml.contains("Missing"));
    }

    #[test]
    fn slide_ids_are_inserted_after_first() {
        let xml = r#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst><p:sldId id="256" r:id="rId2"/><p:sldId id="257" r:id="rId3"/></p:sldIdLst></p:presentation>"#;
        let entries = [
            SlideEntry {
                id: 258,
                relationship_id: "rId4".into(),
            },
            SlideEntry {
                id: 259,
                relationship_id: "rId5".into(),
            },
        ];
        let rewritten = insert_slide_ids(xml, &entries).unwrap();
        let first = rewritten.find(r#"id="256""#).unwrap();
        let new_a = rewritten.find(r#"<p:sldId id="258" r:id="rId4"/>"#).unwrap();
        let new_b = rewritten.find(r#"<p:sldId id="259" r:id="rId5"/>"#).unwrap();
        let last = rewritten.find(r#"id="257""#).unwrap();
        assert!(first < new_a && new_a < new_b && new_b < last);
    }

    #[test]
    fn presentation_parsing_reads_size_and_slides() {
        let xml = r#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst><p:sldId id="256" r:id="rId2"/></p:sldIdLst><p:sldSz cx="12192000" cy="6858000"/></p:presentation>"#;
        let presentation = parse_presentation("ppt/presentation.xml".into(), xml).unwrap();
        assert_eq!(presentation.slides.len(), 1);
        assert_eq!(presentation.slides[0].relationship_id, "rId2");
        assert_eq!(presentation.master_relationship_id.as_deref(), Some("rId1"));
        assert_eq!(presentation.size_emu, (12_192_000, 6_858_000));
    }
}
