//! Access to the parts of an Open Packaging Conventions archive.
//!
//! A `.pptx` file is a zip archive of XML parts linked together by
//! relationship parts.  [`Package`] keeps every part in memory in archive
//! order so that unchanged parts round-trip byte for byte, and offers the
//! small set of relationship and content-type edits the deck builder needs.

use std::io::{Cursor, Read, Write};

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::DeckBuildError;

/// Part name of the package content-type registry.
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Relationship type linking a presentation to a slide.
pub const SLIDE_RELATIONSHIP: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";

/// Relationship type linking a slide to its layout.
pub const SLIDE_LAYOUT_RELATIONSHIP: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";

/// Content type of a slide part.
pub const SLIDE_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";

/// In-memory view of a zip-based package.
#[derive(Clone, Debug, Default)]
pub struct Package {
    parts: Vec<(String, Vec<u8>)>,
}

impl Package {
    /// Reads every file entry of the archive in `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeckBuildError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_owned();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            parts.push((name, data));
        }

        Ok(Self { parts })
    }

    /// Returns whether a part with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.parts.iter().any(|(part, _)| part == name)
    }

    /// Returns the raw bytes of a part.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(part, _)| part == name)
            .map(|(_, data)| data.as_slice())
    }

    /// Returns a part decoded as UTF-8 text.
    pub fn xml_part(&self, name: &str) -> Result<&str, DeckBuildError> {
        let data = self
            .part(name)
            .ok_or_else(|| DeckBuildError::MissingPart(name.to_owned()))?;
        std::str::from_utf8(data).map_err(|_| DeckBuildError::malformed(name, "not valid UTF-8"))
    }

    /// Replaces the content of an existing part or appends a new one.
    pub fn set_part(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        let name = name.into();
        let data = data.into();
        match self.parts.iter_mut().find(|(part, _)| *part == name) {
            Some((_, existing)) => *existing = data,
            None => self.parts.push((name, data)),
        }
    }

    /// Iterates over the part names in archive order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(name, _)| name.as_str())
    }

    /// Serializes the package into a zip archive.
    ///
    /// Entry timestamps are pinned so identical content yields identical bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DeckBuildError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());

        for (name, data) in &self.parts {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(data)?;
        }

        Ok(writer.finish()?.into_inner())
    }
}

/// A single entry of a relationship part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship identifier, unique within its part (e.g. `rId3`).
    pub id: String,
    /// Relationship type URI.
    pub rel_type: String,
    /// Target of the relationship, usually relative to the source part.
    pub target: String,
}

impl Relationship {
    fn to_element(&self) -> BytesStart<'static> {
        let mut element = BytesStart::new("Relationship");
        element.push_attribute(("Id", self.id.as_str()));
        element.push_attribute(("Type", self.rel_type.as_str()));
        element.push_attribute(("Target", self.target.as_str()));
        element.into_owned()
    }
}

/// Returns the relationship part name belonging to `part`.
///
/// `ppt/slides/slide1.xml` maps to `ppt/slides/_rels/slide1.xml.rels`.
pub fn rels_part_name(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolves a relationship target against the part that declares it.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_owned();
    }

    let mut segments: Vec<&str> = source_part.split('/').collect();
    segments.pop();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Computes the target string that points from `source_part` to `target_part`.
pub fn relative_target(source_part: &str, target_part: &str) -> String {
    let source_dirs: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let target_segments: Vec<&str> = target_part.split('/').collect();
    let (target_dirs, target_file) = target_segments.split_at(target_segments.len() - 1);

    let common = source_dirs
        .iter()
        .zip(target_dirs)
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<&str> = vec![".."; source_dirs.len() - common];
    segments.extend(&target_dirs[common..]);
    segments.extend(target_file);
    segments.join("/")
}

/// Parses the entries of a relationship part.
pub fn parse_relationships(part: &str, xml: &str) -> Result<Vec<Relationship>, DeckBuildError> {
    let mut reader = Reader::from_str(xml);
    let mut relationships = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(element) | Event::Empty(element)
                if element.local_name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut rel_type = None;
                let mut target = None;
                for attribute in element.attributes() {
                    let attribute = attribute?;
                    let value = attribute.unescape_value()?.into_owned();
                    match attribute.key.as_ref() {
                        b"Id" => id = Some(value),
                        b"Type" => rel_type = Some(value),
                        b"Target" => target = Some(value),
                        _ => {}
                    }
                }
                match (id, rel_type, target) {
                    (Some(id), Some(rel_type), Some(target)) => relationships.push(Relationship {
                        id,
                        rel_type,
                        target,
                    }),
                    _ => {
                        return Err(DeckBuildError::malformed(
                            part,
                            "relationship without Id, Type or Target",
                        ))
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(relationships)
}

/// Returns the first `rId{n}` identifier not used by `existing`, counting up from `start`.
pub fn next_relationship_id(existing: &[Relationship], start: usize) -> (String, usize) {
    let mut candidate = start.max(1);
    loop {
        let id = format!("rId{candidate}");
        if !existing.iter().any(|rel| rel.id == id) {
            return (id, candidate + 1);
        }
        candidate += 1;
    }
}

/// Renders a relationship part containing `relationships`.
pub fn relationships_xml(relationships: &[Relationship]) -> Result<String, DeckBuildError> {
    let empty = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        "\n",
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"/>"#
    );
    append_relationships(empty, relationships)
}

/// Appends `relationships` to an existing relationship part.
pub fn append_relationships(
    xml: &str,
    relationships: &[Relationship],
) -> Result<String, DeckBuildError> {
    let children: Vec<BytesStart<'static>> =
        relationships.iter().map(Relationship::to_element).collect();
    append_children(xml, b"Relationships", &children)
}

/// Registers `Override` content types for the given part names.
pub fn add_content_type_overrides(
    xml: &str,
    overrides: &[(String, &str)],
) -> Result<String, DeckBuildError> {
    let children: Vec<BytesStart<'static>> = overrides
        .iter()
        .map(|(part, content_type)| {
            let part_name = format!("/{}", part.trim_start_matches('/'));
            let mut element = BytesStart::new("Override");
            element.push_attribute(("PartName", part_name.as_str()));
            element.push_attribute(("ContentType", *content_type));
            element.into_owned()
        })
        .collect();
    append_children(xml, b"Types", &children)
}

/// Copies `xml`, inserting `children` as the last children of the first
/// element whose local name is `parent`.
fn append_children(
    xml: &str,
    parent: &[u8],
    children: &[BytesStart<'static>],
) -> Result<String, DeckBuildError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + children.len() * 128));
    let mut inserted = false;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::End(end) if !inserted && end.local_name().as_ref() == parent => {
                for child in children {
                    writer.write_event(Event::Empty(child.borrow()))?;
                }
                inserted = true;
                writer.write_event(Event::End(end))?;
            }
            Event::Empty(start) if !inserted && start.local_name().as_ref() == parent => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                writer.write_event(Event::Start(start))?;
                for child in children {
                    writer.write_event(Event::Empty(child.borrow()))?;
                }
                inserted = true;
                writer.write_event(Event::End(BytesEnd::new(name)))?;
            }
            event => writer.write_event(event)?,
        }
    }

    let bytes = writer.into_inner();
    String::from_utf8(bytes).map_err(|_| {
        DeckBuildError::malformed(
            String::from_utf8_lossy(parent).into_owned(),
            "rewritten part is not valid UTF-8",
        )
    })
}
