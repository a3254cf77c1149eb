mod support;

use case_review_report::builder::DeckBuilder;
use case_review_report::cases::SummaryTable;
use case_review_report::package::{rels_part_name, Package, CONTENT_TYPES_PART};
use case_review_report::quarter::ReportPeriod;
use case_review_report::report::{render_report, ReportLayout};
use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use support::{contains_run, dr_a_summary, months, slide_parts, summary_row, texts, TemplateFixture};

fn report_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 2).unwrap()
}

fn render(fixture: &TemplateFixture, summary: &SummaryTable) -> (usize, Package) {
    let builder = DeckBuilder::from_bytes(&fixture.build()).expect("open template");
    let period = ReportPeriod::new(2025, 1).unwrap();
    let deck = render_report(builder, summary, &period, report_date(), &ReportLayout::default())
        .expect("render deck");
    let package = Package::from_bytes(&deck.bytes).expect("reopen deck");
    (deck.slide_count, package)
}

fn slide_texts(package: &Package, part: &str) -> Vec<String> {
    texts(package.xml_part(part).unwrap())
}

#[test]
fn dr_a_gets_overall_and_per_gender_slides() {
    let (count, package) = render(&TemplateFixture::default(), &dr_a_summary());
    let slides = slide_parts(&package);
    assert_eq!(count, 4);
    assert_eq!(slides.len(), 4);
    assert_eq!(slides[0], "ppt/slides/slide1.xml");

    let overall = slide_texts(&package, &slides[1]);
    assert_eq!(overall[0], "Diagnosis Results, Overall");
    assert!(contains_run(&overall, &["Facility: North Clinic", "Doctor: Dr. A"]));
    assert!(contains_run(
        &overall,
        &["diag", "2025-01", "2025-02", "2025-03", "X", "2", "0", "1", "Y", "0", "3", "0"]
    ));

    let male = slide_texts(&package, &slides[2]);
    assert_eq!(male[0], "Diagnosis Results, M Patients");
    assert!(contains_run(&male, &["X", "2", "0", "1"]));
    assert!(!male.contains(&"Y".to_owned()));

    let female = slide_texts(&package, &slides[3]);
    assert_eq!(female[0], "Diagnosis Results, F Patients");
    assert!(contains_run(&female, &["Y", "0", "3", "0"]));
    assert!(!female.contains(&"X".to_owned()));
}

#[test]
fn slide_count_is_intro_plus_physicians_plus_gender_groups() {
    let summary = SummaryTable::new(
        months(2025, 1),
        vec![
            summary_row("Dr. A", "X", Some("M"), [1, 0, 0]),
            summary_row("Dr. B", "X", Some("M"), [0, 1, 0]),
            summary_row("Dr. B", "X", Some("F"), [0, 0, 1]),
            summary_row("Dr. B", "Y", None, [1, 1, 1]),
            summary_row("Dr. C", "Z", Some(""), [4, 0, 0]),
        ],
    );
    let (count, package) = render(&TemplateFixture::default(), &summary);
    // 1 intro + 3 overall + (1 + 3 + 1) gender slides
    assert_eq!(count, 9);
    assert_eq!(slide_parts(&package).len(), 9);

    let slides = slide_parts(&package);
    let titles: Vec<String> = slides[1..]
        .iter()
        .map(|part| slide_texts(&package, part)[0].clone())
        .collect();
    assert_eq!(
        titles,
        vec![
            "Diagnosis Results, Overall",
            "Diagnosis Results, M Patients",
            "Diagnosis Results, Overall",
            "Diagnosis Results, M Patients",
            "Diagnosis Results, F Patients",
            "Diagnosis Results, Other Patients",
            "Diagnosis Results, Overall",
            "Diagnosis Results, Other Patients",
        ]
    );
}

#[test]
fn intro_slide_text_is_replaced_and_extra_shapes_kept() {
    let (_, package) = render(&TemplateFixture::default(), &dr_a_summary());
    let intro = slide_texts(&package, "ppt/slides/slide1.xml");
    assert_eq!(
        intro,
        vec![
            "North Clinic - Case Review",
            "(Breakdown by Doctors)",
            "Received Cases: Q1_2025, GPIS LIS",
            "Date Reported: April 02, 2025",
            "Keep me",
        ]
    );

    let xml = package.xml_part("ppt/slides/slide1.xml").unwrap();
    assert!(xml.contains(r#"sz="3000" b="1""#));
    assert!(xml.contains(r#"<a:latin typeface="Arial"/>"#));
}

#[test]
fn single_text_shape_intro_only_gets_title() {
    let fixture = TemplateFixture {
        intro_shapes: vec!["Lonely"],
        ..TemplateFixture::default()
    };
    let (count, package) = render(&fixture, &dr_a_summary());
    assert_eq!(count, 4);
    let intro = slide_texts(&package, "ppt/slides/slide1.xml");
    assert_eq!(intro, vec!["North Clinic - Case Review", "(Breakdown by Doctors)"]);
}

#[test]
fn generated_slides_precede_trailing_template_slides() {
    let fixture = TemplateFixture {
        trailing_slide: true,
        ..TemplateFixture::default()
    };
    let (count, package) = render(&fixture, &dr_a_summary());
    let slides = slide_parts(&package);
    assert_eq!(count, 5);
    assert_eq!(slides.first().map(String::as_str), Some("ppt/slides/slide1.xml"));
    assert_eq!(slides.last().map(String::as_str), Some("ppt/slides/slide2.xml"));
    assert_eq!(
        &slides[1..4],
        &["ppt/slides/slide3.xml", "ppt/slides/slide4.xml", "ppt/slides/slide5.xml"]
    );

    let content_types = package.xml_part(CONTENT_TYPES_PART).unwrap();
    for part in &slides {
        assert!(content_types.contains(&format!("PartName=\"/{part}\"")), "{part}");
    }
}

#[test]
fn generated_slides_use_blank_layout_with_fallback() {
    let (_, package) = render(&TemplateFixture::default(), &dr_a_summary());
    let slides = slide_parts(&package);
    let rels = package.xml_part(&rels_part_name(&slides[1])).unwrap();
    assert!(rels.contains("../slideLayouts/slideLayout7.xml"));

    let fixture = TemplateFixture {
        layouts: 2,
        ..TemplateFixture::default()
    };
    let (_, package) = render(&fixture, &dr_a_summary());
    let slides = slide_parts(&package);
    let rels = package.xml_part(&rels_part_name(&slides[1])).unwrap();
    assert!(rels.contains("../slideLayouts/slideLayout2.xml"));
}

#[test]
fn table_is_centered_on_template_width() {
    let (_, package) = render(&TemplateFixture::default(), &dr_a_summary());
    let slides = slide_parts(&package);
    let xml = package.xml_part(&slides[1]).unwrap();
    // (10in - 4in) / 2 = 3in; top 0.9in; three rows of 0.3in
    assert!(xml.contains(r#"<p:xfrm><a:off x="2743200" y="822960"/><a:ext cx="3657600" cy="822960"/></p:xfrm>"#));
    assert_eq!(xml.matches("<a:gridCol").count(), 4);
    assert!(xml.contains(r#"<a:srgbClr val="FF3333"/>"#));
}

#[test]
fn rendering_is_deterministic() {
    let fixture = TemplateFixture::default();
    let hash = |bytes: &[u8]| Sha256::digest(bytes).to_vec();

    let render_bytes = || {
        let builder = DeckBuilder::from_bytes(&fixture.build()).unwrap();
        render_report(
            builder,
            &dr_a_summary(),
            &ReportPeriod::new(2025, 1).unwrap(),
            report_date(),
            &ReportLayout::default(),
        )
        .unwrap()
        .bytes
    };

    assert_eq!(hash(&render_bytes()), hash(&render_bytes()));
}
