//! Workbook rendering of grouped documents.

mod common;

use common::*;
use report_service::models::{MatchedRecord, Registrant, ReportDocument};
use report_service::services::aggregator::aggregate;
use report_service::services::render;
use report_service::services::renderer::FOOTER_TEXT;
use rust_decimal::Decimal;
use std::io::{Cursor, Read};

/// 1x1 transparent PNG.
const PIXEL_PNG: [u8; 70] = [
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x64,
    0x60, 0xf8, 0x5f, 0x0f, 0x00, 0x02, 0x87, 0x01, 0x80, 0xeb, 0x47, 0xba, 0x92, 0x00, 0x00,
    0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

fn archive(bytes: &[u8]) -> zip::ZipArchive<Cursor<Vec<u8>>> {
    zip::ZipArchive::new(Cursor::new(bytes.to_vec())).expect("Workbook is not a zip archive")
}

fn part(bytes: &[u8], name: &str) -> String {
    let mut archive = archive(bytes);
    let mut file = archive.by_name(name).expect("Missing workbook part");
    let mut xml = String::new();
    file.read_to_string(&mut xml).unwrap();
    xml
}

fn document() -> ReportDocument {
    let registrant = Registrant::from(&registration(1, "12345"));
    let records = vec![
        MatchedRecord {
            transaction: transaction(1, "12345", 100, "Sede Norte"),
            registrant: registrant.clone(),
        },
        MatchedRecord {
            transaction: transaction(2, "12345", 1_250_000, "Sede Norte"),
            registrant: registrant.clone(),
        },
        MatchedRecord {
            transaction: transaction(3, "12345", 10, "Sede Sur"),
            registrant,
        },
    ];
    aggregate(report_date(), records)
}

#[test]
fn renders_a_zip_container() {
    init_tracing();

    let bytes = render(&document(), None).expect("Failed to render");

    assert!(bytes.len() > 1000);
    assert_eq!(&bytes[..4], b"PK\x03\x04");
}

#[test]
fn rendering_is_deterministic() {
    let first = render(&document(), None).unwrap();
    let second = render(&document(), None).unwrap();

    assert_eq!(first, second);
}

#[test]
fn unreadable_branding_is_not_fatal() {
    let garbage = b"definitely not an image".to_vec();

    let with_garbage = render(&document(), Some(&garbage)).unwrap();
    let without = render(&document(), None).unwrap();

    assert_eq!(with_garbage, without);
}

#[test]
fn missing_amounts_render_as_zero() {
    let mut record = MatchedRecord {
        transaction: transaction(9, "999", 0, "A"),
        registrant: Registrant::from(&registration(2, "999")),
    };
    record.transaction.amount = None;
    let doc = aggregate(report_date(), vec![record]);

    assert_eq!(doc.grand_total(), Decimal::ZERO);
    assert!(render(&doc, None).is_ok());
}

#[test]
fn layout_has_title_headers_groups_and_totals() {
    let bytes = render(&document(), None).unwrap();
    let strings = part(&bytes, "xl/sharedStrings.xml");

    for expected in [
        "INFORME DE TRANSACCIONES - 20/05/2025",
        "NOMBRES",
        "NÚMERO DOCUMENTO",
        "ID PAYPAD",
        "MONTO",
        "FECHA TRANSACCIÓN",
        "PAYPAD",
        "Paypad: Sede Norte",
        "Paypad: Sede Sur",
        "Subtotal Sede Norte (2 transacciones)",
        "Subtotal Sede Sur (1 transacciones)",
        "TOTAL GENERAL (3 transacciones)",
        "Nombre1",
        "20/05/2025 09:00:00",
        FOOTER_TEXT,
    ] {
        assert!(strings.contains(expected), "missing {expected:?}");
    }
}

#[test]
fn bands_are_merged_across_the_table() {
    let bytes = render(&document(), None).unwrap();
    let sheet = part(&bytes, "xl/worksheets/sheet1.xml");

    // Title, group headers, subtotal/total labels up to MONTO, footer.
    for range in [
        "A1:O1", "A3:O3", "A6:L6", "A7:O7", "A9:L9", "A10:L10", "A12:O12",
    ] {
        assert!(
            sheet.contains(&format!("<mergeCell ref=\"{range}\"/>")),
            "missing merge {range}"
        );
    }
}

/// The `<c>` element of `reference` in a worksheet part.
fn cell<'a>(sheet: &'a str, reference: &str) -> &'a str {
    let start = sheet
        .find(&format!("<c r=\"{reference}\""))
        .unwrap_or_else(|| panic!("missing cell {reference}"));
    let len = sheet[start..].find("</c>").map(|end| end + 4).unwrap_or(0);
    &sheet[start..start + len]
}

#[test]
fn amounts_and_terminal_ids_are_numeric_cells() {
    let bytes = render(&document(), None).unwrap();
    let sheet = part(&bytes, "xl/worksheets/sheet1.xml");

    // Row 5 holds the second record: paypad id 20, amount 1,250,000.
    let paypad_id = cell(&sheet, "J5");
    assert!(!paypad_id.contains("t=\"s\""), "{paypad_id}");
    assert!(paypad_id.contains("<v>20</v>"), "{paypad_id}");

    let amount = cell(&sheet, "M5");
    assert!(!amount.contains("t=\"s\""), "{amount}");
    assert!(amount.contains("<v>1250000</v>"), "{amount}");

    assert!(part(&bytes, "xl/styles.xml").contains("#,##0.00"));
}

#[test]
fn branding_image_is_embedded() {
    let bytes = render(&document(), Some(&PIXEL_PNG)).unwrap();

    let names: Vec<String> = archive(&bytes).file_names().map(str::to_string).collect();
    assert!(names.iter().any(|n| n == "xl/media/image1.png"));

    let without = render(&document(), None).unwrap();
    assert!(!archive(&without)
        .file_names()
        .any(|n| n.starts_with("xl/media/")));
}
