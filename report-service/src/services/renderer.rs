//! Spreadsheet rendering of the grouped transactions report.

use crate::models::{MatchedRecord, ReportDocument, ReportGroup};
use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{
    Color, DocProperties, ExcelDateTime, Format, FormatAlign, FormatBorder, Image, Workbook,
    Worksheet, XlsxError,
};
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub const FOOTER_TEXT: &str = "© INDER 2025 - TODOS LOS DERECHOS RESERVADOS";

pub(crate) const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";
pub(crate) const AMOUNT_FORMAT: &str = "#,##0.00";

/// Column titles and widths, in sheet order.
pub const TRANSACTION_COLUMNS: [(&str, f64); 15] = [
    ("NOMBRES", 25.0),
    ("APELLIDOS", 25.0),
    ("CORREO", 32.0),
    ("DIRECCIÓN", 32.0),
    ("FECHA NACIMIENTO", 18.0),
    ("TIPO DOCUMENTO", 16.0),
    ("NÚMERO DOCUMENTO", 20.0),
    ("GÉNERO", 12.0),
    ("CELULAR", 16.0),
    ("ID PAYPAD", 11.0),
    ("REFERENCIA", 22.0),
    ("PRODUCTO", 28.0),
    ("MONTO", 20.0),
    ("FECHA TRANSACCIÓN", 22.0),
    ("PAYPAD", 28.0),
];

const LAST_COL: u16 = TRANSACTION_COLUMNS.len() as u16 - 1;
const PAYPAD_ID_COL: u16 = 9;
const AMOUNT_COL: u16 = 12;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("amount {0} of transaction {1} cannot be rendered")]
    Amount(Decimal, i32),
}

/// Cell formats shared by both report layouts.
pub(crate) struct Styles {
    pub title: Format,
    pub header: Format,
    pub group: Format,
    pub cell: Format,
    pub amount: Format,
    pub total_label: Format,
    pub total_amount: Format,
    pub footer: Format,
}

impl Styles {
    pub fn new() -> Self {
        let bordered = Format::new().set_border(FormatBorder::Thin);
        Self {
            title: Format::new()
                .set_bold()
                .set_font_size(16)
                .set_font_color(Color::White)
                .set_background_color(Color::RGB(0x0070C0))
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            header: bordered
                .clone()
                .set_bold()
                .set_font_size(12)
                .set_background_color(Color::RGB(0xADD8E6))
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            group: bordered
                .clone()
                .set_bold()
                .set_background_color(Color::RGB(0xDDEBF7)),
            cell: bordered.clone(),
            amount: bordered.clone().set_num_format(AMOUNT_FORMAT),
            total_label: bordered
                .clone()
                .set_bold()
                .set_background_color(Color::RGB(0xF2F2F2))
                .set_align(FormatAlign::Right),
            total_amount: bordered
                .set_bold()
                .set_background_color(Color::RGB(0xF2F2F2))
                .set_num_format(AMOUNT_FORMAT),
            footer: Format::new()
                .set_italic()
                .set_font_size(9)
                .set_align(FormatAlign::Center),
        }
    }
}

/// Pin the workbook metadata to the report date so identical input renders
/// identical bytes.
pub(crate) fn set_deterministic_properties(
    workbook: &mut Workbook,
    title: &str,
    date: NaiveDate,
) -> Result<(), XlsxError> {
    let created = ExcelDateTime::from_ymd(date.year() as u16, date.month() as u8, date.day() as u8)?;
    let properties = DocProperties::new()
        .set_title(title)
        .set_author("INDER")
        .set_creation_datetime(&created);
    workbook.set_properties(&properties);
    Ok(())
}

/// Place the branding image at `row`, scaled to span `widths`. A missing or
/// unreadable image is logged and skipped.
pub(crate) fn insert_branding(
    worksheet: &mut Worksheet,
    row: u32,
    widths: impl Iterator<Item = f64>,
    branding: Option<&[u8]>,
) -> Result<(), XlsxError> {
    let Some(bytes) = branding else {
        debug!("No branding image, skipping");
        return Ok(());
    };

    let image = match Image::new_from_buffer(bytes) {
        Ok(image) => image,
        Err(e) => {
            warn!(error = %e, "Branding image could not be decoded, skipping");
            return Ok(());
        }
    };

    // Excel column width in characters to pixels at the default font.
    let table_px: f64 = widths.map(|w| (w * 7.0 + 5.0).round()).sum();
    let scale = if image.width() > 0.0 {
        table_px / image.width()
    } else {
        1.0
    };
    let image = image.set_scale_width(scale).set_scale_height(scale);

    worksheet.insert_image(row, 0, &image)?;
    Ok(())
}

pub(crate) fn amount_value(amount: Decimal, transaction_id: i32) -> Result<f64, RenderError> {
    amount
        .to_f64()
        .ok_or(RenderError::Amount(amount, transaction_id))
}

/// Render `doc` as an xlsx workbook.
///
/// Layout: title band, header band, then per group a header row, one row per
/// record and a subtotal row; then the grand total, the footer and the
/// optional branding image.
#[instrument(skip_all, fields(report_date = %doc.report_date(), groups = doc.groups().len()))]
pub fn render(doc: &ReportDocument, branding: Option<&[u8]>) -> Result<Vec<u8>, RenderError> {
    let styles = Styles::new();
    let mut workbook = Workbook::new();
    let date_label = doc.report_date().format("%d/%m/%Y").to_string();
    set_deterministic_properties(
        &mut workbook,
        &format!("Informe de Transacciones {}", date_label),
        doc.report_date(),
    )?;

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Transacciones")?;

    for (col, (_, width)) in TRANSACTION_COLUMNS.iter().enumerate() {
        worksheet.set_column_width(col as u16, *width)?;
    }

    worksheet.set_row_height(0, 30)?;
    worksheet.merge_range(
        0,
        0,
        0,
        LAST_COL,
        &format!("INFORME DE TRANSACCIONES - {}", date_label),
        &styles.title,
    )?;

    worksheet.set_row_height(1, 20)?;
    for (col, (title, _)) in TRANSACTION_COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(1, col as u16, *title, &styles.header)?;
    }

    let mut row: u32 = 2;
    for group in doc.groups() {
        row = write_group(worksheet, &styles, group, row)?;
    }

    write_total_row(
        worksheet,
        &styles,
        row,
        &format!("TOTAL GENERAL ({} transacciones)", doc.grand_count()),
        doc.grand_total(),
    )?;
    row += 2;

    worksheet.merge_range(row, 0, row, LAST_COL, FOOTER_TEXT, &styles.footer)?;
    row += 2;

    insert_branding(
        worksheet,
        row,
        TRANSACTION_COLUMNS.iter().map(|(_, w)| *w),
        branding,
    )?;

    let bytes = workbook.save_to_buffer()?;
    debug!(bytes = bytes.len(), "Transactions workbook rendered");
    Ok(bytes)
}

fn write_group(
    worksheet: &mut Worksheet,
    styles: &Styles,
    group: &ReportGroup,
    mut row: u32,
) -> Result<u32, RenderError> {
    worksheet.merge_range(
        row,
        0,
        row,
        LAST_COL,
        &format!("Paypad: {}", group.label),
        &styles.group,
    )?;
    row += 1;

    for record in &group.records {
        write_record(worksheet, styles, record, row)?;
        row += 1;
    }

    write_total_row(
        worksheet,
        styles,
        row,
        &format!("Subtotal {} ({} transacciones)", group.label, group.count),
        group.subtotal,
    )?;
    Ok(row + 1)
}

fn write_record(
    worksheet: &mut Worksheet,
    styles: &Styles,
    record: &MatchedRecord,
    row: u32,
) -> Result<(), RenderError> {
    let r = &record.registrant;
    let t = &record.transaction;

    let text = |value: Option<&str>| value.unwrap_or("").to_string();
    let cells: [(u16, String); 13] = [
        (0, r.first_names.clone()),
        (1, r.last_names.clone()),
        (2, r.email.clone()),
        (3, r.address.clone()),
        (4, text(r.birth_date.as_deref())),
        (5, r.document_type.clone()),
        (6, r.document_number.clone()),
        (7, r.gender.clone()),
        (8, r.phone.clone()),
        (10, text(t.reference.as_deref())),
        (11, text(t.product.as_deref())),
        (13, t.created_at.format(TIMESTAMP_FORMAT).to_string()),
        (14, text(t.paypad_description.as_deref())),
    ];

    for (col, value) in cells {
        if value.is_empty() {
            worksheet.write_blank(row, col, &styles.cell)?;
        } else {
            worksheet.write_string_with_format(row, col, value, &styles.cell)?;
        }
    }

    match t.paypad_id {
        Some(id) => worksheet.write_number_with_format(row, PAYPAD_ID_COL, id, &styles.cell)?,
        None => worksheet.write_blank(row, PAYPAD_ID_COL, &styles.cell)?,
    };

    worksheet.write_number_with_format(
        row,
        AMOUNT_COL,
        amount_value(t.amount_or_zero(), t.id)?,
        &styles.amount,
    )?;
    Ok(())
}

fn write_total_row(
    worksheet: &mut Worksheet,
    styles: &Styles,
    row: u32,
    label: &str,
    amount: Decimal,
) -> Result<(), RenderError> {
    worksheet.merge_range(row, 0, row, AMOUNT_COL - 1, label, &styles.total_label)?;
    worksheet.write_number_with_format(row, AMOUNT_COL, amount_value(amount, 0)?, &styles.total_amount)?;
    worksheet.merge_range(row, AMOUNT_COL + 1, row, LAST_COL, "", &styles.total_label)?;
    Ok(())
}
