//! Daily registrations report: one row per registrant of the day.

use crate::models::{DailyRegistration, MISSING_FIELD};
use crate::services::renderer::{
    insert_branding, set_deterministic_properties, RenderError, Styles, FOOTER_TEXT,
    TIMESTAMP_FORMAT,
};
use chrono::{NaiveDate, NaiveDateTime};
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook};
use tracing::{debug, instrument};

pub const REGISTRATION_COLUMNS: [(&str, f64); 12] = [
    ("NOMBRES", 25.0),
    ("APELLIDOS", 25.0),
    ("CORREO", 32.0),
    ("DIRECCIÓN", 32.0),
    ("FECHA NACIMIENTO", 18.0),
    ("TIPO DOCUMENTO", 16.0),
    ("NÚMERO DOCUMENTO", 20.0),
    ("GÉNERO", 12.0),
    ("CELULAR", 16.0),
    ("EDAD", 8.0),
    ("LUGAR", 28.0),
    ("FECHA REGISTRO", 22.0),
];

const LAST_COL: u16 = REGISTRATION_COLUMNS.len() as u16 - 1;

fn row_values(r: &DailyRegistration) -> [String; 12] {
    let or_missing = |v: &Option<String>| v.clone().unwrap_or_else(|| MISSING_FIELD.to_string());
    [
        or_missing(&r.first_names),
        or_missing(&r.last_names),
        or_missing(&r.email),
        or_missing(&r.address),
        r.birth_date.clone().unwrap_or_default(),
        or_missing(&r.document_type),
        or_missing(&r.document_number),
        or_missing(&r.gender),
        or_missing(&r.phone),
        r.age.map(|a| a.to_string()).unwrap_or_default(),
        or_missing(&r.place),
        r.registered_at.format(TIMESTAMP_FORMAT).to_string(),
    ]
}

/// Render the registrations of `date`, already ordered by surname then names.
/// `generated_at` is printed in the summary block.
#[instrument(skip_all, fields(report_date = %date, registrations = registrations.len()))]
pub fn render_registrations(
    date: NaiveDate,
    registrations: &[DailyRegistration],
    generated_at: NaiveDateTime,
    branding: Option<&[u8]>,
) -> Result<Vec<u8>, RenderError> {
    let styles = Styles::new();
    let summary_title = Format::new()
        .set_bold()
        .set_font_size(12)
        .set_background_color(Color::RGB(0xD3D3D3))
        .set_align(FormatAlign::Center);
    let bold = Format::new().set_bold();

    let mut workbook = Workbook::new();
    let date_label = date.format("%d/%m/%Y").to_string();
    set_deterministic_properties(&mut workbook, &format!("Informe INDER {}", date_label), date)?;

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Registros")?;
    for (col, (_, width)) in REGISTRATION_COLUMNS.iter().enumerate() {
        worksheet.set_column_width(col as u16, *width)?;
    }

    worksheet.set_row_height(0, 30)?;
    worksheet.merge_range(
        0,
        0,
        0,
        LAST_COL,
        &format!("INFORME DIARIO INDER - {}", date_label),
        &styles.title,
    )?;
    for (col, (title, _)) in REGISTRATION_COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(1, col as u16, *title, &styles.header)?;
    }

    let mut row: u32 = 2;
    for registration in registrations {
        for (col, value) in row_values(registration).into_iter().enumerate() {
            if value.is_empty() {
                worksheet.write_blank(row, col as u16, &styles.cell)?;
            } else {
                worksheet.write_string_with_format(row, col as u16, value, &styles.cell)?;
            }
        }
        row += 1;
    }

    row += 1;
    worksheet.merge_range(row, 0, row, 2, "INFORMACIÓN DEL INFORME", &summary_title)?;
    worksheet.write_string_with_format(row + 1, 0, "INFORME GENERADO EL:", &bold)?;
    worksheet.write_string(row + 1, 1, generated_at.format(TIMESTAMP_FORMAT).to_string())?;
    worksheet.write_string_with_format(row + 2, 0, "TOTAL DE REGISTROS:", &bold)?;
    worksheet.write_number(row + 2, 1, registrations.len() as f64)?;

    row += 4;
    worksheet.merge_range(row, 0, row, LAST_COL, FOOTER_TEXT, &styles.footer)?;

    insert_branding(
        worksheet,
        row + 2,
        REGISTRATION_COLUMNS.iter().map(|(_, w)| *w),
        branding,
    )?;

    let bytes = workbook.save_to_buffer()?;
    debug!(bytes = bytes.len(), "Registrations workbook rendered");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(last: &str) -> DailyRegistration {
        DailyRegistration {
            first_names: Some("María".to_string()),
            last_names: Some(last.to_string()),
            email: None,
            address: None,
            birth_date: None,
            document_type: Some("CC".to_string()),
            document_number: Some("1001".to_string()),
            gender: None,
            phone: None,
            age: Some(34),
            place: None,
            registered_at: NaiveDate::from_ymd_opt(2025, 5, 20)
                .unwrap()
                .and_hms_opt(9, 15, 0)
                .unwrap(),
        }
    }

    #[test]
    fn row_values_apply_placeholders() {
        let values = row_values(&registration("Rojas"));
        assert_eq!(values[1], "Rojas");
        assert_eq!(values[2], MISSING_FIELD);
        assert_eq!(values[4], "");
        assert_eq!(values[9], "34");
        assert_eq!(values[10], MISSING_FIELD);
        assert_eq!(values[11], "20/05/2025 09:15:00");
    }

    #[test]
    fn renders_a_workbook() {
        let date = NaiveDate::from_ymd_opt(2025, 5, 20).unwrap();
        let generated = date.and_hms_opt(18, 0, 0).unwrap();
        let bytes =
            render_registrations(date, &[registration("A"), registration("B")], generated, None)
                .unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}
