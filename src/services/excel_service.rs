// src/services/excel_service.rs
//
// Modelo de importação (rust_xlsxwriter) e leitura do upload (calamine).
// Aqui só há validação rasa, linha a linha; a reconciliação com o banco fica
// no `import_service`.

use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook};

use crate::{
    common::error::{AppError, AppResult},
    models::operations::{ImportRowError, OperationImportRow, RawOperationRow},
};

pub const OPERATIONS_SHEET: &str = "Operaciones";
pub const INSTRUCTIONS_SHEET: &str = "Instrucciones";

/// Colunas da planilha, na ordem.
pub const COLUMNS: [&str; 15] = [
    "operationNumber",
    "scheduledStartDate",
    "scheduledEndDate",
    "clientName",
    "providerName",
    "routeName",
    "driverRut",
    "vehiclePlateNumber",
    "operationType",
    "origin",
    "destination",
    "distance",
    "cargoDescription",
    "cargoWeight",
    "notes",
];

const EXAMPLE_ROWS: [[&str; 15]; 2] = [
    [
        "OP-2025-001",
        "2025-03-10 08:00",
        "2025-03-10 18:00",
        "Agrícola Los Andes Ltda",
        "",
        "Santiago - Valparaíso",
        "12.345.678-9",
        "ABCD-12",
        "Transporte de carga",
        "Santiago",
        "Valparaíso",
        "120.5",
        "Cajas de fruta",
        "8500",
        "",
    ],
    [
        "OP-2025-002",
        "2025-03-11",
        "",
        "",
        "Combustibles del Sur SpA",
        "",
        "9.876.543-2",
        "WXYZ-34",
        "Retiro",
        "Rancagua",
        "Talca",
        "",
        "",
        "",
        "Coordinar con bodega",
    ],
];

const INSTRUCTIONS: [(&str, &str); 15] = [
    ("operationNumber", "Obligatorio. Único por operador (máx. 50)."),
    ("scheduledStartDate", "Obligatorio. AAAA-MM-DD HH:MM o AAAA-MM-DD."),
    ("scheduledEndDate", "Opcional. Mismo formato; no puede ser anterior al inicio."),
    ("clientName", "Opcional. Razón social exacta de un cliente registrado."),
    ("providerName", "Opcional. Razón social exacta de un proveedor registrado."),
    ("routeName", "Opcional. Nombre exacto de una ruta registrada."),
    ("driverRut", "Obligatorio. RUT de un conductor activo."),
    ("vehiclePlateNumber", "Obligatorio. Patente de un vehículo activo."),
    ("operationType", "Obligatorio (máx. 100)."),
    ("origin", "Obligatorio (máx. 200)."),
    ("destination", "Obligatorio (máx. 200)."),
    ("distance", "Opcional. Kilómetros, número no negativo."),
    ("cargoDescription", "Opcional (máx. 500)."),
    ("cargoWeight", "Opcional. Kilos, número no negativo."),
    ("notes", "Opcional (máx. 1000)."),
];

// =============================================================================
//  MODELO
// =============================================================================

/// Gera o .xlsx de modelo: aba "Operaciones" com cabeçalho + 2 exemplos e
/// aba "Instrucciones".
pub fn generate_template() -> AppResult<Vec<u8>> {
    build_template().map_err(|e| AppError::InternalServerError(anyhow::anyhow!("Falha ao gerar modelo: {e}")))
}

fn build_template() -> Result<Vec<u8>, rust_xlsxwriter::XlsxError> {
    let mut workbook = Workbook::new();

    let header = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x1F4E78))
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center);

    let sheet = workbook.add_worksheet();
    sheet.set_name(OPERATIONS_SHEET)?;
    for (col, title) in COLUMNS.iter().enumerate() {
        let col = col as u16;
        sheet.write_string_with_format(0, col, *title, &header)?;
        sheet.set_column_width(col, 22)?;
    }
    for (row, values) in EXAMPLE_ROWS.iter().enumerate() {
        for (col, value) in values.iter().enumerate() {
            if !value.is_empty() {
                sheet.write_string(row as u32 + 1, col as u16, *value)?;
            }
        }
    }
    sheet.set_freeze_panes(1, 0)?;

    let help = workbook.add_worksheet();
    help.set_name(INSTRUCTIONS_SHEET)?;
    help.write_string_with_format(0, 0, "Columna", &header)?;
    help.write_string_with_format(0, 1, "Descripción", &header)?;
    help.set_column_width(0, 24)?;
    help.set_column_width(1, 70)?;
    for (row, (column, text)) in INSTRUCTIONS.iter().enumerate() {
        help.write_string(row as u32 + 1, 0, *column)?;
        help.write_string(row as u32 + 1, 1, *text)?;
    }

    workbook.save_to_buffer()
}

// =============================================================================
//  LEITURA
// =============================================================================

/// Lê a aba "Operaciones". Linhas vazias são ignoradas; o número de cada
/// linha é o da planilha (cabeçalho = 1).
pub fn parse_workbook(bytes: &[u8]) -> AppResult<Vec<RawOperationRow>> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e| AppError::InvalidWorkbook(format!("Arquivo não é um .xlsx válido: {e}")))?;

    let range = workbook
        .worksheet_range(OPERATIONS_SHEET)
        .map_err(|_| AppError::InvalidWorkbook(format!("A aba '{OPERATIONS_SHEET}' não foi encontrada.")))?;

    // Linha 0-based onde o range começa (pode não ser a primeira da planilha)
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);

    let mut rows = Vec::new();
    for (offset, cells) in range.rows().enumerate().skip(1) {
        let values: Vec<Option<String>> = (0..COLUMNS.len())
            .map(|i| cells.get(i).and_then(cell_text))
            .collect();
        if values.iter().all(Option::is_none) {
            continue;
        }
        rows.push(raw_row(first_row + offset + 1, values));
    }
    Ok(rows)
}

fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => value.format("%Y-%m-%d %H:%M").to_string(),
            None => dt.as_f64().to_string(),
        },
    };
    (!text.is_empty()).then_some(text)
}

fn raw_row(row: usize, values: Vec<Option<String>>) -> RawOperationRow {
    let mut it = values.into_iter();
    let mut next = || it.next().flatten();
    RawOperationRow {
        row: Some(row),
        operation_number: next(),
        scheduled_start_date: next(),
        scheduled_end_date: next(),
        client_name: next(),
        provider_name: next(),
        route_name: next(),
        driver_rut: next(),
        vehicle_plate_number: next(),
        operation_type: next(),
        origin: next(),
        destination: next(),
        distance: next(),
        cargo_description: next(),
        cargo_weight: next(),
        notes: next(),
    }
}

// =============================================================================
//  VALIDAÇÃO RASA
// =============================================================================

/// Separa linhas aptas para a reconciliação das que falham na validação rasa.
/// Linhas sem número recebem a posição (1-based) no lote.
pub fn validate_rows(rows: Vec<RawOperationRow>) -> (Vec<OperationImportRow>, Vec<ImportRowError>) {
    let mut valid = Vec::new();
    let mut errors = Vec::new();

    for (index, raw) in rows.into_iter().enumerate() {
        let row = raw.row.unwrap_or(index + 1);
        let mut row_errors = Vec::new();
        if let Some(parsed) = validate_row(row, raw, &mut row_errors) {
            valid.push(parsed);
        }
        errors.extend(row_errors);
    }

    (valid, errors)
}

fn validate_row(row: usize, raw: RawOperationRow, errors: &mut Vec<ImportRowError>) -> Option<OperationImportRow> {
    let operation_number = required(row, "operationNumber", raw.operation_number, 50, errors);
    let driver_rut = required(row, "driverRut", raw.driver_rut, 20, errors);
    let vehicle_plate_number = required(row, "vehiclePlateNumber", raw.vehicle_plate_number, 20, errors);
    let operation_type = required(row, "operationType", raw.operation_type, 100, errors);
    let origin = required(row, "origin", raw.origin, 200, errors);
    let destination = required(row, "destination", raw.destination, 200, errors);

    let scheduled_start_date = match clean(raw.scheduled_start_date) {
        None => {
            errors.push(ImportRowError::new(row, "scheduledStartDate", "Campo obrigatório.", None));
            None
        }
        Some(text) => date(row, "scheduledStartDate", &text, errors),
    };
    let scheduled_end_date = clean(raw.scheduled_end_date).and_then(|text| date(row, "scheduledEndDate", &text, errors));

    let client_name = optional(row, "clientName", raw.client_name, 200, errors);
    let provider_name = optional(row, "providerName", raw.provider_name, 200, errors);
    let route_name = optional(row, "routeName", raw.route_name, 150, errors);
    let cargo_description = optional(row, "cargoDescription", raw.cargo_description, 500, errors);
    let notes = optional(row, "notes", raw.notes, 1000, errors);

    let distance = clean(raw.distance).and_then(|text| number(row, "distance", &text, errors));
    let cargo_weight = clean(raw.cargo_weight).and_then(|text| number(row, "cargoWeight", &text, errors));

    if !errors.is_empty() {
        return None;
    }

    Some(OperationImportRow {
        row,
        operation_number: operation_number?,
        driver_rut: driver_rut?,
        vehicle_plate_number: vehicle_plate_number?,
        operation_type: operation_type?,
        origin: origin?,
        destination: destination?,
        scheduled_start_date: scheduled_start_date?,
        scheduled_end_date,
        client_name: client_name.flatten(),
        provider_name: provider_name.flatten(),
        route_name: route_name.flatten(),
        distance,
        cargo_description: cargo_description.flatten(),
        cargo_weight,
        notes: notes.flatten(),
    })
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn too_long(row: usize, field: &str, value: &str, max: usize) -> ImportRowError {
    ImportRowError::new(row, field, format!("Máximo de {max} caracteres."), Some(value))
}

fn required(
    row: usize,
    field: &str,
    value: Option<String>,
    max: usize,
    errors: &mut Vec<ImportRowError>,
) -> Option<String> {
    match clean(value) {
        None => {
            errors.push(ImportRowError::new(row, field, "Campo obrigatório.", None));
            None
        }
        Some(v) if v.chars().count() > max => {
            errors.push(too_long(row, field, &v, max));
            None
        }
        Some(v) => Some(v),
    }
}

// `Some(None)` = coluna vazia (válido); `None` = erro registrado
fn optional(
    row: usize,
    field: &str,
    value: Option<String>,
    max: usize,
    errors: &mut Vec<ImportRowError>,
) -> Option<Option<String>> {
    match clean(value) {
        None => Some(None),
        Some(v) if v.chars().count() > max => {
            errors.push(too_long(row, field, &v, max));
            None
        }
        Some(v) => Some(Some(v)),
    }
}

/// `AAAA-MM-DD HH:MM`, `AAAA-MM-DD` (meia-noite) ou data nativa do Excel já
/// convertida na leitura.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn date(row: usize, field: &str, text: &str, errors: &mut Vec<ImportRowError>) -> Option<NaiveDateTime> {
    let parsed = parse_date(text);
    if parsed.is_none() {
        errors.push(ImportRowError::new(
            row,
            field,
            "Data inválida: use AAAA-MM-DD HH:MM ou AAAA-MM-DD.",
            Some(text),
        ));
    }
    parsed
}

fn number(row: usize, field: &str, text: &str, errors: &mut Vec<ImportRowError>) -> Option<Decimal> {
    match text.replace(',', ".").parse::<Decimal>() {
        Ok(value) if value.is_sign_negative() => {
            errors.push(ImportRowError::new(row, field, "O valor não pode ser negativo.", Some(text)));
            None
        }
        Ok(value) => Some(value),
        Err(_) => {
            errors.push(ImportRowError::new(row, field, "Número inválido.", Some(text)));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn raw(number: &str) -> RawOperationRow {
        RawOperationRow {
            row: None,
            operation_number: Some(number.into()),
            scheduled_start_date: Some("2025-03-10 08:00".into()),
            driver_rut: Some("12.345.678-9".into()),
            vehicle_plate_number: Some("ABCD-12".into()),
            operation_type: Some("Carga".into()),
            origin: Some("Santiago".into()),
            destination: Some("Valparaíso".into()),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_both_date_formats() {
        assert_eq!(
            parse_date("2025-03-10 08:30").map(|d| d.to_string()),
            Some("2025-03-10 08:30:00".to_string())
        );
        assert_eq!(
            parse_date("2025-03-10").map(|d| d.to_string()),
            Some("2025-03-10 00:00:00".to_string())
        );
        assert!(parse_date("10/03/2025").is_none());
    }

    #[test]
    fn missing_required_fields_are_reported_per_field() {
        let mut row = raw("OP-1");
        row.driver_rut = None;
        row.origin = Some("   ".into());

        let (valid, errors) = validate_rows(vec![row]);
        assert!(valid.is_empty());
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["driverRut", "origin"]);
        assert!(errors.iter().all(|e| e.row == 1));
    }

    #[test]
    fn empty_optional_columns_never_error() {
        let mut row = raw("OP-2");
        row.client_name = Some(String::new());
        row.distance = Some("  ".into());

        let (valid, errors) = validate_rows(vec![row]);
        assert!(errors.is_empty());
        assert_eq!(valid.len(), 1);
        assert!(valid[0].client_name.is_none());
        assert!(valid[0].distance.is_none());
    }

    #[test]
    fn negative_numbers_and_bad_dates_fail() {
        let mut row = raw("OP-3");
        row.row = Some(7);
        row.cargo_weight = Some("-5".into());
        row.scheduled_end_date = Some("mañana".into());

        let (valid, errors) = validate_rows(vec![row]);
        assert!(valid.is_empty());
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.row == 7));
        assert!(errors.iter().any(|e| e.field == "cargoWeight"));
        assert!(errors.iter().any(|e| e.field == "scheduledEndDate"));
    }

    #[test]
    fn decimal_comma_is_accepted() {
        let mut row = raw("OP-4");
        row.distance = Some("120,5".into());
        let (valid, _) = validate_rows(vec![row]);
        assert_eq!(valid[0].distance, Some(Decimal::from_str("120.5").unwrap()));
    }

    #[test]
    fn template_round_trips_through_the_parser() {
        let bytes = generate_template().unwrap();
        let rows = parse_workbook(&bytes).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row, Some(2));
        assert_eq!(rows[0].operation_number.as_deref(), Some("OP-2025-001"));
        assert_eq!(rows[1].provider_name.as_deref(), Some("Combustibles del Sur SpA"));
        assert!(rows[1].client_name.is_none());

        let (valid, errors) = validate_rows(rows);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(valid.len(), 2);
    }

    #[test]
    fn garbage_bytes_are_an_invalid_workbook() {
        let err = parse_workbook(b"isto nao e um xlsx").unwrap_err();
        assert!(matches!(err, AppError::InvalidWorkbook(_)));
    }
}
