// src/services/document_service.rs

use genpdf::{elements, style, Element};
use image::Luma;
use qrcode::QrCode;
use uuid::Uuid;

use crate::{
    common::{
        error::{AppError, AppResult},
        scope::TenantScope,
    },
    models::operations::OperationDetail,
    services::operation_service::OperationService,
};

const FONT_FAMILY: &str = "Roboto";

#[derive(Clone)]
pub struct DocumentService {
    operations: OperationService,
    fonts_dir: String,
}

fn pdf_error(e: impl std::fmt::Display) -> AppError {
    AppError::InternalServerError(anyhow::Error::msg(e.to_string()))
}

impl DocumentService {
    pub fn new(operations: OperationService, fonts_dir: String) -> Self {
        Self { operations, fonts_dir }
    }

    /// Relatório PDF da operação. Retorna o número da operação (nome do
    /// arquivo) e os bytes.
    pub async fn operation_report(&self, scope: &TenantScope, operation_id: Uuid) -> AppResult<(String, Vec<u8>)> {
        // 1. Busca os dados
        let detail = self.operations.detail(scope, operation_id).await?;
        let number = detail.operation.operation_number.clone();

        // 2. Monta o PDF
        let bytes = self.render(&detail)?;
        tracing::info!("Relatório da operação '{}' gerado ({} bytes)", number, bytes.len());
        Ok((number, bytes))
    }

    fn render(&self, detail: &OperationDetail) -> AppResult<Vec<u8>> {
        let op = &detail.operation;

        // Fontes da pasta configurada em FONTS_DIR
        let font_family = genpdf::fonts::from_files(&self.fonts_dir, FONT_FAMILY, None)
            .map_err(|_| AppError::FontNotFound(format!("Fonte {FONT_FAMILY} não encontrada em {}", self.fonts_dir)))?;

        let mut doc = genpdf::Document::new(font_family);
        doc.set_title(format!("Operación {}", op.operation_number));
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(10);
        doc.set_page_decorator(decorator);

        // --- CABEÇALHO ---
        doc.push(elements::Paragraph::new(detail.operator_name.clone()).styled(style::Style::new().bold().with_font_size(18)));
        doc.push(elements::Break::new(1.5));
        doc.push(
            elements::Paragraph::new(format!("INFORME DE OPERACIÓN #{}", op.operation_number))
                .styled(style::Style::new().bold().with_font_size(14)),
        );
        doc.push(elements::Paragraph::new(format!("Estado: {}", op.status.as_str())));
        doc.push(elements::Paragraph::new(format!("Emitido: {}", op.updated_at.format("%d/%m/%Y %H:%M"))));
        doc.push(elements::Break::new(2));

        // --- DADOS DA OPERAÇÃO ---
        let date = |d: Option<chrono::DateTime<chrono::Utc>>| {
            d.map(|d| d.format("%d/%m/%Y %H:%M").to_string()).unwrap_or_else(|| "-".to_string())
        };
        let text = |v: Option<&str>| v.unwrap_or("-").to_string();

        let rows: Vec<(&str, String)> = vec![
            ("Tipo", op.operation_type.clone()),
            ("Origen", op.origin.clone()),
            ("Destino", op.destination.clone()),
            ("Inicio programado", date(Some(op.scheduled_start_date))),
            ("Término programado", date(op.scheduled_end_date)),
            ("Inicio real", date(op.actual_start_date)),
            ("Término real", date(op.actual_end_date)),
            ("Conductor", format!("{} ({})", detail.driver_name, detail.driver_rut)),
            ("Vehículo", detail.vehicle_plate_number.clone()),
            ("Cliente", text(detail.client_name.as_deref())),
            ("Proveedor", text(detail.provider_name.as_deref())),
            ("Ruta", text(detail.route_name.as_deref())),
            ("Distancia (km)", op.distance.map(|d| format!("{d:.2}")).unwrap_or_else(|| "-".into())),
            ("Carga", text(op.cargo_description.as_deref())),
            ("Peso (kg)", op.cargo_weight.map(|w| format!("{w:.2}")).unwrap_or_else(|| "-".into())),
        ];

        let mut table = elements::TableLayout::new(vec![2, 5]);
        table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));
        let style_bold = style::Style::new().bold();
        for (label, value) in rows {
            table
                .row()
                .element(elements::Paragraph::new(label).styled(style_bold))
                .element(elements::Paragraph::new(value))
                .push()
                .map_err(pdf_error)?;
        }
        doc.push(table);

        if let Some(notes) = &op.notes {
            doc.push(elements::Break::new(1));
            doc.push(elements::Paragraph::new("Observaciones").styled(style_bold));
            doc.push(elements::Paragraph::new(notes.clone()));
        }

        doc.push(elements::Break::new(2));

        // --- QR CODE do número da operação ---
        let code = QrCode::new(op.operation_number.as_bytes()).map_err(pdf_error)?;
        let image_buffer = code.render::<Luma<u8>>().build();
        let dynamic_image = image::DynamicImage::ImageLuma8(image_buffer);
        let pdf_image = elements::Image::from_dynamic_image(dynamic_image)
            .map_err(pdf_error)?
            .with_scale(genpdf::Scale::new(0.5, 0.5));
        doc.push(pdf_image);

        // 3. Renderiza para buffer
        let mut buffer = Vec::new();
        doc.render(&mut buffer).map_err(pdf_error)?;
        Ok(buffer)
    }
}
