//! Geração do QR code do paciente como data-URL PNG

use anyhow::{Context, Result};
use base64::Engine as _;
use image::{ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;

const MIN_SIZE: u32 = 256;

/// Codifica `value` em um QR code (correção M) e devolve
/// `data:image/png;base64,...`
pub fn png_data_url(value: &str) -> Result<String> {
    let code = QrCode::with_error_correction_level(value.as_bytes(), EcLevel::M)
        .context("Falha ao gerar QR code")?;

    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(MIN_SIZE, MIN_SIZE)
        .quiet_zone(true)
        .build();

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .context("Falha ao codificar PNG do QR code")?;

    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    ))
}
