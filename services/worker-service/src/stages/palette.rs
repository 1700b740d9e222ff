use std::io::Cursor;

use image::ImageFormat;

use crate::error::{GatewayError, RenderError};
use crate::gateway::GenerationGateway;
use crate::models::Palette;

/// Ask the gateway for `count` palettes matching the theme.
pub async fn generate_palettes(
    gateway: &dyn GenerationGateway,
    theme: &str,
    count: u32,
) -> Result<Vec<Palette>, GatewayError> {
    let palettes = gateway.generate_palettes(theme, count).await?;
    if palettes.is_empty() {
        return Err(GatewayError::Generation(
            "gateway returned no palettes".to_string(),
        ));
    }
    Ok(palettes)
}

/// Recolor the base image with one palette. Decoding and pixel mapping are
/// CPU-bound, so the work runs off the async threads.
pub async fn apply_palette(base: &[u8], colors: &[String]) -> Result<Vec<u8>, RenderError> {
    let ramp = parse_colors(colors)?;
    let base = base.to_vec();
    tokio::task::spawn_blocking(move || recolor(&base, &ramp))
        .await
        .map_err(|_| RenderError::Interrupted)?
}

fn parse_colors(colors: &[String]) -> Result<Vec<[u8; 3]>, RenderError> {
    if colors.is_empty() {
        return Err(RenderError::InvalidColor("empty palette".to_string()));
    }
    colors.iter().map(|value| parse_hex(value)).collect()
}

fn parse_hex(value: &str) -> Result<[u8; 3], RenderError> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RenderError::InvalidColor(value.to_string()));
    }
    let channel = |range| u8::from_str_radix(&hex[range], 16);
    match (channel(0..2), channel(2..4), channel(4..6)) {
        (Ok(r), Ok(g), Ok(b)) => Ok([r, g, b]),
        _ => Err(RenderError::InvalidColor(value.to_string())),
    }
}

fn recolor(bytes: &[u8], colors: &[[u8; 3]]) -> Result<Vec<u8>, RenderError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|err| RenderError::Decode(err.to_string()))?;
    let mut rgba = decoded.to_rgba8();

    // Order the palette dark to light so luminance maps onto a ramp.
    let mut ramp = colors.to_vec();
    ramp.sort_by_key(|color| luminance(color) as u32);

    for pixel in rgba.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        if a == 0 {
            continue;
        }
        let luma = luminance(&[r, g, b]) / 255.0;
        let mapped = sample_ramp(&ramp, luma);
        pixel.0 = [mapped[0], mapped[1], mapped[2], a];
    }

    let mut out = Vec::new();
    rgba.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|err| RenderError::Encode(err.to_string()))?;
    Ok(out)
}

fn luminance(color: &[u8; 3]) -> f32 {
    0.2126 * color[0] as f32 + 0.7152 * color[1] as f32 + 0.0722 * color[2] as f32
}

fn sample_ramp(ramp: &[[u8; 3]], position: f32) -> [u8; 3] {
    if ramp.len() == 1 {
        return ramp[0];
    }
    let scaled = position.clamp(0.0, 1.0) * (ramp.len() - 1) as f32;
    let lower = scaled.floor() as usize;
    let upper = scaled.ceil() as usize;
    let fraction = scaled - lower as f32;

    let mut mixed = [0u8; 3];
    for channel in 0..3 {
        let low = ramp[lower][channel] as f32;
        let high = ramp[upper][channel] as f32;
        mixed[channel] = (low + (high - low) * fraction).round() as u8;
    }
    mixed
}
