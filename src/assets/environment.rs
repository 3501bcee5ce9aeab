use super::model::{srgb_to_linear, EnvironmentData, TextureData, Texels};
use super::AssetError;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::path::Path;

const MAX_WIDTH: u32 = 2048;

/// Decodes an equirectangular panorama (Radiance HDR or LDR) to linear RGB.
pub fn load_equirect(path: &Path) -> Result<EnvironmentData, AssetError> {
    let display = path.display().to_string();
    let reader = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|source| AssetError::Read {
            path: display.clone(),
            source,
        })?;
    let decoded = reader.decode().map_err(|err| AssetError::DecodeImage {
        path: display.clone(),
        message: err.to_string(),
    })?;
    let texture = to_linear_texture(shrink(decoded), &display);
    log::debug!(
        "Decoded environment {} at {}x{}",
        display,
        texture.width,
        texture.height
    );
    Ok(EnvironmentData { texture })
}

fn shrink(image: DynamicImage) -> DynamicImage {
    if image.width() <= MAX_WIDTH {
        return image;
    }
    let height = ((image.height() as u64 * MAX_WIDTH as u64) / image.width() as u64).max(1) as u32;
    image.resize_exact(MAX_WIDTH, height, FilterType::Triangle)
}

fn to_linear_texture(image: DynamicImage, label: &str) -> TextureData {
    let (width, height) = (image.width(), image.height());
    // Float formats (Radiance HDR, OpenEXR) are already linear; everything else is sRGB.
    let texels = if matches!(
        image,
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_)
    ) {
        image.to_rgb32f().pixels().map(|pixel| pixel.0).collect()
    } else {
        image
            .to_rgb8()
            .pixels()
            .map(|pixel| pixel.0.map(srgb_to_linear))
            .collect()
    };
    TextureData {
        label: label.to_string(),
        width,
        height,
        texels: Texels::RgbF32(texels),
    }
}
