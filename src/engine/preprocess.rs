//! Image preprocessing for the detection network

use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb};
use ndarray::Array4;
use serde::Deserialize;

/// Channel layout the network expects in its input tensor
///
/// Open Model Zoo IRs converted from Caffe/TensorFlow keep the BGR order
/// of their training pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Bgr,
    Rgb,
}

/// Fit the image inside the network input, padding the remainder
///
/// Returns the padded image together with the mapping needed to bring
/// network coordinates back to the source image.
pub fn letterbox(image: &DynamicImage, target: (u32, u32)) -> (DynamicImage, ResizeInfo) {
    let (target_w, target_h) = target;
    let info = ResizeInfo::letterbox(image.dimensions(), target);

    let new_w = ((info.original_width as f32 * info.scale_x) as u32).clamp(1, target_w);
    let new_h = ((info.original_height as f32 * info.scale_y) as u32).clamp(1, target_h);

    let resized = image.resize_exact(new_w, new_h, image::imageops::FilterType::Triangle);

    let mut padded = ImageBuffer::from_pixel(target_w, target_h, Rgb([0u8, 0, 0]));
    image::imageops::overlay(
        &mut padded,
        &resized.to_rgb8(),
        info.offset_x as i64,
        info.offset_y as i64,
    );

    (DynamicImage::ImageRgb8(padded), info)
}

/// Resize to the network input ignoring aspect ratio
pub fn stretch(image: &DynamicImage, target: (u32, u32)) -> (DynamicImage, ResizeInfo) {
    let info = ResizeInfo::stretch(image.dimensions(), target);
    let resized = image.resize_exact(target.0, target.1, image::imageops::FilterType::Triangle);
    (resized, info)
}

/// Convert image to an NCHW f32 tensor, values in [0, 255]
pub fn image_to_nchw(image: &DynamicImage, order: ChannelOrder) -> Array4<f32> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    // Source channel written to tensor planes 0, 1, 2
    let planes = match order {
        ChannelOrder::Bgr => [2, 1, 0],
        ChannelOrder::Rgb => [0, 1, 2],
    };

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for (c, &src) in planes.iter().enumerate() {
            tensor[[0, c, y, x]] = pixel[src] as f32;
        }
    }

    tensor
}

/// Decode image from bytes with EXIF orientation handling
pub fn decode_image(data: &[u8]) -> Result<DynamicImage, image::ImageError> {
    let image = image::load_from_memory(data)?;
    Ok(apply_exif_orientation(data, image))
}

/// Rotate/flip pixels according to the EXIF orientation tag, if any
fn apply_exif_orientation(data: &[u8], image: DynamicImage) -> DynamicImage {
    use std::io::Cursor;

    let orientation = match exif::Reader::new().read_from_container(&mut Cursor::new(data)) {
        Ok(exif_data) => exif_data
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .unwrap_or(1),
        Err(_) => 1,
    };

    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// Mapping between source image and network input coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeInfo {
    pub scale_x: f32,
    pub scale_y: f32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub input_width: u32,
    pub input_height: u32,
    pub original_width: u32,
    pub original_height: u32,
}

impl ResizeInfo {
    /// Uniform scale with the image centered on the input canvas
    pub fn letterbox(original: (u32, u32), target: (u32, u32)) -> Self {
        let (orig_w, orig_h) = original;
        let (target_w, target_h) = target;

        let scale = f32::min(
            target_w as f32 / orig_w as f32,
            target_h as f32 / orig_h as f32,
        );

        let new_w = ((orig_w as f32 * scale) as u32).clamp(1, target_w);
        let new_h = ((orig_h as f32 * scale) as u32).clamp(1, target_h);

        Self {
            scale_x: scale,
            scale_y: scale,
            offset_x: (target_w - new_w) / 2,
            offset_y: (target_h - new_h) / 2,
            input_width: target_w,
            input_height: target_h,
            original_width: orig_w,
            original_height: orig_h,
        }
    }

    /// Independent scale per axis, no padding
    pub fn stretch(original: (u32, u32), target: (u32, u32)) -> Self {
        let (orig_w, orig_h) = original;
        let (target_w, target_h) = target;

        Self {
            scale_x: target_w as f32 / orig_w as f32,
            scale_y: target_h as f32 / orig_h as f32,
            offset_x: 0,
            offset_y: 0,
            input_width: target_w,
            input_height: target_h,
            original_width: orig_w,
            original_height: orig_h,
        }
    }

    /// Convert network input pixel coordinates back to original image space
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let x = (x - self.offset_x as f32) / self.scale_x;
        let y = (y - self.offset_y as f32) / self.scale_y;
        (x, y)
    }

    /// Convert coordinates normalized to the network input into original
    /// image pixels, clamped to the image bounds
    pub fn normalized_to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let (x, y) = self.to_original(x * self.input_width as f32, y * self.input_height as f32);
        (
            x.clamp(0.0, self.original_width as f32),
            y.clamp(0.0, self.original_height as f32),
        )
    }
}
