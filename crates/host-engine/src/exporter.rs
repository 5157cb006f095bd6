use crate::{HostDocument, HostError, ImageExporter};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use layer_model::{ImageFormat, PixelRect};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Encodes the document's visible composite with the `image` crate.
///
/// The destination directory must already exist.
#[derive(Debug, Default)]
pub struct RasterExporter {
    written: Vec<PathBuf>,
}

impl RasterExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl ImageExporter for RasterExporter {
    fn export_region(
        &mut self,
        document: &dyn HostDocument,
        region: PixelRect,
        destination: &Path,
        format: ImageFormat,
    ) -> Result<(), HostError> {
        if region.is_empty() {
            return Err(HostError::EmptyRegion(region));
        }

        let image = document.render_region(region)?;

        match format {
            ImageFormat::Png => image.save_with_format(destination, image::ImageFormat::Png)?,
            ImageFormat::Jpeg { quality } => {
                let rgb = DynamicImage::ImageRgba8(image).to_rgb8();
                let writer = BufWriter::new(File::create(destination)?);
                JpegEncoder::new_with_quality(writer, quality.clamp(1, 100)).encode_image(&rgb)?;
            }
        }

        log::debug!("wrote {}x{} image to {}", region.width(), region.height(), destination.display());
        self.written.push(destination.to_path_buf());
        Ok(())
    }
}
