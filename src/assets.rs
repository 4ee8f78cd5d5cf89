//! PNG export of the binary images shipped with cores and platforms.
//!
//! The `.bin` images are 16 bits per pixel, little endian, stored rotated 90
//! degrees counter-clockwise. Only the high byte carries intensity.

use std::fs;
use std::path::{Path, PathBuf};

use image::{imageops, GrayImage, ImageFormat, Luma};
use tracing::{debug, info};

use crate::contract::AssetExporter;
use crate::definition::PocketTree;
use crate::error::ExportError;

pub const ICON_WIDTH: u32 = 36;
pub const ICON_HEIGHT: u32 = 36;

pub const PLATFORM_IMAGE_WIDTH: u32 = 521;
pub const PLATFORM_IMAGE_HEIGHT: u32 = 165;

/// Writes core icons to `icons_dir/<core id>.png` and platform images to
/// `platforms_dir/<platform id>.png`.
#[derive(Debug, Clone)]
pub struct PngExporter {
    icons_dir: PathBuf,
    platforms_dir: PathBuf,
}

impl PngExporter {
    pub fn new(icons_dir: impl Into<PathBuf>, platforms_dir: impl Into<PathBuf>) -> Self {
        Self {
            icons_dir: icons_dir.into(),
            platforms_dir: platforms_dir.into(),
        }
    }

    pub fn icon_output(&self, core_id: &str) -> PathBuf {
        self.icons_dir.join(format!("{core_id}.png"))
    }

    pub fn platform_output(&self, platform_id: &str) -> PathBuf {
        self.platforms_dir.join(format!("{platform_id}.png"))
    }
}

impl AssetExporter for PngExporter {
    fn export_icon(
        &self,
        tree: &PocketTree,
        core_id: &str,
    ) -> Result<Option<PathBuf>, ExportError> {
        convert(
            &tree.icon_path(core_id),
            &self.icon_output(core_id),
            ICON_WIDTH,
            ICON_HEIGHT,
        )
    }

    fn export_platform_image(
        &self,
        tree: &PocketTree,
        platform_id: &str,
    ) -> Result<Option<PathBuf>, ExportError> {
        convert(
            &tree.platform_image_path(platform_id),
            &self.platform_output(platform_id),
            PLATFORM_IMAGE_WIDTH,
            PLATFORM_IMAGE_HEIGHT,
        )
    }
}

fn convert(
    source: &Path,
    output: &Path,
    width: u32,
    height: u32,
) -> Result<Option<PathBuf>, ExportError> {
    if !source.is_file() {
        debug!(path = %source.display(), "No image to export");
        return Ok(None);
    }
    let bytes = fs::read(source).map_err(|e| ExportError::Read {
        path: source.to_path_buf(),
        source: e,
    })?;
    let image = decode_bin(&bytes, width, height).ok_or_else(|| ExportError::Size {
        path: source.to_path_buf(),
        expected: (width * height * 2) as usize,
        actual: bytes.len(),
    })?;

    let write_err = |message: String| ExportError::Write {
        path: output.to_path_buf(),
        message,
    };
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
    }
    image
        .save_with_format(output, ImageFormat::Png)
        .map_err(|e| write_err(e.to_string()))?;
    info!(source = %source.display(), output = %output.display(), "Exported image");
    Ok(Some(output.to_path_buf()))
}

/// Decodes a rotated 16-bit image into an upright `width` x `height` greyscale image.
///
/// Returns `None` if `bytes` is not exactly `width * height * 2` long.
pub fn decode_bin(bytes: &[u8], width: u32, height: u32) -> Option<GrayImage> {
    if bytes.len() != (width * height * 2) as usize {
        return None;
    }
    // On disk the image is `height` pixels wide and `width` pixels tall.
    let mut stored = GrayImage::new(height, width);
    for (i, word) in bytes.chunks_exact(2).enumerate() {
        let intensity = u16::from_le_bytes([word[0], word[1]]) >> 8;
        let x = i as u32 % height;
        let y = i as u32 / height;
        stored.put_pixel(x, y, Luma([255 - intensity as u8]));
    }
    Some(imageops::rotate90(&stored))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn decode_rejects_wrong_length() {
        assert!(decode_bin(&[0u8; 10], 2, 2).is_none());
    }

    #[test]
    fn decode_rotates_upright_and_inverts() {
        // Stored 2 wide x 3 tall (height 2, width 3 upright).
        // Only the stored top-left pixel has full intensity.
        let mut bytes = vec![0u8; 3 * 2 * 2];
        bytes[1] = 0xff;
        let img = decode_bin(&bytes, 3, 2).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        // Rotating clockwise moves the stored top-left corner to the top-right.
        assert_eq!(img.get_pixel(2, 0), &Luma([0]));
        assert_eq!(img.get_pixel(0, 0), &Luma([255]));
        assert_eq!(img.get_pixel(2, 1), &Luma([255]));
    }

    #[test]
    fn missing_icon_is_a_silent_no_op() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Cores/a.b")).unwrap();
        let tree = PocketTree::locate(dir.path()).unwrap();
        let out = dir.path().join("out");
        let exporter = PngExporter::new(out.join("authors"), out.join("platforms"));
        assert_eq!(exporter.export_icon(&tree, "a.b").unwrap(), None);
        assert!(!out.exists());
    }

    #[test]
    fn exports_icon_to_id_derived_path() {
        let dir = tempdir().unwrap();
        let core_dir = dir.path().join("Cores/a.b");
        std::fs::create_dir_all(&core_dir).unwrap();
        std::fs::write(
            core_dir.join("icon.bin"),
            vec![0x00u8; (ICON_WIDTH * ICON_HEIGHT * 2) as usize],
        )
        .unwrap();
        let tree = PocketTree::locate(dir.path()).unwrap();
        let exporter = PngExporter::new(dir.path().join("authors"), dir.path().join("platforms"));

        let written = exporter.export_icon(&tree, "a.b").unwrap().unwrap();
        assert_eq!(written, dir.path().join("authors/a.b.png"));
        let png = image::open(&written).unwrap();
        assert_eq!((png.width(), png.height()), (ICON_WIDTH, ICON_HEIGHT));

        // A second export overwrites in place.
        exporter.export_icon(&tree, "a.b").unwrap();
        assert_eq!(std::fs::read_dir(dir.path().join("authors")).unwrap().count(), 1);
    }

    #[test]
    fn truncated_platform_image_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Cores")).unwrap();
        let images = dir.path().join("Platforms/_images");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::write(images.join("gb.bin"), [0u8; 16]).unwrap();
        let tree = PocketTree::locate(dir.path()).unwrap();
        let exporter = PngExporter::new(dir.path().join("a"), dir.path().join("p"));
        assert!(matches!(
            exporter.export_platform_image(&tree, "gb"),
            Err(ExportError::Size { .. })
        ));
    }
}
