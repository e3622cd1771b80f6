//! CAPTCHA grid composition.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, ImageFormat};
use rand::seq::{IndexedRandom, SliceRandom};
use std::collections::BTreeSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use palisade_common::constants::captcha::{
    GRID_EDGE, MAIN_IMAGES, MIN_CATEGORIES, MIN_IMAGES_PER_CATEGORY, TILE_EDGE,
};
use palisade_common::PalisadeError;

struct Category {
    name: String,
    images: Vec<PathBuf>,
}

/// Forges image-grid challenges from a curated image tree.
///
/// The inventory is scanned and validated once at construction; production
/// topologies fail at startup, not at request time.
pub struct CaptchaForge {
    categories: Vec<Category>,
    namer: super::SolutionNamer,
}

impl CaptchaForge {
    /// Scan `image_root` and validate the inventory
    pub fn new(
        image_root: impl AsRef<Path>,
        namer: super::SolutionNamer,
    ) -> Result<Self, PalisadeError> {
        let root = image_root.as_ref();
        let entries = std::fs::read_dir(root).map_err(|e| {
            PalisadeError::Config(format!(
                "CAPTCHA image root {} is not readable: {e}",
                root.display()
            ))
        })?;

        let mut categories = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| PalisadeError::Config(format!("CAPTCHA inventory scan: {e}")))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            let images = qualifying_images(&path)
                .map_err(|e| PalisadeError::Config(format!("CAPTCHA inventory scan: {e}")))?;

            if images.len() < MIN_IMAGES_PER_CATEGORY {
                return Err(PalisadeError::Config(format!(
                    "CAPTCHA category '{name}' has {} qualifying images, need at least {MIN_IMAGES_PER_CATEGORY}",
                    images.len()
                )));
            }

            categories.push(Category { name, images });
        }

        if categories.len() < MIN_CATEGORIES {
            return Err(PalisadeError::Config(format!(
                "CAPTCHA image root {} holds {} categories, need at least {MIN_CATEGORIES}",
                root.display(),
                categories.len()
            )));
        }

        tracing::info!(
            categories = categories.len(),
            "CAPTCHA inventory validated"
        );

        Ok(Self { categories, namer })
    }

    /// Compose one challenge.
    ///
    /// Draws three images from a random main category and one from a
    /// distinct secondary category, shuffles their placement on the grid,
    /// and returns the JPEG data URI together with the closed accepted
    /// solution set.
    pub fn generate(&self) -> Result<(String, BTreeSet<String>), PalisadeError> {
        let mut rng = rand::rng();

        let main = self
            .categories
            .choose(&mut rng)
            .ok_or_else(|| PalisadeError::Captcha("empty category inventory".to_string()))?;

        let secondary = loop {
            let candidate = self
                .categories
                .choose(&mut rng)
                .ok_or_else(|| PalisadeError::Captcha("empty category inventory".to_string()))?;
            if candidate.name != main.name {
                break candidate;
            }
        };

        let mut tiles: Vec<&PathBuf> = main
            .images
            .choose_multiple(&mut rng, MAIN_IMAGES)
            .collect();
        tiles.extend(secondary.images.choose(&mut rng));
        tiles.shuffle(&mut rng);

        let mut canvas = DynamicImage::new_rgb8(GRID_EDGE, GRID_EDGE);
        for (index, path) in tiles.iter().enumerate() {
            let img = image::open(path).map_err(|e| {
                PalisadeError::Captcha(format!("cannot open {}: {e}", path.display()))
            })?;
            let thumb = img.thumbnail(TILE_EDGE, TILE_EDGE);
            let x = (index as u32 / 2) * TILE_EDGE;
            let y = (index as u32 % 2) * TILE_EDGE;
            image::imageops::overlay(&mut canvas, &thumb, x as i64, y as i64);
        }

        let mut encoded = Vec::new();
        canvas
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Jpeg)
            .map_err(|e| PalisadeError::Captcha(format!("JPEG encoding failed: {e}")))?;

        let data_uri = format!("data:image/jpeg;base64,{}", STANDARD.encode(&encoded));
        let solutions = (self.namer)(&main.name);

        tracing::debug!(category = %main.name, tiles = tiles.len(), "CAPTCHA challenge forged");

        Ok((data_uri, solutions))
    }
}

fn qualifying_images(folder: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let path = entry?.path();
        let qualifies = path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"));
        if qualifies {
            images.push(path);
        }
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captcha::testutil::image_tree;

    #[test]
    fn generates_grid_and_closed_solution_set() {
        let root = image_tree(&[("otter", 3), ("heron", 4)]);
        let forge = CaptchaForge::new(root.path(), super::super::exact_name).unwrap();

        let (data_uri, solutions) = forge.generate().unwrap();
        assert!(data_uri.starts_with("data:image/jpeg;base64,"));
        assert!(
            solutions == BTreeSet::from(["otter".to_string()])
                || solutions == BTreeSet::from(["heron".to_string()])
        );
    }

    #[test]
    fn rejects_single_category() {
        let root = image_tree(&[("otter", 3)]);
        let result = CaptchaForge::new(root.path(), super::super::exact_name);
        assert!(matches!(result, Err(PalisadeError::Config(_))));
    }

    #[test]
    fn rejects_underpopulated_category() {
        let root = image_tree(&[("otter", 3), ("heron", 2)]);
        let result = CaptchaForge::new(root.path(), super::super::exact_name);
        assert!(matches!(result, Err(PalisadeError::Config(_))));
    }

    #[test]
    fn rejects_missing_root() {
        let result = CaptchaForge::new("/nonexistent/captcha-root", super::super::exact_name);
        assert!(matches!(result, Err(PalisadeError::Config(_))));
    }

    #[test]
    fn non_image_files_do_not_qualify() {
        let root = image_tree(&[("otter", 3), ("heron", 2)]);
        std::fs::write(root.path().join("heron").join("notes.txt"), "x").unwrap();
        // The text file must not count toward heron's quota
        let result = CaptchaForge::new(root.path(), super::super::exact_name);
        assert!(matches!(result, Err(PalisadeError::Config(_))));
    }
}
