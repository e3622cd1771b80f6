//! Visual challenge (CAPTCHA) forging.
//!
//! Challenges are composed from a curated image tree: one folder per
//! category, each holding the category's photos. The accepted answers are
//! derived from the main category's folder name and never recoverable from
//! the challenge image itself.

mod generator;

pub use generator::CaptchaForge;

use std::collections::BTreeSet;

/// Strategy deriving the accepted answers from a category name
pub type SolutionNamer = fn(&str) -> BTreeSet<String>;

/// Accept exactly the category name
pub fn exact_name(category: &str) -> BTreeSet<String> {
    BTreeSet::from([category.to_string()])
}

/// Accept the category name plus a naive plural/singular variant
pub fn plural_variants(category: &str) -> BTreeSet<String> {
    let mut solutions = BTreeSet::from([category.to_string()]);
    match category.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => {
            solutions.insert(stem.to_string());
        }
        _ => {
            solutions.insert(format!("{category}s"));
        }
    }
    solutions
}

#[cfg(test)]
pub(crate) mod testutil {
    use image::RgbImage;
    use tempfile::TempDir;

    /// Build a throwaway image tree: one folder per category, `count` small
    /// PNGs in each
    pub(crate) fn image_tree(categories: &[(&str, usize)]) -> TempDir {
        let root = TempDir::new().unwrap();
        for (name, count) in categories {
            let folder = root.path().join(name);
            std::fs::create_dir(&folder).unwrap();
            for i in 0..*count {
                let img = RgbImage::from_pixel(8, 8, image::Rgb([i as u8 * 40, 80, 160]));
                img.save(folder.join(format!("{name}_{i}.png"))).unwrap();
            }
        }
        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_name_is_singleton() {
        assert_eq!(exact_name("otter"), BTreeSet::from(["otter".to_string()]));
    }

    #[test]
    fn plural_variants_go_both_ways() {
        assert_eq!(
            plural_variants("otter"),
            BTreeSet::from(["otter".to_string(), "otters".to_string()])
        );
        assert_eq!(
            plural_variants("otters"),
            BTreeSet::from(["otter".to_string(), "otters".to_string()])
        );
    }
}
