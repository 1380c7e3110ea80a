use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::RgbImage;
use itertools::Itertools;
use ndarray::{s, Array3, Array4};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// One batch of patches in (n, patch_size, patch_size, 3) layout with pixel
/// values rescaled to [0, 1].
pub struct PatchBatch {
    pub images: Array4<f32>,
    pub labels: Vec<i64>,
}

/// Labeled patch files of one dataset split.
///
/// The split directory holds one subdirectory per class. The binary task
/// requires exactly two classes, labeled 0/1 by sorted subdirectory name
/// (so e.g. `no_stoma` < `stoma` makes the stoma class label 1).
pub struct PatchDataset {
    items: Vec<(PathBuf, i64)>,
    pub class_names: Vec<String>,
}

impl PatchDataset {
    pub fn from_dir(root: &Path) -> PatchDataset {
        let mut class_names = fs::read_dir(root)
            .unwrap_or_else(|e| panic!("{}: {}", root.display(), e))
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.is_dir())
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect_vec();
        class_names.sort();
        assert!(
            class_names.len() == 2,
            "expected 2 class directories under {}, found {}",
            root.display(),
            class_names.len()
        );

        let mut items = Vec::new();
        for (label, name) in class_names.iter().enumerate() {
            let class_dir = root.join(name);
            let files = fs::read_dir(&class_dir)
                .unwrap_or_else(|e| panic!("{}: {}", class_dir.display(), e))
                .map(|entry| entry.unwrap().path())
                .filter(|path| path.is_file())
                .sorted()
                .collect_vec();
            for file in files {
                items.push((file, label as i64));
            }
        }
        assert!(!items.is_empty(), "no patch files under {}", root.display());
        PatchDataset { items, class_names }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Infinite, restartable batch sequence over a [`PatchDataset`].
///
/// Cycles over the dataset once per epoch, reshuffling with the seeded rng at
/// each epoch boundary. The final batch of an epoch may be short. With
/// `augment` set, patches get a random horizontal/vertical flip and a random
/// quarter-turn rotation on the way in.
pub struct PatchLoader {
    dataset: PatchDataset,
    patch_size: usize,
    batch_size: usize,
    augment: bool,
    rng: StdRng,
    order: Vec<usize>,
    cursor: usize,
}

impl PatchLoader {
    pub fn new(
        dataset: PatchDataset,
        patch_size: usize,
        batch_size: usize,
        augment: bool,
        seed: u64,
    ) -> PatchLoader {
        assert!(batch_size > 0, "batch_size must be positive");
        let mut rng = StdRng::seed_from_u64(seed);
        let mut order = (0..dataset.len()).collect_vec();
        order.shuffle(&mut rng);
        PatchLoader {
            dataset,
            patch_size,
            batch_size,
            augment,
            rng,
            order,
            cursor: 0,
        }
    }

    pub fn batches_per_epoch(&self) -> usize {
        (self.dataset.len() + self.batch_size - 1) / self.batch_size
    }

    pub fn next_batch(&mut self) -> PatchBatch {
        let end = (self.cursor + self.batch_size).min(self.order.len());
        let indices = self.order[self.cursor..end].to_vec();
        self.cursor = end;
        if self.cursor >= self.order.len() {
            //epoch boundary
            self.order.shuffle(&mut self.rng);
            self.cursor = 0;
        }

        let n = indices.len();
        let mut images = Array4::<f32>::zeros((n, self.patch_size, self.patch_size, 3));
        let mut labels = Vec::with_capacity(n);
        for (i, idx) in indices.into_iter().enumerate() {
            let (path, label) = self.dataset.items[idx].clone();
            let patch = self.load_patch(&path);
            images.slice_mut(s![i, .., .., ..]).assign(&patch);
            labels.push(label);
        }
        PatchBatch { images, labels }
    }

    fn load_patch(&mut self, path: &Path) -> Array3<f32> {
        let size = self.patch_size as u32;
        let img = image::open(path)
            .unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
            .into_rgb8();
        let img = if img.dimensions() == (size, size) {
            img
        } else {
            imageops::resize(&img, size, size, FilterType::Triangle)
        };
        let img = if self.augment {
            self.random_transform(img)
        } else {
            img
        };
        let data = img
            .into_raw()
            .into_iter()
            .map(|v| v as f32 / 255.0)
            .collect_vec();
        Array3::from_shape_vec((self.patch_size, self.patch_size, 3), data).unwrap()
    }

    fn random_transform(&mut self, img: RgbImage) -> RgbImage {
        let mut img = img;
        if self.rng.gen_bool(0.5) {
            img = imageops::flip_horizontal(&img);
        }
        if self.rng.gen_bool(0.5) {
            img = imageops::flip_vertical(&img);
        }
        match self.rng.gen_range(0..4_u8) {
            1 => imageops::rotate90(&img),
            2 => imageops::rotate180(&img),
            3 => imageops::rotate270(&img),
            _ => img,
        }
    }
}

impl Iterator for PatchLoader {
    type Item = PatchBatch;

    fn next(&mut self) -> Option<PatchBatch> {
        Some(self.next_batch())
    }
}
