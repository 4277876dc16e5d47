#![allow(dead_code)]

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use opencv::core::{CV_8UC3, Mat, Scalar};
use outfitdb::{Error, Result};
use outfitdb::config::DataDir;
use outfitdb::detection::{BBox, DetectionComponent, Detector};
use outfitdb::embedding::{EMBEDDING_DIM, Embedder};
use outfitdb::utils::imencode_jpg;
use outfitdb::{Wardrobe, WardrobeBuilder};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

/// 根据输入内容生成固定随机向量的嵌入模型
pub struct HashEmbedder;

fn hashed_vector(salt: u8, data: &[u8]) -> Vec<f32> {
    let mut hasher = DefaultHasher::new();
    salt.hash(&mut hasher);
    data.hash(&mut hasher);
    let mut rng = StdRng::seed_from_u64(hasher.finish());
    (0..EMBEDDING_DIM).map(|_| rng.random_range(-1.0..1.0)).collect()
}

impl Embedder for HashEmbedder {
    fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>> {
        Ok(hashed_vector(0, image))
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        Ok(hashed_vector(1, text.as_bytes()))
    }
}

/// 无法处理 [`CORRUPT_IMAGE`] 的嵌入模型，`fail_all` 打开时所有图片都会失败
#[derive(Default)]
pub struct PickyEmbedder {
    pub fail_all: AtomicBool,
}

pub const CORRUPT_IMAGE: &[u8] = b"corrupt";

impl PickyEmbedder {
    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }
}

impl Embedder for PickyEmbedder {
    fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>> {
        if image == CORRUPT_IMAGE || self.fail_all.load(Ordering::SeqCst) {
            return Err(Error::Provider("无法解码图片".to_string()));
        }
        HashEmbedder.embed_image(image)
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        HashEmbedder.embed_text(text)
    }
}

/// 总是返回同一组检测结果的检测模型
pub struct FixedDetector(pub Vec<DetectionComponent>);

impl Detector for FixedDetector {
    fn detect(&self, _image: &Mat) -> Result<Vec<DetectionComponent>> {
        Ok(self.0.clone())
    }
}

pub fn component(category: &str, confidence: f32, bbox: [f32; 4]) -> DetectionComponent {
    DetectionComponent {
        category: category.to_string(),
        confidence,
        bbox: BBox { x1: bbox[0], y1: bbox[1], x2: bbox[2], y2: bbox[3] },
    }
}

/// 伪造的图片内容，只用于嵌入
pub fn fake_image(name: &str) -> Vec<u8> {
    format!("image:{name}").into_bytes()
}

/// 生成一张可以解码的纯色 jpg
pub fn solid_jpg(width: i32, height: i32) -> Vec<u8> {
    let mat = Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(128.))
        .expect("failed to create mat");
    imencode_jpg(&mat).expect("failed to encode jpg")
}

pub fn open_wardrobe(dir: &TempDir) -> Wardrobe {
    WardrobeBuilder::new(DataDir::new(dir.path()))
        .embedder(Arc::new(HashEmbedder))
        .open()
        .expect("failed to open wardrobe")
}

pub fn open_picky(dir: &TempDir, embedder: &Arc<PickyEmbedder>) -> Result<Wardrobe> {
    WardrobeBuilder::new(DataDir::new(dir.path())).embedder(embedder.clone()).open()
}

pub fn tags(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|t| t.to_string()).collect()
}
