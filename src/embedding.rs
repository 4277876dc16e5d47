//! 图片与文本的联合嵌入
//!
//! 图片和文本由同一个 CLIP 模型映射到同一个向量空间。入库与查询必须使用同一个
//! 组合函数 [`embed`]，否则距离没有可比性。

use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{
    EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
    TextEmbedding,
};
use log::info;

use crate::error::{Error, Result};

/// 嵌入向量的维数（CLIP ViT-B/32）
pub const EMBEDDING_DIM: usize = 512;

/// 图片/文本嵌入模型
pub trait Embedder: Send + Sync {
    /// 计算图片的嵌入向量，输入为编码后的图片文件内容
    fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>>;

    /// 计算文本的嵌入向量
    fn embed_text(&self, text: &str) -> Result<Vec<f32>>;
}

/// 计算图片（以及可选文本）的嵌入向量
///
/// 提供文本时，图片向量和文本向量分别归一化后逐元素取平均，结果不是单位向量；
/// 否则只返回归一化后的图片向量。
pub fn embed(embedder: &dyn Embedder, image: &[u8], text: Option<&str>) -> Result<Vec<f32>> {
    let image = normalized(check_dim(embedder.embed_image(image)?)?);
    match text {
        Some(text) => {
            let text = normalized(check_dim(embedder.embed_text(text)?)?);
            Ok(fuse(&image, &text))
        }
        None => Ok(image),
    }
}

/// 将两个向量逐元素取平均
pub fn fuse(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b).map(|(x, y)| (x + y) / 2.).collect()
}

/// L2 归一化，零向量保持不变
pub fn normalized(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0. {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

fn check_dim(v: Vec<f32>) -> Result<Vec<f32>> {
    if v.len() != EMBEDDING_DIM {
        return Err(Error::Provider(format!(
            "嵌入向量维数错误：期望 {EMBEDDING_DIM}，实际 {}",
            v.len()
        )));
    }
    Ok(v)
}

/// 基于 fastembed 的 CLIP ViT-B/32 模型
pub struct ClipEmbedder {
    image: Mutex<ImageEmbedding>,
    text: Mutex<TextEmbedding>,
}

impl ClipEmbedder {
    /// 加载模型，模型文件不存在时会自动下载到 `cache_dir`
    pub fn new(cache_dir: PathBuf, show_download_progress: bool) -> Result<Self> {
        info!("加载嵌入模型: {}", cache_dir.display());
        let image = ImageEmbedding::try_new(
            ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32)
                .with_cache_dir(cache_dir.clone())
                .with_show_download_progress(show_download_progress),
        )
        .map_err(Error::provider)?;
        let text = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::ClipVitB32)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(show_download_progress),
        )
        .map_err(Error::provider)?;
        Ok(Self { image: Mutex::new(image), text: Mutex::new(text) })
    }
}

impl Embedder for ClipEmbedder {
    fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>> {
        let mut model = self.image.lock().map_err(Error::provider)?;
        let mut output = model.embed_bytes(&[image], None).map_err(Error::provider)?;
        output.pop().ok_or_else(|| Error::Provider("模型没有输出".to_string()))
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let mut model = self.text.lock().map_err(Error::provider)?;
        let mut output = model.embed(vec![text], None).map_err(Error::provider)?;
        output.pop().ok_or_else(|| Error::Provider("模型没有输出".to_string()))
    }
}
