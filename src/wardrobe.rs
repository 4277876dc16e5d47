use std::fs;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use serde::Serialize;
use utoipa::ToSchema;

use crate::catalog::{CatalogItem, CatalogStore};
use crate::config::DataDir;
use crate::detection::Detector;
use crate::embedding::{Embedder, embed};
use crate::error::{Error, Result};
use crate::metrics;
use crate::outfit::{OutfitComponent, crop_components, select_components};
use crate::store::CatalogIndex;
use crate::utils::{self, check_filename};

/// `/items` 返回的条目
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ListedItem {
    pub filename: String,
    /// 原图的访问地址
    pub image_url: String,
    pub comment: String,
    pub tags: Vec<String>,
}

/// 重建索引的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildReport {
    /// 加入索引的条目数量
    pub indexed: usize,
    /// 因图片缺失或无法计算向量而跳过的条目数量
    pub skipped: usize,
}

pub struct WardrobeBuilder {
    data_dir: DataDir,
    embedder: Option<Arc<dyn Embedder>>,
    detector: Option<Arc<dyn Detector>>,
    repair: bool,
}

impl WardrobeBuilder {
    pub fn new(data_dir: DataDir) -> Self {
        Self { data_dir, embedder: None, detector: None, repair: true }
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// 打开时发现索引与服装库不一致，是否自动重建
    pub fn repair(mut self, repair: bool) -> Self {
        self.repair = repair;
        self
    }

    pub fn open(self) -> Result<Wardrobe> {
        self.data_dir.create_all().map_err(|e| Error::io(self.data_dir.path(), e))?;

        let catalog = CatalogStore::open(self.data_dir.catalog())?;
        let store = CatalogIndex::open(&self.data_dir)?;

        let mut wardrobe = Wardrobe {
            data_dir: self.data_dir,
            embedder: self.embedder,
            detector: self.detector,
            catalog,
            store,
        };

        if let Err(err) = wardrobe.check_drift() {
            warn!("{err}");
            if self.repair && wardrobe.embedder.is_some() {
                info!("自动重建索引");
                // 重建失败时保留已加载的索引，之后仍可以手动重建
                if let Err(err) = wardrobe.rebuild_index() {
                    warn!("自动重建索引失败: {err}");
                }
            }
        }
        metrics::set_catalog_size(wardrobe.store.len());

        Ok(wardrobe)
    }
}

/// 服装库，同时管理服装库文件和向量索引
pub struct Wardrobe {
    data_dir: DataDir,
    embedder: Option<Arc<dyn Embedder>>,
    detector: Option<Arc<dyn Detector>>,
    catalog: CatalogStore,
    store: CatalogIndex,
}

impl Wardrobe {
    pub fn data_dir(&self) -> &DataDir {
        &self.data_dir
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn store(&self) -> &CatalogIndex {
        &self.store
    }

    /// 检查索引是否与服装库一致
    ///
    /// 除了向量数量与元数据数量，还要求每个元数据条目都存在于服装库中。
    pub fn check_drift(&self) -> Result<()> {
        self.store.check_consistency()?;
        if let Some(item) = self.store.items().iter().find(|item| !self.catalog.contains(&item.filename))
        {
            return Err(Error::Orphaned(item.filename.clone()));
        }
        Ok(())
    }

    fn embedder(&self) -> Result<&dyn Embedder> {
        self.embedder.as_deref().ok_or_else(|| Error::Provider("未加载嵌入模型".to_string()))
    }

    fn detector(&self) -> Result<&dyn Detector> {
        self.detector.as_deref().ok_or_else(|| Error::Provider("未加载检测模型".to_string()))
    }

    /// 添加单品，同名文件会被覆盖
    ///
    /// # Arguments
    ///
    /// * `filename` - 图片文件名
    /// * `image` - 图片内容
    /// * `comment` - 描述
    /// * `tags` - 标签
    pub fn add_item(
        &mut self,
        filename: &str,
        image: &[u8],
        comment: &str,
        tags: Vec<String>,
    ) -> Result<()> {
        check_filename(filename)?;
        // 模型未加载时不做任何修改
        self.embedder()?;

        let path = self.data_dir.image(filename);
        fs::write(&path, image).map_err(|e| Error::io(&path, e))?;

        let item = CatalogItem::new(filename, comment, tags);
        self.catalog.upsert(item.clone())?;

        let embedding = embed(self.embedder()?, image, Some(&item.text()))?;
        let position = self.store.upsert_item_with_embedding(item, &embedding)?;

        info!("添加单品: {} -> {}", filename, position);
        metrics::inc_add_item();
        metrics::set_catalog_size(self.store.len());
        Ok(())
    }

    /// 搜索相似的单品，按距离升序返回 `(距离, 单品)`
    ///
    /// # Arguments
    ///
    /// * `image` - 查询图片
    /// * `comment` - 查询文本，为空时只使用图片
    /// * `k` - 最近邻数量
    /// * `max_distance` - 最大平方欧氏距离
    pub fn search(
        &self,
        image: &[u8],
        comment: Option<&str>,
        k: usize,
        max_distance: f32,
    ) -> Result<Vec<(f32, CatalogItem)>> {
        let start = Instant::now();
        let comment = comment.filter(|c| !c.is_empty());

        let query = embed(self.embedder()?, image, comment)?;
        let result = self
            .store
            .search(&query, k, max_distance)?
            .into_iter()
            .map(|(distance, item)| (distance, item.clone()))
            .collect::<Vec<_>>();

        let elapsed = start.elapsed().as_secs_f32();
        debug!("搜索完成: {} 个结果, 耗时 {:.3}s", result.len(), elapsed);
        metrics::observe_search(comment.is_some(), elapsed, result.len());
        Ok(result)
    }

    /// 从服装库重建整个索引，跳过图片已丢失或无法计算向量的条目
    pub fn rebuild_index(&mut self) -> Result<RebuildReport> {
        let start = Instant::now();
        let items = self.catalog.items().to_vec();
        let (entries, skipped) = self.embed_items(items, true)?;
        let indexed = entries.len();
        self.store.rebuild_all(entries)?;

        let elapsed = start.elapsed().as_secs_f32();
        info!("重建索引: {indexed} 条, 跳过 {skipped} 条, 耗时 {elapsed:.2}s");
        metrics::observe_rebuild(elapsed);
        metrics::set_catalog_size(self.store.len());
        Ok(RebuildReport { indexed, skipped })
    }

    /// 删除单品，并使用剩余的条目重建索引
    ///
    /// 所有向量都在修改文件之前计算完成，计算失败时不会留下部分修改。
    pub fn delete_item(&mut self, filename: &str) -> Result<()> {
        check_filename(filename)?;
        if !self.catalog.contains(filename) && self.store.position(filename).is_none() {
            return Err(Error::NotFound(filename.to_string()));
        }

        let remaining = self
            .store
            .items()
            .iter()
            .filter(|item| item.filename != filename)
            .cloned()
            .collect::<Vec<_>>();
        let (entries, _) = self.embed_items(remaining, false)?;

        let path = self.data_dir.image(filename);
        match fs::remove_file(&path) {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(Error::io(&path, e)),
            _ => {}
        }
        if self.catalog.contains(filename) {
            self.catalog.remove(filename)?;
        }
        self.store.rebuild_all(entries)?;

        info!("删除单品: {filename}");
        metrics::set_catalog_size(self.store.len());
        Ok(())
    }

    /// 列出图片仍然存在的所有条目
    pub fn list_items(&self) -> Vec<ListedItem> {
        self.catalog
            .items()
            .iter()
            .filter(|item| self.data_dir.image(&item.filename).exists())
            .map(|item| ListedItem {
                filename: item.filename.clone(),
                image_url: format!("/images/{}", item.filename),
                comment: item.comment.clone(),
                tags: item.tags.clone(),
            })
            .collect()
    }

    /// 检测穿搭中的各个单品，裁剪后保存到片段目录
    pub fn analyze_outfit(&self, image: &[u8]) -> Result<Vec<OutfitComponent>> {
        let detector = self.detector()?;
        let mat = utils::imdecode(image)?;
        let components = select_components(detector.detect(&mat)?);
        crop_components(&mat, &components, &self.data_dir.segments())
    }

    /// 计算条目的向量，返回 `(条目及向量, 跳过数量)`
    ///
    /// 图片不存在的条目总是被跳过；`skip_failed` 为真时，模型无法处理的条目也会被跳过。
    fn embed_items(
        &self,
        items: Vec<CatalogItem>,
        skip_failed: bool,
    ) -> Result<(Vec<(CatalogItem, Vec<f32>)>, usize)> {
        let embedder = self.embedder()?;
        let mut entries = Vec::with_capacity(items.len());
        let mut skipped = 0;
        for item in items {
            let path = self.data_dir.image(&item.filename);
            let image = match fs::read(&path) {
                Ok(image) => image,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!("图片不存在，跳过: {}", path.display());
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(Error::io(&path, e)),
            };
            match embed(embedder, &image, Some(&item.text())) {
                Ok(embedding) => entries.push((item, embedding)),
                Err(Error::Provider(e)) if skip_failed => {
                    warn!("无法计算向量，跳过: {}: {e}", path.display());
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok((entries, skipped))
    }
}
