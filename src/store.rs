use std::fs;
use std::path::PathBuf;

use log::{debug, info};

use crate::catalog::CatalogItem;
use crate::config::DataDir;
use crate::embedding::EMBEDDING_DIM;
use crate::error::{Error, Result};
use crate::index::FlatIndex;
use crate::utils::{read_json, tmp_path};

/// 向量索引与元数据列表的组合
///
/// 第 i 条向量对应第 i 个元数据条目。两者只能通过成对的操作修改，每次修改后都会
/// 一起写入磁盘。
#[derive(Debug)]
pub struct CatalogIndex {
    index: FlatIndex,
    metadata: Vec<CatalogItem>,
    index_path: PathBuf,
    metadata_path: PathBuf,
}

impl CatalogIndex {
    /// 从数据目录加载索引和元数据
    ///
    /// 只有索引文件存在时才会读取元数据文件，读取后不做一致性检查，需要时调用
    /// [`CatalogIndex::check_consistency`]。
    pub fn open(data_dir: &DataDir) -> Result<Self> {
        let index_path = data_dir.index();
        let metadata_path = data_dir.metadata();

        let (index, metadata) = if index_path.exists() {
            let index = FlatIndex::from_file(&index_path, EMBEDDING_DIM)?;
            let metadata = match metadata_path.exists() {
                true => read_json(&metadata_path)?,
                false => vec![],
            };
            (index, metadata)
        } else {
            (FlatIndex::new(EMBEDDING_DIM), vec![])
        };
        info!("加载索引: {} 条向量, {} 条元数据", index.ntotal(), metadata.len());

        Ok(Self { index, metadata, index_path, metadata_path })
    }

    /// 索引中的条目数量
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.metadata
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn position(&self, filename: &str) -> Option<usize> {
        self.metadata.iter().position(|item| item.filename == filename)
    }

    /// 检查向量数量与元数据数量是否一致
    pub fn check_consistency(&self) -> Result<()> {
        if self.index.ntotal() != self.metadata.len() {
            return Err(Error::ConsistencyDrift {
                index: self.index.ntotal(),
                metadata: self.metadata.len(),
            });
        }
        Ok(())
    }

    /// 添加一个条目及其向量并保存，同名条目会在原位置被覆盖，返回条目的位置
    ///
    /// 索引与元数据不一致时不做任何修改，需要先重建。
    pub fn upsert_item_with_embedding(
        &mut self,
        item: CatalogItem,
        embedding: &[f32],
    ) -> Result<usize> {
        self.check_consistency()?;
        let position = match self.position(&item.filename) {
            Some(position) => {
                self.index.set(position, embedding)?;
                self.metadata[position] = item;
                position
            }
            None => self.append_item_with_embedding(item, embedding)?,
        };
        self.persist()?;
        Ok(position)
    }

    fn append_item_with_embedding(&mut self, item: CatalogItem, embedding: &[f32]) -> Result<usize> {
        let position = self.index.add(embedding)?;
        self.metadata.push(item);
        Ok(position)
    }

    /// 用给定的条目和向量替换全部内容并保存
    ///
    /// 写入失败时内存中的内容保持不变。
    pub fn rebuild_all(&mut self, entries: Vec<(CatalogItem, Vec<f32>)>) -> Result<()> {
        let mut index = FlatIndex::new(self.index.d());
        let mut metadata = Vec::with_capacity(entries.len());
        for (item, embedding) in entries {
            index.add(&embedding)?;
            metadata.push(item);
        }
        self.write_files(&index, &metadata)?;
        self.index = index;
        self.metadata = metadata;
        Ok(())
    }

    /// 搜索最近的 `k` 个条目，只保留距离不超过 `max_distance` 且有元数据的结果
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        max_distance: f32,
    ) -> Result<Vec<(f32, &CatalogItem)>> {
        let neighbors = self.index.search(query, k)?;
        debug!("最近邻: {:?}", neighbors);
        Ok(neighbors
            .into_iter()
            .filter(|n| n.distance <= max_distance)
            .filter_map(|n| self.metadata.get(n.position).map(|item| (n.distance, item)))
            .collect())
    }

    fn persist(&self) -> Result<()> {
        self.write_files(&self.index, &self.metadata)
    }

    /// 先写入临时文件，全部成功后再重命名
    fn write_files(&self, index: &FlatIndex, metadata: &[CatalogItem]) -> Result<()> {
        let index_tmp = tmp_path(&self.index_path);
        index.write_file(&index_tmp)?;
        let metadata_tmp = tmp_path(&self.metadata_path);
        let data = serde_json::to_vec_pretty(metadata)
            .map_err(|e| Error::json(&self.metadata_path, e))?;
        fs::write(&metadata_tmp, data).map_err(|e| Error::io(&metadata_tmp, e))?;
        fs::rename(&index_tmp, &self.index_path).map_err(|e| Error::io(&self.index_path, e))?;
        fs::rename(&metadata_tmp, &self.metadata_path)
            .map_err(|e| Error::io(&self.metadata_path, e))
    }
}
