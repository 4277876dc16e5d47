use std::path::Path;

use log::debug;
use ndarray::{Array2, ArrayView1, Axis};
use ndarray_npy::{read_npy, write_npy};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// 向量在索引中的位置
    pub position: usize,
    /// 平方欧氏距离
    pub distance: f32,
}

/// 暴力搜索的欧氏距离索引，向量按添加顺序保存
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    data: Array2<f32>,
}

impl FlatIndex {
    /// 创建一个新的空索引
    ///
    /// # Arguments
    ///
    /// * `d` - 向量维数
    pub fn new(d: usize) -> Self {
        Self { data: Array2::zeros((0, d)) }
    }

    /// 从文件加载索引，维数不一致时返回错误
    pub fn from_file(path: impl AsRef<Path>, d: usize) -> Result<Self> {
        let path = path.as_ref();
        let data: Array2<f32> = read_npy(path)
            .map_err(|e| Error::Index { path: path.to_path_buf(), message: e.to_string() })?;
        if data.ncols() != d {
            return Err(Error::Index {
                path: path.to_path_buf(),
                message: format!("向量维数为 {}，期望 {}", data.ncols(), d),
            });
        }
        debug!("从 {} 读取了 {} 条向量", path.display(), data.nrows());
        Ok(Self { data })
    }

    /// 将索引写入到文件
    ///
    /// 不负责原子性，调用方应先写入临时文件再重命名
    pub fn write_file(&self, tmp_path: &Path) -> Result<()> {
        write_npy(tmp_path, &self.data)
            .map_err(|e| Error::Index { path: tmp_path.to_path_buf(), message: e.to_string() })
    }

    /// 向量维数
    pub fn d(&self) -> usize {
        self.data.ncols()
    }

    /// 该索引中的向量数量
    pub fn ntotal(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.ntotal() == 0
    }

    /// 返回指定位置的向量
    pub fn vector(&self, position: usize) -> Option<ArrayView1<'_, f32>> {
        (position < self.ntotal()).then(|| self.data.row(position))
    }

    /// 添加一条向量，返回它的位置
    pub fn add(&mut self, v: &[f32]) -> Result<usize> {
        self.check_dim(v)?;
        self.data
            .push_row(ArrayView1::from(v))
            .map_err(|e| Error::InvalidInput(e.to_string()))?;
        Ok(self.ntotal() - 1)
    }

    /// 覆盖指定位置的向量
    pub fn set(&mut self, position: usize, v: &[f32]) -> Result<()> {
        self.check_dim(v)?;
        if position >= self.ntotal() {
            return Err(Error::InvalidInput(format!(
                "位置 {position} 超出索引范围 {}",
                self.ntotal()
            )));
        }
        self.data.row_mut(position).assign(&ArrayView1::from(v));
        Ok(())
    }

    /// 清空索引
    pub fn reset(&mut self) {
        self.data = Array2::zeros((0, self.d()));
    }

    /// 返回距离 `query` 最近的至多 `k` 条向量，按距离升序，距离相同时位置靠前的优先
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.check_dim(query)?;
        let query = ArrayView1::from(query);
        let mut neighbors = self
            .data
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(position, row)| {
                let distance = row.iter().zip(query.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
                Neighbor { position, distance }
            })
            .collect::<Vec<_>>();
        // 稳定排序，保证距离相同时按插入顺序
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.truncate(k);
        Ok(neighbors)
    }

    fn check_dim(&self, v: &[f32]) -> Result<()> {
        if v.len() != self.d() {
            return Err(Error::InvalidInput(format!(
                "向量维数为 {}，索引维数为 {}",
                v.len(),
                self.d()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_returns_position() {
        let mut index = FlatIndex::new(2);
        assert_eq!(index.add(&[0., 0.]).unwrap(), 0);
        assert_eq!(index.add(&[1., 0.]).unwrap(), 1);
        assert_eq!(index.ntotal(), 2);
    }

    #[test]
    fn test_search_sorted_with_stable_ties() {
        let mut index = FlatIndex::new(2);
        index.add(&[2., 0.]).unwrap();
        index.add(&[0., 1.]).unwrap();
        index.add(&[1., 0.]).unwrap();
        index.add(&[0., 0.]).unwrap();

        let result = index.search(&[0., 0.], 10).unwrap();
        let positions = result.iter().map(|n| n.position).collect::<Vec<_>>();
        assert_eq!(positions, vec![3, 1, 2, 0]);
        let distances = result.iter().map(|n| n.distance).collect::<Vec<_>>();
        assert_eq!(distances, vec![0., 1., 1., 4.]);
    }

    #[test]
    fn test_search_k_limit() {
        let mut index = FlatIndex::new(1);
        for i in 0..5 {
            index.add(&[i as f32]).unwrap();
        }
        assert_eq!(index.search(&[0.], 2).unwrap().len(), 2);
        assert!(FlatIndex::new(1).search(&[0.], 3).unwrap().is_empty());
    }

    #[test]
    fn test_set_and_reset() {
        let mut index = FlatIndex::new(2);
        index.add(&[1., 1.]).unwrap();
        index.set(0, &[2., 2.]).unwrap();
        assert_eq!(index.vector(0).unwrap().to_vec(), vec![2., 2.]);
        assert!(index.set(1, &[0., 0.]).is_err());

        index.reset();
        assert!(index.is_empty());
        assert_eq!(index.d(), 2);
    }

    #[test]
    fn test_wrong_dim() {
        let mut index = FlatIndex::new(3);
        assert!(index.add(&[1.]).is_err());
        assert!(index.search(&[1.], 1).is_err());
    }
}
