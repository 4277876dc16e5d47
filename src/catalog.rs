use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use utoipa::ToSchema;

use crate::error::{Error, Result};
use crate::utils::{read_json, write_json};

/// 服装库中的一件单品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CatalogItem {
    /// 图片文件名，唯一
    pub filename: String,
    /// 描述
    pub comment: String,
    /// 标签
    pub tags: Vec<String>,
}

impl CatalogItem {
    pub fn new(filename: impl Into<String>, comment: impl Into<String>, tags: Vec<String>) -> Self {
        Self { filename: filename.into(), comment: comment.into(), tags }
    }

    /// 用于计算嵌入向量的文本：描述 + 空格 + 以空格连接的标签
    pub fn text(&self) -> String {
        format!("{} {}", self.comment, self.tags.join(" "))
    }
}

/// 文件中保存的条目，旧版本只保存了描述字符串
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Legacy(String),
    Entry {
        #[serde(default)]
        comment: String,
        #[serde(default)]
        tags: Vec<String>,
    },
}

/// 服装库文件，文件名到描述和标签的映射，保持插入顺序
///
/// 这是单品内容的唯一可信来源，向量索引可以随时从这里重建。
#[derive(Debug)]
pub struct CatalogStore {
    path: PathBuf,
    items: Vec<CatalogItem>,
}

impl CatalogStore {
    /// 打开服装库文件，文件不存在时为空
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(Self { path, items: vec![] });
        }
        let map: Map<String, Value> = read_json(&path)?;
        let mut items = Vec::with_capacity(map.len());
        for (filename, value) in map {
            let entry = serde_json::from_value(value).map_err(|e| Error::json(&path, e))?;
            let item = match entry {
                StoredEntry::Legacy(comment) => CatalogItem::new(filename, comment, vec![]),
                StoredEntry::Entry { comment, tags } => CatalogItem::new(filename, comment, tags),
            };
            items.push(item);
        }
        debug!("从 {} 读取了 {} 个条目", path.display(), items.len());
        Ok(Self { path, items })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 所有条目，按插入顺序
    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn get(&self, filename: &str) -> Option<&CatalogItem> {
        self.items.iter().find(|item| item.filename == filename)
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.get(filename).is_some()
    }

    /// 插入或覆盖条目并保存，已存在的条目保持原有顺序
    pub fn upsert(&mut self, item: CatalogItem) -> Result<()> {
        match self.items.iter_mut().find(|old| old.filename == item.filename) {
            Some(old) => *old = item,
            None => self.items.push(item),
        }
        self.save()
    }

    /// 删除条目并保存
    pub fn remove(&mut self, filename: &str) -> Result<CatalogItem> {
        let pos = self
            .items
            .iter()
            .position(|item| item.filename == filename)
            .ok_or_else(|| Error::NotFound(filename.to_string()))?;
        let item = self.items.remove(pos);
        self.save()?;
        Ok(item)
    }

    fn save(&self) -> Result<()> {
        let map = self
            .items
            .iter()
            .map(|item| {
                (item.filename.clone(), json!({ "comment": item.comment, "tags": item.tags }))
            })
            .collect::<Map<_, _>>();
        write_json(&self.path, &map)
    }
}
