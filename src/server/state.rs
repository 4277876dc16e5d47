use std::sync::Arc;

use tokio::sync::RwLock;

use crate::Wardrobe;
use crate::config::{DataDir, SearchOptions};

/// 应用状态
pub struct AppState {
    /// 服装库，修改操作需要获取写锁
    pub wardrobe: RwLock<Wardrobe>,
    /// 默认搜索参数
    pub search: SearchOptions,
    pub data_dir: DataDir,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(wardrobe: Wardrobe, search: SearchOptions) -> Arc<Self> {
        let data_dir = wardrobe.data_dir().clone();
        Arc::new(AppState { wardrobe: RwLock::new(wardrobe), search, data_dir })
    }
}
