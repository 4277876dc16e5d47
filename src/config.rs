use std::convert::Infallible;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;

static DATA_DIR: LazyLock<DataDir> = LazyLock::new(|| {
    let proj_dirs =
        ProjectDirs::from("", "outfitdb", "outfitdb").expect("failed to get project dir");
    DataDir { path: proj_dirs.data_dir().to_path_buf() }
});

fn default_data_dir() -> &'static str {
    DATA_DIR.path().to_str().unwrap()
}

/// 默认返回的最近邻数量
pub const DEFAULT_K: usize = 3;
/// 默认的最大距离（平方欧氏距离）
pub const DEFAULT_MAX_DISTANCE: f32 = 0.4;

#[derive(Parser, Debug, Clone)]
pub struct ModelOptions {
    /// 服装检测模型，由 YOLOS Fashionpedia 导出的 ONNX 文件
    #[arg(long, value_name = "FILE")]
    pub detector: Option<PathBuf>,
    /// 检测模型的输入尺寸，需要与导出 ONNX 时一致
    #[arg(long, value_name = "SIZE", default_value_t = 512)]
    pub detector_input_size: i32,
    /// 下载嵌入模型时不显示进度
    #[arg(long)]
    pub quiet_download: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// 返回的最近邻数量
    #[arg(short, value_name = "K", default_value_t = DEFAULT_K)]
    pub k: usize,
    /// 两个向量允许的最大平方欧氏距离
    #[arg(long, value_name = "DISTANCE", default_value_t = DEFAULT_MAX_DISTANCE)]
    pub max_distance: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { k: DEFAULT_K, max_distance: DEFAULT_MAX_DISTANCE }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "outfitdb", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// outfitdb 数据目录
    #[arg(short, long, global = true, default_value = default_data_dir())]
    pub data_dir: DataDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 启动 HTTP 服务
    Server(ServerCommand),
    /// 添加图片到服装库
    Add(AddCommand),
    /// 从服装库中搜索相似的单品
    Search(SearchCommand),
    /// 根据服装库重建向量索引
    Rebuild(RebuildCommand),
    /// 从服装库中删除单品
    Delete(DeleteCommand),
    /// 列出服装库中的所有单品
    List(ListCommand),
    /// 检测穿搭图片中的各个单品并裁剪保存
    Analyze(AnalyzeCommand),
}

/// 数据目录，所有持久化的状态都保存在这里
#[derive(Debug, Clone)]
pub struct DataDir {
    path: PathBuf,
}

impl DataDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 创建数据目录及图片、片段子目录
    pub fn create_all(&self) -> std::io::Result<()> {
        fs::create_dir_all(self.images())?;
        fs::create_dir_all(self.segments())?;
        Ok(())
    }

    /// 返回服装库文件的路径，文件名到描述和标签的映射
    pub fn catalog(&self) -> PathBuf {
        self.path.join("image_comments.json")
    }

    /// 返回与索引位置一一对应的元数据文件路径
    pub fn metadata(&self) -> PathBuf {
        self.path.join("metadata.json")
    }

    /// 返回向量索引文件的路径
    pub fn index(&self) -> PathBuf {
        self.path.join("index.npy")
    }

    /// 返回原图目录
    pub fn images(&self) -> PathBuf {
        self.path.join("images")
    }

    /// 返回原图路径
    pub fn image(&self, filename: &str) -> PathBuf {
        self.images().join(filename)
    }

    /// 返回裁剪片段目录
    pub fn segments(&self) -> PathBuf {
        self.path.join("segments")
    }

    /// 返回模型缓存目录
    pub fn models(&self) -> PathBuf {
        self.path.join("models")
    }
}

impl FromStr for DataDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}
