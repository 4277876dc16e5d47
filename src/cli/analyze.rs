use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tokio::task::block_in_place;

use crate::WardrobeBuilder;
use crate::cli::SubCommandExtend;
use crate::config::{ModelOptions, Opts};
use crate::detection::YolosDetector;

#[derive(Parser, Debug, Clone)]
pub struct AnalyzeCommand {
    #[command(flatten)]
    pub model: ModelOptions,
    /// 穿搭图片路径
    pub image: PathBuf,
}

impl SubCommandExtend for AnalyzeCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let detector = self.model.detector.as_ref().ok_or_else(|| anyhow!("需要指定 --detector"))?;
        let image = fs::read(&self.image)
            .with_context(|| format!("读取失败: {}", self.image.display()))?;

        let components = block_in_place(|| -> Result<_> {
            let detector = YolosDetector::new(detector, self.model.detector_input_size)?;
            // 分析穿搭不会修改索引，因此不需要嵌入模型
            let wardrobe = WardrobeBuilder::new(opts.data_dir.clone())
                .detector(Arc::new(detector))
                .open()?;
            Ok(wardrobe.analyze_outfit(&image)?)
        })?;

        for comp in components {
            println!("{:.2}\t{}\t{}", comp.confidence, comp.category, comp.segment_path);
        }
        Ok(())
    }
}
