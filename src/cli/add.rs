use std::fs;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::Parser;
use indicatif::ProgressBar;
use log::info;
use regex::Regex;
use tokio::task::block_in_place;
use walkdir::WalkDir;

use crate::cli::{SubCommandExtend, open_wardrobe};
use crate::config::{ModelOptions, Opts};
use crate::utils::{parse_tags, pb_style};

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    #[command(flatten)]
    pub model: ModelOptions,
    /// 图片路径，如果是目录则添加其中所有图片
    pub path: PathBuf,
    /// 单品描述
    #[arg(short, long, default_value_t = String::new())]
    pub comment: String,
    /// 标签，多个标签用逗号分隔
    #[arg(short, long, default_value_t = String::new())]
    pub tags: String,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "jpg,jpeg,png,webp")]
    pub suffix: String,
}

impl AddCommand {
    fn scan(&self) -> anyhow::Result<Vec<PathBuf>> {
        if self.path.is_file() {
            return Ok(vec![self.path.clone()]);
        }
        let re_suf = format!("(?i)^({})$", self.suffix.replace(',', "|"));
        let re_suf = Regex::new(&re_suf).with_context(|| format!("无效的后缀: {}", self.suffix))?;
        Ok(WalkDir::new(&self.path)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension().map(|s| re_suf.is_match(&s.to_string_lossy())) == Some(true)
            })
            .collect())
    }
}

impl SubCommandExtend for AddCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let mut wardrobe = open_wardrobe(opts, &self.model)?;
        let tags = parse_tags(&self.tags);

        let paths = self.scan()?;
        let pb = ProgressBar::new(paths.len() as u64).with_style(pb_style());

        let mut failed = 0;
        for path in paths {
            let filename = path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .ok_or_else(|| anyhow!("无效的路径: {}", path.display()))?;
            let image = fs::read(&path).with_context(|| format!("读取失败: {}", path.display()))?;

            let result = block_in_place(|| {
                wardrobe.add_item(&filename, &image, &self.comment, tags.clone())
            });
            if let Err(e) = result {
                pb.println(format!("[ERR] {}: {}", path.display(), e));
                failed += 1;
            }
            pb.set_message(filename);
            pb.inc(1);
        }

        pb.finish_with_message("图片添加完成");
        info!("添加完成，失败 {failed} 张");

        Ok(())
    }
}
