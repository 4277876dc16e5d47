use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::json;
use tokio::task::block_in_place;

use crate::catalog::CatalogItem;
use crate::cli::{SubCommandExtend, open_wardrobe};
use crate::config::{ModelOptions, Opts, SearchOptions};

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub model: ModelOptions,
    #[command(flatten)]
    pub search: SearchOptions,
    /// 被搜索的图片路径
    pub image: PathBuf,
    /// 查询文本，不填则只使用图片搜索
    #[arg(short, long)]
    pub comment: Option<String>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let image = fs::read(&self.image)
            .with_context(|| format!("读取失败: {}", self.image.display()))?;
        let wardrobe = open_wardrobe(opts, &self.model)?;

        let result = block_in_place(|| {
            wardrobe.search(
                &image,
                self.comment.as_deref(),
                self.search.k,
                self.search.max_distance,
            )
        })?;

        print_result(&result, self.output_format)
    }
}

fn print_result(result: &[(f32, CatalogItem)], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let result = result
                .iter()
                .map(|(distance, item)| json!({ "distance": distance, "item": item }))
                .collect::<Vec<_>>();
            println!("{}", serde_json::to_string_pretty(&result)?)
        }
        OutputFormat::Table => {
            for (distance, item) in result {
                println!("{:.4}\t{}\t{}", distance, item.filename, item.comment);
            }
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}
