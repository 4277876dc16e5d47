use anyhow::Result;
use clap::Parser;
use log::info;
use tokio::task::block_in_place;

use crate::cli::{SubCommandExtend, open_wardrobe};
use crate::config::{ModelOptions, Opts};

#[derive(Parser, Debug, Clone)]
pub struct RebuildCommand {
    #[command(flatten)]
    pub model: ModelOptions,
}

impl SubCommandExtend for RebuildCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let mut wardrobe = open_wardrobe(opts, &self.model)?;
        let report = block_in_place(|| wardrobe.rebuild_index())?;
        info!("重建索引成功: {} 条, 跳过 {} 条", report.indexed, report.skipped);
        Ok(())
    }
}
