use anyhow::Result;
use clap::Parser;
use log::info;
use tokio::task::block_in_place;

use crate::cli::{SubCommandExtend, open_wardrobe};
use crate::config::{ModelOptions, Opts};

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    #[command(flatten)]
    pub model: ModelOptions,
    /// 要删除的图片文件名
    pub filename: String,
}

impl SubCommandExtend for DeleteCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let mut wardrobe = open_wardrobe(opts, &self.model)?;
        block_in_place(|| wardrobe.delete_item(&self.filename))?;
        info!("删除成功: {}", self.filename);
        Ok(())
    }
}
