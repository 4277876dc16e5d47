use anyhow::Result;
use clap::Parser;

use crate::WardrobeBuilder;
use crate::cli::SubCommandExtend;
use crate::config::Opts;

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// 以 JSON 格式输出
    #[arg(long)]
    pub json: bool,
}

impl SubCommandExtend for ListCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        // 列出条目不需要加载模型
        let wardrobe = WardrobeBuilder::new(opts.data_dir.clone()).open()?;
        let items = wardrobe.list_items();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&items)?);
            return Ok(());
        }
        for item in items {
            println!("{}\t{}\t{}", item.filename, item.comment, item.tags.join(","));
        }
        Ok(())
    }
}
