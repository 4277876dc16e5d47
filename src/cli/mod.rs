mod add;
mod analyze;
mod delete;
mod list;
mod rebuild;
mod search;
pub mod server;

use std::sync::Arc;

pub use add::*;
pub use analyze::*;
pub use delete::*;
pub use list::*;
pub use rebuild::*;
pub use search::*;
pub use server::*;
use tokio::task::block_in_place;

use crate::config::{ModelOptions, Opts};
use crate::detection::YolosDetector;
use crate::embedding::ClipEmbedder;
use crate::{Wardrobe, WardrobeBuilder};

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// 加载模型并打开服装库，未指定检测模型时不加载
pub fn open_wardrobe(opts: &Opts, model: &ModelOptions) -> anyhow::Result<Wardrobe> {
    block_in_place(|| {
        let embedder = ClipEmbedder::new(opts.data_dir.models(), !model.quiet_download)?;
        let mut builder = WardrobeBuilder::new(opts.data_dir.clone()).embedder(Arc::new(embedder));
        if let Some(path) = &model.detector {
            let detector = YolosDetector::new(path, model.detector_input_size)?;
            builder = builder.detector(Arc::new(detector));
        }
        Ok(builder.open()?)
    })
}
