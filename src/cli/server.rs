use anyhow::anyhow;
use clap::Parser;
use log::{error, info};
use prometheus::{BasicAuthentication, labels};
use tokio::net::TcpListener;
use tokio::task::spawn_blocking;
use tokio::time::{Duration, sleep};

use crate::cli::{SubCommandExtend, open_wardrobe};
use crate::config::{ModelOptions, Opts, SearchOptions};
use crate::server::{self, DEFAULT_UPLOAD_LIMIT};

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    #[command(flatten)]
    pub model: ModelOptions,
    #[command(flatten)]
    pub search: SearchOptions,
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub addr: String,
    /// 上传文件的大小限制，单位为字节
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_UPLOAD_LIMIT)]
    pub upload_limit: usize,
    /// prometheus 主动推送地址
    #[arg(long, value_name = "URL")]
    pub prometheus_push: Option<String>,
    /// 自定义 instance 标签值
    #[arg(long, value_name = "NAME")]
    pub prometheus_instance: Option<String>,
    /// prometheus 认证信息，格式为 username:password
    #[arg(long, value_name = "AUTH")]
    pub prometheus_auth: Option<String>,
}

impl ServerCommand {
    fn push_auth(&self) -> anyhow::Result<Option<(String, String)>> {
        let Some(auth) = &self.prometheus_auth else {
            return Ok(None);
        };
        let (username, password) =
            auth.split_once(':').ok_or_else(|| anyhow!("认证信息格式应为 username:password"))?;
        Ok(Some((username.to_string(), password.to_string())))
    }

    /// 每 30 秒推送一次指标
    fn spawn_push_metrics(&self, url: String) -> anyhow::Result<()> {
        let instance = self.prometheus_instance.clone().unwrap_or_else(|| self.addr.clone());
        let auth = self.push_auth()?;
        tokio::spawn(async move {
            loop {
                let metric_families = prometheus::gather();
                let url = url.clone();
                let instance = instance.clone();
                let auth = auth.clone();
                let r = spawn_blocking(move || {
                    prometheus::push_metrics(
                        "outfitdb",
                        labels! {
                            "instance".to_string() => instance,
                        },
                        &url,
                        metric_families,
                        auth.map(|(username, password)| BasicAuthentication {
                            username,
                            password,
                        }),
                    )
                })
                .await;
                match r {
                    Ok(Err(e)) => error!("推送指标失败: {e}"),
                    Err(e) => error!("推送任务异常退出: {e}"),
                    Ok(Ok(())) => {}
                }
                sleep(Duration::from_secs(30)).await;
            }
        });
        Ok(())
    }
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let wardrobe = open_wardrobe(opts, &self.model)?;
        info!("服装库已加载: {} 个单品", wardrobe.store().len());

        let state = server::AppState::new(wardrobe, self.search.clone());
        let app = server::create_app(state, self.upload_limit);

        if let Some(url) = self.prometheus_push.clone() {
            self.spawn_push_metrics(url)?;
        }

        info!("服务器启动：http://{}", &self.addr);
        info!("API 文档：http://{}/docs", &self.addr);
        let listener = TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
