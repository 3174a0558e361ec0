//! 命令行应用 - 编排层
//!
//! 持有会话、API 客户端、页头和跨上下文同步任务，把命令分派给下层。
//!
//! 同一进程内的上下文通过 `StorageHub` 的通知同步；其它进程写入的令牌
//! 由 `FileStorage` 在每次读取时从文件取得。

use crate::clients::{ApiClient, AuthenticatedRequestBuilder};
use crate::config::Config;
use crate::infrastructure::{FileStorage, ReqwestTransport, StorageHub};
use crate::logger;
use crate::models::{JobStatus, TimeseriesQuery};
use crate::session::{AuthHeader, CrossContextSync, LogNavigator, SessionStore};
use crate::workflow::{JobController, JobPanelState, PanelPhase};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// 预览表格最多显示的行数
const PREVIEW_ROWS: usize = 20;

/// 命令行命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Datasets,
    Dataset(String),
    Job { dataset_id: String, y: String },
    Login(String),
    Logout,
    WhoAmI,
    Help,
}

impl Command {
    /// 解析参数（不含程序名）
    pub fn parse(args: &[String]) -> Result<Self> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let command = match args.as_slice() {
            [] | ["help"] | ["--help"] | ["-h"] => Command::Help,
            ["datasets"] => Command::Datasets,
            ["dataset", id] => Command::Dataset(id.to_string()),
            ["job", dataset_id] => Command::Job {
                dataset_id: dataset_id.to_string(),
                y: JobPanelState::default().y,
            },
            ["job", dataset_id, y] => Command::Job {
                dataset_id: dataset_id.to_string(),
                y: y.to_string(),
            },
            ["login", token] => Command::Login(token.to_string()),
            ["logout"] => Command::Logout,
            ["whoami"] => Command::WhoAmI,
            other => bail!("无法识别的命令: {}", other.join(" ")),
        };
        Ok(command)
    }

    pub fn usage() -> &'static str {
        "usage: dataset-client <command>\n\
         \n\
         commands:\n  \
           datasets                 list datasets\n  \
           dataset <id>             show files, preview and links of a dataset\n  \
           job <dataset_id> [y]     submit a processing job and follow it\n  \
           login <token>            store the access token from the sign-in link\n  \
           logout                   forget the access token\n  \
           whoami                   show the signed-in user"
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    session: Arc<SessionStore>,
    api: Arc<ApiClient>,
    header: Arc<AuthHeader>,
    sync: CrossContextSync,
    header_sync: CrossContextSync,
}

impl App {
    /// 初始化应用：打开共享存储、启动跨上下文同步、创建 API 客户端
    pub async fn initialize(config: Config) -> Result<Self> {
        logger::log_startup(&config);

        let hub = StorageHub::new(Arc::new(FileStorage::new(&config.storage_file)));
        let session = Arc::new(SessionStore::new(
            hub.open_context(),
            Arc::new(LogNavigator),
            config.login_path.clone(),
        ));
        let sync = session.watch_cross_context();

        let transport = Arc::new(
            ReqwestTransport::new(config.request_timeout()).context("无法创建 HTTP 传输层")?,
        );
        let auth = AuthenticatedRequestBuilder::new(
            Arc::clone(&session),
            config.dev_identity().map(str::to_string),
        );
        let api = Arc::new(ApiClient::new(config.api_base_url.clone(), transport, auth));
        let header = Arc::new(AuthHeader::new(Arc::clone(&api)));
        let header_sync = header.follow_session();

        Ok(Self {
            config,
            session,
            api,
            header,
            sync,
            header_sync,
        })
    }

    /// 执行一条命令
    pub async fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Help => println!("{}", Command::usage()),
            Command::Datasets => self.show_datasets().await?,
            Command::Dataset(id) => self.show_dataset(&id).await?,
            Command::Job { dataset_id, y } => self.run_job(&dataset_id, &y).await?,
            Command::Login(token) => self.sign_in(&token).await?,
            Command::Logout => self.sign_out()?,
            Command::WhoAmI => self.whoami().await,
        }
        Ok(())
    }

    async fn show_datasets(&self) -> Result<()> {
        let datasets = match self.api.list_datasets().await {
            Ok(datasets) => datasets,
            Err(e) if e.is_transport() => {
                bail!("{} (API_BASE = {})", e.display_message(), self.config.api_base_url)
            }
            Err(e) => return Err(anyhow::Error::new(e).context("获取数据集列表失败")),
        };
        if datasets.is_empty() {
            println!("No datasets yet.");
            return Ok(());
        }
        for dataset in &datasets {
            println!("{}", dataset);
        }
        info!("✓ 共 {} 个数据集", datasets.len());
        Ok(())
    }

    async fn show_dataset(&self, dataset_id: &str) -> Result<()> {
        let (files, preview, geojson) = futures::join!(
            self.api.dataset_files(dataset_id),
            self.api.dataset_preview(dataset_id),
            self.api.dataset_geojson(dataset_id),
        );

        println!("Dataset {}", dataset_id);

        println!("\nFiles");
        match files {
            Ok(files) => {
                for file in files {
                    println!("  {} ({} bytes)", file.original_name, file.bytes);
                }
            }
            Err(e) => println!("  {}", e.display_message()),
        }

        println!("\nPreview (first rows)");
        match preview {
            Ok(preview) => {
                let header: Vec<String> = preview
                    .columns
                    .iter()
                    .map(|c| format!("{} ({})", c.name, c.dtype))
                    .collect();
                println!("  {}", header.join(" | "));
                for row in 0..preview.data.len().min(PREVIEW_ROWS) {
                    let cells: Vec<String> = preview
                        .columns
                        .iter()
                        .map(|c| logger::truncate_text(&preview.cell(row, &c.name), 24))
                        .collect();
                    println!("  {}", cells.join(" | "));
                }
            }
            Err(e) => println!("  {}", e.display_message()),
        }

        println!("\nMap preview");
        match geojson {
            Ok(value) => {
                let features = value
                    .get("features")
                    .and_then(|f| f.as_array())
                    .map(|f| f.len())
                    .unwrap_or(0);
                println!("  {} feature(s)", features);
            }
            Err(e) => println!("  {}", e.display_message()),
        }

        let chart = self
            .api
            .timeseries_url(dataset_id, &TimeseriesQuery::default())?;
        println!("\nTime series: {}", chart);
        Ok(())
    }

    async fn run_job(&self, dataset_id: &str, y: &str) -> Result<()> {
        let controller = JobController::from_config(Arc::clone(&self.api), &self.config);

        let mut rx = controller.subscribe();
        let progress = tokio::spawn(async move {
            let mut last: Option<JobStatus> = None;
            while rx.changed().await.is_ok() {
                let status = rx.borrow_and_update().status();
                if let Some(status) = status.filter(|s| Some(*s) != last) {
                    println!("status: {}", status);
                    last = Some(status);
                }
            }
        });

        if let Err(e) = controller.enqueue(dataset_id, y).await {
            progress.abort();
            bail!("{}", e.display_message());
        }

        let state = tokio::select! {
            state = controller.wait_until_settled() => state,
            _ = tokio::signal::ctrl_c() => {
                warn!("⚠️ 已中断，停止跟踪任务");
                let state = controller.state();
                controller.teardown();
                state
            }
        };
        progress.abort();

        let links = controller
            .links()
            .or_else(|| state.job_id().and_then(|id| self.api.job_links(id).ok()));
        if let Some(links) = links {
            println!("logs:   {}", links.logs_url);
            println!("result: {}", links.result_url);
        }
        if let Some(summary) = state.summary() {
            println!("summary: {}", summary);
        }

        match (state.phase, state.error) {
            (PanelPhase::Terminal(_), _) => Ok(()),
            (_, Some(error)) => bail!("{}", error),
            (phase, None) => {
                info!("任务未结束即停止跟踪 ({:?})", phase);
                Ok(())
            }
        }
    }

    /// 登录链接回调拿到令牌后保存
    pub async fn sign_in(&self, token: &str) -> Result<()> {
        if token.trim().is_empty() {
            bail!("令牌不能为空");
        }
        self.session.set(token.trim())?;
        let auth_display = self.header.refresh().await;
        info!("✓ 已登录: {}", auth_display.label());
        Ok(())
    }

    /// 退出登录并结束跨上下文同步
    pub fn sign_out(&mut self) -> Result<()> {
        self.session.remove()?;
        self.sync.stop();
        self.header_sync.stop();
        Ok(())
    }

    async fn whoami(&self) {
        let display = self.header.refresh().await;
        println!("{}", display.label());
    }
}
