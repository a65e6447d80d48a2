use crate::catalog::{self, Catalog, Classifier};
use crate::client::HttpClient;
use crate::config::Settings;
use crate::error::Result;
use crate::harvest;
use crate::probe;
use crate::speed::{self, FailedUrlLog};
use crate::types::{Endpoint, RunSummary, SpeedResult};
use chrono::Local;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 各阶段共享的运行上下文
pub struct PipelineContext {
    pub settings: Arc<Settings>,
    pub client: HttpClient,
    pub failed: FailedUrlLog,
}

impl PipelineContext {
    pub fn new(settings: Settings) -> Result<Self> {
        let client = HttpClient::new(&settings)?;
        let failed = FailedUrlLog::new(settings.failed_log_path.clone());
        Ok(Self {
            settings: Arc::new(settings),
            client,
            failed,
        })
    }
}

/// 单个端点的处理结果
#[derive(Debug, Default)]
struct EndpointOutcome {
    tested: usize,
    results: Vec<SpeedResult>,
}

/// 探测端点, 并在内层工作池中并发测速它的所有频道
async fn process_endpoint(ctx: &PipelineContext, endpoint: &Endpoint) -> EndpointOutcome {
    let channels = probe::probe(&ctx.client, endpoint).await;
    if channels.is_empty() {
        return EndpointOutcome::default();
    }

    let tested = channels.len();
    let results: Vec<SpeedResult> = stream::iter(channels)
        .map(|channel| async move {
            let throughput_kbps =
                speed::speed_test(&ctx.client, &ctx.settings, &ctx.failed, &channel.url).await;
            SpeedResult {
                channel,
                throughput_kbps,
            }
        })
        .buffer_unordered(ctx.settings.speed_workers.max(1))
        .collect()
        .await;

    EndpointOutcome { tested, results }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("|| ");
    pb.set_style(style);
    pb.set_message("Probing endpoints...");
    pb
}

/// 完整运行一次
///
/// 阶段:
/// 1. 从所有种子源收集端点
/// 2. 外层工作池探测端点, 每个端点内层工作池测速
/// 3. 分类, 排序, 写出文件 (失败即终止)
/// 4. 返回汇总
pub async fn run(ctx: &PipelineContext) -> Result<RunSummary> {
    let settings = &ctx.settings;

    info!("Harvesting endpoints from {} seed source(s)", settings.sources.len());
    let report = harvest::harvest(&ctx.client, settings).await?;
    info!(
        endpoints = report.endpoints.len(),
        failed_sources = report.failed_sources.len(),
        "Harvest finished"
    );

    let pb = progress_bar(report.endpoints.len());
    let outcomes: Vec<EndpointOutcome> = stream::iter(report.endpoints.iter())
        .map(|endpoint| {
            let pb = pb.clone();
            async move {
                let outcome = process_endpoint(ctx, endpoint).await;
                pb.inc(1);
                outcome
            }
        })
        .buffer_unordered(settings.endpoint_workers.max(1))
        .collect()
        .await;
    pb.finish_with_message("Probing completed.");

    let mut accepted = Catalog::new();
    let mut summary = RunSummary {
        endpoints: report.endpoints.len(),
        failed_sources: report.failed_sources,
        output_path: settings.output_path.display().to_string(),
        ..RunSummary::default()
    };

    for outcome in outcomes {
        if outcome.tested > 0 {
            summary.live_endpoints += 1;
        }
        summary.channels_tested += outcome.tested;
        for result in outcome.results {
            let name = &result.channel.name;
            if speed::is_accepted(result.throughput_kbps, settings.speed_threshold) {
                info!(channel = %name, kbps = result.throughput_kbps, "Accepted");
                accepted.insert(name, &result.channel.url);
                summary.channels_accepted += 1;
            } else {
                debug!(channel = %name, kbps = result.throughput_kbps, "Too slow");
            }
        }
    }

    info!(
        live_endpoints = summary.live_endpoints,
        channels_tested = summary.channels_tested,
        channels_accepted = summary.channels_accepted,
        "Probing finished"
    );
    if accepted.is_empty() {
        warn!("No channel passed the speed test");
    }
    info!(channels = accepted.len(), failed_log = ?ctx.failed.path(), "Writing playlist");
    let sections = accepted.categorize(&Classifier::new()?);
    catalog::write_playlist(&settings.output_path, &sections, &Local::now()).await?;

    summary.cctv_lines = sections.cctv.len();
    summary.satellite_lines = sections.satellite.len();
    summary.other_lines = sections.other.len();
    Ok(summary)
}
