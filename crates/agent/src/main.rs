/// 虚拟磁盘协调 - Agent
/// 
/// 读取期望磁盘列表，清理并协调虚拟机磁盘，写回新的磁盘元数据

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use agent::config::Config;
use agent::hypervisor::{HypervisorDriver, VBoxManageDriver};
use agent::DiskReconciler;
use common::models::{DesiredDisk, DiskMetadataSet};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cfg = Config::from_env()?;

    // 可以通过环境变量 RUST_LOG 设置日志级别，未设置时使用 LOG_LEVEL
    tracing_subscriber::fmt()
        .with_target(false)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level))
        )
        .init();

    info!("开始协调虚拟机 {} 的磁盘", cfg.guest_id);

    let desired: Vec<DesiredDisk> = read_json(&cfg.desired_disks_path).await?.unwrap_or_default();
    let previous: DiskMetadataSet = read_json(&cfg.disk_metadata_path).await?.unwrap_or_default();

    let driver: Arc<dyn HypervisorDriver> = Arc::new(VBoxManageDriver::new(
        cfg.vboxmanage_path.clone(),
        cfg.guest_id.clone(),
        cfg.disk_controller.clone(),
    ));
    info!("使用 {} 驱动，控制器: {}", driver.driver_type(), driver.controller());
    let reconciler = DiskReconciler::new(driver, cfg.disks_enabled);

    for report in reconciler.cleanup_disks(&previous, &desired).await? {
        report.log();
    }

    let report = reconciler.reconcile_all(&desired).await?;
    report.log();
    debug!("协调结果: {}", serde_json::to_string(&report)?);

    if reconciler.is_enabled() {
        let json = serde_json::to_vec_pretty(&report.metadata)?;
        tokio::fs::write(&cfg.disk_metadata_path, json).await?;
        info!("磁盘元数据已写入 {:?}", cfg.disk_metadata_path);
    }

    Ok(())
}

/// 读取 JSON 文件，文件不存在时返回 None
async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(anyhow::anyhow!("读取 {:?} 失败: {}", path, e)),
    }
}
