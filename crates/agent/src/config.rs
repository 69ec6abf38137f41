/// 配置管理

use common::models::constants::DEFAULT_CONTROLLER;
use common::{Error, Result};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// 虚拟机名称或 UUID
    pub guest_id: String,
    pub vboxmanage_path: PathBuf,
    pub disk_controller: String,
    /// 磁盘管理功能开关
    pub disks_enabled: bool,
    pub desired_disks_path: PathBuf,
    pub disk_metadata_path: PathBuf,
    pub log_level: String,
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载配置
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let guest_id = lookup("GUEST_ID")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::Config("GUEST_ID is not set".to_string()))?;

        let disks_enabled = parse_bool("DISK_MANAGEMENT_ENABLED", &get("DISK_MANAGEMENT_ENABLED", "true"))?;

        Ok(Self {
            guest_id,
            vboxmanage_path: get("VBOXMANAGE_PATH", "VBoxManage").into(),
            disk_controller: get("DISK_CONTROLLER", DEFAULT_CONTROLLER),
            disks_enabled,
            desired_disks_path: get("DESIRED_DISKS_PATH", "disks.json").into(),
            disk_metadata_path: get("DISK_METADATA_PATH", "disk_meta.json").into(),
            log_level: get("LOG_LEVEL", "info"),
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{} must be a boolean, got {:?}", key, value))),
    }
}
