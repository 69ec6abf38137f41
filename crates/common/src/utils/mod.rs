/// 工具函数集合

use uuid::Uuid;

use crate::errors::{Error, Result};

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// 生成唯一 ID
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// 格式化字节大小
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// 字节换算为整 MB，不足 1 MB 的部分舍去
///
/// hypervisor 以整 MB 报告容量，比较时两侧都按这个粒度取整
pub fn bytes_to_whole_megabytes(bytes: u64) -> u64 {
    bytes / (1024 * 1024)
}

/// 解析 hypervisor 报告的容量文本，返回 MB
///
/// 接受 "10240 MBytes"、"10 GB"、"512" 这类写法，无单位时按 MB 处理
pub fn capacity_to_megabytes(capacity: &str) -> Result<f64> {
    let mut parts = capacity.split_whitespace();
    let number = parts
        .next()
        .ok_or_else(|| Error::InvalidArgument(format!("Empty capacity: {:?}", capacity)))?;
    let value: f64 = number
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("Invalid capacity value: {:?}", capacity)))?;

    let factor = match parts.next().map(|u| u.to_ascii_lowercase()) {
        None => 1.0,
        Some(unit) => match unit.as_str() {
            "b" | "bytes" => 1.0 / MIB,
            "kb" | "kbytes" => 1.0 / KIB,
            "mb" | "mbytes" => 1.0,
            "gb" | "gbytes" => KIB,
            "tb" | "tbytes" => KIB * KIB,
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "Unknown capacity unit: {:?}",
                    capacity
                )))
            }
        },
    };

    Ok(round2(value * factor))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id() {
        let id1 = generate_id();
        let id2 = generate_id();
        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 36); // UUID v4 格式
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.00 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
        assert_eq!(format_bytes(1073741824), "1.00 GB");
    }

    #[test]
    fn test_bytes_to_whole_megabytes() {
        assert_eq!(bytes_to_whole_megabytes(10 * 1024 * 1024 * 1024), 10240);
        assert_eq!(bytes_to_whole_megabytes(10_000_000_000), 9536);
        assert_eq!(bytes_to_whole_megabytes(1024 * 1024 - 1), 0);
    }

    #[test]
    fn test_capacity_to_megabytes() {
        assert_eq!(capacity_to_megabytes("10240 MBytes").unwrap(), 10240.0);
        assert_eq!(capacity_to_megabytes("5 GBytes").unwrap(), 5120.0);
        assert_eq!(capacity_to_megabytes("2048 KB").unwrap(), 2.0);
        assert_eq!(capacity_to_megabytes("64").unwrap(), 64.0);
        assert!(capacity_to_megabytes("").is_err());
        assert!(capacity_to_megabytes("lots MBytes").is_err());
        assert!(capacity_to_megabytes("10 parsecs").is_err());
    }
}
