// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::{net::Ipv4Addr, path::PathBuf};

use clap::Parser;

/// 命令行参数。未给出的选项回落到配置文件，再回落到内置默认值。
#[derive(Parser, Debug, Clone)]
#[command(name = "simple-http", version, about = "A minimal HTTP/1.0 static file server", long_about = None)]
pub struct Args {
    /// TOML 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 静态文件根目录
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    /// 监听端口
    #[arg(short, long)]
    pub port: Option<u16>,

    /// 监听地址
    #[arg(short, long)]
    pub bind: Option<Ipv4Addr>,

    /// 唯一允许连接的客户端地址
    #[arg(short, long)]
    pub origin: Option<Ipv4Addr>,

    /// 监听队列长度
    #[arg(short, long)]
    pub max_connections: Option<u32>,

    /// 等待请求的空闲超时（毫秒），0 表示一直等待
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// 运行时工作线程数，0 表示与 CPU 核数相同
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// log4rs 配置文件路径
    #[arg(long, default_value = "config/log4rs.yaml")]
    pub log_config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_flags() {
        let args = Args::try_parse_from([
            "simple-http", "-d", "www", "-p", "8080", "-b", "127.0.0.1", "-o", "10.0.0.1", "-m",
            "64", "-t", "5000", "-w", "2",
        ])
        .unwrap();

        assert_eq!(args.directory, Some(PathBuf::from("www")));
        assert_eq!(args.port, Some(8080));
        assert_eq!(args.bind, Some(Ipv4Addr::LOCALHOST));
        assert_eq!(args.origin, Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(args.max_connections, Some(64));
        assert_eq!(args.timeout, Some(5000));
        assert_eq!(args.workers, Some(2));
        assert_eq!(args.config, None);
        assert_eq!(args.log_config, PathBuf::from("config/log4rs.yaml"));
    }

    #[test]
    fn test_parse_long_flags() {
        let args = Args::try_parse_from([
            "simple-http",
            "--config",
            "/etc/simple-http.toml",
            "--max-connections",
            "10",
            "--log-config",
            "log.yaml",
        ])
        .unwrap();

        assert_eq!(args.config, Some(PathBuf::from("/etc/simple-http.toml")));
        assert_eq!(args.max_connections, Some(10));
        assert_eq!(args.log_config, PathBuf::from("log.yaml"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Args::try_parse_from(["simple-http", "-p", "70000"]).is_err());
        assert!(Args::try_parse_from(["simple-http", "-p", "eighty"]).is_err());
        assert!(Args::try_parse_from(["simple-http", "-o", "not-an-ip"]).is_err());
    }

    #[test]
    fn test_duplicate_flag_rejected() {
        assert!(Args::try_parse_from(["simple-http", "-p", "1", "-p", "2"]).is_err());
    }
}
