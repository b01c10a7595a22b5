// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 配置解析与管理
//!
//! 配置来源按优先级从低到高：内置默认值、TOML 配置文件、命令行参数。
//! 合并后的结果经过校验得到不可变的 [`Config`]，由所有连接只读共享。

use std::{
    fs,
    net::Ipv4Addr,
    path::{Path, PathBuf},
    time::Duration,
};

use log::{error, info, warn};
use serde_derive::Deserialize;

use crate::{cli::Args, exception::Exception, param::SOMAXCONN};

/// 未指定配置文件且未指定根目录时依次尝试的位置
pub const DEFAULT_CONFIG_PATHS: [&str; 2] =
    ["/usr/local/etc/simple-http.toml", "/etc/simple-http.toml"];

#[derive(Debug, Clone)]
pub struct Config {
    host: Ipv4Addr,
    port: u16,
    document_root: PathBuf,
    max_connections: u32,
    request_timeout: u64,
    allow: Option<Ipv4Addr>,
    worker_threads: usize,
}

impl Config {
    pub fn new(document_root: impl Into<PathBuf>) -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED,
            port: 80,
            document_root: document_root.into(),
            max_connections: SOMAXCONN,
            request_timeout: 0,
            allow: None,
            worker_threads: num_cpus::get(),
        }
    }

    /// 合并配置文件与命令行参数，并校验结果
    pub fn load(args: &Args) -> Result<Self, Exception> {
        let mut raw = match &args.config {
            Some(path) => RawConfig::from_toml(path)?,
            None if args.directory.is_none() => RawConfig::from_default_locations()?,
            None => RawConfig::default(),
        };
        raw.apply_args(args);
        raw.into_config()
    }

    pub fn with_host(mut self, host: Ipv4Addr) -> Self {
        self.host = host;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// 单位为毫秒，0 表示不设超时
    pub fn with_request_timeout(mut self, millis: u64) -> Self {
        self.request_timeout = millis;
        self
    }

    pub fn with_allow(mut self, allow: Option<Ipv4Addr>) -> Self {
        self.allow = allow;
        self
    }

    /// 0 表示与 CPU 核数相同
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = match worker_threads {
            0 => num_cpus::get(),
            n => n,
        };
        self
    }

    fn validate(&self) -> Result<(), Exception> {
        if !self.document_root.is_dir() {
            error!("根目录{}不存在或不是目录", self.document_root.display());
            return Err(Exception::InvalidConfig("document root is not a directory"));
        }
        if self.max_connections < 1 || self.max_connections > SOMAXCONN {
            error!("非法的最大连接数：{}", self.max_connections);
            return Err(Exception::InvalidConfig(
                "max connections must be between 1 and SOMAXCONN",
            ));
        }
        Ok(())
    }
}

impl Config {
    pub fn host(&self) -> Ipv4Addr {
        self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn document_root(&self) -> &Path {
        &self.document_root
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout {
            0 => None,
            millis => Some(Duration::from_millis(millis)),
        }
    }

    pub fn allow(&self) -> Option<Ipv4Addr> {
        self.allow
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }
}

/// 配置文件中的字段均可省略
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
struct RawConfig {
    host: Option<Ipv4Addr>,
    port: Option<u16>,
    document_root: Option<PathBuf>,
    max_connections: Option<u32>,
    request_timeout: Option<u64>,
    allow: Option<Ipv4Addr>,
    worker_threads: Option<usize>,
}

impl RawConfig {
    fn from_toml(path: &Path) -> Result<Self, Exception> {
        let content = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                error!("无法读取配置文件{}：{}", path.display(), e);
                return Err(Exception::ConfigNotFound);
            }
        };
        match toml::from_str(&content) {
            Ok(raw) => {
                info!("配置文件{}已载入", path.display());
                Ok(raw)
            }
            Err(e) => {
                error!("无法解析配置文件{}：{}", path.display(), e);
                Err(Exception::ConfigMalformed)
            }
        }
    }

    fn from_default_locations() -> Result<Self, Exception> {
        for path in DEFAULT_CONFIG_PATHS.iter().map(Path::new) {
            if path.exists() {
                return Self::from_toml(path);
            }
        }
        warn!("未找到配置文件（尝试了{}）", DEFAULT_CONFIG_PATHS.join("、"));
        Ok(Self::default())
    }

    fn apply_args(&mut self, args: &Args) {
        if args.directory.is_some() {
            self.document_root = args.directory.clone();
        }
        if args.port.is_some() {
            self.port = args.port;
        }
        if args.bind.is_some() {
            self.host = args.bind;
        }
        if args.origin.is_some() {
            self.allow = args.origin;
        }
        if args.max_connections.is_some() {
            self.max_connections = args.max_connections;
        }
        if args.timeout.is_some() {
            self.request_timeout = args.timeout;
        }
        if args.workers.is_some() {
            self.worker_threads = args.workers;
        }
    }

    fn into_config(self) -> Result<Config, Exception> {
        let document_root = match self.document_root {
            Some(root) => root,
            None => {
                error!("未指定静态文件根目录");
                return Err(Exception::InvalidConfig("missing document root"));
            }
        };

        let mut config = Config::new(document_root).with_allow(self.allow);
        if let Some(host) = self.host {
            config = config.with_host(host);
        }
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if let Some(max_connections) = self.max_connections {
            config = config.with_max_connections(max_connections);
        }
        if let Some(timeout) = self.request_timeout {
            config = config.with_request_timeout(timeout);
        }
        if let Some(worker_threads) = self.worker_threads {
            config = config.with_worker_threads(worker_threads);
        }
        config.validate()?;
        Ok(config)
    }
}
