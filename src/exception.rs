// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了服务器从启动到单个连接处理结束的整个生命周期中可能出现的异常情况。
//!
//! ## 处理策略
//! - **解析层与传输层**（`RequestMalformed`、`EntityTooLarge`、`TransportError` 等）：
//!   对当前连接是终结性的，连接直接关闭，不写出任何响应。
//! - **路由层**（`NotFound`、`InternalFailure`）：可恢复，分别转化为 404 与 500 响应。
//! - **启动层**（配置、绑定、日志）：导致进程以非零状态退出。
//!
//! 任何地方都不会自动重试。

use std::{fmt, io};

/// 服务器运行过程中发生的异常类型。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 请求报文格式错误：未找到头部结束标记、请求行不合法、方法未知等。
    RequestMalformed,
    /// 请求声明的 `Content-Length` 超过了硬性上限。
    EntityTooLarge,
    /// 请求使用了高于 1.1 的协议版本。
    UnsupportedHttpVersion,
    /// 套接字读写失败，或对端在声明长度的请求体到达前关闭了连接。
    TransportError(io::ErrorKind),
    /// 为请求头表或缓冲区分配内存失败。
    MemoryExhausted,
    /// 请求的文件不存在。对应 `404 Not Found`。
    NotFound,
    /// 其他查找或发送失败。对应 `500 Internal Server Error`。
    InternalFailure,
    /// 显式指定的配置文件无法打开。
    ConfigNotFound,
    /// 配置文件无法解析。
    ConfigMalformed,
    /// 合并后的配置未通过校验。
    InvalidConfig(&'static str),
    /// 监听套接字创建或绑定失败。
    BindFailed(io::ErrorKind),
    /// 日志系统初始化失败。
    LoggerInitFailed,
}

use Exception::*;

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestMalformed => write!(f, "Malformed request"),
            EntityTooLarge => write!(f, "Request entity too large"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            TransportError(kind) => write!(f, "Transport error: {}", kind),
            MemoryExhausted => write!(f, "Memory exhausted"),
            NotFound => write!(f, "File not found (404)"),
            InternalFailure => write!(f, "Internal failure (500)"),
            ConfigNotFound => write!(f, "Configuration file not found"),
            ConfigMalformed => write!(f, "Configuration file is malformed"),
            InvalidConfig(reason) => write!(f, "Invalid configuration: {}", reason),
            BindFailed(kind) => write!(f, "Couldn't bind the listening socket: {}", kind),
            LoggerInitFailed => write!(f, "Couldn't initialize the logger"),
        }
    }
}

impl std::error::Error for Exception {}

impl From<io::Error> for Exception {
    fn from(e: io::Error) -> Self {
        TransportError(e.kind())
    }
}

impl From<std::collections::TryReserveError> for Exception {
    fn from(_: std::collections::TryReserveError) -> Self {
        MemoryExhausted
    }
}
