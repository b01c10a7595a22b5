// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP/1.0 协议参数与常量模块
//!
//! 该模块定义了 `simple-http` 遵循的 RFC 1945 相关常量和数据结构，包括：
//! - 固定的状态码及其原因短语（Reason Phrase）。
//! - 优先于内容探测的扩展名 MIME 覆盖表。
//! - HTTP 方法与版本的强类型表示。

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use lazy_static::lazy_static;

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 请求头与请求体之间的分隔标记
pub const END_OF_HEADERS: &[u8] = b"\r\n\r\n";

/// 协议缓冲单元：限制 URI 长度、单次写入大小以及读取请求头的粒度
pub const BUFFER_SIZE: usize = 8192;

/// 请求体的硬性上限，超过后直接拒绝而不尝试读取
pub const MAX_CONTENT_LENGTH: u64 = 8 * 1024 * 1024;

/// 根路径重定向的目标
pub const HTML_INDEX: &str = "/index.html";

/// 404 响应携带的固定正文
pub const NOT_FOUND_BODY: &str = "Not Found";

/// 系统允许的最大监听队列长度
pub const SOMAXCONN: u32 = 4096;

/// 停机时等待在途连接的最长时间，超时后强制关闭
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

lazy_static! {
    /// RFC 1945 定义的状态码与原因短语映射表。
    ///
    /// 该表是封闭的：使用表外的状态码属于编码错误。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        // 2xx: 成功响应
        map.insert(200, "OK");
        map.insert(201, "Created");
        map.insert(202, "Accepted");
        map.insert(204, "No Content");

        // 3xx: 重定向
        map.insert(300, "Multiple Choices");
        map.insert(301, "Moved Permanently");
        map.insert(302, "Moved Temporarily");
        map.insert(304, "Not Modified");

        // 4xx: 客户端错误
        map.insert(400, "Bad Request");
        map.insert(401, "Unauthorized");
        map.insert(403, "Forbidden");
        map.insert(404, "Not Found");

        // 5xx: 服务端错误
        map.insert(500, "Internal Server Error");
        map.insert(501, "Not Implemented");
        map.insert(502, "Bad Gateway");
        map.insert(503, "Service Unavailable");
        map
    };
}

lazy_static! {
    /// 文件扩展名到 MIME 类型的覆盖表。
    ///
    /// 这些类型的内容探测结果不可靠（通常会被识别为 `text/plain`），因此优先按扩展名判定。
    pub static ref EXTENSION_TYPES: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        map.insert("css", "text/css");
        map.insert("js", "application/javascript");
        map.insert("json", "application/json");
        map.insert("xml", "application/xml");
        map.insert("md", "text/markdown");
        map
    };
}

/// 查询状态码对应的原因短语
pub fn reason_phrase(code: u16) -> Option<&'static str> {
    STATUS_CODES.get(&code).copied()
}

/// 支持的 HTTP 请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpRequestMethod {
    /// 获取资源
    Get,
    /// 获取资源的元数据（不包含响应体）
    Head,
    /// 提交数据
    Post,
}

impl HttpRequestMethod {
    /// 方法名区分大小写（RFC 1945 §5.1.1）
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "GET" => Some(HttpRequestMethod::Get),
            "HEAD" => Some(HttpRequestMethod::Head),
            "POST" => Some(HttpRequestMethod::Post),
            _ => None,
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpRequestMethod::Get => write!(f, "GET"),
            HttpRequestMethod::Head => write!(f, "HEAD"),
            HttpRequestMethod::Post => write!(f, "POST"),
        }
    }
}

/// HTTP 协议版本号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpVersion {
    pub major: u32,
    pub minor: u32,
}

impl HttpVersion {
    /// 服务端响应使用的版本
    pub const V1_0: HttpVersion = HttpVersion { major: 1, minor: 0 };

    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// 本服务器能够处理的最高版本为 1.1
    pub fn is_supported(&self) -> bool {
        self.major < 1 || (self.major == 1 && self.minor <= 1)
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}
