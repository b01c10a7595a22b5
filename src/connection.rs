// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 单连接状态机
//!
//! ```text
//! WaitingForData ──> Parsing ──> Routing ──> Responding ──> Closed
//!       │               │           │             │
//!       └─> TimedOut    └───────────┴─────────────┴──> Failed
//! ```
//!
//! 空闲超时、解析失败与传输错误都直接关闭连接，不写出任何字节。
//! 路由阶段的查找失败会被恢复为 404 或 500 响应。
//! 无论从哪个终态退出，套接字都会被关闭。

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use log::{debug, info, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    time,
};

use crate::{
    config::Config,
    content::ContentResolver,
    exception::Exception,
    param::{HttpRequestMethod, BUFFER_SIZE, HTML_INDEX},
    request::Request,
    response::Response,
};

/// 路由结果：选用哪一种发送方式
#[derive(Debug)]
pub enum Dispatch {
    Buffered(Response),
    File(Response, PathBuf),
}

impl Dispatch {
    pub fn response(&self) -> &Response {
        match self {
            Dispatch::Buffered(response) | Dispatch::File(response, _) => response,
        }
    }
}

/// 连接结束的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Closed,
    TimedOut,
    Failed(Exception),
}

enum ConnectionState {
    WaitingForData,
    Parsing,
    Routing(Request),
    Responding(Request, Dispatch),
    Closed,
    TimedOut,
    Failed(Exception),
}

/// 按固定优先级为请求选择响应。
///
/// 1. URI 为 `/`：301 重定向到首页；
/// 2. URI 含有 `..`：400，不访问文件系统；
/// 3. 根目录与 URI 直接拼接得到候选路径并解析内容类型，找不到为 404，其他失败为 500；
/// 4. 解析成功但方法为 POST：501；
/// 5. 其余情况以流式文件模式发送候选路径。
pub fn route<C>(
    request: &Request,
    document_root: &Path,
    resolver: &C,
    id: u128,
) -> Result<Dispatch, Exception>
where
    C: ContentResolver + ?Sized,
{
    let uri = request.uri();
    let mut response = Response::new();

    if uri == "/" {
        debug!("[ID{}]重定向到{}", id, HTML_INDEX);
        response.set_code(301).set_header("Location", HTML_INDEX)?;
        return Ok(Dispatch::Buffered(response));
    }
    if uri.contains("..") {
        warn!("[ID{}]拒绝含有“..”的路径：{}", id, uri);
        response.set_code(400);
        return Ok(Dispatch::Buffered(response));
    }

    let mut candidate = document_root.as_os_str().to_os_string();
    candidate.push(uri);
    let path = PathBuf::from(candidate);

    match resolver.resolve(&path) {
        Ok(mime) => {
            debug!("[ID{}]{}的内容类型为{}", id, path.display(), mime);
            response.set_header("Content-Type", &mime)?;
        }
        Err(Exception::NotFound) => {
            warn!("[ID{}]请求的文件{}不存在", id, path.display());
            return Ok(Dispatch::Buffered(Response::response_404()?));
        }
        Err(e) => {
            warn!("[ID{}]无法解析{}的内容类型：{}", id, path.display(), e);
            return Ok(Dispatch::Buffered(Response::response_500()));
        }
    }

    if request.method() == HttpRequestMethod::Post {
        response.set_code(501);
        return Ok(Dispatch::Buffered(response));
    }
    Ok(Dispatch::File(response, path))
}

pub struct Connection<S> {
    stream: BufReader<S>,
    peer: SocketAddr,
    id: u128,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: SocketAddr, id: u128) -> Self {
        Self {
            stream: BufReader::with_capacity(BUFFER_SIZE, stream),
            peer,
            id,
        }
    }

    /// 处理一次完整的请求-响应交换，然后关闭连接
    pub async fn run<C>(mut self, config: &Config, resolver: &C) -> Outcome
    where
        C: ContentResolver + ?Sized,
    {
        debug!("[ID{}]开始处理来自{}的连接", self.id, self.peer);
        let mut state = ConnectionState::WaitingForData;
        let outcome = loop {
            state = match state {
                ConnectionState::WaitingForData => {
                    self.wait_for_data(config.request_timeout()).await
                }
                ConnectionState::Parsing => self.parse().await,
                ConnectionState::Routing(request) => {
                    match route(&request, config.document_root(), resolver, self.id) {
                        Ok(dispatch) => ConnectionState::Responding(request, dispatch),
                        Err(e) => ConnectionState::Failed(e),
                    }
                }
                ConnectionState::Responding(request, dispatch) => {
                    self.respond(&request, dispatch).await
                }
                ConnectionState::Closed => break Outcome::Closed,
                ConnectionState::TimedOut => {
                    info!("[ID{}]等待请求超时，关闭连接", self.id);
                    break Outcome::TimedOut;
                }
                ConnectionState::Failed(e) => {
                    warn!("[ID{}]连接异常终止：{}", self.id, e);
                    break Outcome::Failed(e);
                }
            };
        };

        if let Err(e) = self.stream.shutdown().await {
            debug!("[ID{}]关闭连接时出错：{}", self.id, e);
        }
        debug!("[ID{}]连接已关闭", self.id);
        outcome
    }

    /// 等待连接可读。`None` 表示一直等待。
    async fn wait_for_data(&mut self, timeout: Option<Duration>) -> ConnectionState {
        let readable = match timeout {
            Some(limit) => match time::timeout(limit, self.stream.fill_buf()).await {
                Ok(result) => result.map(|buf| !buf.is_empty()),
                Err(_) => return ConnectionState::TimedOut,
            },
            None => self.stream.fill_buf().await.map(|buf| !buf.is_empty()),
        };
        match readable {
            Ok(true) => ConnectionState::Parsing,
            Ok(false) => {
                debug!("[ID{}]对端在发送请求前关闭了连接", self.id);
                ConnectionState::Closed
            }
            Err(e) => ConnectionState::Failed(e.into()),
        }
    }

    async fn parse(&mut self) -> ConnectionState {
        match Request::read_from(&mut self.stream, &self.peer, self.id).await {
            Ok(request) if !request.version().is_supported() => {
                warn!("[ID{}]不支持的协议版本：{}", self.id, request.version());
                ConnectionState::Failed(Exception::UnsupportedHttpVersion)
            }
            Ok(request) => ConnectionState::Routing(request),
            Err(e) => ConnectionState::Failed(e),
        }
    }

    async fn respond(&mut self, request: &Request, dispatch: Dispatch) -> ConnectionState {
        let sent = match dispatch {
            Dispatch::Buffered(response) => {
                response
                    .send(&mut self.stream, request, &self.peer, self.id)
                    .await
            }
            Dispatch::File(response, path) => {
                response
                    .send_file(&mut self.stream, request, &self.peer, &path, self.id)
                    .await
            }
        };
        match sent {
            Ok(()) => ConnectionState::Closed,
            Err(e) => ConnectionState::Failed(e),
        }
    }
}
