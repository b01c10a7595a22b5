// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 响应构建与发送模块
//!
//! `Response` 由路由逻辑填充（状态码、头部、可选的内存正文），随后被恰好消费一次：
//! - [`Response::send`]：缓冲正文模式，正文按协议缓冲单元分块写出；
//! - [`Response::send_file`]：流式文件模式，发送前计算文件长度并注入 `Content-Length`，
//!   正文直接从文件分块拷贝到连接上。
//!
//! 两种模式对 HEAD 请求都只发送状态行与头部。任何一次写入失败都会立即中止发送，不做重试。

use std::{io, net::SocketAddr, path::Path};

use bytes::Bytes;
use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWrite, AsyncWriteExt},
};

use crate::{exception::Exception, header::HeaderMap, param::*, request::Request};

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: &'static str,
    headers: HeaderMap,
    content: Option<Bytes>,
}

impl Response {
    /// 默认响应：`200 OK`，带有 `Server` 与 `Date` 头部
    pub fn new() -> Self {
        let mut headers = HeaderMap::new();
        // 新表只有内存耗尽时才会写入失败，此时退化为没有默认头部的响应
        for (key, value) in [("Server", SERVER_NAME.to_string()), ("Date", format_date())] {
            if let Err(e) = headers.set(key, &value) {
                error!("无法设置默认响应头{}：{}", key, e);
            }
        }
        Self {
            version: HttpVersion::V1_0,
            status_code: 200,
            information: "OK",
            headers,
            content: None,
        }
    }

    /// 404 响应，带有固定的纯文本正文
    pub fn response_404() -> Result<Self, Exception> {
        let mut response = Self::new();
        response
            .set_code(404)
            .set_header("Content-Type", "text/plain")?
            .set_content(NOT_FOUND_BODY)?;
        Ok(response)
    }

    /// 500 响应，没有正文
    pub fn response_500() -> Self {
        let mut response = Self::new();
        response.set_code(500);
        response
    }

    /// 设置状态码。
    ///
    /// # Panics
    /// 状态码不在 RFC 1945 原因短语表中时 panic，这说明调用方代码有误。
    pub fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match reason_phrase(code) {
            Some(information) => information,
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                panic!("非法的状态码：{}", code);
            }
        };
        self
    }

    pub fn set_header(&mut self, key: &str, value: &str) -> Result<&mut Self, Exception> {
        self.headers.set(key, value)?;
        Ok(self)
    }

    /// 设置内存正文，同时更新 `Content-Length`
    pub fn set_content(&mut self, content: impl Into<Bytes>) -> Result<&mut Self, Exception> {
        let content = content.into();
        self.headers
            .set("Content-Length", &content.len().to_string())?;
        self.content = Some(content);
        Ok(self)
    }

    /// 状态行、所有头部行与空行
    fn preamble(&self) -> Vec<u8> {
        let mut header = format!(
            "{} {} {}{}",
            self.version, self.status_code, self.information, CRLF
        );
        for (key, value) in self.headers.iter() {
            header.push_str(key);
            header.push_str(": ");
            header.push_str(value);
            header.push_str(CRLF);
        }
        header.push_str(CRLF);
        header.into_bytes()
    }

    /// 以缓冲正文模式发送。
    ///
    /// 依次写出状态行、头部、空行；非 HEAD 请求再写出正文与结尾的空行。
    pub async fn send<W>(
        mut self,
        writer: &mut W,
        request: &Request,
        peer: &SocketAddr,
        id: u128,
    ) -> Result<(), Exception>
    where
        W: AsyncWrite + Unpin,
    {
        if !self.headers.contains("Content-Length") {
            self.headers.set("Content-Length", "0")?;
        }

        write_chunked(writer, &self.preamble(), id).await?;
        if request.method() != HttpRequestMethod::Head {
            if let Some(content) = &self.content {
                debug!("[ID{}]发送正文，长度: {}", id, content.len());
                write_chunked(writer, content, id).await?;
            }
            // 正文为空时同样以空行结尾
            write_chunked(writer, CRLF.as_bytes(), id).await?;
        }
        flush(writer, id).await?;

        self.log_access(peer);
        Ok(())
    }

    /// 以流式文件模式发送。
    ///
    /// 文件无法打开时，在写出任何字节之前替换为 404（文件不存在）或 500（其他错误）的缓冲响应。
    pub async fn send_file<W>(
        mut self,
        writer: &mut W,
        request: &Request,
        peer: &SocketAddr,
        path: &Path,
        id: u128,
    ) -> Result<(), Exception>
    where
        W: AsyncWrite + Unpin,
    {
        let (mut file, length) = match open_regular_file(path).await {
            Ok(opened) => opened,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("[ID{}]文件{}不存在，改为发送404", id, path.display());
                return Self::response_404()?.send(writer, request, peer, id).await;
            }
            Err(e) => {
                error!("[ID{}]无法打开文件{}：{}，改为发送500", id, path.display(), e);
                return Self::response_500().send(writer, request, peer, id).await;
            }
        };
        self.headers.set("Content-Length", &length.to_string())?;

        write_chunked(writer, &self.preamble(), id).await?;
        if request.method() != HttpRequestMethod::Head {
            debug!("[ID{}]开始流式传输，文件大小: {} bytes", id, length);
            let mut buffer = vec![0u8; BUFFER_SIZE];
            let mut total_sent = 0u64;
            loop {
                let n = match file.read(&mut buffer).await {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        error!("[ID{}]读取文件失败: {}", id, e);
                        return Err(e.into());
                    }
                };
                if let Err(e) = writer.write_all(&buffer[..n]).await {
                    error!("[ID{}]流式写入失败: {}", id, e);
                    return Err(e.into());
                }
                total_sent += n as u64;
            }
            debug!("[ID{}]流式传输完成，共发送 {} 字节", id, total_sent);
        }
        flush(writer, id).await?;

        self.log_access(peer);
        Ok(())
    }

    fn log_access(&self, peer: &SocketAddr) {
        info!(
            target: "access",
            "{} {} {}",
            peer, self.status_code, self.information
        );
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        self.information
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }
}

/// RFC 1123 格式的当前时间
fn format_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// 目录等非普通文件按不存在处理
async fn open_regular_file(path: &Path) -> io::Result<(File, u64)> {
    let file = File::open(path).await?;
    let metadata = file.metadata().await?;
    if !metadata.is_file() {
        return Err(io::Error::new(io::ErrorKind::NotFound, "not a regular file"));
    }
    Ok((file, metadata.len()))
}

/// 每次写入不超过一个协议缓冲单元
async fn write_chunked<W>(writer: &mut W, data: &[u8], id: u128) -> Result<(), Exception>
where
    W: AsyncWrite + Unpin,
{
    for chunk in data.chunks(BUFFER_SIZE) {
        if let Err(e) = writer.write_all(chunk).await {
            error!("[ID{}]发送响应失败: {}", id, e);
            return Err(e.into());
        }
    }
    Ok(())
}

async fn flush<W>(writer: &mut W, id: u128) -> Result<(), Exception>
where
    W: AsyncWrite + Unpin,
{
    if let Err(e) = writer.flush().await {
        error!("[ID{}]刷新连接失败: {}", id, e);
        return Err(e.into());
    }
    Ok(())
}
