// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 该模块负责把一个连接上读到的原始字节解析为强类型的 `Request` 结构体。它涵盖了：
//! 1. 按协议缓冲单元读取，直到出现头部结束标记 `CRLFCRLF`。
//! 2. 请求行（Request-Line）的解析：`METHOD SP URI SP "HTTP/" MAJOR "." MINOR`。
//! 3. 头部字段的提取，存入大小写不敏感的 `HeaderMap`。
//! 4. 按 `Content-Length` 读取完整的请求体。

use std::net::SocketAddr;

use bytes::Bytes;
use lazy_static::lazy_static;
use log::{debug, error, info, warn};
use regex::Regex;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{exception::Exception, header::HeaderMap, param::*};

lazy_static! {
    static ref REQUEST_LINE: Regex =
        Regex::new(r"^([A-Za-z]+) (\S+) HTTP/(\d+)\.(\d+)$").unwrap();
}

/// 表示一个完整的 HTTP 请求。
///
/// 创建后不可变，由连接处理器在一次交换期间独占。
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP 请求方法（GET, HEAD, POST）
    method: HttpRequestMethod,
    /// 请求的资源路径，原样保留（包含查询字符串）
    uri: String,
    /// HTTP 协议版本
    version: HttpVersion,
    /// 请求头部
    headers: HeaderMap,
    /// 请求体，仅当 `Content-Length` 为正数时存在
    body: Option<Bytes>,
}

impl Request {
    /// 从连接中读取并解析一个完整的请求。
    ///
    /// # 逻辑步骤
    /// 1. 读入一个协议缓冲单元大小的缓冲区，可能经历多次不完整的读取，
    ///    一旦发现 `CRLFCRLF` 立即停止。缓冲区写满仍未发现标记，视为格式错误。
    /// 2. 解析请求行与头部字段。
    /// 3. 若声明了正数的 `Content-Length`，先复制首次读取中已经到达的请求体字节，再继续读取剩余部分。
    /// 4. 向访问日志写入一行解析结果。
    ///
    /// # 错误处理
    /// - 格式错误返回 `RequestMalformed`；
    /// - 声明长度超过 `MAX_CONTENT_LENGTH` 返回 `EntityTooLarge`，不会尝试读取请求体；
    /// - 读取失败或对端提前关闭返回 `TransportError`。
    pub async fn read_from<R>(reader: &mut R, peer: &SocketAddr, id: u128) -> Result<Self, Exception>
    where
        R: AsyncRead + Unpin,
    {
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut filled = 0;

        let header_end = loop {
            if filled == buffer.len() {
                error!("[ID{}]请求头超过{}字节仍未结束", id, BUFFER_SIZE);
                return Err(Exception::RequestMalformed);
            }
            let n = reader.read(&mut buffer[filled..]).await?;
            if n == 0 {
                error!("[ID{}]连接在请求头结束前被关闭", id);
                return Err(Exception::RequestMalformed);
            }
            // 标记可能横跨两次读取
            let search_from = filled.saturating_sub(END_OF_HEADERS.len() - 1);
            filled += n;
            if let Some(pos) = find_end_of_headers(&buffer[search_from..filled]) {
                break search_from + pos;
            }
        };
        debug!("[ID{}]请求头接收完毕，共{}字节", id, header_end);

        let mut request = Self::try_from(&buffer[..header_end], id)?;
        let leftover = &buffer[header_end + END_OF_HEADERS.len()..filled];
        request.body = read_body(reader, &request.headers, leftover, id).await?;

        info!(
            target: "access",
            "{} \"{} {} {}\"",
            peer, request.method, request.uri, request.version
        );
        Ok(request)
    }

    /// 解析不含结束标记的请求头部分（请求行加头部字段），得到一个没有请求体的 `Request`。
    pub fn try_from(head: &[u8], id: u128) -> Result<Self, Exception> {
        let head = match std::str::from_utf8(head) {
            Ok(s) => s,
            Err(_) => {
                error!("[ID{}]请求头不是合法的UTF-8", id);
                return Err(Exception::RequestMalformed);
            }
        };

        let mut lines = head.split(CRLF);
        let request_line = lines.next().unwrap_or_default();
        let captures = match REQUEST_LINE.captures(request_line) {
            Some(c) => c,
            None => {
                error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
                return Err(Exception::RequestMalformed);
            }
        };

        let method = match HttpRequestMethod::from_token(&captures[1]) {
            Some(m) => m,
            None => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, &captures[1]);
                return Err(Exception::RequestMalformed);
            }
        };
        let uri = captures[2].to_string();
        let version = match (captures[3].parse(), captures[4].parse()) {
            (Ok(major), Ok(minor)) => HttpVersion::new(major, minor),
            _ => {
                error!("[ID{}]无法解析HTTP协议版本：{}", id, request_line);
                return Err(Exception::RequestMalformed);
            }
        };

        let mut headers = HeaderMap::new();
        for line in lines {
            let (key, value) = match line.split_once(':') {
                Some((k, v)) if !k.is_empty() => (k, v),
                _ => {
                    error!("[ID{}]无法解析的头部字段：{}", id, line);
                    return Err(Exception::RequestMalformed);
                }
            };
            // 重复的字段以最后一次出现为准
            headers.set(key, value.trim_start_matches(' '))?;
        }

        Ok(Self {
            method,
            uri,
            version,
            headers,
            body: None,
        })
    }
}

fn find_end_of_headers(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(END_OF_HEADERS.len())
        .position(|w| w == END_OF_HEADERS)
}

async fn read_body<R>(
    reader: &mut R,
    headers: &HeaderMap,
    leftover: &[u8],
    id: u128,
) -> Result<Option<Bytes>, Exception>
where
    R: AsyncRead + Unpin,
{
    let declared = match headers.get("Content-Length") {
        Some(value) => match value.trim().parse::<i64>() {
            Ok(n) => n,
            Err(_) => {
                error!("[ID{}]非法的Content-Length：{}", id, value);
                return Err(Exception::RequestMalformed);
            }
        },
        None => return Ok(None),
    };
    if declared <= 0 {
        return Ok(None);
    }
    if declared as u64 > MAX_CONTENT_LENGTH {
        warn!(
            "[ID{}]请求体声明长度{}超过上限{}",
            id, declared, MAX_CONTENT_LENGTH
        );
        return Err(Exception::EntityTooLarge);
    }

    let length = declared as usize;
    let mut body = Vec::new();
    body.try_reserve_exact(length)?;

    // 超出声明长度的字节直接丢弃
    let already = leftover.len().min(length);
    body.extend_from_slice(&leftover[..already]);
    body.resize(length, 0);

    if let Err(e) = reader.read_exact(&mut body[already..]).await {
        error!(
            "[ID{}]读取请求体失败，期望{}字节：{}",
            id, length, e
        );
        return Err(e.into());
    }
    debug!("[ID{}]请求体接收完毕，共{}字节", id, length);
    Ok(Some(Bytes::from(body)))
}

// --- Getter 访问器实现 ---

impl Request {
    /// 获取请求方法
    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    /// 获取请求路径
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// 获取 HTTP 协议版本
    pub fn version(&self) -> HttpVersion {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn body_length(&self) -> usize {
        self.body.as_ref().map_or(0, |b| b.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    async fn parse(raw: &[u8]) -> Result<Request, Exception> {
        let mut reader = raw;
        Request::read_from(&mut reader, &peer(), 0).await
    }

    /// 最简请求：无头部、无请求体
    #[tokio::test]
    async fn test_parse_minimal_request() {
        let request = parse(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Get);
        assert_eq!(request.uri(), "/");
        assert_eq!(request.version(), HttpVersion::new(1, 0));
        assert!(request.headers().is_empty());
        assert!(request.body().is_none());
        assert_eq!(request.body_length(), 0);
    }

    #[tokio::test]
    async fn test_parse_headers() {
        let raw = b"HEAD /index.html HTTP/1.1\r\nHost: localhost\r\nUser-Agent:   curl/8.0\r\nX-Empty:\r\n\r\n";
        let request = parse(raw).await.unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Head);
        assert_eq!(request.uri(), "/index.html");
        assert_eq!(request.version(), HttpVersion::new(1, 1));
        assert_eq!(request.headers().len(), 3);
        assert_eq!(request.headers().get("host"), Some("localhost"));
        assert_eq!(request.headers().get("USER-AGENT"), Some("curl/8.0"));
        assert_eq!(request.headers().get("x-empty"), Some(""));
    }

    #[tokio::test]
    async fn test_duplicate_header_last_wins() {
        let raw = b"GET / HTTP/1.0\r\nAccept: text/html\r\naccept: */*\r\n\r\n";
        let request = parse(raw).await.unwrap();

        assert_eq!(request.headers().len(), 1);
        assert_eq!(request.headers().get("Accept"), Some("*/*"));
    }

    #[tokio::test]
    async fn test_value_keeps_later_colons() {
        let raw = b"GET / HTTP/1.0\r\nHost: localhost:8080\r\n\r\n";
        let request = parse(raw).await.unwrap();

        assert_eq!(request.headers().get("Host"), Some("localhost:8080"));
    }

    #[tokio::test]
    async fn test_parse_body_with_content_length() {
        let raw = b"POST /submit HTTP/1.0\r\nContent-Length: 5\r\n\r\nhello";
        let request = parse(raw).await.unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Post);
        assert_eq!(request.body_length(), 5);
        assert_eq!(request.body().unwrap().as_ref(), b"hello");
    }

    #[tokio::test]
    async fn test_short_body_is_transport_error() {
        let raw = b"POST /submit HTTP/1.0\r\nContent-Length: 5\r\n\r\nhel";
        let result = parse(raw).await;

        assert_eq!(
            result.unwrap_err(),
            Exception::TransportError(io::ErrorKind::UnexpectedEof)
        );
    }

    /// 请求头与请求体分多次到达
    #[tokio::test]
    async fn test_parse_across_partial_reads() {
        let first: &[u8] = b"POST /form HTTP/1.0\r\nContent-Le";
        let second: &[u8] = b"ngth: 11\r\n\r";
        let third: &[u8] = b"\nhello ";
        let fourth: &[u8] = b"world";
        let mut reader = first.chain(second).chain(third).chain(fourth);

        let request = Request::read_from(&mut reader, &peer(), 0).await.unwrap();

        assert_eq!(request.headers().get("content-length"), Some("11"));
        assert_eq!(request.body().unwrap().as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn test_extra_bytes_after_body_are_dropped() {
        let raw = b"POST / HTTP/1.0\r\nContent-Length: 2\r\n\r\nokGET / HTTP/1.0\r\n\r\n";
        let request = parse(raw).await.unwrap();

        assert_eq!(request.body().unwrap().as_ref(), b"ok");
    }

    #[tokio::test]
    async fn test_zero_or_negative_content_length_has_no_body() {
        let request = parse(b"POST / HTTP/1.0\r\nContent-Length: 0\r\n\r\n").await.unwrap();
        assert!(request.body().is_none());

        let request = parse(b"POST / HTTP/1.0\r\nContent-Length: -3\r\n\r\n").await.unwrap();
        assert!(request.body().is_none());
    }

    #[tokio::test]
    async fn test_non_numeric_content_length() {
        let result = parse(b"POST / HTTP/1.0\r\nContent-Length: five\r\n\r\nhello").await;
        assert_eq!(result.unwrap_err(), Exception::RequestMalformed);
    }

    #[tokio::test]
    async fn test_entity_too_large() {
        let raw = format!(
            "POST / HTTP/1.0\r\nContent-Length: {}\r\n\r\nabc",
            MAX_CONTENT_LENGTH + 1
        );
        let result = parse(raw.as_bytes()).await;

        assert_eq!(result.unwrap_err(), Exception::EntityTooLarge);
    }

    #[tokio::test]
    async fn test_missing_end_of_headers() {
        let result = parse(b"GET / HTTP/1.0\r\nHost: localhost\r\n").await;
        assert_eq!(result.unwrap_err(), Exception::RequestMalformed);
    }

    #[tokio::test]
    async fn test_buffer_exhausted_without_marker() {
        let raw = vec![b'a'; BUFFER_SIZE + 100];
        let result = parse(&raw).await;

        assert_eq!(result.unwrap_err(), Exception::RequestMalformed);
    }

    /// 请求恰好填满一个缓冲单元时仍然合法
    #[tokio::test]
    async fn test_request_filling_exact_buffer() {
        let overhead = "GET / HTTP/1.0\r\n\r\n".len();
        let uri = format!("/{}", "a".repeat(BUFFER_SIZE - overhead));
        let raw = format!("GET {} HTTP/1.0\r\n\r\n", uri);
        assert_eq!(raw.len(), BUFFER_SIZE);

        let request = parse(raw.as_bytes()).await.unwrap();

        assert_eq!(request.uri(), uri);
        assert_eq!(request.body_length(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let result = parse(b"DELETE /resource HTTP/1.0\r\n\r\n").await;
        assert_eq!(result.unwrap_err(), Exception::RequestMalformed);
    }

    #[tokio::test]
    async fn test_lowercase_method_is_malformed() {
        let result = parse(b"get / HTTP/1.0\r\n\r\n").await;
        assert_eq!(result.unwrap_err(), Exception::RequestMalformed);
    }

    #[tokio::test]
    async fn test_malformed_request_lines() {
        for raw in [
            &b"GET /\r\n\r\n"[..],
            b"GET  / HTTP/1.0\r\n\r\n",
            b"GET / HTTP/1\r\n\r\n",
            b"GET / FTP/1.0\r\n\r\n",
            b"GET / HTTP/one.zero\r\n\r\n",
            b"\r\n\r\n",
        ] {
            assert_eq!(parse(raw).await.unwrap_err(), Exception::RequestMalformed);
        }
    }

    #[tokio::test]
    async fn test_header_without_colon() {
        let result = parse(b"GET / HTTP/1.0\r\nNoColonHere\r\n\r\n").await;
        assert_eq!(result.unwrap_err(), Exception::RequestMalformed);
    }

    #[tokio::test]
    async fn test_invalid_utf8() {
        let result = parse(b"GET /\xFF\xFE HTTP/1.0\r\n\r\n").await;
        assert_eq!(result.unwrap_err(), Exception::RequestMalformed);
    }

    #[test]
    fn test_try_from_head_only() {
        let request = Request::try_from(b"GET /page?id=123 HTTP/1.0\r\nHost: x", 0).unwrap();

        assert_eq!(request.uri(), "/page?id=123");
        assert_eq!(request.headers().get("host"), Some("x"));
        assert!(request.body().is_none());
    }
}
