#![allow(dead_code)]

use std::{fs, net::Ipv4Addr, net::SocketAddr, path::Path};

use simple_http::{Config, Server};
use tempfile::TempDir;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::oneshot,
    task::JoinHandle,
};

pub const INDEX_HTML: &str = "<!DOCTYPE html>\n<html><body><h1>hello</h1></body></html>\n";
pub const STYLE_CSS: &str = "body { color: black; }\n";

/// 在回环地址的随机端口上运行的服务器
pub struct TestServer {
    pub addr: SocketAddr,
    pub root: TempDir,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|config| config).await
    }

    pub async fn start_with<F>(configure: F) -> Self
    where
        F: FnOnce(Config) -> Config,
    {
        let root = tempfile::tempdir().unwrap();
        populate(root.path());

        let config = configure(
            Config::new(root.path())
                .with_host(Ipv4Addr::LOCALHOST)
                .with_port(0)
                .with_max_connections(128),
        );
        let server = Server::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));

        Self {
            addr,
            root,
            shutdown: Some(tx),
            handle,
        }
    }

    /// 发出停机信号并等待监听循环退出
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.unwrap();
    }
}

fn populate(root: &Path) {
    fs::write(root.join("index.html"), INDEX_HTML).unwrap();
    fs::create_dir(root.join("css")).unwrap();
    fs::write(root.join("css/style.css"), STYLE_CSS).unwrap();
}

/// 发送原始字节并读到连接关闭。服务器直接断开连接时返回空。
pub async fn send_raw(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = match TcpStream::connect(addr).await {
        Ok(stream) => stream,
        Err(_) => return Vec::new(),
    };
    // 空请求保持写端打开，用于观察空闲超时
    if !request.is_empty() {
        if stream.write_all(request).await.is_err() {
            return Vec::new();
        }
        let _ = stream.shutdown().await;
    }
    let mut response = Vec::new();
    match stream.read_to_end(&mut response).await {
        Ok(_) => response,
        Err(_) => Vec::new(),
    }
}

pub struct ParsedResponse {
    pub status_line: String,
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ParsedResponse {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

pub fn parse_response(response: &[u8]) -> ParsedResponse {
    let split = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has no end of headers");
    let head = std::str::from_utf8(&response[..split]).unwrap();
    let mut lines = head.split("\r\n");

    let status_line = lines.next().unwrap().to_string();
    let status_code = status_line
        .split_whitespace()
        .nth(1)
        .unwrap_or("0")
        .parse::<u16>()
        .unwrap_or(0);
    let headers = lines
        .filter_map(|line| line.split_once(": "))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    ParsedResponse {
        status_line,
        status_code,
        headers,
        body: response[split + 4..].to_vec(),
    }
}
