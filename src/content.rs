// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 内容类型解析
//!
//! 按以下顺序把文件路径映射为 MIME 类型：
//! 1. 路径不存在、不是普通文件或无法读取：`NotFound` / `InternalFailure`；
//! 2. 扩展名命中覆盖表（`.css`、`.js`、`.json`、`.xml`、`.md`）：直接返回；
//! 3. 否则读取文件的第一个缓冲单元，交给签名库做内容探测。
//!
//! 签名库在服务器启动前加载一次，之后只读共享，停机时随最后一个引用一起释放。

use std::{
    fs::{self, File},
    io::{self, Read},
    path::Path,
};

use log::{debug, error, info};

use crate::{
    exception::Exception,
    param::{BUFFER_SIZE, EXTENSION_TYPES},
};

/// 路由逻辑依赖的内容类型查询接口
#[cfg_attr(test, mockall::automock)]
pub trait ContentResolver {
    fn resolve(&self, path: &Path) -> Result<String, Exception>;
}

/// 基于魔数签名库与文本启发式的内容类型解析器
pub struct ContentTypeResolver {
    signatures: infer::Infer,
}

impl ContentTypeResolver {
    /// 加载签名库。整个进程只应在启动时调用一次。
    pub fn init() -> Self {
        info!("内容类型签名库已加载");
        Self {
            signatures: infer::Infer::new(),
        }
    }

    /// 根据文件开头的字节推断 MIME 类型
    pub fn sniff(&self, head: &[u8]) -> &'static str {
        if head.is_empty() {
            return "inode/x-empty";
        }
        if let Some(kind) = self.signatures.get(head) {
            return kind.mime_type();
        }
        if !looks_like_text(head) {
            "application/octet-stream"
        } else if looks_like_html(head) {
            "text/html"
        } else {
            "text/plain"
        }
    }
}

impl ContentResolver for ContentTypeResolver {
    fn resolve(&self, path: &Path) -> Result<String, Exception> {
        let metadata = fs::metadata(path).map_err(|e| lookup_error(path, e))?;
        if !metadata.is_file() {
            debug!("{}不是普通文件", path.display());
            return Err(Exception::NotFound);
        }

        let extension = path.extension().and_then(|e| e.to_str());
        if let Some(mime) = extension.and_then(|e| EXTENSION_TYPES.get(e)) {
            return Ok(mime.to_string());
        }

        let file = File::open(path).map_err(|e| lookup_error(path, e))?;
        let mut head = Vec::with_capacity(BUFFER_SIZE);
        if let Err(e) = file.take(BUFFER_SIZE as u64).read_to_end(&mut head) {
            error!("读取文件{}失败：{}", path.display(), e);
            return Err(Exception::InternalFailure);
        }
        Ok(self.sniff(&head).to_string())
    }
}

impl Drop for ContentTypeResolver {
    fn drop(&mut self) {
        info!("内容类型签名库已释放");
    }
}

fn lookup_error(path: &Path, e: io::Error) -> Exception {
    match e.kind() {
        io::ErrorKind::NotFound => Exception::NotFound,
        _ => {
            error!("无法访问{}：{}", path.display(), e);
            Exception::InternalFailure
        }
    }
}

/// 合法的 UTF-8（允许末尾被截断的多字节字符），且不含常见空白以外的控制字符。
fn looks_like_text(head: &[u8]) -> bool {
    let utf8 = match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    };
    utf8 && head.iter().all(|&b| match b {
        b'\t' | b'\n' | b'\r' | 0x0c | 0x1b => true,
        0x7f => false,
        b => b >= 0x20,
    })
}

fn looks_like_html(head: &[u8]) -> bool {
    let start = head
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(head.len());
    let prefix: Vec<u8> = head[start..]
        .iter()
        .take(14)
        .map(|b| b.to_ascii_lowercase())
        .collect();
    [&b"<!doctype html"[..], b"<html", b"<head", b"<body"]
        .iter()
        .any(|tag| prefix.starts_with(tag))
}
