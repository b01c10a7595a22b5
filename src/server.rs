// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 监听循环
//!
//! 监听循环只在两处阻塞：接受新连接与回收已结束的工作任务。
//! 每个连接由一个独立的任务处理，任务之间只共享只读的配置与内容类型解析器。
//! 并发连接数除了操作系统的监听队列以外没有其他限制。

use std::{
    future::Future,
    io,
    net::{IpAddr, SocketAddr, SocketAddrV4},
    sync::Arc,
};

use log::{debug, error, info, warn};
use tokio::{
    net::{TcpListener, TcpSocket},
    task::JoinSet,
    time,
};

use crate::{
    config::Config,
    connection::{Connection, Outcome},
    content::ContentTypeResolver,
    exception::Exception,
    param::SHUTDOWN_GRACE,
};

pub struct Server {
    listener: TcpListener,
    config: Arc<Config>,
    resolver: Arc<ContentTypeResolver>,
}

impl Server {
    /// 创建监听套接字，监听队列长度取自 `max_connections`
    pub async fn bind(config: Config) -> Result<Self, Exception> {
        let address = SocketAddrV4::new(config.host(), config.port());
        let listener = match listen(address, config.max_connections()) {
            Ok(listener) => listener,
            Err(e) => {
                error!("无法绑定{}：{}", address, e);
                return Err(Exception::BindFailed(e.kind()));
            }
        };
        info!(
            "服务端在{}上监听Socket连接，监听队列长度{}",
            address,
            config.max_connections()
        );
        info!("www root: {}", config.document_root().display());

        Ok(Self {
            listener,
            config: Arc::new(config),
            resolver: Arc::new(ContentTypeResolver::init()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Exception> {
        Ok(self.listener.local_addr()?)
    }

    /// 一直运行到收到 Ctrl-C
    pub async fn run(self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("无法监听停机信号：{}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// 一直运行到 `shutdown` 完成，然后等待所有在途连接处理完毕
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut workers = JoinSet::new();
        let mut id: u128 = 0;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("接收到停机信号，停止接受新连接");
                    break;
                }
                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    reap(joined);
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("接受连接失败：{}", e);
                            continue;
                        }
                    };
                    if !self.is_allowed(&peer) {
                        warn!("[ID{}]拒绝来自{}的连接", id, peer);
                        drop(stream);
                        id += 1;
                        continue;
                    }
                    debug!("[ID{}]TCP连接已建立：{}", id, peer);

                    let config = Arc::clone(&self.config);
                    let resolver = Arc::clone(&self.resolver);
                    let conn_id = id;
                    workers.spawn(async move {
                        let outcome = Connection::new(stream, peer, conn_id)
                            .run(&config, resolver.as_ref())
                            .await;
                        (conn_id, outcome)
                    });
                    id += 1;
                }
            }
        }

        if !workers.is_empty() {
            info!("等待{}个连接处理完毕", workers.len());
        }
        let drained = time::timeout(SHUTDOWN_GRACE, async {
            while let Some(joined) = workers.join_next().await {
                reap(joined);
            }
        })
        .await;
        if drained.is_err() {
            warn!(
                "{}个连接在{}ms内未结束，强制关闭",
                workers.len(),
                SHUTDOWN_GRACE.as_millis()
            );
            workers.abort_all();
            while let Some(joined) = workers.join_next().await {
                reap(joined);
            }
        }
        info!("服务器已停止");
    }

    fn is_allowed(&self, peer: &SocketAddr) -> bool {
        match self.config.allow() {
            Some(allow) => peer.ip() == IpAddr::V4(allow),
            None => true,
        }
    }
}

fn listen(address: SocketAddrV4, backlog: u32) -> io::Result<TcpListener> {
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(address.into())?;
    socket.listen(backlog)
}

fn reap(joined: Result<(u128, Outcome), tokio::task::JoinError>) {
    match joined {
        Ok((id, outcome)) => debug!("[ID{}]工作任务已回收：{:?}", id, outcome),
        Err(e) if e.is_panic() => error!("工作任务崩溃：{}", e),
        Err(e) => warn!("工作任务被取消：{}", e),
    }
}
