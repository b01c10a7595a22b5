// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 静态文件服务器入口
//!
//! 启动顺序：
//! 1. 解析命令行参数；
//! 2. 初始化 log4rs，配置文件缺失时退回到只输出到终端的默认配置；
//! 3. 合并配置文件与命令行参数得到最终配置；
//! 4. 按配置的工作线程数构建 Tokio 运行时；
//! 5. 绑定监听套接字并运行，直到收到 Ctrl-C。

use std::{path::Path, process};

use clap::Parser;
use log::{error, info, warn, LevelFilter};
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Config as LogConfig, Root},
    encode::pattern::PatternEncoder,
};
use tokio::runtime::Builder;

use simple_http::{cli::Args, Config, Exception, Server};

fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_config) {
        eprintln!("{}", e);
        process::exit(1);
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("配置无效：{}", e);
            process::exit(1);
        }
    };

    let worker_threads = config.worker_threads();
    let runtime = match Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建运行时：{}", e);
            process::exit(1);
        }
    };
    info!("运行时已创建，工作线程数：{}", worker_threads);

    let result = runtime.block_on(async move {
        let server = Server::bind(config).await?;
        server.run().await;
        Ok::<(), Exception>(())
    });
    if let Err(e) = result {
        error!("服务器启动失败：{}", e);
        process::exit(1);
    }
}

fn init_logging(path: &Path) -> Result<(), Exception> {
    match log4rs::init_file(path, Default::default()) {
        Ok(()) => Ok(()),
        Err(file_error) => {
            let stdout = ConsoleAppender::builder()
                .encoder(Box::new(PatternEncoder::new(
                    "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}",
                )))
                .build();
            let config = LogConfig::builder()
                .appender(Appender::builder().build("stdout", Box::new(stdout)))
                .build(Root::builder().appender("stdout").build(LevelFilter::Info))
                .map_err(|_| Exception::LoggerInitFailed)?;
            log4rs::init_config(config).map_err(|_| Exception::LoggerInitFailed)?;
            warn!(
                "无法读取日志配置{}：{}，使用默认的终端输出",
                path.display(),
                file_error
            );
            Ok(())
        }
    }
}
