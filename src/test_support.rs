//! 测试用的原始 TCP 服务器: 可以延迟响应头, 慢速或无限地发送数据, 中途卡住,
//! 并统计同时在处理的连接数. wiremock 只能返回一次性写完的响应体.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// 同时在处理的连接数及其峰值
#[derive(Debug, Default)]
pub struct Gauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// 每个连接的响应方式
#[derive(Debug, Clone)]
pub struct Reply {
    pub header_delay: Duration,
    pub content_type: &'static str,
    pub chunk: Vec<u8>,
    pub chunks: usize,
    pub interval: Duration,
    /// 发完数据后保持连接不关闭的时长
    pub stall: Duration,
}

impl Reply {
    /// 每 `interval` 发送 1 KiB, 直到客户端断开
    pub fn endless(interval: Duration) -> Self {
        Self {
            header_delay: Duration::ZERO,
            content_type: "video/mp2t",
            chunk: vec![0u8; 1024],
            chunks: usize::MAX,
            interval,
            stall: Duration::ZERO,
        }
    }

    pub fn json(body: &str, header_delay: Duration) -> Self {
        Self {
            header_delay,
            content_type: "application/json",
            chunk: body.as_bytes().to_vec(),
            chunks: 1,
            interval: Duration::ZERO,
            stall: Duration::ZERO,
        }
    }
}

/// 启动服务器, 返回 `http://127.0.0.1:<port>`
pub async fn serve(reply: Reply, gauge: Arc<Gauge>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let reply = reply.clone();
            let gauge = gauge.clone();
            tokio::spawn(async move {
                gauge.enter();
                let _ = respond(socket, &reply).await;
                gauge.exit();
            });
        }
    });

    format!("http://{}", addr)
}

async fn respond(mut socket: TcpStream, reply: &Reply) -> std::io::Result<()> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        head.extend_from_slice(&buf[..n]);
    }

    tokio::time::sleep(reply.header_delay).await;
    let headers = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nConnection: close\r\n\r\n",
        reply.content_type
    );
    socket.write_all(headers.as_bytes()).await?;

    for _ in 0..reply.chunks {
        socket.write_all(&reply.chunk).await?;
        socket.flush().await?;
        if !reply.interval.is_zero() {
            tokio::time::sleep(reply.interval).await;
        }
    }

    tokio::time::sleep(reply.stall).await;
    socket.shutdown().await
}
