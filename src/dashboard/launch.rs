use crate::dashboard::routes::router;
use crate::dashboard::state::DashboardState;
use crate::utils::error::{MonitorError, Result};
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tokio::net::TcpListener;

/// 從 `port` 起依序嘗試綁定，全部被占用時改用系統分配的埠
pub async fn bind_first_free(bind: &str, port: u16, span: u16) -> Result<TcpListener> {
    for offset in 0..span.max(1) {
        let Some(candidate) = port.checked_add(offset) else {
            break;
        };
        match TcpListener::bind((bind, candidate)).await {
            Ok(listener) => return Ok(listener),
            Err(e) => tracing::debug!("埠 {} 無法使用: {}", candidate, e),
        }
    }

    tracing::warn!("⚠️ {}..{} 都被占用，改用系統分配的埠", port, port.saturating_add(span));
    TcpListener::bind((bind, 0))
        .await
        .map_err(|e| MonitorError::ServerError {
            message: format!("cannot bind {}: {}", bind, e),
        })
}

/// 區網 IP；UDP connect 不會真的送出封包
pub fn lan_ip() -> IpAddr {
    let detect = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect("8.8.8.8:80")?;
        Ok(socket.local_addr()?.ip())
    };
    detect().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

pub fn open_browser(url: &str) -> Result<()> {
    let command = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", "", url]);
        c
    } else if cfg!(target_os = "macos") {
        let mut c = Command::new("open");
        c.arg(url);
        c
    } else {
        let mut c = Command::new("xdg-open");
        c.arg(url);
        c
    };
    spawn_detached(command)
}

/// 啟動子程序並在背景執行緒等待它結束，避免留下殭屍程序
fn spawn_detached(mut command: Command) -> Result<()> {
    let mut child = command.stdout(Stdio::null()).stderr(Stdio::null()).spawn()?;
    std::thread::spawn(move || {
        if let Err(e) = child.wait() {
            tracing::debug!("等待子程序結束失敗: {}", e);
        }
    });
    Ok(())
}

/// 提供看板服務直到 `shutdown` 完成
pub async fn serve<F>(listener: TcpListener, state: Arc<DashboardState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| MonitorError::ServerError {
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_skips_occupied_port() {
        let taken = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let listener = bind_first_free("127.0.0.1", port, 5).await.unwrap();

        assert_ne!(listener.local_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn test_bind_falls_back_to_ephemeral_port() {
        let taken = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let listener = bind_first_free("127.0.0.1", port, 1).await.unwrap();

        assert_ne!(listener.local_addr().unwrap().port(), port);
    }

    #[test]
    fn test_spawn_detached_reports_missing_program() {
        let command = Command::new("sorting-monitor-no-such-program");
        assert!(spawn_detached(command).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_spawn_detached_reaps_child() {
        let mut command = Command::new("sh");
        command.args(["-c", "exit 0"]);
        assert!(spawn_detached(command).is_ok());
    }

    #[test]
    fn test_lan_ip_never_fails() {
        let ip = lan_ip();
        assert!(!ip.is_unspecified());
    }
}
