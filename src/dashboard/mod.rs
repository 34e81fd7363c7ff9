//! 即時看板：定時重新抓取進度、比對基準並渲染頁面

pub mod launch;
pub mod render;
pub mod routes;
pub mod state;

pub use launch::{bind_first_free, lan_ip, open_browser, serve};
pub use routes::router;
pub use state::{DashboardSnapshot, DashboardState};
