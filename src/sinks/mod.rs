//! 内置展示层接收端

pub mod desktop;
pub mod log;

pub use desktop::DesktopSink;
pub use log::LogSink;
