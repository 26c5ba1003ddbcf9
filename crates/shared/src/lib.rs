//! 共享库
//!
//! 包含规则引擎可执行程序使用的配置加载与日志初始化。

pub mod config;
pub mod observability;
