//! 核心模块
//!
//! - `error` - 错误类型定义
//! - `fault` - 回调故障记录
//! - `logging` - tracing 日志初始化
//! - `macros` - 样板代码宏

pub mod error;
pub mod fault;
pub mod logging;
#[macro_use]
pub mod macros;

pub use error::{ParticleError, ParticleResult};
pub use fault::{panic_message, FaultLog, FaultRecord};
pub use logging::init_logging;
