//! 回调故障记录
//!
//! 用户回调中的 panic 在管线边界被捕获后写入 [`FaultLog`]，
//! 而不是中断整帧。

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::VecDeque;

/// 单条故障记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultRecord {
    /// 故障来源（例如 `"particle_event#3"`）
    pub source: String,
    /// panic 消息
    pub message: String,
    /// 发生故障时的更新次数：系统内为系统 tick，管理器内为帧数
    pub tick: u64,
}

impl FaultRecord {
    pub fn new(source: impl Into<String>, message: impl Into<String>, tick: u64) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            tick,
        }
    }
}

/// 有界故障日志
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultLog {
    recent: VecDeque<FaultRecord>,
    max_recent: usize,
    total_count: u64,
}

impl Default for FaultLog {
    fn default() -> Self {
        Self::with_capacity(64)
    }
}

impl FaultLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建最多保留 `max_recent` 条记录的日志
    pub fn with_capacity(max_recent: usize) -> Self {
        Self {
            recent: VecDeque::with_capacity(max_recent.min(64)),
            max_recent,
            total_count: 0,
        }
    }

    /// 记录一次故障
    pub fn record(&mut self, record: FaultRecord) {
        self.total_count += 1;
        if self.max_recent == 0 {
            return;
        }
        if self.recent.len() == self.max_recent {
            self.recent.pop_front();
        }
        self.recent.push_back(record);
    }

    /// 自创建以来的故障总数
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// 最近的故障记录（最旧的在前）
    pub fn recent(&self) -> impl Iterator<Item = &FaultRecord> {
        self.recent.iter()
    }

    pub fn last(&self) -> Option<&FaultRecord> {
        self.recent.back()
    }

    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }

    pub fn clear(&mut self) {
        self.recent.clear();
        self.total_count = 0;
    }
}

/// 从 panic 负载中提取可读消息
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
