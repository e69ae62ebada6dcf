use std::collections::HashMap;
use std::time::Duration;

/// 性能分析器 - 按名称累计已测量的耗时
///
/// 调用者自己计时，再通过 [`Profiler::record`] 交给分析器累计。
#[derive(Default)]
pub struct Profiler {
    scopes: HashMap<String, ScopeStats>,
}

/// 作用域统计信息
#[derive(Debug, Clone)]
pub struct ScopeStats {
    pub name: String,
    pub total_time: Duration,
    pub call_count: u64,
    pub min_time: Duration,
    pub max_time: Duration,
}

impl ScopeStats {
    fn new(name: String) -> Self {
        Self {
            name,
            total_time: Duration::ZERO,
            call_count: 0,
            min_time: Duration::MAX,
            max_time: Duration::ZERO,
        }
    }

    fn record(&mut self, duration: Duration) {
        self.total_time += duration;
        self.call_count += 1;
        self.min_time = self.min_time.min(duration);
        self.max_time = self.max_time.max(duration);
    }

    pub fn average_time(&self) -> Duration {
        if self.call_count > 0 {
            self.total_time / self.call_count as u32
        } else {
            Duration::ZERO
        }
    }
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次已测量的耗时
    pub fn record(&mut self, name: impl Into<String>, duration: Duration) {
        let name = name.into();
        self.scopes
            .entry(name.clone())
            .or_insert_with(|| ScopeStats::new(name))
            .record(duration);
    }

    /// 获取作用域统计信息
    pub fn get_stats(&self, name: &str) -> Option<&ScopeStats> {
        self.scopes.get(name)
    }

    /// 获取所有统计信息，按总耗时降序
    pub fn all_stats(&self) -> Vec<&ScopeStats> {
        let mut stats: Vec<_> = self.scopes.values().collect();
        stats.sort_by(|a, b| b.total_time.cmp(&a.total_time));
        stats
    }

    /// 通过 tracing 输出性能报告
    pub fn log_report(&self) {
        for stat in self.all_stats() {
            tracing::info!(
                target: "profiling",
                "{}: {} calls, total: {:?}, avg: {:?}, min: {:?}, max: {:?}",
                stat.name,
                stat.call_count,
                stat.total_time,
                stat.average_time(),
                stat.min_time,
                stat.max_time
            );
        }
    }
}
