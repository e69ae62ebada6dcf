//! 帧率计数器
//!
//! 由调用方持有并每帧驱动，不依赖任何全局状态。

use serde::{Deserialize, Serialize};

/// 帧率统计快照
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameRateStats {
    /// 最近一个采样窗口的帧率
    pub current_fps: f32,
    /// 所有已完成采样窗口的平均帧率
    pub average_fps: f32,
    /// 最低采样帧率
    pub min_fps: f32,
    /// 最高采样帧率
    pub max_fps: f32,
    /// 已完成的采样窗口数
    pub samples: u64,
    /// 累计帧数
    pub total_frames: u64,
}

/// 帧率计数器
///
/// 每帧调用 [`FrameRateCounter::update`]，每累计满一个采样间隔（默认1秒）
/// 就计算一次帧率。
#[derive(Debug, Clone)]
pub struct FrameRateCounter {
    sample_interval: f32,
    frames_in_sample: u32,
    time_in_sample: f32,
    fps_sum: f64,
    stats: FrameRateStats,
}

impl Default for FrameRateCounter {
    fn default() -> Self {
        Self::with_sample_interval(1.0)
    }
}

impl FrameRateCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用自定义采样间隔（秒）创建计数器
    ///
    /// 非正数间隔会被替换为1秒。
    pub fn with_sample_interval(seconds: f32) -> Self {
        let sample_interval = if seconds > 0.0 && seconds.is_finite() {
            seconds
        } else {
            1.0
        };
        Self {
            sample_interval,
            frames_in_sample: 0,
            time_in_sample: 0.0,
            fps_sum: 0.0,
            stats: FrameRateStats::default(),
        }
    }

    /// 记录一帧；完成一个采样窗口时返回 `true`
    pub fn update(&mut self, elapsed_seconds: f32) -> bool {
        if !(elapsed_seconds >= 0.0) {
            return false;
        }

        self.frames_in_sample += 1;
        self.stats.total_frames += 1;
        self.time_in_sample += elapsed_seconds;

        // 浮点累加误差容忍
        if self.time_in_sample + 1e-4 < self.sample_interval {
            return false;
        }

        let fps = self.frames_in_sample as f32 / self.time_in_sample.max(f32::EPSILON);
        self.stats.current_fps = fps;
        self.stats.samples += 1;
        self.fps_sum += fps as f64;
        self.stats.average_fps = (self.fps_sum / self.stats.samples as f64) as f32;
        if self.stats.samples == 1 {
            self.stats.min_fps = fps;
            self.stats.max_fps = fps;
        } else {
            self.stats.min_fps = self.stats.min_fps.min(fps);
            self.stats.max_fps = self.stats.max_fps.max(fps);
        }

        self.frames_in_sample = 0;
        self.time_in_sample = 0.0;
        true
    }

    pub fn current_fps(&self) -> f32 {
        self.stats.current_fps
    }

    pub fn average_fps(&self) -> f32 {
        self.stats.average_fps
    }

    pub fn stats(&self) -> FrameRateStats {
        self.stats
    }

    /// 重置所有统计
    pub fn reset(&mut self) {
        *self = Self::with_sample_interval(self.sample_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sixty_frames_per_second() {
        let mut counter = FrameRateCounter::new();
        let mut completed = 0;
        for _ in 0..120 {
            if counter.update(1.0 / 60.0) {
                completed += 1;
            }
        }
        assert_eq!(completed, 2);
        assert!((counter.current_fps() - 60.0).abs() < 0.1);
        assert!((counter.average_fps() - 60.0).abs() < 0.1);
    }

    #[test]
    fn test_min_max_tracking() {
        let mut counter = FrameRateCounter::with_sample_interval(0.5);
        for _ in 0..15 {
            counter.update(1.0 / 30.0);
        }
        for _ in 0..30 {
            counter.update(1.0 / 60.0);
        }
        let stats = counter.stats();
        assert_eq!(stats.samples, 2);
        assert!((stats.min_fps - 30.0).abs() < 0.1);
        assert!((stats.max_fps - 60.0).abs() < 0.1);
    }

    #[test]
    fn test_negative_elapsed_is_ignored() {
        let mut counter = FrameRateCounter::new();
        assert!(!counter.update(-1.0));
        assert!(!counter.update(f32::NAN));
        assert_eq!(counter.stats().total_frames, 0);
    }

    #[test]
    fn test_reset() {
        let mut counter = FrameRateCounter::new();
        counter.update(1.0);
        counter.reset();
        assert_eq!(counter.stats(), FrameRateStats::default());
    }
}
