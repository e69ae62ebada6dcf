//! 粒子随机数辅助
//!
//! 每个粒子系统持有自己的 [`ParticleRng`]，可用固定种子得到可复现的效果。

use glam::{Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 粒子效果用随机数生成器
#[derive(Debug, Clone)]
pub struct ParticleRng {
    rng: StdRng,
}

impl Default for ParticleRng {
    fn default() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl ParticleRng {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用固定种子创建
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// `[0, 1)` 内的随机数
    pub fn next_f32(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }

    /// `[min, max)` 内的随机数；边界颠倒时自动交换，相等时返回 `min`
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        if hi - lo <= f32::EPSILON {
            return lo;
        }
        self.rng.gen_range(lo..hi)
    }

    /// 以概率 `probability` 返回 `true`
    pub fn chance(&mut self, probability: f32) -> bool {
        self.next_f32() < probability
    }

    /// 两个向量分量之间的随机向量
    pub fn vec3_between(&mut self, a: Vec3, b: Vec3) -> Vec3 {
        Vec3::new(
            self.range(a.x, b.x),
            self.range(a.y, b.y),
            self.range(a.z, b.z),
        )
    }

    /// 球面上均匀分布的单位向量
    pub fn unit_vector3(&mut self) -> Vec3 {
        let z = self.range(-1.0, 1.0);
        let theta = self.range(0.0, std::f32::consts::TAU);
        let r = (1.0 - z * z).max(0.0).sqrt();
        Vec3::new(r * theta.cos(), r * theta.sin(), z)
    }

    /// 两种颜色分量之间的随机颜色
    pub fn color_between(&mut self, a: Vec4, b: Vec4) -> Vec4 {
        Vec4::new(
            self.range(a.x, b.x),
            self.range(a.y, b.y),
            self.range(a.z, b.z),
            self.range(a.w, b.w),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let mut a = ParticleRng::from_seed(7);
        let mut b = ParticleRng::from_seed(7);
        for _ in 0..16 {
            assert_eq!(a.range(-5.0, 5.0), b.range(-5.0, 5.0));
        }
    }

    #[test]
    fn test_range_bounds() {
        let mut rng = ParticleRng::from_seed(1);
        for _ in 0..1000 {
            let v = rng.range(2.0, 3.0);
            assert!((2.0..3.0).contains(&v));
            let swapped = rng.range(3.0, 2.0);
            assert!((2.0..3.0).contains(&swapped));
        }
        assert_eq!(rng.range(4.0, 4.0), 4.0);
    }

    #[test]
    fn test_unit_vector_length() {
        let mut rng = ParticleRng::from_seed(3);
        for _ in 0..100 {
            let v = rng.unit_vector3();
            assert!((v.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_vec3_between() {
        let mut rng = ParticleRng::from_seed(9);
        let v = rng.vec3_between(Vec3::ZERO, Vec3::ONE);
        assert!(v.cmpge(Vec3::ZERO).all() && v.cmplt(Vec3::ONE).all());
    }
}
