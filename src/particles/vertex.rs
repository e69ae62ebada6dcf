//! 顶点投影
//!
//! 渲染后端不属于本库。这里只提供可直接上传到 GPU 的 `#[repr(C)]` 顶点类型
//! 和把 [`DefaultParticle`] 投影成顶点的标准函数，用作
//! [`crate::particles::ParticleSystem`] 的顶点更新器。

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use super::particle::DefaultParticle;

/// 相机矩阵，由管理器分发给所有粒子系统
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraMatrices {
    pub world: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
}

impl Default for CameraMatrices {
    fn default() -> Self {
        Self {
            world: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
        }
    }
}

impl CameraMatrices {
    pub fn new(world: Mat4, view: Mat4, projection: Mat4) -> Self {
        let camera_position = view.inverse().w_axis.truncate();
        Self {
            world,
            view,
            projection,
            camera_position,
        }
    }

    pub fn world_view_projection(&self) -> Mat4 {
        self.projection * self.view * self.world
    }

    /// 相机在世界空间中的右方向
    pub fn camera_right(&self) -> Vec3 {
        self.view.inverse().x_axis.truncate().normalize_or_zero()
    }

    /// 相机在世界空间中的上方向
    pub fn camera_up(&self) -> Vec3 {
        self.view.inverse().y_axis.truncate().normalize_or_zero()
    }
}

/// 点精灵顶点
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointSpriteVertex {
    pub position: [f32; 3],
    pub size: f32,
    pub color: [f32; 4],
}

/// 四边形顶点
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

/// 每个粒子输出一个点精灵顶点
pub fn project_point_sprite(
    particle: &DefaultParticle,
    _camera: &CameraMatrices,
    out: &mut Vec<PointSpriteVertex>,
) {
    out.push(PointSpriteVertex {
        position: particle.position.to_array(),
        size: particle.width.max(particle.height),
        color: particle.color.to_array(),
    });
}

/// 每个粒子输出四个面向相机的四边形顶点
///
/// 顺序为左下、右下、右上、左上，绕视线方向旋转 `rotation` 弧度。
pub fn project_billboard_quad(
    particle: &DefaultParticle,
    camera: &CameraMatrices,
    out: &mut Vec<QuadVertex>,
) {
    let (sin, cos) = particle.rotation.sin_cos();
    let right = camera.camera_right();
    let up = camera.camera_up();
    let rotated_right = right * cos + up * sin;
    let rotated_up = up * cos - right * sin;

    let half_right = rotated_right * (particle.width * 0.5);
    let half_up = rotated_up * (particle.height * 0.5);
    let center = particle.position;
    let color = particle.color.to_array();

    let corners = [
        (center - half_right - half_up, [0.0, 1.0]),
        (center + half_right - half_up, [1.0, 1.0]),
        (center + half_right + half_up, [1.0, 0.0]),
        (center - half_right + half_up, [0.0, 0.0]),
    ];
    out.extend(corners.iter().map(|(position, uv)| QuadVertex {
        position: position.to_array(),
        uv: *uv,
        color,
    }));
}
