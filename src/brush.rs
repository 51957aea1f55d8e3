//! Brush shapes for label edits, as offsets around an anchor cell in label
//! space.

/// Ball radius in volume voxels; divided by the id factor for label space.
pub const DEFAULT_BALL_RADIUS: f32 = 9.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Brush {
    /// The anchor cell only
    Point,
    /// Every cell strictly closer than `radius` (label-space units)
    Ball { radius: f32 },
    /// The `(2*half+1)^3` block around the anchor
    Cube { half: i32 },
}

impl Brush {
    /// Ball covering `radius_voxels` of the volume at the given id factor.
    pub fn ball(radius_voxels: f32, idfactor: u32) -> Self {
        Brush::Ball {
            radius: radius_voxels / idfactor.max(1) as f32,
        }
    }

    /// 3x3x3 block used while dragging the eraser
    pub fn erase_drag() -> Self {
        Brush::Cube { half: 1 }
    }

    pub fn offsets(&self) -> Vec<[i64; 3]> {
        match *self {
            Brush::Point => vec![[0, 0, 0]],
            Brush::Ball { radius } => {
                let limit = radius.max(0.0).ceil() as i64;
                let r2 = (radius as f64) * (radius as f64);
                let mut out = Vec::new();
                for dz in -limit..=limit {
                    for dy in -limit..=limit {
                        for dx in -limit..=limit {
                            if ((dx * dx + dy * dy + dz * dz) as f64) < r2 {
                                out.push([dx, dy, dz]);
                            }
                        }
                    }
                }
                out
            }
            Brush::Cube { half } => {
                let half = half.max(0) as i64;
                let mut out = Vec::new();
                for dz in -half..=half {
                    for dy in -half..=half {
                        for dx in -half..=half {
                            out.push([dx, dy, dz]);
                        }
                    }
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_and_cube_sizes() {
        assert_eq!(Brush::Point.offsets(), vec![[0, 0, 0]]);
        let cube = Brush::erase_drag().offsets();
        assert_eq!(cube.len(), 27);
        assert!(cube.iter().all(|o| o.iter().all(|c| c.abs() <= 1)));
    }

    #[test]
    fn test_ball_is_strictly_inside_radius() {
        let ball = Brush::ball(9.0, 1).offsets();
        assert!(ball.iter().all(|[x, y, z]| x * x + y * y + z * z < 81));
        assert!(!ball.contains(&[9, 0, 0]));
        assert!(ball.contains(&[8, 0, 0]));
        assert!(ball.contains(&[5, 5, 5]));
        assert!(!ball.contains(&[5, 5, 6]));
    }

    #[test]
    fn test_ball_scales_with_idfactor() {
        // radius 3 cells: offsets with squared length < 9
        let ball = Brush::ball(9.0, 3).offsets();
        assert!(ball.contains(&[2, 2, 0]));
        assert!(!ball.contains(&[3, 0, 0]));
        assert!(!ball.contains(&[2, 2, 1]));
    }
}
