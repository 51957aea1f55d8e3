use ndarray::ArrayView3;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Voxel at integer coordinates, `nullval` outside. `data` is indexed
    /// `(z, y, x)`.
    #[inline]
    pub(crate) fn voxel_or(data: &ArrayView3<u8>, x: i64, y: i64, z: i64, nullval: u8) -> u8 {
        if x < 0 || y < 0 || z < 0 {
            return nullval;
        }
        data.get((z as usize, y as usize, x as usize))
            .copied()
            .unwrap_or(nullval)
    }

    #[inline]
    pub(crate) fn trilinear_interpolate(
        data: &ArrayView3<u8>,
        x: f32,
        y: f32,
        z: f32,
        nullval: u8,
    ) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let z0 = z.floor();

        let dx = x - x0;
        let dy = y - y0;
        let dz = z - z0;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;
        let one_minus_dz = 1.0 - dz;

        let (x0, y0, z0) = (x0 as i64, y0 as i64, z0 as i64);
        let (x1, y1, z1) = (x0.saturating_add(1), y0.saturating_add(1), z0.saturating_add(1));
        let v = |ix: i64, iy: i64, iz: i64| Self::voxel_or(data, ix, iy, iz, nullval) as f32;

        let v000 = v(x0, y0, z0);
        let v100 = v(x1, y0, z0);
        let v010 = v(x0, y1, z0);
        let v110 = v(x1, y1, z0);
        let v001 = v(x0, y0, z1);
        let v101 = v(x1, y0, z1);
        let v011 = v(x0, y1, z1);
        let v111 = v(x1, y1, z1);

        let v00 = v000.mul_add(one_minus_dx, v100 * dx);
        let v10 = v010.mul_add(one_minus_dx, v110 * dx);
        let v01 = v001.mul_add(one_minus_dx, v101 * dx);
        let v11 = v011.mul_add(one_minus_dx, v111 * dx);

        let v0 = v00.mul_add(one_minus_dy, v10 * dy);
        let v1 = v01.mul_add(one_minus_dy, v11 * dy);

        v0.mul_add(one_minus_dz, v1 * dz)
    }
}
