//! Rasterize sources onto the voxel grid
//!
//! Voxel (i, j, k) sits at the physical position
//! ((i - nx/2)·vsx, (j - ny/2)·vsy, (k - nz/2)·vsz) mm, so the grid centre is
//! the origin and a source at [0, 0, 0] is centred on the zero-frequency voxel.
//! Overlapping sources add; nothing is clamped.

use tracing::{debug, warn};

use super::source::SusceptibilitySource;
use crate::error::QsmResult;
use crate::volume::{Dims, Volume, VoxelSize};

/// Physical coordinate (mm) of a voxel index along one axis
#[inline]
pub fn voxel_position(index: usize, n: usize, spacing: f64) -> f64 {
    (index as f64 - (n / 2) as f64) * spacing
}

/// Inclusive index range covering [center - reach, center + reach] mm
fn index_range(center_mm: f64, reach_mm: f64, n: usize, spacing: f64) -> Option<(usize, usize)> {
    let c = center_mm / spacing + (n / 2) as f64;
    let r = reach_mm / spacing;
    let lo = (c - r).floor().max(0.0);
    let hi = (c + r).ceil().min(n as f64 - 1.0);
    if hi < lo {
        return None;
    }
    Some((lo as usize, hi as usize))
}

/// Accumulate one source into `volume`; returns the number of voxels touched
pub fn rasterize_source(
    volume: &mut Volume,
    source: &SusceptibilitySource,
    voxel_size: VoxelSize,
) -> usize {
    if source.is_degenerate() {
        warn!(?source, "skipping degenerate susceptibility source");
        return 0;
    }

    let dims = volume.dims();
    let Dims { nx, ny, nz } = dims;
    let reach = source.bounding_radius();
    let [px, py, pz] = source.position;

    let (Some((i0, i1)), Some((j0, j1)), Some((k0, k1))) = (
        index_range(px, reach, nx, voxel_size.x),
        index_range(py, reach, ny, voxel_size.y),
        index_range(pz, reach, nz, voxel_size.z),
    ) else {
        return 0;
    };

    let data = volume.data_mut();
    let mut touched = 0;
    for k in k0..=k1 {
        let dz = voxel_position(k, nz, voxel_size.z) - pz;
        for j in j0..=j1 {
            let dy = voxel_position(j, ny, voxel_size.y) - py;
            for i in i0..=i1 {
                let dx = voxel_position(i, nx, voxel_size.x) - px;
                if source.contains([dx, dy, dz]) {
                    data[dims.index(i, j, k)] += source.susceptibility;
                    touched += 1;
                }
            }
        }
    }
    touched
}

/// Build the susceptibility volume from an ordered source list
pub fn rasterize(
    sources: &[SusceptibilitySource],
    dims: Dims,
    voxel_size: VoxelSize,
) -> QsmResult<Volume> {
    voxel_size.validate()?;

    let mut volume = Volume::zeros(dims);
    for (n, source) in sources.iter().enumerate() {
        let touched = rasterize_source(&mut volume, source, voxel_size);
        debug!(source = n, voxels = touched, "rasterized source");
    }
    Ok(volume)
}
