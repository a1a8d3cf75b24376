//! NIfTI-1 export and import of simulated volumes
//!
//! Volumes are written as single-file NIfTI-1 (`n+1`) with float32 samples
//! and an sform that maps voxel (nx/2, ny/2, nz/2) to the scanner origin,
//! matching the physical coordinates used by the rasterizer. Reading goes
//! through the `nifti` crate and accepts gzip-compressed input.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::Array;
use nifti::volume::ndarray::IntoNdArray;
use nifti::{InMemNiftiObject, NiftiHeader, NiftiObject};
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::debug;

use crate::error::{QsmError, QsmResult};
use crate::volume::{Dims, Volume, VoxelSize};

const HEADER_SIZE: usize = 348;
/// Header plus the 4-byte empty extension block
const VOX_OFFSET: usize = 352;
const DT_FLOAT32: i16 = 16;

/// Volume read back from a NIfTI file
#[derive(Debug, Clone)]
pub struct NiftiVolume {
    pub volume: Volume,
    pub voxel_size: VoxelSize,
    /// 4x4 voxel-to-world matrix, row-major
    pub affine: [f64; 16],
}

fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

/// Diagonal affine with the grid centre at the origin
#[rustfmt::skip]
pub fn centered_affine(dims: Dims, voxel_size: VoxelSize) -> [f64; 16] {
    let (cx, cy, cz) = dims.center();
    let VoxelSize { x, y, z } = voxel_size;
    [
        x, 0.0, 0.0, -(cx as f64) * x,
        0.0, y, 0.0, -(cy as f64) * y,
        0.0, 0.0, z, -(cz as f64) * z,
        0.0, 0.0, 0.0, 1.0,
    ]
}

#[rustfmt::skip]
fn affine_from_header(header: &NiftiHeader) -> [f64; 16] {
    if header.sform_code > 0 {
        let (s, t, u) = (&header.srow_x, &header.srow_y, &header.srow_z);
        [
            s[0] as f64, s[1] as f64, s[2] as f64, s[3] as f64,
            t[0] as f64, t[1] as f64, t[2] as f64, t[3] as f64,
            u[0] as f64, u[1] as f64, u[2] as f64, u[3] as f64,
            0.0, 0.0, 0.0, 1.0,
        ]
    } else {
        let p = &header.pixdim;
        [
            p[1] as f64, 0.0, 0.0, 0.0,
            0.0, p[2] as f64, 0.0, 0.0,
            0.0, 0.0, p[3] as f64, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ]
    }
}

fn put_i16(header: &mut [u8], offset: usize, v: i16) {
    header[offset..offset + 2].copy_from_slice(&v.to_le_bytes());
}

fn put_f32(header: &mut [u8], offset: usize, v: f32) {
    header[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
}

fn encode_header(dims: Dims, voxel_size: VoxelSize) -> QsmResult<[u8; HEADER_SIZE]> {
    let mut dim = [3i16, 1, 1, 1, 1, 1, 1, 1];
    for (slot, n) in dim[1..4].iter_mut().zip(dims.as_array()) {
        *slot = i16::try_from(n)
            .map_err(|_| QsmError::Nifti(format!("axis length {n} exceeds the NIfTI-1 limit")))?;
    }

    let mut header = [0u8; HEADER_SIZE];
    header[0..4].copy_from_slice(&(HEADER_SIZE as i32).to_le_bytes());
    for (i, &d) in dim.iter().enumerate() {
        put_i16(&mut header, 40 + i * 2, d);
    }
    put_i16(&mut header, 70, DT_FLOAT32);
    put_i16(&mut header, 72, 32);

    let [vx, vy, vz] = voxel_size.as_array();
    let pixdim = [1.0, vx, vy, vz, 1.0, 1.0, 1.0, 1.0];
    for (i, &p) in pixdim.iter().enumerate() {
        put_f32(&mut header, 76 + i * 4, p as f32);
    }
    put_f32(&mut header, 108, VOX_OFFSET as f32);
    put_f32(&mut header, 112, 1.0); // scl_slope

    // xyzt_units: mm
    header[123] = 2;
    // sform_code: scanner anatomical
    put_i16(&mut header, 254, 1);
    let affine = centered_affine(dims, voxel_size);
    for row in 0..3 {
        for col in 0..4 {
            put_f32(&mut header, 280 + row * 16 + col * 4, affine[row * 4 + col] as f32);
        }
    }
    header[344..348].copy_from_slice(b"n+1\0");
    Ok(header)
}

/// Encode a volume as uncompressed NIfTI-1 bytes
pub fn save_volume(volume: &Volume, voxel_size: VoxelSize) -> QsmResult<Vec<u8>> {
    let header = encode_header(volume.dims(), voxel_size)?;

    let mut buffer = Vec::with_capacity(VOX_OFFSET + volume.len() * 4);
    buffer.extend_from_slice(&header);
    buffer.extend_from_slice(&[0u8; VOX_OFFSET - HEADER_SIZE]);
    for &v in volume.data() {
        buffer.extend_from_slice(&(v as f32).to_le_bytes());
    }
    Ok(buffer)
}

/// Encode a volume as gzip-compressed NIfTI-1 bytes (.nii.gz)
pub fn save_volume_gz(volume: &Volume, voxel_size: VoxelSize) -> QsmResult<Vec<u8>> {
    let raw = save_volume(volume, voxel_size)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw)?;
    Ok(encoder.finish()?)
}

/// Write a volume to disk, gzip-compressed when the path ends in `.nii.gz`
pub fn save_volume_to_file<P: AsRef<Path>>(
    path: P,
    volume: &Volume,
    voxel_size: VoxelSize,
) -> QsmResult<()> {
    let path = path.as_ref();
    let bytes = if path.to_string_lossy().ends_with(".nii.gz") {
        save_volume_gz(volume, voxel_size)?
    } else {
        save_volume(volume, voxel_size)?
    };
    std::fs::write(path, &bytes)?;
    debug!(path = %path.display(), bytes = bytes.len(), "wrote NIfTI volume");
    Ok(())
}

/// Decode a 3D NIfTI volume from bytes (.nii or .nii.gz, auto-detected)
///
/// Inputs with more than three axes yield their first 3D volume.
pub fn load_volume(bytes: &[u8]) -> QsmResult<NiftiVolume> {
    let obj = if is_gzip(bytes) {
        InMemNiftiObject::from_reader(GzDecoder::new(Cursor::new(bytes)))
            .map_err(|e| QsmError::Nifti(format!("failed to read gzipped NIfTI: {e}")))?
    } else {
        InMemNiftiObject::from_reader(Cursor::new(bytes))
            .map_err(|e| QsmError::Nifti(format!("failed to read NIfTI: {e}")))?
    };

    let header = obj.header();
    if header.dim[0] < 3 {
        return Err(QsmError::Nifti(format!("expected a 3D volume, got {}D", header.dim[0])));
    }
    let voxel_size = VoxelSize::new(
        header.pixdim[1] as f64,
        header.pixdim[2] as f64,
        header.pixdim[3] as f64,
    );
    let affine = affine_from_header(header);

    let array: Array<f64, _> = obj
        .into_volume()
        .into_ndarray()
        .map_err(|e| QsmError::Nifti(format!("failed to convert to ndarray: {e}")))?;

    let shape = array.shape().to_vec();
    if shape.len() < 3 {
        return Err(QsmError::Nifti(format!("expected a 3D array, got {}D", shape.len())));
    }
    let dims = Dims::new(shape[0], shape[1], shape[2]);

    // x fastest; every axis past z is pinned to 0
    let mut index = vec![0usize; shape.len()];
    let mut data = Vec::with_capacity(dims.len());
    for k in 0..dims.nz {
        for j in 0..dims.ny {
            for i in 0..dims.nx {
                index[..3].copy_from_slice(&[i, j, k]);
                data.push(array[&index[..]]);
            }
        }
    }

    Ok(NiftiVolume { volume: Volume::from_vec(dims, data)?, voxel_size, affine })
}

pub fn read_volume_file<P: AsRef<Path>>(path: P) -> QsmResult<NiftiVolume> {
    let bytes = std::fs::read(path)?;
    load_volume(&bytes)
}
