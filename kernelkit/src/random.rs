//! Host-side random data for feeding kernels.

use kernelkit_backend::{ElementType, HostData};
use rand::Rng;

/// `count` floats uniform in `[0, 1)`.
pub fn random_f32(count: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..count).map(|_| rng.gen::<f32>()).collect()
}

/// `count` random values of `dtype`: floats in `[0, 1)`, integers over their full range.
pub fn random_host(count: usize, dtype: ElementType) -> HostData {
    let mut rng = rand::thread_rng();
    match dtype {
        ElementType::F32 => HostData::Float((0..count).map(|_| rng.gen::<f32>()).collect()),
        ElementType::I32 => HostData::Int((0..count).map(|_| rng.gen::<i32>()).collect()),
        ElementType::U32 => HostData::UInt((0..count).map(|_| rng.gen::<u32>()).collect()),
    }
}
