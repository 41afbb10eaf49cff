//! Compute kernels shared by the operators.

pub mod gemm;
pub mod qgemm;
pub mod scratch;

pub use gemm::gemm_f32_nt;
pub use qgemm::{qgemm_u8, ActivationQuant, PackedWeight, WeightQuant};
pub use scratch::ScratchBuffer;
