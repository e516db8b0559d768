//! The tensor backend compiled into the `segeval` binary.
//!
//! Chosen from the `cuda`, `wgpu` and `ndarray` features, first enabled wins.

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "cuda")] {
        /// Device of the compiled-in backend.
        pub type Device = burn::backend::cuda::CudaDevice;
        /// Human-readable backend name.
        pub const BACKEND_NAME: &str = "CUDA (NVIDIA GPU)";
    } else if #[cfg(feature = "wgpu")] {
        /// Device of the compiled-in backend.
        pub type Device = burn::backend::wgpu::WgpuDevice;
        /// Human-readable backend name.
        pub const BACKEND_NAME: &str = "WGPU (GPU)";
    } else {
        /// Device of the compiled-in backend.
        pub type Device = burn::backend::ndarray::NdArrayDevice;
        /// Human-readable backend name.
        pub const BACKEND_NAME: &str = "NdArray (CPU)";
    }
}
