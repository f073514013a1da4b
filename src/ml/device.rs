// ============================================================
// Layer 5 — Backend Selection
// ============================================================
// Every model type is generic over burn's Backend trait; this
// is the one place that names concrete backends. Training wraps
// the chosen backend in Autodiff, evaluation and prediction use
// it directly.
//
//   ndarray → CPU, always available
//   wgpu    → GPU through WebGPU (Vulkan / Metal / DX12)

use std::{fmt, str::FromStr};

use anyhow::bail;
use serde::{Deserialize, Serialize};

pub type CpuBackend = burn::backend::NdArray;
pub type GpuBackend = burn::backend::Wgpu;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    NdArray,
    Wgpu,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ndarray" | "cpu" => Ok(Self::NdArray),
            "wgpu" | "gpu"    => Ok(Self::Wgpu),
            other => bail!("unknown backend '{other}' (expected 'ndarray' or 'wgpu')"),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NdArray => write!(f, "ndarray"),
            Self::Wgpu    => write!(f, "wgpu"),
        }
    }
}
