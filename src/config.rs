//! Alignment and chunk size defaults derived from the host's SIMD support.
//!
//! The defaults are resolved once per process by querying the CPU at runtime,
//! and are handed to containers as an explicit [`SimdConfig`] value. Without
//! the `std` feature, detection falls back to the target features enabled at
//! compile time.

use crate::error::LayoutError;
use crate::layout::{Alignment, chunk_size};

/// Vector instruction set classes that determine default layouts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SimdArch {
    /// 512-bit vectors.
    Avx512,
    /// 256-bit vectors (AVX and AVX2).
    Avx,
    /// 128-bit vectors on x86.
    Sse,
    /// 128-bit vectors on ARM.
    Neon,
    /// Nothing recognized; layouts assume the widest vectors.
    Unknown,
}

impl SimdArch {
    /// The vector class supported by the running CPU.
    #[cfg(all(feature = "std", any(target_arch = "x86", target_arch = "x86_64")))]
    pub fn detect() -> Self {
        if std::is_x86_feature_detected!("avx512f") { SimdArch::Avx512 }
        else if std::is_x86_feature_detected!("avx2") || std::is_x86_feature_detected!("avx") { SimdArch::Avx }
        else if std::is_x86_feature_detected!("sse2") { SimdArch::Sse }
        else { SimdArch::Unknown }
    }

    /// The vector class supported by the running CPU.
    #[cfg(all(feature = "std", target_arch = "aarch64"))]
    pub fn detect() -> Self {
        if std::arch::is_aarch64_feature_detected!("neon") { SimdArch::Neon }
        else { SimdArch::Unknown }
    }

    /// The vector class enabled for the compilation target.
    #[cfg(not(all(feature = "std", any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64"))))]
    pub fn detect() -> Self {
        Self::compiled()
    }

    /// The vector class enabled for the compilation target.
    pub const fn compiled() -> Self {
        if cfg!(target_feature = "avx512f") { SimdArch::Avx512 }
        else if cfg!(any(target_feature = "avx2", target_feature = "avx")) { SimdArch::Avx }
        else if cfg!(target_feature = "sse2") { SimdArch::Sse }
        else if cfg!(target_feature = "neon") { SimdArch::Neon }
        else { SimdArch::Unknown }
    }

    /// Width in bytes of the widest vector register.
    pub const fn alignment(self) -> usize {
        match self {
            SimdArch::Avx512 => 64,
            SimdArch::Avx => 32,
            SimdArch::Sse | SimdArch::Neon => 16,
            SimdArch::Unknown => 64,
        }
    }

    /// Number of elements of `element_size` bytes processed per chunk.
    ///
    /// Elements narrower than four bytes use the four-byte lane count.
    pub const fn chunk_size_for(self, element_size: usize) -> usize {
        let lane = if element_size < 4 { 4 } else { element_size };
        chunk_size(self.alignment() / lane)
    }

    /// A short display name.
    pub const fn name(self) -> &'static str {
        match self {
            SimdArch::Avx512 => "AVX512",
            SimdArch::Avx => "AVX",
            SimdArch::Sse => "SSE",
            SimdArch::Neon => "NEON",
            SimdArch::Unknown => "<unknown>",
        }
    }
}

/// The alignment and chunk size used to lay out a container.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "(usize, usize)", into = "(usize, usize)"))]
pub struct SimdConfig {
    alignment: Alignment,
    chunk_size: usize,
}

impl SimdConfig {
    /// Validates an alignment and chunk size; chunk sizes below one become one.
    pub const fn new(alignment: usize, chunk_size: usize) -> Result<Self, LayoutError> {
        match Alignment::new(alignment) {
            Ok(alignment) => Ok(Self { alignment, chunk_size: crate::layout::chunk_size(chunk_size) }),
            Err(err) => Err(err),
        }
    }

    /// The preferred layout for `arch`, chunked for four-byte elements.
    pub const fn for_arch(arch: SimdArch) -> Self {
        Self {
            alignment: match Alignment::new(arch.alignment()) {
                Ok(alignment) => alignment,
                Err(_) => unreachable!(),
            },
            chunk_size: arch.chunk_size_for(4),
        }
    }

    /// Queries the running CPU for its preferred layout.
    pub fn detect() -> Self {
        let arch = SimdArch::detect();
        let config = Self::for_arch(arch);
        tracing::debug!(arch = arch.name(), alignment = config.alignment(), chunk_size = config.chunk_size(), "detected SIMD layout");
        config
    }

    /// This configuration with a different chunk size.
    pub const fn with_chunk_size(self, chunk_size: usize) -> Self {
        Self { alignment: self.alignment, chunk_size: crate::layout::chunk_size(chunk_size) }
    }

    /// Alignment in bytes of every field's storage.
    #[inline(always)] pub const fn alignment(&self) -> usize { self.alignment.bytes() }
    /// Element granularity of every capacity.
    #[inline(always)] pub const fn chunk_size(&self) -> usize { self.chunk_size }
    #[inline(always)] pub(crate) const fn align(&self) -> Alignment { self.alignment }
}

impl Default for SimdConfig {
    /// The detected configuration, resolved once per process.
    #[cfg(feature = "std")]
    fn default() -> Self {
        static DETECTED: std::sync::OnceLock<SimdConfig> = std::sync::OnceLock::new();
        *DETECTED.get_or_init(SimdConfig::detect)
    }
    #[cfg(not(feature = "std"))]
    fn default() -> Self {
        Self::for_arch(SimdArch::compiled())
    }
}

impl TryFrom<(usize, usize)> for SimdConfig {
    type Error = LayoutError;
    fn try_from((alignment, chunk_size): (usize, usize)) -> Result<Self, LayoutError> {
        Self::new(alignment, chunk_size)
    }
}

impl From<SimdConfig> for (usize, usize) {
    fn from(config: SimdConfig) -> Self {
        (config.alignment(), config.chunk_size())
    }
}
