//! Smoothing kernels for [`WaveformKind::Smooth`](super::WaveformKind::Smooth).

use std::f64::consts::PI;
use std::fmt;

/// Number of quadrature points used for the convolution.
pub(crate) const QUADRATURE_POINTS: usize = 201;

/// A convolution kernel in normalized units (bandwidth 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SmoothingKernel {
    /// Standard normal density.
    Gaussian,
    /// Logistic density.
    Logistic,
    /// Hyperbolic-secant density.
    Sigmoid,
    /// Triangular kernel on `[-1, 1]`.
    Triangle,
    /// Box kernel on `[-1, 1]`.
    Uniform,
    /// Epanechnikov kernel.
    Parabolic,
    /// Quartic kernel.
    Biweight,
    /// Sextic kernel.
    Triweight,
    /// Tricube kernel.
    Tricube,
    /// Cosine kernel.
    Cosine,
}

impl SmoothingKernel {
    /// Kernel weight at `x`.
    pub fn weight(self, x: f64) -> f64 {
        let inside = x.abs() <= 1.0;
        match self {
            SmoothingKernel::Gaussian => (-0.5 * x * x).exp() / (2.0 * PI).sqrt(),
            SmoothingKernel::Logistic => 1.0 / (x.exp() + 2.0 + (-x).exp()),
            SmoothingKernel::Sigmoid => (2.0 / PI) / (x.exp() + (-x).exp()),
            SmoothingKernel::Triangle if inside => 1.0 - x.abs(),
            SmoothingKernel::Uniform if inside => 0.5,
            SmoothingKernel::Parabolic if inside => 0.75 * (1.0 - x * x),
            SmoothingKernel::Biweight if inside => (15.0 / 16.0) * (1.0 - x * x).powi(2),
            SmoothingKernel::Triweight if inside => (35.0 / 32.0) * (1.0 - x * x).powi(3),
            SmoothingKernel::Tricube if inside => (70.0 / 81.0) * (1.0 - x.abs().powi(3)).powi(3),
            SmoothingKernel::Cosine if inside => (PI / 4.0) * (PI * x / 2.0).cos(),
            _ => 0.0,
        }
    }

    /// Half-width of the region where the kernel carries weight.
    ///
    /// Unbounded kernels are truncated where their tail is negligible.
    pub fn support(self) -> f64 {
        match self {
            SmoothingKernel::Gaussian => 4.0,
            SmoothingKernel::Logistic | SmoothingKernel::Sigmoid => 8.0,
            _ => 1.0,
        }
    }

    /// Quadrature nodes and normalized weights over the kernel support.
    pub(crate) fn quadrature(self) -> Vec<(f64, f64)> {
        let half = self.support();
        let step = 2.0 * half / (QUADRATURE_POINTS - 1) as f64;
        let nodes: Vec<(f64, f64)> = (0..QUADRATURE_POINTS)
            .map(|i| {
                let x = -half + step * i as f64;
                (x, self.weight(x))
            })
            .collect();
        let total: f64 = nodes.iter().map(|(_, w)| w).sum();
        nodes.into_iter().map(|(x, w)| (x, w / total)).collect()
    }
}

impl fmt::Display for SmoothingKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SmoothingKernel::Gaussian => "gaussian",
            SmoothingKernel::Logistic => "logistic",
            SmoothingKernel::Sigmoid => "sigmoid",
            SmoothingKernel::Triangle => "triangle",
            SmoothingKernel::Uniform => "uniform",
            SmoothingKernel::Parabolic => "parabolic",
            SmoothingKernel::Biweight => "biweight",
            SmoothingKernel::Triweight => "triweight",
            SmoothingKernel::Tricube => "tricube",
            SmoothingKernel::Cosine => "cosine",
        };
        f.write_str(name)
    }
}
