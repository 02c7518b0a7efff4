use videoin_core::traits::Backend;

/// Creates the capture backends compiled in for this OS.
///
/// The fallback backend is not included; the controller registers it itself.
pub fn platform_backends() -> Vec<Box<dyn Backend>> {
    #[allow(unused_mut)]
    let mut backends: Vec<Box<dyn Backend>> = Vec::new();

    #[cfg(all(feature = "linux-v4l2", target_os = "linux"))]
    backends.push(Box::new(videoin_backend_v4l2::V4l2Backend::new()));

    backends
}
