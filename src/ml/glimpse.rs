// ============================================================
// Layer 5 — Glimpse Extractor
// ============================================================
// Crops one g_size × g_size patch per image and flattens it,
// ready for the image encoder:
//
//   images  [N, in, in] ──┐
//                         ├──► patches [N, g*g]
//   centers [N] (pixels) ─┘
//
// Centers come from GlimpseGeometry, which clamps them so every
// crop stays inside the image. That clamp is the caller's job;
// here it is only checked in debug builds.
//
// Locations live on the device but cropping needs plain integer
// indices, so they are pulled back to the host once per step.

use burn::prelude::*;

use crate::domain::location::{GlimpseGeometry, Location, PixelCenter};

/// Crop a square patch around each center and flatten it row-major.
pub fn extract_glimpses<B: Backend>(
    images:   &Tensor<B, 3>,
    centers:  &[PixelCenter],
    geometry: &GlimpseGeometry,
) -> Tensor<B, 2> {
    let [batch_size, _, _] = images.dims();
    assert_eq!(
        centers.len(), batch_size,
        "{} glimpse centers for a batch of {}", centers.len(), batch_size
    );

    let g = geometry.g_size;
    let patches: Vec<Tensor<B, 2>> = centers
        .iter()
        .enumerate()
        .map(|(i, &center)| {
            debug_assert!(geometry.contains_crop(center), "unclamped glimpse center {center:?}");
            let (r0, c0) = geometry.origin(center);
            images
                .clone()
                .slice([i..i + 1, r0..r0 + g, c0..c0 + g])
                .reshape([1, g * g])
        })
        .collect();

    Tensor::cat(patches, 0)
}

/// Copy a `[N, 2]` location tensor to the host.
pub fn locations_to_host<B: Backend>(locations: &Tensor<B, 2>) -> Vec<Location> {
    let flat: Vec<f32> = locations.clone().into_data().iter::<f32>().collect();
    flat.chunks_exact(2)
        .map(|rc| Location::new(rc[0], rc[1]))
        .collect()
}

/// Host locations → clamped pixel centers, one per example.
pub fn pixel_centers<B: Backend>(
    locations: &Tensor<B, 2>,
    geometry:  &GlimpseGeometry,
) -> Vec<PixelCenter> {
    locations_to_host(locations)
        .into_iter()
        .map(|loc| geometry.pixel_center(loc))
        .collect()
}
