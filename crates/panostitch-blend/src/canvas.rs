use log::info;
use nalgebra::Point2;
use panostitch_align::GlobalTransforms;
use panostitch_core::{BoundingBox, Homography};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Largest accepted canvas side, in pixels.
pub const MAX_CANVAS_SIDE: usize = 1 << 18;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CanvasError {
    #[error("no registered images to place")]
    NoRegisteredImages,
    #[error("no size known for image {index}")]
    MissingSize { index: usize },
    #[error("image {index} has a degenerate footprint on the canvas")]
    DegenerateFootprint { index: usize },
    #[error("canvas extent {width:.1} x {height:.1} is not positive")]
    NonPositive { width: f64, height: f64 },
    #[error("canvas {width} x {height} exceeds the {max} px side limit")]
    TooLarge { width: f64, height: f64, max: usize },
}

/// Where one registered image lands on the canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct ImagePlacement {
    pub index: usize,
    pub width: usize,
    pub height: usize,
    /// `M_final = shift · H_to_ref`.
    pub canvas_from_image: Homography,
    pub image_from_canvas: Homography,
    /// Canvas box around every pixel the image can cover.
    pub bounds: BoundingBox,
}

/// Output canvas size and per-image placements, computed once per run.
#[derive(Clone, Debug, PartialEq)]
pub struct CanvasPlan {
    pub width: usize,
    pub height: usize,
    /// Reference-frame coordinate of the canvas origin.
    pub origin: [f64; 2],
    /// Translation taking reference coordinates onto the canvas.
    pub shift: Homography,
    pub placements: Vec<ImagePlacement>,
}

/// Canvas dimensions in serialized diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanvasSummary {
    pub width: usize,
    pub height: usize,
    pub origin: [f64; 2],
}

impl CanvasPlan {
    pub fn placement(&self, index: usize) -> Option<&ImagePlacement> {
        self.placements.iter().find(|p| p.index == index)
    }

    pub fn summary(&self) -> CanvasSummary {
        CanvasSummary {
            width: self.width,
            height: self.height,
            origin: self.origin,
        }
    }
}

fn corners(width: usize, height: usize, inset: f64) -> [Point2<f64>; 4] {
    let (w, h) = (width as f64 - inset, height as f64 - inset);
    [
        Point2::new(-inset, -inset),
        Point2::new(w, -inset),
        Point2::new(w, h),
        Point2::new(-inset, h),
    ]
}

fn project_corners(
    h: &Homography,
    width: usize,
    height: usize,
    inset: f64,
    index: usize,
) -> Result<BoundingBox, CanvasError> {
    let mut pts = Vec::with_capacity(4);
    for c in corners(width, height, inset) {
        pts.push(
            h.try_apply(c)
                .ok_or(CanvasError::DegenerateFootprint { index })?,
        );
    }
    BoundingBox::from_points(pts).ok_or(CanvasError::DegenerateFootprint { index })
}

/// Union of the transformed corner boxes, shifted to start at the origin.
///
/// `sizes[i]` is `(width, height)` of image `i`. The extent is taken from the
/// pixel-edge corners `(0,0)..(w,h)`; canvas width and height are its ceiling.
/// Each placement's `bounds` additionally covers the half-pixel border its
/// warp can reach, so a box test never misses a covered canvas pixel.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(sizes, transforms), fields(registered = transforms.len()))
)]
pub fn plan_canvas(
    sizes: &[(usize, usize)],
    transforms: &GlobalTransforms,
) -> Result<CanvasPlan, CanvasError> {
    let mut extent: Option<BoundingBox> = None;
    for (index, reg) in transforms.iter() {
        let &(w, h) = sizes.get(index).ok_or(CanvasError::MissingSize { index })?;
        if w == 0 || h == 0 {
            return Err(CanvasError::DegenerateFootprint { index });
        }
        let b = project_corners(&reg.to_reference, w, h, 0.0, index)?;
        extent = Some(extent.map_or(b, |e| e.union(&b)));
    }
    let extent = extent.ok_or(CanvasError::NoRegisteredImages)?;

    let (wf, hf) = (extent.width().ceil(), extent.height().ceil());
    if !(wf >= 1.0 && hf >= 1.0) {
        return Err(CanvasError::NonPositive {
            width: wf,
            height: hf,
        });
    }
    if wf > MAX_CANVAS_SIDE as f64 || hf > MAX_CANVAS_SIDE as f64 {
        return Err(CanvasError::TooLarge {
            width: wf,
            height: hf,
            max: MAX_CANVAS_SIDE,
        });
    }

    let shift = Homography::translation(-extent.min_x, -extent.min_y);
    let mut placements = Vec::with_capacity(transforms.len());
    for (index, reg) in transforms.iter() {
        let (w, h) = sizes[index];
        let canvas_from_image = shift * reg.to_reference;
        let image_from_canvas = canvas_from_image
            .inverse()
            .ok_or(CanvasError::DegenerateFootprint { index })?;
        let bounds = project_corners(&canvas_from_image, w, h, 0.5, index)?;
        placements.push(ImagePlacement {
            index,
            width: w,
            height: h,
            canvas_from_image,
            image_from_canvas,
            bounds,
        });
    }

    let plan = CanvasPlan {
        width: wf as usize,
        height: hf as usize,
        origin: [extent.min_x, extent.min_y],
        shift,
        placements,
    };
    info!(
        "canvas {}x{} with {} images, origin ({:.2}, {:.2})",
        plan.width,
        plan.height,
        plan.placements.len(),
        plan.origin[0],
        plan.origin[1]
    );
    Ok(plan)
}
