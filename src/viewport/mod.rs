//! Pan/zoom state for the active image and the fit-to-viewport computation.

use crate::geometry::{
    image_to_screen, screen_to_image, ImagePoint, PanOffset, ScreenPoint, Size,
};

const DEFAULT_MIN_SCALE: f64 = 0.1;
const DEFAULT_MAX_SCALE: f64 = 8.0;
const DEFAULT_ZOOM_STEP: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitResult {
    pub scale: f64,
    pub is_fit_horizontal: bool,
}

/// Scale that fits `image` inside `viewport`, rounded to one decimal.
///
/// The limiting axis is horizontal when `iw / vw > ih / vh`. Returns `None`
/// when either size has a non-positive dimension.
pub fn fit_to_viewport(image: Size, viewport: Size) -> Option<FitResult> {
    if !image.is_positive() || !viewport.is_positive() {
        return None;
    }
    let is_fit_horizontal = image.width / viewport.width > image.height / viewport.height;
    let ratio = if is_fit_horizontal {
        viewport.width / image.width
    } else {
        viewport.height / image.height
    };
    Some(FitResult {
        scale: (ratio * 10.0).round() / 10.0,
        is_fit_horizontal,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportLimits {
    pub min_scale: f64,
    pub max_scale: f64,
    pub zoom_step: f64,
}

impl Default for ViewportLimits {
    fn default() -> Self {
        Self {
            min_scale: DEFAULT_MIN_SCALE,
            max_scale: DEFAULT_MAX_SCALE,
            zoom_step: DEFAULT_ZOOM_STEP,
        }
    }
}

impl ViewportLimits {
    /// Repairs configured limits so that the scale can never reach zero.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let min_scale = if self.min_scale.is_finite() && self.min_scale > 0.0 {
            self.min_scale
        } else {
            defaults.min_scale
        };
        let max_scale = if self.max_scale.is_finite() && self.max_scale >= min_scale {
            self.max_scale
        } else {
            defaults.max_scale.max(min_scale)
        };
        let zoom_step = if self.zoom_step.is_finite() && self.zoom_step > 0.0 {
            self.zoom_step
        } else {
            defaults.zoom_step
        };
        Self {
            min_scale,
            max_scale,
            zoom_step,
        }
    }

    fn clamp(&self, scale: f64) -> f64 {
        scale.clamp(self.min_scale, self.max_scale)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    scale: f64,
    pan: PanOffset,
    canvas: Size,
    natural: Option<Size>,
    limits: ViewportLimits,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ViewportLimits::default())
    }
}

impl Viewport {
    pub fn new(limits: ViewportLimits) -> Self {
        let limits = limits.sanitized();
        Self {
            scale: limits.clamp(1.0),
            pan: PanOffset::zero(),
            canvas: Size::default(),
            natural: None,
            limits,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn pan(&self) -> PanOffset {
        self.pan
    }

    pub fn canvas_size(&self) -> Size {
        self.canvas
    }

    pub fn natural_size(&self) -> Option<Size> {
        self.natural
    }

    pub fn screen_to_image(&self, point: ScreenPoint) -> ImagePoint {
        screen_to_image(point, self.pan, self.scale)
    }

    pub fn image_to_screen(&self, point: ImagePoint) -> ScreenPoint {
        image_to_screen(point, self.pan, self.scale)
    }

    /// Forgets the previous image and returns to an identity view.
    pub fn clear_image(&mut self) {
        self.natural = None;
        self.scale = self.limits.clamp(1.0);
        self.pan = PanOffset::zero();
    }

    /// Fits `natural` into the canvas and centres it on the non-limiting axis.
    pub fn fit(&mut self, natural: Size) -> bool {
        self.natural = Some(natural);
        let Some(fit) = fit_to_viewport(natural, self.canvas) else {
            tracing::debug!(?natural, canvas = ?self.canvas, "skipping fit for empty size");
            return false;
        };
        self.scale = self.limits.clamp(fit.scale);
        let scaled_width = natural.width * self.scale;
        let scaled_height = natural.height * self.scale;
        self.pan = if fit.is_fit_horizontal {
            PanOffset::new(0.0, (self.canvas.height - scaled_height) / 2.0)
        } else {
            PanOffset::new((self.canvas.width - scaled_width) / 2.0, 0.0)
        };
        tracing::debug!(
            scale = self.scale,
            pan_x = self.pan.x,
            pan_y = self.pan.y,
            horizontal = fit.is_fit_horizontal,
            "viewport fit"
        );
        true
    }

    /// Re-fits with the last known natural size and the current canvas size.
    pub fn reset_position(&mut self) -> bool {
        match self.natural {
            Some(natural) => self.fit(natural),
            None => false,
        }
    }

    /// Pans without bounds, the image may leave the canvas entirely.
    pub fn pan_by(&mut self, delta_x: f64, delta_y: f64) -> bool {
        if delta_x == 0.0 && delta_y == 0.0 {
            return false;
        }
        self.pan.x += delta_x;
        self.pan.y += delta_y;
        true
    }

    pub fn zoom_by(&mut self, delta: f64) -> bool {
        let next = self.limits.clamp(self.scale + delta);
        if next == self.scale {
            return false;
        }
        self.scale = next;
        true
    }

    pub fn zoom_in(&mut self) -> bool {
        self.zoom_by(self.limits.zoom_step)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.zoom_by(-self.limits.zoom_step)
    }

    /// Tracks the drawing surface size; scale and pan are left untouched.
    pub fn resize(&mut self, canvas: Size) -> bool {
        if self.canvas == canvas {
            return false;
        }
        self.canvas = canvas;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn fit_wide_image_is_horizontal_half_scale() {
        let fit = fit_to_viewport(Size::new(1000.0, 500.0), Size::new(500.0, 500.0))
            .expect("positive sizes");
        assert!(fit.is_fit_horizontal);
        assert_eq!(fit.scale, 0.5);
    }

    #[test]
    fn fit_tall_image_is_vertical_and_rounded_to_tenths() {
        let fit = fit_to_viewport(Size::new(300.0, 900.0), Size::new(800.0, 600.0))
            .expect("positive sizes");
        assert!(!fit.is_fit_horizontal);
        assert!(approx(fit.scale, 0.7));
    }

    #[test]
    fn fit_rejects_empty_sizes() {
        assert!(fit_to_viewport(Size::new(0.0, 10.0), Size::new(10.0, 10.0)).is_none());
        assert!(fit_to_viewport(Size::new(10.0, 10.0), Size::new(10.0, 0.0)).is_none());
    }

    #[test]
    fn viewport_fit_centres_on_non_limiting_axis() {
        let mut viewport = Viewport::default();
        viewport.resize(Size::new(500.0, 500.0));
        assert!(viewport.fit(Size::new(1000.0, 500.0)));
        assert_eq!(viewport.scale(), 0.5);
        assert_eq!(viewport.pan(), PanOffset::new(0.0, 125.0));

        assert!(viewport.fit(Size::new(200.0, 1000.0)));
        assert_eq!(viewport.scale(), 0.5);
        assert_eq!(viewport.pan(), PanOffset::new(200.0, 0.0));
    }

    #[test]
    fn viewport_fit_is_clamped_to_minimum_scale() {
        let mut viewport = Viewport::default();
        viewport.resize(Size::new(100.0, 100.0));
        viewport.fit(Size::new(20_000.0, 100.0));
        assert!(approx(viewport.scale(), 0.1));
    }

    #[test]
    fn zoom_is_clamped_to_limits() {
        let mut viewport = Viewport::default();
        for _ in 0..200 {
            viewport.zoom_in();
        }
        assert!(approx(viewport.scale(), 8.0));
        for _ in 0..200 {
            viewport.zoom_out();
        }
        assert!(approx(viewport.scale(), 0.1));
        assert!(!viewport.zoom_by(-1.0));
    }

    #[test]
    fn pan_accumulates_without_bounds() {
        let mut viewport = Viewport::default();
        assert!(viewport.pan_by(-5000.0, 12.0));
        assert!(viewport.pan_by(1.0, 1.0));
        assert!(!viewport.pan_by(0.0, 0.0));
        assert_eq!(viewport.pan(), PanOffset::new(-4999.0, 13.0));
    }

    #[test]
    fn resize_keeps_scale_and_pan_until_reset() {
        let mut viewport = Viewport::default();
        viewport.resize(Size::new(400.0, 400.0));
        viewport.fit(Size::new(800.0, 400.0));
        viewport.pan_by(30.0, 30.0);
        let before = (viewport.scale(), viewport.pan());

        assert!(viewport.resize(Size::new(800.0, 800.0)));
        assert!(!viewport.resize(Size::new(800.0, 800.0)));
        assert_eq!((viewport.scale(), viewport.pan()), before);

        assert!(viewport.reset_position());
        assert_eq!(viewport.scale(), 1.0);
        assert_eq!(viewport.pan(), PanOffset::new(0.0, 200.0));
    }

    #[test]
    fn reset_without_image_is_noop() {
        let mut viewport = Viewport::default();
        viewport.resize(Size::new(400.0, 400.0));
        assert!(!viewport.reset_position());
    }

    #[test]
    fn sanitized_limits_never_allow_zero_scale() {
        let limits = ViewportLimits {
            min_scale: 0.0,
            max_scale: -1.0,
            zoom_step: f64::NAN,
        }
        .sanitized();
        assert_eq!(limits, ViewportLimits::default());
    }
}
