//! Constants used throughout the crowd counting pipeline.

/// ImageNet per-channel mean used for input normalization (RGB order).
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet per-channel standard deviation used for input normalization (RGB order).
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Default scale applied to 8-bit channel values before normalization.
pub const DEFAULT_SCALE: f32 = 1.0 / 255.0;

/// Default scalar the raw density map is divided by after inference.
pub const DEFAULT_DIVIDE: f32 = 1.0;

/// Number of images above which batch loading switches to parallel iteration.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 8;

/// Maximum allowed session pool size for a single predictor.
pub const MAX_SESSION_POOL_SIZE: usize = 64;
