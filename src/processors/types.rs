//! Types used in image processing operations.

/// Specifies the order of channels in an image tensor
#[derive(Debug, Clone)]
pub enum ChannelOrder {
    /// Channel, Height, Width order (common in PyTorch-exported models)
    CHW,
    /// Height, Width, Channel order (common in TensorFlow-exported models)
    HWC,
}
