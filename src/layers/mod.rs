/// Fully connected layer.
pub mod linear;

/// Batch normalization.
pub mod batch_norm;

/// Inverted dropout.
pub mod dropout;
