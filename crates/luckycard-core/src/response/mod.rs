//! Softmax choice model over suspicion values seen under the same pool configuration.

mod softmax;

pub use softmax::SoftmaxModel;
