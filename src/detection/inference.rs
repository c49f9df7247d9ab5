use image::imageops::FilterType;
use image::RgbImage;
use ndarray::{Array4, ArrayD, IxDyn};
use rten::Model;
use rten_tensor::prelude::*;
use rten_tensor::{NdTensor, Tensor};
use tracing::{debug, info};

use crate::core::config::NetworkParams;
use crate::core::error::LoadError;

/// Square input edge length fed to network detectors
pub const INPUT_SIZE: u32 = 320;

/// Frameworks the bundled engine can read
const SUPPORTED_FRAMEWORKS: [&str; 2] = ["rten", "onnx"];

/// Forward pass of a loaded detection network.
///
/// Implementations take an NCHW `f32` blob and return the raw detections
/// tensor, expected as `[1, 1, N, 7]` rows of
/// `(batch, class, confidence, x1, y1, x2, y2)` in normalized coordinates.
pub trait InferenceEngine: Send {
    fn forward(&mut self, blob: &Array4<f32>) -> anyhow::Result<ArrayD<f32>>;
}

/// Build a normalized input blob from a frame.
///
/// The frame is resized to `size` x `size`, the per-channel mean is
/// subtracted and channels are laid out B, G, R unless `swap_rb` asks for
/// R, G, B. `mean` is given in the blob's channel order.
pub fn blob_from_image(img: &RgbImage, size: u32, mean: [f32; 3], swap_rb: bool) -> Array4<f32> {
    let resized = image::imageops::resize(img, size, size, FilterType::Triangle);
    let order: [usize; 3] = if swap_rb { [0, 1, 2] } else { [2, 1, 0] };

    let mut blob = Array4::<f32>::zeros((1, 3, size as usize, size as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for (c, &src) in order.iter().enumerate() {
            blob[[0, c, y as usize, x as usize]] = pixel[src] as f32 - mean[c];
        }
    }
    blob
}

/// Network engine backed by `rten`
pub struct RtenEngine {
    model: Model,
}

impl RtenEngine {
    /// Load the network described by `params`.
    ///
    /// Both the graph and the weights file must be readable; `rten` keeps
    /// graph and weights in one file, so `paths.inf` may name the same file
    /// as `paths.model`.
    pub fn load(params: &NetworkParams) -> Result<Self, LoadError> {
        let framework = params.framework.trim().to_lowercase();
        if !framework.is_empty() && !SUPPORTED_FRAMEWORKS.contains(&framework.as_str()) {
            return Err(LoadError::cannot_read_network(
                &params.model_path,
                format!("unsupported framework '{}'", params.framework),
            ));
        }

        std::fs::metadata(&params.inf_graph_path)
            .map_err(|e| LoadError::cannot_read_network(&params.inf_graph_path, e))?;

        let model = Model::load_file(&params.model_path)
            .map_err(|e| LoadError::cannot_read_network(&params.model_path, e))?;

        info!("Loaded network {:?}", params.model_path);
        Ok(Self { model })
    }
}

impl InferenceEngine for RtenEngine {
    fn forward(&mut self, blob: &Array4<f32>) -> anyhow::Result<ArrayD<f32>> {
        let dims = blob.shape();
        let input = NdTensor::from_data(
            [dims[0], dims[1], dims[2], dims[3]],
            blob.iter().copied().collect::<Vec<f32>>(),
        );

        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|e| anyhow::anyhow!("Model run failed: {}", e))?;
        let output: Tensor<f32> = output
            .try_into()
            .map_err(|e| anyhow::anyhow!("Unexpected output type: {:?}", e))?;

        let shape = output.shape().to_vec();
        debug!("Network output shape {:?}", shape);
        ArrayD::from_shape_vec(IxDyn(&shape), output.to_vec())
            .map_err(|e| anyhow::anyhow!("Failed to reshape network output: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_blob_channel_order_and_mean() {
        let img = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));

        let bgr = blob_from_image(&img, 2, [1.0, 2.0, 3.0], false);
        assert_eq!(bgr.shape(), &[1, 3, 2, 2]);
        assert_eq!(bgr[[0, 0, 0, 0]], 29.0);
        assert_eq!(bgr[[0, 1, 0, 0]], 18.0);
        assert_eq!(bgr[[0, 2, 0, 0]], 7.0);

        let rgb = blob_from_image(&img, 2, [0.0; 3], true);
        assert_eq!(rgb[[0, 0, 1, 1]], 10.0);
        assert_eq!(rgb[[0, 2, 1, 1]], 30.0);
    }

    #[test]
    fn test_unsupported_framework() {
        let params = NetworkParams {
            framework: "caffe".to_string(),
            model_path: "model.caffemodel".into(),
            inf_graph_path: "deploy.prototxt".into(),
            ..NetworkParams::default()
        };
        assert!(matches!(RtenEngine::load(&params), Err(LoadError::CannotReadNetwork { .. })));
    }
}
