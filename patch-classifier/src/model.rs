use std::path::PathBuf;

use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d};
use burn::record::{BinFileRecorder, FullPrecisionSettings, RecorderError};
use burn::tensor::activation::{relu, sigmoid};
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor, TensorData};
use ndarray::Array3;

/// Convolutional feature extractor standing in for the pretrained backbone
/// of the transfer-learning setup. Weights come from a record file and are
/// frozen; only the head trains.
#[derive(Module, Debug)]
pub struct Backbone<B: Backend> {
    pub(crate) conv1: Conv2d<B>,
    pub(crate) conv2: Conv2d<B>,
    pub(crate) conv3: Conv2d<B>,
    pub(crate) pool: MaxPool2d,
}

impl<B: Backend> Backbone<B> {
    fn init(device: &B::Device) -> Backbone<B> {
        let conv = |channels_in, channels_out| {
            Conv2dConfig::new([channels_in, channels_out], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device)
        };
        Backbone {
            conv1: conv(3, 32),
            conv2: conv(32, 64),
            conv3: conv(64, 64),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(relu(self.conv1.forward(images)));
        let x = self.pool.forward(relu(self.conv2.forward(x)));
        let x = self.pool.forward(relu(self.conv3.forward(x)));
        x.flatten(1, 3)
    }
}

/// Trainable classification head: two dense layers with dropout in between,
/// sigmoid applied at the probability surface.
#[derive(Module, Debug)]
pub struct ClassifierHead<B: Backend> {
    fc1: Linear<B>,
    dropout: Dropout,
    fc2: Linear<B>,
}

impl<B: Backend> ClassifierHead<B> {
    fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.dropout.forward(relu(self.fc1.forward(features)));
        self.fc2.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct StomaClassifierConfig {
    #[config(default = 120)]
    pub patch_size: usize,
    #[config(default = 2048)]
    pub dense_width: usize,
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl StomaClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> StomaClassifier<B> {
        //three stride-2 pools shrink each spatial axis by 8 (floor)
        let spatial = self.patch_size / 2 / 2 / 2;
        let feature_dim = 64 * spatial * spatial;
        StomaClassifier {
            backbone: Backbone::init(device).no_grad(),
            head: ClassifierHead {
                fc1: LinearConfig::new(feature_dim, self.dense_width).init(device),
                dropout: DropoutConfig::new(self.dropout).init(),
                fc2: LinearConfig::new(self.dense_width, 1).init(device),
            },
        }
    }
}

/// Transfer-learning stoma/no-stoma classifier: frozen backbone plus a
/// trainable head, one probability per patch.
#[derive(Module, Debug)]
pub struct StomaClassifier<B: Backend> {
    pub(crate) backbone: Backbone<B>,
    pub(crate) head: ClassifierHead<B>,
}

impl<B: Backend> StomaClassifier<B> {
    /// Raw logits, one per image.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 1> {
        let features = self.backbone.forward(images);
        self.head.forward(features).squeeze(1)
    }

    /// Probabilities in [0, 1], one per image.
    pub fn forward_probabilities(&self, images: Tensor<B, 4>) -> Tensor<B, 1> {
        sigmoid(self.forward(images))
    }

    /// Score a single normalized (patch_size, patch_size, 3) patch. The HWC
    /// ndarray is permuted to NCHW at the tensor border.
    pub fn score_patch(&self, patch: &Array3<f32>) -> f32 {
        let (height, width, channels) = patch.dim();
        let chw = patch.view().permuted_axes([2, 0, 1]);
        let data = chw.iter().copied().collect::<Vec<f32>>();
        let device = &self.devices()[0];
        let input = Tensor::<B, 4>::from_data(
            TensorData::new(data, [1, channels, height, width]),
            device,
        );
        self.forward_probabilities(input).into_scalar().elem::<f32>()
    }

    /// Re-freeze the backbone; the optimizer then never sees its parameters.
    pub fn freeze_backbone(mut self) -> StomaClassifier<B> {
        self.backbone = self.backbone.no_grad();
        self
    }

    /// Install pretrained backbone weights from a record file.
    pub fn load_backbone(
        mut self,
        path: &str,
        device: &B::Device,
    ) -> Result<StomaClassifier<B>, RecorderError> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        self.backbone = self
            .backbone
            .load_file(PathBuf::from(path), &recorder, device)?
            .no_grad();
        Ok(self)
    }

    /// Persist the trained model; reloadable for inference without retraining.
    pub fn save(self, path: &str) -> Result<(), RecorderError> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        self.save_file(PathBuf::from(path), &recorder)
    }

    /// Reload a saved model, backbone frozen again.
    pub fn load(
        config: &StomaClassifierConfig,
        path: &str,
        device: &B::Device,
    ) -> Result<StomaClassifier<B>, RecorderError> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        let model = config
            .init::<B>(device)
            .load_file(PathBuf::from(path), &recorder, device)?;
        Ok(model.freeze_backbone())
    }
}
