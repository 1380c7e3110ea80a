use burn::config::Config;
use burn::module::{AutodiffModule, Module};
use burn::nn::loss::BinaryCrossEntropyLossConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Int, Tensor, TensorData};
use slog::FnValue;
use slog::{info, o, Drain, Logger};

use crate::dataset::{PatchBatch, PatchLoader};
use crate::model::StomaClassifier;
use crate::IS_DEBUG;

#[derive(Config, Debug)]
pub struct TrainConfig {
    #[config(default = 50)]
    pub epochs: usize,
    #[config(default = 128)]
    pub batch_size: usize,
    #[config(default = 5e-6)]
    pub learning_rate: f64,
}

/// Per-epoch training and validation metrics.
#[derive(Clone, Debug)]
pub struct EpochStats {
    pub train_loss: f32,
    pub train_accuracy: f32,
    pub val_loss: f32,
    pub val_accuracy: f32,
}

#[derive(Clone, Debug, Default)]
pub struct TrainHistory {
    pub epochs: Vec<EpochStats>,
}

fn batch_tensors<B: Backend>(
    batch: &PatchBatch,
    device: &B::Device,
) -> (Tensor<B, 4>, Tensor<B, 1, Int>) {
    let (n, height, width, channels) = batch.images.dim();
    let nchw = batch.images.view().permuted_axes([0, 3, 1, 2]);
    let data = nchw.iter().copied().collect::<Vec<f32>>();
    let images = Tensor::<B, 4>::from_data(
        TensorData::new(data, [n, channels, height, width]),
        device,
    );
    let labels = Tensor::<B, 1, Int>::from_data(TensorData::new(batch.labels.clone(), [n]), device);
    (images, labels)
}

/// Loss and accuracy over one full epoch of the loader, no weight updates.
fn evaluate<B: Backend>(
    model: &StomaClassifier<B>,
    loader: &mut PatchLoader,
    device: &B::Device,
) -> (f32, f32) {
    let loss_fn = BinaryCrossEntropyLossConfig::new()
        .with_logits(true)
        .init(device);
    let mut loss_sum = 0.0_f32;
    let mut correct = 0.0_f32;
    let mut seen = 0_usize;
    for _ in 0..loader.batches_per_epoch() {
        let batch = loader.next_batch();
        let n = batch.labels.len();
        let (images, targets) = batch_tensors::<B>(&batch, device);
        let logits = model.forward(images);
        let loss = loss_fn.forward(logits.clone(), targets.clone());
        loss_sum += loss.into_scalar().elem::<f32>() * n as f32;
        correct += count_correct(logits, targets);
        seen += n;
    }
    (loss_sum / seen as f32, correct / seen as f32)
}

/// A probability of at least 0.5 (logit >= 0) counts as a positive call.
fn count_correct<B: Backend>(logits: Tensor<B, 1>, targets: Tensor<B, 1, Int>) -> f32 {
    let predictions = logits.greater_equal_elem(0.0).int();
    predictions
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem::<f32>()
}

/// Fit the classifier head against the training loader with Adam at a fixed
/// learning rate and binary cross-entropy on the logits. The backbone is
/// no-grad, so only head parameters receive updates. Validation runs once per
/// epoch on the inner (non-autodiff) module.
pub fn fit<B: AutodiffBackend>(
    mut model: StomaClassifier<B>,
    train: &mut PatchLoader,
    validation: &mut PatchLoader,
    config: &TrainConfig,
    device: &B::Device,
) -> (StomaClassifier<B>, TrainHistory) {
    let log = set_log_config();
    let mut optim = AdamConfig::new().init();
    let loss_fn = BinaryCrossEntropyLossConfig::new()
        .with_logits(true)
        .init(device);

    let mut history = TrainHistory::default();
    for epoch in 0..config.epochs {
        let mut loss_sum = 0.0_f32;
        let mut correct = 0.0_f32;
        let mut seen = 0_usize;
        for step in 0..train.batches_per_epoch() {
            let batch = train.next_batch();
            let n = batch.labels.len();
            let (images, targets) = batch_tensors::<B>(&batch, device);
            let logits = model.forward(images);
            let loss = loss_fn.forward(logits.clone(), targets.clone());

            let loss_value = loss.clone().into_scalar().elem::<f32>();
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(config.learning_rate, model, grads);

            loss_sum += loss_value * n as f32;
            correct += count_correct(logits, targets);
            seen += n;
            if IS_DEBUG {
                info!(log, "epoch {} step {} loss {:.4}", epoch, step, loss_value);
            }
        }

        let inner = model.valid();
        let inner_device = &inner.devices()[0];
        let (val_loss, val_accuracy) = evaluate(&inner, validation, inner_device);
        let stats = EpochStats {
            train_loss: loss_sum / seen as f32,
            train_accuracy: correct / seen as f32,
            val_loss,
            val_accuracy,
        };
        info!(
            log,
            "epoch {}/{} train_loss {:.4} train_acc {:.4} val_loss {:.4} val_acc {:.4}",
            epoch + 1,
            config.epochs,
            stats.train_loss,
            stats.train_accuracy,
            stats.val_loss,
            stats.val_accuracy
        );
        history.epochs.push(stats);
    }
    (model, history)
}

pub(crate) fn set_log_config() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(
        drain,
        o!("place" =>
         FnValue(move |info| {
             format!("{}:{} {}",
                     info.file(),
                     info.line(),
                     info.module(),
                     )
         })
        ),
    )
}
