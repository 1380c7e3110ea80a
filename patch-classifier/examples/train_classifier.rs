//Fine-tune the stomata patch classifier on a labeled patch dataset

use std::path::Path;

use clap::Parser;
use patch_classifier::burn::backend::{Autodiff, NdArray};
use patch_classifier::dataset::{PatchDataset, PatchLoader};
use patch_classifier::model::{StomaClassifier, StomaClassifierConfig};
use patch_classifier::trainer::{fit, TrainConfig};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    //dataset root containing training/ and validation/ splits
    #[arg(short, long)]
    data_dir: String,
    //optional pretrained backbone record
    #[arg(short, long)]
    backbone_path: Option<String>,
    //where to save the trained classifier
    #[arg(short, long, default_value = "stoma_classifier.bin")]
    model_path: String,
    //shuffle/augmentation seed
    #[arg(short, long, default_value_t = 42)]
    seed: u64,
}

type Backend = Autodiff<NdArray>;

fn main() {
    let args = Args::parse();
    let device = Default::default();
    let model_config = StomaClassifierConfig::new();
    let train_config = TrainConfig::new();

    let root = Path::new(&args.data_dir);
    let mut train_loader = PatchLoader::new(
        PatchDataset::from_dir(&root.join("training")),
        model_config.patch_size,
        train_config.batch_size,
        true,
        args.seed,
    );
    let mut val_loader = PatchLoader::new(
        PatchDataset::from_dir(&root.join("validation")),
        model_config.patch_size,
        train_config.batch_size,
        false,
        args.seed,
    );

    let mut model: StomaClassifier<Backend> = model_config.init(&device);
    if let Some(path) = &args.backbone_path {
        model = model
            .load_backbone(path, &device)
            .unwrap_or_else(|e| panic!("{}: {}", path, e));
    }

    let (model, history) = fit(
        model,
        &mut train_loader,
        &mut val_loader,
        &train_config,
        &device,
    );
    for (epoch, stats) in history.epochs.iter().enumerate() {
        println!(
            "epoch {}: train_loss {:.4} train_acc {:.4} val_loss {:.4} val_acc {:.4}",
            epoch + 1,
            stats.train_loss,
            stats.train_accuracy,
            stats.val_loss,
            stats.val_accuracy
        );
    }
    model
        .save(&args.model_path)
        .unwrap_or_else(|e| panic!("{}: {}", args.model_path, e));
}
