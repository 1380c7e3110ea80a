//Detect stomata on an input micrograph with a trained patch classifier

use clap::Parser;
use patch_classifier::burn::backend::NdArray;
use patch_classifier::model::{StomaClassifier, StomaClassifierConfig};
use stomata::{
    stomata_detector::{detect_stomata, StomaDetectionParameter},
    utils::ImageUtil,
    visualize::overlay_detections,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    //path to the micrograph image
    #[arg(short, long)]
    image_path: String,
    //path to the trained classifier record
    #[arg(short, long)]
    model_path: String,
    //where to write the marked-up image
    #[arg(short, long, default_value = "detections.png")]
    output_path: String,
}

fn main() {
    let args = Args::parse();
    let device = Default::default();
    let config = StomaClassifierConfig::new();
    let classifier: StomaClassifier<NdArray> =
        StomaClassifier::load(&config, &args.model_path, &device)
            .unwrap_or_else(|e| panic!("{}: {}", args.model_path, e));

    let full_image = ImageUtil::read_rgb(&args.image_path);
    let param = StomaDetectionParameter::default();
    let centers = detect_stomata(&full_image, &param, |patch| classifier.score_patch(patch));
    centers
        .iter()
        .for_each(|center| println!("stoma at {:?}", center));

    let overlay = overlay_detections(&full_image, &centers, (param.patch_size / 2) as i32);
    overlay
        .save(&args.output_path)
        .unwrap_or_else(|e| panic!("{}: {}", args.output_path, e));
}
