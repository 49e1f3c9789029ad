#![recursion_limit = "256"]

use burn::backend::NdArray;
use burn::module::Module;
use burn::prelude::Tensor;
use burn::tensor::Distribution;
use clap::{Parser, arg};
use cnn_zoo::models::common::{InputConfig, ModelOutput};
use cnn_zoo::registry::{lookup_prefab, prefab_names};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Name of the prefab model.
    #[arg(long, default_value = "resnet18")]
    model: String,

    /// List the prefab models and exit.
    #[arg(long, default_value = "false")]
    list: bool,

    /// Batch size of the random input.
    #[arg(long, default_value = "1")]
    batch_size: usize,

    /// Input channels.
    #[arg(long, default_value = "3")]
    channels: usize,

    /// Input height and width.
    #[arg(long, default_value = "224")]
    resolution: usize,

    /// Number of head classes.
    #[arg(long, default_value = "1000")]
    num_classes: usize,

    /// Build without the classification head.
    #[arg(long, default_value = "false")]
    no_top: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if args.list {
        for name in prefab_names() {
            println!("{name}");
        }
        return Ok(());
    }

    type B = NdArray<f32>;
    let device = Default::default();

    let shape = [args.batch_size, args.channels, args.resolution, args.resolution];
    let prefab = lookup_prefab(&args.model)?;
    let config = prefab
        .new_config()
        .with_input(InputConfig::from_shape(shape))
        .with_include_top(!args.no_top)
        .with_num_classes(args.num_classes)
        .with_create_model(true);

    info!(model = %prefab.name, family = config.family(), "building");
    let model = config
        .build::<B>(&device)?
        .into_model()
        .ok_or_else(|| anyhow::anyhow!("{} did not build a classifier", prefab.name))?;

    println!("{}: {}", model.name(), prefab.description);
    println!("  input:        {:?}", model.input().shape);
    println!("  stage widths: {:?}", model.network.stage_widths());
    println!("  out channels: {}", model.network.out_channels());
    println!("  parameters:   {}", model.num_params());

    let input = Tensor::random(shape, Distribution::Default, &device);
    match model.forward(input) {
        ModelOutput::Logits(logits) => println!("  logits:       {:?}", logits.dims()),
        ModelOutput::Features(features) => println!("  feature map:  {:?}", features.dims()),
    }

    Ok(())
}
