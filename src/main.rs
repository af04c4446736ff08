// Quantize a sample tensor, print the round-trip error, optionally chart it per element
use std::path::{Path, PathBuf};

use clap::Parser;
use plotters::prelude::*;
use tracing::info;

use tiny_tensor_quant::{
    quantize, quantize_in_place, Representation, RoundTripReport, TensorStore,
};

#[derive(Parser, Debug)]
#[command(version, about = "int8 affine tensor quantization demo", long_about = None)]
struct Args {
    /// Comma-separated input values
    #[arg(
        long,
        value_delimiter = ',',
        allow_hyphen_values = true,
        default_value = "12.5,45.2,-10.0,32.8,0.5"
    )]
    values: Vec<f32>,

    /// Load the values into the store and quantize them in place
    #[arg(long, default_value_t = false)]
    in_place: bool,

    /// Write a per-element round-trip error chart to this PNG file
    #[arg(long, value_name = "FILE")]
    plot: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    println!("--- Tiny tensor int8 quantization ---\n");

    let mut store = TensorStore::create(args.values.len(), Representation::Float32)?;

    println!("[STEP 1] Quantizing {} values", store.len());
    if args.in_place {
        store.load_f32(&args.values)?;
        quantize_in_place(&mut store)?;
    } else {
        quantize(&mut store, &args.values)?;
    }
    println!(
        "Scale: {:.6} | Zero Point: {}\n",
        store.scale(),
        store.zero_point()
    );

    println!("[STEP 2] Memory layout");
    if let Some(ptr) = store.storage_ptr() {
        println!("Storage address (f32 view): {:p}", ptr.cast::<f32>());
        println!("Storage address (i8 view):  {:p}", ptr.cast::<i8>());
    }
    println!(
        "{} bytes reserved, {} bytes used by the int8 view\n",
        store.memory_bytes(),
        store.len()
    );

    println!("[STEP 3] Accuracy");
    let report = RoundTripReport::new(&args.values, &store)?;
    println!("{report}");

    store.destroy();

    if let Some(path) = args.plot {
        plot_errors(&path, &report)
            .map_err(|e| anyhow::anyhow!("writing chart {}: {e}", path.display()))?;
        info!(path = %path.display(), "wrote error chart");
    }

    Ok(())
}

/// Per-element |error| bars against the one-step bound
fn plot_errors(path: &Path, report: &RoundTripReport) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let n = report.elements.len().max(1);
    let y_max = report.max_abs_error().max(report.scale) * 1.1;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Zero point {} | Scale {:.4}", report.zero_point, report.scale),
            ("sans-serif", 30),
        )
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d((0..n).into_segmented(), 0f32..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Element")
        .y_desc("|original - recovered|")
        .draw()?;

    chart
        .draw_series(
            Histogram::vertical(&chart)
                .style(BLUE.filled())
                .margin(10)
                .data(report.elements.iter().enumerate().map(|(i, e)| (i, e.error.abs()))),
        )?
        .label("Round-trip error");

    chart
        .draw_series(LineSeries::new(
            [
                (SegmentValue::Exact(0), report.scale),
                (SegmentValue::Exact(n), report.scale),
            ],
            &RED,
        ))?
        .label("One quantization step")
        .legend(|(x, y)| PathElement::new(vec![(x - 5, y), (x + 5, y)], &RED));

    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
