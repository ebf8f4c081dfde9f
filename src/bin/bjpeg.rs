//! bjpeg CLI - baseline JPEG encode, decode and inspection utility.

use bjpeg_rs::jpeg_marker_code::JpegMarkerCode;
use bjpeg_rs::jpeg_stream_reader;
use bjpeg_rs::{Bitmap, CpuEngine, JpegDecoder, JpegEncoder, PixelFormat, read_header};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Baseline JPEG codec driving the software transform engine
#[derive(Parser)]
#[command(name = "bjpeg")]
#[command(version)]
#[command(about = "Baseline JPEG encoder, decoder and stream inspector", long_about = None)]
#[command(after_help = "EXAMPLES:
    bjpeg encode -i photo.png -o photo.jpg -q 90
    bjpeg encode -i scan.png -o scan.jpg --gray --restart-interval 4
    bjpeg decode -i photo.jpg -o photo.png
    bjpeg info -i photo.jpg
    bjpeg markers -i photo.jpg

Set RUST_LOG=debug to trace the codec state machines.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode an image file (PNG, BMP, JPEG) to baseline JPEG
    ///
    /// Width and height must be multiples of 16. Color input is written as
    /// YCbCr 4:2:0, grayscale input as a single component.
    #[command(visible_alias = "e")]
    Encode {
        #[arg(short, long, help = "Path to the source image")]
        input: PathBuf,

        #[arg(short, long, help = "Path for the encoded JPEG")]
        output: PathBuf,

        /// Quality level (1-100)
        #[arg(short, long, default_value = "75")]
        quality: i32,

        /// Write a single-component grayscale JPEG
        #[arg(short, long)]
        gray: bool,

        /// MCUs between restart markers (0 disables)
        #[arg(short, long, default_value = "0")]
        restart_interval: u16,
    },

    /// Decode a JPEG to any format the output extension names
    #[command(visible_alias = "d")]
    Decode {
        #[arg(short, long, help = "Path to the JPEG file")]
        input: PathBuf,

        #[arg(short, long, help = "Path for the decoded image (.png, .bmp)")]
        output: PathBuf,
    },

    /// Display the frame, table and scan headers
    #[command(visible_alias = "i")]
    Info {
        #[arg(short, long, help = "Path to the JPEG file")]
        input: PathBuf,
    },

    /// List every marker with its offset
    #[command(visible_alias = "m")]
    Markers {
        #[arg(short, long, help = "Path to the JPEG file")]
        input: PathBuf,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Encode {
            input,
            output,
            quality,
            gray,
            restart_interval,
        } => encode_image(&input, &output, quality, gray, restart_interval),
        Commands::Decode { input, output } => decode_image(&input, &output),
        Commands::Info { input } => show_info(&input),
        Commands::Markers { input } => list_markers(&input),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn encode_image(
    input: &Path,
    output: &Path,
    quality: i32,
    gray: bool,
    restart_interval: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = image::open(input)?;
    let bitmap = if gray {
        Bitmap::from_dynamic_image(&image::DynamicImage::ImageLuma8(image.to_luma8()))
    } else {
        Bitmap::from_dynamic_image(&image::DynamicImage::ImageRgb8(image.to_rgb8()))
    };
    let channels = bitmap.format.channel_count();

    let mut encoder = JpegEncoder::new(
        CpuEngine::new(),
        bitmap.width,
        bitmap.height,
        quality,
        channels,
    )?;
    encoder.set_restart_interval(Some(restart_interval));
    let result = match bitmap.format {
        PixelFormat::Gray8 => encoder.save_gray_jpeg_to_file(output, &bitmap),
        PixelFormat::Bgr24 => encoder.save_color_jpeg_to_file(output, &bitmap),
    };
    encoder.release();
    result?;

    println!(
        "✓ Encoded {}x{} image ({} channel(s), quality {}) to {:?}",
        bitmap.width, bitmap.height, channels, quality, output
    );
    Ok(())
}

fn decode_image(input: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut decoder = JpegDecoder::new(CpuEngine::new());
    let bitmap = decoder.load_jpeg_file(input)?;
    bitmap.to_dynamic_image()?.save(output)?;

    println!(
        "✓ Decoded {}x{} image ({:?}) to {:?}",
        bitmap.width,
        bitmap.height,
        decoder.state(),
        output
    );
    Ok(())
}

fn show_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    let info = read_header(&data)?;

    println!("File: {:?}", input);
    println!("Size: {} bytes", data.len());
    println!();

    match (&info.frame, info.frame_marker) {
        (Some(frame), Some(marker)) => {
            let mode = if info.is_baseline() {
                "Baseline"
            } else {
                "not baseline"
            };
            println!("Frame: SOF{} ({})", marker - 0xC0, mode);
            println!("  Dimensions: {}x{}", frame.width, frame.height);
            println!("  Precision:  {} bits", frame.sample_precision);
            for component in &frame.components {
                println!(
                    "  Component {}: sampling {}x{}, quantization table {}",
                    component.identifier,
                    component.horizontal_sampling(),
                    component.vertical_sampling(),
                    component.quantization_table_selector
                );
            }
        }
        _ => println!("Frame: none before the first scan"),
    }

    println!("Quantization tables: {:02X?}", info.quantization_tables);
    println!("Huffman tables:      {:02X?}", info.huffman_tables);
    match info.restart_interval {
        Some(interval) => println!("Restart interval:    every {} MCUs", interval),
        None => println!("Restart interval:    none"),
    }
    if let Some(scan) = &info.scan {
        let selectors: Vec<u8> = scan.components.iter().map(|c| c.selector).collect();
        println!(
            "First scan: components {:?}, spectral {}..={}, approximation 0x{:02X}",
            selectors, scan.spectral_start, scan.spectral_end, scan.successive_approximation
        );
    }
    Ok(())
}

fn list_markers(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    for (offset, code) in jpeg_stream_reader::list_markers(&data)? {
        match JpegMarkerCode::from_code(code) {
            Some(marker) => println!("{:8}  0xFF{:02X}  {:?}", offset, code, marker),
            None => println!("{:8}  0xFF{:02X}", offset, code),
        }
    }
    Ok(())
}
