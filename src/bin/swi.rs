//! swi CLI - convert images to and from the Summus WI format.

use clap::{Parser, Subcommand, ValueEnum};
use env_logger::{Builder, Env};
use log::LevelFilter;
use std::path::{Path, PathBuf};

use swi_rs::formats::FormatRegistry;
use swi_rs::pipeline::{decode_file, encode_file};
use swi_rs::{
    Codec, CompressionOptions, DecompressionOptions, EncodePath, Encoder, Generation, Swi32,
    SwiError, WaveletCodec,
};

/// Convert image files to and from Summus WI
#[derive(Parser)]
#[command(name = "swi")]
#[command(version)]
#[command(about = "Convert image files to and from the Summus WI format", long_about = None)]
#[command(after_help = "EXAMPLES:
    swi encode --img scan.png
    swi encode --img scan.png --swi out/scan.wi --quality 0.8
    swi decode --swi scan.wi --img restored/scan.bmp
    swi decode --swi old.wi --img old.jpg --legacy

Only 8 bits-per-pixel grayscale and 24 bits-per-pixel RGB images are supported.")]
struct Cli {
    /// Log every engine stage
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress an image file into a WI file
    #[command(visible_alias = "e")]
    Encode {
        /// Image to encode (see `swi formats` for accepted extensions)
        #[arg(long, value_parser = existing_image)]
        img: PathBuf,

        /// Output WI file. Defaults to the image path with a `.wi` extension
        #[arg(long)]
        swi: Option<PathBuf>,

        /// Use the legacy Si* engine generation
        #[arg(long)]
        legacy: bool,

        /// Target quality between 0 and 1. Defaults to 0.50 (0.27 with --legacy)
        #[arg(short, long)]
        quality: Option<f32>,

        #[arg(short, long, value_enum)]
        encoder: Option<EncoderArg>,

        /// Encoder path
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=3))]
        path: Option<u8>,
    },

    /// Decompress a WI file into an image file
    #[command(visible_alias = "d")]
    Decode {
        /// WI file to decode
        #[arg(long, value_parser = existing_wi)]
        swi: PathBuf,

        /// Output image; the extension selects the format
        #[arg(long)]
        img: PathBuf,

        /// Use the legacy Si* engine generation
        #[arg(long)]
        legacy: bool,

        #[arg(long)]
        no_sharpening: bool,

        #[arg(long)]
        smoothing: bool,

        #[arg(long)]
        fast: bool,
    },

    /// List accepted image formats
    #[command(visible_alias = "f")]
    Formats,
}

#[derive(Clone, Copy, ValueEnum)]
enum EncoderArg {
    Slow,
    /// Fast, high quality
    Normal,
    Fast,
    Fastest,
}

impl From<EncoderArg> for Encoder {
    fn from(arg: EncoderArg) -> Self {
        match arg {
            EncoderArg::Slow => Encoder::Slow,
            EncoderArg::Normal => Encoder::Normal,
            EncoderArg::Fast => Encoder::Fast,
            EncoderArg::Fastest => Encoder::Fastest,
        }
    }
}

fn existing_image(value: &str) -> Result<PathBuf, String> {
    existing(value, "Image file does not exist")
}

fn existing_wi(value: &str) -> Result<PathBuf, String> {
    existing(value, "WI file does not exist")
}

fn existing(value: &str, message: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_file() {
        Ok(path)
    } else {
        Err(message.to_owned())
    }
}

fn generation(legacy: bool) -> Generation {
    if legacy {
        Generation::Legacy
    } else {
        Generation::Current
    }
}

fn init_logging(verbose: bool) {
    let mut builder = Builder::from_env(Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.format_timestamp(None);
    let _ = builder.try_init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Built once here and passed down.
    let registry = FormatRegistry::standard();

    let result = match cli.command {
        Commands::Encode {
            img,
            swi,
            legacy,
            quality,
            encoder,
            path,
        } => encode(&registry, &img, swi.as_deref(), legacy, quality, encoder, path),
        Commands::Decode {
            swi,
            img,
            legacy,
            no_sharpening,
            smoothing,
            fast,
        } => {
            let options = DecompressionOptions {
                smoothing,
                fast,
                sharpening: !no_sharpening,
                ..DecompressionOptions::default()
            };
            decode(&registry, &swi, &img, legacy, &options)
        }
        Commands::Formats => {
            list_formats(&registry);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn encode(
    registry: &FormatRegistry,
    img: &Path,
    swi: Option<&Path>,
    legacy: bool,
    quality: Option<f32>,
    encoder: Option<EncoderArg>,
    path: Option<u8>,
) -> Result<(), SwiError> {
    let codec = Codec::new(Swi32, generation(legacy));
    let mut options: CompressionOptions = codec.generation().default_compression();
    if let Some(quality) = quality {
        options = options.with_quality(quality);
    }
    if let Some(encoder) = encoder {
        options = options.with_encoder(encoder.into());
    }
    if let Some(path) = path {
        let encode_path = EncodePath::try_from(i32::from(path) - 1)
            .map_err(|_| SwiError::InvalidOptions("encoder path must be 1, 2 or 3"))?;
        options = options.with_encode_path(encode_path);
    }

    let written = encode_file(&codec, registry, img, swi, &options)?;
    println!("Encoding completed, created file:\n  {}", written.display());
    Ok(())
}

fn decode(
    registry: &FormatRegistry,
    swi: &Path,
    img: &Path,
    legacy: bool,
    options: &DecompressionOptions,
) -> Result<(), SwiError> {
    let codec = Codec::new(Swi32, generation(legacy));
    let written = decode_file(&codec, registry, swi, img, options)?;
    println!("Decoding completed, created file:\n  {}", written.display());
    Ok(())
}

fn list_formats(registry: &FormatRegistry) {
    println!("Supported image formats:\n");
    println!("  {:<6} {}", "Format", "Extensions");
    println!("  {:<6} {}", "------", "----------");
    for profile in registry.profiles() {
        println!("  {:<6} {}", profile.name, profile.extensions.join(", "));
    }
    println!("\nAccepted file extensions:\n{}", registry.extension_list());
    println!("\nEncoded output uses 8-bit grayscale or 24-bit RGB to match the WI image.");
}
