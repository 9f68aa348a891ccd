use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vehicle_wire::{
    decode_to_json, decode_to_text, migrate_bytes, sample, DecodeOptions, SchemaVersion, WireError,
    MAX_VARINT_BYTES, VEHICLE_STATE,
};

#[derive(Parser)]
#[command(name = "vwire")]
#[command(about = "Generate, read and migrate vehicle telemetry packets", long_about = None)]
struct Cli {
    /// Log at debug level, overriding RUST_LOG
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Reject varints wider than this many bytes while decoding
    #[arg(long, global = true, default_value_t = MAX_VARINT_BYTES)]
    max_varint_bytes: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the reference VehicleState packet
    Sample {
        /// Schema version to encode against (`v1` or `v2`)
        #[arg(short, long, default_value = "v1")]
        schema: SchemaVersion,

        /// Output packet file
        #[arg(short, long, default_value = "vehicle_state.bin")]
        output: PathBuf,
    },

    /// Decode a packet and print it as IR text
    Read {
        /// Input packet file
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = "v1")]
        schema: SchemaVersion,

        /// Message type stored in the packet
        #[arg(long = "type", default_value = VEHICLE_STATE)]
        type_name: String,
    },

    /// Migrate a packet between schema versions, reporting dropped fields on stderr
    Migrate {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long, default_value = "v1")]
        from: SchemaVersion,

        #[arg(long, default_value = "v2")]
        to: SchemaVersion,

        /// Output packet file (if omitted, only the migrated IR is printed)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long = "type", default_value = VEHICLE_STATE)]
        type_name: String,
    },

    /// Decode a packet and print it as JSON
    Json {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = "v1")]
        schema: SchemaVersion,

        #[arg(long = "type", default_value = VEHICLE_STATE)]
        type_name: String,
    },

    /// Print a registered schema version as JSON
    Schema {
        #[arg(short, long, default_value = "v2")]
        schema: SchemaVersion,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<(), WireError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = DecodeOptions {
        max_varint_bytes: cli.max_varint_bytes,
    };
    let mut stdout = io::stdout().lock();

    match &cli.command {
        Commands::Sample { schema, output } => {
            let bytes = sample::vehicle_state(schema.schema())?.encode(schema.schema())?;
            fs::write(output, &bytes)?;
            info!(path = %output.display(), size = bytes.len(), "wrote sample packet");
            writeln!(stdout, "Wrote {} ({} bytes, schema {})", output.display(), bytes.len(), schema)?;
        }

        Commands::Read { input, schema, type_name } => {
            let data = fs::read(input)?;
            let text = decode_to_text(&data, *schema, type_name, &options)?;
            write!(stdout, "{}", text)?;
            writeln!(stdout, "\nPacket size: {} bytes", data.len())?;
        }

        Commands::Migrate { input, from, to, output, type_name } => {
            let data = fs::read(input)?;
            let migrated = migrate_bytes(&data, *from, *to, type_name, &options)?;

            let mut stderr = io::stderr().lock();
            for dropped in &migrated.migration.dropped {
                writeln!(stderr, "dropped {} ({}.{})", dropped.path, dropped.type_name, dropped.field_name)?;
            }
            for remapped in &migrated.migration.remapped {
                writeln!(
                    stderr,
                    "remapped {}: {} -> {}::{}",
                    remapped.path, remapped.from, remapped.enum_name, remapped.to
                )?;
            }
            for path in &migrated.migration.defaulted {
                writeln!(stderr, "defaulted {}", path)?;
            }

            write!(stdout, "{}", migrated.migration.document)?;
            if let Some(out_path) = output {
                fs::write(out_path, &migrated.bytes)?;
                writeln!(
                    stdout,
                    "\nMigrated {} ({}) -> {} ({}), {} bytes",
                    input.display(),
                    from,
                    out_path.display(),
                    to,
                    migrated.bytes.len()
                )?;
            }
        }

        Commands::Json { input, schema, type_name } => {
            let data = fs::read(input)?;
            writeln!(stdout, "{}", decode_to_json(&data, *schema, type_name, &options)?)?;
        }

        Commands::Schema { schema } => {
            writeln!(stdout, "{}", serde_json::to_string_pretty(schema.schema())?)?;
        }
    }

    stdout.flush()?;
    Ok(())
}
