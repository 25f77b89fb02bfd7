//! covert-vfs - message transport over a shared directory.
//!
//! Hides messages in the checksums or property sidecars of cover files that
//! two peers can both see.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use covert_vfs::channel::{ChannelAllocator, Deadline, SignalEncoding};
use covert_vfs::codec::Codec;
use covert_vfs::storage::{clear_all_properties, seed_directory, DirectoryMedium, StorageMedium};
use covert_vfs::{ChecksumTransport, PropertyTransport, TransportConfig, TransportProtocol};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "covert-vfs")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Covert message transport over a shared directory",
    long_about = "Moves messages between two peers through cover files in a shared directory, using checksum tuning or property sidecars."
)]
struct Cli {
    /// Transport configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Scheme {
    /// One byte per file, hidden in the content checksum
    Checksum,
    /// Base64 chunks in per-file property sidecars
    Property,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill a directory with cover files
    Seed {
        /// Shared directory
        dir: PathBuf,

        /// Number of cover files to create (default: 260)
        #[arg(long, default_value = "260")]
        count: usize,
    },

    /// Reset the client counter to zero
    Reset {
        /// Shared directory
        dir: PathBuf,
    },

    /// Remove every property sidecar
    Clear {
        /// Shared directory
        dir: PathBuf,
    },

    /// Show the store's client count and partition layout
    Info {
        /// Shared directory
        dir: PathBuf,
    },

    /// Send one message
    Send {
        /// Shared directory
        dir: PathBuf,

        /// Input file to send
        #[arg(long, conflicts_with = "data")]
        input: Option<PathBuf>,

        /// String data to send
        #[arg(long, conflicts_with = "input")]
        data: Option<String>,

        #[command(flatten)]
        link: LinkArgs,
    },

    /// Receive one message
    Recv {
        /// Shared directory
        dir: PathBuf,

        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        link: LinkArgs,
    },
}

#[derive(clap::Args)]
struct LinkArgs {
    /// Encoding scheme (both peers must agree)
    #[arg(long, value_enum, default_value = "checksum")]
    scheme: Scheme,

    /// Wait for the peer to connect instead of connecting
    #[arg(long)]
    listen: bool,

    /// Give up after this many seconds (default: wait forever)
    #[arg(long)]
    timeout: Option<u64>,
}

impl LinkArgs {
    fn deadline(&self) -> Deadline {
        self.timeout
            .map(|secs| Deadline::after(Duration::from_secs(secs)))
            .unwrap_or_default()
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "covert_vfs=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => TransportConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => TransportConfig::default(),
    };

    match cli.command {
        Commands::Seed { dir, count } => cmd_seed(&dir, count),

        Commands::Reset { dir } => cmd_reset(&dir, &config),

        Commands::Clear { dir } => cmd_clear(&dir),

        Commands::Info { dir } => cmd_info(&dir, &config),

        Commands::Send {
            dir,
            input,
            data,
            link,
        } => {
            let content = match (input, data) {
                (Some(path), None) => std::fs::read(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                (None, Some(s)) => s.into_bytes(),
                (None, None) => {
                    // Read from stdin
                    let mut buffer = Vec::new();
                    io::stdin().read_to_end(&mut buffer)?;
                    buffer
                }
                (Some(_), Some(_)) => unreachable!(),
            };

            let medium = open_store(&dir)?;
            match link.scheme {
                Scheme::Checksum => {
                    cmd_send(ChecksumTransport::checksum(medium, config)?, &link, &content)
                }
                Scheme::Property => {
                    cmd_send(PropertyTransport::property(medium, config)?, &link, &content)
                }
            }
        }

        Commands::Recv { dir, output, link } => {
            let medium = open_store(&dir)?;
            let data = match link.scheme {
                Scheme::Checksum => cmd_recv(ChecksumTransport::checksum(medium, config)?, &link)?,
                Scheme::Property => cmd_recv(PropertyTransport::property(medium, config)?, &link)?,
            };

            match output {
                Some(path) => {
                    std::fs::write(&path, &data)?;
                    println!("Wrote {} bytes to {}", data.len(), path.display());
                }
                None => {
                    io::stdout().write_all(&data)?;
                }
            }
            Ok(())
        }
    }
}

fn open_store(dir: &Path) -> anyhow::Result<DirectoryMedium> {
    DirectoryMedium::open(dir).with_context(|| format!("opening store {}", dir.display()))
}

fn establish<C: Codec, E: SignalEncoding>(
    transport: &mut TransportProtocol<DirectoryMedium, C, E>,
    link: &LinkArgs,
) -> anyhow::Result<usize> {
    let position = if link.listen {
        eprintln!("Waiting for connection...");
        transport.wait_for_connection_until(link.deadline())?
    } else {
        transport.connect()?
    };
    eprintln!("Connected on channel {}", position);
    Ok(position)
}

fn cmd_send<C: Codec, E: SignalEncoding>(
    mut transport: TransportProtocol<DirectoryMedium, C, E>,
    link: &LinkArgs,
    content: &[u8],
) -> anyhow::Result<()> {
    establish(&mut transport, link)?;
    transport.write_until(content, link.deadline())?;
    eprintln!("Sent {} bytes", content.len());
    Ok(())
}

fn cmd_recv<C: Codec, E: SignalEncoding>(
    mut transport: TransportProtocol<DirectoryMedium, C, E>,
    link: &LinkArgs,
) -> anyhow::Result<Vec<u8>> {
    establish(&mut transport, link)?;
    Ok(transport.read_until(link.deadline())?)
}

fn cmd_seed(dir: &Path, count: usize) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    let created = seed_directory(dir, count, &mut rand::thread_rng())?;
    println!("Created {} cover files in {}", created.len(), dir.display());
    Ok(())
}

fn cmd_reset(dir: &Path, config: &TransportConfig) -> anyhow::Result<()> {
    let allocator = ChannelAllocator::new(open_store(dir)?, config)?;
    allocator.reset_client_count()?;
    println!("Client count reset ({})", allocator.config_object());
    Ok(())
}

fn cmd_clear(dir: &Path) -> anyhow::Result<()> {
    let cleared = clear_all_properties(&open_store(dir)?)?;
    println!("Cleared properties on {} files", cleared);
    Ok(())
}

fn cmd_info(dir: &Path, config: &TransportConfig) -> anyhow::Result<()> {
    let medium = open_store(dir)?;
    let allocator = ChannelAllocator::new(medium.clone(), config)?;
    let info = allocator.partition_info()?;

    println!("Covert VFS Store");
    println!("================");
    println!("Backend:          {}", medium.name());
    println!("Root:             {}", medium.root_dir().display());
    println!("Counter object:   {}", allocator.config_object());
    println!();
    println!("Partitioning:");
    println!("  Objects:        {}", info.total_objects);
    println!("  Clients:        {}", info.client_count);
    println!("  Partitions:     {}", info.partition_count);
    println!("  Per channel:    {}", info.objects_per_channel);

    if info.objects_per_channel > 0 {
        println!();
        println!("Channels:");
        let objects = medium.list_objects()?;
        for position in 0..info.client_count as usize {
            let Ok(range) = info.slice_range(position) else {
                continue;
            };
            if let Some(sync) = objects.get(range.start) {
                println!("  {:>3}  sync {}  ({} objects)", position, sync, range.len());
            }
        }
    }

    Ok(())
}
