//! Command-line tool for GlobalPlatform card management
//!
//! This binary provides a command-line interface for scripted SCP02 sessions:
//! card reset, authentication, DELETE, upload, INSTALL and raw APDUs, plus a
//! few offline crypto helpers.

use std::path::PathBuf;

use cardcheck_apdu_core::Expectation;
use cardcheck_apdu_pcsc::{PcscDeviceManager, PcscTransport};
use cardcheck_globalplatform::{
    GlobalPlatform, HarnessConfig,
    crypto::{MacLength, hexstr},
};
use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reader to use instead of the configured one
    #[arg(short, long)]
    reader: Option<String>,

    /// Warm reset instead of power cycling the card
    #[arg(long)]
    warm: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List detected readers
    ListReaders,

    /// Reset the card and select the card manager
    Card,

    /// Open a secure channel
    Auth,

    /// Delete a package or application
    Delete {
        /// AID to delete (hex)
        aid: String,

        /// Also delete related objects
        #[arg(long)]
        related: bool,
    },

    /// Load a load file into the card manager
    Upload {
        /// Load file AID (hex)
        load_file_aid: String,

        /// File holding the concatenated load file components
        path: PathBuf,
    },

    /// Install and make selectable an application instance
    Install {
        /// Instance AID (hex)
        instance: String,

        /// Package (load file) AID (hex)
        package: String,

        /// Applet (module) AID (hex); defaults to the instance AID
        #[arg(long)]
        applet: Option<String>,

        /// Privileges (hex)
        #[arg(long, default_value = "00")]
        privileges: String,

        /// Application specific install parameters (hex)
        #[arg(long, default_value = "")]
        params: String,
    },

    /// Send a raw APDU after opening a secure channel
    Send {
        /// Command APDU (hex)
        apdu: String,

        /// Expected status word (hex)
        #[arg(long, default_value = "")]
        expect_sw: String,

        /// Expected response data (hex)
        #[arg(long, default_value = "")]
        expect_data: String,
    },

    /// Compute a retail MAC offline
    Mac {
        /// Data (hex)
        data: String,

        /// 16- or 24-byte key (hex)
        key: String,

        /// Initial chaining vector (hex); zero when omitted
        #[arg(long, default_value = "")]
        icv: String,

        /// Keep only the first 4 bytes
        #[arg(long)]
        truncated: bool,
    },

    /// Derive an SCP02 session key offline
    Derive {
        /// Static key (hex)
        key: String,

        /// Sequence counter (hex, 2 bytes)
        sequence_counter: String,

        /// Derivation constant (hex, 2 bytes): 0101, 0102, 0181 or 0182
        constant: String,
    },
}

fn main() -> Result<()> {
    // Initialize the tracing logger with env_format and ansi
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(true)
        .init();

    let cli = Cli::parse();

    let mut config = HarnessConfig::load(cli.config.as_deref()).wrap_err("loading configuration")?;
    if let Some(reader) = cli.reader {
        config.reader.name = Some(reader);
    }
    if cli.warm {
        config.reader.cold_reset = false;
    }

    match cli.command {
        Commands::ListReaders => list_readers(),
        Commands::Mac {
            data,
            key,
            icv,
            truncated,
        } => {
            let length = if truncated {
                MacLength::Truncated
            } else {
                MacLength::Full
            };
            println!("{}", hexstr::mac(&data, &key, &icv, length)?);
            Ok(())
        }
        Commands::Derive {
            key,
            sequence_counter,
            constant,
        } => {
            println!("{}", hexstr::derive(&key, &sequence_counter, &constant)?);
            Ok(())
        }
        Commands::Card => {
            let mut gp = connect(&config)?;
            let fci = gp.card()?;
            println!("{}", hex::encode_upper(fci));
            Ok(())
        }
        Commands::Auth => {
            authenticated(&config)?;
            println!("Secure channel established.");
            Ok(())
        }
        Commands::Delete { aid, related } => {
            let mut gp = authenticated(&config)?;
            gp.delete(&decode("aid", &aid)?, related)?;
            println!("Deleted {aid}.");
            Ok(())
        }
        Commands::Upload {
            load_file_aid,
            path,
        } => {
            let load_file = std::fs::read(&path)
                .wrap_err_with(|| format!("reading load file {}", path.display()))?;
            let mut gp = authenticated(&config)?;
            gp.upload(&decode("load file AID", &load_file_aid)?, &load_file)?;
            println!("Uploaded {} bytes as {load_file_aid}.", load_file.len());
            Ok(())
        }
        Commands::Install {
            instance,
            package,
            applet,
            privileges,
            params,
        } => {
            let instance_aid = decode("instance AID", &instance)?;
            let applet_aid = applet
                .as_deref()
                .map(|applet| decode("applet AID", applet))
                .transpose()?;
            let mut gp = authenticated(&config)?;
            gp.install_for_install(
                &decode("package AID", &package)?,
                applet_aid.as_deref().unwrap_or(&instance_aid),
                &instance_aid,
                &decode("privileges", &privileges)?,
                &decode("params", &params)?,
                &[],
                true,
            )?;
            println!("Installed {instance}.");
            Ok(())
        }
        Commands::Send {
            apdu,
            expect_sw,
            expect_data,
        } => {
            let mut gp = authenticated(&config)?;
            let expect = Expectation::from_hex(&expect_data, &expect_sw)?.name("send");
            let response = gp.send(&decode("apdu", &apdu)?, &expect)?;
            println!("{} {}", response.data_hex(), response.status());
            if let Some(elapsed) = gp.session().exec_time() {
                info!(elapsed_ms = elapsed.as_secs_f64() * 1000.0, "Exchange complete");
            }
            Ok(())
        }
    }
}

fn list_readers() -> Result<()> {
    let manager = PcscDeviceManager::new()?;
    let readers = manager.list_readers()?;
    println!("Available readers:");
    for (i, reader) in readers.iter().enumerate() {
        println!("{}. {}", i + 1, reader);
    }
    Ok(())
}

fn connect(config: &HarnessConfig) -> Result<GlobalPlatform<PcscTransport>> {
    let manager = PcscDeviceManager::new()?;
    let transport = manager.connect(config.connect_strategy(), config.pcsc_config())?;
    info!(reader = %transport.reader_name(), "Using reader");
    Ok(GlobalPlatform::with_config(transport, config)?)
}

fn authenticated(config: &HarnessConfig) -> Result<GlobalPlatform<PcscTransport>> {
    let mut gp = connect(config)?;
    gp.card().wrap_err("selecting the card manager")?;
    gp.auth().wrap_err("opening the secure channel")?;
    Ok(gp)
}

fn decode(field: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value).wrap_err_with(|| format!("{field} is not valid hex"))
}
