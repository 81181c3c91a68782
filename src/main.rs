use clap::{Parser, Subcommand};
use pwgcrypt::cli::{
    decrypt_file, encrypt_file, refresh_seed_file, show_random, DecryptOptions, EncryptOptions,
    RandomOptions,
};
use pwgcrypt::header::ContainerVersion;
use pwgcrypt::random::CipherKind;
use pwgcrypt::{CryptConfig, Result};
use std::path::PathBuf;
use std::process::ExitCode;

/// Version info from build.rs
const VERSION: &str = env!("PWGCRYPT_VERSION");
const BUILD: &str = env!("PWGCRYPT_BUILD");
const PROFILE: &str = env!("PWGCRYPT_PROFILE");
const GIT_HASH: &str = env!("PWGCRYPT_GIT_HASH");

fn get_version() -> &'static str {
    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();
    VERSION_STRING.get_or_init(|| format!("{} {} build {} ({})", PROFILE, VERSION, BUILD, GIT_HASH))
}

#[derive(Parser)]
#[command(name = "pwgcrypt")]
#[command(author, about = "Password manager text encryption and random generator", long_about = None)]
struct Cli {
    /// Print version
    #[arg(short = 'V', long)]
    version: bool,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Generator cipher (overrides the configuration)
    #[arg(long, global = true, value_parser = parse_cipher)]
    cipher: Option<CipherKind>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a text file into an armored container
    #[command(alias = "e")]
    Encrypt {
        /// Password protecting the container
        #[arg(long, required = true)]
        password: String,

        /// Container version to produce (v0..v3)
        #[arg(long, value_parser = parse_version)]
        format: Option<ContainerVersion>,

        /// Text file to encrypt
        input: PathBuf,

        /// Armored output file
        output: PathBuf,
    },

    /// Decrypt an armored container of any version
    #[command(alias = "d")]
    Decrypt {
        /// Password protecting the container
        #[arg(long, required = true)]
        password: String,

        /// Armored container file
        input: PathBuf,

        /// Plaintext output file
        output: PathBuf,
    },

    /// Print random bytes as hex
    #[command(alias = "r")]
    Random {
        /// Number of bytes
        #[arg(long, short = 'n', default_value = "32")]
        count: usize,
    },

    /// Create or refresh a seed file
    #[command(alias = "s")]
    Seed {
        /// Seed file path
        file: PathBuf,
    },
}

fn parse_cipher(s: &str) -> std::result::Result<CipherKind, String> {
    s.parse().map_err(|e| format!("{}", e))
}

fn parse_version(s: &str) -> std::result::Result<ContainerVersion, String> {
    s.parse().map_err(|e| format!("{}", e))
}

fn run(command: Commands, config: &CryptConfig) -> Result<()> {
    match command {
        Commands::Encrypt {
            password,
            format,
            input,
            output,
        } => {
            let options = EncryptOptions {
                password,
                version: match format {
                    Some(version) => version,
                    None => config.version()?,
                },
            };
            let mut pool = config.open_pool()?;
            let written = encrypt_file(&input, &output, &options, &mut pool)?;
            config.close_pool(&mut pool)?;
            println!("Encrypted to {} ({} bytes)", output.display(), written);
        }

        Commands::Decrypt {
            password,
            input,
            output,
        } => {
            let options = DecryptOptions { password };
            let len = decrypt_file(&input, &output, &options)?;
            println!("Decrypted to {} ({} bytes)", output.display(), len);
        }

        Commands::Random { count } => {
            let options = RandomOptions { count };
            let mut pool = config.open_pool()?;
            print!("{}", show_random(&mut pool, &options)?);
            config.close_pool(&mut pool)?;
        }

        Commands::Seed { file } => {
            let mut pool = config.open_pool()?;
            let refreshed = refresh_seed_file(&mut pool, &file)?;
            if refreshed {
                println!("Refreshed seed file {}", file.display());
            } else {
                println!("Created seed file {}", file.display());
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    if cli.version {
        println!("pwgcrypt {}", get_version());
        return ExitCode::SUCCESS;
    }

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            use clap::CommandFactory;
            let _ = Cli::command().print_help();
            println!();
            return ExitCode::SUCCESS;
        }
    };

    let mut config = match &cli.config {
        Some(path) => match CryptConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => CryptConfig::default(),
    };
    if let Some(cipher) = cli.cipher {
        config.cipher = cipher;
    }

    match run(command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.is_generator_fatal() {
                log::error!("random generator unusable: {:?}", e);
            } else {
                log::debug!("{:?}", e);
            }
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
