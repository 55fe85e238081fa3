use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use narrate_rs::archive::CombinedFormat;
use narrate_rs::engines::command::CommandEngine;
use narrate_rs::narrator::{text_to_speech, ArchiveBound, LineStatus, NarrationRequestBuilder};
use narrate_rs::session::{utf8_locale_override, BackupStore};
use narrate_rs::voices::{ensure_voice, list_voices, Reconciliation};
use narrate_rs::{gpu, NarrateConfig, Preset, Session, UploadedSample};

#[derive(Debug, Parser)]
#[command(name = "narrate")]
#[command(about = "Narrate text line by line with a voice-cloning TTS engine")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    #[arg(long, global = true, help = "JSON config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the local voices directory")]
    voices_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the backup mount point")]
    backup_mount: Option<PathBuf>,
    #[arg(long, global = true, help = "Work with local files only")]
    no_backup: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Report GPU compute capability and core count
    Gpu,
    /// Manage voice reference samples
    Voices {
        #[command(subcommand)]
        command: VoicesCommands,
    },
    /// Synthesize a text and archive the result
    Generate(GenerateArgs),
}

#[derive(Debug, Subcommand)]
enum VoicesCommands {
    /// List available voices
    List,
    /// Make sure a voice has samples, storing FILES when (re)loading
    Load {
        voice: String,
        #[arg(long, help = "Replace existing samples with FILES")]
        reload: bool,
        #[arg(help = "WAV clips, at least two of 6-10 seconds each")]
        files: Vec<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[arg(long, default_value = "marko")]
    voice: String,
    #[arg(long, help = "Label used in the zip and combined file names")]
    section: String,
    #[arg(long, default_value = "fast")]
    preset: Preset,
    #[arg(long, conflicts_with = "text", help = "Read the text from this file")]
    text_file: Option<PathBuf>,
    #[arg(long)]
    text: Option<String>,
    #[arg(long, help = "Prepend the last words of the previous line")]
    append_prev: bool,
    #[arg(long, help = "Append the first words of the next line")]
    append_next: bool,
    #[arg(
        long,
        help = "Also archive the final line's segment, which is left out by default"
    )]
    include_final_segment: bool,
    #[arg(long, value_enum, default_value_t = FormatArg::Mp3)]
    format: FormatArg,
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Mp3,
    Wav,
}

impl From<FormatArg> for CombinedFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Mp3 => CombinedFormat::Mp3,
            FormatArg::Wav => CombinedFormat::Wav,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = load_config(&cli.global)?;

    match cli.command {
        Commands::Gpu => {
            for gpu in gpu::check_gpu() {
                println!("{gpu}");
            }
        }
        Commands::Voices { command } => match command {
            VoicesCommands::List => {
                for voice in list_voices(&config.voices_dir)
                    .with_context(|| format!("listing {}", config.voices_dir.display()))?
                {
                    println!("{voice}");
                }
            }
            VoicesCommands::Load {
                voice,
                reload,
                files,
            } => {
                let uploads = files
                    .iter()
                    .map(|f| UploadedSample::from_file(f).with_context(|| format!("reading {}", f.display())))
                    .collect::<Result<Vec<_>>>()?;
                config.validate()?;
                let backup = BackupStore::from_config(&config);
                let report =
                    ensure_voice(&config.voices_dir, backup.as_ref(), &voice, reload, &uploads)?;

                match report.reconciliation {
                    Some(Reconciliation::LocalToBackup) => println!("Backed up local samples"),
                    Some(Reconciliation::BackupToLocal) => println!("Restored samples from backup"),
                    _ => {}
                }
                for path in &report.stored {
                    println!("stored {}", path.display());
                }
                for (path, error) in &report.failures {
                    eprintln!("failed {}: {error}", path.display());
                }
            }
        },
        Commands::Generate(args) => {
            if let Some(dir) = &args.output_dir {
                config.output_dir = dir.clone();
            }
            let text = match (&args.text_file, &args.text) {
                (Some(path), _) => std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?,
                (None, Some(text)) => text.clone(),
                (None, None) => bail!("one of --text-file or --text is required"),
            };

            gpu::check_gpu();
            let locale = utf8_locale_override();
            let engine = CommandEngine::from_config(&config.engine).with_locale(locale.as_deref());
            let mut session = Session::bootstrap(&config, engine, locale)?;

            let request = NarrationRequestBuilder::default()
                .text(text)
                .section(args.section)
                .voice(args.voice)
                .preset(args.preset)
                .append_prev(args.append_prev)
                .append_next(args.append_next)
                .archive_bound(if args.include_final_segment {
                    ArchiveBound::AllGenerated
                } else {
                    ArchiveBound::LastProcessedExclusive
                })
                .format(CombinedFormat::from(args.format))
                .build()?;

            let output = text_to_speech(&mut session, &request)?;
            for line in &output.lines {
                if let LineStatus::Failed { error } = &line.status {
                    eprintln!("line {} skipped: {error}", line.original_index + 1);
                }
            }
            println!("{}", output.zip_path.display());
            println!("{}", output.combined_path.display());
        }
    }

    Ok(())
}

fn load_config(global: &GlobalArgs) -> Result<NarrateConfig> {
    let mut config = match &global.config {
        Some(path) => NarrateConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => NarrateConfig::default(),
    };
    if let Some(dir) = &global.voices_dir {
        config.voices_dir = dir.clone();
    }
    if let Some(mount) = &global.backup_mount {
        config.backup_mount = Some(mount.clone());
    }
    if global.no_backup {
        config.backup_mount = None;
    }
    Ok(config)
}
