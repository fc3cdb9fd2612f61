//! Monkeypox Lesion Screening CLI
//!
//! Front end over the screening library: classify images, drive the
//! feedback workflow, inspect the collection and train new weights.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing::info;

use mpox_screen::backend::{self, ComputeDevice, TrainingBackend};
use mpox_screen::collection::FilenameTemplate;
use mpox_screen::config::AppConfig;
use mpox_screen::dataset::Label;
use mpox_screen::inference::{ImageSource, InferenceService, PredictionResult, ServiceStatus};
use mpox_screen::training::{run_training, TrainingConfig, TrainingOverrides};
use mpox_screen::utils::format_probability_bar;
use mpox_screen::utils::logging::{init_logging, LogConfig};
use mpox_screen::workflow::{
    guidance, Confirmation, FeedbackSession, NavAction, Page, SaveOutcome, StatsReport,
    DISCLAIMER,
};

/// Monkeypox skin-lesion screening
///
/// Classifies lesion photos with a ResNet-18 and collects confirmed images
/// for retraining.
#[derive(Parser, Debug)]
#[command(name = "mpox")]
#[command(version)]
#[command(about = "Monkeypox skin-lesion screening with Burn", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, default_value = "false", conflicts_with = "verbose")]
    quiet: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a single image
    Classify {
        /// Path to the image
        #[arg(short, long)]
        image: PathBuf,

        /// Override the weight file from the configuration
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Print the prediction as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Classify an image, record feedback and optionally save it
    Review {
        /// Path to the image
        #[arg(short, long)]
        image: PathBuf,

        /// Is the prediction correct?
        #[arg(short, long, value_enum)]
        answer: Answer,

        /// True label when the prediction is wrong
        #[arg(short, long)]
        label: Option<Label>,

        /// Save the image into the collection
        #[arg(long, default_value = "false")]
        save: bool,

        /// Name the file with the mobile prefix
        #[arg(long, default_value = "false")]
        mobile: bool,
    },

    /// Interactive menu: analyze, collections, about
    Menu,

    /// Show collection counts per label
    Stats,

    /// List saved collection images
    Collections {
        /// Only list this label
        #[arg(short, long)]
        label: Option<Label>,
    },

    /// Train ResNet-18 on an image folder
    ///
    /// Flags override values from `--training-config`, which override the
    /// defaults.
    Train {
        /// JSON training configuration
        #[arg(long)]
        training_config: Option<PathBuf>,

        /// Image folder with one sub-directory per label [default: data/train]
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Held-out image folder scored with the best model
        #[arg(long)]
        test_dir: Option<PathBuf>,

        /// Output directory for the best checkpoint [default: models]
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Number of training epochs [default: 100]
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Batch size for training [default: 16]
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Learning rate [default: 0.0001]
        #[arg(short, long)]
        learning_rate: Option<f64>,

        /// Epochs without validation improvement before stopping [default: 25]
        #[arg(long)]
        patience: Option<usize>,

        /// Random seed for the split and shuffling [default: 42]
        #[arg(long)]
        seed: Option<u64>,

        /// Fine-tune from this weight file instead of random initialisation
        #[arg(long)]
        pretrained: Option<PathBuf>,
    },

    /// Show the compute devices available in this build
    Devices,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Answer {
    Yes,
    No,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_or_default(cli.config.as_deref())?;

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else if cli.quiet {
        LogConfig::quiet()
    } else {
        LogConfig::with_level(config.log_level())
    };
    let _ = init_logging(&log_config);

    match cli.command {
        Commands::Classify { image, model, json } => cmd_classify(&config, &image, model, json)?,
        Commands::Review {
            image,
            answer,
            label,
            save,
            mobile,
        } => cmd_review(&config, &image, answer, label, save, mobile)?,
        Commands::Menu => cmd_menu(&config)?,
        Commands::Stats => cmd_stats(&config)?,
        Commands::Collections { label } => cmd_collections(&config, label)?,
        Commands::Train {
            training_config,
            data_dir,
            test_dir,
            output_dir,
            epochs,
            batch_size,
            learning_rate,
            patience,
            seed,
            pretrained,
        } => {
            let base = match training_config {
                Some(path) => TrainingConfig::load(&path)?,
                None => TrainingConfig {
                    image_size: config.image_size,
                    ..Default::default()
                },
            };
            let training = base.with_overrides(TrainingOverrides {
                data_dir,
                test_dir,
                output_dir,
                epochs,
                batch_size,
                learning_rate,
                patience,
                seed,
                pretrained_path: pretrained,
                ..Default::default()
            });
            cmd_train(&training)?;
        }
        Commands::Devices => cmd_devices(&config),
    }

    Ok(())
}

fn start_service(config: &AppConfig) -> Result<InferenceService> {
    let service = InferenceService::start(config.predictor_config(), &config.model_path);
    if let ServiceStatus::Unavailable { reason } = service.status() {
        bail!("model unavailable: {}", reason);
    }
    Ok(service)
}

fn cmd_classify(config: &AppConfig, image: &Path, model: Option<PathBuf>, json: bool) -> Result<()> {
    let mut config = config.clone();
    if let Some(model) = model {
        config.model_path = model;
    }

    let service = start_service(&config)?;
    let prediction = service.classify(ImageSource::Path(image.to_path_buf()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
    } else {
        print_prediction(&prediction);
    }
    Ok(())
}

fn cmd_review(
    config: &AppConfig,
    image: &Path,
    answer: Answer,
    label: Option<Label>,
    save: bool,
    mobile: bool,
) -> Result<()> {
    let service = start_service(config)?;
    let mut session = FeedbackSession::new();
    let prediction = session.submit(&service, ImageSource::Path(image.to_path_buf()))?;
    print_prediction(&prediction);

    match answer {
        Answer::Yes => session.answer(Confirmation::Correct)?,
        Answer::No => session.answer(Confirmation::Incorrect { corrected: label })?,
    }

    match session.final_label() {
        Some(final_label) => println!("Final label: {}", final_label.to_string().bold()),
        None => {
            println!(
                "{} choose the correct label with --label to save this image",
                "Note:".yellow()
            );
            return Ok(());
        }
    }

    if save {
        let store = if mobile {
            mpox_screen::CollectionStore::new(
                &config.collections_root,
                FilenameTemplate::mobile().with_confidence(config.include_confidence_in_filename),
            )
        } else {
            config.collection_store()
        };
        let outcome = session.save(&store)?;
        print_save_outcome(&outcome);
    }

    Ok(())
}

fn cmd_stats(config: &AppConfig) -> Result<()> {
    let stats = config.collection_store().stats()?;
    println!("{}", "Collection Statistics".cyan().bold());
    for label in Label::ALL {
        println!("  {:12} {:>6}", label.name(), stats.count(label));
    }
    println!("  {:12} {:>6}", "Total", stats.total());
    Ok(())
}

fn cmd_collections(config: &AppConfig, label: Option<Label>) -> Result<()> {
    let store = config.collection_store();
    let labels: Vec<Label> = match label {
        Some(label) => vec![label],
        None => Label::ALL.to_vec(),
    };

    for label in labels {
        let entries = store.entries(label)?;
        println!(
            "{} ({} images) in {:?}",
            label.name().cyan().bold(),
            entries.len(),
            store.label_dir(label)
        );
        for entry in entries {
            let name = entry.file_name().map(|n| n.to_string_lossy().to_string());
            println!("  {}", name.unwrap_or_default());
        }
    }
    Ok(())
}

fn cmd_train(config: &TrainingConfig) -> Result<()> {
    println!("{}", "Initializing Training...".green().bold());
    println!("  Backend: {}", backend::backend_name());
    if let Some(path) = &config.pretrained_path {
        println!("  Starting from: {:?}", path);
    }

    let summary = run_training::<TrainingBackend>(config)?;

    println!();
    println!("{}", "Training Complete!".green().bold());
    println!("  Epochs run:           {}", summary.epochs_run);
    println!("  Best epoch:           {}", summary.best_epoch);
    println!("  Best val loss:        {:.4}", summary.best_val_loss);
    println!("  Best val accuracy:    {:.2}%", summary.best_val_accuracy);
    if summary.stopped_early {
        println!("  {}", "Stopped early (patience exhausted)".yellow());
    }
    if let Some(acc) = summary.test_accuracy {
        println!("  Test accuracy:        {:.2}%", acc);
    }
    println!("  Model saved to:       {:?}", summary.model_path);
    Ok(())
}

fn cmd_devices(config: &AppConfig) {
    println!("{}", "Compute devices (preference order)".cyan().bold());
    for device in ComputeDevice::PREFERENCE_ORDER {
        let status = if device.is_compiled_in() {
            "available".green()
        } else {
            "not built".dimmed()
        };
        println!("  {:16} {}", device.backend_name(), status);
    }

    let selected = config.device.resolve();
    println!();
    println!("Configured preference: {}", config.device);
    println!("Selected device:       {}", selected.to_string().bold());
}

fn cmd_menu(config: &AppConfig) -> Result<()> {
    let service = InferenceService::start(config.predictor_config(), &config.model_path);
    let store = config.collection_store();
    let mut session = FeedbackSession::new();
    let mut page = Page::default();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        println!();
        println!("{}", page.title().cyan().bold());

        match page {
            Page::MainMenu => println!("{}", DISCLAIMER.yellow()),
            Page::Analyze => run_analyze_page(&service, &store, &mut session, &mut lines)?,
            Page::Collections => match store.stats() {
                Ok(stats) => println!("{}", stats),
                Err(e) => println!("{} {}", "Could not load collection stats:".yellow(), e),
            },
            Page::About => {
                println!("ResNet-18 screening for monkeypox skin lesions (v{}).", mpox_screen::VERSION);
                println!("{}", DISCLAIMER);
            }
        }

        let actions = page.actions();
        for (i, action) in actions.iter().enumerate() {
            println!("  [{}] {}", i + 1, action_label(*action));
        }
        println!("  [q] Quit");

        let Some(choice) = prompt(&mut lines, "> ")? else {
            break;
        };
        if choice.eq_ignore_ascii_case("q") {
            break;
        }
        match choice.parse::<usize>().ok().and_then(|n| actions.get(n.wrapping_sub(1))) {
            Some(&action) => page = page.transition(action),
            None => println!("{}", "Unknown choice".red()),
        }
    }

    info!("Leaving interactive menu");
    Ok(())
}

fn run_analyze_page<I>(
    service: &InferenceService,
    store: &mpox_screen::CollectionStore,
    session: &mut FeedbackSession,
    lines: &mut I,
) -> Result<()>
where
    I: Iterator<Item = io::Result<String>>,
{
    if !service.is_available() {
        println!("{}", "Failed to load the classification model.".red());
        return Ok(());
    }

    let Some(path) = prompt(lines, "Image path (empty to skip): ")? else {
        return Ok(());
    };
    if path.is_empty() {
        return Ok(());
    }

    let prediction = match session.submit(service, ImageSource::Path(PathBuf::from(&path))) {
        Ok(prediction) => prediction,
        Err(e) => {
            println!("{} {}", "Error during prediction:".red(), e);
            return Ok(());
        }
    };
    print_prediction(&prediction);

    let answer = prompt(lines, "Is this prediction correct? [y/n/skip]: ")?.unwrap_or_default();
    match answer.to_lowercase().as_str() {
        "y" | "yes" => session.answer(Confirmation::Correct)?,
        "n" | "no" => {
            session.answer(Confirmation::Incorrect { corrected: None })?;
            let label = prompt(lines, "Correct label [Monkey Pox/Others]: ")?.unwrap_or_default();
            match label.parse::<Label>() {
                Ok(label) => session.choose_label(label)?,
                Err(e) => println!("{} {}", "Note:".yellow(), e),
            }
        }
        _ => return Ok(()),
    }

    if !session.can_save() {
        return Ok(());
    }
    let save = prompt(lines, "Save image to collection? [y/n]: ")?.unwrap_or_default();
    if save.eq_ignore_ascii_case("y") {
        match session.save(store) {
            Ok(outcome) => print_save_outcome(&outcome),
            Err(e) => println!("{} {}", "Error saving image:".red(), e),
        }
    }
    Ok(())
}

fn prompt<I>(lines: &mut I, message: &str) -> Result<Option<String>>
where
    I: Iterator<Item = io::Result<String>>,
{
    print!("{}", message);
    io::stdout().flush().context("flushing stdout")?;
    match lines.next() {
        Some(line) => Ok(Some(line?.trim().to_string())),
        None => Ok(None),
    }
}

fn action_label(action: NavAction) -> &'static str {
    match action {
        NavAction::OpenAnalyze => "Analyze an image",
        NavAction::OpenCollections => "View collections",
        NavAction::OpenAbout => "About",
        NavAction::BackHome => "Back to home",
    }
}

fn print_prediction(prediction: &PredictionResult) {
    let headline = format!("Predicted: {}", prediction.predicted_class);
    match prediction.predicted_class {
        Label::MonkeyPox => println!("{}", headline.red().bold()),
        Label::Others => println!("{}", headline.green().bold()),
    }

    let advice = guidance(prediction);
    println!(
        "Confidence: {:.2}% ({})",
        prediction.confidence_percent(),
        advice.level
    );
    for (label, prob) in &prediction.probabilities {
        println!("  {:12} {}", label.name(), format_probability_bar(*prob, 20));
    }

    println!();
    println!("{}", advice.headline.bold());
    for line in advice.advice {
        println!("  - {}", line);
    }
    println!("{}", DISCLAIMER.dimmed());
}

fn print_save_outcome(outcome: &SaveOutcome) {
    println!("{} {:?}", "Image saved to".green(), outcome.path);
    match &outcome.stats {
        StatsReport::Available(stats) => {
            for label in Label::ALL {
                println!("  {:12} {:>6}", label.name(), stats.count(label));
            }
            println!("  {:12} {:>6}", "Total", stats.total());
        }
        StatsReport::Unavailable(reason) => {
            println!("{} {}", "Collection stats unavailable:".yellow(), reason)
        }
    }
}
