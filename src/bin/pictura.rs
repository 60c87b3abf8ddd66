//! CLI for Pictura - prompt-to-image generation.

use clap::{Args, Parser, Subcommand};
use pictura::app::sign_in_from_config;
use pictura::{
    App, ChannelNotifier, Config, GeneratedImage, ImageQuality, ImageSize, LocalAuthProvider,
    Notification, NotificationKind, PicturaError, SessionView,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pictura")]
#[command(about = "Generate images from text prompts via a hosted image API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Directory downloads are written to
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one image from a text prompt and download it
    Generate(GenerateArgs),

    /// Interactive session: type prompts, browse and download results
    Studio,

    /// List the accepted sizes and qualities
    Options,
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the image
    prompt: String,

    /// Image size (1024x1024, 1024x1792, 1792x1024)
    #[arg(short, long)]
    size: Option<ImageSize>,

    /// Image quality (auto, low, medium, high)
    #[arg(short, long)]
    quality: Option<ImageQuality>,

    /// Only print the image URL, do not download it
    #[arg(long)]
    no_download: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(dir) = cli.output_dir {
        config.output_dir = Some(dir);
    }

    match cli.command {
        Commands::Generate(args) => generate(&config, args, cli.json).await?,
        Commands::Studio => studio(&config).await?,
        Commands::Options => list_options(cli.json)?,
    }

    Ok(())
}

/// Builds the app and waits for the session to resolve.
async fn start(
    config: &Config,
) -> anyhow::Result<(App, LocalAuthProvider, UnboundedReceiver<Notification>)> {
    let (notifier, notes) = ChannelNotifier::new();
    let (app, auth) = match App::from_config(config, Arc::new(notifier)) {
        Ok(built) => built,
        Err(PicturaError::Auth(_)) => anyhow::bail!(
            "no API key configured. Set PICTURA_API_KEY (or OPENAI_API_KEY), or add api_key to {}",
            Config::config_path().display()
        ),
        Err(e) => return Err(e.into()),
    };
    app.ready().await;

    Ok((app, auth, notes))
}

fn print_notifications(notes: &mut UnboundedReceiver<Notification>) {
    while let Ok(note) = notes.try_recv() {
        let mark = match note.kind {
            NotificationKind::Success => "✓",
            NotificationKind::Error => "✗",
        };
        eprintln!("{mark} {note}");
    }
}

async fn generate(config: &Config, args: GenerateArgs, json_output: bool) -> anyhow::Result<()> {
    let (app, _auth, mut notes) = start(config).await?;

    let size = args.size.unwrap_or(config.size);
    let quality = args.quality.unwrap_or(config.quality);

    let result = app.generate(&args.prompt, size, quality).await;
    print_notifications(&mut notes);
    let image = result?;

    let saved = if args.no_download {
        None
    } else {
        let path = app.download(&image).await;
        print_notifications(&mut notes);
        Some(path?)
    };

    if json_output {
        let result = serde_json::json!({
            "type": "image",
            "success": true,
            "image": image,
            "output": saved.as_ref().map(|p| p.display().to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Generated image {} ({}, {})", image.id, image.size, image.quality);
        match saved {
            Some(path) => println!("Saved to {}", path.display()),
            None => println!("URL: {}", display_url(&image.url)),
        }
    }

    app.shutdown();
    Ok(())
}

const STUDIO_HELP: &str = "\
Type a prompt and press enter to generate. Commands:
  :size <1024x1024|1024x1792|1792x1024>   select size
  :quality <auto|low|medium|high>         select quality
  :list                                   show generated images, newest first
  :download <n>                           save image n from :list
  :clear                                  empty the gallery
  :logout / :login                        end or restore the session
  :help                                   show this help
  :quit                                   exit";

async fn studio(config: &Config) -> anyhow::Result<()> {
    let (app, auth, mut notes) = start(config).await?;
    let controller = app.controller().clone();

    println!("Pictura studio ({}). :help for commands.", controller.provider_name());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let form = controller.form();
        eprint!("[{} {}]> ", form.size, form.quality);

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        if let Some(command) = line.strip_prefix(':') {
            let (name, arg) = command
                .split_once(char::is_whitespace)
                .map(|(n, a)| (n, a.trim()))
                .unwrap_or((command, ""));

            match name {
                "quit" | "q" | "exit" => break,
                "help" | "h" => println!("{STUDIO_HELP}"),
                "size" => match arg.parse::<ImageSize>() {
                    Ok(size) => controller.set_size(size),
                    Err(e) => eprintln!("{e}"),
                },
                "quality" => match arg.parse::<ImageQuality>() {
                    Ok(quality) => controller.set_quality(quality),
                    Err(e) => eprintln!("{e}"),
                },
                "list" | "ls" => print_gallery(&controller.results()),
                "download" | "dl" => {
                    let results = controller.results();
                    match arg.parse::<usize>().ok().and_then(|n| n.checked_sub(1)) {
                        Some(index) if index < results.len() => {
                            if let Ok(path) = app.download(&results[index]).await {
                                println!("Saved to {}", path.display());
                            }
                        }
                        _ => eprintln!("usage: :download <n> (1..={})", results.len()),
                    }
                }
                "clear" => {
                    controller.clear();
                    println!("Gallery cleared.");
                }
                "logout" => {
                    app.logout();
                    println!("Signed out.");
                }
                "login" => {
                    sign_in_from_config(&auth, config);
                    if let SessionView::Ready(user) = app.view() {
                        println!("Signed in as {}.", user.display_name());
                    }
                }
                other => eprintln!("unknown command :{other} (try :help)"),
            }
        } else {
            controller.set_prompt(line);
            if let Ok(image) = app.submit().await {
                println!("#1 {} {}", image.id, display_url(&image.url));
            }
        }

        print_notifications(&mut notes);
    }

    app.shutdown();
    Ok(())
}

fn print_gallery(images: &[GeneratedImage]) {
    if images.is_empty() {
        println!("No images yet.");
        return;
    }
    for (i, image) in images.iter().enumerate() {
        println!(
            "#{:<3} {}  {}  {:<7} {}",
            i + 1,
            image.timestamp.format("%H:%M:%S"),
            image.size,
            image.quality.as_str(),
            image.prompt
        );
    }
}

/// Shortens inline `data:` URLs for display.
fn display_url(url: &str) -> String {
    if url.starts_with("data:") && url.len() > 48 {
        format!("{}... ({} bytes inline)", &url[..32], url.len())
    } else {
        url.to_string()
    }
}

fn list_options(json_output: bool) -> anyhow::Result<()> {
    if json_output {
        let result = serde_json::json!({
            "sizes": ImageSize::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            "qualities": ImageQuality::ALL.iter().map(|q| q.as_str()).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("SIZES:");
        for size in ImageSize::ALL {
            println!("  {} ({})", size, size.label());
        }
        println!("\nQUALITIES:");
        for quality in ImageQuality::ALL {
            println!("  {quality}");
        }
    }
    Ok(())
}
