//! Command-line front end for the Ellipsis client.
//!
//! All tracing output goes to stderr so stdout stays clean for results.

use ellipsis_client::coordinator::SessionCoordinator;
use ellipsis_client::platforms::connect::{ConnectFlow, SystemBrowserOpener};
use ellipsis_client::platforms::verify::PlatformVerifier;
use ellipsis_client::platforms::{ConnectionStore, PlatformCatalog};
use ellipsis_client::stream::EventChannel;
use ellipsis_client::{BackendClient, ClientConfig, UiEvent};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

const USAGE: &str = "\
Usage: ellipsis [--config <path>] <command>

Commands:
  generate <topic...>       generate a podcast for a topic prompt
  trending                  list trending topic suggestions
  connect <platform>        connect a publishing platform
  platforms                 show platform connection status
  publish <audio-url> [notes...]
                            publish a finished narration to Podbean
";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ellipsis_client=info")),
        )
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let config = if args.first().map(String::as_str) == Some("--config") {
        if args.len() < 2 {
            eprintln!("{USAGE}");
            anyhow::bail!("--config requires a path");
        }
        let path = PathBuf::from(args.remove(1));
        args.remove(0);
        ClientConfig::from_file(&path)?
    } else {
        ClientConfig::default()
    };

    let Some(command) = args.first().cloned() else {
        eprintln!("{USAGE}");
        anyhow::bail!("missing command");
    };

    match command.as_str() {
        "generate" => {
            let topic = args[1..].join(" ");
            if topic.trim().is_empty() {
                anyhow::bail!("generate requires a topic prompt");
            }
            run_generate(&config, &topic).await
        }
        "trending" => run_trending(&config).await,
        "connect" => {
            let Some(platform) = args.get(1) else {
                anyhow::bail!("connect requires a platform name");
            };
            run_connect(&config, platform).await
        }
        "platforms" => run_platforms(&config),
        "publish" => {
            let Some(audio_url) = args.get(1) else {
                anyhow::bail!("publish requires an audio URL");
            };
            let notes = args[2..].join(" ");
            run_publish(&config, audio_url, &notes).await
        }
        other => {
            eprintln!("{USAGE}");
            anyhow::bail!("unknown command '{other}'");
        }
    }
}

async fn run_generate(config: &ClientConfig, topic: &str) -> anyhow::Result<()> {
    let client = BackendClient::new(&config.backend)?;
    let mut coordinator = SessionCoordinator::new(client.clone());
    let mut ui_events = coordinator.subscribe();

    // Mount the progress stream before starting the job so no early event
    // is missed. A backend without a live stream is survivable — the job
    // response itself may carry the finished result.
    let mut channel = match EventChannel::open(client.http(), client.origin()).await {
        Ok(channel) => Some(channel),
        Err(e) => {
            tracing::warn!(error = %e, "progress stream unavailable");
            None
        }
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(coordinator.session().header_text());

    if let Err(e) = coordinator.submit(topic).await {
        spinner.finish_and_clear();
        eprintln!("Could not start generation: {e}");
        return Ok(());
    }
    drain_ui_events(&mut ui_events, &spinner);

    loop {
        if coordinator.session().stage().is_terminal() {
            break;
        }

        let Some(ref mut live) = channel else {
            // No stream and no synchronous result: nothing more will arrive.
            spinner.finish_and_clear();
            eprintln!("No progress stream available; giving up on live updates.");
            break;
        };

        tokio::select! {
            event = live.recv() => match event {
                Some(event) => {
                    coordinator.handle_event(&event);
                    drain_ui_events(&mut ui_events, &spinner);
                }
                None => {
                    spinner.println("Progress stream closed.");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                if coordinator.exit_confirmation_required() && !confirm_quit().await {
                    continue;
                }
                coordinator.shutdown();
                spinner.finish_and_clear();
                eprintln!("Interrupted; cancellation signalled.");
                return Ok(());
            }
        }
    }

    spinner.finish_with_message(coordinator.session().header_text());
    print_session(&coordinator);

    if let Some(channel) = channel {
        channel.close().await;
    }
    Ok(())
}

fn drain_ui_events(ui_events: &mut broadcast::Receiver<UiEvent>, spinner: &ProgressBar) {
    while let Ok(event) = ui_events.try_recv() {
        match event {
            UiEvent::StageChanged { header, .. } => spinner.set_message(header),
            UiEvent::PersonaUpdated { slot, .. } => {
                spinner.println(format!("Persona response received: {slot:?}"));
            }
            UiEvent::ScriptUpdated { .. } => spinner.println("Script updated."),
            UiEvent::AudioAvailable { url } => spinner.println(format!("Audio at {url}")),
            _ => {}
        }
    }
}

fn print_session(coordinator: &SessionCoordinator) {
    let session = coordinator.session();
    if let Some(general) = session.responses().general_public.as_deref() {
        println!("\n## General public response\n\n{general}");
    }
    if let Some(critic) = session.responses().critic.as_deref() {
        println!("\n## Critic response\n\n{critic}");
    }
    if let Some(script) = session.script() {
        println!("\n## Script\n\n{script}");
    }
    if let Some(url) = session.audio_url() {
        println!("\nNarration audio: {url}");
    }
}

/// Ask before quitting while a job is in flight (the unload guard).
async fn confirm_quit() -> bool {
    eprint!("A generation job is in flight. Quit anyway? [y/N] ");
    let answer = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        line
    })
    .await
    .unwrap_or_default();
    matches!(answer.trim(), "y" | "Y" | "yes")
}

async fn run_trending(config: &ClientConfig) -> anyhow::Result<()> {
    let client = BackendClient::new(&config.backend)?;
    let topics = client.trending_topics().await?;
    if topics.is_empty() {
        println!("No trending topics right now.");
        return Ok(());
    }
    for topic in topics {
        println!("[{}] {}\n    {}", topic.category, topic.title, topic.description);
    }
    Ok(())
}

async fn run_connect(config: &ClientConfig, platform: &str) -> anyhow::Result<()> {
    let client = BackendClient::new(&config.backend)?;
    let store = ConnectionStore::open(
        &config.storage.state_dir(),
        config.platforms.staleness_secs,
    )?;
    let (events, mut prompts) = broadcast::channel(16);
    let verifier = Arc::new(PlatformVerifier::new(
        client.http().clone(),
        PlatformCatalog::new(config.platform_catalog()),
        Arc::new(Mutex::new(store)),
        events,
    ));

    // Keep connected platforms fresh while the connect flow runs.
    let cancel = CancellationToken::new();
    let reverify = verifier.clone().spawn_reverification(
        Duration::from_secs(config.platforms.reverify_interval_secs),
        cancel.clone(),
    );

    let flow = ConnectFlow::new(
        client,
        verifier,
        Box::new(SystemBrowserOpener),
        config.popup.clone(),
    );

    let connected = flow.connect(platform).await;

    cancel.cancel();
    let _ = reverify.await;

    match connected {
        Ok(true) => println!("{platform} connected."),
        Ok(false) => {
            println!("{platform} is not connected yet.");
            if let Ok(UiEvent::ConnectPromptRequested { .. }) = prompts.try_recv() {
                println!("Complete the sign-in in your browser, then run this again.");
            }
        }
        Err(e) => eprintln!("Connect failed: {e}"),
    }
    Ok(())
}

fn run_platforms(config: &ClientConfig) -> anyhow::Result<()> {
    let store = ConnectionStore::open(
        &config.storage.state_dir(),
        config.platforms.staleness_secs,
    )?;
    let catalog = PlatformCatalog::new(config.platform_catalog());
    for name in catalog.names() {
        let state = if store.is_connected(name) {
            "connected"
        } else if store.status(name).is_some() {
            "needs re-verification"
        } else {
            "not connected"
        };
        println!("{name}: {state}");
    }
    Ok(())
}

async fn run_publish(config: &ClientConfig, audio_url: &str, notes: &str) -> anyhow::Result<()> {
    let client = BackendClient::new(&config.backend)?;
    match client.publish_to_podbean(audio_url, notes).await {
        Ok(receipt) => {
            println!("Published: {receipt}");
            Ok(())
        }
        Err(e) => {
            // Keep the notes text visible for retry.
            eprintln!("Publish failed: {e}\nYour notes were not consumed:\n{notes}");
            Ok(())
        }
    }
}
