//! Application entry point: a terminal front end for the voice cycle.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] (defaults on first run); the first CLI argument, if
//!    any, selects the voice profile.
//! 3. Open the cpal devices and build the [`VoiceCycleController`].
//! 4. Spawn the stdin reader thread: an empty line (or anything but `q`)
//!    toggles start/stop, `q` quits.
//! 5. Run the presentation loop on a tokio runtime: drain controller events
//!    every `ui.poll_interval_ms` and print them.
//! 6. Terminate the controller (closes the audio device).

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use voice_morph::{
    audio::CpalDevice,
    config::AppConfig,
    pipeline::{event_bridge, Event, EventReceiver, VoiceCycleController},
};

/// Commands read from stdin.
#[derive(Debug, Clone, Copy)]
enum Command {
    Toggle,
    Quit,
}

// ---------------------------------------------------------------------------
// stdin reader
// ---------------------------------------------------------------------------

fn spawn_stdin_reader(tx: mpsc::UnboundedSender<Command>) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let command = match line {
                    Ok(l) if matches!(l.trim(), "q" | "quit") => Command::Quit,
                    Ok(_) => Command::Toggle,
                    Err(e) => {
                        log::warn!("stdin read failed: {e}");
                        Command::Quit
                    }
                };
                if tx.send(command).is_err() || matches!(command, Command::Quit) {
                    return;
                }
            }
            // EOF
            let _ = tx.send(Command::Quit);
        })?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Presentation loop
// ---------------------------------------------------------------------------

async fn run_ui(
    controller: Arc<VoiceCycleController<CpalDevice>>,
    mut events: EventReceiver,
    mut commands: mpsc::UnboundedReceiver<Command>,
    config: AppConfig,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(config.ui.poll_interval_ms.max(1)));
    let mut button = config.ui.start_label.clone();
    println!("Press Enter to {button}, q + Enter to quit.");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for event in events.drain() {
                    render(&event, &mut button);
                }
            }
            command = commands.recv() => match command {
                Some(Command::Toggle) if button == config.ui.start_label => {
                    match controller.start() {
                        Ok(true) => {}
                        Ok(false) => println!("Already processing"),
                        Err(e) => {
                            log::error!("start failed: {e}");
                            println!("Error: {e}");
                        }
                    }
                }
                Some(Command::Toggle) => {
                    controller.stop();
                    button = config.ui.start_label.clone();
                    println!("Stopped");
                }
                Some(Command::Quit) | None => break,
            },
        }
    }

    // Anything the worker emitted before quitting.
    for event in events.drain() {
        render(&event, &mut button);
    }
}

fn render(event: &Event, button: &mut String) {
    match event {
        Event::StatusUpdate { is_talking, text } => {
            let face = if *is_talking { "(o)" } else { "(-)" };
            println!("{face} {text}");
        }
        Event::ButtonUpdate { label } => {
            *button = label.clone();
            println!("    [Enter: {label}]");
        }
        Event::Restart => log::debug!("cycle restarted"),
        Event::StateChanged(state) => log::debug!("state: {}", state.label()),
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice-morph starting up");

    // 2. Configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    if let Some(name) = std::env::args().nth(1) {
        match config.profile(&name) {
            Some(profile) => config.active_profile = profile.name.clone(),
            None => {
                let known: Vec<&str> = config.profiles.iter().map(|p| p.name.as_str()).collect();
                anyhow::bail!("unknown profile '{name}' (available: {})", known.join(", "));
            }
        }
    }
    log::info!("voice profile: {}", config.active_profile().name);

    // 3. Audio device + controller
    let device = CpalDevice::with_devices(
        config.format(),
        config.audio.input_device.as_deref(),
        config.audio.output_device.as_deref(),
    )
    .context("failed to open audio devices")?;
    let (event_tx, event_rx) = event_bridge();
    let controller = Arc::new(VoiceCycleController::from_config(device, &config, event_tx));

    // 4. stdin
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    spawn_stdin_reader(command_tx).context("failed to spawn stdin thread")?;

    // 5. Presentation loop
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;
    rt.block_on(run_ui(Arc::clone(&controller), event_rx, command_rx, config));

    // 6. Shutdown
    controller.terminate();
    log::info!("voice-morph stopped");
    Ok(())
}
