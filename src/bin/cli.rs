use anyhow::{bail, Context};
use crabcamera_session::config::CrabSessionConfig;
use crabcamera_session::negotiation::plan_outputs;
use crabcamera_session::permissions::StaticPermission;
use crabcamera_session::session::Attempt;
use crabcamera_session::testing::{
    synthetic_capabilities, CollectingSink, ListenerEvent, RecordingListener, SessionBehavior,
    SyntheticCameraProvider,
};
use crabcamera_session::types::SurfaceId;
use crabcamera_session::view::CameraView;
use std::env;
use std::sync::Arc;
use std::time::Duration;

const PREVIEW_SURFACE: SurfaceId = SurfaceId(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    crabcamera_session::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: crabcamera-session <negotiate|simulate> <config.toml> [options]");
        std::process::exit(1);
    }

    let command = &args[1];
    match command.as_str() {
        "negotiate" => cmd_negotiate(&args),
        "simulate" => cmd_simulate(&args).await,
        _ => {
            eprintln!("Unknown command: {}", command);
            std::process::exit(1);
        }
    }
}

fn load_config(args: &[String], usage: &str) -> anyhow::Result<CrabSessionConfig> {
    let Some(path) = args.get(2).filter(|a| !a.starts_with("--")) else {
        eprintln!("Usage: {}", usage);
        std::process::exit(1);
    };
    CrabSessionConfig::load_layered(path).with_context(|| format!("loading {}", path))
}

fn cmd_negotiate(args: &[String]) -> anyhow::Result<()> {
    let config = load_config(args, "crabcamera-session negotiate <config.toml> [--json]")?;
    let json = args.contains(&"--json".to_string());

    let capabilities = synthetic_capabilities();
    let request = config.camera.stream_request(Some(PREVIEW_SURFACE));
    let plan = plan_outputs(&capabilities, &request, &config.negotiation, Attempt::First)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        for descriptor in &plan.descriptors {
            match descriptor.size() {
                Some(size) => println!(
                    "{}: {} {} repeating={} mirrored={}",
                    descriptor.purpose,
                    size,
                    match descriptor.surface {
                        crabcamera_session::types::SurfaceRef::Image { format, .. } => format.to_string(),
                        crabcamera_session::types::SurfaceRef::Preview(_) => "surface".to_string(),
                    },
                    descriptor.is_repeating,
                    descriptor.is_mirrored
                ),
                None => println!("{}: on-screen surface repeating={}", descriptor.purpose, descriptor.is_repeating),
            }
        }
        if plan.is_empty() {
            println!("No outputs requested");
        }
    }
    Ok(())
}

async fn cmd_simulate(args: &[String]) -> anyhow::Result<()> {
    let mut config = load_config(
        args,
        "crabcamera-session simulate <config.toml> [--reject-combined] [--frames <n>] [--json]",
    )?;

    let mut frames = 10usize;
    let mut reject_combined = false;
    let mut json = false;
    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--frames" => {
                i += 1;
                let Some(value) = args.get(i) else {
                    bail!("--frames needs a value");
                };
                frames = value.parse().context("--frames must be a number")?;
            }
            "--reject-combined" => reject_combined = true,
            "--json" => json = true,
            other => bail!("Unknown option: {}", other),
        }
        i += 1;
    }

    if config.camera.camera_id.is_none() {
        config.camera.camera_id = Some("0".to_string());
    }

    let provider = SyntheticCameraProvider::with_default_camera();
    if reject_combined {
        provider.set_session_behavior("0", SessionBehavior::RejectMixedResolutions);
    }
    let sink = Arc::new(CollectingSink::new());
    let listener = Arc::new(RecordingListener::new());

    let view = CameraView::with_props(
        Arc::new(provider.clone()),
        Arc::new(StaticPermission(true)),
        sink.clone(),
        listener.clone(),
        config.negotiation.clone(),
        config.camera.clone(),
    )?;

    view.preview_surface_created(PREVIEW_SURFACE);
    view.apply_changes(["zoom", "torch", "orientation"]);
    view.wait_idle().await;

    for _ in 0..frames {
        let expected = sink.count() + 1;
        if provider.push_frames(1) == 0 {
            break;
        }
        let sink = sink.clone();
        tokio::task::spawn_blocking(move || sink.wait_for(expected, Duration::from_secs(1))).await?;
    }
    if config.camera.photo == Some(true) {
        provider.capture_photo();
    }
    view.wait_idle().await;

    let status = view.status().await;
    let events: Vec<serde_json::Value> = listener
        .events()
        .into_iter()
        .map(|event| match event {
            ListenerEvent::Initialized => serde_json::json!({ "event": "initialized" }),
            ListenerEvent::Error(e) => serde_json::json!({
                "event": "error",
                "code": e.kind().code(),
                "message": e.to_string(),
            }),
        })
        .collect();

    if json {
        let report = serde_json::json!({
            "events": events,
            "status": status,
            "frames_delivered": sink.count(),
            "frames_dropped": provider.dropped_frames(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for event in &events {
            println!("event: {}", event);
        }
        println!("state: {} after {} build attempt(s)", status.state, status.build_attempts);
        println!("pass: {:?}", status.last_pass);
        for output in &status.outputs {
            println!("output: {} {:?}", output.purpose, output.surface);
        }
        println!("frames delivered: {}, dropped: {}", sink.count(), provider.dropped_frames());
    }

    view.shutdown().await;
    Ok(())
}
