//! Holopoint demo driver: run the fusion engine against a built-in quad
//! scene, optionally bridged to a live tracker device.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use holopoint::channel::{GestureChannel, PointerChannel};
use holopoint::fusion::{
    EmaStabilizer, FocusChange, FocusObserver, GazeEngine, HeadPose, Steering,
};
use holopoint::link::ChannelConfig;
use holopoint::math::{Quat, Vec3};
use holopoint::prioritize::{LayerMask, LayerPriority, TargetId};
use holopoint::scene::{Quad, QuadScene};

#[derive(Parser, Debug)]
#[command(name = "holopoint", about = "Gaze/pointer fusion demo")]
struct Cli {
    /// IR pointer channel endpoint, e.g. 192.168.0.10:4510
    #[arg(long)]
    tracker: Option<SocketAddr>,

    /// Gesture/button channel endpoint, e.g. 192.168.0.10:4511
    #[arg(long)]
    gesture: Option<SocketAddr>,

    /// Steer the ray from head orientation instead of the IR pointer
    #[arg(long)]
    head_steered: bool,

    /// Number of fusion ticks to run
    #[arg(long, default_value = "300")]
    frames: u32,

    /// Tick rate in Hz
    #[arg(long, default_value = "60")]
    rate: u32,
}

struct FocusLogger;

impl FocusObserver for FocusLogger {
    fn focus_changed(&mut self, change: FocusChange) {
        info!(previous = ?change.previous, new = ?change.new, "focus changed");
    }
}

fn demo_scene() -> QuadScene {
    let mut scene = QuadScene::new();
    // A near panel on the interactable layer and a far backdrop behind it
    scene.add(Quad {
        id: TargetId(1),
        layer: 0,
        center: Vec3::new(0.0, 0.0, 2.5),
        width: 1.0,
        height: 1.0,
    });
    scene.add(Quad {
        id: TargetId(2),
        layer: 1,
        center: Vec3::new(0.0, 0.0, 6.0),
        width: 8.0,
        height: 5.0,
    });
    scene
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "holopoint=info".into()),
        )
        .init();

    info!("holopoint v{} starting", env!("CARGO_PKG_VERSION"));

    let steering = if cli.head_steered {
        Steering::Head
    } else {
        Steering::Device
    };
    // Interactables beat the backdrop regardless of distance
    let priority = LayerPriority::new(vec![LayerMask::single(0), LayerMask::single(1)]);

    let mut engine =
        GazeEngine::new(steering, priority).with_stabilizer(Box::new(EmaStabilizer::new(0.3)));
    engine.subscribe(Box::new(FocusLogger));

    if let Some(endpoint) = cli.tracker {
        let mut channel = PointerChannel::new(ChannelConfig::tracker(endpoint));
        if let Err(err) = channel.connect() {
            info!(%endpoint, %err, "tracker unreachable; running without IR input");
        }
        engine.attach_pointer(channel);
    }
    if let Some(endpoint) = cli.gesture {
        let mut channel = GestureChannel::new(ChannelConfig::gesture(endpoint));
        if let Err(err) = channel.connect() {
            info!(%endpoint, %err, "gesture channel unreachable; running without buttons");
        }
        engine.attach_gesture(channel);
    }

    let scene = demo_scene();
    let head = HeadPose {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };
    let interval = Duration::from_secs_f64(1.0 / cli.rate.max(1) as f64);

    for _ in 0..cli.frames {
        engine.tick(Some(head), &scene, None);
        if engine.sample().click {
            info!(target = ?engine.target().target, "click");
        }
        std::thread::sleep(interval);
    }

    let state = engine.target();
    info!(
        targeting = state.targeting,
        target = ?state.target,
        distance = state.distance,
        "final target state"
    );
    Ok(())
}
