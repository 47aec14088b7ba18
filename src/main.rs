use anyhow::Context;
use glwindow::{GraphicContext, Window, WindowAttributes};
use log::info;
use std::time::{Duration, Instant};
use std::{env, fs, thread};

const FRAME_TIME: Duration = Duration::from_millis(16);
const TIME_BUDGET: Duration = Duration::from_secs(10);

fn load_attributes() -> anyhow::Result<WindowAttributes> {
    let Some(path) = env::args().nth(1) else {
        return Ok(WindowAttributes {
            title: "Context test".to_string(),
            application_name: "GL Test".to_string(),
            ..Default::default()
        });
    };

    let text = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    toml::from_str(&text).with_context(|| format!("parsing {path}"))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let attributes = load_attributes()?;
    info!("Opening {:?} at {}x{}", attributes.title, attributes.size.width, attributes.size.height);

    let mut window = Window::with_attributes(attributes)?;
    window.show();

    let started = Instant::now();

    // Frames are paced here, `process_events` never waits.
    while window.visible() && !window.close_requested() && started.elapsed() < TIME_BUDGET {
        window.process_events();

        window.context().make_current();
        window.context().swap_buffers();

        thread::sleep(FRAME_TIME);
    }

    info!(
        "Closing after {:?} (close requested: {})",
        started.elapsed(),
        window.close_requested()
    );

    Ok(())
}
