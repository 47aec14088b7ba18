//! These need a running display server (an X server on Linux, a desktop session on Windows):
//! `cargo test -p glwindow -- --ignored`

use glwindow::{ContextSettings, GraphicContext, Window, WindowAttributes, WindowSize};
use std::thread;
use std::time::{Duration, Instant};

const STEP: Duration = Duration::from_millis(10);
const PATIENCE: Duration = Duration::from_secs(2);

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Pump events until `done` holds or the window manager had enough time to answer.
fn settle(window: &mut Window, done: impl Fn(&Window) -> bool) -> bool {
    let started = Instant::now();

    loop {
        window.process_events();
        if done(window) {
            return true;
        }
        if started.elapsed() > PATIENCE {
            return false;
        }
        thread::sleep(STEP);
    }
}

#[test]
#[ignore = "requires a display server"]
fn open_window() -> anyhow::Result<()> {
    init();

    let mut window = Window::new((640, 480), "Test")?;
    window.show();

    assert!(settle(&mut window, |w| w.visible()));
    assert_eq!(window.size(), WindowSize::new(640, 480));
    assert_eq!(window.title(), "Test");

    window.hide();
    window.process_events();
    assert!(!window.visible());

    Ok(())
}

#[test]
#[ignore = "requires a display server"]
fn open_several_windows() -> anyhow::Result<()> {
    init();

    let mut windows = (0..5)
        .map(|i| Window::new((320, 240), &format!("Window {i}")))
        .collect::<glwindow::Result<Vec<_>>>()?;

    for window in &mut windows {
        window.show();
        window.process_events();
    }

    for window in &mut windows {
        window.hide();
        window.process_events();
        assert!(!window.visible());
    }

    // Out of creation order, the shared connection must survive until the last one goes.
    windows.swap(0, 3);
    while let Some(window) = windows.pop() {
        drop(window);
    }

    let mut again = Window::new((320, 240), "After")?;
    again.show();
    assert!(settle(&mut again, |w| w.visible()));

    Ok(())
}

#[test]
#[ignore = "requires a display server"]
fn fullscreen_is_idempotent_and_restorable() -> anyhow::Result<()> {
    init();

    let mut window = Window::new((640, 480), "Fullscreen")?;
    window.show();
    settle(&mut window, |w| w.visible());

    let size = window.size();

    window.switch_to_fullscreen();
    assert!(window.fullscreen());

    window.switch_to_fullscreen();
    assert!(window.fullscreen());
    assert!(!window.maximized());

    window.restore();
    assert!(!window.fullscreen());
    assert!(settle(&mut window, |w| w.size() == size));

    Ok(())
}

#[test]
#[ignore = "requires a display server"]
fn fullscreen_from_maximized_restores_normal_geometry() -> anyhow::Result<()> {
    init();

    let mut window = Window::new((640, 480), "Maximized")?;
    window.show();
    settle(&mut window, |w| w.visible());
    let size = window.size();

    window.maximize();
    assert!(settle(&mut window, |w| w.maximized()));
    assert_ne!(window.size(), size);

    window.switch_to_fullscreen();
    assert!(window.fullscreen());
    assert!(!window.maximized());

    // The saved geometry is the normal one, not the maximized work area.
    window.restore();
    assert!(!window.fullscreen());
    assert!(settle(&mut window, |w| !w.fullscreen() && w.size() == size));
    assert!(!window.maximized());

    Ok(())
}

#[test]
#[ignore = "requires a display server"]
fn min_size_wins_over_smaller_requests() -> anyhow::Result<()> {
    init();

    let mut window = Window::new((640, 480), "Limits")?;
    window.show();
    settle(&mut window, |w| w.visible());

    window.set_min_size((200, 150));
    window.set_size((100, 100));

    assert!(settle(&mut window, |w| w.size() != WindowSize::new(640, 480)));
    let size = window.size();
    assert!(size.width >= 200 && size.height >= 150, "{size:?}");
    assert_eq!(window.min_size(), WindowSize::new(200, 150));

    Ok(())
}

#[test]
#[ignore = "requires a display server"]
fn fixed_size_window() -> anyhow::Result<()> {
    init();

    let mut window = Window::with_attributes(WindowAttributes {
        title: "Fixed".to_string(),
        ..Default::default()
    })?;
    window.show();
    settle(&mut window, |w| w.visible());

    window.set_resizable(false);
    window.process_events();
    assert!(!window.resizable());

    window.set_resizable(true);
    assert!(window.resizable());

    Ok(())
}

#[test]
#[ignore = "requires a display server"]
fn context_becomes_current() -> anyhow::Result<()> {
    init();

    let mut window = Window::new((640, 480), "Context test")?;
    window.show();

    let context = window.context();
    assert!(context.valid());

    context.make_current();
    assert!(context.is_current());
    context.swap_buffers();

    Ok(())
}

#[test]
#[ignore = "requires a display server"]
fn versioned_context_falls_back_or_binds() -> anyhow::Result<()> {
    init();

    let mut window = Window::with_attributes(WindowAttributes {
        title: "Versioned".to_string(),
        context: ContextSettings::default().with_version(3, 3),
        ..Default::default()
    })?;
    window.show();

    let context = window.context();
    assert!(context.valid());

    context.make_current();
    assert!(context.is_current());

    Ok(())
}

// Rejected before any native resource is acquired, so no display is needed.
#[test]
fn nul_in_title_is_rejected() {
    init();

    let err = Window::new((640, 480), "bad\0title").err();
    assert_eq!(err.map(|e| e.kind()), Some(glwindow::ResourceKind::Argument));
}
