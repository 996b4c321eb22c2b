//! termscreen - demo for the single-session screen manager
//!
//! Opens a session on the current terminal with a title strip at the top
//! and, optionally, a status line at the bottom. Resize the terminal to see
//! the layout follow it.
//!
//! # Quick Start
//!
//! ```text
//! termscreen          # Alternate screen, title strip only
//! termscreen -s       # Add a status line
//! termscreen -p       # Draw over the existing terminal content
//! ```

use std::env;
use std::io::{self, BufWriter, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use termscreen::ui::Renderer;
use termscreen::core::window::AttrFlags;
use termscreen::{
    version_string, Anchor, Config, CrosstermDriver, GridFactory, PlatformDriver, Screen,
    ScreenError, WindowHandle,
};

type DemoScreen = Screen<CrosstermDriver, GridFactory>;

/// Command line options
#[derive(Debug, Default)]
struct Options {
    preserve: bool,
    status: bool,
}

fn print_help() {
    eprintln!("{} - single-session screen manager demo", version_string());
    eprintln!();
    eprintln!("Usage: termscreen [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -p, --preserve        Keep the current terminal content");
    eprintln!("  -s, --status          Reserve the last row for a status line");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keys: q or Esc to quit");
    eprintln!();
    eprintln!("Configuration: ~/.termscreen/config.toml");
    eprintln!("Log file:      ~/.termscreen/termscreen.log");
}

fn parse_args() -> Result<Options, String> {
    let mut options = Options::default();

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                eprintln!("{}", version_string());
                std::process::exit(0);
            }
            "-p" | "--preserve" => options.preserve = true,
            "-s" | "--status" => options.status = true,
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
    }

    Ok(options)
}

/// Log to a file; the terminal belongs to the session
fn init_logging(config: &Config) {
    let Some(log_path) = Config::log_path() else {
        return;
    };
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let options = match parse_args() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    // Command line overrides the config file
    let mut config = Config::load();
    config.preserve_screen |= options.preserve;
    config.status_line |= options.status;

    init_logging(&config);
    info!("{} starting", version_string());

    let mut screen = Screen::new(CrosstermDriver::new(), GridFactory::new());
    screen.apply_config(&config);

    screen.register_reserved_strip(Anchor::Top, |window: &WindowHandle, _: u16| {
        let title = format!(" {} ", version_string());
        window.with_mut(|w| {
            w.erase();
            w.set_attrs(AttrFlags::REVERSE);
            w.put_str(&title);
        });
    })?;
    if config.status_line {
        screen.enable_status_strip(|window: &WindowHandle, _: u16| {
            window.with_mut(|w| w.put_str(" q: quit | resize the terminal to relayout"));
        })?;
    }

    if let Err(e) = screen.open() {
        error!("could not open screen: {}", e);
        eprintln!("termscreen: {}", e);
        return Err(e.into());
    }
    if let Err(e) = screen.driver_mut().set_cursor_mode(config.cursor) {
        warn!("cursor mode not applied: {}", e);
    }

    let result = run_main_loop(&mut screen);

    if let Err(e) = screen.close() {
        error!("close failed: {}", e);
    }
    screen.delete_session();
    info!("termscreen exiting");

    result
}

/// Write a short description of the current geometry into the main window
fn draw_main(screen: &DemoScreen) {
    let (Some(main), Some(geometry)) = (screen.main_window(), screen.geometry()) else {
        return;
    };
    main.with_mut(|w| {
        w.erase();
        w.put_str(&format!(
            "device {}x{}  main {}x{} at row {}",
            geometry.raw_rows, geometry.raw_cols, geometry.rows, geometry.cols, geometry.main_origin_row
        ));
        w.move_cursor(1, 0);
        w.put_str("Press q or Esc to quit.");
    });
}

fn repaint(screen: &DemoScreen, renderer: &mut Renderer) -> io::Result<()> {
    let Some(session) = screen.session() else {
        return Ok(());
    };
    let stdout = io::stdout();
    let mut out = BufWriter::with_capacity(65536, stdout.lock());
    renderer.refresh(&mut out, session)?;
    out.flush()
}

fn run_main_loop(screen: &mut DemoScreen) -> anyhow::Result<()> {
    let poll_timeout = Duration::from_millis(100);
    let mut renderer = Renderer::new();

    draw_main(screen);
    repaint(screen, &mut renderer)?;

    loop {
        if !event::poll(poll_timeout)? {
            continue;
        }

        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    info!("quit requested");
                    break;
                }
                _ => {}
            },
            Event::Resize(cols, rows) => {
                info!(rows, cols, "terminal resized");
                screen.notify_resized();
                match screen.resize(0, 0) {
                    Ok(()) => {
                        draw_main(screen);
                        repaint(screen, &mut renderer)?;
                    }
                    // Keep the old layout until the terminal is large enough again
                    Err(e @ ScreenError::ResizeTooSmall { .. }) => warn!("{}", e),
                    Err(e) if e.is_fatal() => return Err(e.into()),
                    Err(e) => warn!("resize failed: {}", e),
                }
            }
            _ => {}
        }
    }

    Ok(())
}
