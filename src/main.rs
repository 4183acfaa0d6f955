mod app;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use ratatui::DefaultTerminal;
use std::time::Duration;
use vtmap::config::{Cli, Config};
use vtmap::style::Styler;
use vtmap::tile::TileSource;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli);
    let _log_guard = vtmap::logging::init().context("failed to initialize logging")?;

    let style_bytes = std::fs::read(&config.style_file)
        .with_context(|| format!("failed to read style file {}", config.style_file))?;
    let styler = Styler::from_bytes(style_bytes).context("failed to parse style document")?;

    let source = TileSource::new(&config.source, styler, config.language.clone(), config.cache_size, config.persist_downloaded_tiles)
        .context("failed to initialize tile source")?;

    if config.headless {
        return run_headless(config, source);
    }

    let mut terminal = ratatui::init();
    terminal.clear()?;
    execute!(std::io::stdout(), EnableMouseCapture)?;

    let result = run(&mut terminal, config, source);

    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    result
}

fn run_headless(config: Config, source: TileSource) -> Result<()> {
    let (width, height) = crossterm::terminal::size().unwrap_or((80, 24));
    let mut app = App::new(config, source, width as usize, height as usize);
    match app.draw() {
        Some(frame) => {
            println!("{frame}");
            Ok(())
        }
        None => anyhow::bail!(app.notice.unwrap_or_else(|| "draw failed".to_string())),
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    app.set_mouse_pos(mouse.column, mouse.row);

    match mouse.kind {
        MouseEventKind::ScrollUp => app.zoom_in_at(mouse.column, mouse.row),
        MouseEventKind::ScrollDown => app.zoom_out_at(mouse.column, mouse.row),
        MouseEventKind::ScrollLeft => app.pan(-15, 0),
        MouseEventKind::ScrollRight => app.pan(15, 0),
        MouseEventKind::Down(MouseButton::Left) => app.start_drag(mouse.column, mouse.row),
        MouseEventKind::Drag(MouseButton::Left) => app.handle_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => app.end_drag(),
        _ => {}
    }
}

fn run(terminal: &mut DefaultTerminal, config: Config, source: TileSource) -> Result<()> {
    let size = terminal.size()?;
    let mut app = App::new(config, source, size.width as usize, size.height as usize);

    loop {
        terminal.draw(|frame| ui::render(frame, &mut app))?;

        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Press {
                        match key.code {
                            KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                            KeyCode::Left | KeyCode::Char('h') => app.pan(-10, 0),
                            KeyCode::Right | KeyCode::Char('l') => app.pan(10, 0),
                            KeyCode::Up | KeyCode::Char('k') => app.pan(0, -6),
                            KeyCode::Down | KeyCode::Char('j') => app.pan(0, 6),
                            KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_in(),
                            KeyCode::Char('-') | KeyCode::Char('_') => app.zoom_out(),
                            _ => {}
                        }
                    }
                }
                Event::Mouse(mouse) => handle_mouse(&mut app, mouse),
                Event::Resize(width, height) => app.resize(width as usize, height as usize),
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
