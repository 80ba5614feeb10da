use crate::run::{
    core::{VMLock, MAX_EXECUTION_FREQUENCY, MIN_EXECUTION_FREQUENCY},
    disp::{Display, DisplayWidget},
    rom::RomConfig,
};

use anyhow::{anyhow, Context, Result};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use tui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};
use tui_logger::{TuiLoggerLevelOutput, TuiLoggerWidget};

use std::{
    io::{self, stdout},
    sync::mpsc::{channel, Sender, TryRecvError},
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::util::{Interval, IntervalAccuracy};

pub const TARGET_FRAME_RATE: u32 = 60;

type Terminal = tui::Terminal<CrosstermBackend<io::Stdout>>;

fn cleanup_terminal(terminal: &mut Terminal) -> Result<()> {
    // clean up the terminal so its usable after program exit
    disable_raw_mode().context("Failed to disable terminal raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate terminal screen")?;
    terminal
        .show_cursor()
        .context("Failed to show terminal cursor")?;
    Ok(())
}

pub fn panic_cleanup_terminal() -> Result<()> {
    cleanup_terminal(
        &mut tui::Terminal::new(CrosstermBackend::new(stdout()))
            .context("Failed to create interface to terminal backend")?,
    )
}

fn setup_terminal() -> Result<Terminal> {
    // change terminal to an alternate screen so user doesnt lose terminal history on exit
    // and enable raw mode so we have full authority over event handling and output
    enable_raw_mode().context("Failed to enable terminal raw mode")?;

    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate terminal screen")?;

    tui::Terminal::new(CrosstermBackend::new(stdout))
        .context("Failed to create interface to terminal backend")
}

pub fn spawn_render_thread(vm: VMLock, config: RomConfig) -> (Sender<()>, JoinHandle<Result<()>>) {
    let (render_sender, render_receiver) = channel::<()>();
    let render_thread_handle = thread::spawn(move || -> Result<()> {
        let mut terminal = setup_terminal()?;

        let mut renderer = Renderer {
            config,
            display: Display::default(),
            tone: false,
            execution_frequency: 0,
        };

        let mut interval = Interval::from_frequency(
            "render",
            TARGET_FRAME_RATE,
            Duration::from_millis(16),
            IntervalAccuracy::Default,
        );

        let mut should_redraw = true;

        loop {
            if render_receiver.try_iter().last().is_some() {
                should_redraw = true;
            }

            if let Err(TryRecvError::Disconnected) = render_receiver.try_recv() {
                return cleanup_terminal(&mut terminal);
            }

            if let Err(e) = renderer.step(&mut terminal, should_redraw, &vm) {
                cleanup_terminal(&mut terminal)?;
                return Err(e);
            }
            should_redraw = false;

            interval.sleep();
        }
    });

    (render_sender, render_thread_handle)
}

struct Renderer {
    config: RomConfig,

    // what was last drawn
    display: Display,
    tone: bool,
    execution_frequency: u32,
}

impl Renderer {
    fn step(&mut self, terminal: &mut Terminal, should_redraw: bool, vm: &VMLock) -> Result<()> {
        let mut vm = vm
            .lock()
            .map_err(|_| anyhow!("Failed to lock VM for render step"))?;

        let maybe_display = vm.extract_new_display();
        let tone = vm.sound_active();
        let execution_frequency = vm.execution_frequency;
        drop(vm);

        let should_draw = should_redraw
            || maybe_display.is_some()
            || tone != self.tone
            || execution_frequency != self.execution_frequency;

        if let Some(display) = maybe_display {
            self.display = display;
        }
        self.tone = tone;
        self.execution_frequency = execution_frequency;

        if should_draw {
            terminal.draw(|f| self.render_virtual_machine(f))?;
        }

        Ok(())
    }

    fn render_virtual_machine<B: Backend>(&self, f: &mut Frame<B>) {
        let area = f.size();
        let display_widget = DisplayWidget {
            display: &self.display,
            tone: self.tone,
            rom_name: &self.config.name,
            rom_kind: self.config.kind,
            execution_frequency: self.execution_frequency,
        };

        let [area, bottom_area] = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(area.height.saturating_sub(1)),
                Constraint::Length(1),
            ])
            .split(area)[..] else { unreachable!() };

        let (display_width, display_height) = Display::window_dimensions();
        let [display_column, logger_column, ..] = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(display_width),
                Constraint::Length(area.width.saturating_sub(display_width)),
            ])
            .split(area)[..] else { unreachable!() };

        let [display_row, frequency_row, logger_row] = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(display_height),
                Constraint::Length(1),
                Constraint::Length(area.height.saturating_sub(display_height + 1)),
            ])
            .split(area)[..] else { unreachable!() };

        if self.config.logging {
            f.render_widget(
                logger_widget(Borders::ALL),
                if logger_column.area() >= logger_row.area() {
                    logger_column
                } else {
                    logger_row
                },
            );
        }

        let display_block = Block::default()
            .title(display_widget.title())
            .borders(Borders::ALL);
        let display_area = display_row.intersection(display_column);
        f.render_widget(display_widget, display_block.inner(display_area));
        f.render_widget(display_block, display_area);

        let frequency_area = frequency_row.intersection(display_column);
        f.render_widget(
            Gauge::default()
                .block(Block::default().borders(Borders::LEFT.union(Borders::RIGHT)))
                .gauge_style(
                    Style::default()
                        .fg(Color::White)
                        .bg(Color::Gray)
                        .add_modifier(Modifier::BOLD),
                )
                .label(Span::styled(
                    format!("(DOWN - ) {:4}Hz (UP   = )", self.execution_frequency),
                    Style::default().fg(Color::Black),
                ))
                .percent(frequency_percent(self.execution_frequency)),
            frequency_area,
        );

        let bottom_area_style = Style::default().bg(Color::White).fg(Color::Black);

        f.render_widget(Block::default().style(bottom_area_style), bottom_area);
        f.render_widget(
            Paragraph::new(" Esc or Ctrl+C to exit").style(bottom_area_style),
            bottom_area,
        );
    }
}

// where a frequency sits between the slowest and fastest selectable frequencies
fn frequency_percent(frequency: u32) -> u16 {
    let span = MAX_EXECUTION_FREQUENCY - MIN_EXECUTION_FREQUENCY;
    let offset = frequency.clamp(MIN_EXECUTION_FREQUENCY, MAX_EXECUTION_FREQUENCY)
        - MIN_EXECUTION_FREQUENCY;
    (offset * 100 / span) as u16
}

pub fn logger_widget(borders: Borders) -> TuiLoggerWidget<'static> {
    TuiLoggerWidget::default()
        .block(
            Block::default()
                .title(" Log ")
                .border_style(Style::default().fg(Color::White))
                .borders(borders),
        )
        .output_separator('|')
        .output_timestamp(Some("%H:%M:%S%.3f".to_string()))
        .output_level(Some(TuiLoggerLevelOutput::Abbreviated))
        .output_target(false)
        .output_file(false)
        .output_line(false)
        .style_error(Style::default().fg(Color::Red))
        .style_debug(Style::default().fg(Color::Cyan))
        .style_warn(Style::default().fg(Color::Yellow))
        .style_trace(Style::default().fg(Color::White))
        .style_info(Style::default().fg(Color::Green))
}
