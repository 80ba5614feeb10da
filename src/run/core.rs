use super::{
    input::Key,
    rom::Rom,
    vm::{VMEvent, VM},
};

use crate::{
    render::spawn_render_thread,
    util::{Interval, IntervalAccuracy},
};

use anyhow::Result;
use crossterm::{
    event::{
        poll, read, Event, KeyCode as CrosstermKey, KeyEventKind,
        KeyModifiers as CrosstermKeyModifiers,
    },
    style::Stylize,
};
use device_query::DeviceQuery;

use std::{
    collections::{BTreeMap, HashSet},
    fmt::Display,
    sync::{
        mpsc::{channel, Receiver, Sender, TryRecvError},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

pub type VMLock = Arc<Mutex<VM>>;

pub type RunResult = Result<RunAnalytics, String>;
pub type RunControlResult = Result<(), &'static str>;

pub const MIN_EXECUTION_FREQUENCY: u32 = 500;
pub const MAX_EXECUTION_FREQUENCY: u32 = 1000;
pub const DEFAULT_EXECUTION_FREQUENCY: u32 = 700;
pub const EXECUTION_FREQUENCY_STEP: u32 = 100;

pub const GOOD_EXECUTION_FREQUENCY_DIFF: f64 = 1.0;
pub const OKAY_EXECUTION_FREQUENCY_DIFF: f64 = 10.0;

// frequency after pressing the raise (=) or lower (-) hotkey
pub fn adjust_execution_frequency(frequency: u32, raise: bool) -> u32 {
    let frequency = if raise {
        frequency.saturating_add(EXECUTION_FREQUENCY_STEP)
    } else {
        frequency.saturating_sub(EXECUTION_FREQUENCY_STEP)
    };

    frequency.clamp(MIN_EXECUTION_FREQUENCY, MAX_EXECUTION_FREQUENCY)
}

pub fn spawn_run_threads(
    rom: Rom,
    init_hz: u32,
) -> (JoinHandle<Result<()>>, JoinHandle<RunResult>) {
    // runner
    let rom_config = rom.config.clone();
    let mut runner = Runner::spawn(rom, init_hz);

    // render
    let (render_sender, render_thread) = spawn_render_thread(runner.vm(), rom_config.clone());

    // main thread
    let vm_event_sender = runner.vm_event_sender();

    let main_thread = thread::spawn(move || -> RunResult {
        let device_state = device_query::DeviceState::new();
        let mut last_keys = HashSet::new();
        let mut frequency = init_hz;

        runner.resume()?;

        loop {
            // event loop
            let terminal_event_received = poll(Duration::from_millis(15))
                .map_err(|e| format!("Unable to poll for terminal events: {}", e))?;

            if runner.is_finished() {
                return runner.exit();
            }

            if terminal_event_received {
                let event =
                    read().map_err(|e| format!("Unable to read terminal event: {}", e))?;

                match event {
                    Event::Resize(_, _) => {
                        render_sender.send(()).ok();
                    }
                    Event::FocusGained => {
                        vm_event_sender.send(VMEvent::Focus).ok();
                    }
                    Event::FocusLost => {
                        vm_event_sender.send(VMEvent::Unfocus).ok();
                    }
                    Event::Key(key_event) => {
                        // Esc or Crtl+C interrupt handler
                        if key_event.code == CrosstermKey::Esc
                            || key_event.modifiers.contains(CrosstermKeyModifiers::CONTROL)
                                && (key_event.code == CrosstermKey::Char('c')
                                    || key_event.code == CrosstermKey::Char('C'))
                        {
                            // exit virtual machine
                            return runner.exit();
                        }

                        if let KeyEventKind::Repeat | KeyEventKind::Press = key_event.kind {
                            match key_event.code {
                                CrosstermKey::Char(c @ ('-' | '=')) => {
                                    let adjusted = adjust_execution_frequency(frequency, c == '=');
                                    if adjusted != frequency {
                                        frequency = adjusted;
                                        runner.set_execution_frequency(frequency)?;
                                        log::info!("Execution frequency set to {}Hz", frequency);
                                    }
                                }
                                code => {
                                    // kinda expecting a crossterm key event to mean renderer is in focus
                                    if let Ok(key) = Key::try_from(code) {
                                        vm_event_sender.send(VMEvent::FocusingKeyDown(key)).ok();
                                    }
                                }
                            }
                        }
                    }
                    _ => (),
                };
            }

            // execute device query step
            let keys = HashSet::from_iter(
                device_state
                    .get_keys()
                    .into_iter()
                    .filter_map(|keycode| Key::try_from(keycode).ok()),
            );

            for &key in keys.difference(&last_keys) {
                vm_event_sender.send(VMEvent::KeyDown(key)).ok();
            }

            for &key in last_keys.difference(&keys) {
                vm_event_sender.send(VMEvent::KeyUp(key)).ok();
            }

            last_keys = keys;

            // TODO attach event listener to logger instead of polling to update
            if rom_config.logging {
                render_sender.send(()).ok();
            }
        }
    });

    (render_thread, main_thread)
}

fn update_frequency_stats(
    stats: &mut BTreeMap<u32, (Duration, u64)>,
    freq: u32,
    duration: Duration,
    instructions: u64,
) {
    if instructions == 0 {
        return;
    }

    let (total_duration, count) = stats.entry(freq).or_insert((Duration::ZERO, 0));
    *total_duration = total_duration.saturating_add(duration);
    *count += instructions;
}

pub struct Runner {
    vm: VMLock,

    thread_handle: JoinHandle<RunResult>,
    thread_continue_sender: Sender<bool>,
    thread_frequency_sender: Sender<u32>,

    vm_event_sender: Sender<VMEvent>,
}

impl Runner {
    pub fn vm(&self) -> VMLock {
        Arc::clone(&self.vm)
    }

    pub fn vm_event_sender(&self) -> Sender<VMEvent> {
        self.vm_event_sender.clone()
    }

    pub fn resume(&mut self) -> RunControlResult {
        self.send_vm_can_continue(true)
    }

    pub fn is_finished(&self) -> bool {
        self.thread_handle.is_finished()
    }

    pub fn set_execution_frequency(&mut self, frequency: u32) -> RunControlResult {
        self.thread_frequency_sender
            .send(frequency)
            .map_err(|_| "Failed to send execution frequency to vm thread")
    }

    pub fn spawn(rom: Rom, init_hz: u32) -> Self {
        let (vm_event_sender, vm_event_receiver) = channel::<VMEvent>();
        let (thread_continue_sender, thread_continue_receiver) = channel::<bool>();
        let (thread_frequency_sender, thread_frequency_receiver) = channel::<u32>();

        let rom_name = rom.config.name.clone();
        let vm = Arc::new(Mutex::new(VM::new(rom, vm_event_receiver, init_hz)));

        let thread_handle = {
            let vm = Arc::clone(&vm);
            thread::spawn(move || -> RunResult {
                // this thread feeds the vm the time elapsed between steps
                // and steps it at the target execution frequency

                let mut frequency = init_hz;
                let mut frequency_stats: BTreeMap<u32, (Duration, u64)> = BTreeMap::new();

                let mut timer_instant = Instant::now();
                let mut interval = Interval::from_frequency(
                    "runner",
                    frequency,
                    Duration::from_millis(8),
                    IntervalAccuracy::High,
                );

                let mut continuation = RunContinuation {
                    cont: false,
                    recv: thread_continue_receiver,
                };

                let mut runtime_start = Instant::now();
                let mut runtime_duration = Duration::ZERO;
                let mut instructions_executed = 0;
                let mut just_resumed = false;

                loop {
                    if continuation.try_cont() {
                        let mut vm = vm
                            .lock()
                            .map_err(|_| "Failed to lock VM for runner step".to_string())?;

                        if just_resumed {
                            just_resumed = false;
                            vm.clear_events();
                        }

                        if let Some(freq) = thread_frequency_receiver.try_iter().last() {
                            update_frequency_stats(
                                &mut frequency_stats,
                                frequency,
                                runtime_duration.saturating_add(runtime_start.elapsed()),
                                instructions_executed,
                            );
                            runtime_duration = Duration::ZERO;
                            runtime_start = Instant::now();
                            instructions_executed = 0;

                            frequency = freq;
                            interval.set_frequency(freq);
                            vm.execution_frequency = freq;
                            log::debug!(
                                "runner now steps every {} us",
                                interval.interval().as_micros()
                            );
                        }

                        vm.time_step = timer_instant.elapsed().as_secs_f32();
                        timer_instant = Instant::now();

                        let step_result = vm.step();
                        drop(vm);

                        if let Err(e) = step_result {
                            log::error!("{}", e);
                            return Err(e);
                        }

                        instructions_executed += 1;
                        interval.sleep();
                        continue;
                    }

                    runtime_duration = runtime_duration.saturating_add(runtime_start.elapsed());

                    // we yield until either we can continue or we must exit
                    if continuation.can_cont() {
                        just_resumed = true;
                        runtime_start = Instant::now();
                        timer_instant = Instant::now();
                        interval.reset();
                    } else {
                        update_frequency_stats(
                            &mut frequency_stats,
                            frequency,
                            runtime_duration,
                            instructions_executed,
                        );
                        return Ok(RunAnalytics {
                            frequency_stats,
                            rom_name,
                        });
                    }
                }
            })
        };

        Runner {
            vm,
            thread_handle,
            vm_event_sender,
            thread_continue_sender,
            thread_frequency_sender,
        }
    }

    pub fn exit(self) -> RunResult {
        let Runner {
            thread_continue_sender,
            thread_handle,
            ..
        } = self;
        drop(thread_continue_sender); // vm thread should detect sender was dropped (we are the only one) and exit thread if still alive
        thread_handle
            .join()
            .map_err(|_| "Runner panicked before returning a result".to_string())?
    }

    fn send_vm_can_continue(&mut self, can_continue: bool) -> RunControlResult {
        if self.is_finished() {
            return Err("VM has already exited");
        }
        self.thread_continue_sender
            .send(can_continue)
            .map_err(|_| "Unable to send VM continue signal")
    }
}

struct RunContinuation {
    cont: bool,
    recv: Receiver<bool>,
}

impl RunContinuation {
    fn try_cont(&mut self) -> bool {
        loop {
            match self.recv.try_recv() {
                Ok(can) => self.cont = can,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.cont = false;
                    break;
                }
            }
        }

        self.cont
    }

    // blocks until continuing is allowed or the sender is gone ( 30ms resolution )
    fn can_cont(&mut self) -> bool {
        loop {
            match self.recv.try_recv() {
                Ok(can) => self.cont = can,
                Err(TryRecvError::Empty) => {
                    if self.cont {
                        break;
                    }
                    thread::sleep(Duration::from_millis(30));
                }
                Err(TryRecvError::Disconnected) => {
                    self.cont = false;
                    break;
                }
            }
        }

        self.cont
    }
}

#[derive(Debug)]
pub struct RunAnalytics {
    frequency_stats: BTreeMap<u32, (Duration, u64)>,
    rom_name: String,
}

impl RunAnalytics {
    pub fn instructions_executed(&self) -> u64 {
        self.frequency_stats.values().map(|&(_, count)| count).sum()
    }
}

impl Display for RunAnalytics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} \"{}\" runtime",
            "Analyzing".green().bold(),
            self.rom_name
        )?;

        for (&target_ips, &(runtime_duration, instructions_executed)) in self.frequency_stats.iter()
        {
            let ips = instructions_executed as f64 / runtime_duration.as_secs_f64();
            let ips_diff = (ips - target_ips as f64) / target_ips as f64 * 100.0;
            let color_ips_diff = if ips_diff.abs() > OKAY_EXECUTION_FREQUENCY_DIFF {
                Stylize::red
            } else if ips_diff.abs() > GOOD_EXECUTION_FREQUENCY_DIFF {
                Stylize::yellow
            } else {
                Stylize::green
            };

            writeln!(
                f,
                "\n    {} Runner ({:#04}Hz): {:.3}s",
                "|".blue().bold(),
                target_ips,
                runtime_duration.as_secs_f64()
            )?;
            write!(
                f,
                "    {} Runner continuously executed at {:#07.2}Hz",
                "=".blue().bold(),
                if ips.is_finite() { ips } else { 0.0 }
            )?;

            if ips.is_finite() {
                write!(
                    f,
                    " ( {} from {:#04}Hz target )",
                    color_ips_diff(format!(
                        "{}{:.2}%",
                        if ips_diff >= 0.0 { "+" } else { "" },
                        ips_diff
                    ))
                    .bold(),
                    target_ips
                )?;
            }
        }

        Ok(())
    }
}
