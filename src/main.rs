use std::{
    error::Error,
    io::BufRead,
    path::PathBuf,
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};

use chrono::Utc;
use clap::{Parser, Subcommand};
use roosty_alarm::{
    alarm::{AlarmId, AlarmSound, TimeOfDay},
    clock::ms_to_clock,
    config::{AlarmStore, Config},
    scheduler::AlarmScheduler,
    sound::{self, CueKind, CueSink, NullSink},
    Clock, CueEvent, Message,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// config file to use instead of the one in the config dir
    #[clap(long, short)]
    config: Option<PathBuf>,
    /// alarms file to use instead of the one in the data dir
    #[clap(long, short)]
    alarms: Option<PathBuf>,
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// write the default config
    Init {
        #[clap(long, short)]
        force: bool,
    },
    NewAlarm {
        label: String,
        /// HH:MM
        time: String,
        #[clap(long, short, default_value_t = AlarmSound::Chime)]
        sound: AlarmSound,
        #[clap(long)]
        disabled: bool,
    },
    RemoveAlarm {
        id: AlarmId,
    },
    Enable {
        id: AlarmId,
    },
    Disable {
        id: AlarmId,
    },
    /// show every alarm, soonest first
    List,
    /// play a cue once
    TestSound {
        sound: AlarmSound,
        /// play the away countdown warning instead of the ring
        #[clap(long, short)]
        warning: bool,
        /// play the away countdown end instead of the ring
        #[clap(long, short, conflicts_with = "warning")]
        time_up: bool,
    },
    /// run the clock, reading away/back/stop/snooze/timer on/timer off/quit from stdin
    Run,
}

#[cfg(feature = "audio")]
fn open_sink(config: &Config) -> Box<dyn CueSink> {
    match sound::RodioSink::open(config.volume) {
        Some(sink) => Box::new(sink),
        None => Box::new(NullSink),
    }
}

#[cfg(not(feature = "audio"))]
fn open_sink(_config: &Config) -> Box<dyn CueSink> {
    log::info!("built without audio, cues are only printed");
    Box::new(NullSink)
}

fn print_cue(clock: &Clock, cue: &CueEvent) {
    let now = clock
        .scheduler()
        .clock()
        .local(Utc::now())
        .format(&clock.config().time_format);
    match (cue.kind, &cue.label) {
        (CueKind::Terminal, Some(label)) => println!("[{now}] {label} is ringing ({})", cue.sound),
        (CueKind::Terminal, None) => println!("[{now}] alarm is ringing ({})", cue.sound),
        (CueKind::TimeUp, _) => println!("[{now}] away timer finished"),
        (CueKind::Warning, _) => println!(
            "[{now}] away timer: {}s left",
            cue.seconds_left.unwrap_or_default()
        ),
    }
}

fn list(config: &Config, store: &AlarmStore) {
    let scheduler = AlarmScheduler::with_alarms(config.civil_clock(), store.load());
    let now = Utc::now();
    let queue = scheduler.queue(now);
    if queue.is_empty() {
        println!("no alarms");
        return;
    }
    for (alarm, next) in queue {
        println!(
            "{:>3}  {}  {:<8} {:<20} in {}{}",
            alarm.id,
            alarm.time,
            alarm.sound,
            alarm.label,
            ms_to_clock((next - now).num_milliseconds()),
            if alarm.enabled { "" } else { " (disabled)" }
        );
    }
}

fn test_sound(config: &Config, sound: AlarmSound, kind: CueKind) {
    let sink = open_sink(config);
    let length = sound::tones(kind, sound, Some(1))
        .iter()
        .map(|tone| tone.start + tone.duration)
        .max()
        .unwrap_or_default();
    sound::play(sink.as_ref(), kind, sound, Some(1));
    // the output stream is torn down with the sink
    thread::sleep(length + Duration::from_millis(200));
}

fn run(config: Config, store: AlarmStore) {
    let tick = config.tick_interval();
    let sink = open_sink(&config);
    let mut clock = Clock::new(config, Some(store), sink);

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match Message::from_line(&line) {
                Some(message) => {
                    if tx.send(message).is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => eprintln!("unknown command: {}", line.trim()),
            }
        }
    });

    let mut input_open = true;
    let mut shown_next = None;
    loop {
        if input_open {
            match rx.recv_timeout(tick) {
                Ok(message) => {
                    if !clock.handle(message, Utc::now(), Instant::now()) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    log::info!("control input closed");
                    input_open = false;
                }
            }
        } else {
            thread::sleep(tick);
        }

        let report = clock.tick(Utc::now(), Instant::now());
        for cue in &report.cues {
            print_cue(&clock, cue);
        }
        let next = report
            .next_up
            .as_ref()
            .map(|next| (next.alarm.id, next.next));
        if next != shown_next {
            if let Some(next_up) = &report.next_up {
                println!(
                    "next: {} at {} (in {})",
                    next_up.alarm.label,
                    next_up.alarm.time,
                    ms_to_clock(next_up.until.num_milliseconds())
                );
            }
            shown_next = next;
        }
    }
    log::info!("quitting");
}

fn main() -> Result<(), Box<dyn Error>> {
    if let Err(e) = simple_file_logger::init_logger!("roosty_alarm") {
        eprintln!("couldn't initialize logger: {e:?}");
    }

    let args = Args::parse();
    let config_path = match args.config {
        Some(path) => path,
        None => Config::config_path()?,
    };
    let store = AlarmStore::new(match args.alarms {
        Some(path) => path,
        None => Config::alarms_path()?,
    });

    if let Some(Command::Init { force }) = args.command {
        if Config::init(&config_path, force)? {
            println!("wrote {}", config_path.display());
        } else {
            println!("{} already exists, use --force to overwrite", config_path.display());
        }
        return Ok(());
    }

    let config = Config::load(&config_path)?;
    // one-shot edits go through a silent clock so they are saved like live ones
    let editor = |config: Config, store: AlarmStore| Clock::new(config, Some(store), Box::new(NullSink));
    match args.command.unwrap_or(Command::Run) {
        Command::Init { .. } => {}
        Command::NewAlarm {
            label,
            time,
            sound,
            disabled,
        } => {
            let time = TimeOfDay::parse_hhmm(&time);
            let id = editor(config, store).add_alarm(&label, time, sound, !disabled)?;
            println!("added alarm {id} at {time}");
        }
        Command::RemoveAlarm { id } => {
            let removed = editor(config, store).remove_alarm(id)?;
            println!("removed alarm {id} ({})", removed.label);
        }
        Command::Enable { id } => editor(config, store).set_alarm_enabled(id, true)?,
        Command::Disable { id } => editor(config, store).set_alarm_enabled(id, false)?,
        Command::List => list(&config, &store),
        Command::TestSound {
            sound,
            warning,
            time_up,
        } => {
            let kind = match (warning, time_up) {
                (true, _) => CueKind::Warning,
                (_, true) => CueKind::TimeUp,
                _ => CueKind::Terminal,
            };
            test_sound(&config, sound, kind);
        }
        Command::Run => run(config, store),
    }
    Ok(())
}
