//! A toy machine driven by the cadence scheduler: a vsync pulse, a periodic
//! interrupt timer, an audio sample clock and a background thread poking the
//! "pad" through the remote handle. The CPU loop is simulated by consuming the
//! issued countdown in small blocks.

use cadence::{Config, EventType, Scheduler};
use clap::Parser;
use log::info;

/// cadence scheduler demo
#[derive(Debug, Parser)]
#[command(name = "cadence")]
struct Cli {
    /// Virtual cycles to execute.
    #[arg(short, long, default_value_t = 10_000_000)]
    cycles: u64,
    /// Clock speed factor (enables overclocking).
    #[arg(short, long)]
    factor: Option<f64>,
    /// Ceiling on idle slice length, in raw ticks.
    #[arg(long, default_value_t = cadence::DEFAULT_MAX_SLICE_LENGTH)]
    max_slice_length: i64,
}

// Roughly a 33.5 MHz machine with a 60 Hz display and 44.1 kHz audio.
const VSYNC_INTERVAL: i64 = 560_000;
const TIMER_INTERVAL: i64 = 35_000;
const SAMPLE_INTERVAL: i64 = 760;

struct Events {
    vsync: EventType,
    timer: EventType,
    sample: EventType,
}

struct Machine {
    events: Events,
    frames: u64,
    timer_irqs: u64,
    samples: u64,
    pad_polls: u64,
}

fn vsync(sched: &mut Scheduler<Machine>, machine: &mut Machine, _: u64, lateness: i64) {
    machine.frames += 1;
    // subtracting the lateness keeps the period stable across late slices
    sched.schedule(VSYNC_INTERVAL - lateness, machine.events.vsync, 0);
}

fn timer_irq(sched: &mut Scheduler<Machine>, machine: &mut Machine, _: u64, lateness: i64) {
    machine.timer_irqs += 1;
    sched.schedule(TIMER_INTERVAL - lateness, machine.events.timer, 0);
}

fn sample(sched: &mut Scheduler<Machine>, machine: &mut Machine, _: u64, lateness: i64) {
    machine.samples += 1;
    sched.schedule(SAMPLE_INTERVAL - lateness, machine.events.sample, 0);
}

fn pad_poll(_: &mut Scheduler<Machine>, machine: &mut Machine, _: u64, _: i64) {
    machine.pad_polls += 1;
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let mut sched = Scheduler::with_config(Config {
        max_slice_length: cli.max_slice_length,
    })
    .unwrap();

    let events = Events {
        vsync: sched.register("vsync", vsync).unwrap(),
        timer: sched.register("timer-irq", timer_irq).unwrap(),
        sample: sched.register("audio-sample", sample).unwrap(),
    };
    let pad = sched.register("pad-poll", pad_poll).unwrap();

    if let Some(factor) = cli.factor {
        sched.set_overclock_enabled(true);
        sched.set_factor(factor);
    }

    let mut machine = Machine {
        events,
        frames: 0,
        timer_irqs: 0,
        samples: 0,
        pad_polls: 0,
    };

    sched.schedule(VSYNC_INTERVAL, machine.events.vsync, 0);
    sched.schedule(TIMER_INTERVAL, machine.events.timer, 0);
    sched.schedule(SAMPLE_INTERVAL, machine.events.sample, 0);

    let remote = sched.remote();
    let producer = std::thread::Builder::new()
        .name("pad thread".to_owned())
        .spawn(move || {
            for _ in 0..8 {
                remote.schedule(0, pad, 0);
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        })
        .unwrap();

    // the "CPU loop": consume the issued countdown in small blocks, yielding to
    // the scheduler whenever it runs out
    let mut executed: u64 = 0;
    while executed < cli.cycles {
        let block = sched.downcount().clamp(1, 64);
        sched.consume(block);
        executed += block as u64;

        if sched.downcount() <= 0 {
            sched.advance(&mut machine);
        }
    }

    producer.join().unwrap();
    sched.advance(&mut machine);

    info!("final scheduler state: {sched:?}");
    println!("executed ~{executed} scaled cycles, virtual time {} ticks", sched.now());
    println!(
        "frames: {}, timer irqs: {}, samples: {}, pad polls: {}",
        machine.frames, machine.timer_irqs, machine.samples, machine.pad_polls
    );
}
