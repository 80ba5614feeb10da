use std::{
    thread,
    time::{Duration, Instant},
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IntervalAccuracy {
    // thread::sleep, fine for rendering
    Default,
    // spin_sleep, needed to hold instruction frequencies in the hundreds of Hz
    High,
}

/*
 * An Interval spaces out the starts of the work done between its sleep calls by a fixed duration
 *
 * The time spent working since the last sleep and the amount the last sleep overshot are both
 * cut from the next sleep so the schedule stays on target
 *
 * A deficit larger than one interval is forgotten rather than paid back over several intervals,
 * otherwise a single long stall would be followed by a burst of back to back iterations
 */
pub struct Interval {
    name: &'static str,

    interval: Duration,

    // longest stretch allowed without an actual sleep, keeps other threads contending for the VM lock from starving
    max_quantum: Duration,

    task_start: Instant,
    oversleep_duration: Duration,
    quantum_duration: Duration,

    accuracy: IntervalAccuracy,
}

impl Interval {
    pub fn new(
        name: &'static str,
        interval: Duration,
        max_quantum: Duration,
        accuracy: IntervalAccuracy,
    ) -> Self {
        Interval {
            name,
            interval,
            max_quantum,
            task_start: Instant::now(),
            oversleep_duration: Duration::ZERO,
            quantum_duration: Duration::ZERO,
            accuracy,
        }
    }

    pub fn from_frequency(
        name: &'static str,
        frequency: u32,
        max_quantum: Duration,
        accuracy: IntervalAccuracy,
    ) -> Self {
        Interval::new(name, period(frequency), max_quantum, accuracy)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_frequency(&mut self, frequency: u32) {
        self.interval = period(frequency);
        log::debug!("{} frequency set to {}Hz", self.name, frequency);
    }

    pub fn reset(&mut self) {
        self.task_start = Instant::now();
        self.oversleep_duration = Duration::ZERO;
        self.quantum_duration = Duration::ZERO;
    }

    pub fn sleep(&mut self) {
        let task_duration = self.task_start.elapsed();
        self.quantum_duration += task_duration;

        let mut sleep_duration = self
            .interval
            .saturating_sub(task_duration)
            .saturating_sub(self.oversleep_duration);

        if sleep_duration.is_zero() && self.quantum_duration < self.max_quantum {
            // behind schedule, run the next iteration immediately
            self.oversleep_duration = Duration::ZERO;
        } else {
            if sleep_duration.is_zero() {
                sleep_duration = Duration::from_nanos(1);
            }

            let now = Instant::now();

            match self.accuracy {
                IntervalAccuracy::High => spin_sleep::sleep(sleep_duration),
                IntervalAccuracy::Default => thread::sleep(sleep_duration),
            }

            self.oversleep_duration = now.elapsed().saturating_sub(sleep_duration);
            self.quantum_duration = Duration::ZERO;
        }

        self.task_start = Instant::now();
    }
}

fn period(frequency: u32) -> Duration {
    Duration::from_secs_f64(1.0 / frequency.max(1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_sets_the_period() {
        let mut interval = Interval::from_frequency(
            "test",
            500,
            Duration::from_millis(8),
            IntervalAccuracy::Default,
        );
        assert_eq!(interval.interval(), Duration::from_millis(2));

        interval.set_frequency(1000);
        assert_eq!(interval.interval(), Duration::from_millis(1));

        interval.set_frequency(0);
        assert_eq!(interval.interval(), Duration::from_secs(1));
    }

    #[test]
    fn sleeps_space_out_iterations() {
        let mut interval = Interval::new(
            "test",
            Duration::from_millis(5),
            Duration::from_millis(8),
            IntervalAccuracy::High,
        );

        let start = Instant::now();
        interval.reset();
        interval.sleep();
        interval.sleep();
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
