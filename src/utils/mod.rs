use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

/// A simple timer based on std::time::Instant, to implement the std::fmt::Display trait on
pub struct Timer {
    time: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Timer {
            time: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.time.elapsed().as_secs_f64()
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:>68} {:>8.2} s",
            "elapsed time:",
            self.time.elapsed().as_secs_f32()
        )
    }
}

/// Wall times of the named phases of one iteration in seconds.
#[derive(Debug, Default, Clone)]
pub struct PhaseTimings {
    phases: BTreeMap<String, f64>,
}

impl PhaseTimings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` and adds its wall time to the phase `name`.
    pub fn measure<T, F>(&mut self, name: &str, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let timer: Timer = Timer::start();
        let value: T = f();
        *self.phases.entry(name.to_owned()).or_insert(0.0) += timer.elapsed_secs();
        value
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.phases.get(name).copied()
    }

    pub fn into_map(self) -> BTreeMap<String, f64> {
        self.phases
    }
}
