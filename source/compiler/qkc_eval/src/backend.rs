// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.


use rand::{Rng, SeedableRng, rngs::StdRng};
use rustc_hash::FxHashMap;

/// The trait that must be implemented by a quantum backend, whose functions will be invoked when
/// a kernel executes quantum instructions.
pub trait Backend {
    fn h(&mut self, _q: usize) {
        unimplemented!("h gate");
    }
    fn x(&mut self, _q: usize) {
        unimplemented!("x gate");
    }
    fn y(&mut self, _q: usize) {
        unimplemented!("y gate");
    }
    fn z(&mut self, _q: usize) {
        unimplemented!("z gate");
    }
    fn mx(&mut self, _q: usize) -> bool {
        unimplemented!("mx operation");
    }
    fn my(&mut self, _q: usize) -> bool {
        unimplemented!("my operation");
    }
    fn mz(&mut self, _q: usize) -> bool {
        unimplemented!("mz operation");
    }
    fn reset(&mut self, _q: usize) {
        unimplemented!("reset gate");
    }
    fn qubit_allocate(&mut self) -> usize {
        unimplemented!("qubit_allocate operation");
    }
    fn set_seed(&mut self, _seed: Option<u64>) {}
}

/// A backend with predetermined measurement outcomes, keyed by qubit id. Gates have no effect.
/// Every measurement is recorded so callers can check the order in which qubits were measured.
#[derive(Debug, Default)]
pub struct Scripted {
    outcomes: FxHashMap<usize, bool>,
    next_qubit: usize,
    /// Qubit ids in the order they were measured.
    pub measured: Vec<usize>,
}

impl Scripted {
    #[must_use]
    pub fn new(outcomes: impl IntoIterator<Item = (usize, bool)>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
            ..Self::default()
        }
    }

    fn measure(&mut self, q: usize) -> bool {
        self.measured.push(q);
        self.outcomes.get(&q).copied().unwrap_or_default()
    }
}

impl Backend for Scripted {
    fn h(&mut self, _q: usize) {}
    fn x(&mut self, _q: usize) {}
    fn y(&mut self, _q: usize) {}
    fn z(&mut self, _q: usize) {}
    fn mx(&mut self, q: usize) -> bool {
        self.measure(q)
    }
    fn my(&mut self, q: usize) -> bool {
        self.measure(q)
    }
    fn mz(&mut self, q: usize) -> bool {
        self.measure(q)
    }
    fn reset(&mut self, _q: usize) {}
    fn qubit_allocate(&mut self) -> usize {
        let q = self.next_qubit;
        self.next_qubit += 1;
        q
    }
}

/// A backend whose measurements are fair coin flips. Gates have no effect.
pub struct RandomSim {
    rng: StdRng,
    next_qubit: usize,
}

impl Default for RandomSim {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSim {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            next_qubit: 0,
        }
    }

    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            next_qubit: 0,
        }
    }

    fn measure(&mut self) -> bool {
        self.rng.gen_bool(0.5)
    }
}

impl Backend for RandomSim {
    fn h(&mut self, _q: usize) {}
    fn x(&mut self, _q: usize) {}
    fn y(&mut self, _q: usize) {}
    fn z(&mut self, _q: usize) {}
    fn mx(&mut self, _q: usize) -> bool {
        self.measure()
    }
    fn my(&mut self, _q: usize) -> bool {
        self.measure()
    }
    fn mz(&mut self, _q: usize) -> bool {
        self.measure()
    }
    fn reset(&mut self, _q: usize) {}
    fn qubit_allocate(&mut self) -> usize {
        let q = self.next_qubit;
        self.next_qubit += 1;
        q
    }
    fn set_seed(&mut self, seed: Option<u64>) {
        self.rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
    }
}
