#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Restart policies for the search loop.
//!
//! A restart abandons every decision and returns the search to level 0 while keeping all
//! learned nogoods and heuristic state. The search asks its restarter once per learned
//! nogood; the policies differ only in how the number of conflicts between two restarts
//! evolves:
//!
//! - [`Luby`]: `N` times the Luby sequence `1, 1, 2, 1, 1, 2, 4, 1, ...`.
//! - [`Geometric`]: `N, N², N³, ...`.
//! - [`Fixed`]: always `N`.
//! - [`Linear`]: `N, 2N, 3N, ...`.
//! - [`Never`]: no restarts.

use clap::ValueEnum;
use std::fmt::{Debug, Display};

pub trait Restarter: Debug + Clone {
    fn new() -> Self;

    /// Conflicts left until the next restart.
    fn restarts_in(&self) -> usize;

    /// Counts one conflict towards the next restart.
    fn increment_restarts_in(&mut self);

    /// Records a restart and schedules the next one.
    fn restart(&mut self);

    fn num_restarts(&self) -> usize;

    /// Counts one conflict and reports whether the search should restart now.
    fn should_restart(&mut self) -> bool {
        self.increment_restarts_in();
        if self.restarts_in() == 0 {
            self.restart();
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Luby<const N: usize> {
    restarts: usize,
    restarts_in: usize,
    /// 1-based position in the Luby sequence of the current interval.
    index: usize,
}

impl<const N: usize> Luby<N> {
    /// The `i`-th element (1-based) of the Luby sequence.
    #[must_use]
    pub fn luby(i: usize) -> usize {
        let mut i = i;
        loop {
            let mut k = 1_u32;
            while (1_usize << k) - 1 < i {
                k += 1;
            }
            if i == (1_usize << k) - 1 {
                return 1 << (k - 1);
            }
            i -= (1_usize << (k - 1)) - 1;
        }
    }
}

impl<const N: usize> Restarter for Luby<N> {
    fn new() -> Self {
        assert!(N > 0, "Luby unit N must be positive");
        Self {
            restarts: 0,
            restarts_in: N,
            index: 1,
        }
    }

    fn restarts_in(&self) -> usize {
        self.restarts_in
    }

    fn increment_restarts_in(&mut self) {
        self.restarts_in = self.restarts_in.saturating_sub(1);
    }

    fn restart(&mut self) {
        self.restarts += 1;
        self.index += 1;
        self.restarts_in = Self::luby(self.index) * N;
    }

    fn num_restarts(&self) -> usize {
        self.restarts
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometric<const N: usize> {
    restarts: usize,
    restarts_in: usize,
    interval: usize,
}

impl<const N: usize> Restarter for Geometric<N> {
    fn new() -> Self {
        assert!(N > 1, "geometric factor N must be larger than 1");
        Self {
            restarts: 0,
            restarts_in: N,
            interval: N,
        }
    }

    fn restarts_in(&self) -> usize {
        self.restarts_in
    }

    fn increment_restarts_in(&mut self) {
        self.restarts_in = self.restarts_in.saturating_sub(1);
    }

    fn restart(&mut self) {
        self.restarts += 1;
        self.interval = self.interval.saturating_mul(N);
        self.restarts_in = self.interval;
    }

    fn num_restarts(&self) -> usize {
        self.restarts
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixed<const N: usize> {
    restarts: usize,
    restarts_in: usize,
}

impl<const N: usize> Restarter for Fixed<N> {
    fn new() -> Self {
        assert!(N > 0, "fixed interval N must be positive");
        Self {
            restarts: 0,
            restarts_in: N,
        }
    }

    fn restarts_in(&self) -> usize {
        self.restarts_in
    }

    fn increment_restarts_in(&mut self) {
        self.restarts_in = self.restarts_in.saturating_sub(1);
    }

    fn restart(&mut self) {
        self.restarts += 1;
        self.restarts_in = N;
    }

    fn num_restarts(&self) -> usize {
        self.restarts
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Linear<const N: usize> {
    restarts: usize,
    restarts_in: usize,
    interval: usize,
}

impl<const N: usize> Restarter for Linear<N> {
    fn new() -> Self {
        assert!(N > 0, "linear increment N must be positive");
        Self {
            restarts: 0,
            restarts_in: N,
            interval: N,
        }
    }

    fn restarts_in(&self) -> usize {
        self.restarts_in
    }

    fn increment_restarts_in(&mut self) {
        self.restarts_in = self.restarts_in.saturating_sub(1);
    }

    fn restart(&mut self) {
        self.restarts += 1;
        self.interval = self.interval.saturating_add(N);
        self.restarts_in = self.interval;
    }

    fn num_restarts(&self) -> usize {
        self.restarts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Never;

impl Restarter for Never {
    fn new() -> Self {
        Self
    }

    fn restarts_in(&self) -> usize {
        usize::MAX
    }

    fn increment_restarts_in(&mut self) {}

    fn restart(&mut self) {}

    fn num_restarts(&self) -> usize {
        0
    }

    fn should_restart(&mut self) -> bool {
        false
    }
}

/// Runtime choice of restart policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestarterImpls<const N: usize> {
    Luby(Luby<N>),
    Geometric(Geometric<2>),
    Fixed(Fixed<N>),
    Linear(Linear<N>),
    Never(Never),
}

impl<const N: usize> Restarter for RestarterImpls<N> {
    fn new() -> Self {
        Self::Luby(Luby::new())
    }

    fn restarts_in(&self) -> usize {
        match self {
            Self::Luby(r) => r.restarts_in(),
            Self::Geometric(r) => r.restarts_in(),
            Self::Fixed(r) => r.restarts_in(),
            Self::Linear(r) => r.restarts_in(),
            Self::Never(r) => r.restarts_in(),
        }
    }

    fn increment_restarts_in(&mut self) {
        match self {
            Self::Luby(r) => r.increment_restarts_in(),
            Self::Geometric(r) => r.increment_restarts_in(),
            Self::Fixed(r) => r.increment_restarts_in(),
            Self::Linear(r) => r.increment_restarts_in(),
            Self::Never(r) => r.increment_restarts_in(),
        }
    }

    fn restart(&mut self) {
        match self {
            Self::Luby(r) => r.restart(),
            Self::Geometric(r) => r.restart(),
            Self::Fixed(r) => r.restart(),
            Self::Linear(r) => r.restart(),
            Self::Never(r) => r.restart(),
        }
    }

    fn num_restarts(&self) -> usize {
        match self {
            Self::Luby(r) => r.num_restarts(),
            Self::Geometric(r) => r.num_restarts(),
            Self::Fixed(r) => r.num_restarts(),
            Self::Linear(r) => r.num_restarts(),
            Self::Never(r) => r.num_restarts(),
        }
    }

    fn should_restart(&mut self) -> bool {
        match self {
            Self::Luby(r) => r.should_restart(),
            Self::Geometric(r) => r.should_restart(),
            Self::Fixed(r) => r.should_restart(),
            Self::Linear(r) => r.should_restart(),
            Self::Never(r) => r.should_restart(),
        }
    }
}

/// Restart policy selectable from the command line.
#[derive(Debug, Clone, PartialEq, Eq, Copy, Hash, Default, ValueEnum)]
pub enum RestarterType {
    #[default]
    Luby,
    Geometric,
    Fixed,
    Linear,
    Never,
}

impl Display for RestarterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Luby => write!(f, "luby"),
            Self::Geometric => write!(f, "geometric"),
            Self::Fixed => write!(f, "fixed"),
            Self::Linear => write!(f, "linear"),
            Self::Never => write!(f, "never"),
        }
    }
}

impl RestarterType {
    #[must_use]
    pub fn to_impl<const N: usize>(self) -> RestarterImpls<N> {
        match self {
            Self::Luby => RestarterImpls::Luby(Luby::new()),
            Self::Geometric => RestarterImpls::Geometric(Geometric::new()),
            Self::Fixed => RestarterImpls::Fixed(Fixed::new()),
            Self::Linear => RestarterImpls::Linear(Linear::new()),
            Self::Never => RestarterImpls::Never(Never),
        }
    }
}
