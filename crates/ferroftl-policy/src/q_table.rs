//! Tabular Q-learning core: discrete state/action table with ε-greedy
//! selection and the standard one-step update rule.
//!
//! Rows are created lazily on first reference (zero-initialized) and never
//! removed. Exploration decays two ways: a hard cliff to the floor after
//! 1000 selections, and a multiplicative decay applied by the scheduler on
//! pending-update resolution. Once the cliff has fired the multiplicative
//! decay is a no-op at the floor.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Exploration floor.
pub const EPSILON_FLOOR: f64 = 0.01;

/// Multiplicative decay factor applied per resolved update.
pub const EPSILON_DECAY: f64 = 0.998;

/// Selection count at which ε drops straight to the floor.
const EPSILON_CLIFF_SELECTIONS: u64 = 1000;

/// Discretized scheduler state: previous inter-request interval bin (0–1),
/// current interval bin (0–17), previous action bin (0–1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct QState {
    pub prev_interval_bin: u8,
    pub curr_interval_bin: u8,
    pub prev_action_bin: u8,
}

impl QState {
    #[must_use]
    pub const fn new(prev_interval_bin: u8, curr_interval_bin: u8, prev_action_bin: u8) -> Self {
        Self {
            prev_interval_bin,
            curr_interval_bin,
            prev_action_bin,
        }
    }
}

/// Lazily populated map from state to a length-`num_actions` Q-vector.
#[derive(Debug)]
pub struct QTable {
    table: HashMap<QState, Vec<f64>>,
    alpha: f64,
    gamma: f64,
    epsilon: f64,
    selections: u64,
    num_actions: u32,
    rng: StdRng,
}

impl QTable {
    #[must_use]
    pub fn new(alpha: f64, gamma: f64, initial_epsilon: f64, num_actions: u32, seed: u64) -> Self {
        Self {
            table: HashMap::new(),
            alpha,
            gamma,
            epsilon: initial_epsilon,
            selections: 0,
            num_actions: num_actions.max(1),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn random_action(&mut self) -> u32 {
        self.rng.gen_range(0..self.num_actions)
    }

    /// ε-greedy action selection.
    ///
    /// Unknown states are inserted zero-initialized and answered with a
    /// uniformly random action; known states return the argmax with ties
    /// broken toward the lowest action index.
    pub fn select_action(&mut self, state: QState) -> u32 {
        self.selections += 1;
        if self.selections >= EPSILON_CLIFF_SELECTIONS && self.epsilon > EPSILON_FLOOR {
            tracing::debug!(selections = self.selections, "epsilon cliff: exploration floored");
            self.epsilon = EPSILON_FLOOR;
        }

        if self.rng.gen::<f64>() < self.epsilon {
            return self.random_action();
        }

        if !self.table.contains_key(&state) {
            self.table
                .insert(state, vec![0.0; self.num_actions as usize]);
            return self.random_action();
        }

        let row = &self.table[&state];
        let mut best = 0_usize;
        for (action, &value) in row.iter().enumerate().skip(1) {
            if value > row[best] {
                best = action;
            }
        }
        best as u32
    }

    /// One-step Q update: `Q[s][a] += α · (r + γ · max Q[s'] − Q[s][a])`.
    pub fn update(&mut self, state: QState, action: u32, reward: f64, next_state: QState) {
        let actions = self.num_actions as usize;
        self.table
            .entry(next_state)
            .or_insert_with(|| vec![0.0; actions]);
        let max_next = self.table[&next_state]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);

        let row = self
            .table
            .entry(state)
            .or_insert_with(|| vec![0.0; actions]);
        let slot = (action as usize).min(actions - 1);
        let current = row[slot];
        row[slot] = current + self.alpha * (reward + self.gamma * max_next - current);
    }

    /// Multiplicative ε decay toward the floor.
    pub fn decay_epsilon(&mut self) {
        if self.epsilon > EPSILON_FLOOR {
            self.epsilon = (self.epsilon * EPSILON_DECAY).max(EPSILON_FLOOR);
        }
    }

    #[must_use]
    pub fn q_value(&self, state: QState, action: u32) -> f64 {
        self.table
            .get(&state)
            .and_then(|row| row.get(action as usize))
            .copied()
            .unwrap_or(0.0)
    }

    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    #[must_use]
    pub fn selections(&self) -> u64 {
        self.selections
    }

    #[must_use]
    pub fn states_known(&self) -> usize {
        self.table.len()
    }
}
