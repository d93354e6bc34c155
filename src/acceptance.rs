use crate::strategy::{Interval, Signal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Accept/reject decisions of every receiver for every sender of one generation.
///
/// Holds one matrix per sender class, rows indexed by sender and columns by receiver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcceptanceTable {
    classes: Vec<Vec<Vec<bool>>>,
    n_receivers: usize,
    n_senders: usize,
}

impl AcceptanceTable {
    /// Build the table from the strategies of one generation.
    pub fn build(senders: &[&[Signal]], receivers: &[Interval]) -> Self {
        let classes: Vec<Vec<Vec<bool>>> = senders
            .iter()
            .map(|signals| {
                signals
                    .par_iter()
                    .map(|&signal| receivers.iter().map(|rcv| rcv.accepts(signal)).collect())
                    .collect()
            })
            .collect();
        let n_senders = senders.iter().map(|signals| signals.len()).sum();

        Self {
            classes,
            n_receivers: receivers.len(),
            n_senders,
        }
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn n_receivers(&self) -> usize {
        self.n_receivers
    }

    /// Total number of senders across all classes.
    pub fn n_senders(&self) -> usize {
        self.n_senders
    }

    pub fn is_accepted(&self, i_class: usize, i_sender: usize, i_receiver: usize) -> bool {
        self.classes[i_class][i_sender][i_receiver]
    }

    /// Fraction of receivers accepting a sender.
    pub fn acceptance_rate(&self, i_class: usize, i_sender: usize) -> f64 {
        let row = &self.classes[i_class][i_sender];
        if row.is_empty() {
            return 0.0;
        }
        row.iter().filter(|&&acc| acc).count() as f64 / row.len() as f64
    }

    /// Number of senders of a class accepted by a receiver.
    pub fn accepted_count(&self, i_class: usize, i_receiver: usize) -> usize {
        self.classes[i_class]
            .iter()
            .filter(|row| row[i_receiver])
            .count()
    }
}
