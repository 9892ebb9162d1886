// src/output/unit.rs

//! Buffered data output for a single task.

use std::collections::VecDeque;

/// Which sink a data payload is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Object,
    Error,
    Verbose,
}

/// One data emission. The kind travels with each payload, so a task may mix
/// objects, errors and verbose messages and they still replay in emission
/// order.
#[derive(Debug)]
pub enum OutputPayload<T> {
    Object(T),
    Error(anyhow::Error),
    Verbose(String),
}

impl<T> OutputPayload<T> {
    pub fn kind(&self) -> OutputKind {
        match self {
            OutputPayload::Object(_) => OutputKind::Object,
            OutputPayload::Error(_) => OutputKind::Error,
            OutputPayload::Verbose(_) => OutputKind::Verbose,
        }
    }
}

/// FIFO of payloads waiting for the cursor to reach their task.
#[derive(Debug)]
pub struct OutputUnit<T> {
    payloads: VecDeque<OutputPayload<T>>,
}

impl<T> Default for OutputUnit<T> {
    fn default() -> Self {
        Self {
            payloads: VecDeque::new(),
        }
    }
}

impl<T> OutputUnit<T> {
    pub fn push(&mut self, payload: OutputPayload<T>) {
        self.payloads.push_back(payload);
    }

    pub fn pop_front(&mut self) -> Option<OutputPayload<T>> {
        self.payloads.pop_front()
    }

    /// Put an undelivered remainder back in front of anything buffered since.
    pub fn prepend(&mut self, mut remainder: OutputUnit<T>) {
        remainder.payloads.append(&mut self.payloads);
        self.payloads = remainder.payloads;
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = OutputKind> + '_ {
        self.payloads.iter().map(OutputPayload::kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn objects(unit: &mut OutputUnit<&'static str>) -> Vec<&'static str> {
        let mut out = Vec::new();
        while let Some(p) = unit.pop_front() {
            if let OutputPayload::Object(v) = p {
                out.push(v);
            }
        }
        out
    }

    #[test]
    fn prepend_keeps_remainder_first() {
        let mut newer = OutputUnit::default();
        newer.push(OutputPayload::Object("c"));

        let mut remainder = OutputUnit::default();
        remainder.push(OutputPayload::Object("a"));
        remainder.push(OutputPayload::Object("b"));

        newer.prepend(remainder);
        assert_eq!(newer.len(), 3);
        assert_eq!(objects(&mut newer), vec!["a", "b", "c"]);
    }

    #[test]
    fn mixed_kinds_keep_emission_order() {
        let mut unit: OutputUnit<&str> = OutputUnit::default();
        unit.push(OutputPayload::Verbose("starting".into()));
        unit.push(OutputPayload::Object("x"));
        unit.push(OutputPayload::Error(anyhow::anyhow!("bad")));

        let kinds: Vec<_> = unit.kinds().collect();
        assert_eq!(
            kinds,
            vec![OutputKind::Verbose, OutputKind::Object, OutputKind::Error]
        );
    }
}
