use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::Mutex;

#[doc(hidden)]
pub mod macros;
pub mod traceable;
pub use traceable::Traceable;

/// Last million executed steps, oldest first
pub static TRACER: Lazy<Mutex<Tracer>> = Lazy::new(|| Mutex::new(Tracer::new(1_000_000)));

/// Bounded in-memory history of trace lines
pub struct Tracer {
    history: VecDeque<String>,
    capacity: usize,
}

impl Tracer {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    pub fn write(&mut self, msg: String) {
        if self.capacity == 0 {
            return;
        }
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(msg);
    }

    pub fn print(&self) {
        for (i, line) in self.history.iter().enumerate() {
            println!("{:07}: {}", i, line);
        }
    }

    pub fn log<T: Traceable>(&mut self, thing: &T) {
        if let Some(trace) = thing.trace() {
            self.write(trace);
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Probe(u8);

    impl Traceable for Probe {
        fn trace_name(&self) -> &'static str {
            "PROBE"
        }

        fn trace_state(&self) -> Option<String> {
            (self.0 != 0).then(|| format!("v={:02X}", self.0))
        }
    }

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let mut tracer = Tracer::new(2);
        tracer.write("a".into());
        tracer.write("b".into());
        tracer.write("c".into());
        assert_eq!(tracer.lines().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn test_log_skips_stateless_objects() {
        let mut tracer = Tracer::new(4);
        tracer.log(&Probe(0));
        tracer.log(&Probe(0x2A));
        assert_eq!(tracer.len(), 1);
        assert_eq!(tracer.lines().next(), Some("PROBE v=2A"));
    }
}
