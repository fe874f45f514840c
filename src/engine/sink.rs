//! Debug output sinks.
//!
//! Each DEBUG instruction emits the decimal value of one register. The sink
//! is injected into [`run`](super::ExecutionEngine::run) rather than being a
//! process-global stream, so independent engines never share output and
//! tests can capture emissions deterministically.

/// Destination for DEBUG instruction output.
pub trait DebugSink {
    /// Emits one diagnostic value. Called once per executed DEBUG
    /// instruction, in program order.
    fn emit(&mut self, value: i64);
}

/// Sink writing one line per value to standard error.
#[derive(Debug, Default)]
pub struct StderrSink;

impl DebugSink for StderrSink {
    fn emit(&mut self, value: i64) {
        eprintln!("{value}");
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Sink recording every emission, for asserting on output order.
    #[derive(Debug, Default)]
    pub struct TestSink {
        pub values: Vec<i64>,
    }

    impl TestSink {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl DebugSink for TestSink {
        fn emit(&mut self, value: i64) {
            self.values.push(value);
        }
    }

    #[test]
    fn test_sink_records_in_order() {
        let mut sink = TestSink::new();
        sink.emit(1);
        sink.emit(-2);
        sink.emit(3);
        assert_eq!(sink.values, vec![1, -2, 3]);
    }
}
