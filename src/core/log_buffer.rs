use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const DEFAULT_CAPACITY: usize = 10_000;

pub const LINE_SEPARATOR: &str = "\n";

/// Rolling console output. Holds at most `capacity` lines; the oldest go first.
///
/// Every mutation takes the internal lock for its whole duration, so a
/// concurrent `append` and `clear` are each seen completely or not at all.
#[derive(Debug)]
pub struct StreamLogBuffer {
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

impl StreamLogBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            lines: Mutex::new(VecDeque::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        // 持鎖期間不會 panic，中毒時資料仍然完整
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a line, evicting from the head until the bound holds again.
    /// Returns the number of evicted lines.
    pub fn append(&self, line: impl Into<String>) -> usize {
        let mut lines = self.lock();
        lines.push_back(line.into());

        let mut evicted = 0;
        while lines.len() > self.capacity {
            lines.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// All lines joined with a line break, oldest first.
    pub fn snapshot(&self) -> String {
        let lines = self.lock();
        let mut out = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                out.push_str(LINE_SEPARATOR);
            }
            out.push_str(line);
        }
        out
    }

    pub fn lines(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    /// The newest `count` lines, oldest first.
    pub fn tail(&self, count: usize) -> Vec<String> {
        let lines = self.lock();
        let skip = lines.len().saturating_sub(count);
        lines.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for StreamLogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_eviction_at_capacity() {
        let buffer = StreamLogBuffer::new();
        let mut evicted = 0;
        for i in 1..=10_001 {
            evicted += buffer.append(format!("line {}", i));
        }

        assert_eq!(evicted, 1);
        assert_eq!(buffer.len(), 10_000);
        let lines = buffer.lines();
        assert_eq!(lines.first().map(String::as_str), Some("line 2"));
        assert_eq!(lines.last().map(String::as_str), Some("line 10001"));
    }

    #[test]
    fn test_small_capacity_keeps_newest() {
        let buffer = StreamLogBuffer::with_capacity(3);
        for line in ["a", "b", "c", "d", "e"] {
            buffer.append(line);
        }
        assert_eq!(buffer.lines(), vec!["c", "d", "e"]);
        assert_eq!(buffer.tail(2), vec!["d", "e"]);
        assert_eq!(buffer.tail(10), vec!["c", "d", "e"]);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let buffer = StreamLogBuffer::with_capacity(0);
        buffer.append("only");
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.snapshot(), "only");
    }

    #[test]
    fn test_clear_then_snapshot_is_empty() {
        let buffer = StreamLogBuffer::new();
        for i in 0..500 {
            buffer.append(i.to_string());
        }
        buffer.clear();
        assert_eq!(buffer.snapshot(), "");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_snapshot_splits_back_into_lines() {
        let buffer = StreamLogBuffer::new();
        for line in ["a", "b", "c"] {
            buffer.append(line);
        }
        let snapshot = buffer.snapshot();
        assert_eq!(snapshot, "a\nb\nc");
        assert_eq!(snapshot.split(LINE_SEPARATOR).collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_concurrent_append_and_clear_never_exceeds_capacity() {
        let buffer = Arc::new(StreamLogBuffer::with_capacity(100));

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || {
                    for i in 0..2_000 {
                        buffer.append(format!("{}-{}", w, i));
                    }
                })
            })
            .collect();

        let clearer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for _ in 0..200 {
                    buffer.clear();
                    assert!(buffer.len() <= 100);
                }
            })
        };

        for handle in writers {
            handle.join().unwrap();
        }
        clearer.join().unwrap();

        let lines = buffer.lines();
        assert!(lines.len() <= 100);
        // 同一個 writer 的行必須保持遞增順序
        for w in 0..4 {
            let seq: Vec<usize> = lines
                .iter()
                .filter_map(|l| l.strip_prefix(&format!("{}-", w)))
                .map(|n| n.parse().unwrap())
                .collect();
            assert!(seq.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }
}
