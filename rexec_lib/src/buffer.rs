use std::sync::{Mutex, MutexGuard, PoisonError};

/// Append-only byte sink shared between a process stream pump and readers.
///
/// Readers only ever get copies, so nothing handed out by [`OutputBuffer::snapshot`]
/// changes when more output arrives.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    bytes: Mutex<Vec<u8>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, data: &[u8]) {
        self.lock().extend_from_slice(data);
    }

    /// copy of everything written so far
    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // a panicking writer cannot leave the vec half-extended, so poisoning is ignored
    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, thread};

    use super::OutputBuffer;

    #[test]
    fn test_snapshot_is_not_mutated_by_later_writes() {
        let buffer = OutputBuffer::new();
        buffer.write(b"hello ");
        let before = buffer.snapshot();
        buffer.write(b"world");
        let after = buffer.snapshot();
        assert_eq!(b"hello ".to_vec(), before);
        assert_eq!(b"hello world".to_vec(), after);
        assert_eq!(11, buffer.len());
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = OutputBuffer::new();
        assert!(buffer.is_empty());
        assert!(buffer.snapshot().is_empty());
    }

    // chunks from concurrent writers are never interleaved with each other
    #[test]
    fn test_concurrent_writes_and_reads() {
        let buffer = Arc::new(OutputBuffer::new());
        let writers: Vec<_> = (0..4u8)
            .map(|n| {
                let buffer = buffer.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        buffer.write(&[b'a' + n; 4]);
                    }
                })
            })
            .collect();
        let reader = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    let snapshot = buffer.snapshot();
                    assert_eq!(0, snapshot.len() % 4);
                }
            })
        };
        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        let snapshot = buffer.snapshot();
        assert_eq!(4 * 250 * 4, snapshot.len());
        for chunk in snapshot.chunks(4) {
            assert!(chunk.iter().all(|b| *b == chunk[0]));
        }
    }
}
