//! Size bounded bulk buffers
//!
//! A [`BufferSlice`] packs `(meta, doc)` pairs into NDJSON buffers so that no
//! bulk request exceeds the configured payload size. A pair is never split;
//! an oversized pair gets a buffer of its own.

/// Default maximum size of one bulk request, 4 MiB
pub const DEFAULT_BULK_SIZE_THRESHOLD: usize = 4 * 1024 * 1024;

/// Ordered list of bulk buffers bounded by a byte threshold
#[derive(Debug, Clone)]
pub struct BufferSlice {
    buffers: Vec<Vec<u8>>,
    threshold: usize,
    current: usize,
}

impl BufferSlice {
    /// Create a slice with the given threshold; zero means [`DEFAULT_BULK_SIZE_THRESHOLD`]
    pub fn new(threshold: usize) -> Self {
        let threshold = if threshold == 0 {
            DEFAULT_BULK_SIZE_THRESHOLD
        } else {
            threshold
        };

        Self {
            buffers: Vec::new(),
            threshold,
            current: 0,
        }
    }

    /// Append the metadata line and, when present, the document line
    pub fn put_data(&mut self, meta: &[u8], doc: &[u8]) {
        if self.buffers.is_empty() {
            self.buffers.push(Vec::new());
        }

        let current_len = self.buffers[self.current].len();
        let needs_new_buffer =
            current_len != 0 && current_len + meta.len() + doc.len() > self.threshold;
        if needs_new_buffer {
            self.buffers.push(Vec::new());
            self.current += 1;
        }

        let buffer = &mut self.buffers[self.current];
        buffer.extend_from_slice(meta);
        if !doc.is_empty() {
            buffer.extend_from_slice(doc);
            buffer.push(b'\n');
        }
    }

    /// Buffers accumulated so far, in submission order
    pub fn buffers(&self) -> &[Vec<u8>] {
        &self.buffers
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.iter().all(|buffer| buffer.is_empty())
    }
}

impl Default for BufferSlice {
    fn default() -> Self {
        Self::new(DEFAULT_BULK_SIZE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_threshold_uses_default() {
        let slice = BufferSlice::new(0);
        assert_eq!(slice.threshold(), DEFAULT_BULK_SIZE_THRESHOLD);
        assert!(slice.buffers().is_empty());
        assert!(slice.is_empty());
    }

    #[test]
    fn test_oversized_pair_starts_new_buffer() {
        let mut slice = BufferSlice::default();
        let meta = vec![b'm'; 100];
        let doc = vec![b'd'; 100];

        slice.put_data(&meta, &doc);
        slice.put_data(&meta, &doc);
        assert_eq!(slice.buffers().len(), 1);
        assert_eq!(slice.buffers()[0].len(), 2 * 201);

        let big_doc = vec![b'x'; DEFAULT_BULK_SIZE_THRESHOLD];
        slice.put_data(&meta, &big_doc);

        assert_eq!(slice.buffers().len(), 2);
        assert_eq!(slice.buffers()[1].len(), 100 + DEFAULT_BULK_SIZE_THRESHOLD + 1);
    }

    #[test]
    fn test_newline_only_after_non_empty_doc() {
        let mut slice = BufferSlice::new(1024);
        slice.put_data(b"{ \"delete\" : { \"_id\" : \"a\" } }\n", b"");
        slice.put_data(b"{ \"index\" : { \"_id\" : \"b\" } }\n", b"{}");

        let body = String::from_utf8(slice.buffers()[0].clone()).unwrap();
        assert_eq!(
            body,
            "{ \"delete\" : { \"_id\" : \"a\" } }\n{ \"index\" : { \"_id\" : \"b\" } }\n{}\n"
        );
    }

    #[test]
    fn test_first_oversized_pair_stays_in_first_buffer() {
        let mut slice = BufferSlice::new(10);
        slice.put_data(b"0123456789", b"abc");
        slice.put_data(b"m", b"d");

        assert_eq!(slice.buffers().len(), 2);
        assert_eq!(slice.buffers()[0], b"0123456789abc\n".to_vec());
        assert_eq!(slice.buffers()[1], b"md\n".to_vec());
    }

    proptest! {
        #[test]
        fn prop_buffers_respect_threshold(
            threshold in 16usize..256,
            pairs in prop::collection::vec((1usize..64, 0usize..128), 1..40),
        ) {
            let mut slice = BufferSlice::new(threshold);
            for (meta_len, doc_len) in &pairs {
                slice.put_data(&vec![b'm'; *meta_len], &vec![b'd'; *doc_len]);
            }

            let mut pair_sizes = pairs.iter().map(|(m, d)| m + d + usize::from(*d > 0));
            for buffer in slice.buffers() {
                prop_assert!(!buffer.is_empty());

                // each buffer is made of whole pairs
                let mut consumed = 0;
                let mut count = 0;
                while consumed < buffer.len() {
                    let size = pair_sizes.next();
                    prop_assert!(size.is_some());
                    consumed += size.unwrap_or_default();
                    count += 1;
                }
                prop_assert_eq!(consumed, buffer.len());

                // the trailing newline is not part of the size check
                if count > 1 {
                    prop_assert!(buffer.len() <= threshold + 1);
                }
            }
            prop_assert!(pair_sizes.next().is_none());
        }
    }
}
