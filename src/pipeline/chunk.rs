//! Chunking: split normalized lines into fixed-size blocks.

use std::num::NonZeroUsize;

/// Lazily yield chunks of up to `size` consecutive lines, newline-joined.
///
/// Chunks do not overlap and preserve order; the last one may be shorter.
/// An empty input yields no chunks at all. The iterator borrows `lines`, so
/// calling this again on the same input restarts from the beginning.
pub fn chunk_lines<S: AsRef<str>>(
    lines: &[S],
    size: NonZeroUsize,
) -> impl Iterator<Item = String> + '_ {
    lines.chunks(size.get()).map(|block| {
        block
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<&str>>()
            .join("\n")
    })
}

/// Number of chunks [`chunk_lines`] will yield for `line_count` lines.
pub fn chunk_count(line_count: usize, size: NonZeroUsize) -> usize {
    line_count.div_ceil(size.get())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn n(v: usize) -> NonZeroUsize {
        NonZeroUsize::new(v).unwrap()
    }

    #[test]
    fn splits_into_fixed_blocks() {
        let lines = ["a", "b", "c", "d", "e"];
        let chunks: Vec<String> = chunk_lines(&lines, n(2)).collect();
        assert_eq!(chunks, vec!["a\nb", "c\nd", "e"]);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let lines: [&str; 0] = [];
        assert_eq!(chunk_lines(&lines, n(50)).count(), 0);
        assert_eq!(chunk_count(0, n(50)), 0);
    }

    #[test]
    fn size_larger_than_input_yields_one_chunk() {
        let lines = vec!["x".to_string(), "y".to_string()];
        let chunks: Vec<String> = chunk_lines(&lines, n(50)).collect();
        assert_eq!(chunks, vec!["x\ny"]);
    }

    #[test]
    fn restartable() {
        let lines = ["a", "b", "c"];
        let first: Vec<String> = chunk_lines(&lines, n(2)).collect();
        let second: Vec<String> = chunk_lines(&lines, n(2)).collect();
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn chunks_cover_input_exactly(
            lines in prop::collection::vec("[A-Za-z0-9 ]{0,12}[A-Za-z0-9]", 1..200),
            size in 1usize..60,
        ) {
            let size = n(size);
            let chunks: Vec<String> = chunk_lines(&lines, size).collect();
            prop_assert_eq!(chunks.len(), chunk_count(lines.len(), size));
            prop_assert_eq!(chunks.len(), lines.len().div_ceil(size.get()));

            let rejoined: Vec<String> = chunks
                .iter()
                .flat_map(|c| c.split('\n').map(str::to_string))
                .collect();
            prop_assert_eq!(rejoined, lines);
        }
    }
}
