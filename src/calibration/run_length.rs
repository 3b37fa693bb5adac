//! Run-Length Analyzer
//!
//! Lengths of maximal runs of consecutive `true` values in a threshold-crossing
//! mask, left to right. Gaps are not represented and a run still open at the
//! end of the input is flushed as the final entry:
//!
//! ```text
//! [T, T, F, T, T, T, F, F, T]  ->  [2, 3, 1]
//! ```

/// Lazy producer of run lengths over any boolean stream.
///
/// Yields each run as soon as the crossing condition ends, so arbitrarily long
/// masks can be scanned without materialising them.
#[derive(Debug, Clone)]
pub struct RunLengths<I> {
    mask: I,
    current: usize,
    done: bool,
}

impl<I: Iterator<Item = bool>> RunLengths<I> {
    pub fn new(mask: I) -> Self {
        Self {
            mask,
            current: 0,
            done: false,
        }
    }
}

impl<I: Iterator<Item = bool>> Iterator for RunLengths<I> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.done {
            return None;
        }
        loop {
            match self.mask.next() {
                Some(true) => self.current += 1,
                Some(false) => {
                    if self.current > 0 {
                        return Some(std::mem::take(&mut self.current));
                    }
                }
                None => {
                    self.done = true;
                    return (self.current > 0).then(|| std::mem::take(&mut self.current));
                }
            }
        }
    }
}

/// Run lengths of a complete mask.
pub fn run_lengths(mask: &[bool]) -> Vec<usize> {
    RunLengths::new(mask.iter().copied()).collect()
}
