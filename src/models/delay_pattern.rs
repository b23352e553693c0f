//! Codebook delay pattern.
//!
//! MusicGen predicts all EnCodec codebooks in one step by shifting codebook
//! `k` right by `k` steps. Feeding the decoder requires the delayed view;
//! decoding audio requires undoing the shift.

/// Token history for `N` codebooks (`N > 0`).
#[derive(Debug)]
pub struct DelayPatternMaskIds<const N: usize> {
    batches: [Vec<i64>; N],
}

impl<const N: usize> Default for DelayPatternMaskIds<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> DelayPatternMaskIds<N> {
    pub fn new() -> Self {
        Self {
            batches: [(); N].map(|()| vec![]),
        }
    }

    /// Appends one decoder step, one token per codebook.
    pub fn push(&mut self, token_ids: [i64; N]) {
        for (batch, id) in self.batches.iter_mut().zip(token_ids) {
            batch.push(id);
        }
    }

    /// Next decoder input: the latest token of each codebook, with codebooks
    /// that have not started yet replaced by the pad token.
    /// ```text
    ///   0 1 2 3 4 5 6 7 8 9 10
    /// 0 x x x x x x x x x x ...
    /// 1 P x x x x x x x x x ...
    /// 2 P P x x x x x x x x ...
    /// 3 P P P x x x x x x x ...
    /// ```
    pub fn last_delayed_masked(&self, pad_token_id: i64) -> [i64; N] {
        let seq_len = self.len();
        let mut result = [pad_token_id; N];
        for (i, item) in result.iter_mut().enumerate() {
            if seq_len > i {
                *item = self.batches[i].last().copied().unwrap_or(pad_token_id);
            }
        }
        result
    }

    /// The newest complete frame read along the diagonal.
    /// ```text
    ///   0 1 2 3 4 5 6 7 8 9
    /// 0 x x x x x x x P P P
    /// 1 P x x x x x x x P P
    /// 2 P P x x x x x x x P
    /// 3 P P P x x x x x x x
    /// ```
    /// `None` until `N` steps have been pushed.
    pub fn last_de_delayed(&self) -> Option<[i64; N]> {
        let seq_len = self.len();
        if seq_len < N {
            return None;
        }
        let mut result = [0; N];
        for (i, item) in result.iter_mut().enumerate() {
            *item = self.batches[i][seq_len - N + i];
        }
        Some(result)
    }

    /// Number of steps pushed so far.
    pub fn len(&self) -> usize {
        self.batches[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches[0].is_empty()
    }
}
