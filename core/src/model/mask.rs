use ndarray::{Array2, ArrayView2, Zip};
use std::sync::Arc;

/// Boolean flag plane matching an [`Image`](super::Image); `true` means flagged.
///
/// Several polarizations may alias one mask until one of them is mutated.
#[derive(Debug, Clone)]
pub struct Mask {
    data: Arc<Array2<bool>>,
}

impl Mask {
    pub fn unset(time_steps: usize, channels: usize) -> Self {
        Self {
            data: Arc::new(Array2::from_elem((time_steps, channels), false)),
        }
    }

    pub fn set_all(time_steps: usize, channels: usize) -> Self {
        Self {
            data: Arc::new(Array2::from_elem((time_steps, channels), true)),
        }
    }

    pub fn from_array(data: Array2<bool>) -> Self {
        Self {
            data: Arc::new(data),
        }
    }

    pub fn time_steps(&self) -> usize {
        self.data.nrows()
    }

    pub fn channels(&self) -> usize {
        self.data.ncols()
    }

    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_set(&self, time: usize, channel: usize) -> bool {
        self.data[[time, channel]]
    }

    pub fn view(&self) -> ArrayView2<'_, bool> {
        self.data.view()
    }

    pub fn make_mut(&mut self) -> &mut Array2<bool> {
        Arc::make_mut(&mut self.data)
    }

    pub fn set_value(&mut self, time: usize, channel: usize, flagged: bool) {
        self.make_mut()[[time, channel]] = flagged;
    }

    pub fn count_flagged(&self) -> usize {
        self.data.iter().filter(|&&flag| flag).count()
    }

    pub fn all_flagged(&self) -> bool {
        self.data.iter().all(|&flag| flag)
    }

    pub fn flagged_fraction(&self) -> f64 {
        if self.data.is_empty() {
            0.0
        } else {
            self.count_flagged() as f64 / self.data.len() as f64
        }
    }

    /// Flags every sample that is flagged in `other`.
    pub fn or_assign(&mut self, other: &Mask) {
        if self.shares_storage(other) {
            return;
        }
        Zip::from(self.make_mut())
            .and(other.data.as_ref())
            .for_each(|flag, &theirs| *flag |= theirs);
    }

    pub fn invert(&mut self) {
        self.make_mut().mapv_inplace(|flag| !flag);
    }

    pub fn shares_storage(&self, other: &Mask) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl PartialEq for Mask {
    fn eq(&self, other: &Self) -> bool {
        self.shares_storage(other) || self.data == other.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn or_assign_merges_flags() {
        let mut a = Mask::unset(3, 3);
        a.set_value(0, 0, true);
        let mut b = Mask::unset(3, 3);
        b.set_value(2, 2, true);

        a.or_assign(&b);
        assert!(a.is_set(0, 0));
        assert!(a.is_set(2, 2));
        assert_eq!(a.count_flagged(), 2);
    }

    #[test]
    fn aliased_masks_detach_on_write() {
        let shared = Mask::unset(2, 2);
        let mut xx = shared.clone();
        let yy = shared.clone();
        xx.set_value(1, 1, true);
        assert!(!yy.is_set(1, 1));
        assert!(yy.shares_storage(&shared));
    }

    #[test]
    fn empty_mask_has_zero_fraction() {
        let mask = Mask::unset(0, 0);
        assert_eq!(mask.flagged_fraction(), 0.0);
    }
}
