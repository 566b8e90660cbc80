use ndarray::{Array2, ArrayView2};
use std::sync::Arc;

/// Dense time-frequency sample plane. Axis 0 is time, axis 1 is frequency.
///
/// Clones share storage; [`Image::make_mut`] copies the samples first when
/// another handle still points at them.
#[derive(Debug, Clone)]
pub struct Image {
    data: Arc<Array2<f32>>,
}

impl Image {
    pub fn zeros(time_steps: usize, channels: usize) -> Self {
        Self::filled(time_steps, channels, 0.0)
    }

    pub fn filled(time_steps: usize, channels: usize, value: f32) -> Self {
        Self {
            data: Arc::new(Array2::from_elem((time_steps, channels), value)),
        }
    }

    pub fn from_array(data: Array2<f32>) -> Self {
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

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, time: usize, channel: usize) -> f32 {
        self.data[[time, channel]]
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// Mutable access, cloning the samples if they are shared.
    pub fn make_mut(&mut self) -> &mut Array2<f32> {
        Arc::make_mut(&mut self.data)
    }

    pub fn set(&mut self, time: usize, channel: usize, value: f32) {
        self.make_mut()[[time, channel]] = value;
    }

    pub fn shares_storage(&self, other: &Image) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Element-wise difference `self - other`; dimensions must match.
    pub fn subtract(&self, other: &Image) -> Image {
        Image::from_array(&*self.data - &*other.data)
    }

    pub fn into_array(self) -> Array2<f32> {
        Arc::try_unwrap(self.data).unwrap_or_else(|shared| (*shared).clone())
    }
}

impl PartialEq for Image {
    fn eq(&self, other: &Self) -> bool {
        self.shares_storage(other) || self.data == other.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_detaches_shared_storage() {
        let original = Image::filled(4, 3, 1.0);
        let mut copy = original.clone();
        assert!(copy.shares_storage(&original));

        copy.set(2, 1, 5.0);
        assert!(!copy.shares_storage(&original));
        assert_eq!(original.get(2, 1), 1.0);
        assert_eq!(copy.get(2, 1), 5.0);
    }

    #[test]
    fn subtract_is_elementwise() {
        let a = Image::filled(2, 2, 3.0);
        let b = Image::filled(2, 2, 1.0);
        let diff = a.subtract(&b);
        assert!(diff.view().iter().all(|&v| v == 2.0));
    }
}
